use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

/// Kind tag carried by every procurement stream event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AgentEventKind {
    Thought,
    Action,
    Result,
    Summary,
    Error,
    Done,
}

/// A single procurement agent event as it goes over the wire:
/// `{"event": <kind>, "data": <payload>}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentEvent {
    #[serde(rename = "event")]
    pub kind: AgentEventKind,
    pub data: Value,
}

impl AgentEvent {
    pub fn new(kind: AgentEventKind, data: Value) -> Self {
        Self { kind, data }
    }

    pub fn thought(text: impl Into<String>) -> Self {
        Self::new(AgentEventKind::Thought, Value::String(text.into()))
    }

    pub fn action(text: impl Into<String>) -> Self {
        Self::new(AgentEventKind::Action, Value::String(text.into()))
    }

    pub fn result(data: Value) -> Self {
        Self::new(AgentEventKind::Result, data)
    }

    pub fn summary(data: Value) -> Self {
        Self::new(AgentEventKind::Summary, data)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(AgentEventKind::Error, Value::String(message.into()))
    }

    /// Stream terminator. Always carries a null payload.
    pub fn done() -> Self {
        Self::new(AgentEventKind::Done, Value::Null)
    }

    pub fn is_done(&self) -> bool {
        self.kind == AgentEventKind::Done
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_done_serializes_with_null_payload() {
        let encoded = serde_json::to_string(&AgentEvent::done()).unwrap();
        assert_eq!(encoded, r#"{"event":"done","data":null}"#);
    }

    #[test]
    fn test_result_payload_passes_through() {
        let event = AgentEvent::result(json!({"sku": "SF-MOD-001", "in_stock": true}));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "result");
        assert_eq!(value["data"]["sku"], "SF-MOD-001");
    }
}
