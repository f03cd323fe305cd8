//! Relay from a one-shot event producer to a client-facing stream.
//!
//! The producer runs as its own task and pushes [`AgentEvent`]s into a
//! bounded channel. The returned stream yields each event as soon as it is
//! received. `done` is reserved for the pipeline: producer-emitted `done`
//! events are dropped. At most one `error` reaches the client, either the
//! producer's first or one appended when the producer fails. Exactly one
//! `done` ends the stream. Dropping the stream (client disconnect)
//! aborts the producer task and closes the channel, so no further events are
//! produced.

use std::future::Future;

use async_stream::stream;
use futures::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::models::event::{AgentEvent, AgentEventKind};
use crate::services::ai_provider::ProviderError;

pub const DEFAULT_BUFFER: usize = 16;

/// Producer-side handle. Not `Clone`: the channel closes when the producer
/// returns or drops it.
pub struct EventSink {
    tx: mpsc::Sender<AgentEvent>,
}

impl EventSink {
    /// Wait until the consumer accepts `event`.
    pub async fn emit(&self, event: AgentEvent) -> Result<(), SinkClosed> {
        self.tx.send(event).await.map_err(|_| SinkClosed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("event stream closed by client")]
pub struct SinkClosed;

/// Aborts the producer if the consuming stream goes away first.
struct ProducerTask(JoinHandle<Result<(), ProviderError>>);

impl Drop for ProducerTask {
    fn drop(&mut self) {
        if !self.0.is_finished() {
            tracing::debug!("Event stream dropped before producer finished, aborting producer");
            self.0.abort();
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EventPipeline {
    buffer: usize,
}

impl Default for EventPipeline {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER)
    }
}

impl EventPipeline {
    pub fn new(buffer: usize) -> Self {
        Self {
            buffer: buffer.max(1),
        }
    }

    /// Start `produce` and relay its events.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn run<F, Fut>(&self, produce: F) -> impl Stream<Item = AgentEvent> + Send + 'static
    where
        F: FnOnce(EventSink) -> Fut,
        Fut: Future<Output = Result<(), ProviderError>> + Send + 'static,
    {
        let (tx, mut rx) = mpsc::channel(self.buffer);
        let producer = ProducerTask(tokio::spawn(produce(EventSink { tx })));
        metrics::counter!("agent_streams_opened_total").increment(1);

        stream! {
            let mut producer = producer;

            let mut error_sent = false;
            while let Some(event) = rx.recv().await {
                if event.is_done() {
                    tracing::debug!("Dropping done event emitted by producer");
                    continue;
                }
                if event.kind == AgentEventKind::Error {
                    if error_sent {
                        tracing::debug!("Dropping repeated error event emitted by producer");
                        continue;
                    }
                    error_sent = true;
                }
                yield event;
            }

            // Channel closed: the producer returned or dropped its sink.
            let failure = match (&mut producer.0).await {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e.to_string()),
                Err(join_err) if join_err.is_panic() => {
                    Some("procurement agent panicked".to_string())
                }
                Err(join_err) => Some(join_err.to_string()),
            };

            let failed = failure.is_some();
            if let Some(message) = failure {
                tracing::warn!(error = %message, "Event producer failed mid-stream");
                metrics::counter!("agent_stream_errors_total").increment(1);
                if !error_sent {
                    yield AgentEvent::error(message);
                }
            }

            tracing::info!(failed, "Event stream closed");
            yield AgentEvent::done();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn kinds(events: &[AgentEvent]) -> Vec<AgentEventKind> {
        events.iter().map(|e| e.kind).collect()
    }

    #[tokio::test]
    async fn test_relays_in_order_then_done() {
        let pipeline = EventPipeline::default();
        let events: Vec<AgentEvent> = pipeline
            .run(|sink| async move {
                sink.emit(AgentEvent::thought("thinking")).await?;
                sink.emit(AgentEvent::action("searching")).await?;
                sink.emit(AgentEvent::result(json!({"sku": "X"}))).await?;
                sink.emit(AgentEvent::summary(json!({"items": 1}))).await?;
                Ok::<(), ProviderError>(())
            })
            .collect()
            .await;

        assert_eq!(
            kinds(&events),
            vec![
                AgentEventKind::Thought,
                AgentEventKind::Action,
                AgentEventKind::Result,
                AgentEventKind::Summary,
                AgentEventKind::Done,
            ]
        );
        assert_eq!(events.last().unwrap().data, serde_json::Value::Null);
    }

    #[tokio::test]
    async fn test_producer_done_is_not_forwarded() {
        let pipeline = EventPipeline::default();
        let events: Vec<AgentEvent> = pipeline
            .run(|sink| async move {
                sink.emit(AgentEvent::thought("thinking")).await?;
                sink.emit(AgentEvent::done()).await?;
                sink.emit(AgentEvent::summary(json!({"items": 0}))).await?;
                Ok::<(), ProviderError>(())
            })
            .collect()
            .await;

        assert_eq!(
            kinds(&events),
            vec![
                AgentEventKind::Thought,
                AgentEventKind::Summary,
                AgentEventKind::Done,
            ]
        );
        assert_eq!(events.iter().filter(|e| e.is_done()).count(), 1);
    }

    #[tokio::test]
    async fn test_at_most_one_error_event() {
        let pipeline = EventPipeline::default();
        let events: Vec<AgentEvent> = pipeline
            .run(|sink| async move {
                sink.emit(AgentEvent::error("quote lookup failed")).await?;
                sink.emit(AgentEvent::error("retry failed")).await?;
                Err(ProviderError::Other("gave up".to_string()))
            })
            .collect()
            .await;

        assert_eq!(
            kinds(&events),
            vec![AgentEventKind::Error, AgentEventKind::Done]
        );
        assert_eq!(events[0].data, json!("quote lookup failed"));
    }

    #[tokio::test]
    async fn test_producer_error_becomes_single_error_event() {
        let pipeline = EventPipeline::default();
        let events: Vec<AgentEvent> = pipeline
            .run(|sink| async move {
                sink.emit(AgentEvent::thought("first")).await?;
                Err(ProviderError::Other("vendor API unreachable".to_string()))
            })
            .collect()
            .await;

        assert_eq!(
            kinds(&events),
            vec![
                AgentEventKind::Thought,
                AgentEventKind::Error,
                AgentEventKind::Done
            ]
        );
        assert_eq!(events[1].data, json!("vendor API unreachable"));
    }

    #[tokio::test]
    async fn test_panicking_producer_still_terminates_with_done() {
        let pipeline = EventPipeline::default();
        let events: Vec<AgentEvent> = pipeline
            .run(|_sink| async move {
                if true {
                    panic!("boom");
                }
                Ok::<(), ProviderError>(())
            })
            .collect()
            .await;

        assert_eq!(
            kinds(&events),
            vec![AgentEventKind::Error, AgentEventKind::Done]
        );
    }

    #[tokio::test]
    async fn test_empty_producer_yields_only_done() {
        let pipeline = EventPipeline::new(1);
        let events: Vec<AgentEvent> = pipeline
            .run(|_sink| async { Ok::<(), ProviderError>(()) }).collect().await;
        assert_eq!(kinds(&events), vec![AgentEventKind::Done]);
    }

    #[tokio::test]
    async fn test_events_are_forwarded_before_producer_completes() {
        let pipeline = EventPipeline::default();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        let mut stream = Box::pin(pipeline.run(|sink| async move {
            sink.emit(AgentEvent::thought("early")).await?;
            let _ = release_rx.await;
            sink.emit(AgentEvent::summary(json!({}))).await?;
            Ok::<(), ProviderError>(())
        }));

        let first = tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .expect("first event should arrive while producer is still running")
            .unwrap();
        assert_eq!(first.kind, AgentEventKind::Thought);

        release_tx.send(()).unwrap();
        let rest: Vec<AgentEvent> = stream.collect().await;
        assert_eq!(
            kinds(&rest),
            vec![AgentEventKind::Summary, AgentEventKind::Done]
        );
    }

    #[tokio::test]
    async fn test_dropping_stream_stops_producer() {
        let pipeline = EventPipeline::new(1);
        let produced = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&produced);

        let mut stream = Box::pin(pipeline.run(move |sink| async move {
            while sink.emit(AgentEvent::thought("tick")).await.is_ok() {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            Ok::<(), ProviderError>(())
        }));

        stream.next().await.unwrap();
        drop(stream);

        tokio::time::sleep(Duration::from_millis(50)).await;
        let after_drop = produced.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(produced.load(Ordering::SeqCst), after_drop);
    }
}
