use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};

/// Room dimensions in metres.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct RoomDimensions {
    #[garde(range(min = 0.0))]
    pub width: f64,
    #[garde(range(min = 0.0))]
    pub height: f64,
    #[garde(range(min = 0.0))]
    pub depth: f64,
}

/// Structured analysis of an uploaded room photograph.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct RoomAnalysis {
    #[garde(length(min = 1, max = 100))]
    pub room_type: String,

    #[garde(dive)]
    pub dimensions: RoomDimensions,

    #[garde(skip)]
    pub lighting: String,

    #[garde(skip)]
    #[serde(default)]
    pub existing_features: Vec<String>,

    #[garde(skip)]
    #[serde(default)]
    pub style_hints: Vec<String>,

    #[garde(range(min = 0.0, max = 1.0))]
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn default_confidence() -> f64 {
    1.0
}

/// Response for `POST /api/rooms/analyze`.
#[derive(Debug, Serialize)]
pub struct RoomAnalyzeResponse {
    pub room_id: String,
    pub filename: String,
    pub file_url: Option<String>,
    pub analysis: RoomAnalysis,
    pub created_at: DateTime<Utc>,
}
