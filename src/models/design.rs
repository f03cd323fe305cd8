use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Footprint of a furniture piece in metres (width, height, depth).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Dimensions {
    pub w: f64,
    pub h: f64,
    pub d: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FurniturePiece {
    pub id: String,
    pub name: String,
    pub category: String,
    pub style: String,
    pub color: String,
    pub position: Position,
    /// Y-axis rotation in degrees.
    #[serde(default)]
    pub rotation: f64,
    pub dimensions: Dimensions,
    #[serde(default)]
    pub model_url: Option<String>,
    #[serde(default)]
    pub price_usd: Option<f64>,
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(default)]
    pub sku: Option<String>,
}

/// A generated furniture layout. This is the design data handed to the
/// renderer and to the procurement agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DesignPlan {
    pub style: String,
    pub furniture: Vec<FurniturePiece>,
    pub layout_notes: String,
    pub color_palette: Vec<String>,
    pub estimated_cost_usd: f64,
}

impl DesignPlan {
    /// Sum of the listed prices; unpriced pieces count as zero.
    pub fn total_price(&self) -> f64 {
        self.furniture.iter().filter_map(|f| f.price_usd).sum()
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct DesignGenerateRequest {
    #[garde(length(min = 1, max = 64))]
    pub room_id: String,

    #[garde(length(min = 1, max = 100))]
    #[serde(default = "default_style")]
    pub style: String,

    #[garde(skip)]
    #[serde(default)]
    pub preferences: Map<String, Value>,
}

fn default_style() -> String {
    "modern".to_string()
}

#[derive(Debug, Serialize)]
pub struct DesignGenerateResponse {
    pub design_id: String,
    pub room_id: String,
    pub style: String,
    pub furniture: Vec<FurniturePiece>,
    pub layout_notes: String,
    pub color_palette: Vec<String>,
    pub estimated_cost_usd: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RenderRequest {
    #[garde(length(min = 1, max = 64))]
    pub design_id: String,
}

/// Body of `POST /api/agent/procure`.
#[derive(Debug, Deserialize, Validate)]
pub struct ProcureRequest {
    #[garde(length(min = 1, max = 64))]
    pub design_id: String,

    #[garde(range(min = 0.0))]
    pub budget_usd: Option<f64>,

    #[garde(skip)]
    #[serde(default)]
    pub preferred_vendors: Vec<String>,
}

/// Everything the procurement agent needs for one run.
#[derive(Debug, Clone)]
pub struct ProcurementRequest {
    pub design: DesignPlan,
    pub budget_usd: Option<f64>,
    pub preferred_vendors: Vec<String>,
}
