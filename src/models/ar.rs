use serde::Serialize;

use super::design::DesignPlan;

/// Default AR model served from the static directory.
pub const DEFAULT_MODEL_PATH: &str = "/static/models/room_default.glb";

#[derive(Debug, Serialize, PartialEq)]
pub struct ArPosition {
    pub furniture_id: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub rotation_y: f64,
}

#[derive(Debug, Serialize)]
pub struct ArSessionResponse {
    pub design_id: String,
    pub model_url: String,
    pub positions: Vec<ArPosition>,
    pub scale_factor: f64,
    pub ar_modes: String,
}

impl ArSessionResponse {
    pub fn from_plan(design_id: String, plan: &DesignPlan, public_url: &str) -> Self {
        let positions = plan
            .furniture
            .iter()
            .map(|f| ArPosition {
                furniture_id: f.id.clone(),
                x: f.position.x,
                y: f.position.y,
                z: f.position.z,
                rotation_y: f.rotation,
            })
            .collect();

        Self {
            design_id,
            model_url: format!("{}{}", public_url.trim_end_matches('/'), DEFAULT_MODEL_PATH),
            positions,
            scale_factor: 1.0,
            ar_modes: "webxr scene-viewer quick-look".to_string(),
        }
    }
}
