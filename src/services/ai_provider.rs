//! AI provider capability set.
//!
//! Handlers and the render queue depend on the narrow capability traits; the
//! concrete provider is chosen once at startup by [`build_provider`].

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use futures::StreamExt;
use garde::Validate;
use image::{ImageFormat, Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::models::design::{DesignPlan, Dimensions, FurniturePiece, Position, ProcurementRequest};
use crate::models::event::AgentEvent;
use crate::models::room::{RoomAnalysis, RoomDimensions};
use crate::services::event_stream::{EventSink, SinkClosed};

#[async_trait]
pub trait RoomAnalyzer: Send + Sync {
    async fn analyze_room(&self, image: &[u8], filename: &str)
        -> Result<RoomAnalysis, ProviderError>;
}

#[async_trait]
pub trait DesignGenerator: Send + Sync {
    async fn generate_design(
        &self,
        analysis: &RoomAnalysis,
        style: &str,
        preferences: &Map<String, Value>,
    ) -> Result<DesignPlan, ProviderError>;
}

#[async_trait]
pub trait DesignRenderer: Send + Sync {
    /// Raw PNG bytes of the rendered design.
    async fn render_design(&self, design: &DesignPlan) -> Result<Vec<u8>, ProviderError>;
}

#[async_trait]
pub trait ProcurementAgent: Send + Sync {
    /// Push procurement events into `sink` until finished.
    ///
    /// Ends with a `summary` event on success. Returning early with
    /// [`ProviderError::SinkClosed`] is expected when the client goes away.
    async fn procure(
        &self,
        request: ProcurementRequest,
        sink: EventSink,
    ) -> Result<(), ProviderError>;
}

/// Everything an interior design backend needs from its AI.
pub trait AiProvider: RoomAnalyzer + DesignGenerator + DesignRenderer + ProcurementAgent {
    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProviderKind {
    Fake,
    Grok,
}

/// Build the provider selected by configuration.
pub fn build_provider(config: &AppConfig) -> Arc<dyn AiProvider> {
    let fake = FakeProvider::new(
        FakeTimings::default().with_render(Duration::from_millis(config.render_delay_ms)),
    );

    match config.ai_provider {
        ProviderKind::Fake => Arc::new(fake),
        ProviderKind::Grok => Arc::new(GrokProvider::new(
            &config.grok_base_url,
            &config.grok_api_key,
            &config.grok_model,
            fake,
        )),
    }
}

// ── Fake provider ────────────────────────────────────────────────────────────

const ROOM_TYPES: &[&str] = &["living_room", "bedroom", "dining_room", "home_office", "kitchen"];
const LIGHTING: &[&str] = &["natural", "artificial", "mixed"];
const FEATURES: &[&str] = &[
    "window",
    "door",
    "hardwood_floor",
    "carpet",
    "fireplace",
    "closet",
    "built-in shelves",
];
const STYLES: &[&str] = &[
    "modern",
    "scandinavian",
    "industrial",
    "bohemian",
    "minimalist",
    "traditional",
];

/// Simulated latencies of the fake provider.
#[derive(Debug, Clone, Copy)]
pub struct FakeTimings {
    pub analyze: Duration,
    pub generate: Duration,
    pub render: Duration,
    pub procure_step: Duration,
}

impl Default for FakeTimings {
    fn default() -> Self {
        Self {
            analyze: Duration::from_millis(1200),
            generate: Duration::from_millis(1500),
            render: Duration::from_millis(3000),
            procure_step: Duration::from_millis(300),
        }
    }
}

impl FakeTimings {
    pub fn instant() -> Self {
        Self {
            analyze: Duration::ZERO,
            generate: Duration::ZERO,
            render: Duration::ZERO,
            procure_step: Duration::ZERO,
        }
    }

    pub fn with_render(mut self, render: Duration) -> Self {
        self.render = render;
        self
    }
}

/// Deterministic provider for local development and demos. Needs no API keys.
#[derive(Debug, Clone, Default)]
pub struct FakeProvider {
    timings: FakeTimings,
}

impl FakeProvider {
    pub fn new(timings: FakeTimings) -> Self {
        Self { timings }
    }
}

async fn pause(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

fn palette_for(style: &str) -> [&'static str; 4] {
    match style {
        "modern" => ["#FFFFFF", "#2C3E50", "#BDC3C7", "#E74C3C"],
        "scandinavian" => ["#F5F5F0", "#8B7355", "#D4C5A9", "#4A4A4A"],
        "industrial" => ["#3D3D3D", "#B87333", "#8B8680", "#F5F5DC"],
        "bohemian" => ["#C19A6B", "#8B4513", "#DEB887", "#6B8E23"],
        "minimalist" => ["#FAFAFA", "#E0E0E0", "#9E9E9E", "#212121"],
        "traditional" => ["#8B4513", "#D2691E", "#F4A460", "#FFFAF0"],
        _ => ["#FFFFFF", "#000000", "#888888", "#CCCCCC"],
    }
}

/// `#RRGGBB` to RGB; anything unparsable becomes mid grey.
fn parse_hex_color(hex: &str) -> Rgb<u8> {
    let digits = hex.trim_start_matches('#');
    if digits.len() != 6 || !digits.is_ascii() {
        return Rgb([0x88, 0x88, 0x88]);
    }
    let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).unwrap_or(0x88);
    Rgb([channel(0), channel(2), channel(4)])
}

fn fill_rect(img: &mut RgbImage, x0: u32, y0: u32, w: u32, h: u32, color: Rgb<u8>) {
    let x1 = (x0 + w).min(img.width());
    let y1 = (y0 + h).min(img.height());
    for y in y0..y1 {
        for x in x0..x1 {
            img.put_pixel(x, y, color);
        }
    }
}

/// Procedural placeholder render: palette background, a header band and one
/// outlined block per furniture piece (at most six).
fn draw_placeholder(design: &DesignPlan) -> Result<Vec<u8>, ProviderError> {
    const WIDTH: u32 = 1024;
    const HEIGHT: u32 = 768;
    let outline = Rgb([0x33, 0x33, 0x33]);

    let palette: Vec<Rgb<u8>> = design
        .color_palette
        .iter()
        .map(|c| parse_hex_color(c))
        .collect();
    let background = palette.first().copied().unwrap_or(Rgb([0xF0, 0xF0, 0xF0]));

    let mut img = RgbImage::from_pixel(WIDTH, HEIGHT, background);
    fill_rect(&mut img, 0, 0, WIDTH, 80, outline);

    for (i, _piece) in design.furniture.iter().take(6).enumerate() {
        let fill = if palette.is_empty() {
            Rgb([0x88, 0x88, 0x88])
        } else {
            palette[i % palette.len()]
        };
        let x0 = 100 + i as u32 * 140;
        let y0 = 300;
        fill_rect(&mut img, x0, y0, 120, 80, outline);
        fill_rect(&mut img, x0 + 2, y0 + 2, 116, 76, fill);
    }

    let mut buf = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img).write_to(&mut buf, ImageFormat::Png)?;
    Ok(buf.into_inner())
}

fn fake_piece(
    name: &str,
    category: &str,
    style: &str,
    color: &str,
    position: Position,
    rotation: f64,
    dimensions: Dimensions,
    price_usd: f64,
    vendor: &str,
    sku_code: &str,
    index: u32,
) -> FurniturePiece {
    let style_code: String = style.chars().take(3).collect::<String>().to_uppercase();
    FurniturePiece {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        category: category.to_string(),
        style: style.to_string(),
        color: color.to_string(),
        position,
        rotation,
        dimensions,
        model_url: None,
        price_usd: Some(price_usd),
        vendor: Some(vendor.to_string()),
        sku: Some(format!("{sku_code}-{style_code}-{index:03}")),
    }
}

#[async_trait]
impl RoomAnalyzer for FakeProvider {
    async fn analyze_room(
        &self,
        image: &[u8],
        _filename: &str,
    ) -> Result<RoomAnalysis, ProviderError> {
        pause(self.timings.analyze).await;

        let mut rng = StdRng::seed_from_u64(image.len() as u64);
        let room_type = ROOM_TYPES.choose(&mut rng).copied().unwrap_or("living_room");
        let dimensions = RoomDimensions {
            width: round_to(rng.random_range(3.0..6.0), 1),
            height: round_to(rng.random_range(2.4..3.5), 1),
            depth: round_to(rng.random_range(4.0..8.0), 1),
        };
        let lighting = LIGHTING.choose(&mut rng).copied().unwrap_or("natural");
        let feature_count = rng.random_range(2..=4);
        let existing_features = FEATURES
            .choose_multiple(&mut rng, feature_count)
            .map(|s| s.to_string())
            .collect();
        let style_hints = STYLES
            .choose_multiple(&mut rng, 2)
            .map(|s| s.to_string())
            .collect();

        Ok(RoomAnalysis {
            room_type: room_type.to_string(),
            dimensions,
            lighting: lighting.to_string(),
            existing_features,
            style_hints,
            confidence: round_to(rng.random_range(0.82..0.99), 2),
        })
    }
}

#[async_trait]
impl DesignGenerator for FakeProvider {
    async fn generate_design(
        &self,
        analysis: &RoomAnalysis,
        style: &str,
        _preferences: &Map<String, Value>,
    ) -> Result<DesignPlan, ProviderError> {
        pause(self.timings.generate).await;

        let colors = palette_for(style);
        let w = analysis.dimensions.width;
        let d = analysis.dimensions.depth;

        let furniture = vec![
            fake_piece(
                "Sofa",
                "seating",
                style,
                colors[0],
                Position { x: 0.0, y: 0.0, z: 1.0 },
                0.0,
                Dimensions { w: 2.2, h: 0.85, d: 0.95 },
                899.0,
                "FurnitureCo",
                "SF",
                1,
            ),
            fake_piece(
                "Coffee Table",
                "table",
                style,
                colors[1],
                Position { x: 0.0, y: 0.0, z: 2.5 },
                0.0,
                Dimensions { w: 1.2, h: 0.45, d: 0.6 },
                299.0,
                "FurnitureCo",
                "CT",
                2,
            ),
            fake_piece(
                "Floor Lamp",
                "lighting",
                style,
                colors[2],
                Position { x: w / 2.0 - 0.5, y: 0.0, z: 0.8 },
                0.0,
                Dimensions { w: 0.35, h: 1.8, d: 0.35 },
                149.0,
                "LightHouse",
                "FL",
                3,
            ),
            fake_piece(
                "Bookshelf",
                "storage",
                style,
                colors[3],
                Position { x: -(w / 2.0 - 0.2), y: 0.0, z: d / 2.0 - 0.2 },
                90.0,
                Dimensions { w: 1.0, h: 2.0, d: 0.3 },
                399.0,
                "WoodWorks",
                "BS",
                4,
            ),
        ];

        let mut plan = DesignPlan {
            style: style.to_string(),
            furniture,
            layout_notes: format!(
                "Furniture arranged for a {} ({}m x {}m). Sofa faces the focal wall with coffee \
                 table centred. Floor lamp provides ambient lighting near seating area.",
                analysis.room_type.replace('_', " "),
                w,
                d
            ),
            color_palette: colors.iter().map(|c| c.to_string()).collect(),
            estimated_cost_usd: 0.0,
        };
        plan.estimated_cost_usd = round_to(plan.total_price(), 2);
        Ok(plan)
    }
}

#[async_trait]
impl DesignRenderer for FakeProvider {
    async fn render_design(&self, design: &DesignPlan) -> Result<Vec<u8>, ProviderError> {
        pause(self.timings.render).await;
        let design = design.clone();
        tokio::task::spawn_blocking(move || draw_placeholder(&design)).await?
    }
}

#[async_trait]
impl ProcurementAgent for FakeProvider {
    async fn procure(
        &self,
        request: ProcurementRequest,
        sink: EventSink,
    ) -> Result<(), ProviderError> {
        let furniture = &request.design.furniture;
        let budget = request
            .budget_usd
            .map(|b| format!("${b}"))
            .unwrap_or_else(|| "$∞".to_string());

        sink.emit(AgentEvent::thought(format!(
            "Analysing {} furniture pieces against budget {} USD",
            furniture.len(),
            budget
        )))
        .await?;
        pause(self.timings.procure_step).await;

        for piece in furniture {
            let vendor = piece.vendor.as_deref().unwrap_or("any vendor");
            sink.emit(AgentEvent::action(format!(
                "Searching '{}' at {}",
                piece.name, vendor
            )))
            .await?;
            pause(self.timings.procure_step).await;

            let sku = piece.sku.as_deref().unwrap_or("unknown");
            sink.emit(AgentEvent::result(json!({
                "furniture_id": piece.id,
                "name": piece.name,
                "sku": piece.sku,
                "price_usd": piece.price_usd,
                "in_stock": true,
                "buy_url": format!("https://example.com/buy/{sku}"),
            })))
            .await?;
            pause(self.timings.procure_step).await;
        }

        sink.emit(AgentEvent::summary(procurement_summary(&request)))
            .await?;
        Ok(())
    }
}

impl AiProvider for FakeProvider {
    fn name(&self) -> &'static str {
        "fake"
    }
}

fn procurement_summary(request: &ProcurementRequest) -> Value {
    let total = request.design.total_price();
    let within_budget = request.budget_usd.map_or(true, |budget| total <= budget);
    json!({
        "total_usd": round_to(total, 2),
        "within_budget": within_budget,
        "items": request.design.furniture.len(),
    })
}

// ── Grok (xAI) provider ──────────────────────────────────────────────────────

/// Grok over the OpenAI-compatible chat completions API.
///
/// Grok has no image generation, so rendering delegates to the fake renderer.
pub struct GrokProvider {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
    renderer: FakeProvider,
}

#[derive(Deserialize)]
struct ChatCompletion {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatChunk {
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Default, Deserialize)]
struct ChunkDelta {
    content: Option<String>,
}

/// One decoded line of a streamed chat completion.
#[derive(Debug, PartialEq)]
enum StreamLine {
    Delta(String),
    Finished,
    Ignored,
}

fn parse_stream_line(line: &str) -> Result<StreamLine, ProviderError> {
    let Some(payload) = line.strip_prefix("data:") else {
        return Ok(StreamLine::Ignored);
    };
    let payload = payload.trim();
    if payload == "[DONE]" {
        return Ok(StreamLine::Finished);
    }
    if payload.is_empty() {
        return Ok(StreamLine::Ignored);
    }
    let chunk: ChatChunk = serde_json::from_str(payload)?;
    let delta = chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .unwrap_or_default();
    if delta.is_empty() {
        Ok(StreamLine::Ignored)
    } else {
        Ok(StreamLine::Delta(delta))
    }
}

/// Split a byte stream into complete `\n`-terminated lines. Partial lines
/// (including split UTF-8 sequences) stay buffered until completed.
#[derive(Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            lines.push(line.trim_end_matches(['\r', '\n']).to_string());
        }
        lines
    }
}

fn tail_chars(text: &str, max: usize) -> &str {
    let count = text.chars().count();
    if count <= max {
        return text;
    }
    text.char_indices()
        .nth(count - max)
        .map(|(i, _)| &text[i..])
        .unwrap_or(text)
}

fn mime_for_filename(filename: &str) -> &'static str {
    let lower = filename.to_ascii_lowercase();
    if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".webp") {
        "image/webp"
    } else {
        "image/jpeg"
    }
}

impl GrokProvider {
    pub fn new(base_url: &str, api_key: &str, model: &str, renderer: FakeProvider) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            renderer,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn complete_json(&self, body: Value) -> Result<String, ProviderError> {
        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let completion: ChatCompletion = response.json().await?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(ProviderError::EmptyCompletion)
    }
}

#[async_trait]
impl RoomAnalyzer for GrokProvider {
    async fn analyze_room(
        &self,
        image: &[u8],
        filename: &str,
    ) -> Result<RoomAnalysis, ProviderError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(image);
        let data_url = format!("data:{};base64,{}", mime_for_filename(filename), encoded);

        let prompt = concat!(
            "You are an expert interior designer AI. Analyze this room photograph ",
            "and return ONLY a valid JSON object with this exact schema: ",
            r#"{"room_type": string, "dimensions": {"width": number, "height": number, "depth": number}, "#,
            r#""lighting": string, "existing_features": [string], "style_hints": [string], "#,
            r#""confidence": number between 0.0 and 1.0}. "#,
            "All measurements in metres. Return raw JSON only."
        );

        let raw = self
            .complete_json(json!({
                "model": self.model,
                "messages": [{
                    "role": "user",
                    "content": [
                        {"type": "text", "text": prompt},
                        {"type": "image_url", "image_url": {"url": data_url}},
                    ],
                }],
                "response_format": {"type": "json_object"},
                "max_tokens": 1024,
                "temperature": 0.2,
            }))
            .await?;
        tracing::debug!(response = %raw, "Grok room analysis response");

        let analysis: RoomAnalysis = serde_json::from_str(&raw)?;
        analysis
            .validate()
            .map_err(|report| ProviderError::Invalid(report.to_string()))?;
        Ok(analysis)
    }
}

#[async_trait]
impl DesignGenerator for GrokProvider {
    async fn generate_design(
        &self,
        analysis: &RoomAnalysis,
        style: &str,
        preferences: &Map<String, Value>,
    ) -> Result<DesignPlan, ProviderError> {
        let prompt = format!(
            "You are an expert interior designer AI.\n\
             Room analysis: {}\n\
             Style requested: {}\n\
             User preferences: {}\n\n\
             Return ONLY a valid JSON object with keys style, furniture, layout_notes, \
             color_palette (hex strings) and estimated_cost_usd. Each furniture item has \
             id, name, category, style, color (hex), position {{x,y,z}}, rotation, \
             dimensions {{w,h,d}}, model_url (null), price_usd, vendor and sku. \
             Return 4-6 furniture items. All dimensions in metres. Return raw JSON only.",
            serde_json::to_string(analysis)?,
            style,
            Value::Object(preferences.clone()),
        );

        let raw = self
            .complete_json(json!({
                "model": self.model,
                "messages": [{"role": "user", "content": prompt}],
                "response_format": {"type": "json_object"},
                "max_tokens": 2048,
                "temperature": 0.4,
            }))
            .await?;
        tracing::debug!(response = %raw, "Grok design response");

        let mut plan: DesignPlan = serde_json::from_str(&raw)?;
        for piece in plan.furniture.iter_mut().filter(|p| p.id.is_empty()) {
            piece.id = Uuid::new_v4().to_string();
        }
        if plan.style.is_empty() {
            plan.style = style.to_string();
        }
        Ok(plan)
    }
}

#[async_trait]
impl DesignRenderer for GrokProvider {
    async fn render_design(&self, design: &DesignPlan) -> Result<Vec<u8>, ProviderError> {
        tracing::info!("Grok has no image generation, delegating render to placeholder renderer");
        self.renderer.render_design(design).await
    }
}

#[async_trait]
impl ProcurementAgent for GrokProvider {
    async fn procure(
        &self,
        request: ProcurementRequest,
        sink: EventSink,
    ) -> Result<(), ProviderError> {
        let furniture = &request.design.furniture;
        let budget = request
            .budget_usd
            .map(|b| format!("${b}"))
            .unwrap_or_else(|| "no fixed budget".to_string());
        let vendors = if request.preferred_vendors.is_empty() {
            "any".to_string()
        } else {
            request.preferred_vendors.join(", ")
        };

        sink.emit(AgentEvent::thought(format!(
            "Analysing {} items with budget {}",
            furniture.len(),
            budget
        )))
        .await?;

        let prompt = format!(
            "You are an expert procurement specialist AI.\n\
             Interior design has {} furniture items:\n{}\n\n\
             Budget: {}\nPreferred vendors: {}\n\n\
             For each item: 1. Search for the best real purchase source \
             2. Suggest alternatives if over budget 3. Provide a realistic price estimate.\n\n\
             Stream your reasoning naturally, think out loud, then give results.",
            furniture.len(),
            serde_json::to_string_pretty(furniture)?,
            budget,
            vendors,
        );

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "messages": [{"role": "user", "content": prompt}],
                "stream": true,
                "max_tokens": 2048,
                "temperature": 0.5,
            }))
            .send()
            .await?
            .error_for_status()?;

        let mut body = response.bytes_stream();
        let mut lines = LineBuffer::default();
        let mut transcript = String::new();

        'read: while let Some(chunk) = body.next().await {
            for line in lines.push(&chunk?) {
                match parse_stream_line(&line)? {
                    StreamLine::Delta(delta) => {
                        transcript.push_str(&delta);
                        sink.emit(AgentEvent::thought(delta)).await?;
                    }
                    StreamLine::Finished => break 'read,
                    StreamLine::Ignored => {}
                }
            }
        }

        let mut summary = procurement_summary(&request);
        summary["grok_analysis"] = Value::String(tail_chars(&transcript, 500).to_string());
        sink.emit(AgentEvent::summary(summary)).await?;
        Ok(())
    }
}

impl AiProvider for GrokProvider {
    fn name(&self) -> &'static str {
        "grok"
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to parse provider response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Provider returned an empty completion")]
    EmptyCompletion,

    #[error("Provider output failed validation: {0}")]
    Invalid(String),

    #[error("Image encoding failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("Provider task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error(transparent)]
    SinkClosed(#[from] SinkClosed),

    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::event::AgentEventKind;
    use crate::services::event_stream::EventPipeline;

    fn instant() -> FakeProvider {
        FakeProvider::new(FakeTimings::instant())
    }

    async fn sample_plan(provider: &FakeProvider) -> DesignPlan {
        let analysis = provider.analyze_room(b"room-photo", "room.jpg").await.unwrap();
        provider
            .generate_design(&analysis, "scandinavian", &Map::new())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_fake_analysis_is_deterministic_and_valid() {
        let provider = instant();
        let a = provider.analyze_room(&[0u8; 512], "a.jpg").await.unwrap();
        let b = provider.analyze_room(&[1u8; 512], "b.png").await.unwrap();
        assert_eq!(a, b);
        assert!(a.validate().is_ok());
        assert!((3.0..=6.0).contains(&a.dimensions.width));
        assert!((2..=4).contains(&a.existing_features.len()));
        assert_eq!(a.style_hints.len(), 2);
    }

    #[tokio::test]
    async fn test_fake_design_uses_style_palette() {
        let provider = instant();
        let plan = sample_plan(&provider).await;
        assert_eq!(plan.style, "scandinavian");
        assert_eq!(plan.furniture.len(), 4);
        assert_eq!(plan.color_palette[0], "#F5F5F0");
        assert_eq!(plan.estimated_cost_usd, 1746.0);
        assert_eq!(plan.furniture[0].sku.as_deref(), Some("SF-SCA-001"));
    }

    #[tokio::test]
    async fn test_fake_render_produces_png() {
        let provider = instant();
        let plan = sample_plan(&provider).await;
        let bytes = provider.render_design(&plan).await.unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Png);

        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (1024, 768));
    }

    #[tokio::test]
    async fn test_fake_render_handles_empty_design() {
        let bytes = instant().render_design(&DesignPlan::default()).await.unwrap();
        assert!(!bytes.is_empty());
    }

    #[tokio::test]
    async fn test_fake_procurement_event_sequence() {
        let provider = Arc::new(instant());
        let plan = sample_plan(&provider).await;
        let request = ProcurementRequest {
            design: plan,
            budget_usd: Some(1000.0),
            preferred_vendors: vec![],
        };

        let agent = Arc::clone(&provider);
        let events: Vec<AgentEvent> = EventPipeline::default()
            .run(move |sink| async move { agent.procure(request, sink).await })
            .collect()
            .await;

        let kinds: Vec<AgentEventKind> = events.iter().map(|e| e.kind).collect();
        assert_eq!(kinds.first(), Some(&AgentEventKind::Thought));
        assert_eq!(
            kinds.iter().filter(|k| **k == AgentEventKind::Result).count(),
            4
        );
        assert_eq!(kinds[kinds.len() - 2], AgentEventKind::Summary);
        assert_eq!(kinds[kinds.len() - 1], AgentEventKind::Done);

        let summary = &events[events.len() - 2].data;
        assert_eq!(summary["items"], 4);
        assert_eq!(summary["within_budget"], false);
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#2C3E50"), Rgb([0x2C, 0x3E, 0x50]));
        assert_eq!(parse_hex_color("nope"), Rgb([0x88, 0x88, 0x88]));
    }

    #[test]
    fn test_stream_lines() {
        let line = r#"data: {"choices":[{"delta":{"content":"Sofa "}}]}"#;
        assert_eq!(
            parse_stream_line(line).unwrap(),
            StreamLine::Delta("Sofa ".to_string())
        );
        assert_eq!(parse_stream_line("data: [DONE]").unwrap(), StreamLine::Finished);
        assert_eq!(parse_stream_line(": keepalive").unwrap(), StreamLine::Ignored);
        assert_eq!(
            parse_stream_line(r#"data: {"choices":[{"delta":{}}]}"#).unwrap(),
            StreamLine::Ignored
        );
        assert!(parse_stream_line("data: {broken").is_err());
    }

    #[test]
    fn test_line_buffer_keeps_partial_lines() {
        let mut buf = LineBuffer::default();
        assert!(buf.push(b"data: {\"a\"").is_empty());
        let lines = buf.push(b":1}\r\n\ndata: [DONE]\n");
        assert_eq!(lines, vec!["data: {\"a\":1}", "", "data: [DONE]"]);

        let euro = "€".as_bytes();
        assert!(buf.push(&euro[..1]).is_empty());
        assert_eq!(buf.push(&[&euro[1..], &b"\n"[..]].concat()), vec!["€"]);
    }

    #[test]
    fn test_tail_chars() {
        assert_eq!(tail_chars("abc", 5), "abc");
        assert_eq!(tail_chars("abcdef", 2), "ef");
        assert_eq!(tail_chars("ééé", 1), "é");
    }

    #[test]
    fn test_mime_for_filename() {
        assert_eq!(mime_for_filename("ROOM.PNG"), "image/png");
        assert_eq!(mime_for_filename("x.webp"), "image/webp");
        assert_eq!(mime_for_filename("upload"), "image/jpeg");
    }
}
