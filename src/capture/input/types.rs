use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Viewport dimensions in pixels, used to normalize raw pointer coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn is_valid(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1920.0, 1080.0)
    }
}

/// One accepted pointer reading.
///
/// Position is normalized to the viewport, velocity is in normalized units per
/// millisecond and `dt` is the milliseconds elapsed since the previous accepted sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub dt: f64,
}

impl Sample {
    pub fn speed(&self) -> f64 {
        (self.vx * self.vx + self.vy * self.vy).sqrt()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedSample {
    #[serde(flatten)]
    pub sample: Sample,
    pub raw_x: f64,
    pub raw_y: f64,
    /// Wall-clock time in unix milliseconds
    pub timestamp: i64,
    /// Host-supplied event time in milliseconds
    pub host_time_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickRecord {
    pub x: f64,
    pub y: f64,
    pub raw_x: f64,
    pub raw_y: f64,
    /// Wall-clock time in unix milliseconds
    pub timestamp: i64,
    /// Host-supplied event time in milliseconds
    pub host_time_ms: f64,
    pub target: Option<String>,
    pub target_id: Option<String>,
}

/// Entry in the recording buffer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RecordingEntry {
    Frame(RecordedSample),
    Click(ClickRecord),
}

impl RecordingEntry {
    pub fn is_click(&self) -> bool {
        matches!(self, RecordingEntry::Click(_))
    }
}

/// Copy of the recording buffer handed to external exporters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingSnapshot {
    pub session_id: Option<Uuid>,
    pub frame_count: usize,
    pub click_count: usize,
    pub viewport: Viewport,
    pub capacity: usize,
    pub sampling_interval_ms: f64,
    /// Unix milliseconds at export time
    pub exported_at: i64,
    pub entries: Vec<RecordingEntry>,
}

impl RecordingSnapshot {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn write_json(&self, path: &std::path::Path) -> std::io::Result<()> {
        let data = serde_json::to_vec_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, data)?;

        tracing::info!(
            "Wrote recording snapshot ({} frames, {} clicks) to {}",
            self.frame_count,
            self.click_count,
            path.display()
        );
        Ok(())
    }
}
