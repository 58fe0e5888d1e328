//! Pointer motion buffering
//!
//! Normalizes raw pointer positions into velocity-annotated samples, keeps
//! the sliding window used for prediction and optionally records every
//! sample and click for later export.

pub mod buffer;
pub mod types;

pub use buffer::SequenceBuffer;
pub use types::{ClickRecord, RecordedSample, RecordingEntry, RecordingSnapshot, Sample, Viewport};
