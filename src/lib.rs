//! Cursor intent prediction
//!
//! Turns a stream of raw pointer positions into fixed-length motion windows
//! and predicts which of several candidate targets the pointer is heading
//! toward, as a probability distribution over targets.
//!
//! ```text
//! accept(x, y, t) -> SequenceBuffer -> full window -> PredictionEngine
//!                                                   -> Pipeline -> listeners
//! ```

pub mod capture;
pub mod config;
pub mod events;
pub mod logging;
pub mod pipeline;
pub mod processing;

pub use capture::input::{RecordingSnapshot, Sample, SequenceBuffer, Viewport};
pub use config::{BufferConfig, EngineConfig, PredictorConfig};
pub use events::{Subscription, SubscriptionId};
pub use pipeline::{Pipeline, PipelineBuilder, PipelineError, PipelineStatus};
pub use processing::{Prediction, PredictionEngine, Rect, Target};
