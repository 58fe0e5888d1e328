//! Prediction pipeline
//!
//! Owns the active/inactive lifecycle and the candidate targets, routes full
//! windows from the sequence buffer through the prediction engine and
//! delivers results to registered listeners.

pub mod coordinator;
pub mod error;

pub use coordinator::{Pipeline, PipelineBuilder, PipelineStatus};
pub use error::{PipelineError, PipelineResult};
