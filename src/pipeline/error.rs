//! Pipeline errors
//!
//! Only misuse of the public contract surfaces as an error. Failures inside
//! the event-driven cycle (prediction, listener dispatch) are logged and the
//! cycle is skipped.

use crate::config::ConfigError;
use crate::processing::prediction::PredictionError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Missing collaborator: {0}")]
    MissingCollaborator(&'static str),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Prediction error: {0}")]
    Prediction(#[from] PredictionError),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
