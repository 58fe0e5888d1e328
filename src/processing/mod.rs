//! Processing module for turning motion windows into target predictions
//!
//! This module contains the target scoring and normalization algorithms.

pub mod prediction;
pub mod targets;

pub use prediction::{
    amplify_and_normalize, Prediction, PredictionEngine, PredictionError, TargetProbability,
    TargetScore,
};
pub use targets::{Rect, Target, Vec2};
