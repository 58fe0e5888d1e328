//! Target prediction from a motion window
//!
//! Scores every candidate target against the most recent sample of a window
//! and turns the scores into a probability distribution.
//!
//! Each target gets a raw score combining two signals:
//! - distance: `exp(-distance / distance_scale)` from cursor to target center
//! - trajectory: cosine similarity between the cursor velocity and the
//!   direction to the target, mapped from `[-1, 1]` to `[0, 1]`
//!
//! When the cursor is nearly still the trajectory signal is noise, so below
//! the motion threshold only the distance term counts. Raw scores are raised
//! to a fixed power before normalizing, which sharpens the distribution
//! toward the best candidate.

use crate::capture::input::types::{Sample, Viewport};
use crate::config::{ConfigResult, EngineConfig};
use crate::processing::targets::{Target, Vec2};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Pixel distance at which the distance score decays to 1/e.
/// Tuned calibration value.
pub const DISTANCE_SCALE_PX: f64 = 150.0;

/// Power applied to raw scores before normalizing. Tuned calibration value.
pub const AMPLIFICATION_EXPONENT: i32 = 4;

/// Pixel speed (px/ms) above which the trajectory term is trusted
pub const MOTION_GATE_THRESHOLD: f64 = 0.05;

pub const DEFAULT_DISTANCE_WEIGHT: f64 = 0.7;
pub const DEFAULT_TRAJECTORY_WEIGHT: f64 = 0.3;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PredictionError {
    #[error("Invalid viewport: {width}x{height}")]
    InvalidViewport { width: f64, height: f64 },

    #[error("Non-finite score for target {target_id}")]
    NonFiniteScore { target_id: String },

    #[error("Duplicate target id: {0}")]
    DuplicateTargetId(String),

    #[error("Amplified scores do not sum to a finite value")]
    NonFiniteSum,
}

pub type PredictionResult<T> = Result<T, PredictionError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetProbability {
    pub id: String,
    pub p: f64,
}

/// Probability distribution over targets plus the top choice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub probabilities: Vec<TargetProbability>,
    pub predicted_target_id: Option<String>,
    pub confidence: f64,
}

impl Prediction {
    pub fn empty() -> Self {
        Self {
            probabilities: Vec::new(),
            predicted_target_id: None,
            confidence: 0.0,
        }
    }

    pub fn probability_of(&self, id: &str) -> Option<f64> {
        self.probabilities
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| entry.p)
    }

    fn from_distribution(targets: &[Target], probabilities: Vec<f64>) -> Self {
        let mut best: Option<usize> = None;
        for (index, p) in probabilities.iter().enumerate() {
            // Strict comparison keeps the first target on ties
            if best.map_or(true, |b| *p > probabilities[b]) {
                best = Some(index);
            }
        }

        let probabilities: Vec<TargetProbability> = targets
            .iter()
            .zip(probabilities)
            .map(|(target, p)| TargetProbability {
                id: target.id.clone(),
                p,
            })
            .collect();

        match best {
            Some(index) => Self {
                predicted_target_id: Some(probabilities[index].id.clone()),
                confidence: probabilities[index].p,
                probabilities,
            },
            None => Self::empty(),
        }
    }
}

/// Breakdown of one target's raw score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetScore {
    pub distance: f64,
    pub distance_score: f64,
    pub trajectory_score: f64,
    pub distance_weight: f64,
    pub trajectory_weight: f64,
    /// Weighted combination, before amplification
    pub raw: f64,
}

#[derive(Debug, Clone)]
pub struct PredictionEngine {
    config: EngineConfig,
    viewport: Viewport,
}

impl PredictionEngine {
    pub fn new(config: EngineConfig, viewport: Viewport) -> Self {
        Self { config, viewport }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn on_viewport_change(&mut self, width: f64, height: f64) {
        self.viewport = Viewport::new(width, height);
    }

    /// Replace the scoring weights. Out-of-range weights leave the engine unchanged.
    pub fn set_weights(
        &mut self,
        distance_weight: f64,
        trajectory_weight: f64,
    ) -> ConfigResult<()> {
        let candidate = EngineConfig {
            distance_weight,
            trajectory_weight,
            ..self.config.clone()
        };
        candidate.validate()?;

        self.config = candidate;
        tracing::debug!(
            distance_weight,
            trajectory_weight,
            "Updated scoring weights"
        );
        Ok(())
    }

    /// Predict which target the pointer is heading toward
    pub fn predict(&self, sequence: &[Sample], targets: &[Target]) -> PredictionResult<Prediction> {
        let Some(latest) = sequence.last() else {
            return Ok(Self::empty_prediction(targets));
        };
        if targets.is_empty() {
            return Ok(Prediction::empty());
        }

        if !self.viewport.is_valid() {
            return Err(PredictionError::InvalidViewport {
                width: self.viewport.width,
                height: self.viewport.height,
            });
        }

        let mut seen = HashSet::with_capacity(targets.len());
        for target in targets {
            if !seen.insert(target.id.as_str()) {
                return Err(PredictionError::DuplicateTargetId(target.id.clone()));
            }
        }

        let Viewport { width, height } = self.viewport;
        let cursor = Vec2::new(latest.x * width, latest.y * height);
        let velocity = Vec2::new(latest.vx * width, latest.vy * height);

        let mut raw_scores = Vec::with_capacity(targets.len());
        for target in targets {
            let score = self.score_target(cursor, velocity, target);
            if !score.raw.is_finite() {
                return Err(PredictionError::NonFiniteScore {
                    target_id: target.id.clone(),
                });
            }
            raw_scores.push(score.raw);
        }

        let probabilities =
            amplify_and_normalize(&raw_scores, self.config.amplification_exponent)?;
        Ok(Prediction::from_distribution(targets, probabilities))
    }

    /// Score one target for a cursor position and velocity in pixel units
    pub fn score_target(&self, cursor: Vec2, velocity: Vec2, target: &Target) -> TargetScore {
        let center = target.rect.center();
        let offset = center - cursor;
        let distance = offset.length();
        let distance_score = (-distance / self.config.distance_scale).exp();

        let direction = offset.normalized();
        let heading = velocity.normalized();
        let trajectory_score = (heading.dot(direction) + 1.0) / 2.0;

        let moving = velocity.length() > self.config.motion_threshold;
        let (distance_weight, trajectory_weight) = if moving {
            (self.config.distance_weight, self.config.trajectory_weight)
        } else {
            (1.0, 0.0)
        };

        TargetScore {
            distance,
            distance_score,
            trajectory_score,
            distance_weight,
            trajectory_weight,
            raw: distance_score * distance_weight + trajectory_score * trajectory_weight,
        }
    }

    /// Uniform distribution used when there is no motion to go on
    pub fn empty_prediction(targets: &[Target]) -> Prediction {
        let Some(first) = targets.first() else {
            return Prediction::empty();
        };

        let p = 1.0 / targets.len() as f64;
        Prediction {
            probabilities: targets
                .iter()
                .map(|target| TargetProbability {
                    id: target.id.clone(),
                    p,
                })
                .collect(),
            predicted_target_id: Some(first.id.clone()),
            confidence: p,
        }
    }
}

impl Default for PredictionEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default(), Viewport::default())
    }
}

/// Raise scores to `exponent` and normalize them to sum to 1.
///
/// Falls back to a uniform distribution when every amplified score is zero.
/// Fails when the amplified scores overflow, since the result would not be a
/// distribution.
pub fn amplify_and_normalize(raw_scores: &[f64], exponent: i32) -> PredictionResult<Vec<f64>> {
    if raw_scores.is_empty() {
        return Ok(Vec::new());
    }

    let amplified: Vec<f64> = raw_scores
        .iter()
        .map(|score| score.powi(exponent))
        .collect();
    let sum: f64 = amplified.iter().sum();

    if !sum.is_finite() {
        return Err(PredictionError::NonFiniteSum);
    }
    if sum == 0.0 {
        let uniform = 1.0 / raw_scores.len() as f64;
        return Ok(vec![uniform; raw_scores.len()]);
    }

    Ok(amplified.into_iter().map(|score| score / sum).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::targets::Rect;

    fn engine_1000() -> PredictionEngine {
        PredictionEngine::new(EngineConfig::default(), Viewport::new(1000.0, 1000.0))
    }

    fn still(x: f64, y: f64) -> Sample {
        Sample {
            x,
            y,
            vx: 0.0,
            vy: 0.0,
            dt: 16.0,
        }
    }

    fn two_targets() -> Vec<Target> {
        vec![
            Target::new("a", Rect::point(500.0, 500.0)),
            Target::new("b", Rect::point(900.0, 900.0)),
        ]
    }

    fn assert_sums_to_one(prediction: &Prediction) {
        let sum: f64 = prediction.probabilities.iter().map(|entry| entry.p).sum();
        assert!((sum - 1.0).abs() < 1e-9, "Probabilities sum to {}", sum);
    }

    #[test]
    fn test_stationary_cursor_on_target() {
        let engine = engine_1000();
        let prediction = engine.predict(&[still(0.5, 0.5)], &two_targets()).unwrap();

        assert_sums_to_one(&prediction);
        assert_eq!(prediction.predicted_target_id.as_deref(), Some("a"));
        let p_a = prediction.probability_of("a").unwrap();
        assert!(p_a > 0.999, "p(a) = {}", p_a);
        assert_eq!(prediction.confidence, p_a);
    }

    #[test]
    fn test_distance_score_decay() {
        let engine = engine_1000();
        let targets = two_targets();
        let cursor = Vec2::new(500.0, 500.0);

        let a = engine.score_target(cursor, Vec2::ZERO, &targets[0]);
        let b = engine.score_target(cursor, Vec2::ZERO, &targets[1]);

        assert_eq!(a.distance_score, 1.0);
        assert!((b.distance - 565.685).abs() < 1e-3);
        let expected = (-565.685_f64 / 150.0).exp();
        assert!((b.distance_score - expected).abs() < 1e-6);
    }

    #[test]
    fn test_gating_ignores_trajectory_weight_when_still() {
        let targets = two_targets();
        let cursor = Vec2::new(600.0, 650.0);
        let velocity = Vec2::new(0.01, 0.01);

        let light = PredictionEngine::new(
            EngineConfig {
                trajectory_weight: 0.1,
                ..EngineConfig::default()
            },
            Viewport::new(1000.0, 1000.0),
        );
        let heavy = PredictionEngine::new(
            EngineConfig {
                trajectory_weight: 0.9,
                ..EngineConfig::default()
            },
            Viewport::new(1000.0, 1000.0),
        );

        for target in &targets {
            let l = light.score_target(cursor, velocity, target);
            let h = heavy.score_target(cursor, velocity, target);
            assert_eq!(l.raw, h.raw);
            assert_eq!(l.trajectory_weight, 0.0);
            assert_eq!(l.distance_weight, 1.0);
            assert_eq!(l.raw, l.distance_score);
        }
    }

    #[test]
    fn test_trajectory_favors_heading() {
        let engine = engine_1000();
        let targets = vec![
            Target::new("left", Rect::from_ltwh(100.0, 480.0, 40.0, 40.0)),
            Target::new("right", Rect::from_ltwh(860.0, 480.0, 40.0, 40.0)),
        ];
        // 0.0005 normalized/ms on a 1000px viewport is 0.5 px/ms, moving right
        let moving_right = Sample {
            x: 0.5,
            y: 0.5,
            vx: 0.0005,
            vy: 0.0,
            dt: 16.0,
        };

        let prediction = engine.predict(&[moving_right], &targets).unwrap();
        assert_sums_to_one(&prediction);
        assert_eq!(prediction.predicted_target_id.as_deref(), Some("right"));

        let cursor = Vec2::new(500.0, 500.0);
        let velocity = Vec2::new(0.5, 0.0);
        let toward = engine.score_target(cursor, velocity, &targets[1]);
        let away = engine.score_target(cursor, velocity, &targets[0]);
        assert!((toward.trajectory_score - 1.0).abs() < 1e-12);
        assert!(away.trajectory_score.abs() < 1e-12);
        assert_eq!(toward.trajectory_weight, 0.3);
    }

    #[test]
    fn test_cursor_at_target_center_has_neutral_trajectory() {
        let engine = engine_1000();
        let target = Target::new("here", Rect::point(500.0, 500.0));
        let cursor = Vec2::new(500.0, 500.0);
        let score = engine.score_target(cursor, Vec2::new(1.0, 0.0), &target);

        assert_eq!(score.trajectory_score, 0.5);
        assert!(score.raw.is_finite());
    }

    #[test]
    fn test_uses_latest_sample() {
        let engine = engine_1000();
        let sequence = vec![still(0.9, 0.9), still(0.5, 0.5)];
        let prediction = engine.predict(&sequence, &two_targets()).unwrap();
        assert_eq!(prediction.predicted_target_id.as_deref(), Some("a"));
    }

    #[test]
    fn test_empty_targets() {
        let engine = engine_1000();
        let sample = [still(0.5, 0.5)];
        assert_eq!(engine.predict(&sample, &[]).unwrap(), Prediction::empty());
        assert_eq!(engine.predict(&[], &[]).unwrap(), Prediction::empty());
    }

    #[test]
    fn test_empty_sequence_is_uniform() {
        let engine = engine_1000();
        let targets = vec![
            Target::new("x", Rect::point(0.0, 0.0)),
            Target::new("y", Rect::point(10.0, 0.0)),
            Target::new("z", Rect::point(20.0, 0.0)),
            Target::new("w", Rect::point(30.0, 0.0)),
        ];

        let prediction = engine.predict(&[], &targets).unwrap();
        assert_sums_to_one(&prediction);
        assert!(prediction.probabilities.iter().all(|entry| entry.p == 0.25));
        assert_eq!(prediction.predicted_target_id.as_deref(), Some("x"));
        assert_eq!(prediction.confidence, 0.25);
    }

    #[test]
    fn test_ties_pick_first_target() {
        let engine = engine_1000();
        let targets = vec![
            Target::new("first", Rect::point(400.0, 500.0)),
            Target::new("second", Rect::point(600.0, 500.0)),
        ];

        let prediction = engine.predict(&[still(0.5, 0.5)], &targets).unwrap();
        assert_eq!(
            prediction.probability_of("first"),
            prediction.probability_of("second")
        );
        assert_eq!(prediction.predicted_target_id.as_deref(), Some("first"));
        assert_eq!(prediction.confidence, 0.5);
    }

    #[test]
    fn test_zero_scores_fall_back_to_uniform() {
        let uniform = amplify_and_normalize(&[0.0, 0.0, 0.0, 0.0], 4).unwrap();
        assert_eq!(uniform, vec![0.25; 4]);
        assert!(amplify_and_normalize(&[], 4).unwrap().is_empty());

        let engine = PredictionEngine::new(
            EngineConfig {
                distance_weight: 0.0,
                trajectory_weight: 0.0,
                ..EngineConfig::default()
            },
            Viewport::new(1000.0, 1000.0),
        );
        let moving = Sample {
            x: 0.5,
            y: 0.5,
            vx: 0.001,
            vy: 0.0,
            dt: 16.0,
        };
        let prediction = engine.predict(&[moving], &two_targets()).unwrap();

        assert_eq!(prediction.probability_of("a"), Some(0.5));
        assert_eq!(prediction.probability_of("b"), Some(0.5));
        assert_eq!(prediction.predicted_target_id.as_deref(), Some("a"));
    }

    #[test]
    fn test_amplification_sharpens() {
        let normalized = amplify_and_normalize(&[0.8, 0.4], 4).unwrap();
        // 0.8^4 / (0.8^4 + 0.4^4) = 16/17
        assert!((normalized[0] - 16.0 / 17.0).abs() < 1e-12);
        assert!((normalized[1] - 1.0 / 17.0).abs() < 1e-12);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let engine = engine_1000();
        let targets = vec![
            Target::new("same", Rect::point(0.0, 0.0)),
            Target::new("same", Rect::point(10.0, 10.0)),
        ];

        let error = engine.predict(&[still(0.5, 0.5)], &targets).unwrap_err();
        let expected = PredictionError::DuplicateTargetId("same".to_string());
        assert_eq!(error, expected);
    }

    #[test]
    fn test_invalid_viewport_rejected() {
        let mut engine = engine_1000();
        engine.on_viewport_change(0.0, 1000.0);

        let error = engine
            .predict(&[still(0.5, 0.5)], &two_targets())
            .unwrap_err();
        assert!(matches!(error, PredictionError::InvalidViewport { .. }));
    }

    #[test]
    fn test_non_finite_position_rejected() {
        let engine = engine_1000();
        let error = engine
            .predict(&[still(f64::NAN, 0.5)], &two_targets())
            .unwrap_err();
        let expected = PredictionError::NonFiniteScore {
            target_id: "a".to_string(),
        };
        assert_eq!(error, expected);
    }

    #[test]
    fn test_overflowing_scores_rejected() {
        let result = amplify_and_normalize(&[f64::MAX, 1.0], 4);
        assert_eq!(result, Err(PredictionError::NonFiniteSum));

        // Built directly, bypassing weight validation
        let engine = PredictionEngine::new(
            EngineConfig {
                distance_weight: 1e100,
                ..EngineConfig::default()
            },
            Viewport::new(1000.0, 1000.0),
        );
        let moving = Sample {
            x: 0.5,
            y: 0.5,
            vx: 0.001,
            vy: 0.0,
            dt: 16.0,
        };
        let error = engine.predict(&[moving], &two_targets()).unwrap_err();
        assert_eq!(error, PredictionError::NonFiniteSum);
    }

    #[test]
    fn test_set_weights() {
        let mut engine = engine_1000();
        engine.set_weights(0.2, 0.8).unwrap();
        assert_eq!(engine.config().distance_weight, 0.2);
        assert_eq!(engine.config().trajectory_weight, 0.8);
    }

    #[test]
    fn test_set_weights_rejects_out_of_range() {
        let mut engine = engine_1000();

        assert!(engine.set_weights(1e100, 0.3).is_err());
        assert!(engine.set_weights(0.7, -0.1).is_err());
        assert!(engine.set_weights(f64::NAN, 0.3).is_err());
        assert_eq!(engine.config(), &EngineConfig::default());

        let prediction = engine.predict(&[still(0.5, 0.5)], &two_targets()).unwrap();
        assert_sums_to_one(&prediction);
    }
}
