//! Pipeline coordinator
//!
//! Bridges full-window emissions from a [`SequenceBuffer`] into
//! [`PredictionEngine`] calls and fans the predictions out to listeners.

use crate::capture::input::buffer::SequenceBuffer;
use crate::capture::input::types::Sample;
use crate::config::PredictorConfig;
use crate::events::{ListenerRegistry, Subscription};
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::processing::prediction::{Prediction, PredictionEngine};
use crate::processing::targets::{Rect, Target};
use parking_lot::Mutex as ParkingMutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Read-only snapshot of pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStatus {
    pub active: bool,
    pub target_count: usize,
    pub listener_count: usize,
}

struct Shared {
    engine: ParkingMutex<PredictionEngine>,
    targets: ParkingMutex<Vec<Target>>,
    listeners: ListenerRegistry<Prediction>,
    active: AtomicBool,
    disposed: AtomicBool,
    /// Buffer subscription while active. Held for the whole of every
    /// start/stop/dispose transition.
    window_subscription: ParkingMutex<Option<Subscription>>,
}

impl Shared {
    fn handle_sequence(&self, sequence: &[Sample]) -> Option<Prediction> {
        if !self.active.load(Ordering::SeqCst) {
            return None;
        }

        let targets = self.targets.lock().clone();
        if targets.is_empty() {
            return None;
        }

        let result = self.engine.lock().predict(sequence, &targets);
        let prediction = match result {
            Ok(prediction) => prediction,
            Err(e) => {
                tracing::error!(error = %e, "Prediction failed, skipping window");
                return None;
            }
        };

        tracing::debug!(
            predicted = ?prediction.predicted_target_id,
            confidence = prediction.confidence,
            "Dispatching prediction"
        );
        self.listeners.dispatch(&prediction);

        Some(prediction)
    }

}

impl Drop for Shared {
    fn drop(&mut self) {
        if detach_from_buffer(self.window_subscription.get_mut()) {
            tracing::debug!("Pipeline dropped while active, detached from buffer");
        }
    }
}

fn detach_from_buffer(slot: &mut Option<Subscription>) -> bool {
    match slot.take() {
        Some(subscription) => subscription.unsubscribe(),
        None => false,
    }
}

/// Assembles a [`Pipeline`] from its collaborators
#[derive(Default)]
pub struct PipelineBuilder {
    buffer: Option<Arc<SequenceBuffer>>,
    engine: Option<PredictionEngine>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buffer(mut self, buffer: Arc<SequenceBuffer>) -> Self {
        self.buffer = Some(buffer);
        self
    }

    pub fn engine(mut self, engine: PredictionEngine) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn build(self) -> PipelineResult<Pipeline> {
        let buffer = self
            .buffer
            .ok_or(PipelineError::MissingCollaborator("sequence buffer"))?;
        let engine = self
            .engine
            .ok_or(PipelineError::MissingCollaborator("prediction engine"))?;

        Ok(Pipeline {
            buffer,
            shared: Arc::new(Shared {
                engine: ParkingMutex::new(engine),
                targets: ParkingMutex::new(Vec::new()),
                listeners: ListenerRegistry::new("pipeline"),
                active: AtomicBool::new(false),
                disposed: AtomicBool::new(false),
                window_subscription: ParkingMutex::new(None),
            }),
        })
    }
}

/// Motion-to-prediction pipeline.
///
/// Cloning yields another handle to the same pipeline.
#[derive(Clone)]
pub struct Pipeline {
    buffer: Arc<SequenceBuffer>,
    shared: Arc<Shared>,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Build a pipeline with a fresh buffer and engine from `config`
    pub fn from_config(config: &PredictorConfig) -> PipelineResult<Self> {
        config.validate()?;

        let buffer = Arc::new(SequenceBuffer::new(&config.buffer));
        let engine = PredictionEngine::new(config.engine.clone(), config.buffer.viewport);

        Self::builder().buffer(buffer).engine(engine).build()
    }

    pub fn buffer(&self) -> &Arc<SequenceBuffer> {
        &self.buffer
    }

    fn is_disposed(&self, operation: &str) -> bool {
        let disposed = self.shared.disposed.load(Ordering::SeqCst);
        if disposed {
            tracing::warn!("Ignoring {} on disposed pipeline", operation);
        }
        disposed
    }

    /// Replace the candidate targets. Returns the number accepted.
    pub fn set_targets(&self, targets: Vec<Target>) -> usize {
        if self.is_disposed("set_targets") {
            return 0;
        }

        let count = targets.len();
        if count == 0 {
            tracing::warn!("No targets registered, predictions are paused");
        }
        *self.shared.targets.lock() = targets;

        tracing::info!("Registered {} targets", count);
        count
    }

    /// Re-measure every registered target through `provider`.
    ///
    /// Targets keep their identity and order; a target the provider cannot
    /// measure keeps its previous rect. Returns the number of rects updated.
    pub fn refresh_targets<F>(&self, mut provider: F) -> usize
    where
        F: FnMut(&str) -> Option<Rect>,
    {
        if self.is_disposed("refresh_targets") {
            return 0;
        }

        let ids: Vec<String> = {
            let targets = self.shared.targets.lock();
            if targets.is_empty() {
                tracing::warn!("No targets to refresh");
                return 0;
            }
            targets.iter().map(|target| target.id.clone()).collect()
        };

        // The provider runs unlocked and may call back into the pipeline
        let mut measured = HashMap::with_capacity(ids.len());
        for id in ids {
            match provider(&id) {
                Some(rect) => {
                    measured.insert(id, rect);
                }
                None => tracing::debug!("Keeping stale rect for target {}", id),
            }
        }

        let mut targets = self.shared.targets.lock();
        let mut refreshed = 0;
        for target in targets.iter_mut() {
            if let Some(rect) = measured.get(&target.id) {
                target.rect = *rect;
                refreshed += 1;
            }
        }
        refreshed
    }

    /// Begin routing full windows into predictions. Returns `true` if the
    /// pipeline was started by this call.
    pub fn start(&self) -> bool {
        let mut slot = self.shared.window_subscription.lock();
        if self.is_disposed("start") {
            return false;
        }
        if self.shared.active.load(Ordering::SeqCst) {
            tracing::warn!("Pipeline already active");
            return false;
        }
        if self.shared.targets.lock().is_empty() {
            tracing::warn!("Cannot start pipeline without targets");
            return false;
        }

        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        let subscription = self.buffer.subscribe(move |window: &[Sample]| {
            if let Some(shared) = weak.upgrade() {
                shared.handle_sequence(window);
            }
            Ok(())
        });
        *slot = Some(subscription);
        self.shared.active.store(true, Ordering::SeqCst);

        tracing::info!("Pipeline started");
        true
    }

    /// Stop routing windows. Returns `true` if the pipeline was stopped by this call.
    pub fn stop(&self) -> bool {
        let mut slot = self.shared.window_subscription.lock();
        if !self.shared.active.swap(false, Ordering::SeqCst) {
            tracing::warn!("Pipeline is not active");
            return false;
        }
        detach_from_buffer(&mut slot);

        tracing::info!("Pipeline stopped");
        true
    }

    /// Run one window through the engine and notify listeners.
    ///
    /// Called for every full window while the pipeline is active. Does
    /// nothing when inactive or without targets; prediction failures are
    /// logged and yield `None`.
    pub fn handle_sequence(&self, sequence: &[Sample]) -> Option<Prediction> {
        self.shared.handle_sequence(sequence)
    }

    /// Register a prediction listener
    pub fn on_prediction<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Prediction) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.shared.listeners.subscribe(callback)
    }

    /// Forward a viewport change to both the buffer and the engine
    pub fn on_viewport_change(&self, width: f64, height: f64) {
        self.buffer.on_viewport_change(width, height);

        let viewport = self.buffer.viewport();
        self.shared
            .engine
            .lock()
            .on_viewport_change(viewport.width, viewport.height);
    }

    /// Replace the engine's scoring weights. Each must lie in `[0, 1]`.
    pub fn set_weights(&self, distance_weight: f64, trajectory_weight: f64) -> PipelineResult<()> {
        self.shared
            .engine
            .lock()
            .set_weights(distance_weight, trajectory_weight)?;
        Ok(())
    }

    /// Stop and drop all targets and listeners. Further calls are ignored.
    pub fn dispose(&self) {
        if self.shared.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        {
            let mut slot = self.shared.window_subscription.lock();
            self.shared.active.store(false, Ordering::SeqCst);
            detach_from_buffer(&mut slot);
        }
        self.shared.targets.lock().clear();
        self.shared.listeners.clear();

        tracing::info!("Pipeline disposed");
    }

    pub fn status(&self) -> PipelineStatus {
        PipelineStatus {
            active: self.shared.active.load(Ordering::SeqCst),
            target_count: self.shared.targets.lock().len(),
            listener_count: self.shared.listeners.len(),
        }
    }
}
