use crate::capture::input::types::{
    ClickRecord, RecordedSample, RecordingEntry, RecordingSnapshot, Sample, Viewport,
};
use crate::config::BufferConfig;
use crate::events::{ListenerRegistry, Subscription};
use parking_lot::Mutex as ParkingMutex;
use std::collections::VecDeque;
use uuid::Uuid;

pub const DEFAULT_CAPACITY: usize = 16;
pub const DEFAULT_SAMPLING_INTERVAL_MS: f64 = 16.0;

struct BufferState {
    capacity: usize,
    sampling_interval_ms: f64,
    viewport: Viewport,
    window: VecDeque<Sample>,
    /// Last accepted normalized position and host time; `None` until the first sample
    last: Option<(f64, f64, f64)>,
    recording: bool,
    session_id: Option<Uuid>,
    entries: Vec<RecordingEntry>,
}

impl BufferState {
    fn window_snapshot(&self) -> Vec<Sample> {
        self.window.iter().copied().collect()
    }
}

/// Sliding window of pointer samples.
///
/// Turns raw pointer positions into normalized, velocity-annotated samples,
/// keeps the most recent `capacity` of them and notifies subscribers with a
/// copy of the window on every sample accepted while the window is full.
pub struct SequenceBuffer {
    state: ParkingMutex<BufferState>,
    subscribers: ListenerRegistry<[Sample]>,
}

impl SequenceBuffer {
    /// Create a buffer from `config`.
    ///
    /// An invalid viewport falls back to [`Viewport::default`] so that samples
    /// are never normalized against a zero or non-finite dimension.
    pub fn new(config: &BufferConfig) -> Self {
        let capacity = config.capacity.max(1);
        let viewport = if config.viewport.is_valid() {
            config.viewport
        } else {
            tracing::warn!(
                "Invalid viewport {}x{}, using default",
                config.viewport.width,
                config.viewport.height
            );
            Viewport::default()
        };

        Self {
            state: ParkingMutex::new(BufferState {
                capacity,
                sampling_interval_ms: config.sampling_interval_ms.max(0.0),
                viewport,
                window: VecDeque::with_capacity(capacity),
                last: None,
                recording: false,
                session_id: None,
                entries: Vec::new(),
            }),
            subscribers: ListenerRegistry::new("sequence-buffer"),
        }
    }

    /// Change window capacity and sampling interval.
    ///
    /// A capacity change clears the sliding window (and position tracking);
    /// the recording buffer is kept.
    pub fn configure(&self, capacity: usize, sampling_interval_ms: f64) {
        let capacity = capacity.max(1);
        let mut state = self.state.lock();

        if capacity != state.capacity {
            tracing::debug!(
                "Sequence buffer capacity {} -> {}, clearing window",
                state.capacity,
                capacity
            );
            state.capacity = capacity;
            state.window = VecDeque::with_capacity(capacity);
            state.last = None;
        }
        state.sampling_interval_ms = sampling_interval_ms.max(0.0);
    }

    /// Feed one raw pointer event in viewport pixels at host time `now_ms`.
    ///
    /// Returns `true` if the sample was accepted.
    pub fn accept(&self, raw_x: f64, raw_y: f64, now_ms: f64) -> bool {
        let full_window = {
            let mut state = self.state.lock();

            let (dt, previous) = match state.last {
                Some((last_x, last_y, last_time)) => {
                    let elapsed = now_ms - last_time;
                    if elapsed < state.sampling_interval_ms {
                        return false;
                    }
                    (elapsed, Some((last_x, last_y)))
                }
                None => (0.0, None),
            };

            let x = raw_x / state.viewport.width;
            let y = raw_y / state.viewport.height;

            let (vx, vy) = match previous {
                Some((last_x, last_y)) if dt > 0.0 => ((x - last_x) / dt, (y - last_y) / dt),
                _ => (0.0, 0.0),
            };

            let sample = Sample { x, y, vx, vy, dt };

            if state.window.len() == state.capacity {
                state.window.pop_front();
            }
            state.window.push_back(sample);
            state.last = Some((x, y, now_ms));

            if state.recording {
                state.entries.push(RecordingEntry::Frame(RecordedSample {
                    sample,
                    raw_x,
                    raw_y,
                    timestamp: chrono::Utc::now().timestamp_millis(),
                    host_time_ms: now_ms,
                }));
            }

            let full = state.window.len() == state.capacity;
            full.then(|| state.window_snapshot())
        };

        if let Some(window) = full_window {
            tracing::trace!("Emitting full window ({} samples)", window.len());
            self.subscribers.dispatch(window.as_slice());
        }

        true
    }

    /// Register a callback for full-window emissions
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&[Sample]) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.subscribers.subscribe(callback)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Start a new recording session, discarding previously recorded entries
    pub fn start_recording(&self) {
        let mut state = self.state.lock();
        let session_id = Uuid::new_v4();

        state.entries.clear();
        state.recording = true;
        state.session_id = Some(session_id);

        tracing::info!("Recording started (session={})", session_id);
    }

    pub fn stop_recording(&self) {
        let mut state = self.state.lock();
        if !state.recording {
            return;
        }
        state.recording = false;

        tracing::info!(
            "Recording stopped (entries={}, session={:?})",
            state.entries.len(),
            state.session_id
        );
    }

    pub fn is_recording(&self) -> bool {
        self.state.lock().recording
    }

    pub fn recorded_len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Append a click marker. Ignored unless recording.
    pub fn record_click(
        &self,
        raw_x: f64,
        raw_y: f64,
        now_ms: f64,
        target: Option<&str>,
        target_id: Option<&str>,
    ) {
        let mut state = self.state.lock();
        if !state.recording {
            return;
        }

        let click = ClickRecord {
            x: raw_x / state.viewport.width,
            y: raw_y / state.viewport.height,
            raw_x,
            raw_y,
            timestamp: chrono::Utc::now().timestamp_millis(),
            host_time_ms: now_ms,
            target: target.map(str::to_string),
            target_id: target_id.map(str::to_string),
        };
        state.entries.push(RecordingEntry::Click(click));
    }

    /// Copy of the recording buffer with metadata. Does not clear the buffer.
    pub fn export_recording(&self) -> RecordingSnapshot {
        let state = self.state.lock();
        let click_count = state.entries.iter().filter(|e| e.is_click()).count();

        RecordingSnapshot {
            session_id: state.session_id,
            frame_count: state.entries.len() - click_count,
            click_count,
            viewport: state.viewport,
            capacity: state.capacity,
            sampling_interval_ms: state.sampling_interval_ms,
            exported_at: chrono::Utc::now().timestamp_millis(),
            entries: state.entries.clone(),
        }
    }

    /// Copy of the sliding window, whatever its length
    pub fn current_window(&self) -> Vec<Sample> {
        self.state.lock().window_snapshot()
    }

    /// Clear the window, the recording buffer and position tracking
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.window.clear();
        state.entries.clear();
        state.last = None;
    }

    /// Update normalization for subsequent samples. Stored samples are not renormalized.
    pub fn on_viewport_change(&self, width: f64, height: f64) {
        let viewport = Viewport::new(width, height);
        if !viewport.is_valid() {
            tracing::warn!("Ignoring invalid viewport {}x{}", width, height);
            return;
        }
        self.state.lock().viewport = viewport;
    }

    pub fn viewport(&self) -> Viewport {
        self.state.lock().viewport
    }

    pub fn capacity(&self) -> usize {
        self.state.lock().capacity
    }
}

impl Default for SequenceBuffer {
    fn default() -> Self {
        Self::new(&BufferConfig::default())
    }
}
