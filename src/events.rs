//! Listener registry with isolating dispatch
//!
//! Both the sequence buffer and the pipeline fan events out to an arbitrary
//! number of callbacks. Callbacks run synchronously in registration order; a
//! callback that returns an error or panics is logged and skipped, and the
//! remaining callbacks still receive the event.

use parking_lot::Mutex as ParkingMutex;
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use uuid::Uuid;

/// Callback invoked with a borrowed event
pub type Callback<E> = Arc<dyn Fn(&E) -> anyhow::Result<()> + Send + Sync>;

/// Identifier of a registered callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

type Entries<E> = ParkingMutex<Vec<(SubscriptionId, Callback<E>)>>;

trait Detach: Send + Sync {
    fn detach(&self, id: SubscriptionId) -> bool;
}

impl<E: ?Sized + 'static> Detach for Entries<E> {
    fn detach(&self, id: SubscriptionId) -> bool {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }
}

/// Handle returned by a registration; removes exactly that callback.
///
/// Dropping the handle does not unsubscribe.
pub struct Subscription {
    id: SubscriptionId,
    entries: Weak<dyn Detach>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Remove the callback. Returns `false` if it was already removed or the
    /// registry no longer exists.
    pub fn unsubscribe(&self) -> bool {
        match self.entries.upgrade() {
            Some(entries) => entries.detach(self.id),
            None => false,
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .finish()
    }
}

/// Outcome of one dispatch round
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

pub struct ListenerRegistry<E: ?Sized> {
    entries: Arc<Entries<E>>,
    name: &'static str,
}

impl<E: ?Sized + 'static> ListenerRegistry<E> {
    /// `name` labels log output from this registry
    pub fn new(name: &'static str) -> Self {
        Self {
            entries: Arc::new(ParkingMutex::new(Vec::new())),
            name,
        }
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&E) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = SubscriptionId::new();
        let callback: Callback<E> = Arc::new(callback);
        self.entries.lock().push((id, callback));

        let weak: Weak<Entries<E>> = Arc::downgrade(&self.entries);
        let entries: Weak<dyn Detach> = weak;
        Subscription { id, entries }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Invoke every callback with `event`.
    ///
    /// The callback list is snapshotted before dispatch and no lock is held
    /// while callbacks run, so callbacks may subscribe or unsubscribe.
    pub fn dispatch(&self, event: &E) -> DispatchReport {
        let callbacks: Vec<(SubscriptionId, Callback<E>)> = self.entries.lock().clone();
        let mut report = DispatchReport::default();

        for (id, callback) in callbacks {
            match panic::catch_unwind(AssertUnwindSafe(|| callback(event))) {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(error)) => {
                    report.failed += 1;
                    tracing::error!(
                        registry = self.name,
                        listener = %id,
                        error = %error,
                        "Listener failed"
                    );
                }
                Err(payload) => {
                    report.failed += 1;
                    tracing::error!(
                        registry = self.name,
                        listener = %id,
                        panic = panic_message(payload.as_ref()),
                        "Listener panicked"
                    );
                }
            }
        }

        report
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}
