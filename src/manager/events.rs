//! Context-wide notifications.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::event::{Event, SubscriptionToken};
use crate::handle::MonitorHandle;

/// Final state of startup, delivered once profiling completes.
#[allow(missing_docs)]
#[derive(Debug, Clone, Serialize)]
pub struct ProfilingSummary {
    pub completed_at: DateTime<Utc>,
    pub scan_duration: Duration,
    #[serde(skip)]
    pub static_handles: Vec<MonitorHandle>,
    #[serde(skip)]
    pub instance_handles: Vec<MonitorHandle>,
}

impl ProfilingSummary {
    #[must_use]
    pub fn handle_count(&self) -> usize {
        self.static_handles.len() + self.instance_handles.len()
    }
}

/// Notifications raised by a [`MonitoringContext`](super::MonitoringContext).
#[derive(Debug, Default)]
pub struct MonitoringEvents {
    completed: Mutex<Option<Arc<ProfilingSummary>>>,
    profiling_completed: Event<Arc<ProfilingSummary>>,
    handle_created: Event<MonitorHandle>,
    handle_disposed: Event<MonitorHandle>,
}

impl MonitoringEvents {
    fn lock(&self) -> MutexGuard<'_, Option<Arc<ProfilingSummary>>> {
        self.completed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Calls `listener` once profiling has completed.
    ///
    /// If profiling already completed the listener runs immediately on the
    /// calling thread with the final summary and `None` is returned;
    /// otherwise it is subscribed and its token returned.
    pub fn on_profiling_completed(
        &self,
        listener: impl Fn(&Arc<ProfilingSummary>) + Send + Sync + 'static,
    ) -> Option<SubscriptionToken> {
        let replay = {
            let completed = self.lock();
            match completed.as_ref() {
                Some(summary) => Arc::clone(summary),
                None => return Some(self.profiling_completed.subscribe(listener)),
            }
        };
        listener(&replay);
        None
    }

    /// Removes a pending profiling-completed listener.
    pub fn cancel_profiling_completed(&self, token: SubscriptionToken) -> bool {
        self.profiling_completed.unsubscribe(token)
    }

    pub(crate) fn complete(&self, summary: ProfilingSummary) {
        let summary = Arc::new(summary);
        *self.lock() = Some(Arc::clone(&summary));
        self.profiling_completed.invoke(&summary);
        self.profiling_completed.clear();
    }

    /// Summary of the completed startup, if any.
    #[must_use]
    pub fn profiling_summary(&self) -> Option<Arc<ProfilingSummary>> {
        self.lock().clone()
    }

    #[must_use]
    pub fn is_profiling_completed(&self) -> bool {
        self.lock().is_some()
    }

    /// Raised for every handle a context creates, static handles included.
    #[must_use]
    pub fn handle_created(&self) -> &Event<MonitorHandle> {
        &self.handle_created
    }

    /// Raised for every handle a context disposes.
    #[must_use]
    pub fn handle_disposed(&self) -> &Event<MonitorHandle> {
        &self.handle_disposed
    }
}
