//! Live monitor handles.
//!
//! A [`MonitorHandle`] binds one [`MonitorProfile`] to one target (none for
//! static members). It keeps the last observed value and formatted state,
//! and raises `value_updated`, `active_state_changed` and `disposing` for
//! UI layers.
//!
//! Handles are cheap to clone. Every event subscription a handle makes on
//! a host object captures a weak reference, so a host event outliving the
//! handle never keeps it alive.
//!
//! Lock discipline: the state lock is never held while user accessors,
//! processors or listeners run.

mod event;
mod method;
mod validation;
mod value;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crossbeam_channel::Sender;
use serde::Serialize;

use crate::error::AccessError;
use crate::event::{Event, SubscriptionToken};
use crate::logging::log_at;
use crate::manager::dispatcher::TickCommand;
use crate::profile::format::FormatData;
use crate::profile::{MonitorProfile, ProfileAccess, ResolvedEvent};
use crate::reflect::guard;
use crate::settings::MonitorSettings;
use crate::target::{MonitorTarget, Target};
use crate::value::Value;

/// Unique, never reused identity of a handle within a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct HandleId(u64);

impl HandleId {
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic source of [`HandleId`]s.
#[derive(Debug, Default)]
pub(crate) struct HandleIdSource(AtomicU64);

impl HandleIdSource {
    pub(crate) fn next(&self) -> HandleId {
        HandleId(self.0.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

struct Subscription {
    event: ResolvedEvent,
    token: SubscriptionToken,
}

#[derive(Default)]
struct HandleState {
    enabled: bool,
    faulted: bool,
    disposed: bool,
    last_value: Option<Value>,
    text: String,
    /// Formatting buffer swapped with `text` on every publish.
    scratch: String,
    invocations: u64,
    /// `set_value` calls in progress. Update events raised by the setter
    /// are not published while non-zero.
    writes: u32,
    subscriptions: Vec<Subscription>,
}

pub(crate) struct HandleInner {
    id: HandleId,
    profile: Arc<MonitorProfile>,
    target: Option<Target>,
    settings: Arc<MonitorSettings>,
    commands: Sender<TickCommand>,
    state: Mutex<HandleState>,
    value_updated: Event<String>,
    active_state_changed: Event<bool>,
    disposing: Event<()>,
}

/// A live monitored member.
#[derive(Clone)]
pub struct MonitorHandle {
    inner: Arc<HandleInner>,
}

impl MonitorHandle {
    /// Creates a handle, reads its initial state without raising events and
    /// wires update events, validators and tick registration.
    pub(crate) fn create(
        id: HandleId,
        profile: Arc<MonitorProfile>,
        target: Option<Target>,
        settings: Arc<MonitorSettings>,
        commands: Sender<TickCommand>,
    ) -> Self {
        let handle = Self {
            inner: Arc::new(HandleInner {
                id,
                profile,
                target,
                settings,
                commands,
                state: Mutex::new(HandleState::default()),
                value_updated: Event::new(),
                active_state_changed: Event::new(),
                disposing: Event::new(),
            }),
        };

        match &handle.inner.profile.access {
            ProfileAccess::Value { .. } => {
                handle.initial_read();
                handle.subscribe_update_event();
            }
            ProfileAccess::Event(event) => handle.subscribe_counter(event),
            ProfileAccess::Method { .. } => handle.initial_label(),
        }
        let visible = handle.setup_validator();
        let enabled = handle.inner.profile.format.enabled_by_default && visible;

        let faulted = {
            let mut state = handle.lock();
            state.enabled = enabled && !state.faulted;
            state.faulted
        };
        if enabled && !faulted && handle.inner.profile.receive_tick() {
            handle.send(TickCommand::Refresh(handle.clone()));
        }
        handle
    }

    fn lock(&self) -> MutexGuard<'_, HandleState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn send(&self, command: TickCommand) {
        // The dispatcher outlives every handle it ticks; a closed channel
        // only happens during shutdown.
        let _ = self.inner.commands.send(command);
    }

    fn weak(&self) -> Weak<HandleInner> {
        Arc::downgrade(&self.inner)
    }

    fn from_weak(weak: &Weak<HandleInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    fn target_ref(&self) -> Option<&dyn MonitorTarget> {
        self.inner.target.as_deref()
    }

    /// Not faulted and not disposed.
    fn is_live(&self) -> bool {
        let state = self.lock();
        !state.faulted && !state.disposed
    }

    /// Subscribes to a host event and records the subscription for dispose.
    fn subscribe_to(
        &self,
        event: &ResolvedEvent,
        listener: Arc<dyn Fn(&[Value]) + Send + Sync>,
    ) -> Result<(), AccessError> {
        let source = event.source(self.target_ref())?;
        let token = source.subscribe_values(listener);
        self.lock().subscriptions.push(Subscription {
            event: event.clone(),
            token,
        });
        Ok(())
    }

    /// Formats `value` with `render` into the scratch buffer, stores it as
    /// the current state and raises `value_updated`.
    fn publish(
        &self,
        value: Value,
        render: impl FnOnce(&Value, &mut String) -> Result<(), AccessError>,
    ) {
        let mut buffer = std::mem::take(&mut self.lock().scratch);
        buffer.clear();
        let rendered = guard(|| render(&value, &mut buffer));
        if let Err(err) = rendered {
            self.lock().scratch = buffer;
            self.fault(&err);
            return;
        }
        let text = {
            let mut state = self.lock();
            if state.disposed {
                return;
            }
            state.last_value = Some(value);
            std::mem::swap(&mut state.text, &mut buffer);
            state.scratch = buffer;
            if self.inner.value_updated.subscriber_count() == 0 {
                return;
            }
            state.text.clone()
        };
        self.inner.value_updated.invoke(&text);
    }

    /// Logs an access failure and disables the handle until it is
    /// re-enabled explicitly.
    fn fault(&self, err: &AccessError) {
        let profile = &self.inner.profile;
        log_at!(
            self.inner.settings.logging.access_failure,
            handle = %self.inner.id,
            declaring = %profile.declaring_type,
            member = %profile.name,
            error = %err,
            "monitored member failed, disabling handle"
        );
        {
            let mut state = self.lock();
            if state.disposed {
                return;
            }
            state.faulted = true;
        }
        self.change_enabled(false, false);
    }

    /// Applies an enabled-state change. Returns true if the state changed.
    fn change_enabled(&self, enabled: bool, clear_fault: bool) -> bool {
        {
            let mut state = self.lock();
            if state.disposed {
                return false;
            }
            if clear_fault {
                state.faulted = false;
            }
            if enabled && state.faulted {
                return false;
            }
            if state.enabled == enabled {
                return false;
            }
            state.enabled = enabled;
        }
        if self.inner.profile.receive_tick() {
            if enabled {
                self.send(TickCommand::Refresh(self.clone()));
            } else {
                self.send(TickCommand::StopRefresh(self.inner.id));
            }
        }
        if enabled && matches!(self.inner.profile.access, ProfileAccess::Value { .. }) {
            self.refresh();
        }
        self.inner.active_state_changed.invoke(&enabled);
        true
    }

    /// Unsubscribes from host events, leaves the tick lists and fires
    /// `disposing` once. Returns false if already disposed.
    pub(crate) fn dispose(&self) -> bool {
        let subscriptions = {
            let mut state = self.lock();
            if state.disposed {
                return false;
            }
            state.disposed = true;
            state.enabled = false;
            std::mem::take(&mut state.subscriptions)
        };
        for Subscription { event, token } in subscriptions {
            if let Ok(source) = event.source(self.target_ref()) {
                source.unsubscribe_token(token);
            }
        }
        self.send(TickCommand::StopRefresh(self.inner.id));
        self.send(TickCommand::StopValidate(self.inner.id));

        self.inner.disposing.invoke(&());
        self.inner.value_updated.clear();
        self.inner.active_state_changed.clear();
        self.inner.disposing.clear();
        true
    }

    #[must_use]
    pub fn id(&self) -> HandleId {
        self.inner.id
    }

    /// Member name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.profile.name
    }

    /// Label shown to the user.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.inner.profile.format.label
    }

    /// Bound target, `None` for static members.
    #[must_use]
    pub fn target(&self) -> Option<&Target> {
        self.inner.target.as_ref()
    }

    #[must_use]
    pub fn profile(&self) -> &Arc<MonitorProfile> {
        &self.inner.profile
    }

    #[must_use]
    pub fn format(&self) -> &FormatData {
        &self.inner.profile.format
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.lock().enabled
    }

    /// Enables or disables the handle. Enabling clears a fault.
    pub fn set_enabled(&self, enabled: bool) {
        self.change_enabled(enabled, enabled);
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.lock().disposed
    }

    /// True after an access failure until the handle is re-enabled.
    #[must_use]
    pub fn is_faulted(&self) -> bool {
        self.lock().faulted
    }

    /// Re-reads the member and raises `value_updated` if the state changed.
    /// Method handles always raise. Failures disable the handle.
    pub fn refresh(&self) {
        if !self.is_live() {
            return;
        }
        match &self.inner.profile.access {
            ProfileAccess::Value { .. } => self.refresh_value(),
            ProfileAccess::Method { .. } => self.refresh_method(),
            ProfileAccess::Event(_) => {}
        }
    }

    /// Current formatted state.
    #[must_use]
    pub fn state(&self) -> String {
        self.lock().text.clone()
    }

    /// Last observed value.
    #[must_use]
    pub fn value(&self) -> Option<Value> {
        self.lock().last_value.clone()
    }

    /// Number of observed invocations of a monitored event.
    #[must_use]
    pub fn invocation_count(&self) -> u64 {
        self.lock().invocations
    }

    /// Raised with the new state whenever it changes.
    #[must_use]
    pub fn value_updated(&self) -> &Event<String> {
        &self.inner.value_updated
    }

    #[must_use]
    pub fn active_state_changed(&self) -> &Event<bool> {
        &self.inner.active_state_changed
    }

    /// Raised once when the handle is disposed.
    #[must_use]
    pub fn disposing(&self) -> &Event<()> {
        &self.inner.disposing
    }
}

impl PartialEq for MonitorHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for MonitorHandle {}

impl fmt::Debug for MonitorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("MonitorHandle")
            .field("id", &self.inner.id)
            .field("declaring", &self.inner.profile.declaring_type)
            .field("member", &self.inner.profile.name)
            .field("enabled", &state.enabled)
            .field("faulted", &state.faulted)
            .field("disposed", &state.disposed)
            .field("state", &state.text)
            .finish()
    }
}

#[cfg(test)]
mod tests;
