//! The monitoring context: startup, registration and the per-frame tick.
//!
//! A [`MonitoringContext`] owns everything a running monitor needs: the
//! profile registry produced by the startup scan, the live handle lists,
//! the target index and the update dispatcher. All of it is mutated from
//! the thread that owns the context. Worker threads go through
//! [`RegistrationSender`].
//!
//! ```
//! use std::sync::atomic::{AtomicI32, Ordering};
//! use std::sync::Arc;
//! use livemon::reflect::{Assembly, MonitorAttribute, Monitored, TypeBuilder, TypeCatalog, TypeDescriptor};
//! use livemon::{MonitorSettings, MonitorTarget, MonitoringContext, Target};
//!
//! struct Player { hp: AtomicI32 }
//! impl MonitorTarget for Player {}
//! impl Monitored for Player {
//!     fn describe() -> TypeDescriptor {
//!         TypeBuilder::<Player>::new()
//!             .field("hp", |p: &Player| p.hp.load(Ordering::Relaxed))
//!             .monitored(MonitorAttribute::new())
//!             .build()
//!     }
//! }
//!
//! let mut context = MonitoringContext::new(MonitorSettings::default()).unwrap();
//! context.start(&TypeCatalog::new().with_assembly(Assembly::new("game").with::<Player>())).unwrap();
//!
//! let player: Target = Arc::new(Player { hp: AtomicI32::new(100) });
//! context.register_target(Arc::clone(&player));
//! context.tick();
//! assert_eq!(context.handles_for_target(&player)[0].state(), "Hp: 100");
//! ```

pub(crate) mod dispatcher;
/// Context-wide notifications.
pub mod events;
/// Cross-thread registration.
pub mod remote;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::Utc;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{MonitorError, MonitorResult, ScanError};
use crate::handle::{HandleId, HandleIdSource, MonitorHandle};
use crate::overlay::{OverlayFilter, OverlaySnapshot};
use crate::profile::{CancellationToken, MonitorProfile, ProfileRegistry, ScanOutcome};
use crate::reflect::TypeCatalog;
use crate::settings::MonitorSettings;
use crate::target::{Target, TargetId};

pub use dispatcher::TickReport;
pub use events::{MonitoringEvents, ProfilingSummary};
pub use remote::RegistrationSender;

use dispatcher::UpdateDispatcher;
use remote::RemoteCommand;

/// Unique identifier of a monitoring context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ContextId(Uuid);

impl ContextId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a context is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StartupState {
    /// Not started; registrations are queued.
    Idle,
    /// The profile scan is running; registrations are queued.
    Scanning,
    /// Handles exist and the dispatcher ticks.
    Ready,
    /// The scan was cancelled. Nothing was created.
    Cancelled,
    /// The scan failed. Nothing was created.
    Failed,
    /// `shutdown` ran. Every handle was disposed.
    ShutDown,
}

/// Outcome of [`MonitoringContext::register_target`].
#[derive(Debug)]
pub enum Registration {
    /// Startup has not completed; the target is registered when it does.
    Queued,
    /// Handles created for the target, possibly none.
    Registered(Vec<MonitorHandle>),
    /// The target is already registered or queued.
    AlreadyRegistered,
    /// The context will never create handles (cancelled, failed or shut
    /// down).
    Ignored,
}

#[derive(Debug)]
struct TargetEntry {
    handles: Vec<MonitorHandle>,
    // Keeps the target alive so its id is not reused while registered.
    _target: Target,
}

#[derive(Debug)]
struct BackgroundScan {
    result: Receiver<MonitorResult<ScanOutcome>>,
    worker: Option<JoinHandle<()>>,
}

impl BackgroundScan {
    fn join(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// A running monitor.
pub struct MonitoringContext {
    id: ContextId,
    settings: Arc<MonitorSettings>,
    state: StartupState,
    registry: Option<Arc<ProfileRegistry>>,
    dispatcher: UpdateDispatcher,
    events: MonitoringEvents,
    ids: HandleIdSource,
    static_handles: Vec<MonitorHandle>,
    instance_handles: Vec<MonitorHandle>,
    targets: HashMap<TargetId, TargetEntry>,
    pending: Vec<Target>,
    remote_tx: Sender<RemoteCommand>,
    remote_rx: Option<Receiver<RemoteCommand>>,
    background: Option<BackgroundScan>,
    cancel: CancellationToken,
}

impl MonitoringContext {
    /// Creates an idle context.
    ///
    /// # Errors
    ///
    /// [`MonitorError::Config`] if `settings` do not validate.
    pub fn new(settings: MonitorSettings) -> MonitorResult<Self> {
        settings.validate()?;
        let (remote_tx, remote_rx) = unbounded();
        Ok(Self {
            id: ContextId::new(),
            settings: Arc::new(settings),
            state: StartupState::Idle,
            registry: None,
            dispatcher: UpdateDispatcher::new(),
            events: MonitoringEvents::default(),
            ids: HandleIdSource::default(),
            static_handles: Vec::new(),
            instance_handles: Vec::new(),
            targets: HashMap::new(),
            pending: Vec::new(),
            remote_tx,
            remote_rx: Some(remote_rx),
            background: None,
            cancel: CancellationToken::new(),
        })
    }

    fn ensure_idle(&self) -> MonitorResult<()> {
        if self.state == StartupState::Idle {
            Ok(())
        } else {
            Err(MonitorError::state(format!("context already started ({:?})", self.state)))
        }
    }

    /// Scans `catalog` on the calling thread and completes startup.
    ///
    /// # Errors
    ///
    /// [`MonitorError::State`] if the context was already started,
    /// [`ScanError::Cancelled`] if [`cancel_startup`](Self::cancel_startup)
    /// was called first, [`MonitorError::Config`] for invalid scan filters.
    pub fn start(&mut self, catalog: &TypeCatalog) -> MonitorResult<()> {
        self.ensure_idle()?;
        self.state = StartupState::Scanning;
        let outcome = ProfileRegistry::scan(catalog, &self.settings, &self.cancel).map_err(MonitorError::from);
        self.apply_scan(outcome)
    }

    /// Scans `catalog` on a worker thread. The result is applied by
    /// [`tick`](Self::tick) or [`await_startup`](Self::await_startup) on
    /// the owning thread.
    ///
    /// # Errors
    ///
    /// [`MonitorError::State`] if the context was already started or the
    /// worker could not be spawned.
    pub fn start_background(&mut self, catalog: TypeCatalog) -> MonitorResult<()> {
        self.ensure_idle()?;
        let (tx, rx) = bounded(1);
        let settings = Arc::clone(&self.settings);
        let cancel = self.cancel.clone();
        let worker = thread::Builder::new()
            .name("livemon-scan".to_string())
            .spawn(move || {
                let outcome = ProfileRegistry::scan(&catalog, &settings, &cancel).map_err(MonitorError::from);
                let _ = tx.send(outcome);
            })
            .map_err(|err| MonitorError::state(format!("failed to spawn scan worker: {err}")))?;

        self.background = Some(BackgroundScan {
            result: rx,
            worker: Some(worker),
        });
        self.state = StartupState::Scanning;
        tracing::debug!(context = %self.id, "profile scan started in background");
        Ok(())
    }

    /// Requests cooperative cancellation of the startup scan.
    pub fn cancel_startup(&self) {
        self.cancel.cancel();
    }

    /// Waits up to `timeout` for a background scan and applies its result.
    /// Returns the state afterwards; `Scanning` means it timed out.
    ///
    /// # Errors
    ///
    /// The scan's error, [`ScanError::Cancelled`] included.
    pub fn await_startup(&mut self, timeout: Duration) -> MonitorResult<StartupState> {
        if self.state == StartupState::Scanning {
            self.poll_background(Some(timeout))?;
        }
        Ok(self.state)
    }

    fn poll_background(&mut self, timeout: Option<Duration>) -> MonitorResult<()> {
        let Some(scan) = &self.background else {
            return Ok(());
        };
        let received = match timeout {
            Some(timeout) => scan.result.recv_timeout(timeout).map_err(|e| e.is_disconnected()),
            None => scan.result.try_recv().map_err(|e| e.is_disconnected()),
        };
        let outcome = match received {
            Ok(outcome) => outcome,
            Err(false) => return Ok(()),
            Err(true) => Err(MonitorError::state("profile scan worker terminated unexpectedly")),
        };
        if let Some(mut scan) = self.background.take() {
            scan.join();
        }
        self.apply_scan(outcome)
    }

    fn apply_scan(&mut self, outcome: MonitorResult<ScanOutcome>) -> MonitorResult<()> {
        match outcome {
            Ok(ScanOutcome::Completed(registry)) => {
                self.finish_startup(registry);
                Ok(())
            }
            Ok(ScanOutcome::Cancelled) => {
                self.state = StartupState::Cancelled;
                self.pending.clear();
                Err(ScanError::Cancelled.into())
            }
            Err(err) => {
                tracing::error!(context = %self.id, error = %err, "profile scan failed");
                self.state = StartupState::Failed;
                self.pending.clear();
                Err(err)
            }
        }
    }

    /// Creates the static handles, registers queued targets and raises
    /// profiling-completed with the final lists.
    fn finish_startup(&mut self, registry: ProfileRegistry) {
        let registry = Arc::new(registry);
        self.registry = Some(Arc::clone(&registry));

        let statics: Vec<MonitorHandle> = registry
            .static_profiles()
            .iter()
            .map(|profile| self.create_handle(Arc::clone(profile), None))
            .collect();
        self.static_handles = statics;
        for handle in &self.static_handles {
            self.events.handle_created().invoke(handle);
        }

        self.state = StartupState::Ready;
        for target in std::mem::take(&mut self.pending) {
            self.register_now(target);
        }

        tracing::info!(
            context = %self.id,
            static_handles = self.static_handles.len(),
            instance_handles = self.instance_handles.len(),
            targets = self.targets.len(),
            "monitoring ready"
        );
        self.events.complete(ProfilingSummary {
            completed_at: Utc::now(),
            scan_duration: registry.report().duration,
            static_handles: self.static_handles.clone(),
            instance_handles: self.instance_handles.clone(),
        });
    }

    fn create_handle(&self, profile: Arc<MonitorProfile>, target: Option<Target>) -> MonitorHandle {
        MonitorHandle::create(
            self.ids.next(),
            profile,
            target,
            Arc::clone(&self.settings),
            self.dispatcher.sender(),
        )
    }

    /// Applies a finished background scan and queued remote commands, then
    /// runs one dispatcher sweep once the context is ready.
    pub fn tick(&mut self) -> TickReport {
        if self.state == StartupState::Scanning {
            // Failures are logged and reflected in the startup state.
            let _ = self.poll_background(None);
        }
        self.drain_remote();
        if self.state != StartupState::Ready {
            return TickReport::default();
        }
        self.dispatcher.tick()
    }

    fn drain_remote(&mut self) {
        let Some(rx) = &self.remote_rx else {
            return;
        };
        let commands: Vec<RemoteCommand> = rx.try_iter().collect();
        for command in commands {
            match command {
                RemoteCommand::Register(target) => {
                    self.register_target(target);
                }
                RemoteCommand::Unregister(target) => {
                    self.unregister_target(&target);
                }
            }
        }
    }

    /// Creates a handle for every instance profile that applies to
    /// `target`. Before startup completes the target is queued instead.
    pub fn register_target(&mut self, target: Target) -> Registration {
        match self.state {
            StartupState::Idle | StartupState::Scanning => {
                let id = TargetId::of(&target);
                if self.pending.iter().any(|t| TargetId::of(t) == id) {
                    return Registration::AlreadyRegistered;
                }
                self.pending.push(target);
                Registration::Queued
            }
            StartupState::Ready => self.register_now(target),
            StartupState::Cancelled | StartupState::Failed | StartupState::ShutDown => {
                tracing::debug!(context = %self.id, state = ?self.state, "registration ignored");
                Registration::Ignored
            }
        }
    }

    fn register_now(&mut self, target: Target) -> Registration {
        let id = TargetId::of(&target);
        if self.targets.contains_key(&id) {
            return Registration::AlreadyRegistered;
        }
        let Some(registry) = self.registry.clone() else {
            return Registration::Ignored;
        };

        let handles: Vec<MonitorHandle> = registry
            .profiles_for(&target.type_key())
            .into_iter()
            .filter(|profile| target.view(&profile.declaring_type).is_some())
            .map(|profile| self.create_handle(profile, Some(Arc::clone(&target))))
            .collect();
        tracing::debug!(context = %self.id, target = ?target, handles = handles.len(), "target registered");

        if handles.is_empty() {
            return Registration::Registered(handles);
        }
        self.instance_handles.extend(handles.iter().cloned());
        self.targets.insert(
            id,
            TargetEntry {
                handles: handles.clone(),
                _target: target,
            },
        );
        for handle in &handles {
            self.events.handle_created().invoke(handle);
        }
        Registration::Registered(handles)
    }

    /// Disposes every handle of `target`, or drops it from the startup
    /// queue. Returns the number of disposed handles; unknown targets are a
    /// no-op.
    pub fn unregister_target(&mut self, target: &Target) -> usize {
        let id = TargetId::of(target);
        if let Some(pos) = self.pending.iter().position(|t| TargetId::of(t) == id) {
            self.pending.remove(pos);
            return 0;
        }
        let Some(entry) = self.targets.remove(&id) else {
            return 0;
        };

        let removed: HashSet<HandleId> = entry.handles.iter().map(MonitorHandle::id).collect();
        self.instance_handles.retain(|h| !removed.contains(&h.id()));
        for handle in &entry.handles {
            if handle.dispose() {
                self.events.handle_disposed().invoke(handle);
            }
        }
        tracing::debug!(context = %self.id, target = ?target, handles = entry.handles.len(), "target unregistered");
        entry.handles.len()
    }

    /// Handles of a registered target; empty if it is not registered.
    #[must_use]
    pub fn handles_for_target(&self, target: &Target) -> &[MonitorHandle] {
        self.targets
            .get(&TargetId::of(target))
            .map_or(&[], |entry| entry.handles.as_slice())
    }

    #[must_use]
    pub fn is_registered(&self, target: &Target) -> bool {
        self.targets.contains_key(&TargetId::of(target))
    }

    /// Static handles followed by instance handles in creation order.
    pub fn all_handles(&self) -> impl Iterator<Item = &MonitorHandle> {
        self.static_handles.iter().chain(&self.instance_handles)
    }

    #[must_use]
    pub fn static_handles(&self) -> &[MonitorHandle] {
        &self.static_handles
    }

    #[must_use]
    pub fn instance_handles(&self) -> &[MonitorHandle] {
        &self.instance_handles
    }

    pub fn handles_with_tag<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a MonitorHandle> + 'a {
        self.all_handles().filter(move |h| h.format().has_tag(tag))
    }

    #[must_use]
    pub fn handle_by_id(&self, id: HandleId) -> Option<&MonitorHandle> {
        self.all_handles().find(|h| h.id() == id)
    }

    /// Groups the current handles for an overlay.
    #[must_use]
    pub fn snapshot(&self, filter: &OverlayFilter) -> OverlaySnapshot {
        OverlaySnapshot::capture(self.all_handles(), filter)
    }

    /// Profile registry, available once startup completed.
    #[must_use]
    pub fn registry(&self) -> Option<&Arc<ProfileRegistry>> {
        self.registry.as_ref()
    }

    /// Sender for registering targets from other threads.
    #[must_use]
    pub fn remote(&self) -> RegistrationSender {
        RegistrationSender::new(self.remote_tx.clone())
    }

    #[must_use]
    pub const fn events(&self) -> &MonitoringEvents {
        &self.events
    }

    #[must_use]
    pub const fn id(&self) -> ContextId {
        self.id
    }

    #[must_use]
    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    #[must_use]
    pub const fn startup_state(&self) -> StartupState {
        self.state
    }

    /// Handles the dispatcher refreshes every tick.
    #[must_use]
    pub fn polled_count(&self) -> usize {
        self.dispatcher.polled_count()
    }

    /// Handles whose show-if condition is re-evaluated every tick.
    #[must_use]
    pub fn validated_count(&self) -> usize {
        self.dispatcher.validated_count()
    }

    /// Cancels a running scan and disposes every handle.
    pub fn shutdown(&mut self) {
        if self.state == StartupState::ShutDown {
            return;
        }
        self.cancel.cancel();
        if let Some(mut scan) = self.background.take() {
            scan.join();
        }

        let mut disposed = 0;
        for handle in self.static_handles.iter().chain(&self.instance_handles) {
            if handle.dispose() {
                self.events.handle_disposed().invoke(handle);
                disposed += 1;
            }
        }
        self.static_handles.clear();
        self.instance_handles.clear();
        self.targets.clear();
        self.pending.clear();
        self.dispatcher.clear();
        self.remote_rx = None;
        self.state = StartupState::ShutDown;
        tracing::info!(context = %self.id, disposed, "monitoring context shut down");
    }
}

impl Drop for MonitoringContext {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for MonitoringContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitoringContext")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("static_handles", &self.static_handles.len())
            .field("instance_handles", &self.instance_handles.len())
            .field("targets", &self.targets.len())
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}
