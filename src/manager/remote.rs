//! Cross-thread registration.
//!
//! Targets created on worker threads are registered through a
//! [`RegistrationSender`]; the owning context applies the queued commands
//! on its next tick.

use crossbeam_channel::Sender;

use crate::error::{MonitorError, MonitorResult};
use crate::target::Target;

#[derive(Debug)]
pub(crate) enum RemoteCommand {
    Register(Target),
    Unregister(Target),
}

/// Thread-safe handle for queueing registrations on a context.
#[derive(Debug, Clone)]
pub struct RegistrationSender {
    tx: Sender<RemoteCommand>,
}

impl RegistrationSender {
    pub(crate) fn new(tx: Sender<RemoteCommand>) -> Self {
        Self { tx }
    }

    /// Queues `target` for registration on the next tick.
    ///
    /// # Errors
    ///
    /// [`MonitorError::State`] if the context has shut down.
    pub fn register(&self, target: Target) -> MonitorResult<()> {
        self.send(RemoteCommand::Register(target))
    }

    /// Queues `target` for unregistration on the next tick.
    ///
    /// # Errors
    ///
    /// [`MonitorError::State`] if the context has shut down.
    pub fn unregister(&self, target: Target) -> MonitorResult<()> {
        self.send(RemoteCommand::Unregister(target))
    }

    fn send(&self, command: RemoteCommand) -> MonitorResult<()> {
        self.tx
            .send(command)
            .map_err(|_| MonitorError::state("monitoring context has shut down"))
    }
}
