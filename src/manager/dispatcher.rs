//! Per-frame update dispatcher.
//!
//! Handles never touch the tick lists directly. They enqueue
//! [`TickCommand`]s on an unbounded channel and the dispatcher applies
//! them at the start and end of every phase, so a handle may enable,
//! disable or dispose itself from inside a refresh.

use std::collections::HashSet;

use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::Serialize;

use crate::handle::{HandleId, MonitorHandle};

/// Membership change for one of the tick lists.
#[derive(Debug)]
pub(crate) enum TickCommand {
    Refresh(MonitorHandle),
    StopRefresh(HandleId),
    Validate(MonitorHandle),
    StopValidate(HandleId),
}

/// Work done by one [`UpdateDispatcher::tick`].
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub refreshed: usize,
    pub validated: usize,
}

#[derive(Debug, Default)]
struct TickList {
    handles: Vec<MonitorHandle>,
    ids: HashSet<HandleId>,
}

impl TickList {
    fn add(&mut self, handle: MonitorHandle) {
        if self.ids.insert(handle.id()) {
            self.handles.push(handle);
        }
    }

    fn remove(&mut self, id: HandleId) {
        if self.ids.remove(&id) {
            self.handles.retain(|h| h.id() != id);
        }
    }

    fn clear(&mut self) {
        self.handles.clear();
        self.ids.clear();
    }
}

/// Owns the polled-refresh and polled-validation lists.
#[derive(Debug)]
pub(crate) struct UpdateDispatcher {
    refresh: TickList,
    validate: TickList,
    sender: Sender<TickCommand>,
    receiver: Receiver<TickCommand>,
}

impl Default for UpdateDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdateDispatcher {
    pub(crate) fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            refresh: TickList::default(),
            validate: TickList::default(),
            sender,
            receiver,
        }
    }

    /// Sender handed to every handle created by the owning context.
    pub(crate) fn sender(&self) -> Sender<TickCommand> {
        self.sender.clone()
    }

    /// Applies queued membership changes in arrival order.
    pub(crate) fn apply(&mut self) {
        while let Ok(command) = self.receiver.try_recv() {
            match command {
                TickCommand::Refresh(handle) => self.refresh.add(handle),
                TickCommand::StopRefresh(id) => self.refresh.remove(id),
                TickCommand::Validate(handle) => self.validate.add(handle),
                TickCommand::StopValidate(id) => self.validate.remove(id),
            }
        }
    }

    /// Validates every polled validator, then refreshes every polled handle.
    pub(crate) fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();

        self.apply();
        for handle in &self.validate.handles {
            handle.validate();
            report.validated += 1;
        }

        self.apply();
        for handle in &self.refresh.handles {
            handle.refresh();
            report.refreshed += 1;
        }

        self.apply();
        report
    }

    /// Drops every list entry and any queued command.
    pub(crate) fn clear(&mut self) {
        self.apply();
        self.refresh.clear();
        self.validate.clear();
    }

    pub(crate) fn polled_count(&self) -> usize {
        self.refresh.handles.len()
    }

    pub(crate) fn validated_count(&self) -> usize {
        self.validate.handles.len()
    }
}
