//! Show-if gating of handles.

use std::sync::Arc;

use crate::error::AccessError;
use crate::manager::dispatcher::TickCommand;
use crate::profile::{ProfileAccess, Validator};
use crate::reflect::guard;
use crate::value::Value;

use super::MonitorHandle;

impl MonitorHandle {
    /// Wires the validator and returns the initial visibility.
    ///
    /// An event-driven validator subscribes to its toggle event and is
    /// never polled; its predicate, if any, only supplies the initial
    /// state.
    pub(super) fn setup_validator(&self) -> bool {
        let Some(validator) = &self.inner.profile.validator else {
            return true;
        };
        let initial = if validator.has_predicate() {
            self.evaluate(validator).unwrap_or_else(|err| {
                self.fault(&err);
                false
            })
        } else {
            true
        };

        if let Some(event) = validator.event() {
            let weak = self.weak();
            let listener = Arc::new(move |args: &[Value]| {
                let Some(handle) = Self::from_weak(&weak) else {
                    return;
                };
                if let Some(visible) = args.first().and_then(Value::as_bool) {
                    handle.apply_visibility(visible);
                }
            });
            if let Err(err) = self.subscribe_to(event, listener) {
                self.fault(&err);
            }
        } else if validator.is_polled() {
            self.send(TickCommand::Validate(self.clone()));
        }
        initial
    }

    fn evaluate(&self, validator: &Validator) -> Result<bool, AccessError> {
        let target = self.target_ref();
        if !validator.needs_value() {
            return guard(|| validator.evaluate(target, &Value::Null));
        }
        let value = match &self.inner.profile.access {
            ProfileAccess::Value { .. } => self.inner.profile.read(target)?,
            _ => self.value().unwrap_or_default(),
        };
        guard(|| validator.evaluate(target, &value))
    }

    /// Re-evaluates a polled validator. Failures fault the handle.
    pub(crate) fn validate(&self) {
        if !self.is_live() {
            return;
        }
        let Some(validator) = &self.inner.profile.validator else {
            return;
        };
        match self.evaluate(validator) {
            Ok(visible) => self.apply_visibility(visible),
            Err(err) => self.fault(&err),
        }
    }

    /// Validators never re-enable a faulted handle.
    fn apply_visibility(&self, visible: bool) {
        if self.is_live() {
            self.change_enabled(visible, false);
        }
    }
}
