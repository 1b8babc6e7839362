//! Field and property handles: polled or pushed reads with a dirty check,
//! and writes.

use std::sync::Arc;

use crate::error::AccessError;
use crate::reflect::guard;
use crate::value::Value;

use super::MonitorHandle;

impl MonitorHandle {
    /// Reads and formats the initial state without raising events.
    pub(super) fn initial_read(&self) {
        let profile = &self.inner.profile;
        let value = match profile.read(self.target_ref()) {
            Ok(value) => value,
            Err(err) => {
                self.fault(&err);
                return;
            }
        };
        let mut text = String::new();
        match guard(|| profile.processor.process_into(&value, &mut text)) {
            Ok(()) => {
                let mut state = self.lock();
                state.text = text;
                state.last_value = Some(value);
            }
            Err(err) => self.fault(&err),
        }
    }

    /// Replaces polling with the member's update event, if it has one.
    pub(super) fn subscribe_update_event(&self) {
        let Some(event) = &self.inner.profile.update_event else {
            return;
        };
        let weak = self.weak();
        let listener = Arc::new(move |args: &[Value]| {
            let Some(handle) = Self::from_weak(&weak) else {
                return;
            };
            if !handle.is_enabled() {
                return;
            }
            match args.first() {
                Some(value) => handle.accept(value.clone()),
                None => handle.refresh(),
            }
        });
        if let Err(err) = self.subscribe_to(event, listener) {
            self.fault(&err);
        }
    }

    pub(super) fn refresh_value(&self) {
        match self.inner.profile.read(self.target_ref()) {
            Ok(value) => self.accept(value),
            Err(err) => self.fault(&err),
        }
    }

    /// Publishes `value` unless it equals the last observed value.
    fn accept(&self, value: Value) {
        {
            let state = self.lock();
            if state.faulted || state.disposed || state.writes > 0 {
                return;
            }
            if state.last_value.as_ref().is_some_and(|last| last.same_as(&value)) {
                return;
            }
        }
        self.publish_value(value);
    }

    fn publish_value(&self, value: Value) {
        let processor = &self.inner.profile.processor;
        self.publish(value, |value, out| processor.process_into(value, out));
    }

    /// Writes the member and raises `value_updated` exactly once with the
    /// state read back after the write, whether or not it changed. An update
    /// event fired by the setter does not publish on its own.
    ///
    /// # Errors
    ///
    /// [`AccessError::Disposed`] and [`AccessError::NotWritable`] when the
    /// handle cannot write, [`AccessError::TypeMismatch`] when `value` does
    /// not fit the member. A failing setter or read-back faults the handle
    /// and its error is returned.
    pub fn set_value(&self, value: Value) -> Result<(), AccessError> {
        let profile = &self.inner.profile;
        if self.is_disposed() {
            return Err(AccessError::Disposed {
                id: self.inner.id.get(),
            });
        }
        if !profile.is_writable() {
            return Err(AccessError::NotWritable {
                member: profile.name.clone(),
            });
        }
        if !value.fits(&profile.value_type) {
            return Err(AccessError::TypeMismatch {
                member: profile.name.clone(),
                expected: profile.value_type.to_string(),
                actual: value.type_name().to_string(),
            });
        }

        self.lock().writes += 1;
        let written = profile
            .write(self.target_ref(), &value)
            .and_then(|()| profile.read(self.target_ref()));
        self.lock().writes -= 1;
        match written {
            Ok(current) => {
                self.publish_value(current);
                Ok(())
            }
            Err(err) => {
                self.fault(&err);
                Err(err)
            }
        }
    }
}
