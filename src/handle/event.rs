//! Event handles: count invocations of a monitored event.

use std::fmt::Write;
use std::sync::Arc;

use crate::error::AccessError;
use crate::profile::{ProfileAccess, ResolvedEvent};
use crate::value::Value;

use super::MonitorHandle;

impl MonitorHandle {
    pub(super) fn subscribe_counter(&self, event: &ResolvedEvent) {
        let weak = self.weak();
        let listener = Arc::new(move |args: &[Value]| {
            if let Some(handle) = Self::from_weak(&weak) {
                handle.record_invocation(args);
            }
        });
        if let Err(err) = self.subscribe_to(event, listener) {
            self.fault(&err);
            return;
        }
        let mut text = String::new();
        if self.write_event_state(0, &[], &mut text).is_ok() {
            let mut state = self.lock();
            state.text = text;
            state.last_value = Some(Value::UInt(0));
        }
    }

    /// Every invocation is a visible change; no dirty check.
    fn record_invocation(&self, args: &[Value]) {
        let count = {
            let mut state = self.lock();
            if state.disposed {
                return;
            }
            state.invocations += 1;
            state.invocations
        };
        self.publish(Value::UInt(count), |_, out| self.write_event_state(count, args, out));
    }

    /// `Label: count (listeners: n) [args]`, where `n` excludes this handle.
    fn write_event_state(&self, count: u64, args: &[Value], out: &mut String) -> Result<(), AccessError> {
        let display = &self.inner.settings.display;
        self.inner.profile.processor.process_into(&Value::Null, out)?;
        let _ = write!(out, ": {count}");
        if display.show_event_subscribers {
            if let ProfileAccess::Event(event) = &self.inner.profile.access {
                let listeners = event.source(self.target_ref())?.listener_count();
                let _ = write!(out, " (listeners: {})", listeners.saturating_sub(1));
            }
        }
        if display.show_event_arguments && !args.is_empty() {
            out.push_str(" [");
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                let _ = write!(out, "{arg}");
            }
            out.push(']');
        }
        Ok(())
    }
}
