//! Method handles: invoke on every refresh and always raise.

use crate::profile::ProfileAccess;

use super::MonitorHandle;

impl MonitorHandle {
    /// Methods may have side effects, so nothing is invoked before the
    /// first refresh.
    pub(super) fn initial_label(&self) {
        let label = self.inner.profile.format.label.clone();
        self.lock().text = label;
    }

    /// Renders the return value followed by one line per out-parameter.
    pub(super) fn refresh_method(&self) {
        let profile = &self.inner.profile;
        let ProfileAccess::Method { out_slots, .. } = &profile.access else {
            return;
        };
        let output = match profile.call(self.target_ref()) {
            Ok(output) => output,
            Err(err) => {
                self.fault(&err);
                return;
            }
        };
        let outs = output.outs;
        self.publish(output.ret, |ret, out| {
            profile.processor.process_into(ret, out)?;
            for (slot, value) in out_slots.iter().zip(&outs) {
                out.push('\n');
                slot.processor.process_into(value, out)?;
            }
            Ok(())
        });
    }
}
