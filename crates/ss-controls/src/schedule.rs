//! Host scheduler and shutdown collaborators.

use ss_core::Time;

use crate::error::{Fatal, PropagationFault, TransientReadFault};

/// Prefix on every message the controller hands to the host.
pub const LOG_PREFIX: &str = "StageSync";

/// Opaque handle of a registered timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(pub u64);

/// Timer callback: receives the wake time, returns the next one
/// ([`crate::NEVER`] to stop).
pub type TimerCallback = Box<dyn FnMut(Time) -> Time>;

/// Host reactor that invokes periodic callbacks.
///
/// Callbacks are serialized by the host; a callback is never re-entered.
pub trait Scheduler {
    fn register_periodic(&mut self, first_run: Time, callback: TimerCallback) -> TimerHandle;

    fn unregister(&mut self, handle: TimerHandle);
}

/// Host shutdown collaborator.
///
/// Used only for configuration and resolution faults; after it has been
/// invoked the host does not run the controller again.
pub trait FaultSink {
    fn invoke_shutdown(&mut self, message: &str);
}

impl<F: FaultSink + ?Sized> FaultSink for &mut F {
    fn invoke_shutdown(&mut self, message: &str) {
        (**self).invoke_shutdown(message)
    }
}

/// Log a fatal fault and hand it to the host's shutdown sink.
pub fn escalate<F: FaultSink + ?Sized>(sink: &mut F, fault: &Fatal) {
    let message = format!("{LOG_PREFIX}: {fault}");
    tracing::error!("{}", message);
    sink.invoke_shutdown(&message);
}

/// Non-fatal path for one stage's failed command.
pub fn report_propagation_fault(fault: &PropagationFault) {
    tracing::warn!("{}: {}", LOG_PREFIX, fault);
}

/// Non-fatal path for an unusable primary reading. Logged at warn level;
/// the next tick retries.
pub fn report_transient_read(primary: &str, fault: &TransientReadFault) {
    match fault {
        TransientReadFault::ReadFailed(err) => {
            tracing::warn!("{}: error reading heater {}: {}", LOG_PREFIX, primary, err)
        }
        _ => tracing::warn!("{}: {} for {}, retrying", LOG_PREFIX, fault, primary),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigFault;
    use ss_core::StageId;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Captured {
        type Writer = Captured;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    /// Output of `f` with only warn-and-above events enabled.
    fn warnings(f: impl FnOnce()) -> String {
        let captured = Captured::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(captured.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = captured.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[derive(Default)]
    struct Latch {
        messages: Vec<String>,
    }

    impl FaultSink for Latch {
        fn invoke_shutdown(&mut self, message: &str) {
            self.messages.push(message.to_string());
        }
    }

    #[test]
    fn escalate_prefixes_message() {
        let mut latch = Latch::default();
        let fault = Fatal::Config(ConfigFault::RatioOutOfBounds {
            stage_id: StageId::new("left"),
            ratio: 3.0,
        });
        escalate(&mut latch, &fault);
        assert_eq!(
            latch.messages,
            ["StageSync: temp_ratio for stage 'left' is out of bounds: 3"]
        );
    }

    #[test]
    fn unusable_targets_are_warnings() {
        for fault in [
            TransientReadFault::NoTarget,
            TransientReadFault::InvalidTarget { target: -5.0 },
            TransientReadFault::ReadFailed(crate::error::SourceError::new("timeout")),
        ] {
            let out = warnings(|| report_transient_read("extruder", &fault));
            assert!(out.contains("WARN"), "{out}");
            assert!(out.contains("extruder"), "{out}");
        }
    }
}
