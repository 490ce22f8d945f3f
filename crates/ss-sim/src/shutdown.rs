//! Host shutdown latch.

use std::cell::RefCell;
use std::rc::Rc;

use ss_controls::FaultSink;

/// Records the first shutdown request; once set the host stops running
/// timers. Clones share the same latch.
#[derive(Debug, Clone, Default)]
pub struct ShutdownLatch(Rc<RefCell<Option<String>>>);

impl ShutdownLatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_shutdown(&self) -> bool {
        self.0.borrow().is_some()
    }

    pub fn message(&self) -> Option<String> {
        self.0.borrow().clone()
    }
}

impl FaultSink for ShutdownLatch {
    fn invoke_shutdown(&mut self, message: &str) {
        let mut slot = self.0.borrow_mut();
        if slot.is_none() {
            tracing::debug!("Host shutdown latched: {}", message);
            *slot = Some(message.to_string());
        }
    }
}
