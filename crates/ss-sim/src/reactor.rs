//! Single-threaded timer reactor.
//!
//! Timers are run earliest-deadline first; ties go to the timer registered
//! first. Each callback returns its next wake time, and [`NEVER`] retires
//! the timer. A timer whose next wake time does not advance past the
//! current one is retired as well.

use std::cell::Cell;
use std::rc::Rc;

use ss_controls::{NEVER, Scheduler, TimerCallback, TimerHandle};
use ss_core::Time;

use crate::shutdown::ShutdownLatch;

struct Timer {
    handle: TimerHandle,
    waketime: Time,
    callback: TimerCallback,
}

pub struct Reactor {
    clock: Rc<Cell<Time>>,
    timers: Vec<Timer>,
    next_handle: u64,
}

impl std::fmt::Debug for Reactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reactor")
            .field("now", &self.clock.get())
            .field("timers", &self.timers.len())
            .finish()
    }
}

impl Default for Reactor {
    fn default() -> Self {
        Self::new()
    }
}

impl Reactor {
    pub fn new() -> Self {
        Self {
            clock: Rc::new(Cell::new(0.0)),
            timers: Vec::new(),
            next_handle: 0,
        }
    }

    /// Shared view of the reactor clock.
    pub fn clock(&self) -> Rc<Cell<Time>> {
        Rc::clone(&self.clock)
    }

    pub fn now(&self) -> Time {
        self.clock.get()
    }

    pub fn pending(&self) -> usize {
        self.timers.len()
    }

    /// Run timers due at or before `t_end`.
    ///
    /// Stops early once `latch` records a shutdown. Returns the number of
    /// callbacks run; the clock ends at `t_end` unless stopped early.
    pub fn run_until(&mut self, t_end: Time, latch: &ShutdownLatch) -> usize {
        let mut fired = 0;
        loop {
            if latch.is_shutdown() {
                tracing::warn!("Reactor stopped by shutdown at {:.3}", self.now());
                return fired;
            }
            let Some(index) = self.next_due(t_end) else {
                break;
            };

            let now = self.timers[index].waketime.max(self.clock.get());
            self.clock.set(now);
            let timer = &mut self.timers[index];
            let next = (timer.callback)(now);
            fired += 1;

            if next == NEVER || next.is_nan() {
                self.timers.remove(index);
            } else if next <= now {
                tracing::error!(
                    "Timer {:?} did not advance ({} <= {}), retiring it",
                    timer.handle,
                    next,
                    now
                );
                self.timers.remove(index);
            } else {
                timer.waketime = next;
            }
        }
        if t_end > self.clock.get() {
            self.clock.set(t_end);
        }
        fired
    }

    fn next_due(&self, t_end: Time) -> Option<usize> {
        self.timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.waketime <= t_end)
            .min_by(|(_, a), (_, b)| {
                a.waketime
                    .total_cmp(&b.waketime)
                    .then(a.handle.cmp(&b.handle))
            })
            .map(|(i, _)| i)
    }
}

impl Scheduler for Reactor {
    fn register_periodic(&mut self, first_run: Time, callback: TimerCallback) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;
        self.timers.push(Timer {
            handle,
            waketime: first_run,
            callback,
        });
        handle
    }

    fn unregister(&mut self, handle: TimerHandle) {
        self.timers.retain(|t| t.handle != handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ss_controls::{FaultSink, NOW};
    use std::cell::RefCell;

    fn recorder(log: &Rc<RefCell<Vec<(u32, Time)>>>, tag: u32, period: Time) -> TimerCallback {
        let log = Rc::clone(log);
        Box::new(move |now| {
            log.borrow_mut().push((tag, now));
            now + period
        })
    }

    #[test]
    fn periodic_timers_interleave_by_deadline() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut reactor = Reactor::new();
        reactor.register_periodic(NOW, recorder(&log, 1, 1.0));
        reactor.register_periodic(0.5, recorder(&log, 2, 1.0));

        let fired = reactor.run_until(2.0, &ShutdownLatch::new());

        assert_eq!(fired, 5);
        assert_eq!(
            *log.borrow(),
            [(1, 0.0), (2, 0.5), (1, 1.0), (2, 1.5), (1, 2.0)]
        );
        assert_eq!(reactor.now(), 2.0);
    }

    #[test]
    fn ties_run_in_registration_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut reactor = Reactor::new();
        reactor.register_periodic(1.0, recorder(&log, 7, NEVER));
        reactor.register_periodic(1.0, recorder(&log, 3, NEVER));

        reactor.run_until(1.0, &ShutdownLatch::new());

        assert_eq!(*log.borrow(), [(7, 1.0), (3, 1.0)]);
        assert_eq!(reactor.pending(), 0);
    }

    #[test]
    fn unregistered_timer_never_fires() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut reactor = Reactor::new();
        let handle = reactor.register_periodic(NOW, recorder(&log, 1, 1.0));
        reactor.unregister(handle);

        assert_eq!(reactor.run_until(5.0, &ShutdownLatch::new()), 0);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn stalled_timer_is_retired() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut reactor = Reactor::new();
        reactor.register_periodic(1e18, recorder(&log, 1, 1.0));
        reactor.register_periodic(2.0, recorder(&log, 2, 0.0));

        let fired = reactor.run_until(2e18, &ShutdownLatch::new());

        // 1e18 + 1.0 == 1e18 in f64, and 2.0 + 0.0 == 2.0
        assert_eq!(fired, 2);
        assert_eq!(*log.borrow(), [(2, 2.0), (1, 1e18)]);
        assert_eq!(reactor.pending(), 0);
    }

    #[test]
    fn shutdown_stops_the_loop() {
        let latch = ShutdownLatch::new();
        let mut reactor = Reactor::new();
        let mut trip = latch.clone();
        reactor.register_periodic(
            1.0,
            Box::new(move |now| {
                trip.invoke_shutdown("boom");
                now + 1.0
            }),
        );

        let fired = reactor.run_until(10.0, &latch);

        assert_eq!(fired, 1);
        assert_eq!(reactor.now(), 1.0);
    }
}
