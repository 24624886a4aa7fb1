//! Bridge for an operator running on another thread.

use std::thread;
use std::time::Duration;

use crate::bridge::{Breakpoints, Disposition, HostBridge, Wait};
use crate::sync::Operator;

/// Sleeps one quantum per slice; the operator acts from elsewhere.
#[derive(Debug, Clone)]
pub struct SleepBridge {
    operator: Operator,
    /// Breakpoints checked at each boundary.
    pub breakpoints: Breakpoints,
    quantum: Duration,
}

impl SleepBridge {
    pub fn new(operator: &Operator, quantum: Duration) -> Self {
        Self {
            operator: operator.clone(),
            breakpoints: Breakpoints::new(),
            quantum,
        }
    }

    pub fn with_breakpoints(mut self, breakpoints: Breakpoints) -> Self {
        self.breakpoints = breakpoints;
        self
    }
}

impl HostBridge for SleepBridge {
    fn poll_disposition(&mut self) -> Disposition {
        self.operator.disposition()
    }

    fn poll_breakpoint_armed(&mut self, pc: u64) -> bool {
        self.breakpoints.contains(pc)
    }

    fn sleep_slice(&mut self, _wait: Wait) {
        thread::sleep(self.quantum);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HostError;
    use crate::sync::{HostLink, Mode, ResumeKind, ValueKind, Xlen};
    use std::time::Instant;

    const QUANTUM: Duration = Duration::from_millis(1);

    fn wait_until(mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(Instant::now() < deadline, "operator thread timed out");
            thread::sleep(QUANTUM);
        }
    }

    #[test]
    fn test_values_cross_threads() {
        let (mut link, op) = HostLink::new(Xlen::Rv32, Disposition::Run);
        let mut bridge = SleepBridge::new(&op, QUANTUM);

        let remote = op.clone();
        let handle = thread::spawn(move || {
            wait_until(|| remote.awaiting() == Some(ValueKind::Int));
            remote.deliver_int(1234);
            wait_until(|| remote.awaiting() == Some(ValueKind::String));
            remote.deliver_string("from another thread");
            wait_until(|| remote.awaiting() == Some(ValueKind::Double));
            remote.deliver_double(6.02e23);
        });

        assert_eq!(link.input.request::<i32, _>(&mut bridge), Ok(1234));
        assert_eq!(
            link.input.request_string(&mut bridge),
            Ok("from another thread")
        );
        assert_eq!(link.input.request::<f64, _>(&mut bridge), Ok(6.02e23));
        handle.join().unwrap();
    }

    #[test]
    fn test_step_signals_cross_threads() {
        let (mut link, op) = HostLink::new(Xlen::Rv64, Disposition::Step);
        let mut bridge = SleepBridge::new(&op, QUANTUM);
        link.control.at_boundary(&mut bridge, 0);

        let remote = op.clone();
        let handle = thread::spawn(move || {
            for _ in 0..3 {
                remote.resume(ResumeKind::SingleStep);
                // Wait for the emulator to consume the signal before the next.
                wait_until(|| !remote.resume_pending());
            }
        });

        for pc in [4, 8, 12] {
            assert_eq!(link.control.at_boundary(&mut bridge, pc), Mode::StepBreak);
        }
        handle.join().unwrap();
    }

    #[test]
    fn test_cancel_releases_input_wait() {
        let (mut link, op) = HostLink::new(Xlen::Rv32, Disposition::Run);
        let mut bridge = SleepBridge::new(&op, QUANTUM);

        let remote = op.clone();
        let handle = thread::spawn(move || {
            wait_until(|| remote.awaiting() == Some(ValueKind::Char));
            remote.cancel();
        });

        assert_eq!(
            link.input.request::<char, _>(&mut bridge),
            Err(HostError::Cancelled)
        );
        assert_eq!(link.control.at_boundary(&mut bridge, 0), Mode::Halted);
        handle.join().unwrap();
    }
}
