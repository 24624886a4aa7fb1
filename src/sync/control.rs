//! Run / step / breakpoint / cancel control, evaluated at every instruction
//! boundary.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::bridge::{Disposition, HostBridge, Wait};
use crate::sync::operator::Operator;
use crate::sync::slot::{ResumeKind, Shared};

/// Disposition of the emulator after a boundary check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// Execute without stopping.
    Run,
    /// Stop at every boundary or armed breakpoint.
    StepBreak,
    /// Terminal. Nothing more executes.
    Halted,
}

/// The per-boundary state machine.
pub struct ExecutionController {
    shared: Arc<Shared>,
    mode: Mode,
    at_first_instruction: bool,
    suspensions: u64,
}

impl ExecutionController {
    /// Attach a controller to an operator endpoint.
    pub fn attach(operator: &Operator) -> Self {
        Self {
            shared: Arc::clone(&operator.shared),
            mode: Mode::Run,
            at_first_instruction: true,
            suspensions: 0,
        }
    }

    /// Decide whether the instruction at `pc` may execute.
    ///
    /// May suspend, polling `bridge` until the operator resumes or cancels.
    /// The core must not execute the instruction when this returns
    /// [`Mode::Halted`].
    pub fn at_boundary<B: HostBridge + ?Sized>(&mut self, bridge: &mut B, pc: u64) -> Mode {
        if self.mode == Mode::Halted {
            return Mode::Halted;
        }
        if self.shared.cancel_requested() {
            return self.halt(pc);
        }

        let armed = bridge.poll_breakpoint_armed(pc);
        let disposition = bridge.poll_disposition();
        if disposition == Disposition::HaltRequested {
            self.shared.request_cancel();
            return self.halt(pc);
        }

        if self.at_first_instruction && !armed {
            self.at_first_instruction = false;
            self.discard_stale_resume();
            self.mode = match disposition {
                Disposition::Step => Mode::StepBreak,
                _ => Mode::Run,
            };
            return self.mode;
        }
        self.at_first_instruction = false;

        if disposition != Disposition::Step && !armed {
            self.discard_stale_resume();
            self.mode = Mode::Run;
            return self.mode;
        }

        let resume = match self.shared.take_resume() {
            Some(resume) => resume,
            None => match self.suspend(bridge, pc) {
                Some(resume) => resume,
                None => return self.halt(pc),
            },
        };

        self.mode = match resume {
            ResumeKind::Continue => Mode::Run,
            ResumeKind::SingleStep => Mode::StepBreak,
            ResumeKind::Cancel => {
                self.shared.request_cancel();
                return self.halt(pc);
            }
        };
        debug!(pc, ?resume, mode = ?self.mode, "resumed");
        self.mode
    }

    /// Poll until a resume signal or cancellation. `None` means cancelled.
    fn suspend<B: HostBridge + ?Sized>(&mut self, bridge: &mut B, pc: u64) -> Option<ResumeKind> {
        self.suspensions += 1;
        debug!(pc, "suspended at boundary");
        loop {
            // Cancellation wins over a resume that raced in alongside it.
            if self.shared.cancel_requested() {
                return None;
            }
            if let Some(resume) = self.shared.take_resume() {
                return Some(resume);
            }
            if bridge.poll_disposition() == Disposition::HaltRequested {
                self.shared.request_cancel();
                return None;
            }
            bridge.sleep_slice(Wait::Resume { pc });
        }
    }

    fn discard_stale_resume(&self) {
        if let Some(stale) = self.shared.take_resume() {
            debug!(?stale, "dropping resume signal that arrived while running");
        }
    }

    fn halt(&mut self, pc: u64) -> Mode {
        if self.mode != Mode::Halted {
            info!(pc, "emulation cancelled, tearing down");
        }
        self.mode = Mode::Halted;
        Mode::Halted
    }

    /// Mode decided at the last boundary.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_halted(&self) -> bool {
        self.mode == Mode::Halted
    }

    /// Whether the operator has asked for teardown.
    pub fn cancel_requested(&self) -> bool {
        self.shared.cancel_requested()
    }

    /// Number of boundaries at which the controller actually waited.
    pub fn suspensions(&self) -> u64 {
        self.suspensions
    }
}

impl std::fmt::Debug for ExecutionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionController")
            .field("mode", &self.mode)
            .field("at_first_instruction", &self.at_first_instruction)
            .field("suspensions", &self.suspensions)
            .finish()
    }
}
