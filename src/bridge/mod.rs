//! Host bridges: the platform capability the synchronization layer polls.
//!
//! One trait, several backends:
//! - [`SleepBridge`]: sleeps a fixed quantum per slice while an operator on
//!   another thread drives the shared state
//! - [`ConsoleBridge`]: each slice is a genuine blocking line read
//! - `tui::TuiBridge`: each slice pumps one iteration of the terminal UI
//!   event loop (cooperative yield)

pub mod console;
pub mod sleep;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::sync::{DeliveryOutcome, Operator, ValueKind};

pub use console::ConsoleBridge;
pub use sleep::SleepBridge;

/// The operator's chosen execution mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Disposition {
    /// Run freely; stop only at armed breakpoints.
    Run,
    /// Stop at every instruction boundary.
    Step,
    /// Tear the session down at the next boundary.
    HaltRequested,
}

/// What a suspended caller is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    /// A resume signal at the boundary before `pc`.
    Resume { pc: u64 },
    /// A delivery into the given slot.
    Value(ValueKind),
}

/// Capability set supplied by the surrounding platform.
pub trait HostBridge {
    /// Current operator-chosen disposition. Re-read on every suspension
    /// iteration.
    fn poll_disposition(&mut self) -> Disposition;

    /// Whether `pc` carries an armed breakpoint.
    fn poll_breakpoint_armed(&mut self, pc: u64) -> bool;

    /// Give up one polling quantum. Must eventually let the caller re-check
    /// its slot or flag.
    fn sleep_slice(&mut self, wait: Wait);

    /// Output produced by the emulated program.
    fn print(&mut self, text: &str) {
        println!("{text}");
    }
}

/// Set of armed breakpoint addresses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breakpoints {
    armed: BTreeSet<u64>,
}

impl Breakpoints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&mut self, pc: u64) {
        self.armed.insert(pc);
    }

    /// Flip the breakpoint at `pc`; returns whether it is now armed.
    pub fn toggle(&mut self, pc: u64) -> bool {
        if self.armed.remove(&pc) {
            false
        } else {
            self.armed.insert(pc);
            true
        }
    }

    pub fn contains(&self, pc: u64) -> bool {
        self.armed.contains(&pc)
    }

    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.armed.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.armed.is_empty()
    }
}

impl FromIterator<u64> for Breakpoints {
    fn from_iter<I: IntoIterator<Item = u64>>(iter: I) -> Self {
        Self {
            armed: iter.into_iter().collect(),
        }
    }
}

/// Parse operator text for `kind` and deliver it.
///
/// Numbers take the first whitespace-delimited token, a char is the first
/// non-blank character and a string is the first word. Returns `None` if the
/// text does not parse, leaving the request outstanding.
pub fn deliver_parsed(operator: &Operator, kind: ValueKind, text: &str) -> Option<DeliveryOutcome> {
    let token = text.split_whitespace().next()?;
    match kind {
        ValueKind::Int => token.parse().ok().map(|v| operator.deliver_int(v)),
        ValueKind::Float => token.parse().ok().map(|v| operator.deliver_float(v)),
        ValueKind::Double => token.parse().ok().map(|v| operator.deliver_double(v)),
        ValueKind::Char => token.chars().next().map(|c| operator.deliver_char(c)),
        ValueKind::String => Some(operator.deliver_string(token)),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Deterministic bridge for unit tests: every slice runs the next
    //! scripted operator action.

    use std::collections::VecDeque;

    use super::*;
    use crate::sync::Operator;

    pub(crate) type Action = Box<dyn FnOnce(&Operator)>;

    pub(crate) struct ScriptedBridge {
        pub operator: Operator,
        pub breakpoints: Breakpoints,
        pub script: VecDeque<Action>,
        pub slices: Vec<Wait>,
        pub printed: Vec<String>,
    }

    impl ScriptedBridge {
        pub fn new(operator: &Operator) -> Self {
            Self {
                operator: operator.clone(),
                breakpoints: Breakpoints::new(),
                script: VecDeque::new(),
                slices: Vec::new(),
                printed: Vec::new(),
            }
        }

        pub fn then(mut self, action: impl FnOnce(&Operator) + 'static) -> Self {
            self.script.push_back(Box::new(action));
            self
        }
    }

    impl HostBridge for ScriptedBridge {
        fn poll_disposition(&mut self) -> Disposition {
            self.operator.disposition()
        }

        fn poll_breakpoint_armed(&mut self, pc: u64) -> bool {
            self.breakpoints.contains(pc)
        }

        fn sleep_slice(&mut self, wait: Wait) {
            self.slices.push(wait);
            match self.script.pop_front() {
                Some(action) => action(&self.operator),
                // An exhausted script stands for an operator who walked away.
                None => self.operator.cancel(),
            }
        }

        fn print(&mut self, text: &str) {
            self.printed.push(text.to_string());
        }
    }
}
