//! Operator application state and key handling.

use std::collections::VecDeque;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::asm::listing_line;
use crate::bridge::{deliver_parsed, Breakpoints, Disposition, Wait};
use crate::cpu::instruction::INSTRUCTION_BYTES;
use crate::cpu::Instruction;
use crate::sync::{DeliveryOutcome, Operator, ResumeKind};

/// Lines of program output kept for the output pane.
const OUTPUT_LINES: usize = 500;

/// Operator application state.
pub struct OperatorApp {
    operator: Operator,
    /// Program being run, for the listing pane.
    pub program: Vec<Instruction>,
    /// Breakpoints (by address).
    pub breakpoints: Breakpoints,
    /// Boundary the core last reported.
    pub pc: Option<u64>,
    /// What the core is parked on, if anything.
    pub waiting: Option<Wait>,
    /// Text typed for an awaited value.
    pub input: String,
    /// Program output.
    pub output: VecDeque<String>,
    /// Status message to display.
    pub status: String,
    /// Listing line the cursor is on.
    pub selected: usize,
    /// The core has stopped; keys only browse until quit.
    pub finished: bool,
    /// Should we quit?
    pub should_quit: bool,
}

impl OperatorApp {
    pub fn new(operator: &Operator, program: Vec<Instruction>, breakpoints: Breakpoints) -> Self {
        Self {
            operator: operator.clone(),
            program,
            breakpoints,
            pc: None,
            waiting: None,
            input: String::new(),
            output: VecDeque::new(),
            status: "Ready. s: step  r: run  p: pause  b: breakpoint  q: quit".into(),
            selected: 0,
            finished: false,
            should_quit: false,
        }
    }

    pub fn operator(&self) -> &Operator {
        &self.operator
    }

    /// Append a line of program output.
    pub fn push_output(&mut self, text: &str) {
        for line in text.lines() {
            if self.output.len() == OUTPUT_LINES {
                self.output.pop_front();
            }
            self.output.push_back(line.to_string());
        }
    }

    /// Record the boundary the core has reached.
    pub fn reached(&mut self, pc: u64) {
        self.pc = Some(pc);
        self.waiting = None;
    }

    /// The core is parked on `wait`.
    pub fn park(&mut self, wait: Wait) {
        if self.waiting != Some(wait) {
            self.status = match wait {
                Wait::Resume { pc } => format!("Stopped at {pc:#010x}"),
                Wait::Value(kind) => format!("Program wants a {kind}; type it and press Enter"),
            };
            if let Wait::Resume { pc } = wait {
                self.selected = (pc / INSTRUCTION_BYTES) as usize;
            }
        }
        self.waiting = Some(wait);
    }

    /// Stop accepting execution commands.
    pub fn finish(&mut self, status: String) {
        self.finished = true;
        self.waiting = None;
        self.status = format!("{status}. Press q to leave.");
    }

    /// Handle one key press.
    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.quit();
            return;
        }
        if let Some(Wait::Value(_)) = self.waiting {
            if self.edit_input(key.code) {
                return;
            }
        }

        match key.code {
            KeyCode::Char('q') => self.quit(),
            KeyCode::Char('s') if !self.finished => self.step(),
            KeyCode::Char('r' | 'c') if !self.finished => self.run(),
            KeyCode::Char('p') if !self.finished => self.pause(),
            KeyCode::Char('b') => self.toggle_breakpoint(),
            KeyCode::Up => self.selected = self.selected.saturating_sub(1),
            KeyCode::Down => {
                if self.selected + 1 < self.program.len() {
                    self.selected += 1;
                }
            }
            _ => {}
        }
    }

    /// Line editing while a value is awaited. Returns whether the key was used.
    fn edit_input(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Char(c) => self.input.push(c),
            KeyCode::Backspace => {
                self.input.pop();
            }
            KeyCode::Esc => self.input.clear(),
            KeyCode::Enter => self.submit(),
            _ => return false,
        }
        true
    }

    fn submit(&mut self) {
        let Some(Wait::Value(kind)) = self.waiting else {
            return;
        };
        match deliver_parsed(&self.operator, kind, &self.input) {
            Some(DeliveryOutcome::Accepted) => {
                self.status = format!("Sent {kind} {}", self.input.trim());
                self.waiting = None;
                self.input.clear();
            }
            Some(DeliveryOutcome::Discarded) => {
                self.status = "Program is no longer waiting".into();
                self.waiting = None;
                self.input.clear();
            }
            None => self.status = format!("Not a valid {kind}: {}", self.input.trim()),
        }
    }

    /// Step one instruction.
    pub fn step(&mut self) {
        self.operator.set_disposition(Disposition::Step);
        if let Some(Wait::Resume { .. }) = self.waiting {
            self.operator.resume(ResumeKind::SingleStep);
            self.waiting = None;
        }
        self.status = "Stepping".into();
    }

    /// Run until halt or breakpoint.
    pub fn run(&mut self) {
        self.operator.set_disposition(Disposition::Run);
        if let Some(Wait::Resume { .. }) = self.waiting {
            self.operator.resume(ResumeKind::Continue);
            self.waiting = None;
        }
        self.status = "Running...".into();
    }

    /// Stop at the next boundary.
    pub fn pause(&mut self) {
        self.operator.set_disposition(Disposition::Step);
        self.status = "Pausing".into();
    }

    /// Toggle breakpoint at the selected line.
    pub fn toggle_breakpoint(&mut self) {
        let addr = self.selected as u64 * INSTRUCTION_BYTES;
        self.status = if self.breakpoints.toggle(addr) {
            format!("Set breakpoint at {addr:#010x}")
        } else {
            format!("Removed breakpoint at {addr:#010x}")
        };
    }

    fn quit(&mut self) {
        if self.finished {
            self.should_quit = true;
        } else {
            self.operator.cancel();
            self.status = "Cancelled".into();
        }
    }

    /// Listing lines: (address, text, is_current, has_breakpoint).
    pub fn listing(&self) -> Vec<(u64, String, bool, bool)> {
        self.program
            .iter()
            .enumerate()
            .map(|(index, instr)| {
                let addr = index as u64 * INSTRUCTION_BYTES;
                (
                    addr,
                    listing_line(index, instr),
                    self.pc == Some(addr),
                    self.breakpoints.contains(addr),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::assemble;
    use crate::sync::{HostInputChannel, ValueKind};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn app() -> (OperatorApp, Operator) {
        let op = Operator::new(Disposition::Step);
        let program = assemble("readi x5\nprint x5\nhalt").unwrap();
        (OperatorApp::new(&op, program, Breakpoints::new()), op)
    }

    #[test]
    fn test_step_resumes_only_when_parked() {
        let (mut app, op) = app();
        app.handle_key(key(KeyCode::Char('s')));
        assert!(!op.resume_pending());

        app.park(Wait::Resume { pc: 4 });
        app.handle_key(key(KeyCode::Char('s')));
        assert!(op.resume_pending());
        assert_eq!(app.waiting, None);
    }

    #[test]
    fn test_run_and_pause_set_disposition() {
        let (mut app, op) = app();
        app.handle_key(key(KeyCode::Char('r')));
        assert_eq!(op.disposition(), Disposition::Run);
        app.handle_key(key(KeyCode::Char('p')));
        assert_eq!(op.disposition(), Disposition::Step);
    }

    #[test]
    fn test_typed_value_is_delivered() {
        let (mut app, op) = app();
        let mut input = HostInputChannel::attach(&op);
        input.issue(ValueKind::Int).unwrap();
        app.park(Wait::Value(ValueKind::Int));

        for c in "4x".chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
        app.handle_key(key(KeyCode::Enter));
        assert!(app.status.starts_with("Not a valid int"));

        app.handle_key(key(KeyCode::Backspace));
        app.handle_key(key(KeyCode::Char('2')));
        app.handle_key(key(KeyCode::Enter));
        assert_eq!(input.try_take::<i32>(), Some(42));
        assert_eq!(app.waiting, None);
        assert!(app.input.is_empty());
    }

    #[test]
    fn test_q_is_text_while_typing() {
        let (mut app, op) = app();
        app.park(Wait::Value(ValueKind::String));
        app.handle_key(key(KeyCode::Char('q')));
        assert_eq!(app.input, "q");
        assert!(!op.is_cancelled());

        app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(op.is_cancelled());
    }

    #[test]
    fn test_quit_cancels_then_leaves() {
        let (mut app, op) = app();
        app.handle_key(key(KeyCode::Char('q')));
        assert!(op.is_cancelled());
        assert!(!app.should_quit);

        app.finish("Halted".into());
        app.handle_key(key(KeyCode::Char('q')));
        assert!(app.should_quit);
    }

    #[test]
    fn test_breakpoint_at_selection() {
        let (mut app, _) = app();
        app.handle_key(key(KeyCode::Down));
        app.handle_key(key(KeyCode::Char('b')));
        assert!(app.breakpoints.contains(4));
        let listing = app.listing();
        assert!(listing[1].3);
        assert!(!listing[0].3);
    }

    #[test]
    fn test_output_is_bounded() {
        let (mut app, _) = app();
        for i in 0..OUTPUT_LINES + 10 {
            app.push_output(&i.to_string());
        }
        assert_eq!(app.output.len(), OUTPUT_LINES);
        assert_eq!(app.output.front().map(String::as_str), Some("10"));
    }
}
