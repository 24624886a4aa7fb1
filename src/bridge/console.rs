//! Console operator: every polling slice is a blocking line read.
//!
//! The bridge acts as the operator itself. When the emulator waits for a
//! value, one line is read and parsed for the awaited datatype; when it waits
//! at a boundary, one line is read as a command:
//!
//! ```text
//! s | step | <empty>   single-step
//! c | continue         run until the next breakpoint
//! b <addr>             toggle a breakpoint
//! q | quit             cancel emulation
//! ```
//!
//! End of input is treated as the operator leaving, which cancels.

use std::io::{BufRead, Write};

use tracing::{debug, warn};

use crate::asm::parse_address;
use crate::bridge::{deliver_parsed, Breakpoints, Disposition, HostBridge, Wait};
use crate::sync::{Operator, ResumeKind, ValueKind};

/// Blocking-read bridge over any line source.
pub struct ConsoleBridge<R, W> {
    operator: Operator,
    /// Breakpoints checked at each boundary.
    pub breakpoints: Breakpoints,
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> ConsoleBridge<R, W> {
    pub fn new(operator: &Operator, input: R, output: W) -> Self {
        Self {
            operator: operator.clone(),
            breakpoints: Breakpoints::new(),
            input,
            output,
        }
    }

    pub fn with_breakpoints(mut self, breakpoints: Breakpoints) -> Self {
        self.breakpoints = breakpoints;
        self
    }

    /// Give back the output sink.
    pub fn into_output(self) -> W {
        self.output
    }

    fn say(&mut self, text: std::fmt::Arguments<'_>) {
        let written = self
            .output
            .write_fmt(text)
            .and_then(|()| self.output.flush());
        if let Err(e) = written {
            warn!("console output failed: {e}");
            self.operator.cancel();
        }
    }

    /// Read one line; `None` at end of input or on a read error.
    fn read_line(&mut self) -> Option<String> {
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) => {
                debug!("console input closed");
                None
            }
            Ok(_) => Some(line),
            Err(e) => {
                warn!("console read failed: {e}");
                None
            }
        }
    }

    fn answer_value(&mut self, kind: ValueKind) {
        self.say(format_args!("{kind}> "));
        let Some(line) = self.read_line() else {
            self.operator.cancel();
            return;
        };
        let delivered = deliver_parsed(&self.operator, kind, &line);
        if delivered.is_none() {
            self.say(format_args!("expected {kind}\n"));
        }
    }

    fn answer_resume(&mut self, pc: u64) {
        self.say(format_args!(
            "[{pc:#010x}] (s)tep (c)ontinue (b)reak <addr> (q)uit> "
        ));
        let Some(line) = self.read_line() else {
            self.operator.cancel();
            return;
        };
        let mut words = line.split_whitespace();
        match (words.next(), words.next()) {
            (None | Some("s" | "step"), _) => {
                self.operator.set_disposition(Disposition::Step);
                self.operator.resume(ResumeKind::SingleStep);
            }
            (Some("c" | "continue"), _) => {
                self.operator.set_disposition(Disposition::Run);
                self.operator.resume(ResumeKind::Continue);
            }
            (Some("q" | "quit"), _) => self.operator.cancel(),
            (Some("b" | "break"), Some(addr)) => match parse_address(addr) {
                Some(addr) => {
                    let armed = self.breakpoints.toggle(addr);
                    let verb = if armed { "set" } else { "removed" };
                    self.say(format_args!("breakpoint {verb} at {addr:#x}\n"));
                }
                None => self.say(format_args!("bad address: {addr}\n")),
            },
            (Some(other), _) => self.say(format_args!("unknown command: {other}\n")),
        }
    }
}

impl<R: BufRead, W: Write> HostBridge for ConsoleBridge<R, W> {
    fn poll_disposition(&mut self) -> Disposition {
        self.operator.disposition()
    }

    fn poll_breakpoint_armed(&mut self, pc: u64) -> bool {
        self.breakpoints.contains(pc)
    }

    fn sleep_slice(&mut self, wait: Wait) {
        match wait {
            Wait::Value(kind) => self.answer_value(kind),
            Wait::Resume { pc } => self.answer_resume(pc),
        }
    }

    fn print(&mut self, text: &str) {
        self.say(format_args!("{text}\n"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HostError;
    use crate::sync::{HostLink, Mode, Xlen};
    use std::io::Cursor;

    fn console(op: &Operator, input: &str) -> ConsoleBridge<Cursor<Vec<u8>>, Vec<u8>> {
        ConsoleBridge::new(op, Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    fn output(bridge: ConsoleBridge<Cursor<Vec<u8>>, Vec<u8>>) -> String {
        String::from_utf8(bridge.into_output()).unwrap()
    }

    #[test]
    fn test_reads_typed_values() {
        let (mut link, op) = HostLink::new(Xlen::Rv32, Disposition::Run);
        let mut bridge = console(&op, "42\n1.5\n2.25\n  x\nhello world\n");

        assert_eq!(link.input.request::<i32, _>(&mut bridge), Ok(42));
        assert_eq!(link.input.request::<f32, _>(&mut bridge), Ok(1.5));
        assert_eq!(link.input.request::<f64, _>(&mut bridge), Ok(2.25));
        assert_eq!(link.input.request::<char, _>(&mut bridge), Ok('x'));
        assert_eq!(link.input.request_string(&mut bridge), Ok("hello"));
    }

    #[test]
    fn test_reprompts_on_bad_value() {
        let (mut link, op) = HostLink::new(Xlen::Rv32, Disposition::Run);
        let mut bridge = console(&op, "abc\n\n-7\n");

        assert_eq!(link.input.request::<i32, _>(&mut bridge), Ok(-7));
        let out = output(bridge);
        assert_eq!(out.matches("int> ").count(), 3);
        assert_eq!(out.matches("expected int").count(), 2);
    }

    #[test]
    fn test_eof_cancels_input() {
        let (mut link, op) = HostLink::new(Xlen::Rv32, Disposition::Run);
        let mut bridge = console(&op, "");

        assert_eq!(
            link.input.request::<f64, _>(&mut bridge),
            Err(HostError::Cancelled)
        );
        assert!(op.is_cancelled());
    }

    #[test]
    fn test_step_then_continue() {
        let (mut link, op) = HostLink::new(Xlen::Rv32, Disposition::Step);
        let mut bridge = console(&op, "s\n\nc\n");

        assert_eq!(link.control.at_boundary(&mut bridge, 0), Mode::StepBreak);
        assert_eq!(link.control.at_boundary(&mut bridge, 4), Mode::StepBreak);
        assert_eq!(link.control.at_boundary(&mut bridge, 8), Mode::StepBreak);
        assert_eq!(link.control.at_boundary(&mut bridge, 12), Mode::Run);
        assert_eq!(link.control.at_boundary(&mut bridge, 16), Mode::Run);
        assert_eq!(link.control.suspensions(), 3);
    }

    #[test]
    fn test_breakpoint_command_rejects_negative_address() {
        let (mut link, op) = HostLink::new(Xlen::Rv32, Disposition::Step);
        let mut bridge = console(&op, "b -4\nc\n");

        link.control.at_boundary(&mut bridge, 0);
        assert_eq!(link.control.at_boundary(&mut bridge, 4), Mode::Run);
        assert!(bridge.breakpoints.is_empty());
        let out = output(bridge);
        assert!(out.contains("bad address: -4"));
        assert!(!out.contains("breakpoint set"));
    }

    #[test]
    fn test_breakpoint_command() {
        let (mut link, op) = HostLink::new(Xlen::Rv32, Disposition::Step);
        let mut bridge = console(&op, "b 0x10\nc\nc\n");

        link.control.at_boundary(&mut bridge, 0);
        assert_eq!(link.control.at_boundary(&mut bridge, 4), Mode::Run);
        assert_eq!(link.control.at_boundary(&mut bridge, 8), Mode::Run);
        assert_eq!(link.control.at_boundary(&mut bridge, 12), Mode::Run);
        assert_eq!(link.control.at_boundary(&mut bridge, 16), Mode::Run);
        assert_eq!(link.control.suspensions(), 2);
        assert!(output(bridge).contains("breakpoint set at 0x10"));
    }

    #[test]
    fn test_quit_halts() {
        let (mut link, op) = HostLink::new(Xlen::Rv32, Disposition::Step);
        let mut bridge = console(&op, "q\n");

        link.control.at_boundary(&mut bridge, 0);
        assert_eq!(link.control.at_boundary(&mut bridge, 4), Mode::Halted);
        assert!(op.is_cancelled());
    }

    #[test]
    fn test_print_goes_to_output() {
        let op = Operator::default();
        let mut bridge = console(&op, "");
        bridge.print("x5 <- 0x0000002a");
        assert_eq!(output(bridge), "x5 <- 0x0000002a\n");
    }
}
