//! Terminal operator for the host link.
//!
//! [`TuiBridge`] is the cooperative backend: the emulator thread drives the
//! UI itself. Every polling slice draws a frame and waits up to one quantum
//! for a key, so a suspended core keeps the interface responsive. While the
//! core runs freely the event loop is pumped every few hundred boundaries.

mod app;
mod ui;

use std::io::{stdout, Stdout};
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::prelude::*;
use tracing::warn;

use crate::bridge::{Breakpoints, Disposition, HostBridge, Wait};
use crate::cpu::Instruction;
use crate::sync::Operator;

pub use app::OperatorApp;

/// Boundaries between event-loop pumps while running freely.
const PUMP_EVERY: u32 = 256;

/// Bridge whose slices run one iteration of the terminal UI.
pub struct TuiBridge {
    app: OperatorApp,
    terminal: Terminal<CrosstermBackend<Stdout>>,
    quantum: Duration,
    polls: u32,
}

impl TuiBridge {
    /// Take over the terminal.
    pub fn enter(
        operator: &Operator,
        program: Vec<Instruction>,
        breakpoints: Breakpoints,
        quantum: Duration,
    ) -> std::io::Result<Self> {
        enable_raw_mode()?;
        stdout().execute(EnterAlternateScreen)?;
        let terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

        Ok(Self {
            app: OperatorApp::new(operator, program, breakpoints),
            terminal,
            quantum,
            polls: 0,
        })
    }

    /// Show `status` and keep the UI up until the operator leaves.
    pub fn finish(&mut self, status: String) {
        self.app.finish(status);
        while !self.app.should_quit && !self.app.operator().is_cancelled() {
            self.pump(self.quantum);
        }
    }

    /// Draw once and handle at most one key, waiting up to `timeout`.
    fn pump(&mut self, timeout: Duration) {
        if let Err(e) = self.try_pump(timeout) {
            warn!("terminal failed: {e}");
            self.app.operator().cancel();
        }
    }

    fn try_pump(&mut self, timeout: Duration) -> std::io::Result<()> {
        let app = &self.app;
        self.terminal.draw(|frame| ui::draw(frame, app))?;

        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    self.app.handle_key(key);
                }
            }
        }
        Ok(())
    }
}

impl HostBridge for TuiBridge {
    fn poll_disposition(&mut self) -> Disposition {
        self.polls = self.polls.wrapping_add(1);
        if self.polls % PUMP_EVERY == 0 {
            self.pump(Duration::ZERO);
        }
        self.app.operator().disposition()
    }

    fn poll_breakpoint_armed(&mut self, pc: u64) -> bool {
        self.app.reached(pc);
        self.app.breakpoints.contains(pc)
    }

    fn sleep_slice(&mut self, wait: Wait) {
        self.app.park(wait);
        self.pump(self.quantum);
    }

    fn print(&mut self, text: &str) {
        self.app.push_output(text);
    }
}

impl Drop for TuiBridge {
    fn drop(&mut self) {
        // Restore terminal
        let _ = disable_raw_mode();
        let _ = stdout().execute(LeaveAlternateScreen);
    }
}
