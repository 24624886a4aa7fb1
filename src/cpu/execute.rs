//! CPU execution engine for the demonstration core.
//!
//! Implements the fetch-execute cycle. Before every fetch the core hands the
//! boundary to the [`ExecutionController`](crate::sync::ExecutionController);
//! host reads go through the input channel and may park the core until the
//! operator answers.

use crate::bridge::HostBridge;
use crate::cpu::instruction::{Instruction, INSTRUCTION_BYTES};
use crate::cpu::memory::MemoryError;
use crate::cpu::registers::NAN_BOX;
use crate::cpu::{Memory, Registers};
use crate::error::HostError;
use crate::sync::{HostLink, Mode, Xlen};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// CPU execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// CPU is running normally.
    Running,
    /// CPU has halted (executed `halt`).
    Halted,
    /// The operator tore the session down.
    Cancelled,
    /// CPU encountered an error.
    Error,
}

/// The demonstration core.
pub struct Cpu {
    /// CPU registers.
    pub regs: Registers,
    /// Main memory.
    pub mem: Memory,
    /// Current execution state.
    pub state: CpuState,
    /// Instruction count.
    pub cycles: u64,
    /// Report every register write through the bridge.
    pub trace: bool,
    program: Vec<Instruction>,
    link: HostLink,
}

impl Cpu {
    /// Create a core for `program`, driven by `link`.
    pub fn new(program: Vec<Instruction>, link: HostLink) -> Self {
        let xlen = link.reservation.xlen();
        Self {
            regs: Registers::new(xlen),
            mem: Memory::new(),
            state: CpuState::Running,
            cycles: 0,
            trace: false,
            program,
            link,
        }
    }

    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    /// The synchronization layer this core reports to.
    pub fn link(&self) -> &HostLink {
        &self.link
    }

    pub fn program(&self) -> &[Instruction] {
        &self.program
    }

    /// Execute a single instruction.
    ///
    /// Returns the instruction that was executed, or an error. A cancelled
    /// session surfaces as `CpuError::Host(HostError::Cancelled)`.
    pub fn step<B: HostBridge + ?Sized>(&mut self, bridge: &mut B) -> Result<Instruction, CpuError> {
        if self.state != CpuState::Running {
            return Err(CpuError::NotRunning(self.state));
        }

        let pc = self.regs.pc;
        if self.link.control.at_boundary(bridge, pc) == Mode::Halted {
            info!(pc, cycles = self.cycles, "core stopped by operator");
            self.state = CpuState::Cancelled;
            return Err(HostError::Cancelled.into());
        }

        // Fetch
        let Some(&instr) = self.program.get((pc / INSTRUCTION_BYTES) as usize) else {
            self.state = CpuState::Error;
            return Err(CpuError::PcOutOfRange(pc));
        };
        self.regs.pc = pc.wrapping_add(INSTRUCTION_BYTES);

        // Execute
        if let Err(e) = self.execute(instr, bridge) {
            self.state = match e {
                CpuError::Host(HostError::Cancelled) => CpuState::Cancelled,
                _ => CpuState::Error,
            };
            return Err(e);
        }

        self.cycles += 1;
        Ok(instr)
    }

    /// Run until halt or error.
    ///
    /// Returns the number of instructions executed.
    pub fn run<B: HostBridge + ?Sized>(&mut self, bridge: &mut B) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;

        while self.state == CpuState::Running {
            self.step(bridge)?;
        }

        Ok(self.cycles - start_cycles)
    }

    /// Run for at most `max_cycles` instructions.
    pub fn run_limited<B: HostBridge + ?Sized>(
        &mut self,
        bridge: &mut B,
        max_cycles: u64,
    ) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;
        let limit = self.cycles.saturating_add(max_cycles);

        while self.state == CpuState::Running && self.cycles < limit {
            self.step(bridge)?;
        }

        Ok(self.cycles - start_cycles)
    }

    fn execute<B: HostBridge + ?Sized>(&mut self, instr: Instruction, bridge: &mut B) -> Result<(), CpuError> {
        match instr {
            // ==================== Control ====================

            Instruction::Nop => {}

            Instruction::Halt => {
                debug!(cycles = self.cycles + 1, "halt");
                self.state = CpuState::Halted;
            }

            Instruction::Jump { target } => self.jump(target),

            Instruction::Bnez { rs, target } => {
                if self.regs.x(rs) != 0 {
                    self.jump(target);
                }
            }

            // ==================== Integer ====================

            Instruction::Li { rd, imm } => self.write_x(bridge, rd, imm as u64),

            Instruction::Addi { rd, rs, imm } => {
                let value = self.regs.x(rs).wrapping_add(imm as u64);
                self.write_x(bridge, rd, value);
            }

            Instruction::Load { rd, ra } => {
                let value = self.mem.read(self.regs.x(ra), self.word_bytes())?;
                self.write_x(bridge, rd, value);
            }

            Instruction::Store { rs, ra } => {
                self.mem.write(self.regs.x(ra), self.word_bytes(), self.regs.x(rs))?;
            }

            // ==================== Host input ====================

            Instruction::ReadInt { rd } => {
                let value: i32 = self.link.input.request(bridge)?;
                self.write_x(bridge, rd, value as i64 as u64);
            }

            Instruction::ReadFloat { fd } => {
                let value: f32 = self.link.input.request(bridge)?;
                self.write_f(bridge, fd, NAN_BOX | u64::from(value.to_bits()));
            }

            Instruction::ReadDouble { fd } => {
                let bits = match self.regs.xlen() {
                    Xlen::Rv32 => {
                        let low = self.link.input.request_double_low(bridge)?;
                        let high = self.link.input.read_double_high();
                        (u64::from(high) << 32) | u64::from(low)
                    }
                    Xlen::Rv64 => self.link.input.request::<f64, _>(bridge)?.to_bits(),
                };
                self.write_f(bridge, fd, bits);
            }

            Instruction::ReadChar { rd } => {
                let value: char = self.link.input.request(bridge)?;
                self.write_x(bridge, rd, u64::from(u32::from(value)));
            }

            Instruction::ReadString { rd, ra } => {
                let len = self.link.input.request_string(bridge)?.len();
                let base = self.regs.x(ra);
                // Copy up to and including the terminator.
                for i in 0..=len {
                    let byte = self.link.input.string_byte(i);
                    self.mem.write_byte(base.wrapping_add(i as u64), byte);
                }
                self.write_x(bridge, rd, len as u64);
            }

            // ==================== Atomics ====================

            Instruction::LoadReserved { rd, ra } => {
                let addr = self.regs.x(ra);
                let value = self.mem.read(addr, self.word_bytes())?;
                self.link.reservation.load_reserve(addr);
                self.write_x(bridge, rd, value);
            }

            Instruction::StoreConditional { rd, rs, ra } => {
                let addr = self.regs.x(ra);
                let stored = self.link.reservation.speculate_conditional()
                    && self.link.reservation.match_reserve(addr);
                if stored {
                    self.mem.write(addr, self.word_bytes(), self.regs.x(rs))?;
                }
                self.link.reservation.cancel_reserve();
                self.write_x(bridge, rd, u64::from(!stored));
            }

            // ==================== Output ====================

            Instruction::Print { rs } => bridge.print(&self.regs.x_signed(rs).to_string()),

            Instruction::PrintFloat { fs } => {
                let bits = self.regs.f(fs);
                let text = if bits & NAN_BOX == NAN_BOX {
                    f32::from_bits(bits as u32).to_string()
                } else {
                    f64::from_bits(bits).to_string()
                };
                bridge.print(&text);
            }

            Instruction::PrintString { ra } => bridge.print(&self.mem.read_cstr(self.regs.x(ra))),
        }

        Ok(())
    }

    fn jump(&mut self, target: usize) {
        self.regs.pc = target as u64 * INSTRUCTION_BYTES;
    }

    fn word_bytes(&self) -> usize {
        (self.regs.xlen().bits() / 8) as usize
    }

    fn write_x<B: HostBridge + ?Sized>(&mut self, bridge: &mut B, rd: u8, value: u64) {
        self.regs.set_x(rd, value);
        if self.trace && rd != 0 {
            bridge.print(&self.regs.describe_x(rd));
        }
    }

    fn write_f<B: HostBridge + ?Sized>(&mut self, bridge: &mut B, fd: u8, bits: u64) {
        self.regs.set_f(fd, bits);
        if self.trace {
            bridge.print(&self.regs.describe_f(fd));
        }
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("pc", &self.regs.pc)
            .field("state", &self.state)
            .field("cycles", &self.cycles)
            .field("program_len", &self.program.len())
            .finish()
    }
}

/// CPU execution errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpuError {
    #[error("CPU is not running (state: {0:?})")]
    NotRunning(CpuState),
    #[error("host link: {0}")]
    Host(#[from] HostError),
    #[error("pc {0:#x} is outside the program")]
    PcOutOfRange(u64),
    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),
}

impl CpuError {
    /// Whether the error is the operator cancelling the session.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CpuError::Host(HostError::Cancelled))
    }
}
