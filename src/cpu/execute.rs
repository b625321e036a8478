//! CPU execution engine for the E20.
//!
//! Implements the fetch-decode-execute cycle and all instruction behaviors.

use crate::config::{AddressWidth, SimConfig};
use crate::cpu::{Memory, Registers};
use crate::cpu::decode::{self, Instruction};
use crate::cpu::memory::MemoryError;
use crate::cpu::registers::{RegisterError, LINK_REG};
use serde::{Serialize, Deserialize};
use thiserror::Error;
use tracing::{debug, trace, warn};

/// CPU execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// CPU is running normally.
    Running,
    /// CPU executed a jump to its own address.
    Halted,
    /// CPU hit an out-of-range access and stopped.
    Faulted,
}

/// Outcome of a single [`Cpu::step`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// The instruction executed and the CPU is still running.
    Continue(Instruction),
    /// The CPU is halted.
    Halted,
    /// The CPU is faulted.
    Faulted(CpuError),
}

/// Result of running the CPU for more than one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Instructions executed by this call.
    pub cycles: u64,
    /// State when the run stopped.
    pub state: CpuState,
}

/// The E20 CPU.
#[derive(Clone, Serialize, Deserialize)]
pub struct Cpu {
    /// CPU registers.
    pub regs: Registers,
    /// Main memory.
    pub mem: Memory,
    /// Current execution state.
    pub state: CpuState,
    /// Instruction count.
    pub cycles: u64,
    address_width: AddressWidth,
    fault: Option<CpuError>,
    last_instr: Option<Instruction>,
}

impl Cpu {
    /// Create a new CPU with zeroed state.
    pub fn new() -> Self {
        Self::with_config(&SimConfig::default())
    }

    /// Create a new CPU honoring the address width of `config`.
    pub fn with_config(config: &SimConfig) -> Self {
        Self {
            regs: Registers::new(),
            mem: Memory::new(),
            state: CpuState::Running,
            cycles: 0,
            address_width: config.address_width,
            fault: None,
            last_instr: None,
        }
    }

    /// Reset the CPU to initial state, clearing memory.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.mem.clear();
        self.state = CpuState::Running;
        self.cycles = 0;
        self.fault = None;
        self.last_instr = None;
    }

    /// Load a memory image starting at address 0.
    pub fn load_image(&mut self, image: &[u16]) -> Result<(), MemoryError> {
        self.mem.load_image(image)
    }

    /// Execute a single instruction.
    ///
    /// A CPU that is already halted or faulted is left untouched and the
    /// terminal outcome is reported again.
    pub fn step(&mut self) -> Step {
        match self.state {
            CpuState::Halted => return Step::Halted,
            CpuState::Faulted => {
                let fault = self
                    .fault
                    .clone()
                    .unwrap_or(CpuError::NotRunning(CpuState::Faulted));
                return Step::Faulted(fault);
            }
            CpuState::Running => {}
        }

        match self.cycle() {
            Ok(instr) => {
                self.cycles += 1;
                self.last_instr = Some(instr);
                if self.state == CpuState::Halted {
                    debug!(pc = self.regs.pc, cycles = self.cycles, "halted");
                    Step::Halted
                } else {
                    Step::Continue(instr)
                }
            }
            Err(err) => {
                warn!(pc = self.regs.pc, error = %err, "fault, halting");
                self.state = CpuState::Faulted;
                self.fault = Some(err.clone());
                Step::Faulted(err)
            }
        }
    }

    /// Run until halt or fault.
    pub fn run(&mut self) -> RunSummary {
        let start_cycles = self.cycles;

        while self.state == CpuState::Running {
            self.step();
        }

        RunSummary {
            cycles: self.cycles - start_cycles,
            state: self.state,
        }
    }

    /// Run for at most `max_cycles` instructions.
    pub fn run_limited(&mut self, max_cycles: u64) -> RunSummary {
        let start_cycles = self.cycles;
        let mut steps = 0;

        while self.state == CpuState::Running && steps < max_cycles {
            self.step();
            steps += 1;
        }

        if self.state == CpuState::Running {
            warn!(max_cycles, pc = self.regs.pc, "cycle limit reached");
        }

        RunSummary {
            cycles: self.cycles - start_cycles,
            state: self.state,
        }
    }

    /// One fetch-decode-execute cycle. On error, whatever state was already
    /// written stays in place.
    fn cycle(&mut self) -> Result<Instruction, CpuError> {
        // Fetch
        let current_pc = self.regs.pc;
        let word = self.mem.fetch(current_pc)?;

        // Advance PC before execute (jumps override)
        self.regs.advance_pc();

        // Decode
        let instr = decode::decode(word);
        trace!(
            pc = current_pc,
            word,
            "{}",
            crate::image::disasm::format_instruction(&instr, current_pc)
        );

        // Execute
        self.execute(instr, current_pc)?;

        // $0 is hard-wired; the pc never leaves 13 bits
        self.regs.clear_zero();
        self.regs.jump(self.regs.pc);

        Ok(instr)
    }

    /// Execute a decoded instruction. `current_pc` is the address it was
    /// fetched from; `self.regs.pc` already points past it.
    fn execute(&mut self, instr: Instruction, current_pc: u16) -> Result<(), CpuError> {
        match instr {
            // ==================== Register-register ====================

            Instruction::Add { dst, a, b } => {
                let result = self.reg(a)?.wrapping_add(self.reg(b)?);
                self.set_reg(dst, result)?;
            }

            Instruction::Sub { dst, a, b } => {
                let result = self.reg(a)?.wrapping_sub(self.reg(b)?);
                self.set_reg(dst, result)?;
            }

            Instruction::Or { dst, a, b } => {
                let result = self.reg(a)? | self.reg(b)?;
                self.set_reg(dst, result)?;
            }

            Instruction::And { dst, a, b } => {
                let result = self.reg(a)? & self.reg(b)?;
                self.set_reg(dst, result)?;
            }

            Instruction::Slt { dst, a, b } => {
                let result = u16::from(self.reg(a)? < self.reg(b)?);
                self.set_reg(dst, result)?;
            }

            Instruction::Jr { src } => {
                let target = self.reg(src)?;
                self.regs.jump(target);
            }

            Instruction::Reserved { .. } => {}

            // ==================== Immediate ====================

            Instruction::Addi { dst, src, imm } => {
                let result = self.reg(src)?.wrapping_add_signed(imm);
                self.set_reg(dst, result)?;
            }

            Instruction::Slti { dst, src, imm } => {
                // Unsigned compare against the sign-extended immediate
                let result = u16::from(self.reg(src)? < imm as u16);
                self.set_reg(dst, result)?;
            }

            Instruction::Lw { dst, base, imm } => {
                let addr = self.data_address(base, imm)?;
                let value = self.mem.read(addr)?;
                self.set_reg(dst, value)?;
            }

            Instruction::Sw { src, base, imm } => {
                let addr = self.data_address(base, imm)?;
                let value = self.reg(src)?;
                self.mem.write(addr, value)?;
            }

            // ==================== Control Flow ====================

            Instruction::Jeq { a, b, imm } => {
                if self.reg(a)? == self.reg(b)? {
                    self.regs.branch(imm);
                }
            }

            Instruction::J { target } => {
                if target == current_pc {
                    self.regs.jump(current_pc);
                    self.state = CpuState::Halted;
                } else {
                    self.regs.jump(target);
                }
            }

            Instruction::Jal { target } => {
                let ret = self.regs.pc;
                self.set_reg(LINK_REG as u8, ret)?;
                self.regs.jump(target);
            }
        }

        Ok(())
    }

    /// Effective address of a `lw`/`sw`: base register plus immediate,
    /// reduced by the configured address width.
    fn data_address(&self, base: u8, imm: i16) -> Result<usize, CpuError> {
        let raw = self.reg(base)?.wrapping_add_signed(imm);
        Ok(usize::from(raw & self.address_width.mask()))
    }

    #[inline]
    fn reg(&self, index: u8) -> Result<u16, CpuError> {
        Ok(self.regs.get(usize::from(index))?)
    }

    #[inline]
    fn set_reg(&mut self, index: u8, value: u16) -> Result<(), CpuError> {
        Ok(self.regs.set(usize::from(index), value)?)
    }

    /// The configured data address width.
    pub fn address_width(&self) -> AddressWidth {
        self.address_width
    }

    /// The fault that stopped the CPU, if any.
    pub fn fault(&self) -> Option<&CpuError> {
        self.fault.as_ref()
    }

    /// Get the last executed instruction.
    pub fn last_instruction(&self) -> Option<Instruction> {
        self.last_instr
    }

    /// Check if the CPU is halted.
    pub fn is_halted(&self) -> bool {
        self.state == CpuState::Halted
    }

    /// Check if the CPU is faulted.
    pub fn is_faulted(&self) -> bool {
        self.state == CpuState::Faulted
    }

    /// Check if the CPU is running.
    pub fn is_running(&self) -> bool {
        self.state == CpuState::Running
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("state", &self.state)
            .field("cycles", &self.cycles)
            .field("regs", &self.regs)
            .field("fault", &self.fault)
            .finish()
    }
}

/// Errors that stop the CPU.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum CpuError {
    #[error("CPU not running: {0:?}")]
    NotRunning(CpuState),

    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("register error: {0}")]
    Register(#[from] RegisterError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::decode::encode;
    use crate::cpu::memory::{ADDR_MASK, MEMORY_SIZE};
    use proptest::prelude::*;

    fn make_program(instructions: &[Instruction]) -> Vec<u16> {
        instructions.iter().map(encode).collect()
    }

    fn boot(instructions: &[Instruction]) -> Cpu {
        let mut cpu = Cpu::new();
        cpu.load_image(&make_program(instructions)).unwrap();
        cpu
    }

    fn halt_at(addr: u16) -> Instruction {
        Instruction::J { target: addr }
    }

    #[test]
    fn test_self_jump_halts_after_one_cycle() {
        let mut cpu = boot(&[halt_at(0)]);

        let summary = cpu.run();

        assert_eq!(summary, RunSummary { cycles: 1, state: CpuState::Halted });
        assert_eq!(cpu.regs.pc, 0);
    }

    #[test]
    fn test_add_program() {
        let mut cpu = boot(&[
            Instruction::Addi { dst: 1, src: 0, imm: 5 },
            Instruction::Addi { dst: 2, src: 0, imm: 3 },
            Instruction::Add { dst: 3, a: 1, b: 2 },
            halt_at(3),
        ]);

        let summary = cpu.run();

        assert_eq!(summary.state, CpuState::Halted);
        assert_eq!(summary.cycles, 4);
        assert_eq!(cpu.regs.get(3).unwrap(), 8);
        assert_eq!(cpu.regs.pc, 3);
    }

    #[test]
    fn test_jump_elsewhere_does_not_halt() {
        let mut cpu = boot(&[
            Instruction::J { target: 2 },
            halt_at(1),
            halt_at(2),
        ]);

        assert_eq!(cpu.step(), Step::Continue(Instruction::J { target: 2 }));
        assert_eq!(cpu.regs.pc, 2);
        assert_eq!(cpu.step(), Step::Halted);
        assert_eq!(cpu.regs.pc, 2);
    }

    #[test]
    fn test_sub_wraps() {
        let mut cpu = boot(&[
            Instruction::Addi { dst: 1, src: 0, imm: 1 },
            Instruction::Sub { dst: 2, a: 0, b: 1 },
            halt_at(2),
        ]);
        cpu.run();
        assert_eq!(cpu.regs.get(2).unwrap(), 0xFFFF);
    }

    #[test]
    fn test_or_and() {
        let mut cpu = boot(&[
            Instruction::Addi { dst: 1, src: 0, imm: 0b1100 },
            Instruction::Addi { dst: 2, src: 0, imm: 0b1010 },
            Instruction::Or { dst: 3, a: 1, b: 2 },
            Instruction::And { dst: 4, a: 1, b: 2 },
            halt_at(4),
        ]);
        cpu.run();
        assert_eq!(cpu.regs.get(3).unwrap(), 0b1110);
        assert_eq!(cpu.regs.get(4).unwrap(), 0b1000);
    }

    #[test]
    fn test_slt_is_unsigned() {
        let mut cpu = boot(&[
            Instruction::Addi { dst: 1, src: 0, imm: -1 },
            Instruction::Addi { dst: 2, src: 0, imm: 1 },
            Instruction::Slt { dst: 3, a: 1, b: 2 },
            Instruction::Slt { dst: 4, a: 2, b: 1 },
            halt_at(4),
        ]);
        cpu.run();
        assert_eq!(cpu.regs.get(1).unwrap(), 0xFFFF);
        assert_eq!(cpu.regs.get(3).unwrap(), 0);
        assert_eq!(cpu.regs.get(4).unwrap(), 1);
    }

    #[test]
    fn test_slti_compares_against_unsigned_immediate() {
        let mut cpu = boot(&[
            Instruction::Addi { dst: 1, src: 0, imm: 10 },
            // -1 reinterpreted is 0xFFFF, so 10 < 0xFFFF
            Instruction::Slti { dst: 2, src: 1, imm: -1 },
            Instruction::Slti { dst: 3, src: 1, imm: 5 },
            Instruction::Slti { dst: 4, src: 1, imm: 11 },
            halt_at(4),
        ]);
        cpu.run();
        assert_eq!(cpu.regs.get(2).unwrap(), 1);
        assert_eq!(cpu.regs.get(3).unwrap(), 0);
        assert_eq!(cpu.regs.get(4).unwrap(), 1);
    }

    #[test]
    fn test_writes_to_zero_register_are_discarded() {
        let mut cpu = boot(&[
            Instruction::Addi { dst: 0, src: 0, imm: 7 },
            Instruction::Slti { dst: 0, src: 0, imm: 1 },
            Instruction::Lw { dst: 0, base: 0, imm: 0 },
            halt_at(3),
        ]);
        while cpu.is_running() {
            cpu.step();
            assert_eq!(cpu.regs.get(0).unwrap(), 0);
        }
    }

    #[test]
    fn test_load_store_round_trip() {
        let mut cpu = boot(&[
            Instruction::Addi { dst: 1, src: 0, imm: 42 },
            Instruction::Addi { dst: 2, src: 0, imm: 20 },
            Instruction::Sw { src: 1, base: 2, imm: -4 },
            Instruction::Lw { dst: 3, base: 2, imm: -4 },
            halt_at(4),
        ]);
        cpu.run();
        assert_eq!(cpu.mem.read(16).unwrap(), 42);
        assert_eq!(cpu.regs.get(3).unwrap(), 42);
    }

    #[test]
    fn test_negative_address_wraps_to_top_of_memory() {
        let mut cpu = boot(&[
            Instruction::Addi { dst: 1, src: 0, imm: 9 },
            Instruction::Sw { src: 1, base: 0, imm: -1 },
            halt_at(2),
        ]);
        cpu.run();
        assert_eq!(cpu.mem.read(MEMORY_SIZE - 1).unwrap(), 9);
    }

    #[test]
    fn test_legacy_address_width_faults_past_memory() {
        let config = SimConfig {
            address_width: AddressWidth::Legacy14,
            ..SimConfig::default()
        };
        let mut cpu = Cpu::with_config(&config);
        cpu.load_image(&make_program(&[
            Instruction::Addi { dst: 1, src: 0, imm: 9 },
            Instruction::Sw { src: 1, base: 0, imm: -1 },
            halt_at(2),
        ]))
        .unwrap();

        let summary = cpu.run();

        assert_eq!(summary.state, CpuState::Faulted);
        assert_eq!(summary.cycles, 1);
        assert_eq!(
            cpu.fault(),
            Some(&CpuError::Memory(MemoryError::AddressOutOfRange(0x3FFF)))
        );
        // Partial state survives: $1 was written and pc had advanced
        assert_eq!(cpu.regs.get(1).unwrap(), 9);
        assert_eq!(cpu.regs.pc, 2);
        assert_eq!(cpu.step(), Step::Faulted(CpuError::Memory(MemoryError::AddressOutOfRange(0x3FFF))));
    }

    #[test]
    fn test_jeq_taken_and_not_taken() {
        let mut cpu = boot(&[
            Instruction::Jeq { a: 0, b: 1, imm: 1 },
            Instruction::Addi { dst: 2, src: 0, imm: 1 },
            Instruction::Addi { dst: 3, src: 0, imm: 1 },
            Instruction::Jeq { a: 2, b: 3, imm: -4 },
            halt_at(4),
        ]);

        cpu.step();
        assert_eq!(cpu.regs.pc, 2);
        cpu.step();
        cpu.step();
        assert_eq!(cpu.regs.pc, 4);
        cpu.mem.write(4, encode(&Instruction::Jeq { a: 0, b: 0, imm: -6 })).unwrap();
        cpu.step();
        assert_eq!(cpu.regs.pc, (5u16.wrapping_sub(6)) & ADDR_MASK);
        assert_eq!(cpu.regs.pc, 8191);
    }

    #[test]
    fn test_jal_and_jr() {
        let mut cpu = boot(&[
            Instruction::Jal { target: 3 },
            halt_at(1),
            halt_at(2),
            Instruction::Addi { dst: 1, src: 0, imm: 11 },
            Instruction::Jr { src: 7 },
        ]);
        let summary = cpu.run();

        assert_eq!(summary.state, CpuState::Halted);
        assert_eq!(cpu.regs.get(7).unwrap(), 1);
        assert_eq!(cpu.regs.get(1).unwrap(), 11);
        assert_eq!(cpu.regs.pc, 1);
    }

    #[test]
    fn test_jr_masks_target() {
        let mut cpu = boot(&[
            Instruction::Addi { dst: 1, src: 0, imm: -1 },
            Instruction::Jr { src: 1 },
        ]);
        cpu.step();
        cpu.step();
        assert_eq!(cpu.regs.pc, 8191);
    }

    #[test]
    fn test_pc_wraps_at_end_of_memory() {
        let mut cpu = Cpu::new();
        cpu.regs.pc = 8191;
        cpu.step();
        assert_eq!(cpu.regs.pc, 0);
    }

    #[test]
    fn test_jal_at_last_address_links_to_zero() {
        let mut cpu = Cpu::new();
        cpu.mem.write(8191, encode(&Instruction::Jal { target: 5 })).unwrap();
        cpu.regs.pc = 8191;
        cpu.step();
        assert_eq!(cpu.regs.get(7).unwrap(), 0);
        assert_eq!(cpu.regs.pc, 5);
    }

    #[test]
    fn test_reserved_func_is_noop() {
        let mut cpu = boot(&[
            Instruction::Addi { dst: 1, src: 0, imm: 3 },
            Instruction::Reserved { dst: 1, a: 1, b: 1, func: 0b1111 },
            halt_at(2),
        ]);
        cpu.run();
        assert_eq!(cpu.regs.get(1).unwrap(), 3);
        assert!(cpu.is_halted());
    }

    #[test]
    fn test_step_after_halt_is_stable() {
        let mut cpu = boot(&[halt_at(0)]);
        cpu.run();
        assert_eq!(cpu.step(), Step::Halted);
        assert_eq!(cpu.cycles, 1);
    }

    #[test]
    fn test_run_limited_stops_infinite_loop() {
        let mut cpu = boot(&[
            Instruction::Addi { dst: 1, src: 1, imm: 1 },
            Instruction::J { target: 0 },
        ]);
        let summary = cpu.run_limited(10);
        assert_eq!(summary, RunSummary { cycles: 10, state: CpuState::Running });
        assert_eq!(cpu.regs.get(1).unwrap(), 5);
    }

    #[test]
    fn test_reset() {
        let mut cpu = boot(&[Instruction::Addi { dst: 1, src: 0, imm: 1 }, halt_at(1)]);
        cpu.run();
        cpu.reset();
        assert!(cpu.is_running());
        assert_eq!(cpu.cycles, 0);
        assert_eq!(cpu.regs, Registers::new());
        assert_eq!(cpu.mem.read(0).unwrap(), 0);
    }

    proptest! {
        #[test]
        fn zero_register_and_pc_range_hold_for_any_program(
            words in proptest::collection::vec(any::<u16>(), 1..64),
            seed_regs in proptest::array::uniform8(prop_oneof![Just(0u16), Just(0xFFFF), any::<u16>()]),
        ) {
            let mut cpu = Cpu::new();
            cpu.load_image(&words).unwrap();
            for (i, v) in seed_regs.iter().enumerate() {
                cpu.regs.set(i, *v).unwrap();
            }
            for _ in 0..256 {
                if !cpu.is_running() {
                    break;
                }
                cpu.step();
                prop_assert_eq!(cpu.regs.get(0).unwrap(), 0);
                prop_assert!(usize::from(cpu.regs.pc) < MEMORY_SIZE);
            }
            prop_assert!(!cpu.is_faulted());
        }

        #[test]
        fn store_then_load_at_any_address(addr in 3u16..8192, value in any::<u16>()) {
            let mut cpu = boot(&[
                Instruction::Sw { src: 2, base: 1, imm: 0 },
                Instruction::Lw { dst: 3, base: 1, imm: 0 },
                halt_at(2),
            ]);
            cpu.regs.set(1, addr).unwrap();
            cpu.regs.set(2, value).unwrap();
            cpu.run();
            prop_assert_eq!(cpu.mem.read(usize::from(addr)).unwrap(), value);
            prop_assert_eq!(cpu.regs.get(3).unwrap(), value);
        }

        #[test]
        fn add_sub_stay_in_range(a in prop_oneof![Just(0u16), Just(0xFFFF), any::<u16>()],
                                 b in prop_oneof![Just(0u16), Just(0xFFFF), any::<u16>()]) {
            let mut cpu = boot(&[
                Instruction::Add { dst: 3, a: 1, b: 2 },
                Instruction::Sub { dst: 4, a: 1, b: 2 },
                halt_at(2),
            ]);
            cpu.regs.set(1, a).unwrap();
            cpu.regs.set(2, b).unwrap();
            cpu.run();
            prop_assert_eq!(u32::from(cpu.regs.get(3).unwrap()), (u32::from(a) + u32::from(b)) % 65536);
            prop_assert_eq!(cpu.regs.get(4).unwrap(), a.wrapping_sub(b));
        }
    }
}
