//! E20 CPU registers.
//!
//! The E20 has:
//! - 8 general-purpose 16-bit registers, `$0`-`$7`, with `$0` hard-wired to zero
//! - a 13-bit program counter
//!
//! There is no flags register; control flow depends on the pc alone.

use crate::cpu::memory::ADDR_MASK;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Number of general-purpose registers.
pub const NUM_REGS: usize = 8;

/// The register `jal` stores its return address in.
pub const LINK_REG: usize = 7;

/// The E20 register file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    /// Program counter, always kept within 13 bits.
    pub pc: u16,

    gpr: [u16; NUM_REGS],
}

impl Registers {
    /// Create a new register file with all values zeroed.
    pub fn new() -> Self {
        Self {
            pc: 0,
            gpr: [0; NUM_REGS],
        }
    }

    /// Reset all registers to zero.
    pub fn reset(&mut self) {
        self.pc = 0;
        self.gpr = [0; NUM_REGS];
    }

    /// Read a general-purpose register.
    #[inline]
    pub fn get(&self, index: usize) -> Result<u16, RegisterError> {
        self.gpr
            .get(index)
            .copied()
            .ok_or(RegisterError::IndexOutOfRange(index))
    }

    /// Write a general-purpose register. Writes to `$0` are discarded.
    #[inline]
    pub fn set(&mut self, index: usize, value: u16) -> Result<(), RegisterError> {
        let slot = self
            .gpr
            .get_mut(index)
            .ok_or(RegisterError::IndexOutOfRange(index))?;
        if index != 0 {
            *slot = value;
        }
        Ok(())
    }

    /// All eight register values, `$0` first.
    pub fn values(&self) -> [u16; NUM_REGS] {
        self.gpr
    }

    /// Force `$0` back to zero.
    #[inline]
    pub fn clear_zero(&mut self) {
        self.gpr[0] = 0;
    }

    /// Increment the program counter by 1, wrapping at 8192.
    /// Returns the old value.
    pub fn advance_pc(&mut self) -> u16 {
        let old = self.pc;
        self.pc = old.wrapping_add(1) & ADDR_MASK;
        old
    }

    /// Set the program counter to an absolute address. Only the low 13 bits
    /// are kept.
    pub fn jump(&mut self, target: u16) {
        self.pc = target & ADDR_MASK;
    }

    /// Add a signed offset to the program counter, wrapping at 8192.
    pub fn branch(&mut self, offset: i16) {
        self.pc = self.pc.wrapping_add_signed(offset) & ADDR_MASK;
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur when addressing the register file.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum RegisterError {
    #[error("register index {0} out of range (0-7)")]
    IndexOutOfRange(usize),
}
