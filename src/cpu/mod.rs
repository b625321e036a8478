//! CPU emulation for the E20.
//!
//! This module implements the complete E20 architecture:
//! - 8192 sixteen-bit memory words shared by code and data
//! - 8 general-purpose registers, `$0` hard-wired to zero
//! - a 13-bit wrapping program counter
//! - 8 opcode classes, halting on a jump to the jump's own address

pub mod memory;
pub mod registers;
pub mod decode;
pub mod execute;

pub use memory::{Memory, MemoryError, MEMORY_SIZE};
pub use registers::{Registers, RegisterError, NUM_REGS};
pub use decode::{Instruction, sign_extend7};
pub use execute::{Cpu, CpuError, CpuState, RunSummary, Step};
