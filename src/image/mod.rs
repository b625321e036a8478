//! Machine images and disassembly.
//!
//! This module provides:
//! - The text image loader and writer (`ram[N] = 16'b...;` lines)
//! - A disassembler (machine words → E20 assembly)

pub mod disasm;
pub mod loader;

pub use disasm::{disassemble, disassemble_word};
pub use loader::{MemoryImage, LoadError, load_image, parse_image, save_image};
