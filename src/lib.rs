//! # E20 Simulator
//!
//! An instruction-set simulator for the E20, a small 16-bit educational
//! CPU with eight registers, a 13-bit program counter and 8192 words of
//! memory.
//!
//! Load an image, run it to a halt, and print the final state:
//!
//! ```
//! use e20::{Cpu, CpuState, StateReport, parse_image};
//!
//! let image = parse_image("ram[0] = 16'b0010000010000101;\nram[1] = 16'b0100000000000001;\n")?;
//! let mut cpu = Cpu::new();
//! cpu.load_image(&image.words)?;
//!
//! let summary = cpu.run();
//! assert_eq!(summary.state, CpuState::Halted);
//! assert_eq!(cpu.regs.get(1)?, 5);
//! print!("{}", StateReport::new(&cpu, 128));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cpu;
pub mod config;
pub mod image;
pub mod report;

#[cfg(feature = "tui")]
pub mod tui;

// Re-export commonly used types
pub use cpu::{Cpu, CpuState, CpuError, Step, RunSummary, Memory, Registers, Instruction};
pub use config::{SimConfig, AddressWidth};
pub use image::{disassemble, load_image, parse_image, save_image, LoadError, MemoryImage};
pub use report::{StateReport, Snapshot};

#[cfg(feature = "tui")]
pub use tui::run_debugger;
