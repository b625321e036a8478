//! TUI debugger for the E20 simulator.
//!
//! Provides an interactive terminal-based debugger with:
//! - Register and program counter view
//! - Scrollable memory view
//! - Step/run/breakpoint controls
//! - Disassembly around the program counter

mod app;
mod ui;

pub use app::{DebuggerApp, run_debugger};
