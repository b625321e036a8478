//! Final-state reporting.
//!
//! The text report matches the classic E20 course simulator byte for byte:
//!
//! ```text
//! Final state:
//! 	pc=    3
//! 	$0=    0
//! 	...
//! 2081 2103 0530 4003 0000 0000 0000 0000
//! ```
//!
//! Each memory line holds eight words, every word followed by one space.

use crate::cpu::{Cpu, CpuState, NUM_REGS};
use serde::{Serialize, Deserialize};
use std::fmt;

/// Words per memory line in the text report.
const WORDS_PER_LINE: usize = 8;

/// Displays the final state of a CPU.
#[derive(Debug, Clone, Copy)]
pub struct StateReport<'a> {
    cpu: &'a Cpu,
    dump_words: usize,
}

impl<'a> StateReport<'a> {
    /// Report `cpu`, including its first `dump_words` memory words.
    pub fn new(cpu: &'a Cpu, dump_words: usize) -> Self {
        Self { cpu, dump_words }
    }
}

impl fmt::Display for StateReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Final state:")?;
        writeln!(f, "\tpc={:5}", self.cpu.regs.pc)?;
        for (reg, value) in self.cpu.regs.values().iter().enumerate() {
            writeln!(f, "\t${}={:5}", reg, value)?;
        }

        for line in self.cpu.mem.prefix(self.dump_words).chunks(WORDS_PER_LINE) {
            for word in line {
                write!(f, "{:04x} ", word)?;
            }
            writeln!(f)?;
        }

        Ok(())
    }
}

/// Serializable view of the final state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub state: CpuState,
    pub cycles: u64,
    pub pc: u16,
    pub registers: [u16; NUM_REGS],
    pub memory: Vec<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault: Option<String>,
}

impl Snapshot {
    /// Capture `cpu`, including its first `dump_words` memory words.
    pub fn capture(cpu: &Cpu, dump_words: usize) -> Self {
        Self {
            state: cpu.state,
            cycles: cpu.cycles,
            pc: cpu.regs.pc,
            registers: cpu.regs.values(),
            memory: cpu.mem.prefix(dump_words).to_vec(),
            fault: cpu.fault().map(|e| e.to_string()),
        }
    }
}
