//! Simulator configuration.

use crate::cpu::memory::ADDR_MASK;
use serde::{Serialize, Deserialize};

/// Number of memory words shown by the final state report.
pub const DEFAULT_DUMP_WORDS: usize = 128;

/// How `lw`/`sw` effective addresses are reduced before memory access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressWidth {
    /// Mask to 13 bits; every effective address lands inside memory.
    #[default]
    Wrap13,
    /// Mask to 14 bits, as the classic course simulator does. Addresses
    /// 8192-16383 fault.
    Legacy14,
}

impl AddressWidth {
    /// The mask applied to a computed data address.
    pub const fn mask(self) -> u16 {
        match self {
            AddressWidth::Wrap13 => ADDR_MASK,
            AddressWidth::Legacy14 => 0x3FFF,
        }
    }
}

/// Run-time options for a simulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Stop after this many instructions even if the program has not halted.
    pub max_cycles: Option<u64>,
    /// Data address reduction for `lw`/`sw`.
    pub address_width: AddressWidth,
    /// Memory words included in the final state report.
    pub dump_words: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            max_cycles: None,
            address_width: AddressWidth::default(),
            dump_words: DEFAULT_DUMP_WORDS,
        }
    }
}
