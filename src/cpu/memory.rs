//! E20 memory subsystem.
//!
//! A single Von Neumann address space of 8192 sixteen-bit words holds both
//! code and data. Addresses are 13 bits wide.

use serde::{Serialize, Deserialize};
use thiserror::Error;

/// The number of words in E20 memory.
pub const MEMORY_SIZE: usize = 1 << 13;

/// Mask selecting the 13 address bits.
pub const ADDR_MASK: u16 = (MEMORY_SIZE - 1) as u16;

/// E20 memory: 8192 sixteen-bit words.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Memory {
    cells: Vec<u16>,
}

impl Memory {
    /// Create a new memory with all words zeroed.
    pub fn new() -> Self {
        Self {
            cells: vec![0; MEMORY_SIZE],
        }
    }

    /// Read a word. Fails if `addr` lies outside the address space.
    #[inline]
    pub fn read(&self, addr: usize) -> Result<u16, MemoryError> {
        self.cells
            .get(addr)
            .copied()
            .ok_or(MemoryError::AddressOutOfRange(addr))
    }

    /// Write a word. Fails if `addr` lies outside the address space.
    #[inline]
    pub fn write(&mut self, addr: usize, value: u16) -> Result<(), MemoryError> {
        let cell = self
            .cells
            .get_mut(addr)
            .ok_or(MemoryError::AddressOutOfRange(addr))?;
        *cell = value;
        Ok(())
    }

    /// Fetch the instruction word at `pc`, masking it to 13 bits first.
    #[inline]
    pub fn fetch(&self, pc: u16) -> Result<u16, MemoryError> {
        self.read(usize::from(pc & ADDR_MASK))
    }

    /// Clear all memory to zeros.
    pub fn clear(&mut self) {
        self.cells.fill(0);
    }

    /// Copy an image into memory starting at address 0.
    pub fn load_image(&mut self, image: &[u16]) -> Result<(), MemoryError> {
        if image.len() > MEMORY_SIZE {
            return Err(MemoryError::ImageTooLarge {
                size: image.len(),
                capacity: MEMORY_SIZE,
            });
        }
        self.cells[..image.len()].copy_from_slice(image);
        Ok(())
    }

    /// The first `count` words (clamped to the memory size).
    pub fn prefix(&self, count: usize) -> &[u16] {
        &self.cells[..count.min(MEMORY_SIZE)]
    }

    /// Dump `(address, word)` pairs for a window of memory.
    pub fn dump(&self, start: usize, count: usize) -> Vec<(usize, u16)> {
        let start = start.min(MEMORY_SIZE);
        let end = start.saturating_add(count).min(MEMORY_SIZE);
        (start..end).map(|i| (i, self.cells[i])).collect()
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let non_zero = self.cells.iter().filter(|w| **w != 0).count();

        f.debug_struct("Memory")
            .field("non_zero_cells", &non_zero)
            .field("total_cells", &MEMORY_SIZE)
            .finish()
    }
}

/// Errors that can occur during memory operations.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum MemoryError {
    #[error("memory address {0} out of range (0-{max})", max = MEMORY_SIZE - 1)]
    AddressOutOfRange(usize),

    #[error("image of {size} words exceeds memory capacity of {capacity}")]
    ImageTooLarge { size: usize, capacity: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_memory_read_write() {
        let mut mem = Memory::new();
        mem.write(10, 0xBEEF).unwrap();
        assert_eq!(mem.read(10).unwrap(), 0xBEEF);
    }

    #[test]
    fn test_memory_bounds() {
        let mut mem = Memory::new();
        assert!(mem.read(MEMORY_SIZE - 1).is_ok());
        assert_eq!(
            mem.read(MEMORY_SIZE),
            Err(MemoryError::AddressOutOfRange(MEMORY_SIZE))
        );
        assert!(mem.write(MEMORY_SIZE + 5, 1).is_err());
    }

    #[test]
    fn test_fetch_masks_pc() {
        let mut mem = Memory::new();
        mem.write(3, 0x1234).unwrap();
        assert_eq!(mem.fetch(3 + MEMORY_SIZE as u16).unwrap(), 0x1234);
    }

    #[test]
    fn test_load_image() {
        let mut mem = Memory::new();
        mem.load_image(&[1, 2, 3]).unwrap();

        assert_eq!(mem.prefix(4), &[1, 2, 3, 0]);
    }

    #[test]
    fn test_load_image_too_large() {
        let mut mem = Memory::new();
        let image = vec![0u16; MEMORY_SIZE + 1];
        assert_eq!(
            mem.load_image(&image),
            Err(MemoryError::ImageTooLarge { size: MEMORY_SIZE + 1, capacity: MEMORY_SIZE })
        );
    }

    #[test]
    fn test_dump_clamps_to_end() {
        let mem = Memory::new();
        assert_eq!(mem.dump(MEMORY_SIZE - 2, 10).len(), 2);
        assert!(mem.dump(MEMORY_SIZE + 1, 10).is_empty());
    }

    proptest! {
        #[test]
        fn store_then_load_returns_value(addr in 0usize..MEMORY_SIZE, value in any::<u16>()) {
            let mut mem = Memory::new();
            mem.write(addr, value).unwrap();
            prop_assert_eq!(mem.read(addr).unwrap(), value);
        }
    }
}
