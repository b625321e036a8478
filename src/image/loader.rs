//! E20 machine-image format.
//!
//! An image is plain text, one memory word per line, in the form emitted
//! by E20 assemblers:
//!
//! ```text
//! ram[0] = 16'b0010000010000101;
//! ram[1] = 16'b0010000100000011;   // anything after the semicolon is ignored
//! ```
//!
//! Addresses must start at 0 and increase by one on every line.

use crate::cpu::memory::MEMORY_SIZE;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// A loaded memory image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryImage {
    /// Words for addresses `0..len()`.
    pub words: Vec<u16>,
}

impl MemoryImage {
    /// Create a new empty image.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the word for the next address.
    pub fn push(&mut self, word: u16) {
        self.words.push(word);
    }

    /// Get the number of words.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl From<Vec<u16>> for MemoryImage {
    fn from(words: Vec<u16>) -> Self {
        Self { words }
    }
}

/// Load an image file from disk.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<MemoryImage, LoadError> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .map_err(|e| LoadError::Io(format!("{}: {}", path.display(), e)))?;

    let image = read_image(BufReader::new(file))?;
    debug!(path = %path.display(), words = image.len(), "loaded image");
    Ok(image)
}

/// Parse an image held in memory.
pub fn parse_image(text: &str) -> Result<MemoryImage, LoadError> {
    read_image(text.as_bytes())
}

/// Parse an image from any line source.
pub fn read_image<R: BufRead>(reader: R) -> Result<MemoryImage, LoadError> {
    let mut image = MemoryImage::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result.map_err(|e| LoadError::Io(e.to_string()))?;
        let line_num = line_num + 1;

        let (addr, word) = parse_line(&line).ok_or_else(|| LoadError::Parse {
            line: line_num,
            text: line.clone(),
        })?;

        let expected = image.len() as u64;
        if addr != expected {
            return Err(LoadError::OutOfSequence { line: line_num, addr, expected });
        }
        if addr >= MEMORY_SIZE as u64 {
            return Err(LoadError::TooLarge { line: line_num, addr });
        }

        image.push(word);
    }

    Ok(image)
}

/// Split `ram[<addr>] = 16'b<bits>;<rest>` into its address and word.
fn parse_line(line: &str) -> Option<(u64, u16)> {
    let rest = line.strip_prefix("ram[")?;
    let (addr, rest) = rest.split_once(']')?;
    let rest = rest.strip_prefix(" = 16'b")?;
    let (bits, _) = rest.split_once(';')?;

    if addr.is_empty() || !addr.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if bits.is_empty() || bits.len() > 16 || !bits.bytes().all(|b| b == b'0' || b == b'1') {
        return None;
    }

    let addr = addr.parse().ok()?;
    let word = u16::from_str_radix(bits, 2).ok()?;
    Some((addr, word))
}

/// Render words in image format, one line per address.
pub fn format_image(words: &[u16]) -> String {
    words
        .iter()
        .enumerate()
        .map(|(addr, word)| format!("ram[{}] = 16'b{:016b};\n", addr, word))
        .collect()
}

/// Save an image file to disk.
pub fn save_image<P: AsRef<Path>>(path: P, image: &MemoryImage) -> Result<(), LoadError> {
    let path = path.as_ref();
    let mut file = std::fs::File::create(path)
        .map_err(|e| LoadError::Io(format!("{}: {}", path.display(), e)))?;

    file.write_all(format_image(&image.words).as_bytes())
        .map_err(|e| LoadError::Io(format!("{}: {}", path.display(), e)))
}

/// Errors that can occur while reading or writing an image.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("can't parse line {line}: {text}")]
    Parse { line: usize, text: String },

    #[error("memory addresses encountered out of sequence on line {line}: {addr} (expected {expected})")]
    OutOfSequence { line: usize, addr: u64, expected: u64 },

    #[error("program too big for memory: address {addr} on line {line}")]
    TooLarge { line: usize, addr: u64 },
}
