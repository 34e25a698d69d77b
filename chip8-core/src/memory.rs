//! Flat byte store with a parallel dirty-write bitmap
//!
//! Every store marks the granule(s) it touches in the dirty bitmap. The JIT
//! scans the bitmap over a compiled block's instruction range to detect
//! self-modified code.

use crate::constants::{DIRTY_GRANULE_SHIFT, DIRTY_MAP_BYTES, FONT, FONT_START, MEMORY_SIZE};
use crate::error::{Error, Result};

/// A value that can be loaded from or stored to memory.
///
/// Multi-byte values use little-endian layout. Instruction words are the one
/// exception and are read through [`Memory::fetch_instruction_word`].
pub trait MemoryValue: Copy {
    /// Width of the value in bytes
    const SIZE: usize;

    /// Decode from exactly `SIZE` bytes
    fn from_bytes(bytes: &[u8]) -> Self;

    /// Encode into exactly `SIZE` bytes
    fn to_bytes(self, out: &mut [u8]);
}

impl MemoryValue for u8 {
    const SIZE: usize = 1;

    fn from_bytes(bytes: &[u8]) -> Self {
        bytes[0]
    }

    fn to_bytes(self, out: &mut [u8]) {
        out[0] = self;
    }
}

impl MemoryValue for u16 {
    const SIZE: usize = 2;

    fn from_bytes(bytes: &[u8]) -> Self {
        u16::from_le_bytes([bytes[0], bytes[1]])
    }

    fn to_bytes(self, out: &mut [u8]) {
        out.copy_from_slice(&self.to_le_bytes());
    }
}

/// The machine's address space
#[derive(Clone)]
pub struct Memory {
    bytes: Box<[u8]>,
    dirty: Box<[u8]>,
}

impl Memory {
    /// Create a zeroed address space with a clean dirty bitmap.
    pub fn new() -> Self {
        Self {
            bytes: vec![0; MEMORY_SIZE].into_boxed_slice(),
            dirty: vec![0; DIRTY_MAP_BYTES].into_boxed_slice(),
        }
    }

    /// Load a value, failing if it would extend past the end of memory.
    pub fn read<T: MemoryValue>(&self, addr: u16) -> Result<T> {
        let range = Self::checked_range(addr, T::SIZE)?;
        Ok(T::from_bytes(&self.bytes[range]))
    }

    /// Store a value and mark the covering granules dirty.
    pub fn write<T: MemoryValue>(&mut self, addr: u16, value: T) -> Result<()> {
        let range = Self::checked_range(addr, T::SIZE)?;
        value.to_bytes(&mut self.bytes[range]);
        self.mark_dirty(addr, T::SIZE);
        Ok(())
    }

    /// Read the big-endian instruction word at `addr`.
    pub fn fetch_instruction_word(&self, addr: u16) -> Result<u16> {
        let range = Self::checked_range(addr, 2)?;
        let bytes = &self.bytes[range];
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Copy `data` into memory starting at `addr` without touching the dirty
    /// bitmap. Used to seed the glyph table and program image before a run.
    pub fn load(&mut self, addr: u16, data: &[u8]) -> Result<()> {
        let range = Self::checked_range(addr, data.len())?;
        self.bytes[range].copy_from_slice(data);
        Ok(())
    }

    /// Seed the built-in character sprites.
    pub fn load_font(&mut self) {
        let start = FONT_START as usize;
        self.bytes[start..start + FONT.len()].copy_from_slice(&FONT);
    }

    /// The raw address space.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Mark every granule overlapping `[addr, addr + len)` as dirty.
    pub fn mark_dirty(&mut self, addr: u16, len: usize) {
        for granule in Self::granules(addr, len) {
            self.dirty[granule >> 3] |= 1 << (granule & 7);
        }
    }

    /// Whether any granule overlapping `[addr, addr + len)` is dirty.
    pub fn is_dirty(&self, addr: u16, len: usize) -> bool {
        Self::granules(addr, len).any(|granule| self.dirty[granule >> 3] & (1 << (granule & 7)) != 0)
    }

    /// Clear the dirty bits of every granule overlapping `[addr, addr + len)`.
    pub fn clear_dirty(&mut self, addr: u16, len: usize) {
        for granule in Self::granules(addr, len) {
            self.dirty[granule >> 3] &= !(1 << (granule & 7));
        }
    }

    /// The packed dirty bitmap, one bit per granule.
    pub fn dirty_map(&self) -> &[u8] {
        &self.dirty
    }

    /// Base pointers of the byte store and the dirty bitmap, in that order.
    ///
    /// Compiled code writes through these pointers; it never addresses past
    /// `MEMORY_SIZE` bytes or the bitmap's length.
    pub fn raw_parts_mut(&mut self) -> (*mut u8, *mut u8) {
        (self.bytes.as_mut_ptr(), self.dirty.as_mut_ptr())
    }

    fn checked_range(addr: u16, size: usize) -> Result<std::ops::Range<usize>> {
        let start = addr as usize;
        let end = start + size;
        if end > MEMORY_SIZE {
            return Err(Error::OutOfBounds { addr, size });
        }
        Ok(start..end)
    }

    fn granules(addr: u16, len: usize) -> impl Iterator<Item = usize> {
        let start = addr as usize;
        let end = (start + len).min(MEMORY_SIZE);
        let first = start >> DIRTY_GRANULE_SHIFT;
        let last = if end > start {
            ((end - 1) >> DIRTY_GRANULE_SHIFT) + 1
        } else {
            first
        };
        first..last
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let dirty_granules: u32 = self.dirty.iter().map(|b| b.count_ones()).sum();
        f.debug_struct("Memory")
            .field("size", &self.bytes.len())
            .field("dirty_granules", &dirty_granules)
            .finish()
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
