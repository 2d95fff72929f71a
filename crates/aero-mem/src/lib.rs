//! Flat, byte-addressable guest memory with masked-wrap addressing.
//!
//! The emulated machine sees one contiguous span of bytes. Capacity is fixed
//! at construction and every address is taken modulo that capacity, so the
//! store behaves like a linear array even when backed by a sparse allocation
//! internally.

use std::fs;
use std::path::Path;

use thiserror::Error;

/// Errors raised while populating memory from a ROM image.
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("failed to read ROM image {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("ROM image is {len} bytes, which does not fit in a {capacity}-byte memory")]
    ImageTooLarge { len: usize, capacity: usize },
}

/// A chunk of guest memory, allocated lazily on first write.
const CHUNK_SIZE: usize = 64 * 1024;

/// Flat guest memory of a fixed power-of-two capacity.
///
/// Backed by a sparse vector of chunks: a chunk is allocated only once a
/// write touches it, so declaring a 4 GiB address space does not require a
/// 4 GiB eager allocation. This is purely an internal strategy; `read` and
/// `write` behave exactly as if `self` were one dense array of `capacity`
/// bytes.
pub struct Memory {
    capacity: usize,
    mask: usize,
    chunks: Vec<Option<Box<[u8; CHUNK_SIZE]>>>,
}

impl Memory {
    /// Creates memory of `capacity` bytes. `capacity` must be a power of two
    /// and a multiple of the internal chunk size.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity.is_power_of_two(), "memory capacity must be a power of two");
        assert!(
            capacity % CHUNK_SIZE == 0,
            "memory capacity must be a multiple of {CHUNK_SIZE}"
        );
        let chunk_count = capacity / CHUNK_SIZE;
        Self {
            capacity,
            mask: capacity - 1,
            chunks: (0..chunk_count).map(|_| None).collect(),
        }
    }

    /// The reference configuration: 4 GiB, matching a flat 32-bit physical
    /// address space with the reset vector mapped at its top.
    pub fn new_4gib() -> Self {
        Self::new(4 * 1024 * 1024 * 1024)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    fn wrap(&self, addr: u64) -> usize {
        (addr as usize) & self.mask
    }

    pub fn read(&self, addr: u64) -> u8 {
        let addr = self.wrap(addr);
        let chunk_idx = addr / CHUNK_SIZE;
        let offset = addr % CHUNK_SIZE;
        match &self.chunks[chunk_idx] {
            Some(chunk) => chunk[offset],
            None => 0,
        }
    }

    pub fn write(&mut self, addr: u64, value: u8) {
        let addr = self.wrap(addr);
        let chunk_idx = addr / CHUNK_SIZE;
        let offset = addr % CHUNK_SIZE;
        let chunk = self.chunks[chunk_idx].get_or_insert_with(|| Box::new([0u8; CHUNK_SIZE]));
        chunk[offset] = value;
    }

    pub fn read_u16(&self, addr: u64) -> u16 {
        let mut bytes = [0u8; 2];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = self.read(addr.wrapping_add(i as u64));
        }
        u16::from_le_bytes(bytes)
    }

    pub fn read_u32(&self, addr: u64) -> u32 {
        let mut bytes = [0u8; 4];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = self.read(addr.wrapping_add(i as u64));
        }
        u32::from_le_bytes(bytes)
    }

    pub fn read_u64(&self, addr: u64) -> u64 {
        let mut bytes = [0u8; 8];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = self.read(addr.wrapping_add(i as u64));
        }
        u64::from_le_bytes(bytes)
    }

    pub fn write_u16(&mut self, addr: u64, value: u16) {
        for (i, b) in value.to_le_bytes().iter().enumerate() {
            self.write(addr.wrapping_add(i as u64), *b);
        }
    }

    pub fn write_u32(&mut self, addr: u64, value: u32) {
        for (i, b) in value.to_le_bytes().iter().enumerate() {
            self.write(addr.wrapping_add(i as u64), *b);
        }
    }

    pub fn write_u64(&mut self, addr: u64, value: u64) {
        for (i, b) in value.to_le_bytes().iter().enumerate() {
            self.write(addr.wrapping_add(i as u64), *b);
        }
    }

    /// Loads `path`'s contents so that the file's last byte lands at
    /// `capacity - 1`; bytes before the image are left untouched. Returns the
    /// number of bytes loaded.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<usize, MemoryError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| MemoryError::Io {
            path: path.display().to_string(),
            source,
        })?;
        if bytes.len() > self.capacity {
            return Err(MemoryError::ImageTooLarge {
                len: bytes.len(),
                capacity: self.capacity,
            });
        }
        let base = self.capacity - bytes.len();
        for (i, b) in bytes.iter().enumerate() {
            self.write((base + i) as u64, *b);
        }
        tracing::debug!(bytes = bytes.len(), base, "loaded ROM image");
        Ok(bytes.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_of_untouched_byte_is_zero() {
        let mem = Memory::new(CHUNK_SIZE * 2);
        assert_eq!(mem.read(0), 0);
        assert_eq!(mem.read((CHUNK_SIZE * 2 - 1) as u64), 0);
    }

    #[test]
    fn write_then_read_round_trips() {
        let mut mem = Memory::new(CHUNK_SIZE * 2);
        mem.write(0x10, 0xAB);
        assert_eq!(mem.read(0x10), 0xAB);
    }

    #[test]
    fn address_wraps_at_capacity() {
        let mut mem = Memory::new(CHUNK_SIZE);
        mem.write(0, 0x42);
        assert_eq!(mem.read(CHUNK_SIZE as u64), 0x42);
    }

    #[test]
    fn le_word_round_trips() {
        let mut mem = Memory::new(CHUNK_SIZE);
        mem.write_u32(4, 0xDEAD_BEEF);
        assert_eq!(mem.read_u32(4), 0xDEAD_BEEF);
        assert_eq!(mem.read(4), 0xEF);
        assert_eq!(mem.read(7), 0xDE);
    }

    #[test]
    fn load_places_last_byte_at_capacity_minus_one() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rom.bin");
        fs::write(&path, [0x11, 0x22, 0x33]).unwrap();

        let mut mem = Memory::new(CHUNK_SIZE);
        let n = mem.load(&path).unwrap();
        assert_eq!(n, 3);
        assert_eq!(mem.read((CHUNK_SIZE - 3) as u64), 0x11);
        assert_eq!(mem.read((CHUNK_SIZE - 1) as u64), 0x33);
        assert_eq!(mem.read(0), 0);
    }

    #[test]
    fn load_rejects_image_larger_than_capacity() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rom.bin");
        fs::write(&path, vec![0u8; CHUNK_SIZE + 1]).unwrap();

        let mut mem = Memory::new(CHUNK_SIZE);
        let err = mem.load(&path).unwrap_err();
        assert!(matches!(err, MemoryError::ImageTooLarge { .. }));
    }
}
