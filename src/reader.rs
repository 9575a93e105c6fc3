//! Contains [`MemReader`] for sequentially decoding a memory-mapped `blk*.dat` file.

use crate::error::{Error, Result};
use crate::primitive::{Primitive, MAX_SIZE};
use crate::xor::XorMask;
use log::{debug, warn};
use memmap2::Mmap;
use std::cmp::min;
use std::fs::File;
use std::io;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Bounds-checked cursor over a read-only memory mapping of a whole file.
///
/// Every operation that moves the cursor either succeeds completely or returns
/// [`Error::OutOfBounds`] without moving it.  If an 8 byte XOR key was supplied, all decoded
/// bytes are de-obfuscated by their absolute file offset, so any sequence of reads, peeks and
/// seeks yields the same plain bytes.
///
/// The cursor needs `&mut self`, for parallel decoding open one reader per thread.
///
/// # Examples
/// ```no_run
/// use bitcoin_mem_reader::MemReader;
///
/// let key = std::fs::read("/home/user/.bitcoin/blocks/xor.dat").unwrap();
/// let mut reader = MemReader::open("/home/user/.bitcoin/blocks/blk00000.dat", Some(&key)).unwrap();
/// let magic: u32 = reader.read().unwrap();
/// let size: u32 = reader.read().unwrap();
/// println!("magic {:#x} for a block of {} bytes", magic, size);
/// ```
pub struct MemReader {
    /// Path of the mapped file
    path: PathBuf,
    /// Read-only mapping of the entire file
    mmap: Mmap,
    /// Cursor, always `<= mmap.len()`
    pos: usize,
    /// XOR mask, `None` means bytes are returned as stored
    mask: Option<XorMask>,
}

impl MemReader {
    /// Maps the entire file at `path`.
    ///
    /// - Returns [`Error::MapFailure`] if the file is missing, unreadable, empty or can't be
    ///   mapped.
    /// - `key` enables XOR de-obfuscation only if it is exactly
    ///   [`XOR_MASK_LEN`](crate::XOR_MASK_LEN) bytes, any other length reads the file as is.
    pub fn open<P: AsRef<Path>>(path: P, key: Option<&[u8]>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mmap = Self::map(&path).map_err(|source| Error::MapFailure {
            path: path.clone(),
            source,
        })?;

        let mask = key.and_then(XorMask::from_key);
        if let (Some(key), None) = (key, mask) {
            warn!("Ignoring XOR key of {} bytes for {:?}", key.len(), path);
        }
        debug!("Mapped {} bytes from {:?} (xor: {})", mmap.len(), path, mask.is_some());

        Ok(Self {
            path,
            mmap,
            pos: 0,
            mask,
        })
    }

    fn map(path: &Path) -> io::Result<Mmap> {
        let file = File::open(path)?;
        if file.metadata()?.len() == 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "cannot map an empty file"));
        }
        // SAFETY: the mapping is read-only and owned by the reader. Truncation of the file by
        // another process while mapped is not guarded against.
        unsafe { Mmap::map(&file) }
    }

    /// Returns true if at least `n` bytes remain after the cursor.
    pub fn has(&self, n: usize) -> bool {
        n <= self.remaining()
    }

    /// Decodes a `T` at the cursor without moving it.
    pub fn peek<T: Primitive>(&self) -> Result<T> {
        self.check(T::SIZE)?;
        let mut buf = [0u8; MAX_SIZE];
        let bytes = &mut buf[..T::SIZE];
        self.decode_at_cursor(bytes);
        Ok(T::from_le_slice(bytes))
    }

    /// Decodes a `T` at the cursor and moves past it.
    pub fn read<T: Primitive>(&mut self) -> Result<T> {
        let value = self.peek::<T>()?;
        self.pos += T::SIZE;
        Ok(value)
    }

    /// Moves the cursor forward `n` bytes.
    pub fn advance(&mut self, n: usize) -> Result<()> {
        self.check(n)?;
        self.pos += n;
        Ok(())
    }

    /// Moves the cursor to the start of the file.
    pub fn reset(&mut self) {
        self.pos = 0;
    }

    /// Moves the cursor to absolute `offset`, which may equal the file length.
    pub fn reset_to(&mut self, offset: usize) -> Result<()> {
        if offset > self.len() {
            return Err(Error::OutOfBounds {
                offset,
                requested: 0,
                len: self.len(),
            });
        }
        self.pos = offset;
        Ok(())
    }

    /// Absolute position of the cursor.
    pub fn offset(&self) -> usize {
        self.pos
    }

    /// The mapped bytes from the cursor to the end of the file, *not* XOR decoded.
    ///
    /// Useful for hashing a span in place.  The borrow prevents moving the cursor while the
    /// slice is alive.
    pub fn raw_position(&self) -> &[u8] {
        &self.mmap[self.pos..]
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Length of the mapped file in bytes.
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    /// Always false for an opened reader, empty files fail to map.
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.len() - self.pos
    }

    pub fn is_xor(&self) -> bool {
        self.mask.is_some()
    }

    fn check(&self, requested: usize) -> Result<()> {
        if self.has(requested) {
            return Ok(());
        }
        Err(Error::OutOfBounds {
            offset: self.pos,
            requested,
            len: self.len(),
        })
    }

    /// Copies `buf.len()` bytes at the cursor into `buf`, callers must check bounds first.
    fn decode_at_cursor(&self, buf: &mut [u8]) {
        buf.copy_from_slice(&self.mmap[self.pos..self.pos + buf.len()]);
        if let Some(mask) = &self.mask {
            mask.apply(self.pos, buf);
        }
    }
}

/// Reads decoded bytes, advancing the cursor by the amount returned (`0` at end of file).
impl Read for MemReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let size = min(buf.len(), self.remaining());
        self.decode_at_cursor(&mut buf[..size]);
        self.pos += size;
        Ok(size)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    pub(crate) const MASK: [u8; 8] = [0x12, 0x34, 0x56, 0x78, 0x9a, 0xbc, 0xde, 0xf0];

    /// Writes `bytes` to a temp file and opens it, the file must outlive the reader.
    pub(crate) fn open(bytes: &[u8], key: Option<&[u8]>) -> (NamedTempFile, MemReader) {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        let reader = MemReader::open(file.path(), key).unwrap();
        (file, reader)
    }

    fn obfuscate(bytes: &[u8]) -> Vec<u8> {
        let mut bytes = bytes.to_vec();
        XorMask::new(MASK).apply(0, &mut bytes);
        bytes
    }

    fn assert_out_of_bounds<T: std::fmt::Debug>(result: Result<T>) {
        assert!(
            matches!(result, Err(Error::OutOfBounds { .. })),
            "expected OutOfBounds, got {:?}",
            result
        );
    }

    #[test]
    fn end_to_end_scenario() {
        let (_file, mut reader) = open(&[0x05, 0x01, 0x02, 0x03, 0x04, 0x05], None);
        assert_eq!(reader.read_varint().unwrap(), 5);
        assert_eq!(reader.read::<u8>().unwrap(), 1);
        assert_eq!(reader.offset(), 2);
        assert!(reader.has(4));
        assert!(!reader.has(5));
    }

    #[test]
    fn reads_are_little_endian_and_advance() {
        let (_file, mut reader) = open(&[0xf9, 0xbe, 0xb4, 0xd9, 0x1d, 0x01, 0x00, 0x00, 0xff], None);
        assert_eq!(reader.read::<u32>().unwrap(), 0xd9b4_bef9);
        assert_eq!(reader.offset(), 4);
        assert_eq!(reader.read::<u32>().unwrap(), 285);
        assert_eq!(reader.read::<i8>().unwrap(), -1);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn peek_then_read_advances_once() {
        let (_file, mut reader) = open(&[1, 2, 3, 4, 5, 6, 7, 8, 9], None);
        reader.advance(1).unwrap();
        let peeked = reader.peek::<u64>().unwrap();
        assert_eq!(reader.offset(), 1);
        assert_eq!(reader.read::<u64>().unwrap(), peeked);
        assert_eq!(reader.offset(), 9);
    }

    #[test]
    fn failed_operations_leave_cursor_unchanged() {
        let (_file, mut reader) = open(&[0; 7], None);
        reader.advance(3).unwrap();
        assert!(!reader.has(5));

        assert_out_of_bounds(reader.peek::<u64>());
        assert_out_of_bounds(reader.read::<u64>());
        assert_out_of_bounds(reader.read::<i64>());
        assert_out_of_bounds(reader.advance(5));
        assert_out_of_bounds(reader.advance(usize::MAX));
        assert_out_of_bounds(reader.reset_to(8));
        assert_eq!(reader.offset(), 3);

        assert_eq!(reader.read::<u32>().unwrap(), 0);
        assert_out_of_bounds(reader.read::<u8>());
        assert_eq!(reader.offset(), 7);
    }

    #[test]
    fn reset_and_reset_to() {
        let (_file, mut reader) = open(&[10, 20, 30, 40], None);
        reader.reset_to(2).unwrap();
        assert_eq!(reader.offset(), 2);
        assert_eq!(reader.read::<u8>().unwrap(), 30);

        reader.reset_to(4).unwrap();
        assert_eq!(reader.offset(), 4);
        assert!(reader.has(0));
        assert!(!reader.has(1));

        assert_out_of_bounds(reader.reset_to(5));
        assert_eq!(reader.offset(), 4);

        reader.reset();
        assert_eq!(reader.offset(), 0);
        assert_eq!(reader.read::<u8>().unwrap(), 10);
    }

    #[test]
    fn xor_decodes_by_absolute_offset() {
        let plain: Vec<u8> = (0u8..32).collect();
        let (_file, mut reader) = open(&obfuscate(&plain), Some(&MASK));
        assert!(reader.is_xor());

        // Odd sized reads and seeks must still line up with the mask
        assert_eq!(reader.read::<u8>().unwrap(), 0);
        assert_eq!(reader.read::<u16>().unwrap(), u16::from_le_bytes([1, 2]));
        reader.advance(2).unwrap();
        assert_eq!(reader.read::<u32>().unwrap(), u32::from_le_bytes([5, 6, 7, 8]));
        reader.reset_to(13).unwrap();
        assert_eq!(
            reader.peek::<u64>().unwrap(),
            u64::from_le_bytes([13, 14, 15, 16, 17, 18, 19, 20])
        );

        reader.reset_to(13).unwrap();
        let bytes: Vec<u8> = (0..8).map(|_| reader.read::<u8>().unwrap()).collect();
        assert_eq!(bytes, plain[13..21]);
    }

    #[test]
    fn xor_split_reads_match_whole_reads() {
        let plain: Vec<u8> = (100u8..140).collect();
        let (_file, mut reader) = open(&obfuscate(&plain), Some(&MASK));
        reader.advance(3).unwrap();
        let whole = reader.peek::<u64>().unwrap();
        let low = reader.read::<u32>().unwrap() as u64;
        let high = reader.read::<u32>().unwrap() as u64;
        assert_eq!(whole, low | (high << 32));

        let mut chunks = vec![0u8; plain.len()];
        reader.reset();
        reader.read_exact(&mut chunks[..5]).unwrap();
        reader.read_exact(&mut chunks[5..17]).unwrap();
        reader.read_exact(&mut chunks[17..]).unwrap();
        assert_eq!(chunks, plain);
    }

    #[test]
    fn wrong_key_length_passes_through() {
        let stored = [0xde, 0xad, 0xbe, 0xef, 0x01];
        for key in [&MASK[..7], &[0u8; 9][..], &[][..]] {
            let (_file, mut reader) = open(&stored, Some(key));
            assert!(!reader.is_xor());
            let mut bytes = vec![];
            reader.read_to_end(&mut bytes).unwrap();
            assert_eq!(bytes, stored);
        }
    }

    #[test]
    fn raw_position_is_not_decoded() {
        let stored = obfuscate(&[1, 2, 3, 4, 5]);
        let (_file, mut reader) = open(&stored, Some(&MASK));
        reader.advance(2).unwrap();
        assert_eq!(reader.raw_position(), &stored[2..]);
        reader.advance(3).unwrap();
        assert!(reader.raw_position().is_empty());
    }

    #[test]
    fn io_read_stops_at_end_of_file() {
        let (_file, mut reader) = open(&[1, 2, 3], None);
        let mut buf = [0u8; 8];
        assert_eq!(Read::read(&mut reader, &mut buf).unwrap(), 3);
        assert_eq!(buf[..3], [1, 2, 3]);
        assert_eq!(Read::read(&mut reader, &mut buf).unwrap(), 0);
        assert_eq!(reader.offset(), 3);
    }

    #[test]
    fn missing_file_fails_to_map() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blk99999.dat");
        match MemReader::open(&path, None) {
            Err(Error::MapFailure { path: failed, .. }) => assert_eq!(failed, path),
            other => panic!("expected MapFailure, got {:?}", other.map(|r| r.offset())),
        }
    }

    #[test]
    fn empty_file_fails_to_map() {
        let file = NamedTempFile::new().unwrap();
        let result = MemReader::open(file.path(), Some(&MASK));
        assert!(matches!(result, Err(Error::MapFailure { .. })));
    }

    #[test]
    fn accessors() {
        let (file, reader) = open(&[0; 12], None);
        assert_eq!(reader.path(), file.path());
        assert_eq!(reader.len(), 12);
        assert!(!reader.is_empty());
        assert_eq!(reader.remaining(), 12);
    }
}
