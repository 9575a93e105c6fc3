//! Bitcoin variable length integers, also known as `CompactSize`.
//!
//! - https://en.bitcoin.it/wiki/Protocol_documentation#Variable_length_integer

use crate::error::Result;
use crate::MemReader;

/// Tag for a `u16` payload, any smaller tag is the value itself
const TAG_U16: u8 = 0xFD;
/// Tag for a `u32` payload
const TAG_U32: u8 = 0xFE;
/// Tag for a `u64` payload
const TAG_U64: u8 = 0xFF;

/// Number of bytes `n` occupies when encoded as a varint (1, 3, 5 or 9).
pub fn varint_size(n: u64) -> usize {
    if n < TAG_U16 as u64 {
        1
    } else if n <= u16::MAX as u64 {
        3
    } else if n <= u32::MAX as u64 {
        5
    } else {
        9
    }
}

impl MemReader {
    /// Reads a varint narrowed to `u32`.
    ///
    /// A `0xFF` tagged value keeps only its low 32 bits, use [`MemReader::read_compact_size`] if
    /// the full range is needed.  On error the cursor is left before the tag byte.
    pub fn read_varint(&mut self) -> Result<u32> {
        Ok(self.read_compact_size()? as u32)
    }

    /// Reads a varint without narrowing.  On error the cursor is left before the tag byte.
    pub fn read_compact_size(&mut self) -> Result<u64> {
        let start = self.offset();
        let value = self.read_compact_size_inner();
        if value.is_err() {
            self.reset_to(start)?;
        }
        value
    }

    fn read_compact_size_inner(&mut self) -> Result<u64> {
        Ok(match self.read::<u8>()? {
            TAG_U16 => self.read::<u16>()? as u64,
            TAG_U32 => self.read::<u32>()? as u64,
            TAG_U64 => self.read::<u64>()?,
            v => v as u64,
        })
    }
}
