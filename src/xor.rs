//! Handles XOR'd Bitcoin-core block data.
//!
//! - https://github.com/bitcoin/bitcoin/pull/28052

/// XOR mask length. It's the length of file `blocks/xor.dat`.
pub const XOR_MASK_LEN: usize = 8;

/// The key used to de-obfuscate `blk*.dat` bytes.
///
/// Every byte is XOR'd with `mask[offset % XOR_MASK_LEN]` where `offset` is its absolute
/// position in the file, so decoding is independent of how reads are split up.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct XorMask([u8; XOR_MASK_LEN]);

impl XorMask {
    /// Wraps the contents of `blocks/xor.dat`.
    pub fn new(mask: [u8; XOR_MASK_LEN]) -> Self {
        Self(mask)
    }

    /// Returns `None` unless `key` is exactly [`XOR_MASK_LEN`] bytes long.
    pub fn from_key(key: &[u8]) -> Option<Self> {
        <[u8; XOR_MASK_LEN]>::try_from(key).ok().map(Self)
    }

    /// The mask byte applied at absolute file `offset`.
    pub fn byte_at(&self, offset: usize) -> u8 {
        self.0[offset % XOR_MASK_LEN]
    }

    /// XOR `buf` in place, treating `buf[0]` as the byte at absolute file `offset`.
    ///
    /// Applying twice with the same offset restores the input.
    pub fn apply(&self, offset: usize, buf: &mut [u8]) {
        for (i, x) in buf.iter_mut().enumerate() {
            *x ^= self.byte_at(offset + i);
        }
    }
}
