//! The closed set of fixed-width integers that [`crate::MemReader`] can decode.

/// Largest [`Primitive::SIZE`], used for stack buffers.
pub(crate) const MAX_SIZE: usize = 8;

mod sealed {
    pub trait Sealed {}
}

/// A fixed-width integer stored little-endian in `blk` files.
///
/// Sealed, only implemented for `u8`-`u64` and `i8`-`i64`.
pub trait Primitive: sealed::Sealed + Copy {
    /// Width in bytes.
    const SIZE: usize;

    /// Assembles the value from exactly [`Self::SIZE`] bytes in file order.
    ///
    /// # Panics
    /// If `bytes.len()` is not [`Self::SIZE`].
    fn from_le_slice(bytes: &[u8]) -> Self;
}

macro_rules! impl_primitive {
    ($($t:ty),*) => {$(
        impl sealed::Sealed for $t {}

        impl Primitive for $t {
            const SIZE: usize = std::mem::size_of::<$t>();

            fn from_le_slice(bytes: &[u8]) -> Self {
                let mut buf = [0u8; std::mem::size_of::<$t>()];
                buf.copy_from_slice(bytes);
                <$t>::from_le_bytes(buf)
            }
        }
    )*};
}

impl_primitive!(u8, u16, u32, u64, i8, i16, i32, i64);
