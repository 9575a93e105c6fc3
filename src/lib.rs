//! Bounds-checked reader over memory-mapped bitcoin `blk*.dat` files.
//!
//! [`MemReader`] maps a whole file read-only and decodes it on demand through a single cursor:
//! fixed-width little-endian integers, bitcoin varints and raw bytes through [`std::io::Read`].
//! Files obfuscated by Bitcoin Core with `blocks/xor.dat` are decoded transparently when the
//! 8 byte key is supplied.
//!
//! # Examples
//! Read the record prefix and header of the first block in a file:
//! ```no_run
//! use bitcoin::block::Header;
//! use bitcoin_mem_reader::MemReader;
//! use std::io::Read;
//!
//! let key = std::fs::read("/home/user/.bitcoin/blocks/xor.dat").unwrap();
//! let mut reader = MemReader::open("/home/user/.bitcoin/blocks/blk00000.dat", Some(&key)).unwrap();
//! let _magic: u32 = reader.read().unwrap();
//! let _size: u32 = reader.read().unwrap();
//!
//! let mut buffer = [0; Header::SIZE];
//! reader.read_exact(&mut buffer).unwrap();
//! let header: Header = bitcoin::consensus::deserialize(&buffer).unwrap();
//! let tx_count = reader.read_varint().unwrap();
//! println!("{} has {} transactions", header.block_hash(), tx_count);
//! ```

pub mod error;
pub mod primitive;
pub mod reader;
pub mod varint;
pub mod xor;

pub use error::{Error, Result};
pub use primitive::Primitive;
pub use reader::MemReader;
pub use varint::varint_size;
pub use xor::{XorMask, XOR_MASK_LEN};
