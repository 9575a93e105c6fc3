use anyhow::{bail, Result};
use bitcoin::block::Header;
use bitcoin_mem_reader::{varint_size, Error, MemReader};
use clap::{Parser, ValueEnum};
use log::{info, warn};
use std::io::Read;

/// Before the header are 4 magic bytes and 4 bytes that indicate the block size
const PRE_HEADER_SIZE: usize = 8;
/// How many bytes `dump` prints
const DUMP_BYTES: usize = 64;

/// Inspects a single BLK file through the memory-mapped reader
#[derive(Parser, Debug)]
struct Args {
    /// BLK file to read
    #[arg(short, long)]
    input: String,

    /// The `blocks/xor.dat` key file, omit for un-obfuscated data
    #[arg(short, long)]
    xor: Option<String>,

    /// Byte offset to start reading at
    #[arg(short, long, default_value_t = 0)]
    offset: usize,

    /// Which of the functions to run
    #[arg(short, long)]
    run: Function,
}

/// Types of functions we can run
#[derive(ValueEnum, Clone, Debug)]
enum Function {
    Headers,
    Varint,
    Dump,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let key = match &args.xor {
        Some(path) => Some(std::fs::read(path)?),
        None => None,
    };
    let mut reader = MemReader::open(&args.input, key.as_deref())?;
    reader.reset_to(args.offset)?;

    match args.run {
        Function::Headers => {
            let count = headers(&mut reader)?;
            info!("Found {} blocks in {:?}", count, reader.path());
        }
        Function::Varint => println!("{}", varint(&mut reader)?),
        Function::Dump => println!("{}", dump(&mut reader)?),
    }
    Ok(())
}

/// Walks the block records from the cursor, logging every header found.
///
/// Stops at the zero filled tail of a pre-allocated file or at a truncated record, returning
/// the number of blocks found.
fn headers(reader: &mut MemReader) -> Result<usize> {
    let mut count = 0;
    while reader.has(PRE_HEADER_SIZE + Header::SIZE) {
        let start = reader.offset();
        let magic: u32 = reader.read()?;
        // Bitcoin Core pre-allocates blk files with zeros
        if magic == 0 {
            break;
        }
        let size: u32 = reader.read()?;

        let mut buffer = [0; Header::SIZE];
        reader.read_exact(&mut buffer)?;
        let header: Header = bitcoin::consensus::deserialize(&buffer)?;
        let Some(tx_count) = or_truncated(reader.read_varint(), start)? else {
            break;
        };
        info!("{:>10} {} txs: {}", start, header.block_hash(), tx_count);
        count += 1;

        let next = start + PRE_HEADER_SIZE + size as usize;
        if or_truncated(reader.reset_to(next), start)?.is_none() {
            break;
        }
    }
    Ok(count)
}

/// Maps `OutOfBounds` to `None` so a truncated record ends the walk
fn or_truncated<T>(result: bitcoin_mem_reader::Result<T>, start: usize) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e @ Error::OutOfBounds { .. }) => {
            warn!("Truncated block at offset {}: {}", start, e);
            Ok(None)
        }
        Err(e) => bail!(e),
    }
}

/// Formats the varint at the cursor with its encoded size
fn varint(reader: &mut MemReader) -> Result<String> {
    let value = reader.read_compact_size()?;
    Ok(format!("{} ({} bytes)", value, varint_size(value)))
}

/// Formats up to `DUMP_BYTES` decoded bytes at the cursor as hex
fn dump(reader: &mut MemReader) -> Result<String> {
    let offset = reader.offset();
    let mut buffer = vec![0; DUMP_BYTES.min(reader.remaining())];
    reader.read_exact(&mut buffer)?;
    let hex: Vec<String> = buffer.iter().map(|b| format!("{:02x}", b)).collect();
    Ok(format!("{:08x}: {}", offset, hex.join(" ")))
}
