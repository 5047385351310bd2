use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

use crate::storage::Count;

/// Largest count a byte cell can hold.
pub const MAX_KCOUNT: Count = 255;
/// Largest count a nibble cell can hold.
pub const MAX_NIBBLE_COUNT: Count = 15;

/// Which cell width a table file was written with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageKind {
    Bit,
    Nibble,
    Byte,
}

/// Bit-width specific cell logic for `Storage`.
///
/// Cells are packed into `AtomicU8` bytes and every update is a single
/// atomic read-modify-write, so one table can be shared across threads.
pub trait CellCodec: Send + Sync + 'static {
    const KIND: StorageKind;
    const MAX_COUNT: Count;
    const SUPPORTS_BIGCOUNT: bool;

    /// Bytes needed to hold `tablesize` cells.
    fn table_bytes(tablesize: u64) -> usize;

    /// Saturating increment of cell `bin`; returns the value it held before.
    fn increment(cells: &[AtomicU8], bin: u64) -> Count;

    fn get(cells: &[AtomicU8], bin: u64) -> Count;
}

/// One presence bit per cell.
#[derive(Debug)]
pub struct BitCells;

impl CellCodec for BitCells {
    const KIND: StorageKind = StorageKind::Bit;
    const MAX_COUNT: Count = 1;
    const SUPPORTS_BIGCOUNT: bool = false;

    fn table_bytes(tablesize: u64) -> usize {
        ((tablesize + 7) / 8) as usize
    }

    #[inline]
    fn increment(cells: &[AtomicU8], bin: u64) -> Count {
        let mask = 1u8 << (bin % 8);
        let prev = cells[(bin / 8) as usize].fetch_or(mask, Ordering::Relaxed);
        Count::from(prev & mask != 0)
    }

    #[inline]
    fn get(cells: &[AtomicU8], bin: u64) -> Count {
        let mask = 1u8 << (bin % 8);
        Count::from(cells[(bin / 8) as usize].load(Ordering::Relaxed) & mask != 0)
    }
}

/// Two 4-bit counters per byte; the even bin lives in the low nibble.
#[derive(Debug)]
pub struct NibbleCells;

impl CellCodec for NibbleCells {
    const KIND: StorageKind = StorageKind::Nibble;
    const MAX_COUNT: Count = MAX_NIBBLE_COUNT;
    const SUPPORTS_BIGCOUNT: bool = false;

    fn table_bytes(tablesize: u64) -> usize {
        ((tablesize + 1) / 2) as usize
    }

    #[inline]
    fn increment(cells: &[AtomicU8], bin: u64) -> Count {
        let shift = (bin % 2) * 4;
        let result = cells[(bin / 2) as usize].fetch_update(
            Ordering::Relaxed,
            Ordering::Relaxed,
            |byte| {
                let nibble = (byte >> shift) & 0x0F;
                if Count::from(nibble) < MAX_NIBBLE_COUNT {
                    Some(byte + (1u8 << shift))
                } else {
                    None
                }
            },
        );
        let prev = match result {
            Ok(byte) | Err(byte) => byte,
        };
        Count::from((prev >> shift) & 0x0F)
    }

    #[inline]
    fn get(cells: &[AtomicU8], bin: u64) -> Count {
        let shift = (bin % 2) * 4;
        Count::from((cells[(bin / 2) as usize].load(Ordering::Relaxed) >> shift) & 0x0F)
    }
}

/// One 8-bit counter per cell; the only width that can spill into bigcounts.
#[derive(Debug)]
pub struct ByteCells;

impl CellCodec for ByteCells {
    const KIND: StorageKind = StorageKind::Byte;
    const MAX_COUNT: Count = MAX_KCOUNT;
    const SUPPORTS_BIGCOUNT: bool = true;

    fn table_bytes(tablesize: u64) -> usize {
        tablesize as usize
    }

    #[inline]
    fn increment(cells: &[AtomicU8], bin: u64) -> Count {
        let result = cells[bin as usize].fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| {
            c.checked_add(1)
        });
        match result {
            Ok(prev) | Err(prev) => Count::from(prev),
        }
    }

    #[inline]
    fn get(cells: &[AtomicU8], bin: u64) -> Count {
        Count::from(cells[bin as usize].load(Ordering::Relaxed))
    }
}
