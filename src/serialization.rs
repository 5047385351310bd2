use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::AtomicU8;

use memmap::MmapOptions;
use serde::{Deserialize, Serialize};

use crate::errors::{TableError, TableResult};
use crate::hashing::{KmerHash, MAX_KSIZE};
use crate::storage::{CellCodec, Count, StorageKind};

pub const TABLE_FILE_SIGNATURE: [u8; 4] = *b"KMTB";
pub const TABLE_FILE_VERSION: u8 = 1;
pub const TABLE_EXT: &str = ".kt";

/// One table's cells. `Cells` is a borrowed `&[AtomicU8]` when saving, so
/// the live table is streamed out as is, and an owned `Box<[AtomicU8]>`
/// when loading, so the decoded cells become the new table directly.
#[derive(Debug, Serialize, Deserialize)]
pub struct SavedTable<Cells> {
    pub tablesize: u64,
    pub cells: Cells,
}

/// On-disk layout of a counting store, written with bincode.
#[derive(Debug, Serialize, Deserialize)]
pub struct SavedTables<Cells> {
    pub signature: [u8; 4],
    pub version: u8,
    pub kind: StorageKind,
    pub ksize: u8,
    pub use_bigcount: bool,
    pub n_unique_kmers: u64,
    pub tables: Vec<SavedTable<Cells>>,
    pub bigcounts: Vec<(KmerHash, Count)>,
}

/// Tables decoded from a file, ready to be moved into a store.
pub type LoadedTables = SavedTables<Box<[AtomicU8]>>;

impl<Cells: AsRef<[AtomicU8]>> SavedTables<Cells> {
    pub fn new(
        kind: StorageKind,
        ksize: u8,
        use_bigcount: bool,
        n_unique_kmers: u64,
        tables: Vec<SavedTable<Cells>>,
        bigcounts: Vec<(KmerHash, Count)>,
    ) -> Self {
        SavedTables {
            signature: TABLE_FILE_SIGNATURE,
            version: TABLE_FILE_VERSION,
            kind,
            ksize,
            use_bigcount,
            n_unique_kmers,
            tables,
            bigcounts,
        }
    }

    /// Check that this file can be loaded into a store with cells `C`.
    pub fn validate<C: CellCodec>(&self) -> TableResult<()> {
        let malformed = |msg: String| Err(TableError::MalformedPersistedState(msg));

        if self.signature != TABLE_FILE_SIGNATURE {
            return malformed(format!("bad signature {:?}", self.signature));
        }
        if self.version != TABLE_FILE_VERSION {
            return malformed(format!(
                "unsupported version {} (expected {})",
                self.version, TABLE_FILE_VERSION
            ));
        }
        if self.kind != C::KIND {
            return malformed(format!(
                "file holds {:?} tables but this table uses {:?} cells",
                self.kind,
                C::KIND
            ));
        }
        if self.ksize == 0 || self.ksize > MAX_KSIZE {
            return malformed(format!("k of {} is out of range", self.ksize));
        }
        if self.tables.is_empty() {
            return malformed("no tables in file".to_string());
        }
        for (ix, table) in self.tables.iter().enumerate() {
            let n_bytes = table.cells.as_ref().len();
            if table.tablesize == 0 || n_bytes != C::table_bytes(table.tablesize) {
                return malformed(format!(
                    "table {} has {} bytes for {} cells",
                    ix,
                    n_bytes,
                    table.tablesize
                ));
            }
        }
        if !self.bigcounts.is_empty() && !C::SUPPORTS_BIGCOUNT {
            return malformed(format!("{:?} tables cannot hold bigcounts", C::KIND));
        }
        Ok(())
    }
}

pub fn write_table_file(path: &Path, saved: &SavedTables<&[AtomicU8]>) -> TableResult<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    bincode::serialize_into(&mut writer, saved)?;
    writer.flush()?;
    Ok(())
}

pub fn read_table_file(path: &Path) -> TableResult<LoadedTables> {
    let file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Err(TableError::MalformedPersistedState(format!(
            "{} is empty",
            path.display()
        )));
    }
    let mapped = unsafe { MmapOptions::new().map(&file)? };
    bincode::deserialize(&mapped).map_err(|e| {
        TableError::MalformedPersistedState(format!("could not decode {}: {}", path.display(), e))
    })
}
