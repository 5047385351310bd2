//! The multi-table counting store.
//!
//! A hash is counted in every table at `hash % tablesize` and its estimate
//! is the minimum over the tables (count-min). Cell width is chosen by the
//! `CellCodec` type parameter.
mod cells;

use std::marker::PhantomData;
use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::bail;
use crate::errors::TableResult;
use crate::hashing::KmerHash;
use crate::serialization::{read_table_file, write_table_file, SavedTable, SavedTables};
pub use cells::{
    BitCells, ByteCells, CellCodec, NibbleCells, StorageKind, MAX_KCOUNT, MAX_NIBBLE_COUNT,
};

pub type Count = u16;

/// Cap on the exact counts kept in the bigcount map.
pub const MAX_BIGCOUNT: Count = u16::MAX;

#[derive(Debug)]
pub struct Storage<C: CellCodec> {
    tablesizes: Vec<u64>,
    tables: Vec<Box<[AtomicU8]>>,
    occupied_bins: AtomicU64,
    n_unique_kmers: AtomicU64,
    use_bigcount: bool,
    bigcounts: DashMap<KmerHash, Count>,
    _codec: PhantomData<C>,
}

fn empty_table(n_bytes: usize) -> Box<[AtomicU8]> {
    (0..n_bytes).map(|_| AtomicU8::new(0)).collect()
}

impl<C: CellCodec> Storage<C> {
    pub fn new(tablesizes: &[u64]) -> TableResult<Self> {
        if tablesizes.is_empty() {
            bail!("at least one table is required");
        }
        if tablesizes.contains(&0) {
            bail!("table sizes must be nonzero, got {:?}", tablesizes);
        }
        let tables = tablesizes
            .iter()
            .map(|&size| empty_table(C::table_bytes(size)))
            .collect();
        debug!(kind = ?C::KIND, ?tablesizes, "allocated count tables");
        Ok(Storage {
            tablesizes: tablesizes.to_vec(),
            tables,
            occupied_bins: AtomicU64::new(0),
            n_unique_kmers: AtomicU64::new(0),
            use_bigcount: false,
            bigcounts: DashMap::new(),
            _codec: PhantomData,
        })
    }

    pub fn add(&self, khash: KmerHash) {
        let mut is_new_kmer = false;
        let mut n_full = 0;

        for (table, &size) in self.tables.iter().zip(&self.tablesizes) {
            let prev = C::increment(table, khash % size);
            if prev == 0 {
                is_new_kmer = true;
                self.occupied_bins.fetch_add(1, Ordering::Relaxed);
            } else if prev >= C::MAX_COUNT {
                n_full += 1;
            }
        }

        // every cell was already pinned at the max before this add, so the
        // exact count continues in the bigcount map
        if self.use_bigcount && n_full == self.tables.len() {
            self.bigcounts
                .entry(khash)
                .and_modify(|count| {
                    if *count < MAX_BIGCOUNT {
                        *count += 1;
                    }
                })
                .or_insert(C::MAX_COUNT.saturating_add(1));
        }

        if is_new_kmer {
            self.n_unique_kmers.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn get_count(&self, khash: KmerHash) -> Count {
        let min_count = self
            .tables
            .iter()
            .zip(&self.tablesizes)
            .map(|(table, &size)| C::get(table, khash % size))
            .min()
            .unwrap_or(0);

        if self.use_bigcount && min_count == C::MAX_COUNT {
            if let Some(count) = self.bigcounts.get(&khash) {
                return *count;
            }
        }
        min_count
    }

    /// Largest value `get_count` can report with the current settings.
    pub fn max_count(&self) -> Count {
        if self.use_bigcount {
            MAX_BIGCOUNT
        } else {
            C::MAX_COUNT
        }
    }

    /// Number of adds that found at least one empty cell.
    ///
    /// This is an occupancy-based lower bound for every cell width: a new
    /// k-mer whose cells were all already touched by others is not counted.
    pub fn n_unique_kmers(&self) -> u64 {
        self.n_unique_kmers.load(Ordering::Relaxed)
    }

    /// Nonzero cells summed over every table.
    pub fn n_occupied(&self) -> u64 {
        self.occupied_bins.load(Ordering::Relaxed)
    }

    pub fn set_use_bigcount(&mut self, use_bigcount: bool) {
        if use_bigcount && !C::SUPPORTS_BIGCOUNT {
            warn!(kind = ?C::KIND, "bigcount tracking is only available for byte storage");
            return;
        }
        self.use_bigcount = use_bigcount;
    }

    pub fn get_use_bigcount(&self) -> bool {
        self.use_bigcount
    }

    pub fn tablesizes(&self) -> &[u64] {
        &self.tablesizes
    }

    pub fn n_tables(&self) -> usize {
        self.tables.len()
    }

    /// Direct views of the packed cell bytes, one slice per table.
    pub fn raw_tables(&self) -> Vec<&[AtomicU8]> {
        self.tables.iter().map(|table| &table[..]).collect()
    }

    pub fn save<P: AsRef<Path>>(&self, path: P, ksize: u8) -> TableResult<()> {
        let tables: Vec<SavedTable<&[AtomicU8]>> = self
            .tables
            .iter()
            .zip(&self.tablesizes)
            .map(|(table, &tablesize)| SavedTable {
                tablesize,
                cells: &table[..],
            })
            .collect();
        let mut bigcounts: Vec<(KmerHash, Count)> = self
            .bigcounts
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect();
        bigcounts.sort_unstable();

        let saved = SavedTables::new(
            C::KIND,
            ksize,
            self.use_bigcount,
            self.n_unique_kmers(),
            tables,
            bigcounts,
        );
        write_table_file(path.as_ref(), &saved)?;
        debug!(path = ?path.as_ref(), ksize, "saved count tables");
        Ok(())
    }

    /// Replace the contents of this store with a saved table file and
    /// return the k it was saved with.
    ///
    /// The file is fully decoded and validated before anything is replaced,
    /// so a failed load leaves the store untouched.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> TableResult<u8> {
        let saved = read_table_file(path.as_ref())?;
        saved.validate::<C>()?;

        let mut occupied = 0u64;
        let mut tables = Vec::with_capacity(saved.tables.len());
        let mut tablesizes = Vec::with_capacity(saved.tables.len());
        for table in saved.tables {
            occupied += (0..table.tablesize)
                .filter(|&bin| C::get(&table.cells, bin) != 0)
                .count() as u64;
            tablesizes.push(table.tablesize);
            tables.push(table.cells);
        }

        self.tablesizes = tablesizes;
        self.tables = tables;
        self.occupied_bins = AtomicU64::new(occupied);
        self.n_unique_kmers = AtomicU64::new(saved.n_unique_kmers);
        self.use_bigcount = saved.use_bigcount;
        self.bigcounts = saved.bigcounts.into_iter().collect();
        debug!(path = ?path.as_ref(), ksize = saved.ksize, "loaded count tables");
        Ok(saved.ksize)
    }
}
