use std::path::Path;
use std::sync::atomic::AtomicU8;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::errors::{TableError, TableResult};
use crate::hashing::{is_valid_base, KmerHash, KmerHasher, KmerIterator, SeenSet};
use crate::reads::{ConsumeStats, FastxRecords, Record};
use crate::storage::{BitCells, ByteCells, CellCodec, Count, NibbleCells, Storage};

/// Records handed to each rayon pass in `consume_records_parallel`.
const PARALLEL_BATCH_SIZE: usize = 10_000;

/// A k-mer counting table: a fixed k bound to one counting store.
///
/// All counting methods take `&self`, so a table can be shared between
/// threads consuming disjoint reads. The table owns its store and is not
/// `Clone`.
#[derive(Debug)]
pub struct Hashtable<C: CellCodec> {
    hasher: KmerHasher,
    store: Storage<C>,
}

/// Byte cells (counts up to 255, optional bigcounts).
pub type Counttable = Hashtable<ByteCells>;
/// Nibble cells (counts up to 15).
pub type SmallCounttable = Hashtable<NibbleCells>;
/// Presence bits only.
pub type Nodetable = Hashtable<BitCells>;

impl<C: CellCodec> Hashtable<C> {
    pub fn new(ksize: u8, tablesizes: &[u64]) -> TableResult<Self> {
        Ok(Hashtable {
            hasher: KmerHasher::new(ksize)?,
            store: Storage::new(tablesizes)?,
        })
    }

    pub fn ksize(&self) -> u8 {
        self.hasher.ksize()
    }

    /// The hashing primitives this table uses, for code that walks the
    /// tables directly.
    pub fn hasher(&self) -> &KmerHasher {
        &self.hasher
    }

    pub fn hash_dna(&self, kmer: &[u8]) -> TableResult<KmerHash> {
        self.hasher.hash(kmer)
    }

    pub fn hash_dna_top_strand(&self, kmer: &[u8]) -> TableResult<KmerHash> {
        Ok(self.hasher.hash_with_strands(kmer)?.forward)
    }

    pub fn hash_dna_bottom_strand(&self, kmer: &[u8]) -> TableResult<KmerHash> {
        Ok(self.hasher.hash_with_strands(kmer)?.reverse)
    }

    pub fn unhash_dna(&self, hash: KmerHash) -> Vec<u8> {
        self.hasher.unhash(hash)
    }

    pub fn count(&self, kmer: &[u8]) -> TableResult<()> {
        self.store.add(self.hash_dna(kmer)?);
        Ok(())
    }

    pub fn count_hash(&self, khash: KmerHash) {
        self.store.add(khash);
    }

    pub fn add(&self, kmer: &[u8]) -> TableResult<()> {
        self.count(kmer)
    }

    pub fn add_hash(&self, khash: KmerHash) {
        self.store.add(khash);
    }

    pub fn get_count(&self, kmer: &[u8]) -> TableResult<Count> {
        Ok(self.store.get_count(self.hash_dna(kmer)?))
    }

    pub fn get_count_hash(&self, khash: KmerHash) -> Count {
        self.store.get_count(khash)
    }

    /// Largest count this table can report with its current settings.
    pub fn max_count(&self) -> Count {
        self.store.max_count()
    }

    pub fn set_use_bigcount(&mut self, use_bigcount: bool) {
        self.store.set_use_bigcount(use_bigcount);
    }

    pub fn get_use_bigcount(&self) -> bool {
        self.store.get_use_bigcount()
    }

    pub fn n_unique_kmers(&self) -> u64 {
        self.store.n_unique_kmers()
    }

    pub fn n_occupied(&self) -> u64 {
        self.store.n_occupied()
    }

    pub fn tablesizes(&self) -> &[u64] {
        self.store.tablesizes()
    }

    pub fn n_tables(&self) -> usize {
        self.store.n_tables()
    }

    pub fn raw_tables(&self) -> Vec<&[AtomicU8]> {
        self.store.raw_tables()
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> TableResult<()> {
        self.store.save(path, self.ksize())
    }

    /// Load a saved table file, taking k from the file.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> TableResult<()> {
        let ksize = self.store.load(path)?;
        self.hasher = KmerHasher::new(ksize)?;
        Ok(())
    }

    pub(crate) fn kmer_hashes<'a>(
        &'a self,
        seq: &'a [u8],
    ) -> TableResult<KmerIterator<'a>> {
        self.hasher.iter_kmers(seq)
    }

    /// Estimated count of every window of `seq`, left to right.
    pub fn get_kmer_counts(&self, seq: &[u8]) -> TableResult<Vec<Count>> {
        Ok(self
            .kmer_hashes(seq)?
            .map(|hashes| self.store.get_count(hashes.forward))
            .collect())
    }

    /// Count every k-mer in an already validated sequence.
    pub fn consume_string(&self, seq: &[u8]) -> TableResult<u32> {
        let mut n_consumed = 0;
        for hashes in self.kmer_hashes(seq)? {
            self.store.add(hashes.forward);
            n_consumed += 1;
        }
        Ok(n_consumed)
    }

    /// Uppercase `read` in place and report whether it can be counted: it
    /// must hold at least k symbols, all of them A, C, G or T.
    pub fn check_and_normalize_read(&self, read: &mut [u8]) -> bool {
        if read.len() < usize::from(self.ksize()) {
            return false;
        }
        read.make_ascii_uppercase();
        read.iter().all(|&b| is_valid_base(b))
    }

    /// Normalize `read` and count its k-mers if it is valid. Returns `None`
    /// for reads that were rejected.
    pub fn check_and_process_read(&self, read: &mut [u8]) -> Option<u32> {
        if !self.check_and_normalize_read(read) {
            return None;
        }
        self.consume_string(read).ok()
    }

    /// Count the k-mers of every read in a FASTA/FASTQ file.
    pub fn consume_fasta<P: AsRef<Path>>(&self, path: P) -> TableResult<ConsumeStats> {
        let stats = self.consume_records(FastxRecords::from_path(path.as_ref())?)?;
        info!(
            path = ?path.as_ref(),
            reads = stats.total_reads,
            kmers = stats.n_consumed,
            skipped = stats.n_skipped,
            "consumed sequence file"
        );
        Ok(stats)
    }

    /// Count the k-mers of every read from `records`.
    ///
    /// Reads that are too short or hold non-ACGT symbols are skipped and
    /// tallied; an error from the source itself aborts the scan.
    pub fn consume_records<I>(&self, records: I) -> TableResult<ConsumeStats>
    where
        I: IntoIterator<Item = TableResult<Record>>,
    {
        let mut stats = ConsumeStats::default();
        for record in records {
            let mut record = record?;
            stats.merge(&self.consume_record(&mut record));
        }
        Ok(stats)
    }

    /// Same as `consume_records` but counts batches of reads on the rayon
    /// thread pool.
    pub fn consume_records_parallel<I>(&self, records: I) -> TableResult<ConsumeStats>
    where
        I: IntoIterator<Item = TableResult<Record>>,
    {
        let mut stats = ConsumeStats::default();
        let mut batch = Vec::with_capacity(PARALLEL_BATCH_SIZE);
        let mut records = records.into_iter();
        loop {
            batch.clear();
            for record in records.by_ref().take(PARALLEL_BATCH_SIZE) {
                batch.push(record?);
            }
            if batch.is_empty() {
                break;
            }
            let batch_stats = batch
                .par_iter_mut()
                .map(|record| self.consume_record(record))
                .reduce(ConsumeStats::default, |mut a, b| {
                    a.merge(&b);
                    a
                });
            stats.merge(&batch_stats);
        }
        Ok(stats)
    }

    fn consume_record(&self, record: &mut Record) -> ConsumeStats {
        match self.check_and_process_read(&mut record.seq) {
            Some(n_consumed) => ConsumeStats {
                total_reads: 1,
                n_consumed: u64::from(n_consumed),
                n_skipped: 0,
            },
            None => {
                debug!(id = %String::from_utf8_lossy(&record.id), "skipping invalid read");
                ConsumeStats {
                    total_reads: 1,
                    n_consumed: 0,
                    n_skipped: 1,
                }
            }
        }
    }

    /// Every k-mer of `seq` as written on the forward strand.
    pub fn get_kmers(&self, seq: &[u8]) -> Vec<Vec<u8>> {
        seq.windows(usize::from(self.ksize()))
            .map(|kmer| kmer.to_vec())
            .collect()
    }

    pub fn get_kmer_hashes(&self, seq: &[u8]) -> TableResult<Vec<KmerHash>> {
        Ok(self.kmer_hashes(seq)?.map(|hashes| hashes.forward).collect())
    }

    pub fn get_kmer_hashes_as_hashset(&self, seq: &[u8]) -> TableResult<SeenSet> {
        Ok(self.kmer_hashes(seq)?.map(|hashes| hashes.forward).collect())
    }

    fn check_has_window(&self, seq: &[u8]) -> TableResult<()> {
        if seq.len() < usize::from(self.ksize()) {
            return Err(TableError::SequenceTooShort {
                length: seq.len(),
                ksize: self.ksize(),
            });
        }
        Ok(())
    }

    pub fn get_min_count(&self, seq: &[u8]) -> TableResult<Count> {
        self.check_has_window(seq)?;
        Ok(self.get_kmer_counts(seq)?.into_iter().min().unwrap_or(0))
    }

    pub fn get_max_count(&self, seq: &[u8]) -> TableResult<Count> {
        self.check_has_window(seq)?;
        Ok(self.get_kmer_counts(seq)?.into_iter().max().unwrap_or(0))
    }
}
