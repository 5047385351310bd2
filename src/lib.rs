//! Probabilistic k-mer counting tables for DNA reads.
//!
//! A `Hashtable` binds a k-mer length to several independent count tables
//! that are consulted together (count-min style). Three cell widths are
//! available: `Counttable` (bytes, with optional exact "bigcounts" past
//! 255), `SmallCounttable` (nibbles) and `Nodetable` (presence bits).
//! On top of the counts sit per-read statistics, abundance histograms and
//! abundance-based trimming.
//!
//! ```no_run
//! use kmer_tables::{Counttable, TableResult};
//!
//! fn main() -> TableResult<()> {
//!     let table = Counttable::new(21, &[999_983, 999_979, 999_961, 999_959])?;
//!     let stats = table.consume_fasta("reads.fq")?;
//!     println!("{} k-mers from {} reads", stats.n_consumed, stats.total_reads);
//!     let trimmed_at = table.trim_on_abundance(b"ACGTTGCAAGTCCGATTAGCAAGT", 2)?;
//!     println!("trim at {}", trimmed_at);
//!     Ok(())
//! }
//! ```
pub mod errors;
mod filtering;
pub mod hashing;
pub mod hashtable;
pub mod params;
pub mod reads;
pub mod serialization;
pub mod statistics;
pub mod storage;

pub use crate::errors::{TableError, TableResult};
pub use crate::hashing::{KmerHash, KmerHasher, StrandHashes, MAX_KSIZE};
pub use crate::hashtable::{Counttable, Hashtable, Nodetable, SmallCounttable};
pub use crate::params::TableParams;
pub use crate::reads::{ConsumeStats, FastxRecords, Record};
pub use crate::statistics::{AbundanceDistribution, MedianCount};
pub use crate::storage::{Count, MAX_BIGCOUNT, MAX_KCOUNT};
