use std::path::Path;

use tracing::info;

use crate::bail;
use crate::errors::TableResult;
use crate::hashtable::Hashtable;
use crate::reads::{ConsumeStats, FastxRecords, Record};
use crate::storage::{CellCodec, Count};

/// Summary of the k-mer counts along one sequence.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MedianCount {
    pub median: Count,
    pub average: f64,
    pub stddev: f64,
}

/// Histogram of k-mer abundances across a set of reads.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AbundanceDistribution {
    /// `histogram[n]` is the number of distinct k-mers with estimated count
    /// `n`; the last bin also holds everything above it.
    pub histogram: Vec<u64>,
    pub stats: ConsumeStats,
}

impl<C: CellCodec> Hashtable<C> {
    /// Median, mean and (population) standard deviation of the counts of
    /// every window in `seq`. For an even number of windows the lower of the
    /// two middle counts is the median.
    ///
    /// Sequences with no windows give all zeros.
    pub fn get_median_count(&self, seq: &[u8]) -> TableResult<MedianCount> {
        let mut counts = self.get_kmer_counts(seq)?;
        if counts.is_empty() {
            return Ok(MedianCount::default());
        }

        let n = counts.len() as f64;
        let average = counts.iter().map(|&c| f64::from(c)).sum::<f64>() / n;
        let variance = counts
            .iter()
            .map(|&c| {
                let diff = f64::from(c) - average;
                diff * diff
            })
            .sum::<f64>()
            / n;

        counts.sort_unstable();
        Ok(MedianCount {
            median: counts[(counts.len() - 1) / 2],
            average,
            stddev: variance.sqrt(),
        })
    }

    /// Whether at least half the windows of `seq` have a count of `cutoff`
    /// or more. Stops as soon as the answer is settled.
    pub fn median_at_least(&self, seq: &[u8], cutoff: Count) -> TableResult<bool> {
        let kmers = self.kmer_hashes(seq)?;
        let n_windows = kmers.len();
        if n_windows == 0 {
            return Ok(false);
        }
        let min_required = (n_windows + 1) / 2;
        let max_below = n_windows - min_required;

        let mut n_at_least = 0;
        let mut n_below = 0;
        for hashes in kmers {
            if self.get_count_hash(hashes.forward) >= cutoff {
                n_at_least += 1;
                if n_at_least >= min_required {
                    return Ok(true);
                }
            } else {
                n_below += 1;
                if n_below > max_below {
                    return Ok(false);
                }
            }
        }
        Ok(false)
    }

    /// Histogram of the abundances of the distinct k-mers in a FASTA/FASTQ
    /// file. See `abundance_distribution_records`.
    pub fn abundance_distribution<P, T>(
        &self,
        path: P,
        tracking: &Hashtable<T>,
    ) -> TableResult<AbundanceDistribution>
    where
        P: AsRef<Path>,
        T: CellCodec,
    {
        let dist =
            self.abundance_distribution_records(FastxRecords::from_path(path.as_ref())?, tracking)?;
        info!(
            path = ?path.as_ref(),
            reads = dist.stats.total_reads,
            skipped = dist.stats.n_skipped,
            "built abundance distribution"
        );
        Ok(dist)
    }

    /// Histogram of the abundances of the distinct k-mers in `records`.
    ///
    /// `tracking` marks which k-mers were already binned so every k-mer is
    /// counted once across the whole input; it should start out empty and
    /// must be a separate table from `self`.
    /// Invalid reads are skipped and tallied in the returned stats.
    pub fn abundance_distribution_records<I, T>(
        &self,
        records: I,
        tracking: &Hashtable<T>,
    ) -> TableResult<AbundanceDistribution>
    where
        I: IntoIterator<Item = TableResult<Record>>,
        T: CellCodec,
    {
        if tracking.ksize() != self.ksize() {
            bail!(
                "tracking table has k of {} but this table has k of {}",
                tracking.ksize(),
                self.ksize()
            );
        }
        if std::ptr::eq(
            self as *const Self as *const u8,
            tracking as *const Hashtable<T> as *const u8,
        ) {
            bail!("tracking table must be distinct from the counted table");
        }

        let max_bin = self.max_count();
        let mut histogram = vec![0u64; usize::from(max_bin) + 1];
        let mut stats = ConsumeStats::default();

        for record in records {
            let mut record = record?;
            stats.total_reads += 1;
            if !self.check_and_normalize_read(&mut record.seq) {
                stats.n_skipped += 1;
                continue;
            }
            for hashes in self.kmer_hashes(&record.seq)? {
                let khash = hashes.forward;
                stats.n_consumed += 1;
                if tracking.get_count_hash(khash) == 0 {
                    tracking.count_hash(khash);
                    let count = self.get_count_hash(khash).min(max_bin);
                    histogram[usize::from(count)] += 1;
                }
            }
        }

        Ok(AbundanceDistribution { histogram, stats })
    }
}
