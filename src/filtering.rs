use crate::errors::TableResult;
use crate::hashtable::Hashtable;
use crate::storage::{CellCodec, Count};

impl<C: CellCodec> Hashtable<C> {
    /// Index just past the k-mers at the start of `seq` that are all found
    /// at least `min_abund` times; the whole length if none drop below.
    ///
    /// Sequences shorter than k are returned whole.
    pub fn trim_on_abundance(&self, seq: &[u8], min_abund: Count) -> TableResult<usize> {
        self.trim_at_first(seq, |count| count < min_abund)
    }

    /// Index just past the k-mers at the start of `seq` that are all found
    /// at most `max_abund` times. Useful for dropping the tail of reads that
    /// run into high-abundance sequence (e.g. adapters or repeats).
    pub fn trim_below_abundance(&self, seq: &[u8], max_abund: Count) -> TableResult<usize> {
        self.trim_at_first(seq, |count| count > max_abund)
    }

    fn trim_at_first<F>(&self, seq: &[u8], is_bad: F) -> TableResult<usize>
    where
        F: Fn(Count) -> bool,
    {
        let k = usize::from(self.ksize());
        for (start, hashes) in self.kmer_hashes(seq)?.enumerate() {
            if is_bad(self.get_count_hash(hashes.forward)) {
                // window `start - 1` was the last good one
                return Ok(if start == 0 { 0 } else { start - 1 + k });
            }
        }
        Ok(seq.len())
    }

    /// Start positions of the windows where the count falls below
    /// `min_abund` right after a window at or above it.
    ///
    /// A trusted k-mer followed by an untrusted one is the signature of a
    /// sequencing error entering the window.
    pub fn find_spectral_error_positions(
        &self,
        seq: &[u8],
        min_abund: Count,
    ) -> TableResult<Vec<usize>> {
        let mut positions = Vec::new();
        let mut prev_trusted = None;
        for (start, hashes) in self.kmer_hashes(seq)?.enumerate() {
            let trusted = self.get_count_hash(hashes.forward) >= min_abund;
            if prev_trusted == Some(true) && !trusted {
                positions.push(start);
            }
            prev_trusted = Some(trusted);
        }
        Ok(positions)
    }
}
