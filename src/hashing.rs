//! 2-bit packing of DNA k-mers into `u64` hashes.
//!
//! Each symbol takes two bits, most significant first, with the codes
//! `A=0`, `T=1`, `C=2`, `G=3`. Under this scheme the complement of a code
//! is the code with its low bit flipped. Both strands of a k-mer are
//! computed together: the forward ("top strand") value shifts symbols in
//! from the right, the reverse-complement ("bottom strand") value shifts
//! complemented symbols in from the left.
use std::collections::HashSet;
use std::hash::{BuildHasherDefault, Hasher};

use crate::errors::{TableError, TableResult};

pub type KmerHash = u64;

/// Largest k that fits in a `KmerHash` at two bits per symbol.
pub const MAX_KSIZE: u8 = 32;

/// A set of k-mer hashes that skips re-hashing the (already hashed) keys.
pub type SeenSet = HashSet<KmerHash, BuildHasherDefault<NoHashHasher>>;

#[inline]
pub fn twobit_repr(base: u8) -> Option<KmerHash> {
    match base {
        b'A' | b'a' => Some(0),
        b'T' | b't' => Some(1),
        b'C' | b'c' => Some(2),
        b'G' | b'g' => Some(3),
        _ => None,
    }
}

#[inline]
pub fn twobit_comp(base: u8) -> Option<KmerHash> {
    twobit_repr(base).map(|code| code ^ 1)
}

#[inline]
pub fn revtwobit_repr(code: KmerHash) -> u8 {
    match code & 3 {
        0 => b'A',
        1 => b'T',
        2 => b'C',
        _ => b'G',
    }
}

#[inline]
pub fn is_valid_base(base: u8) -> bool {
    twobit_repr(base).is_some()
}

fn invalid_symbol(base: u8, position: usize) -> TableError {
    TableError::InvalidSymbol {
        symbol: char::from(base),
        position,
    }
}

/// Forward and reverse-complement hashes of one k-mer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StrandHashes {
    pub forward: KmerHash,
    pub reverse: KmerHash,
}

impl StrandHashes {
    /// The smaller of the two strand values, for callers that want one key
    /// per k-mer regardless of orientation. Tables key on `forward`.
    #[inline]
    pub fn strand_min(&self) -> KmerHash {
        self.forward.min(self.reverse)
    }
}

/// Holds the per-k constants (bitmask and top-symbol shift) used for hashing
/// and rolling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KmerHasher {
    ksize: u8,
    bitmask: KmerHash,
    nbits_sub_1: u32,
}

impl KmerHasher {
    pub fn new(ksize: u8) -> TableResult<Self> {
        if ksize == 0 || ksize > MAX_KSIZE {
            return Err(TableError::InvalidKsize(ksize));
        }
        let nbits = u32::from(ksize) * 2;
        Ok(KmerHasher {
            ksize,
            bitmask: KmerHash::MAX >> (64 - nbits),
            nbits_sub_1: nbits - 2,
        })
    }

    #[inline]
    pub fn ksize(&self) -> u8 {
        self.ksize
    }

    #[inline]
    pub fn bitmask(&self) -> KmerHash {
        self.bitmask
    }

    /// Hash the first k symbols of `kmer` on the top strand.
    pub fn hash(&self, kmer: &[u8]) -> TableResult<KmerHash> {
        Ok(self.hash_with_strands(kmer)?.forward)
    }

    /// Hash the first k symbols of `kmer` on both strands in one pass.
    pub fn hash_with_strands(&self, kmer: &[u8]) -> TableResult<StrandHashes> {
        let k = usize::from(self.ksize);
        if kmer.len() < k {
            return Err(TableError::SequenceTooShort {
                length: kmer.len(),
                ksize: self.ksize,
            });
        }
        let mut hashes = StrandHashes::default();
        for (position, &base) in kmer[..k].iter().enumerate() {
            hashes = self
                .roll(hashes, base)
                .ok_or_else(|| invalid_symbol(base, position))?;
        }
        Ok(hashes)
    }

    /// Slide the window one symbol to the right.
    ///
    /// Returns `None` if `base` is not a valid DNA symbol.
    #[inline]
    pub fn roll(&self, hashes: StrandHashes, base: u8) -> Option<StrandHashes> {
        let code = twobit_repr(base)?;
        Some(StrandHashes {
            forward: ((hashes.forward << 2) & self.bitmask) | code,
            reverse: (hashes.reverse >> 2) | ((code ^ 1) << self.nbits_sub_1),
        })
    }

    /// Inverse of `hash`: rebuild the (uppercase) k-mer from its packed value.
    pub fn unhash(&self, hash: KmerHash) -> Vec<u8> {
        let k = u32::from(self.ksize);
        (0..k)
            .map(|i| revtwobit_repr(hash >> (2 * (k - 1 - i))))
            .collect()
    }

    /// Iterate over the strand hashes of every window in `seq`.
    pub fn iter_kmers<'a>(&'a self, seq: &'a [u8]) -> TableResult<KmerIterator<'a>> {
        KmerIterator::new(self, seq)
    }
}

/// Rolling iterator over all length-k windows of a sequence, left to right.
///
/// The sequence is checked for invalid symbols when the iterator is built,
/// so iteration itself cannot fail. Sequences shorter than k yield nothing.
pub struct KmerIterator<'a> {
    hasher: &'a KmerHasher,
    seq: &'a [u8],
    next_base: usize,
    hashes: StrandHashes,
}

impl<'a> KmerIterator<'a> {
    pub fn new(hasher: &'a KmerHasher, seq: &'a [u8]) -> TableResult<Self> {
        if let Some(position) = seq.iter().position(|&b| !is_valid_base(b)) {
            return Err(invalid_symbol(seq[position], position));
        }
        let mut iter = KmerIterator {
            hasher,
            seq,
            next_base: 0,
            hashes: StrandHashes::default(),
        };
        // prime the window with the first k - 1 symbols
        let k = usize::from(hasher.ksize());
        if seq.len() >= k {
            for _ in 0..k - 1 {
                iter.push_next();
            }
        }
        Ok(iter)
    }

    #[inline]
    fn push_next(&mut self) {
        let base = self.seq[self.next_base];
        if let Some(hashes) = self.hasher.roll(self.hashes, base) {
            self.hashes = hashes;
        }
        self.next_base += 1;
    }

    /// Number of windows in the sequence.
    pub fn n_windows(&self) -> usize {
        (self.seq.len() + 1).saturating_sub(usize::from(self.hasher.ksize()))
    }
}

impl<'a> Iterator for KmerIterator<'a> {
    type Item = StrandHashes;

    fn next(&mut self) -> Option<StrandHashes> {
        if self.next_base >= self.seq.len() || self.n_windows() == 0 {
            return None;
        }
        self.push_next();
        Some(self.hashes)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = if self.n_windows() == 0 {
            0
        } else {
            self.seq.len() - self.next_base
        };
        (remaining, Some(remaining))
    }
}

impl<'a> ExactSizeIterator for KmerIterator<'a> {}

/// If we're using a `HashMap` where the keys themselves are hashes, it's
/// a little silly to re-hash them. That's where the `NoHashHasher` comes in.
#[derive(Default)]
pub struct NoHashHasher(u64);

impl Hasher for NoHashHasher {
    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.0 = (self.0 << 8) | u64::from(byte);
        }
    }

    #[inline]
    fn write_u64(&mut self, i: u64) {
        self.0 = i;
    }

    fn finish(&self) -> u64 {
        self.0
    }
}
