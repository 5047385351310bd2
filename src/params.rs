use serde::{Deserialize, Serialize};

use crate::bail;
use crate::errors::TableResult;
use crate::hashtable::{Counttable, Hashtable, Nodetable, SmallCounttable};
use crate::storage::CellCodec;

/// Used to pass around the shape of a counting table
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableParams {
    pub ksize: u8,
    pub n_tables: usize,
    pub max_tablesize: u64,
}

impl Default for TableParams {
    fn default() -> Self {
        TableParams {
            ksize: 32,
            n_tables: 4,
            max_tablesize: 1_000_000,
        }
    }
}

impl TableParams {
    /// One prime size per table, the largest primes not above `max_tablesize`.
    pub fn tablesizes(&self) -> TableResult<Vec<u64>> {
        primes_near(self.n_tables, self.max_tablesize)
    }

    pub fn build<C: CellCodec>(&self) -> TableResult<Hashtable<C>> {
        Hashtable::new(self.ksize, &self.tablesizes()?)
    }

    pub fn counttable(&self) -> TableResult<Counttable> {
        self.build()
    }

    pub fn small_counttable(&self) -> TableResult<SmallCounttable> {
        self.build()
    }

    pub fn nodetable(&self) -> TableResult<Nodetable> {
        self.build()
    }
}

fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    if n < 4 {
        return true;
    }
    if n % 2 == 0 {
        return false;
    }
    let mut i = 3;
    while i * i <= n {
        if n % i == 0 {
            return false;
        }
        i += 2;
    }
    true
}

/// The `n` largest primes that are at most `x`, in descending order.
pub fn primes_near(n: usize, x: u64) -> TableResult<Vec<u64>> {
    let mut primes = Vec::with_capacity(n);
    let mut candidate = x;
    while primes.len() < n && candidate >= 2 {
        if is_prime(candidate) {
            primes.push(candidate);
        }
        candidate -= 1;
    }
    if primes.len() < n {
        bail!("only {} primes are at most {}, {} needed", primes.len(), x, n);
    }
    Ok(primes)
}
