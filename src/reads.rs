use std::io::Read;
use std::path::Path;

use needletail::parser::FastxReader;
use needletail::{parse_fastx_file, parse_fastx_reader};

use crate::errors::TableResult;

/// A single sequencing read.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Record {
    pub id: Vec<u8>,
    pub seq: Vec<u8>,
}

impl Record {
    pub fn new(id: &[u8], seq: &[u8]) -> Self {
        Record {
            id: id.to_vec(),
            seq: seq.to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }
}

impl From<&str> for Record {
    fn from(seq: &str) -> Self {
        Record::new(b"", seq.as_bytes())
    }
}

/// Totals from a scan over many reads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConsumeStats {
    /// Reads pulled from the source, valid or not.
    pub total_reads: u64,
    /// k-mers added to the table.
    pub n_consumed: u64,
    /// Reads rejected for being shorter than k or holding non-ACGT symbols.
    pub n_skipped: u64,
}

impl ConsumeStats {
    pub(crate) fn merge(&mut self, other: &ConsumeStats) {
        self.total_reads += other.total_reads;
        self.n_consumed += other.n_consumed;
        self.n_skipped += other.n_skipped;
    }
}

/// Adapts a needletail FASTA/FASTQ parser into an iterator of `Record`s.
///
/// A parse error ends the scan for callers: it means the stream itself is
/// broken, unlike a read with bad symbols which is just skipped.
pub struct FastxRecords {
    reader: Box<dyn FastxReader>,
}

impl FastxRecords {
    pub fn from_path<P: AsRef<Path>>(path: P) -> TableResult<Self> {
        Ok(FastxRecords {
            reader: parse_fastx_file(path)?,
        })
    }

    pub fn from_reader<R: Read + Send + 'static>(reader: R) -> TableResult<Self> {
        Ok(FastxRecords {
            reader: parse_fastx_reader(reader)?,
        })
    }
}

impl Iterator for FastxRecords {
    type Item = TableResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.reader.next()?;
        Some(
            record
                .map(|rec| Record {
                    id: rec.id().to_vec(),
                    seq: rec.seq().into_owned(),
                })
                .map_err(Into::into),
        )
    }
}
