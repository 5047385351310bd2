use std::result::Result as StdResult;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TableError {
    #[error("failed to load/read/write file: {0:?}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse the fasta/fastq file: {0}")]
    Needletail(#[from] needletail::errors::ParseError),
    #[error("table file codec error: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("invalid DNA symbol {symbol:?} at position {position}")]
    InvalidSymbol { symbol: char, position: usize },
    #[error("sequence of length {length} is shorter than k ({ksize})")]
    SequenceTooShort { length: usize, ksize: u8 },
    #[error("k must be between 1 and 32, got {0}")]
    InvalidKsize(u8),
    #[error("malformed table file: {0}")]
    MalformedPersistedState(String),
    #[error("table error: {0}")]
    Message(String),
}

pub type TableResult<T> = StdResult<T, TableError>;

#[doc(hidden)]
#[macro_export]
macro_rules! bail {
    ($e:expr) => {
        return Err($crate::errors::TableError::Message($e.to_owned()));
    };
    ($fmt:expr, $($arg:tt)*) => {
        return Err($crate::errors::TableError::Message(format!($fmt, $($arg)*)))
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! format_err {
    ($($arg:tt)*) => { $crate::errors::TableError::Message(format!($($arg)*)) }
}
