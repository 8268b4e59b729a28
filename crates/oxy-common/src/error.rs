// error.rs — load-time error type for BSP data

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BspError {
    #[error("file too short: {len} bytes, header needs {needed}")]
    TooShort { len: usize, needed: usize },

    #[error("unsupported BSP version {0}")]
    BadVersion(i32),

    #[error("{lump} lump [{offset}, +{length}) exceeds file size {file_len}")]
    LumpOutOfBounds {
        lump: &'static str,
        offset: usize,
        length: usize,
        file_len: usize,
    },

    #[error("{lump} lump length {length} is not a multiple of {record}")]
    BadLumpSize {
        lump: &'static str,
        length: usize,
        record: usize,
    },

    #[error("{0} lump is missing or empty")]
    MissingLump(&'static str),

    #[error("{lump} lump has {count} records, limit is {limit}")]
    TooMany {
        lump: &'static str,
        count: usize,
        limit: usize,
    },

    #[error("{what} {index}: reference {value} out of range (count {count})")]
    BadIndex {
        what: &'static str,
        index: usize,
        value: i64,
        count: usize,
    },

    #[error("{what} {index}: {value} is not a contents code")]
    BadContents {
        what: &'static str,
        index: usize,
        value: i32,
    },

    #[error("{what} tree from head {head} is cyclic or deeper than {max}")]
    TreeTooDeep {
        what: &'static str,
        head: usize,
        max: usize,
    },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type BspResult<T> = Result<T, BspError>;
