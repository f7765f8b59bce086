//! Conversion of remote reads into SAM alignment records.

mod cigar;
mod converter;
mod tags;

pub use cigar::CigarMapper;
pub use converter::{compute_flags, convert, ReadConverter};
pub use tags::{TagCodec, TagError};

use thiserror::Error;

/// Errors raised while converting a read.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConvertError {
    /// A free-form tag could not be typed.
    #[error(transparent)]
    Tag(#[from] TagError),
    /// CIGAR operation name outside the known table.
    #[error("unknown CIGAR operation {0:?}")]
    UnknownCigarOperation(String),
    /// CIGAR operation length does not fit the record model.
    #[error("invalid length {length} for CIGAR operation {operation}")]
    InvalidCigarLength {
        /// Operation name.
        operation: String,
        /// Offending length.
        length: i64,
    },
    /// A 0-based position has no 1-based counterpart in `i64`.
    #[error("position {0} is out of range")]
    PositionOutOfRange(i64),
}
