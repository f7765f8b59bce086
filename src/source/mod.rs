//! The read source capability consumed by the streaming engine, plus local
//! implementations backed by memory or JSON files.

mod bounded;
mod json;
mod memory;

pub use bounded::EndBounded;
pub use json::JsonSource;
pub use memory::{FailureKind, InMemorySource};

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::convert::CigarMapper;
use crate::model::{ReadModel, ReadsetMetadata};

/// Lazily produced reads of one query.
pub type ReadIter<R> = Box<dyn Iterator<Item = Result<R, SourceError>>>;

/// Errors reported by a read source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Credentials are missing or were rejected.
    #[error("authentication failed: {0}")]
    Auth(String),
    /// The source is misconfigured.
    #[error("invalid source configuration: {0}")]
    Configuration(String),
    /// A single request failed; a retry or the next query may succeed.
    #[error("transient fetch failure: {0}")]
    Transient(String),
    /// The requested readset does not exist.
    #[error("read group set {0} not found")]
    NotFound(String),
    /// A local file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File being read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// A local file holds malformed JSON.
    #[error("malformed JSON in {path} at line {line}: {source}")]
    Json {
        /// File being read.
        path: PathBuf,
        /// 1-based line, or 0 for whole-file documents.
        line: usize,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
    /// The source was closed.
    #[error("read source is closed")]
    Closed,
}

impl SourceError {
    /// Whether the error must end the session rather than skip one query.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SourceError::Auth(_) | SourceError::Configuration(_) | SourceError::Closed
        )
    }
}

/// Which reads of a readset a query selects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum ReferenceFilter {
    /// Every read, mapped or not.
    #[default]
    All,
    /// Only unmapped reads (`*`).
    Unmapped,
    /// Reads aligned to one reference.
    Named(String),
}

impl ReferenceFilter {
    /// Filter for a sequence name: empty selects all reads, `*` the unmapped ones.
    pub fn from_sequence(sequence: &str) -> Self {
        match sequence {
            "" => ReferenceFilter::All,
            "*" => ReferenceFilter::Unmapped,
            name => ReferenceFilter::Named(name.to_string()),
        }
    }

    /// Reference name as sent to the service.
    pub fn as_str(&self) -> &str {
        match self {
            ReferenceFilter::All => "",
            ReferenceFilter::Unmapped => "*",
            ReferenceFilter::Named(name) => name,
        }
    }
}

impl fmt::Display for ReferenceFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceFilter::All => f.write_str("<all>"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// One remote fetch: readset, reference filter and 0-based half-open range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetQuery {
    /// Read group set to read from.
    pub read_group_set_id: String,
    /// Reference filter.
    pub reference: ReferenceFilter,
    /// 0-based inclusive start.
    pub start: Option<i64>,
    /// 0-based exclusive end.
    pub end: Option<i64>,
}

impl DatasetQuery {
    /// Unbounded query.
    pub fn new(read_group_set_id: impl Into<String>, reference: ReferenceFilter) -> Self {
        Self {
            read_group_set_id: read_group_set_id.into(),
            reference,
            start: None,
            end: None,
        }
    }

    /// Query for the unmapped reads of a readset.
    pub fn unmapped(read_group_set_id: impl Into<String>) -> Self {
        Self::new(read_group_set_id, ReferenceFilter::Unmapped)
    }

    /// Restrict to a 0-based range.
    pub fn with_range(mut self, start: Option<i64>, end: Option<i64>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    /// Whether `read` is part of the superset a service returns for this
    /// query: overlap on the named reference, unmapped reads for `*`,
    /// everything for an unfiltered query.
    pub fn selects<R: ReadModel>(&self, read: &R) -> bool {
        match &self.reference {
            ReferenceFilter::All => true,
            ReferenceFilter::Unmapped => read.is_unmapped(),
            ReferenceFilter::Named(name) => {
                let Some(position) = read.alignment_position() else {
                    return false;
                };
                if position.reference_name != Some(name.as_str()) {
                    return false;
                }
                let read_start = position.position.unwrap_or(0);
                let read_end = read_start.saturating_add(reference_span(read).max(1));
                self.start.map_or(true, |start| read_end > start)
                    && self.end.map_or(true, |end| read_start < end)
            }
        }
    }
}

/// Reference bases covered by a read's CIGAR.
pub(crate) fn reference_span<R: ReadModel>(read: &R) -> i64 {
    let Some(alignment) = read.alignment() else {
        return 0;
    };
    alignment
        .cigar
        .iter()
        .filter(|unit| {
            CigarMapper::kind_for(&unit.operation).is_some_and(|kind| kind.consumes_reference())
        })
        .map(|unit| unit.operation_length.max(0))
        .fold(0, i64::saturating_add)
}

/// Paginated read store the streaming engine pulls from.
pub trait ReadSource {
    /// Read encoding produced by the source.
    type Read: ReadModel;

    /// Start a query; reads are produced lazily.
    fn fetch_reads(&self, query: &DatasetQuery) -> Result<ReadIter<Self::Read>, SourceError>;

    /// Read group set and references of a readset.
    fn fetch_metadata(&self, read_group_set_id: &str) -> Result<ReadsetMetadata, SourceError>;

    /// Release transport resources. Calling it more than once is harmless.
    fn close(&self) {}
}
