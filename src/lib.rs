//! # Remote reads as a SAM/BAM record stream
//!
//! This library presents a remote, paginated, region-queryable read service
//! as if it were a local indexed alignment file: one coordinate-sorted
//! header, and record iterators that honour "overlapping", "contained" and
//! "starts at" region queries.
//!
//! ## Pipeline
//!
//! 1. **Header**: readset metadata becomes a [`FileHeader`], recovering the
//!    sequence dictionary from embedded header text when needed
//! 2. **Fetch**: each [`QueryInterval`] becomes one query against a [`ReadSource`]
//! 3. **Convert**: remote reads become [`AlignmentRecord`]s
//! 4. **Filter**: records failing the interval's rule are dropped
//! 5. **Pair**: buffered unmapped mates are injected next to their mapped mate
//!
//! ## Usage Example
//!
//! ```ignore
//! use ga4gh_sam::{SamReader, StreamConfig};
//! use ga4gh_sam::source::JsonSource;
//!
//! let source = JsonSource::open("meta.json", "reads.jsonl")?;
//! let readset = source.read_group_set_id().to_string();
//! let reader = SamReader::open(source, &readset, StreamConfig::default())?;
//! for record in reader.query_overlapping("chr20", 10_000, 20_000)? {
//!     println!("{}", record?.to_sam_line());
//! }
//! ```

#![warn(missing_docs, missing_debug_implementations)]

pub mod convert; // Read → record conversion
pub mod header; // Header construction, parsing and merge
pub mod io; // SAM/BAM output
pub mod mates; // Unmapped mate buffering
pub mod model; // Remote and SAM object models
pub mod source; // Read source capability
pub mod stream; // Multi-interval streaming
pub mod url; // ga4gh:// readset URLs

// Re-exports for convenience
pub use convert::{ConvertError, ReadConverter};
pub use header::{FileHeader, HeaderBuilder, HeaderError};
pub use mates::{UnmappedMateIndex, DEFAULT_MAX_UNMAPPED_MATES};
pub use model::{AlignmentRecord, ReadModel, RestRead, StreamedRead};
pub use source::{ReadSource, SourceError};
pub use stream::{IntervalStream, PositionConstraint, QueryInterval, RegionError, StreamError};
pub use url::{ReadsetUrl, UrlError};

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use model::flags;

/// Configuration of the streams opened by a [`SamReader`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    /// Cap on buffered unmapped mates.
    pub max_unmapped_mates: usize,

    /// Buffer unmapped mates for whole-readset queries and inject them next
    /// to their mapped mate.
    pub inject_unmapped_mates: bool,

    /// Count and log records that arrive out of coordinate order.
    pub check_coordinate_order: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_unmapped_mates: DEFAULT_MAX_UNMAPPED_MATES,
            inject_unmapped_mates: true,
            check_coordinate_order: true,
        }
    }
}

impl StreamConfig {
    /// Set the unmapped mate cap.
    pub fn with_max_unmapped_mates(mut self, max: usize) -> Self {
        self.max_unmapped_mates = max;
        self
    }

    /// Enable or disable unmapped mate injection.
    pub fn with_mate_injection(mut self, enabled: bool) -> Self {
        self.inject_unmapped_mates = enabled;
        self
    }

    /// Enable or disable the coordinate order check.
    pub fn with_order_check(mut self, enabled: bool) -> Self {
        self.check_coordinate_order = enabled;
        self
    }
}

/// Errors raised by a [`SamReader`].
#[derive(Error, Debug)]
pub enum ReaderError {
    /// Header construction failed
    #[error(transparent)]
    Header(#[from] HeaderError),

    /// The read source failed
    #[error(transparent)]
    Source(#[from] SourceError),

    /// A stream failed
    #[error(transparent)]
    Stream(#[from] StreamError),

    /// Malformed readset URL
    #[error(transparent)]
    Url(#[from] UrlError),

    /// Malformed region
    #[error(transparent)]
    Region(#[from] RegionError),

    /// Mate lookup called with a record that cannot have a mate
    #[error("invalid mate query: {0}")]
    InvalidMateQuery(&'static str),

    /// Mate lookup found inconsistent records
    #[error("inconsistent mates for {read}: {reason}")]
    InconsistentMates {
        /// Read name being looked up
        read: String,
        /// What was found
        reason: &'static str,
    },

    /// The reader was used after close
    #[error("reader is closed")]
    Closed,
}

/// Indexed-file view of one remote readset.
///
/// Opening the reader builds the header once; every query shares it.
pub struct SamReader<S: ReadSource> {
    source: Arc<S>,
    read_group_set_id: String,
    header: Arc<FileHeader>,
    config: StreamConfig,
    closed: bool,
}

impl<S: ReadSource> SamReader<S> {
    /// Fetch metadata for `read_group_set_id` and build its header.
    pub fn open(
        source: S,
        read_group_set_id: &str,
        config: StreamConfig,
    ) -> Result<Self, ReaderError> {
        Self::open_shared(Arc::new(source), read_group_set_id, config)
    }

    /// Like [`open`](Self::open) for a source the caller keeps a handle to.
    pub fn open_shared(
        source: Arc<S>,
        read_group_set_id: &str,
        config: StreamConfig,
    ) -> Result<Self, ReaderError> {
        let metadata = source.fetch_metadata(read_group_set_id)?;
        let header = HeaderBuilder::new().build(&metadata.read_group_set, &metadata.references)?;
        debug!(
            read_group_set = read_group_set_id,
            sequences = header.sequences.len(),
            read_groups = header.read_groups.len(),
            "header built"
        );
        Ok(Self {
            source,
            read_group_set_id: read_group_set_id.to_string(),
            header: Arc::new(header),
            config,
            closed: false,
        })
    }

    /// Header shared by all records.
    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// Readset being read.
    pub fn read_group_set_id(&self) -> &str {
        &self.read_group_set_id
    }

    /// Stream the given intervals in order.
    pub fn query(&self, intervals: Vec<QueryInterval>) -> Result<IntervalStream<S>, ReaderError> {
        if self.closed {
            return Err(ReaderError::Closed);
        }
        Ok(IntervalStream::with_header(
            Arc::clone(&self.source),
            &self.read_group_set_id,
            Arc::clone(&self.header),
            intervals,
            self.config.clone(),
        )?)
    }

    /// Records overlapping `[start, end]` (1-based, end 0 = unbounded).
    pub fn query_overlapping(
        &self,
        sequence: &str,
        start: i64,
        end: i64,
    ) -> Result<IntervalStream<S>, ReaderError> {
        self.query(vec![QueryInterval::overlapping(sequence, start, end)])
    }

    /// Records lying within `[start, end]`.
    pub fn query_contained(
        &self,
        sequence: &str,
        start: i64,
        end: i64,
    ) -> Result<IntervalStream<S>, ReaderError> {
        self.query(vec![QueryInterval::contained(sequence, start, end)])
    }

    /// Records whose alignment starts exactly at `start`.
    pub fn query_alignment_start(
        &self,
        sequence: &str,
        start: i64,
    ) -> Result<IntervalStream<S>, ReaderError> {
        self.query(vec![QueryInterval::start_at(sequence, start)])
    }

    /// Unmapped reads.
    pub fn query_unmapped(&self) -> Result<IntervalStream<S>, ReaderError> {
        self.query(vec![QueryInterval::unmapped()])
    }

    /// Every read of the readset, with unmapped mates injected.
    pub fn iter_all(&self) -> Result<IntervalStream<S>, ReaderError> {
        self.query(vec![QueryInterval::whole_readset()])
    }

    /// Find the mate of a paired record: the other end with the same name
    /// at the record's mate position, or among unmapped reads when the mate
    /// has no reference. `None` when no mate is found.
    pub fn query_mate(
        &self,
        record: &AlignmentRecord,
    ) -> Result<Option<AlignmentRecord>, ReaderError> {
        if !record.is_paired() {
            return Err(ReaderError::InvalidMateQuery("record is not paired"));
        }
        let first = record.has_flag(flags::FIRST_IN_PAIR);
        if first == record.has_flag(flags::SECOND_IN_PAIR) {
            return Err(ReaderError::InvalidMateQuery(
                "record must be exactly one of first or second in pair",
            ));
        }

        let candidates = match (
            record.mate_reference_index,
            record.mate_reference_name.as_deref(),
        ) {
            (Some(_), Some(reference)) => self.query_alignment_start(
                reference,
                record.mate_alignment_start.unwrap_or(0),
            )?,
            _ => self.query_unmapped()?,
        };

        let name = record.read_name.as_deref();
        let mut mate = None;
        for candidate in candidates {
            let candidate = candidate?;
            if !candidate.is_paired() {
                if candidate.read_name.as_deref() == name {
                    return Err(ReaderError::InconsistentMates {
                        read: name.unwrap_or("*").to_string(),
                        reason: "paired and unpaired reads share the name",
                    });
                }
                continue;
            }
            let same_end = if first {
                candidate.has_flag(flags::FIRST_IN_PAIR)
            } else {
                candidate.has_flag(flags::SECOND_IN_PAIR)
            };
            if same_end || candidate.read_name.as_deref() != name {
                continue;
            }
            if mate.is_some() {
                return Err(ReaderError::InconsistentMates {
                    read: name.unwrap_or("*").to_string(),
                    reason: "more than one mate",
                });
            }
            mate = Some(candidate);
        }
        Ok(mate)
    }

    /// Close the reader and its source. Calling it again does nothing.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.source.close();
        debug!(read_group_set = %self.read_group_set_id, "reader closed");
    }
}

impl<S: ReadSource> std::fmt::Debug for SamReader<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SamReader")
            .field("read_group_set_id", &self.read_group_set_id)
            .field("sequences", &self.header.sequences.len())
            .field("config", &self.config)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}
