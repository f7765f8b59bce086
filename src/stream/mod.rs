//! Multi-interval record stream.
//!
//! An [`IntervalStream`] walks a list of [`QueryInterval`]s left to right,
//! issues one remote query per interval, converts the reads it gets back,
//! drops records that fail the interval's containment rule and re-injects
//! buffered unmapped mates right after their mapped partner.
//!
//! ```text
//!   Fetching ──fetch ok──▶ Streaming ──page done──▶ Fetching ──no intervals──▶ Exhausted
//!      │                       │
//!      └──transient error──────┴──▶ next interval      close() ──▶ Closed
//! ```

mod interval;

pub use interval::{PositionConstraint, QueryInterval, RegionError};

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::convert::{ConvertError, ReadConverter};
use crate::header::{FileHeader, HeaderBuilder, HeaderError};
use crate::mates::UnmappedMateIndex;
use crate::model::{flags, AlignmentRecord, ReadModel};
use crate::source::{DatasetQuery, EndBounded, ReadIter, ReadSource, SourceError};
use crate::StreamConfig;

/// Errors surfaced by an [`IntervalStream`].
#[derive(Debug, Error)]
pub enum StreamError {
    /// The file header could not be built; no record is ever produced.
    #[error("failed to build header: {0}")]
    Header(#[from] HeaderError),
    /// Readset metadata could not be fetched.
    #[error("failed to fetch readset metadata: {0}")]
    Metadata(#[source] SourceError),
    /// Authentication or configuration failure; the stream is over.
    #[error("fatal source error: {0}")]
    Fatal(#[source] SourceError),
    /// One read could not be converted; the stream continues.
    #[error("failed to convert read: {0}")]
    Convert(#[from] ConvertError),
    /// The stream was iterated after [`IntervalStream::close`].
    #[error("stream used after close")]
    Closed,
}

/// Lifecycle of an [`IntervalStream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// No active query; the next interval is fetched on demand.
    Fetching,
    /// A query is open and records are pulled from it.
    Streaming,
    /// Every interval has been consumed.
    Exhausted,
    /// The caller closed the stream.
    Closed,
}

struct ActiveQuery<R> {
    index: usize,
    interval: QueryInterval,
    reads: EndBounded<ReadIter<R>>,
    last_placed: Option<(usize, i64)>,
    order_warned: bool,
    emitted: usize,
    skipped: usize,
}

/// Pull-based stream of alignment records over a list of intervals.
pub struct IntervalStream<S: ReadSource> {
    source: Arc<S>,
    read_group_set_id: String,
    converter: ReadConverter,
    intervals: Vec<QueryInterval>,
    next_interval: usize,
    active: Option<ActiveQuery<S::Read>>,
    pending: VecDeque<Result<AlignmentRecord, StreamError>>,
    mates: Option<UnmappedMateIndex<S::Read>>,
    config: StreamConfig,
    state: StreamState,
    order_violations: usize,
    closed_reported: bool,
}

impl<S: ReadSource> IntervalStream<S> {
    /// Fetch readset metadata, build the header and prepare the stream.
    ///
    /// Header failures are returned here, before any record exists.
    pub fn open(
        source: Arc<S>,
        read_group_set_id: &str,
        intervals: Vec<QueryInterval>,
        config: StreamConfig,
    ) -> Result<Self, StreamError> {
        let metadata = source
            .fetch_metadata(read_group_set_id)
            .map_err(StreamError::Metadata)?;
        let header = HeaderBuilder::new().build(&metadata.read_group_set, &metadata.references)?;
        Self::with_header(source, read_group_set_id, Arc::new(header), intervals, config)
    }

    /// Prepare a stream against an already built header.
    ///
    /// When any interval covers the whole readset and injection is enabled,
    /// the unmapped reads are scanned and buffered before this returns.
    pub fn with_header(
        source: Arc<S>,
        read_group_set_id: &str,
        header: Arc<FileHeader>,
        intervals: Vec<QueryInterval>,
        config: StreamConfig,
    ) -> Result<Self, StreamError> {
        let wants_mates =
            config.inject_unmapped_mates && intervals.iter().any(QueryInterval::is_whole_readset);
        let mut stream = Self {
            source,
            read_group_set_id: read_group_set_id.to_string(),
            converter: ReadConverter::new(header),
            intervals,
            next_interval: 0,
            active: None,
            pending: VecDeque::new(),
            mates: None,
            config,
            state: StreamState::Fetching,
            order_violations: 0,
            closed_reported: false,
        };
        if wants_mates {
            stream.mates = stream.scan_unmapped_mates()?;
        }
        Ok(stream)
    }

    /// Buffer every unmapped mate of the readset. A transient failure
    /// disables injection; fatal failures abort.
    fn scan_unmapped_mates(&self) -> Result<Option<UnmappedMateIndex<S::Read>>, StreamError> {
        info!(read_group_set = %self.read_group_set_id, "scanning unmapped reads for mates");
        let mut index = UnmappedMateIndex::new(self.config.max_unmapped_mates);
        let query = DatasetQuery::unmapped(self.read_group_set_id.as_str());

        let reads = match self.source.fetch_reads(&query) {
            Ok(reads) => reads,
            Err(err) if err.is_fatal() => return Err(StreamError::Fatal(err)),
            Err(err) => {
                warn!(error = %err, "unmapped read scan failed; mates will not be injected");
                return Ok(None);
            }
        };
        for read in reads {
            match read {
                Ok(read) => {
                    index.observe(read);
                }
                Err(err) if err.is_fatal() => return Err(StreamError::Fatal(err)),
                Err(err) => {
                    warn!(error = %err, "unmapped read scan failed; mates will not be injected");
                    return Ok(None);
                }
            }
        }

        info!(
            buffered = index.count(),
            refused = index.refused(),
            "unmapped read scan complete"
        );
        Ok(Some(index))
    }

    /// Header shared by every record of the stream.
    pub fn header(&self) -> &FileHeader {
        self.converter.header()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Number of placed records seen out of coordinate order.
    pub fn order_violations(&self) -> usize {
        self.order_violations
    }

    /// Number of unmapped mates buffered by the pre-scan.
    pub fn buffered_mates(&self) -> usize {
        self.mates.as_ref().map_or(0, UnmappedMateIndex::count)
    }

    /// Stop the stream and drop buffered state. No further fetch is issued.
    /// The read source itself stays open. Calling it again does nothing.
    pub fn close(&mut self) {
        if self.state == StreamState::Closed {
            return;
        }
        debug!(read_group_set = %self.read_group_set_id, "closing interval stream");
        self.active = None;
        self.pending.clear();
        self.mates = None;
        self.state = StreamState::Closed;
    }

    fn fetch_next_interval(&mut self) -> Result<(), StreamError> {
        while let Some(interval) = self.intervals.get(self.next_interval).cloned() {
            let index = self.next_interval;
            self.next_interval += 1;
            let query = interval.to_dataset_query(&self.read_group_set_id);
            info!(index, interval = %interval, "fetching interval");

            match self.source.fetch_reads(&query) {
                Ok(reads) => {
                    self.active = Some(ActiveQuery {
                        index,
                        reads: EndBounded::new(reads, query.end.unwrap_or(0)),
                        interval,
                        last_placed: None,
                        order_warned: false,
                        emitted: 0,
                        skipped: 0,
                    });
                    self.state = StreamState::Streaming;
                    return Ok(());
                }
                Err(err) if err.is_fatal() => return Err(StreamError::Fatal(err)),
                Err(err) => {
                    warn!(index, interval = %interval, error = %err, "fetch failed; skipping interval");
                }
            }
        }
        self.state = StreamState::Exhausted;
        Ok(())
    }

    fn finish_interval(&mut self) {
        if let Some(active) = self.active.take() {
            info!(
                index = active.index,
                interval = %active.interval,
                emitted = active.emitted,
                skipped = active.skipped,
                "interval finished"
            );
        }
        self.state = StreamState::Fetching;
    }

    /// Convert, filter and emit one read, queueing any mates it unlocks.
    fn emit(&mut self, read: S::Read) -> Option<Result<AlignmentRecord, StreamError>> {
        let active = self.active.as_mut()?;
        let whole_readset = active.interval.is_whole_readset();
        let mut mates = self.mates.as_mut().filter(|_| whole_readset);

        let mut overflow = false;
        if let Some(index) = mates.as_deref_mut() {
            if UnmappedMateIndex::is_bufferable(&read) {
                if !index.contains(&read) {
                    overflow = index.refused() > 0;
                } else if index.was_injected(&read) {
                    debug!(fragment = ?read.fragment_name(), "unmapped mate already injected");
                    return None;
                } else if index.claim(&read) && self.config.check_coordinate_order {
                    self.order_violations += 1;
                    warn!(
                        fragment = ?read.fragment_name(),
                        "unmapped mate arrived before its mapped mate; emitting it in place"
                    );
                }
            }
        }

        let mut record = match self.converter.convert(&read) {
            Ok(record) => record,
            Err(err) => return Some(Err(StreamError::Convert(err))),
        };
        if overflow {
            record.flags &= !flags::PAIRING;
        }

        if !active.interval.matches(&record) {
            active.skipped += 1;
            debug!(
                read = ?record.read_name,
                start = ?record.alignment_start,
                interval = %active.interval,
                "record outside interval"
            );
            return None;
        }

        if self.config.check_coordinate_order {
            if let (Some(reference), Some(start)) = (record.reference_index, record.alignment_start)
            {
                if !record.is_unmapped() {
                    let key = (reference, start);
                    if active.last_placed.is_some_and(|last| key < last) {
                        self.order_violations += 1;
                        if !active.order_warned {
                            active.order_warned = true;
                            warn!(
                                interval = %active.interval,
                                read = ?record.read_name,
                                "records are not in coordinate order; mate injection may misplace mates"
                            );
                        }
                    }
                    active.last_placed = Some(key);
                }
            }
        }

        if !record.is_unmapped() {
            if let Some(index) = mates {
                if let Some(buffered) = index.take_mates(&read) {
                    debug!(fragment = ?read.fragment_name(), count = buffered.len(), "injecting mates");
                    for mate in &buffered {
                        self.pending
                            .push_back(self.converter.convert(mate).map_err(StreamError::from));
                    }
                }
            }
        }

        active.emitted += 1;
        Some(Ok(record))
    }
}

impl<S: ReadSource> Iterator for IntervalStream<S> {
    type Item = Result<AlignmentRecord, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return Some(item);
            }
            match self.state {
                StreamState::Closed => {
                    if self.closed_reported {
                        return None;
                    }
                    self.closed_reported = true;
                    return Some(Err(StreamError::Closed));
                }
                StreamState::Exhausted => return None,
                StreamState::Fetching => {
                    if let Err(err) = self.fetch_next_interval() {
                        self.active = None;
                        self.state = StreamState::Exhausted;
                        return Some(Err(err));
                    }
                }
                StreamState::Streaming => {
                    let Some(active) = self.active.as_mut() else {
                        self.state = StreamState::Fetching;
                        continue;
                    };
                    match active.reads.next() {
                        None => self.finish_interval(),
                        Some(Ok(read)) => {
                            if let Some(item) = self.emit(read) {
                                return Some(item);
                            }
                        }
                        Some(Err(err)) if err.is_fatal() => {
                            self.active = None;
                            self.state = StreamState::Exhausted;
                            return Some(Err(StreamError::Fatal(err)));
                        }
                        Some(Err(err)) => {
                            warn!(
                                index = active.index,
                                interval = %active.interval,
                                error = %err,
                                "fetch failed mid-interval; moving to next interval"
                            );
                            self.finish_interval();
                        }
                    }
                }
            }
        }
    }
}

impl<S: ReadSource> fmt::Debug for IntervalStream<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntervalStream")
            .field("read_group_set_id", &self.read_group_set_id)
            .field("intervals", &self.intervals)
            .field("next_interval", &self.next_interval)
            .field("state", &self.state)
            .field("pending", &self.pending.len())
            .field("buffered_mates", &self.buffered_mates())
            .field("order_violations", &self.order_violations)
            .finish()
    }
}
