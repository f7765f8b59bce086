use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::model::{ReadModel, ReadsetMetadata};

use super::{DatasetQuery, ReadIter, ReadSource, ReferenceFilter, SourceError};

/// Failure injected into an [`InMemorySource`] query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The query fails up front with a transient error.
    Transient,
    /// The query fails up front with an authentication error.
    Auth,
    /// The query yields this many reads, then a transient error.
    MidStream(usize),
}

impl FailureKind {
    fn error(self) -> SourceError {
        match self {
            FailureKind::Auth => SourceError::Auth("credentials rejected".to_string()),
            FailureKind::Transient | FailureKind::MidStream(_) => {
                SourceError::Transient("simulated request failure".to_string())
            }
        }
    }
}

/// Read source over one readset held in memory.
///
/// Queries return the superset a remote service would: every read
/// overlapping the requested range, in stored order. Used by tests and
/// the conversion benchmark.
#[derive(Debug)]
pub struct InMemorySource<R> {
    read_group_set_id: String,
    metadata: ReadsetMetadata,
    reads: Arc<Vec<R>>,
    failures: HashMap<ReferenceFilter, FailureKind>,
    metadata_failure: Option<FailureKind>,
    fetches: AtomicUsize,
    pulled: Arc<AtomicUsize>,
    closed: AtomicBool,
    close_calls: AtomicUsize,
}

impl<R: ReadModel + Clone + 'static> InMemorySource<R> {
    /// Source serving `reads` and `metadata` under `read_group_set_id`.
    pub fn new(
        read_group_set_id: impl Into<String>,
        metadata: ReadsetMetadata,
        reads: Vec<R>,
    ) -> Self {
        Self {
            read_group_set_id: read_group_set_id.into(),
            metadata,
            reads: Arc::new(reads),
            failures: HashMap::new(),
            metadata_failure: None,
            fetches: AtomicUsize::new(0),
            pulled: Arc::new(AtomicUsize::new(0)),
            closed: AtomicBool::new(false),
            close_calls: AtomicUsize::new(0),
        }
    }

    /// Make every query with this reference filter fail.
    pub fn with_failure(mut self, reference: ReferenceFilter, kind: FailureKind) -> Self {
        self.failures.insert(reference, kind);
        self
    }

    /// Make metadata lookups fail.
    pub fn with_metadata_failure(mut self, kind: FailureKind) -> Self {
        self.metadata_failure = Some(kind);
        self
    }

    /// Number of `fetch_reads` calls so far.
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }

    /// Number of reads handed out across all queries.
    pub fn pulled(&self) -> usize {
        self.pulled.load(Ordering::Relaxed)
    }

    /// Whether [`close`](ReadSource::close) was called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }

    /// Number of `close` calls so far.
    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::Relaxed)
    }

    fn check_readset(&self, read_group_set_id: &str) -> Result<(), SourceError> {
        if self.is_closed() {
            return Err(SourceError::Closed);
        }
        if read_group_set_id != self.read_group_set_id {
            return Err(SourceError::NotFound(read_group_set_id.to_string()));
        }
        Ok(())
    }
}

impl<R: ReadModel + Clone + 'static> ReadSource for InMemorySource<R> {
    type Read = R;

    fn fetch_reads(&self, query: &DatasetQuery) -> Result<ReadIter<R>, SourceError> {
        self.check_readset(&query.read_group_set_id)?;
        self.fetches.fetch_add(1, Ordering::Relaxed);
        debug!(
            reference = %query.reference,
            start = ?query.start,
            end = ?query.end,
            "in-memory fetch"
        );

        let limit = match self.failures.get(&query.reference) {
            Some(FailureKind::MidStream(after)) => Some(*after),
            Some(kind) => return Err(kind.error()),
            None => None,
        };

        let query = query.clone();
        let reads = Arc::clone(&self.reads);
        let pulled = Arc::clone(&self.pulled);
        let mut served = 0usize;
        let mut failed = false;
        let mut cursor = 0usize;

        Ok(Box::new(std::iter::from_fn(move || {
            if failed {
                return None;
            }
            if limit.is_some_and(|limit| served >= limit) {
                failed = true;
                return Some(Err(FailureKind::MidStream(served).error()));
            }
            while let Some(read) = reads.get(cursor) {
                cursor += 1;
                if query.selects(read) {
                    served += 1;
                    pulled.fetch_add(1, Ordering::Relaxed);
                    return Some(Ok(read.clone()));
                }
            }
            None
        })))
    }

    fn fetch_metadata(&self, read_group_set_id: &str) -> Result<ReadsetMetadata, SourceError> {
        self.check_readset(read_group_set_id)?;
        if let Some(kind) = self.metadata_failure {
            return Err(kind.error());
        }
        Ok(self.metadata.clone())
    }

    fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::Relaxed);
        self.closed.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CigarUnit, RestRead};

    fn source() -> InMemorySource<RestRead> {
        let reads = (0..5)
            .map(|i| {
                RestRead::new(format!("r{i}")).with_alignment(
                    "chr1",
                    i * 100,
                    false,
                    vec![CigarUnit::new("ALIGNMENT_MATCH", 50)],
                )
            })
            .chain(std::iter::once(RestRead::new("u")))
            .collect();
        InMemorySource::new("rgs", ReadsetMetadata::default(), reads)
    }

    #[test]
    fn serves_overlapping_superset_lazily() {
        let source = source();
        let query = DatasetQuery::new("rgs", ReferenceFilter::Named("chr1".into()))
            .with_range(Some(160), Some(260));
        let mut reads = source.fetch_reads(&query).expect("query starts");
        assert_eq!(source.pulled(), 0);

        let first = reads.next().expect("read").expect("ok");
        assert_eq!(first.fragment_name.as_deref(), Some("r2"));
        assert_eq!(source.pulled(), 1);
        assert_eq!(reads.count(), 0);
        assert_eq!(source.fetches(), 1);
    }

    #[test]
    fn unknown_readset_is_not_found() {
        let source = source();
        assert!(matches!(
            source.fetch_metadata("other"),
            Err(SourceError::NotFound(_))
        ));
    }

    #[test]
    fn mid_stream_failure_ends_query() {
        let source = source().with_failure(ReferenceFilter::All, FailureKind::MidStream(2));
        let items: Vec<_> = source
            .fetch_reads(&DatasetQuery::new("rgs", ReferenceFilter::All))
            .expect("query starts")
            .collect();
        assert_eq!(items.len(), 3);
        assert!(matches!(items[2], Err(SourceError::Transient(_))));
    }

    #[test]
    fn closed_source_refuses_queries() {
        let source = source();
        source.close();
        source.close();
        assert_eq!(source.close_calls(), 2);
        assert!(matches!(
            source.fetch_reads(&DatasetQuery::unmapped("rgs")),
            Err(SourceError::Closed)
        ));
    }
}
