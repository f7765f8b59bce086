#[path = "common/mod.rs"]
mod common;

use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

use common::{mapped, metadata, pair_end, source, READSET};
use ga4gh_sam::model::{flags, AlignmentRecord, ReadsetMetadata, RestRead};
use ga4gh_sam::source::{
    DatasetQuery, FailureKind, InMemorySource, ReadIter, ReadSource, ReferenceFilter, SourceError,
};
use ga4gh_sam::stream::StreamState;
use ga4gh_sam::{
    IntervalStream, QueryInterval, ReaderError, SamReader, StreamConfig, StreamError,
};

/// Returns every read on the requested reference, ignoring the range, the
/// way a service with loose pagination does.
struct LooseSource {
    reads: Vec<RestRead>,
    pulled: Rc<Cell<usize>>,
}

impl ReadSource for LooseSource {
    type Read = RestRead;

    fn fetch_reads(&self, query: &DatasetQuery) -> Result<ReadIter<RestRead>, SourceError> {
        let reference = query.reference.as_str().to_string();
        let pulled = Rc::clone(&self.pulled);
        let reads: Vec<RestRead> = self
            .reads
            .iter()
            .filter(|read| {
                read.alignment
                    .as_ref()
                    .and_then(|alignment| alignment.position.as_ref())
                    .and_then(|position| position.reference_name.as_deref())
                    == Some(reference.as_str())
            })
            .cloned()
            .collect();
        Ok(Box::new(reads.into_iter().map(move |read| {
            pulled.set(pulled.get() + 1);
            Ok(read)
        })))
    }

    fn fetch_metadata(&self, _read_group_set_id: &str) -> Result<ReadsetMetadata, SourceError> {
        Ok(metadata())
    }
}

fn names(records: &[AlignmentRecord]) -> Vec<&str> {
    records
        .iter()
        .map(|record| record.read_name.as_deref().unwrap_or("*"))
        .collect()
}

fn collect(stream: impl Iterator<Item = Result<AlignmentRecord, StreamError>>) -> Vec<AlignmentRecord> {
    stream
        .collect::<Result<Vec<_>, _>>()
        .expect("stream yields records")
}

#[test]
fn two_intervals_filter_and_requery_transparently() {
    let reads = vec![
        mapped("before", "chr1", 49),
        mapped("inside-first", "chr1", 149),
        mapped("straddles-end", "chr1", 194),
        mapped("between", "chr1", 299),
        mapped("straddles-start", "chr1", 494),
        mapped("inside-second", "chr1", 509),
        mapped("after", "chr1", 799),
    ];
    let source = Arc::new(InMemorySource::new(READSET, metadata(), reads));
    let reader = SamReader::open_shared(Arc::clone(&source), READSET, StreamConfig::default())
        .expect("reader opens");

    let records = collect(
        reader
            .query(vec![
                QueryInterval::overlapping("chr1", 100, 200),
                QueryInterval::contained("chr1", 500, 600),
            ])
            .expect("query starts"),
    );

    assert_eq!(
        names(&records),
        vec!["inside-first", "straddles-end", "inside-second"]
    );
    assert_eq!(source.fetches(), 2);
}

#[test]
fn end_bound_stops_pulling_from_loose_pages() {
    let pulled = Rc::new(Cell::new(0));
    let source = LooseSource {
        reads: vec![
            mapped("r100", "chr1", 100),
            mapped("r900", "chr1", 900),
            mapped("r1000", "chr1", 1_000),
            mapped("r1001", "chr1", 1_001),
            mapped("r1500", "chr1", 1_500),
            mapped("r2000", "chr1", 2_000),
        ],
        pulled: Rc::clone(&pulled),
    };
    let reader = SamReader::open(source, READSET, StreamConfig::default()).expect("reader opens");

    let records = collect(
        reader
            .query_overlapping("chr1", 1, 1_000)
            .expect("query starts"),
    );

    assert_eq!(names(&records), vec!["r100", "r900"]);
    assert_eq!(pulled.get(), 4, "reads past the bound must not be pulled");
}

#[test]
fn unmapped_mate_is_injected_after_its_mapped_mate() {
    let reader = SamReader::open(source(), READSET, StreamConfig::default()).expect("reader opens");
    let mut stream = reader.iter_all().expect("query starts");
    assert_eq!(stream.buffered_mates(), 1);

    let records = collect(stream.by_ref());
    assert_eq!(
        names(&records),
        vec!["F1", "F1", "F2", "F2", "S1", "C1", "U1", "U1"]
    );
    let injected = &records[3];
    assert!(injected.is_unmapped());
    assert_eq!(
        injected.flags,
        flags::PAIRED | flags::UNMAPPED | flags::SECOND_IN_PAIR
    );
    assert_eq!(injected.mate_reference_name.as_deref(), Some("chr1"));
    assert_eq!(injected.mate_alignment_start, Some(500));
    assert_eq!(stream.order_violations(), 0);
}

#[test]
fn unmapped_mate_ahead_of_its_partner_is_emitted_once() {
    let reads = vec![
        RestRead::new("F9")
            .with_read_number(1, 2)
            .with_mate("chr1", 499, false),
        pair_end(mapped("F9", "chr1", 499), 0),
    ];
    let reader = SamReader::open(
        InMemorySource::new(READSET, metadata(), reads),
        READSET,
        StreamConfig::default(),
    )
    .expect("reader opens");
    let mut stream = reader.iter_all().expect("query starts");

    let records = collect(stream.by_ref());
    let flags: Vec<u16> = records.iter().map(|record| record.flags).collect();
    assert_eq!(names(&records), vec!["F9", "F9"]);
    assert_eq!(flags, vec![133, 73]);
    assert_eq!(stream.order_violations(), 1);
}

#[test]
fn mate_overflow_degrades_to_unpaired_records() {
    let config = StreamConfig::default().with_max_unmapped_mates(0);
    let reader = SamReader::open(source(), READSET, config).expect("reader opens");

    let records = collect(reader.iter_all().expect("query starts"));
    assert_eq!(
        names(&records),
        vec!["F1", "F1", "F2", "S1", "C1", "F2", "U1", "U1"]
    );
    let overflowed = &records[5];
    assert_eq!(overflowed.flags, flags::UNMAPPED);
    assert!(!overflowed.is_paired());
}

#[test]
fn injection_disabled_keeps_service_order() {
    let config = StreamConfig::default().with_mate_injection(false);
    let reader = SamReader::open(source(), READSET, config).expect("reader opens");
    let mut stream = reader.iter_all().expect("query starts");
    assert_eq!(stream.buffered_mates(), 0);

    let records = collect(stream.by_ref());
    assert_eq!(
        names(&records),
        vec!["F1", "F1", "F2", "S1", "C1", "F2", "U1", "U1"]
    );
    assert!(records[5].is_paired());
}

#[test]
fn transient_prescan_failure_disables_injection() {
    let source = source().with_failure(ReferenceFilter::Unmapped, FailureKind::Transient);
    let reader = SamReader::open(source, READSET, StreamConfig::default()).expect("reader opens");
    let records = collect(reader.iter_all().expect("query starts"));
    assert_eq!(records.len(), 8);
    assert_eq!(records[5].read_name.as_deref(), Some("F2"));
    assert!(records[5].is_paired());
}

#[test]
fn auth_failure_in_prescan_is_fatal() {
    let source = source().with_failure(ReferenceFilter::Unmapped, FailureKind::Auth);
    let reader = SamReader::open(source, READSET, StreamConfig::default()).expect("reader opens");
    assert!(matches!(
        reader.iter_all(),
        Err(ReaderError::Stream(StreamError::Fatal(SourceError::Auth(_))))
    ));
}

#[test]
fn failing_every_interval_yields_an_empty_stream() {
    let source = source()
        .with_failure(ReferenceFilter::Named("chr1".into()), FailureKind::Transient)
        .with_failure(ReferenceFilter::Named("chr2".into()), FailureKind::Transient);
    let reader = SamReader::open(source, READSET, StreamConfig::default()).expect("reader opens");
    let mut stream = reader
        .query(vec![
            QueryInterval::overlapping("chr1", 1, 0),
            QueryInterval::overlapping("chr2", 1, 0),
        ])
        .expect("query starts");

    assert!(stream.next().is_none());
    assert_eq!(stream.state(), StreamState::Exhausted);
}

#[test]
fn mid_interval_failure_keeps_earlier_records() {
    let source = source().with_failure(
        ReferenceFilter::Named("chr1".into()),
        FailureKind::MidStream(2),
    );
    let reader = SamReader::open(source, READSET, StreamConfig::default()).expect("reader opens");
    let records = collect(
        reader
            .query(vec![
                QueryInterval::overlapping("chr1", 1, 0),
                QueryInterval::overlapping("chr2", 1, 0),
            ])
            .expect("query starts"),
    );
    assert_eq!(names(&records), vec!["F1", "F1", "C1"]);
}

#[test]
fn close_is_idempotent_and_stops_fetching() {
    let source = Arc::new(source());
    let mut reader = SamReader::open_shared(Arc::clone(&source), READSET, StreamConfig::default())
        .expect("reader opens");
    let mut stream = reader
        .query(vec![
            QueryInterval::overlapping("chr1", 1, 0),
            QueryInterval::overlapping("chr2", 1, 0),
        ])
        .expect("query starts");

    assert!(stream.next().is_some());
    let fetches = source.fetches();

    stream.close();
    stream.close();
    assert!(matches!(stream.next(), Some(Err(StreamError::Closed))));
    assert!(stream.next().is_none());
    assert_eq!(source.fetches(), fetches);

    reader.close();
    reader.close();
    assert_eq!(source.close_calls(), 1);
    assert!(matches!(
        reader.query_unmapped(),
        Err(ReaderError::Closed)
    ));
}

#[test]
fn header_failure_surfaces_before_any_record() {
    let mut metadata = metadata();
    metadata.references.clear();
    metadata
        .read_group_set
        .info
        .insert("SAM:@SQ".into(), vec!["SN:chr1".into()]);
    let source = Arc::new(InMemorySource::new(READSET, metadata, Vec::<RestRead>::new()));

    let result = IntervalStream::open(
        Arc::clone(&source),
        READSET,
        vec![QueryInterval::whole_readset()],
        StreamConfig::default(),
    );
    assert!(matches!(result, Err(StreamError::Header(_))));
    assert_eq!(source.fetches(), 0);
}

#[test]
fn start_at_stops_pulling_past_its_position() {
    let pulled = Rc::new(Cell::new(0));
    let source = LooseSource {
        reads: vec![
            mapped("r100", "chr1", 100),
            mapped("r900", "chr1", 900),
            mapped("r1000", "chr1", 1_000),
            mapped("r1001", "chr1", 1_001),
        ],
        pulled: Rc::clone(&pulled),
    };
    let reader = SamReader::open(source, READSET, StreamConfig::default()).expect("reader opens");

    let records = collect(reader.query_alignment_start("chr1", 901).expect("query starts"));
    assert_eq!(names(&records), vec!["r900"]);
    assert_eq!(pulled.get(), 3);
}

#[test]
fn start_at_matches_exact_positions_only() {
    let reads = vec![
        mapped("a", "chr1", 98),
        pair_end(mapped("b", "chr1", 99), 0),
        mapped("c", "chr1", 100),
    ];
    let reader = SamReader::open(
        InMemorySource::new(READSET, metadata(), reads),
        READSET,
        StreamConfig::default(),
    )
    .expect("reader opens");
    let records = collect(reader.query_alignment_start("chr1", 100).expect("query starts"));
    assert_eq!(names(&records), vec!["b"]);
}
