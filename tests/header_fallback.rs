#[path = "common/mod.rs"]
mod common;

use common::{mapped, metadata, READSET};
use ga4gh_sam::header::{HeaderError, SequenceRecord, SortOrder};
use ga4gh_sam::model::{HeaderSection, ReadsetMetadata, RestRead};
use ga4gh_sam::source::InMemorySource;
use ga4gh_sam::{HeaderBuilder, ReaderError, SamReader, StreamConfig};

fn without_references(info: &[(&str, &[&str])]) -> ReadsetMetadata {
    let mut metadata = metadata();
    metadata.references.clear();
    for (key, values) in info {
        metadata.read_group_set.info.insert(
            key.to_string(),
            values.iter().map(|value| value.to_string()).collect(),
        );
    }
    metadata
}

fn open(metadata: ReadsetMetadata, reads: Vec<RestRead>) -> Result<SamReader<InMemorySource<RestRead>>, ReaderError> {
    SamReader::open(
        InMemorySource::new(READSET, metadata, reads),
        READSET,
        StreamConfig::default(),
    )
}

#[test]
fn dictionary_is_recovered_from_embedded_header_lines() {
    let metadata = without_references(&[
        ("SAM:@HD", &["VN:1.5\tSO:unsorted"][..]),
        ("SAM:@SQ", &["SN:chr1\tLN:10000", "SN:chrM\tLN:16569"][..]),
        ("SAM:@CO", &["imported from sample.bam"][..]),
    ]);
    let reader = open(metadata, vec![mapped("r1", "chrM", 9)]).expect("reader opens");

    let header = reader.header();
    assert_eq!(header.sort_order, SortOrder::Coordinate);
    assert_eq!(
        header.sequences,
        vec![
            SequenceRecord::new("chr1", 10_000),
            SequenceRecord::new("chrM", 16_569),
        ]
    );
    assert_eq!(header.comments, vec!["imported from sample.bam".to_string()]);
    assert_eq!(header.read_groups.len(), 1);

    let record = reader
        .query_overlapping("chrM", 1, 100)
        .expect("query starts")
        .next()
        .expect("one record")
        .expect("record converts");
    assert_eq!(record.reference_index, Some(1));
}

#[test]
fn recovered_read_group_with_taken_id_is_renamed() {
    let metadata = without_references(&[
        ("SAM:@SQ", &["SN:chr1\tLN:10000"][..]),
        ("SAM:@RG", &["ID:NA12878.L1\tSM:other"][..]),
    ]);
    let reader = open(metadata, Vec::new()).expect("reader opens");
    let ids: Vec<&str> = reader
        .header()
        .read_groups
        .iter()
        .map(|group| group.id.as_str())
        .collect();
    assert_eq!(ids, vec!["NA12878.L1", "NA12878.L1.1"]);
}

#[test]
fn malformed_embedded_header_fails_at_open() {
    let metadata = without_references(&[("SAM:@SQ", &["SN:chr1\tLN:ten"][..])]);
    assert!(matches!(
        open(metadata, Vec::new()),
        Err(ReaderError::Header(HeaderError::Parse { .. }))
    ));
}

#[test]
fn no_references_and_no_embedded_lines_gives_empty_dictionary() {
    let reader = open(without_references(&[]), Vec::new()).expect("reader opens");
    assert!(reader.header().sequences.is_empty());
}

#[test]
fn conflicting_lengths_are_rejected() {
    let metadata = without_references(&[(
        "SAM:@SQ",
        &["SN:chr1\tLN:10000", "SN:chr1\tLN:20000"][..],
    )]);
    assert!(open(metadata, Vec::new()).is_err());
}

#[test]
fn legacy_header_section_parses_strictly() {
    let mut set = metadata().read_group_set;
    set.file_data.push(HeaderSection {
        file_uri: Some("gs://bucket/sample.bam".into()),
        text: "@HD\tVN:1.4\tSO:coordinate\n@SQ\tSN:chr20\tLN:64444167\n".into(),
    });
    let header = HeaderBuilder::new()
        .from_header_sections(&set)
        .expect("header parses");
    assert_eq!(header.version, "1.4");
    assert_eq!(header.sequence_index("chr20"), Some(0));
}
