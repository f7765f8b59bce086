use std::sync::Arc;

use crate::header::FileHeader;
use crate::model::{flags, AlignmentRecord, ReadModel, TagValue};

use super::{CigarMapper, ConvertError, TagCodec};

/// Compute the SAM flag bits of a remote read.
pub fn compute_flags<R: ReadModel>(read: &R) -> u16 {
    let alignment_position = read.alignment().and_then(|alignment| alignment.position);
    let mate = read.next_mate_position();

    let conditions = [
        (read.number_reads() == Some(2), flags::PAIRED),
        (read.proper_placement(), flags::PROPER_PAIR),
        (read.is_unmapped(), flags::UNMAPPED),
        (
            mate.map_or(true, |position| position.position.is_none()),
            flags::MATE_UNMAPPED,
        ),
        (
            alignment_position.is_some_and(|position| position.reverse_strand),
            flags::REVERSE,
        ),
        (
            mate.is_some_and(|position| position.reverse_strand),
            flags::MATE_REVERSE,
        ),
        (read.read_number() == Some(0), flags::FIRST_IN_PAIR),
        (read.read_number() == Some(1), flags::SECOND_IN_PAIR),
        (read.secondary_alignment(), flags::SECONDARY),
        (read.failed_vendor_quality_checks(), flags::QC_FAIL),
        (read.duplicate_fragment(), flags::DUPLICATE),
        (read.supplementary_alignment(), flags::SUPPLEMENTARY),
    ];

    conditions
        .iter()
        .filter(|(set, _)| *set)
        .fold(0, |acc, (_, bit)| acc | bit)
}

fn one_based(pos: i64) -> Result<i64, ConvertError> {
    pos.checked_add(1)
        .ok_or(ConvertError::PositionOutOfRange(pos))
}

/// Convert one remote read into an alignment record against `header`.
///
/// Positions move from 0-based to 1-based. Fields absent on the read stay
/// absent on the record. Free-form tags are typed through [`TagCodec`]; when
/// a tag carries several values the last one wins.
pub fn convert<R: ReadModel>(read: &R, header: &FileHeader) -> Result<AlignmentRecord, ConvertError> {
    let mut record = AlignmentRecord {
        read_name: read.fragment_name().map(str::to_string),
        flags: compute_flags(read),
        ..AlignmentRecord::default()
    };

    if let Some(read_group_id) = read.read_group_id() {
        let rg = header
            .read_group_for_source(read_group_id)
            .map_or(read_group_id, |group| group.id.as_str());
        record.set_tag("RG", TagValue::String(rg.to_string()));
    }

    if let Some(alignment) = read.alignment() {
        if let Some(position) = read.alignment_position() {
            if let Some(name) = position.reference_name {
                record.reference_index = header.sequence_index(name);
                record.reference_name = Some(name.to_string());
            }
            record.alignment_start = position.position.map(one_based).transpose()?;
        }
        record.mapping_quality = alignment
            .mapping_quality
            .map(|quality| quality.clamp(0, i32::from(u8::MAX)) as u8);
        record.cigar = CigarMapper::to_ops(alignment.cigar)?;
    }

    if let Some(mate) = read.next_mate_position() {
        if let Some(name) = mate.reference_name {
            record.mate_reference_index = header.sequence_index(name);
            record.mate_reference_name = Some(name.to_string());
        }
        record.mate_alignment_start = mate.position.map(one_based).transpose()?;
    }

    record.inferred_insert_size = read.fragment_length();

    if let Some(sequence) = read.aligned_sequence() {
        record.sequence = sequence.as_bytes().to_vec();
    }
    record.base_qualities = read
        .aligned_quality()
        .iter()
        .map(|quality| (*quality).clamp(0, i32::from(u8::MAX)) as u8)
        .collect();

    for (name, values) in read.info() {
        for value in values {
            let decoded = TagCodec::decode(name, value)?;
            record.set_tag(name, decoded);
        }
    }

    Ok(record)
}

/// Converter bound to one header, shared by every record of a stream.
#[derive(Debug, Clone)]
pub struct ReadConverter {
    header: Arc<FileHeader>,
}

impl ReadConverter {
    /// Create a converter for records referencing `header`.
    pub fn new(header: Arc<FileHeader>) -> Self {
        Self { header }
    }

    /// Header the records reference.
    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// Convert one read.
    pub fn convert<R: ReadModel>(&self, read: &R) -> Result<AlignmentRecord, ConvertError> {
        convert(read, &self.header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{HeaderBuilder, ReadGroupRecord};
    use crate::model::{CigarUnit, ReadGroup, ReadGroupSet, Reference, RestRead, StreamedRead};
    use crate::model::{StreamedAlignment, StreamedPosition, TagArray};
    use proptest::prelude::*;

    fn header() -> FileHeader {
        HeaderBuilder::new()
            .build(
                &ReadGroupSet::default(),
                &[Reference::new("chr1", 1_000), Reference::new("chr2", 2_000)],
            )
            .expect("header builds")
    }

    fn paired_read() -> RestRead {
        RestRead::new("frag1")
            .with_read_number(0, 2)
            .with_alignment("chr1", 99, false, vec![CigarUnit::new("ALIGNMENT_MATCH", 4)])
            .with_mapping_quality(60)
            .with_mate("chr1", 299, false)
            .with_sequence("ACGT", vec![30, 31, 32, 33])
    }

    #[test]
    fn proper_first_in_pair_flags() {
        let mut read = paired_read();
        read.proper_placement = Some(true);
        assert_eq!(compute_flags(&read), 67);
    }

    #[test]
    fn converts_positions_and_cigar() {
        let read = paired_read();
        let record = convert(&read, &header()).expect("read converts");

        assert_eq!(record.read_name.as_deref(), Some("frag1"));
        assert_eq!(record.reference_name.as_deref(), Some("chr1"));
        assert_eq!(record.reference_index, Some(0));
        assert_eq!(record.alignment_start, Some(100));
        assert_eq!(record.mate_alignment_start, Some(300));
        assert_eq!(record.mapping_quality, Some(60));
        assert_eq!(record.cigar_string(), "4M");
        assert_eq!(record.sequence, b"ACGT");
        assert_eq!(record.base_qualities, vec![30, 31, 32, 33]);
    }

    #[test]
    fn unplaced_read_has_no_reference_or_start() {
        let read = RestRead::new("lonely").with_read_number(0, 1);
        let record = convert(&read, &header()).expect("read converts");

        assert!(record.is_unmapped());
        assert!(record.has_flag(flags::MATE_UNMAPPED));
        assert_eq!(record.reference_name, None);
        assert_eq!(record.alignment_start, None);
        assert_eq!(record.mate_alignment_start, None);
    }

    #[test]
    fn mate_reference_is_kept_without_position() {
        let mut read = paired_read();
        read.next_mate_position = Some(crate::model::RestPosition {
            reference_name: Some("chr2".into()),
            position: None,
            reverse_strand: Some(true),
        });
        let record = convert(&read, &header()).expect("read converts");

        assert_eq!(record.mate_reference_name.as_deref(), Some("chr2"));
        assert_eq!(record.mate_reference_index, Some(1));
        assert_eq!(record.mate_alignment_start, None);
        assert!(record.has_flag(flags::MATE_UNMAPPED | flags::MATE_REVERSE));
    }

    #[test]
    fn info_tags_are_typed_and_last_value_wins() {
        let read = paired_read()
            .with_tag("NM", "1")
            .with_tag("NM", "2")
            .with_tag("FZ", "S,1,2")
            .with_tag("XT", "U");
        let record = convert(&read, &header()).expect("read converts");

        assert_eq!(record.tag("NM"), Some(&TagValue::Int(2)));
        assert_eq!(
            record.tag("FZ"),
            Some(&TagValue::Array(TagArray::U16(vec![1, 2])))
        );
        assert_eq!(record.tag("XT"), Some(&TagValue::String("U".into())));
    }

    #[test]
    fn malformed_tag_is_an_error() {
        let read = paired_read().with_tag("NM", "many");
        assert!(matches!(
            convert(&read, &header()),
            Err(ConvertError::Tag(_))
        ));
    }

    #[test]
    fn read_group_tag_uses_header_record_id() {
        let set = ReadGroupSet {
            read_groups: vec![ReadGroup {
                id: Some("CMvnhpKTFhD3he72j4KZuyc".into()),
                name: Some("SRR001".into()),
                ..ReadGroup::default()
            }],
            ..ReadGroupSet::default()
        };
        let header = HeaderBuilder::new()
            .build(&set, &[Reference::new("chr1", 1_000)])
            .expect("header builds");
        assert_eq!(
            header.read_groups,
            vec![ReadGroupRecord::new("SRR001").with_source_id("CMvnhpKTFhD3he72j4KZuyc")]
        );

        let mut read = paired_read();
        read.read_group_id = Some("CMvnhpKTFhD3he72j4KZuyc".into());
        let record = convert(&read, &header).expect("read converts");
        assert_eq!(record.tag("RG"), Some(&TagValue::String("SRR001".into())));

        read.read_group_id = Some("unknown".into());
        let record = convert(&read, &header).expect("read converts");
        assert_eq!(record.tag("RG"), Some(&TagValue::String("unknown".into())));
    }

    #[test]
    fn both_read_encodings_convert_identically() {
        let rest = paired_read().with_tag("NM", "0");
        let streamed = StreamedRead {
            fragment_name: "frag1".into(),
            read_number: 0,
            number_reads: 2,
            alignment: Some(StreamedAlignment {
                position: Some(StreamedPosition::new("chr1", 99, false)),
                mapping_quality: 60,
                cigar: vec![CigarUnit::new("ALIGNMENT_MATCH", 4)],
            }),
            next_mate_position: Some(StreamedPosition::new("chr1", 299, false)),
            aligned_sequence: "ACGT".into(),
            aligned_quality: vec![30, 31, 32, 33],
            info: [("NM".to_string(), vec!["0".to_string()])].into(),
            ..StreamedRead::default()
        };

        let header = header();
        assert_eq!(
            convert(&rest, &header).expect("rest read converts"),
            convert(&streamed, &header).expect("streamed read converts")
        );
    }

    #[test]
    fn position_at_i64_max_is_rejected() {
        let read = RestRead::new("big").with_alignment(
            "chr1",
            i64::MAX,
            false,
            vec![CigarUnit::new("ALIGNMENT_MATCH", 10)],
        );
        assert!(matches!(
            convert(&read, &header()),
            Err(ConvertError::PositionOutOfRange(i64::MAX))
        ));

        let read = paired_read().with_mate("chr1", i64::MAX, false);
        assert!(matches!(
            convert(&read, &header()),
            Err(ConvertError::PositionOutOfRange(i64::MAX))
        ));
    }

    fn arb_read() -> impl Strategy<Value = RestRead> {
        (
            proptest::option::of(0i64..1_000_000),
            proptest::option::of(0i64..1_000_000),
            proptest::option::of(0i32..3),
            proptest::option::of(1i32..4),
            any::<bool>(),
            any::<bool>(),
        )
            .prop_map(|(pos, mate_pos, read_number, number_reads, reverse, proper)| {
                let mut read = RestRead::new("f");
                read.read_number = read_number;
                read.number_reads = number_reads;
                read.proper_placement = Some(proper);
                if let Some(pos) = pos {
                    read = read.with_alignment("chr1", pos, reverse, Vec::new());
                }
                if let Some(mate_pos) = mate_pos {
                    read = read.with_mate("chr1", mate_pos, false);
                }
                read
            })
    }

    proptest! {
        #[test]
        fn positions_shift_by_one_and_absence_is_kept(read in arb_read()) {
            let record = convert(&read, &header()).expect("read converts");
            let input = read.alignment_position().and_then(|position| position.position);
            prop_assert_eq!(record.alignment_start, input.map(|pos| pos + 1));
            prop_assert_eq!(record.is_unmapped(), input.is_none());
            if input.is_none() {
                prop_assert!(record.reference_name.is_none());
            }
            let mate = read.next_mate_position().and_then(|position| position.position);
            prop_assert_eq!(record.mate_alignment_start, mate.map(|pos| pos + 1));
        }

        #[test]
        fn pairing_bits_follow_read_number(read in arb_read()) {
            let bits = compute_flags(&read);
            prop_assert_eq!(bits & flags::FIRST_IN_PAIR != 0, read.read_number == Some(0));
            prop_assert_eq!(bits & flags::SECOND_IN_PAIR != 0, read.read_number == Some(1));
            prop_assert_eq!(bits & flags::PAIRED != 0, read.number_reads == Some(2));
        }
    }
}
