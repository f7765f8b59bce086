use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One CIGAR unit as delivered by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CigarUnit {
    /// Named operation, e.g. `ALIGNMENT_MATCH` or `CLIP_SOFT`.
    pub operation: String,
    /// Run length of the operation.
    #[serde(deserialize_with = "int64::required")]
    pub operation_length: i64,
}

impl CigarUnit {
    /// Construct a CIGAR unit from an operation name and length.
    pub fn new(operation: impl Into<String>, operation_length: i64) -> Self {
        Self {
            operation: operation.into(),
            operation_length,
        }
    }
}

/// Presence-tagged view of a position on a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionView<'a> {
    /// Reference (contig) name, if set.
    pub reference_name: Option<&'a str>,
    /// 0-based position, if set.
    pub position: Option<i64>,
    /// Whether the read lies on the reverse strand.
    pub reverse_strand: bool,
}

/// Presence-tagged view of a read's linear alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlignmentView<'a> {
    /// Where the alignment starts, if placed.
    pub position: Option<PositionView<'a>>,
    /// Mapping quality, if reported.
    pub mapping_quality: Option<i32>,
    /// CIGAR units in alignment order.
    pub cigar: &'a [CigarUnit],
}

/// Read-only access to one remote read, independent of how the service
/// encoded it.
///
/// Every accessor reports presence explicitly so that flag and position
/// logic never has to guess whether a zero or an empty string meant "unset".
pub trait ReadModel {
    /// Fragment (template) name shared by all reads of one molecule.
    fn fragment_name(&self) -> Option<&str>;
    /// Identifier of the read group the read belongs to.
    fn read_group_id(&self) -> Option<&str>;
    /// Index of this read within its fragment (0 = first).
    fn read_number(&self) -> Option<i32>;
    /// Number of reads sequenced from the fragment.
    fn number_reads(&self) -> Option<i32>;
    /// Linear alignment, if any.
    fn alignment(&self) -> Option<AlignmentView<'_>>;
    /// Alignment position of the next read in the fragment.
    fn next_mate_position(&self) -> Option<PositionView<'_>>;
    /// Observed fragment length (inferred insert size).
    fn fragment_length(&self) -> Option<i32>;
    /// Bases of the read as aligned.
    fn aligned_sequence(&self) -> Option<&str>;
    /// Per-base Phred qualities, empty when absent.
    fn aligned_quality(&self) -> &[i32];
    /// Read is placed according to the aligner's pairing model.
    fn proper_placement(&self) -> bool;
    /// Alignment is a secondary alignment.
    fn secondary_alignment(&self) -> bool;
    /// Alignment is a supplementary (chimeric) alignment.
    fn supplementary_alignment(&self) -> bool;
    /// Fragment is a PCR or optical duplicate.
    fn duplicate_fragment(&self) -> bool;
    /// Read failed platform or vendor quality checks.
    fn failed_vendor_quality_checks(&self) -> bool;
    /// Free-form tag map, name to values.
    fn info(&self) -> &BTreeMap<String, Vec<String>>;

    /// Alignment position, only when both the position object and its
    /// coordinate are present.
    fn alignment_position(&self) -> Option<PositionView<'_>> {
        self.alignment()
            .and_then(|alignment| alignment.position)
            .filter(|position| position.position.is_some())
    }

    /// True when the read carries no alignment coordinate.
    fn is_unmapped(&self) -> bool {
        self.alignment_position().is_none()
    }

    /// True when the fragment yielded more than one read.
    fn has_mates(&self) -> bool {
        self.number_reads().is_some_and(|n| n >= 2)
    }
}

/// The REST encoding sends 64-bit integers as JSON strings; accept both.
pub(crate) mod int64 {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Int64 {
        Number(i64),
        Text(String),
    }

    impl Int64 {
        fn value<E: serde::de::Error>(self) -> Result<i64, E> {
            match self {
                Int64::Number(n) => Ok(n),
                Int64::Text(text) => text.trim().parse().map_err(E::custom),
            }
        }
    }

    pub fn optional<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
        Option::<Int64>::deserialize(deserializer)?
            .map(Int64::value)
            .transpose()
    }

    pub fn required<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        Int64::deserialize(deserializer)?.value()
    }
}
