use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::read::{AlignmentView, CigarUnit, PositionView, ReadModel};

/// Position as delivered by the streaming endpoint. Scalars follow proto3
/// rules: an empty string means unset.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StreamedPosition {
    /// Reference name, empty when unset.
    pub reference_name: String,
    /// 0-based coordinate.
    pub position: i64,
    /// Reverse strand marker.
    pub reverse_strand: bool,
}

impl StreamedPosition {
    /// Construct a position.
    pub fn new(reference_name: impl Into<String>, position: i64, reverse_strand: bool) -> Self {
        Self {
            reference_name: reference_name.into(),
            position,
            reverse_strand,
        }
    }

    fn view(&self) -> PositionView<'_> {
        PositionView {
            reference_name: non_empty(&self.reference_name),
            position: Some(self.position),
            reverse_strand: self.reverse_strand,
        }
    }
}

/// Linear alignment as delivered by the streaming endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StreamedAlignment {
    /// Start of the alignment; a missing message means unplaced.
    pub position: Option<StreamedPosition>,
    /// Mapping quality.
    pub mapping_quality: i32,
    /// CIGAR units.
    pub cigar: Vec<CigarUnit>,
}

/// A read as delivered by the streaming endpoint.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StreamedRead {
    /// Service-assigned read id.
    pub id: String,
    /// Read group id.
    pub read_group_id: String,
    /// Read group set id.
    pub read_group_set_id: String,
    /// Fragment name.
    pub fragment_name: String,
    /// Proper placement flag.
    pub proper_placement: bool,
    /// Duplicate flag.
    pub duplicate_fragment: bool,
    /// Observed fragment length, zero when unknown.
    pub fragment_length: i32,
    /// Read number within the fragment.
    pub read_number: i32,
    /// Reads in the fragment, zero when unknown.
    pub number_reads: i32,
    /// QC failure flag.
    pub failed_vendor_quality_checks: bool,
    /// Linear alignment.
    pub alignment: Option<StreamedAlignment>,
    /// Secondary alignment flag.
    pub secondary_alignment: bool,
    /// Supplementary alignment flag.
    pub supplementary_alignment: bool,
    /// Aligned bases, empty when unset.
    pub aligned_sequence: String,
    /// Per-base qualities.
    pub aligned_quality: Vec<i32>,
    /// Position of the next read in the fragment.
    pub next_mate_position: Option<StreamedPosition>,
    /// Free-form tags.
    pub info: BTreeMap<String, Vec<String>>,
}

fn non_empty(value: &str) -> Option<&str> {
    (!value.is_empty()).then_some(value)
}

impl ReadModel for StreamedRead {
    fn fragment_name(&self) -> Option<&str> {
        non_empty(&self.fragment_name)
    }

    fn read_group_id(&self) -> Option<&str> {
        non_empty(&self.read_group_id)
    }

    fn read_number(&self) -> Option<i32> {
        Some(self.read_number)
    }

    fn number_reads(&self) -> Option<i32> {
        Some(self.number_reads).filter(|n| *n > 0)
    }

    fn alignment(&self) -> Option<AlignmentView<'_>> {
        self.alignment.as_ref().map(|alignment| AlignmentView {
            position: alignment.position.as_ref().map(StreamedPosition::view),
            mapping_quality: Some(alignment.mapping_quality),
            cigar: &alignment.cigar,
        })
    }

    fn next_mate_position(&self) -> Option<PositionView<'_>> {
        self.next_mate_position.as_ref().map(StreamedPosition::view)
    }

    fn fragment_length(&self) -> Option<i32> {
        Some(self.fragment_length).filter(|len| *len != 0)
    }

    fn aligned_sequence(&self) -> Option<&str> {
        non_empty(&self.aligned_sequence)
    }

    fn aligned_quality(&self) -> &[i32] {
        &self.aligned_quality
    }

    fn proper_placement(&self) -> bool {
        self.proper_placement
    }

    fn secondary_alignment(&self) -> bool {
        self.secondary_alignment
    }

    fn supplementary_alignment(&self) -> bool {
        self.supplementary_alignment
    }

    fn duplicate_fragment(&self) -> bool {
        self.duplicate_fragment
    }

    fn failed_vendor_quality_checks(&self) -> bool {
        self.failed_vendor_quality_checks
    }

    fn info(&self) -> &BTreeMap<String, Vec<String>> {
        &self.info
    }
}
