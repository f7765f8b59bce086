use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::read::{int64, AlignmentView, CigarUnit, PositionView, ReadModel};

/// Position as encoded by the paginated REST API, every field optional.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RestPosition {
    /// Reference name.
    pub reference_name: Option<String>,
    /// 0-based coordinate.
    #[serde(deserialize_with = "int64::optional")]
    pub position: Option<i64>,
    /// Reverse strand marker.
    pub reverse_strand: Option<bool>,
}

impl RestPosition {
    /// Construct a fully specified position.
    pub fn new(reference_name: impl Into<String>, position: i64, reverse_strand: bool) -> Self {
        Self {
            reference_name: Some(reference_name.into()),
            position: Some(position),
            reverse_strand: Some(reverse_strand),
        }
    }

    fn view(&self) -> PositionView<'_> {
        PositionView {
            reference_name: self.reference_name.as_deref(),
            position: self.position,
            reverse_strand: self.reverse_strand.unwrap_or(false),
        }
    }
}

/// Linear alignment as encoded by the REST API.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RestAlignment {
    /// Start of the alignment.
    pub position: Option<RestPosition>,
    /// Mapping quality.
    pub mapping_quality: Option<i32>,
    /// CIGAR units.
    pub cigar: Vec<CigarUnit>,
}

/// A read as returned by the paginated REST search endpoint.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RestRead {
    /// Service-assigned read id.
    pub id: Option<String>,
    /// Read group the read belongs to.
    pub read_group_id: Option<String>,
    /// Read group set the read belongs to.
    pub read_group_set_id: Option<String>,
    /// Fragment (template) name.
    pub fragment_name: Option<String>,
    /// Proper placement flag.
    pub proper_placement: Option<bool>,
    /// Duplicate flag.
    pub duplicate_fragment: Option<bool>,
    /// Observed fragment length.
    pub fragment_length: Option<i32>,
    /// Read number within the fragment.
    pub read_number: Option<i32>,
    /// Reads in the fragment.
    pub number_reads: Option<i32>,
    /// QC failure flag.
    pub failed_vendor_quality_checks: Option<bool>,
    /// Linear alignment.
    pub alignment: Option<RestAlignment>,
    /// Secondary alignment flag.
    pub secondary_alignment: Option<bool>,
    /// Supplementary alignment flag.
    pub supplementary_alignment: Option<bool>,
    /// Aligned bases.
    pub aligned_sequence: Option<String>,
    /// Per-base qualities.
    pub aligned_quality: Vec<i32>,
    /// Position of the next read in the fragment.
    pub next_mate_position: Option<RestPosition>,
    /// Free-form tags.
    pub info: BTreeMap<String, Vec<String>>,
}

impl RestRead {
    /// Start a read for the given fragment.
    pub fn new(fragment_name: impl Into<String>) -> Self {
        Self {
            fragment_name: Some(fragment_name.into()),
            ..Self::default()
        }
    }

    /// Set read number and fragment size.
    pub fn with_read_number(mut self, read_number: i32, number_reads: i32) -> Self {
        self.read_number = Some(read_number);
        self.number_reads = Some(number_reads);
        self
    }

    /// Place the read at a 0-based position with the given CIGAR.
    pub fn with_alignment(
        mut self,
        reference_name: &str,
        position: i64,
        reverse_strand: bool,
        cigar: Vec<CigarUnit>,
    ) -> Self {
        let alignment = self.alignment.get_or_insert_with(RestAlignment::default);
        alignment.position = Some(RestPosition::new(reference_name, position, reverse_strand));
        alignment.cigar = cigar;
        self
    }

    /// Set the mapping quality, creating an (unplaced) alignment if needed.
    pub fn with_mapping_quality(mut self, mapping_quality: i32) -> Self {
        self.alignment
            .get_or_insert_with(RestAlignment::default)
            .mapping_quality = Some(mapping_quality);
        self
    }

    /// Set the next-mate position.
    pub fn with_mate(mut self, reference_name: &str, position: i64, reverse_strand: bool) -> Self {
        self.next_mate_position = Some(RestPosition::new(reference_name, position, reverse_strand));
        self
    }

    /// Set bases and qualities.
    pub fn with_sequence(mut self, sequence: &str, qualities: Vec<i32>) -> Self {
        self.aligned_sequence = Some(sequence.to_string());
        self.aligned_quality = qualities;
        self
    }

    /// Append one value to a free-form tag.
    pub fn with_tag(mut self, name: &str, value: &str) -> Self {
        self.info
            .entry(name.to_string())
            .or_default()
            .push(value.to_string());
        self
    }
}

impl ReadModel for RestRead {
    fn fragment_name(&self) -> Option<&str> {
        self.fragment_name.as_deref()
    }

    fn read_group_id(&self) -> Option<&str> {
        self.read_group_id.as_deref()
    }

    fn read_number(&self) -> Option<i32> {
        self.read_number
    }

    fn number_reads(&self) -> Option<i32> {
        self.number_reads
    }

    fn alignment(&self) -> Option<AlignmentView<'_>> {
        self.alignment.as_ref().map(|alignment| AlignmentView {
            position: alignment.position.as_ref().map(RestPosition::view),
            mapping_quality: alignment.mapping_quality,
            cigar: &alignment.cigar,
        })
    }

    fn next_mate_position(&self) -> Option<PositionView<'_>> {
        self.next_mate_position.as_ref().map(RestPosition::view)
    }

    fn fragment_length(&self) -> Option<i32> {
        self.fragment_length
    }

    fn aligned_sequence(&self) -> Option<&str> {
        self.aligned_sequence.as_deref()
    }

    fn aligned_quality(&self) -> &[i32] {
        &self.aligned_quality
    }

    fn proper_placement(&self) -> bool {
        self.proper_placement.unwrap_or(false)
    }

    fn secondary_alignment(&self) -> bool {
        self.secondary_alignment.unwrap_or(false)
    }

    fn supplementary_alignment(&self) -> bool {
        self.supplementary_alignment.unwrap_or(false)
    }

    fn duplicate_fragment(&self) -> bool {
        self.duplicate_fragment.unwrap_or(false)
    }

    fn failed_vendor_quality_checks(&self) -> bool {
        self.failed_vendor_quality_checks.unwrap_or(false)
    }

    fn info(&self) -> &BTreeMap<String, Vec<String>> {
        &self.info
    }
}
