//! Readset-level metadata used to build the file header.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::read::int64;

/// Sequencing experiment attached to a read group.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Experiment {
    /// Library identifier (`LB`).
    pub library_id: Option<String>,
    /// Platform unit (`PU`).
    pub platform_unit: Option<String>,
    /// Sequencing center (`CN`).
    pub sequencing_center: Option<String>,
    /// Instrument model, written as the platform (`PL`).
    pub instrument_model: Option<String>,
}

/// Program that produced or processed reads of a read group.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Program {
    /// Program id (`ID`).
    pub id: Option<String>,
    /// Command line (`CL`).
    pub command_line: Option<String>,
    /// Program name (`PN`).
    pub name: Option<String>,
    /// Id of the previous program in the chain (`PP`).
    pub prev_program_id: Option<String>,
    /// Program version (`VN`).
    pub version: Option<String>,
}

/// One read group of a read group set.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReadGroup {
    /// Service-assigned id.
    pub id: Option<String>,
    /// Dataset the group belongs to.
    pub dataset_id: Option<String>,
    /// Read group name as imported (the SAM `ID`).
    pub name: Option<String>,
    /// Free-text description (`DS`).
    pub description: Option<String>,
    /// Sample (`SM`).
    pub sample_id: Option<String>,
    /// Predicted median insert size (`PI`).
    pub predicted_insert_size: Option<i32>,
    /// Experiment details.
    pub experiment: Option<Experiment>,
    /// Programs applied to the group.
    pub programs: Vec<Program>,
    /// Reference set the group is aligned to.
    pub reference_set_id: Option<String>,
    /// Free-form tags.
    pub info: BTreeMap<String, Vec<String>>,
}

/// Raw header captured when a file was imported into an older readset.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeaderSection {
    /// Source file the header came from.
    pub file_uri: Option<String>,
    /// SAM header text.
    pub text: String,
}

/// A collection of read groups imported together.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReadGroupSet {
    /// Service-assigned id.
    pub id: Option<String>,
    /// Dataset id.
    pub dataset_id: Option<String>,
    /// Display name.
    pub name: Option<String>,
    /// Reference set the reads are aligned to.
    pub reference_set_id: Option<String>,
    /// Read groups.
    pub read_groups: Vec<ReadGroup>,
    /// Free-form tags; `SAM:`-prefixed keys carry raw header lines.
    pub info: BTreeMap<String, Vec<String>>,
    /// Raw header sections of older readsets.
    pub file_data: Vec<HeaderSection>,
}

/// Reference sequence metadata.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Reference {
    /// Service-assigned id.
    pub id: Option<String>,
    /// Sequence name (`SN`).
    pub name: Option<String>,
    /// Sequence length (`LN`).
    #[serde(deserialize_with = "int64::optional")]
    pub length: Option<i64>,
    /// MD5 of the sequence (`M5`).
    pub md5checksum: Option<String>,
    /// Source URI (`UR`).
    pub source_uri: Option<String>,
}

impl Reference {
    /// Construct a named reference of the given length.
    pub fn new(name: impl Into<String>, length: i64) -> Self {
        Self {
            name: Some(name.into()),
            length: Some(length),
            ..Self::default()
        }
    }
}

/// Everything the header builder needs for one readset.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReadsetMetadata {
    /// The read group set.
    pub read_group_set: ReadGroupSet,
    /// Reference sequences the reads are aligned to, in dictionary order.
    pub references: Vec<Reference>,
}
