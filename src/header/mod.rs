//! SAM file header model, construction from readset metadata, strict text
//! parsing and merging.

mod builder;
mod merge;
mod text;

pub use builder::{HeaderBuilder, SAM_INFO_PREFIX};
pub use merge::merge_headers;
pub use text::parse_header_text;

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// SAM format version written to `@HD`.
pub const SAM_VERSION: &str = "1.6";

/// Errors raised while building, parsing or merging headers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HeaderError {
    /// Header text failed strict validation.
    #[error("malformed header text at line {line}: {reason}")]
    Parse {
        /// 1-based line number within the parsed text.
        line: usize,
        /// What went wrong.
        reason: String,
    },
    /// Two headers disagree on the length of a sequence.
    #[error("sequence {name} has conflicting lengths {first} and {second}")]
    ConflictingSequence {
        /// Sequence name.
        name: String,
        /// Length seen first.
        first: u64,
        /// Conflicting length.
        second: u64,
    },
    /// A reference list names the same sequence twice.
    #[error("sequence {0} appears more than once in the reference list")]
    DuplicateSequence(String),
    /// Legacy readsets must carry exactly one raw header section.
    #[error("expected exactly one header section, found {0}")]
    HeaderSectionCount(usize),
}

/// Sort order declared in `@HD SO`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// `unknown`
    #[default]
    Unknown,
    /// `unsorted`
    Unsorted,
    /// `queryname`
    QueryName,
    /// `coordinate`
    Coordinate,
}

impl SortOrder {
    /// Text form used in `@HD`.
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Unknown => "unknown",
            SortOrder::Unsorted => "unsorted",
            SortOrder::QueryName => "queryname",
            SortOrder::Coordinate => "coordinate",
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(SortOrder::Unknown),
            "unsorted" => Ok(SortOrder::Unsorted),
            "queryname" => Ok(SortOrder::QueryName),
            "coordinate" => Ok(SortOrder::Coordinate),
            other => Err(format!("unknown sort order {other:?}")),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `@SQ` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceRecord {
    /// `SN`
    pub name: String,
    /// `LN`
    pub length: u64,
    /// Remaining tags in their original order.
    pub other: Vec<(String, String)>,
}

impl SequenceRecord {
    /// Sequence with only a name and length.
    pub fn new(name: impl Into<String>, length: u64) -> Self {
        Self {
            name: name.into(),
            length,
            other: Vec::new(),
        }
    }
}

/// One `@RG` line.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReadGroupRecord {
    /// `ID`
    pub id: String,
    /// `CN`
    pub sequencing_center: Option<String>,
    /// `DS`
    pub description: Option<String>,
    /// `LB`
    pub library: Option<String>,
    /// `PI`
    pub predicted_insert_size: Option<i32>,
    /// `PL`
    pub platform: Option<String>,
    /// `PU`
    pub platform_unit: Option<String>,
    /// `SM`
    pub sample: Option<String>,
    /// Remaining tags in their original order.
    pub other: Vec<(String, String)>,
    /// Service-assigned id of the read group this record was built from.
    /// Reads reference groups by this id; it is not written to the header.
    pub source_id: Option<String>,
}

impl ReadGroupRecord {
    /// Read group with only an id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Attach the service-assigned id.
    pub fn with_source_id(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    /// Tags in output order, `ID` first.
    pub fn tags(&self) -> Vec<(&str, String)> {
        let mut tags = vec![("ID", self.id.clone())];
        let optional = [
            ("CN", self.sequencing_center.clone()),
            ("DS", self.description.clone()),
            ("LB", self.library.clone()),
            ("PI", self.predicted_insert_size.map(|pi| pi.to_string())),
            ("PL", self.platform.clone()),
            ("PU", self.platform_unit.clone()),
            ("SM", self.sample.clone()),
        ];
        tags.extend(optional.into_iter().filter_map(|(tag, value)| value.map(|v| (tag, v))));
        tags.extend(self.other.iter().map(|(tag, value)| (tag.as_str(), value.clone())));
        tags
    }
}

/// One `@PG` line.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProgramRecord {
    /// `ID`
    pub id: String,
    /// `PN`
    pub name: Option<String>,
    /// `VN`
    pub version: Option<String>,
    /// `PP`
    pub previous_id: Option<String>,
    /// `CL`
    pub command_line: Option<String>,
    /// Remaining tags in their original order.
    pub other: Vec<(String, String)>,
}

impl ProgramRecord {
    /// Program with only an id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Tags in output order, `ID` first.
    pub fn tags(&self) -> Vec<(&str, String)> {
        let mut tags = vec![("ID", self.id.clone())];
        let optional = [
            ("PN", self.name.clone()),
            ("VN", self.version.clone()),
            ("PP", self.previous_id.clone()),
            ("CL", self.command_line.clone()),
        ];
        tags.extend(optional.into_iter().filter_map(|(tag, value)| value.map(|v| (tag, v))));
        tags.extend(self.other.iter().map(|(tag, value)| (tag.as_str(), value.clone())));
        tags
    }
}

/// Header shared by every record of one query session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    /// `@HD VN`
    pub version: String,
    /// `@HD SO`
    pub sort_order: SortOrder,
    /// Sequence dictionary in insertion order.
    pub sequences: Vec<SequenceRecord>,
    /// Read groups.
    pub read_groups: Vec<ReadGroupRecord>,
    /// Programs.
    pub programs: Vec<ProgramRecord>,
    /// `@CO` lines.
    pub comments: Vec<String>,
}

impl Default for FileHeader {
    fn default() -> Self {
        Self::new(SortOrder::Unknown)
    }
}

impl FileHeader {
    /// Empty header with the given sort order.
    pub fn new(sort_order: SortOrder) -> Self {
        Self {
            version: SAM_VERSION.to_string(),
            sort_order,
            sequences: Vec::new(),
            read_groups: Vec::new(),
            programs: Vec::new(),
            comments: Vec::new(),
        }
    }

    /// Index of a sequence in the dictionary.
    pub fn sequence_index(&self, name: &str) -> Option<usize> {
        self.sequences.iter().position(|sequence| sequence.name == name)
    }

    /// Sequence by name.
    pub fn sequence(&self, name: &str) -> Option<&SequenceRecord> {
        self.sequences.iter().find(|sequence| sequence.name == name)
    }

    /// Read group by header id.
    pub fn read_group(&self, id: &str) -> Option<&ReadGroupRecord> {
        self.read_groups.iter().find(|group| group.id == id)
    }

    /// Read group built from the given service-assigned id.
    pub fn read_group_for_source(&self, source_id: &str) -> Option<&ReadGroupRecord> {
        self.read_groups
            .iter()
            .find(|group| group.source_id.as_deref() == Some(source_id))
    }

    /// Program by id.
    pub fn program(&self, id: &str) -> Option<&ProgramRecord> {
        self.programs.iter().find(|program| program.id == id)
    }

    /// Render as SAM header text, one line per record, `\n` terminated.
    pub fn to_sam_text(&self) -> String {
        let mut out = format!("@HD\tVN:{}\tSO:{}\n", self.version, self.sort_order);

        for sequence in &self.sequences {
            out.push_str(&format!("@SQ\tSN:{}\tLN:{}", sequence.name, sequence.length));
            push_tags(&mut out, sequence.other.iter().map(|(t, v)| (t.as_str(), v.as_str())));
        }
        for group in &self.read_groups {
            out.push_str("@RG");
            let tags = group.tags();
            push_tags(&mut out, tags.iter().map(|(t, v)| (*t, v.as_str())));
        }
        for program in &self.programs {
            out.push_str("@PG");
            let tags = program.tags();
            push_tags(&mut out, tags.iter().map(|(t, v)| (*t, v.as_str())));
        }
        for comment in &self.comments {
            out.push_str("@CO\t");
            out.push_str(comment);
            out.push('\n');
        }
        out
    }
}

fn push_tags<'a>(out: &mut String, tags: impl Iterator<Item = (&'a str, &'a str)>) {
    for (tag, value) in tags {
        out.push('\t');
        out.push_str(tag);
        out.push(':');
        out.push_str(value);
    }
    out.push('\n');
}
