use tracing::{debug, info};

use crate::model::{ReadGroup, ReadGroupSet, Reference};

use super::{
    merge_headers, parse_header_text, FileHeader, HeaderError, ProgramRecord, ReadGroupRecord,
    SequenceRecord, SortOrder,
};

/// Prefix of read group set info keys that carry raw SAM header lines.
pub const SAM_INFO_PREFIX: &str = "SAM:";

/// Builds the file header of a query session from readset metadata.
#[derive(Debug, Clone)]
pub struct HeaderBuilder {
    info_prefix: String,
}

impl Default for HeaderBuilder {
    fn default() -> Self {
        Self {
            info_prefix: SAM_INFO_PREFIX.to_string(),
        }
    }
}

impl HeaderBuilder {
    /// Builder using the standard `SAM:` info prefix.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different info key prefix for the fallback path.
    pub fn with_info_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.info_prefix = prefix.into();
        self
    }

    /// Build a coordinate-sorted header from a read group set and its
    /// references.
    ///
    /// When `references` is empty the sequence dictionary is recovered from
    /// raw header lines stored in the read group set's info map. Recovered
    /// text is parsed strictly and merged with the primary header; a parse
    /// failure aborts the build.
    pub fn build(
        &self,
        read_group_set: &ReadGroupSet,
        references: &[Reference],
    ) -> Result<FileHeader, HeaderError> {
        let mut primary = FileHeader::new(SortOrder::Coordinate);

        for reference in references {
            let (Some(name), Some(length)) = (reference.name.as_deref(), reference.length) else {
                continue;
            };
            if name.is_empty() || length <= 0 {
                debug!(id = ?reference.id, "skipping reference without name or length");
                continue;
            }
            if primary.sequence(name).is_some() {
                return Err(HeaderError::DuplicateSequence(name.to_string()));
            }
            primary.sequences.push(sequence_record(reference, name, length as u64));
        }

        for group in &read_group_set.read_groups {
            if let Some(record) = read_group_record(group) {
                primary.read_groups.push(record);
            }
            primary
                .programs
                .extend(group.programs.iter().filter_map(|program| {
                    let id = program.id.as_deref().filter(|id| !id.is_empty())?;
                    Some(ProgramRecord {
                        id: id.to_string(),
                        name: program.name.clone(),
                        version: program.version.clone(),
                        previous_id: program.prev_program_id.clone(),
                        command_line: program.command_line.clone(),
                        other: Vec::new(),
                    })
                }));
        }

        let mut headers = vec![primary];
        if references.is_empty() {
            if let Some(recovered) = self.recover_header_text(read_group_set) {
                info!(
                    read_group_set = ?read_group_set.id,
                    "recovering header lines from read group set info"
                );
                headers.push(parse_header_text(&recovered)?);
            }
        }

        merge_headers(&headers)
    }

    /// Header of an older readset that stores its raw header text in
    /// header sections. Exactly one section is required.
    pub fn from_header_sections(
        &self,
        read_group_set: &ReadGroupSet,
    ) -> Result<FileHeader, HeaderError> {
        match read_group_set.file_data.as_slice() {
            [section] => parse_header_text(&section.text),
            sections => Err(HeaderError::HeaderSectionCount(sections.len())),
        }
    }

    /// Reassemble `<headerName>\t<value>` lines from prefixed info keys.
    /// `@HD` lines come first so the recovered text is a valid header.
    fn recover_header_text(&self, read_group_set: &ReadGroupSet) -> Option<String> {
        let mut hd_lines = String::new();
        let mut lines = String::new();

        for (key, values) in &read_group_set.info {
            let Some(header_name) = key.strip_prefix(self.info_prefix.as_str()) else {
                continue;
            };
            let target = if header_name.trim_start_matches('@') == "HD" {
                &mut hd_lines
            } else {
                &mut lines
            };
            for value in values {
                if !header_name.starts_with('@') {
                    target.push('@');
                }
                target.push_str(header_name);
                target.push('\t');
                target.push_str(value);
                target.push_str("\r\n");
            }
        }

        if hd_lines.is_empty() && lines.is_empty() {
            return None;
        }
        hd_lines.push_str(&lines);
        Some(hd_lines)
    }
}

fn sequence_record(reference: &Reference, name: &str, length: u64) -> SequenceRecord {
    let mut record = SequenceRecord::new(name, length);
    if let Some(md5) = reference.md5checksum.as_ref().filter(|md5| !md5.is_empty()) {
        record.other.push(("M5".to_string(), md5.clone()));
    }
    if let Some(uri) = reference.source_uri.as_ref().filter(|uri| !uri.is_empty()) {
        record.other.push(("UR".to_string(), uri.clone()));
    }
    record
}

/// Read group record for a group carrying both an id and a name. The
/// record id is the imported name, or the service id when the name is empty.
fn read_group_record(group: &ReadGroup) -> Option<ReadGroupRecord> {
    let (Some(source_id), Some(name)) = (group.id.as_deref(), group.name.as_deref()) else {
        return None;
    };
    let record_id = if name.is_empty() { source_id } else { name };
    if record_id.is_empty() {
        return None;
    }

    let mut record = ReadGroupRecord::new(record_id).with_source_id(source_id);
    record.description = group.description.clone();
    record.predicted_insert_size = group.predicted_insert_size;
    record.sample = group.sample_id.clone();
    if let Some(experiment) = &group.experiment {
        record.library = experiment.library_id.clone();
        record.sequencing_center = experiment.sequencing_center.clone();
        record.platform = experiment.instrument_model.clone();
        record.platform_unit = experiment.platform_unit.clone();
    }
    Some(record)
}
