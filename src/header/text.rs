use std::collections::HashSet;

use super::{FileHeader, HeaderError, ProgramRecord, ReadGroupRecord, SequenceRecord, SortOrder};

/// Parse SAM header text with strict validation.
///
/// Every non-empty line must be a `@HD`, `@SQ`, `@RG`, `@PG` or `@CO` record;
/// fields are tab separated `TG:value` pairs. Both `\n` and `\r\n` line
/// endings are accepted. A header without `@HD` gets an unknown sort order.
pub fn parse_header_text(text: &str) -> Result<FileHeader, HeaderError> {
    let mut header = FileHeader::new(SortOrder::Unknown);
    let mut seen_hd = false;
    let mut group_ids = HashSet::new();
    let mut program_ids = HashSet::new();

    for (idx, raw) in text.split('\n').enumerate() {
        let line_no = idx + 1;
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        if line.is_empty() {
            continue;
        }
        let error = |reason: String| HeaderError::Parse {
            line: line_no,
            reason,
        };

        let (record_type, rest) = match line.split_once('\t') {
            Some((record_type, rest)) => (record_type, rest),
            None => (line, ""),
        };

        if record_type == "@CO" {
            header.comments.push(rest.to_string());
            continue;
        }

        let fields = parse_fields(rest).map_err(&error)?;
        match record_type {
            "@HD" => {
                if seen_hd {
                    return Err(error("more than one @HD line".into()));
                }
                seen_hd = true;
                header.version = fields.required("VN").map_err(&error)?.to_string();
                if let Some(order) = fields.get("SO") {
                    header.sort_order = order.parse().map_err(&error)?;
                }
            }
            "@SQ" => {
                let name = fields.required("SN").map_err(&error)?;
                let length = fields.required("LN").map_err(&error)?;
                let length: u64 = length
                    .parse()
                    .ok()
                    .filter(|len| *len > 0)
                    .ok_or_else(|| error(format!("invalid LN {length:?} for sequence {name}")))?;
                if header.sequence(name).is_some() {
                    return Err(error(format!("duplicate sequence {name}")));
                }
                header.sequences.push(SequenceRecord {
                    name: name.to_string(),
                    length,
                    other: fields.others(&["SN", "LN"]),
                });
            }
            "@RG" => {
                let id = fields.required("ID").map_err(&error)?;
                if !group_ids.insert(id.to_string()) {
                    return Err(error(format!("duplicate read group {id}")));
                }
                let predicted_insert_size = fields
                    .get("PI")
                    .map(|pi| {
                        pi.parse()
                            .map_err(|_| error(format!("invalid PI {pi:?} for read group {id}")))
                    })
                    .transpose()?;
                header.read_groups.push(ReadGroupRecord {
                    id: id.to_string(),
                    sequencing_center: fields.owned("CN"),
                    description: fields.owned("DS"),
                    library: fields.owned("LB"),
                    predicted_insert_size,
                    platform: fields.owned("PL"),
                    platform_unit: fields.owned("PU"),
                    sample: fields.owned("SM"),
                    other: fields.others(&["ID", "CN", "DS", "LB", "PI", "PL", "PU", "SM"]),
                    source_id: None,
                });
            }
            "@PG" => {
                let id = fields.required("ID").map_err(&error)?;
                if !program_ids.insert(id.to_string()) {
                    return Err(error(format!("duplicate program {id}")));
                }
                header.programs.push(ProgramRecord {
                    id: id.to_string(),
                    name: fields.owned("PN"),
                    version: fields.owned("VN"),
                    previous_id: fields.owned("PP"),
                    command_line: fields.owned("CL"),
                    other: fields.others(&["ID", "PN", "VN", "PP", "CL"]),
                });
            }
            other => return Err(error(format!("unknown record type {other:?}"))),
        }
    }

    Ok(header)
}

/// Tag fields of one header line in their original order.
struct Fields<'a>(Vec<(&'a str, &'a str)>);

impl<'a> Fields<'a> {
    fn get(&self, tag: &str) -> Option<&'a str> {
        self.0.iter().find(|(t, _)| *t == tag).map(|(_, value)| *value)
    }

    fn owned(&self, tag: &str) -> Option<String> {
        self.get(tag).map(str::to_string)
    }

    fn required(&self, tag: &str) -> Result<&'a str, String> {
        self.get(tag)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| format!("missing required tag {tag}"))
    }

    fn others(&self, known: &[&str]) -> Vec<(String, String)> {
        self.0
            .iter()
            .filter(|(tag, _)| !known.contains(tag))
            .map(|(tag, value)| (tag.to_string(), value.to_string()))
            .collect()
    }
}

fn parse_fields(rest: &str) -> Result<Fields<'_>, String> {
    let mut fields: Vec<(&str, &str)> = Vec::new();
    if rest.is_empty() {
        return Ok(Fields(fields));
    }
    for field in rest.split('\t') {
        let (tag, value) = field
            .split_once(':')
            .filter(|(tag, _)| tag.len() == 2 && tag.bytes().all(|b| b.is_ascii_alphanumeric()))
            .ok_or_else(|| format!("malformed field {field:?}"))?;
        if fields.iter().any(|(seen, _)| *seen == tag) {
            return Err(format!("duplicate tag {tag}"));
        }
        fields.push((tag, value));
    }
    Ok(Fields(fields))
}
