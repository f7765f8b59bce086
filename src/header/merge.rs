use std::collections::HashMap;

use tracing::debug;

use super::{FileHeader, HeaderError, ProgramRecord, ReadGroupRecord, SortOrder};

/// Merge headers into one coordinate-sorted header.
///
/// Sequence dictionaries are unioned in first-seen order; the same name with
/// a different length is an error. Read groups and programs are unioned by
/// id: identical duplicates collapse, a differing record with a taken id is
/// renamed with a `.1`, `.2`, ... suffix and `PP` links of the same header are
/// rewritten to follow the rename. Comments are concatenated.
pub fn merge_headers(headers: &[FileHeader]) -> Result<FileHeader, HeaderError> {
    let mut merged = FileHeader::new(SortOrder::Coordinate);

    for header in headers {
        for sequence in &header.sequences {
            match merged.sequence(&sequence.name) {
                Some(existing) if existing.length != sequence.length => {
                    return Err(HeaderError::ConflictingSequence {
                        name: sequence.name.clone(),
                        first: existing.length,
                        second: sequence.length,
                    });
                }
                Some(_) => {}
                None => merged.sequences.push(sequence.clone()),
            }
        }

        for group in &header.read_groups {
            merge_read_group(&mut merged.read_groups, group);
        }

        let mut renamed: HashMap<&str, String> = HashMap::new();
        let first_new = merged.programs.len();
        for program in &header.programs {
            if let Some(id) = merge_program(&mut merged.programs, program) {
                renamed.insert(program.id.as_str(), id);
            }
        }
        for program in &mut merged.programs[first_new..] {
            let Some(previous) = program.previous_id.as_deref() else {
                continue;
            };
            if let Some(id) = renamed.get(previous) {
                program.previous_id = Some(id.clone());
            }
        }

        merged.comments.extend(header.comments.iter().cloned());
    }

    Ok(merged)
}

fn merge_read_group(groups: &mut Vec<ReadGroupRecord>, group: &ReadGroupRecord) {
    match groups.iter().find(|existing| existing.id == group.id) {
        Some(existing) if existing.tags() == group.tags() => {}
        Some(_) => {
            let id = unique_id(&group.id, |candidate| groups.iter().any(|g| g.id == candidate));
            debug!(from = %group.id, to = %id, "renaming colliding read group");
            let mut renamed = group.clone();
            renamed.id = id;
            groups.push(renamed);
        }
        None => groups.push(group.clone()),
    }
}

/// Add a program, returning its new id when it had to be renamed.
fn merge_program(programs: &mut Vec<ProgramRecord>, program: &ProgramRecord) -> Option<String> {
    match programs.iter().find(|existing| existing.id == program.id) {
        Some(existing) if existing.tags() == program.tags() => None,
        Some(_) => {
            let id = unique_id(&program.id, |candidate| {
                programs.iter().any(|p| p.id == candidate)
            });
            debug!(from = %program.id, to = %id, "renaming colliding program");
            let mut renamed = program.clone();
            renamed.id = id.clone();
            programs.push(renamed);
            Some(id)
        }
        None => {
            programs.push(program.clone());
            None
        }
    }
}

fn unique_id(base: &str, taken: impl Fn(&str) -> bool) -> String {
    (1..)
        .map(|i| format!("{base}.{i}"))
        .find(|candidate| !taken(candidate.as_str()))
        .unwrap_or_else(|| base.to_string())
}
