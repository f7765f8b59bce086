use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info};

use crate::model::{ReadsetMetadata, RestRead};

use super::{DatasetQuery, ReadIter, ReadSource, SourceError};

/// Read source over local files: readset metadata as one JSON document and
/// reads as JSON lines in the REST encoding, coordinate sorted with unmapped
/// reads last.
///
/// Every query re-reads the reads file lazily, one line per pulled read.
#[derive(Debug)]
pub struct JsonSource {
    read_group_set_id: String,
    metadata: ReadsetMetadata,
    reads_path: PathBuf,
    closed: AtomicBool,
}

impl JsonSource {
    /// Load metadata from `metadata_path` and serve reads from `reads_path`.
    ///
    /// The readset id is the read group set's id, or `local` when the
    /// metadata carries none.
    pub fn open(
        metadata_path: impl AsRef<Path>,
        reads_path: impl AsRef<Path>,
    ) -> Result<Self, SourceError> {
        let metadata_path = metadata_path.as_ref();
        let file = File::open(metadata_path).map_err(|source| SourceError::Io {
            path: metadata_path.to_path_buf(),
            source,
        })?;
        let metadata: ReadsetMetadata = serde_json::from_reader(BufReader::new(file))
            .map_err(|source| SourceError::Json {
                path: metadata_path.to_path_buf(),
                line: 0,
                source,
            })?;
        let read_group_set_id = metadata
            .read_group_set
            .id
            .clone()
            .unwrap_or_else(|| "local".to_string());
        info!(
            read_group_set = %read_group_set_id,
            references = metadata.references.len(),
            "loaded readset metadata"
        );

        Ok(Self {
            read_group_set_id,
            metadata,
            reads_path: reads_path.as_ref().to_path_buf(),
            closed: AtomicBool::new(false),
        })
    }

    /// Id queries must name.
    pub fn read_group_set_id(&self) -> &str {
        &self.read_group_set_id
    }

    fn check_readset(&self, read_group_set_id: &str) -> Result<(), SourceError> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(SourceError::Closed);
        }
        if read_group_set_id != self.read_group_set_id {
            return Err(SourceError::NotFound(read_group_set_id.to_string()));
        }
        Ok(())
    }
}

impl ReadSource for JsonSource {
    type Read = RestRead;

    fn fetch_reads(&self, query: &DatasetQuery) -> Result<ReadIter<RestRead>, SourceError> {
        self.check_readset(&query.read_group_set_id)?;
        let path = self.reads_path.clone();
        let file = File::open(&path).map_err(|source| SourceError::Io {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), reference = %query.reference, "reading JSON lines");

        let query = query.clone();
        let reads = BufReader::new(file)
            .lines()
            .enumerate()
            .filter_map(move |(index, line)| {
                let line = match line {
                    Ok(line) => line,
                    Err(source) => {
                        return Some(Err(SourceError::Io {
                            path: path.clone(),
                            source,
                        }))
                    }
                };
                if line.trim().is_empty() {
                    return None;
                }
                match serde_json::from_str::<RestRead>(&line) {
                    Ok(read) => query.selects(&read).then_some(Ok(read)),
                    Err(source) => Some(Err(SourceError::Json {
                        path: path.clone(),
                        line: index + 1,
                        source,
                    })),
                }
            });
        Ok(Box::new(reads))
    }

    fn fetch_metadata(&self, read_group_set_id: &str) -> Result<ReadsetMetadata, SourceError> {
        self.check_readset(read_group_set_id)?;
        Ok(self.metadata.clone())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Relaxed);
    }
}
