use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::model::AlignmentRecord;
use crate::source::{DatasetQuery, ReferenceFilter};

/// How a record has to relate to an interval to be part of the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PositionConstraint {
    /// Record span intersects the interval.
    #[default]
    Overlapping,
    /// Record span lies inside the interval.
    Contained,
    /// Record starts exactly at the interval start.
    StartAt,
}

/// Errors raised while parsing a region string.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegionError {
    /// Region text is empty.
    #[error("empty region")]
    Empty,
    /// Coordinates are not of the form `start-end`, `start-` or `start`.
    #[error("invalid coordinates {0:?} in region")]
    InvalidCoordinates(String),
    /// End lies before start.
    #[error("region end {end} is before start {start}")]
    Reversed {
        /// 1-based start.
        start: i64,
        /// 1-based end.
        end: i64,
    },
}

/// One region query. Coordinates are 1-based and inclusive; an end of zero
/// means unbounded. An empty sequence selects the whole readset and `*`
/// selects unmapped reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryInterval {
    /// Reference name, empty for the whole readset.
    pub sequence: String,
    /// 1-based start, zero for the sequence start.
    pub start: i64,
    /// 1-based inclusive end, zero for unbounded.
    pub end: i64,
    /// Containment rule.
    pub constraint: PositionConstraint,
}

impl QueryInterval {
    /// Interval over `sequence` with the given rule.
    pub fn new(
        sequence: impl Into<String>,
        start: i64,
        end: i64,
        constraint: PositionConstraint,
    ) -> Self {
        Self {
            sequence: sequence.into(),
            start,
            end,
            constraint,
        }
    }

    /// Overlap query.
    pub fn overlapping(sequence: impl Into<String>, start: i64, end: i64) -> Self {
        Self::new(sequence, start, end, PositionConstraint::Overlapping)
    }

    /// Containment query.
    pub fn contained(sequence: impl Into<String>, start: i64, end: i64) -> Self {
        Self::new(sequence, start, end, PositionConstraint::Contained)
    }

    /// Records starting exactly at `start`.
    pub fn start_at(sequence: impl Into<String>, start: i64) -> Self {
        Self::new(sequence, start, 0, PositionConstraint::StartAt)
    }

    /// Every read of the readset.
    pub fn whole_readset() -> Self {
        Self::overlapping("", 0, 0)
    }

    /// Unmapped reads.
    pub fn unmapped() -> Self {
        Self::overlapping("*", 0, 0)
    }

    /// Same interval with a different rule.
    pub fn with_constraint(mut self, constraint: PositionConstraint) -> Self {
        self.constraint = constraint;
        self
    }

    /// Whether the interval selects the whole readset.
    pub fn is_whole_readset(&self) -> bool {
        self.sequence.is_empty()
    }

    /// End used by the predicates, unbounded as `i64::MAX`.
    fn effective_end(&self) -> i64 {
        if self.end == 0 {
            i64::MAX
        } else {
            self.end
        }
    }

    /// Whether `record` satisfies the interval's rule. Unmapped records span
    /// `(0, 0)`.
    pub fn matches(&self, record: &AlignmentRecord) -> bool {
        let (record_start, record_end) = match (record.alignment_start, record.alignment_end()) {
            (Some(start), Some(end)) if !record.is_unmapped() => (start, end),
            _ => (0, 0),
        };
        let end = self.effective_end();
        match self.constraint {
            PositionConstraint::Overlapping => {
                overlaps(self.start, end, record_start, record_end)
            }
            PositionConstraint::Contained => encloses(self.start, end, record_start, record_end),
            PositionConstraint::StartAt => self.start == record_start,
        }
    }

    /// Remote query for this interval. Coordinates move to 0-based: the
    /// start is decremented and the inclusive end becomes an exclusive end.
    /// A start-at query ends at its own position since no later read can
    /// start there.
    pub fn to_dataset_query(&self, read_group_set_id: &str) -> DatasetQuery {
        let reference = ReferenceFilter::from_sequence(&self.sequence);
        let query = DatasetQuery::new(read_group_set_id, reference);
        if self.is_whole_readset() || self.sequence == "*" {
            return query;
        }
        let start = (self.start > 0).then(|| self.start - 1);
        let end = match self.constraint {
            PositionConstraint::StartAt if self.start > 0 => Some(self.start),
            _ => (self.end > 0).then_some(self.end),
        };
        query.with_range(start, end)
    }
}

/// Closed-interval overlap test.
fn overlaps(start: i64, end: i64, start2: i64, end2: i64) -> bool {
    (start2 >= start && start2 <= end)
        || (end2 >= start && end2 <= end)
        || encloses(start2, end2, start, end)
}

/// Whether `[inner_start, inner_end]` lies within `[outer_start, outer_end]`.
fn encloses(outer_start: i64, outer_end: i64, inner_start: i64, inner_end: i64) -> bool {
    inner_start >= outer_start && inner_end <= outer_end
}

impl fmt::Display for QueryInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sequence = if self.sequence.is_empty() {
            "<all>"
        } else {
            self.sequence.as_str()
        };
        match (self.start, self.end) {
            (0, 0) => write!(f, "{sequence}"),
            (start, 0) => write!(f, "{sequence}:{start}-"),
            (start, end) => write!(f, "{sequence}:{start}-{end}"),
        }
    }
}

/// Parse `name`, `name:start`, `name:start-` or `name:start-end` into an
/// overlap interval. The last colon separates coordinates so contig names
/// may themselves contain colons.
impl FromStr for QueryInterval {
    type Err = RegionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(RegionError::Empty);
        }
        let Some((sequence, coords)) = s.rsplit_once(':') else {
            return Ok(Self::overlapping(s, 0, 0));
        };
        let invalid = || RegionError::InvalidCoordinates(coords.to_string());
        let parse = |text: &str| -> Result<i64, RegionError> {
            text.replace(',', "")
                .parse::<i64>()
                .ok()
                .filter(|value| *value > 0)
                .ok_or_else(invalid)
        };

        let (start, end) = match coords.split_once('-') {
            Some((start, "")) => (parse(start)?, 0),
            Some((start, end)) => (parse(start)?, parse(end)?),
            None => (parse(coords)?, 0),
        };
        if end != 0 && end < start {
            return Err(RegionError::Reversed { start, end });
        }
        Ok(Self::overlapping(sequence, start, end))
    }
}
