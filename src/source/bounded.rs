use tracing::info;

use crate::model::ReadModel;

use super::SourceError;

/// Ends a coordinate-sorted read iterator at the first placed read whose
/// 0-based start lies past `end`. An `end` of zero or less means unbounded.
///
/// Services return every read overlapping a range and keep paging past it;
/// cutting the pull early avoids fetching pages that cannot match.
pub struct EndBounded<I> {
    inner: I,
    end: i64,
    done: bool,
}

impl<I> EndBounded<I> {
    /// Wrap `inner`, stopping after `end`.
    pub fn new(inner: I, end: i64) -> Self {
        Self {
            inner,
            end,
            done: false,
        }
    }
}

impl<I> std::fmt::Debug for EndBounded<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndBounded")
            .field("end", &self.end)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl<I, R> Iterator for EndBounded<I>
where
    I: Iterator<Item = Result<R, SourceError>>,
    R: ReadModel,
{
    type Item = Result<R, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.inner.next()?;
        if self.end > 0 {
            if let Ok(read) = &item {
                let start = read
                    .alignment_position()
                    .and_then(|position| position.position);
                if start.is_some_and(|start| start > self.end) {
                    info!(end = self.end, "reached end of requested range");
                    self.done = true;
                    return None;
                }
            }
        }
        Some(item)
    }
}
