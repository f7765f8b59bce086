//! Buffering of unmapped mates so they can be re-injected next to their
//! mapped partner.
//!
//! The remote service delivers unmapped reads at the end of the stream, far
//! away from the mapped read of the same fragment. A full scan of unmapped
//! reads is buffered here, keyed by the reference the mapped mate sits on and
//! the fragment name, and drained as the main stream emits mapped reads.

use std::collections::HashMap;

use tracing::warn;

use crate::model::ReadModel;

/// Default cap on the number of buffered reads.
pub const DEFAULT_MAX_UNMAPPED_MATES: usize = 100_000_000;

#[derive(Debug)]
struct MateEntry<R> {
    reads: Vec<R>,
    read_numbers: Vec<Option<i32>>,
    sorted: bool,
    injected: bool,
}

impl<R> Default for MateEntry<R> {
    fn default() -> Self {
        Self {
            reads: Vec::new(),
            read_numbers: Vec::new(),
            sorted: true,
            injected: false,
        }
    }
}

/// Unmapped reads keyed by (mapped mate's reference, fragment name).
#[derive(Debug)]
pub struct UnmappedMateIndex<R> {
    entries: HashMap<(String, String), MateEntry<R>>,
    count: usize,
    refused: usize,
    max_reads: usize,
}

impl<R: ReadModel> Default for UnmappedMateIndex<R> {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_UNMAPPED_MATES)
    }
}

impl<R: ReadModel> UnmappedMateIndex<R> {
    /// Empty index holding at most `max_reads` reads.
    pub fn new(max_reads: usize) -> Self {
        Self {
            entries: HashMap::new(),
            count: 0,
            refused: 0,
            max_reads,
        }
    }

    /// Whether `read` is an unmapped mate of a mapped read: paired, without
    /// an alignment position, with a mate position naming a reference and a
    /// non-zero coordinate, and with a fragment name.
    pub fn is_bufferable(read: &R) -> bool {
        read.has_mates()
            && read.is_unmapped()
            && read.fragment_name().is_some()
            && read.next_mate_position().is_some_and(|mate| {
                mate.reference_name.is_some() && mate.position.is_some_and(|pos| pos != 0)
            })
    }

    /// Whether `read` is a mapped read that may have buffered unmapped mates:
    /// paired, its own mate position absent or zero, placed on a named
    /// reference, and with a fragment name.
    pub fn requests_mates(read: &R) -> bool {
        read.has_mates()
            && read
                .next_mate_position()
                .and_then(|mate| mate.position)
                .map_or(true, |pos| pos == 0)
            && read
                .alignment_position()
                .is_some_and(|position| position.reference_name.is_some())
            && read.fragment_name().is_some()
    }

    fn buffer_key(read: &R) -> Option<(String, String)> {
        let reference = read.next_mate_position()?.reference_name?;
        Some((reference.to_string(), read.fragment_name()?.to_string()))
    }

    fn lookup_key(read: &R) -> Option<(&str, &str)> {
        let reference = read.alignment_position()?.reference_name?;
        Some((reference, read.fragment_name()?))
    }

    /// Try to buffer `read`. Returns whether it was buffered; reads that are
    /// not unmapped mates, or arrive once the cap is reached, are refused.
    pub fn observe(&mut self, read: R) -> bool {
        if !Self::is_bufferable(&read) {
            return false;
        }
        let Some(key) = Self::buffer_key(&read) else {
            return false;
        };
        if self.count >= self.max_reads {
            if self.refused == 0 {
                warn!(
                    max_reads = self.max_reads,
                    "reached the limit of in-memory unmapped mates; further mates will not be injected"
                );
            }
            self.refused += 1;
            return false;
        }

        let entry = self.entries.entry(key).or_default();
        entry.read_numbers.push(read.read_number());
        if let Some(last) = entry.reads.last() {
            entry.sorted &= last.read_number() <= read.read_number();
        }
        entry.reads.push(read);
        self.count += 1;
        true
    }

    /// Buffered mates of a mapped read, sorted by read number. `None` when
    /// the read does not qualify or nothing is buffered for it.
    pub fn mates_for(&mut self, read: &R) -> Option<&[R]> {
        if !Self::requests_mates(read) {
            return None;
        }
        let (reference, fragment) = Self::lookup_key(read)?;
        let entry = self
            .entries
            .get_mut(&(reference.to_string(), fragment.to_string()))?;
        if entry.reads.is_empty() {
            return None;
        }
        if !entry.sorted {
            entry.reads.sort_by_key(|mate| mate.read_number());
            entry.sorted = true;
        }
        Some(entry.reads.as_slice())
    }

    /// Remove and return the sorted mates of a mapped read. The fragment
    /// stays known to [`contains`](Self::contains) so the same unmapped reads
    /// met again in the main stream can be recognised as already injected.
    pub fn take_mates(&mut self, read: &R) -> Option<Vec<R>> {
        self.mates_for(read)?;
        let (reference, fragment) = Self::lookup_key(read)?;
        let entry = self
            .entries
            .get_mut(&(reference.to_string(), fragment.to_string()))?;
        entry.injected = true;
        Some(std::mem::take(&mut entry.reads))
    }

    /// Drop the buffered copy of an unmapped read met in the main stream
    /// before its mapped mate. Returns whether a copy was still buffered.
    pub fn claim(&mut self, read: &R) -> bool {
        let Some(entry) = Self::buffer_key(read).and_then(|key| self.entries.get_mut(&key)) else {
            return false;
        };
        let number = read.read_number();
        match entry.reads.iter().position(|mate| mate.read_number() == number) {
            Some(at) => {
                entry.reads.remove(at);
                true
            }
            None => false,
        }
    }

    /// Whether this unmapped read was buffered.
    pub fn contains(&self, read: &R) -> bool {
        let Some(key) = Self::buffer_key(read) else {
            return false;
        };
        self.entries
            .get(&key)
            .is_some_and(|entry| entry.read_numbers.contains(&read.read_number()))
    }

    /// Whether the mates of this unmapped read's fragment were already injected.
    pub fn was_injected(&self, read: &R) -> bool {
        Self::buffer_key(read)
            .and_then(|key| self.entries.get(&key))
            .is_some_and(|entry| entry.injected)
    }

    /// Number of reads buffered since creation.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Number of reads refused because the cap was reached.
    pub fn refused(&self) -> usize {
        self.refused
    }

    /// Whether the cap has been reached.
    pub fn is_full(&self) -> bool {
        self.count >= self.max_reads
    }

    /// Drop all buffered reads.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CigarUnit, RestRead};

    fn unmapped_mate(fragment: &str, read_number: i32) -> RestRead {
        RestRead::new(fragment)
            .with_read_number(read_number, 3)
            .with_mate("chr1", 1_000, false)
    }

    fn mapped(fragment: &str) -> RestRead {
        RestRead::new(fragment).with_read_number(0, 3).with_alignment(
            "chr1",
            1_000,
            false,
            vec![CigarUnit::new("ALIGNMENT_MATCH", 50)],
        )
    }

    #[test]
    fn returns_mates_sorted_by_read_number() {
        let mut index = UnmappedMateIndex::default();
        for number in [2, 0, 1] {
            assert!(index.observe(unmapped_mate("F1", number)));
        }
        assert_eq!(index.count(), 3);

        let numbers: Vec<Option<i32>> = index
            .mates_for(&mapped("F1"))
            .expect("mates buffered")
            .iter()
            .map(|mate| mate.read_number)
            .collect();
        assert_eq!(numbers, vec![Some(0), Some(1), Some(2)]);
    }

    #[test]
    fn refuses_reads_that_are_not_unmapped_mates() {
        let mut index = UnmappedMateIndex::default();
        assert!(!index.observe(mapped("F1")));
        assert!(!index.observe(RestRead::new("single").with_read_number(0, 1)));
        assert!(!index.observe(RestRead::new("F2").with_read_number(1, 2).with_mate("chr1", 0, false)));
        let mut nameless = unmapped_mate("F3", 1);
        nameless.fragment_name = None;
        assert!(!index.observe(nameless));
        assert_eq!(index.count(), 0);
    }

    #[test]
    fn absent_entry_means_no_mates() {
        let mut index = UnmappedMateIndex::default();
        index.observe(unmapped_mate("F1", 1));
        assert!(index.mates_for(&mapped("other")).is_none());

        let mut on_other_reference = mapped("F1");
        on_other_reference = on_other_reference.with_alignment("chr2", 5, false, Vec::new());
        assert!(index.mates_for(&on_other_reference).is_none());
    }

    #[test]
    fn mapped_read_with_placed_mate_does_not_request() {
        let mut index = UnmappedMateIndex::default();
        index.observe(unmapped_mate("F1", 1));
        let read = mapped("F1").with_mate("chr1", 4_000, true);
        assert!(!UnmappedMateIndex::requests_mates(&read));
        assert!(index.mates_for(&read).is_none());
    }

    #[test]
    fn cap_refuses_further_reads() {
        let mut index = UnmappedMateIndex::new(2);
        assert!(index.observe(unmapped_mate("F1", 1)));
        assert!(index.observe(unmapped_mate("F2", 1)));
        assert!(!index.observe(unmapped_mate("F3", 1)));
        assert!(!index.observe(unmapped_mate("F4", 1)));
        assert!(index.is_full());
        assert_eq!(index.count(), 2);
        assert_eq!(index.refused(), 2);
        assert!(!index.contains(&unmapped_mate("F3", 1)));
    }

    #[test]
    fn take_drains_but_remembers_fragment() {
        let mut index = UnmappedMateIndex::default();
        let mate = unmapped_mate("F1", 1);
        index.observe(mate.clone());

        let taken = index.take_mates(&mapped("F1")).expect("mates buffered");
        assert_eq!(taken, vec![mate.clone()]);
        assert!(index.take_mates(&mapped("F1")).is_none());
        assert!(index.contains(&mate));
        assert!(index.was_injected(&mate));
        assert_eq!(index.count(), 1);
    }

    #[test]
    fn claimed_mate_is_not_injected_later() {
        let mut index = UnmappedMateIndex::default();
        index.observe(unmapped_mate("F1", 1));
        index.observe(unmapped_mate("F1", 2));

        assert!(index.claim(&unmapped_mate("F1", 1)));
        assert!(!index.claim(&unmapped_mate("F1", 1)));
        assert!(index.contains(&unmapped_mate("F1", 1)));

        let taken = index.take_mates(&mapped("F1")).expect("one mate left");
        assert_eq!(taken, vec![unmapped_mate("F1", 2)]);
    }
}
