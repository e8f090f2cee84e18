//! Free/allocated range bookkeeping for a single shared buffer.
//!
//! Together the two lists of a buffer always tile `[0, capacity)`: every byte
//! is in exactly one free or allocated range. [`debug_check_invariants`]
//! asserts this in debug builds.

use smallvec::SmallVec;

use crate::device::CopyRegion;
use crate::range::BufferRange;

/// The currently unused regions of a buffer.
///
/// Unordered; adjacent holes are merged on insertion, so at most one hole ever
/// covers any freed neighborhood.
#[derive(Default, Debug)]
pub(crate) struct FreeList(SmallVec<[BufferRange; 4]>);

impl FreeList {
    /// First fit: the fitting hole with the lowest start offset, if any.
    ///
    /// Deterministic regardless of insertion order, which keeps allocation
    /// offsets reproducible.
    pub fn find_fit(&self, size: u32) -> Option<usize> {
        self.0
            .iter()
            .enumerate()
            .filter(|(_, range)| range.count >= size)
            .min_by_key(|(_, range)| range.start)
            .map(|(i, _)| i)
    }

    /// Consumes `size` bytes from the front of the hole at `index`.
    ///
    /// An exact fit removes the hole; otherwise it is shrunk in place.
    /// Returns the consumed sub-range, at the hole's original start.
    pub fn consume_at(&mut self, index: usize, size: u32) -> BufferRange {
        let hole = &mut self.0[index];
        debug_assert!(size > 0 && size <= hole.count);

        let consumed = BufferRange::new(hole.start, size);
        if hole.count == size {
            self.0.swap_remove(index);
        } else {
            hole.start += size;
            hole.count -= size;
        }
        consumed
    }

    /// Returns a freed range to the list, merging with any adjacent holes.
    ///
    /// A range bordering holes on both sides collapses all three into one
    /// entry, keeping the list minimal (no two holes are ever adjacent).
    pub fn insert_coalescing(&mut self, mut range: BufferRange) {
        debug_assert!(range.count > 0);

        if let Some(i) = self.0.iter().position(|hole| hole.end() == range.start) {
            range = BufferRange::new(self.0[i].start, self.0[i].count + range.count);
            self.0.swap_remove(i);
        }
        if let Some(i) = self.0.iter().position(|hole| range.end() == hole.start) {
            range.count += self.0[i].count;
            self.0.swap_remove(i);
        }
        self.0.push(range);
    }

    /// Replaces all holes with a single trailing one, after a growth pass
    /// packed every live allocation to the front of the buffer.
    pub fn reset_to(&mut self, range: BufferRange) {
        debug_assert!(range.count > 0);
        self.0.clear();
        self.0.push(range);
    }

    pub fn iter(&self) -> impl Iterator<Item = &BufferRange> {
        self.0.iter()
    }
}

/// The currently in-use regions of a buffer, one entry per live mesh half.
///
/// Entries are immutable except during [`AllocatedList::plan_compaction`],
/// which rewrites their starts.
#[derive(Default, Debug)]
pub(crate) struct AllocatedList(SmallVec<[BufferRange; 16]>);

impl AllocatedList {
    pub fn insert(&mut self, range: BufferRange) {
        debug_assert!(range.count > 0);
        self.0.push(range);
    }

    /// Removes the entry matching `range` exactly, scanning from the first
    /// entry. `false` means the range is not a live allocation (double free or
    /// a foreign handle).
    pub fn remove_exact(&mut self, range: BufferRange) -> bool {
        if let Some(i) = self.0.iter().position(|r| *r == range) {
            self.0.swap_remove(i);
            true
        } else {
            false
        }
    }

    /// Assigns every live range a new packed start, eliminating all holes.
    ///
    /// Ranges are visited in descending start order so that the produced
    /// copies would also be safe to replay in place within a single buffer,
    /// writes never landing on bytes not yet copied. Entries are rewritten to
    /// their new starts; the returned regions copy each range from its old
    /// offset to its new one. Also returns the end of the packed region.
    pub fn plan_compaction(&mut self) -> (Vec<CopyRegion>, u32) {
        let mut order: SmallVec<[usize; 16]> = (0..self.0.len()).collect();
        order.sort_unstable_by_key(|&i| std::cmp::Reverse(self.0[i].start));

        let mut copies = Vec::with_capacity(order.len());
        let mut offset = 0;
        for i in order {
            let range = &mut self.0[i];
            copies.push(CopyRegion {
                src_offset: u64::from(range.start),
                dst_offset: u64::from(offset),
                len: u64::from(range.count),
            });
            range.start = offset;
            offset += range.count;
        }
        (copies, offset)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Total number of allocated bytes.
    pub fn bytes_in_use(&self) -> u64 {
        self.0.iter().map(|r| u64::from(r.count)).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BufferRange> {
        self.0.iter()
    }
}

/// Debug-build check of the list invariants for one buffer:
/// free ∪ allocated tiles `[0, capacity)` exactly, all ranges are non-empty,
/// and no two holes are mutually adjacent (they would have been merged).
pub(crate) fn debug_check_invariants(
    free: &FreeList,
    allocated: &AllocatedList,
    capacity: u32,
) {
    if !cfg!(debug_assertions) {
        return;
    }

    let mut all: Vec<BufferRange> = free.iter().chain(allocated.iter()).copied().collect();
    all.sort_unstable_by_key(|r| r.start);

    let mut expected_start = 0;
    for range in &all {
        debug_assert!(range.count > 0, "zero-length range {range:?} in a list");
        debug_assert_eq!(
            range.start, expected_start,
            "gap or overlap at offset {expected_start}"
        );
        expected_start = range.end();
    }
    debug_assert_eq!(expected_start, capacity, "lists do not tile the buffer");

    for hole in free.iter() {
        debug_assert!(
            !free
                .iter()
                .any(|other| other.end() == hole.start || hole.end() == other.start),
            "adjacent unmerged holes around {hole:?}"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_fit_on_empty_list_is_none() {
        let free = FreeList::default();
        assert_eq!(free.find_fit(1), None);
    }

    #[test]
    fn find_fit_picks_lowest_fitting_offset() {
        let mut free = FreeList::default();
        // Insertion order deliberately not offset order.
        free.insert_coalescing(BufferRange::new(100, 32));
        free.insert_coalescing(BufferRange::new(10, 32));
        free.insert_coalescing(BufferRange::new(60, 8));

        let fit = free.find_fit(16).expect("two holes fit");
        assert_eq!(free.consume_at(fit, 16), BufferRange::new(10, 16));

        // Too big for everything.
        assert_eq!(free.find_fit(64), None);
    }

    #[test]
    fn consume_exact_fit_removes_hole() {
        let mut free = FreeList::default();
        free.insert_coalescing(BufferRange::new(0, 16));

        let fit = free.find_fit(16).expect("fits");
        assert_eq!(free.consume_at(fit, 16), BufferRange::new(0, 16));
        assert_eq!(free.iter().count(), 0);
    }

    #[test]
    fn consume_partial_fit_shrinks_hole() {
        let mut free = FreeList::default();
        free.insert_coalescing(BufferRange::new(0, 16));

        let fit = free.find_fit(6).expect("fits");
        assert_eq!(free.consume_at(fit, 6), BufferRange::new(0, 6));
        assert_eq!(free.iter().copied().collect::<Vec<_>>(), vec![
            BufferRange::new(6, 10)
        ]);
    }

    #[test]
    fn insert_coalescing_merges_both_neighbors() {
        let mut free = FreeList::default();
        free.insert_coalescing(BufferRange::new(0, 16));
        free.insert_coalescing(BufferRange::new(32, 16));
        assert_eq!(free.iter().count(), 2);

        // The middle range borders both existing holes.
        free.insert_coalescing(BufferRange::new(16, 16));
        assert_eq!(free.iter().copied().collect::<Vec<_>>(), vec![
            BufferRange::new(0, 48)
        ]);
    }

    #[test]
    fn insert_coalescing_keeps_disjoint_holes_apart() {
        let mut free = FreeList::default();
        free.insert_coalescing(BufferRange::new(0, 8));
        free.insert_coalescing(BufferRange::new(32, 8));
        assert_eq!(free.iter().count(), 2);
    }

    #[test]
    fn remove_exact_requires_identity() {
        let mut allocated = AllocatedList::default();
        allocated.insert(BufferRange::new(0, 16));

        assert!(!allocated.remove_exact(BufferRange::new(0, 8)));
        assert!(!allocated.remove_exact(BufferRange::new(8, 16)));
        assert!(allocated.remove_exact(BufferRange::new(0, 16)));
        // Second removal is a double free.
        assert!(!allocated.remove_exact(BufferRange::new(0, 16)));
    }

    #[test]
    fn plan_compaction_packs_descending_start_order() {
        let mut allocated = AllocatedList::default();
        allocated.insert(BufferRange::new(16, 16));
        allocated.insert(BufferRange::new(48, 16));

        let (copies, packed_end) = allocated.plan_compaction();
        assert_eq!(packed_end, 32);
        assert_eq!(copies, vec![
            CopyRegion {
                src_offset: 48,
                dst_offset: 0,
                len: 16,
            },
            CopyRegion {
                src_offset: 16,
                dst_offset: 16,
                len: 16,
            },
        ]);

        let mut packed: Vec<_> = allocated.iter().copied().collect();
        packed.sort_unstable_by_key(|r| r.start);
        assert_eq!(packed, vec![
            BufferRange::new(0, 16),
            BufferRange::new(16, 16)
        ]);
    }

    #[test]
    fn plan_compaction_of_empty_list_is_empty() {
        let mut allocated = AllocatedList::default();
        let (copies, packed_end) = allocated.plan_compaction();
        assert!(copies.is_empty());
        assert_eq!(packed_end, 0);
    }

    #[test]
    fn tiling_invariant_holds_through_alloc_and_free() {
        let mut free = FreeList::default();
        let mut allocated = AllocatedList::default();
        free.reset_to(BufferRange::new(0, 64));

        let fit = free.find_fit(24).expect("fits");
        let a = free.consume_at(fit, 24);
        allocated.insert(a);
        debug_check_invariants(&free, &allocated, 64);

        let fit = free.find_fit(40).expect("fits");
        let b = free.consume_at(fit, 40);
        allocated.insert(b);
        debug_check_invariants(&free, &allocated, 64);

        assert!(allocated.remove_exact(a));
        free.insert_coalescing(a);
        debug_check_invariants(&free, &allocated, 64);

        assert!(allocated.remove_exact(b));
        free.insert_coalescing(b);
        debug_check_invariants(&free, &allocated, 64);
        assert_eq!(free.iter().copied().collect::<Vec<_>>(), vec![
            BufferRange::new(0, 64)
        ]);
    }
}
