// Work partitioning for the parallel phases.
//
// Every phase splits a `0..len` index space into one contiguous range per
// worker. When `len` does not divide evenly the first `len % workers`
// ranges get one extra index, so range sizes differ by at most one. Agent
// ranges are recomputed from the registry length at the start of every
// step; X-slab ranges depend only on the lattice width.
//
// `split_ranges_mut()` turns a partition into disjoint `&mut` sub-slices,
// which is how each worker gets exclusive access to its agents (and to
// its block of the diffusion output buffer) without locks.

use bnsim_prng::SimRng;
use std::ops::Range;

/// Contiguous ranges covering `0..len`, one per worker.
pub fn partition(len: usize, workers: usize) -> Vec<Range<usize>> {
    let workers = workers.max(1);
    let base = len / workers;
    let extra = len % workers;
    let mut ranges = Vec::with_capacity(workers);
    let mut start = 0;
    for w in 0..workers {
        let size = base + usize::from(w < extra);
        ranges.push(start..start + size);
        start += size;
    }
    ranges
}

/// Split `items` into the disjoint sub-slices named by `ranges`.
///
/// `ranges` must be contiguous, ascending and start at zero, as produced
/// by `partition()`. Indices past the last range are left out.
pub fn split_ranges_mut<'a, T>(mut items: &'a mut [T], ranges: &[Range<usize>]) -> Vec<&'a mut [T]> {
    let mut parts = Vec::with_capacity(ranges.len());
    let mut consumed = 0;
    for range in ranges {
        debug_assert_eq!(range.start, consumed, "ranges must be contiguous");
        let len = range.len().min(items.len());
        let (head, tail) = std::mem::take(&mut items).split_at_mut(len);
        parts.push(head);
        items = tail;
        consumed = range.end;
    }
    parts
}

/// One visitation-order seed per worker, drawn from the world stream.
pub fn worker_seeds(rng: &mut SimRng, workers: usize) -> Vec<u64> {
    (0..workers).map(|_| rng.next_u64()).collect()
}

/// `0..len` in a random order.
pub fn shuffled_order(len: usize, seed: u64) -> Vec<usize> {
    let mut order: Vec<usize> = (0..len).collect();
    SimRng::new(seed).shuffle(&mut order);
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_covers_everything_once() {
        for len in [0, 1, 7, 10, 25, 1000] {
            for workers in 1..=8 {
                let ranges = partition(len, workers);
                assert_eq!(ranges.len(), workers);
                assert_eq!(ranges[0].start, 0);
                assert_eq!(ranges[workers - 1].end, len);
                for pair in ranges.windows(2) {
                    assert_eq!(pair[0].end, pair[1].start);
                }
                let sizes: Vec<_> = ranges.iter().map(|r| r.len()).collect();
                let max = *sizes.iter().max().unwrap();
                let min = *sizes.iter().min().unwrap();
                assert!(max - min <= 1, "uneven split {sizes:?}");
            }
        }
    }

    #[test]
    fn remainder_goes_to_leading_workers() {
        assert_eq!(partition(10, 4), vec![0..3, 3..6, 6..8, 8..10]);
        assert_eq!(partition(2, 3), vec![0..1, 1..2, 2..2]);
    }

    #[test]
    fn zero_workers_is_treated_as_one() {
        assert_eq!(partition(5, 0), vec![0..5]);
    }

    #[test]
    fn split_matches_partition() {
        let mut items: Vec<u32> = (0..10).collect();
        let ranges = partition(items.len(), 3);
        let parts = split_ranges_mut(&mut items, &ranges);
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], &[0, 1, 2, 3]);
        assert_eq!(parts[1], &[4, 5, 6]);
        assert_eq!(parts[2], &[7, 8, 9]);
    }

    #[test]
    fn split_parts_are_writable() {
        let mut items = vec![0u32; 6];
        let ranges = partition(items.len(), 2);
        for (w, part) in split_ranges_mut(&mut items, &ranges).into_iter().enumerate() {
            for item in part.iter_mut() {
                *item = w as u32;
            }
        }
        assert_eq!(items, vec![0, 0, 0, 1, 1, 1]);
    }

    #[test]
    fn shuffled_order_is_a_seeded_permutation() {
        let a = shuffled_order(50, 9);
        let b = shuffled_order(50, 9);
        assert_eq!(a, b);
        let mut sorted = a.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn worker_seeds_advance_the_stream() {
        let mut rng = SimRng::new(1);
        let first = worker_seeds(&mut rng, 3);
        let second = worker_seeds(&mut rng, 3);
        assert_eq!(first.len(), 3);
        assert_ne!(first, second);
    }
}
