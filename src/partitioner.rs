//! Contiguous row partitioning of an `n` row matrix over `P` ranks.
//!
//! The first `n mod P` ranks get one extra row. Ranges are laid out in rank
//! order, so the exclusive prefix sum of the row counts is also the start
//! row of every rank. The result gatherer relies on that to place each
//! rank's contribution.

use serde::{Deserialize, Serialize};

/// Rows `[start, start + count)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowRange {
    pub start: usize,
    pub count: usize,
}

impl RowRange {
    pub fn new(start: usize, count: usize) -> Self {
        Self { start, count }
    }

    /// One past the last row.
    pub fn end(&self) -> usize {
        self.start + self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Row ranges for every rank, indexed by rank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    n: usize,
    ranges: Vec<RowRange>,
}

impl Partition {
    /// Ceiling-balanced split of `n` rows over `ranks` ranks.
    ///
    /// Panics if `ranks` is zero.
    pub fn new(n: usize, ranks: usize) -> Self {
        assert!(ranks > 0, "a partition needs at least one rank");
        let base = n / ranks;
        let rem = n % ranks;
        let ranges = (0..ranks)
            .map(|r| {
                if r < rem {
                    RowRange::new(r * (base + 1), base + 1)
                } else {
                    RowRange::new(r * base + rem, base)
                }
            })
            .collect();
        Self { n, ranges }
    }

    /// Number of rows being partitioned.
    pub fn n(&self) -> usize {
        self.n
    }

    pub fn ranks(&self) -> usize {
        self.ranges.len()
    }

    pub fn range(&self, rank: usize) -> RowRange {
        self.ranges[rank]
    }

    pub fn ranges(&self) -> &[RowRange] {
        &self.ranges
    }

    pub fn counts(&self) -> Vec<usize> {
        self.ranges.iter().map(|r| r.count).collect()
    }
}

/// Exclusive prefix sum of `counts`, in rank order.
pub fn displacements(counts: &[usize]) -> Vec<usize> {
    counts
        .iter()
        .scan(0usize, |acc, &count| {
            let start = *acc;
            *acc += count;
            Some(start)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_covers(n: usize, ranks: usize) {
        let partition = Partition::new(n, ranks);
        assert_eq!(partition.ranks(), ranks);
        let mut next = 0;
        for range in partition.ranges() {
            assert_eq!(range.start, next, "gap or overlap for n={n} P={ranks}");
            next = range.end();
        }
        assert_eq!(next, n);
        assert_eq!(partition.counts().iter().sum::<usize>(), n);

        let max = partition.counts().into_iter().max().unwrap();
        let min = partition.counts().into_iter().min().unwrap();
        assert!(max - min <= 1);
    }

    #[test]
    fn ten_rows_over_four_ranks() {
        let partition = Partition::new(10, 4);
        assert_eq!(partition.counts(), vec![3, 3, 2, 2]);
        let starts: Vec<usize> = partition.ranges().iter().map(|r| r.start).collect();
        assert_eq!(starts, vec![0, 3, 6, 8]);
    }

    #[test]
    fn ranges_tile_rows_exactly() {
        for n in 0..40 {
            for ranks in 1..12 {
                assert_covers(n, ranks);
            }
        }
        assert_covers(1_000_003, 7);
    }

    #[test]
    fn more_ranks_than_rows() {
        let partition = Partition::new(3, 5);
        assert_eq!(partition.counts(), vec![1, 1, 1, 0, 0]);
        assert_eq!(partition.range(4), RowRange::new(3, 0));
        assert!(partition.range(4).is_empty());
    }

    #[test]
    fn empty_matrix() {
        let partition = Partition::new(0, 3);
        assert!(partition.ranges().iter().all(|r| r.is_empty() && r.start == 0));
    }

    #[test]
    fn displacements_match_start_rows() {
        for (n, ranks) in [(10, 4), (7, 7), (3, 5), (100, 9)] {
            let partition = Partition::new(n, ranks);
            let starts: Vec<usize> = partition.ranges().iter().map(|r| r.start).collect();
            assert_eq!(displacements(&partition.counts()), starts);
        }
        assert!(displacements(&[]).is_empty());
    }
}
