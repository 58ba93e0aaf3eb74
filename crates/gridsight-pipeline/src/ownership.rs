//! Cell ownership maps and their validation.
//!
//! An ownership map assigns every grid cell the id of the region it
//! belongs to. Maps are built by majority vote over a lattice of sample
//! points inside each cell, then checked against the structural rules a
//! star-battle partition must satisfy.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::shapes::LabelImage;
use crate::types::GridStructure;

/// Sample points per cell side used for the majority vote.
pub const SAMPLES_PER_SIDE: u32 = 5;

/// Step limit of the contiguity search.
pub const CONTIGUITY_STEP_LIMIT: usize = 500_000;

/// Largest number of single-row ("flat") or single-column ("thin")
/// regions tolerated per row or column for an `n`×`n` grid.
#[must_use]
pub const fn flat_thin_cap(n: usize) -> usize {
    if n == 0 {
        return 0;
    }
    (n * n / 4) / n
}

/// Region id per cell; 0 means unassigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipMap {
    size: usize,
    cells: Vec<u32>,
}

/// Why an ownership map was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnershipError {
    /// A cell has no region.
    Unassigned {
        /// Row of the cell.
        row: usize,
        /// Column of the cell.
        col: usize,
    },
    /// The number of distinct regions differs from the grid size.
    RegionCount {
        /// Expected count (N).
        expected: usize,
        /// Distinct ids present.
        found: usize,
    },
    /// A region consists of more than one 4-connected piece.
    Disconnected {
        /// The offending region id.
        region: u32,
    },
    /// The contiguity search hit its step limit.
    StepLimit,
    /// Too many single-row regions lie in one row.
    TooManyFlat {
        /// The row.
        row: usize,
        /// Flat regions found there.
        count: usize,
    },
    /// Too many single-column regions lie in one column.
    TooManyThin {
        /// The column.
        col: usize,
        /// Thin regions found there.
        count: usize,
    },
}

impl fmt::Display for OwnershipError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unassigned { row, col } => write!(f, "cell ({row}, {col}) has no region"),
            Self::RegionCount { expected, found } => {
                write!(f, "expected {expected} regions, found {found}")
            }
            Self::Disconnected { region } => write!(f, "region {region} is not contiguous"),
            Self::StepLimit => f.write_str("contiguity search exceeded its step limit"),
            Self::TooManyFlat { row, count } => {
                write!(f, "row {row} holds {count} single-row regions")
            }
            Self::TooManyThin { col, count } => {
                write!(f, "column {col} holds {count} single-column regions")
            }
        }
    }
}

impl OwnershipMap {
    /// Build a map from explicit rows. Every row must have `rows.len()`
    /// entries.
    #[must_use]
    pub fn from_rows(rows: &[Vec<u32>]) -> Self {
        Self {
            size: rows.len(),
            cells: rows.iter().flatten().copied().collect(),
        }
    }

    /// Build a map by majority vote over `labels`.
    ///
    /// Each cell samples a [`SAMPLES_PER_SIDE`]² lattice; background
    /// (label 0) votes are ignored and ties go to the smallest label.
    /// Labels are renumbered `1..` in row-major order of first appearance.
    #[must_use]
    pub fn from_labels(labels: &LabelImage, grid: &GridStructure) -> Self {
        let n = grid.grid_size;
        let mut renumber: BTreeMap<u32, u32> = BTreeMap::new();
        let mut cells = Vec::with_capacity(n * n);

        for row in 0..n {
            for col in 0..n {
                let mut votes: BTreeMap<u32, usize> = BTreeMap::new();
                for (x, y) in grid.cell_rect(row, col).sample_points(SAMPLES_PER_SIDE) {
                    if let Some(pixel) = labels.get_pixel_checked(x, y) {
                        let label = pixel.0[0];
                        if label != 0 {
                            *votes.entry(label).or_default() += 1;
                        }
                    }
                }
                let mut winner: Option<(u32, usize)> = None;
                for (label, count) in votes {
                    if winner.is_none_or(|(_, c)| count > c) {
                        winner = Some((label, count));
                    }
                }
                let id = winner.map_or(0, |(label, _)| {
                    let next = u32::try_from(renumber.len() + 1).unwrap_or(u32::MAX);
                    *renumber.entry(label).or_insert(next)
                });
                cells.push(id);
            }
        }

        Self { size: n, cells }
    }

    /// Cells per side.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Region id of (`row`, `col`), 0 if unassigned or out of range.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> u32 {
        if row >= self.size || col >= self.size {
            return 0;
        }
        self.cells[row * self.size + col]
    }

    /// The map as rows of region ids.
    #[must_use]
    pub fn rows(&self) -> Vec<Vec<u32>> {
        if self.size == 0 {
            return Vec::new();
        }
        self.cells.chunks(self.size).map(<[u32]>::to_vec).collect()
    }

    /// Cells of every region, keyed by id (unassigned cells excluded).
    #[must_use]
    pub fn regions(&self) -> BTreeMap<u32, Vec<(usize, usize)>> {
        let mut regions: BTreeMap<u32, Vec<(usize, usize)>> = BTreeMap::new();
        for row in 0..self.size {
            for col in 0..self.size {
                let id = self.get(row, col);
                if id != 0 {
                    regions.entry(id).or_default().push((row, col));
                }
            }
        }
        regions
    }

    /// Check that the map is a plausible N-region partition.
    ///
    /// # Errors
    ///
    /// Returns the first violated rule: every cell assigned, exactly N
    /// distinct regions, every region 4-connected, and no row (column)
    /// holding more single-row (single-column) regions than
    /// [`flat_thin_cap`] allows.
    pub fn validate(&self) -> Result<(), OwnershipError> {
        let n = self.size;
        if let Some(idx) = self.cells.iter().position(|&id| id == 0) {
            return Err(OwnershipError::Unassigned {
                row: idx / n,
                col: idx % n,
            });
        }

        let regions = self.regions();
        if regions.len() != n {
            return Err(OwnershipError::RegionCount {
                expected: n,
                found: regions.len(),
            });
        }

        let mut steps = 0usize;
        for (&id, cells) in &regions {
            let reached = self.flood_region(id, cells[0], &mut steps)?;
            if reached != cells.len() {
                return Err(OwnershipError::Disconnected { region: id });
            }
        }

        let cap = flat_thin_cap(n);
        let mut flat_per_row = vec![0usize; n];
        let mut thin_per_col = vec![0usize; n];
        for cells in regions.values() {
            let (row0, col0) = cells[0];
            if cells.iter().all(|&(r, _)| r == row0) {
                flat_per_row[row0] += 1;
            }
            if cells.iter().all(|&(_, c)| c == col0) {
                thin_per_col[col0] += 1;
            }
        }
        if let Some((row, &count)) = flat_per_row.iter().enumerate().find(|&(_, &c)| c > cap) {
            return Err(OwnershipError::TooManyFlat { row, count });
        }
        if let Some((col, &count)) = thin_per_col.iter().enumerate().find(|&(_, &c)| c > cap) {
            return Err(OwnershipError::TooManyThin { col, count });
        }
        Ok(())
    }

    /// Breadth-first search over cells of region `id` from `start`.
    fn flood_region(
        &self,
        id: u32,
        start: (usize, usize),
        steps: &mut usize,
    ) -> Result<usize, OwnershipError> {
        let n = self.size;
        let mut seen = vec![false; n * n];
        let mut queue = VecDeque::from([start]);
        seen[start.0 * n + start.1] = true;
        let mut reached = 0;

        while let Some((row, col)) = queue.pop_front() {
            *steps += 1;
            if *steps > CONTIGUITY_STEP_LIMIT {
                return Err(OwnershipError::StepLimit);
            }
            reached += 1;
            let neighbours = [
                (row > 0).then(|| (row - 1, col)),
                (row + 1 < n).then_some((row + 1, col)),
                (col > 0).then(|| (row, col - 1)),
                (col + 1 < n).then_some((row, col + 1)),
            ];
            for (r, c) in neighbours.into_iter().flatten() {
                let idx = r * n + c;
                if !seen[idx] && self.cells[idx] == id {
                    seen[idx] = true;
                    queue.push_back((r, c));
                }
            }
        }
        Ok(reached)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma};

    fn map(rows: &[&[u32]]) -> OwnershipMap {
        let rows: Vec<Vec<u32>> = rows.iter().map(|r| r.to_vec()).collect();
        OwnershipMap::from_rows(&rows)
    }

    #[test]
    fn flat_thin_cap_values() {
        assert_eq!(flat_thin_cap(5), 1);
        assert_eq!(flat_thin_cap(8), 2);
        assert_eq!(flat_thin_cap(10), 2);
        assert_eq!(flat_thin_cap(3), 0);
    }

    #[test]
    fn valid_partition_passes() {
        let m = map(&[
            &[1, 1, 2, 2, 2],
            &[1, 3, 3, 2, 4],
            &[1, 3, 5, 4, 4],
            &[1, 3, 5, 5, 4],
            &[1, 1, 5, 5, 4],
        ]);
        assert_eq!(m.validate(), Ok(()));
        assert_eq!(m.regions().len(), 5);
        assert_eq!(m.rows()[2], vec![1, 3, 5, 4, 4]);
    }

    #[test]
    fn unassigned_cell_is_rejected() {
        let m = map(&[&[1, 1, 2], &[3, 0, 2], &[3, 3, 2]]);
        assert_eq!(m.validate(), Err(OwnershipError::Unassigned { row: 1, col: 1 }));
    }

    #[test]
    fn wrong_region_count_is_rejected() {
        let m = map(&[&[1, 1, 2], &[1, 1, 2], &[1, 1, 2]]);
        assert_eq!(
            m.validate(),
            Err(OwnershipError::RegionCount {
                expected: 3,
                found: 2
            })
        );
    }

    #[test]
    fn split_region_is_rejected() {
        let m = map(&[&[1, 2, 1], &[3, 2, 3], &[3, 3, 3]]);
        assert!(matches!(
            m.validate(),
            Err(OwnershipError::Disconnected { region: 1 })
        ));
    }

    #[test]
    fn two_flat_regions_in_one_row_are_rejected() {
        // Regions 2 and 3 both lie entirely in row 0 of a 5x5 grid.
        let m = map(&[
            &[2, 2, 3, 3, 3],
            &[1, 1, 1, 1, 1],
            &[1, 4, 4, 4, 1],
            &[1, 4, 5, 5, 1],
            &[1, 1, 5, 5, 1],
        ]);
        assert_eq!(
            m.validate(),
            Err(OwnershipError::TooManyFlat { row: 0, count: 2 })
        );
    }

    #[test]
    fn thin_region_on_three_by_three_is_rejected() {
        let m = map(&[&[1, 2, 2], &[1, 2, 3], &[1, 3, 3]]);
        assert_eq!(
            m.validate(),
            Err(OwnershipError::TooManyThin { col: 0, count: 1 })
        );
    }

    #[test]
    fn majority_vote_renumbers_by_first_appearance() {
        // 3x3 grid of 10px cells; label 7 fills the left column, label 3
        // the rest, with a background line through the middle row.
        let labels: LabelImage = ImageBuffer::from_fn(30, 30, |x, y| {
            if y == 15 {
                Luma([0])
            } else if x < 10 {
                Luma([7])
            } else {
                Luma([3])
            }
        });
        let grid = GridStructure::from_lines(vec![0, 10, 20, 30], vec![0, 10, 20, 30]).unwrap();
        let m = OwnershipMap::from_labels(&labels, &grid);
        assert_eq!(m.rows(), vec![vec![1, 2, 2], vec![1, 2, 2], vec![1, 2, 2]]);
    }

    #[test]
    fn background_only_cell_is_unassigned() {
        let labels: LabelImage = ImageBuffer::from_fn(30, 30, |x, y| {
            if x >= 20 && y >= 20 { Luma([0]) } else { Luma([1]) }
        });
        let grid = GridStructure::from_lines(vec![0, 10, 20, 30], vec![0, 10, 20, 30]).unwrap();
        let m = OwnershipMap::from_labels(&labels, &grid);
        assert_eq!(m.get(2, 2), 0);
        assert_eq!(m.get(0, 0), 1);
    }
}
