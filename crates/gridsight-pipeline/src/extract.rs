//! Convert a validated ownership map into the output grid.

use crate::ownership::OwnershipMap;
use crate::types::{Cell, PuzzleGrid, RegionBorders};

/// Build the [`PuzzleGrid`] for `ownership`.
///
/// A cell has a bottom (right) border when the cell below (to the right)
/// belongs to another region or lies outside the grid.
#[must_use]
pub fn build_grid(ownership: &OwnershipMap) -> PuzzleGrid {
    let n = ownership.size();
    let mut cells = Vec::with_capacity(n * n);
    for row in 0..n {
        for col in 0..n {
            let region = ownership.get(row, col);
            cells.push(Cell {
                row,
                col,
                region,
                region_borders: RegionBorders {
                    bottom: row + 1 == n || ownership.get(row + 1, col) != region,
                    right: col + 1 == n || ownership.get(row, col + 1) != region,
                },
            });
        }
    }
    PuzzleGrid { size: n, cells }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn borders_follow_region_changes() {
        let ownership = OwnershipMap::from_rows(&[
            vec![1, 1, 2, 2],
            vec![1, 3, 3, 2],
            vec![1, 3, 4, 2],
            vec![4, 4, 4, 2],
        ]);
        let grid = build_grid(&ownership);
        assert_eq!(grid.size, 4);
        assert_eq!(grid.cells.len(), 16);

        let c = grid.cell(0, 0).unwrap();
        assert_eq!(c.region, 1);
        assert_eq!(
            c.region_borders,
            RegionBorders {
                bottom: false,
                right: false
            }
        );

        let c = grid.cell(0, 1).unwrap();
        assert!(c.region_borders.bottom);
        assert!(c.region_borders.right);
    }

    #[test]
    fn outer_edge_always_has_borders() {
        let ownership = OwnershipMap::from_rows(&[
            vec![1, 1, 1],
            vec![2, 2, 2],
            vec![3, 3, 3],
        ]);
        let grid = build_grid(&ownership);
        let corner = grid.cell(2, 2).unwrap();
        assert!(corner.region_borders.bottom);
        assert!(corner.region_borders.right);
        assert!(grid.cell(0, 2).unwrap().region_borders.right);
        assert!(grid.cell(2, 0).unwrap().region_borders.bottom);
    }

    #[test]
    fn cells_are_row_major() {
        let ownership = OwnershipMap::from_rows(&[
            vec![1, 2, 3],
            vec![1, 2, 3],
            vec![1, 2, 3],
        ]);
        let grid = build_grid(&ownership);
        let coords: Vec<(usize, usize)> = grid.cells.iter().map(|c| (c.row, c.col)).collect();
        assert_eq!(coords[..4], [(0, 0), (0, 1), (0, 2), (1, 0)]);
        assert_eq!(grid.cells[5].region, 3);
    }
}
