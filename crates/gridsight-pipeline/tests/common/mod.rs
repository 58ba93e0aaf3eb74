//! Synthetic puzzle renderer shared by the integration tests.

#![allow(dead_code)]

use gridsight_pipeline::{OwnershipMap, RgbaImage};
use image::Rgba;

/// Pastel cell colours of a light-theme puzzle.
pub const PASTELS: [Rgba<u8>; 6] = [
    Rgba([255, 204, 204, 255]),
    Rgba([204, 255, 204, 255]),
    Rgba([255, 255, 204, 255]),
    Rgba([204, 229, 255, 255]),
    Rgba([255, 204, 255, 255]),
    Rgba([255, 229, 204, 255]),
];

/// Muted cell colours of a dark-theme puzzle.
pub const DARK_TONES: [Rgba<u8>; 5] = [
    Rgba([70, 30, 30, 255]),
    Rgba([30, 70, 30, 255]),
    Rgba([70, 70, 30, 255]),
    Rgba([30, 50, 80, 255]),
    Rgba([70, 30, 70, 255]),
];

/// Five regions, none confined to a single row or column.
pub fn five_by_five() -> Vec<Vec<u32>> {
    vec![
        vec![1, 1, 2, 2, 2],
        vec![1, 3, 3, 2, 4],
        vec![1, 3, 5, 4, 4],
        vec![1, 3, 5, 5, 4],
        vec![1, 1, 5, 5, 4],
    ]
}

/// Six regions, none confined to a single row or column.
pub fn six_by_six() -> Vec<Vec<u32>> {
    vec![
        vec![1, 1, 1, 2, 2, 2],
        vec![1, 3, 3, 3, 2, 2],
        vec![1, 3, 4, 4, 4, 2],
        vec![5, 5, 4, 6, 6, 2],
        vec![5, 5, 4, 6, 6, 6],
        vec![5, 5, 5, 5, 6, 6],
    ]
}

/// A rendered puzzle: 3px walls between regions and around the frame,
/// 1px lines between cells of the same region.
pub struct Board {
    pub regions: Vec<Vec<u32>>,
    pub cell: u32,
    pub margin: u32,
    pub page: Rgba<u8>,
    pub wall: Rgba<u8>,
    pub thin: Rgba<u8>,
    pub palette: Vec<Rgba<u8>>,
}

impl Board {
    /// Black walls and gray lines on a white page.
    pub fn light(regions: Vec<Vec<u32>>) -> Self {
        Self {
            regions,
            cell: 40,
            margin: 20,
            page: Rgba([255, 255, 255, 255]),
            wall: Rgba([0, 0, 0, 255]),
            thin: Rgba([150, 150, 150, 255]),
            palette: PASTELS.to_vec(),
        }
    }

    /// Light walls and mid-gray lines on a near-black page.
    pub fn dark(regions: Vec<Vec<u32>>) -> Self {
        Self {
            regions,
            cell: 40,
            margin: 20,
            page: Rgba([20, 20, 20, 255]),
            wall: Rgba([230, 230, 230, 255]),
            thin: Rgba([100, 100, 100, 255]),
            palette: DARK_TONES.to_vec(),
        }
    }

    pub fn size(&self) -> usize {
        self.regions.len()
    }

    fn line(&self, k: usize) -> u32 {
        self.margin + k as u32 * self.cell
    }

    /// Index of the cell whose span contains `v` (clamped to the grid).
    fn index(&self, v: u32) -> usize {
        let i = (v.saturating_sub(self.margin) / self.cell) as usize;
        i.min(self.size() - 1)
    }

    fn vertical_wall(&self, row: usize, k: usize) -> bool {
        k == 0 || k == self.size() || self.regions[row][k - 1] != self.regions[row][k]
    }

    fn horizontal_wall(&self, col: usize, k: usize) -> bool {
        k == 0 || k == self.size() || self.regions[k - 1][col] != self.regions[k][col]
    }

    fn pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        let n = self.size();
        let lo = self.line(0) - 1;
        let hi = self.line(n) + 1;
        if x < lo || x > hi || y < lo || y > hi {
            return self.page;
        }
        let (row, col) = (self.index(y), self.index(x));

        for k in 0..=n {
            let p = self.line(k);
            if (x.abs_diff(p) <= 1 && self.vertical_wall(row, k))
                || (y.abs_diff(p) <= 1 && self.horizontal_wall(col, k))
            {
                return self.wall;
            }
        }
        for k in 0..=n {
            let p = self.line(k);
            if x == p || y == p {
                return self.thin;
            }
        }
        let region = self.regions[row][col] as usize - 1;
        self.palette[region % self.palette.len()]
    }

    pub fn render(&self) -> RgbaImage {
        let side = 2 * self.margin + self.size() as u32 * self.cell + 1;
        RgbaImage::from_fn(side, side, |x, y| self.pixel(x, y))
    }
}

/// Encode an image as PNG bytes.
pub fn encode_png(img: &RgbaImage) -> Vec<u8> {
    let mut buf = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut buf);
    image::ImageEncoder::write_image(
        encoder,
        img.as_raw(),
        img.width(),
        img.height(),
        image::ExtendedColorType::Rgba8,
    )
    .unwrap();
    buf
}

/// Whether two ownership matrices describe the same partition, ignoring
/// how the regions are numbered.
pub fn same_partition(found: &OwnershipMap, expected: &[Vec<u32>]) -> bool {
    let rows = found.rows();
    let n = expected.len();
    if rows.len() != n {
        return false;
    }
    let cells: Vec<(usize, usize)> = (0..n).flat_map(|r| (0..n).map(move |c| (r, c))).collect();
    cells.iter().all(|&(r1, c1)| {
        cells.iter().all(|&(r2, c2)| {
            (rows[r1][c1] == rows[r2][c2]) == (expected[r1][c1] == expected[r2][c2])
        })
    })
}
