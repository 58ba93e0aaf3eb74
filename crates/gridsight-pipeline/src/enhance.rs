//! Region colour enhancement.
//!
//! When a puzzle separates regions by colour rather than by thick walls,
//! the brightness sweep alone cannot split it. The enhancer redraws the
//! grid so that colour differences become geometry: cell centres are
//! cleared to white, strongly differing neighbours get a black wall, and
//! near-identical neighbours get a white bridge between their centres.

use image::Rgb;
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;

use crate::color::{CellColors, color_distance, sample_cells};
use crate::types::{CellRect, GridStructure, PipelineConfig, RgbaImage};

/// Fraction trimmed from every cell side before clearing (keeps 70%).
pub const CLEAR_INSET: f64 = 0.15;

/// Minimum thickness of drawn walls and bridges, in pixels.
pub const MIN_STROKE: u32 = 3;

const WALL: image::Rgba<u8> = image::Rgba([0, 0, 0, 255]);
const BRIDGE: image::Rgba<u8> = image::Rgba([255, 255, 255, 255]);

/// Output of [`enhance`].
#[derive(Debug, Clone)]
pub struct Enhanced {
    /// The redrawn image.
    pub image: RgbaImage,
    /// Sampled colours per cell, row-major.
    pub colors: Vec<CellColors>,
    /// Number of walls drawn.
    pub walls: usize,
    /// Number of bridges drawn.
    pub bridges: usize,
}

#[allow(clippy::cast_possible_wrap)]
fn fill(image: &mut RgbaImage, x: u32, y: u32, width: u32, height: u32, color: image::Rgba<u8>) {
    if width == 0 || height == 0 {
        return;
    }
    draw_filled_rect_mut(
        image,
        Rect::at(x as i32, y as i32).of_size(width, height),
        color,
    );
}

fn fill_cell(image: &mut RgbaImage, rect: CellRect, color: image::Rgba<u8>) {
    fill(image, rect.x, rect.y, rect.width, rect.height, color);
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn stroke_width(cell_size: f64, divisor: f64) -> u32 {
    ((cell_size / divisor).round() as u32).max(MIN_STROKE)
}

/// Redraw `image` so that region membership is encoded geometrically.
///
/// Logic colours are compared against `config.border_color_distance`
/// (wall above) and `config.connect_color_distance` (bridge below).
/// Pairs in between are left untouched.
#[must_use]
pub fn enhance(image: &RgbaImage, grid: &GridStructure, config: &PipelineConfig) -> Enhanced {
    let n = grid.grid_size;
    let colors = sample_cells(image, grid);
    let cell_size = grid.cell_size();
    let wall = stroke_width(cell_size, 8.0);
    let bridge = stroke_width(cell_size, 6.0);

    let mut out = image.clone();
    for row in 0..n {
        for col in 0..n {
            fill_cell(&mut out, grid.cell_rect(row, col).inset(CLEAR_INSET), BRIDGE);
        }
    }

    let logic = |row: usize, col: usize| Rgb(colors[row * n + col].logic);
    let mut walls = 0;
    let mut bridges = 0;

    for row in 0..n {
        for col in 0..n {
            let here = grid.cell_rect(row, col);
            let (cx, cy) = here.center();

            if col + 1 < n {
                let d = color_distance(logic(row, col), logic(row, col + 1));
                let (nx, _) = grid.cell_rect(row, col + 1).center();
                let x = grid.v_lines[col + 1];
                if d > config.border_color_distance {
                    fill(&mut out, x.saturating_sub(wall / 2), here.y, wall, here.height + 1, WALL);
                    walls += 1;
                } else if d < config.connect_color_distance {
                    fill(&mut out, cx, cy.saturating_sub(bridge / 2), nx - cx + 1, bridge, BRIDGE);
                    bridges += 1;
                }
            }

            if row + 1 < n {
                let d = color_distance(logic(row, col), logic(row + 1, col));
                let (_, ny) = grid.cell_rect(row + 1, col).center();
                let y = grid.h_lines[row + 1];
                if d > config.border_color_distance {
                    fill(&mut out, here.x, y.saturating_sub(wall / 2), here.width + 1, wall, WALL);
                    walls += 1;
                } else if d < config.connect_color_distance {
                    fill(&mut out, cx.saturating_sub(bridge / 2), cy, bridge, ny - cy + 1, BRIDGE);
                    bridges += 1;
                }
            }
        }
    }

    log::debug!("enhancer drew {walls} walls and {bridges} bridges");
    Enhanced {
        image: out,
        colors,
        walls,
        bridges,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use image::Rgba;

    /// 3x3 grid of 40px cells, no drawn lines. Left column red, rest green.
    fn two_region_board() -> (RgbaImage, GridStructure) {
        let img = RgbaImage::from_fn(120, 120, |x, _| {
            if x < 40 {
                Rgba([230, 60, 60, 255])
            } else {
                Rgba([60, 200, 60, 255])
            }
        });
        let grid = GridStructure::from_lines(vec![0, 40, 80, 120], vec![0, 40, 80, 120]).unwrap();
        (img, grid)
    }

    #[test]
    fn walls_between_different_colours() {
        let (img, grid) = two_region_board();
        let out = enhance(&img, &grid, &PipelineConfig::default());
        // One wall per row between column 0 and column 1.
        assert_eq!(out.walls, 3);
        assert_eq!(out.image.get_pixel(40, 60), &Rgba([0, 0, 0, 255]));
        assert_eq!(out.image.get_pixel(38, 20), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn bridges_between_matching_colours() {
        let (img, grid) = two_region_board();
        let out = enhance(&img, &grid, &PipelineConfig::default());
        // Left column: 2 vertical. Green block: 3 horizontal, 4 vertical.
        assert_eq!(out.bridges, 2 + 3 + 4);
        // Between the centres of (0,1) and (0,2), across the old boundary.
        assert_eq!(out.image.get_pixel(80, 20), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn cell_centres_are_cleared_and_margins_kept() {
        let (img, grid) = two_region_board();
        let out = enhance(&img, &grid, &PipelineConfig::default());
        assert_eq!(out.image.get_pixel(8, 8), &Rgba([255, 255, 255, 255]));
        // Corner margin of a cell is left with its original colour.
        assert_eq!(out.image.get_pixel(1, 1), &Rgba([230, 60, 60, 255]));
    }

    #[test]
    fn colours_are_sampled_per_cell() {
        let (img, grid) = two_region_board();
        let out = enhance(&img, &grid, &PipelineConfig::default());
        assert_eq!(out.colors.len(), 9);
        assert_eq!(out.colors[0].display, [230, 60, 60]);
        assert_eq!(out.colors[1].display, [60, 200, 60]);
    }
}
