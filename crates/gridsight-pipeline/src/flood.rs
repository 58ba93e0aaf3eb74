//! Bounded 4-connected flood fills.
//!
//! Used twice by the preprocessor: once on the binary image to erase dark
//! areas touching the image border, and once on the cropped colour image
//! to flatten a uniform page background. Every fill is capped at a step
//! limit so that a malformed input can never run away.

use std::collections::VecDeque;

use image::{Luma, Rgba};

use crate::grayscale::luminance;
use crate::types::{GrayImage, RgbaImage};

/// A fill visited more pixels than its step limit allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepLimitExceeded;

/// Collect every pixel 4-connected to `seeds` for which `accept` holds.
///
/// Seeds that are out of bounds or not accepted are skipped.
///
/// # Errors
///
/// Returns [`StepLimitExceeded`] if more than `max_steps` pixels would be
/// filled.
pub fn flood_region(
    width: u32,
    height: u32,
    seeds: impl IntoIterator<Item = (u32, u32)>,
    max_steps: usize,
    mut accept: impl FnMut(u32, u32) -> bool,
) -> Result<Vec<(u32, u32)>, StepLimitExceeded> {
    let w = width as usize;
    let mut visited = vec![false; w * height as usize];
    let mut queue = VecDeque::new();
    let mut filled = Vec::new();

    let mut push = |x: u32, y: u32, queue: &mut VecDeque<(u32, u32)>| {
        let idx = y as usize * w + x as usize;
        if !visited[idx] {
            visited[idx] = true;
            queue.push_back((x, y));
        }
    };

    for (x, y) in seeds {
        if x < width && y < height {
            push(x, y, &mut queue);
        }
    }

    while let Some((x, y)) = queue.pop_front() {
        if !accept(x, y) {
            continue;
        }
        filled.push((x, y));
        if filled.len() > max_steps {
            return Err(StepLimitExceeded);
        }
        if x > 0 {
            push(x - 1, y, &mut queue);
        }
        if x + 1 < width {
            push(x + 1, y, &mut queue);
        }
        if y > 0 {
            push(x, y - 1, &mut queue);
        }
        if y + 1 < height {
            push(x, y + 1, &mut queue);
        }
    }

    Ok(filled)
}

/// Every pixel on the outer border of a `width`×`height` image.
fn border_pixels(width: u32, height: u32) -> impl Iterator<Item = (u32, u32)> {
    let top_bottom = (0..width).flat_map(move |x| [(x, 0), (x, height.saturating_sub(1))]);
    let left_right = (0..height).flat_map(move |y| [(0, y), (width.saturating_sub(1), y)]);
    top_bottom.chain(left_right)
}

/// Turn every dark pixel connected to the image border white.
///
/// Returns the number of pixels cleared.
///
/// # Errors
///
/// Returns [`StepLimitExceeded`] if the fill exceeds `width × height`
/// steps.
pub fn clear_border_connected(binary: &mut GrayImage) -> Result<usize, StepLimitExceeded> {
    let (width, height) = binary.dimensions();
    if width == 0 || height == 0 {
        return Ok(0);
    }
    let cap = width as usize * height as usize;
    let filled = {
        let source = &*binary;
        flood_region(width, height, border_pixels(width, height), cap, |x, y| {
            source.get_pixel(x, y).0[0] == 0
        })?
    };
    for &(x, y) in &filled {
        binary.put_pixel(x, y, Luma([255]));
    }
    Ok(filled.len())
}

/// Squared RGB distance between two pixels (alpha ignored).
#[must_use]
pub fn rgb_distance_squared(a: &Rgba<u8>, b: &Rgba<u8>) -> u32 {
    (0..3)
        .map(|c| {
            let d = i32::from(a.0[c]) - i32::from(b.0[c]);
            d.unsigned_abs() * d.unsigned_abs()
        })
        .sum()
}

/// Where the background fill starts: top centre, one row in.
#[must_use]
pub const fn background_seed(width: u32, height: u32) -> (u32, u32) {
    let y = if height > 1 { 1 } else { 0 };
    (width / 2, y)
}

/// Flatten the page background of a cropped colour image.
///
/// Fills every pixel 4-connected to the top-centre seed whose colour is
/// within `tolerance_sq` of the seed colour with pure white (light seed)
/// or pure black (dark seed). Returns `None`, leaving the caller's image
/// as it was, when the fill changes less than `min_coverage` of the
/// image or the step limit is reached. Pixels that already hold the fill
/// value do not count as changed.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn flatten_background(
    image: &RgbaImage,
    tolerance_sq: u32,
    min_coverage: f64,
) -> Option<RgbaImage> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return None;
    }
    let (sx, sy) = background_seed(width, height);
    let seed = *image.get_pixel(sx, sy);
    let total = width as usize * height as usize;

    let filled = flood_region(width, height, [(sx, sy)], total, |x, y| {
        rgb_distance_squared(image.get_pixel(x, y), &seed) <= tolerance_sq
    })
    .ok()?;

    let value = if luminance(&seed) >= 128 { 255 } else { 0 };
    let mut out = image.clone();
    let mut changed = 0usize;
    for (x, y) in filled {
        let pixel = out.get_pixel_mut(x, y);
        if pixel.0[..3] != [value; 3] {
            pixel.0[..3].copy_from_slice(&[value; 3]);
            changed += 1;
        }
    }

    let coverage = changed as f64 / total as f64;
    if coverage < min_coverage {
        log::debug!("background fill changed {coverage:.3} of the image, reverting");
        return None;
    }
    log::debug!("background fill changed {coverage:.3} of the image, kept");
    Some(out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn flood_region_respects_walls() {
        // Vertical wall at x = 2 splits a 5x3 image.
        let filled = flood_region(5, 3, [(0, 0)], 100, |x, _| x != 2).unwrap();
        assert_eq!(filled.len(), 6);
        assert!(filled.iter().all(|&(x, _)| x < 2));
    }

    #[test]
    fn flood_region_is_four_connected() {
        // Only the diagonal is accepted; a 4-connected fill stops at the seed.
        let filled = flood_region(4, 4, [(0, 0)], 100, |x, y| x == y).unwrap();
        assert_eq!(filled, vec![(0, 0)]);
    }

    #[test]
    fn flood_region_step_limit() {
        let result = flood_region(10, 10, [(0, 0)], 50, |_, _| true);
        assert_eq!(result, Err(StepLimitExceeded));
    }

    #[test]
    fn out_of_bounds_seed_is_ignored() {
        let filled = flood_region(3, 3, [(7, 7)], 100, |_, _| true).unwrap();
        assert!(filled.is_empty());
    }

    #[test]
    fn border_connected_dark_is_cleared() {
        // Dark frame along the border with a separate dark blob inside.
        let mut binary = GrayImage::from_fn(9, 9, |x, y| {
            let on_border = x == 0 || y == 0 || x == 8 || y == 8;
            let blob = (3..=5).contains(&x) && (3..=5).contains(&y);
            if on_border || blob { Luma([0]) } else { Luma([255]) }
        });
        let cleared = clear_border_connected(&mut binary).unwrap();
        assert_eq!(cleared, 32);
        assert_eq!(binary.get_pixel(0, 0).0[0], 255);
        assert_eq!(binary.get_pixel(4, 4).0[0], 0);
    }

    #[test]
    fn background_is_flattened_when_large() {
        let img = RgbaImage::from_fn(20, 20, |x, y| {
            if (5..15).contains(&x) && (5..15).contains(&y) {
                Rgba([200, 30, 30, 255])
            } else {
                Rgba([235, 238, 240, 255])
            }
        });
        let out = flatten_background(&img, 900, 0.25).unwrap();
        assert_eq!(out.get_pixel(0, 0), &Rgba([255, 255, 255, 255]));
        assert_eq!(out.get_pixel(10, 10), &Rgba([200, 30, 30, 255]));
    }

    #[test]
    fn small_background_fill_is_reverted() {
        // The seed sits in a thin strip covering only 10% of the image.
        let img = RgbaImage::from_fn(20, 20, |_, y| {
            if y < 2 {
                Rgba([240, 240, 240, 255])
            } else {
                Rgba([20, 120, 60, 255])
            }
        });
        assert!(flatten_background(&img, 900, 0.25).is_none());
    }

    #[test]
    fn already_flat_pixels_do_not_count_as_changed() {
        // The fill reaches 95% of the image, but only the off-white top
        // band (20%) actually changes colour.
        let img = RgbaImage::from_fn(20, 20, |x, y| {
            if y < 4 {
                Rgba([240, 240, 240, 255])
            } else if (8..12).contains(&x) && (8..13).contains(&y) {
                Rgba([200, 30, 30, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        });
        assert!(flatten_background(&img, 900, 0.25).is_none());
        assert!(flatten_background(&img, 900, 0.15).is_some());
    }

    #[test]
    fn dark_seed_fills_black() {
        let img = RgbaImage::from_pixel(6, 6, Rgba([30, 28, 35, 255]));
        let out = flatten_background(&img, 900, 0.25).unwrap();
        assert_eq!(out.get_pixel(3, 3), &Rgba([0, 0, 0, 255]));
    }
}
