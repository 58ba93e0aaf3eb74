//! Image downsampling to a bounded working resolution.
//!
//! Photos arrive at arbitrary sizes. Shape analysis, line detection and
//! the brightness sweep all run on a copy whose longest axis is at most
//! `working_resolution`; the returned scale factor maps coordinates found
//! on that copy back onto the full-resolution source.
//!
//! If the image is already at or below the target resolution, it is
//! returned unchanged with a scale of 1.0.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::RgbaImage;

/// Resampling filter used when downsampling.
///
/// Ordered from fastest/lowest-quality to slowest/highest-quality,
/// with a `Disabled` variant to skip downsampling entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DownsampleFilter {
    /// Disabled: skip downsampling regardless of image size.
    Disabled,
    /// Nearest-neighbor: fastest, blocky artifacts.
    Nearest,
    /// Bilinear interpolation: fast, decent quality.
    #[default]
    Triangle,
    /// Bicubic (Catmull-Rom): moderate speed, good quality.
    CatmullRom,
    /// Gaussian: moderate speed, smooth output.
    Gaussian,
    /// Lanczos with 3 lobes: slowest, sharpest/best for photos.
    Lanczos3,
}

impl DownsampleFilter {
    /// Convert to the `image` crate's `FilterType`.
    ///
    /// Returns `None` for [`DownsampleFilter::Disabled`] since there is
    /// no corresponding resampling filter.
    const fn to_image_filter(self) -> Option<image::imageops::FilterType> {
        match self {
            Self::Disabled => None,
            Self::Nearest => Some(image::imageops::FilterType::Nearest),
            Self::Triangle => Some(image::imageops::FilterType::Triangle),
            Self::CatmullRom => Some(image::imageops::FilterType::CatmullRom),
            Self::Gaussian => Some(image::imageops::FilterType::Gaussian),
            Self::Lanczos3 => Some(image::imageops::FilterType::Lanczos3),
        }
    }
}

impl fmt::Display for DownsampleFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => f.write_str("Disabled"),
            Self::Nearest => f.write_str("Nearest"),
            Self::Triangle => f.write_str("Triangle"),
            Self::CatmullRom => f.write_str("CatmullRom"),
            Self::Gaussian => f.write_str("Gaussian"),
            Self::Lanczos3 => f.write_str("Lanczos3"),
        }
    }
}

/// A bounded-size working copy of a larger image.
#[derive(Debug, Clone)]
pub struct WorkingCopy {
    /// The (possibly) downsampled image.
    pub image: RgbaImage,
    /// Full-resolution pixels per working pixel (>= 1.0).
    pub scale: f64,
}

/// Downsample `image` so the longest axis is at most `max_dimension`
/// pixels, using the specified resampling filter.
///
/// Aspect ratio is preserved. The source is never modified.
#[must_use]
pub fn downsample(image: &RgbaImage, max_dimension: u32, filter: DownsampleFilter) -> WorkingCopy {
    let unchanged = || WorkingCopy {
        image: image.clone(),
        scale: 1.0,
    };

    let Some(image_filter) = filter.to_image_filter() else {
        return unchanged();
    };

    let (w, h) = image.dimensions();
    let long_axis = w.max(h);
    if long_axis <= max_dimension || max_dimension == 0 {
        return unchanged();
    }

    let ratio = f64::from(max_dimension) / f64::from(long_axis);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let (new_w, new_h) = (
        ((f64::from(w) * ratio).round() as u32).max(1),
        ((f64::from(h) * ratio).round() as u32).max(1),
    );
    let resized = image::imageops::resize(image, new_w, new_h, image_filter);
    WorkingCopy {
        image: resized,
        scale: f64::from(w) / f64::from(new_w),
    }
}
