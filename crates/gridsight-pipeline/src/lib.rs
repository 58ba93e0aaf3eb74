//! gridsight-pipeline: Pure puzzle recognition pipeline (sans-IO).
//!
//! Recovers the N×N cell grid of a square region puzzle and its
//! partition into N contiguous regions from a photo or screenshot:
//! preprocess (threshold, shape analysis, crop) -> unwarp -> grid line
//! detection -> background-inversion check -> region enhancement and
//! brightness sweep -> cell extraction -> optional annotation detection.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! byte slices and image buffers and returns structured data. Progress,
//! timing and the perspective/annotation steps are injected by the host.

pub mod background;
pub mod blur;
pub mod collaborators;
pub mod color;
pub mod contour;
pub mod controller;
pub mod crop;
pub mod diagnostics;
pub mod downsample;
pub mod durability;
pub mod enhance;
pub mod extract;
pub mod flood;
pub mod grayscale;
pub mod inversion;
pub mod lines;
pub mod ownership;
pub mod preprocess;
pub mod shapes;
pub mod simplify;
pub mod threshold;
pub mod types;

pub use collaborators::{AnnotationDetector, Collaborators, NoAnnotations, UnwarpKind, Unwarper};
pub use contour::{ContourTracer, ContourTracerKind};
pub use controller::{Input, RegionStrategy, Stage, StagedResult};
pub use diagnostics::{Clock, NoClock, RecognitionDiagnostics};
pub use downsample::DownsampleFilter;
pub use ownership::OwnershipMap;
pub use types::{
    Annotation, BackgroundMode, Cell, Dimensions, ErrorClass, GrayImage, GridStructure, Mark,
    PipelineConfig, PipelineError, PuzzleGrid, RecognitionResult, RegionBorders, RgbaImage,
};

/// Recognise the puzzle in encoded image bytes.
///
/// Takes raw image bytes (PNG, JPEG, BMP, WebP) and a configuration and
/// returns the recovered grid. Perspective correction is the identity
/// and no annotations are detected; use [`recognize_with`] to plug in
/// real collaborators.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `image_bytes` is empty,
/// [`PipelineError::ImageDecode`] if the format is unrecognized, and the
/// error of the last attempt when no background assumption yields a
/// valid grid.
pub fn recognize(
    image_bytes: &[u8],
    config: &PipelineConfig,
) -> Result<RecognitionResult, PipelineError> {
    recognize_with(image_bytes, config, Collaborators::default(), |_| {})
}

/// Recognise the puzzle in already decoded pixels.
///
/// # Errors
///
/// See [`recognize`].
pub fn recognize_image(
    image: &RgbaImage,
    config: &PipelineConfig,
) -> Result<RecognitionResult, PipelineError> {
    let mut progress = |_: Stage| {};
    controller::run(
        Input::Decoded(image),
        config,
        Collaborators::default(),
        &mut progress,
        &NoClock,
    )
    .0
    .map(|staged| staged.result)
}

/// Recognise with host collaborators, reporting progress at every stage
/// boundary.
///
/// # Errors
///
/// See [`recognize`]. Collaborator failures end the run immediately.
pub fn recognize_with(
    image_bytes: &[u8],
    config: &PipelineConfig,
    collaborators: Collaborators<'_>,
    mut progress: impl FnMut(Stage),
) -> Result<RecognitionResult, PipelineError> {
    controller::run(
        Input::Encoded(image_bytes),
        config,
        collaborators,
        &mut progress,
        &NoClock,
    )
    .0
    .map(|staged| staged.result)
}

/// Recognise and return the accepted intermediates alongside the result.
///
/// # Errors
///
/// See [`recognize`].
pub fn recognize_staged(
    input: Input<'_>,
    config: &PipelineConfig,
) -> Result<StagedResult, PipelineError> {
    let mut progress = |_: Stage| {};
    controller::run(input, config, Collaborators::default(), &mut progress, &NoClock).0
}

/// Recognise while timing every stage with `clock`.
///
/// The diagnostics cover failed runs too.
pub fn recognize_with_diagnostics<C: Clock>(
    input: Input<'_>,
    config: &PipelineConfig,
    collaborators: Collaborators<'_>,
    clock: &C,
) -> (Result<StagedResult, PipelineError>, RecognitionDiagnostics) {
    let mut progress = |stage: Stage| log::debug!("{stage}");
    controller::run(input, config, collaborators, &mut progress, clock)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn encode_png(img: &RgbaImage) -> Vec<u8> {
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

    #[test]
    fn recognize_empty_input() {
        let result = recognize(&[], &PipelineConfig::default());
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn recognize_corrupt_input() {
        let result = recognize(&[0xFF, 0x00], &PipelineConfig::default());
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn recognize_uniform_image_finds_no_shapes() {
        let img = RgbaImage::from_pixel(40, 40, image::Rgba([128, 128, 128, 255]));
        let result = recognize(&encode_png(&img), &PipelineConfig::default());
        assert!(
            matches!(&result, Err(e) if e.class() == ErrorClass::GeometryRejection),
            "got {result:?}"
        );
    }

    #[test]
    fn empty_decoded_image_is_rejected() {
        let img = RgbaImage::new(0, 0);
        let result = recognize_image(&img, &PipelineConfig::default());
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn progress_starts_with_loading() {
        let img = RgbaImage::from_pixel(40, 40, image::Rgba([255, 255, 255, 255]));
        let mut stages = Vec::new();
        let _ = recognize_with(
            &encode_png(&img),
            &PipelineConfig::default(),
            Collaborators::default(),
            |s| stages.push(s),
        );
        assert_eq!(stages.first(), Some(&Stage::Loading));
    }

    #[test]
    fn diagnostics_cover_failed_runs() {
        let img = RgbaImage::from_pixel(40, 40, image::Rgba([0, 0, 0, 255]));
        let (result, diagnostics) = recognize_with_diagnostics(
            Input::Decoded(&img),
            &PipelineConfig::default(),
            Collaborators::default(),
            &NoClock,
        );
        assert!(result.is_err());
        assert_eq!(diagnostics.summary.attempt_count, 2);
        assert_eq!(diagnostics.summary.image_width, 40);
        assert!(diagnostics.decode.is_none());
        assert!(diagnostics.downsample.is_some());
    }
}
