//! Pluggable collaborators of the controller.
//!
//! Perspective correction and player-mark detection are outside the core
//! recognition algorithm. The controller calls them through these traits
//! so hosts can plug in their own implementations; the built-in variants
//! do nothing.

use crate::types::{Annotation, GridStructure, PipelineError, RgbaImage};

/// Perspective correction applied to the cropped puzzle.
pub trait Unwarper {
    /// Return a rectified copy of `image`.
    ///
    /// # Errors
    ///
    /// Implementations report failures as [`PipelineError::Collaborator`].
    fn unwarp(&self, image: &RgbaImage) -> Result<RgbaImage, PipelineError>;
}

/// Built-in unwarp strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnwarpKind {
    /// Return the image unchanged.
    #[default]
    Passthrough,
}

impl Unwarper for UnwarpKind {
    fn unwarp(&self, image: &RgbaImage) -> Result<RgbaImage, PipelineError> {
        match *self {
            Self::Passthrough => Ok(image.clone()),
        }
    }
}

/// Detector for hand-drawn player marks.
pub trait AnnotationDetector {
    /// Find marks in `image`, whose grid lines are given by `grid`.
    ///
    /// # Errors
    ///
    /// Implementations report failures as [`PipelineError::Collaborator`].
    fn detect(
        &self,
        image: &RgbaImage,
        grid: &GridStructure,
    ) -> Result<Vec<Annotation>, PipelineError>;
}

/// Detector that never finds anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NoAnnotations;

impl AnnotationDetector for NoAnnotations {
    fn detect(
        &self,
        _image: &RgbaImage,
        _grid: &GridStructure,
    ) -> Result<Vec<Annotation>, PipelineError> {
        Ok(Vec::new())
    }
}

/// The collaborators used by one recognition run.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    /// Perspective correction.
    pub unwarper: &'a dyn Unwarper,
    /// Player-mark detection.
    pub annotations: &'a dyn AnnotationDetector,
}

impl Default for Collaborators<'static> {
    fn default() -> Self {
        Self {
            unwarper: &UnwarpKind::Passthrough,
            annotations: &NoAnnotations,
        }
    }
}

impl std::fmt::Debug for Collaborators<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
