//! Picks the model for a request.

use super::catalog::ModelCatalog;
use crate::error::{InvalidInput, Result};
use crate::video::GenerationMode;

/// Frame orientation of the generated video.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Orientation {
    /// 16:9.
    #[default]
    Landscape,
    /// 9:16.
    Portrait,
}

/// Chooses a model id from the request shape.
#[derive(Debug, Clone, Copy)]
pub struct ModelSelector<'a> {
    catalog: &'a ModelCatalog,
}

impl<'a> ModelSelector<'a> {
    /// Creates a selector validating against `catalog`.
    pub fn new(catalog: &'a ModelCatalog) -> Self {
        Self { catalog }
    }

    /// Returns the model to use.
    ///
    /// A manual choice must exist in the catalog. Otherwise text-to-video
    /// uses the fast model, one image uses the standard image model and two
    /// images use the first/last frame model, each in the requested
    /// orientation.
    pub fn select(
        &self,
        mode: GenerationMode,
        image_count: usize,
        manual: Option<&str>,
        orientation: Orientation,
    ) -> Result<String> {
        if let Some(id) = manual {
            return Ok(self.catalog.get(id)?.id.clone());
        }

        let portrait = orientation == Orientation::Portrait;
        let id = match (mode, image_count) {
            (GenerationMode::TextToVideo, _) if portrait => "veo_3_1_t2v_fast_portrait",
            (GenerationMode::TextToVideo, _) => "veo_3_1_t2v_fast_landscape",
            (GenerationMode::ImageToVideo, 1) if portrait => "veo_3_1_i2v_s_portrait",
            (GenerationMode::ImageToVideo, 1) => "veo_3_1_i2v_s_landscape",
            (GenerationMode::ImageToVideo, 2) if portrait => "veo_3_1_i2v_s_fast_portrait_fl",
            (GenerationMode::ImageToVideo, 2) => "veo_3_1_i2v_s_fast_fl",
            (GenerationMode::ImageToVideo, n) => return Err(InvalidInput::ImageCount(n).into()),
        };
        tracing::debug!(model = id, %mode, image_count, "auto-selected model");
        Ok(id.to_string())
    }
}
