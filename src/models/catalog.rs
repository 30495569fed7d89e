//! Model catalog in the service's `model.json` format.

use crate::error::{GenVideoError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

const BUILTIN_CATALOG: &str = include_str!("builtin.json");

/// Category of a generation model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum ModelCategory {
    /// Text-to-video.
    #[serde(rename = "t2v")]
    #[cfg_attr(feature = "cli", value(name = "t2v"))]
    TextToVideo,
    /// Image-to-video.
    #[serde(rename = "i2v")]
    #[cfg_attr(feature = "cli", value(name = "i2v"))]
    ImageToVideo,
    /// Reference-to-video.
    #[serde(rename = "r2v")]
    #[cfg_attr(feature = "cli", value(name = "r2v"))]
    ReferenceToVideo,
}

impl ModelCategory {
    /// Short identifier used on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TextToVideo => "t2v",
            Self::ImageToVideo => "i2v",
            Self::ReferenceToVideo => "r2v",
        }
    }
}

impl std::fmt::Display for ModelCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A model listed in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
    /// Identifier sent as `model` in requests.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Generation category.
    pub category: ModelCategory,
    /// Section description.
    pub description: String,
    /// Feature notes (resolution, speed, orientation, ...).
    pub features: Vec<String>,
    /// Whether this is the recommended model of its category.
    pub recommended: bool,
}

/// The set of known models, in catalog order.
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    models: Vec<ModelInfo>,
}

impl ModelCatalog {
    /// The catalog compiled into the binary.
    pub fn builtin() -> Self {
        // The embedded file is covered by tests.
        Self::from_json(BUILTIN_CATALOG).unwrap_or_default()
    }

    /// Loads a catalog from a `model.json` file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            GenVideoError::Config(format!("cannot read catalog {}: {e}", path.display()))
        })?;
        let catalog = Self::from_json(&text)?;
        tracing::debug!(path = %path.display(), models = catalog.len(), "loaded model catalog");
        Ok(catalog)
    }

    /// Loads `path` if given, otherwise the built-in catalog.
    pub fn load_or_builtin(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::builtin()),
        }
    }

    /// Parses catalog JSON.
    pub fn from_json(text: &str) -> Result<Self> {
        let file: CatalogFile = serde_json::from_str(text)?;
        let mut models = Vec::new();

        let versioned = [
            (ModelCategory::TextToVideo, file.video_generation_text_to_video),
            (ModelCategory::ImageToVideo, file.video_generation_image_to_video),
        ];
        for (category, section) in versioned {
            for version in section.veo_versions.into_values() {
                for raw in version.models {
                    if let Some(info) = raw.into_info(category, &section.description, true) {
                        models.push(info);
                    }
                }
            }
        }

        let r2v = file.video_generation_reference_to_video;
        for raw in r2v.models {
            if let Some(info) = raw.into_info(ModelCategory::ReferenceToVideo, &r2v.description, false)
            {
                models.push(info);
            }
        }

        Ok(Self { models })
    }

    /// Number of models.
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Returns true if the catalog has no models.
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Looks up a model by id.
    pub fn get(&self, id: &str) -> Result<&ModelInfo> {
        self.models.iter().find(|m| m.id == id).ok_or_else(|| {
            let mut ids: Vec<&str> = self.models.iter().map(|m| m.id.as_str()).collect();
            ids.sort_unstable();
            GenVideoError::ModelNotFound(format!("'{id}' (available: {})", ids.join(", ")))
        })
    }

    /// Lists models, optionally restricted to one category.
    pub fn list(&self, category: Option<ModelCategory>) -> Vec<&ModelInfo> {
        self.models
            .iter()
            .filter(|m| category.map_or(true, |c| m.category == c))
            .collect()
    }

    /// The first recommended model of `category`.
    pub fn recommended(&self, category: ModelCategory) -> Result<&ModelInfo> {
        self.models
            .iter()
            .find(|m| m.category == category && m.recommended)
            .ok_or_else(|| {
                GenVideoError::ModelNotFound(format!("no recommended model for category {category}"))
            })
    }
}

// model.json layout
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CatalogFile {
    video_generation_text_to_video: VersionedSection,
    video_generation_image_to_video: VersionedSection,
    video_generation_reference_to_video: FlatSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VersionedSection {
    description: String,
    veo_versions: BTreeMap<String, FlatSection>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FlatSection {
    description: String,
    models: Vec<RawModel>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawModel {
    id: Option<String>,
    name: Option<String>,
    features: Vec<String>,
    resolution: Option<String>,
    speed: Option<String>,
    orientation: Option<String>,
    recommended: bool,
}

impl RawModel {
    fn into_info(
        self,
        category: ModelCategory,
        description: &str,
        with_orientation: bool,
    ) -> Option<ModelInfo> {
        let id = self.id.filter(|id| !id.is_empty())?;
        let mut features = self.features;
        if let Some(resolution) = self.resolution {
            features.push(format!("Resolution: {resolution}"));
        }
        if let Some(speed) = self.speed {
            features.push(format!("Speed: {speed}"));
        }
        if with_orientation {
            if let Some(orientation) = self.orientation {
                features.push(format!("Orientation: {orientation}"));
            }
        }
        Some(ModelInfo {
            name: self.name.unwrap_or_else(|| id.clone()),
            id,
            category,
            description: description.to_string(),
            features,
            recommended: self.recommended && category != ModelCategory::ReferenceToVideo,
        })
    }
}
