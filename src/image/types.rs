//! Core types for image generation.

use crate::error::{GenStudioError, Result};
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use uuid::Uuid;

/// Prefix of every image payload produced by the generation client.
const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Image model variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageModel {
    /// Gemini 2.5 Flash Image (fast, economical).
    #[default]
    #[serde(rename = "gemini-2.5-flash-image")]
    Flash,
    /// Gemini 3 Pro Image (highest quality, selectable output size).
    #[serde(rename = "gemini-3-pro-image-preview")]
    Pro,
}

impl ImageModel {
    /// All variants, fast first.
    pub const ALL: [ImageModel; 2] = [ImageModel::Flash, ImageModel::Pro];

    /// Returns the API model identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flash => "gemini-2.5-flash-image",
            Self::Pro => "gemini-3-pro-image-preview",
        }
    }

    /// Returns a short human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Flash => "Gemini 2.5 Flash",
            Self::Pro => "Gemini 3 Pro",
        }
    }

    /// Returns true for the high-quality variant.
    pub fn is_high_quality(&self) -> bool {
        matches!(self, Self::Pro)
    }

    /// Whether the model accepts an output-size tier.
    pub fn supports_image_size(&self) -> bool {
        self.is_high_quality()
    }
}

impl std::fmt::Display for ImageModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ImageModel {
    type Err = GenStudioError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "flash" | "fast" | "gemini-2.5-flash-image" => Ok(Self::Flash),
            "pro" | "hq" | "gemini-3-pro-image-preview" => Ok(Self::Pro),
            other => Err(GenStudioError::InvalidSettings(format!(
                "unknown model '{other}' (expected flash or pro)"
            ))),
        }
    }
}

/// Supported aspect ratios.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AspectRatio {
    /// 1:1 square aspect ratio.
    #[default]
    #[serde(rename = "1:1")]
    Square,
    /// 4:3 standard landscape aspect ratio.
    #[serde(rename = "4:3")]
    Standard,
    /// 3:4 standard portrait aspect ratio.
    #[serde(rename = "3:4")]
    StandardPortrait,
    /// 16:9 landscape (widescreen) aspect ratio.
    #[serde(rename = "16:9")]
    Landscape,
    /// 9:16 portrait (tall) aspect ratio.
    #[serde(rename = "9:16")]
    Portrait,
}

impl AspectRatio {
    /// All ratios in selector order.
    pub const ALL: [AspectRatio; 5] = [
        AspectRatio::Square,
        AspectRatio::Standard,
        AspectRatio::StandardPortrait,
        AspectRatio::Landscape,
        AspectRatio::Portrait,
    ];

    /// Returns the aspect ratio as a string (e.g., "16:9").
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Square => "1:1",
            Self::Standard => "4:3",
            Self::StandardPortrait => "3:4",
            Self::Landscape => "16:9",
            Self::Portrait => "9:16",
        }
    }
}

impl std::fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = GenStudioError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|ratio| ratio.as_str() == s)
            .ok_or_else(|| {
                GenStudioError::InvalidSettings(format!(
                    "unsupported aspect ratio '{s}' (expected one of 1:1, 4:3, 3:4, 16:9, 9:16)"
                ))
            })
    }
}

/// Output-size tiers for the high-quality model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageSize {
    /// Roughly 1024px on the long edge.
    #[default]
    #[serde(rename = "1K")]
    OneK,
    /// Roughly 2048px on the long edge.
    #[serde(rename = "2K")]
    TwoK,
    /// Roughly 4096px on the long edge.
    #[serde(rename = "4K")]
    FourK,
}

impl ImageSize {
    /// All tiers, smallest first.
    pub const ALL: [ImageSize; 3] = [ImageSize::OneK, ImageSize::TwoK, ImageSize::FourK];

    /// Returns the tier tag (e.g., "2K").
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneK => "1K",
            Self::TwoK => "2K",
            Self::FourK => "4K",
        }
    }
}

impl std::fmt::Display for ImageSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ImageSize {
    type Err = GenStudioError;

    fn from_str(s: &str) -> Result<Self> {
        let upper = s.trim().to_uppercase();
        Self::ALL
            .into_iter()
            .find(|size| size.as_str() == upper)
            .ok_or_else(|| {
                GenStudioError::InvalidSettings(format!(
                    "unsupported image size '{}' (expected 1K, 2K or 4K)",
                    s.trim()
                ))
            })
    }
}

/// A request to generate an image.
///
/// Rebuilt from [`SettingsForm`] on every submission. `image_size` is only
/// ever set for [`ImageModel::Pro`]; [`GenerationSettings::validate`] enforces
/// that before the request leaves the process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationSettings {
    /// The text prompt describing the desired image.
    pub prompt: String,
    /// Elements to exclude from the image.
    pub negative_prompt: Option<String>,
    /// Output proportions.
    pub aspect_ratio: AspectRatio,
    /// Model variant.
    pub model: ImageModel,
    /// Output-size tier (high-quality model only).
    pub image_size: Option<ImageSize>,
}

impl GenerationSettings {
    /// Creates settings for the given prompt with default parameters.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            negative_prompt: None,
            aspect_ratio: AspectRatio::default(),
            model: ImageModel::default(),
            image_size: None,
        }
    }

    /// Sets the negative prompt. Blank text clears it.
    pub fn with_negative_prompt(mut self, negative: impl Into<String>) -> Self {
        self.negative_prompt = non_blank(negative.into());
        self
    }

    /// Sets the aspect ratio.
    pub fn with_aspect_ratio(mut self, ratio: AspectRatio) -> Self {
        self.aspect_ratio = ratio;
        self
    }

    /// Sets the model. Switching to the fast model drops any size tier.
    pub fn with_model(mut self, model: ImageModel) -> Self {
        self.model = model;
        if !model.supports_image_size() {
            self.image_size = None;
        }
        self
    }

    /// Sets the output-size tier. Ignored unless the model supports it.
    pub fn with_image_size(mut self, size: ImageSize) -> Self {
        if self.model.supports_image_size() {
            self.image_size = Some(size);
        }
        self
    }

    /// Checks the settings can be submitted.
    pub fn validate(&self) -> Result<()> {
        if self.prompt.trim().is_empty() {
            return Err(GenStudioError::InvalidSettings("prompt is empty".into()));
        }
        if self.image_size.is_some() && !self.model.supports_image_size() {
            return Err(GenStudioError::InvalidSettings(format!(
                "image size is only supported by {}",
                ImageModel::Pro
            )));
        }
        Ok(())
    }
}

/// Raw form state as entered by the user.
///
/// Unlike [`GenerationSettings`], the form remembers the selected size tier
/// while the fast model is active so switching back restores it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsForm {
    /// Prompt text.
    pub prompt: String,
    /// Negative prompt text, possibly empty.
    pub negative_prompt: String,
    /// Selected aspect ratio.
    pub aspect_ratio: AspectRatio,
    /// Selected model.
    pub model: ImageModel,
    /// Selected size tier.
    pub image_size: ImageSize,
}

impl SettingsForm {
    /// Returns true when the prompt holds something other than whitespace.
    pub fn has_prompt(&self) -> bool {
        !self.prompt.trim().is_empty()
    }

    /// Builds the settings for a submission from the current form state.
    pub fn to_settings(&self) -> GenerationSettings {
        GenerationSettings {
            prompt: self.prompt.clone(),
            negative_prompt: non_blank(self.negative_prompt.clone()),
            aspect_ratio: self.aspect_ratio,
            model: self.model,
            image_size: self
                .model
                .supports_image_size()
                .then_some(self.image_size),
        }
    }
}

fn non_blank(text: String) -> Option<String> {
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

/// A self-contained `data:` URI holding inline image bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataUrl(String);

impl DataUrl {
    /// Wraps already base64-encoded PNG data.
    pub fn from_base64_png(data: &str) -> Self {
        Self(format!("{PNG_DATA_URL_PREFIX}{data}"))
    }

    /// Returns the full URI.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the base64 portion of the URI.
    pub fn base64_data(&self) -> &str {
        self.0
            .split_once(',')
            .map(|(_, data)| data)
            .unwrap_or_default()
    }

    /// Decodes the inline bytes.
    pub fn decode(&self) -> Result<Vec<u8>> {
        let (header, data) = self
            .0
            .split_once(',')
            .ok_or_else(|| GenStudioError::Decode("data URL has no payload".into()))?;
        if !header.starts_with("data:") || !header.ends_with(";base64") {
            return Err(GenStudioError::Decode(format!(
                "not a base64 data URL: {header}"
            )));
        }
        base64::engine::general_purpose::STANDARD
            .decode(data)
            .map_err(|e| GenStudioError::Decode(e.to_string()))
    }
}

impl std::fmt::Display for DataUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A completed generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedMedia {
    /// Unique identity.
    pub id: Uuid,
    /// Inline image payload.
    pub url: DataUrl,
    /// Prompt that produced the image.
    pub prompt: String,
    /// Negative prompt that was applied, if any.
    pub negative_prompt: Option<String>,
    /// Requested aspect ratio.
    pub aspect_ratio: AspectRatio,
    /// Model that generated the image.
    pub model: ImageModel,
    /// When the generation completed.
    pub timestamp: DateTime<Utc>,
}

impl GeneratedMedia {
    /// Wraps a successful payload with a fresh identity and the current time.
    pub fn new(url: DataUrl, settings: &GenerationSettings) -> Self {
        Self {
            id: Uuid::new_v4(),
            url,
            prompt: settings.prompt.clone(),
            negative_prompt: settings.negative_prompt.clone(),
            aspect_ratio: settings.aspect_ratio,
            model: settings.model,
            timestamp: Utc::now(),
        }
    }

    /// File name used when downloading this image.
    pub fn download_file_name(&self) -> String {
        let id = self.id.simple().to_string();
        format!("genstudio-creation-{}.png", &id[..8])
    }

    /// Decodes the image bytes.
    pub fn bytes(&self) -> Result<Vec<u8>> {
        self.url.decode()
    }

    /// Saves the image to the specified path.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.bytes()?)?;
        Ok(())
    }

    /// Saves the image into `dir` under its download name, returning the path.
    pub fn download_to(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let path = dir.as_ref().join(self.download_file_name());
        self.save(&path)?;
        Ok(path)
    }
}
