//! Image generation module.

mod provider;
#[cfg(feature = "gemini-image")]
pub mod providers;
mod types;

pub use provider::ImageProvider;
pub use types::{
    AspectRatio, DataUrl, GeneratedMedia, GenerationSettings, ImageModel, ImageSize, SettingsForm,
};
