#![warn(missing_docs)]
//! GenStudio - text-to-image generation with an in-memory session history.
//!
//! The crate wraps Google's Gemini image models behind a small settings model
//! and a session controller that tracks every successful generation.
//!
//! # Quick Start
//!
//! ```no_run
//! use genstudio::{GeminiProvider, GenerationSettings, ImageModel, ImageProvider};
//!
//! #[tokio::main]
//! async fn main() -> genstudio::Result<()> {
//!     let provider = GeminiProvider::builder().build()?;
//!     let settings = GenerationSettings::new("A golden retriever puppy")
//!         .with_model(ImageModel::Flash);
//!     let image = provider.generate(&settings).await?;
//!     std::fs::write("puppy.png", image.decode()?)?;
//!     Ok(())
//! }
//! ```
//!
//! # Sessions
//!
//! ```no_run
//! use genstudio::{GeminiProvider, StudioController};
//!
//! #[tokio::main]
//! async fn main() -> genstudio::Result<()> {
//!     let mut studio = StudioController::new(GeminiProvider::builder().build()?);
//!     studio.form_mut().prompt = "A lighthouse at dusk".into();
//!     studio.submit().await;
//!     if let Some(media) = studio.current() {
//!         media.download_to(".")?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `gemini-image`: Gemini (Google) provider
//! - `cli`: Command-line interface

pub mod credentials;
mod error;
pub mod image;
pub mod session;

// Re-export error types at crate root
pub use error::{GenStudioError, Result, API_KEY_MESSAGE, GENERIC_FAILURE_MESSAGE};

pub use credentials::{CredentialHost, KeySlot, NoCredentialHost};

pub use image::{
    AspectRatio, DataUrl, GeneratedMedia, GenerationSettings, ImageModel, ImageProvider,
    ImageSize, SettingsForm,
};

#[cfg(feature = "gemini-image")]
pub use image::providers::{GeminiProvider, GeminiProviderBuilder};

pub use session::{History, Phase, StatusTicker, StudioController, SubmitOutcome, TickerStatus};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::credentials::{CredentialHost, KeySlot, NoCredentialHost};
    pub use crate::error::{GenStudioError, Result};
    pub use crate::image::{
        AspectRatio, GeneratedMedia, GenerationSettings, ImageModel, ImageProvider, ImageSize,
    };
    pub use crate::session::{StudioController, SubmitOutcome};

    #[cfg(feature = "gemini-image")]
    pub use crate::image::providers::GeminiProvider;
}
