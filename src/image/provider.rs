//! Image provider trait.

use crate::error::Result;
use crate::image::types::{DataUrl, GenerationSettings, ImageModel};
use async_trait::async_trait;

/// Trait for image generation backends.
///
/// A call is a single best-effort attempt; failures are already classified
/// into the [`GenStudioError`](crate::GenStudioError) taxonomy.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Generates an image, returning it as an inline `data:` URI.
    async fn generate(&self, settings: &GenerationSettings) -> Result<DataUrl>;

    /// Returns the name of this provider for display.
    fn name(&self) -> &str;

    /// Checks if the provider is reachable and authenticated for `model`.
    async fn health_check(&self, model: ImageModel) -> Result<()>;
}

#[async_trait]
impl<T: ImageProvider + ?Sized> ImageProvider for std::sync::Arc<T> {
    async fn generate(&self, settings: &GenerationSettings) -> Result<DataUrl> {
        (**self).generate(settings).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    async fn health_check(&self, model: ImageModel) -> Result<()> {
        (**self).health_check(model).await
    }
}
