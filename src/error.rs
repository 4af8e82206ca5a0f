//! Error types for image generation and the studio session.

/// Message shown when the selected API key is missing or rejected.
pub const API_KEY_MESSAGE: &str = "API Key Error. Please ensure a valid paid API key is selected.";

/// Message shown for every other generation failure.
pub const GENERIC_FAILURE_MESSAGE: &str =
    "Failed to create image. The prompt might have triggered a safety filter or the server is busy.";

/// Transport message that signals the selected credential is not usable.
pub(crate) const ENTITY_NOT_FOUND: &str = "Requested entity was not found";

/// Longest error body carried inside an error, in characters.
const MAX_ERROR_LEN: usize = 500;

/// Errors that can occur during image generation.
#[derive(Debug, thiserror::Error)]
pub enum GenStudioError {
    /// API key missing, invalid, or not selected; the user should pick another.
    #[error("API key rejected: {0}")]
    ApiKeyInvalid(String),

    /// The generation call returned no candidate content.
    #[error("generation produced no results")]
    NoResult,

    /// Candidate content was present but carried no image part.
    #[error("image data missing from response")]
    MissingImageData,

    /// Any other transport or runtime failure.
    #[error("generation failed: {0}")]
    GenerationFailed(String),

    /// Settings were rejected before submission.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// Failed to decode an image payload.
    #[error("failed to decode: {0}")]
    Decode(String),

    /// I/O error (e.g., saving file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GenStudioError {
    /// Classifies a raw transport failure message.
    ///
    /// Any message mentioning a missing entity is treated as a credential
    /// problem, even when the underlying cause might be an unknown model.
    pub fn from_transport(message: impl AsRef<str>) -> Self {
        let raw = message.as_ref();
        let message = sanitize_error_message(raw);
        if raw.contains(ENTITY_NOT_FOUND) {
            Self::ApiKeyInvalid(message)
        } else {
            Self::GenerationFailed(message)
        }
    }

    /// Returns true if the user should be asked to select another key.
    pub fn requires_key_selection(&self) -> bool {
        matches!(self, Self::ApiKeyInvalid(_))
    }

    /// Returns the user-visible message for this error.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::ApiKeyInvalid(_) => API_KEY_MESSAGE,
            _ => GENERIC_FAILURE_MESSAGE,
        }
    }
}

impl From<reqwest::Error> for GenStudioError {
    fn from(err: reqwest::Error) -> Self {
        Self::from_transport(err.to_string())
    }
}

/// Trims whitespace and truncates overly long error bodies.
pub(crate) fn sanitize_error_message(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= MAX_ERROR_LEN {
        return trimmed.to_string();
    }
    let mut truncated: String = trimmed.chars().take(MAX_ERROR_LEN).collect();
    truncated.push_str("...");
    truncated
}

/// Result type alias for image generation operations.
pub type Result<T> = std::result::Result<T, GenStudioError>;
