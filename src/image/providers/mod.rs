//! Image generation providers.

mod gemini;

pub use gemini::{GeminiProvider, GeminiProviderBuilder, BASE_URL_ENV_VAR, DEFAULT_BASE_URL};
