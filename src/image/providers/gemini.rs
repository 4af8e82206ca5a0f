//! Gemini (Google) image generation provider.

use crate::credentials::KeySlot;
use crate::error::{GenStudioError, Result};
use crate::image::provider::ImageProvider;
use crate::image::types::{DataUrl, GenerationSettings, ImageModel};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Default Generative Language API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Environment variable overriding the API endpoint.
pub const BASE_URL_ENV_VAR: &str = "GENSTUDIO_BASE_URL";

/// Builder for GeminiProvider.
#[derive(Clone, Default)]
pub struct GeminiProviderBuilder {
    api_key: Option<String>,
    key_slot: Option<KeySlot>,
    base_url: Option<String>,
}

impl std::fmt::Debug for GeminiProviderBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProviderBuilder")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("key_slot", &self.key_slot)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl GeminiProviderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to `GEMINI_API_KEY`, then `API_KEY`.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Reads the API key from a shared slot on every request.
    ///
    /// Takes precedence over [`api_key`](Self::api_key).
    pub fn key_slot(mut self, slot: KeySlot) -> Self {
        self.key_slot = Some(slot);
        self
    }

    /// Overrides the API endpoint. Falls back to `GENSTUDIO_BASE_URL`.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Builds the provider.
    ///
    /// A missing key is not an error here: the key may be selected later
    /// through the slot, and requests without one fail as
    /// [`GenStudioError::ApiKeyInvalid`].
    pub fn build(self) -> Result<GeminiProvider> {
        let keys = match (self.key_slot, self.api_key) {
            (Some(slot), _) => slot,
            (None, Some(key)) => KeySlot::new(Some(key)),
            (None, None) => KeySlot::from_env(),
        };
        let base_url = self
            .base_url
            .or_else(|| std::env::var(BASE_URL_ENV_VAR).ok())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let client = reqwest::Client::builder()
            .user_agent(concat!("genstudio/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(GeminiProvider {
            client,
            keys,
            base_url,
        })
    }
}

/// Gemini image generation provider.
pub struct GeminiProvider {
    client: reqwest::Client,
    keys: KeySlot,
    base_url: String,
}

impl GeminiProvider {
    /// Creates a new `GeminiProviderBuilder`.
    pub fn builder() -> GeminiProviderBuilder {
        GeminiProviderBuilder::new()
    }

    /// Returns the slot the provider reads its key from.
    pub fn key_slot(&self) -> &KeySlot {
        &self.keys
    }

    fn api_key(&self) -> Result<String> {
        self.keys
            .get()
            .ok_or_else(|| GenStudioError::ApiKeyInvalid("no API key selected".into()))
    }

    fn model_url(&self, model: ImageModel) -> String {
        format!("{}/v1beta/models/{}", self.base_url, model.as_str())
    }

    async fn generate_impl(&self, settings: &GenerationSettings) -> Result<DataUrl> {
        settings.validate()?;
        let api_key = self.api_key()?;
        let start = Instant::now();

        let url = format!("{}:generateContent", self.model_url(settings.model));
        let body = GeminiRequest::from_settings(settings);

        tracing::debug!(
            model = %settings.model,
            aspect_ratio = %settings.aspect_ratio,
            image_size = ?settings.image_size,
            "submitting generation request"
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(parse_error(status.as_u16(), &text));
        }

        let gemini_response: GeminiResponse = response.json().await?;
        let image = gemini_response.into_image()?;

        tracing::debug!(
            duration_ms = start.elapsed().as_millis() as u64,
            "generation complete"
        );
        Ok(image)
    }
}

/// Maps a non-success HTTP response onto the error taxonomy.
fn parse_error(status: u16, text: &str) -> GenStudioError {
    let message = serde_json::from_str::<GeminiErrorEnvelope>(text)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| text.to_string());
    GenStudioError::from_transport(format!("{status}: {message}"))
}

#[async_trait]
impl ImageProvider for GeminiProvider {
    async fn generate(&self, settings: &GenerationSettings) -> Result<DataUrl> {
        self.generate_impl(settings).await
    }

    fn name(&self) -> &str {
        "Gemini (Google)"
    }

    async fn health_check(&self, model: ImageModel) -> Result<()> {
        let api_key = self.api_key()?;
        let response = self
            .client
            .get(self.model_url(model))
            .header("x-goog-api-key", api_key)
            .send()
            .await?;

        match response.status().as_u16() {
            401 | 403 => Err(GenStudioError::ApiKeyInvalid("invalid API key".into())),
            s if !(200..300).contains(&s) => {
                let text = response.text().await.unwrap_or_default();
                Err(parse_error(s, &text))
            }
            _ => Ok(()),
        }
    }
}

/// Joins the prompt with the exclusion instruction, if any.
fn compose_prompt(settings: &GenerationSettings) -> String {
    match settings.negative_prompt.as_deref() {
        Some(negative) if !negative.trim().is_empty() => format!(
            "{}\n\nEXCLUSION CRITERIA (Do not include these elements): {}",
            settings.prompt, negative
        ),
        _ => settings.prompt.clone(),
    }
}

// Request/Response types
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiTextPart>,
}

#[derive(Debug, Serialize)]
struct GeminiTextPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiConfig {
    response_modalities: Vec<String>,
    image_config: ImageConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageConfig {
    aspect_ratio: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_size: Option<&'static str>,
}

impl GeminiRequest {
    fn from_settings(settings: &GenerationSettings) -> Self {
        let image_size = settings
            .image_size
            .filter(|_| settings.model.supports_image_size())
            .map(|size| size.as_str());

        Self {
            contents: vec![GeminiContent {
                parts: vec![GeminiTextPart {
                    text: compose_prompt(settings),
                }],
            }],
            generation_config: GeminiConfig {
                response_modalities: vec!["IMAGE".to_string()],
                image_config: ImageConfig {
                    aspect_ratio: settings.aspect_ratio.as_str(),
                    image_size,
                },
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContentResponse>,
}

#[derive(Debug, Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Option<Vec<GeminiPartResponse>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPartResponse {
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    data: String,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorEnvelope {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    message: String,
}

impl GeminiResponse {
    /// Returns the first inline image of the first candidate.
    fn into_image(self) -> Result<DataUrl> {
        let parts = self
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .and_then(|content| content.parts)
            .ok_or(GenStudioError::NoResult)?;

        parts
            .into_iter()
            .find_map(|part| part.inline_data)
            .map(|inline| DataUrl::from_base64_png(&inline.data))
            .ok_or(GenStudioError::MissingImageData)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::types::{AspectRatio, ImageSize};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_provider(base_url: &str) -> GeminiProvider {
        GeminiProviderBuilder::new()
            .api_key("test-key")
            .base_url(base_url)
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_debug_redacts_api_key() {
        let builder = GeminiProviderBuilder::new()
            .api_key("AIza-secret-key")
            .base_url("http://localhost:1234");
        let rendered = format!("{builder:?}");

        assert!(!rendered.contains("AIza-secret-key"), "{rendered}");
        assert!(rendered.contains("<redacted>"));
        assert!(rendered.contains("http://localhost:1234"));
    }

    fn image_response() -> serde_json::Value {
        serde_json::json!({
            "candidates": [{
                "content": {
                    "parts": [
                        { "text": "Here is your image" },
                        { "inlineData": { "mimeType": "image/png", "data": "iVBORw0KGgo=" } }
                    ]
                },
                "finishReason": "STOP"
            }]
        })
    }

    #[test]
    fn test_compose_prompt_with_negative() {
        let settings = GenerationSettings::new("A puppy").with_negative_prompt("text, watermark");
        assert_eq!(
            compose_prompt(&settings),
            "A puppy\n\nEXCLUSION CRITERIA (Do not include these elements): text, watermark"
        );
        assert_eq!(compose_prompt(&GenerationSettings::new("A puppy")), "A puppy");
    }

    #[test]
    fn test_request_omits_size_for_fast_model() {
        let mut settings = GenerationSettings::new("a red cube");
        settings.image_size = Some(ImageSize::FourK);
        let json = serde_json::to_value(GeminiRequest::from_settings(&settings)).unwrap();

        let image_config = &json["generationConfig"]["imageConfig"];
        assert_eq!(image_config["aspectRatio"], "1:1");
        assert!(image_config.get("imageSize").is_none());
    }

    #[test]
    fn test_request_includes_size_for_pro_model() {
        let settings = GenerationSettings::new("a red cube")
            .with_model(ImageModel::Pro)
            .with_image_size(ImageSize::TwoK)
            .with_aspect_ratio(AspectRatio::Landscape);
        let json = serde_json::to_value(GeminiRequest::from_settings(&settings)).unwrap();

        let image_config = &json["generationConfig"]["imageConfig"];
        assert_eq!(image_config["aspectRatio"], "16:9");
        assert_eq!(image_config["imageSize"], "2K");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "a red cube");
    }

    #[test]
    fn test_response_first_inline_part_wins() {
        let resp: GeminiResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{
                "content": { "parts": [
                    { "inlineData": { "mimeType": "image/png", "data": "Zmlyc3Q=" } },
                    { "inlineData": { "mimeType": "image/png", "data": "c2Vjb25k" } }
                ]}
            }]
        }))
        .unwrap();
        assert_eq!(
            resp.into_image().unwrap().as_str(),
            "data:image/png;base64,Zmlyc3Q="
        );
    }

    #[test]
    fn test_response_without_candidates_is_no_result() {
        let resp: GeminiResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        assert!(matches!(resp.into_image(), Err(GenStudioError::NoResult)));

        let resp: GeminiResponse =
            serde_json::from_str(r#"{"candidates": [{"finishReason": "IMAGE_SAFETY"}]}"#).unwrap();
        assert!(matches!(resp.into_image(), Err(GenStudioError::NoResult)));
    }

    #[test]
    fn test_response_without_image_part_is_missing_data() {
        let resp: GeminiResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [{"text": "I cannot draw that"}]}}]}"#,
        )
        .unwrap();
        assert!(matches!(
            resp.into_image(),
            Err(GenStudioError::MissingImageData)
        ));
    }

    #[test]
    fn test_parse_error_reads_google_envelope() {
        let body = r#"{"error": {"code": 404, "message": "Requested entity was not found.", "status": "NOT_FOUND"}}"#;
        assert!(matches!(
            parse_error(404, body),
            GenStudioError::ApiKeyInvalid(_)
        ));

        match parse_error(503, "upstream overloaded") {
            GenStudioError::GenerationFailed(msg) => assert_eq!(msg, "503: upstream overloaded"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_generate_success() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash-image:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(image_response()))
            .expect(1)
            .mount(&server)
            .await;

        let provider = test_provider(&server.uri());
        let image = provider
            .generate(&GenerationSettings::new("a red cube"))
            .await
            .unwrap();
        assert_eq!(image.as_str(), "data:image/png;base64,iVBORw0KGgo=");

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert!(body["generationConfig"]["imageConfig"]
            .get("imageSize")
            .is_none());
    }

    #[tokio::test]
    async fn test_generate_entity_not_found_is_key_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "error": {
                    "code": 404,
                    "message": "Requested entity was not found.",
                    "status": "NOT_FOUND"
                }
            })))
            .mount(&server)
            .await;

        let provider = test_provider(&server.uri());
        let err = provider
            .generate(&GenerationSettings::new("a red cube").with_model(ImageModel::Pro))
            .await
            .unwrap_err();
        assert!(matches!(err, GenStudioError::ApiKeyInvalid(_)));
    }

    #[tokio::test]
    async fn test_generate_server_error_is_generation_failed() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
            .mount(&server)
            .await;

        let provider = test_provider(&server.uri());
        let err = provider
            .generate(&GenerationSettings::new("a red cube"))
            .await
            .unwrap_err();
        assert!(matches!(err, GenStudioError::GenerationFailed(_)));
    }

    #[tokio::test]
    async fn test_generate_without_key_makes_no_request() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(image_response()))
            .expect(0)
            .mount(&server)
            .await;

        let provider = GeminiProviderBuilder::new()
            .key_slot(KeySlot::new(None))
            .base_url(server.uri())
            .build()
            .unwrap();
        let err = provider
            .generate(&GenerationSettings::new("a red cube"))
            .await
            .unwrap_err();
        assert!(matches!(err, GenStudioError::ApiKeyInvalid(_)));
    }

    #[tokio::test]
    async fn test_generate_rejects_blank_prompt() {
        let provider = test_provider("http://127.0.0.1:9");
        let err = provider
            .generate(&GenerationSettings::new("  "))
            .await
            .unwrap_err();
        assert!(matches!(err, GenStudioError::InvalidSettings(_)));
    }

    #[tokio::test]
    async fn test_health_check_unauthorized() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1beta/models/gemini-3-pro-image-preview"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let provider = test_provider(&server.uri());
        let err = provider.health_check(ImageModel::Pro).await.unwrap_err();
        assert!(matches!(err, GenStudioError::ApiKeyInvalid(_)));
    }
}
