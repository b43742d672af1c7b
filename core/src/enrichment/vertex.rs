//! Vertex AI `generateContent` client (Gemini models).

use super::{GenerationRequest, GenerativeModel, ServiceError};
use crate::config::VertexSettings;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

pub struct VertexClient {
    endpoint: String,
    model: String,
    access_token: String,
    http: Client,
}

impl VertexClient {
    /// None when the settings lack a project or token.
    pub fn from_settings(settings: &VertexSettings) -> Result<Option<Self>, ServiceError> {
        let (Some(project), Some(token)) = (&settings.project, &settings.access_token) else {
            return Ok(None);
        };
        let endpoint = format!(
            "https://{region}-aiplatform.googleapis.com/v1/projects/{project}/locations/{region}/publishers/google/models/{model}:generateContent",
            region = settings.region,
            model = settings.model,
        );
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ServiceError::Other(format!("cannot build HTTP client: {e}")))?;
        Ok(Some(Self {
            endpoint,
            model: settings.model.clone(),
            access_token: token.clone(),
            http,
        }))
    }

    fn headers(&self) -> Result<HeaderMap, ServiceError> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.access_token))
            .map_err(|e| ServiceError::Other(format!("invalid access token: {e}")))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }
}

impl GenerativeModel for VertexClient {
    fn name(&self) -> &str {
        &self.model
    }

    fn generate(&self, request: &GenerationRequest) -> Result<String, ServiceError> {
        let mut parts = vec![Part::Text { text: &request.prompt }];
        if let Some(image) = &request.image {
            parts.push(Part::Inline {
                inline_data: InlineData {
                    mime_type: image.mime_type.clone(),
                    data: STANDARD.encode(&image.bytes),
                },
            });
        }
        let body = GenerateContentRequest {
            contents: vec![Content { role: "user", parts }],
            generation_config: GenerationConfig { response_mime_type: "application/json" },
        };

        log::debug!("vertex: generateContent model={} image={}", self.model, request.image.is_some());

        let response = self
            .http
            .post(&self.endpoint)
            .headers(self.headers()?)
            .json(&body)
            .send()
            .map_err(|e| ServiceError::Other(format!("request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .map_err(|e| ServiceError::Other(format!("cannot read response body: {e}")))?;

        if !status.is_success() {
            return Err(classify_failure(status, &text, request.image.is_some()));
        }
        extract_text(&text)
    }
}

/// Map an HTTP failure onto the retry taxonomy.
pub fn classify_failure(status: StatusCode, body: &str, had_image: bool) -> ServiceError {
    let lower = body.to_ascii_lowercase();
    let detail = format!("{status}: {}", body.chars().take(300).collect::<String>());

    if status == StatusCode::TOO_MANY_REQUESTS
        || lower.contains("resource_exhausted")
        || lower.contains("quota")
    {
        return ServiceError::RateLimited(detail);
    }
    if had_image
        && (status == StatusCode::BAD_REQUEST || status == StatusCode::PRECONDITION_FAILED)
        && (lower.contains("precondition check failed")
            || lower.contains("image")
            || lower.contains("vision")
            || lower.contains("multimodal"))
    {
        return ServiceError::CapabilityMismatch(detail);
    }
    ServiceError::Other(detail)
}

/// First text part of the first candidate.
pub fn extract_text(body: &str) -> Result<String, ServiceError> {
    let parsed: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|e| ServiceError::Malformed(format!("unexpected response envelope: {e}")))?;
    parsed
        .candidates
        .into_iter()
        .filter_map(|c| c.content)
        .flat_map(|c| c.parts)
        .find_map(|p| p.text)
        .ok_or_else(|| ServiceError::Malformed("no text in response".into()))
}
