//! AI enrichment gateway.
//!
//! RULE: `enrich()` never fails. Every outcome is either
//! `Enrichment::Success` with a validated payload, or
//! `Enrichment::Failure` with the reason; the caller turns a failure
//! into a fallback payload with `fallback::synthesize`.
//!
//! Failure policy per request:
//!   rate limit / quota    -> backoff, retry up to the attempt cap
//!   image rejected        -> one retry without the image
//!   malformed response    -> give up immediately
//!   anything else         -> give up immediately

pub mod cache;
pub mod fallback;
pub mod payload;
pub mod vertex;

use crate::{aggregate::GroupAggregate, config::RetryPolicy};
use cache::ResponseCache;
use payload::EnrichmentPayload;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("capability mismatch: {0}")]
    CapabilityMismatch(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("service error: {0}")]
    Other(String),
}

impl ServiceError {
    /// Only rate limiting is worth waiting out.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageAttachment {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ImageAttachment {
    pub fn read(path: &Path) -> std::io::Result<Self> {
        let mime_type = match path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase) {
            Some(ext) if ext == "png" => "image/png",
            _ => "image/jpeg",
        };
        Ok(Self { mime_type: mime_type.to_string(), bytes: std::fs::read(path)? })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub image: Option<ImageAttachment>,
}

/// A generative model reachable over some transport.
/// Returns the raw text of the model's answer.
pub trait GenerativeModel: Send + Sync {
    fn name(&self) -> &str;

    fn generate(&self, request: &GenerationRequest) -> Result<String, ServiceError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum FailureReason {
    /// No model configured for this run.
    Disabled,
    /// Group index is past the configured AI budget.
    OverBudget,
    RateLimitExhausted { attempts: u32 },
    CapabilityMismatch(String),
    Malformed(String),
    Service(String),
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disabled => write!(f, "enrichment disabled"),
            Self::OverBudget => write!(f, "past AI group budget"),
            Self::RateLimitExhausted { attempts } => {
                write!(f, "still rate limited after {attempts} attempt(s)")
            }
            Self::CapabilityMismatch(msg) => write!(f, "capability mismatch: {msg}"),
            Self::Malformed(msg) => write!(f, "malformed response: {msg}"),
            Self::Service(msg) => write!(f, "service error: {msg}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Enrichment {
    Success(EnrichmentPayload),
    Failure(FailureReason),
}

pub const ANALYSIS_PROMPT: &str = r#"Role: Senior microfinance risk analyst (Indonesia).
Group data:
{group_text}

Task: analyse the risk profile of this borrower group.

Output JSON (strict JSON, no markdown):
{
  "risk_badge": "LOW RISK / MED RISK / HIGH RISK",
  "trust_score": (integer 0-100),
  "sentiment_text": "One short sentence about the group's sentiment.",
  "asset_condition": "GOOD / AVERAGE / POOR",
  "asset_tags": ["Tag1", "Tag2"],
  "repayment_prediction": (integer 0-100)
}
"#;

pub fn build_prompt(group: &GroupAggregate) -> String {
    ANALYSIS_PROMPT.replace("{group_text}", &group.summary_line())
}

/// Explicit client + cache + policy, shared by every worker.
pub struct EnrichmentGateway {
    model: Option<Arc<dyn GenerativeModel>>,
    cache: Arc<ResponseCache>,
    retry: RetryPolicy,
    request_delay: Duration,
}

impl EnrichmentGateway {
    pub fn new(
        model: Option<Arc<dyn GenerativeModel>>,
        cache: Arc<ResponseCache>,
        retry: RetryPolicy,
        request_delay: Duration,
    ) -> Self {
        Self { model, cache, retry, request_delay }
    }

    /// A gateway that always reports `Disabled`.
    pub fn disabled() -> Self {
        Self::new(None, Arc::new(ResponseCache::new()), RetryPolicy::default(), Duration::ZERO)
    }

    pub fn is_enabled(&self) -> bool {
        self.model.is_some()
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn enrich(&self, group_id: &str, request: GenerationRequest) -> Enrichment {
        let Some(model) = &self.model else {
            return Enrichment::Failure(FailureReason::Disabled);
        };

        let key = ResponseCache::key_for(model.name(), &request);
        if let Some(payload) = self.cache.get(&key) {
            log::debug!("group={group_id} enrichment: cache hit");
            return Enrichment::Success(payload);
        }

        match self.call_with_retry(group_id, model.as_ref(), request) {
            Ok(payload) => {
                self.cache.insert(key, payload.clone());
                if !self.request_delay.is_zero() {
                    std::thread::sleep(self.request_delay);
                }
                Enrichment::Success(payload)
            }
            Err(reason) => Enrichment::Failure(reason),
        }
    }

    fn call_with_retry(
        &self,
        group_id: &str,
        model: &dyn GenerativeModel,
        mut request: GenerationRequest,
    ) -> Result<EnrichmentPayload, FailureReason> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0u32;

        loop {
            let result = model
                .generate(&request)
                .and_then(|text| EnrichmentPayload::from_model_text(&text));

            match result {
                Ok(payload) => return Ok(payload),

                Err(ServiceError::RateLimited(msg)) => {
                    if attempt + 1 >= max_attempts {
                        log::warn!(
                            "group={group_id} enrichment: rate limited, giving up after {max_attempts} attempt(s): {msg}"
                        );
                        return Err(FailureReason::RateLimitExhausted { attempts: max_attempts });
                    }
                    let delay = self.retry.backoff_for(attempt);
                    log::warn!(
                        "group={group_id} enrichment: rate limited, retry {}/{} in {}ms",
                        attempt + 2,
                        max_attempts,
                        delay.as_millis()
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }

                Err(ServiceError::CapabilityMismatch(msg)) if request.image.is_some() => {
                    log::warn!("group={group_id} enrichment: image rejected ({msg}), retrying without image");
                    request.image = None;
                }

                Err(ServiceError::CapabilityMismatch(msg)) => {
                    log::warn!("group={group_id} enrichment: capability mismatch: {msg}");
                    return Err(FailureReason::CapabilityMismatch(msg));
                }

                Err(ServiceError::Malformed(msg)) => {
                    log::warn!("group={group_id} enrichment: malformed response: {msg}");
                    return Err(FailureReason::Malformed(msg));
                }

                Err(ServiceError::Other(msg)) => {
                    log::warn!("group={group_id} enrichment: {msg}");
                    return Err(FailureReason::Service(msg));
                }
            }
        }
    }
}
