//! The enrichment payload and its validation at the service boundary.

use super::ServiceError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AssetCondition {
    Good,
    Average,
    Poor,
}

impl AssetCondition {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "GOOD" => Some(Self::Good),
            "AVERAGE" => Some(Self::Average),
            "POOR" => Some(Self::Poor),
            _ => None,
        }
    }
}

/// Narrative and trust data for one group, genuine or synthesized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentPayload {
    pub risk_badge: String,
    pub trust_score: u8,
    pub sentiment_text: String,
    pub asset_condition: AssetCondition,
    pub asset_tags: Vec<String>,
    pub repayment_prediction: u8,
}

/// Loose shape of what the model returns, before validation.
#[derive(Debug, Deserialize)]
struct RawPayload {
    risk_badge: String,
    trust_score: serde_json::Number,
    sentiment_text: String,
    asset_condition: String,
    asset_tags: Vec<String>,
    repayment_prediction: serde_json::Number,
}

/// Strip markdown code fences some models wrap JSON in.
fn strip_code_blocks(response: &str) -> &str {
    response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

/// Scores must be whole numbers in 0..=100. `87.0` is accepted, `87.5` is not.
fn score(field: &'static str, n: &serde_json::Number) -> Result<u8, ServiceError> {
    let value = n
        .as_u64()
        .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64))
        .ok_or_else(|| ServiceError::Malformed(format!("{field} is not a whole number: {n}")))?;
    if value > 100 {
        return Err(ServiceError::Malformed(format!("{field} out of range: {value}")));
    }
    Ok(value as u8)
}

impl EnrichmentPayload {
    /// Parse and validate raw model text. Any deviation from the
    /// contract is `ServiceError::Malformed`.
    pub fn from_model_text(text: &str) -> Result<Self, ServiceError> {
        let raw: RawPayload = serde_json::from_str(strip_code_blocks(text))
            .map_err(|e| ServiceError::Malformed(format!("not a valid payload: {e}")))?;

        let risk_badge = raw.risk_badge.trim().to_string();
        if risk_badge.is_empty() {
            return Err(ServiceError::Malformed("risk_badge is empty".into()));
        }
        let sentiment_text = raw.sentiment_text.trim().to_string();
        if sentiment_text.is_empty() {
            return Err(ServiceError::Malformed("sentiment_text is empty".into()));
        }
        let asset_condition = AssetCondition::parse(&raw.asset_condition).ok_or_else(|| {
            ServiceError::Malformed(format!("unknown asset_condition {:?}", raw.asset_condition))
        })?;

        Ok(Self {
            risk_badge,
            trust_score: score("trust_score", &raw.trust_score)?,
            sentiment_text,
            asset_condition,
            asset_tags: raw
                .asset_tags
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            repayment_prediction: score("repayment_prediction", &raw.repayment_prediction)?,
        })
    }
}
