//! Fallback synthesis: a plausible payload when the service is unavailable.
//!
//! RULE: Output stays inside the same value domain as genuine model
//! output (badge vocabulary, 0..=100 scores, known asset conditions),
//! so downstream stages cannot tell the two apart by shape.

use super::payload::{AssetCondition, EnrichmentPayload};
use crate::{risk::RiskBand, rng::GroupRng};

/// Inclusive trust range sampled per band.
pub const fn trust_range(band: RiskBand) -> (u8, u8) {
    match band {
        RiskBand::Healthy => (72, 98),
        RiskBand::Medium  => (45, 75),
        RiskBand::Toxic   => (10, 60),
    }
}

/// Badge in the vocabulary the prompt asks the model for.
pub fn risk_badge(band: RiskBand) -> &'static str {
    match band {
        RiskBand::Healthy => "LOW RISK",
        RiskBand::Medium  => "MED RISK",
        RiskBand::Toxic   => "HIGH RISK",
    }
}

fn sentiment(band: RiskBand, business_type: &str) -> String {
    match band {
        RiskBand::Healthy => format!(
            "Group dominated by {business_type} businesses with a consistent on-time repayment record."
        ),
        RiskBand::Medium => format!(
            "Group dominated by {business_type} businesses; some members are slipping on repayments."
        ),
        RiskBand::Toxic => format!(
            "Group dominated by {business_type} businesses with widespread arrears; collective default risk is high."
        ),
    }
}

fn asset_condition(band: RiskBand) -> AssetCondition {
    match band {
        RiskBand::Healthy => AssetCondition::Good,
        RiskBand::Medium  => AssetCondition::Average,
        RiskBand::Toxic   => AssetCondition::Poor,
    }
}

fn asset_tags(band: RiskBand) -> &'static [&'static str] {
    match band {
        RiskBand::Healthy => &["Micro Business", "Permanent Building", "Stocked Inventory"],
        RiskBand::Medium  => &["Micro Business", "Permanent Building"],
        RiskBand::Toxic   => &["Micro Business", "Semi-Permanent Stall"],
    }
}

/// Deterministic given the RNG stream; repayment equals trust.
pub fn synthesize(band: RiskBand, business_type: &str, rng: &mut GroupRng) -> EnrichmentPayload {
    let (lo, hi) = trust_range(band);
    let trust_score = rng.range_inclusive(i64::from(lo), i64::from(hi)) as u8;

    EnrichmentPayload {
        risk_badge: risk_badge(band).to_string(),
        trust_score,
        sentiment_text: sentiment(band, business_type),
        asset_condition: asset_condition(band),
        asset_tags: asset_tags(band).iter().map(|t| t.to_string()).collect(),
        repayment_prediction: trust_score,
    }
}
