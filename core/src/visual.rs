//! Visual attributes: node size and priority from band and trust.
//!
//! Size encodes how much attention a group needs:
//!   HEALTHY  higher trust -> bigger (capital priority)
//!   MEDIUM   narrow mid range
//!   TOXIC    LOWER trust -> bigger (urgent handling)

use crate::risk::RiskBand;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VisualPriority {
    High,
    Medium,
    Low,
}

/// (trust_lo, trust_hi, size_at_lo, size_at_hi) per band.
const fn band_map(band: RiskBand) -> (f64, f64, f64, f64) {
    match band {
        RiskBand::Healthy => (70.0, 100.0, 25.0, 50.0),
        RiskBand::Medium  => (40.0, 80.0, 18.0, 28.0),
        RiskBand::Toxic   => (10.0, 60.0, 45.0, 20.0),
    }
}

/// Inclusive size range a band can produce.
pub fn size_range(band: RiskBand) -> (u32, u32) {
    let (_, _, a, b) = band_map(band);
    (a.min(b) as u32, a.max(b) as u32)
}

pub fn node_size(trust_score: u8, band: RiskBand) -> u32 {
    let (t_lo, t_hi, s_lo, s_hi) = band_map(band);
    let t = f64::from(trust_score).clamp(t_lo, t_hi);
    let slope = (s_hi - s_lo) / (t_hi - t_lo);
    let size = s_lo + ((t - t_lo) * slope).round();
    let (min, max) = size_range(band);
    (size as u32).clamp(min, max)
}

pub fn visual_priority(band: RiskBand, size: u32) -> VisualPriority {
    match band {
        RiskBand::Healthy if size >= 35 => VisualPriority::High,
        RiskBand::Toxic if size >= 30 => VisualPriority::High,
        _ if size >= 20 => VisualPriority::Medium,
        _ => VisualPriority::Low,
    }
}
