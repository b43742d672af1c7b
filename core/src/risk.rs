//! Risk classification: average DPD to risk band.
//!
//! RULE: The band depends on the aggregate DPD only. Enrichment
//! output never feeds back into it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Average DPD above this is TOXIC.
pub const TOXIC_DPD_THRESHOLD: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskBand {
    Healthy,
    Medium,
    Toxic,
}

impl RiskBand {
    /// Upper-case status label, as shown to analysts.
    pub fn status(&self) -> &'static str {
        match self {
            Self::Healthy => "HEALTHY",
            Self::Medium  => "MEDIUM",
            Self::Toxic   => "TOXIC",
        }
    }

    /// Lower-case node type used by the graph renderer.
    pub fn node_type(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Medium  => "medium",
            Self::Toxic   => "toxic",
        }
    }
}

impl fmt::Display for RiskBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.status())
    }
}

/// Total over all inputs: anything that is not strictly positive
/// (including NaN) is HEALTHY.
pub fn classify(avg_dpd: f64) -> RiskBand {
    if avg_dpd > TOXIC_DPD_THRESHOLD {
        RiskBand::Toxic
    } else if avg_dpd > 0.0 {
        RiskBand::Medium
    } else {
        RiskBand::Healthy
    }
}
