//! Run configuration.
//!
//! Production runs read the environment via `SeederConfig::from_env()`.
//! Tests use `SeederConfig::default_test()` and override fields directly.

use crate::error::{SeedError, SeedResult};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const ENV_PREFIX: &str = "COLLATERAL_";

/// Upper bound on a single backoff sleep.
pub const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Bounded retry policy for the external AI service.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts per request, including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
}

impl RetryPolicy {
    /// Delay before the retry that follows failed attempt `attempt` (0-based).
    /// Capped at `MAX_BACKOFF`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::ZERO;
        }
        let factor = self.multiplier.powi(attempt.min(i32::MAX as u32) as i32);
        Duration::try_from_secs_f64(self.base_delay.as_secs_f64() * factor)
            .map_or(MAX_BACKOFF, |d| d.min(MAX_BACKOFF))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(2_000),
            multiplier: 2.0,
        }
    }
}

/// Vertex AI endpoint settings. Enrichment is disabled unless both
/// a project and an access token are present.
#[derive(Debug, Clone, Default)]
pub struct VertexSettings {
    pub project: Option<String>,
    pub region: String,
    pub model: String,
    pub access_token: Option<String>,
}

impl VertexSettings {
    pub fn is_configured(&self) -> bool {
        self.project.is_some() && self.access_token.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct SeederConfig {
    /// Directory holding customers.csv, loan_snapshots.csv, tasks.csv, task_participants.csv.
    pub raw_data_dir: PathBuf,
    pub image_dir: PathBuf,
    pub output_path: PathBuf,
    /// Remote copy of the snapshot, best-effort.
    pub gcs_bucket: Option<String>,
    pub vertex: VertexSettings,
    pub workers: usize,
    /// Customers per group.
    pub group_size: usize,
    pub max_groups: usize,
    /// Only the first N groups call the AI service; the rest use fallback.
    pub ai_group_limit: usize,
    pub send_images: bool,
    /// Pause after each successful live AI call.
    pub request_delay: Duration,
    pub retry: RetryPolicy,
    /// None means derive one from the clock at run start.
    pub master_seed: Option<u64>,
}

impl SeederConfig {
    /// Load from `COLLATERAL_*` and the conventional GCP variables.
    /// Unset variables fall back to defaults; malformed ones are an error.
    pub fn from_env() -> SeedResult<Self> {
        let defaults = Self::defaults();
        let config = Self {
            raw_data_dir: env_path("RAW_DATA_DIR").unwrap_or(defaults.raw_data_dir),
            image_dir: env_path("IMAGE_DIR").unwrap_or(defaults.image_dir),
            output_path: env_path("OUTPUT_PATH").unwrap_or(defaults.output_path),
            gcs_bucket: env_string("GCS_BUCKET"),
            vertex: VertexSettings {
                project: env_string("GCP_PROJECT"),
                region: env_string("GCP_LOCATION").unwrap_or(defaults.vertex.region),
                model: prefixed("VERTEX_MODEL").unwrap_or(defaults.vertex.model),
                access_token: env_string("GCP_ACCESS_TOKEN"),
            },
            workers: parse_prefixed("WORKERS", "COLLATERAL_WORKERS")?.unwrap_or(defaults.workers),
            group_size: parse_prefixed("GROUP_SIZE", "COLLATERAL_GROUP_SIZE")?
                .unwrap_or(defaults.group_size),
            max_groups: parse_prefixed("MAX_GROUPS", "COLLATERAL_MAX_GROUPS")?
                .unwrap_or(defaults.max_groups),
            ai_group_limit: parse_prefixed("AI_LIMIT", "COLLATERAL_AI_LIMIT")?
                .unwrap_or(defaults.ai_group_limit),
            send_images: parse_prefixed("SEND_IMAGES", "COLLATERAL_SEND_IMAGES")?
                .unwrap_or(defaults.send_images),
            request_delay: parse_prefixed::<u64>("AI_DELAY_MS", "COLLATERAL_AI_DELAY_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.request_delay),
            retry: RetryPolicy {
                max_attempts: parse_prefixed("MAX_ATTEMPTS", "COLLATERAL_MAX_ATTEMPTS")?
                    .unwrap_or(defaults.retry.max_attempts),
                base_delay: parse_prefixed::<u64>("BACKOFF_BASE_MS", "COLLATERAL_BACKOFF_BASE_MS")?
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.retry.base_delay),
                multiplier: parse_prefixed("BACKOFF_MULTIPLIER", "COLLATERAL_BACKOFF_MULTIPLIER")?
                    .unwrap_or(defaults.retry.multiplier),
            },
            master_seed: parse_prefixed("SEED", "COLLATERAL_SEED")?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Production defaults, before any environment overrides.
    pub fn defaults() -> Self {
        Self {
            raw_data_dir: PathBuf::from("samples"),
            image_dir: PathBuf::from("data/images"),
            output_path: PathBuf::from("data/mock_db.json"),
            gcs_bucket: None,
            vertex: VertexSettings {
                project: None,
                region: "asia-southeast2".into(),
                model: "gemini-1.5-pro-vision".into(),
                access_token: None,
            },
            workers: 4,
            group_size: 15,
            max_groups: 10,
            ai_group_limit: 1000,
            send_images: true,
            request_delay: Duration::from_millis(1_000),
            retry: RetryPolicy::default(),
            master_seed: None,
        }
    }

    /// Config with no external service, no delays and a fixed seed.
    /// Paths point nowhere useful; tests set them to a temp dir.
    pub fn default_test() -> Self {
        Self {
            raw_data_dir: PathBuf::from("test-data"),
            image_dir: PathBuf::from("test-data/images"),
            output_path: PathBuf::from("test-data/out.json"),
            workers: 2,
            group_size: 3,
            max_groups: 10,
            request_delay: Duration::ZERO,
            retry: RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::ZERO,
                multiplier: 2.0,
            },
            master_seed: Some(0x5EED_CAFE),
            ..Self::defaults()
        }
    }

    pub fn validate(&self) -> SeedResult<()> {
        if self.group_size == 0 {
            return Err(invalid("group_size", "must be at least 1"));
        }
        if self.workers == 0 {
            return Err(invalid("workers", "must be at least 1"));
        }
        if self.retry.max_attempts == 0 {
            return Err(invalid("retry.max_attempts", "must be at least 1"));
        }
        if !self.retry.multiplier.is_finite() || self.retry.multiplier < 1.0 {
            return Err(invalid(
                "retry.multiplier",
                format!("must be finite and >= 1.0, got {}", self.retry.multiplier),
            ));
        }
        Ok(())
    }

    pub fn customers_path(&self) -> PathBuf {
        self.raw_data_dir.join("customers.csv")
    }

    pub fn loans_path(&self) -> PathBuf {
        self.raw_data_dir.join("loan_snapshots.csv")
    }

    pub fn tasks_path(&self) -> PathBuf {
        self.raw_data_dir.join("tasks.csv")
    }

    pub fn participants_path(&self) -> PathBuf {
        self.raw_data_dir.join("task_participants.csv")
    }
}

fn invalid(key: &'static str, reason: impl Into<String>) -> SeedError {
    SeedError::InvalidConfig { key, reason: reason.into() }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn prefixed(suffix: &str) -> Option<String> {
    env_string(&format!("{ENV_PREFIX}{suffix}"))
}

fn env_path(suffix: &str) -> Option<PathBuf> {
    prefixed(suffix).map(PathBuf::from)
}

fn parse_prefixed<T: FromStr>(suffix: &str, key: &'static str) -> SeedResult<Option<T>> {
    match prefixed(suffix) {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| invalid(key, format!("cannot parse {raw:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_exponentially() {
        let policy = RetryPolicy {
            max_attempts: 4,
            base_delay: Duration::from_millis(500),
            multiplier: 2.0,
        };
        assert_eq!(policy.backoff_for(0), Duration::from_millis(500));
        assert_eq!(policy.backoff_for(1), Duration::from_millis(1_000));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(2_000));
    }

    #[test]
    fn test_config_is_valid() {
        SeederConfig::default_test().validate().unwrap();
    }

    #[test]
    fn zero_group_size_rejected() {
        let mut config = SeederConfig::default_test();
        config.group_size = 0;
        assert!(matches!(
            config.validate(),
            Err(SeedError::InvalidConfig { key: "group_size", .. })
        ));
    }

    #[test]
    fn multiplier_below_one_rejected() {
        let mut config = SeederConfig::default_test();
        config.retry.multiplier = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn non_finite_multiplier_rejected() {
        for bad in [f64::INFINITY, f64::NAN] {
            let mut config = SeederConfig::default_test();
            config.retry.multiplier = bad;
            assert!(matches!(
                config.validate(),
                Err(SeedError::InvalidConfig { key: "retry.multiplier", .. })
            ));
        }
    }

    #[test]
    fn backoff_is_capped_instead_of_overflowing() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            multiplier: 1e300,
        };
        assert_eq!(policy.backoff_for(2), MAX_BACKOFF);
        assert_eq!(policy.backoff_for(0), Duration::from_secs(1));

        let policy = RetryPolicy { multiplier: f64::INFINITY, ..policy };
        assert_eq!(policy.backoff_for(1), MAX_BACKOFF);

        let zero = RetryPolicy { base_delay: Duration::ZERO, ..policy };
        assert_eq!(zero.backoff_for(5), Duration::ZERO);
    }

    #[test]
    fn vertex_needs_project_and_token() {
        let mut vertex = SeederConfig::defaults().vertex;
        assert!(!vertex.is_configured());
        vertex.project = Some("demo-project".into());
        assert!(!vertex.is_configured());
        vertex.access_token = Some("token".into());
        assert!(vertex.is_configured());
    }
}
