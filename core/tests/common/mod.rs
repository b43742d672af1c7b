//! Shared fixtures: on-disk source tables and scripted model doubles.
#![allow(dead_code)]

use collateral_core::{
    config::SeederConfig,
    enrichment::{
        cache::ResponseCache, EnrichmentGateway, GenerationRequest, GenerativeModel, ServiceError,
    },
};
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub const GROUP_SIZE: usize = 3;

pub const VALID_PAYLOAD: &str = r#"{"risk_badge":"LOW RISK","trust_score":92,
    "sentiment_text":"Members pay on time.","asset_condition":"GOOD",
    "asset_tags":["Kiosk","Motorbike"],"repayment_prediction":95}"#;

/// One loan per customer; `dpd_per_group[g]` is the DPD of every loan
/// in group g, so it is also that group's average.
pub fn write_fixture(dir: &Path, dpd_per_group: &[i64]) {
    let customers_total = dpd_per_group.len() * GROUP_SIZE;

    let mut customers = String::from("customer_number;purpose;name\n");
    let mut loans = String::from("customer_number,dpd,outstanding_amount,loan_id\n");
    let mut tasks = String::from("task_id,latitude,longitude\n");
    let mut participants = String::from("participant_id,task_id\n");

    for i in 0..customers_total {
        let group = i / GROUP_SIZE;
        let purpose = if i % 2 == 0 { "Warung" } else { "Tailor" };
        customers.push_str(&format!("C{i:03};{purpose};Ibu {i}\n"));
        loans.push_str(&format!("C{i:03},{},1000000,L{i:03}\n", dpd_per_group[group]));
    }
    // Only the first group has a located loan.
    tasks.push_str("T1,-6.2001,106.8166\n");
    participants.push_str("L001,T1\n");

    fs::write(dir.join("customers.csv"), customers).unwrap();
    fs::write(dir.join("loan_snapshots.csv"), loans).unwrap();
    fs::write(dir.join("tasks.csv"), tasks).unwrap();
    fs::write(dir.join("task_participants.csv"), participants).unwrap();
}

pub fn fixture(dpd_per_group: &[i64]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path(), dpd_per_group);
    dir
}

pub fn config_for(dir: &Path) -> SeederConfig {
    SeederConfig {
        raw_data_dir: dir.to_path_buf(),
        image_dir: dir.join("images"),
        output_path: dir.join("out").join("mock_db.json"),
        group_size: GROUP_SIZE,
        ..SeederConfig::default_test()
    }
}

pub fn gateway_with(model: Arc<dyn GenerativeModel>) -> EnrichmentGateway {
    let config = SeederConfig::default_test();
    EnrichmentGateway::new(
        Some(model),
        Arc::new(ResponseCache::new()),
        config.retry,
        Duration::ZERO,
    )
}

/// Answers every call with the same result.
pub struct Constant {
    pub result: Result<String, ServiceError>,
    pub calls: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
    pub images: Mutex<Vec<bool>>,
}

impl Constant {
    pub fn new(result: Result<String, ServiceError>) -> Arc<Self> {
        Arc::new(Self {
            result,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            images: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl GenerativeModel for Constant {
    fn name(&self) -> &str {
        "constant"
    }

    fn generate(&self, request: &GenerationRequest) -> Result<String, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(request.prompt.clone());
        self.images.lock().unwrap().push(request.image.is_some());
        self.result.clone()
    }
}

/// Replays canned results in order, then reports exhaustion.
pub struct Scripted {
    script: Mutex<VecDeque<Result<String, ServiceError>>>,
}

impl Scripted {
    pub fn new(script: Vec<Result<String, ServiceError>>) -> Arc<Self> {
        Arc::new(Self { script: Mutex::new(script.into()) })
    }
}

impl GenerativeModel for Scripted {
    fn name(&self) -> &str {
        "scripted"
    }

    fn generate(&self, _request: &GenerationRequest) -> Result<String, ServiceError> {
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ServiceError::Other("script exhausted".into())))
    }
}

/// Panics for prompts mentioning `group_id`, answers the rest.
pub struct PanicsFor {
    pub group_id: &'static str,
}

impl GenerativeModel for PanicsFor {
    fn name(&self) -> &str {
        "panics-for"
    }

    fn generate(&self, request: &GenerationRequest) -> Result<String, ServiceError> {
        if request.prompt.contains(&format!("ID {},", self.group_id)) {
            panic!("model exploded on {}", self.group_id);
        }
        Ok(VALID_PAYLOAD.to_string())
    }
}
