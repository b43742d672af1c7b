//! seed-runner: headless snapshot seeder for the social collateral graph.
//!
//! Usage:
//!   seed-runner --seed 12345 --data-dir samples --out data/mock_db.json
//!   seed-runner --offline --max-groups 40 --workers 8
//!
//! Flags override the COLLATERAL_* / GCP_* environment.

use anyhow::{Context, Result};
use collateral_core::{
    config::SeederConfig,
    enrichment::{cache::ResponseCache, vertex::VertexClient, EnrichmentGateway, GenerativeModel},
    pipeline::{SeedPipeline, SeedReport},
    upload::GcsStore,
};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let mut config = SeederConfig::from_env().context("invalid environment configuration")?;

    if let Some(seed) = parse_opt::<u64>(&args, "--seed")? {
        config.master_seed = Some(seed);
    }
    if let Some(dir) = flag_value(&args, "--data-dir") {
        config.raw_data_dir = PathBuf::from(dir);
    }
    if let Some(out) = flag_value(&args, "--out") {
        config.output_path = PathBuf::from(out);
    }
    if let Some(n) = parse_opt(&args, "--max-groups")? {
        config.max_groups = n;
    }
    if let Some(n) = parse_opt(&args, "--workers")? {
        config.workers = n;
    }
    let offline = args.iter().any(|a| a == "--offline");
    config.validate()?;

    println!("Social Collateral: seed-runner");
    println!("  data_dir:   {}", config.raw_data_dir.display());
    println!("  out:        {}", config.output_path.display());
    println!("  groups:     up to {} x {}", config.max_groups, config.group_size);
    println!("  workers:    {}", config.workers);
    println!();

    let model: Option<Arc<dyn GenerativeModel>> = if offline {
        log::info!("vertex: offline mode, every group uses fallback");
        None
    } else {
        match VertexClient::from_settings(&config.vertex)? {
            Some(client) => Some(Arc::new(client) as Arc<dyn GenerativeModel>),
            None => {
                log::warn!("vertex: GCP_PROJECT or GCP_ACCESS_TOKEN unset, enrichment disabled");
                None
            }
        }
    };
    let gateway = EnrichmentGateway::new(
        model,
        Arc::new(ResponseCache::new()),
        config.retry.clone(),
        config.request_delay,
    );

    let store = if offline {
        None
    } else {
        GcsStore::from_settings(config.gcs_bucket.as_deref(), config.vertex.access_token.as_deref())?
    };

    let mut pipeline = SeedPipeline::new(config, gateway);
    if let Some(store) = store {
        pipeline = pipeline.with_uploader(Box::new(store));
    }

    let report = pipeline.run()?;
    print_summary(&report);
    Ok(())
}

fn print_summary(report: &SeedReport) {
    println!("=== Seed Summary ===");
    println!("  master seed:     {}", report.master_seed);
    println!("  groups:          {}", report.groups);
    println!("  ai enriched:     {}", report.ai_enriched);
    println!("  fallback:        {}", report.fallback);
    println!("  placeholders:    {}", report.placeholders);
    println!("  cache hits:      {}", report.cache_hits);
    println!("  duplicate ids:   {}", report.duplicate_customers);
    println!("  snapshot:        {}", report.output_path.display());
    match &report.uploaded_to {
        Some(location) => println!("  uploaded:        {location}"),
        None => println!("  uploaded:        no"),
    }
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}

fn parse_opt<T: std::str::FromStr>(args: &[String], flag: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    flag_value(args, flag)
        .map(|v| {
            v.parse::<T>()
                .map_err(|e| anyhow::anyhow!("invalid value for {flag}: '{v}' ({e})"))
        })
        .transpose()
}
