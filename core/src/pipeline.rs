//! The seeding pipeline: raw tables in, snapshot file out.
//!
//! EXECUTION ORDER (fixed):
//!   1. Ingest the four source tables           (single thread)
//!   2. Aggregate customers into groups         (single thread)
//!   3. Classify, enrich, assemble each group   (worker pool)
//!   4. Join, then wire neighbors               (single thread)
//!   5. Write the snapshot, then upload         (single thread)
//!
//! RULES:
//!   - Workers share no mutable group state; results are merged in
//!     group order after the join.
//!   - One group's error or panic becomes a placeholder record for that
//!     group. Only an empty customer table aborts the run.
//!   - All randomness flows through the RngBank.

use crate::{
    aggregate::{aggregate_groups, GroupAggregate},
    config::SeederConfig,
    enrichment::{
        build_prompt, fallback, Enrichment, EnrichmentGateway, FailureReason, GenerationRequest,
        ImageAttachment,
    },
    error::{SeedError, SeedResult},
    group::{assemble, placeholder, Group, GroupContext},
    ingest::{discover_images, SourceData},
    risk::classify,
    rng::{RngBank, RngSlot},
    snapshot::{write_snapshot, Snapshot},
    types::GroupId,
    upload::{publish, ObjectStore},
    wiring::wire_neighbors,
};
use chrono::{NaiveDate, Utc};
use indexmap::IndexMap;
use rayon::prelude::*;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

/// Where a group's payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    Ai,
    Fallback,
    Placeholder,
}

/// Counters for one run, printed by the runner.
#[derive(Debug, Clone, PartialEq)]
pub struct SeedReport {
    pub master_seed: u64,
    pub groups: usize,
    pub ai_enriched: usize,
    pub fallback: usize,
    pub placeholders: usize,
    pub cache_hits: usize,
    pub duplicate_customers: usize,
    pub output_path: PathBuf,
    pub uploaded_to: Option<String>,
}

pub struct SeedPipeline {
    config: SeederConfig,
    gateway: EnrichmentGateway,
    uploader: Option<Box<dyn ObjectStore>>,
}

impl SeedPipeline {
    pub fn new(config: SeederConfig, gateway: EnrichmentGateway) -> Self {
        Self { config, gateway, uploader: None }
    }

    pub fn with_uploader(mut self, store: Box<dyn ObjectStore>) -> Self {
        self.uploader = Some(store);
        self
    }

    pub fn config(&self) -> &SeederConfig {
        &self.config
    }

    /// Full run: load the tables named in the config, write the snapshot.
    pub fn run(&self) -> SeedResult<SeedReport> {
        self.config.validate()?;
        let data = SourceData::load(&self.config)?;
        self.run_with(&data)
    }

    /// Run over already-loaded source data.
    pub fn run_with(&self, data: &SourceData) -> SeedResult<SeedReport> {
        self.config.validate()?;
        if data.customers.is_empty() {
            return Err(SeedError::NoCustomers { path: self.config.customers_path() });
        }

        let master_seed = self.config.master_seed.unwrap_or_else(seed_from_clock);
        let bank = RngBank::new(master_seed);
        log::info!(
            "seed: master_seed={master_seed} customers={} ai={}",
            data.customers.len(),
            if self.gateway.is_enabled() { "enabled" } else { "disabled" }
        );

        let generated_at = Utc::now();
        let (mut groups, provenance) = self.build_groups(data, &bank, generated_at.date_naive())?;

        wire_neighbors(&mut groups, &bank);

        let snapshot = Snapshot::new(groups, generated_at);
        write_snapshot(&snapshot, &self.config.output_path)?;

        let uploaded_to = match &self.uploader {
            Some(store) => {
                let name = object_name(&self.config.output_path);
                let body = snapshot.to_pretty_json()?;
                publish(store.as_ref(), &name, body.as_bytes())
            }
            None => None,
        };

        let count = |p: Provenance| provenance.iter().filter(|x| **x == p).count();
        Ok(SeedReport {
            master_seed,
            groups: snapshot.groups.len(),
            ai_enriched: count(Provenance::Ai),
            fallback: count(Provenance::Fallback),
            placeholders: count(Provenance::Placeholder),
            cache_hits: self.gateway.cache().hits(),
            duplicate_customers: data.duplicate_customers,
            output_path: self.config.output_path.clone(),
            uploaded_to,
        })
    }

    /// Steps 2-3: aggregate, then process every group on the worker pool.
    /// Neighbors are left empty.
    pub fn build_groups(
        &self,
        data: &SourceData,
        bank: &RngBank,
        audit_date: NaiveDate,
    ) -> SeedResult<(IndexMap<GroupId, Group>, Vec<Provenance>)> {
        let aggregates =
            aggregate_groups(data, self.config.group_size, self.config.max_groups);
        let images = discover_images(&self.config.image_dir);
        log::info!(
            "seed: {} group(s) of up to {} member(s), {} image(s), {} worker(s)",
            aggregates.len(),
            self.config.group_size,
            images.len(),
            self.config.workers
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.workers)
            .thread_name(|i| format!("seed-worker-{i}"))
            .build()?;

        let results: Vec<(Group, Provenance)> = pool.install(|| {
            aggregates
                .par_iter()
                .map(|agg| self.process_isolated(agg, &images, bank, audit_date))
                .collect()
        });

        let mut groups = IndexMap::with_capacity(results.len());
        let mut provenance = Vec::with_capacity(results.len());
        for (group, source) in results {
            provenance.push(source);
            groups.insert(group.id.clone(), group);
        }
        Ok((groups, provenance))
    }

    fn process_isolated(
        &self,
        agg: &GroupAggregate,
        images: &[PathBuf],
        bank: &RngBank,
        audit_date: NaiveDate,
    ) -> (Group, Provenance) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.process_group(agg, images, bank, audit_date)
        }));

        let error = match outcome {
            Ok(Ok(done)) => return done,
            Ok(Err(e)) => group_failed(&agg.id, e.to_string()),
            Err(payload) => group_failed(&agg.id, panic_message(payload.as_ref())),
        };
        log::error!("{error}, writing placeholder");

        let image_url = image_url(&self.config.image_dir, image_for(agg.index, images));
        let ctx = GroupContext {
            aggregate: agg,
            band: classify(agg.avg_dpd),
            image_url: &image_url,
            audit_date,
        };
        (placeholder(ctx), Provenance::Placeholder)
    }

    fn process_group(
        &self,
        agg: &GroupAggregate,
        images: &[PathBuf],
        bank: &RngBank,
        audit_date: NaiveDate,
    ) -> SeedResult<(Group, Provenance)> {
        let band = classify(agg.avg_dpd);
        let image = image_for(agg.index, images);
        let image_url = image_url(&self.config.image_dir, image);

        let enrichment = if agg.index >= self.config.ai_group_limit {
            Enrichment::Failure(FailureReason::OverBudget)
        } else if !self.gateway.is_enabled() {
            Enrichment::Failure(FailureReason::Disabled)
        } else {
            let request = GenerationRequest {
                prompt: build_prompt(agg),
                image: self.attachment(&agg.id, image),
            };
            self.gateway.enrich(&agg.id, request)
        };

        let (payload, source) = match enrichment {
            Enrichment::Success(payload) => (payload, Provenance::Ai),
            Enrichment::Failure(reason) => {
                match reason {
                    FailureReason::Disabled | FailureReason::OverBudget => {
                        log::debug!("group={} fallback: {reason}", agg.id)
                    }
                    _ => log::warn!("group={} fallback: {reason}", agg.id),
                }
                let mut rng = bank.for_group(&agg.id, RngSlot::Fallback);
                (fallback::synthesize(band, &agg.business_type, &mut rng), Provenance::Fallback)
            }
        };

        let ctx = GroupContext { aggregate: agg, band, image_url: &image_url, audit_date };
        let group = assemble(ctx, &payload, bank);
        log::info!(
            "group={} built: band={band} trust={} size={} source={source:?}",
            group.id,
            group.header.trust_score,
            group.size
        );
        Ok((group, source))
    }

    /// Image bytes for the request, if images are enabled and readable.
    fn attachment(&self, group_id: &str, image: Option<&Path>) -> Option<ImageAttachment> {
        if !self.config.send_images {
            return None;
        }
        let path = image?;
        match ImageAttachment::read(path) {
            Ok(attachment) => Some(attachment),
            Err(e) => {
                log::warn!("group={group_id} image: cannot read {}: {e}", path.display());
                None
            }
        }
    }
}

/// Round-robin by group index.
fn image_for(index: usize, images: &[PathBuf]) -> Option<&Path> {
    if images.is_empty() {
        None
    } else {
        Some(images[index % images.len()].as_path())
    }
}

/// Public URL for an image, relative to the image root.
pub fn image_url(image_dir: &Path, image: Option<&Path>) -> String {
    let Some(path) = image else {
        return "placeholder.jpg".to_string();
    };
    let relative = path.strip_prefix(image_dir).unwrap_or(path);
    let joined: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    format!("data/images/{}", joined.join("/"))
}

fn object_name(output_path: &Path) -> String {
    output_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "mock_db.json".to_string())
}

fn seed_from_clock() -> u64 {
    Utc::now().timestamp_nanos_opt().unwrap_or_default() as u64
}

fn group_failed(group_id: &str, reason: String) -> SeedError {
    SeedError::GroupFailed { group_id: group_id.to_string(), reason }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn images_assigned_round_robin() {
        let images = vec![PathBuf::from("a.jpg"), PathBuf::from("b.jpg")];
        assert_eq!(image_for(0, &images), Some(Path::new("a.jpg")));
        assert_eq!(image_for(3, &images), Some(Path::new("b.jpg")));
        assert_eq!(image_for(3, &[]), None);
    }

    #[test]
    fn image_url_is_relative_to_root() {
        let root = Path::new("/srv/images");
        assert_eq!(
            image_url(root, Some(Path::new("/srv/images/home/h1.jpg"))),
            "data/images/home/h1.jpg"
        );
        assert_eq!(image_url(root, None), "placeholder.jpg");
    }

    #[test]
    fn object_name_is_output_file_name() {
        assert_eq!(object_name(Path::new("data/mock_db.json")), "mock_db.json");
    }

    #[test]
    fn group_failure_names_the_group() {
        let err = group_failed("G004", "panicked: boom".into());
        assert!(matches!(&err, SeedError::GroupFailed { group_id, .. } if group_id == "G004"));
        assert_eq!(err.to_string(), "Group 'G004' failed: panicked: boom");
    }

    #[test]
    fn panic_messages_are_extracted() {
        let caught = panic::catch_unwind(|| panic!("boom {}", 7)).unwrap_err();
        assert_eq!(panic_message(caught.as_ref()), "panicked: boom 7");
    }
}
