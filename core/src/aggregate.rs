//! Group aggregation: customers chunked into fixed-size batches.
//!
//! RULE: Batches partition the customer population in input order.
//! Every batch but the last has exactly `group_size` members.
//! Aggregation is pure; coordinate jitter happens later, per group.

use crate::{
    ingest::{LocationHint, SourceData},
    types::{group_id, CustomerId, GroupId},
};
use indexmap::IndexMap;

pub const DEFAULT_PURPOSE: &str = "Micro Business";
pub const DEFAULT_BUSINESS_TYPE: &str = "General Trader";

/// Base coordinate used when no member loan has a location.
pub const BASE_LAT: f64 = -6.59;
pub const BASE_LNG: f64 = 106.8;
/// Half-width of the uniform jitter around the base coordinate.
pub const JITTER_HALF_WIDTH: f64 = 0.025;

#[derive(Debug, Clone, PartialEq)]
pub struct GroupAggregate {
    /// 0-based position in creation order.
    pub index: usize,
    pub id: GroupId,
    pub members: Vec<CustomerId>,
    pub total_dpd: i64,
    /// total_dpd divided by member count, not by loan count.
    pub avg_dpd: f64,
    pub total_outstanding: f64,
    pub business_type: String,
    /// First located loan in member order, if any.
    pub location: Option<LocationHint>,
}

impl GroupAggregate {
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// One-line summary handed to the enrichment prompt.
    pub fn summary_line(&self) -> String {
        format!(
            "ID {}, DPD {}, Biz {}, Loan {}",
            self.id, self.avg_dpd, self.business_type, self.total_outstanding
        )
    }
}

/// Chunk customers and compute per-batch aggregates, stopping at `max_groups`.
pub fn aggregate_groups(data: &SourceData, group_size: usize, max_groups: usize) -> Vec<GroupAggregate> {
    assert!(group_size > 0, "group_size must be > 0");
    let ids: Vec<&CustomerId> = data.customers.keys().collect();
    ids.chunks(group_size)
        .take(max_groups)
        .enumerate()
        .map(|(index, batch)| aggregate_batch(data, index, batch))
        .collect()
}

fn aggregate_batch(data: &SourceData, index: usize, batch: &[&CustomerId]) -> GroupAggregate {
    let mut total_dpd = 0i64;
    let mut total_outstanding = 0.0;
    let mut location = None;
    let mut purposes = Vec::with_capacity(batch.len());

    for &cid in batch {
        for loan in data.loans_by_customer.get(cid).into_iter().flatten() {
            total_dpd += loan.dpd.unwrap_or(0);
            total_outstanding += loan.outstanding_amount.unwrap_or(0.0);
            if location.is_none() {
                location = loan
                    .loan_id
                    .as_ref()
                    .and_then(|lid| data.loan_locations.get(lid))
                    .copied();
            }
        }
        if let Some(customer) = data.customers.get(cid) {
            purposes.push(customer.purpose.as_deref().unwrap_or(DEFAULT_PURPOSE));
        }
    }

    let avg_dpd = if batch.is_empty() { 0.0 } else { total_dpd as f64 / batch.len() as f64 };

    GroupAggregate {
        index,
        id: group_id(index),
        members: batch.iter().map(|c| (*c).clone()).collect(),
        total_dpd,
        avg_dpd,
        total_outstanding,
        business_type: mode_first_seen(&purposes).unwrap_or(DEFAULT_BUSINESS_TYPE).to_string(),
        location,
    }
}

/// Most frequent value; ties go to whichever appeared first.
pub fn mode_first_seen<'a>(values: &[&'a str]) -> Option<&'a str> {
    let mut counts: IndexMap<&str, usize> = IndexMap::new();
    for v in values {
        *counts.entry(*v).or_insert(0) += 1;
    }
    let mut best: Option<(&str, usize)> = None;
    for (value, count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((value, count));
        }
    }
    best.map(|(v, _)| v)
}
