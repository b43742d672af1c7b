//! Record ingestion: the four tabular inputs into in-memory maps.
//!
//! RULE: Only the customers file is mandatory. A missing or unreadable
//! loans, tasks or participants file degrades to an empty map and the
//! run continues; zero customers is the one fatal input condition.

use crate::{
    config::SeederConfig,
    error::{SeedError, SeedResult},
    types::{CustomerId, LoanId},
};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// One row of a source table, keyed by trimmed header name.
pub type Row = HashMap<String, String>;

#[derive(Debug, Clone, PartialEq)]
pub struct CustomerRecord {
    pub customer_id: CustomerId,
    /// Business purpose tag (`purpose` column), if present.
    pub purpose: Option<String>,
    /// Every column of the source row, untouched.
    pub fields: Row,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoanSnapshot {
    pub customer_id: CustomerId,
    /// Whole days past due; None when the cell is empty or not numeric.
    pub dpd: Option<i64>,
    pub outstanding_amount: Option<f64>,
    pub loan_id: Option<LoanId>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationHint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Default)]
pub struct SourceData {
    /// In first-seen order. A repeated id keeps its first position
    /// but takes the values of its last row.
    pub customers: IndexMap<CustomerId, CustomerRecord>,
    pub loans_by_customer: HashMap<CustomerId, Vec<LoanSnapshot>>,
    pub loan_locations: HashMap<LoanId, LocationHint>,
    /// Customer rows that overwrote an earlier row with the same id.
    pub duplicate_customers: usize,
}

impl SourceData {
    /// Load all four tables named by the config.
    pub fn load(config: &SeederConfig) -> SeedResult<Self> {
        Self::load_from(
            &config.customers_path(),
            &config.loans_path(),
            &config.tasks_path(),
            &config.participants_path(),
        )
    }

    pub fn load_from(
        customers_path: &Path,
        loans_path: &Path,
        tasks_path: &Path,
        participants_path: &Path,
    ) -> SeedResult<Self> {
        let customer_rows = load_table(customers_path);
        if customer_rows.is_empty() {
            return Err(SeedError::NoCustomers { path: customers_path.to_path_buf() });
        }

        let (customers, duplicate_customers) = index_customers(customer_rows);
        if duplicate_customers > 0 {
            log::warn!(
                "ingest: {duplicate_customers} duplicate customer id(s), later rows overwrote earlier ones"
            );
        }
        let loans_by_customer = index_loans(load_table(loans_path));
        let loan_locations = join_locations(load_table(tasks_path), load_table(participants_path));

        log::info!(
            "ingest: {} customers, {} with loans, {} located loans",
            customers.len(),
            loans_by_customer.len(),
            loan_locations.len()
        );

        Ok(Self { customers, loans_by_customer, loan_locations, duplicate_customers })
    }
}

/// Semicolon if the header line contains one, comma otherwise.
pub fn detect_delimiter(first_line: &str) -> u8 {
    if first_line.contains(';') { b';' } else { b',' }
}

/// Read a delimited file into rows. Any file-level failure logs and
/// yields no rows; a malformed row is skipped on its own.
pub fn load_table(path: &Path) -> Vec<Row> {
    if !path.exists() {
        log::warn!("ingest: {} not found, treating as empty", path.display());
        return Vec::new();
    }
    match read_table(path) {
        Ok(rows) => rows,
        Err(e) => {
            log::warn!("ingest: cannot read {}: {e}", path.display());
            Vec::new()
        }
    }
}

fn read_table(path: &Path) -> SeedResult<Vec<Row>> {
    let content = std::fs::read_to_string(path)?;
    parse_table(&content, path)
}

pub(crate) fn parse_table(content: &str, origin: &Path) -> SeedResult<Vec<Row>> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let first_line = content.lines().next().unwrap_or_default();

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(detect_delimiter(first_line))
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                log::warn!("ingest: {} row {} skipped: {e}", origin.display(), line + 2);
                continue;
            }
        };
        let row: Row = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.clone(), v.to_string()))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

fn non_empty<'a>(row: &'a Row, key: &str) -> Option<&'a str> {
    row.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
}

fn index_customers(rows: Vec<Row>) -> (IndexMap<CustomerId, CustomerRecord>, usize) {
    let mut customers = IndexMap::new();
    let mut duplicates = 0;
    for row in rows {
        let Some(key) = non_empty(&row, "customer_number").or_else(|| non_empty(&row, "id")) else {
            continue;
        };
        let customer_id = key.to_string();
        let record = CustomerRecord {
            customer_id: customer_id.clone(),
            purpose: non_empty(&row, "purpose").map(str::to_string),
            fields: row,
        };
        if customers.insert(customer_id, record).is_some() {
            duplicates += 1;
        }
    }
    (customers, duplicates)
}

/// `"12"`, `"12.9"` and `" 12 "` all read as 12 days.
fn parse_dpd(raw: &str) -> Option<i64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite()).map(|v| v.trunc() as i64)
}

fn index_loans(rows: Vec<Row>) -> HashMap<CustomerId, Vec<LoanSnapshot>> {
    let mut loans: HashMap<CustomerId, Vec<LoanSnapshot>> = HashMap::new();
    for row in rows {
        let Some(customer_id) = non_empty(&row, "customer_number") else {
            continue;
        };
        let snapshot = LoanSnapshot {
            customer_id: customer_id.to_string(),
            dpd: non_empty(&row, "dpd").and_then(parse_dpd),
            outstanding_amount: non_empty(&row, "outstanding_amount")
                .and_then(|v| v.parse::<f64>().ok())
                .filter(|v| v.is_finite()),
            loan_id: non_empty(&row, "loan_id").map(str::to_string),
        };
        loans.entry(snapshot.customer_id.clone()).or_default().push(snapshot);
    }
    loans
}

fn parse_location(row: &Row) -> Option<LocationHint> {
    let lat = non_empty(row, "latitude")?.parse::<f64>().ok()?;
    let lng = non_empty(row, "longitude")?.parse::<f64>().ok()?;
    (lat.is_finite() && lng.is_finite()).then_some(LocationHint { lat, lng })
}

/// participant_id is the loan id; the task carries the coordinates.
fn join_locations(tasks: Vec<Row>, participants: Vec<Row>) -> HashMap<LoanId, LocationHint> {
    let task_locations: HashMap<String, LocationHint> = tasks
        .iter()
        .filter_map(|t| Some((non_empty(t, "task_id")?.to_string(), parse_location(t)?)))
        .collect();

    let mut loan_locations = HashMap::new();
    for p in &participants {
        let (Some(pid), Some(tid)) = (non_empty(p, "participant_id"), non_empty(p, "task_id")) else {
            continue;
        };
        if let Some(location) = task_locations.get(tid) {
            loan_locations.insert(pid.to_string(), *location);
        }
    }
    loan_locations
}

/// Images under `dir` (recursive), sorted so assignment is stable.
pub fn discover_images(dir: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    collect_images(dir, &mut found);
    found.sort();
    found
}

fn collect_images(dir: &Path, found: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_images(&path, found);
        } else if is_image(&path) {
            found.push(path);
        }
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_ascii_lowercase().as_str(), "jpg" | "jpeg" | "png"))
        .unwrap_or(false)
}
