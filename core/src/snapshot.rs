//! Snapshot serialization: the finished group map to/from JSON.
//!
//! RULE: The snapshot file is replaced atomically. Readers see either
//! the previous file or the complete new one, never a partial write.
//! The temp file lives next to the target so the rename stays on one
//! filesystem.

use crate::{
    error::SeedResult,
    group::Group,
    types::GroupId,
};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const SNAPSHOT_VERSION: &str = "v-final-full-struct";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub version: String,
    pub generated_at: DateTime<Utc>,
}

/// Auxiliary state carried for the dashboard widgets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalState {
    pub wallet_balance: i64,
    pub spending_history: Vec<i64>,
}

impl Default for GlobalState {
    fn default() -> Self {
        Self {
            wallet_balance: 1_000_000_000,
            spending_history: vec![100, 200, 300],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub meta: SnapshotMeta,
    pub global_state: GlobalState,
    pub groups: IndexMap<GroupId, Group>,
}

impl Snapshot {
    pub fn new(groups: IndexMap<GroupId, Group>, generated_at: DateTime<Utc>) -> Self {
        Self {
            meta: SnapshotMeta {
                version: SNAPSHOT_VERSION.to_string(),
                generated_at,
            },
            global_state: GlobalState::default(),
            groups,
        }
    }

    /// Groups in creation order.
    pub fn all_groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.values()
    }

    pub fn group(&self, id: &str) -> Option<&Group> {
        self.groups.get(id)
    }

    pub fn to_pretty_json(&self) -> SeedResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Write `snapshot` to `path` via temp file + rename.
pub fn write_snapshot(snapshot: &Snapshot, path: &Path) -> SeedResult<()> {
    let json = snapshot.to_pretty_json()?;
    write_atomic(path, json.as_bytes())?;
    log::info!(
        "snapshot: wrote {} group(s) to {}",
        snapshot.groups.len(),
        path.display()
    );
    Ok(())
}

pub fn read_snapshot(path: &Path) -> SeedResult<Snapshot> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> SeedResult<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "snapshot.json".to_string());
    let temp = dir.join(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4()));

    let result = (|| -> std::io::Result<()> {
        let mut file = fs::File::create(&temp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&temp, path)
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&temp);
        return Err(e.into());
    }
    Ok(())
}
