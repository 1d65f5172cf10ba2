use crate::{error::ModError, installed::InstalledMod, mods::Mod};
use anyhow::{Context, Result};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};
use tracing::warn;

pub const CHECKSUM_INDEX_VERSION: u32 = 1;

/// Metadata digests recorded after the last install, per mod id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecksumIndex {
    pub version: u32,
    pub checksums: BTreeMap<u64, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeStatus {
    Unchanged,
    Changed,
    New,
    Missing,
}

impl ChangeStatus {
    pub fn label(self) -> &'static str {
        match self {
            ChangeStatus::Unchanged => "unchanged",
            ChangeStatus::Changed => "changed",
            ChangeStatus::New => "new",
            ChangeStatus::Missing => "missing",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModChange {
    pub id: u64,
    pub status: ChangeStatus,
    pub checksum: Option<String>,
}

impl Default for ChecksumIndex {
    fn default() -> Self {
        Self {
            version: CHECKSUM_INDEX_VERSION,
            checksums: BTreeMap::new(),
        }
    }
}

impl ChecksumIndex {
    /// Loads the index, falling back to an empty one when the file is
    /// absent, unreadable or from another format version.
    pub fn load(path: &Path) -> Self {
        let Ok(raw) = fs::read_to_string(path) else {
            return Self::default();
        };
        match serde_json::from_str::<ChecksumIndex>(&raw) {
            Ok(index) if index.version == CHECKSUM_INDEX_VERSION => index,
            Ok(index) => {
                warn!("Ignoring checksum index version {} at {:?}", index.version, path);
                Self::default()
            }
            Err(err) => {
                warn!("Ignoring unreadable checksum index {:?}: {err}", path);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let parent = path.parent().context("checksum index parent")?;
        fs::create_dir_all(parent).context("create checksum index dir")?;

        let raw = serde_json::to_string_pretty(self).context("serialize checksum index")?;
        let temp = path.with_extension("json.tmp");
        fs::write(&temp, raw).context("write checksum index temp")?;
        fs::rename(&temp, path).context("finalize checksum index")?;
        Ok(())
    }

    pub fn changed(&self, mods: &[Mod], base_dir: &Path) -> Result<Vec<ModChange>> {
        let mut changes = Vec::with_capacity(mods.len());
        for value in mods {
            let checksum = current_checksum(value, base_dir)?;
            let status = match (&checksum, self.checksums.get(&value.id())) {
                (None, _) => ChangeStatus::Missing,
                (Some(_), None) => ChangeStatus::New,
                (Some(current), Some(recorded)) if current == recorded => ChangeStatus::Unchanged,
                (Some(_), Some(_)) => ChangeStatus::Changed,
            };
            changes.push(ModChange {
                id: value.id(),
                status,
                checksum,
            });
        }
        Ok(changes)
    }

    /// Stores the current digest of every installed mod. Returns how many
    /// were recorded.
    pub fn record(&mut self, mods: &[Mod], base_dir: &Path) -> Result<usize> {
        let mut recorded = 0;
        for value in mods {
            if let Some(checksum) = current_checksum(value, base_dir)? {
                self.checksums.insert(value.id(), checksum);
                recorded += 1;
            }
        }
        Ok(recorded)
    }
}

fn current_checksum(value: &Mod, base_dir: &Path) -> Result<Option<String>> {
    match InstalledMod::new(value, base_dir).checksum() {
        Ok(checksum) => Ok(Some(checksum)),
        Err(ModError::MissingMetadata { .. }) => Ok(None),
        Err(err) => Err(err).context("compute mod checksum"),
    }
}

/// Default index location for a server, under the per-user data directory.
pub fn default_index_path(server: &str) -> Result<PathBuf> {
    let base = BaseDirs::new().context("resolve home dir")?;
    Ok(base
        .data_local_dir()
        .join("dzmods")
        .join(format!("{server}.json")))
}
