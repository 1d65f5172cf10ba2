use crate::{dayz, mods::Mod};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

/// Contents of the servers settings file, keyed by server name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings {
    pub servers: BTreeMap<String, ServerSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    pub server_dir: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mods_dir: Option<PathBuf>,
    #[serde(default)]
    pub mods: Vec<Value>,
    #[serde(default = "default_login")]
    pub steam_login: String,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read settings file {}", path.display()))?;
        let settings: Settings = serde_json::from_str(&raw)
            .with_context(|| format!("parse settings file {}", path.display()))?;
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("create settings dir")?;
        }
        let raw = serde_json::to_string_pretty(self).context("serialize settings")?;
        fs::write(path, raw).context("write settings")?;
        Ok(())
    }

    /// Looks a server up by name. With no name given, a file holding a
    /// single server selects it.
    pub fn server(&self, name: Option<&str>) -> Result<(&str, &ServerSettings)> {
        match name {
            Some(name) => match self.servers.get_key_value(name) {
                Some((key, server)) => Ok((key.as_str(), server)),
                None => bail!(
                    "unknown server {name:?}; configured servers: {}",
                    self.known_names()
                ),
            },
            None => {
                let mut iter = self.servers.iter();
                match (iter.next(), iter.next()) {
                    (Some((key, server)), None) => Ok((key.as_str(), server)),
                    (None, _) => bail!("no servers configured"),
                    _ => bail!(
                        "several servers configured, pick one with --server: {}",
                        self.known_names()
                    ),
                }
            }
        }
    }

    fn known_names(&self) -> String {
        self.servers.keys().cloned().collect::<Vec<_>>().join(", ")
    }
}

impl ServerSettings {
    pub fn new(server_dir: impl Into<PathBuf>) -> Self {
        Self {
            server_dir: server_dir.into(),
            mods_dir: None,
            mods: Vec::new(),
            steam_login: default_login(),
        }
    }

    /// Workshop content directory the mods are installed into.
    pub fn mods_dir(&self) -> PathBuf {
        self.mods_dir
            .clone()
            .unwrap_or_else(|| dayz::default_mods_dir(&self.server_dir))
    }

    /// Configured mods in load order. The first malformed entry aborts.
    pub fn mods(&self) -> Result<Vec<Mod>> {
        self.mods
            .iter()
            .enumerate()
            .map(|(index, raw)| {
                Mod::from_value(raw).with_context(|| format!("mod entry #{} ({raw})", index + 1))
            })
            .collect()
    }
}

fn default_login() -> String {
    "anonymous".to_string()
}
