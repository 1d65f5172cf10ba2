use anyhow::{bail, Result};
use std::path::{Path, PathBuf};

pub const DAYZ_APP_ID: u64 = 221100;
pub const DAYZ_SERVER_APP_ID: u64 = 223350;
pub const WORKSHOP_CONTENT_DIR: &str = "steamapps/workshop/content";
pub const WORKSHOP_URL: &str = "https://steamcommunity.com/sharedfiles/filedetails/?id=";
pub const STEAMCMD: &str = "steamcmd";
pub const SERVER_CONFIG_FILE: &str = "serverDZ.cfg";
pub const SERVER_KEYS_DIR: &str = "keys";

pub const PACKAGE_EXTENSION: &str = "pbo";
pub const KEY_EXTENSION: &str = "bikey";
pub const METADATA_FILE: &str = "meta.cpp";

/// Per-OS defaults. Picked once at startup and passed down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub settings_file: PathBuf,
    pub server_binary: &'static str,
}

impl Platform {
    #[cfg(unix)]
    pub fn detect() -> Result<Self> {
        Ok(Self {
            settings_file: PathBuf::from("/etc/dzservers.json"),
            server_binary: "DayZServer",
        })
    }

    #[cfg(windows)]
    pub fn detect() -> Result<Self> {
        use anyhow::Context;

        let program_files =
            std::env::var_os("PROGRAMFILES").context("resolve %PROGRAMFILES%")?;
        Ok(Self {
            settings_file: PathBuf::from(program_files)
                .join("dzsrv")
                .join("servers.json"),
            server_binary: "DayZServer_x64.exe",
        })
    }

    #[cfg(not(any(unix, windows)))]
    pub fn detect() -> Result<Self> {
        bail!("unsupported operating system")
    }

    pub fn server_binary_path(&self, server_dir: &Path) -> PathBuf {
        server_dir.join(self.server_binary)
    }
}

/// Default base directory for workshop content of a server install.
pub fn default_mods_dir(server_dir: &Path) -> PathBuf {
    server_dir.join(WORKSHOP_CONTENT_DIR)
}

pub fn workshop_url(id: u64) -> String {
    format!("{WORKSHOP_URL}{id}")
}

pub fn looks_like_server_root(path: &Path) -> bool {
    path.join(SERVER_CONFIG_FILE).is_file()
}

pub fn ensure_server_root(path: &Path) -> Result<()> {
    if !path.is_dir() {
        bail!("server directory {} does not exist", path.display());
    }
    if !looks_like_server_root(path) {
        bail!(
            "invalid server root: expected {SERVER_CONFIG_FILE} in {}",
            path.display()
        );
    }
    Ok(())
}
