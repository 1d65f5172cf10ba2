use crate::{
    dayz::{DAYZ_APP_ID, DAYZ_SERVER_APP_ID, STEAMCMD},
    installed::InstalledMod,
    mods::Mod,
    reconcile::{self, FixReport},
};
use anyhow::{Context, Result};
use std::{
    path::{Path, PathBuf},
    process::Command,
};
use tracing::{info, warn};

/// Downloads workshop items into the server tree.
pub trait Fetcher {
    /// Fetches one workshop item. `Ok(false)` means the client ran but
    /// reported failure.
    fn fetch(&self, id: u64) -> Result<bool>;
}

#[derive(Debug, Clone)]
pub struct SteamCmd {
    pub binary: PathBuf,
    pub install_dir: PathBuf,
    pub login: String,
}

impl SteamCmd {
    pub fn new(install_dir: impl Into<PathBuf>, login: impl Into<String>) -> Self {
        Self {
            binary: PathBuf::from(STEAMCMD),
            install_dir: install_dir.into(),
            login: login.into(),
        }
    }

    pub fn workshop_args(&self, id: u64) -> Vec<String> {
        let mut args = self.session_args();
        args.extend([
            "+workshop_download_item".to_string(),
            DAYZ_APP_ID.to_string(),
            id.to_string(),
            "validate".to_string(),
            "+quit".to_string(),
        ]);
        args
    }

    pub fn server_args(&self) -> Vec<String> {
        let mut args = self.session_args();
        args.extend([
            "+app_update".to_string(),
            DAYZ_SERVER_APP_ID.to_string(),
            "validate".to_string(),
            "+quit".to_string(),
        ]);
        args
    }

    /// Installs or updates the dedicated server itself.
    pub fn update_server(&self) -> Result<bool> {
        self.run(&self.server_args())
    }

    fn session_args(&self) -> Vec<String> {
        vec![
            "+force_install_dir".to_string(),
            self.install_dir.to_string_lossy().into_owned(),
            "+login".to_string(),
            self.login.clone(),
        ]
    }

    fn run(&self, args: &[String]) -> Result<bool> {
        let status = Command::new(&self.binary)
            .args(args)
            .status()
            .with_context(|| format!("run {}", self.binary.display()))?;
        Ok(status.success())
    }
}

impl Fetcher for SteamCmd {
    fn fetch(&self, id: u64) -> Result<bool> {
        self.run(&self.workshop_args(id))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated { id: u64, fix: FixReport },
    Failed { id: u64 },
    Skipped { id: u64 },
}

/// Fetches every mod flagged for updates, then repairs its layout.
/// A failed fetch is reported and the pass moves on; repair errors abort.
///
/// `base_dir` must be the directory the fetcher installs into. A fetch that
/// reports success but leaves nothing at the resolved path counts as failed.
pub fn update_mods<F: Fetcher + ?Sized>(
    fetcher: &F,
    mods: &[Mod],
    base_dir: &Path,
) -> Result<Vec<UpdateOutcome>> {
    let mut outcomes = Vec::with_capacity(mods.len());
    for value in mods {
        if !value.update() {
            outcomes.push(UpdateOutcome::Skipped { id: value.id() });
            continue;
        }

        info!("Updating mod {}", value);
        let fetched = match fetcher.fetch(value.id()) {
            Ok(fetched) => fetched,
            Err(err) => {
                warn!("Fetching mod {} failed: {err:#}", value.id());
                false
            }
        };
        if !fetched {
            outcomes.push(UpdateOutcome::Failed { id: value.id() });
            continue;
        }

        let installed = InstalledMod::new(value, base_dir);
        if !installed.is_installed() {
            warn!(
                "Mod {} was fetched but nothing is installed at {}",
                value.id(),
                installed.path().display()
            );
            outcomes.push(UpdateOutcome::Failed { id: value.id() });
            continue;
        }
        let fix = reconcile::fix_paths(&installed)
            .with_context(|| format!("fix paths of mod {}", value.id()))?;
        outcomes.push(UpdateOutcome::Updated { id: value.id(), fix });
    }
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::RefCell, fs};
    use tempfile::TempDir;

    struct FakeFetcher {
        base_dir: PathBuf,
        failing: Vec<u64>,
        calls: RefCell<Vec<u64>>,
    }

    impl Fetcher for FakeFetcher {
        fn fetch(&self, id: u64) -> Result<bool> {
            self.calls.borrow_mut().push(id);
            if self.failing.contains(&id) {
                return Ok(false);
            }
            let value = Mod::try_from(i64::try_from(id)?)?;
            let installed = InstalledMod::new(&value, &self.base_dir);
            fs::create_dir_all(installed.path().join("Addons"))?;
            fs::write(installed.metadata_path(), b"meta")?;
            Ok(true)
        }
    }

    #[test]
    fn steamcmd_arguments() {
        let steamcmd = SteamCmd::new("/srv/dayz", "anonymous");
        assert_eq!(
            steamcmd.workshop_args(1559212036),
            vec![
                "+force_install_dir",
                "/srv/dayz",
                "+login",
                "anonymous",
                "+workshop_download_item",
                "221100",
                "1559212036",
                "validate",
                "+quit",
            ]
        );
        assert_eq!(
            steamcmd.server_args()[4..],
            ["+app_update", "223350", "validate", "+quit"]
        );
    }

    #[cfg(unix)]
    #[test]
    fn update_pass_fetches_flagged_mods_and_repairs() {
        let temp = TempDir::new().unwrap();
        let fetcher = FakeFetcher {
            base_dir: temp.path().to_path_buf(),
            failing: vec![3],
            calls: RefCell::new(Vec::new()),
        };
        let mods = vec![
            Mod::from_id(1, None, true).unwrap(),
            Mod::from_id(2, None, false).unwrap(),
            Mod::from_id(3, None, true).unwrap(),
            Mod::from_id(-4, None, true).unwrap(),
        ];

        let outcomes = update_mods(&fetcher, &mods, temp.path()).unwrap();
        assert_eq!(*fetcher.calls.borrow(), vec![1, 3, 4]);
        assert!(matches!(outcomes[0], UpdateOutcome::Updated { id: 1, ref fix } if fix.created() == 1));
        assert_eq!(outcomes[1], UpdateOutcome::Skipped { id: 2 });
        assert_eq!(outcomes[2], UpdateOutcome::Failed { id: 3 });
        assert!(matches!(outcomes[3], UpdateOutcome::Updated { id: 4, .. }));
        assert!(InstalledMod::new(&mods[0], temp.path()).addons_dir().is_dir());
    }

    struct SilentFetcher;

    impl Fetcher for SilentFetcher {
        fn fetch(&self, _id: u64) -> Result<bool> {
            Ok(true)
        }
    }

    #[test]
    fn fetch_without_install_is_failure() {
        let temp = TempDir::new().unwrap();
        let mods = vec![Mod::from_id(5, None, true).unwrap()];

        let outcomes = update_mods(&SilentFetcher, &mods, &temp.path().join("override")).unwrap();
        assert_eq!(outcomes, vec![UpdateOutcome::Failed { id: 5 }]);
    }

    #[cfg(unix)]
    #[test]
    fn install_outside_base_dir_is_failure() {
        let temp = TempDir::new().unwrap();
        let fetcher = FakeFetcher {
            base_dir: temp.path().join("server"),
            failing: Vec::new(),
            calls: RefCell::new(Vec::new()),
        };
        let mods = vec![Mod::from_id(6, None, true).unwrap()];

        let outcomes = update_mods(&fetcher, &mods, &temp.path().join("elsewhere")).unwrap();
        assert_eq!(*fetcher.calls.borrow(), vec![6]);
        assert_eq!(outcomes, vec![UpdateOutcome::Failed { id: 6 }]);
    }
}
