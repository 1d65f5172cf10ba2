use crate::{
    config::{ServerSettings, Settings},
    dayz::{self, Platform},
    error::ModError,
    fetch::{self, SteamCmd, UpdateOutcome},
    installed::InstalledMod,
    keys,
    modlist::{self, DEFAULT_SEPARATOR},
    mods::{self, Mod, ModRef},
    reconcile,
    state::{self, ChecksumIndex},
};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "dzmods")]
#[command(author, version, about = "Manage Steam Workshop mods of DayZ servers")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Settings file (defaults to the platform location)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Server entry in the settings file
    #[arg(short, long, global = true)]
    server: Option<String>,

    /// Comma separated mod ids to use instead of the configured list; a
    /// negative id marks a disabled mod
    #[arg(long, global = true, value_delimiter = ',', allow_hyphen_values = true)]
    mods: Vec<String>,

    /// Workshop content directory to use instead of the configured one
    #[arg(long, global = true)]
    mods_dir: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// List mods in load order
    List,
    /// Print the install paths of enabled mods as one string
    ModString {
        /// Separator between paths
        #[arg(long, default_value = DEFAULT_SEPARATOR)]
        sep: String,
        /// Print the `-mod=` server argument instead
        #[arg(long)]
        launch: bool,
    },
    /// Print resolved install paths
    Paths,
    /// Add lower-case symlinks to mixed-case mod layouts
    Fix,
    /// Link mod keys into the server's keys directory
    Keys,
    /// Print metadata checksums of installed mods
    Checksums,
    /// Compare checksums against the recorded state
    Changed {
        /// Record the current checksums afterwards
        #[arg(long)]
        record: bool,
        /// State file (defaults to the per-user data directory)
        #[arg(long)]
        state: Option<PathBuf>,
    },
    /// Download flagged mods with steamcmd and repair their layout
    Update {
        /// Update the server installation first
        #[arg(long)]
        with_server: bool,
    },
    /// Delete installed mods
    Remove {
        /// Mod ids to remove
        #[arg(required = true)]
        ids: Vec<String>,
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },
}

impl Command {
    fn needs_server(&self) -> bool {
        matches!(
            self,
            Command::Keys | Command::Changed { .. } | Command::Update { .. }
        )
    }
}

struct Session {
    server_name: Option<String>,
    server: Option<ServerSettings>,
    mods: Vec<Mod>,
    mods_dir: PathBuf,
}

impl Session {
    fn server(&self) -> Result<(&str, &ServerSettings)> {
        match (&self.server_name, &self.server) {
            (Some(name), Some(server)) => Ok((name.as_str(), server)),
            _ => bail!("this command needs a configured server"),
        }
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let platform = Platform::detect()?;
    let session = open_session(&cli, &platform)?;

    match &cli.command {
        Command::List => {
            for line in modlist::display_lines(&session.mods) {
                println!("{line}");
            }
        }
        Command::ModString { sep, launch } => {
            let out = if *launch {
                modlist::launch_mod_arg(&session.mods, &session.mods_dir)
            } else {
                modlist::mods_str(&session.mods, &session.mods_dir, sep)
            };
            println!("{out}");
        }
        Command::Paths => {
            if let Ok((_, server)) = session.server() {
                println!(
                    "server binary: {}",
                    platform.server_binary_path(&server.server_dir).display()
                );
            }
            for value in &session.mods {
                println!("{} {}", value.id(), mods::resolve(value, &session.mods_dir).display());
            }
        }
        Command::Fix => {
            let created = fix_all(&session)?;
            info!("Created {created} symlink(s)");
        }
        Command::Keys => {
            let (_, server) = session.server()?;
            dayz::ensure_server_root(&server.server_dir)?;
            fix_all(&session)?;
            let keys_dir = server.server_dir.join(dayz::SERVER_KEYS_DIR);
            let linked = keys::install_keys(&session.mods, &session.mods_dir, &keys_dir)?;
            info!("Linked {linked} key(s) into {}", keys_dir.display());
        }
        Command::Checksums => {
            for (id, checksum) in installed_checksums(&session)? {
                println!("{id} {checksum}");
            }
        }
        Command::Changed { record, state } => {
            let (name, _) = session.server()?;
            let path = match state {
                Some(path) => path.clone(),
                None => state::default_index_path(name)?,
            };
            let mut index = ChecksumIndex::load(&path);
            for change in index.changed(&session.mods, &session.mods_dir)? {
                println!("{} {}", change.id, change.status.label());
            }
            if *record {
                let count = index.record(&session.mods, &session.mods_dir)?;
                index.save(&path)?;
                info!("Recorded {count} checksum(s) in {}", path.display());
            }
        }
        Command::Update { with_server } => {
            let (_, server) = session.server()?;
            check_update_target(&session.mods_dir, server)?;
            let steamcmd = SteamCmd::new(&server.server_dir, &server.steam_login);
            if *with_server && !steamcmd.update_server()? {
                bail!("steamcmd failed to update the server");
            }
            let outcomes = fetch::update_mods(&steamcmd, &session.mods, &session.mods_dir)?;
            let mut failed = 0;
            for outcome in &outcomes {
                match outcome {
                    UpdateOutcome::Updated { id, fix } => {
                        println!("{id} updated ({} link(s))", fix.created())
                    }
                    UpdateOutcome::Failed { id } => {
                        failed += 1;
                        println!("{id} failed");
                    }
                    UpdateOutcome::Skipped { id } => println!("{id} skipped"),
                }
            }
            if failed > 0 {
                bail!("{failed} mod(s) failed to update");
            }
        }
        Command::Remove { ids, yes } => {
            if !*yes {
                bail!("refusing to delete mods without --yes");
            }
            for token in ids {
                let value = Mod::try_from(ModRef::from_token(token)?)?;
                InstalledMod::new(&value, &session.mods_dir).remove()?;
                info!("Removed mod {}", value.id());
            }
        }
    }

    Ok(())
}

fn open_session(cli: &Cli, platform: &Platform) -> Result<Session> {
    let needs_settings =
        cli.mods.is_empty() || cli.mods_dir.is_none() || cli.command.needs_server();

    let (server_name, server) = if needs_settings {
        let path = cli.config.as_ref().unwrap_or(&platform.settings_file);
        let settings = Settings::load(path)?;
        let (name, server) = settings.server(cli.server.as_deref())?;
        (Some(name.to_string()), Some(server.clone()))
    } else {
        (None, None)
    };

    let mods = if cli.mods.is_empty() {
        match &server {
            Some(server) => server.mods()?,
            None => Vec::new(),
        }
    } else {
        cli.mods
            .iter()
            .map(|token| {
                ModRef::from_token(token)
                    .and_then(Mod::try_from)
                    .with_context(|| format!("mod argument {token:?}"))
            })
            .collect::<Result<Vec<_>>>()?
    };

    let mods_dir = match (&cli.mods_dir, &server) {
        (Some(dir), _) => dir.clone(),
        (None, Some(server)) => server.mods_dir(),
        (None, None) => bail!("no mods directory: pass --mods-dir or configure a server"),
    };

    Ok(Session {
        server_name,
        server,
        mods,
        mods_dir,
    })
}

fn fix_all(session: &Session) -> Result<usize> {
    let mut created = 0;
    for value in &session.mods {
        let installed = InstalledMod::new(value, &session.mods_dir);
        if !installed.is_installed() {
            warn!("Mod {} is not installed at {}", value.id(), installed.path().display());
            continue;
        }
        created += reconcile::fix_paths(&installed)?.created();
    }
    Ok(created)
}

/// Checksums of installed mods in load order. Mods that are missing or have
/// no metadata file are skipped with a warning.
fn installed_checksums(session: &Session) -> Result<Vec<(u64, String)>> {
    let mut checksums = Vec::new();
    for value in &session.mods {
        let installed = InstalledMod::new(value, &session.mods_dir);
        if !installed.is_installed() {
            warn!("Mod {} is not installed at {}", value.id(), installed.path().display());
            continue;
        }
        match installed.checksum() {
            Ok(checksum) => checksums.push((value.id(), checksum)),
            Err(ModError::MissingMetadata { path, .. }) => {
                warn!("Mod {} has no metadata file at {}", value.id(), path.display());
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(checksums)
}

/// steamcmd always installs under the server directory, so an update pass
/// cannot repair mods somewhere else.
fn check_update_target(mods_dir: &Path, server: &ServerSettings) -> Result<()> {
    let install_dir = dayz::default_mods_dir(&server.server_dir);
    if mods_dir != install_dir {
        bail!(
            "update installs into {} but the mods directory is {}; drop the override",
            install_dir.display(),
            mods_dir.display()
        );
    }
    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_negative_mod_ids() {
        let cli = Cli::try_parse_from(["dzmods", "--mods", "6,-7,8", "--mods-dir", "/c", "list"])
            .unwrap();
        assert_eq!(cli.mods, vec!["6", "-7", "8"]);
        let session = open_session(&cli, &Platform::detect().unwrap()).unwrap();
        let enabled: Vec<bool> = session.mods.iter().map(Mod::enabled).collect();
        assert_eq!(enabled, vec![true, false, true]);
        assert_eq!(session.mods_dir, PathBuf::from("/c"));
        assert!(session.server().is_err());
    }

    #[test]
    fn update_rejects_mods_dir_override() {
        let server = ServerSettings::new("/srv/dayz");
        let default_dir = Path::new("/srv/dayz/steamapps/workshop/content");
        assert!(check_update_target(default_dir, &server).is_ok());
        let err = check_update_target(Path::new("/srv/mods"), &server).unwrap_err();
        assert!(err.to_string().contains("/srv/mods"));
    }

    #[test]
    fn checksums_skip_mods_without_metadata() {
        let temp = tempfile::TempDir::new().unwrap();
        let mods = vec![
            Mod::from_id(1, None, true).unwrap(),
            Mod::from_id(2, None, true).unwrap(),
            Mod::from_id(-3, None, true).unwrap(),
        ];
        let installed = InstalledMod::new(&mods[0], temp.path());
        std::fs::create_dir_all(installed.path()).unwrap();
        std::fs::write(installed.metadata_path(), b"abc").unwrap();
        std::fs::create_dir_all(InstalledMod::new(&mods[1], temp.path()).path()).unwrap();
        let session = Session {
            server_name: None,
            server: None,
            mods,
            mods_dir: temp.path().to_path_buf(),
        };

        let checksums = installed_checksums(&session).unwrap();
        assert_eq!(
            checksums,
            vec![(1, "a9993e364706816aba3e25717850c26c9cd0d89d".to_string())]
        );
    }

    #[test]
    fn remove_requires_ids() {
        assert!(Cli::try_parse_from(["dzmods", "remove"]).is_err());
        let cli = Cli::try_parse_from(["dzmods", "remove", "5", "--yes"]).unwrap();
        assert!(matches!(cli.command, Command::Remove { yes: true, .. }));
    }

    #[test]
    fn mod_string_defaults_to_semicolon() {
        let cli = Cli::try_parse_from(["dzmods", "mod-string"]).unwrap();
        match cli.command {
            Command::ModString { sep, launch } => {
                assert_eq!(sep, ";");
                assert!(!launch);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
