use crate::{
    dayz::{KEY_EXTENSION, METADATA_FILE, PACKAGE_EXTENSION},
    error::{ModError, ModResult},
    mods::{self, Mod},
};
use sha1::{Digest, Sha1};
use std::{
    fs::{self, File},
    io::{self, Read},
    path::{Path, PathBuf},
};
use tracing::debug;
use walkdir::WalkDir;

/// A mod as laid out on disk under a workshop content directory.
///
/// Nothing is cached: every accessor that touches the filesystem reads it
/// again.
#[derive(Debug, Clone)]
pub struct InstalledMod {
    value: Mod,
    path: PathBuf,
}

/// Files with one extension directly inside a directory.
///
/// Iterating re-reads the directory, so the same value can be walked any
/// number of times. A missing directory yields nothing; any other failure to
/// read it is yielded as an error.
#[derive(Debug, Clone)]
pub struct ModFiles {
    dir: PathBuf,
    extension: &'static str,
}

impl InstalledMod {
    pub fn new(value: &Mod, base_dir: &Path) -> Self {
        Self {
            value: value.clone(),
            path: mods::resolve(value, base_dir),
        }
    }

    pub fn id(&self) -> u64 {
        self.value.id()
    }

    pub fn mod_ref(&self) -> &Mod {
        &self.value
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn addons_dir(&self) -> PathBuf {
        self.path.join("addons")
    }

    pub fn keys_dir(&self) -> PathBuf {
        self.path.join("keys")
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.path.join(METADATA_FILE)
    }

    pub fn is_installed(&self) -> bool {
        self.path.is_dir()
    }

    /// Hex SHA-1 of the metadata file.
    pub fn checksum(&self) -> ModResult<String> {
        let path = self.metadata_path();
        let mut file = File::open(&path).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => ModError::MissingMetadata {
                id: self.id(),
                path: path.clone(),
            },
            _ => self.io_error("open metadata", &path, err),
        })?;
        let mut hasher = Sha1::new();
        let mut buffer = [0u8; 8192];
        loop {
            let read = file
                .read(&mut buffer)
                .map_err(|err| self.io_error("read metadata", &path, err))?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }
        Ok(hex::encode(hasher.finalize()))
    }

    pub fn package_files(&self) -> ModFiles {
        ModFiles::new(self.addons_dir(), PACKAGE_EXTENSION)
    }

    pub fn key_files(&self) -> ModFiles {
        ModFiles::new(self.keys_dir(), KEY_EXTENSION)
    }

    /// Deletes the whole install directory. The view is consumed.
    pub fn remove(self) -> ModResult<()> {
        fs::remove_dir_all(&self.path).map_err(|source| ModError::Removal {
            id: self.id(),
            path: self.path.clone(),
            source,
        })?;
        debug!("Removed mod {} at {:?}", self.id(), self.path);
        Ok(())
    }

    pub(crate) fn io_error(
        &self,
        operation: &'static str,
        path: &Path,
        source: io::Error,
    ) -> ModError {
        ModError::Io {
            id: self.id(),
            operation,
            path: path.to_path_buf(),
            source,
        }
    }
}

impl ModFiles {
    pub fn new(dir: PathBuf, extension: &'static str) -> Self {
        Self { dir, extension }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn iter(&self) -> impl Iterator<Item = io::Result<PathBuf>> + '_ {
        WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => entry.file_type().is_file().then(|| Ok(entry.into_path())),
                Err(err) if is_absent(&err) => None,
                Err(err) => Some(Err(io::Error::from(err))),
            })
            .filter(move |item| {
                item.as_ref()
                    .map_or(true, |path| has_extension(path, self.extension))
            })
    }

    /// Collects one pass over the directory, stopping at the first error.
    pub fn list(&self) -> io::Result<Vec<PathBuf>> {
        self.iter().collect()
    }
}

impl<'a> IntoIterator for &'a ModFiles {
    type Item = io::Result<PathBuf>;
    type IntoIter = Box<dyn Iterator<Item = io::Result<PathBuf>> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

/// The listed directory itself is missing, or an entry is a dangling link.
fn is_absent(err: &walkdir::Error) -> bool {
    let not_found = err
        .io_error()
        .map_or(false, |err| err.kind() == io::ErrorKind::NotFound);
    not_found && (err.depth() == 0 || err.path().map_or(false, Path::is_symlink))
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}
