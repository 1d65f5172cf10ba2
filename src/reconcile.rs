use crate::{
    error::{ModError, ModResult},
    installed::InstalledMod,
};
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use tracing::debug;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FixReport {
    pub links: Vec<PathBuf>,
}

impl FixReport {
    pub fn created(&self) -> usize {
        self.links.len()
    }

    fn push(&mut self, link: Option<PathBuf>) {
        if let Some(link) = link {
            self.links.push(link);
        }
    }
}

/// Adds lower-case symlinks so the server finds `addons/`, `keys/` and its
/// `.pbo` files in a mixed-case workshop download. Existing entries are
/// never touched.
pub fn fix_paths(installed: &InstalledMod) -> ModResult<FixReport> {
    let mut report = FixReport::default();
    let root = installed.path();

    let addons = root.join("Addons");
    if addons.is_dir() {
        report.push(link_to_lowercase(installed.id(), &addons)?);
    }

    let keys = root.join("Keys");
    if keys.is_dir() {
        report.push(link_to_lowercase(installed.id(), &keys)?);
    }

    let key = root.join("key");
    if !entry_exists(&installed.keys_dir()) && key.is_dir() {
        report.push(link_entry(installed.id(), &installed.keys_dir(), Path::new("key"))?);
    }

    let packages = installed.package_files();
    for pbo in packages.iter() {
        let pbo = pbo.map_err(|err| installed.io_error("list packages", packages.dir(), err))?;
        report.push(link_to_lowercase(installed.id(), &pbo)?);
    }

    Ok(report)
}

/// Links `path` under its lower-cased file name. Returns the new link, or
/// `None` when the name is already lower case or the lower-case name is taken.
pub fn link_to_lowercase(id: u64, path: &Path) -> ModResult<Option<PathBuf>> {
    let Some(file_name) = path.file_name() else {
        return Ok(None);
    };
    let name = file_name.to_string_lossy();
    let lower = name.to_lowercase();
    if lower == name {
        return Ok(None);
    }

    let parent = path.parent().unwrap_or_else(|| Path::new(""));
    link_entry(id, &parent.join(lower), Path::new(file_name))
}

fn link_entry(id: u64, link: &Path, target: &Path) -> ModResult<Option<PathBuf>> {
    if entry_exists(link) {
        return Ok(None);
    }
    debug!("Linking {:?} to {:?}", target, link);
    create_symlink(target, link).map_err(|source| ModError::Symlink {
        id,
        link: link.to_path_buf(),
        target: target.to_path_buf(),
        source,
    })?;
    Ok(Some(link.to_path_buf()))
}

/// True for any entry, including a dangling symlink.
fn entry_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

#[cfg(unix)]
pub(crate) fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
pub(crate) fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
    let resolved = match link.parent() {
        Some(parent) => parent.join(target),
        None => target.to_path_buf(),
    };
    if resolved.is_dir() {
        std::os::windows::fs::symlink_dir(target, link)
    } else {
        std::os::windows::fs::symlink_file(target, link)
    }
}

#[cfg(not(any(unix, windows)))]
pub(crate) fn create_symlink(_target: &Path, _link: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Other,
        "symlink unavailable on this platform",
    ))
}
