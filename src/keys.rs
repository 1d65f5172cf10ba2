use crate::{
    error::{ModError, ModResult},
    installed::InstalledMod,
    mods::Mod,
    reconcile::create_symlink,
};
use std::{fs, path::Path};
use tracing::debug;

/// Links the `.bikey` files of every enabled, installed mod into the
/// server's `keys/` directory and returns how many links were created.
/// Names already present there are skipped.
///
/// Run after [`crate::reconcile::fix_paths`] so `Keys/` and `key/` layouts
/// are visible as `keys/`.
pub fn install_keys(
    mods: &[Mod],
    base_dir: &Path,
    server_keys_dir: &Path,
) -> ModResult<usize> {
    let mut linked = 0;
    for value in mods.iter().filter(|value| value.enabled()) {
        let installed = InstalledMod::new(value, base_dir);
        if !installed.is_installed() {
            continue;
        }
        let keys = installed.key_files();
        for key in keys.iter() {
            let key = key.map_err(|err| installed.io_error("list keys", keys.dir(), err))?;
            let Some(file_name) = key.file_name() else {
                continue;
            };
            let link = server_keys_dir.join(file_name);
            if fs::symlink_metadata(&link).is_ok() {
                continue;
            }
            if !server_keys_dir.is_dir() {
                fs::create_dir_all(server_keys_dir)
                    .map_err(|err| installed.io_error("create keys dir", server_keys_dir, err))?;
            }
            // Links live in another directory, so point them at an absolute path.
            let target = fs::canonicalize(&key)
                .map_err(|err| installed.io_error("resolve key", &key, err))?;
            create_symlink(&target, &link).map_err(|source| ModError::Symlink {
                id: installed.id(),
                link: link.clone(),
                target: target.clone(),
                source,
            })?;
            debug!("Linked key {:?} to {:?}", target, link);
            linked += 1;
        }
    }
    Ok(linked)
}
