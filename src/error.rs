use std::{io, path::PathBuf};
use thiserror::Error;

/// Errors raised by mod identity parsing and installed-mod filesystem work.
#[derive(Debug, Error)]
pub enum ModError {
    #[error("invalid mod id: {value}")]
    InvalidIdentity { value: String },

    #[error("mod entry is missing required field `{field}`")]
    MissingField { field: &'static str },

    #[error("cannot create mod from {found}")]
    UnsupportedType { found: String },

    #[error("mod {id}: checksum requested but metadata file {path:?} does not exist")]
    MissingMetadata { id: u64, path: PathBuf },

    #[error("mod {id}: symlink {link:?} -> {target:?} failed: {source}")]
    Symlink {
        id: u64,
        link: PathBuf,
        target: PathBuf,
        source: io::Error,
    },

    #[error("mod {id}: removing {path:?} failed: {source}")]
    Removal {
        id: u64,
        path: PathBuf,
        source: io::Error,
    },

    #[error("mod {id}: {operation} {path:?} failed: {source}")]
    Io {
        id: u64,
        operation: &'static str,
        path: PathBuf,
        source: io::Error,
    },
}

pub type ModResult<T> = Result<T, ModError>;
