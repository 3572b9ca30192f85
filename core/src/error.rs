//! The error taxonomy on the registry's boundary (§7).

use camino::Utf8PathBuf;
use mod_registry_types::{Identifier, PathError};
use thiserror::Error;

pub type RegistryResult<T> = Result<T, RegistryError>;

#[derive(Debug, Error)]
pub enum RegistryError {
    /// An identifier, version, or virtual package absent from the
    /// relevant index.
    #[error("not found: {0}")]
    NotFound(String),

    /// A file-ownership invariant would be violated (`register_install`)
    /// or files the caller claims to have removed still exist on disk
    /// (`deregister_install`). Carries the human-readable conflict
    /// messages the contract requires.
    #[error("inconsistent state: {}", .0.join("; "))]
    Inconsistent(Vec<String>),

    /// An absolute path given where a relative one is required.
    #[error(transparent)]
    PathError(#[from] PathError),

    /// Attempted to enlist in a transaction while already enlisted in a
    /// different one.
    #[error("transaction error: {0}")]
    TransactionError(String),

    /// Schema upgrade attempted without the context it needs (e.g. a
    /// game root to relativize legacy absolute paths against).
    #[error("internal error: {0}")]
    InternalError(String),

    /// The persisted blob's JSON text failed to parse or serialize.
    #[error(transparent)]
    JsonError(#[from] serde_json::Error),
}

impl RegistryError {
    pub fn not_found_identifier(id: &Identifier) -> Self {
        Self::NotFound(format!("no available module named \"{id}\""))
    }

    pub fn not_found_version(id: &Identifier, version: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("module \"{id}\" has no version {version}"))
    }

    pub fn file_already_owned(path: &Utf8PathBuf, new_owner: &Identifier, owner: &Identifier) -> String {
        format!("\"{path}\" claimed by \"{new_owner}\" is already owned by \"{owner}\"")
    }
}
