//! A locally-installed mod: a metadata snapshot plus the files it owns
//! (component C).

use camino::{Utf8Path, Utf8PathBuf};
use mod_registry_types::{path, CkanModule};
use serde::{Deserialize, Serialize};

/// `{ metadata, files, auto_installed }`. Opaque outside of its getters;
/// created by `Registry::register_install`, never mutated in place, and
/// removed by `Registry::deregister_install`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InstalledModule {
    /// A snapshot of the metadata at install time. Later catalog updates
    /// do not mutate it.
    metadata: CkanModule,

    /// Relative paths this module owns, sorted and deduplicated by
    /// `register_install` before storage — an ordered set, not a claim-order
    /// log.
    files: Vec<Utf8PathBuf>,

    auto_installed: bool,
}

impl InstalledModule {
    pub fn new(metadata: CkanModule, files: Vec<Utf8PathBuf>, auto_installed: bool) -> Self {
        Self {
            metadata,
            files,
            auto_installed,
        }
    }

    pub fn metadata(&self) -> &CkanModule {
        &self.metadata
    }

    pub fn files(&self) -> &[Utf8PathBuf] {
        &self.files
    }

    pub fn auto_installed(&self) -> bool {
        self.auto_installed
    }

    /// Rewrite any stored absolute path (in the file list) to be relative
    /// to `game_root`. Used once, during the `registry_version == 0`
    /// schema-upgrade step (§6.1, §9 path canonicalization). Paths
    /// already relative are left untouched.
    pub fn renormalize(&mut self, game_root: &Utf8Path) {
        for p in &mut self.files {
            let normalized = path::normalize_separators(p);

            *p = if normalized.is_absolute() {
                path::relativize(&normalized, game_root).unwrap_or(normalized)
            } else {
                normalized
            };
        }
    }
}
