//! Inverted index: virtual package name -> identifiers of the
//! `AvailableModule`s that provide it (component D).
//!
//! A derived cache, not part of the persisted blob (§6.1 rebuilds it after
//! deserialization). Entries are left *stale-safe*: removing a single
//! version from an `AvailableModule` does not prune the index (invariant
//! 4's "contains exactly" is about what was ever true, not what's true
//! right now — callers re-verify membership, see
//! `Registry::latest_available_with_provides`).

use std::collections::{HashMap, HashSet};

use mod_registry_types::Identifier;

use crate::available_module::AvailableModule;

#[derive(Clone, Debug, Default)]
pub struct ProvidesIndex {
    index: HashMap<Identifier, HashSet<Identifier>>,
}

impl ProvidesIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Walk `am`'s versions and insert it into the index under every
    /// virtual name any version provides.
    pub fn reindex(&mut self, am: &AvailableModule) {
        for m in am.all() {
            for provided in &m.provides {
                self.index
                    .entry(provided.clone())
                    .or_default()
                    .insert(am.identifier().clone());
            }
        }
    }

    /// Full rebuild from scratch, used by `set_all_available` and after
    /// deserialization.
    pub fn rebuild<'a>(&mut self, modules: impl Iterator<Item = &'a AvailableModule>) {
        self.index.clear();
        for am in modules {
            self.reindex(am);
        }
    }

    /// Identifiers of the `AvailableModule`s indexed under `virtual_id`.
    /// May contain stale entries (see module docs); callers must
    /// re-verify.
    pub fn providers(&self, virtual_id: &str) -> impl Iterator<Item = &Identifier> {
        self.index.get(virtual_id).into_iter().flatten()
    }

    /// Every virtual name currently indexed, stale entries included.
    pub fn virtual_identifiers(&self) -> impl Iterator<Item = &Identifier> {
        self.index.keys()
    }
}
