//! Relative-path -> owning-module map (component F), plus the sibling
//! table of auto-detected loose binaries that shares its key space
//! (invariant 3: a path already claimed by `installed_files` must never
//! also appear in `installed_dlls`).

use std::collections::HashMap;

use camino::{Utf8Path, Utf8PathBuf};
use mod_registry_types::Identifier;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileOwnership {
    owners: HashMap<Utf8PathBuf, Identifier>,
}

impl FileOwnership {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn owner(&self, path: &Utf8Path) -> Option<&Identifier> {
        self.owners.get(path)
    }

    /// Paths in `paths` already owned by someone other than `owner`,
    /// paired with their current owner. Computed without mutating
    /// anything, so `register_install` can build its full conflict list
    /// before committing any claim.
    pub fn conflicts_for<'a>(
        &self,
        owner: &Identifier,
        paths: impl Iterator<Item = &'a Utf8PathBuf>,
    ) -> Vec<(Utf8PathBuf, Identifier)> {
        paths
            .filter_map(|p| {
                self.owners.get(p).and_then(|existing| {
                    (existing != owner).then(|| (p.clone(), existing.clone()))
                })
            })
            .collect()
    }

    pub fn claim(&mut self, path: Utf8PathBuf, owner: Identifier) {
        self.owners.insert(path, owner);
    }

    pub fn release(&mut self, path: &Utf8Path) {
        self.owners.remove(path);
    }

    pub fn release_all<'a>(&mut self, paths: impl Iterator<Item = &'a Utf8PathBuf>) {
        for p in paths {
            self.release(p);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Utf8PathBuf, &Identifier)> {
        self.owners.iter()
    }
}

/// `installed_dlls`: short-name -> relative path of an auto-detected
/// loose plugin binary (component "auto-detected artifacts" in §3).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LooseBinaryTable {
    entries: HashMap<String, Utf8PathBuf>,
}

impl LooseBinaryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites permitted, per §4.7.
    pub fn register(&mut self, short_name: String, path: Utf8PathBuf) {
        self.entries.insert(short_name, path);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn paths(&self) -> impl Iterator<Item = &Utf8PathBuf> {
        self.entries.values()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &Utf8PathBuf)> {
        self.entries.iter().map(|(name, path)| (name.as_str(), path))
    }

    pub fn contains(&self, short_name: &str) -> bool {
        self.entries.contains_key(short_name)
    }

    pub fn short_name_for_path(&self, path: &Utf8Path) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, p)| p.as_path() == path)
            .map(|(name, _)| name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflicts_for_ignores_paths_owned_by_the_same_module() {
        let mut fo = FileOwnership::new();
        let a = Identifier::new("mod-a");
        fo.claim(Utf8PathBuf::from("GameData/a.cfg"), a.clone());

        let paths = vec![Utf8PathBuf::from("GameData/a.cfg")];
        assert!(fo.conflicts_for(&a, paths.iter()).is_empty());
    }

    #[test]
    fn conflicts_for_reports_foreign_owner() {
        let mut fo = FileOwnership::new();
        let a = Identifier::new("mod-a");
        let b = Identifier::new("mod-b");
        fo.claim(Utf8PathBuf::from("GameData/a.cfg"), a.clone());

        let paths = vec![Utf8PathBuf::from("GameData/a.cfg")];
        let conflicts = fo.conflicts_for(&b, paths.iter());
        assert_eq!(conflicts, vec![(Utf8PathBuf::from("GameData/a.cfg"), a)]);
    }

    #[test]
    fn release_all_drops_every_path() {
        let mut fo = FileOwnership::new();
        let a = Identifier::new("mod-a");
        let paths = vec![Utf8PathBuf::from("GameData/a.cfg"), Utf8PathBuf::from("GameData/b.cfg")];
        for p in &paths {
            fo.claim(p.clone(), a.clone());
        }

        fo.release_all(paths.iter());
        assert!(fo.owner(&paths[0]).is_none());
        assert!(fo.owner(&paths[1]).is_none());
    }

    #[test]
    fn loose_binary_table_overwrites_permitted() {
        let mut t = LooseBinaryTable::new();
        t.register("Foo".into(), Utf8PathBuf::from("GameData/Foo.dll"));
        t.register("Foo".into(), Utf8PathBuf::from("GameData/Other/Foo.dll"));
        assert_eq!(t.paths().count(), 1);
    }
}
