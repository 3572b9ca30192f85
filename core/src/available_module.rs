//! Per-identifier bag of all known versions of a mod (component B).

use std::collections::HashMap;

use mod_registry_types::{
    CkanModule, GameVersion, GameVersionCriteria, GameVersionInterval, Identifier,
    ModuleVersion, RelationshipDescriptor,
};
use serde::{Deserialize, Serialize};

/// All versions of a single mod known from repositories. Invariant: every
/// value's `identifier` equals `self.identifier`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AvailableModule {
    identifier: Identifier,
    versions: HashMap<ModuleVersion, CkanModule>,
}

impl AvailableModule {
    pub fn new(identifier: Identifier) -> Self {
        Self {
            identifier,
            versions: HashMap::new(),
        }
    }

    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    /// Insert `m` keyed by its version, silently overwriting any existing
    /// entry at that version (newer metadata wins; equal-keyed inserts are
    /// the only way two versions can tie, so "last added wins" falls out
    /// of plain `HashMap` insert semantics).
    pub fn add(&mut self, m: CkanModule) {
        debug_assert_eq!(
            m.identifier, self.identifier,
            "tried to add a module under the wrong AvailableModule bucket"
        );

        self.versions.insert(m.version.clone(), m);
    }

    /// No-op if `v` is absent.
    pub fn remove(&mut self, v: &ModuleVersion) {
        self.versions.remove(v);
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// All versions, newest first. Versions that aren't `Semantic` (and so
    /// have no total order) sort after every semantic version, in
    /// insertion-arbitrary order relative to each other.
    pub fn all(&self) -> Vec<&CkanModule> {
        let mut all: Vec<&CkanModule> = self.versions.values().collect();
        all.sort_by(|a, b| match a.version.partial_cmp(&b.version) {
            Some(ord) => ord.reverse(),
            None => std::cmp::Ordering::Equal,
        });
        all
    }

    /// The highest-version entry that: intersects `criteria` (if given),
    /// satisfies `constraint` (if given), and does not conflict with
    /// anything in `already_installed` or `also_installing`.
    pub fn latest(
        &self,
        criteria: Option<&GameVersionCriteria>,
        constraint: Option<&RelationshipDescriptor>,
        already_installed: &[&CkanModule],
        also_installing: &[&CkanModule],
    ) -> Option<&CkanModule> {
        self.all()
            .into_iter()
            .find(|m| {
                let criteria_ok = criteria.is_none_or(|c| m.game_version.intersects(c));
                let constraint_ok = constraint.is_none_or(|c| c.version_satisfied_by(&m.version));
                let conflict_free = !Self::conflicts_with_any(
                    m,
                    already_installed.iter().copied().chain(also_installing.iter().copied()),
                );

                criteria_ok && constraint_ok && conflict_free
            })
    }

    fn conflicts_with_any<'a>(candidate: &CkanModule, others: impl Iterator<Item = &'a CkanModule>) -> bool {
        let others: Vec<&CkanModule> = others.collect();
        candidate
            .conflicts
            .iter()
            .any(|c| c.satisfied_by(others.iter().copied()))
    }

    /// The maximum `max_game` across all versions; `Any` absorbs any
    /// concrete value.
    pub fn latest_compatible_game_version(&self) -> GameVersion {
        self.versions
            .values()
            .map(|m| m.game_version.max.clone())
            .fold(GameVersion::Concrete(semver::Version::new(0, 0, 0)), |acc, v| {
                GameVersionInterval::max_absorbing(&acc, &v)
            })
    }
}

// `is_none_or` lands in stable Rust relatively recently; spell it out so
// this compiles against the toolchains the rest of the corpus targets.
trait OptionExt<T> {
    fn is_none_or(self, f: impl FnOnce(T) -> bool) -> bool;
}

impl<T> OptionExt<T> for Option<T> {
    fn is_none_or(self, f: impl FnOnce(T) -> bool) -> bool {
        match self {
            None => true,
            Some(v) => f(v),
        }
    }
}
