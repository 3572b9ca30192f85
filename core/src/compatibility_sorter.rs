//! On-demand partition of the available catalog into game-version
//! compatible / incompatible sets, memoized by criteria (component E).

use std::collections::HashMap;

use mod_registry_types::{GameVersionCriteria, Identifier};

use crate::available_module::AvailableModule;

#[derive(Clone, Debug)]
struct CachedSort {
    criteria: GameVersionCriteria,
    compatible: HashMap<Identifier, AvailableModule>,
    incompatible: HashMap<Identifier, AvailableModule>,
}

/// Caching is all-or-nothing: a query with a criteria that doesn't match
/// the cached one discards the whole partition and rebuilds both maps.
#[derive(Clone, Debug, Default)]
pub struct CompatibilitySorter {
    cached: Option<CachedSort>,
}

impl CompatibilitySorter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard the cache. Called whenever the available set changes.
    pub fn invalidate(&mut self) {
        self.cached = None;
    }

    /// Make sure the cache holds a partition for exactly `criteria`,
    /// rebuilding it from `available` if necessary.
    pub fn ensure<'a>(
        &mut self,
        criteria: &GameVersionCriteria,
        available: impl Iterator<Item = &'a AvailableModule>,
    ) {
        if self.cached.as_ref().is_some_and(|c| &c.criteria == criteria) {
            return;
        }

        let mut compatible = HashMap::new();
        let mut incompatible = HashMap::new();

        for am in available {
            if am.latest(Some(criteria), None, &[], &[]).is_some() {
                compatible.insert(am.identifier().clone(), am.clone());
            } else {
                incompatible.insert(am.identifier().clone(), am.clone());
            }
        }

        self.cached = Some(CachedSort {
            criteria: criteria.clone(),
            compatible,
            incompatible,
        });
    }

    /// Panics if called before `ensure` for the current criteria — callers
    /// (`Registry::compatible_modules`/`incompatible_modules`) always call
    /// `ensure` first.
    pub fn compatible(&self) -> &HashMap<Identifier, AvailableModule> {
        &self
            .cached
            .as_ref()
            .expect("ensure() must be called before reading the sorter")
            .compatible
    }

    pub fn incompatible(&self) -> &HashMap<Identifier, AvailableModule> {
        &self
            .cached
            .as_ref()
            .expect("ensure() must be called before reading the sorter")
            .incompatible
    }
}

#[cfg(test)]
mod tests {
    use mod_registry_types::{CkanModuleBuilder, GameVersion, ModuleVersion};

    use super::*;

    fn am(id: &str, min: &str, max: &str) -> AvailableModule {
        let mut am = AvailableModule::new(Identifier::new(id));
        let mut m = CkanModuleBuilder::default()
            .identifier(id)
            .version(ModuleVersion::Semantic(semver::Version::parse("1.0.0").unwrap()))
            .build()
            .unwrap();
        m.game_version = mod_registry_types::GameVersionInterval::new(
            GameVersion::Concrete(semver::Version::parse(min).unwrap()),
            GameVersion::Concrete(semver::Version::parse(max).unwrap()),
        );
        am.add(m);
        am
    }

    #[test]
    fn partitions_compatible_and_incompatible() {
        let mut sorter = CompatibilitySorter::new();
        let good = am("mod-a", "1.0.0", "1.12.0");
        let bad = am("mod-b", "2.0.0", "2.5.0");
        let criteria = GameVersionCriteria::single(GameVersion::Concrete(
            semver::Version::parse("1.8.0").unwrap(),
        ));

        sorter.ensure(&criteria, [good, bad].iter());

        assert!(sorter.compatible().contains_key(&Identifier::new("mod-a")));
        assert!(sorter.incompatible().contains_key(&Identifier::new("mod-b")));
    }

    #[test]
    fn cache_rebuilds_on_new_criteria() {
        let mut sorter = CompatibilitySorter::new();
        let m = am("mod-a", "1.0.0", "1.8.0");
        let c1 = GameVersionCriteria::single(GameVersion::Concrete(semver::Version::parse("1.8.0").unwrap()));
        let c2 = GameVersionCriteria::single(GameVersion::Concrete(semver::Version::parse("1.9.0").unwrap()));

        sorter.ensure(&c1, [m.clone()].iter());
        assert!(sorter.compatible().contains_key(&Identifier::new("mod-a")));

        sorter.ensure(&c2, [m].iter());
        assert!(sorter.incompatible().contains_key(&Identifier::new("mod-a")));
    }

    #[test]
    fn invalidate_forces_rebuild() {
        let mut sorter = CompatibilitySorter::new();
        let m = am("mod-a", "1.0.0", "1.8.0");
        let c1 = GameVersionCriteria::single(GameVersion::Concrete(semver::Version::parse("1.8.0").unwrap()));

        sorter.ensure(&c1, [m.clone()].iter());
        sorter.invalidate();
        assert!(sorter.cached.is_none());

        sorter.ensure(&c1, [m].iter());
        assert!(sorter.cached.is_some());
    }
}
