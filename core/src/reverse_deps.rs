//! Iterative closure over broken-dependency sets (component I).

use std::collections::{HashMap, HashSet, VecDeque};

use mod_registry_types::{CkanModule, Identifier};

use crate::installed_module::InstalledModule;

/// The subset of `h` whose `depends` cannot be fully satisfied by
/// `h ∪ loose ∪ dlc`. Each `depends` entry is satisfied when some element
/// of that combined universe matches its identifier (directly or via
/// `provides`) with a version the constraint accepts.
pub fn unsatisfied_depends<'a>(
    h: &[&'a CkanModule],
    loose: &[CkanModule],
    dlc: &[CkanModule],
) -> Vec<&'a CkanModule> {
    let universe: Vec<&CkanModule> = h
        .iter()
        .copied()
        .chain(loose.iter())
        .chain(dlc.iter())
        .collect();

    h.iter()
        .copied()
        .filter(|m| {
            !m.depends
                .iter()
                .all(|dep| dep.satisfied_by(universe.iter().copied()))
        })
        .collect()
}

/// Lazily yields the transitive closure of identifiers that would become
/// broken if every identifier in the initial removal set were removed
/// from `installed`, per the algorithm in §4.6. Bounded by `|installed|`
/// rounds: each round either adds at least one new identifier or the
/// iterator is exhausted.
pub struct ReverseDependencyClosure<'a> {
    installed: &'a HashMap<Identifier, InstalledModule>,
    loose: Vec<CkanModule>,
    dlc: Vec<CkanModule>,
    removed: HashSet<Identifier>,
    pending: VecDeque<Identifier>,
    exhausted: bool,
}

impl<'a> ReverseDependencyClosure<'a> {
    pub fn new(
        installed: &'a HashMap<Identifier, InstalledModule>,
        initial_removals: impl IntoIterator<Item = Identifier>,
        loose: Vec<CkanModule>,
        dlc: Vec<CkanModule>,
    ) -> Self {
        let removed: HashSet<Identifier> = initial_removals.into_iter().collect();
        let pending: VecDeque<Identifier> = removed.iter().cloned().collect();

        Self {
            installed,
            loose,
            dlc,
            removed,
            pending,
            exhausted: false,
        }
    }
}

impl<'a> Iterator for ReverseDependencyClosure<'a> {
    type Item = Identifier;

    fn next(&mut self) -> Option<Identifier> {
        loop {
            if let Some(id) = self.pending.pop_front() {
                return Some(id);
            }

            if self.exhausted {
                return None;
            }

            let h: Vec<&CkanModule> = self
                .installed
                .values()
                .filter(|m| !self.removed.contains(&m.metadata().identifier))
                .map(InstalledModule::metadata)
                .collect();

            let broken = unsatisfied_depends(&h, &self.loose, &self.dlc);
            let newly_broken: Vec<Identifier> = broken
                .into_iter()
                .map(|m| m.identifier.clone())
                .filter(|id| !self.removed.contains(id))
                .collect();

            if newly_broken.is_empty() {
                self.exhausted = true;
                continue;
            }

            for id in &newly_broken {
                self.removed.insert(id.clone());
            }
            self.pending.extend(newly_broken);
        }
    }
}

/// Auto-installed modules whose hypothetical removal (per the closure
/// above) implicates only other auto-installed modules.
pub fn find_removable_auto_installed(
    installed: &HashMap<Identifier, InstalledModule>,
    loose: &[CkanModule],
    dlc: &[CkanModule],
) -> Vec<Identifier> {
    let auto_installed: HashSet<Identifier> = installed
        .iter()
        .filter(|(_, m)| m.auto_installed())
        .map(|(id, _)| id.clone())
        .collect();

    auto_installed
        .iter()
        .filter(|id| {
            let closure: HashSet<Identifier> = ReverseDependencyClosure::new(
                installed,
                std::iter::once((*id).clone()),
                loose.to_vec(),
                dlc.to_vec(),
            )
            .collect();

            closure.iter().all(|affected| auto_installed.contains(affected))
        })
        .cloned()
        .collect()
}
