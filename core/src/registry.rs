//! The public surface (component G): holds every other component and
//! exposes the mutating/query operations of §4.7, enlisting each mutation
//! into the caller's `Transaction` per the design note in §9.

use std::collections::{BTreeMap, HashMap};

use camino::{Utf8Path, Utf8PathBuf};
use log::{info, warn};
use mod_registry_types::{
    path, CkanModule, CkanModuleBuilder, GameVersionCriteria, Identifier, ModuleVersion,
    RelationshipDescriptor,
};

use crate::{
    available_module::AvailableModule,
    compatibility_sorter::CompatibilitySorter,
    error::{RegistryError, RegistryResult},
    file_ownership::{FileOwnership, LooseBinaryTable},
    installed_module::InstalledModule,
    persistence::{self, PersistedRegistry},
    provides_index::ProvidesIndex,
    repository::Repository,
    reverse_deps::{self, ReverseDependencyClosure},
    transaction::{Enlistment, Transaction},
};

/// Deep copy of everything rollback must restore. Derived caches
/// (`ProvidesIndex`, `CompatibilitySorter`) are deliberately excluded —
/// they're rebuilt/invalidated after a restore instead, which is cheap
/// and always correct, per the design note in §9.
#[derive(Clone, Debug)]
struct RegistrySnapshot {
    available: HashMap<Identifier, AvailableModule>,
    installed: HashMap<Identifier, InstalledModule>,
    installed_dlls: LooseBinaryTable,
    installed_dlc: HashMap<Identifier, ModuleVersion>,
    file_ownership: FileOwnership,
    download_counts: HashMap<Identifier, u64>,
    sorted_repositories: BTreeMap<String, Repository>,
    registry_version: u32,
}

#[derive(Clone, Debug)]
pub struct Registry {
    available: HashMap<Identifier, AvailableModule>,
    installed: HashMap<Identifier, InstalledModule>,
    installed_dlls: LooseBinaryTable,
    installed_dlc: HashMap<Identifier, ModuleVersion>,
    file_ownership: FileOwnership,
    download_counts: HashMap<Identifier, u64>,
    sorted_repositories: BTreeMap<String, Repository>,
    registry_version: u32,

    provides_index: ProvidesIndex,
    sorter: CompatibilitySorter,
    enlistment: Option<Enlistment<RegistrySnapshot>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            available: HashMap::new(),
            installed: HashMap::new(),
            installed_dlls: LooseBinaryTable::new(),
            installed_dlc: HashMap::new(),
            file_ownership: FileOwnership::new(),
            download_counts: HashMap::new(),
            sorted_repositories: BTreeMap::new(),
            registry_version: persistence::CURRENT_REGISTRY_VERSION,
            provides_index: ProvidesIndex::new(),
            sorter: CompatibilitySorter::new(),
            enlistment: None,
        }
    }

    // ---- persistence (§6.1) ------------------------------------------

    pub fn from_blob(blob: PersistedRegistry, game_root: &Utf8Path) -> Self {
        let migrated = persistence::migrate(blob, game_root);

        let mut installed_dlls = LooseBinaryTable::new();
        for (name, dll_path) in migrated.installed_dlls {
            installed_dlls.register(name, dll_path);
        }

        let mut file_ownership = FileOwnership::new();
        for (owned_path, id) in migrated.installed_files.unwrap_or_default() {
            file_ownership.claim(owned_path, id);
        }

        let mut provides_index = ProvidesIndex::new();
        provides_index.rebuild(migrated.available_modules.values());

        Self {
            available: migrated.available_modules,
            installed: migrated.installed_modules,
            installed_dlls,
            installed_dlc: HashMap::new(),
            file_ownership,
            download_counts: migrated.download_counts.into_iter().collect(),
            sorted_repositories: migrated.sorted_repositories,
            registry_version: migrated.registry_version,
            provides_index,
            sorter: CompatibilitySorter::new(),
            enlistment: None,
        }
    }

    pub fn to_blob(&self) -> PersistedRegistry {
        let installed_files: HashMap<Utf8PathBuf, Identifier> = self
            .file_ownership
            .iter()
            .map(|(p, id)| (p.clone(), id.clone()))
            .collect();

        PersistedRegistry {
            registry_version: self.registry_version,
            sorted_repositories: self.sorted_repositories.clone(),
            available_modules: self.available.clone(),
            installed_modules: self.installed.clone(),
            installed_dlls: self
                .installed_dlls
                .entries()
                .map(|(name, path)| (name.to_string(), path.clone()))
                .collect(),
            installed_files: Some(installed_files),
            download_counts: self.download_counts.clone().into_iter().collect(),
        }
    }

    // ---- transaction enlistment (§5) ---------------------------------

    fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            available: self.available.clone(),
            installed: self.installed.clone(),
            installed_dlls: self.installed_dlls.clone(),
            installed_dlc: self.installed_dlc.clone(),
            file_ownership: self.file_ownership.clone(),
            download_counts: self.download_counts.clone(),
            sorted_repositories: self.sorted_repositories.clone(),
            registry_version: self.registry_version,
        }
    }

    fn restore(&mut self, snapshot: RegistrySnapshot) {
        self.available = snapshot.available;
        self.installed = snapshot.installed;
        self.installed_dlls = snapshot.installed_dlls;
        self.installed_dlc = snapshot.installed_dlc;
        self.file_ownership = snapshot.file_ownership;
        self.download_counts = snapshot.download_counts;
        self.sorted_repositories = snapshot.sorted_repositories;
        self.registry_version = snapshot.registry_version;

        self.provides_index.rebuild(self.available.values());
        self.sorter.invalidate();
    }

    /// Every mutating operation calls this first. Enlists on first touch
    /// by a given transaction, taking a snapshot; refuses a second,
    /// different transaction.
    fn enlist(&mut self, txn: Option<&Transaction>) -> RegistryResult<()> {
        let Some(txn) = txn else {
            return Ok(());
        };

        match &self.enlistment {
            Some(e) if e.transaction_id == txn.id() => Ok(()),
            Some(_) => Err(RegistryError::TransactionError(
                "nested transactions unsupported".to_string(),
            )),
            None => {
                let snapshot = self.snapshot();
                self.enlistment = Some(Enlistment {
                    transaction_id: txn.id(),
                    snapshot,
                });
                Ok(())
            },
        }
    }

    /// Prepare: always votes "prepared" — the in-memory model needs no
    /// write-ahead log.
    pub fn prepare(&self, _txn: &Transaction) -> RegistryResult<()> {
        Ok(())
    }

    pub fn commit(&mut self, txn: &Transaction) -> RegistryResult<()> {
        match &self.enlistment {
            Some(e) if e.transaction_id == txn.id() => {
                self.enlistment = None;
                Ok(())
            },
            Some(_) => Err(RegistryError::TransactionError(
                "commit from a transaction the registry isn't enlisted in".to_string(),
            )),
            None => Ok(()),
        }
    }

    /// Rollback and InDoubt are treated identically (§5).
    pub fn rollback(&mut self, txn: &Transaction) -> RegistryResult<()> {
        match self.enlistment.take() {
            Some(e) if e.transaction_id == txn.id() => {
                self.restore(e.snapshot);
                Ok(())
            },
            Some(e) => {
                self.enlistment = Some(e);
                Err(RegistryError::TransactionError(
                    "rollback from a transaction the registry isn't enlisted in".to_string(),
                ))
            },
            None => Ok(()),
        }
    }

    // ---- mutating operations (§4.7) ----------------------------------

    pub fn set_all_available(
        &mut self,
        txn: Option<&Transaction>,
        modules: impl IntoIterator<Item = CkanModule>,
    ) -> RegistryResult<()> {
        self.enlist(txn)?;

        self.available.clear();
        for m in modules {
            self.available
                .entry(m.identifier.clone())
                .or_insert_with(|| AvailableModule::new(m.identifier.clone()))
                .add(m);
        }

        self.provides_index.rebuild(self.available.values());
        self.sorter.invalidate();
        Ok(())
    }

    pub fn add_available(&mut self, txn: Option<&Transaction>, m: CkanModule) -> RegistryResult<()> {
        self.enlist(txn)?;

        let am = self
            .available
            .entry(m.identifier.clone())
            .or_insert_with(|| AvailableModule::new(m.identifier.clone()));
        am.add(m);
        self.provides_index.reindex(am);
        self.sorter.invalidate();
        Ok(())
    }

    /// Does not prune the `ProvidesIndex` — see its module docs.
    pub fn remove_available(
        &mut self,
        txn: Option<&Transaction>,
        id: &Identifier,
        version: &ModuleVersion,
    ) -> RegistryResult<()> {
        self.enlist(txn)?;

        if let Some(am) = self.available.get_mut(id) {
            am.remove(version);
        }
        self.sorter.invalidate();
        Ok(())
    }

    /// `paths` pairs each path the install touched with whether it's a
    /// directory (directories may be re-claimed by other installs; regular
    /// files may not). Paths given as absolute are relativized against
    /// `game_root`. Builds its full conflict list before claiming
    /// anything, so a failure leaves the registry untouched.
    pub fn register_install(
        &mut self,
        txn: Option<&Transaction>,
        metadata: CkanModule,
        paths: impl IntoIterator<Item = (Utf8PathBuf, bool)>,
        game_root: &Utf8Path,
        auto_installed: bool,
    ) -> RegistryResult<()> {
        self.enlist(txn)?;

        let relative: Vec<(Utf8PathBuf, bool)> = paths
            .into_iter()
            .map(|(p, is_dir)| -> RegistryResult<(Utf8PathBuf, bool)> {
                let p = if p.is_absolute() {
                    path::relativize(&p, game_root)?
                } else {
                    path::normalize_separators(&p)
                };
                Ok((p, is_dir))
            })
            .collect::<RegistryResult<_>>()?;

        let conflict_checked: Vec<&Utf8PathBuf> = relative
            .iter()
            .filter(|pair| !pair.1)
            .map(|(p, _)| p)
            .collect();

        let conflicts = self
            .file_ownership
            .conflicts_for(&metadata.identifier, conflict_checked.iter().copied());

        if !conflicts.is_empty() {
            let messages = conflicts
                .iter()
                .map(|(path, owner)| RegistryError::file_already_owned(path, &metadata.identifier, owner))
                .collect();
            return Err(RegistryError::Inconsistent(messages));
        }

        // Every path is claimed, directories included: a directory is just
        // exempt from the conflict check above, not from ownership itself.
        for (p, _) in &relative {
            self.file_ownership.claim(p.clone(), metadata.identifier.clone());
        }

        let mut files: Vec<Utf8PathBuf> = relative.into_iter().map(|(p, _)| p).collect();
        files.sort();
        files.dedup();
        self.installed
            .insert(metadata.identifier.clone(), InstalledModule::new(metadata, files, auto_installed));
        Ok(())
    }

    /// `remaining_files` is the subset of the module's owned files the
    /// caller has observed still present on disk — the registry has no
    /// filesystem access of its own (Non-goal). A non-empty list fails
    /// the whole operation.
    pub fn deregister_install(
        &mut self,
        txn: Option<&Transaction>,
        id: &Identifier,
        remaining_files: &[Utf8PathBuf],
    ) -> RegistryResult<()> {
        self.enlist(txn)?;

        let installed = self
            .installed
            .get(id)
            .ok_or_else(|| RegistryError::not_found_identifier(id))?;

        if !remaining_files.is_empty() {
            let messages = remaining_files
                .iter()
                .map(|p| format!("\"{p}\" still exists on disk"))
                .collect();
            return Err(RegistryError::Inconsistent(messages));
        }

        let files = installed.files().to_vec();
        self.file_ownership.release_all(files.iter());
        self.installed.remove(id);
        Ok(())
    }

    /// If `absolute_path` is already owned by an installed module, this
    /// logs and returns without touching `installed_dlls` (the file isn't
    /// a loose binary at all). Silently skips paths that don't match the
    /// short-name pattern, per §6.2.
    pub fn register_dll(
        &mut self,
        txn: Option<&Transaction>,
        game_root: &Utf8Path,
        absolute_path: &Utf8Path,
    ) -> RegistryResult<()> {
        self.enlist(txn)?;

        let relative = if absolute_path.is_absolute() {
            path::relativize(absolute_path, game_root)?
        } else {
            path::normalize_separators(absolute_path)
        };

        if let Some(owner) = self.file_ownership.owner(&relative) {
            info!("\"{relative}\" is already owned by \"{owner}\", not registering it as a loose binary");
            return Ok(());
        }

        match path::loose_binary_short_name(&relative) {
            Some(short_name) => self.installed_dlls.register(short_name, relative),
            None => warn!("\"{relative}\" does not match the loose-binary naming pattern, skipping"),
        }

        Ok(())
    }

    pub fn clear_dlls(&mut self, txn: Option<&Transaction>) -> RegistryResult<()> {
        self.enlist(txn)?;
        self.installed_dlls.clear();
        Ok(())
    }

    pub fn register_dlc(
        &mut self,
        txn: Option<&Transaction>,
        id: Identifier,
        version: ModuleVersion,
    ) -> RegistryResult<()> {
        self.enlist(txn)?;
        self.installed_dlc.insert(id, version);
        Ok(())
    }

    pub fn clear_dlc(&mut self, txn: Option<&Transaction>) -> RegistryResult<()> {
        self.enlist(txn)?;
        self.installed_dlc.clear();
        Ok(())
    }

    /// Merges rather than replaces: existing entries are overwritten,
    /// entries absent from `counts` are left untouched. Callers wanting a
    /// full replacement must clear the counts they track themselves first.
    pub fn set_download_counts(
        &mut self,
        txn: Option<&Transaction>,
        counts: impl IntoIterator<Item = (Identifier, u64)>,
    ) -> RegistryResult<()> {
        self.enlist(txn)?;
        self.download_counts.extend(counts);
        Ok(())
    }

    // ---- query operations (§4.7) --------------------------------------

    /// `Ok(None)` when the identifier is known but nothing matches
    /// `criteria`/`constraint`; `Err(NotFound)` only when the identifier
    /// itself is unknown to the available catalog (resolves the §9 open
    /// question in favor of distinguishing "unknown mod" from "no
    /// compatible version").
    pub fn latest_available(
        &self,
        id: &Identifier,
        criteria: Option<&GameVersionCriteria>,
        constraint: Option<&RelationshipDescriptor>,
    ) -> RegistryResult<Option<CkanModule>> {
        let am = self
            .available
            .get(id)
            .ok_or_else(|| RegistryError::not_found_identifier(id))?;

        Ok(am.latest(criteria, constraint, &[], &[]).cloned())
    }

    /// Candidates from the (stale-safe) `ProvidesIndex`, re-filtered by
    /// whether their actual chosen version still lists `virtual_id`.
    pub fn latest_available_with_provides(
        &self,
        virtual_id: &str,
        criteria: Option<&GameVersionCriteria>,
        constraint: Option<&RelationshipDescriptor>,
        also_installing: &[&CkanModule],
    ) -> Vec<CkanModule> {
        self.provides_index
            .providers(virtual_id)
            .filter_map(|provider_id| self.available.get(provider_id))
            .filter_map(|am| am.latest(criteria, constraint, &[], also_installing))
            .filter(|m| m.provides_identifier(virtual_id))
            .cloned()
            .collect()
    }

    pub fn compatible_modules(&mut self, criteria: &GameVersionCriteria) -> HashMap<Identifier, CkanModule> {
        self.sorter.ensure(criteria, self.available.values());
        self.sorter
            .compatible()
            .values()
            .filter_map(|am| am.latest(Some(criteria), None, &[], &[]).map(|m| (am.identifier().clone(), m.clone())))
            .collect()
    }

    pub fn incompatible_modules(&mut self, criteria: &GameVersionCriteria) -> HashMap<Identifier, CkanModule> {
        self.sorter.ensure(criteria, self.available.values());
        self.sorter
            .incompatible()
            .values()
            .filter_map(|am| am.all().first().map(|m| (am.identifier().clone(), (*m).clone())))
            .collect()
    }

    pub fn available_by_identifier(&self, id: &Identifier) -> RegistryResult<Vec<CkanModule>> {
        self.available
            .get(id)
            .map(|am| am.all().into_iter().cloned().collect())
            .ok_or_else(|| RegistryError::not_found_identifier(id))
    }

    /// Overlay, lowest precedence first: virtual provisions, loose
    /// binaries, real installs, DLC. Matches the precedence order
    /// `installed_version` documents explicitly (DLC > installed > loose
    /// binary > provides > none); the prose in §4.7 lists the same four
    /// layers in enumeration order rather than precedence order.
    pub fn installed(&mut self, with_provides: bool) -> HashMap<Identifier, ModuleVersion> {
        let mut map = HashMap::new();

        if with_provides {
            let virtual_ids: Vec<Identifier> = self.provides_index.virtual_identifiers().cloned().collect();
            for virtual_id in virtual_ids {
                let provider_ids: Vec<Identifier> = self.provides_index.providers(virtual_id.as_str()).cloned().collect();
                for provider_id in provider_ids {
                    if let Some(am) = self.available.get(&provider_id) {
                        if let Some(m) = am.all().into_iter().find(|m| m.provides_identifier(virtual_id.as_str())) {
                            map.insert(
                                virtual_id.clone(),
                                ModuleVersion::Provides(provider_id, m.version.to_string()),
                            );
                        }
                    }
                }
            }
        }

        for (short_name, _) in self.installed_dlls.entries() {
            map.insert(Identifier::new(short_name), ModuleVersion::Unmanaged(None));
        }

        for (id, installed_mod) in &self.installed {
            map.insert(id.clone(), installed_mod.metadata().version.clone());
        }

        for (id, version) in &self.installed_dlc {
            map.insert(id.clone(), version.clone());
        }

        map
    }

    /// Precedence: DLC > installed > loose binary > provides > none.
    pub fn installed_version(&self, id: &Identifier, with_provides: bool) -> Option<ModuleVersion> {
        if let Some(v) = self.installed_dlc.get(id) {
            return Some(v.clone());
        }

        if let Some(m) = self.installed.get(id) {
            return Some(m.metadata().version.clone());
        }

        if self.installed_dlls.contains(id.as_str()) {
            return Some(ModuleVersion::Unmanaged(None));
        }

        if with_provides {
            for provider_id in self.provides_index.providers(id.as_str()) {
                if let Some(am) = self.available.get(provider_id) {
                    if let Some(m) = am.all().into_iter().find(|m| m.provides_identifier(id.as_str())) {
                        return Some(ModuleVersion::Provides(provider_id.clone(), m.version.to_string()));
                    }
                }
            }
        }

        None
    }

    pub fn file_owner(&self, relative_path: &Utf8Path) -> RegistryResult<Option<Identifier>> {
        path::require_relative(relative_path)?;
        Ok(self.file_ownership.owner(relative_path).cloned())
    }

    pub fn check_sanity(&self) -> bool {
        self.get_sanity_errors().is_empty()
    }

    pub fn get_sanity_errors(&self) -> Vec<String> {
        let installed: Vec<&CkanModule> = self.installed.values().map(InstalledModule::metadata).collect();
        let loose = self.loose_binary_pseudo_modules();
        let dlc = self.dlc_pseudo_modules();

        reverse_deps::unsatisfied_depends(&installed, &loose, &dlc)
            .into_iter()
            .map(|m| format!("\"{}\" has an unsatisfied dependency", m.identifier))
            .collect()
    }

    /// Lazily yields the transitive closure of identifiers that would
    /// break if every identifier in `removals` were removed (§4.6).
    pub fn find_reverse_dependencies(
        &self,
        removals: impl IntoIterator<Item = Identifier>,
    ) -> ReverseDependencyClosure<'_> {
        ReverseDependencyClosure::new(
            &self.installed,
            removals,
            self.loose_binary_pseudo_modules(),
            self.dlc_pseudo_modules(),
        )
    }

    pub fn find_removable_auto_installed(&self) -> Vec<Identifier> {
        reverse_deps::find_removable_auto_installed(
            &self.installed,
            &self.loose_binary_pseudo_modules(),
            &self.dlc_pseudo_modules(),
        )
    }

    pub fn get_sha1_index(&self) -> HashMap<String, Vec<CkanModule>> {
        self.hash_index(|h| h.sha1.clone())
    }

    pub fn get_download_hash_index(&self) -> HashMap<String, Vec<CkanModule>> {
        self.hash_index(|h| h.sha256.clone())
    }

    fn hash_index(
        &self,
        pick: impl Fn(&mod_registry_types::DownloadHash) -> Option<String>,
    ) -> HashMap<String, Vec<CkanModule>> {
        let mut idx: HashMap<String, Vec<CkanModule>> = HashMap::new();
        for am in self.available.values() {
            for m in am.all() {
                if let Some(hash) = m.download_hash.as_ref().and_then(&pick) {
                    idx.entry(hash).or_default().push(m.clone());
                }
            }
        }
        idx
    }

    /// Loose binaries and DLC aren't real `CkanModule`s, but the sanity
    /// predicate and reverse-dependency closure both need to treat them as
    /// members of the universe a `depends` clause can be satisfied by.
    fn loose_binary_pseudo_modules(&self) -> Vec<CkanModule> {
        self.installed_dlls
            .entries()
            .map(|(name, _)| {
                CkanModuleBuilder::default()
                    .identifier(name)
                    .version(ModuleVersion::Unmanaged(None))
                    .build()
                    .expect("identifier and version are always set")
            })
            .collect()
    }

    fn dlc_pseudo_modules(&self) -> Vec<CkanModule> {
        self.installed_dlc
            .iter()
            .map(|(id, version)| {
                CkanModuleBuilder::default()
                    .identifier(id.as_str())
                    .version(version.clone())
                    .build()
                    .expect("identifier and version are always set")
            })
            .collect()
    }
}
