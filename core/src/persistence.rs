//! The persisted blob shape and its migration contract (§6.1). The
//! registry treats this as a pure textual object-graph round-trip; nothing
//! here touches a filesystem or a network.

use std::collections::{BTreeMap, HashMap};

use camino::{Utf8Path, Utf8PathBuf};
use log::info;
use mod_registry_types::{path, CkanModule, Identifier};
use serde::{Deserialize, Serialize};

use crate::{error::RegistryResult, installed_module::InstalledModule, repository::Repository};

pub const CURRENT_REGISTRY_VERSION: u32 = 3;

const DEFAULT_REPOSITORY_NAME: &str = "default";
const LEGACY_DEFAULT_REPOSITORY_URI: &str =
    "https://github.com/legacy-org/ckan-meta/archive/master.zip";
const CURRENT_DEFAULT_REPOSITORY_URI: &str =
    "https://github.com/legacy-org/ckan-meta/archive/main.zip";

const LEGACY_CONTROL_LOCK_IDENTIFIER: &str = "001ControlLock";
const CONTROL_LOCK_IDENTIFIER: &str = "ControlLock";

/// The exact shape on the wire. `installed_files` is `Option` so the
/// migration step can tell "absent, rebuild it" apart from "present and
/// empty".
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PersistedRegistry {
    pub registry_version: u32,

    #[serde(default)]
    pub sorted_repositories: BTreeMap<String, Repository>,

    #[serde(default)]
    pub available_modules: HashMap<Identifier, crate::available_module::AvailableModule>,

    #[serde(default)]
    pub installed_modules: HashMap<Identifier, InstalledModule>,

    #[serde(default)]
    pub installed_dlls: HashMap<String, Utf8PathBuf>,

    #[serde(default)]
    pub installed_files: Option<HashMap<Utf8PathBuf, Identifier>>,

    #[serde(default)]
    pub download_counts: BTreeMap<Identifier, u64>,
}

impl PersistedRegistry {
    pub fn new() -> Self {
        Self {
            registry_version: CURRENT_REGISTRY_VERSION,
            ..Self::default()
        }
    }

    /// The JSON-shaped artifact §6.1 describes as the on-disk form.
    pub fn to_json(&self) -> RegistryResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(s: &str) -> RegistryResult<Self> {
        Ok(serde_json::from_str(s)?)
    }
}

fn rebuild_installed_files(
    installed_modules: &HashMap<Identifier, InstalledModule>,
) -> HashMap<Utf8PathBuf, Identifier> {
    let mut files = HashMap::new();
    for (id, m) in installed_modules {
        for p in m.files() {
            files.insert(p.clone(), id.clone());
        }
    }
    files
}

fn relativize_if_absolute(p: &Utf8Path, game_root: &Utf8Path) -> Utf8PathBuf {
    let normalized = path::normalize_separators(p);
    if normalized.is_absolute() {
        path::relativize(&normalized, game_root).unwrap_or(normalized)
    } else {
        normalized
    }
}

/// Idempotent: re-running on an already-current blob is a no-op, since
/// every step is gated on either `registry_version` or a specific stale
/// value that migration itself removes.
pub fn migrate(mut blob: PersistedRegistry, game_root: &Utf8Path) -> PersistedRegistry {
    let mut installed_files = match blob.installed_files.take() {
        Some(f) => f,
        None => {
            info!("installed_files missing from persisted registry, rebuilding from installed_modules");
            rebuild_installed_files(&blob.installed_modules)
        },
    };

    if blob.registry_version == 0 {
        installed_files = installed_files
            .into_iter()
            .map(|(p, id)| (relativize_if_absolute(&p, game_root), id))
            .collect();

        for installed_mod in blob.installed_modules.values_mut() {
            installed_mod.renormalize(game_root);
        }
    }

    if blob.registry_version < 2 {
        let legacy_id = Identifier::new(LEGACY_CONTROL_LOCK_IDENTIFIER);
        if let Some(old) = blob.installed_modules.remove(&legacy_id) {
            let new_id = Identifier::new(CONTROL_LOCK_IDENTIFIER);
            info!("renaming legacy installed entry \"{LEGACY_CONTROL_LOCK_IDENTIFIER}\" to \"{CONTROL_LOCK_IDENTIFIER}\"");

            let mut metadata: CkanModule = old.metadata().clone();
            metadata.identifier = new_id.clone();
            let renamed = InstalledModule::new(metadata, old.files().to_vec(), old.auto_installed());

            for owner in installed_files.values_mut() {
                if *owner == legacy_id {
                    *owner = new_id.clone();
                }
            }

            blob.installed_modules.insert(new_id, renamed);
        }
    }

    if let Some(repo) = blob.sorted_repositories.get_mut(DEFAULT_REPOSITORY_NAME) {
        if repo.uri == LEGACY_DEFAULT_REPOSITORY_URI {
            info!("rewriting legacy \"{DEFAULT_REPOSITORY_NAME}\" repository URL to its current location");
            repo.uri = CURRENT_DEFAULT_REPOSITORY_URI.to_string();
        }
    }

    blob.installed_files = Some(installed_files);
    blob.registry_version = CURRENT_REGISTRY_VERSION;
    blob
}

#[cfg(test)]
mod tests {
    use mod_registry_types::{CkanModuleBuilder, ModuleVersion};

    use super::*;

    fn sem(s: &str) -> ModuleVersion {
        ModuleVersion::Semantic(semver::Version::parse(s).unwrap())
    }

    #[test]
    fn migration_rebuilds_missing_installed_files() {
        let mut installed_modules = HashMap::new();
        let metadata = CkanModuleBuilder::default()
            .identifier("mod-a")
            .version(sem("1.0.0"))
            .build()
            .unwrap();
        installed_modules.insert(
            Identifier::new("mod-a"),
            InstalledModule::new(metadata, vec![Utf8PathBuf::from("GameData/a.cfg")], false),
        );

        let blob = PersistedRegistry {
            registry_version: CURRENT_REGISTRY_VERSION,
            installed_modules,
            installed_files: None,
            ..PersistedRegistry::default()
        };

        let migrated = migrate(blob, Utf8Path::new("/game"));
        assert_eq!(
            migrated.installed_files.unwrap().get(&Utf8PathBuf::from("GameData/a.cfg")),
            Some(&Identifier::new("mod-a"))
        );
    }

    #[test]
    fn migration_from_version_zero_relativizes_absolute_paths() {
        let mut installed_files = HashMap::new();
        installed_files.insert(
            Utf8PathBuf::from("/game/GameData/a.cfg"),
            Identifier::new("mod-a"),
        );

        let blob = PersistedRegistry {
            registry_version: 0,
            installed_files: Some(installed_files),
            ..PersistedRegistry::default()
        };

        let migrated = migrate(blob, Utf8Path::new("/game"));
        let files = migrated.installed_files.unwrap();
        assert!(files.contains_key(&Utf8PathBuf::from("GameData/a.cfg")));
        assert_eq!(migrated.registry_version, CURRENT_REGISTRY_VERSION);
    }

    #[test]
    fn migration_renames_legacy_control_lock() {
        let metadata = CkanModuleBuilder::default()
            .identifier(LEGACY_CONTROL_LOCK_IDENTIFIER)
            .version(sem("1.0.0"))
            .build()
            .unwrap();
        let mut installed_modules = HashMap::new();
        installed_modules.insert(
            Identifier::new(LEGACY_CONTROL_LOCK_IDENTIFIER),
            InstalledModule::new(metadata, vec![], false),
        );

        let mut installed_files = HashMap::new();
        installed_files.insert(
            Utf8PathBuf::from("GameData/lock"),
            Identifier::new(LEGACY_CONTROL_LOCK_IDENTIFIER),
        );

        let blob = PersistedRegistry {
            registry_version: 1,
            installed_modules,
            installed_files: Some(installed_files),
            ..PersistedRegistry::default()
        };

        let migrated = migrate(blob, Utf8Path::new("/game"));
        assert!(migrated
            .installed_modules
            .contains_key(&Identifier::new(CONTROL_LOCK_IDENTIFIER)));
        assert_eq!(
            migrated.installed_files.unwrap().get(&Utf8PathBuf::from("GameData/lock")),
            Some(&Identifier::new(CONTROL_LOCK_IDENTIFIER))
        );
    }

    #[test]
    fn migration_rewrites_legacy_default_repository_url() {
        let mut sorted_repositories = BTreeMap::new();
        sorted_repositories.insert(
            DEFAULT_REPOSITORY_NAME.to_string(),
            Repository::new(LEGACY_DEFAULT_REPOSITORY_URI),
        );

        let blob = PersistedRegistry {
            registry_version: CURRENT_REGISTRY_VERSION,
            sorted_repositories,
            ..PersistedRegistry::default()
        };

        let migrated = migrate(blob, Utf8Path::new("/game"));
        assert_eq!(
            migrated.sorted_repositories.get(DEFAULT_REPOSITORY_NAME).unwrap().uri,
            CURRENT_DEFAULT_REPOSITORY_URI
        );
    }

    #[test]
    fn json_round_trip_preserves_the_blob() {
        let metadata = CkanModuleBuilder::default()
            .identifier("mod-a")
            .version(sem("1.0.0"))
            .build()
            .unwrap();
        let mut installed_modules = HashMap::new();
        installed_modules.insert(
            Identifier::new("mod-a"),
            InstalledModule::new(metadata, vec![Utf8PathBuf::from("GameData/a.cfg")], false),
        );

        let blob = PersistedRegistry {
            installed_modules,
            ..PersistedRegistry::new()
        };

        let json = blob.to_json().unwrap();
        let reloaded = PersistedRegistry::from_json(&json).unwrap();
        assert_eq!(reloaded.registry_version, blob.registry_version);
        assert!(reloaded.installed_modules.contains_key(&Identifier::new("mod-a")));
    }

    #[test]
    fn from_json_rejects_malformed_input() {
        assert!(PersistedRegistry::from_json("{ not json").is_err());
    }

    #[test]
    fn migration_is_idempotent() {
        let blob = PersistedRegistry::new();
        let once = migrate(blob, Utf8Path::new("/game"));
        let twice = migrate(once.clone(), Utf8Path::new("/game"));
        assert_eq!(once.registry_version, twice.registry_version);
        assert_eq!(once.installed_files, twice.installed_files);
    }
}
