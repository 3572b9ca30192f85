//! The immutable metadata record pushed into the registry by a repository
//! collaborator (fetching/parsing is out of scope here — `CkanModule` is
//! the shape the registry consumes).

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::{identifier::Identifier, relationship::RelationshipDescriptor, version::{GameVersionInterval, ModuleVersion}};

/// `sha1`/`sha256` digests of a module's download archive. The registry
/// indexes these; it never computes or verifies them (Non-goal: no
/// cryptographic verification).
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct DownloadHash {
    pub sha1: Option<String>,
    pub sha256: Option<String>,
}

/// A single known version of a single mod, as published by a repository.
#[derive(Builder, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[builder(setter(into))]
pub struct CkanModule {
    pub identifier: Identifier,
    pub version: ModuleVersion,

    #[builder(default)]
    pub provides: Vec<Identifier>,

    #[builder(default = "GameVersionInterval::unbounded()")]
    pub game_version: GameVersionInterval,

    #[builder(default)]
    pub depends: Vec<RelationshipDescriptor>,

    #[builder(default)]
    pub conflicts: Vec<RelationshipDescriptor>,

    #[builder(default)]
    pub recommends: Vec<RelationshipDescriptor>,

    #[builder(default)]
    pub suggests: Vec<RelationshipDescriptor>,

    #[builder(default)]
    pub download: Option<String>,

    #[builder(default)]
    pub download_hash: Option<DownloadHash>,
}

impl CkanModule {
    pub fn provides_identifier(&self, id: &str) -> bool {
        self.provides.iter().any(|p| p.as_str() == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sem(s: &str) -> ModuleVersion {
        ModuleVersion::Semantic(semver::Version::parse(s).unwrap())
    }

    #[test]
    fn builder_fills_in_defaults() {
        let m = CkanModuleBuilder::default()
            .identifier("mod-a")
            .version(sem("1.0.0"))
            .build()
            .unwrap();

        assert!(m.provides.is_empty());
        assert_eq!(m.game_version, GameVersionInterval::unbounded());
    }

    #[test]
    fn builder_requires_identifier_and_version() {
        assert!(CkanModuleBuilder::default().build().is_err());
    }

    #[test]
    fn provides_identifier_checks_the_provides_list() {
        let m = CkanModuleBuilder::default()
            .identifier("mod-a")
            .version(sem("1.0.0"))
            .provides(vec![Identifier::new("virt")])
            .build()
            .unwrap();

        assert!(m.provides_identifier("virt"));
        assert!(!m.provides_identifier("other"));
    }
}
