//! Relationship constraints (component A, continued). A
//! `RelationshipDescriptor` is a `depends` / `conflicts` / `recommends` /
//! `suggests` entry: an identifier, a version constraint, and optional
//! `any_of` alternatives that satisfy the same relationship.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::{identifier::Identifier, module::CkanModule, version::ModuleVersion};

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RelationshipDescriptor {
    pub identifier: Identifier,
    pub min_version: Option<ModuleVersion>,
    pub max_version: Option<ModuleVersion>,
    pub exact_version: Option<ModuleVersion>,

    /// Alternative identifiers that also satisfy this relationship, each
    /// with its own (possibly empty) version constraint.
    pub any_of: Vec<RelationshipDescriptor>,
}

impl RelationshipDescriptor {
    /// An unconstrained relationship on `identifier` — any version will do.
    pub fn unconstrained(identifier: impl Into<Identifier>) -> Self {
        Self {
            identifier: identifier.into(),
            min_version: None,
            max_version: None,
            exact_version: None,
            any_of: Vec::new(),
        }
    }

    /// The §4.1 constraint-satisfaction rule: if `exact` is set, the
    /// candidate must equal it exactly; otherwise both bounds (when
    /// present) must hold. An `Unmanaged` candidate can only satisfy a
    /// bound by being incomparable with it, which always evaluates to
    /// "not satisfied" — i.e. it satisfies only an `exact` constraint
    /// against itself.
    pub fn version_satisfied_by(&self, candidate: &ModuleVersion) -> bool {
        if let Some(exact) = &self.exact_version {
            return candidate == exact;
        }

        let min_ok = self.min_version.as_ref().map_or(true, |min| {
            matches!(
                candidate.partial_cmp(min),
                Some(Ordering::Greater) | Some(Ordering::Equal)
            )
        });

        let max_ok = self.max_version.as_ref().map_or(true, |max| {
            matches!(
                candidate.partial_cmp(max),
                Some(Ordering::Less) | Some(Ordering::Equal)
            )
        });

        min_ok && max_ok
    }

    /// This descriptor, followed by every `any_of` alternative — each an
    /// independent (identifier, constraint) pair that would also satisfy
    /// the relationship.
    pub fn alternatives(&self) -> impl Iterator<Item = &RelationshipDescriptor> {
        std::iter::once(self).chain(self.any_of.iter())
    }

    /// Whether `candidate` alone satisfies this descriptor: its identifier
    /// (or something it `provides`) matches, and its version satisfies
    /// the constraint.
    pub fn matches_module(&self, candidate: &CkanModule) -> bool {
        let identifier_matches = self.identifier.as_str() == candidate.identifier.as_str()
            || candidate.provides_identifier(self.identifier.as_str());

        identifier_matches && self.version_satisfied_by(&candidate.version)
    }

    /// Whether some module in `universe` satisfies this descriptor or one
    /// of its `any_of` alternatives.
    pub fn satisfied_by<'a, I>(&self, universe: I) -> bool
    where
        I: IntoIterator<Item = &'a CkanModule> + Clone,
    {
        self.alternatives()
            .any(|alt| universe.clone().into_iter().any(|m| alt.matches_module(m)))
    }
}
