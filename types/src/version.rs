//! Version and compatibility-criteria primitives (component A).
//!
//! `ModuleVersion` is a polymorphic sum type: a real module may carry a
//! `Semantic` version with a classical total order, an `Unmanaged` version
//! for auto-detected artifacts (comparable only by equality), or a
//! `Provides` placeholder used solely to satisfy virtual-package lookups.
//! Comparison never crosses variants except for equality.

use std::{
    cmp::Ordering,
    fmt::{self, Display, Formatter},
};

use serde::{Deserialize, Serialize};

use crate::identifier::Identifier;

/// A single module's or game's version.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ModuleVersion {
    /// A classically-ordered semantic version, e.g. `1.4.2-beta`.
    Semantic(semver::Version),

    /// An opaque, auto-detected version (or the absence of one). Two
    /// `Unmanaged` versions are only ever compared by equality.
    Unmanaged(Option<String>),

    /// A placeholder used when a module is referenced only through a
    /// virtual package it provides. Carries the providing identifier and
    /// the version string the provider advertised for that name.
    Provides(Identifier, String),
}

impl ModuleVersion {
    pub fn semantic(v: semver::Version) -> Self {
        Self::Semantic(v)
    }

    pub fn unmanaged(s: impl Into<Option<String>>) -> Self {
        Self::Unmanaged(s.into())
    }

    pub fn is_semantic(&self) -> bool {
        matches!(self, Self::Semantic(_))
    }
}

impl Display for ModuleVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Semantic(v) => write!(f, "{v}"),
            Self::Unmanaged(Some(s)) => write!(f, "{s}"),
            Self::Unmanaged(None) => write!(f, "<unmanaged>"),
            Self::Provides(id, v) => write!(f, "{id} (provides {v})"),
        }
    }
}

/// Comparable only within the `Semantic` variant; every other pairing is
/// `None`. `semver::Version`'s own `Ord` already sorts a pre-release tag
/// below the same numeric version without one, and treats missing trailing
/// components as zero, matching the classical precedence rules this
/// component is required to follow.
impl PartialOrd for ModuleVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Semantic(a), Self::Semantic(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// A single game installation's version, or the distinguished value meaning
/// "all versions" used by modules with no upper/lower compatibility bound.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum GameVersion {
    Any,
    Concrete(semver::Version),
}

impl GameVersion {
    pub fn concrete(v: semver::Version) -> Self {
        Self::Concrete(v)
    }
}

impl Display for GameVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "any"),
            Self::Concrete(v) => write!(f, "{v}"),
        }
    }
}

/// `Any` satisfies every criterion and is not ordered against a concrete
/// version; two concrete versions compare normally.
impl PartialOrd for GameVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Concrete(a), Self::Concrete(b)) => a.partial_cmp(b),
            (Self::Any, Self::Any) => Some(Ordering::Equal),
            _ => None,
        }
    }
}

/// The `[min_game, max_game]` compatibility interval a `CkanModule`
/// declares. Either bound may be `Any`, meaning unbounded in that
/// direction.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct GameVersionInterval {
    pub min: GameVersion,
    pub max: GameVersion,
}

impl GameVersionInterval {
    pub fn new(min: GameVersion, max: GameVersion) -> Self {
        Self { min, max }
    }

    pub fn unbounded() -> Self {
        Self::new(GameVersion::Any, GameVersion::Any)
    }

    /// Whether this interval contains `v`. `Any` on either side of the
    /// comparison always matches.
    pub fn contains(&self, v: &GameVersion) -> bool {
        if matches!(v, GameVersion::Any) {
            return true;
        }

        let min_ok = match &self.min {
            GameVersion::Any => true,
            GameVersion::Concrete(min) => match v {
                GameVersion::Concrete(v) => min <= v,
                GameVersion::Any => true,
            },
        };

        let max_ok = match &self.max {
            GameVersion::Any => true,
            GameVersion::Concrete(max) => match v {
                GameVersion::Concrete(v) => v <= max,
                GameVersion::Any => true,
            },
        };

        min_ok && max_ok
    }

    /// Whether this interval intersects at least one member of `criteria`.
    pub fn intersects(&self, criteria: &GameVersionCriteria) -> bool {
        criteria.iter().any(|v| self.contains(v))
    }

    /// Absorbs `other` into the widest of the two intervals' upper bound,
    /// `Any` absorbing any concrete value. Used by
    /// `AvailableModule::latest_compatible_game_version`.
    pub fn max_absorbing(a: &GameVersion, b: &GameVersion) -> GameVersion {
        match (a, b) {
            (GameVersion::Any, _) | (_, GameVersion::Any) => GameVersion::Any,
            (GameVersion::Concrete(a), GameVersion::Concrete(b)) => {
                GameVersion::Concrete(a.max(b).clone())
            },
        }
    }
}

/// The unordered set of game versions a user currently targets. A module is
/// compatible with the set iff its compatibility interval intersects at
/// least one element.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GameVersionCriteria(Vec<GameVersion>);

/// Equality is set equality, not sequence equality — the criteria are
/// unordered and the `CompatibilitySorter`'s cache-hit check must not
/// rebuild just because the caller listed the same versions in a
/// different order.
impl PartialEq for GameVersionCriteria {
    fn eq(&self, other: &Self) -> bool {
        use std::collections::HashSet;

        let a: HashSet<&GameVersion> = self.0.iter().collect();
        let b: HashSet<&GameVersion> = other.0.iter().collect();
        a == b
    }
}

impl Eq for GameVersionCriteria {}

impl GameVersionCriteria {
    pub fn new(versions: impl IntoIterator<Item = GameVersion>) -> Self {
        Self(versions.into_iter().collect())
    }

    pub fn single(v: GameVersion) -> Self {
        Self(vec![v])
    }

    pub fn iter(&self) -> impl Iterator<Item = &GameVersion> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<GameVersion> for GameVersionCriteria {
    fn from_iter<T: IntoIterator<Item = GameVersion>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ver(s: &str) -> semver::Version {
        semver::Version::parse(s).unwrap()
    }

    #[test]
    fn semantic_ordering_treats_prerelease_as_lower() {
        let release = ModuleVersion::Semantic(ver("1.2.0"));
        let pre = ModuleVersion::Semantic(ver("1.2.0-beta"));
        assert!(pre < release);
    }

    #[test]
    fn semantic_missing_trailing_components_are_zero() {
        let a = ModuleVersion::Semantic(ver("1.4.0"));
        let b = ModuleVersion::Semantic(ver("1.4.1"));
        assert!(a < b);
    }

    #[test]
    fn unmanaged_versions_are_equality_only() {
        let a = ModuleVersion::Unmanaged(Some("v1".into()));
        let b = ModuleVersion::Unmanaged(Some("v2".into()));
        assert_eq!(a.partial_cmp(&b), None);
        assert_ne!(a, b);
    }

    #[test]
    fn cross_variant_comparison_is_none() {
        let a = ModuleVersion::Semantic(ver("1.0.0"));
        let b = ModuleVersion::Unmanaged(None);
        assert_eq!(a.partial_cmp(&b), None);
    }

    #[test]
    fn any_satisfies_every_criterion() {
        let interval = GameVersionInterval::unbounded();
        let criteria = GameVersionCriteria::single(GameVersion::Concrete(ver("1.8.0")));
        assert!(interval.intersects(&criteria));

        let bound_interval =
            GameVersionInterval::new(GameVersion::Concrete(ver("1.8.0")), GameVersion::Any);
        let any_criteria = GameVersionCriteria::single(GameVersion::Any);
        assert!(bound_interval.intersects(&any_criteria));
    }

    #[test]
    fn interval_intersection_respects_bounds() {
        let interval =
            GameVersionInterval::new(GameVersion::Concrete(ver("1.8.0")), GameVersion::Concrete(ver("1.8.1")));
        let matching = GameVersionCriteria::single(GameVersion::Concrete(ver("1.8.0")));
        let non_matching = GameVersionCriteria::single(GameVersion::Concrete(ver("1.9.0")));

        assert!(interval.intersects(&matching));
        assert!(!interval.intersects(&non_matching));
    }

    #[test]
    fn max_absorbing_any() {
        let a = GameVersion::Concrete(ver("1.8.0"));
        let b = GameVersion::Any;
        assert_eq!(GameVersionInterval::max_absorbing(&a, &b), GameVersion::Any);
    }

    #[test]
    fn criteria_equality_ignores_order() {
        let a = GameVersionCriteria::new([
            GameVersion::Concrete(ver("1.8.0")),
            GameVersion::Concrete(ver("1.10.0")),
        ]);
        let b = GameVersionCriteria::new([
            GameVersion::Concrete(ver("1.10.0")),
            GameVersion::Concrete(ver("1.8.0")),
        ]);
        assert_eq!(a, b);
    }
}
