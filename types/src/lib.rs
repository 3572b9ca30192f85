//! Shared, serializable value types for the mod registry: identifiers,
//! version/compatibility primitives, relationship constraints, the
//! `CkanModule` metadata record, and path-boundary helpers. Mirrors the
//! role the teacher's `utils` crate plays for its `core` crate.

pub mod identifier;
pub mod module;
pub mod path;
pub mod relationship;
pub mod version;

pub use identifier::Identifier;
pub use module::{CkanModule, CkanModuleBuilder, CkanModuleBuilderError, DownloadHash};
pub use path::{PathError, PathResult};
pub use relationship::RelationshipDescriptor;
pub use version::{GameVersion, GameVersionCriteria, GameVersionInterval, ModuleVersion};
