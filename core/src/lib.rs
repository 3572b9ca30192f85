//! The in-memory registry core: the authoritative database tracking
//! available, installed, and auto-detected mod content for a single game
//! installation, and the queries a dependency solver needs against it.
//! Everything that touches a filesystem, a network, or a presentation
//! layer is a collaborator outside this crate.

pub mod available_module;
pub mod compatibility_sorter;
pub mod error;
pub mod file_ownership;
pub mod installed_module;
pub mod persistence;
pub mod provides_index;
pub mod registry;
pub mod repository;
pub mod reverse_deps;
pub mod transaction;

pub use available_module::AvailableModule;
pub use error::{RegistryError, RegistryResult};
pub use installed_module::InstalledModule;
pub use persistence::PersistedRegistry;
pub use registry::Registry;
pub use repository::Repository;
pub use reverse_deps::ReverseDependencyClosure;
pub use transaction::Transaction;
