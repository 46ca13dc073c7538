//! Adapters for the collaborator traits declared in `contactflow-core`.

pub mod config_loader;
pub mod memory_contact_repository;
pub mod memory_outcome_log;
pub mod memory_session_store;
pub mod static_enum_lookup;

pub use crate::config_loader::ConfigLoader;
pub use crate::memory_contact_repository::InMemoryContactRepository;
pub use crate::memory_outcome_log::InMemoryOutcomeLog;
pub use crate::memory_session_store::InMemorySessionStore;
pub use crate::static_enum_lookup::StaticEnumLookup;
