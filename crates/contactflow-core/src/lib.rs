//! Domain layer of the contact workflow orchestrator.
//!
//! Models, the canonical state machine, the error taxonomy, configuration,
//! collaborator traits and the pure normalization engine. Nothing in here
//! performs I/O.

pub mod batch;
pub mod collaborator;
pub mod config;
pub mod contact;
pub mod error;
pub mod normalize;
pub mod outcome;
pub mod session;
pub mod validation;

pub use config::OrchestratorConfig;
pub use error::{FlowError, Result};
