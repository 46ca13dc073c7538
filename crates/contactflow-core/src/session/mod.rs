mod model;
mod options;
mod state;
mod store;

pub use model::{new_session_id, HistoryEntry, PersistedContact, Session, SESSION_ID_PREFIX};
pub(crate) use model::random_suffix;
pub use options::{ManualReviewResolution, PersistOptions, StageOptions, ValidateOptions};
pub use state::{IllegalTransition, NextStep, WorkflowEvent, WorkflowState, WorkflowStep};
pub use store::{SessionStore, StoredValue};
