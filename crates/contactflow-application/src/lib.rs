//! Application layer of the contact workflow orchestrator.
//!
//! - [`store_client`]: typed session store access
//! - [`workflow`]: the per-contact state machine service
//! - [`bulk`]: batch coordination over many workflows
//! - [`analytics`]: derived summaries over terminal outcomes

pub mod analytics;
pub mod bulk;
mod external;
pub mod store_client;
pub mod workflow;

pub use analytics::{AnalyticsAggregator, ContactAnalytics};
pub use bulk::{BatchHandle, BulkCoordinator};
pub use store_client::SessionStoreClient;
pub use workflow::{ContactWorkflowService, WorkflowDependencies};
