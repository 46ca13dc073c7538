mod model;
mod options;

pub use model::{
    new_batch_id, Batch, BatchCounters, BatchFailure, BatchStatus, BusinessIdCollision,
    MemberPosition, BATCH_ID_PREFIX,
};
pub use options::BulkOptions;
