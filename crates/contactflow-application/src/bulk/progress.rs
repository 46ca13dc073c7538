//! Live batch progress.
//!
//! One mutex guards the batch aggregate and the per-member slots, so a
//! member's bucket move, its failure record and the status snapshot are a
//! single atomic step. Nothing here is held across an await on an external
//! call.

use chrono::Utc;
use contactflow_core::batch::{Batch, BatchFailure, BusinessIdCollision, MemberPosition};
use contactflow_core::FlowError;
use std::sync::Mutex;

#[derive(Debug, Clone, Default)]
struct MemberSlot {
    started: bool,
    session_id: Option<String>,
    position: Option<MemberPosition>,
}

#[derive(Debug)]
struct ProgressState {
    batch: Batch,
    members: Vec<MemberSlot>,
    /// Bumped on every change; lets snapshot writers drop stale copies.
    version: u64,
}

#[derive(Debug)]
pub struct BatchProgress {
    state: Mutex<ProgressState>,
}

/// A copy of the batch tagged with the progress version it was taken at.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub batch: Batch,
    pub version: u64,
}

impl BatchProgress {
    pub fn new(batch: Batch) -> Self {
        let members = vec![MemberSlot::default(); batch.total_contacts];
        Self {
            state: Mutex::new(ProgressState {
                batch,
                members,
                version: 0,
            }),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut ProgressState) -> R) -> R {
        // Poisoning leaves the counters usable.
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    fn bump(state: &mut ProgressState) -> Snapshot {
        state.version += 1;
        state.batch.refresh_estimate(Utc::now());
        Snapshot {
            batch: state.batch.clone(),
            version: state.version,
        }
    }

    pub fn batch_id(&self) -> String {
        self.with_state(|s| s.batch.batch_id.clone())
    }

    pub fn snapshot(&self) -> Snapshot {
        self.with_state(|s| Snapshot {
            batch: s.batch.clone(),
            version: s.version,
        })
    }

    pub fn start(&self, index: usize) {
        self.with_state(|s| {
            if let Some(slot) = s.members.get_mut(index) {
                slot.started = true;
            }
        });
    }

    /// Member `index` now has a staged session.
    pub fn staged(&self, index: usize, session_id: &str) -> Snapshot {
        self.move_member(index, Some(session_id), MemberPosition::Staged)
    }

    pub fn validated(&self, index: usize) -> Snapshot {
        self.move_member(index, None, MemberPosition::Validated)
    }

    pub fn persisted(&self, index: usize, contact_id: String) -> Snapshot {
        self.with_state(|s| {
            s.batch.completed_contact_ids.push(contact_id);
            Self::move_locked(s, index, None, MemberPosition::Persisted);
            Self::bump(s)
        })
    }

    /// Records a session id before the member has a bucket (staging rejected).
    pub fn attach_session(&self, index: usize, session_id: &str) {
        self.with_state(|s| {
            if let Some(slot) = s.members.get_mut(index) {
                slot.session_id = Some(session_id.to_string());
            }
        });
    }

    pub fn collision(&self, collision: BusinessIdCollision) {
        self.with_state(|s| s.batch.collisions.push(collision));
    }

    /// Moves member `index` to `failed` and records why. A member that already
    /// reached a terminal bucket is left alone; returns `None` then.
    pub fn fail(&self, index: usize, error: FlowError) -> Option<(Option<String>, Snapshot)> {
        self.with_state(|s| {
            let slot = s.members.get(index)?.clone();
            if matches!(slot.position, Some(MemberPosition::Persisted | MemberPosition::Failed)) {
                return None;
            }
            s.batch.failures.push(BatchFailure {
                index,
                session_id: slot.session_id.clone(),
                retryable: error.is_retryable(),
                error,
            });
            Self::move_locked(s, index, None, MemberPosition::Failed);
            Some((slot.session_id, Self::bump(s)))
        })
    }

    /// Indices of members that never started.
    pub fn unstarted(&self) -> Vec<usize> {
        self.with_state(|s| {
            s.members
                .iter()
                .enumerate()
                .filter(|(_, m)| !m.started)
                .map(|(i, _)| i)
                .collect()
        })
    }

    pub fn finish(&self, aborted: bool) -> Snapshot {
        self.with_state(|s| {
            s.batch.aborted = aborted;
            s.batch.finish(Utc::now());
            s.version += 1;
            Snapshot {
                batch: s.batch.clone(),
                version: s.version,
            }
        })
    }

    fn move_member(&self, index: usize, session_id: Option<&str>, to: MemberPosition) -> Snapshot {
        self.with_state(|s| {
            Self::move_locked(s, index, session_id, to);
            Self::bump(s)
        })
    }

    fn move_locked(state: &mut ProgressState, index: usize, session_id: Option<&str>, to: MemberPosition) {
        let Some(slot) = state.members.get_mut(index) else {
            return;
        };
        if let Some(id) = session_id {
            slot.session_id = Some(id.to_string());
        }
        let from = slot.position.replace(to);
        state.batch.counters.advance(from, to);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contactflow_core::batch::BatchStatus;

    #[test]
    fn test_member_moves_through_buckets() {
        let progress = BatchProgress::new(Batch::new("acct", 2, Utc::now()));
        progress.start(0);
        progress.staged(0, "s0");
        progress.validated(0);
        let snap = progress.persisted(0, "c0".into());
        assert_eq!(snap.batch.counters.persisted, 1);
        assert_eq!(snap.batch.counters.total(), 1);

        progress.start(1);
        progress.staged(1, "s1");
        let (session_id, snap) = progress.fail(1, FlowError::internal("x")).unwrap();
        assert_eq!(session_id.as_deref(), Some("s1"));
        assert_eq!(snap.batch.counters.staged, 0);
        assert_eq!(snap.batch.counters.failed, 1);
        assert!(snap.version > 1);

        // Already terminal.
        assert!(progress.fail(0, FlowError::internal("late")).is_none());

        let done = progress.finish(false);
        assert_eq!(done.batch.status, BatchStatus::PartialFailure);
        assert!(done.batch.reconciles());
    }

    #[test]
    fn test_unstarted_members() {
        let progress = BatchProgress::new(Batch::new("acct", 3, Utc::now()));
        progress.start(1);
        assert_eq!(progress.unstarted(), vec![0, 2]);
    }
}
