//! Bulk Coordinator.
//!
//! Runs one workflow per payload: chunks of `batch_size` in sequence, the
//! members of a chunk concurrently. Progress is kept in an in-process
//! registry and mirrored to the session store after every member reaches a
//! terminal position.
//!
//! Stopping: an abort (first failure with `continue_on_error` off) only
//! keeps unstarted members from starting. The deadline additionally cuts
//! short members that have not reached persistence; a member whose create
//! call has gone out always runs to its outcome.

mod progress;

pub use progress::{BatchProgress, Snapshot};

use crate::workflow::{ContactWorkflowService, ValidationResult};
use chrono::Utc;
use contactflow_core::batch::{Batch, BulkOptions};
use contactflow_core::contact::ContactPayload;
use contactflow_core::session::{NextStep, PersistOptions, StageOptions, ValidateOptions};
use contactflow_core::{FlowError, Result};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Shared state of one running batch.
struct RunContext {
    progress: Arc<BatchProgress>,
    account_id: String,
    options: BulkOptions,
    /// Cancelled only by the deadline watchdog.
    deadline: CancellationToken,
    /// Set by the first failure when `continue_on_error` is off.
    aborted: AtomicBool,
    /// Highest progress version written to the store.
    last_written: Mutex<u64>,
}

impl RunContext {
    fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }

    fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    /// No further member may start.
    fn is_stopped(&self) -> bool {
        self.is_aborted() || self.deadline.is_cancelled()
    }

    fn stop_error(&self, index: usize) -> FlowError {
        if self.deadline.is_cancelled() {
            FlowError::timeout(
                format!("batch member {}", index),
                self.options.max_processing_time_secs * 1000,
            )
        } else {
            FlowError::cancelled(format!("batch member {} (batch aborted)", index))
        }
    }
}

/// A batch running in the background.
pub struct BatchHandle {
    pub batch_id: String,
    handle: JoinHandle<Batch>,
}

impl BatchHandle {
    pub async fn wait(self) -> Result<Batch> {
        self.handle
            .await
            .map_err(|e| FlowError::internal(format!("batch task failed: {}", e)))
    }
}

#[derive(Clone)]
pub struct BulkCoordinator {
    workflow: Arc<ContactWorkflowService>,
    registry: Arc<RwLock<HashMap<String, Arc<BatchProgress>>>>,
}

impl BulkCoordinator {
    pub fn new(workflow: Arc<ContactWorkflowService>) -> Self {
        Self {
            workflow,
            registry: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Runs the whole batch and returns its final state.
    pub async fn run(
        &self,
        account_id: &str,
        payloads: Vec<ContactPayload>,
        options: BulkOptions,
    ) -> Result<Batch> {
        let ctx = self.prepare(account_id, payloads.len(), options).await?;
        Ok(self.execute(ctx, payloads).await)
    }

    /// Starts the batch on the runtime and returns at once.
    pub async fn spawn(
        &self,
        account_id: &str,
        payloads: Vec<ContactPayload>,
        options: BulkOptions,
    ) -> Result<BatchHandle> {
        let ctx = self.prepare(account_id, payloads.len(), options).await?;
        let batch_id = ctx.progress.batch_id();
        let coordinator = self.clone();
        let handle = tokio::spawn(async move { coordinator.execute(ctx, payloads).await });
        Ok(BatchHandle { batch_id, handle })
    }

    /// Live status of a running batch, or the last snapshot in the store.
    pub async fn get_bulk_operation_status(&self, batch_id: &str) -> Result<Option<Batch>> {
        if let Some(progress) = self.registry.read().await.get(batch_id) {
            return Ok(Some(progress.snapshot().batch));
        }
        self.workflow.sessions().load_batch(batch_id).await
    }

    async fn prepare(
        &self,
        account_id: &str,
        total: usize,
        options: BulkOptions,
    ) -> Result<Arc<RunContext>> {
        options.check()?;
        if account_id.trim().is_empty() {
            return Err(FlowError::invalid_argument("account id must not be empty"));
        }

        let batch = Batch::new(account_id, total, Utc::now());
        self.workflow.sessions().save_batch(&batch).await?;
        let batch_id = batch.batch_id.clone();
        let progress = Arc::new(BatchProgress::new(batch));
        self.registry
            .write()
            .await
            .insert(batch_id.clone(), progress.clone());

        tracing::info!(
            batch_id = %batch_id,
            account_id = %account_id,
            total,
            batch_size = options.batch_size,
            continue_on_error = options.continue_on_error,
            "Bulk operation started"
        );
        Ok(Arc::new(RunContext {
            progress,
            account_id: account_id.to_string(),
            options,
            deadline: CancellationToken::new(),
            aborted: AtomicBool::new(false),
            last_written: Mutex::new(0),
        }))
    }

    async fn execute(&self, ctx: Arc<RunContext>, payloads: Vec<ContactPayload>) -> Batch {
        let deadline = Duration::from_secs(ctx.options.max_processing_time_secs);
        let watchdog = {
            let ctx = ctx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                tracing::warn!(batch_id = %ctx.progress.batch_id(), "Bulk operation deadline elapsed");
                ctx.deadline.cancel();
            })
        };

        let batch_size = ctx.options.batch_size;
        let indexed: Vec<(usize, ContactPayload)> = payloads.into_iter().enumerate().collect();
        for chunk in indexed.chunks(batch_size) {
            if ctx.is_stopped() {
                break;
            }
            let members = chunk
                .iter()
                .map(|(index, payload)| self.run_member(&ctx, *index, payload.clone()));
            join_all(members).await;
        }
        watchdog.abort();

        for index in ctx.progress.unstarted() {
            let error = ctx.stop_error(index);
            if let Some((_, snapshot)) = ctx.progress.fail(index, error) {
                self.write_snapshot(&ctx, snapshot).await;
            }
        }

        let snapshot = ctx.progress.finish(ctx.is_aborted());
        let batch = snapshot.batch.clone();
        let batch_id = batch.batch_id.clone();
        self.write_snapshot(&ctx, snapshot).await;
        self.registry.write().await.remove(&batch_id);

        tracing::info!(
            batch_id = %batch_id,
            status = %batch.status,
            persisted = batch.counters.persisted,
            failed = batch.counters.failed,
            "Bulk operation finished"
        );
        batch
    }

    async fn run_member(&self, ctx: &RunContext, index: usize, payload: ContactPayload) {
        ctx.progress.start(index);
        // The deadline may cut a member short only before its create call;
        // once persistence begins the member runs to its outcome.
        let prepared = tokio::select! {
            biased;
            _ = ctx.deadline.cancelled() => Err(ctx.stop_error(index)),
            prepared = self.prepare_member(ctx, index, payload) => prepared,
        };
        let result = match prepared {
            Ok(session_id) => self.persist_member(ctx, index, &session_id).await,
            Err(error) => Err(error),
        };
        let Err(error) = result else {
            return;
        };

        tracing::warn!(
            batch_id = %ctx.progress.batch_id(),
            index,
            error = %error,
            "Batch member failed"
        );
        let Some((session_id, snapshot)) = ctx.progress.fail(index, error.clone()) else {
            return;
        };
        if !ctx.options.continue_on_error {
            ctx.abort();
        }
        if let Some(session_id) = session_id {
            if let Err(e) = self.workflow.fail_for_error(&session_id, &error).await {
                tracing::warn!(session_id = %session_id, error = %e, "Could not fail member session");
            }
        }
        self.write_snapshot(ctx, snapshot).await;
    }

    /// stage → validate for one payload; returns the validated session id.
    async fn prepare_member(&self, ctx: &RunContext, index: usize, payload: ContactPayload) -> Result<String> {
        let workflow = &self.workflow;
        let stage_options = StageOptions {
            batch_id: Some(ctx.progress.batch_id()),
            ..Default::default()
        };
        let staged = workflow.stage(payload, &ctx.account_id, stage_options).await?;
        let session_id = staged.session_id.clone();
        if !staged.is_accepted() {
            ctx.progress.attach_session(index, &session_id);
            return Err(FlowError::ValidationFailed {
                session_id,
                reasons: staged.errors,
            });
        }
        ctx.progress.staged(index, &session_id);

        let validate_options = ValidateOptions {
            skip_uniqueness: !ctx.options.validate_business_id_uniqueness,
            ..Default::default()
        };
        let validated = workflow.validate(&session_id, validate_options).await?;
        match validated.next_step {
            NextStep::Persistence => {}
            NextStep::ManualReview => return Err(self.collision(ctx, validated)),
            _ => {
                return Err(FlowError::ValidationFailed {
                    session_id,
                    reasons: validated.validation.errors,
                });
            }
        }
        ctx.progress.validated(index);
        Ok(session_id)
    }

    /// persist → complete. Every external call in here is bounded by the
    /// configured call timeout.
    async fn persist_member(&self, ctx: &RunContext, index: usize, session_id: &str) -> Result<()> {
        let workflow = &self.workflow;
        // Only the first payload of a batch may take the primary slot.
        let persist_options = PersistOptions {
            set_as_primary: ctx.options.persist.set_as_primary && index == 0,
            ..ctx.options.persist.clone()
        };
        let persisted = workflow.persist(session_id, persist_options).await?;
        let snapshot = ctx.progress.persisted(index, persisted.contact_id.clone());
        self.write_snapshot(ctx, snapshot).await;

        if let Err(e) = workflow.complete(session_id).await {
            tracing::warn!(session_id = %session_id, error = %e, "Completion marker not written");
        }
        Ok(())
    }

    fn collision(&self, ctx: &RunContext, validated: ValidationResult) -> FlowError {
        let mut collisions = validated.business_id_collisions.into_iter();
        let Some(first) = collisions.next() else {
            return FlowError::internal("manual review without a collision");
        };
        ctx.progress.collision(first.clone());
        for extra in collisions {
            ctx.progress.collision(extra);
        }
        FlowError::UniquenessCollision {
            session_id: first.session_id,
            business_id: first.business_id,
            existing_contact_id: first.existing_contact_id,
        }
    }

    /// Writes the snapshot unless a newer one already went out. Store
    /// failures are logged, never raised.
    async fn write_snapshot(&self, ctx: &RunContext, snapshot: Snapshot) {
        let mut last = ctx.last_written.lock().await;
        if snapshot.version < *last {
            return;
        }
        match self.workflow.sessions().save_batch(&snapshot.batch).await {
            Ok(()) => *last = snapshot.version,
            Err(e) => {
                tracing::warn!(batch_id = %snapshot.batch.batch_id, error = %e, "Batch snapshot not written");
            }
        }
    }
}
