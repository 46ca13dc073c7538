use anyhow::{Context, Result};
use clap::Args;
use contactflow_application::{
    AnalyticsAggregator, BulkCoordinator, ContactWorkflowService, WorkflowDependencies,
};
use contactflow_core::batch::BulkOptions;
use contactflow_core::contact::ContactPayload;
use contactflow_infrastructure::{
    ConfigLoader, InMemoryContactRepository, InMemoryOutcomeLog, InMemorySessionStore,
    StaticEnumLookup,
};
use serde_json::json;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args)]
pub struct RunBatchArgs {
    /// JSON file holding an array of contact payloads
    #[arg(short, long)]
    input: PathBuf,

    /// Account the contacts belong to
    #[arg(short, long)]
    account: String,

    /// Members processed concurrently
    #[arg(long)]
    batch_size: Option<usize>,

    /// Abort the remaining members on the first failure
    #[arg(long)]
    stop_on_error: bool,

    /// Do not check business ids against existing contacts
    #[arg(long)]
    skip_uniqueness: bool,

    /// Make the first contact the account's primary contact
    #[arg(long)]
    primary_first: bool,

    /// Business ids already held by existing contacts
    #[arg(long = "taken", value_name = "BUSINESS_ID")]
    taken: Vec<String>,
}

pub async fn run(config_path: Option<PathBuf>, args: RunBatchArgs) -> Result<()> {
    let config = ConfigLoader::new(config_path)
        .load()
        .context("Failed to load configuration")?;

    let content = fs::read_to_string(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let payloads: Vec<ContactPayload> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {} as a JSON array of contacts", args.input.display()))?;
    tracing::info!(input = %args.input.display(), contacts = payloads.len(), "Loaded contact payloads");

    let contacts = Arc::new(InMemoryContactRepository::new());
    for business_id in &args.taken {
        contacts.seed("existing", business_id).await;
    }
    let outcomes = Arc::new(InMemoryOutcomeLog::new());

    let mut options = BulkOptions::from_config(&config);
    if let Some(size) = args.batch_size {
        options.batch_size = size;
    }
    options.continue_on_error = !args.stop_on_error;
    options.validate_business_id_uniqueness = !args.skip_uniqueness;
    options.persist.set_as_primary = args.primary_first;

    let service = ContactWorkflowService::new(
        config,
        WorkflowDependencies {
            store: Arc::new(InMemorySessionStore::new()),
            uniqueness: contacts.clone(),
            repository: contacts,
            enums: Arc::new(StaticEnumLookup::default()),
            outcomes: outcomes.clone(),
        },
    )?;
    let coordinator = BulkCoordinator::new(Arc::new(service));
    let analytics = AnalyticsAggregator::uncached(outcomes);

    let batch = coordinator.run(&args.account, payloads, options).await?;
    let summary = analytics.batch_summary(&batch.batch_id).await?;

    let report = json!({
        "batch": batch,
        "analytics": summary,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
