#![allow(dead_code)]

use contactflow_application::{AnalyticsAggregator, BulkCoordinator, ContactWorkflowService, WorkflowDependencies};
use contactflow_core::contact::ContactPayload;
use contactflow_core::OrchestratorConfig;
use contactflow_infrastructure::{
    InMemoryContactRepository, InMemoryOutcomeLog, InMemorySessionStore, StaticEnumLookup,
};
use std::sync::Arc;

pub const ACCOUNT: &str = "acct_test";

pub struct Fixture {
    pub service: Arc<ContactWorkflowService>,
    pub bulk: BulkCoordinator,
    pub analytics: AnalyticsAggregator,
    pub store: Arc<InMemorySessionStore>,
    pub contacts: Arc<InMemoryContactRepository>,
    pub outcomes: Arc<InMemoryOutcomeLog>,
}

pub fn fixture() -> Fixture {
    fixture_with(OrchestratorConfig::default(), InMemoryContactRepository::new())
}

pub fn fixture_with(config: OrchestratorConfig, contacts: InMemoryContactRepository) -> Fixture {
    let store = Arc::new(InMemorySessionStore::new());
    let contacts = Arc::new(contacts);
    let outcomes = Arc::new(InMemoryOutcomeLog::new());
    let service = Arc::new(
        ContactWorkflowService::new(
            config,
            WorkflowDependencies {
                store: store.clone(),
                uniqueness: contacts.clone(),
                repository: contacts.clone(),
                enums: Arc::new(StaticEnumLookup::default()),
                outcomes: outcomes.clone(),
            },
        )
        .expect("default config is valid"),
    );
    Fixture {
        bulk: BulkCoordinator::new(service.clone()),
        analytics: AnalyticsAggregator::uncached(outcomes.clone()),
        service,
        store,
        contacts,
        outcomes,
    }
}

pub fn contact(first: &str, last: &str, business_id: &str) -> ContactPayload {
    ContactPayload {
        first_name: Some(first.into()),
        last_name: Some(last.into()),
        email: Some(format!("{}.{}@acme.io", first.to_lowercase(), last.to_lowercase())),
        job_title: Some("Senior Software Engineer".into()),
        company: Some("Acme".into()),
        industry: Some("technology".into()),
        contact_type: Some("lead".into()),
        business_id: Some(business_id.into()),
        social_links: vec![format!("https://www.linkedin.com/in/{}-{}", first.to_lowercase(), last.to_lowercase())],
        ..Default::default()
    }
}

pub fn john() -> ContactPayload {
    contact("John", "Doe", "john.doe.2024")
}

/// `n` distinct, valid payloads: `member.<i>.2024`.
pub fn members(n: usize) -> Vec<ContactPayload> {
    (0..n)
        .map(|i| contact("Member", &format!("Number{}", i), &format!("member.{}.2024", i)))
        .collect()
}
