use chrono::{DateTime, NaiveDate, Utc};
use tracing::info;

use crate::model::task::TaskRecord;
use crate::ops::mutation::{Mutation, MutationError, PendingMutation};
use crate::ops::store::TaskStore;

/// Project/section filter applied on fetch. An empty scope fetches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    pub project: Option<String>,
    pub section: Option<String>,
}

impl Scope {
    pub fn all() -> Self {
        Scope::default()
    }

    pub fn project(project: impl Into<String>) -> Self {
        Scope {
            project: Some(project.into()),
            section: None,
        }
    }

    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }

    /// Whether `record` falls inside the scope, using the project and section
    /// it inherits through `store` when it does not set them itself
    pub fn matches(&self, store: &TaskStore, record: &TaskRecord) -> bool {
        let (project, section) = store.placement(record);
        let project_ok = self.project.as_deref().is_none_or(|p| project == Some(p));
        let section_ok = self.section.as_deref().is_none_or(|s| section == Some(s));
        project_ok && section_ok
    }

    /// Records of `records` inside the scope, in their original order
    pub fn filter(&self, records: Vec<TaskRecord>) -> Vec<TaskRecord> {
        if self.project.is_none() && self.section.is_none() {
            return records;
        }
        let store = TaskStore::from_records(records.iter().cloned());
        records.into_iter().filter(|r| self.matches(&store, r)).collect()
    }
}

/// Failure reported by the backing store
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("backend rejected the change: {0}")]
    Rejected(String),
    #[error("backend error: {0}")]
    Backend(String),
}

/// The persistence collaborator. Records come back flat; the tree is always
/// derived locally.
pub trait TaskApi {
    fn fetch(&self, scope: &Scope) -> Result<Vec<TaskRecord>, ApiError>;
    fn submit(&mut self, mutation: &Mutation) -> Result<(), ApiError>;
}

/// Error type for an optimistic submit
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error(transparent)]
    Mutation(#[from] MutationError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Validate and apply a mutation to the local store, then submit it. If the
/// collaborator fails, the local store is put back to how it was.
pub fn submit_optimistic(
    api: &mut dyn TaskApi,
    store: &mut TaskStore,
    mutation: Mutation,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> Result<(), SubmitError> {
    let pending = PendingMutation::begin(store, mutation, today, now)?;
    let outcome = api.submit(pending.mutation());
    pending.settle(store, outcome)?;
    info!("mutation submitted");
    Ok(())
}
