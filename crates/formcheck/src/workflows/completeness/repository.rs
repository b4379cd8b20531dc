use std::cmp::Reverse;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{DocumentId, DocumentRecord, FormKey};
use super::issue::{Issue, Severity};
use super::rules::RuleSet;

/// Store-assigned identifier for a persisted issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssueId(pub u64);

impl fmt::Display for IssueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Issue row as persisted, one per emitted issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRecord {
    pub id: IssueId,
    pub document_id: DocumentId,
    #[serde(flatten)]
    pub issue: Issue,
    pub created_at: DateTime<Utc>,
}

/// Optional filters applied when listing a document's issues.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct IssueFilter {
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub resolved: Option<bool>,
}

impl IssueFilter {
    pub fn matches(&self, record: &IssueRecord) -> bool {
        self.severity
            .map_or(true, |severity| record.issue.severity == severity)
            && self
                .resolved
                .map_or(true, |resolved| record.issue.is_resolved == resolved)
    }
}

/// Most severe first, newest first within a severity.
pub fn sort_issue_records(records: &mut [IssueRecord]) {
    records.sort_by_key(|record| {
        (
            record.issue.severity,
            Reverse(record.created_at),
            Reverse(record.id),
        )
    });
}

/// Storage abstraction for documents and the issues raised against them.
pub trait DocumentRepository: Send + Sync {
    fn insert(&self, record: DocumentRecord) -> Result<DocumentRecord, RepositoryError>;
    fn update(&self, record: DocumentRecord) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &DocumentId) -> Result<Option<DocumentRecord>, RepositoryError>;
    /// Persist issues in order, assigning ids and timestamps.
    fn store_issues(
        &self,
        id: &DocumentId,
        issues: Vec<Issue>,
    ) -> Result<Vec<IssueRecord>, RepositoryError>;
    fn issues(
        &self,
        id: &DocumentId,
        filter: &IssueFilter,
    ) -> Result<Vec<IssueRecord>, RepositoryError>;
    fn resolve_issue(&self, id: IssueId) -> Result<IssueRecord, RepositoryError>;
}

/// Lookup of rule sets by (jurisdiction, form_code, tax_year).
pub trait RuleCatalog: Send + Sync {
    fn rule_set(&self, key: &FormKey) -> Result<Option<RuleSet>, RepositoryError>;
    fn upsert(&self, rule_set: RuleSet) -> Result<(), RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
