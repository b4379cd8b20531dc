use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::domain::{
    DocumentId, DocumentRecord, DocumentRegistration, DocumentStatus, FormKey,
};
use super::evaluation::{ConfigWarning, EngineSettings, EvaluationEngine};
use super::issue::CheckSelection;
use super::report::CheckReport;
use super::repository::{
    sort_issue_records, DocumentRepository, IssueFilter, IssueId, IssueRecord, RepositoryError,
    RuleCatalog,
};
use super::rules::RuleSet;

/// Service composing the document store, rule catalog, and evaluation engine.
pub struct CompletenessService<D, C> {
    documents: Arc<D>,
    catalog: Arc<C>,
    engine: Arc<EvaluationEngine>,
}

static DOCUMENT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_document_id() -> DocumentId {
    let id = DOCUMENT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    DocumentId(format!("DOC-{id:06}"))
}

/// Stored issues for one document, as surfaced over the API.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentIssues {
    pub document_id: DocumentId,
    pub total_issues: usize,
    pub issues: Vec<IssueRecord>,
}

impl<D, C> CompletenessService<D, C>
where
    D: DocumentRepository + 'static,
    C: RuleCatalog + 'static,
{
    pub fn new(documents: Arc<D>, catalog: Arc<C>, settings: EngineSettings) -> Self {
        Self {
            documents,
            catalog,
            engine: Arc::new(EvaluationEngine::new(settings)),
        }
    }

    /// Register a document whose fields were already extracted.
    pub fn register(
        &self,
        registration: DocumentRegistration,
    ) -> Result<DocumentRecord, CompletenessServiceError> {
        let key = FormKey::new(
            registration.jurisdiction,
            registration.form_code,
            registration.tax_year,
        )
        .normalized();
        if key.is_blank() {
            return Err(CompletenessServiceError::InvalidRegistration(
                "jurisdiction and form_code are required".to_string(),
            ));
        }

        let record = DocumentRecord {
            document_id: next_document_id(),
            key,
            client_name: registration.client_name,
            client_type: registration.client_type,
            extracted_data: registration.extracted_data,
            status: DocumentStatus::Uploaded,
            uploaded_at: Utc::now(),
            processed_at: None,
        };

        let stored = self.documents.insert(record)?;
        info!(
            document_id = %stored.document_id,
            key = %stored.key,
            fields = stored.extracted_data.len(),
            "registered document"
        );
        Ok(stored)
    }

    /// Run the requested checks, persist the issues, and mark the document checked.
    pub fn check(
        &self,
        document_id: &DocumentId,
        selection: &CheckSelection,
    ) -> Result<CheckReport, CompletenessServiceError> {
        let mut document = self
            .documents
            .fetch(document_id)?
            .ok_or_else(|| CompletenessServiceError::DocumentNotFound(document_id.clone()))?;

        let rule_set = self
            .catalog
            .rule_set(&document.key)?
            .ok_or_else(|| CompletenessServiceError::RuleSetNotFound(document.key.clone()))?;

        let outcome = self
            .engine
            .evaluate(&document.extracted_data, &rule_set, selection);
        for warning in &outcome.warnings {
            warn!(
                document_id = %document_id,
                rule = %warning.rule_name,
                check_type = %warning.check_type,
                "{}",
                warning.message
            );
        }

        let stored = self
            .documents
            .store_issues(document_id, outcome.issues.clone())?;

        let checked_at = Utc::now();
        document.status = DocumentStatus::Checked;
        document.processed_at = Some(checked_at);
        self.documents.update(document.clone())?;

        let report = CheckReport::new(&document, selection, &outcome, stored, checked_at);
        info!(
            document_id = %document_id,
            total = report.summary.total_issues,
            critical = report.summary.critical_issues,
            "completeness check finished"
        );
        Ok(report)
    }

    /// List stored issues, most severe first.
    pub fn issues(
        &self,
        document_id: &DocumentId,
        filter: &IssueFilter,
    ) -> Result<DocumentIssues, CompletenessServiceError> {
        if self.documents.fetch(document_id)?.is_none() {
            return Err(CompletenessServiceError::DocumentNotFound(
                document_id.clone(),
            ));
        }

        let mut issues = self.documents.issues(document_id, filter)?;
        sort_issue_records(&mut issues);
        Ok(DocumentIssues {
            document_id: document_id.clone(),
            total_issues: issues.len(),
            issues,
        })
    }

    pub fn resolve_issue(&self, issue_id: IssueId) -> Result<IssueRecord, CompletenessServiceError> {
        match self.documents.resolve_issue(issue_id) {
            Ok(record) => {
                debug!(issue_id = %issue_id, "issue marked resolved");
                Ok(record)
            }
            Err(RepositoryError::NotFound) => {
                Err(CompletenessServiceError::IssueNotFound(issue_id))
            }
            Err(other) => Err(other.into()),
        }
    }

    /// Replace the rule set for its scope, returning any configuration warnings it raises.
    pub fn publish_rule_set(
        &self,
        mut rule_set: RuleSet,
    ) -> Result<Vec<ConfigWarning>, CompletenessServiceError> {
        rule_set.key = rule_set.key.normalized();
        if rule_set.key.is_blank() {
            return Err(CompletenessServiceError::InvalidRuleSet(
                "jurisdiction and form_code are required".to_string(),
            ));
        }

        let warnings = self.engine.lint(&rule_set);
        info!(
            key = %rule_set.key,
            rules = rule_set.rules.len(),
            warnings = warnings.len(),
            "publishing rule set"
        );
        self.catalog.upsert(rule_set)?;
        Ok(warnings)
    }
}

/// Error raised by the completeness service.
#[derive(Debug, thiserror::Error)]
pub enum CompletenessServiceError {
    #[error("document {0} not found")]
    DocumentNotFound(DocumentId),
    #[error("no rule set registered for {0}")]
    RuleSetNotFound(FormKey),
    #[error("issue {0} not found")]
    IssueNotFound(IssueId),
    #[error("invalid registration: {0}")]
    InvalidRegistration(String),
    #[error("invalid rule set: {0}")]
    InvalidRuleSet(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
