use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::Utc;
use serde_json::Value;

use crate::workflows::completeness::domain::{
    DocumentId, DocumentRecord, DocumentRegistration, FormFields, FormKey,
};
use crate::workflows::completeness::repository::{
    DocumentRepository, IssueFilter, IssueId, IssueRecord, RepositoryError, RuleCatalog,
};
use crate::workflows::completeness::rules::{
    CalculationRule, CrossReferenceRule, CrossRelation, JurisdictionConstraint, JurisdictionRule,
    RequiredFieldRule, Rule, RuleSet,
};
use crate::workflows::completeness::{
    completeness_router, CompletenessService, EngineSettings, EvaluationEngine, Issue,
};

pub(super) fn form_key() -> FormKey {
    FormKey::new("US", "1040", 2024)
}

pub(super) fn total_income_rule() -> Rule {
    Rule::Calculation(CalculationRule::new(
        "Total income",
        "total_income",
        "wages + interest + dividends",
    ))
}

pub(super) fn taxpayer_name_rule() -> Rule {
    Rule::RequiredField(RequiredFieldRule::new("taxpayer_name", "Taxpayer name"))
}

/// One rule per variant, in deliberately shuffled order.
pub(super) fn full_rule_set() -> RuleSet {
    let mut filing_status = JurisdictionRule::new("US", "filing_status");
    filing_status.label = Some("Filing status".to_string());
    filing_status.constraint = JurisdictionConstraint::OneOf {
        allowed: vec!["single".to_string(), "married_filing_jointly".to_string()],
    };

    RuleSet::new(form_key())
        .with_rule(Rule::Jurisdiction(filing_status))
        .with_rule(Rule::CrossReference(CrossReferenceRule {
            name: "Taxable income within AGI".to_string(),
            relation: CrossRelation::AtMost {
                field: "taxable_income".to_string(),
                limit: "adjusted_gross_income".to_string(),
            },
        }))
        .with_rule(total_income_rule())
        .with_rule(taxpayer_name_rule())
}

pub(super) fn income_fields(total_income: i64) -> FormFields {
    FormFields::new()
        .with("taxpayer_name", "Jordan Rivera")
        .with("wages", 40000)
        .with("interest", 500)
        .with("dividends", 300)
        .with("total_income", total_income)
}

pub(super) fn engine() -> EvaluationEngine {
    EvaluationEngine::new(EngineSettings::default())
}

pub(super) fn registration(extracted_data: FormFields) -> DocumentRegistration {
    DocumentRegistration {
        jurisdiction: "US".to_string(),
        form_code: "1040".to_string(),
        tax_year: 2024,
        client_name: Some("Jordan Rivera".to_string()),
        client_type: "individual".to_string(),
        extracted_data,
    }
}

#[derive(Default)]
pub(super) struct MemoryDocuments {
    records: Mutex<HashMap<DocumentId, DocumentRecord>>,
    issues: Mutex<Vec<IssueRecord>>,
    sequence: AtomicU64,
}

impl MemoryDocuments {
    pub(super) fn stored_issues(&self) -> Vec<IssueRecord> {
        self.issues.lock().expect("issue mutex poisoned").clone()
    }
}

impl DocumentRepository for MemoryDocuments {
    fn insert(&self, record: DocumentRecord) -> Result<DocumentRecord, RepositoryError> {
        let mut guard = self.records.lock().expect("document mutex poisoned");
        if guard.contains_key(&record.document_id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.document_id.clone(), record.clone());
        Ok(record)
    }

    fn update(&self, record: DocumentRecord) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("document mutex poisoned");
        match guard.get_mut(&record.document_id) {
            Some(existing) => {
                *existing = record;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch(&self, id: &DocumentId) -> Result<Option<DocumentRecord>, RepositoryError> {
        let guard = self.records.lock().expect("document mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn store_issues(
        &self,
        id: &DocumentId,
        issues: Vec<Issue>,
    ) -> Result<Vec<IssueRecord>, RepositoryError> {
        let mut guard = self.issues.lock().expect("issue mutex poisoned");
        let created_at = Utc::now();
        let stored: Vec<IssueRecord> = issues
            .into_iter()
            .map(|issue| IssueRecord {
                id: IssueId(self.sequence.fetch_add(1, Ordering::Relaxed) + 1),
                document_id: id.clone(),
                issue,
                created_at,
            })
            .collect();
        guard.extend(stored.iter().cloned());
        Ok(stored)
    }

    fn issues(
        &self,
        id: &DocumentId,
        filter: &IssueFilter,
    ) -> Result<Vec<IssueRecord>, RepositoryError> {
        let guard = self.issues.lock().expect("issue mutex poisoned");
        Ok(guard
            .iter()
            .filter(|record| &record.document_id == id && filter.matches(record))
            .cloned()
            .collect())
    }

    fn resolve_issue(&self, id: IssueId) -> Result<IssueRecord, RepositoryError> {
        let mut guard = self.issues.lock().expect("issue mutex poisoned");
        let record = guard
            .iter_mut()
            .find(|record| record.id == id)
            .ok_or(RepositoryError::NotFound)?;
        record.issue.is_resolved = true;
        Ok(record.clone())
    }
}

#[derive(Default)]
pub(super) struct MemoryCatalog {
    rule_sets: Mutex<HashMap<FormKey, RuleSet>>,
}

impl MemoryCatalog {
    pub(super) fn with(rule_set: RuleSet) -> Self {
        let catalog = Self::default();
        catalog
            .rule_sets
            .lock()
            .expect("catalog mutex poisoned")
            .insert(rule_set.key.clone(), rule_set);
        catalog
    }
}

impl RuleCatalog for MemoryCatalog {
    fn rule_set(&self, key: &FormKey) -> Result<Option<RuleSet>, RepositoryError> {
        let guard = self.rule_sets.lock().expect("catalog mutex poisoned");
        Ok(guard.get(key).cloned())
    }

    fn upsert(&self, rule_set: RuleSet) -> Result<(), RepositoryError> {
        let mut guard = self.rule_sets.lock().expect("catalog mutex poisoned");
        guard.insert(rule_set.key.clone(), rule_set);
        Ok(())
    }
}

pub(super) struct UnavailableDocuments;

impl DocumentRepository for UnavailableDocuments {
    fn insert(&self, _record: DocumentRecord) -> Result<DocumentRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update(&self, _record: DocumentRecord) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &DocumentId) -> Result<Option<DocumentRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn store_issues(
        &self,
        _id: &DocumentId,
        _issues: Vec<Issue>,
    ) -> Result<Vec<IssueRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn issues(
        &self,
        _id: &DocumentId,
        _filter: &IssueFilter,
    ) -> Result<Vec<IssueRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn resolve_issue(&self, _id: IssueId) -> Result<IssueRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) type TestService = CompletenessService<MemoryDocuments, MemoryCatalog>;

pub(super) fn build_service() -> (TestService, Arc<MemoryDocuments>, Arc<MemoryCatalog>) {
    let documents = Arc::new(MemoryDocuments::default());
    let catalog = Arc::new(MemoryCatalog::with(full_rule_set()));
    let service = CompletenessService::new(
        documents.clone(),
        catalog.clone(),
        EngineSettings::default(),
    );
    (service, documents, catalog)
}

pub(super) fn router_with_service(service: TestService) -> axum::Router {
    completeness_router(Arc::new(service))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
