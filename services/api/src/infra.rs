use chrono::Utc;
use formcheck::error::AppError;
use formcheck::workflows::completeness::{
    CalculationRule, CrossReferenceRule, CrossRelation, DocumentId, DocumentRecord,
    DocumentRepository, FormKey, Issue, IssueFilter, IssueId, IssueRecord, JurisdictionConstraint,
    JurisdictionRule, RepositoryError, RequiredFieldRule, Rule, RuleCatalog, RuleSet,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

fn lock<'a, T>(mutex: &'a Mutex<T>, store: &str) -> Result<MutexGuard<'a, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable(format!("{store} lock poisoned")))
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryDocumentRepository {
    records: Arc<Mutex<HashMap<DocumentId, DocumentRecord>>>,
    issues: Arc<Mutex<Vec<IssueRecord>>>,
    sequence: Arc<AtomicU64>,
}

impl DocumentRepository for InMemoryDocumentRepository {
    fn insert(&self, record: DocumentRecord) -> Result<DocumentRecord, RepositoryError> {
        let mut guard = lock(&self.records, "document")?;
        if guard.contains_key(&record.document_id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.document_id.clone(), record.clone());
        Ok(record)
    }

    fn update(&self, record: DocumentRecord) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.records, "document")?;
        if guard.contains_key(&record.document_id) {
            guard.insert(record.document_id.clone(), record);
            Ok(())
        } else {
            Err(RepositoryError::NotFound)
        }
    }

    fn fetch(&self, id: &DocumentId) -> Result<Option<DocumentRecord>, RepositoryError> {
        let guard = lock(&self.records, "document")?;
        Ok(guard.get(id).cloned())
    }

    fn store_issues(
        &self,
        id: &DocumentId,
        issues: Vec<Issue>,
    ) -> Result<Vec<IssueRecord>, RepositoryError> {
        let mut guard = lock(&self.issues, "issue")?;
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
        let guard = lock(&self.issues, "issue")?;
        Ok(guard
            .iter()
            .filter(|record| &record.document_id == id && filter.matches(record))
            .cloned()
            .collect())
    }

    fn resolve_issue(&self, id: IssueId) -> Result<IssueRecord, RepositoryError> {
        let mut guard = lock(&self.issues, "issue")?;
        let record = guard
            .iter_mut()
            .find(|record| record.id == id)
            .ok_or(RepositoryError::NotFound)?;
        record.issue.is_resolved = true;
        Ok(record.clone())
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryRuleCatalog {
    rule_sets: Arc<Mutex<HashMap<FormKey, RuleSet>>>,
}

/// A catalog file holds either one rule set or a list of them.
#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogFile {
    Many(Vec<RuleSet>),
    One(RuleSet),
}

impl InMemoryRuleCatalog {
    pub(crate) fn from_rule_sets(rule_sets: impl IntoIterator<Item = RuleSet>) -> Self {
        let rule_sets = rule_sets
            .into_iter()
            .map(|mut rule_set| {
                rule_set.key = rule_set.key.normalized();
                (rule_set.key.clone(), rule_set)
            })
            .collect();
        Self {
            rule_sets: Arc::new(Mutex::new(rule_sets)),
        }
    }

    pub(crate) fn load(path: &Path) -> Result<Self, AppError> {
        let reader = BufReader::new(File::open(path)?);
        let file: CatalogFile = serde_json::from_reader(reader)?;
        let rule_sets = match file {
            CatalogFile::Many(rule_sets) => rule_sets,
            CatalogFile::One(rule_set) => vec![rule_set],
        };
        Ok(Self::from_rule_sets(rule_sets))
    }

    pub(crate) fn len(&self) -> usize {
        self.rule_sets.lock().map(|guard| guard.len()).unwrap_or(0)
    }
}

impl RuleCatalog for InMemoryRuleCatalog {
    fn rule_set(&self, key: &FormKey) -> Result<Option<RuleSet>, RepositoryError> {
        let guard = lock(&self.rule_sets, "rule catalog")?;
        Ok(guard.get(key).cloned())
    }

    fn upsert(&self, rule_set: RuleSet) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.rule_sets, "rule catalog")?;
        guard.insert(rule_set.key.clone(), rule_set);
        Ok(())
    }
}

/// Baseline individual return rules served when no catalog file is configured.
pub(crate) fn default_rule_catalog() -> InMemoryRuleCatalog {
    let required = [
        ("taxpayer_name", "Taxpayer name"),
        ("ssn", "Social security number"),
        ("filing_status", "Filing status"),
        ("wages", "Wages, salaries, tips"),
        ("total_income", "Total income"),
    ];

    let mut filing_status = JurisdictionRule::new("US", "filing_status");
    filing_status.label = Some("Filing status".to_string());
    filing_status.constraint = JurisdictionConstraint::OneOf {
        allowed: [
            "single",
            "married_filing_jointly",
            "married_filing_separately",
            "head_of_household",
            "qualifying_surviving_spouse",
        ]
        .iter()
        .map(|status| status.to_string())
        .collect(),
    };

    let mut withholding = JurisdictionRule::new("US", "federal_withholding");
    withholding.label = Some("Federal income tax withheld".to_string());
    withholding.constraint = JurisdictionConstraint::NonNegative;

    let mut rule_set = RuleSet::new(FormKey::new("US", "1040", 2024));
    for (field, label) in required {
        rule_set = rule_set.with_rule(Rule::RequiredField(RequiredFieldRule::new(field, label)));
    }

    let rule_set = rule_set
        .with_rule(Rule::Calculation(CalculationRule::new(
            "Total income",
            "total_income",
            "wages + interest + dividends",
        )))
        .with_rule(Rule::Calculation(CalculationRule::new(
            "Taxable income",
            "taxable_income",
            "adjusted_gross_income - deductions",
        )))
        .with_rule(Rule::CrossReference(CrossReferenceRule {
            name: "Taxable income within AGI".to_string(),
            relation: CrossRelation::AtMost {
                field: "taxable_income".to_string(),
                limit: "adjusted_gross_income".to_string(),
            },
        }))
        .with_rule(Rule::CrossReference(CrossReferenceRule {
            name: "Total income covers wages".to_string(),
            relation: CrossRelation::TotalCoversComponents {
                total: "total_income".to_string(),
                components: vec![
                    "wages".to_string(),
                    "interest".to_string(),
                    "dividends".to_string(),
                ],
            },
        }))
        .with_rule(Rule::Jurisdiction(filing_status))
        .with_rule(Rule::Jurisdiction(withholding));

    InMemoryRuleCatalog::from_rule_sets([rule_set])
}
