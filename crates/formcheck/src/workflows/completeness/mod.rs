//! Tax form completeness checks: declarative rules evaluated against vendor-extracted fields.
//!
//! The [`EvaluationEngine`] is a pure function over its inputs. Everything around it
//! (document storage, rule catalog, HTTP routes) lives behind the traits in [`repository`]
//! so the service can run against in-memory stores in tests and demos.

pub mod domain;
pub(crate) mod evaluation;
pub mod formula;
pub mod issue;
pub mod report;
pub mod repository;
pub mod router;
pub mod rules;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    coerce_decimal, DocumentId, DocumentRecord, DocumentRegistration, DocumentStatus, FieldValue,
    FormFields, FormKey,
};
pub use evaluation::{ConfigWarning, EngineSettings, EvaluationEngine, EvaluationOutcome};
pub use formula::{Formula, FormulaError};
pub use issue::{CheckSelection, CheckType, Issue, IssueStatus, Severity, UnknownCheckType};
pub use report::{write_issues_csv, CheckReport, CheckSummary, CheckTally, RunStatus};
pub use repository::{
    DocumentRepository, IssueFilter, IssueId, IssueRecord, RepositoryError, RuleCatalog,
};
pub use router::completeness_router;
pub use rules::{
    CalculationRule, CrossReferenceRule, CrossRelation, JurisdictionConstraint, JurisdictionRule,
    RequiredFieldRule, Rule, RuleSet,
};
pub use service::{CompletenessService, CompletenessServiceError, DocumentIssues};
