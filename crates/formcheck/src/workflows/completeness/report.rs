use std::collections::BTreeMap;
use std::io;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{DocumentId, DocumentRecord};
use super::evaluation::{ConfigWarning, EvaluationOutcome};
use super::issue::{CheckSelection, CheckType, Issue, Severity};
use super::repository::IssueRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    NoIssues,
    IssuesFound,
}

/// Issue counts grouped by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckSummary {
    pub total_issues: usize,
    pub critical_issues: usize,
    pub high_priority_issues: usize,
    pub medium_priority_issues: usize,
    pub low_priority_issues: usize,
    pub status: RunStatus,
}

impl CheckSummary {
    pub fn from_issues(issues: &[Issue]) -> Self {
        let count = |severity: Severity| {
            issues
                .iter()
                .filter(|issue| issue.severity == severity)
                .count()
        };

        Self {
            total_issues: issues.len(),
            critical_issues: count(Severity::Critical),
            high_priority_issues: count(Severity::High),
            medium_priority_issues: count(Severity::Medium),
            low_priority_issues: count(Severity::Low),
            status: if issues.is_empty() {
                RunStatus::NoIssues
            } else {
                RunStatus::IssuesFound
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckTally {
    pub checked: bool,
    pub issues_found: usize,
}

/// Payload returned after checking a stored document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckReport {
    pub document_id: DocumentId,
    pub jurisdiction: String,
    pub form_code: String,
    pub tax_year: u16,
    pub checked_at: DateTime<Utc>,
    pub checks_performed: BTreeMap<CheckType, CheckTally>,
    #[serde(flatten)]
    pub summary: CheckSummary,
    pub issues: Vec<IssueRecord>,
    pub warnings: Vec<ConfigWarning>,
}

impl CheckReport {
    pub fn new(
        document: &DocumentRecord,
        selection: &CheckSelection,
        outcome: &EvaluationOutcome,
        stored: Vec<IssueRecord>,
        checked_at: DateTime<Utc>,
    ) -> Self {
        let checks_performed = selection
            .iter()
            .map(|check_type| {
                (
                    check_type,
                    CheckTally {
                        checked: true,
                        issues_found: outcome.issues_for(check_type),
                    },
                )
            })
            .collect();

        Self {
            document_id: document.document_id.clone(),
            jurisdiction: document.key.jurisdiction.clone(),
            form_code: document.key.form_code.clone(),
            tax_year: document.key.tax_year,
            checked_at,
            checks_performed,
            summary: outcome.summary(),
            issues: stored,
            warnings: outcome.warnings.clone(),
        }
    }
}

/// Column order of [`Issue`] when serialized as a CSV row.
const ISSUE_CSV_HEADER: [&str; 10] = [
    "check_type",
    "status",
    "severity",
    "field_name",
    "issue_description",
    "expected_value",
    "actual_value",
    "form_reference",
    "resolution_suggestion",
    "is_resolved",
];

/// Write issues as CSV rows with a header. The header is written even when there are no issues.
pub fn write_issues_csv<W: io::Write>(writer: W, issues: &[Issue]) -> Result<(), csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    writer.write_record(ISSUE_CSV_HEADER)?;
    for issue in issues {
        writer.serialize(issue)?;
    }
    writer.flush()?;
    Ok(())
}
