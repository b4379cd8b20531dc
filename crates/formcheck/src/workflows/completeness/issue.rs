use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Rule category. Declaration order is evaluation and reporting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckType {
    RequiredFields,
    Calculations,
    CrossReference,
    JurisdictionSpecific,
}

impl CheckType {
    pub const ALL: [CheckType; 4] = [
        CheckType::RequiredFields,
        CheckType::Calculations,
        CheckType::CrossReference,
        CheckType::JurisdictionSpecific,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckType::RequiredFields => "required_fields",
            CheckType::Calculations => "calculations",
            CheckType::CrossReference => "cross_reference",
            CheckType::JurisdictionSpecific => "jurisdiction_specific",
        }
    }
}

impl fmt::Display for CheckType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown check type '{0}'")]
pub struct UnknownCheckType(pub String);

impl FromStr for CheckType {
    type Err = UnknownCheckType;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim();
        CheckType::ALL
            .into_iter()
            .find(|check| check.as_str().eq_ignore_ascii_case(normalized))
            .ok_or_else(|| UnknownCheckType(normalized.to_string()))
    }
}

/// Set of check types requested for a run. An empty request selects every check type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckSelection(BTreeSet<CheckType>);

impl CheckSelection {
    pub fn all() -> Self {
        Self(CheckType::ALL.into_iter().collect())
    }

    pub fn from_types(types: impl IntoIterator<Item = CheckType>) -> Self {
        let selected: BTreeSet<CheckType> = types.into_iter().collect();
        if selected.is_empty() {
            Self::all()
        } else {
            Self(selected)
        }
    }

    /// Parse a comma separated list such as `calculations,required_fields`.
    pub fn parse(raw: &str) -> Result<Self, UnknownCheckType> {
        let types = raw
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .map(CheckType::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_types(types))
    }

    pub fn includes(&self, check_type: CheckType) -> bool {
        self.0.contains(&check_type)
    }

    /// Selected check types in evaluation order.
    pub fn iter(&self) -> impl Iterator<Item = CheckType> + '_ {
        self.0.iter().copied()
    }
}

impl Default for CheckSelection {
    fn default() -> Self {
        Self::all()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    Pass,
    Fail,
    Warning,
}

/// Ordinal importance of an issue; `Critical` sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed check produced by one rule during one engine run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub check_type: CheckType,
    pub status: IssueStatus,
    pub severity: Severity,
    pub field_name: String,
    pub issue_description: String,
    pub expected_value: String,
    pub actual_value: String,
    pub form_reference: String,
    pub resolution_suggestion: String,
    #[serde(default)]
    pub is_resolved: bool,
}
