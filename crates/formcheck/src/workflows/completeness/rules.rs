use serde::{Deserialize, Serialize};

use super::domain::FormKey;
use super::issue::{CheckType, Severity};

/// Declarative check definition. Each variant maps to exactly one [`CheckType`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rule {
    RequiredField(RequiredFieldRule),
    Calculation(CalculationRule),
    CrossReference(CrossReferenceRule),
    Jurisdiction(JurisdictionRule),
}

impl Rule {
    pub fn check_type(&self) -> CheckType {
        match self {
            Rule::RequiredField(_) => CheckType::RequiredFields,
            Rule::Calculation(_) => CheckType::Calculations,
            Rule::CrossReference(_) => CheckType::CrossReference,
            Rule::Jurisdiction(_) => CheckType::JurisdictionSpecific,
        }
    }
}

/// Field that must be present and non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredFieldRule {
    pub field_name: String,
    #[serde(default)]
    pub label: String,
    /// Conditionally required fields are reported with high rather than critical severity.
    #[serde(default)]
    pub conditional: bool,
}

impl RequiredFieldRule {
    pub fn new(field_name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            label: label.into(),
            conditional: false,
        }
    }

    pub fn label(&self) -> &str {
        if self.label.trim().is_empty() {
            &self.field_name
        } else {
            &self.label
        }
    }
}

/// `result_field` must equal the sum/difference expressed by `formula`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculationRule {
    pub name: String,
    pub result_field: String,
    pub formula: String,
    #[serde(default)]
    pub description: String,
}

impl CalculationRule {
    pub fn new(
        name: impl Into<String>,
        result_field: impl Into<String>,
        formula: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            result_field: result_field.into(),
            formula: formula.into(),
            description: String::new(),
        }
    }
}

/// Consistency constraint between two or more fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossReferenceRule {
    pub name: String,
    pub relation: CrossRelation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CrossRelation {
    /// `left` must equal `right`.
    Equal { left: String, right: String },
    /// `field` must not exceed `limit`.
    AtMost { field: String, limit: String },
    /// The sum of `parts` must not exceed `total`.
    PartsWithinTotal { total: String, parts: Vec<String> },
    /// `total` must not be less than any single component.
    TotalCoversComponents {
        total: String,
        components: Vec<String>,
    },
}

/// Requirement layered on top of the generic rules for one jurisdiction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JurisdictionRule {
    pub jurisdiction: String,
    pub field_name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub constraint: JurisdictionConstraint,
    #[serde(default)]
    pub severity: Option<Severity>,
}

impl JurisdictionRule {
    pub fn new(jurisdiction: impl Into<String>, field_name: impl Into<String>) -> Self {
        Self {
            jurisdiction: jurisdiction.into(),
            field_name: field_name.into(),
            label: None,
            constraint: JurisdictionConstraint::Present,
            severity: None,
        }
    }

    pub fn label(&self) -> &str {
        self.label
            .as_deref()
            .filter(|label| !label.trim().is_empty())
            .unwrap_or(&self.field_name)
    }

    pub fn applies_to(&self, jurisdiction: &str) -> bool {
        self.jurisdiction
            .trim()
            .eq_ignore_ascii_case(jurisdiction.trim())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JurisdictionConstraint {
    #[default]
    Present,
    OneOf {
        allowed: Vec<String>,
    },
    NonNegative,
}

/// All rules configured for one (jurisdiction, form_code, tax_year) scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(flatten)]
    pub key: FormKey,
    /// Declared field schema; when present, formula references outside it are rejected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(key: FormKey) -> Self {
        Self {
            key,
            fields: None,
            rules: Vec::new(),
        }
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn knows_field(&self, name: &str) -> bool {
        match &self.fields {
            Some(fields) => fields.iter().any(|field| field == name),
            None => true,
        }
    }
}
