use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Identifier wrapper for registered tax documents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId(pub String);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Scope under which rule sets are configured and documents are filed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FormKey {
    pub jurisdiction: String,
    pub form_code: String,
    pub tax_year: u16,
}

impl FormKey {
    pub fn new(jurisdiction: impl Into<String>, form_code: impl Into<String>, tax_year: u16) -> Self {
        Self {
            jurisdiction: jurisdiction.into(),
            form_code: form_code.into(),
            tax_year,
        }
    }

    /// Same scope with surrounding whitespace dropped from jurisdiction and form code.
    pub fn normalized(&self) -> Self {
        Self::new(self.jurisdiction.trim(), self.form_code.trim(), self.tax_year)
    }

    pub fn is_blank(&self) -> bool {
        self.jurisdiction.trim().is_empty() || self.form_code.trim().is_empty()
    }
}

impl fmt::Display for FormKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.jurisdiction, self.form_code, self.tax_year)
    }
}

/// A single extracted field value.
///
/// Extraction output is untyped JSON, so values enter the engine through this sum type and
/// every numeric interpretation goes through [`coerce_decimal`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FieldValue {
    Number(Decimal),
    Text(String),
    #[default]
    Missing,
}

static MISSING: FieldValue = FieldValue::Missing;

impl FieldValue {
    /// True when the value cannot satisfy a required-field check.
    pub fn is_blank(&self, treat_na_as_missing: bool) -> bool {
        match self {
            FieldValue::Missing => true,
            FieldValue::Number(_) => false,
            FieldValue::Text(text) => {
                let trimmed = text.trim();
                trimmed.is_empty() || (treat_na_as_missing && trimmed.eq_ignore_ascii_case("n/a"))
            }
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            FieldValue::Number(value) => Some(*value),
            FieldValue::Text(text) => coerce_decimal(text),
            FieldValue::Missing => None,
        }
    }

    /// Raw value rendered for issue reports; missing values render as an empty string.
    pub fn display(&self) -> String {
        match self {
            FieldValue::Number(value) => value.normalize().to_string(),
            FieldValue::Text(text) => text.clone(),
            FieldValue::Missing => String::new(),
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => FieldValue::Missing,
            Value::Bool(flag) => FieldValue::Text(flag.to_string()),
            Value::Number(number) => {
                let raw = number.to_string();
                Decimal::from_str(&raw)
                    .or_else(|_| Decimal::from_scientific(&raw))
                    .map(FieldValue::Number)
                    .unwrap_or(FieldValue::Text(raw))
            }
            Value::String(text) => FieldValue::Text(text),
            other => FieldValue::Text(other.to_string()),
        }
    }
}

impl From<Decimal> for FieldValue {
    fn from(value: Decimal) -> Self {
        FieldValue::Number(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Number(Decimal::from(value))
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Number(Decimal::from(value))
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Number(value) => {
                let raw = value.normalize().to_string();
                match serde_json::Number::from_str(&raw) {
                    Ok(number) => number.serialize(serializer),
                    Err(_) => serializer.serialize_str(&raw),
                }
            }
            FieldValue::Text(text) => serializer.serialize_str(text),
            FieldValue::Missing => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(FieldValue::from)
    }
}

/// Interpret extracted text as an amount.
///
/// Accepts surrounding whitespace, a `$` sign, `,` thousands separators, a leading sign, and
/// accounting-style parentheses for negatives.
pub fn coerce_decimal(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim();
    let (parenthesized, body) = match trimmed
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
    {
        Some(inner) => (true, inner.trim()),
        None => (false, trimmed),
    };
    let (minus, body) = match body.strip_prefix('-') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, body.strip_prefix('+').map_or(body, str::trim_start)),
    };
    if parenthesized && minus {
        return None;
    }

    let body = body.strip_prefix('$').unwrap_or(body).trim();
    let cleaned: String = body.chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() || cleaned.starts_with(&['-', '+'][..]) {
        return None;
    }

    let value = Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .ok()?;
    if parenthesized || minus {
        Some(-value)
    } else {
        Some(value)
    }
}

/// Flat field-name to value mapping produced by the extraction vendor.
///
/// Absent keys read back as [`FieldValue::Missing`], so callers never need to distinguish
/// "not extracted" from "extracted as null".
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormFields(BTreeMap<String, FieldValue>);

impl FormFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> &FieldValue {
        self.0.get(name).unwrap_or(&MISSING)
    }

    pub fn number(&self, name: &str) -> Option<Decimal> {
        self.get(name).as_decimal()
    }

    /// Numeric value of a field, counting missing or non-numeric values as zero.
    pub fn number_or_zero(&self, name: &str) -> Decimal {
        self.number(name).unwrap_or(Decimal::ZERO)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl<K: Into<String>> FromIterator<(K, FieldValue)> for FormFields {
    fn from_iter<I: IntoIterator<Item = (K, FieldValue)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(name, value)| (name.into(), value))
                .collect(),
        )
    }
}

/// Processing state of a registered document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Uploaded,
    Checked,
}

impl DocumentStatus {
    pub fn label(&self) -> &'static str {
        match self {
            DocumentStatus::Uploaded => "uploaded",
            DocumentStatus::Checked => "checked",
        }
    }
}

fn default_client_type() -> String {
    "individual".to_string()
}

/// Inbound payload registering a document whose fields were already extracted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRegistration {
    pub jurisdiction: String,
    pub form_code: String,
    pub tax_year: u16,
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default = "default_client_type")]
    pub client_type: String,
    #[serde(default)]
    pub extracted_data: FormFields,
}

/// Stored document together with its extracted payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub document_id: DocumentId,
    #[serde(flatten)]
    pub key: FormKey,
    pub client_name: Option<String>,
    pub client_type: String,
    pub extracted_data: FormFields,
    pub status: DocumentStatus,
    pub uploaded_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}
