use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Canonical result of one successful scan.
///
/// Either every required field carries a real value or the record is never
/// built: `RawMedicine::into_record` is the only constructor used on backend
/// output, and it refuses blank required fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicineRecord {
    pub name: String,
    pub description: String,
    pub ingredients: Vec<String>,
    pub price: String,
    pub availability: String,
    pub precautions: Vec<String>,
    /// `None` hides the alternatives section. Never `Some(vec![])`.
    #[serde(default)]
    pub alternatives: Option<Vec<String>>,
}

impl MedicineRecord {
    pub fn has_alternatives(&self) -> bool {
        self.alternatives.as_ref().is_some_and(|alts| !alts.is_empty())
    }
}

/// A required field was missing, blank, or of an unusable type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("required field `{0}` is missing or empty")]
pub struct IncompleteRecord(pub &'static str);

/// Backend JSON before validation.
///
/// Fields stay as loose `serde_json::Value`s so that a stray number or a
/// single string where a list was expected can still be coerced.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMedicine {
    /// Clarity gate. Only present in vision-backend payloads.
    pub is_image_clear: Option<bool>,
    pub name: Option<serde_json::Value>,
    pub description: Option<serde_json::Value>,
    pub ingredients: Option<serde_json::Value>,
    pub price: Option<serde_json::Value>,
    pub availability: Option<serde_json::Value>,
    pub precautions: Option<serde_json::Value>,
    pub alternatives: Option<serde_json::Value>,
}

impl RawMedicine {
    /// Validate and coerce into a `MedicineRecord`.
    pub fn into_record(self) -> Result<MedicineRecord, IncompleteRecord> {
        let alternatives = coerce_list(self.alternatives.as_ref());

        Ok(MedicineRecord {
            name: required_text("name", self.name.as_ref())?,
            description: required_text("description", self.description.as_ref())?,
            ingredients: required_list("ingredients", self.ingredients.as_ref())?,
            price: required_text("price", self.price.as_ref())?,
            availability: required_text("availability", self.availability.as_ref())?,
            precautions: required_list("precautions", self.precautions.as_ref())?,
            alternatives: (!alternatives.is_empty()).then_some(alternatives),
        })
    }
}

fn coerce_text(value: &serde_json::Value) -> Option<String> {
    let text = match value {
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Keep usable entries only; a bare string counts as a one-item list.
fn coerce_list(value: Option<&serde_json::Value>) -> Vec<String> {
    match value {
        Some(serde_json::Value::Array(items)) => items.iter().filter_map(coerce_text).collect(),
        Some(other) => coerce_text(other).into_iter().collect(),
        None => vec![],
    }
}

fn required_text(
    field: &'static str,
    value: Option<&serde_json::Value>,
) -> Result<String, IncompleteRecord> {
    value.and_then(coerce_text).ok_or(IncompleteRecord(field))
}

fn required_list(
    field: &'static str,
    value: Option<&serde_json::Value>,
) -> Result<Vec<String>, IncompleteRecord> {
    let items = coerce_list(value);
    if items.is_empty() {
        return Err(IncompleteRecord(field));
    }
    Ok(items)
}

/// Row shape of the remote scans table: record columns plus scan time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRow {
    #[serde(flatten)]
    pub record: MedicineRecord,
    pub scanned_at: DateTime<Utc>,
}

impl ScanRow {
    /// Stamp a record with the current time.
    pub fn stamped(record: MedicineRecord) -> Self {
        Self {
            record,
            scanned_at: Utc::now(),
        }
    }
}
