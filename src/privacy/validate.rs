// Post-condition check over anonymized exports
//
// Works on the serialized JSON so it sees exactly what a consumer would.

use crate::error::Result;
use crate::privacy::anonymizer::{AnonymizedPopulation, GENERATION_PREFIX, ID_PREFIX};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Name prefixes produced by the anonymizer
pub const ANONYMOUS_PREFIXES: [&str; 2] = [ID_PREFIX, GENERATION_PREFIX];

/// One problem found in an export
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Individual or family id, when the problem belongs to one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<String>,
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.record {
            Some(record) => write!(f, "{}: {}", record, self.message),
            None => f.write_str(&self.message),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub individuals_checked: usize,
    pub families_checked: usize,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    fn flag(&mut self, record: Option<&str>, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            record: record.map(str::to_string),
            message: message.into(),
        });
    }
}

/// Validate an in-memory export by serializing it first
pub fn validate(population: &AnonymizedPopulation) -> Result<ValidationReport> {
    let value = serde_json::to_value(population)?;
    Ok(validate_export(&value))
}

/// Validate an export already in JSON form
pub fn validate_export(export: &Value) -> ValidationReport {
    let mut report = ValidationReport::default();

    let Some(root) = export.as_object() else {
        report.flag(None, "export is not a JSON object");
        return report;
    };

    match root.get("individuals") {
        Some(Value::Object(individuals)) => {
            for (key, individual) in individuals {
                check_individual(key, individual, &mut report);
            }
        }
        Some(Value::Array(individuals)) => {
            for (index, individual) in individuals.iter().enumerate() {
                let key = individual
                    .get("id")
                    .and_then(Value::as_str)
                    .map_or_else(|| format!("#{}", index), str::to_string);
                check_individual(&key, individual, &mut report);
            }
        }
        Some(_) => report.flag(None, "'individuals' is neither an object nor an array"),
        None => report.flag(None, "export has no 'individuals'"),
    }

    if let Some(families) = root.get("families").and_then(Value::as_array) {
        for (index, family) in families.iter().enumerate() {
            let key = family
                .get("id")
                .and_then(Value::as_str)
                .map_or_else(|| format!("family #{}", index), str::to_string);
            check_family(&key, family, &mut report);
        }
    }

    report
}

fn check_individual(id: &str, individual: &Value, report: &mut ValidationReport) {
    report.individuals_checked += 1;

    let Some(fields) = individual.as_object() else {
        report.flag(Some(id), "record is not an object");
        return;
    };

    match fields.get("name").and_then(Value::as_str) {
        Some(name) if ANONYMOUS_PREFIXES.iter().any(|p| name.starts_with(p)) => {}
        Some(_) => report.flag(Some(id), "name is not anonymized"),
        None => report.flag(Some(id), "name is missing"),
    }

    for event in ["birth", "death"] {
        if let Some(value) = fields.get(event) {
            check_event(id, event, value, report);
        }
    }

    check_country_keys(id, fields, report);
}

fn check_family(id: &str, family: &Value, report: &mut ValidationReport) {
    report.families_checked += 1;

    let Some(fields) = family.as_object() else {
        report.flag(Some(id), "family is not an object");
        return;
    };

    if let Some(value) = fields.get("marriage") {
        check_event(id, "marriage", value, report);
    }
    check_country_keys(id, fields, report);
}

/// An event may be absent, null, or an object holding at most an integer year
fn check_event(id: &str, event: &str, value: &Value, report: &mut ValidationReport) {
    let fields = match value {
        Value::Null => return,
        Value::Object(fields) => fields,
        _ => {
            report.flag(Some(id), format!("{} is not an object", event));
            return;
        }
    };

    if fields.contains_key("place") {
        report.flag(Some(id), format!("{} contains a place", event));
    }
    for key in fields.keys().filter(|k| k.as_str() != "year" && k.as_str() != "place") {
        report.flag(Some(id), format!("{} contains unexpected key '{}'", event, key));
    }
    if let Some(year) = fields.get("year") {
        if !(year.is_i64() || year.is_u64() || year.is_null()) {
            report.flag(Some(id), format!("{} year is not an integer", event));
        }
    }
}

fn check_country_keys(id: &str, fields: &Map<String, Value>, report: &mut ValidationReport) {
    for key in fields.keys().filter(|k| k.ends_with("_country")) {
        report.flag(Some(id), format!("resolved country '{}' retained", key));
    }
}
