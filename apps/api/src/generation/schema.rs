//! Résumé contract: the closed schema every model-produced résumé must satisfy.
//!
//! A single field table drives both directions:
//! - `validate()` walks untrusted JSON and reports the FIRST violation with its path.
//! - `schema_description()` renders the same table as a JSON-Schema-style object that
//!   generation prompts embed, so the model is told the exact contract.
//!
//! Rules enforced by `validate()`:
//! - unknown fields are rejected at every level
//! - `personal_info` is required; list sections may be absent (= empty) but not `null`
//! - nullable fields accept `null` or absence (absence is normalized to `null`)
//! - dates must be `YYYY-MM-DD` calendar dates
//!
//! There is no partial acceptance: a record either passes completely or is rejected.

use chrono::NaiveDate;
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::models::resume::CandidateResume;

/// The single date format used in every résumé record.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Error)]
#[error("Schema violation at '{path}': expected {expected}, found {actual}")]
pub struct SchemaViolation {
    pub path: String,
    pub expected: String,
    pub actual: String,
}

impl SchemaViolation {
    fn new(path: impl Into<String>, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum FieldKind {
    Text,
    Email,
    Date,
    TextList,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Presence {
    Required,
    /// May be `null` or absent.
    Nullable,
    /// May be absent; defaults to empty. Never `null`.
    Defaulted,
}

struct FieldSpec {
    name: &'static str,
    kind: FieldKind,
    presence: Presence,
}

const fn field(name: &'static str, kind: FieldKind, presence: Presence) -> FieldSpec {
    FieldSpec {
        name,
        kind,
        presence,
    }
}

struct SectionSpec {
    name: &'static str,
    /// `true` for list sections, `false` for the single `personal_info` object.
    many: bool,
    fields: &'static [FieldSpec],
}

use FieldKind::{Date, Email, Text, TextList};
use Presence::{Defaulted, Nullable, Required};

const PERSONAL_INFO_FIELDS: &[FieldSpec] = &[
    field("full_name", Text, Required),
    field("email", Email, Required),
    field("phone", Text, Required),
    field("address", Text, Nullable),
    field("linkedin", Text, Nullable),
    field("facebook", Text, Nullable),
    field("x", Text, Nullable),
];

const EXPERIENCE_FIELDS: &[FieldSpec] = &[
    field("title", Text, Required),
    field("company", Text, Required),
    field("description", Text, Required),
    field("start_date", Date, Required),
    field("end_date", Date, Nullable),
];

const EDUCATION_FIELDS: &[FieldSpec] = &[
    field("school", Text, Required),
    field("degree", Text, Required),
    field("start_date", Date, Required),
    field("end_date", Date, Nullable),
];

const SKILL_FIELDS: &[FieldSpec] = &[field("skill_name", Text, Required)];

const CERTIFICATION_FIELDS: &[FieldSpec] = &[
    field("title", Text, Required),
    field("authority", Text, Required),
    field("date", Date, Required),
];

const PROJECT_FIELDS: &[FieldSpec] = &[
    field("title", Text, Required),
    field("description", Text, Required),
    field("link", Text, Nullable),
    field("used_skills", TextList, Defaulted),
];

const SECTIONS: &[SectionSpec] = &[
    SectionSpec {
        name: "personal_info",
        many: false,
        fields: PERSONAL_INFO_FIELDS,
    },
    SectionSpec {
        name: "experiences",
        many: true,
        fields: EXPERIENCE_FIELDS,
    },
    SectionSpec {
        name: "educations",
        many: true,
        fields: EDUCATION_FIELDS,
    },
    SectionSpec {
        name: "skills",
        many: true,
        fields: SKILL_FIELDS,
    },
    SectionSpec {
        name: "certifications",
        many: true,
        fields: CERTIFICATION_FIELDS,
    },
    SectionSpec {
        name: "projects",
        many: true,
        fields: PROJECT_FIELDS,
    },
];

// ────────────────────────────────────────────────────────────────────────────
// Validation
// ────────────────────────────────────────────────────────────────────────────

/// Checks `record` against the résumé contract and converts it to a typed résumé.
pub fn validate(record: &Value) -> Result<CandidateResume, SchemaViolation> {
    let root = record
        .as_object()
        .ok_or_else(|| SchemaViolation::new("$", "object", kind_of(record)))?;

    reject_unknown_keys(root, |key| SECTIONS.iter().any(|s| s.name == key), "")?;

    for section in SECTIONS {
        match (root.get(section.name), section.many) {
            (None, false) => {
                return Err(SchemaViolation::new(section.name, "object", "missing"));
            }
            (None, true) => {}
            (Some(value), false) => check_entry(value, section.fields, section.name)?,
            (Some(value), true) => {
                let items = value
                    .as_array()
                    .ok_or_else(|| SchemaViolation::new(section.name, "array", kind_of(value)))?;
                for (i, item) in items.iter().enumerate() {
                    check_entry(item, section.fields, &format!("{}[{i}]", section.name))?;
                }
            }
        }
    }

    // Structure is verified above; this only moves the data into typed form.
    serde_json::from_value(record.clone())
        .map_err(|e| SchemaViolation::new("$", "résumé record", e.to_string()))
}

fn check_entry(value: &Value, fields: &[FieldSpec], path: &str) -> Result<(), SchemaViolation> {
    let entry = value
        .as_object()
        .ok_or_else(|| SchemaViolation::new(path, "object", kind_of(value)))?;

    reject_unknown_keys(entry, |key| fields.iter().any(|f| f.name == key), path)?;

    for spec in fields {
        let field_path = format!("{path}.{}", spec.name);
        match (entry.get(spec.name), spec.presence) {
            (None, Required) => {
                return Err(SchemaViolation::new(
                    field_path,
                    expected_for(spec.kind),
                    "missing",
                ));
            }
            (None, Nullable | Defaulted) => {}
            (Some(Value::Null), Nullable) => {}
            (Some(v), _) => check_value(v, spec.kind, &field_path)?,
        }
    }
    Ok(())
}

fn check_value(value: &Value, kind: FieldKind, path: &str) -> Result<(), SchemaViolation> {
    let mismatch = || SchemaViolation::new(path, expected_for(kind), kind_of(value));

    match kind {
        Text => value.as_str().map(|_| ()).ok_or_else(mismatch),
        Email => {
            let s = value.as_str().ok_or_else(mismatch)?;
            if looks_like_email(s) {
                Ok(())
            } else {
                Err(SchemaViolation::new(path, "email address", format!("'{s}'")))
            }
        }
        Date => {
            let s = value.as_str().ok_or_else(mismatch)?;
            if is_calendar_date(s) {
                Ok(())
            } else {
                Err(SchemaViolation::new(path, "date as YYYY-MM-DD", format!("'{s}'")))
            }
        }
        TextList => {
            let items = value.as_array().ok_or_else(mismatch)?;
            for (i, item) in items.iter().enumerate() {
                if !item.is_string() {
                    return Err(SchemaViolation::new(
                        format!("{path}[{i}]"),
                        "string",
                        kind_of(item),
                    ));
                }
            }
            Ok(())
        }
    }
}

fn reject_unknown_keys(
    object: &Map<String, Value>,
    is_known: impl Fn(&str) -> bool,
    path: &str,
) -> Result<(), SchemaViolation> {
    match object.keys().find(|key| !is_known(key.as_str())) {
        Some(key) => {
            let field_path = if path.is_empty() {
                key.clone()
            } else {
                format!("{path}.{key}")
            };
            Err(SchemaViolation::new(
                field_path,
                "no such field",
                "unknown field",
            ))
        }
        None => Ok(()),
    }
}

/// `YYYY-MM-DD` with zero-padded month and day, and a real calendar day.
pub fn is_calendar_date(s: &str) -> bool {
    s.len() == 10 && NaiveDate::parse_from_str(s, DATE_FORMAT).is_ok()
}

fn looks_like_email(s: &str) -> bool {
    match s.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !s.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

fn expected_for(kind: FieldKind) -> &'static str {
    match kind {
        Text => "string",
        Email => "email address",
        Date => "date as YYYY-MM-DD",
        TextList => "array of strings",
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Schema advertisement
// ────────────────────────────────────────────────────────────────────────────

/// JSON-Schema-style description of the résumé contract, embedded in prompts.
///
/// Nullable fields are listed as required: the model must emit them as `null`.
pub fn schema_description() -> Value {
    let mut properties = Map::new();
    for section in SECTIONS {
        let entry = entry_schema(section.fields);
        let schema = if section.many {
            json!({"type": "array", "items": entry})
        } else {
            entry
        };
        properties.insert(section.name.to_string(), schema);
    }

    json!({
        "title": "Resume",
        "type": "object",
        "additionalProperties": false,
        "required": SECTIONS.iter().map(|s| s.name).collect::<Vec<_>>(),
        "properties": properties,
    })
}

fn entry_schema(fields: &[FieldSpec]) -> Value {
    let mut properties = Map::new();
    for spec in fields {
        let mut schema = match spec.kind {
            Text => json!({"type": "string"}),
            Email => json!({"type": "string", "format": "email"}),
            Date => json!({"type": "string", "format": "date", "description": "YYYY-MM-DD"}),
            TextList => json!({"type": "array", "items": {"type": "string"}}),
        };
        if spec.presence == Nullable {
            schema["type"] = json!([schema["type"].clone(), "null"]);
        }
        properties.insert(spec.name.to_string(), schema);
    }

    json!({
        "type": "object",
        "additionalProperties": false,
        "required": fields.iter().map(|f| f.name).collect::<Vec<_>>(),
        "properties": properties,
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
