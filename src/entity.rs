use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The three kinds of entity stored in the index.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Individual,
    Organization,
    ProjectCall,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [
        EntityKind::Individual,
        EntityKind::Organization,
        EntityKind::ProjectCall,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Individual => "individual",
            EntityKind::Organization => "organization",
            EntityKind::ProjectCall => "project_call",
        }
    }

    /// File name of this kind's records inside a dataset directory.
    pub fn dataset_file(self) -> &'static str {
        match self {
            EntityKind::Individual => "individuals.json",
            EntityKind::Organization => "organizations.json",
            EntityKind::ProjectCall => "project_calls.json",
        }
    }

    /// Whether entities of this kind can ask for recommendations.
    pub fn is_seeker(self) -> bool {
        !matches!(self, EntityKind::ProjectCall)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record field that exists but cannot be interpreted.
///
/// Never surfaced to callers: the reader that hits it logs it and falls
/// back to an empty value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedField {
    pub field: &'static str,
    pub reason: String,
}

/// The raw attribute record of an entity, kept as free-form JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    /// A string field, or `None` if absent or not a string.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// The first present string field among `keys`.
    pub fn first_str(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|key| self.str_field(key))
    }

    /// Human-readable name of a `kind` record: full name for individuals,
    /// name for organizations, title for project calls.
    pub fn name(&self, kind: EntityKind) -> Option<&str> {
        let keys: &[&str] = match kind {
            EntityKind::Individual => &["fullName", "full_name", "name"],
            EntityKind::Organization => &["name"],
            EntityKind::ProjectCall => &["title"],
        };
        self.first_str(keys)
    }

    /// A string field nested one object deep, e.g. `organization.name`.
    pub fn nested_str(&self, outer: &str, inner: &str) -> Option<&str> {
        self.get(outer)?.get(inner)?.as_str()
    }

    /// Render a scalar field for display, falling back to `default` when
    /// the field is absent, null, or structured.
    pub fn display_or(&self, key: &str, default: &str) -> String {
        match self.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            _ => default.to_string(),
        }
    }

    /// The list of applicant types this record declares eligible.
    ///
    /// Malformed encodings are recovered as an empty list.
    pub fn applicant_types(&self) -> Vec<String> {
        match self.try_applicant_types() {
            Ok(types) => types,
            Err(err) => {
                tracing::debug!(
                    field = err.field,
                    reason = %err.reason,
                    "ignoring malformed applicant types"
                );
                Vec::new()
            }
        }
    }

    /// Parse `applicantTypes` (or `applicant_types`), which may be a JSON
    /// list or a string holding a JSON-encoded list.
    pub fn try_applicant_types(
        &self,
    ) -> std::result::Result<Vec<String>, MalformedField> {
        let (field, value) = match self.get("applicantTypes") {
            Some(value) => ("applicantTypes", value),
            None => match self.get("applicant_types") {
                Some(value) => ("applicant_types", value),
                None => return Ok(Vec::new()),
            },
        };

        match value {
            Value::Null => Ok(Vec::new()),
            Value::Array(items) => Ok(string_items(items)),
            Value::String(encoded) => {
                match serde_json::from_str::<Value>(encoded) {
                    Ok(Value::Array(items)) => Ok(string_items(&items)),
                    Ok(other) => Err(MalformedField {
                        field,
                        reason: format!("expected a list, found {other}"),
                    }),
                    Err(e) => Err(MalformedField {
                        field,
                        reason: e.to_string(),
                    }),
                }
            }
            other => Err(MalformedField {
                field,
                reason: format!("expected a list, found {other}"),
            }),
        }
    }
}

fn string_items(items: &[Value]) -> Vec<String> {
    items
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect()
}

/// JSON truthiness: `true`, non-zero numbers, and non-empty strings,
/// arrays and objects.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// An entity record together with its identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub kind: EntityKind,
    pub record: Record,
}

impl Entity {
    pub fn new(id: impl Into<String>, kind: EntityKind, record: Record) -> Self {
        Self {
            id: id.into(),
            kind,
            record,
        }
    }
}
