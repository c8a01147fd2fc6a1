use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::Value;

use crate::entity::{Record, is_truthy};

/// What a seeker says they are looking for.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SeekingTag {
    Collaboration,
    Research,
    Grant,
    Funding,
    Consulting,
    Opportunity,
}

/// Preference flag -> tags it implies.
const PREFERENCE_FLAGS: &[(&str, &[SeekingTag])] = &[
    ("collaborations", &[SeekingTag::Collaboration]),
    (
        "grantFundedProjects",
        &[SeekingTag::Research, SeekingTag::Grant],
    ),
    ("funding", &[SeekingTag::Funding]),
    ("consulting", &[SeekingTag::Consulting]),
    ("opportunities", &[SeekingTag::Opportunity]),
];

pub const DEFAULT_LOCATION: &str = "any";
pub const DEFAULT_DECLARED_TYPE: &str = "unknown";

/// Normalized view of a seeker record used by filtering and scoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreferenceProfile {
    pub seeking: BTreeSet<SeekingTag>,
    pub location: String,
    pub declared_type: String,
    pub skills: Vec<String>,
    pub expertise: Vec<String>,
}

impl PreferenceProfile {
    /// Derive a profile from a seeker's raw record.
    pub fn extract(record: &Record) -> Self {
        let mut seeking = BTreeSet::new();
        if let Some(prefs) = record.get("preferences") {
            for (flag, tags) in PREFERENCE_FLAGS {
                if prefs.get(*flag).is_some_and(is_truthy) {
                    seeking.extend(tags.iter().copied());
                }
            }
        }

        let expertise = match record.get("areasOfExpertise") {
            Some(areas) => labels(Some(areas), "industry"),
            None => labels(
                record
                    .get("areasOfInterest")
                    .or_else(|| record.get("areasOfInterests")),
                "industry",
            ),
        };

        Self {
            seeking,
            location: record
                .str_field("location")
                .unwrap_or(DEFAULT_LOCATION)
                .to_string(),
            declared_type: record
                .str_field("type")
                .unwrap_or(DEFAULT_DECLARED_TYPE)
                .to_string(),
            skills: labels(record.get("skills"), "skill"),
            expertise,
        }
    }

    pub fn seeks(&self, tag: SeekingTag) -> bool {
        self.seeking.contains(&tag)
    }

    /// Declared types such as `student/early-career` get student-specific
    /// duration handling.
    pub fn is_student(&self) -> bool {
        self.declared_type.contains("student")
    }
}

/// Collect `items[].key` (or plain string items), skipping empty values.
fn labels(items: Option<&Value>, key: &str) -> Vec<String> {
    let Some(Value::Array(items)) = items else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.as_str()),
            Value::Object(fields) => fields.get(key).and_then(Value::as_str),
            _ => None,
        })
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
