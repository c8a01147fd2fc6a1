use std::fmt;

use serde::Serialize;

use crate::{
    compatibility::{Candidate, TypeTable, is_remote_delivery},
    preferences::{PreferenceProfile, SeekingTag},
};

/// Composite score weights. Fields sum to 1.0.
pub const RELEVANCE_WEIGHTS: Weights = Weights {
    semantic: 0.40,
    type_match: 0.25,
    type_alignment: 0.20,
    delivery: 0.10,
    duration: 0.05,
};

pub const HIGH_CONFIDENCE: f64 = 0.7;
pub const MEDIUM_CONFIDENCE: f64 = 0.5;

const TYPE_MISMATCH_PENALTY: f64 = 0.6;
const LOCATION_MISMATCH_PENALTY: f64 = 0.7;

#[derive(Debug, Clone, Copy)]
pub struct Weights {
    pub semantic: f64,
    pub type_match: f64,
    pub type_alignment: f64,
    pub delivery: f64,
    pub duration: f64,
}

impl Weights {
    pub fn sum(&self) -> f64 {
        self.semantic
            + self.type_match
            + self.type_alignment
            + self.delivery
            + self.duration
    }
}

/// Per-factor scores for one candidate, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub final_score: f64,
    #[serde(rename = "semantic_similarity")]
    pub semantic: f64,
    #[serde(rename = "applicant_type_match")]
    pub type_match: f64,
    #[serde(rename = "project_type_alignment")]
    pub type_alignment: f64,
    #[serde(rename = "delivery_compatibility")]
    pub delivery: f64,
    #[serde(rename = "duration_fit")]
    pub duration: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn from_score(score: f64) -> Self {
        if score > HIGH_CONFIDENCE {
            Confidence::High
        } else if score > MEDIUM_CONFIDENCE {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RelevanceScorer<'t> {
    table: &'t TypeTable,
    weights: Weights,
}

impl<'t> RelevanceScorer<'t> {
    pub fn new(table: &'t TypeTable) -> Self {
        Self {
            table,
            weights: RELEVANCE_WEIGHTS,
        }
    }

    pub fn score(
        &self,
        candidate: &Candidate<'_>,
        profile: &PreferenceProfile,
    ) -> ScoreBreakdown {
        let project = candidate.record();
        let semantic = f64::from(candidate.similarity()).clamp(0.0, 1.0);

        let preferred = self
            .table
            .prefers(&profile.declared_type, &candidate.applicant_types);
        let mut type_match = if preferred { 1.0 } else { 0.8 };
        if candidate.flags.type_mismatch {
            type_match *= TYPE_MISMATCH_PENALTY;
        }

        let delivery_mode =
            project.str_field("delivery").unwrap_or("in-person");
        let mut delivery = if is_remote_delivery(delivery_mode) {
            0.9
        } else {
            0.7
        };
        if candidate.flags.location_mismatch {
            delivery *= LOCATION_MISMATCH_PENALTY;
        }

        let duration = match project.str_field("duration") {
            Some("short-term") if profile.is_student() => 1.0,
            Some("medium-term") if profile.is_student() => 0.9,
            _ => 0.8,
        };

        let project_type = project.str_field("type").unwrap_or("unknown");
        let type_alignment = type_alignment(profile, project_type);

        let w = &self.weights;
        let final_score = semantic * w.semantic
            + type_match * w.type_match
            + type_alignment * w.type_alignment
            + delivery * w.delivery
            + duration * w.duration;

        ScoreBreakdown {
            final_score,
            semantic,
            type_match,
            type_alignment,
            delivery,
            duration,
        }
    }
}

fn type_alignment(profile: &PreferenceProfile, project_type: &str) -> f64 {
    if profile.seeks(SeekingTag::Research)
        && project_type.contains("funding-opportunity")
    {
        1.0
    } else if profile.seeks(SeekingTag::Grant)
        && (project_type.contains("fellowship")
            || project_type.contains("funding"))
    {
        1.0
    } else if profile.seeks(SeekingTag::Collaboration) {
        0.9
    } else if profile.seeks(SeekingTag::Funding)
        && project_type.contains("funding")
    {
        0.9
    } else {
        0.7
    }
}
