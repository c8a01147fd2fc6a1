use serde::Serialize;

use crate::{
    compatibility::{
        Candidate,
        CompatibilityFilter,
        MismatchPolicy,
        TypeTable,
    },
    entity::EntityKind,
    error::{Error, Result},
    preferences::PreferenceProfile,
    reasons,
    scoring::{Confidence, RelevanceScorer, ScoreBreakdown},
    text_util::truncate_chars,
    vector_index::VectorIndex,
};

/// Recommendations returned when the caller does not ask for a count.
pub const DEFAULT_TOP_K: usize = 20;

/// Search depth per requested recommendation, before filtering.
pub const SEARCH_MULTIPLIER: usize = 3;

/// Filtered candidates scored per requested recommendation.
pub const SCORING_MULTIPLIER: usize = 2;

const SUMMARY_CHARS: usize = 200;

const PROJECT_CALLS: &[EntityKind] = &[EntityKind::ProjectCall];

/// Everything about matching that is data rather than code.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchingConfig {
    pub type_table: TypeTable,
    pub mismatch_policy: MismatchPolicy,
}

/// Condensed view of a project call shown next to a recommendation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectSummary {
    pub summary: String,
    pub duration: String,
    pub location: String,
    pub budget: String,
    pub delivery: String,
    pub deadline: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub project_id: String,
    pub project_title: String,
    pub project_type: String,
    pub organization_name: String,
    pub match_score: f64,
    pub confidence: Confidence,
    pub match_reasons: Vec<String>,
    pub score_breakdown: ScoreBreakdown,
    pub project_summary: ProjectSummary,
}

/// Ranks project calls for a seeker already present in the index.
///
/// Holds the index by shared reference, so one engine can serve many
/// threads at once.
#[derive(Debug, Clone)]
pub struct MatchingEngine<'a> {
    index: &'a VectorIndex,
    config: MatchingConfig,
}

impl<'a> MatchingEngine<'a> {
    pub fn new(index: &'a VectorIndex, config: MatchingConfig) -> Self {
        Self { index, config }
    }

    pub fn index(&self) -> &'a VectorIndex {
        self.index
    }

    /// Up to `top_k` project calls for `seeker_id`, best first.
    ///
    /// 1. Look up the seeker's stored vector and record
    /// 2. Search `top_k * SEARCH_MULTIPLIER` project calls
    /// 3. Drop inactive projects, flag soft mismatches
    /// 4. Score the first `top_k * SCORING_MULTIPLIER` survivors
    /// 5. Sort by composite score (stable) and keep `top_k`
    pub fn find_recommendations(
        &self,
        seeker_id: &str,
        seeker_kind: EntityKind,
        top_k: usize,
    ) -> Result<Vec<Recommendation>> {
        if !seeker_kind.is_seeker() {
            return Err(Error::Config(format!(
                "{seeker_kind} entities cannot request recommendations"
            )));
        }
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let seeker = self.index.get(seeker_kind, seeker_id).ok_or_else(|| {
            Error::NotFound {
                kind: seeker_kind.as_str(),
                name: seeker_id.to_string(),
            }
        })?;
        let profile = PreferenceProfile::extract(seeker.record);

        let hits = self.index.search(
            seeker.vector,
            top_k.saturating_mul(SEARCH_MULTIPLIER),
            Some(PROJECT_CALLS),
        )?;
        if hits.is_empty() {
            tracing::debug!(seeker = seeker_id, "no similar projects");
            return Ok(Vec::new());
        }
        let similar = hits.len();

        let filter = CompatibilityFilter::new(
            &self.config.type_table,
            self.config.mismatch_policy,
        );
        let candidates = filter.filter(hits, &profile);
        let scorer = RelevanceScorer::new(&self.config.type_table);

        let mut recommendations: Vec<Recommendation> = candidates
            .iter()
            .take(top_k.saturating_mul(SCORING_MULTIPLIER))
            .map(|candidate| recommend(&scorer, candidate, &profile))
            .collect();

        recommendations
            .sort_by(|a, b| b.match_score.total_cmp(&a.match_score));
        recommendations.truncate(top_k);

        tracing::debug!(
            seeker = seeker_id,
            kind = %seeker_kind,
            similar,
            compatible = candidates.len(),
            returned = recommendations.len(),
            "computed recommendations"
        );
        Ok(recommendations)
    }
}

fn recommend(
    scorer: &RelevanceScorer<'_>,
    candidate: &Candidate<'_>,
    profile: &PreferenceProfile,
) -> Recommendation {
    let scores = scorer.score(candidate, profile);
    let project = candidate.record();

    Recommendation {
        project_id: candidate.hit.id.to_string(),
        project_title: project.display_or("title", "Unknown"),
        project_type: project.display_or("type", "Unknown"),
        organization_name: project
            .nested_str("organization", "name")
            .unwrap_or("Unknown")
            .to_string(),
        match_score: scores.final_score,
        confidence: Confidence::from_score(scores.final_score),
        match_reasons: reasons::generate(project, profile, &scores),
        score_breakdown: scores,
        project_summary: ProjectSummary {
            summary: truncate_chars(
                project.str_field("summary").unwrap_or(""),
                SUMMARY_CHARS,
            )
            .to_string(),
            duration: project.display_or("duration", "Unknown"),
            location: project.display_or("location", "Unknown"),
            budget: project.display_or("budget", "Not specified"),
            delivery: project.display_or("delivery", "Unknown"),
            deadline: project.display_or("deadline", "Not specified"),
        },
    }
}
