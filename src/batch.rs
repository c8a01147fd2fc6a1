use std::{
    io::{BufWriter, Write},
    path::Path,
    time::{SystemTime, UNIX_EPOCH},
};

use rayon::prelude::*;
use serde::Serialize;

use crate::{
    engine::{MatchingEngine, Recommendation},
    entity::EntityKind,
    error::Result,
    scoring::Confidence,
    text_util::round3,
};

/// Recommendations for every seeker in the index, ready to serve as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub metadata: ReportMetadata,
    pub recommendations: SeekerReports,
    pub statistics: BatchStatistics,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    /// Unix seconds.
    pub generated_at: u64,
    pub embedder: String,
    pub embedding_dimension: usize,
    pub total_individuals: usize,
    pub total_organizations: usize,
    pub total_projects: usize,
    pub top_k_per_entity: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SeekerReports {
    pub individuals: Vec<SeekerReport>,
    pub organizations: Vec<SeekerReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeekerReport {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub seeker_type: String,
    pub location: String,
    pub recommendations: Vec<RankedRecommendation>,
    pub match_count: usize,
    pub has_matches: bool,
}

/// A recommendation with its 1-based rank and scores rounded to three
/// decimals.
#[derive(Debug, Clone, Serialize)]
pub struct RankedRecommendation {
    pub rank: usize,
    #[serde(flatten)]
    pub recommendation: Recommendation,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchStatistics {
    pub individuals_with_matches: usize,
    pub organizations_with_matches: usize,
    pub total_matches_generated: usize,
    pub avg_match_score: f64,
    pub high_confidence_matches: usize,
    pub medium_confidence_matches: usize,
    pub low_confidence_matches: usize,
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

fn rounded(mut rec: Recommendation) -> Recommendation {
    rec.match_score = round3(rec.match_score);
    let b = &mut rec.score_breakdown;
    b.final_score = round3(b.final_score);
    b.semantic = round3(b.semantic);
    b.type_match = round3(b.type_match);
    b.type_alignment = round3(b.type_alignment);
    b.delivery = round3(b.delivery);
    b.duration = round3(b.duration);
    rec
}

/// Raw recommendations for each seeker of `kind`, computed in parallel and
/// returned in index order.
fn recommend_all(
    engine: &MatchingEngine<'_>,
    kind: EntityKind,
    top_k: usize,
) -> Result<Vec<(SeekerReport, Vec<f64>)>> {
    let seekers: Vec<_> = engine.index().entities(kind).collect();

    seekers
        .par_iter()
        .map(|seeker| {
            let recs = engine.find_recommendations(seeker.id, kind, top_k)?;
            let scores: Vec<f64> =
                recs.iter().map(|r| r.match_score).collect();
            let ranked: Vec<RankedRecommendation> = recs
                .into_iter()
                .enumerate()
                .map(|(i, rec)| RankedRecommendation {
                    rank: i + 1,
                    recommendation: rounded(rec),
                })
                .collect();

            let report = SeekerReport {
                id: seeker.id.to_string(),
                name: seeker
                    .record
                    .name(kind)
                    .unwrap_or("Unknown")
                    .to_string(),
                seeker_type: seeker.record.display_or("type", "Unknown"),
                location: seeker.record.display_or("location", "Unknown"),
                match_count: ranked.len(),
                has_matches: !ranked.is_empty(),
                recommendations: ranked,
            };
            Ok((report, scores))
        })
        .collect()
}

/// Run the engine for every individual and organization in its index.
pub fn generate(
    engine: &MatchingEngine<'_>,
    embedder: &str,
    top_k: usize,
) -> Result<BatchReport> {
    let stats = engine.index().stats();
    let count = |kind: EntityKind| {
        stats.kind_counts.get(&kind).copied().unwrap_or(0)
    };

    let individuals = recommend_all(engine, EntityKind::Individual, top_k)?;
    let organizations =
        recommend_all(engine, EntityKind::Organization, top_k)?;

    let mut statistics = BatchStatistics::default();
    let mut all_scores: Vec<f64> = Vec::new();
    for (report, scores) in individuals.iter().chain(&organizations) {
        for rec in &report.recommendations {
            match rec.recommendation.confidence {
                Confidence::High => statistics.high_confidence_matches += 1,
                Confidence::Medium => {
                    statistics.medium_confidence_matches += 1
                }
                Confidence::Low => statistics.low_confidence_matches += 1,
            }
        }
        statistics.total_matches_generated += report.match_count;
        all_scores.extend(scores);
    }
    statistics.individuals_with_matches =
        individuals.iter().filter(|(r, _)| r.has_matches).count();
    statistics.organizations_with_matches =
        organizations.iter().filter(|(r, _)| r.has_matches).count();
    if !all_scores.is_empty() {
        statistics.avg_match_score =
            round3(all_scores.iter().sum::<f64>() / all_scores.len() as f64);
    }

    let report = BatchReport {
        metadata: ReportMetadata {
            generated_at: unix_now(),
            embedder: embedder.to_string(),
            embedding_dimension: stats.dimension,
            total_individuals: count(EntityKind::Individual),
            total_organizations: count(EntityKind::Organization),
            total_projects: count(EntityKind::ProjectCall),
            top_k_per_entity: top_k,
        },
        recommendations: SeekerReports {
            individuals: individuals.into_iter().map(|(r, _)| r).collect(),
            organizations: organizations
                .into_iter()
                .map(|(r, _)| r)
                .collect(),
        },
        statistics,
    };

    tracing::info!(
        individuals = report.recommendations.individuals.len(),
        organizations = report.recommendations.organizations.len(),
        matches = report.statistics.total_matches_generated,
        "generated batch recommendations"
    );
    Ok(report)
}

/// Write `report` as pretty JSON, creating parent directories.
pub fn write_report(report: &BatchReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(std::fs::File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, report)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::{
        engine::MatchingConfig,
        vector_index::{IndexEntry, VectorIndex},
    };

    fn entry(id: &str, kind: EntityKind, v: &[f32], r: Value) -> IndexEntry {
        IndexEntry {
            id: id.to_string(),
            kind,
            vector: v.to_vec(),
            record: serde_json::from_value(r).unwrap(),
        }
    }

    fn index() -> VectorIndex {
        let mut index = VectorIndex::new(2);
        index
            .add(vec![
                entry(
                    "i1",
                    EntityKind::Individual,
                    &[1.0, 0.0],
                    json!({"fullName": "Ana", "type": "researcher"}),
                ),
                entry(
                    "i2",
                    EntityKind::Individual,
                    &[0.0, 1.0],
                    json!({"fullName": "Bo", "location": "romania"}),
                ),
                entry(
                    "o1",
                    EntityKind::Organization,
                    &[1.0, 1.0],
                    json!({"name": "Acme", "type": "startup"}),
                ),
                entry(
                    "p1",
                    EntityKind::ProjectCall,
                    &[1.0, 0.1],
                    json!({"title": "Grant", "status": "active"}),
                ),
                entry(
                    "p2",
                    EntityKind::ProjectCall,
                    &[0.7, 0.7],
                    json!({"title": "Closed", "status": "cancelled"}),
                ),
            ])
            .unwrap();
        index
    }

    #[test]
    fn report_covers_every_seeker() {
        let index = index();
        let engine = MatchingEngine::new(&index, MatchingConfig::default());
        let report = generate(&engine, "hash", 3).unwrap();

        assert_eq!(report.metadata.embedder, "hash");
        assert_eq!(report.metadata.embedding_dimension, 2);
        assert_eq!(report.metadata.total_individuals, 2);
        assert_eq!(report.metadata.total_organizations, 1);
        assert_eq!(report.metadata.total_projects, 2);
        assert_eq!(report.metadata.top_k_per_entity, 3);

        let ids: Vec<_> = report
            .recommendations
            .individuals
            .iter()
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(ids, ["i1", "i2"]);
        assert_eq!(report.recommendations.organizations[0].name, "Acme");

        // Only p1 is active.
        for seeker in report
            .recommendations
            .individuals
            .iter()
            .chain(&report.recommendations.organizations)
        {
            assert_eq!(seeker.match_count, 1);
            assert!(seeker.has_matches);
            assert_eq!(seeker.recommendations[0].rank, 1);
            assert_eq!(seeker.recommendations[0].recommendation.project_id, "p1");
        }

        let stats = &report.statistics;
        assert_eq!(stats.individuals_with_matches, 2);
        assert_eq!(stats.organizations_with_matches, 1);
        assert_eq!(stats.total_matches_generated, 3);
        assert_eq!(
            stats.high_confidence_matches
                + stats.medium_confidence_matches
                + stats.low_confidence_matches,
            3
        );
        assert!(stats.avg_match_score > 0.0 && stats.avg_match_score <= 1.0);
    }

    #[test]
    fn scores_are_rounded() {
        let index = index();
        let engine = MatchingEngine::new(&index, MatchingConfig::default());
        let report = generate(&engine, "hash", 3).unwrap();

        let rec = &report.recommendations.individuals[1].recommendations[0];
        let score = rec.recommendation.match_score;
        assert_eq!(score, round3(score));
        assert_eq!(
            rec.recommendation.score_breakdown.semantic,
            round3(rec.recommendation.score_breakdown.semantic)
        );
    }

    #[test]
    fn seeker_fields_default_to_unknown() {
        let index = index();
        let engine = MatchingEngine::new(&index, MatchingConfig::default());
        let report = generate(&engine, "hash", 1).unwrap();

        let bo = &report.recommendations.individuals[1];
        assert_eq!(bo.name, "Bo");
        assert_eq!(bo.seeker_type, "Unknown");
        assert_eq!(bo.location, "romania");
    }

    #[test]
    fn seeker_names_follow_record_kind() {
        let mut index = VectorIndex::new(2);
        index
            .add(vec![
                entry(
                    "i1",
                    EntityKind::Individual,
                    &[1.0, 0.0],
                    json!({"name": "Cy"}),
                ),
                entry("i2", EntityKind::Individual, &[0.0, 1.0], json!({})),
                entry(
                    "o1",
                    EntityKind::Organization,
                    &[1.0, 1.0],
                    json!({"fullName": "Not an org name"}),
                ),
            ])
            .unwrap();
        let engine = MatchingEngine::new(&index, MatchingConfig::default());
        let report = generate(&engine, "hash", 1).unwrap();

        let individuals = &report.recommendations.individuals;
        assert_eq!(individuals[0].name, "Cy");
        assert_eq!(individuals[1].name, "Unknown");
        assert_eq!(report.recommendations.organizations[0].name, "Unknown");
    }

    #[test]
    fn json_shape() {
        let index = index();
        let engine = MatchingEngine::new(&index, MatchingConfig::default());
        let report = generate(&engine, "hash", 2).unwrap();

        let value = serde_json::to_value(&report).unwrap();
        let first = &value["recommendations"]["individuals"][0];
        assert_eq!(first["type"], "researcher");
        assert_eq!(first["recommendations"][0]["rank"], 1);
        assert_eq!(first["recommendations"][0]["project_id"], "p1");
        assert!(
            first["recommendations"][0]["score_breakdown"]
                ["semantic_similarity"]
                .is_number()
        );
        assert!(value["metadata"]["generated_at"].as_u64().unwrap() > 0);
    }

    #[test]
    fn write_report_creates_parents() {
        let tmp = tempfile::tempdir().unwrap();
        let index = index();
        let engine = MatchingEngine::new(&index, MatchingConfig::default());
        let report = generate(&engine, "hash", 2).unwrap();

        let path = tmp.path().join("output").join("recommendations.json");
        write_report(&report, &path).unwrap();

        let parsed: Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap())
                .unwrap();
        assert_eq!(parsed["statistics"]["total_matches_generated"], 3);
    }

    #[test]
    fn empty_seekers_give_zero_average() {
        let mut index = VectorIndex::new(2);
        index
            .add(vec![entry(
                "p1",
                EntityKind::ProjectCall,
                &[1.0, 0.0],
                json!({}),
            )])
            .unwrap();
        let engine = MatchingEngine::new(&index, MatchingConfig::default());
        let report = generate(&engine, "hash", 5).unwrap();

        assert!(report.recommendations.individuals.is_empty());
        assert_eq!(report.statistics, BatchStatistics::default());
    }
}
