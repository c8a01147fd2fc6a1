use std::io::Write;

use serde::Serialize;

use crate::{
    engine::Recommendation,
    entity::EntityKind,
    error::Result,
    text_util::truncate_chars,
};

const REASON_PREVIEW_CHARS: usize = 100;

#[derive(Serialize)]
struct RecommendationsJson<'a> {
    seeker_id: &'a str,
    seeker_kind: EntityKind,
    result_count: usize,
    recommendations: &'a [Recommendation],
}

/// Ranked list for a terminal.
pub fn write_human(
    out: &mut impl Write,
    recs: &[Recommendation],
) -> Result<()> {
    if recs.is_empty() {
        writeln!(out, "No recommendations found.")?;
        return Ok(());
    }

    for (i, rec) in recs.iter().enumerate() {
        writeln!(
            out,
            "{:>3}. [{:.3} {}] {} #{}",
            i + 1,
            rec.match_score,
            rec.confidence,
            rec.project_title,
            rec.project_id
        )?;
        writeln!(
            out,
            "     {} | {}",
            rec.organization_name, rec.project_type
        )?;
        for reason in &rec.match_reasons {
            writeln!(
                out,
                "     - {}",
                truncate_chars(reason, REASON_PREVIEW_CHARS)
            )?;
        }
    }
    writeln!(out, "\n{} recommendation(s)", recs.len())?;
    Ok(())
}

pub fn write_json(
    out: &mut impl Write,
    seeker_id: &str,
    seeker_kind: EntityKind,
    recs: &[Recommendation],
) -> Result<()> {
    let payload = RecommendationsJson {
        seeker_id,
        seeker_kind,
        result_count: recs.len(),
        recommendations: recs,
    };
    serde_json::to_writer_pretty(&mut *out, &payload)?;
    writeln!(out)?;
    Ok(())
}
