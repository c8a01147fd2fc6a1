use crate::{
    compatibility::is_remote_delivery,
    entity::Record,
    preferences::PreferenceProfile,
    scoring::ScoreBreakdown,
};

pub const MAX_REASONS: usize = 4;

/// Declared types that get organization-flavored wording.
const ORGANIZATIONAL_TYPES: &[&str] =
    &["publicInstitution", "startup", "privateOrganisation"];

const FALLBACK_REASON: &str = "Matches your profile";

/// Explain a scored match in at most [`MAX_REASONS`] short sentences,
/// most important first.
pub fn generate(
    project: &Record,
    profile: &PreferenceProfile,
    scores: &ScoreBreakdown,
) -> Vec<String> {
    let mut reasons: Vec<&'static str> = Vec::new();

    if scores.semantic > 0.7 {
        reasons.push("Strong skill and expertise alignment");
    } else if scores.semantic > 0.5 {
        reasons.push("Good skill compatibility");
    }

    if scores.type_match >= 1.0 {
        if ORGANIZATIONAL_TYPES.contains(&profile.declared_type.as_str()) {
            reasons.push("Perfect organizational fit");
        } else {
            reasons.push("Perfect fit for your profile");
        }
    } else if scores.type_match > 0.6 {
        reasons.push("Compatible applicant profile");
    }

    if scores.type_alignment >= 1.0 {
        reasons.push("Matches your stated preferences");
    } else if scores.type_alignment > 0.8 {
        reasons.push("Aligns with your interests");
    }

    if project.str_field("delivery").is_some_and(is_remote_delivery) {
        reasons.push("Flexible delivery options available");
    }

    if profile.is_student()
        && project.str_field("duration") == Some("short-term")
    {
        reasons.push("Good duration for student schedule");
    }

    if has_budget(project) {
        reasons.push("Funded opportunity");
    }

    if reasons.is_empty() {
        reasons.push(FALLBACK_REASON);
    }

    reasons.truncate(MAX_REASONS);
    reasons.into_iter().map(str::to_string).collect()
}

fn has_budget(project: &Record) -> bool {
    match project.get("budget") {
        Some(serde_json::Value::String(s)) => {
            !s.is_empty() && s != "Not specified"
        }
        Some(value) => crate::entity::is_truthy(value),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;

    fn record(value: Value) -> Record {
        serde_json::from_value(value).unwrap()
    }

    fn scores(
        semantic: f64,
        type_match: f64,
        type_alignment: f64,
    ) -> ScoreBreakdown {
        ScoreBreakdown {
            final_score: 0.0,
            semantic,
            type_match,
            type_alignment,
            delivery: 0.7,
            duration: 0.8,
        }
    }

    #[test]
    fn fallback_when_nothing_stands_out() {
        let profile = PreferenceProfile::extract(&record(json!({})));
        let reasons =
            generate(&Record::default(), &profile, &scores(0.1, 0.48, 0.7));
        assert_eq!(reasons, vec!["Matches your profile"]);
    }

    #[test]
    fn ordered_and_capped_at_four() {
        let profile = PreferenceProfile::extract(&record(json!({
            "type": "student/early-career"
        })));
        let project = record(json!({
            "delivery": "hybrid",
            "duration": "short-term",
            "budget": "10000 EUR"
        }));

        let reasons = generate(&project, &profile, &scores(0.9, 1.0, 1.0));
        assert_eq!(
            reasons,
            vec![
                "Strong skill and expertise alignment",
                "Perfect fit for your profile",
                "Matches your stated preferences",
                "Flexible delivery options available",
            ]
        );
    }

    #[test]
    fn organizational_wording() {
        let profile = PreferenceProfile::extract(&record(json!({
            "type": "privateOrganisation"
        })));
        let reasons =
            generate(&Record::default(), &profile, &scores(0.6, 1.0, 0.9));
        assert_eq!(
            reasons,
            vec![
                "Good skill compatibility",
                "Perfect organizational fit",
                "Aligns with your interests",
            ]
        );
    }

    #[test]
    fn middle_tiers() {
        let profile = PreferenceProfile::extract(&record(json!({
            "type": "student"
        })));
        let project = record(json!({"duration": "short-term", "budget": 5000}));
        let reasons = generate(&project, &profile, &scores(0.3, 0.8, 0.7));
        assert_eq!(
            reasons,
            vec![
                "Compatible applicant profile",
                "Good duration for student schedule",
                "Funded opportunity",
            ]
        );
    }

    #[test]
    fn placeholder_budget_is_not_funding() {
        let profile = PreferenceProfile::extract(&record(json!({})));
        for budget in [json!("Not specified"), json!(""), json!(null), json!(0)]
        {
            let project = record(json!({"budget": budget}));
            let reasons =
                generate(&project, &profile, &scores(0.0, 0.48, 0.7));
            assert_eq!(reasons, vec!["Matches your profile"]);
        }
    }
}
