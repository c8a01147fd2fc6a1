//! Canonical text for each entity, fed to the embedding provider.
//!
//! Output is a deterministic `" | "`-joined list of labelled segments.
//! Free-text fields are included only when they carry more than a few
//! characters, and are clipped so that long descriptions do not drown out
//! the structured fields.

use crate::{
    entity::{Entity, EntityKind, Record},
    preferences::{PreferenceProfile, SeekingTag},
    text_util::{join_or, single_line, truncate_chars},
};

const MIN_FREE_TEXT_CHARS: usize = 10;

/// Produce the embedding text for an entity.
pub fn describe(entity: &Entity) -> String {
    match entity.kind {
        EntityKind::Individual => describe_individual(&entity.record),
        EntityKind::Organization => describe_organization(&entity.record),
        EntityKind::ProjectCall => describe_project(&entity.record),
    }
}

fn describe_individual(r: &Record) -> String {
    let profile = PreferenceProfile::extract(r);
    let name = r.first_str(&["fullName", "full_name"]).unwrap_or("Unknown");

    let mut parts = vec![
        format!("Profile: {name}"),
        format!("Role: {}", r.display_or("title", "Unknown")),
        format!("Type: {}", r.display_or("type", "Unknown")),
    ];
    push_free_text(&mut parts, "Bio", r.str_field("bio"), 200);
    parts.extend([
        format!("Skills: {}", join_or(&profile.skills, "Not specified")),
        format!(
            "Expertise: {}",
            join_or(&profile.expertise, "Not specified")
        ),
        format!("Location: {}", r.display_or("location", "Unknown")),
        format!("Availability: {}", r.display_or("availability", "Unknown")),
        format!(
            "Seeking: {}",
            seeking_text(&profile, &INDIVIDUAL_SEEKING, "open to opportunities")
        ),
    ]);
    if let Some(degree) = r
        .nested_str("education", "degree")
        .filter(|d| !d.is_empty())
    {
        parts.push(format!("Education: {degree}"));
    }

    parts.join(" | ")
}

fn describe_organization(r: &Record) -> String {
    let profile = PreferenceProfile::extract(r);

    let mut parts = vec![
        format!("Organization: {}", r.display_or("name", "Unknown")),
        format!("Type: {}", r.display_or("type", "Unknown")),
        format!("Industry: {}", r.display_or("industry", "Unknown")),
        format!("Size: {}", r.display_or("teamSize", "Unknown")),
        format!("Location: {}", r.display_or("location", "Unknown")),
    ];
    push_free_text(&mut parts, "Description", r.str_field("description"), 300);
    parts.extend([
        format!(
            "Interests: {}",
            join_or(&profile.expertise, "Not specified")
        ),
        format!(
            "Seeking: {}",
            seeking_text(
                &profile,
                &ORGANIZATION_SEEKING,
                "open to partnerships"
            )
        ),
    ]);

    parts.join(" | ")
}

fn describe_project(r: &Record) -> String {
    let mut parts = vec![
        format!("Project: {}", r.display_or("title", "Unknown")),
        format!("Type: {}", r.display_or("type", "Unknown")),
        format!("Duration: {}", r.display_or("duration", "Unknown")),
        format!("Location: {}", r.display_or("location", "Unknown")),
        format!("Delivery: {}", r.display_or("delivery", "Unknown")),
    ];

    let budget = r.display_or("budget", "Not specified");
    if budget != "Not specified" {
        parts.push(format!("Budget: {budget}"));
    }
    push_free_text(&mut parts, "Summary", r.str_field("summary"), 400);
    push_free_text(
        &mut parts,
        "Requirements",
        r.str_field("requirements"),
        300,
    );
    push_free_text(&mut parts, "Target", r.str_field("whoShouldApply"), 200);

    parts.extend([
        format!(
            "Applicant Types: {}",
            join_or(&r.applicant_types(), "All applicants")
        ),
        format!(
            "Organization: {}",
            r.nested_str("organization", "name")
                .unwrap_or("Unknown Organization")
        ),
        format!(
            "Industry: {}",
            r.nested_str("organization", "industry").unwrap_or("Unknown")
        ),
    ]);

    parts.join(" | ")
}

type SeekingLabels = [(SeekingTag, &'static str); 5];

const INDIVIDUAL_SEEKING: SeekingLabels = [
    (SeekingTag::Collaboration, "collaborations"),
    (SeekingTag::Grant, "grant-funded projects"),
    (SeekingTag::Funding, "funding opportunities"),
    (SeekingTag::Consulting, "consulting work"),
    (SeekingTag::Opportunity, "career opportunities"),
];

const ORGANIZATION_SEEKING: SeekingLabels = [
    (SeekingTag::Collaboration, "collaborations"),
    (SeekingTag::Grant, "grant-funded projects"),
    (SeekingTag::Funding, "funding opportunities"),
    (SeekingTag::Consulting, "consulting services"),
    (SeekingTag::Opportunity, "partnership opportunities"),
];

fn seeking_text(
    profile: &PreferenceProfile,
    labels: &SeekingLabels,
    fallback: &str,
) -> String {
    let wanted: Vec<&str> = labels
        .iter()
        .filter(|(tag, _)| profile.seeks(*tag))
        .map(|(_, label)| *label)
        .collect();
    join_or(&wanted, fallback)
}

fn push_free_text(
    parts: &mut Vec<String>,
    label: &str,
    text: Option<&str>,
    max_chars: usize,
) {
    let Some(text) = text else { return };
    let text = single_line(text);
    if text.chars().count() > MIN_FREE_TEXT_CHARS {
        parts.push(format!("{label}: {}", truncate_chars(&text, max_chars)));
    }
}
