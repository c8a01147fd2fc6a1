use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::{
    entity::Record,
    error::{Error, Result},
    preferences::PreferenceProfile,
    vector_index::SearchHit,
};

/// Current layout version of [`TypeTable`] documents.
pub const TYPE_TABLE_VERSION: u32 = 1;

/// Location values that match any other location.
pub const FLEXIBLE_LOCATIONS: &[&str] = &["other", "any"];

/// Delivery modes that make location irrelevant.
pub const REMOTE_DELIVERY: &[&str] = &["online-virtual", "hybrid"];

const DEFAULT_PROJECT_LOCATION: &str = "any";
const DEFAULT_DELIVERY: &str = "in-person";

const COMPATIBLE: &[(&str, &[&str])] = &[
    (
        "student/early-career",
        &["student", "student/early-career", "early-career"],
    ),
    (
        "professional/consultant",
        &["professional", "consultant", "professional/consultant"],
    ),
    (
        "researcher/academic",
        &[
            "professional",
            "research",
            "researcher",
            "academic",
            "academic_institution",
        ],
    ),
    (
        "entrepreneur/inovator",
        &["entrepreneur", "startup", "company", "inovator"],
    ),
    (
        "privateOrganisation",
        &["company", "startup", "entrepreneur", "organization", "private"],
    ),
    (
        "publicInstitution",
        &[
            "professional",
            "research",
            "academic_institution",
            "government_agency",
            "public",
            "institution",
        ],
    ),
    ("startup", &["startup", "company", "entrepreneur", "organization"]),
    ("non_profit", &["non_profit", "ngo", "organization", "nonprofit"]),
    ("professional", &["professional", "consultant"]),
    ("student", &["student", "early-career"]),
    (
        "research_center",
        &["research_center", "research", "academic_institution"],
    ),
    ("company", &["company", "startup", "entrepreneur", "organization"]),
    ("entrepreneur", &["entrepreneur", "startup", "company"]),
    ("research", &["research", "researcher", "academic"]),
    ("government_agency", &["government_agency", "public", "institution"]),
    (
        "academic_institution",
        &["academic_institution", "research", "university"],
    ),
];

const PREFERRED: &[(&str, &[&str])] = &[
    ("professional/consultant", &["professional"]),
    ("student/early-career", &["student"]),
    (
        "researcher/academic",
        &["professional", "research", "academic_institution"],
    ),
    ("entrepreneur/inovator", &["entrepreneur", "startup", "company"]),
    (
        "publicInstitution",
        &["research", "academic_institution", "professional"],
    ),
    (
        "privateOrganisation",
        &["company", "startup", "entrepreneur", "organization"],
    ),
    ("startup", &["startup", "company", "entrepreneur"]),
];

const FALLBACK: &[&str] = &["professional", "student", "organization"];

/// Declared seeker type -> applicant types, as data.
///
/// `compatible` decides the type-mismatch flag. `preferred` lists the
/// applicant types that make a project a perfect fit for a declared type.
/// A declared type missing from `compatible` is matched against
/// `fallback` plus its own lowercased name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeTable {
    pub version: u32,
    pub compatible: BTreeMap<String, BTreeSet<String>>,
    pub preferred: BTreeMap<String, BTreeSet<String>>,
    pub fallback: BTreeSet<String>,
}

fn to_map(rows: &[(&str, &[&str])]) -> BTreeMap<String, BTreeSet<String>> {
    rows.iter()
        .map(|(key, values)| {
            (
                key.to_string(),
                values.iter().map(|v| v.to_string()).collect(),
            )
        })
        .collect()
}

impl Default for TypeTable {
    fn default() -> Self {
        Self {
            version: TYPE_TABLE_VERSION,
            compatible: to_map(COMPATIBLE),
            preferred: to_map(PREFERRED),
            fallback: FALLBACK.iter().map(|v| v.to_string()).collect(),
        }
    }
}

impl TypeTable {
    /// Parse and validate a JSON type table.
    pub fn from_json(json: &str) -> Result<Self> {
        let table: TypeTable = serde_json::from_str(json)?;
        if table.version != TYPE_TABLE_VERSION {
            return Err(Error::Config(format!(
                "unsupported type table version {} (expected \
                 {TYPE_TABLE_VERSION})",
                table.version
            )));
        }
        if table.fallback.is_empty() {
            return Err(Error::Config(
                "type table fallback set must not be empty".into(),
            ));
        }
        Ok(table)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Applicant types a seeker with `declared_type` is eligible for.
    pub fn compatible_types(&self, declared_type: &str) -> BTreeSet<String> {
        match self.compatible.get(declared_type) {
            Some(types) => types.clone(),
            None => {
                let mut types = self.fallback.clone();
                types.insert(declared_type.to_lowercase());
                types
            }
        }
    }

    /// Whether any of `applicant_types` is compatible with the seeker.
    pub fn accepts(
        &self,
        declared_type: &str,
        applicant_types: &[String],
    ) -> bool {
        let compatible = self.compatible_types(declared_type);
        applicant_types.iter().any(|t| compatible.contains(t))
    }

    /// Whether the project explicitly targets the seeker's declared type.
    pub fn prefers(
        &self,
        declared_type: &str,
        applicant_types: &[String],
    ) -> bool {
        self.preferred.get(declared_type).is_some_and(|preferred| {
            applicant_types.iter().any(|t| preferred.contains(t))
        })
    }
}

/// What to do with a candidate that fails both type and location checks.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum MismatchPolicy {
    /// Keep it; the scorer penalizes each mismatch.
    #[default]
    Penalize,
    /// Remove it from the candidate set.
    DropBoth,
}

impl MismatchPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            MismatchPolicy::Penalize => "penalize",
            MismatchPolicy::DropBoth => "drop-both",
        }
    }
}

impl fmt::Display for MismatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MismatchPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "penalize" => Ok(MismatchPolicy::Penalize),
            "drop-both" => Ok(MismatchPolicy::DropBoth),
            other => Err(Error::Config(format!(
                "unknown mismatch policy '{other}' (expected 'penalize' or \
                 'drop-both')"
            ))),
        }
    }
}

/// Soft mismatches recorded on a surviving candidate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MismatchFlags {
    pub type_mismatch: bool,
    pub location_mismatch: bool,
}

impl MismatchFlags {
    pub fn both(self) -> bool {
        self.type_mismatch && self.location_mismatch
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    Inactive { status: String },
    BothMismatched,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterOutcome {
    Active(MismatchFlags),
    Dropped(DropReason),
}

/// A project-call hit that survived filtering.
#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    pub hit: SearchHit<'a>,
    pub applicant_types: Vec<String>,
    pub flags: MismatchFlags,
}

impl Candidate<'_> {
    pub fn record(&self) -> &Record {
        self.hit.record
    }

    pub fn similarity(&self) -> f32 {
        self.hit.similarity
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CompatibilityFilter<'t> {
    table: &'t TypeTable,
    policy: MismatchPolicy,
}

impl<'t> CompatibilityFilter<'t> {
    pub fn new(table: &'t TypeTable, policy: MismatchPolicy) -> Self {
        Self { table, policy }
    }

    /// Classify one project record for this seeker.
    pub fn evaluate(
        &self,
        project: &Record,
        applicant_types: &[String],
        profile: &PreferenceProfile,
    ) -> FilterOutcome {
        let status = project.str_field("status").unwrap_or("");
        if !is_active(status) {
            return FilterOutcome::Dropped(DropReason::Inactive {
                status: status.to_string(),
            });
        }

        let flags = MismatchFlags {
            type_mismatch: !applicant_types.is_empty()
                && !self
                    .table
                    .accepts(&profile.declared_type, applicant_types),
            location_mismatch: !location_compatible(
                project,
                &profile.location,
            ),
        };

        if flags.both() && self.policy == MismatchPolicy::DropBoth {
            return FilterOutcome::Dropped(DropReason::BothMismatched);
        }
        FilterOutcome::Active(flags)
    }

    /// Annotate hits with mismatch flags, dropping those that fail a hard
    /// filter. Order is preserved.
    pub fn filter<'a>(
        &self,
        hits: Vec<SearchHit<'a>>,
        profile: &PreferenceProfile,
    ) -> Vec<Candidate<'a>> {
        let total = hits.len();
        let mut inactive = 0usize;
        let mut both = 0usize;

        let candidates: Vec<Candidate<'a>> = hits
            .into_iter()
            .filter_map(|hit| {
                let applicant_types = hit.record.applicant_types();
                match self.evaluate(hit.record, &applicant_types, profile) {
                    FilterOutcome::Active(flags) => Some(Candidate {
                        hit,
                        applicant_types,
                        flags,
                    }),
                    FilterOutcome::Dropped(DropReason::Inactive { .. }) => {
                        inactive += 1;
                        None
                    }
                    FilterOutcome::Dropped(DropReason::BothMismatched) => {
                        both += 1;
                        None
                    }
                }
            })
            .collect();

        tracing::debug!(
            total,
            kept = candidates.len(),
            inactive,
            both_mismatched = both,
            policy = %self.policy,
            "filtered candidates"
        );
        candidates
    }
}

fn is_active(status: &str) -> bool {
    status.is_empty() || status.eq_ignore_ascii_case("active")
}

pub fn is_remote_delivery(delivery: &str) -> bool {
    REMOTE_DELIVERY.contains(&delivery)
}

fn location_compatible(project: &Record, seeker_location: &str) -> bool {
    let project_location = project
        .str_field("location")
        .unwrap_or(DEFAULT_PROJECT_LOCATION);
    let delivery = project.str_field("delivery").unwrap_or(DEFAULT_DELIVERY);

    seeker_location == project_location
        || FLEXIBLE_LOCATIONS.contains(&seeker_location)
        || FLEXIBLE_LOCATIONS.contains(&project_location)
        || is_remote_delivery(delivery)
}
