use std::path::Path;

use rayon::prelude::*;
use serde_json::Value;

use crate::{
    entity::{Entity, EntityKind, Record},
    error::{Error, Result},
};

/// Entities loaded from a dataset directory, grouped by kind.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub individuals: Vec<Entity>,
    pub organizations: Vec<Entity>,
    pub project_calls: Vec<Entity>,
}

impl Dataset {
    pub fn of_kind(&self, kind: EntityKind) -> &[Entity] {
        match kind {
            EntityKind::Individual => &self.individuals,
            EntityKind::Organization => &self.organizations,
            EntityKind::ProjectCall => &self.project_calls,
        }
    }

    pub fn len(&self) -> usize {
        self.individuals.len()
            + self.organizations.len()
            + self.project_calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All entities: individuals, then organizations, then project calls.
    pub fn into_entities(self) -> Vec<Entity> {
        let mut all = self.individuals;
        all.extend(self.organizations);
        all.extend(self.project_calls);
        all
    }
}

/// Load `individuals.json`, `organizations.json` and `project_calls.json`
/// from `dir`.
///
/// A missing file leaves that kind empty. Records without a usable `id`
/// are skipped.
pub fn load_dataset(dir: &Path) -> Result<Dataset> {
    if !dir.is_dir() {
        return Err(Error::NotFound {
            kind: "dataset directory",
            name: dir.display().to_string(),
        });
    }

    // Files are independent, so parse them in parallel.
    let loaded: Vec<(EntityKind, Vec<Entity>)> = EntityKind::ALL
        .par_iter()
        .map(|&kind| load_kind(dir, kind).map(|entities| (kind, entities)))
        .collect::<Result<_>>()?;

    let mut dataset = Dataset::default();
    for (kind, entities) in loaded {
        match kind {
            EntityKind::Individual => dataset.individuals = entities,
            EntityKind::Organization => dataset.organizations = entities,
            EntityKind::ProjectCall => dataset.project_calls = entities,
        }
    }

    tracing::info!(
        dir = %dir.display(),
        individuals = dataset.individuals.len(),
        organizations = dataset.organizations.len(),
        project_calls = dataset.project_calls.len(),
        "loaded dataset"
    );
    Ok(dataset)
}

fn load_kind(dir: &Path, kind: EntityKind) -> Result<Vec<Entity>> {
    let path = dir.join(kind.dataset_file());
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), "dataset file not found");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    parse_records(&content, kind)
}

/// Parse a JSON array of records into entities of `kind`.
pub fn parse_records(json: &str, kind: EntityKind) -> Result<Vec<Entity>> {
    let items: Vec<Value> = serde_json::from_str(json)?;
    let mut entities = Vec::with_capacity(items.len());

    for (position, item) in items.into_iter().enumerate() {
        let Value::Object(fields) = item else {
            tracing::warn!(%kind, position, "skipping non-object record");
            continue;
        };

        let id = match fields.get("id") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => {
                tracing::warn!(%kind, position, "skipping record without id");
                continue;
            }
        };

        let mut record = Record::new(fields);
        if kind == EntityKind::ProjectCall {
            normalize_applicant_types(&mut record);
        }
        entities.push(Entity::new(id, kind, record));
    }

    Ok(entities)
}

/// Replace a JSON-encoded `applicantTypes` string with the list it holds.
fn normalize_applicant_types(record: &mut Record) {
    if matches!(record.get("applicantTypes"), Some(Value::String(_))) {
        let types = record.applicant_types();
        record.insert(
            "applicantTypes",
            Value::Array(types.into_iter().map(Value::String).collect()),
        );
    }
}
