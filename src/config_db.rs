use std::path::Path;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use crate::{
    compatibility::{MismatchPolicy, TypeTable},
    engine::{DEFAULT_TOP_K, MatchingConfig},
    error::{Error, Result},
};

const SETTINGS: TableDefinition<&str, &str> = TableDefinition::new("settings");
const TYPE_TABLE: TableDefinition<&str, &str> =
    TableDefinition::new("type_table");
const INDEX_INFO: TableDefinition<&str, &str> =
    TableDefinition::new("index_info");

const TYPE_TABLE_KEY: &str = "current";
const INDEX_EMBEDDER_KEY: &str = "embedder";

/// User-settable keys, in display order.
pub const SETTING_KEYS: &[&str] = &[
    "model_name",
    "embedder",
    "hash_dimension",
    "default_top_k",
    "mismatch_policy",
];

/// Which provider turns entity text into vectors at build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmbedderKind {
    #[default]
    Colbert,
    Hash,
}

impl EmbedderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EmbedderKind::Colbert => "colbert",
            EmbedderKind::Hash => "hash",
        }
    }
}

impl std::str::FromStr for EmbedderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "colbert" => Ok(EmbedderKind::Colbert),
            "hash" => Ok(EmbedderKind::Hash),
            other => Err(Error::Config(format!(
                "unknown embedder '{other}' (expected colbert or hash)"
            ))),
        }
    }
}

fn positive(key: &str, value: &str) -> Result<usize> {
    match value.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(Error::Config(format!(
            "{key} must be a positive integer, got '{value}'"
        ))),
    }
}

/// Reject unknown keys and values that would fail to parse later.
fn validate_setting(key: &str, value: &str) -> Result<()> {
    match key {
        "model_name" if value.trim().is_empty() => {
            Err(Error::Config("model_name must not be empty".into()))
        }
        "model_name" => Ok(()),
        "embedder" => value.parse::<EmbedderKind>().map(|_| ()),
        "hash_dimension" | "default_top_k" => positive(key, value).map(|_| ()),
        "mismatch_policy" => value.parse::<MismatchPolicy>().map(|_| ()),
        other => Err(Error::Config(format!(
            "unknown setting '{other}' (expected one of: {})",
            SETTING_KEYS.join(", ")
        ))),
    }
}

pub struct ConfigDb {
    db: Database,
}

impl ConfigDb {
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path)?;

        // Ensure all tables exist by opening them in a write transaction.
        let txn = db.begin_write()?;
        txn.open_table(SETTINGS)?;
        txn.open_table(TYPE_TABLE)?;
        txn.open_table(INDEX_INFO)?;
        txn.commit()?;

        Ok(Self { db })
    }

    // -- Settings --

    /// Store a validated setting.
    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        validate_setting(key, value)?;

        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SETTINGS)?;
            table.insert(key, value)?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(SETTINGS)?;
        Ok(table.get(key)?.map(|v| v.value().to_string()))
    }

    pub fn get_setting_or(&self, key: &str, default: &str) -> Result<String> {
        Ok(self
            .get_setting(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    pub fn remove_setting(&self, key: &str) -> Result<bool> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut table = txn.open_table(SETTINGS)?;
            table.remove(key)?.is_some()
        };
        txn.commit()?;
        Ok(removed)
    }

    pub fn list_settings(&self) -> Result<Vec<(String, String)>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(SETTINGS)?;
        let mut result = Vec::new();
        for entry in table.iter()? {
            let (k, v) = entry?;
            result.push((k.value().to_string(), v.value().to_string()));
        }
        Ok(result)
    }

    // -- Typed accessors --

    pub fn embedder(&self) -> Result<EmbedderKind> {
        match self.get_setting("embedder")? {
            Some(value) => value.parse(),
            None => Ok(EmbedderKind::default()),
        }
    }

    pub fn model_name(&self) -> Result<Option<String>> {
        self.get_setting("model_name")
    }

    pub fn hash_dimension(&self) -> Result<Option<usize>> {
        self.get_setting("hash_dimension")?
            .map(|v| positive("hash_dimension", &v))
            .transpose()
    }

    pub fn default_top_k(&self) -> Result<usize> {
        match self.get_setting("default_top_k")? {
            Some(value) => positive("default_top_k", &value),
            None => Ok(DEFAULT_TOP_K),
        }
    }

    pub fn mismatch_policy(&self) -> Result<MismatchPolicy> {
        match self.get_setting("mismatch_policy")? {
            Some(value) => value.parse(),
            None => Ok(MismatchPolicy::default()),
        }
    }

    // -- Type table --

    /// The stored type table, or the built-in one if none was imported.
    pub fn type_table(&self) -> Result<TypeTable> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(TYPE_TABLE)?;
        let stored = table.get(TYPE_TABLE_KEY)?;
        match stored {
            Some(json) => TypeTable::from_json(json.value()),
            None => Ok(TypeTable::default()),
        }
    }

    pub fn has_custom_type_table(&self) -> Result<bool> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(TYPE_TABLE)?;
        Ok(table.get(TYPE_TABLE_KEY)?.is_some())
    }

    pub fn set_type_table(&self, type_table: &TypeTable) -> Result<()> {
        let json = type_table.to_json()?;
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(TYPE_TABLE)?;
            table.insert(TYPE_TABLE_KEY, json.as_str())?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Drop the stored type table. Returns whether one was stored.
    pub fn reset_type_table(&self) -> Result<bool> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut table = txn.open_table(TYPE_TABLE)?;
            table.remove(TYPE_TABLE_KEY)?.is_some()
        };
        txn.commit()?;
        Ok(removed)
    }

    /// Everything the matching engine needs from configuration.
    pub fn matching_config(&self) -> Result<MatchingConfig> {
        Ok(MatchingConfig {
            type_table: self.type_table()?,
            mismatch_policy: self.mismatch_policy()?,
        })
    }

    // -- Index info --

    /// Remember which provider produced the current index.
    pub fn set_index_embedder(&self, name: &str) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(INDEX_INFO)?;
            table.insert(INDEX_EMBEDDER_KEY, name)?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn index_embedder(&self) -> Result<Option<String>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(INDEX_INFO)?;
        Ok(table
            .get(INDEX_EMBEDDER_KEY)?
            .map(|v| v.value().to_string()))
    }

    pub fn clear_index_info(&self) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(INDEX_INFO)?;
            table.remove(INDEX_EMBEDDER_KEY)?;
        }
        txn.commit()?;
        Ok(())
    }
}

impl std::fmt::Debug for ConfigDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigDb").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> (tempfile::TempDir, ConfigDb) {
        let tmp = tempfile::tempdir().unwrap();
        let db = ConfigDb::open(&tmp.path().join("config.redb")).unwrap();
        (tmp, db)
    }

    #[test]
    fn settings_crud() {
        let (_tmp, db) = test_db();

        assert_eq!(db.get_setting("model_name").unwrap(), None);
        assert_eq!(
            db.get_setting_or("model_name", "default").unwrap(),
            "default"
        );

        db.set_setting("model_name", "custom/model").unwrap();
        assert_eq!(
            db.get_setting("model_name").unwrap(),
            Some("custom/model".to_string())
        );
        assert_eq!(
            db.list_settings().unwrap(),
            vec![("model_name".to_string(), "custom/model".to_string())]
        );

        assert!(db.remove_setting("model_name").unwrap());
        assert!(!db.remove_setting("model_name").unwrap());
        assert_eq!(db.get_setting("model_name").unwrap(), None);
    }

    #[test]
    fn invalid_settings_rejected() {
        let (_tmp, db) = test_db();

        for (key, value) in [
            ("colour", "blue"),
            ("embedder", "word2vec"),
            ("hash_dimension", "0"),
            ("default_top_k", "-3"),
            ("mismatch_policy", "ignore"),
            ("model_name", "  "),
        ] {
            assert!(
                matches!(db.set_setting(key, value), Err(Error::Config(_))),
                "{key}={value} accepted"
            );
        }
        assert!(db.list_settings().unwrap().is_empty());
    }

    #[test]
    fn typed_defaults() {
        let (_tmp, db) = test_db();

        assert_eq!(db.embedder().unwrap(), EmbedderKind::Colbert);
        assert_eq!(db.model_name().unwrap(), None);
        assert_eq!(db.hash_dimension().unwrap(), None);
        assert_eq!(db.default_top_k().unwrap(), DEFAULT_TOP_K);
        assert_eq!(db.mismatch_policy().unwrap(), MismatchPolicy::Penalize);
        assert_eq!(db.matching_config().unwrap(), MatchingConfig::default());
    }

    #[test]
    fn typed_overrides() {
        let (_tmp, db) = test_db();

        db.set_setting("embedder", "hash").unwrap();
        db.set_setting("hash_dimension", "64").unwrap();
        db.set_setting("default_top_k", "5").unwrap();
        db.set_setting("mismatch_policy", "drop-both").unwrap();

        assert_eq!(db.embedder().unwrap(), EmbedderKind::Hash);
        assert_eq!(db.hash_dimension().unwrap(), Some(64));
        assert_eq!(db.default_top_k().unwrap(), 5);
        assert_eq!(
            db.matching_config().unwrap().mismatch_policy,
            MismatchPolicy::DropBoth
        );
    }

    #[test]
    fn type_table_import_and_reset() {
        let (_tmp, db) = test_db();
        assert!(!db.has_custom_type_table().unwrap());

        let mut custom = TypeTable::default();
        custom
            .compatible
            .insert("robot".into(), ["automation".to_string()].into());
        db.set_type_table(&custom).unwrap();

        assert!(db.has_custom_type_table().unwrap());
        assert_eq!(db.type_table().unwrap(), custom);
        assert_eq!(db.matching_config().unwrap().type_table, custom);

        assert!(db.reset_type_table().unwrap());
        assert!(!db.reset_type_table().unwrap());
        assert_eq!(db.type_table().unwrap(), TypeTable::default());
    }

    #[test]
    fn index_embedder_roundtrip() {
        let (_tmp, db) = test_db();
        assert_eq!(db.index_embedder().unwrap(), None);

        db.set_index_embedder("hash").unwrap();
        assert_eq!(db.index_embedder().unwrap(), Some("hash".to_string()));

        db.clear_index_info().unwrap();
        assert_eq!(db.index_embedder().unwrap(), None);
    }

    #[test]
    fn reopen_preserves_data() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.redb");

        {
            let db = ConfigDb::open(&path).unwrap();
            db.set_setting("default_top_k", "7").unwrap();
            db.set_index_embedder("hash").unwrap();
        }

        let db = ConfigDb::open(&path).unwrap();
        assert_eq!(db.default_top_k().unwrap(), 7);
        assert_eq!(db.index_embedder().unwrap(), Some("hash".to_string()));
    }
}
