use std::{
    io::Write,
    path::{Path, PathBuf},
};

use clap::Parser;
use researchmatch::{
    ConfigDb,
    DataDir,
    EmbeddingProvider,
    HashEmbedder,
    MatchingEngine,
    ModelManager,
    VectorIndex,
    batch,
    compatibility::TypeTable,
    config_db::EmbedderKind,
    dataset,
    embedding,
    error::{self, Error},
    hash_embedder::DEFAULT_HASH_DIMENSION,
    index_store::IndexStore,
    model_manager::resolve_model_id,
    output,
};
use serde_json::json;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, Command, ConfigAction, TypesAction};

const LOG_ENV_VAR: &str = "RESEARCHMATCH_LOG";

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var(LOG_ENV_VAR) {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> error::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    if let Command::Completions(args) = &cli.command {
        args.generate();
        return Ok(());
    }

    let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;
    let config_db = ConfigDb::open(&data_dir.config_db())?;

    match cli.command {
        Command::Build(args) => {
            cmd_build(&config_db, &data_dir, cli.model.as_deref(), &args)?;
        }
        Command::Recommend(args) => {
            cmd_recommend(&config_db, &data_dir, &args)?;
        }
        Command::Batch(args) => {
            cmd_batch(&config_db, &data_dir, &args)?;
        }
        Command::Status(args) => {
            let model = cli.model.as_deref();
            cmd_status(&config_db, &data_dir, model, args.json)?;
        }
        Command::Clear => {
            cmd_clear(&config_db, &data_dir)?;
        }
        Command::Config { action } => match action {
            ConfigAction::Show { json } => {
                config_show(&config_db, cli.model.as_deref(), json)?;
            }
            ConfigAction::Set { key, value } => {
                config_db.set_setting(&key, &value)?;
                println!("Set {key} = {value}");
            }
            ConfigAction::Unset { key } => {
                if config_db.remove_setting(&key)? {
                    println!("Unset {key}");
                } else {
                    println!("{key} was not set");
                }
            }
        },
        Command::Types { action } => match action {
            TypesAction::Show => {
                println!("{}", config_db.type_table()?.to_json()?);
            }
            TypesAction::Import { file } => {
                types_import(&config_db, &file)?;
            }
            TypesAction::Reset => {
                if config_db.reset_type_table()? {
                    println!("Reverted to the built-in type table");
                } else {
                    println!("Already using the built-in type table");
                }
            }
        },
        Command::Completions(_) => {}
    }

    Ok(())
}

fn cmd_build(
    config_db: &ConfigDb,
    data_dir: &DataDir,
    model: Option<&str>,
    args: &cli::BuildArgs,
) -> error::Result<()> {
    let source = args
        .source
        .clone()
        .unwrap_or_else(|| data_dir.dataset_dir());
    let dataset = dataset::load_dataset(&source)?;

    let kind = match args.embedder {
        Some(arg) => EmbedderKind::from(arg),
        None => config_db.embedder()?,
    };

    let mut provider: Box<dyn EmbeddingProvider> = match kind {
        EmbedderKind::Hash => {
            let dimension = match args.dimension {
                Some(d) => d,
                None => config_db
                    .hash_dimension()?
                    .unwrap_or(DEFAULT_HASH_DIMENSION),
            };
            Box::new(HashEmbedder::new(dimension)?)
        }
        EmbedderKind::Colbert => {
            if args.dimension.is_some() {
                tracing::warn!(
                    "--dimension only applies to the hash embedder"
                );
            }
            let (model_id, source) =
                resolve_model_id(model, config_db.model_name()?);
            tracing::info!(
                model = %model_id,
                source = source.as_str(),
                "using ColBERT"
            );
            Box::new(ModelManager::with_model_id(model_id))
        }
    };

    let total = dataset.len();
    let index =
        embedding::build_index(provider.as_mut(), dataset.into_entities())?;
    index.persist(&data_dir.index_db())?;
    config_db.set_index_embedder(provider.name())?;

    println!(
        "Indexed {total} entities ({} vectors, {} dimensions) with {}",
        index.len(),
        index.dimension(),
        provider.name()
    );
    Ok(())
}

fn load_index(data_dir: &DataDir) -> error::Result<VectorIndex> {
    VectorIndex::load(&data_dir.index_db()).map_err(|e| match e {
        Error::NotFound { .. } => Error::Config(
            "no index found; run `researchmatch build` first".into(),
        ),
        other => other,
    })
}

fn cmd_recommend(
    config_db: &ConfigDb,
    data_dir: &DataDir,
    args: &cli::RecommendArgs,
) -> error::Result<()> {
    let index = load_index(data_dir)?;
    let engine = MatchingEngine::new(&index, config_db.matching_config()?);
    let top_k = match args.count {
        Some(n) => n,
        None => config_db.default_top_k()?,
    };

    let kind = args.kind.into();
    let recs = engine.find_recommendations(&args.id, kind, top_k)?;

    let mut stdout = std::io::stdout().lock();
    if args.json {
        output::write_json(&mut stdout, &args.id, kind, &recs)?;
    } else {
        output::write_human(&mut stdout, &recs)?;
    }
    stdout.flush()?;
    Ok(())
}

fn cmd_batch(
    config_db: &ConfigDb,
    data_dir: &DataDir,
    args: &cli::BatchArgs,
) -> error::Result<()> {
    let index = load_index(data_dir)?;
    let engine = MatchingEngine::new(&index, config_db.matching_config()?);
    let top_k = match args.top_k {
        Some(n) => n,
        None => config_db.default_top_k()?,
    };
    let embedder = config_db
        .index_embedder()?
        .unwrap_or_else(|| "unknown".to_string());

    let report = batch::generate(&engine, &embedder, top_k)?;
    let path: PathBuf = match &args.output {
        Some(path) => path.clone(),
        None => data_dir.output_dir()?.join("recommendations.json"),
    };
    batch::write_report(&report, &path)?;

    let stats = &report.statistics;
    println!(
        "Wrote {} recommendation(s) for {} individual(s) and {} \
         organization(s) to {}",
        stats.total_matches_generated,
        report.recommendations.individuals.len(),
        report.recommendations.organizations.len(),
        path.display()
    );
    println!(
        "Average score {:.3} (high {}, medium {}, low {})",
        stats.avg_match_score,
        stats.high_confidence_matches,
        stats.medium_confidence_matches,
        stats.low_confidence_matches
    );
    Ok(())
}

fn cmd_status(
    config_db: &ConfigDb,
    data_dir: &DataDir,
    model: Option<&str>,
    json: bool,
) -> error::Result<()> {
    let index = match VectorIndex::load(&data_dir.index_db()) {
        Ok(index) => Some(index),
        Err(Error::NotFound { .. }) => None,
        Err(e) => return Err(e),
    };
    let stats = index.as_ref().map(VectorIndex::stats);
    let embedder = config_db.index_embedder()?;
    let (model_id, _) = resolve_model_id(model, config_db.model_name()?);
    let policy = config_db.mismatch_policy()?;
    let custom_types = config_db.has_custom_type_table()?;

    if json {
        let value = json!({
            "data_dir": data_dir.root().display().to_string(),
            "model": model_id,
            "index": stats,
            "index_embedder": embedder,
            "mismatch_policy": policy,
            "custom_type_table": custom_types,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("Data directory: {}", data_dir.root().display());
    println!("Model: {model_id}");
    match stats {
        Some(stats) => {
            println!(
                "Index: {} vectors, {} dimensions ({})",
                stats.total_vectors,
                stats.dimension,
                embedder.as_deref().unwrap_or("unknown embedder")
            );
            for (kind, count) in &stats.kind_counts {
                println!("  {kind}: {count}");
            }
        }
        None => println!("Index: not built"),
    }
    println!("Mismatch policy: {policy}");
    println!(
        "Type table: {}",
        if custom_types { "custom" } else { "built-in" }
    );
    Ok(())
}

fn cmd_clear(config_db: &ConfigDb, data_dir: &DataDir) -> error::Result<()> {
    let removed = IndexStore::clear(&data_dir.index_db())?;
    config_db.clear_index_info()?;
    if removed {
        println!("Removed index at {}", data_dir.index_db().display());
    } else {
        println!("No index to remove");
    }
    Ok(())
}

fn config_show(
    config_db: &ConfigDb,
    model: Option<&str>,
    json: bool,
) -> error::Result<()> {
    let stored = config_db.list_settings()?;
    let (model_id, source) = resolve_model_id(model, config_db.model_name()?);
    let effective = [
        ("model_name", model_id),
        ("embedder", config_db.embedder()?.as_str().to_string()),
        (
            "hash_dimension",
            config_db
                .hash_dimension()?
                .unwrap_or(DEFAULT_HASH_DIMENSION)
                .to_string(),
        ),
        ("default_top_k", config_db.default_top_k()?.to_string()),
        ("mismatch_policy", config_db.mismatch_policy()?.to_string()),
    ];

    if json {
        let stored: serde_json::Map<String, serde_json::Value> = stored
            .into_iter()
            .map(|(k, v)| (k, serde_json::Value::String(v)))
            .collect();
        let effective: serde_json::Map<String, serde_json::Value> = effective
            .into_iter()
            .map(|(k, v)| (k.to_string(), serde_json::Value::String(v)))
            .collect();
        let value = json!({
            "stored": stored,
            "effective": effective,
            "model_source": source.as_str(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    for (key, value) in &effective {
        let origin = if *key == "model_name" {
            source.as_str()
        } else if stored.iter().any(|(k, _)| k == key) {
            "stored"
        } else {
            "default"
        };
        println!("{key} = {value} ({origin})");
    }
    Ok(())
}

fn types_import(config_db: &ConfigDb, file: &Path) -> error::Result<()> {
    let content = std::fs::read_to_string(file)?;
    let table = TypeTable::from_json(&content)?;
    config_db.set_type_table(&table)?;
    println!(
        "Imported type table with {} declared type(s) from {}",
        table.compatible.len(),
        file.display()
    );
    Ok(())
}
