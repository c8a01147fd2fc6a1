use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use researchmatch::{config_db::EmbedderKind, entity::EntityKind};

#[derive(Debug, Parser)]
#[command(
    name = "researchmatch",
    about = "Recommend research project calls to individuals and organizations"
)]
pub struct Cli {
    /// Override the XDG data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Override the ColBERT model ID or local model path
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Embed the dataset and build the vector index (full rebuild)
    Build(BuildArgs),
    /// Recommend project calls for one individual or organization
    Recommend(RecommendArgs),
    /// Write recommendations for every seeker to a JSON report
    Batch(BatchArgs),
    /// Show index and configuration status
    Status(StatusArgs),
    /// Delete the persisted vector index
    Clear,
    /// Manage stored settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Manage the applicant type compatibility table
    Types {
        #[command(subcommand)]
        action: TypesAction,
    },
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Build --

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EmbedderArg {
    Colbert,
    Hash,
}

impl From<EmbedderArg> for EmbedderKind {
    fn from(arg: EmbedderArg) -> Self {
        match arg {
            EmbedderArg::Colbert => EmbedderKind::Colbert,
            EmbedderArg::Hash => EmbedderKind::Hash,
        }
    }
}

#[derive(Debug, Parser)]
pub struct BuildArgs {
    /// Directory holding individuals.json, organizations.json and
    /// project_calls.json (defaults to <data-dir>/dataset)
    #[arg(short = 's', long)]
    pub source: Option<PathBuf>,

    /// Embedding provider (defaults to the `embedder` setting)
    #[arg(long, value_enum)]
    pub embedder: Option<EmbedderArg>,

    /// Vector length for the hash embedder
    #[arg(long)]
    pub dimension: Option<usize>,
}

// -- Recommend --

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SeekerKindArg {
    Individual,
    Organization,
}

impl From<SeekerKindArg> for EntityKind {
    fn from(arg: SeekerKindArg) -> Self {
        match arg {
            SeekerKindArg::Individual => EntityKind::Individual,
            SeekerKindArg::Organization => EntityKind::Organization,
        }
    }
}

#[derive(Debug, Parser)]
pub struct RecommendArgs {
    /// Id of the seeker, as it appears in the dataset
    pub id: String,

    /// Whether the id names an individual or an organization
    #[arg(short, long, value_enum, default_value = "individual")]
    pub kind: SeekerKindArg,

    /// Number of recommendations (defaults to the `default_top_k` setting)
    #[arg(short = 'n', long)]
    pub count: Option<usize>,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Batch --

#[derive(Debug, Parser)]
pub struct BatchArgs {
    /// Recommendations per seeker (defaults to the `default_top_k` setting)
    #[arg(short = 'n', long)]
    pub top_k: Option<usize>,

    /// Report path (defaults to <data-dir>/output/recommendations.json)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

// -- Status --

#[derive(Debug, Parser)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Config --

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Show stored settings and the values in effect
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Store a setting
    Set {
        /// One of: model_name, embedder, hash_dimension, default_top_k,
        /// mismatch_policy
        key: String,
        value: String,
    },
    /// Remove a stored setting (revert to default)
    Unset { key: String },
}

// -- Types --

#[derive(Debug, Subcommand)]
pub enum TypesAction {
    /// Print the type table in effect as JSON
    Show,
    /// Validate and store a type table from a JSON file
    Import { file: PathBuf },
    /// Revert to the built-in type table
    Reset,
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "researchmatch",
            &mut std::io::stdout(),
        );
    }
}
