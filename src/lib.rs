//! researchmatch - recommend research project calls to individuals and
//! organizations.
//!
//! Every entity in a dataset is rendered to a canonical text, embedded
//! into a unit vector and stored in an exact cosine-similarity index. A
//! seeker's stored vector retrieves similar project calls, which are then
//! filtered for eligibility, scored on five weighted factors and explained
//! with short human-readable reasons.
//!
//! # Quick start
//!
//! ```no_run
//! use researchmatch::{
//!     HashEmbedder, MatchingConfig, MatchingEngine, dataset, embedding,
//!     entity::EntityKind,
//! };
//!
//! let data =
//!     dataset::load_dataset(std::path::Path::new("dataset")).unwrap();
//! let mut embedder = HashEmbedder::default();
//! let index =
//!     embedding::build_index(&mut embedder, data.into_entities()).unwrap();
//!
//! let engine = MatchingEngine::new(&index, MatchingConfig::default());
//! let recs = engine
//!     .find_recommendations("ind-1", EntityKind::Individual, 5)
//!     .unwrap();
//! for r in &recs {
//!     println!("{} ({:.3}, {})", r.project_title, r.match_score, r.confidence);
//! }
//! ```

pub mod batch;
pub mod compatibility;
pub mod config_db;
pub mod data_dir;
pub mod dataset;
pub mod embedding;
pub mod engine;
pub mod entity;
pub mod error;
pub mod hash_embedder;
pub mod index_store;
pub mod model_manager;
pub mod output;
pub mod preferences;
pub mod reasons;
pub mod scoring;
pub mod text_repr;
pub mod text_util;
pub mod vector_index;

pub use config_db::ConfigDb;
pub use data_dir::DataDir;
pub use embedding::EmbeddingProvider;
pub use engine::{MatchingConfig, MatchingEngine, Recommendation};
pub use error::{Error, Result};
pub use hash_embedder::HashEmbedder;
pub use model_manager::ModelManager;
pub use vector_index::VectorIndex;
