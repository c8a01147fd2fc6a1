use candle_core::{Device, Tensor};
use pylate_rs::ColBERT;

use crate::{
    embedding::EmbeddingProvider,
    error::{Error, Result},
};

pub const DEFAULT_MODEL_ID: &str = "lightonai/GTE-ModernColBERT-v1";
pub const MODEL_ENV_VAR: &str = "RESEARCHMATCH_MODEL";

/// Select the best available compute device.
///
/// Uses CUDA when compiled with the `cuda` feature, Metal when compiled with
/// the `metal` feature, and falls back to CPU otherwise.
fn default_device() -> Device {
    #[cfg(feature = "cuda")]
    {
        if let Ok(device) = Device::new_cuda(0) {
            return device;
        }
    }

    #[cfg(feature = "metal")]
    {
        if let Ok(device) = Device::new_metal(0) {
            return device;
        }
    }

    Device::Cpu
}

/// Where the model id in effect came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelSource {
    Flag,
    Env,
    Config,
    Default,
}

impl ModelSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ModelSource::Flag => "--model",
            ModelSource::Env => MODEL_ENV_VAR,
            ModelSource::Config => "config",
            ModelSource::Default => "default",
        }
    }
}

/// Resolve the model id from, in order of priority:
/// 1. An explicit id (from --model)
/// 2. The RESEARCHMATCH_MODEL environment variable
/// 3. The stored `model_name` setting
/// 4. [`DEFAULT_MODEL_ID`]
pub fn resolve_model_id(
    explicit: Option<&str>,
    stored: Option<String>,
) -> (String, ModelSource) {
    resolve_from(explicit, std::env::var(MODEL_ENV_VAR).ok(), stored)
}

fn resolve_from(
    explicit: Option<&str>,
    env: Option<String>,
    stored: Option<String>,
) -> (String, ModelSource) {
    if let Some(id) = explicit {
        (id.to_string(), ModelSource::Flag)
    } else if let Some(id) = env.filter(|id| !id.is_empty()) {
        (id, ModelSource::Env)
    } else if let Some(id) = stored {
        (id, ModelSource::Config)
    } else {
        (DEFAULT_MODEL_ID.to_string(), ModelSource::Default)
    }
}

fn model_error(e: impl std::fmt::Display) -> Error {
    Error::Model(e.to_string())
}

/// ColBERT-backed [`EmbeddingProvider`], loaded lazily on first use.
///
/// ColBERT yields one vector per token; the non-padding ones are
/// mean-pooled into a single profile vector per text.
pub struct ModelManager {
    model: Option<ColBERT>,
    model_id: String,
}

impl Default for ModelManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelManager {
    /// Creates a new `ModelManager`. The model ID is resolved from:
    /// 1. The `RESEARCHMATCH_MODEL` environment variable, if set
    /// 2. Otherwise, the default model (`lightonai/GTE-ModernColBERT-v1`)
    ///
    /// The model is not loaded until the first embedding call.
    pub fn new() -> Self {
        let model_id = std::env::var(MODEL_ENV_VAR)
            .unwrap_or_else(|_| DEFAULT_MODEL_ID.to_string());

        Self {
            model: None,
            model_id,
        }
    }

    /// Creates a `ModelManager` with an explicit model ID, bypassing
    /// environment variable resolution.
    pub fn with_model_id(model_id: String) -> Self {
        Self {
            model: None,
            model_id,
        }
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    /// Ensures the model is loaded, downloading from HuggingFace Hub if needed.
    fn ensure_loaded(&mut self) -> Result<&mut ColBERT> {
        if self.model.is_none() {
            tracing::info!(model = %self.model_id, "loading ColBERT model");
            let device = default_device();
            let colbert = ColBERT::try_from(
                ColBERT::from(&self.model_id).with_device(device),
            )
            .map_err(model_error)?;
            self.model = Some(colbert);
        }

        self.model
            .as_mut()
            .ok_or_else(|| Error::Model("model failed to load".into()))
    }

    /// One pooled vector per text.
    ///
    /// Texts are encoded one at a time so a vector never depends on the
    /// padding its batch mates would add.
    fn encode_pooled(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let model = self.ensure_loaded()?;
        texts
            .iter()
            .map(|text| {
                let tokens: Tensor = model
                    .encode(std::slice::from_ref(text), false)
                    .map_err(model_error)?;
                let mut batch =
                    tokens.to_vec3::<f32>().map_err(model_error)?;
                let rows = batch.pop().ok_or_else(|| {
                    Error::Model("model returned no embeddings".into())
                })?;
                Ok(mean_pool(&rows))
            })
            .collect()
    }
}

/// Mean of the token rows, ignoring all-zero (padding) rows.
///
/// Returns a zero vector when every row is padding.
fn mean_pool(rows: &[Vec<f32>]) -> Vec<f32> {
    let dim = rows.first().map_or(0, Vec::len);
    let mut sum = vec![0.0f32; dim];
    let mut count = 0usize;

    for row in rows.iter().filter(|row| row.iter().any(|&x| x != 0.0)) {
        for (acc, &x) in sum.iter_mut().zip(row) {
            *acc += x;
        }
        count += 1;
    }

    if count > 0 {
        let n = count as f32;
        sum.iter_mut().for_each(|x| *x /= n);
    }
    sum
}

impl EmbeddingProvider for ModelManager {
    fn name(&self) -> &str {
        &self.model_id
    }

    fn embed_batch(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.encode_pooled(texts)
    }
}
