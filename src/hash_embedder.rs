use crate::{
    embedding::EmbeddingProvider,
    error::{Error, Result},
    vector_index::l2_normalize,
};

pub const DEFAULT_HASH_DIMENSION: usize = 384;

/// Changing this changes every vector; rebuild indexes afterwards.
const HASH_CONTEXT: &str = "researchmatch hash embedder v1";

/// Deterministic bag-of-words embedder using signed feature hashing.
///
/// Each lowercase word and each adjacent word pair is hashed with BLAKE3
/// into one of `dimension` buckets with a +1/-1 sign, then the vector is
/// L2-normalized. Needs no model download, so it backs offline builds and
/// tests.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self {
            dimension: DEFAULT_HASH_DIMENSION,
        }
    }
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(Error::Config(
                "hash embedder dimension must be positive".into(),
            ));
        }
        Ok(Self { dimension })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn bucket(&self, feature: &str) -> (usize, f32) {
        let mut hasher = blake3::Hasher::new_derive_key(HASH_CONTEXT);
        hasher.update(feature.as_bytes());
        let digest = hasher.finalize();
        let bytes = digest.as_bytes();

        let mut index = [0u8; 8];
        index.copy_from_slice(&bytes[..8]);
        let index =
            (u64::from_le_bytes(index) % self.dimension as u64) as usize;
        let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
        (index, sign)
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let words = tokenize(text);
        let mut vector = vec![0.0f32; self.dimension];

        for word in &words {
            let (index, sign) = self.bucket(word);
            vector[index] += sign;
        }
        for pair in words.windows(2) {
            let bigram = format!("{} {}", pair[0], pair[1]);
            let (index, sign) = self.bucket(&bigram);
            vector[index] += 0.5 * sign;
        }

        l2_normalize(&mut vector);
        vector
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.chars().count() > 1)
        .map(str::to_lowercase)
        .collect()
}

impl EmbeddingProvider for HashEmbedder {
    fn name(&self) -> &str {
        "hash"
    }

    fn embed_batch(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}
