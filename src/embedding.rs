use crate::{
    entity::Entity,
    error::{Error, Result},
    text_repr,
    vector_index::{IndexEntry, VectorIndex},
};

/// Texts sent to the provider per call.
pub const EMBED_BATCH_SIZE: usize = 32;

/// Turns text into fixed-length vectors.
///
/// Implementations must return one vector per input text, in input order,
/// all of the same length.
pub trait EmbeddingProvider {
    /// Short identifier recorded in reports.
    fn name(&self) -> &str;

    fn embed_batch(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn embed(&mut self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Model("provider returned no vector".into()))
    }
}

/// Describe, embed and index every entity.
///
/// The index dimension is taken from the first vector the provider
/// returns; a provider that changes length midway fails the build with
/// [`Error::DimensionMismatch`].
pub fn build_index(
    provider: &mut dyn EmbeddingProvider,
    entities: Vec<Entity>,
) -> Result<VectorIndex> {
    if entities.is_empty() {
        return Err(Error::Config("no entities to index".into()));
    }

    let texts: Vec<String> = entities.iter().map(text_repr::describe).collect();
    let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(texts.len());

    for (batch_num, batch) in texts.chunks(EMBED_BATCH_SIZE).enumerate() {
        let embedded = provider.embed_batch(batch)?;
        if embedded.len() != batch.len() {
            return Err(Error::Model(format!(
                "provider returned {} vectors for {} texts",
                embedded.len(),
                batch.len()
            )));
        }
        vectors.extend(embedded);
        tracing::debug!(
            batch = batch_num,
            embedded = vectors.len(),
            total = texts.len(),
            "embedded batch"
        );
    }

    let dimension = vectors.first().map(Vec::len).unwrap_or_default();
    if dimension == 0 {
        return Err(Error::Model("provider returned empty vectors".into()));
    }

    let entries: Vec<IndexEntry> = entities
        .into_iter()
        .zip(vectors)
        .map(|(entity, vector)| IndexEntry {
            id: entity.id,
            kind: entity.kind,
            vector,
            record: entity.record,
        })
        .collect();

    let mut index = VectorIndex::new(dimension);
    index.add(entries)?;

    tracing::info!(
        provider = provider.name(),
        vectors = index.len(),
        dimension,
        "built vector index"
    );
    Ok(index)
}
