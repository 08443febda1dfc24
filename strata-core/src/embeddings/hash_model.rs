//! Deterministic feature-hash embedding model
//!
//! Bag-of-words feature hashing: every token is hashed into a bucket with a
//! sign, counts accumulate, and the result is L2-normalized. Texts sharing
//! vocabulary land near each other, which is enough for lexical-semantic
//! retrieval without any model files, and the output is bit-identical
//! across runs and platforms.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use super::provider::{utils, EmbeddingProvider};

/// Feature-hash embedder, the default provider
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    /// Create an embedder producing vectors of the given dimension
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    /// Embed synchronously; used directly by CPU-bound reconciliation
    #[must_use]
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut accum = vec![0.0f32; self.dimension];

        for token in tokenize(text) {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let h = hasher.finish();

            let bucket = (h % self.dimension as u64) as usize;
            // One hash bit decides the sign so collisions tend to cancel
            let sign = if (h >> 63) == 0 { 1.0 } else { -1.0 };
            accum[bucket] += sign;
        }

        utils::normalize_vector(accum)
    }
}

/// Lowercased alphanumeric tokens, length >= 2
fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 2)
        .map(str::to_lowercase)
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed(t)).collect())
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "feature-hash-v1"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::cosine_similarity;

    #[test]
    fn embeddings_are_deterministic() {
        let embedder = HashEmbedder::new(384);
        let a = embedder.embed("the project plan for Acme");
        let b = embedder.embed("the project plan for Acme");
        assert_eq!(a, b);
        assert_eq!(a.len(), 384);
    }

    #[test]
    fn shared_vocabulary_scores_higher_than_disjoint() {
        let embedder = HashEmbedder::new(384);
        let plan = embedder.embed("quarterly plan with milestones and deadlines");
        let similar = embedder.embed("the plan lists milestones");
        let unrelated = embedder.embed("salmon recipe with dill butter");

        let close = cosine_similarity(&plan, &similar);
        let far = cosine_similarity(&plan, &unrelated);
        assert!(close > far);
        assert!(close > 0.0);
    }

    #[test]
    fn output_is_unit_length() {
        let embedder = HashEmbedder::new(64);
        let v = embedder.embed("normalize me please");
        let magnitude = (v.iter().map(|x| x * x).sum::<f32>()).sqrt();
        assert!((magnitude - 1.0).abs() < 1e-5);
    }

    #[test]
    fn empty_text_embeds_to_zero_vector() {
        let embedder = HashEmbedder::new(16);
        let v = embedder.embed("");
        assert!(v.iter().all(|x| *x == 0.0));
    }
}
