/// Mock embedder for testing purposes.
///
/// Generates deterministic embeddings based on text hash so that tests
/// never need network access.
use std::hash::{DefaultHasher, Hash, Hasher};

use super::{EmbedTask, Embedder, EmbedderError};

/// A mock embedder that produces deterministic vectors from text hashes.
///
/// The task is ignored: a question and a chunk with identical text embed to
/// the same vector, which lets tests target exact matches.
pub struct MockEmbedder {
    pub dimensions: usize,
}

impl MockEmbedder {
    /// Create a new `MockEmbedder` with the given dimensionality.
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self { dimensions: 768 }
    }
}

impl Embedder for MockEmbedder {
    fn embed(&self, text: &str, _task: EmbedTask) -> Result<Vec<f32>, EmbedderError> {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let hash = hasher.finish();

        // Spread the hash bytes across the vector, with a per-slot sign so
        // unrelated texts are not all nearly parallel.
        let bytes = hash.to_le_bytes();
        let mut embedding = Vec::with_capacity(self.dimensions);
        for i in 0..self.dimensions {
            let b = bytes[i % 8].rotate_left((i / 8) as u32 % 8);
            let sign = if (hash >> (i % 64)) & 1 == 1 { 1.0 } else { -1.0 };
            embedding.push(sign * (b as f32 + 1.0) / 256.0);
        }

        // L2 normalize
        let norm_sq: f32 = embedding.iter().map(|v| v * v).sum();
        if norm_sq > 0.0 {
            let inv = 1.0 / norm_sq.sqrt();
            for v in &mut embedding {
                *v *= inv;
            }
        }

        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_embed_dimensions() {
        let embedder = MockEmbedder::new(768);
        let result = embedder.embed("hello world", EmbedTask::Document).unwrap();
        assert_eq!(result.len(), 768);
    }

    #[test]
    fn test_mock_embed_deterministic() {
        let embedder = MockEmbedder::new(64);
        let a = embedder.embed("hello", EmbedTask::Document).unwrap();
        let b = embedder.embed("hello", EmbedTask::Query).unwrap();
        assert_eq!(a, b, "same input should produce same output");
    }

    #[test]
    fn test_mock_embed_different_inputs() {
        let embedder = MockEmbedder::new(64);
        let a = embedder.embed("hello", EmbedTask::Query).unwrap();
        let b = embedder.embed("world", EmbedTask::Query).unwrap();
        assert_ne!(a, b, "different inputs should produce different outputs");
    }

    #[test]
    fn test_mock_embed_normalized() {
        let embedder = MockEmbedder::default();
        let vec = embedder.embed("test normalization", EmbedTask::Document).unwrap();
        let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!(
            (norm - 1.0).abs() < 0.01,
            "vector should be approximately unit length, got {norm}"
        );
    }

    #[test]
    fn test_mock_default_dimensions() {
        let embedder = MockEmbedder::default();
        assert_eq!(embedder.dimensions(), 768);
    }
}
