//! Embedding providers for intent text.
//!
//! The engine consumes embeddings from an external provider behind the
//! [`EmbeddingProvider`] trait. For determinism in tests and resilience in
//! production, [`HashEmbedder`] derives a stable vector from the text alone
//! and serves as the fallback whenever the real provider fails or misses
//! its deadline.

use sha2::{Digest, Sha256};
use std::time::Duration;

/// Errors a provider may surface. Both are recovered internally by falling
/// back to the hash embedder; they never fail the admission pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbeddingError {
    /// The provider is unreachable or returned an invalid response.
    Unavailable(String),
    /// The caller-supplied deadline expired.
    Timeout,
}

impl std::fmt::Display for EmbeddingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmbeddingError::Unavailable(msg) => write!(f, "embedding unavailable: {msg}"),
            EmbeddingError::Timeout => write!(f, "embedding deadline expired"),
        }
    }
}

/// Source of intent-text embeddings.
///
/// Implementations must be deterministic for a given model version and
/// thread-safe; the engine may call `embed` from many request threads.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text, observing the optional deadline.
    fn embed(&self, text: &str, deadline: Option<Duration>) -> Result<Vec<f32>, EmbeddingError>;

    /// Dimensionality of the returned vectors, fixed at startup.
    fn dimension(&self) -> usize;

    /// Human-readable provider name for logging.
    fn provider_name(&self) -> &str;
}

/// Deterministic hash-based embedder.
///
/// Each dimension is seeded from the text and the dimension index, so the
/// same text always yields the same L2-normalized vector. Carries no
/// semantic signal, but distinct texts land in distinct directions, which
/// is what the drift math needs when no real provider is available.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    /// Derive the embedding for `text`. Infallible.
    pub fn vector(&self, text: &str) -> Vec<f32> {
        let mut v = Vec::with_capacity(self.dimension);
        for i in 0..self.dimension {
            let mut hasher = Sha256::new();
            hasher.update(text.as_bytes());
            hasher.update([0x1f]);
            hasher.update((i as u32).to_le_bytes());
            let digest = hasher.finalize();
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&digest[..8]);
            let raw = u64::from_le_bytes(bytes);
            v.push((raw % 10_000) as f32 / 5_000.0 - 1.0);
        }
        l2_normalize(&mut v);
        v
    }
}

impl EmbeddingProvider for HashEmbedder {
    fn embed(&self, text: &str, _deadline: Option<Duration>) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self.vector(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn provider_name(&self) -> &str {
        "hash-fallback"
    }
}

/// Normalize a vector to unit length in place. Zero vectors are left as-is.
pub fn l2_normalize(v: &mut [f32]) {
    let norm: f64 = v.iter().map(|x| (*x as f64) * (*x as f64)).sum::<f64>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x = (*x as f64 / norm) as f32;
        }
    }
}

/// Cosine similarity between two vectors, in [-1, 1].
///
/// Returns 0.0 for mismatched lengths or zero-magnitude inputs.
pub fn cosine(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut na = 0.0f64;
    let mut nb = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += *x as f64 * *y as f64;
        na += *x as f64 * *x as f64;
        nb += *y as f64 * *y as f64;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}
