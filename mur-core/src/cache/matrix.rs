//! Packed embedding matrix
//!
//! Vectors live in two contiguous row-major `f32` buffers: `data` holds
//! the raw rows, `normed` the unit-length rows. Pre-normalizing once means
//! cosine similarity against a normalized query is a single dot product
//! per row.

use crate::embeddings::similarity::normalize_vector;
use crate::{Error, Result};

/// Contiguous matrix of pattern vectors with row-to-id mapping.
#[derive(Debug, Default)]
pub struct EmbeddingMatrix {
    data: Vec<f32>,
    normed: Vec<f32>,
    ids: Vec<String>,
    dim: usize,
}

impl EmbeddingMatrix {
    /// Create an empty matrix with a fixed dimensionality.
    #[must_use]
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            ..Default::default()
        }
    }

    /// Append one row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Integrity`] when the vector's length disagrees
    /// with the matrix dimensionality.
    pub fn push(&mut self, id: String, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dim {
            return Err(Error::Integrity(format!(
                "vector for {id} has dimension {}, matrix holds {}",
                vector.len(),
                self.dim
            )));
        }
        self.data.extend_from_slice(vector);
        self.normed.extend(normalize_vector(vector.to_vec()));
        self.ids.push(id);
        Ok(())
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the matrix holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// The fixed dimensionality.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// The pattern id of row `i`.
    #[must_use]
    pub fn id(&self, i: usize) -> Option<&str> {
        self.ids.get(i).map(String::as_str)
    }

    /// Normalized row `i`.
    #[must_use]
    pub fn normed_row(&self, i: usize) -> Option<&[f32]> {
        if i < self.len() {
            Some(&self.normed[i * self.dim..(i + 1) * self.dim])
        } else {
            None
        }
    }

    /// Top-k rows by cosine similarity to `query`.
    ///
    /// The query is normalized once; each row then costs one dot product.
    /// A query with the wrong dimensionality yields an empty result, not
    /// an error.
    #[must_use]
    pub fn search(&self, query: &[f32], top_k: usize) -> Vec<(String, f32)> {
        if query.len() != self.dim || self.is_empty() || top_k == 0 {
            return Vec::new();
        }
        let query = normalize_vector(query.to_vec());

        let mut scored: Vec<(String, f32)> = (0..self.len())
            .map(|i| {
                let row = &self.normed[i * self.dim..(i + 1) * self.dim];
                let score: f32 = row.iter().zip(query.iter()).map(|(a, b)| a * b).sum();
                (self.ids[i].clone(), score)
            })
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        scored
    }

    /// All pairs over the upper triangle with similarity at or above
    /// `threshold`.
    #[must_use]
    pub fn similar_pairs(&self, threshold: f32) -> Vec<(String, String, f32)> {
        let mut pairs = Vec::new();
        for i in 0..self.len() {
            let row_i = &self.normed[i * self.dim..(i + 1) * self.dim];
            for j in (i + 1)..self.len() {
                let row_j = &self.normed[j * self.dim..(j + 1) * self.dim];
                let score: f32 = row_i.iter().zip(row_j.iter()).map(|(a, b)| a * b).sum();
                if score >= threshold {
                    pairs.push((self.ids[i].clone(), self.ids[j].clone(), score));
                }
            }
        }
        pairs
    }
}
