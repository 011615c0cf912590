//! In-memory vector store
//!
//! Brute-force cosine similarity over every stored chunk. Suitable for tests
//! and small corpora; filters are evaluated with [`Filter::matches`].
//!
//! [`Filter::matches`]: ragline_core::Filter::matches

use async_trait::async_trait;
use parking_lot::RwLock;
use ragline_core::{Candidate, Chunk, Error, Result, VectorQuery, VectorStore};
use std::cmp::Ordering;

/// In-memory store, insertion ordered
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    chunks: RwLock<Vec<Chunk>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.chunks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn cosine_sim(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a < f32::EPSILON || mag_b < f32::EPSILON {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn query(&self, query: VectorQuery) -> Result<Vec<Candidate>> {
        if query.top_k == 0 {
            return Ok(Vec::new());
        }

        let chunks = self.chunks.read();
        let mut candidates: Vec<Candidate> = chunks
            .iter()
            .filter(|chunk| query.filter.as_ref().map_or(true, |f| f.matches(chunk)))
            .filter_map(|chunk| {
                let vector = chunk.embedding.as_ref()?;
                let mut chunk = chunk.clone();
                if !query.include_metadata {
                    chunk.metadata = Default::default();
                }
                Some(Candidate {
                    raw_score: cosine_sim(&query.vector, vector),
                    chunk,
                })
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.raw_score
                .partial_cmp(&a.raw_score)
                .unwrap_or(Ordering::Equal)
        });
        candidates.truncate(query.top_k);
        Ok(candidates)
    }

    async fn upsert(&self, new_chunks: Vec<Chunk>) -> Result<()> {
        if let Some(missing) = new_chunks.iter().find(|c| c.embedding.is_none()) {
            return Err(Error::InvalidInput(format!(
                "chunk {} has no embedding",
                missing.id
            )));
        }

        let mut chunks = self.chunks.write();
        for chunk in new_chunks {
            match chunks.iter_mut().find(|c| c.id == chunk.id) {
                Some(existing) => *existing = chunk,
                None => chunks.push(chunk),
            }
        }
        Ok(())
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        self.chunks.write().retain(|c| !ids.contains(&c.id));
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Chunk>> {
        Ok(self.chunks.read().iter().find(|c| c.id == id).cloned())
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}
