//! Exact top-k search over a snapshot
//!
//! Brute force on purpose: every candidate row is scored, so results are
//! exact and reproducible. Cost is O(N * D) per query.

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::Snapshot;
use crate::error::SearchError;
use crate::storage::Priority;

/// One search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub score: f32,
    pub source_path: String,
    pub kind: String,
    pub chunk_index: i64,
    pub priority: Priority,
    pub text: String,
}

/// Candidate row ordered best-first: higher score, then lower row index
#[derive(Debug, Clone, Copy)]
struct Candidate {
    row: usize,
    score: f32,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| self.row.cmp(&other.row))
    }
}

impl Snapshot {
    /// Top-`k` rows by cosine similarity to `query`.
    ///
    /// `query` must already be unit length. With `kind` set, only rows of that
    /// kind are candidates; no match yields an empty result. `k` larger than
    /// the candidate count is clamped. Equal scores keep insertion order.
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        kind: Option<&str>,
    ) -> Result<Vec<ScoredChunk>, SearchError> {
        if query.len() != self.dim() {
            return Err(SearchError::QueryDimension {
                expected: self.dim(),
                found: query.len(),
            });
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let query = ArrayView1::from(query);
        let mut candidates: Vec<Candidate> = match kind {
            None => self
                .embeddings
                .dot(&query)
                .iter()
                .enumerate()
                .map(|(row, &score)| Candidate { row, score })
                .collect(),
            Some(kind) => self
                .kinds
                .iter()
                .enumerate()
                .filter(|(_, row_kind)| row_kind.as_str() == kind)
                .map(|(row, _)| Candidate {
                    row,
                    score: self.embeddings.row(row).dot(&query),
                })
                .collect(),
        };

        let top = top_k(&mut candidates, k);
        Ok(top.iter().map(|c| self.hit(c)).collect())
    }

    fn hit(&self, candidate: &Candidate) -> ScoredChunk {
        let row = candidate.row;
        ScoredChunk {
            score: candidate.score,
            source_path: self.source_paths[row].clone(),
            kind: self.kinds[row].clone(),
            chunk_index: self.chunk_indices[row],
            priority: self.priorities[row],
            text: self.texts[row].clone(),
        }
    }
}

/// Partial selection of the best `k`, then a sort of just those
fn top_k(candidates: &mut Vec<Candidate>, k: usize) -> &[Candidate] {
    let k = k.min(candidates.len());
    if k == 0 {
        return &[];
    }
    if k < candidates.len() {
        candidates.select_nth_unstable(k - 1);
        candidates.truncate(k);
    }
    candidates.sort_unstable();
    candidates
}
