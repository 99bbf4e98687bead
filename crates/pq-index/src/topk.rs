//! Bounded ordered top-k buffer.
use pq_types::{Id, IdDist};

/// A candidate slot: `id == -1` marks an unfilled sentinel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Candidate {
    pub id: Id,
    pub dist: f32,
}

/// Fixed-capacity, ascending-sorted buffer of the `k` smallest-distance
/// candidates seen so far. `offer` is the only mutator; callers own
/// serializing access across concurrent writers.
///
/// Sentinel distance is `f32::INFINITY` rather than a clamped constant like
/// `100.0` — a clamp like that only works if every query vector is known to
/// be L2-normalized (bounded squared distance of 4), and silently breaks
/// otherwise.
#[derive(Clone, Debug)]
pub struct TopK {
    entries: Vec<Candidate>,
}

impl TopK {
    pub fn new(k: usize) -> Self {
        Self {
            entries: vec![
                Candidate {
                    id: -1,
                    dist: f32::INFINITY
                };
                k
            ],
        }
    }

    pub fn k(&self) -> usize {
        self.entries.len()
    }

    /// Current worst (last) distance; offers at or above this are ignored.
    pub fn worst(&self) -> f32 {
        self.entries.last().map(|c| c.dist).unwrap_or(f32::INFINITY)
    }

    /// Inserts `(id, dist)` into sorted position if it beats the current
    /// worst, shifting the tail right and dropping the former last slot.
    /// Ties keep earlier insertions earlier (stable: strictly `<`, not
    /// `<=`, drives the insertion point).
    pub fn offer(&mut self, id: Id, dist: f32) {
        if dist >= self.worst() {
            return;
        }
        let pos = self
            .entries
            .iter()
            .position(|c| dist < c.dist)
            .unwrap_or(self.entries.len());
        self.entries.insert(pos, Candidate { id, dist });
        self.entries.pop();
    }

    /// Emits the top-k in ascending distance order, consuming the buffer.
    pub fn into_results(self) -> Vec<IdDist> {
        self.entries
            .into_iter()
            .map(|c| IdDist {
                id: c.id,
                dist: c.dist,
            })
            .collect()
    }

    pub fn as_slice(&self) -> &[Candidate] {
        &self.entries
    }
}
