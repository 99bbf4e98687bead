//! Visited set of already-probed coarse-centroid ids.
use pq_types::Id;
use std::collections::HashSet;

/// Small growable set of coarse-centroid ids probed during one IVFADC
/// invocation. A `HashSet` gives O(1) membership; callers only depend on
/// the set semantics, not a particular representation.
#[derive(Clone, Debug, Default)]
pub struct VisitedSet {
    ids: HashSet<Id>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: Id) -> bool {
        self.ids.contains(&id)
    }

    pub fn insert(&mut self, id: Id) {
        self.ids.insert(id);
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
