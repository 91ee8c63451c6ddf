//! Session dedup guard: tracks which stored offers were already touched in the
//! current batch run.
//!
//! Without it a second candidate resolving to the same stored offer would
//! overwrite the update just applied by an earlier candidate, losing the
//! earlier candidate's contribution to the merged set-valued fields.

use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct SessionGuard {
    touched: HashSet<i64>,
}

impl SessionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the id was not yet registered this run.
    pub fn register(&mut self, id: i64) -> bool {
        self.touched.insert(id)
    }

    pub fn touched_count(&self) -> usize {
        self.touched.len()
    }
}
