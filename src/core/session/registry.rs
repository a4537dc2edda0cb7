// src/core/session/registry.rs
use std::collections::HashSet;

use parking_lot::RwLock;

/// Subjects that completed verification during this process's lifetime.
/// Membership only grows.
#[derive(Default)]
pub struct VerifiedRegistry {
    subjects: RwLock<HashSet<String>>,
}

impl VerifiedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the subject was not yet registered.
    pub fn insert(&self, subject_id: &str) -> bool {
        self.subjects.write().insert(subject_id.to_string())
    }

    pub fn contains(&self, subject_id: &str) -> bool {
        self.subjects.read().contains(subject_id)
    }

    pub fn list(&self) -> Vec<String> {
        let mut subjects: Vec<String> = self.subjects.read().iter().cloned().collect();
        subjects.sort();
        subjects
    }

    pub fn len(&self) -> usize {
        self.subjects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
