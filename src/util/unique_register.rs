use std::hash::Hash;

use indexmap::IndexSet;

/// Hands out one stable index per distinct value, in first-insertion order.
#[derive(Debug, Clone)]
pub struct UniqueRegister<T> {
    set: IndexSet<T, ahash::RandomState>,
}

impl<T: Hash + Eq> Default for UniqueRegister<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Hash + Eq> UniqueRegister<T> {
    pub fn new() -> Self {
        Self {
            set: IndexSet::default(),
        }
    }

    pub fn insert(&mut self, value: T) -> usize {
        self.set.insert_full(value).0
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.set.iter()
    }
}
