use std::collections::HashSet;

/// Identifiers of every record seen during a session.
///
/// Grows monotonically; nothing is ever removed.
#[derive(Debug, Default, Clone)]
pub struct PostIdSet {
    seen: HashSet<String>,
}

impl PostIdSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `id`, returning `false` if it had already been seen.
    pub fn insert(&mut self, id: &str) -> bool {
        if self.seen.contains(id) {
            return false;
        }
        self.seen.insert(id.to_string())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
