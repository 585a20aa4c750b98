//! Per-drawing change detection for host "changed" notifications
use std::collections::HashMap;

/// Object count seen for each drawing at its last refresh.
#[derive(Debug, Default)]
pub struct DrawingHistory {
    object_counts: HashMap<String, usize>,
}

impl DrawingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `object_count` and reports whether it differs from the
    /// previous record. A drawing seen for the first time counts as changed.
    pub fn record(&mut self, drawing_id: &str, object_count: usize) -> bool {
        match self.object_counts.insert(drawing_id.to_string(), object_count) {
            Some(previous) => previous != object_count,
            None => true,
        }
    }

    pub fn last_count(&self, drawing_id: &str) -> Option<usize> {
        self.object_counts.get(drawing_id).copied()
    }

    pub fn forget(&mut self, drawing_id: &str) {
        self.object_counts.remove(drawing_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_count_changes_are_reported() {
        let mut history = DrawingHistory::new();
        assert!(history.record("42", 10));
        assert!(!history.record("42", 10));
        assert!(history.record("42", 11));
        assert_eq!(history.last_count("42"), Some(11));

        history.forget("42");
        assert_eq!(history.last_count("42"), None);
    }
}
