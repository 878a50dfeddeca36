//! Bounded window of recently-seen event ids.
//!
//! The chat transport redelivers events, so every inbound event id passes
//! through this gate before any side-effecting command runs.

use std::collections::HashSet;
use std::sync::Mutex;

/// Default window size, matching the transport's redelivery horizon.
pub const DEFAULT_CAPACITY: usize = 1000;

pub struct DedupGate {
    capacity: usize,
    seen: Mutex<HashSet<String>>,
}

impl DedupGate {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            seen: Mutex::new(HashSet::new()),
        }
    }

    /// Atomic check-and-insert. Returns `false` if `id` was already in the
    /// window (the caller drops the event), `true` after inserting it.
    ///
    /// When the window exceeds capacity it is cleared wholesale, lossy but
    /// memory-bounded, and redeliveries arrive well inside the window.
    pub fn insert(&self, id: &str) -> bool {
        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        if seen.contains(id) {
            return false;
        }
        if seen.len() >= self.capacity {
            seen.clear();
        }
        seen.insert(id.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DedupGate {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_insert_returns_true_then_false() {
        let gate = DedupGate::new(10);
        assert!(gate.insert("om_1"));
        assert!(!gate.insert("om_1"));
        assert!(!gate.insert("om_1"));
        assert_eq!(gate.len(), 1);
    }

    #[test]
    fn distinct_ids_pass() {
        let gate = DedupGate::new(10);
        assert!(gate.insert("a"));
        assert!(gate.insert("b"));
        assert_eq!(gate.len(), 2);
    }

    #[test]
    fn window_clears_when_full() {
        let gate = DedupGate::new(3);
        assert!(gate.insert("a"));
        assert!(gate.insert("b"));
        assert!(gate.insert("c"));
        // Fourth id trips the clear, then inserts.
        assert!(gate.insert("d"));
        assert_eq!(gate.len(), 1);
        // Ids dropped by the clear are admitted again.
        assert!(gate.insert("a"));
    }

    #[test]
    fn gate_is_shareable_across_threads() {
        use std::sync::Arc;

        let gate = Arc::new(DedupGate::new(100));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let gate = Arc::clone(&gate);
            handles.push(std::thread::spawn(move || gate.insert("same-id")));
        }
        let passed = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|admitted| *admitted)
            .count();
        // Exactly one thread wins the check-and-insert.
        assert_eq!(passed, 1);
    }
}
