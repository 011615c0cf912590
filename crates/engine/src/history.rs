//! Bounded conversation history
//!
//! Oldest turns are evicted first, so `len() <= capacity` always holds.
//! Appends are atomic with respect to reads.

use parking_lot::RwLock;
use ragline_core::ConversationTurn;
use std::collections::VecDeque;

/// Fixed-capacity turn history, oldest first
#[derive(Debug)]
pub struct ConversationHistory {
    turns: RwLock<VecDeque<ConversationTurn>>,
    capacity: usize,
}

impl ConversationHistory {
    /// A capacity of zero is raised to one
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            turns: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a turn, evicting the oldest while over capacity
    pub fn push(&self, turn: ConversationTurn) {
        let mut turns = self.turns.write();
        turns.push_back(turn);
        while turns.len() > self.capacity {
            turns.pop_front();
        }
    }

    /// The last `n` turns, oldest first
    pub fn recent(&self, n: usize) -> Vec<ConversationTurn> {
        let turns = self.turns.read();
        let skip = turns.len().saturating_sub(n);
        turns.iter().skip(skip).cloned().collect()
    }

    /// Snapshot of the whole history, or of its last `limit` turns
    pub fn snapshot(&self, limit: Option<usize>) -> Vec<ConversationTurn> {
        match limit {
            Some(n) => self.recent(n),
            None => self.turns.read().iter().cloned().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.turns.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.turns.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(i: usize) -> ConversationTurn {
        ConversationTurn::new(format!("q{}", i), format!("a{}", i))
    }

    fn queries(turns: &[ConversationTurn]) -> Vec<&str> {
        turns.iter().map(|t| t.query.as_str()).collect()
    }

    #[test]
    fn test_evicts_oldest() {
        let history = ConversationHistory::new(3);
        for i in 0..5 {
            history.push(turn(i));
            assert!(history.len() <= 3);
        }
        assert_eq!(queries(&history.snapshot(None)), vec!["q2", "q3", "q4"]);
    }

    #[test]
    fn test_recent_and_limit() {
        let history = ConversationHistory::new(10);
        for i in 0..4 {
            history.push(turn(i));
        }
        assert_eq!(queries(&history.recent(2)), vec!["q2", "q3"]);
        assert_eq!(queries(&history.snapshot(Some(10))), vec!["q0", "q1", "q2", "q3"]);
        assert!(history.recent(0).is_empty());
    }

    #[test]
    fn test_zero_capacity_keeps_one() {
        let history = ConversationHistory::new(0);
        history.push(turn(0));
        history.push(turn(1));
        assert_eq!(history.capacity(), 1);
        assert_eq!(queries(&history.snapshot(None)), vec!["q1"]);
    }

    #[test]
    fn test_clear() {
        let history = ConversationHistory::new(2);
        history.push(turn(0));
        history.clear();
        assert!(history.is_empty());
    }
}
