use sf_core::types::DEFAULT_RULE_ID_START;

/// Monotonic rule id generator owned by a parser.
///
/// Network, exception, cosmetic and scriptlet records all draw from the same
/// sequence. Ids are only consumed by lines that compile successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleIdSequence {
    next: u32,
}

impl Default for RuleIdSequence {
    fn default() -> Self {
        Self::new(DEFAULT_RULE_ID_START)
    }
}

impl RuleIdSequence {
    pub fn new(start: u32) -> Self {
        Self { next: start }
    }

    /// Hand out the next id.
    pub fn next_id(&mut self) -> u32 {
        let id = self.next;
        self.next = self.next.saturating_add(1);
        id
    }

    /// The id the next call to [`next_id`](Self::next_id) returns.
    pub fn peek(&self) -> u32 {
        self.next
    }

    /// Restart the sequence so repeated parses yield identical ids.
    pub fn reset(&mut self, start: u32) {
        self.next = start;
    }

    /// Make sure no future id collides with `id` or anything below it.
    pub fn advance_past(&mut self, id: u32) {
        if id >= self.next {
            self.next = id.saturating_add(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_default_seed() {
        let mut seq = RuleIdSequence::default();
        assert_eq!(seq.next_id(), 1000);
        assert_eq!(seq.next_id(), 1001);
        assert_eq!(seq.peek(), 1002);
    }

    #[test]
    fn reset_restarts_sequence() {
        let mut seq = RuleIdSequence::new(5);
        seq.next_id();
        seq.next_id();
        seq.reset(5);
        assert_eq!(seq.next_id(), 5);
    }

    #[test]
    fn advance_past_only_moves_forward() {
        let mut seq = RuleIdSequence::new(1000);
        seq.advance_past(1500);
        assert_eq!(seq.next_id(), 1501);
        seq.advance_past(10);
        assert_eq!(seq.next_id(), 1502);
    }
}
