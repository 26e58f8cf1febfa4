use chrono::{DateTime, Utc};

use crate::domain::comments::CommentId;

/// Hands out negative ids for optimistic comments. Seeded from the clock and
/// strictly decreasing, so ids never repeat within a cache and never collide
/// with server-issued (positive) ids.
#[derive(Debug, Clone, Default)]
pub struct SyntheticIds {
    last: Option<i64>,
}

impl SyntheticIds {
    pub fn next(&mut self, now: DateTime<Utc>) -> CommentId {
        let seed = -now.timestamp_millis().max(1);
        let id = match self.last {
            Some(last) => seed.min(last.saturating_sub(1)),
            None => seed,
        };
        self.last = Some(id);
        CommentId(id)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::testing::ts;

    #[test]
    fn ids_are_negative_and_unique_at_the_same_instant() {
        let mut ids = SyntheticIds::default();
        let now = ts(5);
        let issued: HashSet<CommentId> = (0..100).map(|_| ids.next(now)).collect();
        assert_eq!(issued.len(), 100);
        assert!(issued.iter().all(|id| id.is_synthetic()));
    }

    #[test]
    fn ids_keep_decreasing_when_clock_goes_back() {
        let mut ids = SyntheticIds::default();
        let first = ids.next(ts(5));
        let second = ids.next(ts(1));
        assert!(second < first);
    }
}
