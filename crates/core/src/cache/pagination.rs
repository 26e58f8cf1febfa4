use std::fmt::Display;

use tracing::debug;

use crate::cache::{CommentCache, PageRequest};
use crate::domain::comments::CommentPage;
use crate::error::{CacheError, Operation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMore {
    Appended {
        appended: usize,
        skipped: usize,
        has_next: bool,
    },
    /// The thread was refreshed while the page was in flight.
    Stale,
}

impl CommentCache {
    /// `None` when there is nothing more to load or a page is already on its
    /// way.
    pub fn begin_load_more(&mut self) -> Option<PageRequest> {
        self.cursor.next_page(self.page_size)
    }

    pub fn settle_load_more<E: Display>(
        &mut self,
        request: PageRequest,
        outcome: Result<CommentPage, E>,
    ) -> Result<LoadMore, CacheError> {
        if !self.cursor.is_current(&request) {
            debug!(
                request_generation = request.generation,
                generation = self.cursor.generation(),
                "dropping page from before the last refresh"
            );
            return Ok(LoadMore::Stale);
        }
        let mut page = match outcome {
            Ok(page) => page,
            Err(err) => {
                self.cursor.finish_next_page(&request, None);
                return Err(CacheError::remote(Operation::FetchPage, err));
            }
        };
        self.cursor.finish_next_page(&request, Some(&page));

        let received = page.nodes.len();
        let nodes = self.apply_pending(std::mem::take(&mut page.nodes));
        let (forest, appended) = self.forest.append_top_many(nodes);
        self.forest = forest;
        let skipped = received - appended;
        if skipped > 0 {
            debug!(skipped, "page overlapped comments already loaded");
        }
        Ok(LoadMore::Appended {
            appended,
            skipped,
            has_next: self.cursor.has_next(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::comments::{CommentId, CommentNode, CreatedComment, TargetId};
    use crate::testing::{author, ids, node, page, sample_roots, ts, with_children};

    fn load(cache: &mut CommentCache, nodes: Vec<CommentNode>, cursor: Option<&str>) -> LoadMore {
        let request = cache.begin_load_more().unwrap();
        cache
            .settle_load_more(
                request,
                Ok::<_, String>(page(nodes, cursor, cursor.is_some())),
            )
            .unwrap()
    }

    #[test]
    fn pages_append_in_order_and_overlap_is_dropped() {
        let mut cache = CommentCache::new(TargetId(1), 3);
        load(&mut cache, vec![node(1, None), node(2, None), node(3, None)], Some("p2"));
        let request = cache.begin_load_more().unwrap();
        assert_eq!(request.cursor.as_deref(), Some("p2"));
        let outcome = cache
            .settle_load_more(
                request,
                Ok::<_, String>(page(vec![node(4, None), node(5, None)], Some("p3"), true)),
            )
            .unwrap();
        assert_eq!(
            outcome,
            LoadMore::Appended {
                appended: 2,
                skipped: 0,
                has_next: true,
            }
        );
        assert_eq!(ids(cache.forest().roots()), vec![1, 2, 3, 4, 5]);

        let outcome = load(&mut cache, vec![node(3, None), node(4, None), node(5, None)], None);
        assert_eq!(
            outcome,
            LoadMore::Appended {
                appended: 0,
                skipped: 3,
                has_next: false,
            }
        );
        assert_eq!(ids(cache.forest().roots()), vec![1, 2, 3, 4, 5]);
        assert!(cache.begin_load_more().is_none());
    }

    #[test]
    fn load_more_is_single_flight() {
        let mut cache = CommentCache::new(TargetId(1), 3);
        let first = cache.begin_load_more();
        assert!(first.is_some());
        assert!(cache.begin_load_more().is_none());
    }

    #[test]
    fn load_more_leaves_loaded_children_alone() {
        let mut cache = CommentCache::new(TargetId(1), 3);
        load(&mut cache, sample_roots(), Some("p2"));
        let before = cache.forest().find(CommentId(1)).unwrap().clone();
        let stale_copy = with_children(node(1, None), vec![node(9, Some(1))]);
        load(&mut cache, vec![stale_copy, node(6, None)], None);
        assert_eq!(cache.forest().find(CommentId(1)).unwrap(), &before);
        assert!(!cache.forest().contains(CommentId(9)));
        assert_eq!(ids(cache.forest().roots()), vec![1, 4, 6]);
    }

    #[test]
    fn just_created_comment_is_not_duplicated_by_stale_page() {
        let mut cache = CommentCache::new(TargetId(1), 3);
        load(&mut cache, vec![node(1, None), node(2, None)], Some("p2"));
        let pending = cache.begin_create(&author(), None, "mine", ts(9)).unwrap();
        cache
            .settle_create(
                pending,
                Ok::<_, String>(CreatedComment {
                    id: CommentId(10),
                    created_at: ts(9),
                }),
            )
            .unwrap();
        load(&mut cache, vec![node(10, None), node(3, None)], None);
        assert_eq!(ids(cache.forest().roots()), vec![10, 1, 2, 3]);
    }

    #[test]
    fn failed_page_can_be_retried() {
        let mut cache = CommentCache::new(TargetId(1), 3);
        load(&mut cache, vec![node(1, None)], Some("p2"));
        let request = cache.begin_load_more().unwrap();
        assert!(
            cache
                .settle_load_more(request, Err::<CommentPage, _>("502"))
                .is_err()
        );
        assert_eq!(ids(cache.forest().roots()), vec![1]);
        let retry = cache.begin_load_more().unwrap();
        assert_eq!(retry.cursor.as_deref(), Some("p2"));
    }

    #[test]
    fn page_from_before_refresh_is_dropped() {
        let mut cache = CommentCache::new(TargetId(1), 3);
        load(&mut cache, vec![node(1, None)], Some("p2"));
        let stale = cache.begin_load_more().unwrap();
        let refresh = cache.begin_refresh();
        cache
            .settle_refresh(refresh, Ok::<_, String>(page(vec![node(7, None)], Some("q2"), true)))
            .unwrap();
        let outcome = cache
            .settle_load_more(stale, Ok::<_, String>(page(vec![node(2, None)], None, false)))
            .unwrap();
        assert_eq!(outcome, LoadMore::Stale);
        assert_eq!(ids(cache.forest().roots()), vec![7]);
        assert_eq!(cache.cursor().cursor(), Some("q2"));
        assert!(cache.begin_load_more().is_some());
    }
}
