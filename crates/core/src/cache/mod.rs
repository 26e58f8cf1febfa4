mod cursor;
mod mutation;
mod pagination;
mod reconcile;
mod synthetic;

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::domain::comments::{CommentId, TargetId};
use crate::error::CacheError;
use crate::tree::Forest;

pub use cursor::{CursorTracker, PageRequest};
pub use mutation::{PendingCreate, PendingDelete, PendingEdit};
pub use pagination::LoadMore;
pub use reconcile::Refresh;
pub use synthetic::SyntheticIds;

pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
enum InFlight {
    Create,
    Edit {
        body: String,
        updated_at: DateTime<Utc>,
    },
    /// Ancestors of the removed comment, root first.
    Delete { ancestors: Vec<CommentId> },
}

/// Client-side state of one comment thread.
///
/// Every user intent is split in two synchronous halves: `begin_*` applies
/// the optimistic change and hands back a ticket describing the remote call
/// to make, `settle_*` takes that ticket with the remote outcome and either
/// confirms or rolls back. Nothing here awaits, so callers decide how the
/// cache is shared and when remote calls run.
#[derive(Debug, Clone)]
pub struct CommentCache {
    target: TargetId,
    page_size: usize,
    forest: Forest,
    cursor: CursorTracker,
    in_flight: HashMap<CommentId, InFlight>,
    synthetic: SyntheticIds,
}

impl CommentCache {
    pub fn new(target: TargetId, page_size: usize) -> Self {
        Self {
            target,
            page_size: page_size.max(1),
            forest: Forest::new(),
            cursor: CursorTracker::default(),
            in_flight: HashMap::new(),
            synthetic: SyntheticIds::default(),
        }
    }

    pub fn target(&self) -> TargetId {
        self.target
    }

    pub fn forest(&self) -> &Forest {
        &self.forest
    }

    /// Cheap handle on the current tree; later edits never show through it.
    pub fn snapshot(&self) -> Forest {
        self.forest.clone()
    }

    pub fn cursor(&self) -> &CursorTracker {
        &self.cursor
    }

    pub fn is_in_flight(&self, id: CommentId) -> bool {
        self.in_flight.contains_key(&id)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Optimistic comments still waiting for a server id.
    pub fn pending_creates(&self) -> usize {
        self.in_flight
            .values()
            .filter(|pending| matches!(pending, InFlight::Create))
            .count()
    }

    fn guard(&self, id: CommentId) -> Result<(), CacheError> {
        if self.in_flight.contains_key(&id) {
            return Err(CacheError::OperationInProgress(id));
        }
        Ok(())
    }
}
