use crate::domain::comments::CommentPage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub cursor: Option<String>,
    pub limit: usize,
    pub(crate) generation: u64,
}

/// Tracks where the loaded depth-0 slice ends on the server side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorTracker {
    cursor: Option<String>,
    has_next: bool,
    in_flight: bool,
    generation: u64,
    pages_loaded: usize,
}

impl Default for CursorTracker {
    fn default() -> Self {
        Self {
            cursor: None,
            has_next: true,
            in_flight: false,
            generation: 0,
            pages_loaded: 0,
        }
    }
}

impl CursorTracker {
    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    pub fn has_next(&self) -> bool {
        self.has_next
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn pages_loaded(&self) -> usize {
        self.pages_loaded
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn first_page(&self, limit: usize) -> PageRequest {
        PageRequest {
            cursor: None,
            limit,
            generation: self.generation,
        }
    }

    pub(crate) fn next_page(&mut self, limit: usize) -> Option<PageRequest> {
        if !self.has_next || self.in_flight {
            return None;
        }
        self.in_flight = true;
        Some(PageRequest {
            cursor: self.cursor.clone(),
            limit,
            generation: self.generation,
        })
    }

    pub(crate) fn is_current(&self, request: &PageRequest) -> bool {
        request.generation == self.generation
    }

    pub(crate) fn finish_next_page(&mut self, request: &PageRequest, page: Option<&CommentPage>) {
        if !self.is_current(request) {
            return;
        }
        self.in_flight = false;
        if let Some(page) = page {
            self.advance(page);
        }
    }

    /// Starts over from the given first page; in-flight requests become stale.
    pub(crate) fn reset_to(&mut self, page: &CommentPage) {
        self.generation += 1;
        self.in_flight = false;
        self.pages_loaded = 0;
        self.advance(page);
    }

    fn advance(&mut self, page: &CommentPage) {
        self.cursor = page.next_cursor.clone();
        self.has_next = page.has_next && page.next_cursor.is_some();
        self.pages_loaded += 1;
    }
}
