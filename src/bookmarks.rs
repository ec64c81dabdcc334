use std::collections::HashSet;

use crate::models::Event;
use crate::storage::Storage;

/// Saved event identifiers, written through to storage on every mutation.
pub struct BookmarkManager {
    bookmarks: HashSet<String>,
    storage: Storage,
}

impl BookmarkManager {
    pub fn load(storage: Storage) -> Self {
        let bookmarks = storage.load_bookmarks();
        Self { bookmarks, storage }
    }

    /// Returns whether `id` is bookmarked after the toggle.
    pub fn toggle(&mut self, id: &str) -> bool {
        let bookmarked = if self.bookmarks.remove(id) {
            false
        } else {
            self.bookmarks.insert(id.to_string());
            true
        };
        self.storage.save_bookmarks(&self.bookmarks);
        bookmarked
    }

    pub fn has(&self, id: &str) -> bool {
        self.bookmarks.contains(id)
    }

    /// Sorted identifiers.
    pub fn all(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.bookmarks.iter().cloned().collect();
        ids.sort();
        ids
    }

    pub fn count(&self) -> usize {
        self.bookmarks.len()
    }

    /// Drops every bookmark once `confirm` agrees. `confirm` receives the
    /// current count.
    pub fn clear<F>(&mut self, confirm: F) -> bool
    where
        F: FnOnce(usize) -> bool,
    {
        if !confirm(self.bookmarks.len()) {
            return false;
        }
        self.bookmarks.clear();
        self.storage.save_bookmarks(&self.bookmarks);
        tracing::info!("bookmarks cleared");
        true
    }

    /// First loaded event for each bookmarked identifier, in list order.
    pub fn bookmarked_events<'a>(&self, events: &'a [Event]) -> Vec<&'a Event> {
        let mut seen = HashSet::new();
        events
            .iter()
            .filter(|e| self.has(&e.url) && seen.insert(e.url.as_str()))
            .collect()
    }

    /// Bookmarked identifiers with no loaded event.
    pub fn missing_count(&self, events: &[Event]) -> usize {
        let listed: HashSet<&str> = events.iter().map(|e| e.url.as_str()).collect();
        self.bookmarks
            .iter()
            .filter(|id| !listed.contains(id.as_str()))
            .count()
    }
}
