pub mod base;
pub mod html_cards;

use crate::models::Event;

pub use html_cards::{HtmlCardSource, HtmlOrigin};

/// Produces the full event list once per session.
pub trait EventSource: Send + Sync {
    fn name(&self) -> String;
    fn load(&self) -> anyhow::Result<Vec<Event>>;
}

/// Fixed in-memory list, for embedding callers and tests.
pub struct StaticSource {
    events: Vec<Event>,
}

impl StaticSource {
    pub fn new(events: Vec<Event>) -> Self {
        Self { events }
    }
}

impl EventSource for StaticSource {
    fn name(&self) -> String {
        "static list".to_string()
    }

    fn load(&self) -> anyhow::Result<Vec<Event>> {
        Ok(self.events.clone())
    }
}

/// Loads `source`, degrading to an empty list when it fails.
pub fn load_or_empty(source: &dyn EventSource) -> Vec<Event> {
    match source.load() {
        Ok(events) => {
            tracing::info!("loaded {} events from {}", events.len(), source.name());
            events
        }
        Err(err) => {
            tracing::warn!("event source {} failed: {err:#}", source.name());
            Vec::new()
        }
    }
}
