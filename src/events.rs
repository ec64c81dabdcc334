use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;

use crate::models::{Event, EventStats};
use crate::scraping::{self, EventSource};

/// Full event list loaded once, plus the subset produced by the latest filter pass.
pub struct EventManager {
    all_events: Vec<Event>,
    events: Vec<Event>,
    tz: Tz,
}

impl EventManager {
    pub fn new(all_events: Vec<Event>, tz: Tz) -> Self {
        Self {
            events: all_events.clone(),
            all_events,
            tz,
        }
    }

    pub fn load(source: &dyn EventSource, tz: Tz) -> Self {
        Self::new(scraping::load_or_empty(source), tz)
    }

    pub fn all(&self) -> &[Event] {
        &self.all_events
    }

    pub fn current(&self) -> &[Event] {
        &self.events
    }

    pub fn reset_filter(&mut self) {
        self.events = self.all_events.clone();
    }

    pub fn set_filtered(&mut self, filtered: Vec<Event>) {
        self.events = filtered;
    }

    pub fn upcoming(&self, now: DateTime<Tz>, limit: Option<usize>) -> Vec<&Event> {
        let mut upcoming: Vec<&Event> = self
            .events
            .iter()
            .filter(|e| e.starts_at(self.tz) >= now)
            .collect();
        upcoming.sort_by_key(|e| e.starts_at(self.tz));
        if let Some(limit) = limit {
            upcoming.truncate(limit);
        }
        upcoming
    }

    /// Sorts the current subset in place by start instant.
    pub fn sort_by_date(&mut self, ascending: bool) -> &[Event] {
        let tz = self.tz;
        self.events.sort_by_key(|e| e.starts_at(tz));
        if !ascending {
            self.events.reverse();
        }
        &self.events
    }

    pub fn on_date(&self, date: NaiveDate) -> Vec<&Event> {
        self.events.iter().filter(|e| e.date == date).collect()
    }

    pub fn by_category(&self, category: &str) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.has_category(category))
            .collect()
    }

    pub fn by_location(&self, location: &str) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.location == location)
            .collect()
    }

    pub fn stats(&self, now: DateTime<Tz>) -> EventStats {
        let upcoming = self
            .events
            .iter()
            .filter(|e| e.starts_at(self.tz) >= now)
            .count();

        let mut categories: Vec<String> = Vec::new();
        let mut locations: Vec<String> = Vec::new();
        for event in &self.all_events {
            for category in &event.categories {
                if !categories.contains(category) {
                    categories.push(category.clone());
                }
            }
            if !event.location.is_empty() && !locations.contains(&event.location) {
                locations.push(event.location.clone());
            }
        }

        EventStats {
            total: self.all_events.len(),
            filtered: self.events.len(),
            upcoming,
            past: self.events.len() - upcoming,
            categories,
            locations,
        }
    }
}
