pub mod bookmarks;
mod cli;
pub mod config;
pub mod events;
pub mod filter;
pub mod geo;
pub mod geolocation;
pub mod models;
pub mod scraping;
pub mod storage;
mod utils;

use chrono::DateTime;
use chrono_tz::Tz;

use bookmarks::BookmarkManager;
use config::CalendarConfig;
use events::EventManager;
use filter::FilterEngine;
use geolocation::{LocationCache, LocationResult};
use models::{Coordinate, Event};
use scraping::EventSource;
use storage::Storage;

pub use cli::run;

/// Owns every manager for one session and wires them together.
pub struct Calendar {
    config: CalendarConfig,
    storage: Storage,
    events: EventManager,
    filters: FilterEngine,
    bookmarks: BookmarkManager,
    location: LocationCache,
}

impl Calendar {
    /// Loads events, restores saved filter preferences and bookmarks.
    pub fn open(config: CalendarConfig, storage: Storage, source: &dyn EventSource) -> Self {
        let tz = config.tz();
        let events = EventManager::load(source, tz);
        let mut filters = FilterEngine::new(&config);
        if let Some(saved) = storage.load_prefs() {
            filters.import_value(&saved);
        }
        let bookmarks = BookmarkManager::load(storage.clone());
        Self {
            config,
            storage,
            events,
            filters,
            bookmarks,
            location: LocationCache::default(),
        }
    }

    pub fn config(&self) -> &CalendarConfig {
        &self.config
    }

    pub fn events(&self) -> &EventManager {
        &self.events
    }

    pub fn filters(&self) -> &FilterEngine {
        &self.filters
    }

    pub fn filters_mut(&mut self) -> &mut FilterEngine {
        &mut self.filters
    }

    pub fn bookmarks(&self) -> &BookmarkManager {
        &self.bookmarks
    }

    pub fn bookmarks_mut(&mut self) -> &mut BookmarkManager {
        &mut self.bookmarks
    }

    pub fn user_location(&self) -> Option<Coordinate> {
        self.location.location()
    }

    /// Records the session's location outcome. Returns a message for the user
    /// when the location could not be obtained.
    pub fn set_user_location(&mut self, result: LocationResult) -> Option<&'static str> {
        self.location.settle(result);
        self.location.error().map(|err| err.user_message())
    }

    pub fn save_prefs(&self) {
        self.storage.save_prefs(&self.filters.export());
    }

    /// Deletes saved preferences and bookmarks and returns to config defaults.
    pub fn reset(&mut self) {
        self.storage.clear();
        self.filters = FilterEngine::new(&self.config);
        self.bookmarks = BookmarkManager::load(self.storage.clone());
        self.events.reset_filter();
        tracing::info!("calendar state reset");
    }

    /// Recomputes the filtered subset from the full list.
    pub fn refresh(&mut self) -> &[Event] {
        let now = self.filters.now();
        self.refresh_at(now)
    }

    pub fn refresh_at(&mut self, now: DateTime<Tz>) -> &[Event] {
        let filtered =
            self.filters
                .filter_events_at(self.events.all(), self.user_location(), now);
        self.events.set_filtered(filtered);
        self.events.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{Radius, TimeRange};
    use crate::geolocation::LocationError;
    use crate::scraping::StaticSource;
    use chrono::{NaiveDate, NaiveTime, TimeZone};

    fn event(url: &str, categories: &[&str], coords: Option<Coordinate>) -> Event {
        Event {
            url: url.to_string(),
            title: url.to_string(),
            description: String::new(),
            date: NaiveDate::from_ymd_opt(2025, 6, 4).unwrap(),
            time: NaiveTime::from_hms_opt(21, 0, 0),
            location: "Galeriehaus".to_string(),
            coords,
            categories: categories.iter().map(|c| c.to_string()).collect(),
            image_url: None,
        }
    }

    fn now() -> DateTime<Tz> {
        chrono_tz::Europe::Berlin
            .with_ymd_and_hms(2025, 6, 4, 18, 0, 0)
            .single()
            .expect("valid now")
    }

    fn source() -> StaticSource {
        StaticSource::new(vec![
            event("near", &["Musik"], Some(Coordinate::new(50.3200, 11.9170))),
            event("far", &["Musik"], Some(Coordinate::new(50.5, 11.9170))),
            event("sport", &["Sport"], None),
        ])
    }

    #[test]
    fn preferences_survive_a_new_session() {
        let storage = Storage::in_memory();
        let mut calendar = Calendar::open(CalendarConfig::default(), storage.clone(), &source());
        calendar.filters_mut().toggle_category("Musik");
        calendar.filters_mut().set_time_range(TimeRange::Unlimited);
        calendar.save_prefs();

        let reopened = Calendar::open(CalendarConfig::default(), storage, &source());
        assert!(reopened.filters().has_category("Musik"));
        assert_eq!(*reopened.filters().time_range(), TimeRange::Unlimited);
    }

    #[test]
    fn radius_applies_once_location_is_known() {
        let mut calendar =
            Calendar::open(CalendarConfig::default(), Storage::in_memory(), &source());
        calendar.filters_mut().set_radius(Radius::Km(3.0));
        assert_eq!(calendar.refresh_at(now()).len(), 3);

        let message = calendar.set_user_location(Ok(Coordinate::new(50.3197, 11.9168)));
        assert_eq!(message, None);
        let urls: Vec<&str> = calendar
            .refresh_at(now())
            .iter()
            .map(|e| e.url.as_str())
            .collect();
        assert_eq!(urls, vec!["near", "sport"]);
        assert_eq!(calendar.events().all().len(), 3);
    }

    #[test]
    fn location_failure_leaves_radius_inactive() {
        let mut calendar =
            Calendar::open(CalendarConfig::default(), Storage::in_memory(), &source());
        calendar.filters_mut().set_radius(Radius::Km(1.0));
        let message = calendar.set_user_location(Err(LocationError::Denied));
        assert!(message.is_some());
        assert_eq!(calendar.user_location(), None);
        assert_eq!(calendar.refresh_at(now()).len(), 3);
    }

    #[test]
    fn reset_drops_saved_state() {
        let storage = Storage::in_memory();
        let mut calendar = Calendar::open(CalendarConfig::default(), storage.clone(), &source());
        calendar.filters_mut().toggle_category("Sport");
        calendar.save_prefs();
        calendar.bookmarks_mut().toggle("near");
        assert_eq!(calendar.refresh_at(now()).len(), 1);

        calendar.reset();
        assert!(calendar.filters().criteria().categories.is_empty());
        assert_eq!(calendar.bookmarks().count(), 0);
        assert_eq!(calendar.events().current().len(), 3);

        let reopened = Calendar::open(CalendarConfig::default(), storage, &source());
        assert!(!reopened.filters().has_category("Sport"));
        assert_eq!(reopened.bookmarks().count(), 0);
    }

    #[test]
    fn empty_source_yields_empty_calendar() {
        let mut calendar = Calendar::open(
            CalendarConfig::default(),
            Storage::in_memory(),
            &StaticSource::new(Vec::new()),
        );
        assert!(calendar.refresh_at(now()).is_empty());
    }
}
