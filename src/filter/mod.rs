pub mod cutoff;

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::CalendarConfig;
use crate::geo;
use crate::models::{Coordinate, Event};

pub use cutoff::{MoonPhase, TimeRange};

/// Radii at or above this are old "no limit" sentinels (999, 999999).
const LEGACY_UNLIMITED_KM: f64 = 999.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Radius {
    Km(f64),
    Unlimited,
}

impl Radius {
    pub fn from_km(km: f64) -> Option<Self> {
        if !km.is_finite() || km <= 0.0 {
            return None;
        }
        if km >= LEGACY_UNLIMITED_KM {
            Some(Radius::Unlimited)
        } else {
            Some(Radius::Km(km))
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        match trimmed.to_lowercase().as_str() {
            "" | "unlimited" | "none" | "null" | "all" => Some(Radius::Unlimited),
            _ => trimmed
                .trim_end_matches("km")
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Self::from_km),
        }
    }

    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(Radius::Unlimited),
            Value::Number(n) => n.as_f64().and_then(Self::from_km),
            Value::String(s) => Self::parse(s),
            _ => None,
        }
    }

    pub fn km(&self) -> Option<f64> {
        match self {
            Radius::Km(km) => Some(*km),
            Radius::Unlimited => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterCriteria {
    pub categories: BTreeSet<String>,
    pub time_range: TimeRange,
    pub radius: Radius,
    pub venue: Option<String>,
}

/// Persisted shape of the filter criteria (`krawl_prefs`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Preferences {
    pub categories: Vec<String>,
    #[serde(rename = "timeRange")]
    pub time_range: String,
    pub radius: Option<f64>,
    pub location: Option<String>,
}

pub struct FilterEngine {
    criteria: FilterCriteria,
    configured_categories: Vec<String>,
    config: CalendarConfig,
    tz: Tz,
}

impl FilterEngine {
    pub fn new(config: &CalendarConfig) -> Self {
        let time_range =
            TimeRange::parse(&config.default_time_range, config).unwrap_or_default();
        let radius = config
            .default_radius_km
            .and_then(Radius::from_km)
            .unwrap_or(Radius::Unlimited);
        Self {
            criteria: FilterCriteria {
                categories: BTreeSet::new(),
                time_range,
                radius,
                venue: None,
            },
            configured_categories: config.named_categories(),
            config: config.clone(),
            tz: config.tz(),
        }
    }

    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    pub fn set_configured_categories(&mut self, categories: &[String]) {
        self.configured_categories = categories
            .iter()
            .filter(|c| **c != self.config.catch_all_category)
            .cloned()
            .collect();
    }

    /// Returns whether `category` is selected after the toggle.
    pub fn toggle_category(&mut self, category: &str) -> bool {
        if self.criteria.categories.remove(category) {
            false
        } else {
            self.criteria.categories.insert(category.to_string());
            true
        }
    }

    pub fn clear_categories(&mut self) {
        self.criteria.categories.clear();
    }

    pub fn has_category(&self, category: &str) -> bool {
        self.criteria.categories.contains(category)
    }

    pub fn set_time_range(&mut self, range: TimeRange) {
        self.criteria.time_range = range;
    }

    /// Sets the mode from an id such as `sunrise` or `24h`; unknown ids are ignored.
    pub fn set_time_range_id(&mut self, id: &str) -> bool {
        match TimeRange::parse(id, &self.config) {
            Some(range) => {
                self.criteria.time_range = range;
                true
            }
            None => {
                tracing::warn!("ignoring unknown time range {id:?}");
                false
            }
        }
    }

    pub fn time_range(&self) -> &TimeRange {
        &self.criteria.time_range
    }

    pub fn set_radius(&mut self, radius: Radius) {
        self.criteria.radius = match radius {
            Radius::Km(km) => Radius::from_km(km).unwrap_or(self.criteria.radius),
            Radius::Unlimited => Radius::Unlimited,
        };
    }

    pub fn radius(&self) -> Radius {
        self.criteria.radius
    }

    pub fn set_venue(&mut self, venue: Option<String>) {
        self.criteria.venue = venue.filter(|v| !v.trim().is_empty());
    }

    pub fn venue(&self) -> Option<&str> {
        self.criteria.venue.as_deref()
    }

    pub fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.tz)
    }

    pub fn filter_events(&self, events: &[Event], user_location: Option<Coordinate>) -> Vec<Event> {
        self.filter_events_at(events, user_location, self.now())
    }

    /// One pass over `events` against a cutoff resolved once from `now`.
    pub fn filter_events_at(
        &self,
        events: &[Event],
        user_location: Option<Coordinate>,
        now: DateTime<Tz>,
    ) -> Vec<Event> {
        let cutoff = self.criteria.time_range.cutoff(now, &self.config);
        let filtered: Vec<Event> = events
            .iter()
            .filter(|event| self.matches(event, user_location, cutoff))
            .cloned()
            .collect();
        tracing::debug!(
            total = events.len(),
            matched = filtered.len(),
            time_range = %self.criteria.time_range,
            "filter pass"
        );
        filtered
    }

    fn matches(
        &self,
        event: &Event,
        user_location: Option<Coordinate>,
        cutoff: Option<DateTime<Tz>>,
    ) -> bool {
        self.matches_category(event)
            && self.matches_time(event, cutoff)
            && self.matches_radius(event, user_location)
            && self.matches_venue(event)
    }

    fn matches_category(&self, event: &Event) -> bool {
        let selected = &self.criteria.categories;
        if selected.is_empty() {
            return true;
        }
        // A selected named category passes on its own; the catch-all only adds
        // events outside every configured category.
        let catch_all = &self.config.catch_all_category;
        let named_hit = event
            .categories
            .iter()
            .any(|c| c != catch_all && selected.contains(c));
        if named_hit {
            return true;
        }
        selected.contains(catch_all)
            && !event
                .categories
                .iter()
                .any(|c| self.configured_categories.contains(c))
    }

    fn matches_time(&self, event: &Event, cutoff: Option<DateTime<Tz>>) -> bool {
        match cutoff {
            Some(cutoff) => event.starts_at(self.tz) <= cutoff,
            None => true,
        }
    }

    fn matches_radius(&self, event: &Event, user_location: Option<Coordinate>) -> bool {
        match (self.criteria.radius, user_location, event.coords) {
            (Radius::Km(km), Some(user), Some(coords)) => geo::distance_km(user, coords) <= km,
            _ => true,
        }
    }

    fn matches_venue(&self, event: &Event) -> bool {
        match &self.criteria.venue {
            Some(venue) => event.location == *venue,
            None => true,
        }
    }

    pub fn moon_phase_label(&self, now: DateTime<Tz>) -> &'static str {
        cutoff::next_moon_phase(now).phase.label()
    }

    pub fn export(&self) -> Preferences {
        Preferences {
            categories: self.criteria.categories.iter().cloned().collect(),
            time_range: self.criteria.time_range.to_string(),
            radius: self.criteria.radius.km(),
            location: self.criteria.venue.clone(),
        }
    }

    pub fn import(&mut self, prefs: &Preferences) {
        match serde_json::to_value(prefs) {
            Ok(value) => self.import_value(&value),
            Err(err) => tracing::warn!("could not encode preferences: {err}"),
        }
    }

    /// Restores criteria field by field. Fields with the wrong type keep their
    /// current value; an absent category list clears the selection.
    pub fn import_value(&mut self, value: &Value) {
        let Some(object) = value.as_object() else {
            tracing::warn!("ignoring preferences that are not an object");
            return;
        };

        match object.get("categories") {
            None | Some(Value::Null) => self.criteria.categories.clear(),
            Some(Value::Array(items)) => {
                self.criteria.categories = items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect();
            }
            Some(other) => tracing::warn!("ignoring malformed categories: {other}"),
        }

        if let Some(raw) = object.get("timeRange") {
            match raw.as_str() {
                Some(id) => {
                    self.set_time_range_id(id);
                }
                None => tracing::warn!("ignoring malformed timeRange: {raw}"),
            }
        }

        if let Some(raw) = object.get("radius") {
            match Radius::from_json(raw) {
                Some(radius) => self.criteria.radius = radius,
                None => tracing::warn!("ignoring malformed radius: {raw}"),
            }
        }

        match object.get("location") {
            None => {}
            Some(Value::Null) => self.criteria.venue = None,
            Some(Value::String(venue)) => self.set_venue(Some(venue.clone())),
            Some(other) => tracing::warn!("ignoring malformed location: {other}"),
        }
    }
}
