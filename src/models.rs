use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::utils;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Event {
    pub url: String, // identifier; stable hash when the card has no link
    pub title: String,
    pub description: String,
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
    pub location: String,
    pub coords: Option<Coordinate>,
    pub categories: Vec<String>,
    pub image_url: Option<String>,
}

impl Event {
    pub fn title(&self) -> &str {
        if self.title.is_empty() {
            "Untitled Event"
        } else {
            &self.title
        }
    }

    /// Start instant in `tz`. Events without a time start at local midnight.
    pub fn starts_at(&self, tz: Tz) -> DateTime<Tz> {
        let time = self.time.unwrap_or(NaiveTime::MIN);
        utils::localize(tz, NaiveDateTime::new(self.date, time))
    }

    pub fn has_category(&self, category: &str) -> bool {
        self.categories.iter().any(|c| c == category)
    }
}

#[derive(Serialize, Clone, Debug, Default, PartialEq)]
pub struct EventStats {
    pub total: usize,
    pub filtered: usize,
    pub upcoming: usize,
    pub past: usize,
    pub categories: Vec<String>,
    pub locations: Vec<String>,
}
