use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::blocking::Client;
use scraper::{ElementRef, Selector};
use sha2::{Digest, Sha256};

use crate::models::Coordinate;

static TIME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})(?:[:.](\d{2}))?\s*(uhr)?\b").expect("valid time regex")
});

pub fn clean_text(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn inner_text(element: ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<Vec<_>>().join(" "))
}

pub fn first_text(element: &ElementRef<'_>, selector: &Selector) -> Option<String> {
    element
        .select(selector)
        .next()
        .map(inner_text)
        .filter(|text| !text.is_empty())
}

/// Trimmed, non-empty attribute value of `element` itself.
pub fn data_attr(element: &ElementRef<'_>, attr: &str) -> Option<String> {
    element
        .value()
        .attr(attr)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

pub fn fetch_html(url: &str) -> Result<String> {
    static CLIENT: Lazy<Option<Client>> = Lazy::new(|| {
        Client::builder()
            .timeout(Duration::from_secs(20))
            .user_agent("krawl/0.1")
            .build()
            .ok()
    });

    let client = CLIENT
        .as_ref()
        .context("http client could not be initialised")?;
    let response = client
        .get(url)
        .send()
        .with_context(|| format!("request failed for {url}"))?;
    let response = response
        .error_for_status()
        .with_context(|| format!("non-success status for {url}"))?;
    response
        .text()
        .with_context(|| format!("unable to read response body for {url}"))
}

/// Comma-separated labels, trimmed, empties dropped, duplicates removed.
pub fn split_categories(text: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for label in text.split(',').map(clean_text) {
        if !label.is_empty() && !out.contains(&label) {
            out.push(label);
        }
    }
    out
}

pub fn parse_coordinate(lat: Option<&str>, lng: Option<&str>) -> Option<Coordinate> {
    let lat = lat?.trim().parse::<f64>().ok()?;
    let lng = lng?.trim().parse::<f64>().ok()?;
    let coord = Coordinate::new(lat, lng);
    // A zero pair is how templates render an unset coordinate.
    if !coord.is_valid() || (lat == 0.0 && lng == 0.0) {
        return None;
    }
    Some(coord)
}

/// Date plus an optional embedded time (`2025-06-04T20:00`).
pub fn parse_date(input: &str) -> Option<(NaiveDate, Option<NaiveTime>)> {
    let cleaned = clean_text(input);
    if cleaned.is_empty() {
        return None;
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&cleaned, fmt) {
            return Some((dt.date(), Some(dt.time())));
        }
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(&cleaned) {
        let naive = dt.naive_local();
        return Some((naive.date(), Some(naive.time())));
    }
    for fmt in ["%Y-%m-%d", "%d.%m.%Y", "%d.%m.%y"] {
        if let Ok(date) = NaiveDate::parse_from_str(&cleaned, fmt) {
            return Some((date, None));
        }
    }
    None
}

/// `20:15`, `20.15`, `20 Uhr`, `20:15 Uhr`. A bare number without `Uhr` is not a time.
pub fn parse_time(input: &str) -> Option<NaiveTime> {
    let cleaned = clean_text(input);
    let caps = TIME_RE.captures(&cleaned)?;
    let hour = caps.get(1)?.as_str().parse::<u32>().ok()?;
    let minute = match caps.get(2) {
        Some(m) => m.as_str().parse::<u32>().ok()?,
        None if caps.get(3).is_some() => 0,
        None => return None,
    };
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Stable identifier for cards that carry no URL.
pub fn derive_id(title: &str, date: NaiveDate, location: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(b"|");
    hasher.update(date.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(location.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_date_formats() {
        let june = NaiveDate::from_ymd_opt(2025, 6, 4).unwrap();
        assert_eq!(parse_date("2025-06-04"), Some((june, None)));
        assert_eq!(parse_date("04.06.2025"), Some((june, None)));
        assert_eq!(
            parse_date("2025-06-04T20:15"),
            Some((june, NaiveTime::from_hms_opt(20, 15, 0)))
        );
        assert_eq!(
            parse_date("2025-06-04T20:15:00+02:00"),
            Some((june, NaiveTime::from_hms_opt(20, 15, 0)))
        );
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("soon"), None);
    }

    #[test]
    fn parses_time_variants() {
        let t = |h, m| NaiveTime::from_hms_opt(h, m, 0);
        assert_eq!(parse_time("20:15"), t(20, 15));
        assert_eq!(parse_time("20.15 Uhr"), t(20, 15));
        assert_eq!(parse_time("ab 19 Uhr"), t(19, 0));
        assert_eq!(parse_time("25:00"), None);
        assert_eq!(parse_time("19"), None);
        assert_eq!(parse_time(""), None);
    }

    #[test]
    fn splits_categories() {
        assert_eq!(
            split_categories(" Musik, ,Party ,Musik"),
            vec!["Musik".to_string(), "Party".to_string()]
        );
        assert!(split_categories("").is_empty());
    }

    #[test]
    fn coordinates_need_both_parts() {
        assert_eq!(
            parse_coordinate(Some("50.32"), Some("11.92")),
            Some(Coordinate::new(50.32, 11.92))
        );
        assert_eq!(parse_coordinate(Some("50.32"), None), None);
        assert_eq!(parse_coordinate(Some("x"), Some("11.92")), None);
        assert_eq!(parse_coordinate(Some("0"), Some("0")), None);
        assert_eq!(parse_coordinate(Some("91"), Some("0")), None);
    }

    #[test]
    fn derived_ids_are_stable() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 4).unwrap();
        let a = derive_id("Jam", date, "Galeriehaus");
        assert_eq!(a, derive_id("Jam", date, "Galeriehaus"));
        assert_ne!(a, derive_id("Jam", date, "Theater"));
        assert_eq!(a.len(), 64);
    }
}
