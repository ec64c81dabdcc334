use std::{fs, io::ErrorKind, path::PathBuf};

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

use super::base;
use super::EventSource;
use crate::models::Event;

static CARD_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".event-card").expect("event card selector"));
static TITLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h3").expect("event title selector"));
static DESCRIPTION_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".event-description").expect("event description selector"));
static LOCATION_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".event-location").expect("event location selector"));

#[derive(Debug, Clone)]
pub enum HtmlOrigin {
    Inline(String),
    File(PathBuf),
    Url(String),
}

/// Reads `.event-card` elements rendered by the static site.
pub struct HtmlCardSource {
    origin: HtmlOrigin,
}

impl HtmlCardSource {
    pub fn new(origin: HtmlOrigin) -> Self {
        Self { origin }
    }

    /// `http(s)://` locations are fetched, anything else is a file path.
    pub fn from_location(location: &str) -> Self {
        if location.starts_with("http://") || location.starts_with("https://") {
            Self::new(HtmlOrigin::Url(location.to_string()))
        } else {
            Self::new(HtmlOrigin::File(PathBuf::from(location)))
        }
    }

    fn read_markup(&self) -> Result<Option<String>> {
        match &self.origin {
            HtmlOrigin::Inline(html) => Ok(Some(html.clone())),
            HtmlOrigin::Url(url) => base::fetch_html(url).map(Some),
            HtmlOrigin::File(path) => match fs::read_to_string(path) {
                Ok(html) => Ok(Some(html)),
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    tracing::warn!("event markup {:?} not found", path);
                    Ok(None)
                }
                Err(err) => Err(err).with_context(|| format!("unable to read {:?}", path)),
            },
        }
    }

    pub(crate) fn parse_document(&self, html: &str) -> Vec<Event> {
        let document = Html::parse_document(html);
        let mut events = Vec::new();

        for card in document.select(&CARD_SELECTOR) {
            match parse_card(&card) {
                Some(event) => events.push(event),
                None => tracing::warn!(
                    "skipping event card without a parseable date: {:?}",
                    card.value().attr("data-event-url-card").unwrap_or("<no url>")
                ),
            }
        }

        if events.is_empty() {
            tracing::info!("no event cards found in {}", self.name());
        }
        events
    }
}

impl EventSource for HtmlCardSource {
    fn name(&self) -> String {
        match &self.origin {
            HtmlOrigin::Inline(_) => "inline markup".to_string(),
            HtmlOrigin::File(path) => path.display().to_string(),
            HtmlOrigin::Url(url) => url.clone(),
        }
    }

    fn load(&self) -> Result<Vec<Event>> {
        Ok(match self.read_markup()? {
            Some(html) => self.parse_document(&html),
            None => Vec::new(),
        })
    }
}

fn parse_card(card: &ElementRef<'_>) -> Option<Event> {
    let (date, embedded_time) = base::data_attr(card, "data-event-date")
        .as_deref()
        .and_then(base::parse_date)?;
    let time = base::data_attr(card, "data-event-time")
        .as_deref()
        .and_then(base::parse_time)
        .or(embedded_time);

    let title = base::first_text(card, &TITLE_SELECTOR).unwrap_or_default();
    let description = base::first_text(card, &DESCRIPTION_SELECTOR).unwrap_or_default();
    let location = base::data_attr(card, "data-event-location")
        .or_else(|| base::first_text(card, &LOCATION_SELECTOR))
        .unwrap_or_default();
    let coords = base::parse_coordinate(
        card.value().attr("data-event-lat"),
        card.value().attr("data-event-lng"),
    );
    let categories = base::data_attr(card, "data-event-categories")
        .map(|raw| base::split_categories(&raw))
        .unwrap_or_default();
    let url = base::data_attr(card, "data-event-url-card")
        .unwrap_or_else(|| base::derive_id(&title, date, &location));

    Some(Event {
        url,
        title,
        description,
        date,
        time,
        location,
        coords,
        categories,
        image_url: base::data_attr(card, "data-event-image"),
    })
}
