use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::{NaiveTime, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::utils;

pub const DEFAULT_TIMEZONE: Tz = chrono_tz::Europe::Berlin;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("config already exists at {0:?}")]
    Exists(PathBuf),
}

/// A selectable time-range option. Presets with `hours` are fixed offsets from now.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeRangePreset {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hours: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeeklySlot {
    pub weekday: Weekday,
    pub time: NaiveTime,
}

impl Default for WeeklySlot {
    fn default() -> Self {
        Self {
            weekday: Weekday::Sun,
            time: NaiveTime::from_hms_opt(20, 15, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CalendarConfig {
    pub timezone: String,
    pub categories: Vec<String>,
    pub catch_all_category: String,
    pub time_ranges: Vec<TimeRangePreset>,
    pub dawn: NaiveTime,
    pub weekly_slot: WeeklySlot,
    pub default_time_range: String,
    pub default_radius_km: Option<f64>,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            timezone: DEFAULT_TIMEZONE.name().to_string(),
            categories: ["Musik", "Sport", "Kultur", "Party", "Sonstiges"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            catch_all_category: "Sonstiges".to_string(),
            time_ranges: vec![
                preset("sunrise", "bis Sonnenaufgang", None),
                preset("6h", "nächste 6 Stunden", Some(6.0)),
                preset("24h", "nächste 24 Stunden", Some(24.0)),
                preset("tatort", "bis zum Tatort", None),
                preset("moon", "bis Vollmond", None),
                preset("all", "alle", None),
            ],
            dawn: NaiveTime::from_hms_opt(6, 30, 0).unwrap_or(NaiveTime::MIN),
            weekly_slot: WeeklySlot::default(),
            default_time_range: "sunrise".to_string(),
            default_radius_km: Some(5.0),
        }
    }
}

fn preset(id: &str, label: &str, hours: Option<f64>) -> TimeRangePreset {
    TimeRangePreset {
        id: id.to_string(),
        label: label.to_string(),
        hours,
    }
}

impl CalendarConfig {
    pub fn tz(&self) -> Tz {
        match self.timezone.parse::<Tz>() {
            Ok(tz) => tz,
            Err(_) => {
                tracing::warn!(
                    "unknown timezone {:?}, falling back to {}",
                    self.timezone,
                    DEFAULT_TIMEZONE.name()
                );
                DEFAULT_TIMEZONE
            }
        }
    }

    /// Named categories without the catch-all bucket.
    pub fn named_categories(&self) -> Vec<String> {
        self.categories
            .iter()
            .filter(|c| **c != self.catch_all_category)
            .cloned()
            .collect()
    }

    pub fn preset_hours(&self, id: &str) -> Option<f64> {
        self.time_ranges
            .iter()
            .find(|p| p.id == id)
            .and_then(|p| p.hours)
    }
}

pub struct ConfigStore {
    path: PathBuf,
    data: CalendarConfig,
}

impl ConfigStore {
    pub fn load() -> Self {
        Self::load_from(utils::config_path())
    }

    pub fn load_from(path: PathBuf) -> Self {
        let data = match read_config(&path) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!("failed to read config {:?}: {err}", path);
                CalendarConfig::default()
            }
        };
        Self { path, data }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> CalendarConfig {
        self.data.clone()
    }

    /// Writes the default config to `path`, refusing to clobber unless `force`.
    pub fn write_default(path: &Path, force: bool) -> Result<CalendarConfig, ConfigError> {
        if path.exists() && !force {
            return Err(ConfigError::Exists(path.to_path_buf()));
        }
        let config = CalendarConfig::default();
        write_config(path, &config)?;
        Ok(config)
    }
}

fn read_config(path: &Path) -> Result<CalendarConfig, ConfigError> {
    if !path.exists() {
        return Ok(CalendarConfig::default());
    }
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

fn write_config(path: &Path, config: &CalendarConfig) -> Result<(), ConfigError> {
    utils::ensure_parent(path);
    let contents = serde_json::to_string_pretty(config)?;
    fs::write(path, contents)?;
    Ok(())
}
