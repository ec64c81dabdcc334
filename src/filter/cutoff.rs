//! Time-range modes and the cutoff instant each one resolves to.

use std::fmt;

use chrono::{DateTime, Datelike, Duration, NaiveDateTime, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::{CalendarConfig, WeeklySlot};
use crate::utils;

pub const MAX_HOURS: f64 = 720.0;
pub const SYNODIC_MONTH_DAYS: f64 = 29.530588853;

/// New moon of 2000-01-06 18:14 UTC.
static REFERENCE_NEW_MOON: Lazy<DateTime<Utc>> = Lazy::new(|| {
    Utc.with_ymd_and_hms(2000, 1, 6, 18, 14, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
});

static HOURS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+(?:\.\d+)?)\s*h$").expect("valid hours regex"));

#[derive(Debug, Clone, PartialEq, Default)]
pub enum TimeRange {
    #[default]
    Dawn,
    WeeklySlot,
    LunarPhase,
    Unlimited,
    Hours(f64),
    /// Hour offset from a configured preset, kept under its preset id.
    Preset { id: String, hours: f64 },
}

impl TimeRange {
    /// Parses a persisted or user-supplied mode id. Preset ids from config
    /// resolve to their configured hour offsets and keep their id.
    pub fn parse(raw: &str, config: &CalendarConfig) -> Option<Self> {
        let id = raw.trim();
        if let Some(hours) = config.preset_hours(id) {
            let range = Self::hours(hours)?;
            if range.to_string() == id {
                return Some(range);
            }
            return Some(TimeRange::Preset {
                id: id.to_string(),
                hours: hours.min(MAX_HOURS),
            });
        }
        match id.to_lowercase().as_str() {
            "sunrise" | "dawn" => Some(TimeRange::Dawn),
            "tatort" | "weekly" => Some(TimeRange::WeeklySlot),
            "moon" => Some(TimeRange::LunarPhase),
            "all" | "unlimited" => Some(TimeRange::Unlimited),
            other => HOURS_RE
                .captures(other)
                .and_then(|caps| caps[1].parse::<f64>().ok())
                .and_then(Self::hours),
        }
    }

    fn hours(hours: f64) -> Option<Self> {
        if hours.is_finite() && hours > 0.0 {
            Some(TimeRange::Hours(hours.min(MAX_HOURS)))
        } else {
            None
        }
    }

    /// Cutoff instant for this mode, `None` when unbounded.
    pub fn cutoff(&self, now: DateTime<Tz>, config: &CalendarConfig) -> Option<DateTime<Tz>> {
        match self {
            TimeRange::Unlimited => None,
            TimeRange::Hours(hours) | TimeRange::Preset { hours, .. } => {
                let seconds = (hours.min(MAX_HOURS) * 3600.0).round() as i64;
                Some(now + Duration::seconds(seconds))
            }
            TimeRange::Dawn => Some(next_dawn(now, config.dawn)),
            TimeRange::WeeklySlot => Some(next_weekly_slot(now, &config.weekly_slot)),
            TimeRange::LunarPhase => Some(next_moon_phase(now).at),
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeRange::Dawn => f.write_str("sunrise"),
            TimeRange::WeeklySlot => f.write_str("tatort"),
            TimeRange::LunarPhase => f.write_str("moon"),
            TimeRange::Unlimited => f.write_str("all"),
            TimeRange::Hours(hours) => write!(f, "{hours}h"),
            TimeRange::Preset { id, .. } => f.write_str(id),
        }
    }
}

/// Today at `dawn` if that is still ahead, otherwise tomorrow.
pub fn next_dawn(now: DateTime<Tz>, dawn: NaiveTime) -> DateTime<Tz> {
    let tz = now.timezone();
    let today = now.date_naive();
    let candidate = utils::localize(tz, NaiveDateTime::new(today, dawn));
    if now < candidate {
        candidate
    } else {
        let tomorrow = today + Duration::days(1);
        utils::localize(tz, NaiveDateTime::new(tomorrow, dawn))
    }
}

/// Next occurrence of the weekly slot strictly after `now`.
pub fn next_weekly_slot(now: DateTime<Tz>, slot: &WeeklySlot) -> DateTime<Tz> {
    let tz = now.timezone();
    let today = now.date_naive();
    let days_ahead = days_until(now.weekday(), slot.weekday);
    let date = today + Duration::days(days_ahead);
    let candidate = utils::localize(tz, NaiveDateTime::new(date, slot.time));
    if now >= candidate {
        utils::localize(
            tz,
            NaiveDateTime::new(date + Duration::days(7), slot.time),
        )
    } else {
        candidate
    }
}

fn days_until(from: Weekday, to: Weekday) -> i64 {
    let from = i64::from(from.num_days_from_monday());
    let to = i64::from(to.num_days_from_monday());
    (to - from).rem_euclid(7)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoonPhase {
    Full,
    New,
}

impl MoonPhase {
    pub fn label(&self) -> &'static str {
        match self {
            MoonPhase::Full => "bis Vollmond",
            MoonPhase::New => "bis Neumond",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LunarCutoff {
    pub at: DateTime<Tz>,
    pub phase: MoonPhase,
}

/// Fraction of the synodic month elapsed at `now`, in `[0, 1)`.
pub fn moon_phase_fraction(now: DateTime<Utc>) -> f64 {
    let elapsed = now.signed_duration_since(*REFERENCE_NEW_MOON);
    let days = elapsed.num_milliseconds() as f64 / 86_400_000.0;
    days.rem_euclid(SYNODIC_MONTH_DAYS) / SYNODIC_MONTH_DAYS
}

/// Whichever of the next full or new moon comes first.
pub fn next_moon_phase(now: DateTime<Tz>) -> LunarCutoff {
    let phase = moon_phase_fraction(now.with_timezone(&Utc));
    let days_to_full = if phase < 0.5 {
        (0.5 - phase) * SYNODIC_MONTH_DAYS
    } else {
        (1.5 - phase) * SYNODIC_MONTH_DAYS
    };
    let days_to_new = (1.0 - phase) * SYNODIC_MONTH_DAYS;
    let (days, phase) = if days_to_full < days_to_new {
        (days_to_full, MoonPhase::Full)
    } else {
        (days_to_new, MoonPhase::New)
    };
    let millis = (days * 86_400_000.0).round() as i64;
    LunarCutoff {
        at: now + Duration::milliseconds(millis),
        phase,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimeRangePreset;
    use chrono::Timelike;

    const TZ: Tz = chrono_tz::Europe::Berlin;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Tz> {
        TZ.with_ymd_and_hms(y, m, d, h, min, 0)
            .single()
            .expect("valid local datetime")
    }

    #[test]
    fn parse_known_modes() {
        let config = CalendarConfig::default();
        assert_eq!(TimeRange::parse("sunrise", &config), Some(TimeRange::Dawn));
        assert_eq!(TimeRange::parse("tatort", &config), Some(TimeRange::WeeklySlot));
        assert_eq!(TimeRange::parse("moon", &config), Some(TimeRange::LunarPhase));
        assert_eq!(TimeRange::parse("all", &config), Some(TimeRange::Unlimited));
        assert_eq!(TimeRange::parse("24h", &config), Some(TimeRange::Hours(24.0)));
        assert_eq!(TimeRange::parse("48h", &config), Some(TimeRange::Hours(48.0)));
        assert_eq!(TimeRange::parse("9999h", &config), Some(TimeRange::Hours(MAX_HOURS)));
        assert_eq!(TimeRange::parse("0h", &config), None);
        assert_eq!(TimeRange::parse("tomorrow-ish", &config), None);
    }

    #[test]
    fn display_round_trips_through_parse() {
        let config = CalendarConfig::default();
        for mode in [
            TimeRange::Dawn,
            TimeRange::WeeklySlot,
            TimeRange::LunarPhase,
            TimeRange::Unlimited,
            TimeRange::Hours(6.0),
            TimeRange::Hours(1.5),
        ] {
            assert_eq!(TimeRange::parse(&mode.to_string(), &config), Some(mode));
        }
    }

    #[test]
    fn named_preset_keeps_its_id() {
        let mut config = CalendarConfig::default();
        config.time_ranges.push(TimeRangePreset {
            id: "weekend".into(),
            label: "Wochenende".into(),
            hours: Some(48.0),
        });
        let range = TimeRange::parse("weekend", &config).expect("preset");
        assert_eq!(range.to_string(), "weekend");

        let now = at(2025, 6, 6, 18, 0);
        assert_eq!(range.cutoff(now, &config), Some(now + Duration::hours(48)));
        // "24h" is also a preset, but its id already names the offset.
        assert_eq!(TimeRange::parse("24h", &config), Some(TimeRange::Hours(24.0)));
    }

    #[test]
    fn unlimited_has_no_cutoff() {
        let config = CalendarConfig::default();
        assert_eq!(TimeRange::Unlimited.cutoff(at(2025, 6, 1, 12, 0), &config), None);
    }

    #[test]
    fn hour_offset_is_clamped() {
        let config = CalendarConfig::default();
        let now = at(2025, 6, 1, 12, 0);
        assert_eq!(
            TimeRange::Hours(6.0).cutoff(now, &config),
            Some(now + Duration::hours(6))
        );
        assert_eq!(
            TimeRange::Hours(10_000.0).cutoff(now, &config),
            Some(now + Duration::hours(720))
        );
    }

    #[test]
    fn dawn_before_and_after_boundary() {
        let dawn = NaiveTime::from_hms_opt(6, 30, 0).unwrap();
        assert_eq!(next_dawn(at(2025, 6, 1, 3, 0), dawn), at(2025, 6, 1, 6, 30));
        assert_eq!(next_dawn(at(2025, 6, 1, 6, 30), dawn), at(2025, 6, 2, 6, 30));
        assert_eq!(next_dawn(at(2025, 6, 1, 22, 0), dawn), at(2025, 6, 2, 6, 30));
    }

    #[test]
    fn dawn_across_month_end() {
        let dawn = NaiveTime::from_hms_opt(6, 30, 0).unwrap();
        assert_eq!(next_dawn(at(2025, 6, 30, 23, 0), dawn), at(2025, 7, 1, 6, 30));
    }

    #[test]
    fn weekly_slot_from_midweek() {
        let slot = WeeklySlot::default();
        // 2025-06-04 is a Wednesday.
        assert_eq!(next_weekly_slot(at(2025, 6, 4, 10, 0), &slot), at(2025, 6, 8, 20, 15));
    }

    #[test]
    fn weekly_slot_on_matching_day() {
        let slot = WeeklySlot::default();
        // 2025-06-08 is a Sunday.
        assert_eq!(next_weekly_slot(at(2025, 6, 8, 19, 0), &slot), at(2025, 6, 8, 20, 15));
        assert_eq!(next_weekly_slot(at(2025, 6, 8, 20, 15), &slot), at(2025, 6, 15, 20, 15));
        assert_eq!(next_weekly_slot(at(2025, 6, 8, 21, 0), &slot), at(2025, 6, 15, 20, 15));
        // Later hour but earlier minute than the slot still counts as after it.
        assert_eq!(next_weekly_slot(at(2025, 6, 8, 21, 5), &slot), at(2025, 6, 15, 20, 15));
    }

    #[test]
    fn weekly_slot_from_saturday_night() {
        let slot = WeeklySlot::default();
        let cutoff = next_weekly_slot(at(2025, 6, 7, 23, 59), &slot);
        assert_eq!(cutoff.weekday(), Weekday::Sun);
        assert_eq!((cutoff.hour(), cutoff.minute()), (20, 15));
        assert_eq!(cutoff.date_naive(), at(2025, 6, 8, 0, 0).date_naive());
    }

    #[test]
    fn reference_epoch_is_new_moon() {
        let phase = moon_phase_fraction(*REFERENCE_NEW_MOON);
        assert!(phase.abs() < 1e-12);
    }

    #[test]
    fn half_cycle_after_reference_targets_new_moon() {
        let half = Duration::milliseconds((SYNODIC_MONTH_DAYS * 0.5 * 86_400_000.0) as i64 + 60_000);
        let now = (*REFERENCE_NEW_MOON + half).with_timezone(&TZ);
        let cutoff = next_moon_phase(now);
        assert_eq!(cutoff.phase, MoonPhase::New);
    }

    #[test]
    fn quarter_cycle_after_reference_targets_full_moon() {
        let quarter = Duration::milliseconds((SYNODIC_MONTH_DAYS * 0.2 * 86_400_000.0) as i64);
        let now = (*REFERENCE_NEW_MOON + quarter).with_timezone(&TZ);
        let cutoff = next_moon_phase(now);
        assert_eq!(cutoff.phase, MoonPhase::Full);
        let days = (cutoff.at - now).num_milliseconds() as f64 / 86_400_000.0;
        assert!((days - SYNODIC_MONTH_DAYS * 0.3).abs() < 1e-6);
    }

    #[test]
    fn lunar_cutoff_stays_within_half_cycle() {
        let config = CalendarConfig::default();
        let mut now = at(2024, 1, 1, 0, 0);
        let limit = Duration::milliseconds((14.77 * 86_400_000.0) as i64);
        for _ in 0..400 {
            let cutoff = TimeRange::LunarPhase
                .cutoff(now, &config)
                .expect("lunar cutoff");
            assert!(cutoff >= now, "cutoff {cutoff} before {now}");
            assert!(cutoff <= now + limit, "cutoff {cutoff} too far from {now}");
            now = now + Duration::hours(37);
        }
    }
}
