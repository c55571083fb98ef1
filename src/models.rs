//! Data models for mosques and their prayer schedules.
//!
//! - [`MosqueSummary`]: one row of the directory listing
//! - [`PrayerSchedule`]: the normalized payload of a mosque page
//! - [`Prayer`]: semantic names for the positional daily time slots
//!
//! Field names serialize in camelCase to match the source site's own naming,
//! so a schedule printed by the CLI reads like the payload it came from.

use crate::utils::apply_offset;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Number of entries in a day's time list: fajr, sunrise, dhuhr, asr,
/// maghrib, isha.
pub const DAILY_SLOTS: usize = 6;

/// Day-of-month key ("1".."31") to that day's ordered time list.
pub type DayTimes = BTreeMap<String, Vec<String>>;

/// Month number (1..=12) to its day mapping.
pub type MonthCalendar = BTreeMap<u32, DayTimes>;

/// A mosque as listed by the directory endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MosqueSummary {
    /// Stable external identifier.
    pub id: String,
    /// URL-path component of the mosque page.
    pub slug: String,
    pub name: String,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// ISO 3166-1 alpha-2.
    pub country_code: Option<String>,
}

impl MosqueSummary {
    /// Case-insensitive substring match against name, city and slug.
    pub fn matches(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.name.to_lowercase().contains(&needle)
            || self.slug.to_lowercase().contains(&needle)
            || self
                .city
                .as_deref()
                .is_some_and(|c| c.to_lowercase().contains(&needle))
    }
}

/// Semantic name of a daily time slot. The discriminant is the slot's
/// position in [`PrayerSchedule::daily_times`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Prayer {
    Fajr = 0,
    Sunrise = 1,
    Dhuhr = 2,
    Asr = 3,
    Maghrib = 4,
    Isha = 5,
}

impl Prayer {
    pub const ALL: [Prayer; DAILY_SLOTS] = [
        Prayer::Fajr,
        Prayer::Sunrise,
        Prayer::Dhuhr,
        Prayer::Asr,
        Prayer::Maghrib,
        Prayer::Isha,
    ];

    pub fn slot(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Prayer::Fajr => "fajr",
            Prayer::Sunrise => "sunrise",
            Prayer::Dhuhr => "dhuhr",
            Prayer::Asr => "asr",
            Prayer::Maghrib => "maghrib",
            Prayer::Isha => "isha",
        }
    }
}

/// The normalized prayer schedule of one mosque.
///
/// Built once by [`normalize`](crate::normalize::normalize) and never mutated;
/// a re-fetch produces a new instance.
///
/// # Invariants
///
/// - `daily_times` has exactly [`DAILY_SLOTS`] entries
/// - every month present in `iqama_calendar`/`calendar` has at least one day
/// - every day's list has [`DAILY_SLOTS`] entries or is empty ("use the
///   congregation default")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrayerSchedule {
    pub mosque_name: String,
    pub label: Option<String>,
    /// IANA zone name.
    pub timezone: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub country_code: Option<String>,
    pub url: Option<String>,
    /// Reference-day times in slot order, see [`Prayer`].
    pub daily_times: Vec<String>,
    pub shuruq: String,
    /// Friday service time; `None` when the mosque holds no distinct one.
    pub jumua: Option<String>,
    pub iqama_enabled: bool,
    pub iqama_calendar: MonthCalendar,
    /// Full-year adhan times.
    pub calendar: MonthCalendar,
}

impl PrayerSchedule {
    /// Reference-day time of one slot.
    pub fn time_of(&self, prayer: Prayer) -> &str {
        &self.daily_times[prayer.slot()]
    }

    pub fn fajr(&self) -> &str {
        self.time_of(Prayer::Fajr)
    }

    pub fn dhuhr(&self) -> &str {
        self.time_of(Prayer::Dhuhr)
    }

    pub fn asr(&self) -> &str {
        self.time_of(Prayer::Asr)
    }

    pub fn maghrib(&self) -> &str {
        self.time_of(Prayer::Maghrib)
    }

    pub fn isha(&self) -> &str {
        self.time_of(Prayer::Isha)
    }

    /// Adhan times for a calendar day, if the calendar covers it.
    pub fn times_on(&self, month: u32, day: u32) -> Option<&[String]> {
        lookup(&self.calendar, month, day)
    }

    /// Raw iqama entries (offsets or clock times) for a calendar day. An
    /// empty slice means the congregation default applies.
    pub fn iqama_on(&self, month: u32, day: u32) -> Option<&[String]> {
        lookup(&self.iqama_calendar, month, day)
    }

    pub fn times_for(&self, date: NaiveDate) -> Option<&[String]> {
        self.times_on(date.month(), date.day())
    }

    /// Iqama clock times for a day, resolving offsets against that day's
    /// adhan times. Slots whose entry can't be resolved are `None`.
    pub fn iqama_times_on(&self, month: u32, day: u32) -> Option<Vec<Option<String>>> {
        if !self.iqama_enabled {
            return None;
        }
        let entries = self.iqama_on(month, day)?;
        if entries.is_empty() {
            return None;
        }
        let adhan = self.times_on(month, day).unwrap_or(self.daily_times.as_slice());
        Some(
            entries
                .iter()
                .zip(adhan)
                .map(|(entry, adhan)| apply_offset(adhan, entry))
                .collect(),
        )
    }
}

fn lookup(calendar: &MonthCalendar, month: u32, day: u32) -> Option<&[String]> {
    calendar
        .get(&month)
        .and_then(|days| days.get(&day.to_string()))
        .map(Vec::as_slice)
}
