//! Mapping the decoded payload onto [`PrayerSchedule`].
//!
//! Required: `name`, `timezone`, and `times` (exactly six strings in slot
//! order, see [`Prayer`]). Everything else is optional:
//! - `shuruq` defaults to `times[1]` when omitted, null or empty
//! - `jumua` stays absent when omitted, null or empty
//! - `iqamaCalendar` and `calendar` default to empty
//! - `iqamaEnabled` defaults to true
//!
//! Time values are accepted as strings only. Coordinates may be numbers or
//! finite numeric strings. Calendar keys are numbers, so `"01"` and `"1"`
//! name the same day and may not both appear. Any other shape fails with
//! [`ExtractionFailure::Validation`] naming the offending field.

use crate::error::{ExtractionFailure, Result};
use crate::models::{DAILY_SLOTS, DayTimes, MonthCalendar, Prayer, PrayerSchedule};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use tracing::{debug, instrument};

type Object = Map<String, Value>;

/// Build a [`PrayerSchedule`] from the decoded payload.
#[instrument(level = "debug", skip_all)]
pub fn normalize(value: &Value) -> Result<PrayerSchedule> {
    let obj = value
        .as_object()
        .ok_or_else(|| ExtractionFailure::validation("<root>", "payload is not an object"))?;

    let mosque_name = required_str(obj, "name")?;
    let timezone = required_str(obj, "timezone")?;
    let daily_times = daily_times(obj)?;

    let shuruq = optional_str(obj, "shuruq")?
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| daily_times[Prayer::Sunrise.slot()].clone());
    let jumua = optional_str(obj, "jumua")?.filter(|s| !s.trim().is_empty());
    let iqama_enabled = optional_bool(obj, "iqamaEnabled")?.unwrap_or(true);

    let schedule = PrayerSchedule {
        mosque_name,
        label: optional_str(obj, "label")?,
        timezone,
        latitude: optional_coord(obj, "latitude")?,
        longitude: optional_coord(obj, "longitude")?,
        country_code: optional_str(obj, "countryCode")?,
        url: optional_str(obj, "url")?,
        daily_times,
        shuruq,
        jumua,
        iqama_enabled,
        iqama_calendar: month_calendar(obj, "iqamaCalendar")?,
        calendar: month_calendar(obj, "calendar")?,
    };

    debug!(
        mosque = %schedule.mosque_name,
        iqama_months = schedule.iqama_calendar.len(),
        calendar_months = schedule.calendar.len(),
        has_jumua = schedule.jumua.is_some(),
        "Normalized schedule"
    );
    Ok(schedule)
}

/// `null` is treated the same as a missing key.
fn present<'a>(obj: &'a Object, field: &str) -> Option<&'a Value> {
    obj.get(field).filter(|v| !v.is_null())
}

fn required_str(obj: &Object, field: &str) -> Result<String> {
    match present(obj, field) {
        None => Err(ExtractionFailure::validation(field, "missing")),
        Some(Value::String(s)) if s.trim().is_empty() => {
            Err(ExtractionFailure::validation(field, "empty"))
        }
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(ExtractionFailure::validation(
            field,
            format!("expected string, got {}", type_name(other)),
        )),
    }
}

fn optional_str(obj: &Object, field: &str) -> Result<Option<String>> {
    match present(obj, field) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(ExtractionFailure::validation(
            field,
            format!("expected string, got {}", type_name(other)),
        )),
    }
}

fn optional_bool(obj: &Object, field: &str) -> Result<Option<bool>> {
    match present(obj, field) {
        None => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(other) => Err(ExtractionFailure::validation(
            field,
            format!("expected boolean, got {}", type_name(other)),
        )),
    }
}

fn optional_coord(obj: &Object, field: &str) -> Result<Option<f64>> {
    match present(obj, field) {
        None => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map(Some)
            .ok_or_else(|| ExtractionFailure::validation(field, format!("not a number: {s:?}"))),
        Some(other) => Err(ExtractionFailure::validation(
            field,
            format!("expected number, got {}", type_name(other)),
        )),
    }
}

fn daily_times(obj: &Object) -> Result<Vec<String>> {
    let list = match present(obj, "times") {
        None => return Err(ExtractionFailure::validation("times", "missing")),
        Some(Value::Array(list)) => list,
        Some(other) => {
            return Err(ExtractionFailure::validation(
                "times",
                format!("expected array, got {}", type_name(other)),
            ));
        }
    };
    if list.len() != DAILY_SLOTS {
        return Err(ExtractionFailure::validation(
            "times",
            format!("expected {DAILY_SLOTS} entries, got {}", list.len()),
        ));
    }
    list.iter()
        .zip(Prayer::ALL)
        .map(|(v, prayer)| match v {
            Value::String(s) => Ok(s.clone()),
            other => Err(ExtractionFailure::validation(
                "times",
                format!(
                    "{} time is {}, expected string",
                    prayer.name(),
                    type_name(other)
                ),
            )),
        })
        .collect()
}

/// Month calendar in either of the shapes the site emits: an array of up to
/// twelve day-objects (index 0 is January) or an object keyed "1".."12".
/// Empty months are dropped.
fn month_calendar(obj: &Object, field: &str) -> Result<MonthCalendar> {
    let months: Vec<(u32, &Value)> = match present(obj, field) {
        None => return Ok(MonthCalendar::new()),
        Some(Value::Array(list)) => {
            if list.len() > 12 {
                return Err(ExtractionFailure::validation(
                    field,
                    format!("expected at most 12 months, got {}", list.len()),
                ));
            }
            (1u32..).zip(list.iter()).collect()
        }
        Some(Value::Object(map)) => map
            .iter()
            .map(|(key, v)| parse_key(key, 12).map(|m| (m, v)).ok_or_else(|| {
                ExtractionFailure::validation(field, format!("invalid month key {key:?}"))
            }))
            .collect::<Result<_>>()?,
        Some(other) => {
            return Err(ExtractionFailure::validation(
                field,
                format!("expected array or object, got {}", type_name(other)),
            ));
        }
    };

    let mut calendar = MonthCalendar::new();
    let mut seen = BTreeSet::new();
    for (month, days) in months {
        if !seen.insert(month) {
            return Err(ExtractionFailure::validation(
                field,
                format!("month {month} given twice"),
            ));
        }
        let path = format!("{field}[{month}]");
        let days = day_times(days, &path)?;
        if days.is_empty() {
            debug!(field, month, "Dropping empty calendar month");
            continue;
        }
        calendar.insert(month, days);
    }
    Ok(calendar)
}

fn day_times(value: &Value, path: &str) -> Result<DayTimes> {
    let map = match value {
        Value::Object(map) => map,
        // PHP encodes an empty map as `[]`.
        Value::Array(list) if list.is_empty() => return Ok(DayTimes::new()),
        Value::Null => return Ok(DayTimes::new()),
        other => {
            return Err(ExtractionFailure::validation(
                path,
                format!("expected object, got {}", type_name(other)),
            ));
        }
    };

    let mut days = DayTimes::new();
    for (key, entries) in map {
        let day = parse_key(key, 31).ok_or_else(|| {
            ExtractionFailure::validation(path, format!("invalid day key {key:?}"))
        })?;
        let day_path = format!("{path}[{day}]");
        let list = entries.as_array().ok_or_else(|| {
            ExtractionFailure::validation(
                day_path.as_str(),
                format!("expected array, got {}", type_name(entries)),
            )
        })?;
        if !list.is_empty() && list.len() != DAILY_SLOTS {
            return Err(ExtractionFailure::validation(
                day_path,
                format!("expected {DAILY_SLOTS} entries or none, got {}", list.len()),
            ));
        }
        let times = list
            .iter()
            .map(|v| {
                v.as_str().map(str::to_string).ok_or_else(|| {
                    ExtractionFailure::validation(
                        day_path.as_str(),
                        format!("time is {}, expected string", type_name(v)),
                    )
                })
            })
            .collect::<Result<Vec<_>>>()?;
        if days.insert(day.to_string(), times).is_some() {
            return Err(ExtractionFailure::validation(
                path,
                format!("day {day} given twice (key {key:?})"),
            ));
        }
    }
    Ok(days)
}

/// Parse a 1-based calendar key no greater than `max`.
fn parse_key(key: &str, max: u32) -> Option<u32> {
    key.trim().parse::<u32>().ok().filter(|n| (1..=max).contains(n))
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
