//! Pure conversions from provider units and timestamps to display values.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Timelike, Utc};

use crate::model::{ForecastSample, ForecastSeries, UnitPreference};

pub const ICON_URL: &str = "https://openweathermap.org/img/wn";

const KELVIN_OFFSET: f64 = 273.15;
const MPS_TO_KMH: f64 = 3.6;
const MPS_TO_MPH: f64 = 2.236_936;
const COMPASS: [&str; 8] = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];

/// Kelvin to a rounded display temperature in the given unit.
pub fn format_temp(kelvin: f64, unit: UnitPreference) -> i64 {
    let celsius = kelvin - KELVIN_OFFSET;
    let value = match unit {
        UnitPreference::Imperial => celsius * 9.0 / 5.0 + 32.0,
        UnitPreference::Metric => celsius,
    };
    value.round() as i64
}

pub fn wind_direction(degrees: f64) -> &'static str {
    let index = (degrees / 45.0).round().rem_euclid(8.0) as usize;
    COMPASS[index % COMPASS.len()]
}

/// "12 mph NE" or "19 km/h NE".
pub fn format_wind(speed_mps: f64, degrees: f64, unit: UnitPreference) -> String {
    let (speed, label) = match unit {
        UnitPreference::Imperial => (speed_mps * MPS_TO_MPH, "mph"),
        UnitPreference::Metric => (speed_mps * MPS_TO_KMH, "km/h"),
    };
    format!("{} {} {}", speed.round() as i64, label, wind_direction(degrees))
}

pub fn format_percent(fraction: f64) -> String {
    format!("{}%", (fraction * 100.0).round() as i64)
}

fn local_offset(timezone_offset: i32) -> FixedOffset {
    FixedOffset::east_opt(timezone_offset).unwrap_or_else(|| Utc.fix())
}

/// "Monday, Jan 5, 3:04 PM" in the place's local time.
pub fn format_date(time: DateTime<Utc>, timezone_offset: i32) -> String {
    time.with_timezone(&local_offset(timezone_offset))
        .format("%A, %b %-d, %-I:%M %p")
        .to_string()
}

/// "Tomorrow" when `time` falls on the day after `today`, else the short weekday.
pub fn format_day(time: DateTime<Utc>, timezone_offset: i32, today: NaiveDate) -> String {
    let local = time.with_timezone(&local_offset(timezone_offset));
    if today.succ_opt() == Some(local.date_naive()) {
        "Tomorrow".to_string()
    } else {
        local.format("%a").to_string()
    }
}

/// One sample per upcoming day, preferring the reading nearest local noon.
/// Samples falling on `today` are skipped.
pub fn daily_forecasts(series: &ForecastSeries, today: NaiveDate, days: usize) -> Vec<&ForecastSample> {
    let offset = local_offset(series.timezone_offset);
    let noon_distance = |s: &ForecastSample| (s.time.with_timezone(&offset).hour() as i64 - 12).abs();

    let mut by_day: BTreeMap<NaiveDate, &ForecastSample> = BTreeMap::new();
    for sample in &series.samples {
        let date = sample.time.with_timezone(&offset).date_naive();
        if date == today {
            continue;
        }
        match by_day.get(&date) {
            Some(existing) if noon_distance(*existing) <= noon_distance(sample) => {}
            _ => {
                by_day.insert(date, sample);
            }
        }
    }

    by_day.into_values().take(days).collect()
}

/// Passes every case-insensitive occurrence of `query` through `emphasise`.
pub fn highlight_match(text: &str, query: &str, emphasise: impl Fn(&str) -> String) -> String {
    if query.is_empty() {
        return text.to_string();
    }

    // ASCII lowercasing keeps byte offsets aligned with `text`.
    let haystack = text.to_ascii_lowercase();
    let needle = query.to_ascii_lowercase();

    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for (start, _) in haystack.match_indices(&needle) {
        let end = start + needle.len();
        out.push_str(&text[last..start]);
        out.push_str(&emphasise(&text[start..end]));
        last = end;
    }
    out.push_str(&text[last..]);
    out
}

pub fn icon_url(code: &str, size: &str) -> String {
    format!("{ICON_URL}/{code}@{size}.png")
}
