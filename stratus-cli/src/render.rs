//! Plain-text rendering of search results and weather for the terminal.

use chrono::Duration;
use colored::Colorize;
use stratus_core::{
    Location, UnitPreference, WeatherReport,
    format::{daily_forecasts, format_date, format_day, format_percent, format_temp, format_wind, highlight_match},
};

const FORECAST_DAYS: usize = 3;

fn temp(kelvin: f64, unit: UnitPreference) -> String {
    format!("{}{}", format_temp(kelvin, unit), unit.temperature_symbol())
}

/// Name with the typed query emphasised, followed by region and country.
pub fn result_line(location: &Location, query: &str) -> String {
    let name = highlight_match(&location.name, query, |m| m.bold().to_string());

    let region = if location.state.is_empty() {
        location.country.clone()
    } else {
        format!("{}, {}", location.state, location.country)
    };

    format!("{name} {}", region.dimmed())
}

pub fn weather(location: &Location, report: &WeatherReport, unit: UnitPreference) -> String {
    let current = &report.current;
    let mut out = String::new();

    out.push_str(&format!("{}\n", location.display_name().bold()));
    out.push_str(&format!(
        "{}\n\n",
        format_date(current.observed_at, current.timezone_offset).dimmed()
    ));
    out.push_str(&format!(
        "  {}  {}\n",
        temp(current.temp_k, unit).bold(),
        current.condition.description
    ));
    out.push_str(&format!(
        "  Feels like {}   H {}  L {}\n",
        temp(current.feels_like_k, unit),
        temp(current.temp_max_k, unit),
        temp(current.temp_min_k, unit)
    ));
    out.push_str(&format!(
        "  Humidity {}%   Wind {}\n",
        current.humidity_pct,
        format_wind(current.wind_speed_mps, current.wind_deg, unit)
    ));

    let local_now = current.observed_at + Duration::seconds(current.timezone_offset.into());
    let days = daily_forecasts(&report.forecast, local_now.date_naive(), FORECAST_DAYS);
    if !days.is_empty() {
        out.push('\n');
        for sample in days {
            out.push_str(&format!(
                "  {:<9} {:>5} / {:<5} {:<16} {}\n",
                format_day(sample.time, report.forecast.timezone_offset, local_now.date_naive()),
                temp(sample.temp_max_k, unit),
                temp(sample.temp_min_k, unit),
                sample.condition.main,
                format_percent(sample.pop)
            ));
        }
    }

    out
}

pub fn recent_list(entries: &[Location]) -> String {
    if entries.is_empty() {
        return "No recent searches.\n".to_string();
    }

    entries
        .iter()
        .enumerate()
        .map(|(i, location)| format!("{:>2}. {}\n", i + 1, location.display_name()))
        .collect()
}
