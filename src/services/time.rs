//! Time queries.
//!
//! Accepted arguments:
//!
//! - empty or `now`: local time, UTC and every configured city
//! - `now + 2 hours`, `now - 3 days`: offset arithmetic
//! - `utc+3`, `utc-05:30`, `utc`: the time at a fixed UTC offset
//! - `1700000000`: a Unix timestamp

use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, Local, TimeZone, Utc};
use chrono_tz::Tz;

use crate::config::CityConfig;
use crate::core::handler::{QueryHandler, QueryResult};
use crate::core::query::Query;

const TIME_FORMAT: &str = "%H:%M:%S";
const DATE_FORMAT: &str = "%A, %d %B %Y";
const CLIPBOARD_FORMAT: &str = "%Y-%m-%d %H:%M:%S %:z";

/// Source of the current instant.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync + 'static>;

/// Parse a UTC offset such as `+01:00`, `-5`, `+0530` or `0`.
pub fn parse_utc_offset(input: &str) -> Option<FixedOffset> {
    let input = input.trim();
    let (sign, body) = match input.chars().next()? {
        '+' => (1, &input[1..]),
        '-' => (-1, &input[1..]),
        _ => (1, input),
    };
    if !body.is_ascii() {
        return None;
    }
    let (hours, minutes) = match body.split_once(':') {
        Some((h, m)) => (h, m),
        None if body.len() == 4 => body.split_at(2),
        None => (body, "0"),
    };
    if hours.is_empty() || !hours.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if !minutes.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Resolve an IANA timezone name such as `America/New_York`.
pub fn parse_timezone(name: &str) -> Option<Tz> {
    name.trim().parse().ok()
}

fn parse_shift(input: &str) -> Option<Duration> {
    let input = input.trim();
    let (sign, rest) = match input.chars().next()? {
        '+' => (1, &input[1..]),
        '-' => (-1, &input[1..]),
        _ => return None,
    };
    let rest = rest.trim();
    let split = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let (amount, unit) = rest.split_at(split);
    let amount: i64 = amount.parse().ok()?;
    let amount = sign * amount;
    match unit.trim().to_lowercase().as_str() {
        "s" | "sec" | "secs" | "second" | "seconds" => Duration::try_seconds(amount),
        "m" | "min" | "mins" | "minute" | "minutes" => Duration::try_minutes(amount),
        "h" | "hr" | "hrs" | "hour" | "hours" => Duration::try_hours(amount),
        "d" | "day" | "days" => Duration::try_days(amount),
        "w" | "week" | "weeks" => Duration::try_weeks(amount),
        _ => None,
    }
}

/// Evaluator for time-mode queries.
pub struct TimeHandler {
    cities: Vec<(String, Tz)>,
    clock: Clock,
}

impl std::fmt::Debug for TimeHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeHandler")
            .field("cities", &self.cities)
            .finish()
    }
}

impl TimeHandler {
    /// Cities with an unknown timezone are skipped.
    pub fn new(cities: &[CityConfig]) -> Self {
        Self::with_clock(cities, Arc::new(Utc::now))
    }

    pub fn with_clock(cities: &[CityConfig], clock: Clock) -> Self {
        let cities = cities
            .iter()
            .filter_map(|city| Some((city.name.clone(), parse_timezone(&city.timezone)?)))
            .collect();
        Self { cities, clock }
    }

    fn now_results(&self, now: DateTime<Utc>) -> Vec<QueryResult> {
        let mut results = vec![
            render(&now.with_timezone(&Local), "Local time"),
            render(&now, "UTC"),
        ];
        results.extend(
            self.cities
                .iter()
                .map(|(name, tz)| render(&now.with_timezone(tz), name)),
        );
        results
    }
}

fn render<Tz: TimeZone>(time: &DateTime<Tz>, label: &str) -> QueryResult
where
    Tz::Offset: std::fmt::Display,
{
    QueryResult::new(
        time.format(TIME_FORMAT).to_string(),
        format!("{} - {}", label, time.format(DATE_FORMAT)),
    )
    .with_icon("time.svg")
    .with_clipboard(time.format(CLIPBOARD_FORMAT).to_string())
}

impl QueryHandler for TimeHandler {
    fn keyword(&self) -> &'static str {
        "time"
    }

    fn handle(&self, query: &Query) -> Vec<QueryResult> {
        let argument = query.argument.trim().to_lowercase();
        let now = (self.clock)();

        if argument.is_empty() || argument == "now" {
            return self.now_results(now);
        }

        if let Some(shift) = argument.strip_prefix("now") {
            return parse_shift(shift)
                .and_then(|d| now.checked_add_signed(d))
                .map(|t| vec![render(&t.with_timezone(&Local), &format!("Now {}", shift.trim()))])
                .unwrap_or_default();
        }

        if let Some(offset) = argument.strip_prefix("utc") {
            let offset = if offset.trim().is_empty() {
                FixedOffset::east_opt(0)
            } else {
                parse_utc_offset(offset)
            };
            return offset
                .map(|o| vec![render(&now.with_timezone(&o), &format!("UTC{}", o))])
                .unwrap_or_default();
        }

        if argument.chars().all(|c| c.is_ascii_digit()) {
            return argument
                .parse::<i64>()
                .ok()
                .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
                .map(|t| vec![render(&t, "Unix timestamp")])
                .unwrap_or_default();
        }

        Vec::new()
    }
}
