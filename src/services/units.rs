//! Unit and currency conversion queries.
//!
//! Examples: `10km to miles`, `32 f in c`, `10 USD to EUR`, `10 usd` (converted
//! into every default currency).

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::ConversionMode;
use crate::core::handler::{QueryHandler, QueryResult};
use crate::core::query::Query;
use crate::units::{currency_symbol, UnitId, UnitRegistry, UnitsService};

use super::format::format_measure;
use super::lang::Translator;

/// A conversion result
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    pub from_value: f64,
    pub from_unit: String,
    pub to_value: f64,
    pub to_unit: String,
    /// Age of the exchange rate for currency conversions.
    pub rate_timestamp: Option<DateTime<Utc>>,
}

impl Conversion {
    /// Format as display string: "10 km = 6.213712 mi"
    pub fn display(&self) -> String {
        format!(
            "{} {} = {} {}",
            format_measure(self.from_value),
            self.from_unit,
            format_measure(self.to_value),
            self.to_unit
        )
    }

    /// Get just the result value formatted
    pub fn result(&self) -> String {
        format!("{} {}", format_measure(self.to_value), self.to_unit)
    }
}

/// Parse "10km" or "10 km" into (10.0, "km")
fn parse_value_unit(s: &str) -> Option<(f64, &str)> {
    let s = s.trim();

    // Find where the number ends
    let mut num_end = 0;
    let mut has_digit = false;
    let mut has_decimal = false;
    let mut has_sign = false;

    for (i, c) in s.char_indices() {
        if c.is_ascii_digit() {
            has_digit = true;
            num_end = i + 1;
        } else if c == '.' && !has_decimal {
            has_decimal = true;
            num_end = i + 1;
        } else if (c == '-' || c == '+') && !has_sign && !has_digit {
            has_sign = true;
            num_end = i + 1;
        } else {
            break;
        }
    }

    if !has_digit || num_end == 0 {
        return None;
    }

    let num_str = &s[..num_end];
    let unit_str = s[num_end..].trim();

    if unit_str.is_empty() {
        return None;
    }

    let value: f64 = num_str.parse().ok()?;
    Some((value, unit_str))
}

/// Split `<quantity> to|in <unit>`; `None` for the target when there is no separator.
fn split_target(query: &str) -> (&str, Option<&str>) {
    for separator in [" to ", " in "] {
        if let Some((from, to)) = query.rsplit_once(separator) {
            if !to.trim().is_empty() {
                return (from, Some(to.trim()));
            }
        }
    }
    (query, None)
}

/// Unit and currency evaluator backed by the shared registry.
pub struct UnitsHandler {
    units: UnitsService,
    default_currencies: Vec<String>,
    translator: Arc<dyn Translator>,
}

impl std::fmt::Debug for UnitsHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitsHandler")
            .field("units", &self.units)
            .field("default_currencies", &self.default_currencies)
            .finish()
    }
}

impl UnitsHandler {
    pub fn new(
        units: UnitsService,
        default_currencies: Vec<String>,
        translator: Arc<dyn Translator>,
    ) -> Self {
        Self {
            units,
            default_currencies,
            translator,
        }
    }

    /// Try to parse and convert a unit expression.
    ///
    /// Returns nothing when the registry is unavailable or the units do not resolve.
    pub fn convert(&self, query: &str) -> Vec<Conversion> {
        let query = query.trim().to_lowercase();
        let (from_part, target) = split_target(&query);
        let Some((value, from_name)) = parse_value_unit(from_part) else {
            return Vec::new();
        };

        let conversions: Option<Vec<Conversion>> = self.units.with_registry(|registry, mode| {
            let Some(from) = registry.resolve(from_name) else {
                return Vec::new();
            };
            match target {
                Some(to_name) => registry
                    .resolve(to_name)
                    .and_then(|to| self.convert_between(registry, mode, value, from, to))
                    .into_iter()
                    .collect(),
                None if registry.is_currency(from) => self
                    .default_currencies
                    .iter()
                    .filter_map(|code| registry.resolve(&currency_symbol(code)))
                    .filter(|to| *to != from)
                    .filter_map(|to| self.convert_between(registry, mode, value, from, to))
                    .collect(),
                None => Vec::new(),
            }
        });

        conversions.unwrap_or_default()
    }

    /// Convert one quantity between two resolved units.
    fn convert_between(
        &self,
        registry: &UnitRegistry,
        mode: ConversionMode,
        value: f64,
        from: UnitId,
        to: UnitId,
    ) -> Option<Conversion> {
        let to_value = registry.convert(value, from, to, mode)?;
        let (source, target) = (registry.unit(from), registry.unit(to));
        let rate_timestamp = if source.is_currency() {
            [&source.symbol, &target.symbol]
                .into_iter()
                .filter_map(|symbol| self.units.get_rate_timestamp(symbol))
                .min()
        } else {
            None
        };
        Some(Conversion {
            from_value: value,
            from_unit: source.display.clone(),
            to_value,
            to_unit: target.display.clone(),
            rate_timestamp,
        })
    }

    fn describe(&self, conversion: &Conversion) -> String {
        match conversion.rate_timestamp {
            Some(stamp) => {
                let label = self
                    .translator
                    .translate("rate-updated", "units")
                    .unwrap_or_else(|| "Rate updated".to_string());
                format!(
                    "{} ({}: {})",
                    conversion.display(),
                    label,
                    stamp.format("%Y-%m-%d %H:%M UTC")
                )
            }
            None => conversion.display(),
        }
    }
}

impl QueryHandler for UnitsHandler {
    fn keyword(&self) -> &'static str {
        "units"
    }

    fn handle(&self, query: &Query) -> Vec<QueryResult> {
        self.convert(&query.argument)
            .into_iter()
            .map(|conversion| {
                let icon = if conversion.rate_timestamp.is_some() {
                    "currency.svg"
                } else {
                    "convert.svg"
                };
                QueryResult::new(conversion.result(), self.describe(&conversion))
                    .with_icon(icon)
                    .with_clipboard(format_measure(conversion.to_value))
            })
            .collect()
    }
}
