//! Number base conversion (binary, octal, decimal, hexadecimal).

use std::sync::Arc;

use crate::core::handler::{QueryHandler, QueryResult};
use crate::core::query::Query;

use super::calculator::evaluate;
use super::lang::Translator;

/// Largest magnitude an `f64` holds without losing integer precision.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Radix {
    Binary,
    Octal,
    Decimal,
    Hexadecimal,
}

impl Radix {
    pub fn value(self) -> u32 {
        match self {
            Radix::Binary => 2,
            Radix::Octal => 8,
            Radix::Decimal => 10,
            Radix::Hexadecimal => 16,
        }
    }

    /// Key in the `base` translation namespace.
    fn key(self) -> &'static str {
        match self {
            Radix::Binary => "binary",
            Radix::Octal => "octal",
            Radix::Decimal => "decimal",
            Radix::Hexadecimal => "hexadecimal",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Radix::Binary => "Binary",
            Radix::Octal => "Octal",
            Radix::Decimal => "Decimal",
            Radix::Hexadecimal => "Hexadecimal",
        }
    }

    /// Render `value` in this base. Hex digits are uppercase.
    pub fn render(self, value: i64) -> String {
        let sign = if value < 0 { "-" } else { "" };
        let magnitude = value.unsigned_abs();
        let digits = match self {
            Radix::Binary => format!("{:b}", magnitude),
            Radix::Octal => format!("{:o}", magnitude),
            Radix::Decimal => format!("{}", magnitude),
            Radix::Hexadecimal => format!("{:X}", magnitude),
        };
        format!("{}{}", sign, digits)
    }
}

/// Parse an integer literal with an optional `0x`, `0o` or `0b` prefix.
pub fn parse_literal(input: &str) -> Option<i64> {
    let input = input.trim().replace('_', "");
    let (negative, body) = match input.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, input.as_str()),
    };
    let lower = body.to_lowercase();
    let (radix, digits) = if let Some(d) = lower.strip_prefix("0x") {
        (16, d)
    } else if let Some(d) = lower.strip_prefix("0o") {
        (8, d)
    } else if let Some(d) = lower.strip_prefix("0b") {
        (2, d)
    } else {
        return None;
    };
    if digits.is_empty() || digits.starts_with(['+', '-']) {
        return None;
    }
    let magnitude = i64::from_str_radix(digits, radix).ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

/// Parse bare hexadecimal digits such as `ff` or `1A2B`.
fn parse_bare_hex(input: &str) -> Option<i64> {
    let input = input.trim();
    let is_hex = !input.is_empty()
        && input.chars().all(|c| c.is_ascii_hexdigit())
        && input.chars().any(|c| c.is_ascii_alphabetic());
    if !is_hex {
        return None;
    }
    i64::from_str_radix(input, 16).ok()
}

/// Evaluate an arithmetic expression that must produce an integer.
fn parse_expression(input: &str) -> Option<i64> {
    let value = evaluate(input)?;
    if value.fract() != 0.0 || value.abs() > MAX_EXACT_INTEGER {
        return None;
    }
    Some(value as i64)
}

/// Converts integers into one target base.
pub struct BaseHandler {
    radix: Radix,
    translator: Arc<dyn Translator>,
}

impl BaseHandler {
    pub fn new(radix: Radix, translator: Arc<dyn Translator>) -> Self {
        Self { radix, translator }
    }

    pub fn radix(&self) -> Radix {
        self.radix
    }

    fn parse(&self, input: &str) -> Option<i64> {
        parse_literal(input)
            .or_else(|| match self.radix {
                Radix::Decimal => parse_bare_hex(input),
                _ => None,
            })
            .or_else(|| parse_expression(input))
    }
}

impl std::fmt::Debug for BaseHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaseHandler").field("radix", &self.radix).finish()
    }
}

impl QueryHandler for BaseHandler {
    fn keyword(&self) -> &'static str {
        match self.radix {
            Radix::Binary => "bin",
            Radix::Octal => "oct",
            Radix::Decimal => "dec",
            Radix::Hexadecimal => "hex",
        }
    }

    fn handle(&self, query: &Query) -> Vec<QueryResult> {
        let Some(value) = self.parse(&query.argument) else {
            return Vec::new();
        };
        let rendered = self.radix.render(value);
        let label = self
            .translator
            .translate(self.radix.key(), "base")
            .unwrap_or_else(|| self.radix.label().to_string());
        vec![QueryResult::new(
            rendered.clone(),
            format!("{} of {}", label, query.argument.trim()),
        )
        .with_icon(format!("{}.svg", self.keyword()))
        .with_clipboard(rendered)]
    }
}
