//! Percentage calculations.
//!
//! Supported forms, where each operand may itself be an arithmetic expression:
//!
//! - `A% of B` -> A percent of B
//! - `A as % of B` -> what percent A is of B
//! - `B + A%` / `B - A%` -> B increased or decreased by A percent
//! - `A to B` -> percentage change from A to B

use crate::core::handler::{QueryHandler, QueryResult};
use crate::core::query::Query;

use super::calculator::evaluate;
use super::format::format_number;

/// A percentage calculation result.
#[derive(Debug, Clone, PartialEq)]
pub struct Percentage {
    pub value: f64,
    /// True when `value` is itself a percentage.
    pub is_percent: bool,
    pub description: String,
}

impl Percentage {
    pub fn display(&self) -> String {
        if self.is_percent {
            format!("{}%", format_number(self.value))
        } else {
            format_number(self.value)
        }
    }
}

/// Parse and evaluate a percentage expression.
pub fn calculate(input: &str) -> Option<Percentage> {
    let input = input.trim().to_lowercase();
    if !input.contains('%') {
        return percent_change(&input);
    }

    if let Some((a, b)) = input.split_once(" as % of ") {
        let (a, b) = (evaluate(a)?, evaluate(b)?);
        let pct = a * 100.0 / b;
        return finite(Percentage {
            value: pct,
            is_percent: true,
            description: format!(
                "{} is {}% of {}",
                format_number(a),
                format_number(pct),
                format_number(b)
            ),
        });
    }

    if let Some((a, b)) = input.split_once("% of ") {
        let (a, b) = (evaluate(a)?, evaluate(b)?);
        return finite(Percentage {
            value: a * b / 100.0,
            is_percent: false,
            description: format!("{}% of {}", format_number(a), format_number(b)),
        });
    }

    let body = input.strip_suffix('%')?;
    let split = body.rfind(['+', '-'])?;
    let (base, rest) = body.split_at(split);
    let (sign, pct) = rest.split_at(1);
    if base.trim().is_empty() {
        return None;
    }
    let (base, pct) = (evaluate(base)?, evaluate(pct)?);
    let delta = base * pct / 100.0;
    finite(Percentage {
        value: if sign == "+" { base + delta } else { base - delta },
        is_percent: false,
        description: format!("{} {} {}%", format_number(base), sign, format_number(pct)),
    })
}

fn percent_change(input: &str) -> Option<Percentage> {
    let (from, to) = input.split_once(" to ")?;
    let (from, to) = (evaluate(from)?, evaluate(to)?);
    finite(Percentage {
        value: (to - from) * 100.0 / from,
        is_percent: true,
        description: format!("Change from {} to {}", format_number(from), format_number(to)),
    })
}

fn finite(result: Percentage) -> Option<Percentage> {
    result.value.is_finite().then_some(result)
}

/// Percentage evaluator for calculator-mode queries.
#[derive(Debug, Default)]
pub struct PercentagesHandler;

impl QueryHandler for PercentagesHandler {
    fn keyword(&self) -> &'static str {
        "percentages"
    }

    fn handle(&self, query: &Query) -> Vec<QueryResult> {
        calculate(&query.argument)
            .map(|result| {
                let clipboard = result.display();
                vec![QueryResult::new(result.display(), result.description)
                    .with_icon("percent.svg")
                    .with_clipboard(clipboard)]
            })
            .unwrap_or_default()
    }
}
