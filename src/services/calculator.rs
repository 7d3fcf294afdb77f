//! Calculator module for evaluating math expressions

use crate::core::handler::{QueryHandler, QueryResult};
use crate::core::query::Query;

use super::format::format_number;

/// Evaluate a math expression and return the result
/// Returns None if the expression is invalid or not a math expression
pub fn evaluate(expr: &str) -> Option<f64> {
    let expr = expr.trim();

    // Skip if empty or doesn't look like math
    if expr.is_empty() {
        return None;
    }

    // Must contain at least one digit
    if !expr.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    match meval::eval_str(normalize(expr)) {
        Ok(result) if result.is_finite() => Some(result),
        _ => None,
    }
}

/// Accept the multiplication and division signs people paste in.
fn normalize(expr: &str) -> String {
    expr.replace('×', "*").replace('÷', "/")
}

/// Format a result for display
/// Removes unnecessary decimal places (e.g., 4.0 -> "4")
pub fn format_result(value: f64) -> String {
    format_number(value)
}

/// Arithmetic evaluator for calculator-mode queries.
#[derive(Debug, Default)]
pub struct CalculatorHandler;

impl QueryHandler for CalculatorHandler {
    fn keyword(&self) -> &'static str {
        "calculator"
    }

    fn handle(&self, query: &Query) -> Vec<QueryResult> {
        let Some(value) = evaluate(&query.argument) else {
            return Vec::new();
        };
        let result = format_result(value);
        vec![QueryResult::new(format!("= {}", result), query.argument.trim())
            .with_icon("calculator.svg")
            .with_clipboard(result)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_math() {
        assert_eq!(evaluate("2+2"), Some(4.0));
        assert_eq!(evaluate("10 - 3"), Some(7.0));
        assert_eq!(evaluate("5 * 6"), Some(30.0));
        assert_eq!(evaluate("20 / 4"), Some(5.0));
    }

    #[test]
    fn test_complex_expressions() {
        assert_eq!(evaluate("2^10"), Some(1024.0));
        assert_eq!(evaluate("sqrt(16)"), Some(4.0));
        assert_eq!(evaluate("(10 + 5) * 2"), Some(30.0));
        assert_eq!(evaluate("3 × 4"), Some(12.0));
    }

    #[test]
    fn test_invalid_expressions() {
        assert_eq!(evaluate("hello"), None);
        assert_eq!(evaluate(""), None);
        assert_eq!(evaluate("abc + def"), None);
        assert_eq!(evaluate("1 / 0"), None);
        assert_eq!(evaluate("10 USD to EUR"), None);
    }

    #[test]
    fn test_format_result() {
        assert_eq!(format_result(4.0), "4");
        assert_eq!(format_result(1.23456), "1.23456");
        assert_eq!(format_result(100.0), "100");
    }

    #[test]
    fn test_handler_result() {
        let results = CalculatorHandler.handle(&Query::calculator("2+2"));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "= 4");
        assert_eq!(results[0].description, "2+2");
        assert_eq!(results[0].clipboard.as_deref(), Some("4"));
    }

    #[test]
    fn test_handler_rejects_non_math() {
        assert!(CalculatorHandler.handle(&Query::calculator("hello")).is_empty());
    }
}
