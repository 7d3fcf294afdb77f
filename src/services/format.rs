/// Format a floating-point number for display
/// Removes unnecessary decimal places (e.g., 4.0 -> "4")
/// Limits precision to 10 decimal places
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e12 {
        format!("{}", value as i64)
    } else {
        trim_decimals(format!("{:.10}", value))
    }
}

/// Format a measured quantity: six decimals, scientific notation at the extremes.
pub fn format_measure(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e12 {
        format!("{}", value as i64)
    } else if value.abs() < 1e-4 || value.abs() >= 1e12 {
        format!("{:.4e}", value)
    } else {
        trim_decimals(format!("{:.6}", value))
    }
}

fn trim_decimals(formatted: String) -> String {
    if !formatted.contains('.') {
        return formatted;
    }
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "-0" => "0".to_string(),
        other => other.to_string(),
    }
}
