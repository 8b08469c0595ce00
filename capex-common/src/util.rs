//! Formatting helpers shared by the planner's reports and CLI.

/// Truncate a string to at most `max_chars` characters, appending "..." if truncated.
///
/// Cuts on character boundaries, so multi-byte market names are safe.
pub fn truncate_with_ellipsis(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => {
            let truncated = &s[..idx];
            format!("{}...", truncated.trim_end())
        }
        None => s.to_string(),
    }
}

/// Format an amount in millions as `$1234.56 Million`.
pub fn format_millions(amount: f64) -> String {
    format!("${amount:.2} Million")
}

/// Format an optional amount, rendering `None` as a dash.
pub fn format_optional(amount: Option<f64>, decimals: usize) -> String {
    match amount {
        Some(v) => format!("{v:.decimals$}"),
        None => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_with_ellipsis() {
        assert_eq!(truncate_with_ellipsis("North", 10), "North");
        assert_eq!(truncate_with_ellipsis("North America", 5), "North...");
        assert_eq!(truncate_with_ellipsis("Zürich Süd", 6), "Zürich...");
        assert_eq!(truncate_with_ellipsis("", 10), "");
    }

    #[test]
    fn test_format_millions() {
        assert_eq!(format_millions(12.0), "$12.00 Million");
        assert_eq!(format_millions(0.126), "$0.13 Million");
        assert_eq!(format_millions(1234.5), "$1234.50 Million");
    }

    #[test]
    fn test_format_optional() {
        assert_eq!(format_optional(Some(1.23456), 2), "1.23");
        assert_eq!(format_optional(None, 2), "-");
    }
}
