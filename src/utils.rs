// Utility functions
use chrono::NaiveDate;

/// Parses a `YYYY-MM-DD` date, treating the placeholder values the extraction
/// stage is known to emit (`""`, `"None"`, `"null"`, `"0000-00-00"`) as absent.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || matches!(trimmed, "None" | "null" | "0000-00-00") {
        return None;
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_dates_are_absent() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("  "), None);
        assert_eq!(parse_date("None"), None);
        assert_eq!(parse_date("0000-00-00"), None);
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date("2025-10-24"), NaiveDate::from_ymd_opt(2025, 10, 24));
    }
}
