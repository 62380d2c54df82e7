use chrono::NaiveDate;

/// Trim whitespace + strip outer quotes if present.
pub fn clean_str(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].to_string()
    } else {
        trimmed.to_string()
    }
}

/// Date formats tried in order; first successful parse wins. Month-first
/// before day-first for ambiguous slash dates.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d/%m/%Y", "%d-%m-%Y"];

/// Tolerant calendar-date parse; unparseable input becomes `None`.
/// A trailing time component ("2024-01-05 10:30") is ignored.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let cleaned = clean_str(raw);
    if cleaned.is_empty() {
        return None;
    }
    let date_part = cleaned
        .split_whitespace()
        .next()
        .map(|s| s.split('T').next().unwrap_or(s))?;

    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(date_part, fmt) {
            return Some(d);
        }
    }
    None
}

/// Numeric coercion: non-numeric tokens ("x", "-", "") become `None`.
pub fn parse_numeric(raw: &str) -> Option<f64> {
    let cleaned = clean_str(raw);
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn parses_common_date_formats() {
        assert_eq!(parse_date("2024-01-05"), Some(d(2024, 1, 5)));
        assert_eq!(parse_date("2024/01/05"), Some(d(2024, 1, 5)));
        assert_eq!(parse_date("01/05/2024"), Some(d(2024, 1, 5)));
        assert_eq!(parse_date("2024-01-05 10:30:00"), Some(d(2024, 1, 5)));
        assert_eq!(parse_date(" \"2024-01-05\" "), Some(d(2024, 1, 5)));
    }

    #[test]
    fn day_first_only_when_month_first_fails() {
        // 25 cannot be a month, so the day-first format picks it up.
        assert_eq!(parse_date("25/01/2024"), Some(d(2024, 1, 25)));
        // Ambiguous dates resolve month-first.
        assert_eq!(parse_date("02/03/2024"), Some(d(2024, 2, 3)));
    }

    #[test]
    fn bad_dates_are_none() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date("2024-13-01"), None);
    }

    #[test]
    fn numeric_coercion() {
        assert_eq!(parse_numeric("42"), Some(42.0));
        assert_eq!(parse_numeric(" 3.5 "), Some(3.5));
        assert_eq!(parse_numeric("x"), None);
        assert_eq!(parse_numeric("-"), None);
        assert_eq!(parse_numeric(""), None);
        assert_eq!(parse_numeric("-7.25"), Some(-7.25));
    }
}
