use chrono::{NaiveDate, NaiveDateTime};

/// Accepted date layouts, tried in order. Ambiguous numeric dates are read
/// month-first.
pub const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%Y/%m/%d",
];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%m/%d/%Y %H:%M"];

/// Parse a free-text date. Returns `None` for anything unrecognised.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|dt| dt.date())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn accepted_formats() {
        assert_eq!(parse_date("1990-05-17"), ymd(1990, 5, 17));
        assert_eq!(parse_date("05/17/1990"), ymd(1990, 5, 17));
        assert_eq!(parse_date("17/05/1990"), ymd(1990, 5, 17));
        assert_eq!(parse_date("17-05-1990"), ymd(1990, 5, 17));
        assert_eq!(parse_date("May 17, 1990"), ymd(1990, 5, 17));
        assert_eq!(parse_date("Sep 3, 2001"), ymd(2001, 9, 3));
        assert_eq!(parse_date("1990/05/17"), ymd(1990, 5, 17));
        assert_eq!(parse_date("1990-05-17 08:30:00"), ymd(1990, 5, 17));
    }

    #[test]
    fn ambiguous_dates_are_month_first() {
        assert_eq!(parse_date("03/04/2020"), ymd(2020, 3, 4));
    }

    #[test]
    fn garbage_is_discarded() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("next tuesday"), None);
        assert_eq!(parse_date("2020-13-45"), None);
    }
}
