//! Custom Askama template filters.

#![allow(clippy::unnecessary_wraps)]

use std::fmt::Display;

/// Returns the current year.
///
/// Usage in templates: `{{ ""|current_year }}`
#[askama::filter_fn]
pub fn current_year(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<i32> {
    use chrono::Datelike;
    Ok(chrono::Utc::now().year())
}

/// Formats a number of seconds as a short countdown, e.g. `"1d 04h"`,
/// `"2h 05m"` or `"45s"`.
///
/// Usage in templates: `{{ sale.remaining|countdown }}`
#[askama::filter_fn]
pub fn countdown(seconds: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    let seconds: i64 = seconds.to_string().parse().unwrap_or(0);
    Ok(format_countdown(seconds))
}

fn format_countdown(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let (days, hours, minutes) = (seconds / 86_400, seconds % 86_400 / 3_600, seconds % 3_600 / 60);
    if days > 0 {
        format!("{days}d {hours:02}h")
    } else if hours > 0 {
        format!("{hours}h {minutes:02}m")
    } else if minutes > 0 {
        format!("{minutes}m {:02}s", seconds % 60)
    } else {
        format!("{seconds}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_countdown_units() {
        assert_eq!(format_countdown(45), "45s");
        assert_eq!(format_countdown(125), "2m 05s");
        assert_eq!(format_countdown(2 * 3_600 + 5 * 60), "2h 05m");
        assert_eq!(format_countdown(86_400 + 4 * 3_600), "1d 04h");
        assert_eq!(format_countdown(-10), "0s");
    }
}
