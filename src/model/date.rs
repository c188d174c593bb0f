//! Year and month extraction from free-text genealogical dates.
//!
//! GEDCOM dates come in many shapes ("ABT 1850", "BET 1850 AND 1860",
//! "12 MAR 1850", "1850-03-12"). Only the pieces needed downstream are read;
//! anything unrecognised yields `None`.

use regex::Regex;
use std::sync::LazyLock;

static YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^0-9])([0-9]{4})(?:[^0-9]|$)").expect("valid year regex"));

static ISO_MONTH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[0-9]{4}-([0-9]{2})").expect("valid iso regex"));

static NUMERIC_MONTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*[0-9]{1,2}[./]([0-9]{1,2})[./][0-9]{4}\s*$").expect("valid numeric regex")
});

const MONTHS: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];

/// First standalone four-digit year in a date string
#[must_use]
pub fn extract_year(date: &str) -> Option<i32> {
    let caps = YEAR.captures(date)?;
    let year: i32 = caps.get(1)?.as_str().parse().ok()?;
    (year > 0).then_some(year)
}

/// Month (1-12) of a date string
///
/// Accepts GEDCOM month abbreviations, ISO `YYYY-MM[-DD]`, and the
/// day-first `DD.MM.YYYY` / `DD/MM/YYYY` forms.
#[must_use]
pub fn extract_month(date: &str) -> Option<u8> {
    for token in date.split(|c: char| !c.is_ascii_alphabetic()) {
        if token.len() < 3 {
            continue;
        }
        let upper = token.to_ascii_uppercase();
        if let Some(idx) = MONTHS.iter().position(|m| upper.starts_with(m)) {
            // Reject words that merely start like a month ("MARRIED")
            if upper.len() == 3 || is_full_month_name(&upper, idx) {
                return Some(idx as u8 + 1);
            }
        }
    }

    let caps = ISO_MONTH
        .captures(date)
        .or_else(|| NUMERIC_MONTH.captures(date))?;
    let month: u8 = caps.get(1)?.as_str().parse().ok()?;
    (1..=12).contains(&month).then_some(month)
}

fn is_full_month_name(upper: &str, idx: usize) -> bool {
    const FULL: [&str; 12] = [
        "JANUARY", "FEBRUARY", "MARCH", "APRIL", "MAY", "JUNE", "JULY", "AUGUST", "SEPTEMBER",
        "OCTOBER", "NOVEMBER", "DECEMBER",
    ];
    upper == FULL[idx] || (idx == 8 && upper == "SEPT")
}
