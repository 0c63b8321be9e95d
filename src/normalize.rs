use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Dates at or below this are treated as missing.
pub const DATE_FLOOR: i64 = 19_900_000;
pub const UNRESOLVED_DATE: u32 = 0;
/// Id prefixes below this are not years.
const MIN_ID_YEAR: u32 = 1900;
/// Scraped rows were stamped with these instead of the real start date.
pub const DEFAULT_PLACEHOLDER_DATES: [u32; 2] = [20_250_101, 20_260_101];

// Order matters: the first keyword found in the tournament id wins.
const TOURNAMENT_CALENDAR: &[(&str, u32)] = &[
    ("australian", 115),
    ("dallas", 205),
    ("rotterdam", 205),
    ("buenos-aires", 205),
    ("indian", 310),
    ("miami", 325),
    ("monte", 415),
    ("madrid", 501),
    ("rome", 515),
    ("garros", 528),
    ("wimbledon", 701),
    ("canada", 807),
    ("cincinnati", 815),
    ("us-open", 828),
    ("shanghai", 1005),
    ("paris", 1030),
    ("finals", 1115),
];

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Round {
    Q1,
    Q2,
    Q3,
    R128,
    R64,
    R32,
    R16,
    QF,
    SF,
    F,
    W,
    RR,
    Other(String),
}

static ROUND_ALIASES: Lazy<HashMap<&'static str, Round>> = Lazy::new(|| {
    HashMap::from([
        ("q1", Round::Q1),
        ("q2", Round::Q2),
        ("q3", Round::Q3),
        ("1st round qualifying", Round::Q1),
        ("2nd round qualifying", Round::Q2),
        ("3rd round qualifying", Round::Q3),
        ("qualifying round", Round::Q1),
        ("r128", Round::R128),
        ("round of 128", Round::R128),
        ("r64", Round::R64),
        ("round of 64", Round::R64),
        ("r32", Round::R32),
        ("round of 32", Round::R32),
        ("r16", Round::R16),
        ("round of 16", Round::R16),
        ("qf", Round::QF),
        ("quarterfinals", Round::QF),
        ("quarterfinal", Round::QF),
        ("sf", Round::SF),
        ("semifinals", Round::SF),
        ("semifinal", Round::SF),
        ("f", Round::F),
        ("final", Round::F),
        ("finals", Round::F),
        ("the final", Round::F),
        ("w", Round::W),
        ("winner", Round::W),
        ("rr", Round::RR),
        ("round robin", Round::RR),
    ])
});

impl Round {
    pub fn code(&self) -> &str {
        match self {
            Round::Q1 => "Q1",
            Round::Q2 => "Q2",
            Round::Q3 => "Q3",
            Round::R128 => "R128",
            Round::R64 => "R64",
            Round::R32 => "R32",
            Round::R16 => "R16",
            Round::QF => "QF",
            Round::SF => "SF",
            Round::F => "F",
            Round::W => "W",
            Round::RR => "RR",
            Round::Other(raw) => raw,
        }
    }

    /// Monotonic importance: qualifying < round robin < main draw < final.
    pub fn importance(&self) -> u32 {
        match self {
            Round::Q1 => 1,
            Round::Q2 => 2,
            Round::Q3 => 3,
            Round::RR => 5,
            Round::R128 => 10,
            Round::R64 => 20,
            Round::R32 => 30,
            Round::R16 => 40,
            Round::QF => 50,
            Round::SF => 60,
            Round::F => 70,
            Round::W => 80,
            Round::Other(_) => 0,
        }
    }

    pub fn is_mapped(&self) -> bool {
        !matches!(self, Round::Other(_))
    }
}

impl fmt::Display for Round {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Canonical short code for a free-text round label. Unknown labels come
/// back as `Round::Other` with surrounding whitespace removed.
pub fn normalize_round(raw: &str) -> Round {
    let trimmed = raw.trim();
    ROUND_ALIASES
        .get(trimmed.to_ascii_lowercase().as_str())
        .cloned()
        .unwrap_or_else(|| Round::Other(trimmed.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DateSource {
    Observed,
    Derived { keyword: String },
    YearOnly,
    Sentinel,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepairedDate {
    pub yyyymmdd: u32,
    pub source: DateSource,
}

impl RepairedDate {
    pub fn observed(yyyymmdd: u32) -> Self {
        Self {
            yyyymmdd,
            source: DateSource::Observed,
        }
    }

    pub fn is_repaired(&self) -> bool {
        self.source != DateSource::Observed
    }

    pub fn year(&self) -> u32 {
        self.yyyymmdd / 10_000
    }
}

/// Accepts `20240115`, `20240115.0` (spreadsheet exports) and `2024-01-15`.
pub fn parse_raw_date(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(v) = trimmed.parse::<i64>() {
        return Some(v);
    }
    if let Ok(v) = trimmed.parse::<f64>()
        && v.is_finite()
        && v.fract() == 0.0
    {
        return Some(v as i64);
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .map(|d| d.format("%Y%m%d").to_string())
        .and_then(|s| s.parse::<i64>().ok())
}

pub fn is_calendar_date(yyyymmdd: i64) -> bool {
    if !(10_000_101..=99_991_231).contains(&yyyymmdd) {
        return false;
    }
    let year = (yyyymmdd / 10_000) as i32;
    let month = ((yyyymmdd / 100) % 100) as u32;
    let day = (yyyymmdd % 100) as u32;
    NaiveDate::from_ymd_opt(year, month, day).is_some()
}

pub fn repair_date(raw: Option<i64>, tourney_id: &str, placeholders: &[u32]) -> RepairedDate {
    if let Some(v) = raw
        && v > DATE_FLOOR
        && is_calendar_date(v)
        && !placeholders.iter().any(|p| i64::from(*p) == v)
    {
        return RepairedDate::observed(v as u32);
    }
    derive_date_from_id(tourney_id)
}

fn derive_date_from_id(tourney_id: &str) -> RepairedDate {
    let Some(year) = tourney_id
        .split('-')
        .next()
        .map(str::trim)
        .filter(|part| part.len() == 4 && part.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|part| part.parse::<u32>().ok())
        .filter(|year| *year >= MIN_ID_YEAR)
    else {
        return RepairedDate {
            yyyymmdd: UNRESOLVED_DATE,
            source: DateSource::Sentinel,
        };
    };

    let lower = tourney_id.to_ascii_lowercase();
    match TOURNAMENT_CALENDAR
        .iter()
        .find(|(keyword, _)| lower.contains(keyword))
    {
        Some((keyword, month_day)) => RepairedDate {
            yyyymmdd: year * 10_000 + month_day,
            source: DateSource::Derived {
                keyword: (*keyword).to_string(),
            },
        },
        None => RepairedDate {
            yyyymmdd: year * 10_000 + 101,
            source: DateSource::YearOnly,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_date_accepts_float_and_iso_forms() {
        assert_eq!(parse_raw_date("20240115"), Some(20_240_115));
        assert_eq!(parse_raw_date("20240115.0"), Some(20_240_115));
        assert_eq!(parse_raw_date("2024-01-15"), Some(20_240_115));
        assert_eq!(parse_raw_date("n/a"), None);
    }

    #[test]
    fn calendar_check_rejects_impossible_days() {
        assert!(is_calendar_date(20_240_229));
        assert!(!is_calendar_date(20_230_229));
        assert!(!is_calendar_date(20_241_301));
    }
}
