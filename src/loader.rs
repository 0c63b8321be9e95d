//! CSV ingestion for match logs and the external ranking / stats tables.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use csv::StringRecord;
use tracing::{debug, warn};

use crate::match_record::{MatchRecord, PlayerBio, Surface};
use crate::normalize::{self, normalize_round};
use crate::profiles::{AdvancedStats, RankingEntry};

const REQUIRED_MATCH_COLUMNS: [&str; 3] = ["tourney_id", "winner_name", "loser_name"];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub rows_read: usize,
    pub rows_kept: usize,
    pub rows_skipped: usize,
    pub surfaces_inferred: usize,
}

struct Columns {
    index: HashMap<String, usize>,
}

impl Columns {
    fn new(headers: &StringRecord) -> Self {
        let index = headers
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.trim().to_ascii_lowercase(), idx))
            .collect();
        Self { index }
    }

    fn require(&self, names: &[&str], what: &str) -> Result<()> {
        let missing: Vec<&str> = names
            .iter()
            .copied()
            .filter(|n| !self.index.contains_key(*n))
            .collect();
        if !missing.is_empty() {
            return Err(anyhow!("{what} is missing required columns: {missing:?}"));
        }
        Ok(())
    }

    fn text<'r>(&self, row: &'r StringRecord, name: &str) -> Option<&'r str> {
        let idx = *self.index.get(name)?;
        let value = row.get(idx)?.trim();
        if value.is_empty() { None } else { Some(value) }
    }

    fn number(&self, row: &StringRecord, name: &str) -> Option<f64> {
        self.text(row, name)?
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
    }

    /// Zero in a bio column means "not recorded".
    fn positive(&self, row: &StringRecord, name: &str) -> Option<f64> {
        self.number(row, name).filter(|v| *v > 0.0)
    }
}

pub fn load_matches(path: &Path, placeholder_dates: &[u32]) -> Result<(Vec<MatchRecord>, LoadReport)> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("open match file {}", path.display()))?;
    read_matches(file, placeholder_dates)
        .with_context(|| format!("parse match file {}", path.display()))
}

pub fn read_matches<R: Read>(
    input: R,
    placeholder_dates: &[u32],
) -> Result<(Vec<MatchRecord>, LoadReport)> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(input);
    let cols = Columns::new(reader.headers().context("read header")?);
    cols.require(&REQUIRED_MATCH_COLUMNS, "match table")?;

    let mut report = LoadReport::default();
    let mut records = Vec::new();
    for (line, row) in reader.records().enumerate() {
        let row = row.with_context(|| format!("read match row {}", line + 2))?;
        report.rows_read += 1;

        let (Some(tourney_id), Some(winner), Some(loser)) = (
            cols.text(&row, "tourney_id"),
            cols.text(&row, "winner_name"),
            cols.text(&row, "loser_name"),
        ) else {
            report.rows_skipped += 1;
            continue;
        };
        if winner == loser {
            report.rows_skipped += 1;
            continue;
        }

        let tourney_name = cols.text(&row, "tourney_name").unwrap_or(tourney_id);
        let surface = match cols.text(&row, "surface") {
            Some(raw) => Surface::parse(raw),
            None => {
                report.surfaces_inferred += 1;
                Surface::infer_from_tournament(tourney_name)
            }
        };
        let raw_date = cols
            .text(&row, "tourney_date")
            .and_then(normalize::parse_raw_date);

        records.push(MatchRecord {
            tourney_id: tourney_id.to_string(),
            tourney_name: tourney_name.to_string(),
            tourney_level: cols.text(&row, "tourney_level").unwrap_or("").to_string(),
            surface,
            date: normalize::repair_date(raw_date, tourney_id, placeholder_dates),
            round: normalize_round(cols.text(&row, "round").unwrap_or("")),
            match_num: cols
                .number(&row, "match_num")
                .filter(|n| *n > 0.0)
                .map(|n| n as u32),
            winner: winner.to_string(),
            loser: loser.to_string(),
            winner_bio: read_bio(&cols, &row, "winner"),
            loser_bio: read_bio(&cols, &row, "loser"),
            minutes: cols.number(&row, "minutes"),
            score: cols.text(&row, "score").unwrap_or("").to_string(),
        });
        report.rows_kept += 1;
    }

    if records.is_empty() {
        return Err(anyhow!("no parseable match rows"));
    }
    if report.rows_skipped > 0 {
        warn!(
            skipped = report.rows_skipped,
            "match rows without two distinct players or a tournament"
        );
    }
    debug!(rows = report.rows_kept, "matches loaded");
    Ok((records, report))
}

fn read_bio(cols: &Columns, row: &StringRecord, side: &str) -> PlayerBio {
    PlayerBio {
        age: cols.positive(row, &format!("{side}_age")),
        height: cols.positive(row, &format!("{side}_ht")),
        country: cols
            .text(row, &format!("{side}_ioc"))
            .filter(|c| *c != "0")
            .map(str::to_string),
        rank: cols
            .positive(row, &format!("{side}_rank"))
            .map(|r| r as u32),
        rank_points: cols.number(row, &format!("{side}_rank_points")),
    }
}

pub fn load_ranking(path: &Path) -> Result<HashMap<String, RankingEntry>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("open ranking file {}", path.display()))?;
    read_ranking(file).with_context(|| format!("parse ranking file {}", path.display()))
}

/// Current ranking keyed by display name. A profile URL, when present, is
/// the authoritative name source. The first row of a duplicated player wins.
pub fn read_ranking<R: Read>(input: R) -> Result<HashMap<String, RankingEntry>> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(input);
    let cols = Columns::new(reader.headers().context("read header")?);
    cols.require(&["rank", "points"], "ranking table")?;
    if !cols.index.contains_key("player") && !cols.index.contains_key("url_perfil") {
        return Err(anyhow!("ranking table needs a player or url_perfil column"));
    }

    let mut out = HashMap::new();
    for row in reader.records() {
        let row = row.context("read ranking row")?;
        let name = cols
            .text(&row, "url_perfil")
            .and_then(name_from_profile_url)
            .or_else(|| cols.text(&row, "player").map(str::to_string));
        let (Some(name), Some(rank)) = (name, cols.positive(&row, "rank")) else {
            continue;
        };
        let points = cols.number(&row, "points").unwrap_or(0.0).max(0.0);
        out.entry(name).or_insert(RankingEntry {
            rank: rank as u32,
            points,
        });
    }
    Ok(out)
}

/// `/en/players/jannik-sinner/s0ag/overview` -> `Jannik Sinner`.
pub fn name_from_profile_url(url: &str) -> Option<String> {
    let mut parts = url.split('/').skip_while(|p| *p != "players");
    parts.next()?;
    let slug = parts.next()?.trim();
    if slug.is_empty() {
        return None;
    }
    let name = slug
        .split('-')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ");
    Some(name)
}

pub fn load_advanced_stats(path: &Path) -> Result<HashMap<String, AdvancedStats>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("open stats file {}", path.display()))?;
    read_advanced_stats(file).with_context(|| format!("parse stats file {}", path.display()))
}

pub fn read_advanced_stats<R: Read>(input: R) -> Result<HashMap<String, AdvancedStats>> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(input);
    let cols = Columns::new(reader.headers().context("read header")?);
    cols.require(&["player"], "advanced stats table")?;

    let mut out = HashMap::new();
    for row in reader.records() {
        let row = row.context("read stats row")?;
        let Some(name) = cols.text(&row, "player") else {
            continue;
        };
        out.entry(name.to_string()).or_insert(AdvancedStats {
            serve_win_pct: cols
                .number(&row, "serve_win_pct")
                .unwrap_or(crate::profiles::DEFAULT_SERVE_WIN),
            bp_saved_pct: cols
                .number(&row, "bp_saved_pct")
                .unwrap_or(crate::profiles::DEFAULT_BP_SAVED),
            service_hold_pct: cols
                .number(&row, "service_hold_pct")
                .unwrap_or(crate::profiles::DEFAULT_SERVICE_HOLD),
            aces_avg: cols.number(&row, "aces_avg").unwrap_or(0.0),
            df_avg: cols.number(&row, "df_avg").unwrap_or(0.0),
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_url_slug_becomes_title_case_name() {
        assert_eq!(
            name_from_profile_url("https://www.atptour.com/en/players/jannik-sinner/s0ag/overview")
                .as_deref(),
            Some("Jannik Sinner")
        );
        assert_eq!(
            name_from_profile_url("/en/players/felix-auger-aliassime/ag37/overview").as_deref(),
            Some("Felix Auger Aliassime")
        );
        assert_eq!(name_from_profile_url("/en/rankings"), None);
    }

    #[test]
    fn missing_required_column_is_an_error() {
        let csv = "tourney_id,winner_name\n2024-1,A\n";
        let err = read_matches(csv.as_bytes(), &[]).unwrap_err();
        assert!(format!("{err:#}").contains("loser_name"));
    }

    #[test]
    fn rows_with_one_player_on_both_sides_are_skipped() {
        let csv = "tourney_id,winner_name,loser_name\n2024-1,A,A\n2024-1,A,B\n";
        let (records, report) = read_matches(csv.as_bytes(), &[]).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(report.rows_skipped, 1);
        assert_eq!(records[0].loser, "B");
    }

    #[test]
    fn zero_bio_cells_read_as_missing() {
        let csv = "tourney_id,tourney_name,surface,tourney_date,winner_name,winner_age,winner_ht,winner_ioc,loser_name,loser_age\n\
                   2024-0300,Miami,Hard,20240320,A,0,0,0,B,27.5\n";
        let (records, report) = read_matches(csv.as_bytes(), &[]).unwrap();
        assert_eq!(report.rows_kept, 1);
        let r = &records[0];
        assert!(r.winner_bio.age.is_none());
        assert!(r.winner_bio.height.is_none());
        assert!(r.winner_bio.country.is_none());
        assert_eq!(r.loser_bio.age, Some(27.5));
        assert_eq!(r.date.yyyymmdd, 20_240_320);
    }
}
