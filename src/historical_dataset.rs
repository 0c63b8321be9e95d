use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, params};

use crate::loader::LoadReport;
use crate::match_record::{MatchRecord, PlayerBio, Surface};
use crate::normalize::{DateSource, RepairedDate, normalize_round};
use crate::persist::app_cache_dir;
use crate::pipeline::AugmentedMatch;
use crate::profiles::{self, ProfileMap};

#[derive(Debug, Clone)]
pub struct IngestSummary {
    pub db_path: PathBuf,
    pub source: String,
    pub rows_read: usize,
    pub rows_skipped: usize,
    pub matches_upserted: usize,
    pub bio_fields_filled: usize,
    pub latest_date: Option<u32>,
}

/// Pre-match signals as stored for one match.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredPrematch {
    pub match_key: String,
    pub position: usize,
    pub values: [f64; 10],
}

pub fn default_db_path() -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join("historical_matches.sqlite"))
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS matches (
            match_key TEXT PRIMARY KEY,
            tourney_id TEXT NOT NULL,
            tourney_name TEXT NOT NULL,
            tourney_level TEXT NOT NULL,
            surface TEXT NOT NULL,
            tourney_date INTEGER NOT NULL,
            date_source TEXT NOT NULL,
            round TEXT NOT NULL,
            match_num INTEGER NULL,
            winner_name TEXT NOT NULL,
            winner_age REAL NULL,
            winner_ht REAL NULL,
            winner_ioc TEXT NULL,
            winner_rank INTEGER NULL,
            winner_rank_points REAL NULL,
            loser_name TEXT NOT NULL,
            loser_age REAL NULL,
            loser_ht REAL NULL,
            loser_ioc TEXT NULL,
            loser_rank INTEGER NULL,
            loser_rank_points REAL NULL,
            minutes REAL NULL,
            score TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_matches_date ON matches(tourney_date);
        CREATE INDEX IF NOT EXISTS idx_matches_tourney ON matches(tourney_id);
        CREATE INDEX IF NOT EXISTS idx_matches_winner ON matches(winner_name);
        CREATE INDEX IF NOT EXISTS idx_matches_loser ON matches(loser_name);

        CREATE TABLE IF NOT EXISTS prematch (
            match_key TEXT PRIMARY KEY,
            position INTEGER NOT NULL,
            winner_elo REAL NOT NULL,
            loser_elo REAL NOT NULL,
            winner_surface_elo REAL NOT NULL,
            loser_surface_elo REAL NOT NULL,
            winner_fatigue REAL NOT NULL,
            loser_fatigue REAL NOT NULL,
            winner_momentum REAL NOT NULL,
            loser_momentum REAL NOT NULL,
            winner_h2h REAL NOT NULL,
            loser_h2h REAL NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS ingest_runs (
            run_id INTEGER PRIMARY KEY AUTOINCREMENT,
            started_at TEXT NOT NULL,
            finished_at TEXT NULL,
            source TEXT NOT NULL,
            rows_read INTEGER NOT NULL,
            rows_skipped INTEGER NOT NULL,
            matches_upserted INTEGER NOT NULL
        );
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

/// Stable identity of a match across re-ingests of the same source.
pub fn match_key(record: &MatchRecord) -> String {
    format!(
        "{}|{}|{}|{}",
        record.tourney_id,
        record.round.code(),
        record.winner,
        record.loser
    )
}

pub fn ingest_matches(
    conn: &mut Connection,
    db_path: PathBuf,
    source: &str,
    records: &[MatchRecord],
    report: &LoadReport,
) -> Result<IngestSummary> {
    let started_at = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO ingest_runs(started_at, finished_at, source, rows_read, rows_skipped, matches_upserted)
         VALUES (?1, NULL, ?2, ?3, ?4, 0)",
        params![
            started_at,
            source,
            report.rows_read as i64,
            report.rows_skipped as i64
        ],
    )
    .context("insert ingest run")?;
    let run_id = conn.last_insert_rowid();

    let mut matches_upserted = 0usize;
    let tx = conn.transaction().context("begin ingest transaction")?;
    for record in records {
        upsert_match(&tx, record)?;
        matches_upserted += 1;
    }
    tx.commit().context("commit ingest transaction")?;

    let finished_at = Utc::now().to_rfc3339();
    conn.execute(
        "UPDATE ingest_runs SET finished_at = ?1, matches_upserted = ?2 WHERE run_id = ?3",
        params![finished_at, matches_upserted as i64, run_id],
    )
    .context("update ingest run")?;

    let latest_date = conn
        .query_row(
            "SELECT MAX(tourney_date) FROM matches WHERE tourney_date > 0",
            [],
            |row| row.get::<_, Option<u32>>(0),
        )
        .context("query latest tourney_date")?;

    Ok(IngestSummary {
        db_path,
        source: source.to_string(),
        rows_read: report.rows_read,
        rows_skipped: report.rows_skipped,
        matches_upserted,
        bio_fields_filled: 0,
        latest_date,
    })
}

/// Ingest for freshly scraped rows: missing bio cells are filled from
/// `profiles` first, ages shifted by `age_offset`.
pub fn ingest_fresh_matches(
    conn: &mut Connection,
    db_path: PathBuf,
    source: &str,
    mut records: Vec<MatchRecord>,
    report: &LoadReport,
    profiles: &ProfileMap,
    age_offset: f64,
) -> Result<IngestSummary> {
    let filled = profiles::backfill_records(&mut records, profiles, age_offset);
    let mut summary = ingest_matches(conn, db_path, source, &records, report)?;
    summary.bio_fields_filled = filled;
    Ok(summary)
}

/// All stored matches. Row order is only a convenience; callers sequence
/// them before any temporal processing.
pub fn load_matches(conn: &Connection) -> Result<Vec<MatchRecord>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT
                tourney_id, tourney_name, tourney_level, surface,
                tourney_date, date_source, round, match_num,
                winner_name, winner_age, winner_ht, winner_ioc, winner_rank, winner_rank_points,
                loser_name, loser_age, loser_ht, loser_ioc, loser_rank, loser_rank_points,
                minutes, score
            FROM matches
            ORDER BY tourney_date ASC, tourney_id ASC, rowid ASC
            "#,
        )
        .context("prepare load matches query")?;

    let rows = stmt
        .query_map([], |row| {
            let date_source: String = row.get(5)?;
            let round: String = row.get(6)?;
            let surface: String = row.get(3)?;
            Ok(MatchRecord {
                tourney_id: row.get(0)?,
                tourney_name: row.get(1)?,
                tourney_level: row.get(2)?,
                surface: Surface::parse(&surface),
                date: RepairedDate {
                    yyyymmdd: row.get::<_, u32>(4)?,
                    source: serde_json::from_str::<DateSource>(&date_source)
                        .unwrap_or(DateSource::Observed),
                },
                round: normalize_round(&round),
                match_num: row.get(7)?,
                winner: row.get(8)?,
                winner_bio: PlayerBio {
                    age: row.get(9)?,
                    height: row.get(10)?,
                    country: row.get(11)?,
                    rank: row.get(12)?,
                    rank_points: row.get(13)?,
                },
                loser: row.get(14)?,
                loser_bio: PlayerBio {
                    age: row.get(15)?,
                    height: row.get(16)?,
                    country: row.get(17)?,
                    rank: row.get(18)?,
                    rank_points: row.get(19)?,
                },
                minutes: row.get(20)?,
                score: row.get(21)?,
            })
        })
        .context("query load matches")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode match row")?);
    }
    Ok(out)
}

fn upsert_match(tx: &rusqlite::Transaction<'_>, m: &MatchRecord) -> Result<()> {
    let date_source = serde_json::to_string(&m.date.source).context("encode date source")?;
    tx.execute(
        r#"
        INSERT INTO matches (
            match_key, tourney_id, tourney_name, tourney_level, surface,
            tourney_date, date_source, round, match_num,
            winner_name, winner_age, winner_ht, winner_ioc, winner_rank, winner_rank_points,
            loser_name, loser_age, loser_ht, loser_ioc, loser_rank, loser_rank_points,
            minutes, score, updated_at
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5,
            ?6, ?7, ?8, ?9,
            ?10, ?11, ?12, ?13, ?14, ?15,
            ?16, ?17, ?18, ?19, ?20, ?21,
            ?22, ?23, ?24
        )
        ON CONFLICT(match_key) DO UPDATE SET
            tourney_name = excluded.tourney_name,
            tourney_level = excluded.tourney_level,
            surface = excluded.surface,
            tourney_date = excluded.tourney_date,
            date_source = excluded.date_source,
            match_num = excluded.match_num,
            winner_age = excluded.winner_age,
            winner_ht = excluded.winner_ht,
            winner_ioc = excluded.winner_ioc,
            winner_rank = excluded.winner_rank,
            winner_rank_points = excluded.winner_rank_points,
            loser_age = excluded.loser_age,
            loser_ht = excluded.loser_ht,
            loser_ioc = excluded.loser_ioc,
            loser_rank = excluded.loser_rank,
            loser_rank_points = excluded.loser_rank_points,
            minutes = excluded.minutes,
            score = excluded.score,
            updated_at = excluded.updated_at
        "#,
        params![
            match_key(m),
            m.tourney_id,
            m.tourney_name,
            m.tourney_level,
            m.surface.label(),
            m.date.yyyymmdd,
            date_source,
            m.round.code(),
            m.match_num,
            m.winner,
            m.winner_bio.age,
            m.winner_bio.height,
            m.winner_bio.country,
            m.winner_bio.rank,
            m.winner_bio.rank_points,
            m.loser,
            m.loser_bio.age,
            m.loser_bio.height,
            m.loser_bio.country,
            m.loser_bio.rank,
            m.loser_bio.rank_points,
            m.minutes,
            m.score,
            Utc::now().to_rfc3339(),
        ],
    )
    .context("upsert match")?;
    Ok(())
}

/// Replaces the stored pre-match table with the rows of the latest run.
pub fn store_prematch(conn: &mut Connection, rows: &[AugmentedMatch]) -> Result<usize> {
    let updated_at = Utc::now().to_rfc3339();
    let tx = conn.transaction().context("begin prematch transaction")?;
    tx.execute("DELETE FROM prematch", [])
        .context("clear prematch table")?;
    for m in rows {
        let v = m.augmented_values();
        tx.execute(
            r#"
            INSERT OR REPLACE INTO prematch (
                match_key, position,
                winner_elo, loser_elo, winner_surface_elo, loser_surface_elo,
                winner_fatigue, loser_fatigue, winner_momentum, loser_momentum,
                winner_h2h, loser_h2h, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
            params![
                match_key(&m.record),
                m.position as i64,
                v[0],
                v[1],
                v[2],
                v[3],
                v[4],
                v[5],
                v[6],
                v[7],
                v[8],
                v[9],
                updated_at,
            ],
        )
        .context("insert prematch row")?;
    }
    tx.commit().context("commit prematch transaction")?;
    Ok(rows.len())
}

pub fn load_prematch(conn: &Connection) -> Result<Vec<StoredPrematch>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT
                match_key, position,
                winner_elo, loser_elo, winner_surface_elo, loser_surface_elo,
                winner_fatigue, loser_fatigue, winner_momentum, loser_momentum,
                winner_h2h, loser_h2h
            FROM prematch
            ORDER BY position ASC
            "#,
        )
        .context("prepare load prematch query")?;

    let rows = stmt
        .query_map([], |row| {
            let mut values = [0.0; 10];
            for (idx, slot) in values.iter_mut().enumerate() {
                *slot = row.get::<_, f64>(idx + 2)?;
            }
            Ok(StoredPrematch {
                match_key: row.get(0)?,
                position: row.get::<_, i64>(1)? as usize,
                values,
            })
        })
        .context("query load prematch")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode prematch row")?);
    }
    Ok(out)
}
