//! Per-player current-state snapshot for live lookups.
//!
//! Bio attributes are carried forward: a field only changes when a row
//! brings a present, sane value, and every field remembers where its value
//! came from.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::{EngineSnapshot, RecentResult};
use crate::match_record::{MatchRecord, PlayerBio, Surface};

pub const DEFAULT_RANK: u32 = 500;
pub const DEFAULT_AGE: f64 = 25.0;
pub const DEFAULT_HEIGHT: f64 = 185.0;
pub const DEFAULT_COUNTRY: &str = "UNK";
pub const DEFAULT_POINTS: f64 = 0.0;

pub const DEFAULT_SERVE_WIN: f64 = 65.0;
pub const DEFAULT_BP_SAVED: f64 = 60.0;
pub const DEFAULT_SERVICE_HOLD: f64 = 75.0;

pub const ROOKIE_RANK: u32 = 150;
pub const ROOKIE_AGE: f64 = 22.0;

const MIN_PLAUSIBLE_AGE: f64 = 10.0;
const MIN_PLAUSIBLE_HEIGHT: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Provenance {
    Default,
    Observed { position: usize, tournament: String },
    External { source: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tracked<T> {
    pub value: T,
    pub provenance: Provenance,
}

impl<T> Tracked<T> {
    pub fn fallback(value: T) -> Self {
        Self {
            value,
            provenance: Provenance::Default,
        }
    }

    pub fn observe(&mut self, value: T, position: usize, tournament: &str) {
        self.value = value;
        self.provenance = Provenance::Observed {
            position,
            tournament: tournament.to_string(),
        };
    }

    pub fn overwrite_external(&mut self, value: T, source: &str) {
        self.value = value;
        self.provenance = Provenance::External {
            source: source.to_string(),
        };
    }

    pub fn is_default(&self) -> bool {
        self.provenance == Provenance::Default
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BioCache {
    pub age: Tracked<f64>,
    pub height: Tracked<f64>,
    pub country: Tracked<String>,
    pub rank: Tracked<u32>,
    pub rank_points: Tracked<f64>,
}

impl Default for BioCache {
    fn default() -> Self {
        Self {
            age: Tracked::fallback(DEFAULT_AGE),
            height: Tracked::fallback(DEFAULT_HEIGHT),
            country: Tracked::fallback(DEFAULT_COUNTRY.to_string()),
            rank: Tracked::fallback(DEFAULT_RANK),
            rank_points: Tracked::fallback(DEFAULT_POINTS),
        }
    }
}

impl BioCache {
    /// Folds one row's bio in. Returns how many fields were rejected or absent.
    pub fn absorb(&mut self, bio: &PlayerBio, position: usize, tournament: &str) -> usize {
        let mut skipped = 0;
        match bio.age {
            Some(age) if age.is_finite() && age > MIN_PLAUSIBLE_AGE => {
                self.age.observe(age, position, tournament)
            }
            _ => skipped += 1,
        }
        match bio.height {
            Some(ht) if ht.is_finite() && ht > MIN_PLAUSIBLE_HEIGHT => {
                self.height.observe(ht, position, tournament)
            }
            _ => skipped += 1,
        }
        match bio.country.as_deref().map(str::trim) {
            Some(ioc) if !ioc.is_empty() && ioc != "0" => {
                self.country.observe(ioc.to_string(), position, tournament)
            }
            _ => skipped += 1,
        }
        match bio.rank {
            Some(rank) if rank > 0 => self.rank.observe(rank, position, tournament),
            _ => skipped += 1,
        }
        match bio.rank_points {
            Some(points) if points.is_finite() && points >= 0.0 => {
                self.rank_points.observe(points, position, tournament)
            }
            _ => skipped += 1,
        }
        skipped
    }

    pub fn resolved(&self) -> ResolvedBio {
        ResolvedBio {
            age: self.age.value,
            height: self.height.value,
            country: self.country.value.clone(),
            rank: self.rank.value,
            rank_points: self.rank_points.value,
        }
    }
}

/// Plain bio values as the feature assembler consumes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedBio {
    pub age: f64,
    pub height: f64,
    pub country: String,
    pub rank: u32,
    pub rank_points: f64,
}

impl Default for ResolvedBio {
    fn default() -> Self {
        BioCache::default().resolved()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankingEntry {
    pub rank: u32,
    pub points: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdvancedStats {
    pub serve_win_pct: f64,
    pub bp_saved_pct: f64,
    pub service_hold_pct: f64,
    pub aces_avg: f64,
    pub df_avg: f64,
}

/// Fresher external tables joined onto profiles after the pass.
#[derive(Debug, Clone, Default)]
pub struct Enrichment {
    pub ranking: HashMap<String, RankingEntry>,
    pub advanced: HashMap<String, AdvancedStats>,
    pub ranking_source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerProfile {
    pub name: String,
    pub age: Tracked<f64>,
    pub height: Tracked<f64>,
    pub country: Tracked<String>,
    pub rank: Tracked<u32>,
    pub rank_points: Tracked<f64>,
    pub momentum: f64,
    pub last_5: Vec<RecentResult>,
    pub matches_played: u32,
    pub elo: f64,
    pub surface_elo: BTreeMap<Surface, f64>,
    pub serve_win: f64,
    pub bp_saved: f64,
    pub service_hold: f64,
    pub aces: f64,
    pub df: f64,
}

impl PlayerProfile {
    pub fn unknown(name: &str, initial_rating: f64) -> Self {
        let bio = BioCache::default();
        Self {
            name: name.to_string(),
            age: bio.age,
            height: bio.height,
            country: bio.country,
            rank: bio.rank,
            rank_points: bio.rank_points,
            momentum: crate::engine::NEUTRAL_MOMENTUM,
            last_5: Vec::new(),
            matches_played: 0,
            elo: initial_rating,
            surface_elo: BTreeMap::new(),
            serve_win: DEFAULT_SERVE_WIN,
            bp_saved: DEFAULT_BP_SAVED,
            service_hold: DEFAULT_SERVICE_HOLD,
            aces: 0.0,
            df: 0.0,
        }
    }

    pub fn bio(&self) -> ResolvedBio {
        ResolvedBio {
            age: self.age.value,
            height: self.height.value,
            country: self.country.value.clone(),
            rank: self.rank.value,
            rank_points: self.rank_points.value,
        }
    }

    pub fn surface_elo_or(&self, surface: Surface, initial: f64) -> f64 {
        self.surface_elo.get(&surface).copied().unwrap_or(initial)
    }
}

/// Bio and match counts collected during the chronological pass.
#[derive(Debug, Clone, Default)]
pub struct ProfileBook {
    bios: HashMap<String, BioCache>,
    matches_played: HashMap<String, u32>,
    skipped_fields: usize,
}

impl ProfileBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Absorbs one match and returns the carried-forward bio of winner and
    /// loser as of this match.
    pub fn observe(&mut self, position: usize, record: &MatchRecord) -> (ResolvedBio, ResolvedBio) {
        let winner = self.observe_side(&record.winner, &record.winner_bio, position, record);
        let loser = self.observe_side(&record.loser, &record.loser_bio, position, record);
        (winner, loser)
    }

    fn observe_side(
        &mut self,
        player: &str,
        bio: &PlayerBio,
        position: usize,
        record: &MatchRecord,
    ) -> ResolvedBio {
        *self.matches_played.entry(player.to_string()).or_insert(0) += 1;
        let cache = self.bios.entry(player.to_string()).or_default();
        self.skipped_fields += cache.absorb(bio, position, &record.tourney_id);
        cache.resolved()
    }

    pub fn skipped_fields(&self) -> usize {
        self.skipped_fields
    }

    /// Combines the collected bios with the final engine state and the
    /// external tables. External rank/points overwrite historical values.
    pub fn finalize(self, engine: &EngineSnapshot, enrichment: &Enrichment) -> ProfileMap {
        let initial = engine.initial_rating;
        let mut profiles = BTreeMap::new();
        let mut ranked = 0usize;
        let mut with_stats = 0usize;

        for (name, mut bio) in self.bios {
            if let Some(entry) = enrichment.ranking.get(&name) {
                bio.rank.overwrite_external(entry.rank, &enrichment.ranking_source);
                bio.rank_points
                    .overwrite_external(entry.points, &enrichment.ranking_source);
                ranked += 1;
            }

            let played = self.matches_played.get(&name).copied().unwrap_or(0);
            let state = engine.players.get(&name);
            let mut profile = PlayerProfile {
                name: name.clone(),
                age: bio.age,
                height: bio.height,
                country: bio.country,
                rank: bio.rank,
                rank_points: bio.rank_points,
                momentum: state
                    .map(|s| s.momentum())
                    .unwrap_or(crate::engine::NEUTRAL_MOMENTUM),
                last_5: state
                    .map(|s| s.recent_results().cloned().collect())
                    .unwrap_or_default(),
                matches_played: played,
                elo: state.map(|s| s.elo).unwrap_or(initial),
                surface_elo: state
                    .map(|s| s.elo_by_surface.iter().map(|(k, v)| (*k, *v)).collect())
                    .unwrap_or_default(),
                serve_win: DEFAULT_SERVE_WIN,
                bp_saved: DEFAULT_BP_SAVED,
                service_hold: DEFAULT_SERVICE_HOLD,
                aces: 0.0,
                df: 0.0,
            };

            if let Some(stats) = enrichment.advanced.get(&name) {
                let per_match = played.max(1) as f64;
                profile.serve_win = stats.serve_win_pct;
                profile.bp_saved = stats.bp_saved_pct;
                profile.service_hold = stats.service_hold_pct;
                profile.aces = stats.aces_avg / per_match;
                profile.df = stats.df_avg / per_match;
                with_stats += 1;
            }

            profiles.insert(name, profile);
        }

        debug!(
            players = profiles.len(),
            ranked, with_stats, "profiles finalized"
        );
        ProfileMap {
            profiles,
            initial_rating: initial,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProfileMap {
    profiles: BTreeMap<String, PlayerProfile>,
    initial_rating: f64,
}

impl ProfileMap {
    pub fn from_profiles(profiles: Vec<PlayerProfile>, initial_rating: f64) -> Self {
        Self {
            profiles: profiles.into_iter().map(|p| (p.name.clone(), p)).collect(),
            initial_rating,
        }
    }

    pub fn get(&self, name: &str) -> Option<&PlayerProfile> {
        self.profiles.get(name)
    }

    /// Unknown players resolve to the documented defaults, never an error.
    pub fn lookup(&self, name: &str) -> PlayerProfile {
        self.profiles
            .get(name)
            .cloned()
            .unwrap_or_else(|| PlayerProfile::unknown(name, self.initial_rating))
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlayerProfile> {
        self.profiles.values()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn initial_rating(&self) -> f64 {
        self.initial_rating
    }
}

/// Fills missing bio fields on freshly scraped rows. Known players get their
/// profile values (age shifted by `age_offset`); unknown ones get rookie
/// defaults. Returns the number of fields filled.
pub fn backfill_bio(record: &mut MatchRecord, profiles: &ProfileMap, age_offset: f64) -> usize {
    let winner = record.winner.clone();
    let loser = record.loser.clone();
    fill_side(&mut record.winner_bio, profiles.get(&winner), age_offset)
        + fill_side(&mut record.loser_bio, profiles.get(&loser), age_offset)
}

/// Backfills every record; returns the total number of fields filled.
pub fn backfill_records(records: &mut [MatchRecord], profiles: &ProfileMap, age_offset: f64) -> usize {
    let filled: usize = records
        .iter_mut()
        .map(|record| backfill_bio(record, profiles, age_offset))
        .sum();
    debug!(rows = records.len(), filled, "bio backfill");
    filled
}

fn fill_side(bio: &mut PlayerBio, profile: Option<&PlayerProfile>, age_offset: f64) -> usize {
    let (age, height, country, rank) = match profile {
        Some(p) => (
            p.age.value + age_offset,
            p.height.value,
            p.country.value.clone(),
            p.rank.value,
        ),
        None => (
            ROOKIE_AGE,
            DEFAULT_HEIGHT,
            DEFAULT_COUNTRY.to_string(),
            ROOKIE_RANK,
        ),
    };

    let mut filled = 0;
    if bio.age.is_none() {
        bio.age = Some(age);
        filled += 1;
    }
    if bio.height.is_none() {
        bio.height = Some(height);
        filled += 1;
    }
    if bio.country.is_none() {
        bio.country = Some(country);
        filled += 1;
    }
    if bio.rank.is_none() {
        bio.rank = Some(rank);
        filled += 1;
    }
    filled
}
