//! Single forward pass over the chronologically ordered match log.
//!
//! Every call to [`TemporalEngine::advance`] first reads the pre-match state
//! of both players, then folds the result of that match into the running
//! state. The returned signals therefore never contain information from the
//! match itself or any later one.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::elo::{self, EloConfig};
use crate::match_record::{MatchRecord, Surface};
use crate::normalize::Round;

pub const DEFAULT_FALLBACK_MINUTES: f64 = 100.0;
pub const MOMENTUM_WINDOW: usize = 5;
pub const NEUTRAL_MOMENTUM: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub elo: EloConfig,
    pub fallback_minutes: f64,
    pub momentum_window: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            elo: EloConfig::default(),
            fallback_minutes: DEFAULT_FALLBACK_MINUTES,
            momentum_window: MOMENTUM_WINDOW,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchResult {
    #[serde(rename = "W")]
    Win,
    #[serde(rename = "L")]
    Loss,
}

impl MatchResult {
    pub fn letter(&self) -> char {
        match self {
            MatchResult::Win => 'W',
            MatchResult::Loss => 'L',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentResult {
    pub opponent: String,
    pub result: MatchResult,
    pub score: String,
    pub round: Round,
    pub tournament: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub elo: f64,
    pub elo_by_surface: HashMap<Surface, f64>,
    pub fatigue_by_tournament: HashMap<String, f64>,
    recent: VecDeque<RecentResult>,
}

impl PlayerState {
    fn new(initial: f64) -> Self {
        Self {
            elo: initial,
            elo_by_surface: HashMap::new(),
            fatigue_by_tournament: HashMap::new(),
            recent: VecDeque::new(),
        }
    }

    pub fn surface_elo(&self, surface: Surface, initial: f64) -> f64 {
        self.elo_by_surface.get(&surface).copied().unwrap_or(initial)
    }

    pub fn fatigue(&self, tournament: &str) -> f64 {
        self.fatigue_by_tournament
            .get(tournament)
            .copied()
            .unwrap_or(0.0)
    }

    pub fn momentum(&self) -> f64 {
        if self.recent.is_empty() {
            return NEUTRAL_MOMENTUM;
        }
        let wins = self
            .recent
            .iter()
            .filter(|r| r.result == MatchResult::Win)
            .count();
        wins as f64 / self.recent.len() as f64
    }

    /// Oldest first.
    pub fn recent_results(&self) -> impl Iterator<Item = &RecentResult> {
        self.recent.iter()
    }

    fn push_result(&mut self, entry: RecentResult, window: usize) {
        self.recent.push_back(entry);
        while self.recent.len() > window {
            self.recent.pop_front();
        }
    }
}

/// Unordered pair identity: `(a, b)` and `(b, a)` map to the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey {
    low: String,
    high: String,
}

impl PairKey {
    pub fn new(a: &str, b: &str) -> Self {
        if a <= b {
            Self {
                low: a.to_string(),
                high: b.to_string(),
            }
        } else {
            Self {
                low: b.to_string(),
                high: a.to_string(),
            }
        }
    }

    pub fn low(&self) -> &str {
        &self.low
    }

    pub fn high(&self) -> &str {
        &self.high
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadToHead {
    pub low_wins: u32,
    pub high_wins: u32,
}

impl HeadToHead {
    /// Wins of `player` and of the other side, given the pair's key.
    pub fn wins_for(&self, key: &PairKey, player: &str) -> (u32, u32) {
        if key.low() == player {
            (self.low_wins, self.high_wins)
        } else {
            (self.high_wins, self.low_wins)
        }
    }

    fn record_win(&mut self, key: &PairKey, winner: &str) {
        if key.low() == winner {
            self.low_wins += 1;
        } else {
            self.high_wins += 1;
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SideSignals {
    pub elo: f64,
    pub surface_elo: f64,
    pub fatigue: f64,
    pub momentum: f64,
    pub h2h: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PreMatchSignals {
    pub winner: SideSignals,
    pub loser: SideSignals,
}

impl PreMatchSignals {
    /// Elo probability that the eventual winner wins, from pre-match ratings.
    pub fn winner_expected(&self) -> f64 {
        elo::expected_score(self.winner.elo, self.loser.elo)
    }
}

#[derive(Debug, Clone)]
pub struct TemporalEngine {
    config: EngineConfig,
    players: HashMap<String, PlayerState>,
    pairs: HashMap<PairKey, HeadToHead>,
}

impl Default for TemporalEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl TemporalEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            players: HashMap::new(),
            pairs: HashMap::new(),
        }
    }

    /// Reads pre-match signals, then applies the match. Returns what was read.
    /// A row whose winner is also its loser is read but never applied.
    pub fn advance(&mut self, record: &MatchRecord) -> PreMatchSignals {
        let pre = self.pre_match(record);
        if !record.is_self_match() {
            self.apply(record);
        }
        pre
    }

    pub fn pre_match(&self, record: &MatchRecord) -> PreMatchSignals {
        let (w_h2h, l_h2h) = self.h2h_differentials(&record.winner, &record.loser);
        PreMatchSignals {
            winner: self.side(&record.winner, record, w_h2h),
            loser: self.side(&record.loser, record, l_h2h),
        }
    }

    fn side(&self, player: &str, record: &MatchRecord, h2h: i32) -> SideSignals {
        SideSignals {
            elo: self.elo(player),
            surface_elo: self.surface_elo(player, record.surface),
            fatigue: self.fatigue(&record.tourney_id, player),
            momentum: self.momentum(player),
            h2h,
        }
    }

    fn apply(&mut self, record: &MatchRecord) {
        let cfg = self.config;
        let initial = cfg.elo.initial;
        let minutes = record.effective_minutes(cfg.fallback_minutes);

        let global = elo::rate_result(
            self.elo(&record.winner),
            self.elo(&record.loser),
            cfg.elo.k_for_level(&record.tourney_level),
        );
        let surface = elo::rate_result(
            self.surface_elo(&record.winner, record.surface),
            self.surface_elo(&record.loser, record.surface),
            cfg.elo.surface_k_for_level(&record.tourney_level),
        );

        for (player, opponent, result, rating, surface_rating) in [
            (
                &record.winner,
                &record.loser,
                MatchResult::Win,
                global.winner_after,
                surface.winner_after,
            ),
            (
                &record.loser,
                &record.winner,
                MatchResult::Loss,
                global.loser_after,
                surface.loser_after,
            ),
        ] {
            let state = self
                .players
                .entry(player.clone())
                .or_insert_with(|| PlayerState::new(initial));
            state.elo = rating;
            state.elo_by_surface.insert(record.surface, surface_rating);
            *state
                .fatigue_by_tournament
                .entry(record.tourney_id.clone())
                .or_insert(0.0) += minutes;
            state.push_result(
                RecentResult {
                    opponent: opponent.clone(),
                    result,
                    score: record.score.clone(),
                    round: record.round.clone(),
                    tournament: record.tourney_name.clone(),
                },
                cfg.momentum_window,
            );
        }

        let key = PairKey::new(&record.winner, &record.loser);
        self.pairs
            .entry(key.clone())
            .or_default()
            .record_win(&key, &record.winner);
    }

    pub fn player(&self, player: &str) -> Option<&PlayerState> {
        self.players.get(player)
    }

    pub fn elo(&self, player: &str) -> f64 {
        self.players
            .get(player)
            .map(|s| s.elo)
            .unwrap_or(self.config.elo.initial)
    }

    pub fn surface_elo(&self, player: &str, surface: Surface) -> f64 {
        self.players
            .get(player)
            .map(|s| s.surface_elo(surface, self.config.elo.initial))
            .unwrap_or(self.config.elo.initial)
    }

    pub fn fatigue(&self, tournament: &str, player: &str) -> f64 {
        self.players
            .get(player)
            .map(|s| s.fatigue(tournament))
            .unwrap_or(0.0)
    }

    pub fn momentum(&self, player: &str) -> f64 {
        self.players
            .get(player)
            .map(|s| s.momentum())
            .unwrap_or(NEUTRAL_MOMENTUM)
    }

    /// Prior wins of `a` over `b` and of `b` over `a`.
    pub fn head_to_head(&self, a: &str, b: &str) -> (u32, u32) {
        let key = PairKey::new(a, b);
        self.pairs
            .get(&key)
            .map(|h| h.wins_for(&key, a))
            .unwrap_or((0, 0))
    }

    fn h2h_differentials(&self, a: &str, b: &str) -> (i32, i32) {
        let (wins_a, wins_b) = self.head_to_head(a, b);
        let diff = wins_a as i32 - wins_b as i32;
        (diff, -diff)
    }

    pub fn into_snapshot(self) -> EngineSnapshot {
        EngineSnapshot {
            initial_rating: self.config.elo.initial,
            players: self.players,
            head_to_head: HeadToHeadTable { pairs: self.pairs },
        }
    }
}

/// Final engine state, captured once the pass completes.
#[derive(Debug, Clone)]
pub struct EngineSnapshot {
    pub initial_rating: f64,
    pub players: HashMap<String, PlayerState>,
    pub head_to_head: HeadToHeadTable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct H2hRow {
    pub low: String,
    pub high: String,
    pub low_wins: u32,
    pub high_wins: u32,
}

#[derive(Debug, Clone, Default)]
pub struct HeadToHeadTable {
    pairs: HashMap<PairKey, HeadToHead>,
}

impl HeadToHeadTable {
    pub fn from_rows(rows: Vec<H2hRow>) -> Self {
        let mut pairs = HashMap::with_capacity(rows.len());
        for row in rows {
            let key = PairKey::new(&row.low, &row.high);
            let (low_wins, high_wins) = if key.low() == row.low {
                (row.low_wins, row.high_wins)
            } else {
                (row.high_wins, row.low_wins)
            };
            pairs.insert(
                key,
                HeadToHead {
                    low_wins,
                    high_wins,
                },
            );
        }
        Self { pairs }
    }

    pub fn wins(&self, a: &str, b: &str) -> (u32, u32) {
        let key = PairKey::new(a, b);
        self.pairs
            .get(&key)
            .map(|h| h.wins_for(&key, a))
            .unwrap_or((0, 0))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn rows(&self) -> Vec<H2hRow> {
        let mut out: Vec<H2hRow> = self
            .pairs
            .iter()
            .map(|(key, h)| H2hRow {
                low: key.low().to_string(),
                high: key.high().to_string(),
                low_wins: h.low_wins,
                high_wins: h.high_wins,
            })
            .collect();
        out.sort_by(|a, b| a.low.cmp(&b.low).then(a.high.cmp(&b.high)));
        out
    }
}
