use std::collections::HashMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::match_record::{MatchRecord, Surface};

pub const NEUTRAL_SKILL: f64 = 0.5;
pub const DEFAULT_MIN_MATCHES: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SkillKey {
    pub player: String,
    pub surface: Surface,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WinLoss {
    pub wins: u32,
    pub losses: u32,
}

impl WinLoss {
    pub fn total(&self) -> u32 {
        self.wins + self.losses
    }

    pub fn win_rate(&self) -> f64 {
        if self.total() == 0 {
            return NEUTRAL_SKILL;
        }
        self.wins as f64 / self.total() as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillRow {
    pub player: String,
    pub surface: Surface,
    pub wins: u32,
    pub losses: u32,
    pub win_rate: f64,
}

/// Corpus-wide win rate per (player, surface). Not time-aware: it is
/// recomputed wholesale on each run.
#[derive(Debug, Clone, Default)]
pub struct SurfaceSkill {
    defined: HashMap<String, HashMap<Surface, WinLoss>>,
    min_matches: u32,
}

impl SurfaceSkill {
    pub fn compute(records: &[MatchRecord], min_matches: u32) -> Self {
        let counts = records
            .par_iter()
            .filter(|r| r.surface != Surface::Unknown && !r.is_self_match())
            .fold(HashMap::new, |mut acc: HashMap<SkillKey, WinLoss>, r| {
                acc.entry(SkillKey {
                    player: r.winner.clone(),
                    surface: r.surface,
                })
                .or_default()
                .wins += 1;
                acc.entry(SkillKey {
                    player: r.loser.clone(),
                    surface: r.surface,
                })
                .or_default()
                .losses += 1;
                acc
            })
            .reduce(HashMap::new, |mut left, right| {
                for (key, wl) in right {
                    let slot = left.entry(key).or_default();
                    slot.wins += wl.wins;
                    slot.losses += wl.losses;
                }
                left
            });

        let mut defined: HashMap<String, HashMap<Surface, WinLoss>> = HashMap::new();
        for (key, wl) in counts {
            if wl.total() >= min_matches {
                defined
                    .entry(key.player)
                    .or_default()
                    .insert(key.surface, wl);
            }
        }
        Self {
            defined,
            min_matches,
        }
    }

    pub fn from_rows(rows: Vec<SkillRow>, min_matches: u32) -> Self {
        let mut defined: HashMap<String, HashMap<Surface, WinLoss>> = HashMap::new();
        for row in rows {
            let wl = WinLoss {
                wins: row.wins,
                losses: row.losses,
            };
            if wl.total() >= min_matches {
                defined.entry(row.player).or_default().insert(row.surface, wl);
            }
        }
        Self {
            defined,
            min_matches,
        }
    }

    /// Win rate in `[0, 1]`; 0.5 when the pair has fewer than the minimum
    /// number of matches.
    pub fn skill(&self, player: &str, surface: Surface) -> f64 {
        self.record(player, surface)
            .map(|wl| wl.win_rate())
            .unwrap_or(NEUTRAL_SKILL)
    }

    pub fn record(&self, player: &str, surface: Surface) -> Option<WinLoss> {
        self.defined.get(player)?.get(&surface).copied()
    }

    pub fn min_matches(&self) -> u32 {
        self.min_matches
    }

    pub fn len(&self) -> usize {
        self.defined.values().map(|m| m.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Defined entries sorted by player then surface.
    pub fn rows(&self) -> Vec<SkillRow> {
        let mut out: Vec<SkillRow> = self
            .defined
            .iter()
            .flat_map(|(player, by_surface)| {
                by_surface.iter().map(move |(surface, wl)| SkillRow {
                    player: player.clone(),
                    surface: *surface,
                    wins: wl.wins,
                    losses: wl.losses,
                    win_rate: wl.win_rate(),
                })
            })
            .collect();
        out.sort_by(|a, b| a.player.cmp(&b.player).then(a.surface.cmp(&b.surface)));
        out
    }
}
