use serde::{Deserialize, Serialize};

pub const INITIAL_RATING: f64 = 1500.0;

/// K used by the per-surface pool.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SurfaceK {
    SameAsGlobal,
    Fixed(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EloConfig {
    pub initial: f64,
    pub k_default: f64,
    pub k_masters: f64,
    pub k_grand_slam: f64,
    pub surface_k: SurfaceK,
}

impl Default for EloConfig {
    fn default() -> Self {
        Self {
            initial: INITIAL_RATING,
            k_default: 32.0,
            k_masters: 40.0,
            k_grand_slam: 50.0,
            surface_k: SurfaceK::SameAsGlobal,
        }
    }
}

impl EloConfig {
    /// K by tournament tier. Accepts either a tier label ("Grand Slam",
    /// "Masters 1000") or the single-letter level code (`G`, `M`).
    pub fn k_for_level(&self, level: &str) -> f64 {
        let lower = level.trim().to_ascii_lowercase();
        if lower == "g" || lower.contains("grand slam") || lower.contains("grand_slam") {
            self.k_grand_slam
        } else if lower == "m" || lower.contains("masters") {
            self.k_masters
        } else {
            self.k_default
        }
    }

    pub fn surface_k_for_level(&self, level: &str) -> f64 {
        match self.surface_k {
            SurfaceK::SameAsGlobal => self.k_for_level(level),
            SurfaceK::Fixed(k) => k,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EloUpdate {
    pub expected_winner: f64,
    pub delta: f64,
    pub winner_after: f64,
    pub loser_after: f64,
}

/// Probability that a player rated `r_a` beats one rated `r_b`.
pub fn expected_score(r_a: f64, r_b: f64) -> f64 {
    1.0 / (1.0 + 10.0_f64.powf(-(r_a - r_b) / 400.0))
}

/// Zero-sum update after `winner` beat `loser`.
pub fn rate_result(winner: f64, loser: f64, k: f64) -> EloUpdate {
    let expected_winner = expected_score(winner, loser);
    let delta = k * (1.0 - expected_winner);
    EloUpdate {
        expected_winner,
        delta,
        winner_after: winner + delta,
        loser_after: loser - delta,
    }
}
