use std::fmt;

use serde::{Deserialize, Serialize};

use crate::normalize::{RepairedDate, Round};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Surface {
    Hard,
    Clay,
    Grass,
    Carpet,
    Unknown,
}

impl Surface {
    pub const PLAYABLE: [Surface; 4] = [Surface::Hard, Surface::Clay, Surface::Grass, Surface::Carpet];

    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "hard" | "h" | "indoor hard" | "outdoor hard" => Surface::Hard,
            "clay" | "c" | "red clay" => Surface::Clay,
            "grass" | "g" => Surface::Grass,
            "carpet" | "p" => Surface::Carpet,
            _ => Surface::Unknown,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Surface::Hard => "Hard",
            Surface::Clay => "Clay",
            Surface::Grass => "Grass",
            Surface::Carpet => "Carpet",
            Surface::Unknown => "Unknown",
        }
    }

    /// Best-effort surface for scraped rows that arrive without one.
    pub fn infer_from_tournament(name: &str) -> Self {
        const KNOWN: &[(&str, Surface)] = &[
            ("australian open", Surface::Hard),
            ("roland garros", Surface::Clay),
            ("wimbledon", Surface::Grass),
            ("us open", Surface::Hard),
            ("indian wells", Surface::Hard),
            ("miami", Surface::Hard),
            ("monte carlo", Surface::Clay),
            ("madrid", Surface::Clay),
            ("rome", Surface::Clay),
            ("cincinnati", Surface::Hard),
            ("canada", Surface::Hard),
            ("shanghai", Surface::Hard),
            ("paris", Surface::Hard),
            ("rotterdam", Surface::Hard),
        ];

        let lower = name.trim().to_ascii_lowercase();
        if lower.contains("clay") {
            return Surface::Clay;
        }
        if lower.contains("grass") {
            return Surface::Grass;
        }
        KNOWN
            .iter()
            .find(|(key, _)| lower == *key)
            .map(|(_, surface)| *surface)
            .unwrap_or(Surface::Hard)
    }
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Bio attributes as they appear on one source row. Zero and blank cells are
/// already folded into `None` by the loader.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerBio {
    pub age: Option<f64>,
    pub height: Option<f64>,
    pub country: Option<String>,
    pub rank: Option<u32>,
    pub rank_points: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub tourney_id: String,
    pub tourney_name: String,
    pub tourney_level: String,
    pub surface: Surface,
    pub date: RepairedDate,
    pub round: Round,
    pub match_num: Option<u32>,
    pub winner: String,
    pub loser: String,
    pub winner_bio: PlayerBio,
    pub loser_bio: PlayerBio,
    pub minutes: Option<f64>,
    pub score: String,
}

impl MatchRecord {
    pub fn is_self_match(&self) -> bool {
        self.winner == self.loser
    }

    /// Minutes to charge against both players; blank, zero and negative
    /// durations fall back to `fallback`.
    pub fn effective_minutes(&self, fallback: f64) -> f64 {
        match self.minutes {
            Some(m) if m.is_finite() && m > 0.0 => m,
            _ => fallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surface_parse_is_case_insensitive() {
        assert_eq!(Surface::parse(" clay "), Surface::Clay);
        assert_eq!(Surface::parse("HARD"), Surface::Hard);
        assert_eq!(Surface::parse(""), Surface::Unknown);
    }

    #[test]
    fn surface_inference_prefers_name_hints() {
        assert_eq!(Surface::infer_from_tournament("Wimbledon"), Surface::Grass);
        assert_eq!(Surface::infer_from_tournament("Some Clay Court Open"), Surface::Clay);
        assert_eq!(Surface::infer_from_tournament("Dallas"), Surface::Hard);
    }
}
