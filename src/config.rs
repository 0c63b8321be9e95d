use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::elo::{EloConfig, SurfaceK};
use crate::engine::{DEFAULT_FALLBACK_MINUTES, EngineConfig, MOMENTUM_WINDOW};
use crate::features::{DEFAULT_SHUFFLE_SEED, DEFAULT_TEST_FRACTION, FeatureSet};
use crate::normalize::DEFAULT_PLACEHOLDER_DATES;
use crate::surface_skill::DEFAULT_MIN_MATCHES;

pub const DEFAULT_AGE_OFFSET: f64 = 1.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub engine: EngineConfig,
    pub skill_min_matches: u32,
    pub feature_set: FeatureSet,
    pub placeholder_dates: Vec<u32>,
    pub shuffle_seed: u64,
    pub test_fraction: f64,
    pub backfill_age_offset: f64,
    pub out_dir: Option<PathBuf>,
    pub hist_db_path: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            skill_min_matches: DEFAULT_MIN_MATCHES,
            feature_set: FeatureSet::Standard,
            placeholder_dates: DEFAULT_PLACEHOLDER_DATES.to_vec(),
            shuffle_seed: DEFAULT_SHUFFLE_SEED,
            test_fraction: DEFAULT_TEST_FRACTION,
            backfill_age_offset: DEFAULT_AGE_OFFSET,
            out_dir: None,
            hist_db_path: None,
        }
    }
}

impl PipelineConfig {
    /// Defaults overridden by `ATP_*` environment variables. Values that do
    /// not parse are ignored; numeric ones are clamped to sane ranges.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let base_elo = defaults.engine.elo;

        let surface_k = match opt_env("ATP_SURFACE_K") {
            Some(raw) if raw.trim().eq_ignore_ascii_case("global") => SurfaceK::SameAsGlobal,
            Some(raw) => raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|k| k.is_finite())
                .map(|k| SurfaceK::Fixed(k.clamp(1.0, 200.0)))
                .unwrap_or(base_elo.surface_k),
            None => base_elo.surface_k,
        };

        let elo = EloConfig {
            initial: env_f64("ATP_ELO_INITIAL", base_elo.initial).clamp(100.0, 4000.0),
            k_default: env_f64("ATP_K_DEFAULT", base_elo.k_default).clamp(1.0, 200.0),
            k_masters: env_f64("ATP_K_MASTERS", base_elo.k_masters).clamp(1.0, 200.0),
            k_grand_slam: env_f64("ATP_K_GRAND_SLAM", base_elo.k_grand_slam).clamp(1.0, 200.0),
            surface_k,
        };

        let engine = EngineConfig {
            elo,
            fallback_minutes: env_f64("ATP_FALLBACK_MINUTES", DEFAULT_FALLBACK_MINUTES)
                .clamp(1.0, 600.0),
            momentum_window: env::var("ATP_MOMENTUM_WINDOW")
                .ok()
                .and_then(|val| val.trim().parse::<usize>().ok())
                .unwrap_or(MOMENTUM_WINDOW)
                .clamp(1, 50),
        };

        Self {
            engine,
            skill_min_matches: env::var("ATP_SKILL_MIN_MATCHES")
                .ok()
                .and_then(|val| val.trim().parse::<u32>().ok())
                .unwrap_or(DEFAULT_MIN_MATCHES)
                .max(1),
            feature_set: opt_env("ATP_FEATURE_SET")
                .and_then(|val| FeatureSet::parse(&val))
                .unwrap_or(defaults.feature_set),
            placeholder_dates: defaults.placeholder_dates,
            shuffle_seed: env::var("ATP_SHUFFLE_SEED")
                .ok()
                .and_then(|val| val.trim().parse::<u64>().ok())
                .unwrap_or(DEFAULT_SHUFFLE_SEED),
            test_fraction: env_f64("ATP_TEST_FRACTION", DEFAULT_TEST_FRACTION).clamp(0.0, 0.9),
            backfill_age_offset: env_f64("ATP_BACKFILL_AGE_OFFSET", DEFAULT_AGE_OFFSET)
                .clamp(0.0, 10.0),
            out_dir: opt_env("ATP_OUT_DIR").map(PathBuf::from),
            hist_db_path: opt_env("ATP_HIST_DB_PATH").map(PathBuf::from),
        }
    }
}

fn opt_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .and_then(|val| if val.trim().is_empty() { None } else { Some(val) })
}

fn env_f64(key: &str, default: f64) -> f64 {
    opt_env(key)
        .and_then(|val| val.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_documented_constants() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.engine.elo.initial, 1500.0);
        assert_eq!(cfg.engine.elo.k_default, 32.0);
        assert_eq!(cfg.engine.fallback_minutes, 100.0);
        assert_eq!(cfg.engine.momentum_window, 5);
        assert_eq!(cfg.skill_min_matches, 5);
        assert_eq!(cfg.shuffle_seed, 42);
        assert_eq!(cfg.feature_set, FeatureSet::Standard);
    }
}
