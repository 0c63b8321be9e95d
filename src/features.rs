//! Symmetric differential features.
//!
//! Every column is "own minus opponent" (rank is inverted so that a better
//! ranking is positive), which makes swapping the two sides negate the whole
//! vector.

use std::fmt;

use anyhow::{Result, anyhow};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::engine::{HeadToHeadTable, SideSignals};
use crate::match_record::Surface;
use crate::pipeline::AugmentedMatch;
use crate::profiles::{PlayerProfile, ResolvedBio};
use crate::surface_skill::SurfaceSkill;

pub const NEUTRAL_HOST: &str = "NEUTRAL";
pub const DEFAULT_SHUFFLE_SEED: u64 = 42;
pub const DEFAULT_TEST_FRACTION: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureName {
    DiffRank,
    DiffRankPoints,
    DiffAge,
    DiffHt,
    DiffSkill,
    DiffHome,
    DiffFatigue,
    DiffMomentum,
    DiffH2h,
    DiffElo,
    DiffSurfaceElo,
}

impl FeatureName {
    pub fn column(&self) -> &'static str {
        match self {
            FeatureName::DiffRank => "diff_rank",
            FeatureName::DiffRankPoints => "diff_rank_points",
            FeatureName::DiffAge => "diff_age",
            FeatureName::DiffHt => "diff_ht",
            FeatureName::DiffSkill => "diff_skill",
            FeatureName::DiffHome => "diff_home",
            FeatureName::DiffFatigue => "diff_fatigue",
            FeatureName::DiffMomentum => "diff_momentum",
            FeatureName::DiffH2h => "diff_h2h",
            FeatureName::DiffElo => "diff_elo",
            FeatureName::DiffSurfaceElo => "diff_surface_elo",
        }
    }
}

impl fmt::Display for FeatureName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

const STANDARD_COLUMNS: [FeatureName; 9] = [
    FeatureName::DiffRank,
    FeatureName::DiffRankPoints,
    FeatureName::DiffAge,
    FeatureName::DiffHt,
    FeatureName::DiffSkill,
    FeatureName::DiffHome,
    FeatureName::DiffFatigue,
    FeatureName::DiffMomentum,
    FeatureName::DiffH2h,
];

const EXTENDED_TAIL: [FeatureName; 2] = [FeatureName::DiffElo, FeatureName::DiffSurfaceElo];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FeatureSet {
    #[default]
    Standard,
    /// Standard columns plus the Elo differentials.
    Extended,
}

impl FeatureSet {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "standard" | "default" | "base" => Some(FeatureSet::Standard),
            "extended" | "elo" | "full" => Some(FeatureSet::Extended),
            _ => None,
        }
    }

    pub fn columns(&self) -> Vec<FeatureName> {
        let mut out = STANDARD_COLUMNS.to_vec();
        if *self == FeatureSet::Extended {
            out.extend(EXTENDED_TAIL);
        }
        out
    }

    pub fn schema(&self) -> FeatureSchema {
        FeatureSchema::new(self.columns().iter().map(|c| c.column().to_string()).collect())
    }
}

/// Ordered column names plus a fingerprint that changes whenever the names
/// or their order change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub names: Vec<String>,
    pub fingerprint: String,
}

impl FeatureSchema {
    pub fn new(names: Vec<String>) -> Self {
        let fingerprint = fingerprint_names(&names);
        Self { names, fingerprint }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Fails when `fingerprint` was produced for a different column layout.
    pub fn verify(&self, fingerprint: &str) -> Result<()> {
        if self.fingerprint != fingerprint {
            return Err(anyhow!(
                "feature schema mismatch: expected {} got {}",
                self.fingerprint,
                fingerprint
            ));
        }
        Ok(())
    }
}

fn fingerprint_names(names: &[String]) -> String {
    let mut hasher = Sha256::new();
    for name in names {
        hasher.update(name.as_bytes());
        hasher.update(b"\n");
    }
    BASE64.encode(hasher.finalize())
}

/// Country code of the tournament's host, or `NEUTRAL`.
pub fn host_country(tourney_name: &str) -> &'static str {
    const HOSTS: &[(&str, &[&str])] = &[
        ("ESP", &["MADRID", "BARCELONA", "VALENCIA", "SEVILLE", "MALLORCA"]),
        (
            "FRA",
            &["PARIS", "ROLAND GARROS", "MONTPELLIER", "MARSEILLE", "LYON", "METZ"],
        ),
        (
            "USA",
            &[
                "US OPEN",
                "INDIAN WELLS",
                "MIAMI",
                "CINCINNATI",
                "WASHINGTON",
                "HOUSTON",
                "DALLAS",
                "DELRAY",
            ],
        ),
        (
            "GBR",
            &["WIMBLEDON", "LONDON", "QUEENS", "EASTBOURNE", "MANCHESTER"],
        ),
        (
            "AUS",
            &[
                "AUSTRALIAN OPEN",
                "MELBOURNE",
                "BRISBANE",
                "SYDNEY",
                "ADELAIDE",
                "PERTH",
            ],
        ),
        ("ITA", &["ROME", "ROMA", "TURIN", "MILAN", "FLORENCE"]),
        ("ARG", &["BUENOS AIRES", "CORDOBA"]),
        ("GER", &["HAMBURG", "HALLE", "MUNICH", "STUTTGART", "BERLIN"]),
        ("BRA", &["RIO", "SAO PAULO"]),
        ("MEX", &["ACAPULCO", "LOS CABOS"]),
        ("CAN", &["TORONTO", "MONTREAL", "VANCOUVER"]),
        ("CHN", &["SHANGHAI", "BEIJING", "CHENGDU", "ZHUHAI"]),
    ];

    // whole words only: "RIO" must not hit "ROSARIO"
    let words: Vec<String> = tourney_name
        .to_uppercase()
        .replace('\'', "")
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect();
    let has_phrase = |key: &str| {
        let parts: Vec<&str> = key.split(' ').collect();
        words
            .windows(parts.len())
            .any(|window| window.iter().zip(&parts).all(|(w, p)| w == p))
    };
    HOSTS
        .iter()
        .find(|(_, keys)| keys.iter().any(|k| has_phrase(*k)))
        .map(|(code, _)| *code)
        .unwrap_or(NEUTRAL_HOST)
}

/// Everything the assembler needs about one side of a matchup.
#[derive(Debug, Clone, PartialEq)]
pub struct SideContext {
    pub rank: f64,
    pub rank_points: f64,
    pub age: f64,
    pub height: f64,
    pub country: String,
    pub skill: f64,
    pub fatigue: f64,
    pub momentum: f64,
    pub h2h: f64,
    pub elo: f64,
    pub surface_elo: f64,
}

impl SideContext {
    pub fn from_signals(bio: &ResolvedBio, signals: &SideSignals, skill: f64) -> Self {
        Self {
            rank: bio.rank as f64,
            rank_points: bio.rank_points,
            age: bio.age,
            height: bio.height,
            country: bio.country.clone(),
            skill,
            fatigue: signals.fatigue,
            momentum: signals.momentum,
            h2h: signals.h2h as f64,
            elo: signals.elo,
            surface_elo: signals.surface_elo,
        }
    }

    fn is_home(&self, host: &str) -> f64 {
        if host != NEUTRAL_HOST && self.country == host {
            1.0
        } else {
            0.0
        }
    }
}

/// Feature vector from `own`'s perspective, columns in `set` order.
pub fn differential(own: &SideContext, opp: &SideContext, host: &str, set: FeatureSet) -> Vec<f64> {
    set.columns()
        .iter()
        .map(|name| match name {
            FeatureName::DiffRank => opp.rank - own.rank,
            FeatureName::DiffRankPoints => own.rank_points - opp.rank_points,
            FeatureName::DiffAge => own.age - opp.age,
            FeatureName::DiffHt => own.height - opp.height,
            FeatureName::DiffSkill => own.skill - opp.skill,
            FeatureName::DiffHome => own.is_home(host) - opp.is_home(host),
            FeatureName::DiffFatigue => own.fatigue - opp.fatigue,
            FeatureName::DiffMomentum => own.momentum - opp.momentum,
            FeatureName::DiffH2h => own.h2h - opp.h2h,
            FeatureName::DiffElo => own.elo - opp.elo,
            FeatureName::DiffSurfaceElo => own.surface_elo - opp.surface_elo,
        })
        .collect()
}

fn negate(values: &[f64]) -> Vec<f64> {
    // keep +0.0 so mirrored rows print cleanly
    values
        .iter()
        .map(|v| if *v == 0.0 { 0.0 } else { -v })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRow {
    pub features: Vec<f64>,
    pub target: u8,
}

/// The two labelled rows of one match: winner view (1), then mirrored (0).
pub fn mirrored_rows(winner_view: Vec<f64>) -> [TrainingRow; 2] {
    let loser_view = negate(&winner_view);
    [
        TrainingRow {
            features: winner_view,
            target: 1,
        },
        TrainingRow {
            features: loser_view,
            target: 0,
        },
    ]
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingTable {
    pub schema: FeatureSchema,
    pub rows: Vec<TrainingRow>,
}

impl TrainingTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let idx = self.schema.index_of(name)?;
        Some(self.rows.iter().map(|r| r.features[idx]).collect())
    }

    /// Deterministic shuffle; the same seed always yields the same order.
    pub fn shuffled(mut self, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        self.rows.shuffle(&mut rng);
        self
    }

    /// Splits off the trailing `test_fraction` of rows as a test table.
    pub fn split(self, test_fraction: f64) -> (TrainingTable, TrainingTable) {
        let fraction = test_fraction.clamp(0.0, 1.0);
        let test_len = (self.rows.len() as f64 * fraction).round() as usize;
        let train_len = self.rows.len() - test_len.min(self.rows.len());
        let mut train_rows = self.rows;
        let test_rows = train_rows.split_off(train_len);
        (
            TrainingTable {
                schema: self.schema.clone(),
                rows: train_rows,
            },
            TrainingTable {
                schema: self.schema,
                rows: test_rows,
            },
        )
    }
}

fn side_contexts(m: &AugmentedMatch, skill: &SurfaceSkill) -> (SideContext, SideContext) {
    let surface = m.record.surface;
    let winner = SideContext::from_signals(
        &m.winner_bio,
        &m.pre.winner,
        skill.skill(&m.record.winner, surface),
    );
    let loser = SideContext::from_signals(
        &m.loser_bio,
        &m.pre.loser,
        skill.skill(&m.record.loser, surface),
    );
    (winner, loser)
}

/// Winner-perspective vector of one augmented match.
pub fn match_vector(m: &AugmentedMatch, skill: &SurfaceSkill, set: FeatureSet) -> Vec<f64> {
    let (winner, loser) = side_contexts(m, skill);
    differential(&winner, &loser, host_country(&m.record.tourney_name), set)
}

/// Two rows per match, in match order.
pub fn assemble_training_table(
    matches: &[AugmentedMatch],
    skill: &SurfaceSkill,
    set: FeatureSet,
) -> TrainingTable {
    let rows: Vec<TrainingRow> = matches
        .par_iter()
        .flat_map_iter(|m| mirrored_rows(match_vector(m, skill, set)))
        .collect();
    TrainingTable {
        schema: set.schema(),
        rows,
    }
}

/// Request-time context for a live matchup.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchupContext {
    pub surface: Surface,
    pub tourney_name: String,
    pub fatigue_a: f64,
    pub fatigue_b: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub fingerprint: String,
    pub values: Vec<f64>,
}

/// Vector from `a`'s perspective against `b`, built from profiles and the
/// final lookups rather than the running engine.
pub fn matchup_vector(
    a: &PlayerProfile,
    b: &PlayerProfile,
    ctx: &MatchupContext,
    skill: &SurfaceSkill,
    h2h: &HeadToHeadTable,
    set: FeatureSet,
    initial_rating: f64,
) -> FeatureVector {
    let (wins_a, wins_b) = h2h.wins(&a.name, &b.name);
    let diff = wins_a as f64 - wins_b as f64;
    let side = |p: &PlayerProfile, fatigue: f64, h2h: f64| {
        let bio = p.bio();
        SideContext {
            rank: bio.rank as f64,
            rank_points: bio.rank_points,
            age: bio.age,
            height: bio.height,
            country: bio.country,
            skill: skill.skill(&p.name, ctx.surface),
            fatigue,
            momentum: p.momentum,
            h2h,
            elo: p.elo,
            surface_elo: p.surface_elo_or(ctx.surface, initial_rating),
        }
    };
    let own = side(a, ctx.fatigue_a, diff);
    let opp = side(b, ctx.fatigue_b, -diff);
    FeatureVector {
        fingerprint: set.schema().fingerprint,
        values: differential(&own, &opp, host_country(&ctx.tourney_name), set),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn side(rank: f64, country: &str, h2h: f64) -> SideContext {
        SideContext {
            rank,
            rank_points: 1000.0 / rank,
            age: 24.0,
            height: 188.0,
            country: country.to_string(),
            skill: 0.6,
            fatigue: 120.0,
            momentum: 0.8,
            h2h,
            elo: 1600.0,
            surface_elo: 1580.0,
        }
    }

    #[test]
    fn host_lookup_matches_keywords() {
        assert_eq!(host_country("Mutua Madrid Open"), "ESP");
        assert_eq!(host_country("Roland Garros"), "FRA");
        assert_eq!(host_country("Miami Masters"), "USA");
        assert_eq!(host_country("Doha"), NEUTRAL_HOST);
    }

    #[test]
    fn host_keywords_match_whole_words_only() {
        assert_eq!(host_country("Rio Open"), "BRA");
        assert_eq!(host_country("Rosario Challenger"), NEUTRAL_HOST);
        assert_eq!(host_country("Queen's Club Championships"), "GBR");
        assert_eq!(host_country("Internazionali BNL d'Italia, Roma"), "ITA");
        assert_eq!(host_country("Indian Wells Masters"), "USA");
        assert_eq!(host_country("Perthshire Open"), NEUTRAL_HOST);
    }

    #[test]
    fn rank_difference_favours_better_ranked_side() {
        let own = side(3.0, "ESP", 1.0);
        let opp = side(40.0, "ITA", -1.0);
        let v = differential(&own, &opp, "ESP", FeatureSet::Standard);
        assert_eq!(v[0], 37.0);
        // home
        assert_eq!(v[5], 1.0);
        // h2h is own minus opponent differential
        assert_eq!(v[8], 2.0);
    }

    #[test]
    fn neutral_host_gives_no_home_edge() {
        let own = side(3.0, "NEUTRAL", 0.0);
        let opp = side(4.0, "ITA", 0.0);
        let v = differential(&own, &opp, NEUTRAL_HOST, FeatureSet::Standard);
        assert_eq!(v[5], 0.0);
    }

    #[test]
    fn extended_set_appends_elo_columns() {
        let names: Vec<&str> = FeatureSet::Extended
            .columns()
            .iter()
            .map(|c| c.column())
            .collect();
        assert_eq!(names.len(), 11);
        assert_eq!(names[9], "diff_elo");
        assert_eq!(names[10], "diff_surface_elo");
        assert_ne!(
            FeatureSet::Standard.schema().fingerprint,
            FeatureSet::Extended.schema().fingerprint
        );
    }

    #[test]
    fn schema_verify_rejects_other_layouts() {
        let standard = FeatureSet::Standard.schema();
        assert!(standard.verify(&standard.fingerprint).is_ok());
        assert!(standard
            .verify(&FeatureSet::Extended.schema().fingerprint)
            .is_err());
    }

    #[test]
    fn split_keeps_every_row() {
        let schema = FeatureSet::Standard.schema();
        let rows = (0..10)
            .map(|i| TrainingRow {
                features: vec![i as f64; 9],
                target: (i % 2) as u8,
            })
            .collect();
        let table = TrainingTable { schema, rows }.shuffled(DEFAULT_SHUFFLE_SEED);
        let (train, test) = table.split(DEFAULT_TEST_FRACTION);
        assert_eq!(train.len(), 8);
        assert_eq!(test.len(), 2);
    }
}
