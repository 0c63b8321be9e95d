//! One parameterized run: sequence, aggregate skill, fold the engine and the
//! profile book over the ordered log, then assemble training rows.

use std::collections::BTreeMap;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::chronology;
use crate::config::PipelineConfig;
use crate::engine::{HeadToHeadTable, PreMatchSignals, TemporalEngine};
use crate::features::{self, TrainingTable};
use crate::match_record::{MatchRecord, Surface};
use crate::normalize::DateSource;
use crate::profiles::{Enrichment, ProfileBook, ProfileMap, ResolvedBio};
use crate::surface_skill::SurfaceSkill;

/// Columns appended to each match row, in order.
pub const AUGMENTED_COLUMNS: [&str; 10] = [
    "winner_elo",
    "loser_elo",
    "winner_surface_elo",
    "loser_surface_elo",
    "winner_fatigue",
    "loser_fatigue",
    "winner_momentum",
    "loser_momentum",
    "winner_h2h",
    "loser_h2h",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AugmentedMatch {
    pub position: usize,
    pub record: MatchRecord,
    pub pre: PreMatchSignals,
    pub winner_bio: ResolvedBio,
    pub loser_bio: ResolvedBio,
}

impl AugmentedMatch {
    pub fn augmented_values(&self) -> [f64; 10] {
        let w = &self.pre.winner;
        let l = &self.pre.loser;
        [
            w.elo,
            l.elo,
            w.surface_elo,
            l.surface_elo,
            w.fatigue,
            l.fatigue,
            w.momentum,
            l.momentum,
            w.h2h as f64,
            l.h2h as f64,
        ]
    }
}

/// Per-row problems that were absorbed with a default rather than failing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnomalyCounters {
    pub derived_dates: usize,
    pub year_only_dates: usize,
    pub unresolved_dates: usize,
    pub unmapped_rounds: BTreeMap<String, usize>,
    pub unknown_surfaces: usize,
    pub missing_minutes: usize,
    pub missing_bio_fields: usize,
    pub below_skill_floor: usize,
    pub self_matches: usize,
}

impl AnomalyCounters {
    fn observe(&mut self, record: &MatchRecord) {
        match record.date.source {
            DateSource::Observed => {}
            DateSource::Derived { .. } => self.derived_dates += 1,
            DateSource::YearOnly => self.year_only_dates += 1,
            DateSource::Sentinel => self.unresolved_dates += 1,
        }
        if !record.round.is_mapped() {
            let label = record.round.code().to_string();
            let seen = self.unmapped_rounds.entry(label).or_insert(0);
            if *seen == 0 {
                warn!(round = record.round.code(), "unmapped round label");
            }
            *seen += 1;
        }
        if record.surface == Surface::Unknown {
            self.unknown_surfaces += 1;
        }
        if !matches!(record.minutes, Some(m) if m.is_finite() && m > 0.0) {
            self.missing_minutes += 1;
        }
    }

    pub fn unmapped_round_total(&self) -> usize {
        self.unmapped_rounds.values().sum()
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub augmented: Vec<AugmentedMatch>,
    pub profiles: ProfileMap,
    pub skill: SurfaceSkill,
    pub head_to_head: HeadToHeadTable,
    pub training: TrainingTable,
    pub anomalies: AnomalyCounters,
}

#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn run(&self, mut records: Vec<MatchRecord>, enrichment: &Enrichment) -> Result<PipelineOutput> {
        let mut anomalies = AnomalyCounters::default();
        let before = records.len();
        records.retain(|r| !r.is_self_match());
        anomalies.self_matches = before - records.len();
        if records.is_empty() {
            return Err(anyhow!("no match records to process"));
        }

        let ordered = chronology::sequence(records);
        let skill = SurfaceSkill::compute(&ordered, self.config.skill_min_matches);

        let mut engine = TemporalEngine::new(self.config.engine);
        let mut book = ProfileBook::new();
        let mut augmented = Vec::with_capacity(ordered.len());

        for (position, record) in ordered.into_iter().enumerate() {
            anomalies.observe(&record);
            let pre = engine.advance(&record);
            let (winner_bio, loser_bio) = book.observe(position, &record);
            if skill.record(&record.winner, record.surface).is_none() {
                anomalies.below_skill_floor += 1;
            }
            if skill.record(&record.loser, record.surface).is_none() {
                anomalies.below_skill_floor += 1;
            }
            augmented.push(AugmentedMatch {
                position,
                record,
                pre,
                winner_bio,
                loser_bio,
            });
        }
        anomalies.missing_bio_fields = book.skipped_fields();

        let snapshot = engine.into_snapshot();
        let profiles = book.finalize(&snapshot, enrichment);
        let training =
            features::assemble_training_table(&augmented, &skill, self.config.feature_set);

        info!(
            matches = augmented.len(),
            players = profiles.len(),
            skill_entries = skill.len(),
            h2h_pairs = snapshot.head_to_head.len(),
            training_rows = training.len(),
            "pipeline complete"
        );
        if anomalies != AnomalyCounters::default() {
            warn!(
                derived_dates = anomalies.derived_dates,
                year_only_dates = anomalies.year_only_dates,
                unresolved_dates = anomalies.unresolved_dates,
                unmapped_rounds = anomalies.unmapped_round_total(),
                unknown_surfaces = anomalies.unknown_surfaces,
                missing_minutes = anomalies.missing_minutes,
                missing_bio_fields = anomalies.missing_bio_fields,
                below_skill_floor = anomalies.below_skill_floor,
                self_matches = anomalies.self_matches,
                "defaults applied"
            );
        }

        Ok(PipelineOutput {
            augmented,
            profiles,
            skill,
            head_to_head: snapshot.head_to_head,
            training,
            anomalies,
        })
    }
}
