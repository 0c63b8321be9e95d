use std::path::PathBuf;

use atp_features::config::PipelineConfig;
use atp_features::engine::TemporalEngine;
use atp_features::features::FeatureSet;
use atp_features::loader;
use atp_features::match_record::Surface;
use atp_features::pipeline::{Pipeline, PipelineOutput};
use atp_features::profiles::{Enrichment, Provenance};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn enrichment() -> Enrichment {
    let ranking_path = fixture("ranking.csv");
    Enrichment {
        ranking: loader::load_ranking(&ranking_path).expect("ranking fixture"),
        advanced: loader::load_advanced_stats(&fixture("stats.csv")).expect("stats fixture"),
        ranking_source: "ranking.csv".to_string(),
    }
}

fn run(config: PipelineConfig) -> PipelineOutput {
    let (records, report) = loader::load_matches(&fixture("matches_small.csv"), &config.placeholder_dates)
        .expect("match fixture");
    assert_eq!(report.rows_read, 8);
    assert_eq!(report.rows_kept, 7);
    assert_eq!(report.rows_skipped, 1);
    Pipeline::new(config)
        .run(records, &enrichment())
        .expect("pipeline run")
}

#[test]
fn matches_are_processed_in_chronological_order() {
    let out = run(PipelineConfig::default());
    let order: Vec<(&str, &str)> = out
        .augmented
        .iter()
        .map(|m| (m.record.tourney_id.as_str(), m.record.round.code()))
        .collect();
    assert_eq!(
        order,
        vec![
            ("2024-0416", "QF"),
            ("2024-0416", "QF"),
            ("2024-0416", "SF"),
            ("2024-0416", "F"),
            ("2024-0540", "R32"),
            ("2024-0540", "R32"),
            ("2026-miami-5", "F"),
        ]
    );
    let positions: Vec<usize> = out.augmented.iter().map(|m| m.position).collect();
    assert_eq!(positions, (0..7).collect::<Vec<_>>());
    assert_eq!(out.augmented[6].record.date.yyyymmdd, 20_260_325);
    assert_eq!(out.anomalies.derived_dates, 1);
}

#[test]
fn augmented_rows_carry_pre_match_state() {
    let out = run(PipelineConfig::default());
    let first = &out.augmented[0];
    assert_eq!(first.augmented_values(), [1500.0, 1500.0, 1500.0, 1500.0, 0.0, 0.0, 0.5, 0.5, 0.0, 0.0]);

    // Alcaraz vs Medvedev semi: both won one Masters match at K=40.
    let semi = &out.augmented[2];
    assert!((semi.pre.winner.elo - 1520.0).abs() < 1e-9);
    assert!((semi.pre.loser.elo - 1520.0).abs() < 1e-9);
    assert_eq!(semi.pre.winner.fatigue, 95.0);
    // quarterfinal had no duration
    assert_eq!(semi.pre.loser.fatigue, 100.0);

    let final_ = &out.augmented[3];
    assert_eq!(final_.pre.winner.fatigue, 175.0);
    assert_eq!(final_.pre.winner.momentum, 1.0);

    let wimbledon = &out.augmented[4];
    assert_eq!(wimbledon.pre.winner.fatigue, 0.0);
    assert_eq!(wimbledon.pre.loser.fatigue, 0.0);

    let miami = &out.augmented[6];
    assert_eq!(miami.record.winner, "Jannik Sinner");
    assert_eq!(miami.pre.winner.h2h, -1);
    assert_eq!(miami.pre.loser.h2h, 1);
    assert_eq!(miami.pre.winner.momentum, 0.5);
    assert_eq!(miami.pre.loser.momentum, 1.0);
    // first hard-court match for both
    assert_eq!(miami.pre.winner.surface_elo, 1500.0);
    assert_eq!(miami.pre.loser.surface_elo, 1500.0);
}

#[test]
fn bio_is_carried_forward_over_bad_cells() {
    let out = run(PipelineConfig::default());
    let final_ = &out.augmented[3];
    assert_eq!(final_.winner_bio.height, 183.0);
    assert_eq!(final_.winner_bio.country, "ESP");

    let alcaraz = out.profiles.get("Carlos Alcaraz").expect("profile");
    assert_eq!(alcaraz.height.value, 183.0);
    assert_eq!(alcaraz.age.value, 22.9);
    assert_eq!(alcaraz.matches_played, 5);
}

#[test]
fn profiles_join_ranking_and_stats() {
    let out = run(PipelineConfig::default());
    let sinner = out.profiles.get("Jannik Sinner").expect("profile");
    assert_eq!(sinner.rank.value, 1);
    assert_eq!(sinner.rank_points.value, 11830.0);
    assert_eq!(
        sinner.rank.provenance,
        Provenance::External {
            source: "ranking.csv".to_string()
        }
    );
    assert_eq!(sinner.matches_played, 3);
    assert_eq!(sinner.serve_win, 70.5);
    assert!((sinner.aces - 7.0).abs() < 1e-9);
    assert!((sinner.df - 2.0).abs() < 1e-9);
    assert_eq!(sinner.last_5.len(), 3);
    assert_eq!(sinner.last_5.last().map(|r| r.opponent.as_str()), Some("Carlos Alcaraz"));

    // the duplicate ranking row did not overwrite the first one
    let alcaraz = out.profiles.get("Carlos Alcaraz").expect("profile");
    assert_eq!(alcaraz.rank.value, 2);

    let ruud = out.profiles.get("Casper Ruud").expect("profile");
    assert_eq!(ruud.rank.value, 8);
    assert_eq!(ruud.serve_win, 65.0);
    assert_eq!(ruud.momentum, 0.0);
}

#[test]
fn unknown_player_gets_default_profile() {
    let out = run(PipelineConfig::default());
    let p = out.profiles.lookup("Nobody Known");
    assert_eq!(p.rank.value, 500);
    assert_eq!(p.age.value, 25.0);
    assert_eq!(p.height.value, 185.0);
    assert_eq!(p.country.value, "UNK");
    assert_eq!(p.rank_points.value, 0.0);
    assert_eq!(p.momentum, 0.5);
    assert!(p.last_5.is_empty());
}

#[test]
fn training_rows_are_mirrored_pairs() {
    let out = run(PipelineConfig::default());
    assert_eq!(out.training.len(), 14);
    assert_eq!(out.training.schema.names.len(), 9);
    for pair in out.training.rows.chunks(2) {
        assert_eq!(pair[0].target, 1);
        assert_eq!(pair[1].target, 0);
        for (a, b) in pair[0].features.iter().zip(&pair[1].features) {
            assert_eq!(*a, -*b);
        }
    }

    // Miami final: Sinner rank 1 vs Alcaraz rank 2, both ITA/ESP in the USA.
    let miami = &out.training.rows[12].features;
    assert_eq!(miami[0], 1.0);
    assert_eq!(miami[5], 0.0);
    assert_eq!(miami[8], -2.0);
}

#[test]
fn home_feature_uses_host_country() {
    let out = run(PipelineConfig::default());
    // Madrid QF: Alcaraz (ESP) beat Sinner (ITA).
    let idx = out.training.schema.index_of("diff_home").expect("column");
    assert_eq!(out.training.rows[0].features[idx], 1.0);
    assert_eq!(out.training.rows[1].features[idx], -1.0);
}

#[test]
fn extended_set_adds_elo_columns() {
    let config = PipelineConfig {
        feature_set: FeatureSet::Extended,
        ..PipelineConfig::default()
    };
    let out = run(config);
    assert_eq!(out.training.schema.names.len(), 11);
    let elo = out.training.column("diff_elo").expect("column");
    assert_eq!(elo[0], 0.0);
    assert!(elo[6] > 0.0);
}

#[test]
fn lower_skill_floor_exposes_clay_record() {
    let config = PipelineConfig {
        skill_min_matches: 3,
        ..PipelineConfig::default()
    };
    let out = run(config);
    assert_eq!(out.skill.skill("Carlos Alcaraz", Surface::Clay), 1.0);
    assert_eq!(out.skill.skill("Jannik Sinner", Surface::Clay), 0.5);

    let default_out = run(PipelineConfig::default());
    assert_eq!(default_out.skill.skill("Carlos Alcaraz", Surface::Clay), 0.5);
    assert!(default_out.skill.is_empty());
}

#[test]
fn empty_input_is_an_error() {
    let result = Pipeline::default().run(Vec::new(), &Enrichment::default());
    assert!(result.is_err());
}

#[test]
fn emitted_signals_match_a_replay_of_earlier_rows() {
    let out = run(PipelineConfig::default());
    for (i, row) in out.augmented.iter().enumerate() {
        let mut replay = TemporalEngine::default();
        for earlier in &out.augmented[..i] {
            replay.advance(&earlier.record);
        }
        assert_eq!(replay.pre_match(&row.record), row.pre, "row {i}");
    }
}

#[test]
fn self_match_rows_are_dropped_and_counted() {
    let (mut records, _) = loader::load_matches(
        &fixture("matches_small.csv"),
        &PipelineConfig::default().placeholder_dates,
    )
    .expect("match fixture");
    let mut bogus = records[0].clone();
    bogus.loser = bogus.winner.clone();
    records.insert(0, bogus);

    let out = Pipeline::default()
        .run(records, &Enrichment::default())
        .expect("pipeline run");
    assert_eq!(out.anomalies.self_matches, 1);
    assert_eq!(out.augmented.len(), 7);
    assert_eq!(out.augmented[0].augmented_values()[0], 1500.0);
}
