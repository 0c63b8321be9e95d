use atp_features::elo::{EloConfig, SurfaceK};
use atp_features::engine::{EngineConfig, TemporalEngine};
use atp_features::match_record::{MatchRecord, PlayerBio, Surface};
use atp_features::normalize::{RepairedDate, Round};

fn rec(tourney: &str, date: u32, surface: Surface, winner: &str, loser: &str) -> MatchRecord {
    MatchRecord {
        tourney_id: tourney.to_string(),
        tourney_name: tourney.to_string(),
        tourney_level: "A".to_string(),
        surface,
        date: RepairedDate::observed(date),
        round: Round::R32,
        match_num: None,
        winner: winner.to_string(),
        loser: loser.to_string(),
        winner_bio: PlayerBio::default(),
        loser_bio: PlayerBio::default(),
        minutes: Some(90.0),
        score: "6-4 6-4".to_string(),
    }
}

#[test]
fn equal_newcomers_move_to_1516_and_1484() {
    let mut engine = TemporalEngine::default();
    let pre = engine.advance(&rec("t1", 20_240_101, Surface::Hard, "A", "B"));
    assert_eq!(pre.winner.elo, 1500.0);
    assert_eq!(pre.loser.elo, 1500.0);
    assert!((engine.elo("A") - 1516.0).abs() < 1e-9);
    assert!((engine.elo("B") - 1484.0).abs() < 1e-9);
    assert!((engine.surface_elo("A", Surface::Hard) - 1516.0).abs() < 1e-9);
    assert_eq!(engine.surface_elo("A", Surface::Clay), 1500.0);
}

#[test]
fn elo_is_zero_sum_per_pool() {
    let rows = vec![
        rec("t1", 20_240_101, Surface::Hard, "A", "B"),
        rec("t1", 20_240_101, Surface::Hard, "B", "C"),
        rec("t2", 20_240_201, Surface::Clay, "C", "A"),
        rec("t2", 20_240_201, Surface::Clay, "A", "D"),
        rec("t3", 20_240_301, Surface::Grass, "D", "B"),
    ];
    let mut engine = TemporalEngine::default();
    for r in &rows {
        engine.advance(r);
    }
    let players = ["A", "B", "C", "D"];
    let total: f64 = players.iter().map(|p| engine.elo(p)).sum();
    assert!((total - 4.0 * 1500.0).abs() < 1e-9);

    for surface in Surface::PLAYABLE {
        let total: f64 = players.iter().map(|p| engine.surface_elo(p, surface)).sum();
        assert!((total - 4.0 * 1500.0).abs() < 1e-9, "{surface}");
    }
}

#[test]
fn pre_match_signals_ignore_the_match_itself() {
    let mut engine = TemporalEngine::default();
    let first = engine.advance(&rec("t1", 20_240_101, Surface::Hard, "A", "B"));
    assert_eq!(first.winner.momentum, 0.5);
    assert_eq!(first.winner.h2h, 0);
    assert_eq!(first.winner.fatigue, 0.0);

    let rematch = engine.advance(&rec("t1", 20_240_101, Surface::Hard, "A", "B"));
    assert!((rematch.winner.elo - 1516.0).abs() < 1e-9);
    assert_eq!(rematch.winner.momentum, 1.0);
    assert_eq!(rematch.loser.momentum, 0.0);
    assert_eq!(rematch.winner.h2h, 1);
    assert_eq!(rematch.loser.h2h, -1);
    assert_eq!(rematch.winner.fatigue, 90.0);
    assert_eq!(engine.head_to_head("A", "B"), (2, 0));
    assert_eq!(engine.head_to_head("B", "A"), (0, 2));
}

#[test]
fn momentum_is_neutral_after_one_win_and_one_loss() {
    // X beats Y, then Z beats X; before X's third match momentum is 1/2.
    let mut engine = TemporalEngine::default();
    engine.advance(&rec("t1", 20_240_101, Surface::Hard, "X", "Y"));
    engine.advance(&rec("t1", 20_240_101, Surface::Hard, "Z", "X"));
    let third = engine.advance(&rec("t2", 20_240_201, Surface::Hard, "X", "Y"));
    assert_eq!(third.winner.momentum, 0.5);
}

#[test]
fn momentum_only_sees_last_five_results() {
    let mut engine = TemporalEngine::default();
    engine.advance(&rec("t0", 20_240_101, Surface::Hard, "opp", "P"));
    for i in 0..5 {
        engine.advance(&rec(&format!("t{}", i + 1), 20_240_201, Surface::Hard, "P", "opp"));
    }
    assert_eq!(engine.momentum("P"), 1.0);
    assert_eq!(engine.player("P").map(|s| s.recent_results().count()), Some(5));
}

#[test]
fn fatigue_resets_with_a_new_tournament_id() {
    let mut engine = TemporalEngine::default();
    let mut long = rec("rome", 20_240_515, Surface::Clay, "A", "B");
    long.minutes = Some(180.0);
    engine.advance(&long);
    let mut missing = rec("rome", 20_240_515, Surface::Clay, "A", "C");
    missing.minutes = None;
    let pre = engine.advance(&missing);
    assert_eq!(pre.winner.fatigue, 180.0);
    assert_eq!(engine.fatigue("rome", "A"), 280.0);

    let next = engine.advance(&rec("paris", 20_240_528, Surface::Clay, "A", "D"));
    assert_eq!(next.winner.fatigue, 0.0);
    assert_eq!(engine.fatigue("rome", "A"), 280.0);
}

#[test]
fn tier_k_and_fixed_surface_k_apply_independently() {
    let config = EngineConfig {
        elo: EloConfig {
            surface_k: SurfaceK::Fixed(20.0),
            ..EloConfig::default()
        },
        ..EngineConfig::default()
    };
    let mut engine = TemporalEngine::new(config);
    let mut slam = rec("ao", 20_240_115, Surface::Hard, "A", "B");
    slam.tourney_level = "G".to_string();
    let pre = engine.advance(&slam);
    assert_eq!(pre.winner_expected(), 0.5);
    assert!((engine.elo("A") - 1525.0).abs() < 1e-9);
    assert!((engine.surface_elo("A", Surface::Hard) - 1510.0).abs() < 1e-9);
}

#[test]
fn every_match_moves_winner_and_loser_by_opposite_amounts() {
    let mut slam = rec("ao", 20_240_115, Surface::Hard, "C", "A");
    slam.tourney_level = "G".to_string();
    let rows = vec![
        rec("t1", 20_240_101, Surface::Hard, "A", "B"),
        rec("t1", 20_240_101, Surface::Hard, "A", "C"),
        slam,
        rec("t2", 20_240_201, Surface::Clay, "B", "A"),
        rec("t3", 20_240_301, Surface::Grass, "C", "B"),
    ];
    let mut engine = TemporalEngine::default();
    for r in &rows {
        let pre = engine.advance(r);
        let winner_delta = engine.elo(&r.winner) - pre.winner.elo;
        let loser_delta = engine.elo(&r.loser) - pre.loser.elo;
        assert!(winner_delta > 0.0);
        assert!((winner_delta + loser_delta).abs() < 1e-9, "{}", r.tourney_id);

        let winner_surface = engine.surface_elo(&r.winner, r.surface) - pre.winner.surface_elo;
        let loser_surface = engine.surface_elo(&r.loser, r.surface) - pre.loser.surface_elo;
        assert!(winner_surface > 0.0);
        assert!((winner_surface + loser_surface).abs() < 1e-9, "{}", r.tourney_id);
    }
}

#[test]
fn self_match_leaves_state_untouched() {
    let mut engine = TemporalEngine::default();
    engine.advance(&rec("t1", 20_240_101, Surface::Hard, "A", "B"));
    let before = engine.player("A").cloned();

    let pre = engine.advance(&rec("t1", 20_240_101, Surface::Hard, "A", "A"));
    assert!((pre.winner.elo - 1516.0).abs() < 1e-9);
    assert_eq!(engine.player("A").cloned(), before);
    assert!((engine.elo("A") - 1516.0).abs() < 1e-9);
    assert_eq!(engine.momentum("A"), 1.0);
    assert_eq!(engine.fatigue("t1", "A"), 90.0);
    assert_eq!(engine.head_to_head("A", "A"), (0, 0));
}
