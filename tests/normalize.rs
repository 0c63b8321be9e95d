use atp_features::chronology;
use atp_features::match_record::{MatchRecord, PlayerBio, Surface};
use atp_features::normalize::{
    DEFAULT_PLACEHOLDER_DATES, DateSource, RepairedDate, Round, UNRESOLVED_DATE, normalize_round,
    repair_date,
};

#[test]
fn long_round_labels_map_to_codes() {
    assert_eq!(normalize_round("Round of 128"), Round::R128);
    assert_eq!(normalize_round("  quarterfinals "), Round::QF);
    assert_eq!(normalize_round("Semifinal"), Round::SF);
    assert_eq!(normalize_round("The Final"), Round::F);
    assert_eq!(normalize_round("FINALS"), Round::F);
    assert_eq!(normalize_round("2nd Round Qualifying"), Round::Q2);
    assert_eq!(normalize_round("Qualifying Round"), Round::Q1);
    assert_eq!(normalize_round("Round Robin"), Round::RR);
    assert_eq!(normalize_round("R16"), Round::R16);
}

#[test]
fn unknown_round_passes_through_trimmed() {
    let round = normalize_round("  Bronze Medal Match ");
    assert_eq!(round, Round::Other("Bronze Medal Match".to_string()));
    assert!(!round.is_mapped());
    assert_eq!(round.importance(), 0);
}

#[test]
fn importance_is_monotonic_through_the_draw() {
    let order = [
        Round::Q1,
        Round::Q2,
        Round::Q3,
        Round::RR,
        Round::R128,
        Round::R64,
        Round::R32,
        Round::R16,
        Round::QF,
        Round::SF,
        Round::F,
        Round::W,
    ];
    for pair in order.windows(2) {
        assert!(pair[0].importance() < pair[1].importance(), "{pair:?}");
    }
}

#[test]
fn miami_id_without_date_resolves_to_march_25() {
    let date = repair_date(None, "2026-miami-5", &DEFAULT_PLACEHOLDER_DATES);
    assert_eq!(date.yyyymmdd, 20_260_325);
    assert_eq!(
        date.source,
        DateSource::Derived {
            keyword: "miami".to_string()
        }
    );
}

#[test]
fn placeholder_dates_are_replaced() {
    let date = repair_date(Some(20_260_101), "2026-wimbledon", &DEFAULT_PLACEHOLDER_DATES);
    assert_eq!(date.yyyymmdd, 20_260_701);
    assert!(date.is_repaired());
}

#[test]
fn valid_dates_are_kept() {
    let date = repair_date(Some(20_240_422), "2024-0416", &DEFAULT_PLACEHOLDER_DATES);
    assert_eq!(date, RepairedDate::observed(20_240_422));
}

#[test]
fn impossible_or_ancient_dates_fall_back_to_the_id() {
    let date = repair_date(Some(20_240_231), "2024-australian-open", &[]);
    assert_eq!(date.yyyymmdd, 20_240_115);
    let date = repair_date(Some(1_999), "2023-sofia", &[]);
    assert_eq!(date.yyyymmdd, 20_230_101);
    assert_eq!(date.source, DateSource::YearOnly);
}

#[test]
fn id_without_year_gets_the_sentinel() {
    let date = repair_date(None, "davis-cup-miami", &[]);
    assert_eq!(date.yyyymmdd, UNRESOLVED_DATE);
    assert_eq!(date.source, DateSource::Sentinel);
}

#[test]
fn implausible_id_years_get_the_sentinel() {
    for id in ["0000-miami", "0999-sofia", "1899-paris"] {
        let date = repair_date(None, id, &[]);
        assert_eq!(date.yyyymmdd, UNRESOLVED_DATE, "{id}");
        assert_eq!(date.source, DateSource::Sentinel, "{id}");
    }
    let date = repair_date(None, "1900-paris", &[]);
    assert_eq!(date.yyyymmdd, 19_001_030);
}

fn rec(id: &str, date: RepairedDate, round: Round, winner: &str) -> MatchRecord {
    MatchRecord {
        tourney_id: id.to_string(),
        tourney_name: id.to_string(),
        tourney_level: "A".to_string(),
        surface: Surface::Hard,
        date,
        round,
        match_num: None,
        winner: winner.to_string(),
        loser: "L".to_string(),
        winner_bio: PlayerBio::default(),
        loser_bio: PlayerBio::default(),
        minutes: None,
        score: String::new(),
    }
}

#[test]
fn sentinel_dated_matches_sort_first() {
    let rows = vec![
        rec("2024-x", RepairedDate::observed(20_240_301), Round::R32, "dated"),
        rec(
            "cup",
            repair_date(None, "cup", &[]),
            Round::F,
            "undated",
        ),
    ];
    let ordered = chronology::sequence(rows);
    assert_eq!(ordered[0].winner, "undated");
}

#[test]
fn tournaments_on_the_same_day_are_grouped_by_id() {
    let day = RepairedDate::observed(20_240_301);
    let rows = vec![
        rec("b", day.clone(), Round::R32, "b1"),
        rec("a", day.clone(), Round::F, "a-final"),
        rec("b", day.clone(), Round::R64, "b0"),
        rec("a", day, Round::SF, "a-semi"),
    ];
    let names: Vec<String> = chronology::sequence(rows)
        .into_iter()
        .map(|r| r.winner)
        .collect();
    assert_eq!(names, vec!["a-semi", "a-final", "b0", "b1"]);
}
