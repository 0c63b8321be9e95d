use std::collections::HashMap;

use crate::match_record::MatchRecord;

/// How matches inside one tournament (and date) are ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TieBreak {
    MatchNumber,
    RoundImportance,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ChronoKey<'a> {
    pub date: u32,
    pub tournament: &'a str,
    pub tertiary: u32,
}

/// Per tournament: match numbers are used only when every row of that
/// tournament carries one, otherwise round importance decides.
pub fn tie_breaks(records: &[MatchRecord]) -> HashMap<&str, TieBreak> {
    let mut numbered: HashMap<&str, bool> = HashMap::new();
    for r in records {
        let has_num = r.match_num.is_some_and(|n| n > 0);
        numbered
            .entry(r.tourney_id.as_str())
            .and_modify(|all| *all &= has_num)
            .or_insert(has_num);
    }
    numbered
        .into_iter()
        .map(|(id, all)| {
            let rule = if all {
                TieBreak::MatchNumber
            } else {
                TieBreak::RoundImportance
            };
            (id, rule)
        })
        .collect()
}

pub fn chrono_key(record: &MatchRecord, rule: TieBreak) -> ChronoKey<'_> {
    let tertiary = match rule {
        TieBreak::MatchNumber => record.match_num.unwrap_or(0),
        TieBreak::RoundImportance => record.round.importance(),
    };
    ChronoKey {
        date: record.date.yyyymmdd,
        tournament: &record.tourney_id,
        tertiary,
    }
}

/// Indices of `records` in chronological order. Equal keys keep input order.
pub fn chronological_order(records: &[MatchRecord]) -> Vec<usize> {
    let rules = tie_breaks(records);
    let keys: Vec<ChronoKey<'_>> = records
        .iter()
        .map(|r| {
            let rule = rules
                .get(r.tourney_id.as_str())
                .copied()
                .unwrap_or(TieBreak::RoundImportance);
            chrono_key(r, rule)
        })
        .collect();

    let mut order: Vec<usize> = (0..records.len()).collect();
    // slice::sort_by is stable
    order.sort_by(|a, b| keys[*a].cmp(&keys[*b]));
    order
}

pub fn sequence(records: Vec<MatchRecord>) -> Vec<MatchRecord> {
    let order = chronological_order(&records);
    let mut slots: Vec<Option<MatchRecord>> = records.into_iter().map(Some).collect();
    order
        .into_iter()
        .filter_map(|idx| slots[idx].take())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::match_record::{PlayerBio, Surface};
    use crate::normalize::{RepairedDate, Round};

    fn rec(id: &str, date: u32, round: Round, num: Option<u32>, winner: &str) -> MatchRecord {
        MatchRecord {
            tourney_id: id.to_string(),
            tourney_name: id.to_string(),
            tourney_level: "A".to_string(),
            surface: Surface::Hard,
            date: RepairedDate::observed(date),
            round,
            match_num: num,
            winner: winner.to_string(),
            loser: "X".to_string(),
            winner_bio: PlayerBio::default(),
            loser_bio: PlayerBio::default(),
            minutes: None,
            score: String::new(),
        }
    }

    #[test]
    fn round_importance_orders_unnumbered_tournaments() {
        let rows = vec![
            rec("t1", 20_240_101, Round::F, None, "final"),
            rec("t1", 20_240_101, Round::Q1, Some(3), "qual"),
            rec("t1", 20_240_101, Round::SF, None, "semi"),
        ];
        let out = sequence(rows);
        let names: Vec<&str> = out.iter().map(|r| r.winner.as_str()).collect();
        assert_eq!(names, vec!["qual", "semi", "final"]);
    }

    #[test]
    fn match_number_wins_when_every_row_has_one() {
        let rows = vec![
            rec("t1", 20_240_101, Round::QF, Some(2), "b"),
            rec("t1", 20_240_101, Round::R16, Some(3), "c"),
            rec("t1", 20_240_101, Round::SF, Some(1), "a"),
        ];
        let out = sequence(rows);
        let names: Vec<&str> = out.iter().map(|r| r.winner.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn identical_keys_keep_input_order() {
        let rows = vec![
            rec("t1", 20_240_101, Round::R32, None, "first"),
            rec("t1", 20_240_101, Round::R32, None, "second"),
            rec("t0", 20_230_101, Round::R32, None, "earlier"),
        ];
        let out = sequence(rows);
        let names: Vec<&str> = out.iter().map(|r| r.winner.as_str()).collect();
        assert_eq!(names, vec!["earlier", "first", "second"]);
    }
}
