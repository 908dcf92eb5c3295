use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::{Club, ClubId, FieldRole, Match};
use crate::retro::RetroRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankCriterion {
    Games,
    Wins,
    Goals,
    Points,
    GoalDifference,
}

impl RankCriterion {
    /// Case-insensitive; `_`, `-` and spaces are ignored so `goal_difference`
    /// and `goalDifference` both resolve.
    pub fn parse(raw: &str) -> Option<Self> {
        let key: String = raw
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match key.as_str() {
            "games" => Some(RankCriterion::Games),
            "wins" => Some(RankCriterion::Wins),
            "goals" => Some(RankCriterion::Goals),
            "points" => Some(RankCriterion::Points),
            "goaldifference" => Some(RankCriterion::GoalDifference),
            _ => None,
        }
    }

    pub fn value(self, retro: &RetroRecord) -> i64 {
        match self {
            RankCriterion::Games => i64::from(retro.games_played()),
            RankCriterion::Wins => i64::from(retro.wins),
            RankCriterion::Goals => i64::from(retro.goals_for),
            RankCriterion::Points => i64::from(retro.points()),
            RankCriterion::GoalDifference => retro.goal_difference(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingRow {
    pub club_id: ClubId,
    pub club_name: String,
    pub games: u32,
    pub wins: u32,
    pub goals: u32,
    pub points: u32,
    pub goal_difference: i64,
}

impl RankingRow {
    fn from_retro(club_id: ClubId, retro: &RetroRecord) -> Self {
        Self {
            club_id,
            club_name: retro.subject_name.clone(),
            games: retro.games_played(),
            wins: retro.wins,
            goals: retro.goals_for,
            points: retro.points(),
            goal_difference: retro.goal_difference(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankQuery {
    pub criterion: RankCriterion,
    pub blowouts_only: bool,
    pub role: FieldRole,
}

impl RankQuery {
    pub fn new(criterion: RankCriterion) -> Self {
        Self {
            criterion,
            blowouts_only: false,
            role: FieldRole::Either,
        }
    }
}

/// Per-club records over the whole history. Each match updates the home bucket
/// and the away bucket independently, depending on `role`.
pub fn fold_history(
    matches: &[Match],
    clubs: &HashMap<ClubId, Club>,
    blowouts_only: bool,
    role: FieldRole,
) -> HashMap<ClubId, RetroRecord> {
    let mut table: HashMap<ClubId, RetroRecord> = HashMap::new();
    let name_of = |id: ClubId| clubs.get(&id).map(|c| c.name.clone()).unwrap_or_default();

    for m in matches.iter().filter(|m| !blowouts_only || m.is_blowout()) {
        if role.includes_home() {
            table
                .entry(m.home_club)
                .or_insert_with(|| RetroRecord::new(name_of(m.home_club)))
                .record(m.home_goals, m.away_goals);
        }
        if role.includes_away() {
            table
                .entry(m.away_club)
                .or_insert_with(|| RetroRecord::new(name_of(m.away_club)))
                .record(m.away_goals, m.home_goals);
        }
    }
    table
}

/// Leaderboard ordered by the criterion, highest first. Clubs scoring zero or
/// less on the criterion are left out. Ties keep no particular order.
pub fn rank(matches: &[Match], clubs: &HashMap<ClubId, Club>, query: RankQuery) -> Vec<RankingRow> {
    let table = fold_history(matches, clubs, query.blowouts_only, query.role);

    let mut rows: Vec<(i64, RankingRow)> = table
        .iter()
        .map(|(id, retro)| (query.criterion.value(retro), RankingRow::from_retro(*id, retro)))
        .filter(|(value, _)| *value > 0)
        .collect();
    rows.sort_by(|(a, _), (b, _)| b.cmp(a));
    rows.into_iter().map(|(_, row)| row).collect()
}

/// Same as [`rank`] with the criterion given by name; unknown names rank nobody.
pub fn rank_by_name(
    matches: &[Match],
    clubs: &HashMap<ClubId, Club>,
    criterion: &str,
    blowouts_only: bool,
    role: FieldRole,
) -> Vec<RankingRow> {
    let Some(criterion) = RankCriterion::parse(criterion) else {
        log::warn!("unknown ranking criterion '{criterion}', returning empty ranking");
        return Vec::new();
    };
    rank(
        matches,
        clubs,
        RankQuery {
            criterion,
            blowouts_only,
            role,
        },
    )
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate};

    use super::*;

    fn clubs(names: &[&str]) -> HashMap<ClubId, Club> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let id = i as ClubId + 1;
                (
                    id,
                    Club {
                        id,
                        name: name.to_string(),
                        state_code: "MG".to_string(),
                        founded_on: NaiveDate::from_ymd_opt(1900, 1, 1).unwrap(),
                        active: true,
                    },
                )
            })
            .collect()
    }

    fn game(id: u64, home: ClubId, away: ClubId, hg: i32, ag: i32) -> Match {
        Match {
            id,
            home_club: home,
            away_club: away,
            home_goals: hg,
            away_goals: ag,
            stadium_name: "Arena".to_string(),
            kickoff: NaiveDate::from_ymd_opt(2022, 3, 1)
                .unwrap()
                .and_hms_opt(20, 0, 0)
                .unwrap()
                + Duration::days(id as i64 * 4),
        }
    }

    #[test]
    fn criterion_names_resolve_loosely() {
        assert_eq!(RankCriterion::parse("Points"), Some(RankCriterion::Points));
        assert_eq!(RankCriterion::parse("goalDifference"), Some(RankCriterion::GoalDifference));
        assert_eq!(RankCriterion::parse("goal_difference"), Some(RankCriterion::GoalDifference));
        assert_eq!(RankCriterion::parse("elo"), None);
    }

    #[test]
    fn points_ranking_drops_pointless_clubs() {
        let clubs = clubs(&["A", "B", "C"]);
        let matches = vec![game(1, 1, 2, 2, 0), game(2, 2, 3, 1, 0)];
        let rows = rank(&matches, &clubs, RankQuery::new(RankCriterion::Points));
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.points == 3));
        assert!(rows.iter().all(|r| r.club_name != "C"));
        let b = rows.iter().find(|r| r.club_id == 2).unwrap();
        assert_eq!(b.games, 2);
    }

    #[test]
    fn rows_are_sorted_descending() {
        let clubs = clubs(&["A", "B", "C"]);
        let matches = vec![game(1, 1, 2, 1, 0), game(2, 3, 2, 4, 0), game(3, 3, 1, 2, 1)];
        let rows = rank(&matches, &clubs, RankQuery::new(RankCriterion::Goals));
        let goals: Vec<u32> = rows.iter().map(|r| r.goals).collect();
        assert_eq!(goals, vec![6, 2]);
        assert_eq!(rows[0].club_name, "C");
    }

    #[test]
    fn home_role_only_counts_home_sides() {
        let clubs = clubs(&["A", "B"]);
        let matches = vec![game(1, 1, 2, 0, 3)];
        let query = RankQuery {
            criterion: RankCriterion::Games,
            blowouts_only: false,
            role: FieldRole::Home,
        };
        let rows = rank(&matches, &clubs, query);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].club_id, 1);
        assert_eq!(rows[0].wins, 0);
    }

    #[test]
    fn negative_goal_difference_is_excluded() {
        let clubs = clubs(&["A", "B"]);
        let matches = vec![game(1, 1, 2, 4, 1)];
        let rows = rank(&matches, &clubs, RankQuery::new(RankCriterion::GoalDifference));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].goal_difference, 3);
    }

    #[test]
    fn blowouts_only_filters_before_folding() {
        let clubs = clubs(&["A", "B"]);
        let matches = vec![game(1, 1, 2, 5, 1), game(2, 2, 1, 2, 1)];
        let query = RankQuery {
            criterion: RankCriterion::Wins,
            blowouts_only: true,
            role: FieldRole::Either,
        };
        let rows = rank(&matches, &clubs, query);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].club_id, 1);
    }

    #[test]
    fn unknown_criterion_yields_empty_ranking() {
        let clubs = clubs(&["A", "B"]);
        let matches = vec![game(1, 1, 2, 5, 1)];
        assert!(rank_by_name(&matches, &clubs, "saldo", false, FieldRole::Either).is_empty());
    }
}
