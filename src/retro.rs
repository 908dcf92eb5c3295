use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::model::{Club, ClubId, FieldRole, Match};

/// Win/draw/loss and goal counters for one club over a set of matches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetroRecord {
    pub subject_name: String,
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
    pub goals_for: u32,
    pub goals_against: u32,
}

impl RetroRecord {
    pub fn new(subject_name: impl Into<String>) -> Self {
        Self {
            subject_name: subject_name.into(),
            ..Self::default()
        }
    }

    pub fn games_played(&self) -> u32 {
        self.wins + self.draws + self.losses
    }

    pub fn points(&self) -> u32 {
        3 * self.wins + self.draws
    }

    pub fn goal_difference(&self) -> i64 {
        i64::from(self.goals_for) - i64::from(self.goals_against)
    }

    /// Adds one result seen from the subject's side.
    pub fn record(&mut self, scored: i32, conceded: i32) {
        self.goals_for += goals(scored);
        self.goals_against += goals(conceded);
        match scored.cmp(&conceded) {
            std::cmp::Ordering::Greater => self.wins += 1,
            std::cmp::Ordering::Less => self.losses += 1,
            std::cmp::Ordering::Equal => self.draws += 1,
        }
    }

    /// Folds `m` from `club`'s side. Matches the club did not play are ignored.
    pub fn absorb(&mut self, m: &Match, club: ClubId) {
        if let Some((scored, conceded)) = m.goals_from(club) {
            self.record(scored, conceded);
        }
    }
}

// Stored goals are admitted non-negative; clamp anything else rather than wrap.
fn goals(n: i32) -> u32 {
    u32::try_from(n).unwrap_or(0)
}

/// Keeps only matches decided by the blowout margin.
pub fn blowouts<'a>(matches: &'a [Match]) -> impl Iterator<Item = &'a Match> + 'a {
    matches.iter().filter(|m| m.is_blowout())
}

/// One record for `subject` over the matches it played in `role`.
pub fn aggregate<'a>(
    subject: &Club,
    matches: impl IntoIterator<Item = &'a Match>,
    role: FieldRole,
) -> RetroRecord {
    let mut retro = RetroRecord::new(subject.name.clone());
    for m in matches {
        if m.played_as(subject.id, role) {
            retro.absorb(m, subject.id);
        }
    }
    retro
}

/// Like [`aggregate`], restricted to blowouts.
pub fn aggregate_blowouts(subject: &Club, matches: &[Match], role: FieldRole) -> RetroRecord {
    aggregate(subject, blowouts(matches), role)
}

/// One record per opponent faced, named after the opponent.
/// Opponents missing from `clubs` get an empty name.
pub fn aggregate_by_opponent<'a>(
    subject: ClubId,
    matches: impl IntoIterator<Item = &'a Match>,
    role: FieldRole,
    clubs: &HashMap<ClubId, Club>,
) -> BTreeMap<ClubId, RetroRecord> {
    let mut buckets: BTreeMap<ClubId, RetroRecord> = BTreeMap::new();
    for m in matches {
        if !m.played_as(subject, role) {
            continue;
        }
        let Some(opponent) = m.opponent_of(subject) else {
            continue;
        };
        buckets
            .entry(opponent)
            .or_insert_with(|| {
                RetroRecord::new(clubs.get(&opponent).map(|c| c.name.clone()).unwrap_or_default())
            })
            .absorb(m, subject);
    }
    buckets
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadToHead {
    pub matches: Vec<Match>,
    pub retro: [RetroRecord; 2],
}

/// Both clubs' records over their meetings, ordered by club name.
pub fn head_to_head(club_a: &Club, club_b: &Club, matches: Vec<Match>) -> HeadToHead {
    let meetings: Vec<Match> = matches
        .into_iter()
        .filter(|m| {
            (m.home_club == club_a.id && m.away_club == club_b.id)
                || (m.home_club == club_b.id && m.away_club == club_a.id)
        })
        .collect();

    let mut sides = [
        (club_a, RetroRecord::new(club_a.name.clone())),
        (club_b, RetroRecord::new(club_b.name.clone())),
    ];
    for m in &meetings {
        for (club, retro) in sides.iter_mut() {
            retro.absorb(m, club.id);
        }
    }
    sides.sort_by(|(ca, a), (cb, b)| a.subject_name.cmp(&b.subject_name).then(ca.id.cmp(&cb.id)));
    let [(_, first), (_, second)] = sides;

    HeadToHead {
        matches: meetings,
        retro: [first, second],
    }
}

/// Each club's record over matches played only among the given clubs, in the given order.
pub fn compare(clubs: &[Club], matches: &[Match]) -> Vec<RetroRecord> {
    let group: HashSet<ClubId> = clubs.iter().map(|c| c.id).collect();
    let internal: Vec<&Match> = matches
        .iter()
        .filter(|m| group.contains(&m.home_club) && group.contains(&m.away_club))
        .collect();
    clubs
        .iter()
        .map(|club| aggregate(club, internal.iter().copied(), FieldRole::Either))
        .collect()
}
