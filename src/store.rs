use std::collections::{BTreeMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{Result, anyhow};
use chrono::NaiveDateTime;

use crate::error::StadiumNameTaken;

use crate::model::{Club, ClubId, FieldRole, Match, MatchDraft, MatchId, NewClub, Stadium, StadiumId};

/// Club records, looked up by id.
pub trait ClubDirectory {
    fn find_club(&self, id: ClubId) -> Result<Option<Club>>;

    /// Clubs for the given ids, in id order. Unknown ids are skipped.
    fn find_clubs(&self, ids: &[ClubId]) -> Result<Vec<Club>>;

    fn all_clubs(&self) -> Result<Vec<Club>>;

    fn insert_club(&self, club: NewClub) -> Result<Club>;

    /// Marks a club inactive. Returns `false` when the id is unknown.
    fn deactivate_club(&self, id: ClubId) -> Result<bool>;
}

pub trait StadiumDirectory {
    fn find_stadium(&self, id: StadiumId) -> Result<Option<Stadium>>;

    fn stadium_name_taken(&self, name: &str, except: Option<StadiumId>) -> Result<bool>;

    /// Registers a stadium; fails with [`StadiumNameTaken`] if the name is in use.
    fn insert_stadium(&self, name: &str) -> Result<Stadium>;

    /// Renames a stadium. `None` when the id is unknown; fails with
    /// [`StadiumNameTaken`] if another stadium holds the name.
    fn rename_stadium(&self, id: StadiumId, name: &str) -> Result<Option<Stadium>>;
}

pub trait MatchStore {
    fn find_match(&self, id: MatchId) -> Result<Option<Match>>;

    /// Matches involving either club (on any side) with kickoff in `[start, end]`.
    fn matches_in_window(
        &self,
        club_a: ClubId,
        club_b: ClubId,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<Match>>;

    /// Matches at exactly this stadium name and kickoff instant.
    fn matches_at(&self, stadium_name: &str, kickoff: NaiveDateTime) -> Result<Vec<Match>>;

    fn matches_involving(&self, club: ClubId, role: FieldRole) -> Result<Vec<Match>>;

    /// Matches where any of `clubs` plays, on either side.
    fn matches_involving_any(&self, clubs: &[ClubId]) -> Result<Vec<Match>>;

    /// Matches between the two clubs, in either home/away order.
    fn head_to_head_matches(&self, club_a: ClubId, club_b: ClubId) -> Result<Vec<Match>>;

    fn all_matches(&self) -> Result<Vec<Match>>;

    /// Inserts when `id` is `None`, otherwise overwrites the stored match.
    fn save_match(&self, id: Option<MatchId>, draft: MatchDraft) -> Result<Match>;

    /// Returns `false` when the id is unknown.
    fn delete_match(&self, id: MatchId) -> Result<bool>;

    /// Goals scored by the club, home and away, over every match it played.
    fn total_goals_for(&self, club: ClubId) -> Result<i64> {
        let matches = self.matches_involving(club, FieldRole::Either)?;
        Ok(matches
            .iter()
            .filter_map(|m| m.goals_from(club))
            .map(|(scored, _)| i64::from(scored))
            .sum())
    }
}

#[derive(Debug, Default)]
struct Tables {
    clubs: BTreeMap<ClubId, Club>,
    stadiums: BTreeMap<StadiumId, Stadium>,
    matches: BTreeMap<MatchId, Match>,
    next_club: ClubId,
    next_stadium: StadiumId,
    next_match: MatchId,
}

/// Map-backed store for tests, benches and short-lived runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| anyhow!("memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| anyhow!("memory store lock poisoned"))
    }

    fn collect_matches(&self, keep: impl Fn(&Match) -> bool) -> Result<Vec<Match>> {
        let tables = self.read()?;
        Ok(tables.matches.values().filter(|m| keep(m)).cloned().collect())
    }
}

fn next_id(counter: &mut u64) -> u64 {
    *counter += 1;
    *counter
}

impl ClubDirectory for MemoryStore {
    fn find_club(&self, id: ClubId) -> Result<Option<Club>> {
        Ok(self.read()?.clubs.get(&id).cloned())
    }

    fn find_clubs(&self, ids: &[ClubId]) -> Result<Vec<Club>> {
        let wanted: HashSet<ClubId> = ids.iter().copied().collect();
        let tables = self.read()?;
        Ok(tables
            .clubs
            .values()
            .filter(|c| wanted.contains(&c.id))
            .cloned()
            .collect())
    }

    fn all_clubs(&self) -> Result<Vec<Club>> {
        Ok(self.read()?.clubs.values().cloned().collect())
    }

    fn insert_club(&self, club: NewClub) -> Result<Club> {
        let mut tables = self.write()?;
        let id = next_id(&mut tables.next_club);
        let club = Club {
            id,
            name: club.name,
            state_code: club.state_code,
            founded_on: club.founded_on,
            active: club.active,
        };
        tables.clubs.insert(id, club.clone());
        Ok(club)
    }

    fn deactivate_club(&self, id: ClubId) -> Result<bool> {
        let mut tables = self.write()?;
        let Some(club) = tables.clubs.get_mut(&id) else {
            return Ok(false);
        };
        club.active = false;
        Ok(true)
    }
}

impl StadiumDirectory for MemoryStore {
    fn find_stadium(&self, id: StadiumId) -> Result<Option<Stadium>> {
        Ok(self.read()?.stadiums.get(&id).cloned())
    }

    fn stadium_name_taken(&self, name: &str, except: Option<StadiumId>) -> Result<bool> {
        let tables = self.read()?;
        Ok(tables
            .stadiums
            .values()
            .any(|s| s.name == name && Some(s.id) != except))
    }

    fn insert_stadium(&self, name: &str) -> Result<Stadium> {
        let mut tables = self.write()?;
        if tables.stadiums.values().any(|s| s.name == name) {
            return Err(StadiumNameTaken {
                name: name.to_string(),
            }
            .into());
        }
        let id = next_id(&mut tables.next_stadium);
        let stadium = Stadium {
            id,
            name: name.to_string(),
        };
        tables.stadiums.insert(id, stadium.clone());
        Ok(stadium)
    }

    fn rename_stadium(&self, id: StadiumId, name: &str) -> Result<Option<Stadium>> {
        let mut tables = self.write()?;
        if !tables.stadiums.contains_key(&id) {
            return Ok(None);
        }
        if tables.stadiums.values().any(|s| s.name == name && s.id != id) {
            return Err(StadiumNameTaken {
                name: name.to_string(),
            }
            .into());
        }
        let Some(stadium) = tables.stadiums.get_mut(&id) else {
            return Ok(None);
        };
        stadium.name = name.to_string();
        Ok(Some(stadium.clone()))
    }
}

impl MatchStore for MemoryStore {
    fn find_match(&self, id: MatchId) -> Result<Option<Match>> {
        Ok(self.read()?.matches.get(&id).cloned())
    }

    fn matches_in_window(
        &self,
        club_a: ClubId,
        club_b: ClubId,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<Match>> {
        self.collect_matches(|m| {
            (m.involves(club_a) || m.involves(club_b)) && m.kickoff >= start && m.kickoff <= end
        })
    }

    fn matches_at(&self, stadium_name: &str, kickoff: NaiveDateTime) -> Result<Vec<Match>> {
        self.collect_matches(|m| m.stadium_name == stadium_name && m.kickoff == kickoff)
    }

    fn matches_involving(&self, club: ClubId, role: FieldRole) -> Result<Vec<Match>> {
        self.collect_matches(|m| m.played_as(club, role))
    }

    fn matches_involving_any(&self, clubs: &[ClubId]) -> Result<Vec<Match>> {
        let wanted: HashSet<ClubId> = clubs.iter().copied().collect();
        self.collect_matches(|m| wanted.contains(&m.home_club) || wanted.contains(&m.away_club))
    }

    fn head_to_head_matches(&self, club_a: ClubId, club_b: ClubId) -> Result<Vec<Match>> {
        self.collect_matches(|m| {
            (m.home_club == club_a && m.away_club == club_b)
                || (m.home_club == club_b && m.away_club == club_a)
        })
    }

    fn all_matches(&self) -> Result<Vec<Match>> {
        self.collect_matches(|_| true)
    }

    fn save_match(&self, id: Option<MatchId>, draft: MatchDraft) -> Result<Match> {
        let mut tables = self.write()?;
        let id = match id {
            Some(id) => {
                if !tables.matches.contains_key(&id) {
                    return Err(anyhow!("cannot overwrite missing match {id}"));
                }
                id
            }
            None => next_id(&mut tables.next_match),
        };
        let stored = draft.into_match(id);
        tables.matches.insert(id, stored.clone());
        Ok(stored)
    }

    fn delete_match(&self, id: MatchId) -> Result<bool> {
        Ok(self.write()?.matches.remove(&id).is_some())
    }
}
