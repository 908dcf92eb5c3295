use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::admission;
use crate::error::{Entity, ServiceError, ServiceResult, StadiumNameTaken};
use crate::model::{
    Club, ClubId, FieldRole, Match, MatchDraft, MatchId, NewClub, Stadium, StadiumId, parse_score,
};
use crate::ranking::{self, RankingRow};
use crate::retro::{self, HeadToHead, RetroRecord};
use crate::snapshot::{self, GoalTally};
use crate::store::{ClubDirectory, MatchStore, StadiumDirectory};

/// A match as submitted for creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRequest {
    pub home_club_id: ClubId,
    pub away_club_id: ClubId,
    pub home_goals: i32,
    pub away_goals: i32,
    /// `"H-A"`; overrides the numeric goals when present.
    #[serde(default)]
    pub score: Option<String>,
    pub stadium_name: String,
    pub kickoff: NaiveDateTime,
}

/// New values for an existing match. Clubs cannot be changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchEdit {
    pub home_goals: i32,
    pub away_goals: i32,
    #[serde(default)]
    pub score: Option<String>,
    pub stadium_name: String,
    pub kickoff: NaiveDateTime,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchFilter {
    pub club: Option<ClubId>,
    /// Case-insensitive substring of the stadium name.
    pub stadium: Option<String>,
    pub blowouts_only: bool,
}

impl MatchFilter {
    fn keeps(&self, m: &Match) -> bool {
        if let Some(club) = self.club
            && !m.involves(club)
        {
            return false;
        }
        if let Some(needle) = self.stadium.as_deref()
            && !m
                .stadium_name
                .to_lowercase()
                .contains(&needle.trim().to_lowercase())
        {
            return false;
        }
        !self.blowouts_only || m.is_blowout()
    }
}

type Clock = Box<dyn Fn() -> NaiveDateTime + Send + Sync>;

/// Wall-clock time on the same local basis as stored kickoffs.
pub fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

fn name_taken(name: &str) -> ServiceError {
    ServiceError::NameTaken(StadiumNameTaken {
        name: name.to_string(),
    })
}

fn goals_from(score: Option<&str>, home: i32, away: i32) -> ServiceResult<(i32, i32)> {
    match score {
        Some(raw) => Ok(parse_score(raw)?),
        None => Ok((home, away)),
    }
}

pub struct MatchService<S> {
    store: Arc<S>,
    clock: Clock,
}

impl<S> MatchService<S>
where
    S: ClubDirectory + StadiumDirectory + MatchStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            clock: Box::new(local_now),
        }
    }

    /// Replaces the wall clock used for the "kickoff in the future" rule.
    pub fn with_clock(mut self, clock: impl Fn() -> NaiveDateTime + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    fn club(&self, id: ClubId) -> ServiceResult<Club> {
        self.store
            .find_club(id)?
            .ok_or(ServiceError::club_not_found(id))
    }

    fn existing_match(&self, id: MatchId) -> ServiceResult<Match> {
        self.store
            .find_match(id)?
            .ok_or(ServiceError::match_not_found(id))
    }

    fn club_map(&self) -> ServiceResult<HashMap<ClubId, Club>> {
        Ok(self
            .store
            .all_clubs()?
            .into_iter()
            .map(|club| (club.id, club))
            .collect())
    }

    fn admit(
        &self,
        draft: MatchDraft,
        home: &Club,
        away: &Club,
        existing: Option<MatchId>,
    ) -> ServiceResult<Match> {
        let now = (self.clock)();
        admission::validate(self.store.as_ref(), &draft, home, away, now, existing)??;
        let saved = self.store.save_match(existing, draft)?;
        log::info!(
            "admitted match {}: {} {} {} at {} ({})",
            saved.id,
            home.name,
            saved.score(),
            away.name,
            saved.stadium_name,
            saved.kickoff
        );
        Ok(saved)
    }

    pub fn create(&self, request: MatchRequest) -> ServiceResult<Match> {
        let home = self.club(request.home_club_id)?;
        let away = self.club(request.away_club_id)?;
        let (home_goals, away_goals) =
            goals_from(request.score.as_deref(), request.home_goals, request.away_goals)?;
        let draft = MatchDraft {
            home_club: home.id,
            away_club: away.id,
            home_goals,
            away_goals,
            stadium_name: request.stadium_name,
            kickoff: request.kickoff,
        };
        self.admit(draft, &home, &away, None)
    }

    pub fn update(&self, id: MatchId, edit: MatchEdit) -> ServiceResult<Match> {
        let current = self.existing_match(id)?;
        let home = self.club(current.home_club)?;
        let away = self.club(current.away_club)?;
        let (home_goals, away_goals) =
            goals_from(edit.score.as_deref(), edit.home_goals, edit.away_goals)?;
        let draft = MatchDraft {
            home_club: current.home_club,
            away_club: current.away_club,
            home_goals,
            away_goals,
            stadium_name: edit.stadium_name,
            kickoff: edit.kickoff,
        };
        self.admit(draft, &home, &away, Some(id))
    }

    pub fn delete(&self, id: MatchId) -> ServiceResult<()> {
        if !self.store.delete_match(id)? {
            return Err(ServiceError::match_not_found(id));
        }
        log::info!("deleted match {id}");
        Ok(())
    }

    pub fn get(&self, id: MatchId) -> ServiceResult<Match> {
        self.existing_match(id)
    }

    /// Matches passing every filter, ordered by kickoff then id.
    pub fn list(&self, filter: &MatchFilter) -> ServiceResult<Vec<Match>> {
        let source = match filter.club {
            Some(club) => self.store.matches_involving(club, FieldRole::Either)?,
            None => self.store.all_matches()?,
        };
        let mut out: Vec<Match> = source.into_iter().filter(|m| filter.keeps(m)).collect();
        out.sort_by(|a, b| a.kickoff.cmp(&b.kickoff).then(a.id.cmp(&b.id)));
        Ok(out)
    }

    pub fn head_to_head(&self, club_a: ClubId, club_b: ClubId) -> ServiceResult<HeadToHead> {
        if club_a == club_b {
            return Err(ServiceError::SameClubs { club: club_a });
        }
        let a = self.club(club_a)?;
        let b = self.club(club_b)?;
        let meetings = self.store.head_to_head_matches(a.id, b.id)?;
        Ok(retro::head_to_head(&a, &b, meetings))
    }

    pub fn club_retro(&self, club: ClubId, role: FieldRole) -> ServiceResult<RetroRecord> {
        let subject = self.club(club)?;
        let matches = self.store.matches_involving(subject.id, role)?;
        Ok(retro::aggregate(&subject, &matches, role))
    }

    pub fn club_retro_blowouts(&self, club: ClubId, role: FieldRole) -> ServiceResult<RetroRecord> {
        let subject = self.club(club)?;
        let matches = self.store.matches_involving(subject.id, role)?;
        Ok(retro::aggregate_blowouts(&subject, &matches, role))
    }

    pub fn club_retro_by_opponent(
        &self,
        club: ClubId,
        role: FieldRole,
    ) -> ServiceResult<BTreeMap<ClubId, RetroRecord>> {
        let subject = self.club(club)?;
        let matches = self.store.matches_involving(subject.id, role)?;
        let clubs = self.club_map()?;
        Ok(retro::aggregate_by_opponent(subject.id, &matches, role, &clubs))
    }

    /// Records over the matches played among `ids`, in the order given.
    pub fn compare_clubs(&self, ids: &[ClubId]) -> ServiceResult<Vec<RetroRecord>> {
        let found: HashMap<ClubId, Club> = self
            .store
            .find_clubs(ids)?
            .into_iter()
            .map(|club| (club.id, club))
            .collect();
        let clubs = ids
            .iter()
            .map(|id| {
                found
                    .get(id)
                    .cloned()
                    .ok_or(ServiceError::club_not_found(*id))
            })
            .collect::<ServiceResult<Vec<_>>>()?;
        let matches = self.store.matches_involving_any(ids)?;
        Ok(retro::compare(&clubs, &matches))
    }

    pub fn ranking(
        &self,
        criterion: &str,
        blowouts_only: bool,
        role: FieldRole,
    ) -> ServiceResult<Vec<RankingRow>> {
        let matches = self.store.all_matches()?;
        let clubs = self.club_map()?;
        Ok(ranking::rank_by_name(
            &matches,
            &clubs,
            criterion,
            blowouts_only,
            role,
        ))
    }

    pub fn clubs(&self) -> ServiceResult<Vec<Club>> {
        Ok(self.store.all_clubs()?)
    }

    pub fn register_club(&self, club: NewClub) -> ServiceResult<Club> {
        Ok(self.store.insert_club(club)?)
    }

    pub fn register_stadium(&self, name: &str) -> ServiceResult<Stadium> {
        if self.store.stadium_name_taken(name, None)? {
            return Err(name_taken(name));
        }
        let stadium = self
            .store
            .insert_stadium(name)
            .map_err(ServiceError::from_store)?;
        log::info!("registered stadium {}: {}", stadium.id, stadium.name);
        Ok(stadium)
    }

    pub fn get_stadium(&self, id: StadiumId) -> ServiceResult<Stadium> {
        self.store
            .find_stadium(id)?
            .ok_or(ServiceError::stadium_not_found(id))
    }

    /// Renames a stadium. Stored matches keep the name they were played under.
    pub fn rename_stadium(&self, id: StadiumId, name: &str) -> ServiceResult<Stadium> {
        let current = self.get_stadium(id)?;
        if self.store.stadium_name_taken(name, Some(current.id))? {
            return Err(name_taken(name));
        }
        self.store
            .rename_stadium(id, name)
            .map_err(ServiceError::from_store)?
            .ok_or(ServiceError::stadium_not_found(id))
    }

    pub fn deactivate_club(&self, id: ClubId) -> ServiceResult<()> {
        if !self.store.deactivate_club(id)? {
            return Err(ServiceError::NotFound {
                entity: Entity::Club,
                id,
            });
        }
        log::info!("deactivated club {id}");
        Ok(())
    }
}

impl<S> MatchService<S>
where
    S: ClubDirectory + StadiumDirectory + MatchStore + Sync,
{
    pub fn snapshot(&self) -> ServiceResult<Vec<GoalTally>> {
        Ok(snapshot::run_once(self.store.as_ref())?)
    }
}
