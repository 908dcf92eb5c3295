use anyhow::Result;
use chrono::{Duration, NaiveDateTime};

use crate::error::Rejection;
use crate::model::{Club, Match, MatchDraft, MatchId};
use crate::store::MatchStore;

/// Half-width of the window around a kickoff in which neither club may play again.
pub const REST_WINDOW_HOURS: i64 = 48;

pub fn rest_window(kickoff: NaiveDateTime) -> (NaiveDateTime, NaiveDateTime) {
    let half = Duration::hours(REST_WINDOW_HOURS);
    (kickoff - half, kickoff + half)
}

/// Stored matches that may clash with a candidate.
#[derive(Debug, Clone, Default)]
pub struct Conflicts {
    /// Matches of either club inside the rest window.
    pub nearby: Vec<Match>,
    /// Matches at the same stadium name and kickoff instant.
    pub same_slot: Vec<Match>,
}

impl Conflicts {
    pub fn load<S: MatchStore + ?Sized>(store: &S, candidate: &MatchDraft) -> Result<Self> {
        let (start, end) = rest_window(candidate.kickoff);
        let nearby =
            store.matches_in_window(candidate.home_club, candidate.away_club, start, end)?;
        let same_slot = store.matches_at(&candidate.stadium_name, candidate.kickoff)?;
        Ok(Self { nearby, same_slot })
    }
}

/// Rules that need only the candidate and its two clubs (1 to 4).
pub fn check_candidate(
    candidate: &MatchDraft,
    home: &Club,
    away: &Club,
    now: NaiveDateTime,
) -> Result<(), Rejection> {
    if candidate.home_club == candidate.away_club {
        return Err(Rejection::SameClub);
    }
    if candidate.home_goals < 0 || candidate.away_goals < 0 {
        return Err(Rejection::NegativeGoals);
    }
    if candidate.kickoff > now {
        return Err(Rejection::KickoffInFuture);
    }
    if candidate.kickoff < home.founded_at() || candidate.kickoff < away.founded_at() {
        return Err(Rejection::KickoffBeforeFounding);
    }
    if !home.active || !away.active {
        return Err(Rejection::InactiveClub);
    }
    Ok(())
}

/// Rules against stored matches (5 and 6). `exclude` is the candidate's own id on edit.
pub fn check_conflicts(
    candidate: &MatchDraft,
    conflicts: &Conflicts,
    exclude: Option<MatchId>,
) -> Result<(), Rejection> {
    let (start, end) = rest_window(candidate.kickoff);
    let is_other = |m: &&Match| Some(m.id) != exclude;

    if let Some(clash) = conflicts.nearby.iter().filter(is_other).find(|m| {
        (m.involves(candidate.home_club) || m.involves(candidate.away_club))
            && m.kickoff >= start
            && m.kickoff <= end
    }) {
        return Err(Rejection::RestWindowConflict {
            conflicting: clash.id,
        });
    }

    if let Some(clash) = conflicts
        .same_slot
        .iter()
        .filter(is_other)
        .find(|m| m.stadium_name == candidate.stadium_name && m.kickoff == candidate.kickoff)
    {
        return Err(Rejection::StadiumBooked {
            conflicting: clash.id,
        });
    }
    Ok(())
}

/// Full ordered decision over injected data; the first failing rule wins.
pub fn evaluate(
    candidate: &MatchDraft,
    home: &Club,
    away: &Club,
    now: NaiveDateTime,
    conflicts: &Conflicts,
    exclude: Option<MatchId>,
) -> Result<(), Rejection> {
    check_candidate(candidate, home, away, now)?;
    check_conflicts(candidate, conflicts, exclude)
}

/// Outcome of asking the store-backed validator about a candidate.
pub type Verdict = std::result::Result<(), Rejection>;

/// Runs the rules against live store data. Conflict queries only run once rules 1 to 4 pass.
pub fn validate<S: MatchStore + ?Sized>(
    store: &S,
    candidate: &MatchDraft,
    home: &Club,
    away: &Club,
    now: NaiveDateTime,
    exclude: Option<MatchId>,
) -> Result<Verdict> {
    if let Err(reason) = check_candidate(candidate, home, away, now) {
        log::debug!(
            "rejecting {} vs {} at {}: {reason}",
            home.name,
            away.name,
            candidate.kickoff
        );
        return Ok(Err(reason));
    }
    let conflicts = Conflicts::load(store, candidate)?;
    let verdict = check_conflicts(candidate, &conflicts, exclude);
    if let Err(reason) = &verdict {
        log::debug!(
            "rejecting {} vs {} at {}: {reason}",
            home.name,
            away.name,
            candidate.kickoff
        );
    }
    Ok(verdict)
}
