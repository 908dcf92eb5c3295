use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::MalformedScore;

/// Absolute goal margin at which a match counts as a blowout.
pub const BLOWOUT_MARGIN: i32 = 3;

pub type ClubId = u64;
pub type MatchId = u64;
pub type StadiumId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Club {
    pub id: ClubId,
    pub name: String,
    pub state_code: String,
    pub founded_on: NaiveDate,
    pub active: bool,
}

impl Club {
    /// First instant at which this club may have played.
    pub fn founded_at(&self) -> NaiveDateTime {
        self.founded_on.and_time(chrono::NaiveTime::MIN)
    }
}

/// Club fields as submitted before the directory assigns an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewClub {
    pub name: String,
    pub state_code: String,
    pub founded_on: NaiveDate,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stadium {
    pub id: StadiumId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub home_club: ClubId,
    pub away_club: ClubId,
    pub home_goals: i32,
    pub away_goals: i32,
    pub stadium_name: String,
    pub kickoff: NaiveDateTime,
}

impl Match {
    pub fn score(&self) -> String {
        format_score(self.home_goals, self.away_goals)
    }

    pub fn involves(&self, club: ClubId) -> bool {
        self.home_club == club || self.away_club == club
    }

    pub fn is_blowout(&self) -> bool {
        is_blowout(self.home_goals, self.away_goals)
    }

    /// Whether `club` took part in this match on the requested side.
    pub fn played_as(&self, club: ClubId, role: FieldRole) -> bool {
        match role {
            FieldRole::Home => self.home_club == club,
            FieldRole::Away => self.away_club == club,
            FieldRole::Either => self.involves(club),
        }
    }

    /// Goals (for, against) seen from `club`'s side, or `None` if it did not play.
    pub fn goals_from(&self, club: ClubId) -> Option<(i32, i32)> {
        if self.home_club == club {
            Some((self.home_goals, self.away_goals))
        } else if self.away_club == club {
            Some((self.away_goals, self.home_goals))
        } else {
            None
        }
    }

    pub fn opponent_of(&self, club: ClubId) -> Option<ClubId> {
        if self.home_club == club {
            Some(self.away_club)
        } else if self.away_club == club {
            Some(self.home_club)
        } else {
            None
        }
    }

    pub fn to_draft(&self) -> MatchDraft {
        MatchDraft {
            home_club: self.home_club,
            away_club: self.away_club,
            home_goals: self.home_goals,
            away_goals: self.away_goals,
            stadium_name: self.stadium_name.clone(),
            kickoff: self.kickoff,
        }
    }
}

/// A proposed match result: what admission judges and what the store persists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchDraft {
    pub home_club: ClubId,
    pub away_club: ClubId,
    pub home_goals: i32,
    pub away_goals: i32,
    pub stadium_name: String,
    pub kickoff: NaiveDateTime,
}

impl MatchDraft {
    pub fn into_match(self, id: MatchId) -> Match {
        Match {
            id,
            home_club: self.home_club,
            away_club: self.away_club,
            home_goals: self.home_goals,
            away_goals: self.away_goals,
            stadium_name: self.stadium_name,
            kickoff: self.kickoff,
        }
    }
}

/// Which side of a match a club is looked at from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldRole {
    Home,
    Away,
    #[default]
    Either,
}

impl FieldRole {
    pub fn includes_home(self) -> bool {
        matches!(self, FieldRole::Home | FieldRole::Either)
    }

    pub fn includes_away(self) -> bool {
        matches!(self, FieldRole::Away | FieldRole::Either)
    }
}

impl FromStr for FieldRole {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "home" => Ok(FieldRole::Home),
            "away" => Ok(FieldRole::Away),
            "either" | "all" | "any" => Ok(FieldRole::Either),
            other => Err(format!("unknown field role '{other}'")),
        }
    }
}

impl fmt::Display for FieldRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FieldRole::Home => "home",
            FieldRole::Away => "away",
            FieldRole::Either => "either",
        };
        f.write_str(label)
    }
}

pub fn is_blowout(home_goals: i32, away_goals: i32) -> bool {
    (home_goals - away_goals).abs() >= BLOWOUT_MARGIN
}

pub fn format_score(home_goals: i32, away_goals: i32) -> String {
    format!("{home_goals}-{away_goals}")
}

/// Parse a `"H-A"` score. Exactly one `-` and two integer operands are accepted.
pub fn parse_score(raw: &str) -> Result<(i32, i32), MalformedScore> {
    let malformed = || MalformedScore {
        raw: raw.to_string(),
    };
    let mut parts = raw.split('-');
    let (Some(home), Some(away), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(malformed());
    };
    let home = goal_count(home).ok_or_else(malformed)?;
    let away = goal_count(away).ok_or_else(malformed)?;
    Ok((home, away))
}

// Plain ASCII digits only; no sign.
fn goal_count(raw: &str) -> Option<i32> {
    let raw = raw.trim();
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse::<i32>().ok()
}
