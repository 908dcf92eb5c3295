use thiserror::Error;

use crate::model::{ClubId, MatchId, StadiumId};

/// Why a proposed match was refused. Variants follow the order the rules are checked in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("clubs must differ")]
    SameClub,
    #[error("goals cannot be negative")]
    NegativeGoals,
    #[error("kickoff cannot be in the future")]
    KickoffInFuture,
    #[error("kickoff precedes a club's founding date")]
    KickoffBeforeFounding,
    #[error("a club is inactive")]
    InactiveClub,
    #[error("a club already has a match near this time")]
    RestWindowConflict { conflicting: MatchId },
    #[error("stadium already booked at this time")]
    StadiumBooked { conflicting: MatchId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionKind {
    /// The submitted data itself is unacceptable.
    Input,
    /// The data is fine but clashes with stored state.
    Conflict,
}

impl Rejection {
    pub fn kind(&self) -> RejectionKind {
        match self {
            Rejection::SameClub
            | Rejection::NegativeGoals
            | Rejection::KickoffInFuture
            | Rejection::KickoffBeforeFounding => RejectionKind::Input,
            Rejection::InactiveClub
            | Rejection::RestWindowConflict { .. }
            | Rejection::StadiumBooked { .. } => RejectionKind::Conflict,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("score '{raw}' must look like 'H-A' with two integers")]
pub struct MalformedScore {
    pub raw: String,
}

/// A stadium name is already registered under another id.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("stadium name '{name}' is already taken")]
pub struct StadiumNameTaken {
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Club,
    Match,
    Stadium,
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Entity::Club => "club",
            Entity::Match => "match",
            Entity::Stadium => "stadium",
        })
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("match rejected: {0}")]
    Rejected(#[from] Rejection),
    #[error("{entity} {id} not found")]
    NotFound { entity: Entity, id: u64 },
    #[error(transparent)]
    Malformed(#[from] MalformedScore),
    #[error(transparent)]
    NameTaken(#[from] StadiumNameTaken),
    #[error("a club cannot be paired with itself (club {club})")]
    SameClubs { club: ClubId },
    #[error("store error: {0:#}")]
    Store(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn club_not_found(id: ClubId) -> Self {
        ServiceError::NotFound {
            entity: Entity::Club,
            id,
        }
    }

    pub fn match_not_found(id: MatchId) -> Self {
        ServiceError::NotFound {
            entity: Entity::Match,
            id,
        }
    }

    pub fn stadium_not_found(id: StadiumId) -> Self {
        ServiceError::NotFound {
            entity: Entity::Stadium,
            id,
        }
    }

    /// Lifts a store error, keeping typed conflicts the store reports.
    pub fn from_store(err: anyhow::Error) -> Self {
        match err.downcast::<StadiumNameTaken>() {
            Ok(taken) => ServiceError::NameTaken(taken),
            Err(err) => ServiceError::Store(err),
        }
    }

    /// Rejection reason, if this error is an admission refusal.
    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            ServiceError::Rejected(reason) => Some(*reason),
            _ => None,
        }
    }
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;
