use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime};

use matchbook::error::{Rejection, RejectionKind, ServiceError};
use matchbook::model::{ClubId, NewClub};
use matchbook::service::{MatchEdit, MatchFilter, MatchRequest, MatchService};
use matchbook::store::{ClubDirectory, MemoryStore};

fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .and_then(|date| date.and_hms_opt(h, 0, 0))
        .expect("valid test timestamp")
}

fn add_club(store: &MemoryStore, name: &str, founded: (i32, u32, u32), active: bool) -> ClubId {
    store
        .insert_club(NewClub {
            name: name.to_string(),
            state_code: "SP".to_string(),
            founded_on: NaiveDate::from_ymd_opt(founded.0, founded.1, founded.2)
                .expect("valid founding date"),
            active,
        })
        .expect("club insert should succeed")
        .id
}

struct League {
    service: MatchService<MemoryStore>,
    a: ClubId,
    b: ClubId,
    c: ClubId,
    d: ClubId,
}

fn league() -> League {
    let store = MemoryStore::new();
    let a = add_club(&store, "A", (1900, 1, 1), true);
    let b = add_club(&store, "B", (1950, 1, 1), true);
    let c = add_club(&store, "C", (1920, 1, 1), true);
    let d = add_club(&store, "D", (1930, 1, 1), true);
    let service = MatchService::new(Arc::new(store)).with_clock(|| at(2024, 1, 1, 0));
    League {
        service,
        a,
        b,
        c,
        d,
    }
}

fn request(home: ClubId, away: ClubId, goals: (i32, i32), kickoff: NaiveDateTime) -> MatchRequest {
    MatchRequest {
        home_club_id: home,
        away_club_id: away,
        home_goals: goals.0,
        away_goals: goals.1,
        score: None,
        stadium_name: "Stadium X".to_string(),
        kickoff,
    }
}

fn rejection_of(result: Result<matchbook::model::Match, ServiceError>) -> Rejection {
    result
        .expect_err("candidate should be rejected")
        .rejection()
        .expect("error should be an admission rejection")
}

#[test]
fn first_match_is_admitted_and_the_same_slot_is_not() {
    let l = league();
    let kickoff = at(2023, 5, 1, 15);
    let first = l
        .service
        .create(request(l.a, l.b, (3, 0), kickoff))
        .expect("first match should be admitted");
    assert_eq!(first.score(), "3-0");

    let again = rejection_of(l.service.create(request(l.a, l.b, (1, 1), kickoff)));
    assert_eq!(again.kind(), RejectionKind::Conflict);

    let other_pair = rejection_of(l.service.create(request(l.c, l.d, (0, 0), kickoff)));
    assert_eq!(
        other_pair,
        Rejection::StadiumBooked {
            conflicting: first.id
        }
    );
    assert_eq!(other_pair.to_string(), "stadium already booked at this time");
}

#[test]
fn same_club_is_rejected_whatever_else_is_wrong() {
    let l = league();
    let reason = rejection_of(l.service.create(request(l.a, l.a, (-1, 0), at(2030, 1, 1, 0))));
    assert_eq!(reason, Rejection::SameClub);
    assert_eq!(reason.kind(), RejectionKind::Input);
    assert_eq!(reason.to_string(), "clubs must differ");
}

#[test]
fn future_kickoff_is_reported_before_a_rest_window_clash() {
    let l = league();
    let kickoff = at(2023, 12, 31, 12);
    l.service
        .create(request(l.a, l.c, (1, 0), kickoff))
        .expect("seed match should be admitted");

    let reason = rejection_of(l.service.create(request(l.a, l.b, (1, 0), kickoff + Duration::hours(20))));
    assert_eq!(reason, Rejection::KickoffInFuture);
    assert_eq!(reason.to_string(), "kickoff cannot be in the future");
}

#[test]
fn kickoff_before_founding_is_input_error() {
    let l = league();
    let reason = rejection_of(l.service.create(request(l.a, l.b, (2, 2), at(1949, 12, 31, 15))));
    assert_eq!(reason, Rejection::KickoffBeforeFounding);
    assert_eq!(reason.kind(), RejectionKind::Input);
}

#[test]
fn rest_window_is_club_scoped_and_symmetric() {
    let l = league();
    let kickoff = at(2023, 8, 10, 18);
    l.service
        .create(request(l.a, l.b, (1, 0), kickoff))
        .expect("seed match should be admitted");

    // B turns up as the away side of another match 47 hours earlier.
    let mut near = request(l.c, l.b, (0, 1), kickoff - Duration::hours(47));
    near.stadium_name = "Stadium Y".to_string();
    let reason = rejection_of(l.service.create(near));
    assert!(matches!(reason, Rejection::RestWindowConflict { .. }));

    // Unrelated clubs may play at the same time elsewhere.
    let mut elsewhere = request(l.c, l.d, (2, 0), kickoff);
    elsewhere.stadium_name = "Stadium Y".to_string();
    l.service
        .create(elsewhere)
        .expect("unrelated clubs should be admitted");
}

#[test]
fn inactive_club_blocks_admission() {
    let store = MemoryStore::new();
    let a = add_club(&store, "A", (1900, 1, 1), true);
    let b = add_club(&store, "B", (1950, 1, 1), false);
    let service = MatchService::new(Arc::new(store)).with_clock(|| at(2024, 1, 1, 0));
    let reason = rejection_of(service.create(request(a, b, (1, 0), at(2023, 5, 1, 15))));
    assert_eq!(reason, Rejection::InactiveClub);
    assert_eq!(reason.kind(), RejectionKind::Conflict);
}

#[test]
fn editing_a_match_does_not_clash_with_itself() {
    let l = league();
    let kickoff = at(2023, 5, 1, 15);
    let saved = l
        .service
        .create(request(l.a, l.b, (3, 0), kickoff))
        .expect("first match should be admitted");

    let edited = l
        .service
        .update(
            saved.id,
            MatchEdit {
                home_goals: 0,
                away_goals: 0,
                score: Some("2-2".to_string()),
                stadium_name: "Stadium X".to_string(),
                kickoff,
            },
        )
        .expect("editing the score should be admitted");
    assert_eq!(edited.score(), "2-2");
    assert_eq!(
        l.service.list(&MatchFilter::default()).expect("list").len(),
        1
    );
}

#[test]
fn rejected_candidates_are_never_stored() {
    let l = league();
    let _ = l.service.create(request(l.a, l.a, (1, 0), at(2023, 5, 1, 15)));
    let _ = l.service.create(request(l.a, l.b, (-3, 0), at(2023, 5, 1, 15)));
    assert!(
        l.service
            .list(&MatchFilter::default())
            .expect("list")
            .is_empty()
    );
}
