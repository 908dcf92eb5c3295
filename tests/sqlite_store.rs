use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime};

use matchbook::error::{Entity, Rejection, ServiceError};
use matchbook::model::{FieldRole, NewClub};
use matchbook::service::{MatchFilter, MatchRequest, MatchService};
use matchbook::sqlite_store::SqliteStore;
use matchbook::store::{ClubDirectory, MatchStore};

fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .and_then(|date| date.and_hms_opt(h, 0, 0))
        .expect("valid test timestamp")
}

fn club(name: &str) -> NewClub {
    NewClub {
        name: name.to_string(),
        state_code: "RS".to_string(),
        founded_on: NaiveDate::from_ymd_opt(1903, 9, 15).expect("valid date"),
        active: true,
    }
}

fn request(home: u64, away: u64, kickoff: NaiveDateTime) -> MatchRequest {
    MatchRequest {
        home_club_id: home,
        away_club_id: away,
        home_goals: 2,
        away_goals: 1,
        score: None,
        stadium_name: "Olimpico".to_string(),
        kickoff,
    }
}

#[test]
fn data_survives_reopening_the_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("nested").join("league.sqlite");

    let (home, away, saved) = {
        let store = Arc::new(SqliteStore::open(&path).expect("open db"));
        let home = store.insert_club(club("Gremio")).expect("insert").id;
        let away = store.insert_club(club("Internacional")).expect("insert").id;
        let service = MatchService::new(Arc::clone(&store)).with_clock(|| at(2024, 1, 1, 0));
        let saved = service
            .create(request(home, away, at(2023, 9, 3, 16)))
            .expect("match should be admitted");
        (home, away, saved)
    };

    let store = SqliteStore::open(&path).expect("reopen db");
    assert_eq!(store.find_match(saved.id).expect("query"), Some(saved.clone()));
    assert_eq!(store.total_goals_for(home).expect("sum"), 2);
    assert_eq!(store.total_goals_for(away).expect("sum"), 1);
    assert_eq!(
        store
            .matches_involving(away, FieldRole::Away)
            .expect("query")
            .len(),
        1
    );
}

#[test]
fn admission_rules_hold_against_sqlite() {
    let dir = tempfile::tempdir().expect("temp dir");
    let store = Arc::new(SqliteStore::open(&dir.path().join("rules.sqlite")).expect("open db"));
    let a = store.insert_club(club("A")).expect("insert").id;
    let b = store.insert_club(club("B")).expect("insert").id;
    let c = store.insert_club(club("C")).expect("insert").id;
    let d = store.insert_club(club("D")).expect("insert").id;
    let service = MatchService::new(Arc::clone(&store)).with_clock(|| at(2024, 1, 1, 0));

    let kickoff = at(2023, 5, 1, 15);
    let first = service
        .create(request(a, b, kickoff))
        .expect("first match should be admitted");

    let edge = service
        .create(request(c, b, kickoff + Duration::hours(48)))
        .expect_err("edge of the rest window is still inside it");
    assert!(matches!(
        edge.rejection(),
        Some(Rejection::RestWindowConflict { .. })
    ));

    let mut later = request(c, b, kickoff + Duration::hours(48) + Duration::seconds(1));
    later.stadium_name = "Beira-Rio".to_string();
    service
        .create(later)
        .expect("just outside the window should be admitted");

    let clash = service
        .create(request(c, d, kickoff))
        .expect_err("stadium is taken at that instant");
    assert_eq!(
        clash.rejection(),
        Some(Rejection::StadiumBooked {
            conflicting: first.id
        })
    );

    let listed = service.list(&MatchFilter::default()).expect("list");
    assert_eq!(listed.len(), 2);
    assert!(listed[0].kickoff < listed[1].kickoff);
}

#[test]
fn snapshot_reads_sql_totals_in_club_order() {
    let store = Arc::new(SqliteStore::open_in_memory().expect("open db"));
    let a = store.insert_club(club("A")).expect("insert").id;
    let b = store.insert_club(club("B")).expect("insert").id;
    store.insert_club(club("C")).expect("insert");
    let service = MatchService::new(Arc::clone(&store)).with_clock(|| at(2024, 1, 1, 0));
    service
        .create(request(a, b, at(2023, 1, 10, 16)))
        .expect("admit");
    service
        .create(request(b, a, at(2023, 2, 10, 16)))
        .expect("admit");

    let report = service.snapshot().expect("snapshot");
    let totals: Vec<i64> = report.iter().map(|t| t.total_goals).collect();
    assert_eq!(totals, vec![3, 3, 0]);
}

#[test]
fn stadium_names_stay_unique_through_the_service() {
    let store = Arc::new(SqliteStore::open_in_memory().expect("open db"));
    let service = MatchService::new(Arc::clone(&store));
    let arena = service.register_stadium("Arena").expect("first registration");
    let other = service.register_stadium("Olimpico").expect("second registration");

    let dup = service
        .register_stadium("Arena")
        .expect_err("duplicate name must be refused");
    assert!(matches!(dup, ServiceError::NameTaken(ref taken) if taken.name == "Arena"));
    assert!(dup.rejection().is_none());

    let clash = service
        .rename_stadium(other.id, "Arena")
        .expect_err("rename onto a taken name must be refused");
    assert!(matches!(clash, ServiceError::NameTaken(_)));

    let missing = service
        .rename_stadium(arena.id + 100, "Beira-Rio")
        .expect_err("unknown stadium");
    assert!(matches!(
        missing,
        ServiceError::NotFound {
            entity: Entity::Stadium,
            ..
        }
    ));

    let renamed = service
        .rename_stadium(other.id, "Beira-Rio")
        .expect("free name should be accepted");
    assert_eq!(service.get_stadium(other.id).expect("lookup"), renamed);
}
