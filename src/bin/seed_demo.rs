use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};
use env_logger::Env;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use matchbook::config;
use matchbook::error::ServiceError;
use matchbook::model::{ClubId, NewClub};
use matchbook::service::{MatchRequest, MatchService, local_now};
use matchbook::sqlite_store::SqliteStore;
use matchbook::store::{ClubDirectory, MatchStore, StadiumDirectory};

const DEMO_CLUBS: &[(&str, &str, i32)] = &[
    ("Bahia", "BA", 1931),
    ("Vitoria", "BA", 1899),
    ("Sport", "PE", 1905),
    ("Nautico", "PE", 1901),
    ("Coritiba", "PR", 1909),
    ("Athletico", "PR", 1924),
    ("Gremio", "RS", 1903),
    ("Internacional", "RS", 1909),
];

const DEMO_STADIUMS: &[&str] = &[
    "Fonte Nova",
    "Barradao",
    "Ilha do Retiro",
    "Aflitos",
    "Couto Pereira",
    "Baixada",
    "Arena do Gremio",
    "Beira-Rio",
];

const DEFAULT_MATCHES: usize = 200;
const HISTORY_DAYS: i64 = 3 * 365;

fn main() -> Result<()> {
    let settings = config::settings();
    env_logger::Builder::from_env(Env::default().default_filter_or(settings.log_filter.as_str()))
        .init();

    let db_path = parse_arg("--db")
        .map(PathBuf::from)
        .or_else(|| settings.db_path.clone())
        .context("unable to resolve sqlite path")?;
    let match_count = parse_arg("--matches")
        .and_then(|raw| raw.parse::<usize>().ok())
        .unwrap_or(DEFAULT_MATCHES);
    let mut rng = match parse_arg("--seed").and_then(|raw| raw.parse::<u64>().ok()) {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let store = Arc::new(SqliteStore::open(&db_path)?);
    let service = MatchService::new(store);

    let club_ids = seed_clubs(&service)?;
    seed_stadiums(&service)?;

    let now = local_now();
    let mut admitted = 0usize;
    let mut rejected = 0usize;
    for _ in 0..match_count {
        let home = rng.gen_range(0..club_ids.len());
        let mut away = rng.gen_range(0..club_ids.len() - 1);
        if away >= home {
            away += 1;
        }
        let kickoff = now
            - Duration::days(rng.gen_range(1..HISTORY_DAYS))
            - Duration::hours(rng.gen_range(0..24));
        let request = MatchRequest {
            home_club_id: club_ids[home],
            away_club_id: club_ids[away],
            home_goals: rng.gen_range(0..6),
            away_goals: rng.gen_range(0..5),
            score: None,
            stadium_name: DEMO_STADIUMS[home % DEMO_STADIUMS.len()].to_string(),
            kickoff,
        };
        match service.create(request) {
            Ok(_) => admitted += 1,
            Err(err) if err.rejection().is_some() => rejected += 1,
            Err(err) => return Err(err.into()),
        }
    }

    println!("Demo seed complete");
    println!("DB: {}", db_path.display());
    println!("Clubs: {}", club_ids.len());
    println!("Matches admitted: {admitted}");
    println!("Matches rejected: {rejected}");
    Ok(())
}

/// Registers the demo clubs, reusing any already present under the same name.
fn seed_clubs<S>(service: &MatchService<S>) -> Result<Vec<ClubId>>
where
    S: ClubDirectory + StadiumDirectory + MatchStore,
{
    let existing: HashMap<String, ClubId> = service
        .clubs()?
        .into_iter()
        .map(|club| (club.name, club.id))
        .collect();
    let mut club_ids = Vec::new();
    for (name, state_code, year) in DEMO_CLUBS {
        if let Some(id) = existing.get(*name) {
            log::debug!("club {name} already seeded as {id}");
            club_ids.push(*id);
            continue;
        }
        let founded_on = NaiveDate::from_ymd_opt(*year, 1, 1)
            .with_context(|| format!("bad founding year for {name}"))?;
        let club = service.register_club(NewClub {
            name: name.to_string(),
            state_code: state_code.to_string(),
            founded_on,
            active: true,
        })?;
        club_ids.push(club.id);
    }
    Ok(club_ids)
}

fn seed_stadiums<S>(service: &MatchService<S>) -> Result<()>
where
    S: ClubDirectory + StadiumDirectory + MatchStore,
{
    for name in DEMO_STADIUMS {
        match service.register_stadium(name) {
            Ok(_) => {}
            Err(ServiceError::NameTaken(_)) => log::debug!("stadium {name} already registered"),
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

fn parse_arg(flag: &str) -> Option<String> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let prefix = format!("{flag}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(value) = arg.strip_prefix(&prefix)
            && !value.trim().is_empty()
        {
            return Some(value.trim().to_string());
        }
        if arg == flag
            && let Some(next) = args.get(idx + 1)
        {
            return Some(next.trim().to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use matchbook::store::MemoryStore;

    use super::*;

    #[test]
    fn seeding_twice_reuses_clubs_and_stadiums() {
        let service = MatchService::new(Arc::new(MemoryStore::new()));
        let first = seed_clubs(&service).unwrap();
        seed_stadiums(&service).unwrap();

        let second = seed_clubs(&service).unwrap();
        seed_stadiums(&service).unwrap();

        assert_eq!(first, second);
        assert_eq!(service.clubs().unwrap().len(), DEMO_CLUBS.len());
    }
}
