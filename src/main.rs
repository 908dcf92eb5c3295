use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use env_logger::Env;
use serde::Serialize;

use matchbook::config;
use matchbook::model::{ClubId, FieldRole};
use matchbook::service::MatchService;
use matchbook::snapshot;
use matchbook::sqlite_store::SqliteStore;

const USAGE: &str = "usage: matchbook [--db <path>] <command>
  rank <criterion> [--blowouts] [--role home|away|either]
  retro <club-id> [--role ..] [--blowouts] [--by-opponent]
  h2h <club-id> <club-id>
  compare <id,id,...>
  snapshot
  watch";

// Flags that consume the following argument.
const VALUE_FLAGS: &[&str] = &["--db", "--role"];

fn main() -> Result<()> {
    let settings = config::settings();
    env_logger::Builder::from_env(Env::default().default_filter_or(settings.log_filter.as_str()))
        .init();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let db_path = flag_value(&args, "--db")
        .map(PathBuf::from)
        .or_else(|| settings.db_path.clone())
        .context("unable to resolve sqlite path")?;
    let positional = positional_args(&args);
    let Some(command) = positional.first() else {
        return Err(anyhow!(USAGE));
    };

    let store = Arc::new(SqliteStore::open(&db_path)?);
    log::debug!("using db {}", db_path.display());
    let service = MatchService::new(Arc::clone(&store));

    let role = match flag_value(&args, "--role") {
        Some(raw) => raw.parse::<FieldRole>().map_err(|err| anyhow!(err))?,
        None => FieldRole::Either,
    };
    let blowouts = has_flag(&args, "--blowouts");

    match command.as_str() {
        "rank" => {
            let criterion = positional.get(1).context("rank needs a criterion")?;
            print_json(&service.ranking(criterion, blowouts, role)?)
        }
        "retro" => {
            let club = parse_id(positional.get(1).context("retro needs a club id")?)?;
            if has_flag(&args, "--by-opponent") {
                print_json(&service.club_retro_by_opponent(club, role)?)
            } else if blowouts {
                print_json(&service.club_retro_blowouts(club, role)?)
            } else {
                print_json(&service.club_retro(club, role)?)
            }
        }
        "h2h" => {
            let a = parse_id(positional.get(1).context("h2h needs two club ids")?)?;
            let b = parse_id(positional.get(2).context("h2h needs two club ids")?)?;
            print_json(&service.head_to_head(a, b)?)
        }
        "compare" => {
            let raw = positional.get(1).context("compare needs a list of club ids")?;
            let ids = parse_ids(raw)?;
            print_json(&service.compare_clubs(&ids)?)
        }
        "snapshot" => print_json(&service.snapshot()?),
        "watch" => watch(store, settings),
        other => Err(anyhow!("unknown command '{other}'\n{USAGE}")),
    }
}

fn watch(store: Arc<SqliteStore>, settings: &config::Settings) -> Result<()> {
    let handle = snapshot::spawn(store, settings.snapshot_interval, |report| {
        if let Err(err) = print_json(&report) {
            log::warn!("snapshot: unable to print report: {err:#}");
        }
    })?;
    eprintln!("watching; press Enter to stop");
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line).ok();
    handle.stop();
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("serialize output")?;
    println!("{text}");
    Ok(())
}

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    let prefix = format!("{flag}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(value) = arg.strip_prefix(&prefix) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == flag
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            return Some(next.trim().to_string());
        }
    }
    None
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|arg| arg == flag)
}

fn positional_args(args: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    let mut skip_next = false;
    for arg in args {
        if skip_next {
            skip_next = false;
            continue;
        }
        if VALUE_FLAGS.contains(&arg.as_str()) {
            skip_next = true;
            continue;
        }
        if arg.starts_with("--") {
            continue;
        }
        out.push(arg.clone());
    }
    out
}

fn parse_id(raw: &str) -> Result<ClubId> {
    raw.trim()
        .parse::<ClubId>()
        .with_context(|| format!("invalid club id '{raw}'"))
}

fn parse_ids(raw: &str) -> Result<Vec<ClubId>> {
    let ids = raw
        .split([',', ';', ' '])
        .filter(|part| !part.trim().is_empty())
        .map(parse_id)
        .collect::<Result<Vec<_>>>()?;
    if ids.is_empty() {
        return Err(anyhow!("no club ids given"));
    }
    Ok(ids)
}
