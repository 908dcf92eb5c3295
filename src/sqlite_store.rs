use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result, anyhow};
use chrono::{NaiveDate, NaiveDateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};

use crate::error::StadiumNameTaken;
use crate::model::{Club, ClubId, FieldRole, Match, MatchDraft, MatchId, NewClub, Stadium, StadiumId};
use crate::store::{ClubDirectory, MatchStore, StadiumDirectory};

// Fixed-width fraction keeps text order equal to time order.
const KICKOFF_WRITE_FMT: &str = "%Y-%m-%dT%H:%M:%S%.9f";
const KICKOFF_READ_FMT: &str = "%Y-%m-%dT%H:%M:%S%.f";
const DATE_FMT: &str = "%Y-%m-%d";

const MATCH_COLUMNS: &str =
    "match_id, home_club_id, away_club_id, home_goals, away_goals, stadium_name, kickoff";
const CLUB_COLUMNS: &str = "club_id, name, state_code, founded_on, active";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::from_connection(open_db(path)?))
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory sqlite db")?;
        init_schema(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("sqlite connection lock poisoned"))
    }

    fn query_matches(&self, sql: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Vec<Match>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql).context("prepare match query")?;
        let rows = stmt
            .query_map(args, match_from_row)
            .context("query matches")?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row.context("decode match row")?);
        }
        Ok(out)
    }
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS clubs (
            club_id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            state_code TEXT NOT NULL,
            founded_on TEXT NOT NULL,
            active INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS stadiums (
            stadium_id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS matches (
            match_id INTEGER PRIMARY KEY AUTOINCREMENT,
            home_club_id INTEGER NOT NULL REFERENCES clubs(club_id),
            away_club_id INTEGER NOT NULL REFERENCES clubs(club_id),
            home_goals INTEGER NOT NULL,
            away_goals INTEGER NOT NULL,
            score TEXT NOT NULL,
            stadium_name TEXT NOT NULL,
            kickoff TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_matches_kickoff ON matches(kickoff);
        CREATE INDEX IF NOT EXISTS idx_matches_stadium ON matches(stadium_name, kickoff);
        CREATE INDEX IF NOT EXISTS idx_matches_home ON matches(home_club_id);
        CREATE INDEX IF NOT EXISTS idx_matches_away ON matches(away_club_id);
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

fn kickoff_text(kickoff: NaiveDateTime) -> String {
    kickoff.format(KICKOFF_WRITE_FMT).to_string()
}

fn conversion_error(idx: usize, err: chrono::ParseError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn match_from_row(row: &Row<'_>) -> rusqlite::Result<Match> {
    let kickoff: String = row.get(6)?;
    Ok(Match {
        id: row.get::<_, u64>(0)?,
        home_club: row.get::<_, u64>(1)?,
        away_club: row.get::<_, u64>(2)?,
        home_goals: row.get(3)?,
        away_goals: row.get(4)?,
        stadium_name: row.get(5)?,
        kickoff: NaiveDateTime::parse_from_str(&kickoff, KICKOFF_READ_FMT)
            .map_err(|err| conversion_error(6, err))?,
    })
}

fn club_from_row(row: &Row<'_>) -> rusqlite::Result<Club> {
    let founded_on: String = row.get(3)?;
    Ok(Club {
        id: row.get::<_, u64>(0)?,
        name: row.get(1)?,
        state_code: row.get(2)?,
        founded_on: NaiveDate::parse_from_str(&founded_on, DATE_FMT)
            .map_err(|err| conversion_error(3, err))?,
        active: row.get::<_, i64>(4)? != 0,
    })
}

fn bool_to_i64(v: bool) -> i64 {
    if v { 1 } else { 0 }
}

impl ClubDirectory for SqliteStore {
    fn find_club(&self, id: ClubId) -> Result<Option<Club>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {CLUB_COLUMNS} FROM clubs WHERE club_id = ?1"),
            params![id as i64],
            club_from_row,
        )
        .optional()
        .context("query club by id")
    }

    fn find_clubs(&self, ids: &[ClubId]) -> Result<Vec<Club>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {CLUB_COLUMNS} FROM clubs WHERE club_id IN ({placeholders}) ORDER BY club_id"
            ))
            .context("prepare clubs by ids query")?;
        let rows = stmt
            .query_map(params_from_iter(ids.iter().map(|id| *id as i64)), club_from_row)
            .context("query clubs by ids")?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.context("decode club row")?);
        }
        Ok(out)
    }

    fn all_clubs(&self) -> Result<Vec<Club>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!("SELECT {CLUB_COLUMNS} FROM clubs ORDER BY club_id"))
            .context("prepare all clubs query")?;
        let rows = stmt.query_map([], club_from_row).context("query all clubs")?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.context("decode club row")?);
        }
        Ok(out)
    }

    fn insert_club(&self, club: NewClub) -> Result<Club> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO clubs(name, state_code, founded_on, active) VALUES (?1, ?2, ?3, ?4)",
            params![
                club.name,
                club.state_code,
                club.founded_on.format(DATE_FMT).to_string(),
                bool_to_i64(club.active),
            ],
        )
        .context("insert club")?;
        let id = conn.last_insert_rowid() as u64;
        Ok(Club {
            id,
            name: club.name,
            state_code: club.state_code,
            founded_on: club.founded_on,
            active: club.active,
        })
    }

    fn deactivate_club(&self, id: ClubId) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "UPDATE clubs SET active = 0 WHERE club_id = ?1",
                params![id as i64],
            )
            .context("deactivate club")?;
        Ok(changed > 0)
    }
}

impl StadiumDirectory for SqliteStore {
    fn find_stadium(&self, id: StadiumId) -> Result<Option<Stadium>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT stadium_id, name FROM stadiums WHERE stadium_id = ?1",
            params![id as i64],
            |row| {
                Ok(Stadium {
                    id: row.get::<_, u64>(0)?,
                    name: row.get(1)?,
                })
            },
        )
        .optional()
        .context("query stadium by id")
    }

    fn stadium_name_taken(&self, name: &str, except: Option<StadiumId>) -> Result<bool> {
        let conn = self.conn()?;
        name_taken(&conn, name, except)
    }

    fn insert_stadium(&self, name: &str) -> Result<Stadium> {
        let conn = self.conn()?;
        if name_taken(&conn, name, None)? {
            return Err(StadiumNameTaken {
                name: name.to_string(),
            }
            .into());
        }
        conn.execute("INSERT INTO stadiums(name) VALUES (?1)", params![name])
            .with_context(|| format!("insert stadium '{name}'"))?;
        Ok(Stadium {
            id: conn.last_insert_rowid() as u64,
            name: name.to_string(),
        })
    }

    fn rename_stadium(&self, id: StadiumId, name: &str) -> Result<Option<Stadium>> {
        let conn = self.conn()?;
        if name_taken(&conn, name, Some(id))? {
            return Err(StadiumNameTaken {
                name: name.to_string(),
            }
            .into());
        }
        let changed = conn
            .execute(
                "UPDATE stadiums SET name = ?1 WHERE stadium_id = ?2",
                params![name, id as i64],
            )
            .with_context(|| format!("rename stadium {id}"))?;
        if changed == 0 {
            return Ok(None);
        }
        Ok(Some(Stadium {
            id,
            name: name.to_string(),
        }))
    }
}

fn name_taken(conn: &Connection, name: &str, except: Option<StadiumId>) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM stadiums WHERE name = ?1 AND (?2 IS NULL OR stadium_id <> ?2)",
            params![name, except.map(|id| id as i64)],
            |row| row.get(0),
        )
        .context("check stadium name")?;
    Ok(count > 0)
}

impl MatchStore for SqliteStore {
    fn find_match(&self, id: MatchId) -> Result<Option<Match>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {MATCH_COLUMNS} FROM matches WHERE match_id = ?1"),
            params![id as i64],
            match_from_row,
        )
        .optional()
        .context("query match by id")
    }

    fn matches_in_window(
        &self,
        club_a: ClubId,
        club_b: ClubId,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<Match>> {
        self.query_matches(
            &format!(
                "SELECT {MATCH_COLUMNS} FROM matches
                 WHERE (home_club_id IN (?1, ?2) OR away_club_id IN (?1, ?2))
                   AND kickoff BETWEEN ?3 AND ?4
                 ORDER BY kickoff ASC, match_id ASC"
            ),
            params![club_a as i64, club_b as i64, kickoff_text(start), kickoff_text(end)],
        )
    }

    fn matches_at(&self, stadium_name: &str, kickoff: NaiveDateTime) -> Result<Vec<Match>> {
        self.query_matches(
            &format!(
                "SELECT {MATCH_COLUMNS} FROM matches
                 WHERE stadium_name = ?1 AND kickoff = ?2
                 ORDER BY match_id ASC"
            ),
            params![stadium_name, kickoff_text(kickoff)],
        )
    }

    fn matches_involving(&self, club: ClubId, role: FieldRole) -> Result<Vec<Match>> {
        let filter = match role {
            FieldRole::Home => "home_club_id = ?1",
            FieldRole::Away => "away_club_id = ?1",
            FieldRole::Either => "(home_club_id = ?1 OR away_club_id = ?1)",
        };
        self.query_matches(
            &format!(
                "SELECT {MATCH_COLUMNS} FROM matches WHERE {filter} ORDER BY kickoff ASC, match_id ASC"
            ),
            params![club as i64],
        )
    }

    fn matches_involving_any(&self, clubs: &[ClubId]) -> Result<Vec<Match>> {
        if clubs.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; clubs.len()].join(", ");
        let ids: Vec<i64> = clubs.iter().map(|id| *id as i64).collect();
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {MATCH_COLUMNS} FROM matches
                 WHERE home_club_id IN ({placeholders}) OR away_club_id IN ({placeholders})
                 ORDER BY kickoff ASC, match_id ASC"
            ))
            .context("prepare matches by clubs query")?;
        let rows = stmt
            .query_map(params_from_iter(ids.iter().chain(ids.iter())), match_from_row)
            .context("query matches by clubs")?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.context("decode match row")?);
        }
        Ok(out)
    }

    fn head_to_head_matches(&self, club_a: ClubId, club_b: ClubId) -> Result<Vec<Match>> {
        self.query_matches(
            &format!(
                "SELECT {MATCH_COLUMNS} FROM matches
                 WHERE (home_club_id = ?1 AND away_club_id = ?2)
                    OR (home_club_id = ?2 AND away_club_id = ?1)
                 ORDER BY kickoff ASC, match_id ASC"
            ),
            params![club_a as i64, club_b as i64],
        )
    }

    fn all_matches(&self) -> Result<Vec<Match>> {
        self.query_matches(
            &format!("SELECT {MATCH_COLUMNS} FROM matches ORDER BY kickoff ASC, match_id ASC"),
            params![],
        )
    }

    fn save_match(&self, id: Option<MatchId>, draft: MatchDraft) -> Result<Match> {
        let conn = self.conn()?;
        let score = crate::model::format_score(draft.home_goals, draft.away_goals);
        let updated_at = Utc::now().to_rfc3339();
        let id = match id {
            Some(id) => {
                let changed = conn
                    .execute(
                        "UPDATE matches
                         SET home_club_id = ?1, away_club_id = ?2, home_goals = ?3, away_goals = ?4,
                             score = ?5, stadium_name = ?6, kickoff = ?7, updated_at = ?8
                         WHERE match_id = ?9",
                        params![
                            draft.home_club as i64,
                            draft.away_club as i64,
                            draft.home_goals,
                            draft.away_goals,
                            score,
                            draft.stadium_name,
                            kickoff_text(draft.kickoff),
                            updated_at,
                            id as i64,
                        ],
                    )
                    .context("update match")?;
                if changed == 0 {
                    return Err(anyhow!("cannot overwrite missing match {id}"));
                }
                id
            }
            None => {
                conn.execute(
                    "INSERT INTO matches(home_club_id, away_club_id, home_goals, away_goals,
                                         score, stadium_name, kickoff, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        draft.home_club as i64,
                        draft.away_club as i64,
                        draft.home_goals,
                        draft.away_goals,
                        score,
                        draft.stadium_name,
                        kickoff_text(draft.kickoff),
                        updated_at,
                    ],
                )
                .context("insert match")?;
                conn.last_insert_rowid() as u64
            }
        };
        Ok(draft.into_match(id))
    }

    fn delete_match(&self, id: MatchId) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn
            .execute("DELETE FROM matches WHERE match_id = ?1", params![id as i64])
            .context("delete match")?;
        Ok(changed > 0)
    }

    fn total_goals_for(&self, club: ClubId) -> Result<i64> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT COALESCE(SUM(
                 CASE WHEN home_club_id = ?1 THEN home_goals ELSE 0 END +
                 CASE WHEN away_club_id = ?1 THEN away_goals ELSE 0 END
             ), 0)
             FROM matches
             WHERE home_club_id = ?1 OR away_club_id = ?1",
            params![club as i64],
            |row| row.get::<_, i64>(0),
        )
        .context("sum club goals")
    }
}
