use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::store::{ClubDirectory, MatchStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalTally {
    pub club_name: String,
    pub total_goals: i64,
}

/// Goals scored by every club, in club id order. Reads only.
pub fn run_once<S>(store: &S) -> Result<Vec<GoalTally>>
where
    S: ClubDirectory + MatchStore + Sync + ?Sized,
{
    log::info!("snapshot: computing goal totals per club");
    let clubs = store.all_clubs().context("load clubs for snapshot")?;

    let tallies = clubs
        .par_iter()
        .map(|club| -> Result<GoalTally> {
            let total_goals = store
                .total_goals_for(club.id)
                .with_context(|| format!("sum goals for club {}", club.id))?;
            Ok(GoalTally {
                club_name: club.name.clone(),
                total_goals,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    for tally in &tallies {
        log::info!("snapshot: {} scored {} goals", tally.club_name, tally.total_goals);
    }
    log::info!("snapshot: done ({} clubs)", tallies.len());
    Ok(tallies)
}

/// Recurring snapshot thread. Dropping the handle stops it too.
pub struct SnapshotHandle {
    stop_tx: Option<Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl SnapshotHandle {
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(join) = self.join.take()
            && join.join().is_err()
        {
            log::error!("snapshot: worker thread panicked");
        }
    }
}

impl Drop for SnapshotHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Runs [`run_once`] now and then every `interval` until stopped.
/// `on_tick` receives each successful report.
pub fn spawn<S, F>(store: Arc<S>, interval: Duration, mut on_tick: F) -> Result<SnapshotHandle>
where
    S: ClubDirectory + MatchStore + Send + Sync + 'static,
    F: FnMut(Vec<GoalTally>) + Send + 'static,
{
    let (stop_tx, stop_rx) = mpsc::channel::<()>();
    let join = thread::Builder::new()
        .name("snapshot".to_string())
        .spawn(move || {
            log::info!("snapshot: scheduled every {}s", interval.as_secs_f64());
            loop {
                match run_once(store.as_ref()) {
                    Ok(report) => on_tick(report),
                    Err(err) => log::warn!("snapshot: run failed: {err:#}"),
                }
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            log::info!("snapshot: stopped");
        })
        .context("spawn snapshot thread")?;

    Ok(SnapshotHandle {
        stop_tx: Some(stop_tx),
        join: Some(join),
    })
}
