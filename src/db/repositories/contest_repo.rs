//! Contest repository

use chrono::{DateTime, Utc};

use crate::db::codec::{read_json, seed_from_template, write_json};
use crate::db::lock::LockGuard;
use crate::error::{AppError, AppResult};
use crate::models::ContestState;
use crate::state::AppState;
use crate::utils::time::parse_usec;

/// Repository for the contest state file
pub struct ContestRepository;

impl ContestRepository {
    /// Read the contest state, seeding it from the template if needed
    pub fn read(state: &AppState) -> AppResult<ContestState> {
        let guard = state.locks().acquire(&state.storage().state_lock)?;
        Self::read_locked(state, &guard)
    }

    /// Open and close dates
    pub fn read_dates(state: &AppState) -> AppResult<(DateTime<Utc>, DateTime<Utc>)> {
        let contest = Self::read(state)?;
        Ok((contest.open_date, contest.close_date))
    }

    /// Replace both dates; each must be in the record timestamp layout
    pub fn write(state: &AppState, open_date: &str, close_date: &str) -> AppResult<ContestState> {
        let open = parse_usec(open_date)
            .ok_or_else(|| AppError::InvalidInput(format!("invalid open date: {open_date:?}")))?;
        let close = parse_usec(close_date)
            .ok_or_else(|| AppError::InvalidInput(format!("invalid close date: {close_date:?}")))?;
        Self::write_dates(state, open, close)
    }

    /// Replace both dates
    pub fn write_dates(
        state: &AppState,
        open_date: DateTime<Utc>,
        close_date: DateTime<Utc>,
    ) -> AppResult<ContestState> {
        let guard = state.locks().acquire(&state.storage().state_lock)?;
        Self::write_locked(state, &guard, ContestState::new(open_date, close_date))
    }

    /// Replace one or both dates; the other keeps its stored value.
    ///
    /// Read and write happen under one lock, so a concurrent writer is never
    /// overwritten with stale dates.
    pub fn update_dates(
        state: &AppState,
        open_date: Option<DateTime<Utc>>,
        close_date: Option<DateTime<Utc>>,
    ) -> AppResult<ContestState> {
        let guard = state.locks().acquire(&state.storage().state_lock)?;
        let current = Self::read_locked(state, &guard)?;
        if open_date.is_none() && close_date.is_none() {
            return Ok(current);
        }

        let open = open_date.unwrap_or(current.open_date);
        let close = close_date.unwrap_or(current.close_date);
        if open >= close {
            tracing::warn!(%open, %close, "contest opens at or after it closes");
        }
        Self::write_locked(state, &guard, ContestState::new(open, close))
    }

    pub(crate) fn read_locked(state: &AppState, _guard: &LockGuard) -> AppResult<ContestState> {
        let storage = state.storage();
        seed_from_template(&storage.state_file, &storage.init_state_file)?;

        let contest: ContestState = read_json(&storage.state_file)?;
        contest
            .validate()
            .map_err(|reason| AppError::corrupt(&storage.state_file, reason))?;
        Ok(contest)
    }

    pub(crate) fn write_locked(
        state: &AppState,
        _guard: &LockGuard,
        contest: ContestState,
    ) -> AppResult<ContestState> {
        write_json(&state.storage().state_file, &contest)?;
        tracing::info!(
            open = %contest.open_date,
            close = %contest.close_date,
            "contest dates updated"
        );
        Ok(contest)
    }
}
