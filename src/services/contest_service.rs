//! Contest service

use chrono::{DateTime, Utc};

use crate::{
    db::repositories::ContestRepository,
    error::{AppError, AppResult},
    models::{ContestState, ContestWindow, UserRecord},
    state::AppState,
    utils::time::{now_utc, parse_usec},
};

/// Contest service for business logic
pub struct ContestService;

impl ContestService {
    /// Window position of `now` for `user`; never touches the disk
    pub fn status(
        user: &UserRecord,
        dates: Option<(DateTime<Utc>, DateTime<Utc>)>,
        now: DateTime<Utc>,
    ) -> ContestWindow {
        ContestWindow::evaluate(user.ignore_contest_window, dates, now)
    }

    /// Current window position for `user`.
    ///
    /// Unreadable contest dates give [`ContestWindow::Unknown`].
    pub fn window_for(state: &AppState, user: &UserRecord) -> ContestWindow {
        let dates = match ContestRepository::read_dates(state) {
            Ok(dates) => Some(dates),
            Err(e) => {
                tracing::error!(error = %e, "cannot read contest dates");
                None
            }
        };
        Self::status(user, dates, now_utc())
    }

    /// Change one or both dates, keeping the other as stored
    pub fn set_dates(
        state: &AppState,
        open_date: Option<&str>,
        close_date: Option<&str>,
    ) -> AppResult<ContestState> {
        let parse = |label: &str, raw: &str| {
            parse_usec(raw)
                .ok_or_else(|| AppError::InvalidInput(format!("invalid {label} date: {raw:?}")))
        };
        let open = open_date.map(|raw| parse("open", raw)).transpose()?;
        let close = close_date.map(|raw| parse("close", raw)).transpose()?;

        ContestRepository::update_dates(state, open, close)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_app;
    use crate::utils::time::format_usec;

    #[test]
    fn test_window_for_user() {
        let app = test_app();
        let user = UserRecord::new("alice", "h");
        assert_eq!(ContestService::window_for(&app.state, &user), ContestWindow::Open);

        ContestService::set_dates(
            &app.state,
            Some("2020-01-01 00:00:00.000000 UTC"),
            Some("2020-02-01 00:00:00.000000 UTC"),
        )
        .unwrap();
        assert_eq!(ContestService::window_for(&app.state, &user), ContestWindow::Closed);

        let tester = UserRecord {
            ignore_contest_window: true,
            ..user
        };
        assert_eq!(ContestService::window_for(&app.state, &tester), ContestWindow::Open);
    }

    #[test]
    fn test_unreadable_dates_are_unknown() {
        let app = test_app();
        std::fs::write(&app.state.storage().state_file, "[]").unwrap();
        let user = UserRecord::new("alice", "h");
        assert_eq!(
            ContestService::window_for(&app.state, &user).flags(),
            (false, false, false)
        );
    }

    #[test]
    fn test_set_one_date_keeps_other() {
        let app = test_app();
        let before = ContestRepository::read(&app.state).unwrap();

        let after =
            ContestService::set_dates(&app.state, None, Some("2099-12-31 23:59:59.000000 UTC"))
                .unwrap();
        assert_eq!(after.open_date, before.open_date);
        assert_eq!(format_usec(&after.close_date), "2099-12-31 23:59:59.000000 UTC");

        assert!(ContestService::set_dates(&app.state, Some("soon"), None).is_err());
    }
}
