//! Scratch installations for unit tests

use std::time::Duration;

use chrono::Duration as ChronoDuration;
use tempfile::TempDir;

use crate::config::{Config, LockConfig};
use crate::db::codec::write_json;
use crate::db::ensure_dir;
use crate::db::repositories::UserRepository;
use crate::models::{ContestState, UserRecord};
use crate::state::AppState;
use crate::utils::time::now_utc;

pub(crate) struct TestApp {
    pub dir: TempDir,
    pub state: AppState,
}

/// Fresh appdir with seed templates and short lock timeouts.
///
/// The contest window opened yesterday and closes in thirty days.
pub(crate) fn test_app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::with_appdir(dir.path());
    config.lock = LockConfig {
        timeout: Duration::from_millis(100),
        poll_min: Duration::from_millis(5),
        poll_max: Duration::from_millis(10),
    };

    ensure_dir(&config.storage.appdir.join("etc")).unwrap();
    write_json(&config.storage.init_pw_file, &serde_json::json!([])).unwrap();

    let now = now_utc();
    let window = ContestState::new(now - ChronoDuration::days(1), now + ChronoDuration::days(30));
    write_json(&config.storage.init_state_file, &window).unwrap();

    TestApp {
        dir,
        state: AppState::new(config),
    }
}

impl TestApp {
    /// Independent context over the same files, as another process would be
    pub fn other_process(&self) -> AppState {
        AppState::new(self.state.config().clone())
    }

    /// Store a user with a placeholder hash
    pub fn add_user(&self, username: &str) -> UserRecord {
        let user = UserRecord::new(username, "$argon2id$placeholder");
        UserRepository::upsert(&self.state, &user).unwrap();
        user
    }
}
