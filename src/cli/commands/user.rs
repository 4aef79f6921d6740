use std::path::Path;

use crate::db::repositories::UserRepository;
use crate::error::AppError;
use crate::models::UserRecord;
use crate::services::{AccountChanges, CreatedUser, UserService};
use crate::state::AppState;
use crate::utils::time::{format_usec, now_utc};

fn report_created(created: &CreatedUser) {
    println!("added username: {}", created.user.username);
    if let Some(password) = &created.generated_password {
        println!("notice: password: {password}");
    }
}

/// Add a new user
pub fn cmd_user_add(state: &AppState, username: &str, changes: AccountChanges) -> u8 {
    match UserService::add_user(state, username, changes) {
        Ok(created) => {
            report_created(&created);
            0
        }
        Err(e @ AppError::AlreadyExists(_)) => {
            println!("add failed: {e}");
            5
        }
        Err(e) => {
            println!("add username: {username} failed: {e}");
            6
        }
    }
}

/// Update an existing user
pub fn cmd_user_update(state: &AppState, username: &str, changes: AccountChanges) -> u8 {
    let changed_password = changes.password.is_some();
    match UserService::update_user(state, username, changes) {
        Ok(_) if changed_password => {
            println!("changed password for username: {username}");
            0
        }
        Ok(_) => {
            println!("changed details for username: {username}");
            0
        }
        Err(e) => {
            println!("failed to change details for username: {username}: {e}");
            8
        }
    }
}

/// Delete a user
pub fn cmd_user_delete(state: &AppState, username: &str) -> u8 {
    match UserService::delete_user(state, username) {
        Ok(_) => {
            println!("deleted username: {username}");
            0
        }
        Err(e @ AppError::NotFound(_)) => {
            println!("{e}");
            9
        }
        Err(e) => {
            println!("failed to delete username: {username}: {e}");
            10
        }
    }
}

/// Add a user named by a random UUID
pub fn cmd_user_uuid(state: &AppState, changes: AccountChanges) -> u8 {
    match UserService::add_uuid_user(state, changes) {
        Ok(created) => {
            report_created(&created);
            0
        }
        Err(e @ AppError::AlreadyExists(_)) => {
            println!("{e}");
            12
        }
        Err(e) => {
            println!("add of UUID user failed: {e}");
            13
        }
    }
}

/// List all users
pub fn cmd_user_list(state: &AppState) -> u8 {
    let users = match UserRepository::list(state) {
        Ok(users) => users,
        Err(e) => {
            eprintln!("cannot read password file: {e}");
            return 4;
        }
    };

    if users.is_empty() {
        println!("No users.");
        return 0;
    }

    println!("{:<40} {:<30} {:<6} {:<8} {}", "USERNAME", "EMAIL", "LOGIN", "IGNORE", "CHANGE BY");
    for user in users {
        println!(
            "{:<40} {:<30} {:<6} {:<8} {}",
            user.username,
            user.email.as_deref().unwrap_or("-"),
            if user.login_disabled { "no" } else { "yes" },
            if user.ignore_contest_window { "yes" } else { "no" },
            user.password_change_deadline
                .as_ref()
                .map(format_usec)
                .unwrap_or_else(|| "-".to_string()),
        );
    }
    0
}

/// Copy the password file
pub fn cmd_user_copy(state: &AppState, dest: &Path) -> u8 {
    match UserRepository::export_copy(state, dest) {
        Ok(()) => {
            println!("copied password file to {}", dest.display());
            0
        }
        Err(e) => {
            eprintln!("copy failed: {e}");
            4
        }
    }
}

/// Report accounts whose forced password change is overdue.
///
/// Without arguments every account is examined; otherwise each argument is
/// an e-mail address, or a username when `by_username` is set.
pub fn cmd_user_expired(
    state: &AppState,
    args: &[String],
    by_username: bool,
    shown: (bool, bool),
) -> u8 {
    let now = now_utc();

    if args.is_empty() {
        let expired = match UserService::expired_users(state, now) {
            Ok(users) => users,
            Err(e) => {
                eprintln!("failed to load the password file: {e}");
                return 5;
            }
        };
        for user in &expired {
            print!("{}", expired_report(user, shown));
        }
        return 0;
    }

    let mut code = 0;
    for arg in args {
        let user = match UserService::find_account(state, arg, by_username) {
            Ok(user) => user,
            Err(e) => {
                eprintln!("{e}");
                code = 1;
                continue;
            }
        };
        if by_username && user.email.is_none() {
            eprintln!("no registered email address for username: {}", user.username);
            code = 1;
            continue;
        }
        if !UserService::is_expired(&user, now) {
            tracing::debug!(username = %user.username, "password not expired");
            continue;
        }
        print!("{}", expired_report(&user, shown));
    }
    code
}

/// Print `<email> <username>` for accounts.
///
/// Without arguments every account with an address is printed; `zero` also
/// prints accounts without one, showing `None`.
pub fn cmd_user_email(
    state: &AppState,
    args: &[String],
    by_username: bool,
    shown: (bool, bool),
    zero: bool,
    comma: bool,
) -> u8 {
    if args.is_empty() {
        let users = match UserRepository::list(state) {
            Ok(users) => users,
            Err(e) => {
                eprintln!("failed to load the password file: {e}");
                return 5;
            }
        };
        for user in users.iter().filter(|u| zero || u.email.is_some()) {
            if let Some(line) = email_line(user, shown, comma) {
                println!("{line}");
            }
        }
        return 0;
    }

    let mut code = 0;
    for arg in args {
        let user = match UserService::find_account(state, arg, by_username) {
            Ok(user) => user,
            Err(e) => {
                eprintln!("{e}");
                code = 1;
                continue;
            }
        };
        if !zero && user.email.is_none() {
            eprintln!("no registered email address for username: {}", user.username);
            code = 1;
            continue;
        }
        if let Some(line) = email_line(&user, shown, comma) {
            println!("{line}");
        }
    }
    code
}

fn email_line(user: &UserRecord, (email, username): (bool, bool), comma: bool) -> Option<String> {
    let address = user.email.as_deref().unwrap_or("None");
    match (email, username) {
        (true, true) if comma => Some(format!("{address},{}", user.username)),
        (true, true) => Some(format!("{address}\t{}", user.username)),
        (true, false) => Some(address.to_string()),
        (false, true) => Some(user.username.clone()),
        (false, false) => None,
    }
}

fn expired_report(user: &UserRecord, (email, username): (bool, bool)) -> String {
    let deadline = user
        .password_change_deadline
        .as_ref()
        .map(format_usec)
        .unwrap_or_else(|| "None".to_string());

    let mut report = format!("# password expired for {} on {deadline}\n", user.username);
    if email {
        report.push_str(&format!(
            "\n  # remove from mailing list and email file: {}\n",
            user.email.as_deref().unwrap_or("None")
        ));
    }
    if username {
        report.push_str(&format!("\n  submit-portal user delete '{}'\n", user.username));
    }
    report.push('\n');
    report
}
