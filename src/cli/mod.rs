//! CLI module - Command-line interface for the submit portal
//!
//! This module provides a structured CLI using clap for argument parsing.

mod commands;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::services::AccountChanges;

/// Submit portal - account, contest date and slot administration
#[derive(Parser)]
#[command(name = "submit-portal")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Application directory (def: $SUBMIT_APPDIR or /var/submit-portal)
    #[arg(short = 't', long, global = true, value_name = "APPDIR")]
    pub topdir: Option<PathBuf>,

    /// Log destination
    #[arg(short = 'l', long, global = true, value_enum, default_value_t = LogTarget::Stderr)]
    pub log: LogTarget,

    /// Log level or filter directive (RUST_LOG wins when set)
    #[arg(short = 'L', long, global = true, default_value = "info")]
    pub level: String,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where log output goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogTarget {
    /// Human readable lines on stderr
    Stderr,
    /// JSON lines on stderr
    Json,
    /// No logging
    None,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage user accounts
    User {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Show or change the contest open and close dates
    Date {
        /// New open date, "YYYY-MM-DD HH:MM:SS.ffffff UTC"
        #[arg(short = 's', long)]
        start: Option<String>,
        /// New close date, "YYYY-MM-DD HH:MM:SS.ffffff UTC"
        #[arg(short = 'S', long)]
        stop: Option<String>,
    },

    /// Change the status text of a user's slot
    SlotStatus {
        /// Username owning the slot
        username: String,
        /// Slot number
        slot_num: String,
        /// New status text
        status: String,
        /// Also mark the submit file as collected
        #[arg(short = 'c', long)]
        collected: bool,
        /// Only change the slot while it still holds this submit file
        #[arg(short = 'f', long, value_name = "SUBMIT_FILE")]
        if_submit: Option<String>,
    },

    /// Move the submit file of one slot into the staging directory
    Stage {
        /// Slot directory, `users/<username>/<slot>` (relative to the appdir)
        slot_path: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Add a new user
    #[command(alias = "a")]
    Add {
        username: String,
        #[command(flatten)]
        account: AccountArgs,
    },
    /// Update an existing user
    #[command(alias = "u")]
    Update {
        username: String,
        #[command(flatten)]
        account: AccountArgs,
    },
    /// Delete a user
    #[command(alias = "rm", alias = "d")]
    Delete { username: String },
    /// Add a user named by a random UUID
    Uuid {
        #[command(flatten)]
        account: AccountArgs,
    },
    /// List all users
    #[command(alias = "ls")]
    List,
    /// Copy the password file while it is locked
    #[command(alias = "cp")]
    Copy { dest: PathBuf },
    /// Report accounts that missed their forced password change deadline
    Expired {
        /// E-mail addresses, or usernames with -u (def: every account)
        args: Vec<String>,
        /// Arguments are usernames
        #[arg(short = 'u', long)]
        username_args: bool,
        /// Leave out e-mail and/or username lines
        #[arg(short = 's', long, value_enum)]
        silence: Option<Silence>,
    },
    /// Print the e-mail address and username of accounts
    Email {
        /// E-mail addresses, or usernames with -u (def: every account)
        args: Vec<String>,
        /// Arguments are usernames
        #[arg(short = 'u', long)]
        username_args: bool,
        /// Leave out the e-mail address and/or the username
        #[arg(short = 's', long, value_enum)]
        silence: Option<Silence>,
        /// Print None for accounts without an address instead of skipping them
        #[arg(short = '0', long)]
        zero: bool,
        /// Separate the fields with a comma instead of a tab
        #[arg(short = 'c', long)]
        comma: bool,
    },
}

/// Fields left out of account reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Silence {
    /// E-mail address
    E,
    /// Username
    U,
    /// Both
    #[value(alias = "ue")]
    Eu,
}

impl Silence {
    /// `(show_email, show_username)` for an optional silence flag
    pub fn shown(silence: Option<Self>) -> (bool, bool) {
        match silence {
            None => (true, true),
            Some(Self::E) => (false, true),
            Some(Self::U) => (true, false),
            Some(Self::Eu) => (false, false),
        }
    }
}

/// Account settings shared by add, update and uuid
#[derive(Args, Debug, Default)]
pub struct AccountArgs {
    /// Password (def: generate a random password on add)
    #[arg(short = 'p', long)]
    pub password: Option<String>,

    /// Force a password change at next login
    #[arg(short = 'c', long, conflicts_with = "nochange")]
    pub change: bool,

    /// Clear the requirement to change password
    #[arg(short = 'C', long)]
    pub nochange: bool,

    /// Grace seconds to change the password
    #[arg(short = 'g', long, value_name = "SECS", conflicts_with = "nochange")]
    pub grace: Option<i64>,

    /// Disable login
    #[arg(short = 'n', long, conflicts_with = "login")]
    pub nologin: bool,

    /// Enable login
    #[arg(long)]
    pub login: bool,

    /// Ignore the contest open and close dates
    #[arg(short = 'i', long, conflicts_with = "no_ignore_date")]
    pub ignore_date: bool,

    /// Honor the contest open and close dates
    #[arg(short = 'I', long)]
    pub no_ignore_date: bool,

    /// E-mail address (empty string clears it)
    #[arg(short = 'e', long)]
    pub email: Option<String>,
}

impl AccountArgs {
    /// Translate flags into account changes; unset flags change nothing
    pub fn into_changes(self) -> AccountChanges {
        let flag = |on: bool, off: bool| match (on, off) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        };

        AccountChanges {
            password: self.password,
            ignore_contest_window: flag(self.ignore_date, self.no_ignore_date),
            force_password_change: flag(self.change || self.grace.is_some(), self.nochange),
            grace_period_secs: self.grace,
            login_disabled: flag(self.nologin, self.login),
            email: self
                .email
                .map(|e| if e.is_empty() { None } else { Some(e) }),
        }
    }
}

pub use commands::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stage() {
        let cli = Cli::try_parse_from(["submit-portal", "-t", "/srv/x", "stage", "users/alice/3"])
            .unwrap();
        assert_eq!(cli.topdir, Some(PathBuf::from("/srv/x")));
        assert!(matches!(cli.command, Commands::Stage { .. }));
    }

    #[test]
    fn test_account_flags() {
        let cli = Cli::try_parse_from([
            "submit-portal", "user", "update", "alice", "-g", "60", "-n", "-e", "",
        ])
        .unwrap();
        let Commands::User {
            command: UserCommands::Update { account, .. },
        } = cli.command
        else {
            panic!("wrong command");
        };

        let changes = account.into_changes();
        assert_eq!(changes.force_password_change, Some(true));
        assert_eq!(changes.grace_period_secs, Some(60));
        assert_eq!(changes.login_disabled, Some(true));
        assert_eq!(changes.ignore_contest_window, None);
        assert_eq!(changes.email, Some(None));
    }

    #[test]
    fn test_conflicting_flags() {
        assert!(Cli::try_parse_from(["submit-portal", "user", "add", "a", "-c", "-C"]).is_err());
        assert!(Cli::try_parse_from(["submit-portal", "user", "add", "a", "-g", "5", "-C"]).is_err());
    }

    #[test]
    fn test_parse_account_reports() {
        let cli = Cli::try_parse_from([
            "submit-portal", "user", "email", "-u", "-s", "ue", "-0", "alice", "bob",
        ])
        .unwrap();
        let Commands::User {
            command:
                UserCommands::Email {
                    args,
                    username_args,
                    silence,
                    zero,
                    comma,
                },
        } = cli.command
        else {
            panic!("wrong command");
        };
        assert_eq!(args, ["alice", "bob"]);
        assert!(username_args && zero && !comma);
        assert_eq!(Silence::shown(silence), (false, false));

        let cli = Cli::try_parse_from(["submit-portal", "user", "expired"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::User {
                command: UserCommands::Expired { silence: None, .. }
            }
        ));
        assert!(Cli::try_parse_from(["submit-portal", "user", "expired", "-s", "x"]).is_err());
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
