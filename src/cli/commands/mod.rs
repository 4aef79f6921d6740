mod date;
mod slot_status;
mod stage;
mod user;

pub use date::cmd_date;
pub use slot_status::cmd_slot_status;
pub use stage::{cmd_stage, stage_startup_failure, StageExit};
pub use user::{
    cmd_user_add, cmd_user_copy, cmd_user_delete, cmd_user_email, cmd_user_expired, cmd_user_list,
    cmd_user_update, cmd_user_uuid,
};

use crate::state::AppState;

use super::{Commands, Silence, UserCommands};

/// Run one command, returning the process exit status
pub fn run_command(state: &AppState, command: Commands) -> u8 {
    match command {
        Commands::User { command } => match command {
            UserCommands::Add { username, account } => {
                cmd_user_add(state, &username, account.into_changes())
            }
            UserCommands::Update { username, account } => {
                cmd_user_update(state, &username, account.into_changes())
            }
            UserCommands::Delete { username } => cmd_user_delete(state, &username),
            UserCommands::Uuid { account } => cmd_user_uuid(state, account.into_changes()),
            UserCommands::List => cmd_user_list(state),
            UserCommands::Copy { dest } => cmd_user_copy(state, &dest),
            UserCommands::Expired {
                args,
                username_args,
                silence,
            } => cmd_user_expired(state, &args, username_args, Silence::shown(silence)),
            UserCommands::Email {
                args,
                username_args,
                silence,
                zero,
                comma,
            } => cmd_user_email(
                state,
                &args,
                username_args,
                Silence::shown(silence),
                zero,
                comma,
            ),
        },
        Commands::Date { start, stop } => cmd_date(state, start.as_deref(), stop.as_deref()),
        Commands::SlotStatus {
            username,
            slot_num,
            status,
            collected,
            if_submit,
        } => cmd_slot_status(
            state,
            &username,
            &slot_num,
            &status,
            collected,
            if_submit.as_deref(),
        ),
        Commands::Stage { slot_path } => cmd_stage(state, &slot_path).code(),
    }
}
