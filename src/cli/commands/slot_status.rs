use crate::db::repositories::SlotRepository;
use crate::error::AppError;
use crate::state::AppState;
use crate::utils::validation::validate_slot_num;

/// Change the status text of one slot
pub fn cmd_slot_status(
    state: &AppState,
    username: &str,
    slot_arg: &str,
    status: &str,
    collected: bool,
    if_submit: Option<&str>,
) -> u8 {
    let Some(slot_num) = slot_arg
        .parse::<u32>()
        .ok()
        .filter(|n| validate_slot_num(*n).is_ok())
    else {
        eprintln!("invalid slot number: {slot_arg} for username: {username}");
        return 5;
    };

    let result = match if_submit {
        Some(filename) => SlotRepository::patch_status_if_submit(
            state, username, slot_num, filename, status, collected,
        ),
        None => SlotRepository::patch_status(state, username, slot_num, status, collected).map(Some),
    };

    match result {
        Ok(Some(_)) => {
            let collected = if collected { "True" } else { "((unchanged))" };
            eprintln!(
                "username: {username} slot_num: {slot_num} collected: {collected} status: {status}"
            );
            0
        }
        Ok(None) => {
            eprintln!("username: {username} slot_num: {slot_num} holds a newer submit file, unchanged");
            0
        }
        Err(e @ AppError::NotFound(_)) => {
            eprintln!("lookup of username: {username} failed: {e}");
            4
        }
        Err(e) => {
            eprintln!("update of username: {username} slot_num: {slot_num} failed: {e}");
            6
        }
    }
}
