use crate::services::ContestService;
use crate::state::AppState;
use crate::utils::time::format_usec;

/// Print the contest dates, changing them first when asked
pub fn cmd_date(state: &AppState, start: Option<&str>, stop: Option<&str>) -> u8 {
    let changing = start.is_some() || stop.is_some();

    match ContestService::set_dates(state, start, stop) {
        Ok(contest) => {
            let verb = if changing { "set contest" } else { "contest" };
            println!(
                "Notice: {verb} open: {} close: {}",
                format_usec(&contest.open_date),
                format_usec(&contest.close_date)
            );
            0
        }
        Err(e) if changing => {
            eprintln!("ERROR: failed to update open and/or close date: {e}");
            6
        }
        Err(e) => {
            eprintln!("ERROR: unable to fetch contest dates: {e}");
            4
        }
    }
}
