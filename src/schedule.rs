//! Daily deadline schedule.
//!
//! The schedule state is a plain text file of whitespace-separated `H:MM`
//! tokens, one per daily playback deadline. Dispatch times are derived by
//! subtracting the configured launch offset, leaving room for the download
//! and encode ahead of the deadline.

use std::path::Path;

use chrono::{DateTime, Local, NaiveDate, NaiveTime};
use thiserror::Error;

/// Error type for schedule loading.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("cannot read schedule file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed schedule time {token:?} (expected H:MM)")]
    BadTime { token: String },
}

/// One configured daily deadline and its derived dispatch time.
///
/// Immutable once computed; the scheduler tracks the next concrete firing
/// separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Job {
    /// Daily time playback must end at.
    pub time_of_day: NaiveTime,
    /// Daily time the pipeline run starts: `time_of_day − offset`.
    pub dispatch_time: NaiveTime,
}

impl Job {
    /// Derives the dispatch time from a deadline and the launch offset in
    /// minutes. Wraps across midnight when the offset is larger than the
    /// deadline's distance from it.
    pub fn new(deadline: NaiveTime, offset_minutes: i64) -> Self {
        let (dispatch_time, _wrapped) =
            deadline.overflowing_sub_signed(chrono::Duration::minutes(offset_minutes));
        Self {
            time_of_day: deadline,
            dispatch_time,
        }
    }
}

/// Parses the whitespace-separated `H:MM` schedule format.
pub fn parse_schedule(text: &str) -> Result<Vec<NaiveTime>, ScheduleError> {
    text.split_whitespace()
        .map(|token| {
            NaiveTime::parse_from_str(token, "%H:%M").map_err(|_| ScheduleError::BadTime {
                token: token.to_string(),
            })
        })
        .collect()
}

/// Loads and parses the schedule file.
pub fn load_schedule(path: &Path) -> Result<Vec<NaiveTime>, ScheduleError> {
    let text = std::fs::read_to_string(path)?;
    parse_schedule(&text)
}

/// Local `DateTime` for `date` at `time`, biased to the earlier instant on
/// DST ambiguity and nudged forward across a DST gap.
pub fn local_datetime(date: NaiveDate, time: NaiveTime) -> DateTime<Local> {
    let naive = date.and_time(time);
    match naive.and_local_timezone(Local) {
        chrono::LocalResult::Single(dt) | chrono::LocalResult::Ambiguous(dt, _) => dt,
        chrono::LocalResult::None => (naive + chrono::Duration::hours(1))
            .and_local_timezone(Local)
            .earliest()
            .unwrap_or_else(Local::now),
    }
}
