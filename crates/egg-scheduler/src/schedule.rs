use chrono::{Datelike, NaiveDate};
use tracing::debug;

use crate::{
    error::{Result, SchedulerError},
    types::{ClockTime, CronExpr, Frequency, Resolution},
};

/// The front end encodes spaces in the time argument as underscores.
pub fn decode_time_arg(raw: &str) -> String {
    raw.replace('_', " ")
}

/// Convert a strict `HH:MM AM` / `HH:MM PM` string to 24-hour time.
///
/// `12:xx AM` is midnight (`00:xx`) and `12:xx PM` is noon (`12:xx`).
pub fn convert_time(input: &str) -> Result<ClockTime> {
    let invalid = || SchedulerError::InvalidTimeFormat {
        input: input.to_string(),
    };

    let (clock, meridiem) = input.split_once(' ').ok_or_else(invalid)?;
    let (hh, mm) = clock.split_once(':').ok_or_else(invalid)?;
    if hh.len() != 2 || mm.len() != 2 {
        return Err(invalid());
    }
    if !hh.bytes().chain(mm.bytes()).all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let hour12: u8 = hh.parse().map_err(|_| invalid())?;
    let minute: u8 = mm.parse().map_err(|_| invalid())?;
    if !(1..=12).contains(&hour12) || minute > 59 {
        return Err(invalid());
    }

    let hour = if meridiem.eq_ignore_ascii_case("AM") {
        hour12 % 12
    } else if meridiem.eq_ignore_ascii_case("PM") {
        hour12 % 12 + 12
    } else {
        return Err(invalid());
    };

    Ok(ClockTime { hour, minute })
}

/// Resolve a time and frequency into a crontab expression.
///
/// `today` anchors weekly-based frequencies: the day-of-week field is fixed
/// to today's weekday and is never re-derived later.
pub fn resolve(time: ClockTime, frequency: Frequency, today: NaiveDate) -> Resolution {
    let weekday = frequency.is_weekly_base().then(|| today.weekday());
    let expression = CronExpr {
        minute: time.minute,
        hour: time.hour,
        day_of_week: weekday.map(|d| d.num_days_from_sunday() as u8),
    };

    debug!(
        time = %time,
        %frequency,
        day = ?weekday,
        expression = %expression,
        "resolved schedule"
    );

    Resolution {
        time,
        frequency,
        expression,
        weekday,
    }
}

/// Decode, parse and resolve raw request arguments in one step.
///
/// Every validation error surfaces here, before anything touches the
/// job table.
pub fn resolve_request(raw_time: &str, raw_frequency: &str, today: NaiveDate) -> Result<Resolution> {
    let time = convert_time(&decode_time_arg(raw_time))?;
    let frequency: Frequency = raw_frequency.parse()?;
    Ok(resolve(time, frequency, today))
}
