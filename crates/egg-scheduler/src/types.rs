use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::error::SchedulerError;

/// How often a task recurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    /// Every day at the scheduled time.
    Daily,
    /// Once a week, on the weekday the schedule was created.
    Weekly,
    /// Daily crontab entry, gated so only every second day runs.
    EveryOtherDay,
    /// Weekly crontab entry, gated so only every second week runs.
    BiWeekly,
}

impl Frequency {
    /// Canonical keyword, as written to the metadata file.
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::EveryOtherDay => "every_other_day",
            Frequency::BiWeekly => "bi_weekly",
        }
    }

    /// Parity cadence for frequencies cron cannot express natively.
    pub fn cadence(&self) -> Option<Cadence> {
        match self {
            Frequency::Daily | Frequency::Weekly => None,
            Frequency::EveryOtherDay => Some(Cadence::Day),
            Frequency::BiWeekly => Some(Cadence::Week),
        }
    }

    /// Whether the crontab entry pins the day-of-week field.
    pub fn is_weekly_base(&self) -> bool {
        matches!(self, Frequency::Weekly | Frequency::BiWeekly)
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Frequency {
    type Err = SchedulerError;

    /// Accepts the canonical keywords plus the front end's spellings
    /// (`"every other day"`, `"bi-weekly"`).
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "every_other_day" => Ok(Frequency::EveryOtherDay),
            "bi_weekly" | "biweekly" => Ok(Frequency::BiWeekly),
            _ => Err(SchedulerError::UnsupportedFrequency {
                keyword: s.to_string(),
            }),
        }
    }
}

/// Unit the parity gate alternates over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cadence {
    Day,
    Week,
}

impl std::fmt::Display for Cadence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Cadence::Day => "day",
            Cadence::Week => "week",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Cadence {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "day" => Ok(Cadence::Day),
            "week" => Ok(Cadence::Week),
            other => Err(format!("unknown cadence: {other}")),
        }
    }
}

/// Wall-clock time in 24-hour form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockTime {
    pub hour: u8,
    pub minute: u8,
}

impl std::fmt::Display for ClockTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Five-field cron expression. Day-of-month and month are always `*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CronExpr {
    pub minute: u8,
    pub hour: u8,
    /// 0 = Sunday … 6 = Saturday; `None` means every day.
    pub day_of_week: Option<u8>,
}

impl std::fmt::Display for CronExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.day_of_week {
            Some(dow) => write!(f, "{} {} * * {}", self.minute, self.hour, dow),
            None => write!(f, "{} {} * * *", self.minute, self.hour),
        }
    }
}

/// Output of the resolver: everything `create_job` needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub time: ClockTime,
    pub frequency: Frequency,
    pub expression: CronExpr,
    /// Weekday captured at resolution time for weekly-based frequencies.
    pub weekday: Option<Weekday>,
}

/// A live crontab entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobEntry {
    /// Task name stored as the trailing comment; `None` for entries this
    /// scheduler did not create.
    pub tag: Option<String>,
    /// The five schedule fields (or an `@keyword`), space separated.
    pub expression: String,
    pub command: String,
}

impl JobEntry {
    pub fn is_tagged(&self, task: &str) -> bool {
        self.tag.as_deref() == Some(task)
    }
}

/// Task names double as crontab comment tags and lock file names.
pub fn validate_task_name(name: &str) -> crate::error::Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        && name != "."
        && name != "..";
    if valid {
        Ok(())
    } else {
        Err(SchedulerError::InvalidTaskName {
            name: name.to_string(),
        })
    }
}
