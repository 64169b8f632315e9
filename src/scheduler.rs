//! Periodic trigger for the ingestor.
//!
//! Provides:
//! - Five-field cron expressions (`minute hour day month weekday`)
//! - A background task that runs one bound callback on each fire time

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;

use chrono::{DateTime, Datelike, Duration, DurationRound, Timelike, Utc};
use thiserror::Error;
use tokio::task::JoinHandle;

// ---

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CronError {
    #[error("expected 5 fields, found {0}")]
    FieldCount(usize),
    #[error("invalid {field} field '{value}'")]
    Field { field: &'static str, value: String },
}

/// Parsed cron expression. Times are evaluated in UTC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    expression: String,
    minutes: BTreeSet<u32>,
    hours: BTreeSet<u32>,
    days: BTreeSet<u32>,
    months: BTreeSet<u32>,
    weekdays: BTreeSet<u32>,
    days_restricted: bool,
    weekdays_restricted: bool,
}

/// Search horizon for [`CronSchedule::next_after`]; covers leap-day schedules.
const MAX_LOOKAHEAD_DAYS: i64 = 366 * 8;

impl CronSchedule {
    // ---
    pub fn parse(expression: &str) -> Result<Self, CronError> {
        // ---
        let parts: Vec<&str> = expression.split_whitespace().collect();
        if parts.len() != 5 {
            return Err(CronError::FieldCount(parts.len()));
        }

        let mut weekdays = parse_field(parts[4], "day-of-week", 0, 7)?;
        // 7 is an alias for Sunday
        if weekdays.remove(&7) {
            weekdays.insert(0);
        }

        Ok(Self {
            expression: parts.join(" "),
            minutes: parse_field(parts[0], "minute", 0, 59)?,
            hours: parse_field(parts[1], "hour", 0, 23)?,
            days: parse_field(parts[2], "day-of-month", 1, 31)?,
            months: parse_field(parts[3], "month", 1, 12)?,
            weekdays,
            days_restricted: !parts[2].starts_with('*'),
            weekdays_restricted: !parts[4].starts_with('*'),
        })
    }

    /// Whether the schedule fires at the minute containing `t`.
    pub fn matches(&self, t: DateTime<Utc>) -> bool {
        // ---
        self.minutes.contains(&t.minute())
            && self.hours.contains(&t.hour())
            && self.months.contains(&t.month())
            && self.day_matches(t)
    }

    fn day_matches(&self, t: DateTime<Utc>) -> bool {
        // ---
        let dom = self.days.contains(&t.day());
        let dow = self.weekdays.contains(&t.weekday().num_days_from_sunday());

        // Standard cron: when both are restricted either one may match
        match (self.days_restricted, self.weekdays_restricted) {
            (true, true) => dom || dow,
            _ => dom && dow,
        }
    }

    /// The first fire time strictly after `after`, if any within the horizon.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        // ---
        let start = after.duration_trunc(Duration::minutes(1)).ok()? + Duration::minutes(1);
        let horizon = start + Duration::days(MAX_LOOKAHEAD_DAYS);

        let mut t = start;
        while t < horizon {
            if !self.months.contains(&t.month()) || !self.day_matches(t) {
                // Skip to the next midnight
                let midnight = t.duration_trunc(Duration::days(1)).ok()?;
                t = midnight + Duration::days(1);
                continue;
            }
            if !self.hours.contains(&t.hour()) {
                let hour = t.duration_trunc(Duration::hours(1)).ok()?;
                t = hour + Duration::hours(1);
                continue;
            }
            if self.minutes.contains(&t.minute()) {
                return Some(t);
            }
            t += Duration::minutes(1);
        }
        None
    }
}

impl fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

/// Parse one comma-separated field into the set of values it selects.
fn parse_field(
    field: &str,
    name: &'static str,
    min: u32,
    max: u32,
) -> Result<BTreeSet<u32>, CronError> {
    // ---
    let invalid = || CronError::Field {
        field: name,
        value: field.to_string(),
    };

    let mut values = BTreeSet::new();
    for part in field.split(',') {
        let (range, step) = match part.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step.parse().map_err(|_| invalid())?;
                if step == 0 {
                    return Err(invalid());
                }
                (range, step)
            }
            None => (part, 1),
        };

        let (start, end) = if range == "*" {
            (min, max)
        } else if let Some((a, b)) = range.split_once('-') {
            let a: u32 = a.parse().map_err(|_| invalid())?;
            let b: u32 = b.parse().map_err(|_| invalid())?;
            (a, b)
        } else {
            let a: u32 = range.parse().map_err(|_| invalid())?;
            // `5/15` means from 5 to the end in steps of 15
            if part.contains('/') {
                (a, max)
            } else {
                (a, a)
            }
        };

        if start < min || end > max || start > end {
            return Err(invalid());
        }
        values.extend((start..=end).step_by(step as usize));
    }

    Ok(values)
}

/// Runs a task on every fire time of a [`CronSchedule`].
///
/// The task for one tick finishes before the next fire time is computed, so
/// ticks of a single scheduler never overlap.
pub struct PollScheduler {
    schedule: CronSchedule,
}

impl PollScheduler {
    // ---
    pub fn new(schedule: CronSchedule) -> Self {
        Self { schedule }
    }

    /// Start the background loop. Dropping the handle leaves it running;
    /// abort it to stop.
    pub fn spawn<F, Fut>(self, mut task: F) -> JoinHandle<()>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        // ---
        tokio::spawn(async move {
            tracing::info!("Poll scheduler started ({})", self.schedule);

            let mut last_fired = None;
            loop {
                let now = Utc::now();
                let Some(next) = next_fire(&self.schedule, now, last_fired) else {
                    tracing::warn!("Schedule '{}' never fires, stopping", self.schedule);
                    return;
                };
                tracing::debug!("Next scheduled poll at {}", next);

                let wait = (next - now).to_std().unwrap_or_default();
                tokio::time::sleep(wait).await;

                last_fired = Some(next);
                task().await;
            }
        })
    }
}

/// Next fire time after `now`, never at or before the last one that fired.
///
/// The wall clock can lag the sleep timer (e.g. after an NTP step), so `now`
/// alone may still sit inside the minute that just fired.
fn next_fire(
    schedule: &CronSchedule,
    now: DateTime<Utc>,
    last_fired: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    // ---
    let from = last_fired.map_or(now, |last| now.max(last));
    schedule.next_after(from)
}
