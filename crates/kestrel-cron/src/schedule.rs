// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Next-run computation for each schedule kind.

use std::str::FromStr;

use chrono::{DateTime, Local, TimeZone, Utc};
use croner::Cron;
use kestrel_core::KestrelError;

use crate::types::CronSchedule;

/// Current wall-clock time in epoch milliseconds.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Checks that a schedule can ever produce a run time.
pub fn validate_schedule(schedule: &CronSchedule) -> Result<(), KestrelError> {
    match schedule {
        CronSchedule::At { .. } => Ok(()),
        CronSchedule::Every { every_ms } if *every_ms <= 0 => Err(KestrelError::Cron(format!(
            "interval must be positive, got {every_ms}ms"
        ))),
        CronSchedule::Every { .. } => Ok(()),
        CronSchedule::Cron { expr, tz } => {
            parse_expr(expr)?;
            if let Some(tz) = tz {
                parse_tz(tz)?;
            }
            Ok(())
        }
    }
}

/// The first run time strictly after `now_ms`, or `None` when the schedule
/// has nothing left to run (a one-shot time already in the past).
pub fn compute_next_run(schedule: &CronSchedule, now_ms: i64) -> Result<Option<i64>, KestrelError> {
    match schedule {
        CronSchedule::At { at_ms } => Ok((*at_ms > now_ms).then_some(*at_ms)),
        CronSchedule::Every { every_ms } => {
            if *every_ms <= 0 {
                return Err(KestrelError::Cron(format!(
                    "interval must be positive, got {every_ms}ms"
                )));
            }
            Ok(Some(now_ms.saturating_add(*every_ms)))
        }
        CronSchedule::Cron { expr, tz } => {
            let cron = parse_expr(expr)?;
            let now = DateTime::<Utc>::from_timestamp_millis(now_ms)
                .ok_or_else(|| KestrelError::Cron(format!("timestamp out of range: {now_ms}")))?;
            match tz {
                Some(tz) => next_in_zone(&cron, &now.with_timezone(&parse_tz(tz)?)),
                None => next_in_zone(&cron, &now.with_timezone(&Local)),
            }
        }
    }
}

fn next_in_zone<Z: TimeZone>(cron: &Cron, start: &DateTime<Z>) -> Result<Option<i64>, KestrelError> {
    let next = cron
        .find_next_occurrence(start, false)
        .map_err(|e| KestrelError::Cron(format!("no next occurrence: {e}")))?;
    Ok(Some(next.timestamp_millis()))
}

fn parse_expr(expr: &str) -> Result<Cron, KestrelError> {
    Cron::from_str(expr).map_err(|e| KestrelError::Cron(format!("invalid cron expression '{expr}': {e}")))
}

fn parse_tz(tz: &str) -> Result<chrono_tz::Tz, KestrelError> {
    tz.parse::<chrono_tz::Tz>()
        .map_err(|_| KestrelError::Cron(format!("unknown timezone '{tz}'")))
}
