// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persisted job model.

use serde::{Deserialize, Serialize};
use strum::Display;

/// When a job fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CronSchedule {
    /// Once, at an absolute time.
    At {
        #[serde(rename = "atMs")]
        at_ms: i64,
    },
    /// Repeatedly, at a fixed interval.
    Every {
        #[serde(rename = "everyMs")]
        every_ms: i64,
    },
    /// Standard crontab expression, optionally evaluated in an IANA zone.
    Cron {
        expr: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tz: Option<String>,
    },
}

impl CronSchedule {
    pub fn is_one_shot(&self) -> bool {
        matches!(self, Self::At { .. })
    }

    /// Short human form used in listings.
    pub fn describe(&self) -> String {
        match self {
            Self::At { at_ms } => match chrono::DateTime::from_timestamp_millis(*at_ms) {
                Some(dt) => format!("at {}", dt.to_rfc3339()),
                None => format!("at {at_ms}ms"),
            },
            Self::Every { every_ms } => format!("every {}s", every_ms / 1000),
            Self::Cron { expr, tz: Some(tz) } => format!("cron '{expr}' ({tz})"),
            Self::Cron { expr, tz: None } => format!("cron '{expr}'"),
        }
    }
}

/// What a job delivers when it fires.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronPayload {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    /// Chat id on `channel` the result is delivered to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
}

/// Outcome of the most recent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum JobStatus {
    Ok,
    Error,
    Skipped,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronJobState {
    #[serde(default)]
    pub next_run_at_ms: Option<i64>,
    #[serde(default)]
    pub last_run_at_ms: Option<i64>,
    #[serde(default)]
    pub last_status: Option<JobStatus>,
    #[serde(default)]
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronJob {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    pub schedule: CronSchedule,
    pub payload: CronPayload,
    #[serde(default)]
    pub state: CronJobState,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
    #[serde(default)]
    pub delete_after_run: bool,
}

/// Parameters for a new job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewJob {
    pub name: String,
    pub schedule: CronSchedule,
    pub payload: CronPayload,
    pub delete_after_run: bool,
}

/// The on-disk document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CronStore {
    pub version: u32,
    #[serde(default)]
    pub jobs: Vec<CronJob>,
}

impl CronStore {
    pub const VERSION: u32 = 1;
}

impl Default for CronStore {
    fn default() -> Self {
        Self {
            version: Self::VERSION,
            jobs: Vec::new(),
        }
    }
}
