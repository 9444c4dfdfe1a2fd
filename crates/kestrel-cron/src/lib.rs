// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable job scheduler for the Kestrel assistant runtime.
//!
//! Jobs live in a JSON document. A single timer task sleeps until the
//! earliest due job, runs every due job through an injected callback
//! (normally: publish a synthetic inbound message on the bus), records the
//! outcome, reschedules, and persists the store.

pub mod schedule;
pub mod service;
pub mod store;
pub mod tool;
pub mod types;

pub use schedule::{compute_next_run, now_ms, validate_schedule};
pub use service::{CronService, CronStatus, JobCallback};
pub use tool::CronTool;
pub use types::{CronJob, CronJobState, CronPayload, CronSchedule, CronStore, JobStatus, NewJob};
