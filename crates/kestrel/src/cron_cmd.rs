// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `kestrel cron` subcommands, operating directly on the configured job store.

use std::sync::Arc;

use clap::{ArgGroup, Subcommand};
use colored::Colorize;
use kestrel_config::model::KestrelConfig;
use kestrel_core::KestrelError;
use kestrel_cron::{CronJob, CronPayload, CronSchedule, CronService, NewJob};

use crate::runtime::{Runtime, cron_inbound};

#[derive(Subcommand, Debug)]
pub enum CronCommand {
    /// List scheduled jobs.
    List {
        /// Include disabled jobs.
        #[arg(long, short = 'a')]
        all: bool,
    },
    /// Add a new job.
    #[command(group(ArgGroup::new("schedule").required(true).args(["every", "cron", "at"])))]
    Add {
        #[arg(long, short = 'n')]
        name: String,
        /// Message delivered to the agent when the job fires.
        #[arg(long, short = 'm')]
        message: String,
        /// Interval in seconds.
        #[arg(long, short = 'e')]
        every: Option<u64>,
        /// Crontab expression.
        #[arg(long, short = 'c')]
        cron: Option<String>,
        /// IANA timezone for --cron.
        #[arg(long, requires = "cron")]
        tz: Option<String>,
        /// One-shot time (RFC 3339).
        #[arg(long)]
        at: Option<String>,
        /// Channel the reply goes to.
        #[arg(long)]
        channel: Option<String>,
        /// Chat id on that channel.
        #[arg(long)]
        to: Option<String>,
    },
    /// Remove a job.
    Remove { id: String },
    /// Enable or disable a job.
    Enable {
        id: String,
        #[arg(long)]
        disable: bool,
    },
    /// Run a job now and print the agent's reply.
    Run {
        id: String,
        /// Run even if the job is disabled.
        #[arg(long, short = 'f')]
        force: bool,
    },
}

pub async fn run_cron(config: KestrelConfig, command: CronCommand) -> Result<(), KestrelError> {
    let service = CronService::new(config.cron.store_path.clone());
    match command {
        CronCommand::List { all } => {
            let jobs = service.list_jobs(all).await?;
            if jobs.is_empty() {
                println!("No scheduled jobs.");
            } else {
                print!("{}", format_table(&jobs));
            }
        }
        CronCommand::Add {
            name,
            message,
            every,
            cron,
            tz,
            at,
            channel,
            to,
        } => {
            let schedule = schedule_from_args(every, cron, tz, at.as_deref())?;
            let job = service
                .add_job(NewJob {
                    name,
                    delete_after_run: schedule.is_one_shot(),
                    schedule,
                    payload: CronPayload {
                        message,
                        channel,
                        to,
                    },
                })
                .await?;
            println!(
                "{} job '{}' ({}) {}",
                "Added".green(),
                job.name,
                job.id,
                job.schedule.describe()
            );
        }
        CronCommand::Remove { id } => {
            if service.remove_job(&id).await? {
                println!("{} job {id}", "Removed".green());
            } else {
                println!("{} {id}", "No job with id".yellow());
            }
        }
        CronCommand::Enable { id, disable } => match service.enable_job(&id, !disable).await? {
            Some(job) => {
                let state = if job.enabled { "enabled" } else { "disabled" };
                println!("Job '{}' ({}) {state}", job.name, job.id);
            }
            None => println!("{} {id}", "No job with id".yellow()),
        },
        CronCommand::Run { id, force } => {
            let rt = Runtime::build(&config).await?;
            let service = Arc::new(service);
            let agent = Arc::clone(&rt.agent);
            service.set_on_job(move |job| {
                let agent = Arc::clone(&agent);
                async move {
                    let reply = agent.process(cron_inbound(&job)).await?;
                    let content = reply.map(|r| r.content);
                    if let Some(text) = &content {
                        println!("{text}");
                    }
                    Ok(content)
                }
            });
            if !service.run_job(&id, force).await? {
                println!(
                    "{} {id} {}",
                    "Job".yellow(),
                    "not found or disabled (use --force to run a disabled job)".yellow()
                );
            }
        }
    }
    Ok(())
}

fn schedule_from_args(
    every: Option<u64>,
    cron: Option<String>,
    tz: Option<String>,
    at: Option<&str>,
) -> Result<CronSchedule, KestrelError> {
    if let Some(secs) = every {
        let every_ms = i64::try_from(secs.saturating_mul(1000))
            .map_err(|_| KestrelError::Cron(format!("interval {secs}s is too large")))?;
        return Ok(CronSchedule::Every { every_ms });
    }
    if let Some(expr) = cron {
        return Ok(CronSchedule::Cron { expr, tz });
    }
    if let Some(at) = at {
        let parsed = chrono::DateTime::parse_from_rfc3339(at)
            .map_err(|e| KestrelError::Cron(format!("invalid --at time '{at}': {e}")))?;
        return Ok(CronSchedule::At {
            at_ms: parsed.timestamp_millis(),
        });
    }
    Err(KestrelError::Cron(
        "one of --every, --cron, or --at is required".into(),
    ))
}

fn format_table(jobs: &[CronJob]) -> String {
    let mut out = format!(
        "{:<10} {:<20} {:<32} {:<8} {:<26} {}\n",
        "ID", "NAME", "SCHEDULE", "ENABLED", "NEXT RUN", "LAST"
    );
    for job in jobs {
        let next = job
            .state
            .next_run_at_ms
            .and_then(chrono::DateTime::from_timestamp_millis)
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "-".into());
        let last = job
            .state
            .last_status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".into());
        out.push_str(&format!(
            "{:<10} {:<20} {:<32} {:<8} {:<26} {}\n",
            job.id,
            job.name,
            job.schedule.describe(),
            if job.enabled { "yes" } else { "no" },
            next,
            last
        ));
    }
    out
}
