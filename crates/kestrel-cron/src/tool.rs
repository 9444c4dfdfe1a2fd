// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `cron` tool: lets the model schedule reminders and recurring tasks.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::DateTime;
use kestrel_core::{KestrelError, RiskTier};
use kestrel_skill::{Tool, ToolContext, ToolOutput};

use crate::service::CronService;
use crate::types::{CronPayload, CronSchedule, NewJob};

pub struct CronTool {
    service: Arc<CronService>,
}

impl CronTool {
    pub fn new(service: Arc<CronService>) -> Self {
        Self { service }
    }

    async fn add(&self, input: &serde_json::Value, ctx: &ToolContext) -> Result<ToolOutput, KestrelError> {
        let Some(message) = input["message"].as_str().filter(|m| !m.trim().is_empty()) else {
            return Ok(ToolOutput::error("message is required for add"));
        };

        let schedule = if let Some(secs) = input["every_seconds"].as_i64() {
            CronSchedule::Every {
                every_ms: secs.saturating_mul(1000),
            }
        } else if let Some(expr) = input["cron_expr"].as_str() {
            CronSchedule::Cron {
                expr: expr.to_string(),
                tz: input["tz"].as_str().map(str::to_string),
            }
        } else if let Some(at) = input["at"].as_str() {
            match DateTime::parse_from_rfc3339(at) {
                Ok(dt) => CronSchedule::At {
                    at_ms: dt.timestamp_millis(),
                },
                Err(e) => return Ok(ToolOutput::error(format!("invalid 'at' time '{at}': {e}"))),
            }
        } else {
            return Ok(ToolOutput::error(
                "one of every_seconds, cron_expr, or at is required",
            ));
        };

        let one_shot = schedule.is_one_shot();
        let name: String = message.chars().take(30).collect();
        let job = self
            .service
            .add_job(NewJob {
                name,
                schedule,
                payload: CronPayload {
                    message: message.to_string(),
                    channel: Some(ctx.channel.clone()),
                    to: Some(ctx.chat_id.clone()),
                },
                delete_after_run: one_shot,
            })
            .await?;
        Ok(ToolOutput::success(format!(
            "Created job '{}' (id: {}), {}",
            job.name,
            job.id,
            job.schedule.describe()
        )))
    }

    async fn list(&self) -> Result<ToolOutput, KestrelError> {
        let jobs = self.service.list_jobs(false).await?;
        if jobs.is_empty() {
            return Ok(ToolOutput::success("No scheduled jobs."));
        }
        let lines: Vec<String> = jobs
            .iter()
            .map(|j| format!("- {} (id: {}, {})", j.name, j.id, j.schedule.describe()))
            .collect();
        Ok(ToolOutput::success(format!("Scheduled jobs:\n{}", lines.join("\n"))))
    }

    async fn remove(&self, input: &serde_json::Value) -> Result<ToolOutput, KestrelError> {
        let Some(id) = input["job_id"].as_str() else {
            return Ok(ToolOutput::error("job_id is required for remove"));
        };
        if self.service.remove_job(id).await? {
            Ok(ToolOutput::success(format!("Removed job {id}")))
        } else {
            Ok(ToolOutput::error(format!("Job {id} not found")))
        }
    }
}

#[async_trait]
impl Tool for CronTool {
    fn name(&self) -> &str {
        "cron"
    }

    fn description(&self) -> &str {
        "Schedule reminders and recurring tasks. Actions: add, list, remove."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["add", "list", "remove"],
                    "description": "Action to perform"
                },
                "message": { "type": "string", "description": "Message delivered when the job fires (add)" },
                "every_seconds": { "type": "integer", "description": "Interval in seconds for recurring jobs" },
                "cron_expr": { "type": "string", "description": "Cron expression like '0 9 * * *'" },
                "tz": { "type": "string", "description": "IANA timezone for cron_expr, e.g. 'Europe/Berlin'" },
                "at": { "type": "string", "description": "RFC 3339 time for a one-time job" },
                "job_id": { "type": "string", "description": "Job id (remove)" }
            },
            "required": ["action"]
        })
    }

    fn risk_tier(&self) -> RiskTier {
        RiskTier::Medium
    }

    async fn invoke(
        &self,
        input: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolOutput, KestrelError> {
        match input["action"].as_str() {
            Some("add") => self.add(&input, ctx).await,
            Some("list") => self.list().await,
            Some("remove") => self.remove(&input).await,
            Some(other) => Ok(ToolOutput::error(format!("unknown action '{other}'"))),
            None => Ok(ToolOutput::error("action is required")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool(dir: &tempfile::TempDir) -> (CronTool, Arc<CronService>) {
        let service = Arc::new(CronService::new(dir.path().join("jobs.json")));
        (CronTool::new(Arc::clone(&service)), service)
    }

    #[tokio::test]
    async fn add_targets_the_calling_chat() {
        let dir = tempfile::tempdir().unwrap();
        let (tool, service) = tool(&dir);
        let ctx = ToolContext::new("http", "room-7");
        let out = tool
            .invoke(json!({"action": "add", "message": "stretch", "every_seconds": 600}), &ctx)
            .await
            .unwrap();
        assert!(!out.is_error, "{}", out.content);
        assert!(out.content.contains("every 600s"));

        let jobs = service.list_jobs(false).await.unwrap();
        assert_eq!(jobs[0].payload.channel.as_deref(), Some("http"));
        assert_eq!(jobs[0].payload.to.as_deref(), Some("room-7"));
        assert!(!jobs[0].delete_after_run);
    }

    #[tokio::test]
    async fn one_shot_jobs_delete_after_run() {
        let dir = tempfile::tempdir().unwrap();
        let (tool, service) = tool(&dir);
        let at = (chrono::Utc::now() + chrono::Duration::hours(1)).to_rfc3339();
        let out = tool
            .invoke(json!({"action": "add", "message": "call mum", "at": at}), &ToolContext::new("cli", "direct"))
            .await
            .unwrap();
        assert!(!out.is_error, "{}", out.content);
        assert!(service.list_jobs(false).await.unwrap()[0].delete_after_run);
    }

    #[tokio::test]
    async fn list_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let (tool, service) = tool(&dir);
        let ctx = ToolContext::new("cli", "direct");
        let out = tool.invoke(json!({"action": "list"}), &ctx).await.unwrap();
        assert_eq!(out.content, "No scheduled jobs.");

        tool.invoke(json!({"action": "add", "message": "water", "cron_expr": "0 9 * * *", "tz": "UTC"}), &ctx)
            .await
            .unwrap();
        let id = service.list_jobs(false).await.unwrap()[0].id.clone();
        let out = tool.invoke(json!({"action": "list"}), &ctx).await.unwrap();
        assert!(out.content.contains(&id));

        let out = tool.invoke(json!({"action": "remove", "job_id": id}), &ctx).await.unwrap();
        assert!(!out.is_error);
        let out = tool.invoke(json!({"action": "remove", "job_id": "nope"}), &ctx).await.unwrap();
        assert!(out.is_error);
    }

    #[tokio::test]
    async fn add_without_schedule_is_an_error_output() {
        let dir = tempfile::tempdir().unwrap();
        let (tool, _) = tool(&dir);
        let out = tool
            .invoke(json!({"action": "add", "message": "x"}), &ToolContext::new("cli", "direct"))
            .await
            .unwrap();
        assert!(out.is_error);
    }
}
