// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scheduler firing through the bus.

use std::sync::Arc;
use std::time::Duration;

use kestrel_bus::MessageBus;
use kestrel_core::InboundMessage;
use kestrel_cron::{CronPayload, CronSchedule, CronService, NewJob, now_ms, store::load_store};

fn wire(service: &CronService, bus: &Arc<MessageBus>) {
    let bus = Arc::clone(bus);
    service.set_on_job(move |job| {
        let bus = Arc::clone(&bus);
        async move {
            let channel = job.payload.channel.clone().unwrap_or_else(|| "cli".into());
            let chat = job.payload.to.clone().unwrap_or_else(|| "direct".into());
            bus.publish_inbound(
                InboundMessage::new(channel, "cron", chat, job.payload.message.clone())
                    .with_session_key(format!("cron:{}", job.id)),
            );
            Ok(None)
        }
    });
}

#[tokio::test]
async fn one_shot_job_fires_once_and_is_deleted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("jobs.json");
    let bus = Arc::new(MessageBus::new());
    let service = Arc::new(CronService::new(&path));
    wire(&service, &bus);

    let job = service
        .add_job(NewJob {
            name: "soon".into(),
            schedule: CronSchedule::At { at_ms: now_ms() + 50 },
            payload: CronPayload {
                message: "wake up".into(),
                channel: Some("http".into()),
                to: Some("alice".into()),
            },
            delete_after_run: true,
        })
        .await
        .unwrap();
    service.start().await.unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(load_store(&path).await.unwrap().jobs.is_empty());
    assert_eq!(bus.status().inbound_queued, 1);
    let msg = bus.consume_inbound().await;
    assert_eq!(msg.content, "wake up");
    assert_eq!(msg.channel, "http");
    assert_eq!(msg.chat_id, "alice");
    assert_eq!(msg.session_key(), format!("cron:{}", job.id));

    service.stop().await;
}

#[tokio::test]
async fn one_shot_without_delete_is_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let bus = Arc::new(MessageBus::new());
    let service = Arc::new(CronService::new(dir.path().join("jobs.json")));
    wire(&service, &bus);

    service
        .add_job(NewJob {
            name: "keep".into(),
            schedule: CronSchedule::At { at_ms: now_ms() + 30 },
            payload: CronPayload {
                message: "kept".into(),
                ..CronPayload::default()
            },
            delete_after_run: false,
        })
        .await
        .unwrap();
    service.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    service.stop().await;

    let jobs = service.list_jobs(true).await.unwrap();
    assert_eq!(jobs.len(), 1);
    assert!(!jobs[0].enabled);
    assert_eq!(jobs[0].state.next_run_at_ms, None);
    assert!(jobs[0].state.last_run_at_ms.is_some());
    assert_eq!(bus.status().inbound_queued, 1);
}

#[tokio::test]
async fn interval_job_repeats_and_stays_armed() {
    let dir = tempfile::tempdir().unwrap();
    let bus = Arc::new(MessageBus::new());
    let service = Arc::new(CronService::new(dir.path().join("jobs.json")));
    wire(&service, &bus);

    service
        .add_job(NewJob {
            name: "tick".into(),
            schedule: CronSchedule::Every { every_ms: 50 },
            payload: CronPayload {
                message: "tick".into(),
                ..CronPayload::default()
            },
            delete_after_run: false,
        })
        .await
        .unwrap();
    service.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(280)).await;
    service.stop().await;

    let fired = bus.status().inbound_queued;
    assert!((3..=6).contains(&fired), "fired {fired} times");
    let jobs = service.list_jobs(false).await.unwrap();
    assert!(jobs[0].state.next_run_at_ms.is_some());
}

#[tokio::test]
async fn job_added_after_start_wakes_the_timer() {
    let dir = tempfile::tempdir().unwrap();
    let bus = Arc::new(MessageBus::new());
    let service = Arc::new(CronService::new(dir.path().join("jobs.json")));
    wire(&service, &bus);
    service.start().await.unwrap();

    service
        .add_job(NewJob {
            name: "late".into(),
            schedule: CronSchedule::At { at_ms: now_ms() + 30 },
            payload: CronPayload {
                message: "late".into(),
                ..CronPayload::default()
            },
            delete_after_run: true,
        })
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    service.stop().await;

    assert_eq!(bus.status().inbound_queued, 1);
}
