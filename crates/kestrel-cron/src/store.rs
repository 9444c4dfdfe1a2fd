// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON job store, rewritten wholesale on every change.

use std::path::Path;

use kestrel_core::KestrelError;
use tracing::{debug, warn};

use crate::types::CronStore;

/// Reads the store; a missing file is an empty store.
pub async fn load_store(path: &Path) -> Result<CronStore, KestrelError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no cron store yet");
            return Ok(CronStore::default());
        }
        Err(e) => return Err(KestrelError::storage(e)),
    };
    let store: CronStore = serde_json::from_slice(&bytes)?;
    if store.version != CronStore::VERSION {
        warn!(
            path = %path.display(),
            version = store.version,
            "cron store has an unexpected version"
        );
    }
    Ok(store)
}

/// Writes the store through a temp file and rename so a crash never leaves
/// a half-written document.
pub async fn save_store(path: &Path, store: &CronStore) -> Result<(), KestrelError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_vec_pretty(store)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json).await?;
    tokio::fs::rename(&tmp, path).await?;
    debug!(path = %path.display(), jobs = store.jobs.len(), "cron store saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CronJob, CronJobState, CronPayload, CronSchedule};

    #[tokio::test]
    async fn missing_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = load_store(&dir.path().join("jobs.json")).await.unwrap();
        assert_eq!(store.version, 1);
        assert!(store.jobs.is_empty());
    }

    #[tokio::test]
    async fn saved_document_uses_camel_case_and_kind_tag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cron").join("jobs.json");
        let store = CronStore {
            version: 1,
            jobs: vec![CronJob {
                id: "abc12345".into(),
                name: "standup".into(),
                enabled: true,
                schedule: CronSchedule::Every { every_ms: 5000 },
                payload: CronPayload {
                    message: "ping".into(),
                    channel: Some("http".into()),
                    to: Some("room".into()),
                },
                state: CronJobState {
                    next_run_at_ms: Some(10),
                    ..CronJobState::default()
                },
                created_at_ms: 1,
                updated_at_ms: 2,
                delete_after_run: false,
            }],
        };
        save_store(&path, &store).await.unwrap();
        assert!(!path.with_extension("json.tmp").exists());

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        let job = &raw["jobs"][0];
        assert_eq!(job["schedule"]["kind"], "every");
        assert_eq!(job["schedule"]["everyMs"], 5000);
        assert_eq!(job["state"]["nextRunAtMs"], 10);
        assert_eq!(job["deleteAfterRun"], false);

        assert_eq!(load_store(&path).await.unwrap(), store);
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(load_store(&path).await.is_err());
    }
}
