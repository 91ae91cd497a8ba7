// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local notification seam. The outbound delivery hop (a webhook POST, a
//! desktop banner, a chat message) is an external collaborator; this trait
//! only needs to expose "tell someone a job finished" to the engine.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notify delivery failed: {0}")]
    DeliveryFailed(String),
}

/// Fired by the synchronizer/lifecycle coordinator when a job reaches a
/// terminal state it should surface to a human.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        job_label: &str,
        exit_code: i32,
        host: &str,
        metadata_path: &str,
    ) -> Result<(), NotifyError>;
}

/// Discards every notification. Default until a webhook URL is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpNotifier;

#[async_trait]
impl Notifier for NoOpNotifier {
    async fn notify(&self, _: &str, _: i32, _: &str, _: &str) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Posts a job-completion summary to a configured webhook URL by shelling
/// out to `curl`, mirroring the event-bus adapter's subprocess pattern
/// rather than pulling in an HTTP client crate for one POST per job.
#[derive(Clone, Debug)]
pub struct WebhookNotifier {
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(
        &self,
        job_label: &str,
        exit_code: i32,
        host: &str,
        metadata_path: &str,
    ) -> Result<(), NotifyError> {
        let payload = serde_json::json!({
            "job": job_label,
            "exit_code": exit_code,
            "host": host,
            "metadata_path": metadata_path,
        })
        .to_string();

        let output = tokio::process::Command::new("curl")
            .arg("-sS")
            .arg("-X")
            .arg("POST")
            .arg("-H")
            .arg("Content-Type: application/json")
            .arg("-d")
            .arg(&payload)
            .arg(&self.url)
            .output()
            .await
            .map_err(|e| NotifyError::DeliveryFailed(format!("failed to spawn curl: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            return Err(NotifyError::DeliveryFailed(stderr));
        }
        Ok(())
    }
}
