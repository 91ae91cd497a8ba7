// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake notifier for tests in other crates.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::notify::{Notifier, NotifyError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyCall {
    pub job_label: String,
    pub exit_code: i32,
    pub host: String,
    pub metadata_path: String,
}

#[derive(Clone, Default)]
pub struct FakeNotifier {
    calls: Arc<Mutex<Vec<NotifyCall>>>,
}

impl FakeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<NotifyCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn notify(
        &self,
        job_label: &str,
        exit_code: i32,
        host: &str,
        metadata_path: &str,
    ) -> Result<(), NotifyError> {
        self.calls.lock().push(NotifyCall {
            job_label: job_label.to_string(),
            exit_code,
            host: host.to_string(),
            metadata_path: metadata_path.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_calls_in_order() {
        let notifier = FakeNotifier::new();
        notifier.notify("job-1", 0, "build1", "m1").await.unwrap();
        notifier.notify("job-2", 1, "build2", "m2").await.unwrap();
        let calls = notifier.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].job_label, "job-1");
        assert_eq!(calls[1].exit_code, 1);
    }
}
