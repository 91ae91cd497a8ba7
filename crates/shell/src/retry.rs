// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retry policy: up to 5 attempts with a short
//! (~30s) delay on connection failures; a non-retrying "quick" path exists
//! for the Synchronizer.

use std::time::Duration;

pub const DEFAULT_RETRY_ATTEMPTS: u32 = 5;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    /// No retries: the synchronizer's fast-sync path.
    pub const NONE: RetryPolicy = RetryPolicy {
        attempts: 1,
        delay: Duration::ZERO,
    };

    /// The default retryable-operation policy.
    pub const DEFAULT: RetryPolicy = RetryPolicy {
        attempts: DEFAULT_RETRY_ATTEMPTS,
        delay: DEFAULT_RETRY_DELAY,
    };

    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}
