// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Integer identifiers, monotonically allocated by the job store.

/// Define a newtype ID wrapper around `i64`.
///
/// Unlike the string-based IDs used for ephemeral objects elsewhere in the
/// stack, job and deferred-operation identity is an auto-incrementing
/// primary key handed out by the store, so the wrapper is a thin `i64`.
#[macro_export]
macro_rules! define_int_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident;
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            pub fn new(id: i64) -> Self {
                Self(id)
            }

            pub fn get(&self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> i64 {
                id.0
            }
        }
    };
}

crate::define_int_id! {
    /// Unique identifier for a job, allocated by `rj-storage` on insert.
    ///
    /// Job identity is immutable after insertion; the tmux session name for
    /// a job is always derived from this id as `rj-{job_id}`.
    pub struct JobId;
}
