// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shell-quoting contract.
//!
//! Two distinct quoting rules apply inside the envelope's `bash -c '...'`
//! invocation:
//!
//! - Paths that may begin with `~` (log/status/pid/working-directory paths)
//!   MUST NOT be single-quoted, so the shell expands the tilde.
//! - The user command MUST be embedded so its own quotes and metacharacters
//!   survive byte-for-byte: each single quote is replaced with `'\''` and
//!   the result is wrapped in single quotes.

/// Escapes a shell command for embedding inside a single-quoted shell
/// literal: every `'` becomes `'\''`.
pub fn escape_for_single_quotes(cmd: &str) -> String {
    cmd.replace('\'', r"'\''")
}

/// Inverse of [`escape_for_single_quotes`].
pub fn unescape_from_single_quotes(escaped: &str) -> String {
    escaped.replace(r"'\''", "'")
}

/// Wraps an already-escaped command in single quotes, producing a
/// shell-safe literal suitable for splicing into a `bash -c '...'`
/// invocation.
pub fn single_quote_wrap(escaped: &str) -> String {
    format!("'{escaped}'")
}

/// Tmux session name for a job: `rj-{job_id}`.
pub fn job_session_name(job_id: i64) -> String {
    format!("rj-{job_id}")
}

/// Tmux session name for a queue runner: `rj-queue-{name}`.
pub fn queue_session_name(queue_name: &str) -> String {
    format!("rj-queue-{queue_name}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn escapes_known_tricky_commands() {
        assert_eq!(
            escape_for_single_quotes("echo 'hi'"),
            r"echo '\''hi'\''"
        );
        assert_eq!(escape_for_single_quotes("no quotes here"), "no quotes here");
    }

    #[test]
    fn wrap_produces_single_quoted_literal() {
        let escaped = escape_for_single_quotes("echo 'hi'");
        assert_eq!(single_quote_wrap(&escaped), r"'echo '\''hi'\'''");
    }

    #[test]
    fn session_names_use_rj_prefix() {
        assert_eq!(job_session_name(42), "rj-42");
        assert_eq!(queue_session_name("default"), "rj-queue-default");
    }

    proptest! {
        #[test]
        fn escape_unescape_round_trips(cmd in ".*") {
            let escaped = escape_for_single_quotes(&cmd);
            let restored = unescape_from_single_quotes(&escaped);
            prop_assert_eq!(restored, cmd);
        }
    }
}
