// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remote Execution Envelope: composes the single shell command
//! launched inside a detached tmux session on the remote host, and codecs
//! for the metadata file it writes.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::id::JobId;
use crate::paths::JobPaths;
use crate::quoting::{escape_for_single_quotes, single_quote_wrap};

/// Everything the envelope composer needs to build the wrapper command for
/// one job launch.
#[derive(Debug, Clone)]
pub struct EnvelopeSpec {
    pub job_id: JobId,
    pub working_dir: String,
    pub command: String,
    pub paths: JobPaths,
    pub start_time: i64,
    pub host: String,
    pub description: Option<String>,
    /// Path to the deployed notification helper, if configured.
    pub notify_helper: Option<String>,
    /// Wall-clock timeout in seconds, if requested.
    pub timeout_secs: Option<u64>,
    /// Environment overrides exported before the command runs.
    pub env: Vec<(String, String)>,
}

impl EnvelopeSpec {
    /// Job label passed to the notification hook: `(job-label, exit-code,
    /// host, metadata-file)`.
    fn job_label(&self) -> String {
        self.description
            .clone()
            .unwrap_or_else(|| format!("job-{}", self.job_id))
    }

    /// Composes the envelope script body as plain
    /// multi-line bash, to be written to a remote script file or piped to
    /// `bash -s` by the session adapter — this method performs no outer
    /// quoting of its own. Path-quoting contract: log/status/pid/working-dir
    /// paths are NOT single-quoted so the shell expands a leading `~`; the
    /// user command IS single-quote-escaped and wrapped in its own nested
    /// `bash -c '...'` so its quoting survives byte-for-byte independent of
    /// how the session adapter ends up invoking this script.
    pub fn compose(&self) -> String {
        let JobPaths {
            log,
            status,
            meta: _,
            pid,
        } = &self.paths;

        let log_dir = log.rsplit_once('/').map(|(dir, _)| dir).unwrap_or(".");
        let escaped_cmd = escape_for_single_quotes(&self.command);
        let wrapped_cmd = single_quote_wrap(&escaped_cmd);

        let mut inner = String::new();
        let _ = writeln!(inner, "mkdir -p {log_dir}");
        let _ = writeln!(
            inner,
            r#"printf '=== START job %s at %s ===\ncwd: %s\ncmd: %s\n' {job_id} "$(date -u +%Y-%m-%dT%H:%M:%SZ)" {cwd} {cmd_literal} >> {log}"#,
            job_id = self.job_id,
            cwd = single_quote_wrap(&escape_for_single_quotes(&self.working_dir)),
            cmd_literal = single_quote_wrap(&escape_for_single_quotes(&self.command)),
            log = log,
        );
        let _ = writeln!(inner, "cd {}", self.working_dir);

        for (key, value) in &self.env {
            let _ = writeln!(
                inner,
                "export {key}={value}",
                value = single_quote_wrap(&escape_for_single_quotes(value)),
            );
        }

        if let Some(timeout) = self.timeout_secs {
            // setsid makes the child a process-group leader so the watchdog
            // can signal the whole group, not just the immediate bash.
            let _ = writeln!(
                inner,
                "setsid bash -c {wrapped_cmd} >> {log} 2>&1 & child=$!; echo $child > {pid}"
            );
            let _ = writeln!(
                inner,
                "( sleep {timeout}; kill -TERM -- -$child 2>/dev/null ) & watchdog=$!"
            );
            let _ = writeln!(inner, "wait $child; code=$?; kill $watchdog 2>/dev/null");
        } else {
            let _ = writeln!(
                inner,
                "bash -c {wrapped_cmd} >> {log} 2>&1 & child=$!; echo $child > {pid}"
            );
            let _ = writeln!(inner, "wait $child; code=$?");
        }

        let _ = writeln!(
            inner,
            r#"printf '=== END job %s exit %s ===\n' {job_id} "$code" >> {log}"#,
            job_id = self.job_id,
        );
        let _ = writeln!(inner, "echo $code > {status}");

        if let Some(helper) = &self.notify_helper {
            let _ = writeln!(
                inner,
                "{helper} {label} \"$code\" {host} {meta}",
                label = single_quote_wrap(&escape_for_single_quotes(&self.job_label())),
                host = single_quote_wrap(&escape_for_single_quotes(&self.host)),
                meta = &self.paths.meta,
            );
        }

        inner
    }

    /// Wraps [`compose`]'s script body for launch as a single shell command
    /// argument (e.g. the command string passed to `tmux new-session -d`),
    /// escaping the whole envelope exactly once. This is a separate method
    /// from `compose` so tests can assert on the unwrapped script body
    /// without reasoning about double-escaped quoting.
    pub fn launch_command(&self) -> String {
        let escaped = escape_for_single_quotes(&self.compose());
        format!("bash -c {}", single_quote_wrap(&escaped))
    }

    /// Builds the key=value metadata file contents.
    pub fn metadata(&self) -> Metadata {
        let (display_dir, display_cmd) = split_cd_prefix(&self.working_dir, &self.command);
        Metadata {
            job_id: self.job_id.to_string(),
            working_dir: self.working_dir.clone(),
            command: self.command.clone(),
            start_time: self.start_time.to_string(),
            host: self.host.clone(),
            description: self.description.clone(),
            display_dir,
            display_cmd,
        }
    }
}

/// Recognizes a leading `cd <dir> && <rest>` pattern in `command`,
/// extracting `<dir>` (handling `'…'`/`"…"` quoting) and `<rest>`. Falls
/// back to `(working_dir, command)` unchanged when no such prefix exists.
pub fn split_cd_prefix(working_dir: &str, command: &str) -> (String, String) {
    let Some(after_cd) = command.strip_prefix("cd ") else {
        return (working_dir.to_string(), command.to_string());
    };
    let after_cd = after_cd.trim_start();

    let (dir, rest) = if let Some(stripped) = after_cd.strip_prefix('\'') {
        match stripped.split_once('\'') {
            Some((dir, rest)) => (dir.to_string(), rest.to_string()),
            None => return (working_dir.to_string(), command.to_string()),
        }
    } else if let Some(stripped) = after_cd.strip_prefix('"') {
        match stripped.split_once('"') {
            Some((dir, rest)) => (dir.to_string(), rest.to_string()),
            None => return (working_dir.to_string(), command.to_string()),
        }
    } else {
        match after_cd.split_once("&&") {
            Some((dir, rest)) => (dir.trim().to_string(), rest.to_string()),
            None => return (working_dir.to_string(), command.to_string()),
        }
    };

    let rest = rest.trim_start().strip_prefix("&&").unwrap_or(&rest).trim();
    (dir, rest.to_string())
}

/// Metadata key=value file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub job_id: String,
    pub working_dir: String,
    pub command: String,
    pub start_time: String,
    pub host: String,
    pub description: Option<String>,
    pub display_dir: String,
    pub display_cmd: String,
}

impl Metadata {
    /// Serializes as newline-separated `key=value` pairs.
    pub fn to_text(&self) -> String {
        let mut map: BTreeMap<&str, String> = BTreeMap::new();
        map.insert("job_id", self.job_id.clone());
        map.insert("working_dir", self.working_dir.clone());
        map.insert("command", self.command.clone());
        map.insert("start_time", self.start_time.clone());
        map.insert("host", self.host.clone());
        if let Some(desc) = &self.description {
            map.insert("description", desc.clone());
        }
        map.insert("display_dir", self.display_dir.clone());
        map.insert("display_cmd", self.display_cmd.clone());

        // Preserve declaration order rather than the BTreeMap's sort order,
        // since the metadata file is meant to read in a fixed field order,
        // not alphabetically.
        let ordered = ["job_id", "working_dir", "command", "start_time", "host"]
            .into_iter()
            .chain(self.description.is_some().then_some("description"))
            .chain(["display_dir", "display_cmd"]);

        ordered
            .filter_map(|key| map.get(key).map(|v| format!("{key}={v}")))
            .collect::<Vec<_>>()
            .join("\n")
            + "\n"
    }

    /// Parses a metadata file's text back into a `Metadata`. Round-trips
    /// with `to_text` for well-formed inputs.
    pub fn parse(text: &str) -> Result<Self, String> {
        let mut fields: BTreeMap<String, String> = BTreeMap::new();
        for line in text.lines() {
            if line.is_empty() {
                continue;
            }
            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| format!("malformed metadata line: {line}"))?;
            fields.insert(key.to_string(), value.to_string());
        }
        let required = |key: &str| -> Result<String, String> {
            fields
                .get(key)
                .cloned()
                .ok_or_else(|| format!("missing metadata key: {key}"))
        };
        Ok(Metadata {
            job_id: required("job_id")?,
            working_dir: required("working_dir")?,
            command: required("command")?,
            start_time: required("start_time")?,
            host: required("host")?,
            description: fields.get("description").cloned(),
            display_dir: required("display_dir")?,
            display_cmd: required("display_cmd")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> EnvelopeSpec {
        EnvelopeSpec {
            job_id: JobId::new(1),
            working_dir: "~/work".into(),
            command: "echo 'hi'".into(),
            paths: JobPaths {
                log: "~/.cache/rj/logs/1-20240102-030405.log".into(),
                status: "~/.cache/rj/logs/1-20240102-030405.status".into(),
                meta: "~/.cache/rj/logs/1-20240102-030405.meta".into(),
                pid: "~/.cache/rj/logs/1-20240102-030405.pid".into(),
            },
            start_time: 1_704_164_645,
            host: "build1".into(),
            description: None,
            notify_helper: None,
            timeout_secs: None,
            env: Vec::new(),
        }
    }

    #[test]
    fn compose_does_not_single_quote_tilde_paths() {
        let cmd = spec().compose();
        assert!(cmd.contains("~/.cache/rj/logs/1-20240102-030405.log"));
        assert!(!cmd.contains("'~/.cache/rj/logs/1-20240102-030405.log'"));
    }

    #[test]
    fn compose_preserves_user_command_quotes() {
        let cmd = spec().compose();
        // The escaped form of `echo 'hi'` must appear somewhere in the
        // composed command so the user's quoting survives.
        assert!(cmd.contains(r"echo '\''hi'\''"));
    }

    #[test]
    fn compose_exports_env_vars_before_launch() {
        let mut s = spec();
        s.env = vec![
            ("RUST_LOG".into(), "debug".into()),
            ("PATH_EXTRA".into(), "it's got a quote".into()),
        ];
        let cmd = s.compose();
        let export_pos = cmd.find("export RUST_LOG='debug'").unwrap();
        let launch_pos = cmd.find("bash -c ").unwrap();
        assert!(export_pos < launch_pos);
        assert!(cmd.contains(r"export PATH_EXTRA='it'\''s got a quote'"));
    }

    #[test]
    fn launch_command_wraps_script_body_in_bash_c() {
        let cmd = spec().launch_command();
        assert!(cmd.starts_with("bash -c '"));
    }

    #[yare::parameterized(
        no_prefix     = { "echo hi", "~/work", "echo hi" },
        plain         = { "cd /tmp/build && make", "/tmp/build", "make" },
        single_quoted = { "cd '/tmp/my dir' && make test", "/tmp/my dir", "make test" },
        double_quoted = { r#"cd "/tmp/my dir" && make test"#, "/tmp/my dir", "make test" },
    )]
    fn display_fields_follow_any_cd_prefix(command: &str, want_dir: &str, want_cmd: &str) {
        let (dir, cmd) = split_cd_prefix("~/work", command);
        assert_eq!(dir, want_dir);
        assert_eq!(cmd, want_cmd);
    }

    #[test]
    fn metadata_round_trips() {
        let m = spec().metadata();
        let text = m.to_text();
        let parsed = Metadata::parse(&text).unwrap();
        assert_eq!(parsed, m);
    }

    #[test]
    fn metadata_with_description_round_trips() {
        let mut s = spec();
        s.description = Some("nightly build".into());
        let m = s.metadata();
        let text = m.to_text();
        assert!(text.contains("description=nightly build"));
        let parsed = Metadata::parse(&text).unwrap();
        assert_eq!(parsed, m);
    }
}
