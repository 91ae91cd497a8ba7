// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue file line codec: tab-delimited records written by
//! the lifecycle coordinator and consumed by the deployed queue-runner
//! script. Keeping the codec here, shared by `rj-engine` (writer) and
//! `rj-adapters` (script template generator), is what keeps the wire format
//! from drifting between the two.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::id::JobId;

/// A dependency predicate attached to a queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfterSpec {
    /// No dependency.
    None,
    /// Wait for the referenced job's status file to contain exit code 0.
    Success(JobId),
    /// Wait for the referenced job's status file to exist with any code.
    Any(JobId),
}

impl AfterSpec {
    pub fn to_field(self) -> String {
        match self {
            AfterSpec::None => String::new(),
            AfterSpec::Success(id) => id.to_string(),
            AfterSpec::Any(id) => format!("{id}:any"),
        }
    }

    pub fn parse_field(field: &str) -> Result<Self, String> {
        if field.is_empty() {
            return Ok(AfterSpec::None);
        }
        if let Some(id_str) = field.strip_suffix(":any") {
            let id: i64 = id_str
                .parse()
                .map_err(|_| format!("invalid after-spec job id: {id_str}"))?;
            return Ok(AfterSpec::Any(JobId::new(id)));
        }
        let id: i64 = field
            .parse()
            .map_err(|_| format!("invalid after-spec job id: {field}"))?;
        Ok(AfterSpec::Success(JobId::new(id)))
    }
}

/// One line of a `{queue_name}.queue` file.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueLine {
    pub job_id: JobId,
    pub working_dir: String,
    pub command: String,
    pub description: String,
    pub env: Vec<(String, String)>,
    pub after: AfterSpec,
}

impl QueueLine {
    /// Serializes to the tab-separated, newline-terminated format:
    /// `{job_id}\t{working_dir}\t{command}\t{description}\t{env_b64}\t{after_spec}`.
    pub fn to_line(&self) -> String {
        let env_plain = self
            .env
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("\n");
        let env_b64 = STANDARD.encode(env_plain);
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}",
            self.job_id,
            self.working_dir,
            self.command,
            self.description,
            env_b64,
            self.after.to_field(),
        )
    }

    /// Parses a single queue-file line. Malformed lines are rejected by
    /// returning `Err` rather than panicking; the runner/synchronizer decide
    /// what "continue" means in their own loop.
    pub fn parse_line(line: &str) -> Result<Self, String> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != 6 {
            return Err(format!(
                "expected 6 tab-delimited fields, got {}",
                fields.len()
            ));
        }
        let job_id: i64 = fields[0]
            .parse()
            .map_err(|_| format!("invalid job id: {}", fields[0]))?;
        let env_plain = STANDARD
            .decode(fields[4])
            .map_err(|e| format!("invalid env_vars_b64: {e}"))?;
        let env_plain = String::from_utf8(env_plain)
            .map_err(|e| format!("env_vars_b64 is not utf-8: {e}"))?;
        let env = env_plain
            .lines()
            .filter(|l| !l.is_empty())
            .map(|l| {
                l.split_once('=')
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .ok_or_else(|| format!("invalid env line: {l}"))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let after = AfterSpec::parse_field(fields[5])?;

        Ok(QueueLine {
            job_id: JobId::new(job_id),
            working_dir: fields[1].to_string(),
            command: fields[2].to_string(),
            description: fields[3].to_string(),
            env,
            after,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_line_format() {
        let line = QueueLine {
            job_id: JobId::new(3),
            working_dir: "~/proj".into(),
            command: "echo hi".into(),
            description: "desc".into(),
            env: vec![("FOO".into(), "bar".into()), ("BAZ".into(), "1".into())],
            after: AfterSpec::Success(JobId::new(2)),
        };
        let serialized = line.to_line();
        let parsed = QueueLine::parse_line(&serialized).unwrap();
        assert_eq!(parsed, line);
    }

    #[test]
    fn after_spec_field_formats() {
        assert_eq!(AfterSpec::None.to_field(), "");
        assert_eq!(AfterSpec::Success(JobId::new(5)).to_field(), "5");
        assert_eq!(AfterSpec::Any(JobId::new(5)).to_field(), "5:any");
    }

    #[test]
    fn after_spec_parses_all_variants() {
        assert_eq!(AfterSpec::parse_field("").unwrap(), AfterSpec::None);
        assert_eq!(
            AfterSpec::parse_field("9").unwrap(),
            AfterSpec::Success(JobId::new(9))
        );
        assert_eq!(
            AfterSpec::parse_field("9:any").unwrap(),
            AfterSpec::Any(JobId::new(9))
        );
        assert!(AfterSpec::parse_field("nope").is_err());
    }

    #[test]
    fn malformed_line_is_rejected_not_panicked() {
        assert!(QueueLine::parse_line("only\tfour\tfields\there").is_err());
    }

    #[test]
    fn empty_env_round_trips() {
        let line = QueueLine {
            job_id: JobId::new(1),
            working_dir: "~/x".into(),
            command: "true".into(),
            description: String::new(),
            env: vec![],
            after: AfterSpec::None,
        };
        let parsed = QueueLine::parse_line(&line.to_line()).unwrap();
        assert_eq!(parsed, line);
    }
}
