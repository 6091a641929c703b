// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Post-mortem log-tail classification (spec §4.5.b).
//!
//! A clean-looking exit (status "stopped", code 0) can still be a kill the
//! supervisor swallowed. We tail its aggregate log and look for one of
//! three line shapes, in priority order, restricted to lines timestamped
//! at or after the process's start:
//!
//! 1. `processKill` — the supervisor logs the pid it killed.
//! 2. `processSignal` — the supervisor logs the app name/instance and the
//!    signal/exit code the OS reported.
//! 3. `pmKill` — the supervisor logs that it is shutting itself down.
//!
//! The first pattern that matches wins; no match means the exit was clean.

use crate::error::RunnerError;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use std::time::SystemTime;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Clean,
    Killed(String),
}

/// Every PM log line shares this envelope: `<ISO-timestamp>: PM log: <rest>`.
#[allow(clippy::expect_used)]
fn envelope_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<ts>\S+):\s+PM log:\s+(?P<rest>.*)$").expect("constant regex pattern is valid")
    })
}

#[allow(clippy::expect_used)]
fn process_kill_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^pid=(?P<pid>\d+)\s+msg=").expect("constant regex pattern is valid")
    })
}

#[allow(clippy::expect_used)]
fn process_signal_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^App \[(?P<name>[^:\]]+):\d+\] exited with code \[(?P<code>-?\d+)\] via signal \[(?P<signal>SIGTERM|SIGKILL)\]",
        )
        .expect("constant regex pattern is valid")
    })
}

#[allow(clippy::expect_used)]
fn pm_kill_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^PM successfully stopped$").expect("constant regex pattern is valid"))
}

fn line_timestamp(ts: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(ts).ok().map(|dt| dt.with_timezone(&Utc))
}

/// Splits `contents` into lines and keeps only the trailing `n` (spec
/// §4.5.b: "split into lines, keep the last five"). A tail window large
/// enough to hold more than five PM log lines must not let an older line
/// outside this trailing slice decide the verdict.
fn last_lines(contents: &str, n: usize) -> Vec<&str> {
    let lines: Vec<&str> = contents.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].to_vec()
}

/// Reads the last `tail_size` bytes of `log_path` and classifies them.
pub async fn run(
    log_path: &Path,
    tail_size: u64,
    pid: u32,
    proc_name: &str,
    since: SystemTime,
) -> Result<Verdict, RunnerError> {
    let contents = read_tail(log_path, tail_size)
        .await
        .map_err(|e| RunnerError::PostMortem(format!("failed to read {}: {e}", log_path.display())))?;
    let since: DateTime<Utc> = since.into();
    Ok(classify_lines(&contents, pid, proc_name, since))
}

async fn read_tail(path: &Path, tail_size: u64) -> std::io::Result<String> {
    use tokio::io::{AsyncReadExt, AsyncSeekExt};

    let mut file = tokio::fs::File::open(path).await?;
    let len = file.metadata().await?.len();
    if len > tail_size {
        file.seek(std::io::SeekFrom::Start(len - tail_size)).await?;
    }
    let mut buf = String::new();
    file.read_to_string(&mut buf).await?;
    Ok(buf)
}

#[allow(clippy::expect_used)]
fn classify_lines(contents: &str, pid: u32, proc_name: &str, since: DateTime<Utc>) -> Verdict {
    let relevant: Vec<&str> = last_lines(contents, 5)
        .into_iter()
        .filter_map(|line| envelope_re().captures(line).map(|caps| (caps, line)))
        .filter(|(caps, _)| {
            line_timestamp(&caps["ts"]).map(|ts| ts >= since).unwrap_or(false)
        })
        .map(|(caps, line)| {
            let rest_start = caps.name("rest").expect("envelope always has a rest group").start();
            &line[rest_start..]
        })
        .collect();

    for rest in &relevant {
        if let Some(caps) = process_kill_re().captures(rest) {
            if caps["pid"].parse::<u32>().ok() == Some(pid) {
                return Verdict::Killed("Process killed by supervisor".to_string());
            }
        }
    }

    for rest in &relevant {
        if let Some(caps) = process_signal_re().captures(rest) {
            if &caps["name"] == proc_name {
                let signal = &caps["signal"];
                let code = &caps["code"];
                return Verdict::Killed(format!(
                    "Process killed by system ({signal} exit code {code})"
                ));
            }
        }
    }

    if relevant.iter().any(|rest| pm_kill_re().is_match(rest)) {
        return Verdict::Killed("Supervisor is dead".to_string());
    }

    Verdict::Clean
}

#[cfg(test)]
#[path = "postmortem_tests.rs"]
mod tests;
