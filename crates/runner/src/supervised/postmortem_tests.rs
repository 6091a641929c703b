// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::io::Write;
use yare::parameterized;

fn log_with(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

fn epoch(seconds: i64) -> SystemTime {
    SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(seconds as u64)
}

#[parameterized(
    process_kill = {
        "2026-07-28T10:00:00Z: PM log: pid=1234 msg=process killed\n",
        1234,
        "proc-a",
        Verdict::Killed("Process killed by supervisor".to_string()),
    },
    process_signal = {
        "2026-07-28T10:00:00Z: PM log: App [proc-a:0] exited with code [137] via signal [SIGKILL]\n",
        1234,
        "proc-a",
        Verdict::Killed("Process killed by system (SIGKILL exit code 137)".to_string()),
    },
    pm_kill = {
        "2026-07-28T10:00:00Z: PM log: PM successfully stopped\n",
        1234,
        "proc-a",
        Verdict::Killed("Supervisor is dead".to_string()),
    },
    clean_exit = {
        "2026-07-28T10:00:00Z: PM log: App [proc-a:0] online\n",
        1234,
        "proc-a",
        Verdict::Clean,
    },
    process_kill_wrong_pid_falls_through_to_clean = {
        "2026-07-28T10:00:00Z: PM log: pid=9999 msg=process killed\n",
        1234,
        "proc-a",
        Verdict::Clean,
    },
    process_signal_wrong_name_falls_through_to_clean = {
        "2026-07-28T10:00:00Z: PM log: App [proc-b:0] exited with code [137] via signal [SIGKILL]\n",
        1234,
        "proc-a",
        Verdict::Clean,
    },
    non_matching_line_is_ignored = {
        "2026-07-28T10:00:00Z some unrelated supervisor chatter\n",
        1234,
        "proc-a",
        Verdict::Clean,
    },
)]
fn classifies_log_lines(log_body: &str, pid: u32, proc_name: &str, expected: Verdict) {
    let verdict = classify_lines(log_body, pid, proc_name, epoch(0));
    assert_eq!(verdict, expected);
}

#[test]
fn lines_before_the_start_timestamp_are_ignored() {
    let body = "2026-07-28T09:59:00Z: PM log: pid=1234 msg=process killed\n";
    let verdict = classify_lines(body, 1234, "proc-a", epoch(1_900_000_000));
    assert_eq!(verdict, Verdict::Clean);
}

#[test]
fn process_kill_takes_priority_over_pm_kill() {
    let body = "2026-07-28T10:00:00Z: PM log: pid=1234 msg=process killed\n\
                2026-07-28T10:00:01Z: PM log: PM successfully stopped\n";
    let verdict = classify_lines(body, 1234, "proc-a", epoch(0));
    assert_eq!(
        verdict,
        Verdict::Killed("Process killed by supervisor".to_string())
    );
}

#[test]
fn only_the_last_five_lines_are_considered() {
    // Six PM log lines: the process-kill match sits in the oldest line,
    // outside the trailing five-line window, so it must not decide the
    // verdict even though it is within the timestamp cutoff.
    let body = "2026-07-28T10:00:00Z: PM log: pid=1234 msg=process killed\n\
                2026-07-28T10:00:01Z: PM log: App [proc-b:0] online\n\
                2026-07-28T10:00:02Z: PM log: App [proc-b:1] online\n\
                2026-07-28T10:00:03Z: PM log: App [proc-b:2] online\n\
                2026-07-28T10:00:04Z: PM log: App [proc-b:3] online\n\
                2026-07-28T10:00:05Z: PM log: App [proc-b:4] online\n";
    let verdict = classify_lines(body, 1234, "proc-a", epoch(0));
    assert_eq!(verdict, Verdict::Clean);
}

#[tokio::test]
async fn run_reads_the_file_and_classifies_it() {
    let file = log_with("2026-07-28T10:00:00Z: PM log: PM successfully stopped\n");
    let verdict = run(file.path(), 4096, 1234, "proc-a", epoch(0)).await.unwrap();
    assert_eq!(verdict, Verdict::Killed("Supervisor is dead".to_string()));
}

#[tokio::test]
async fn run_errors_when_the_log_file_is_missing() {
    let err = run(Path::new("/nonexistent/path.log"), 4096, 1234, "proc-a", epoch(0))
        .await
        .unwrap_err();
    assert!(matches!(err, RunnerError::PostMortem(_)));
}
