use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::path::PathBuf;
use std::process::Stdio;
use async_trait::async_trait;
use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};
use log::{debug, info};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use crate::error::{HookError, Result};

/// Host deferred-job scheduler
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Calendar dates of every queued job, in ascending order (duplicates kept)
    async fn scheduled_dates(&self) -> Result<Vec<NaiveDate>>;

    /// Queue a shell script to run once at `timespec`
    async fn submit(&self, script: &OsStr, timespec: &str) -> Result<()>;
}

/// A free calendar day for the next conversion job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub date: NaiveDate,
    /// Days from the allocation base to `date`
    pub offset_days: u64,
}

/// Earliest day at or after `today` with no job queued on it.
///
/// Each calendar day holds at most one conversion, whatever time of day the
/// existing jobs are set for. Returns `None` only if the free day would lie
/// past the last representable date.
pub fn allocate(existing: &BTreeSet<NaiveDate>, today: NaiveDate) -> Option<Slot> {
    let mut offset_days = 0u64;
    let mut date = today;
    while existing.contains(&date) {
        offset_days += 1;
        date = today.checked_add_days(Days::new(offset_days))?;
    }
    Some(Slot { date, offset_days })
}

/// Day the allocator counts from.
///
/// Once the run time has passed, `at HH:MM` means tomorrow, so the count has to
/// start there too.
pub fn allocation_base(now: NaiveDateTime, run_at: NaiveTime) -> NaiveDate {
    let today = now.date();
    if now.time() < run_at {
        today
    } else {
        today.succ_opt().unwrap_or(today)
    }
}

/// `at` timespec for a slot, relative to the allocation base
pub fn timespec(run_at: NaiveTime, offset_days: u64) -> String {
    let time = run_at.format("%H:%M");
    if offset_days == 0 {
        time.to_string()
    } else {
        format!("{} + {} days", time, offset_days)
    }
}

/// Parse `atq` output into job dates.
///
/// Lines look like `12\tMon Oct 19 23:00:00 2026 a pi`; only month, day and
/// year are read.
pub fn parse_atq(listing: &str) -> Result<Vec<NaiveDate>> {
    let mut dates = Vec::new();
    for line in listing.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < 6 {
            return Err(HookError::SchedulerQuery {
                reason: format!("unrecognized atq line: {:?}", line),
                exit_code: None,
            });
        }
        let date_str = format!("{} {} {}", tokens[2], tokens[3], tokens[5]);
        let date = NaiveDate::parse_from_str(&date_str, "%b %d %Y").map_err(|e| {
            HookError::SchedulerQuery {
                reason: format!("bad date in atq line {:?}: {}", line, e),
                exit_code: None,
            }
        })?;
        dates.push(date);
    }
    dates.sort();
    Ok(dates)
}

/// at(1)/atq(1) backed job queue
pub struct AtQueue {
    at_bin: PathBuf,
    atq_bin: PathBuf,
}

impl AtQueue {
    pub fn new(at_bin: PathBuf, atq_bin: PathBuf) -> Self {
        AtQueue { at_bin, atq_bin }
    }
}

#[async_trait]
impl JobQueue for AtQueue {
    async fn scheduled_dates(&self) -> Result<Vec<NaiveDate>> {
        let output = Command::new(&self.atq_bin)
            .output()
            .await
            .map_err(|e| HookError::SchedulerQuery {
                reason: format!("failed to execute {}: {}", self.atq_bin.display(), e),
                exit_code: None,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(HookError::SchedulerQuery {
                reason: format!("atq exited with {}: {}", output.status, stderr.trim()),
                exit_code: output.status.code(),
            });
        }

        let listing = String::from_utf8_lossy(&output.stdout);
        debug!("atq listing:\n{}", listing.trim_end());
        parse_atq(&listing)
    }

    async fn submit(&self, script: &OsStr, timespec: &str) -> Result<()> {
        let submission_error = |reason: String| HookError::Submission {
            reason,
            exit_code: None,
        };

        let mut child = Command::new(&self.at_bin)
            .args(timespec.split_whitespace())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| submission_error(format!("failed to execute {}: {}", self.at_bin.display(), e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| submission_error("failed to open at stdin".to_string()))?;
        stdin
            .write_all(script.as_encoded_bytes())
            .await
            .map_err(|e| submission_error(format!("failed to write job to at: {}", e)))?;
        stdin
            .write_all(b"\n")
            .await
            .map_err(|e| submission_error(format!("failed to write job to at: {}", e)))?;
        // Closing stdin lets at read EOF and queue the job
        drop(stdin);

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| submission_error(format!("failed to wait for at: {}", e)))?;

        // at reports the queued job id on stderr even on success
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            return Err(HookError::Submission {
                reason: format!("at exited with {}: {}", output.status, stderr.trim()),
                exit_code: output.status.code(),
            });
        }

        info!("at accepted job: {}", stderr.trim());
        Ok(())
    }
}
