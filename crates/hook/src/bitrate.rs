use std::path::Path;
use log::debug;
use crate::error::{HookError, Result};
use crate::ffprobe::{self, DurationProbe};

/// Reports on-disk file size in kilobytes
pub trait FileSizer: Send + Sync {
    fn size_kb(&self, file_path: &Path) -> Result<f64>;
}

/// Sizes files by allocated blocks, the granularity `ls -s` and `du` report
pub struct BlockSizer;

impl FileSizer for BlockSizer {
    fn size_kb(&self, file_path: &Path) -> Result<f64> {
        let metadata = std::fs::metadata(file_path).map_err(|source| HookError::Io {
            path: file_path.to_path_buf(),
            source,
        })?;
        Ok(allocated_kb(&metadata))
    }
}

#[cfg(unix)]
fn allocated_kb(metadata: &std::fs::Metadata) -> f64 {
    use std::os::unix::fs::MetadataExt;
    blocks_to_kb(metadata.blocks())
}

/// 512-byte blocks to whole KB, rounding up like `ls -s`
#[cfg_attr(not(unix), allow(dead_code))]
fn blocks_to_kb(blocks: u64) -> f64 {
    blocks.div_ceil(2) as f64
}

#[cfg(not(unix))]
fn allocated_kb(metadata: &std::fs::Metadata) -> f64 {
    metadata.len().div_ceil(1024) as f64
}

/// Average bitrate of a media file and the inputs it was derived from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BitrateEstimate {
    pub size_kb: f64,
    pub duration_secs: f64,
    /// Kilobits per second
    pub kbps: f64,
}

impl BitrateEstimate {
    pub fn from_parts(size_kb: f64, duration_secs: f64) -> Self {
        BitrateEstimate {
            size_kb,
            duration_secs,
            kbps: 8.0 * size_kb / duration_secs,
        }
    }

    /// Megabits per second
    pub fn mbps(&self) -> f64 {
        self.kbps / 1000.0
    }
}

/// Estimate the average bitrate of `file_path` from its size and longest stream
pub async fn estimate(
    sizer: &dyn FileSizer,
    probe: &dyn DurationProbe,
    file_path: &Path,
) -> Result<BitrateEstimate> {
    let size_kb = sizer.size_kb(file_path)?;
    debug!("{} occupies {} KB", file_path.display(), size_kb);

    let output = probe.stream_durations(file_path).await?;
    let duration_secs = ffprobe::max_duration(&output).ok_or_else(|| HookError::Probe {
        path: file_path.to_path_buf(),
        reason: "no numeric stream duration reported".to_string(),
        exit_code: None,
    })?;
    debug!("{} longest stream: {}s", file_path.display(), duration_secs);

    Ok(BitrateEstimate::from_parts(size_kb, duration_secs))
}
