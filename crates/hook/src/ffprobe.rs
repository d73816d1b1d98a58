use std::ffi::OsString;
use std::path::{Path, PathBuf};
use async_trait::async_trait;
use log::debug;
use tokio::process::Command;
use crate::error::{HookError, Result};

/// Reports the duration of every stream in a media file
#[async_trait]
pub trait DurationProbe: Send + Sync {
    /// Raw probe output: one value per line, in seconds where known.
    /// Lines may be non-numeric (e.g. `N/A`).
    async fn stream_durations(&self, file_path: &Path) -> Result<String>;
}

/// ffprobe-backed duration probe
pub struct FfprobeDuration {
    ffprobe_bin: PathBuf,
}

impl FfprobeDuration {
    pub fn new(ffprobe_bin: PathBuf) -> Self {
        FfprobeDuration { ffprobe_bin }
    }

    fn args(file_path: &Path) -> Vec<OsString> {
        vec![
            "-v".into(),
            "error".into(),
            "-show_entries".into(),
            "stream=duration:format=duration".into(),
            "-of".into(),
            "default=noprint_wrappers=1:nokey=1".into(),
            file_path.into(),
        ]
    }
}

#[async_trait]
impl DurationProbe for FfprobeDuration {
    async fn stream_durations(&self, file_path: &Path) -> Result<String> {
        let args = Self::args(file_path);
        debug!(
            "Executing FFprobe: {} {}",
            self.ffprobe_bin.display(),
            args.iter().map(|a| a.to_string_lossy()).collect::<Vec<_>>().join(" ")
        );

        let output = Command::new(&self.ffprobe_bin)
            .args(&args)
            .output()
            .await
            .map_err(|e| HookError::Probe {
                path: file_path.to_path_buf(),
                reason: format!("failed to execute {}: {}", self.ffprobe_bin.display(), e),
                exit_code: None,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(HookError::Probe {
                path: file_path.to_path_buf(),
                reason: format!("ffprobe exited with {}: {}", output.status, stderr.trim()),
                exit_code: output.status.code(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Longest duration among the numeric lines of probe output.
///
/// Non-numeric, non-finite and non-positive values are skipped. Returns `None`
/// when no usable duration remains.
pub fn max_duration(probe_output: &str) -> Option<f64> {
    probe_output
        .lines()
        .filter_map(|line| line.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .fold(None, |longest, d| match longest {
            Some(current) if current >= d => Some(current),
            _ => Some(d),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_longest_stream_wins() {
        assert_eq!(max_duration("5.0\n12.3\ngarbage\n9.9\n"), Some(12.3));
    }

    #[test]
    fn test_na_and_blank_lines_ignored() {
        let output = "N/A\n\n1421.504000\n1421.480000\n1421.504000\n";
        assert_eq!(max_duration(output), Some(1421.504));
    }

    #[test]
    fn test_no_numeric_duration() {
        assert_eq!(max_duration(""), None);
        assert_eq!(max_duration("N/A\nN/A\n"), None);
        assert_eq!(max_duration("0\n"), None);
        assert_eq!(max_duration("NaN\ninf\n"), None);
    }

    #[test]
    fn test_ffprobe_args() {
        let args = FfprobeDuration::args(Path::new("/tv/My Show/S01E01.mkv"));
        assert_eq!(args.last().unwrap(), "/tv/My Show/S01E01.mkv");
        assert!(args.iter().any(|a| a == "stream=duration:format=duration"));
    }

    #[cfg(unix)]
    #[test]
    fn test_args_keep_raw_path_bytes() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let path = Path::new(OsStr::from_bytes(b"/tv/caf\xe9.mkv"));
        let args = FfprobeDuration::args(path);
        assert_eq!(args.last().unwrap().as_bytes(), b"/tv/caf\xe9.mkv");
    }

    /// Executable shell script standing in for the duration tool
    #[cfg(unix)]
    fn fake_tool(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("durations");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_duration_listing_and_argv() {
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_tool(
            dir.path(),
            "printf '%s\\n' \"$@\" > \"$(dirname \"$0\")/args\"; printf '5.0\\nN/A\\n12.3\\n'",
        );
        let tool = FfprobeDuration::new(bin);

        let output = tool
            .stream_durations(Path::new("/tv/My Show/S01E01.mkv"))
            .await
            .unwrap();
        assert_eq!(output, "5.0\nN/A\n12.3\n");
        assert_eq!(max_duration(&output), Some(12.3));

        let args = std::fs::read_to_string(dir.path().join("args")).unwrap();
        assert_eq!(
            args.lines().collect::<Vec<_>>(),
            vec![
                "-v",
                "error",
                "-show_entries",
                "stream=duration:format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
                "/tv/My Show/S01E01.mkv",
            ]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_duration_tool_failure_keeps_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_tool(dir.path(), "echo 'Invalid data found' >&2; exit 1");
        let tool = FfprobeDuration::new(bin);

        let err = tool.stream_durations(Path::new("/tv/a.mkv")).await.unwrap_err();
        assert!(matches!(err, HookError::Probe { exit_code: Some(1), .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_missing_duration_tool_has_no_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let tool = FfprobeDuration::new(dir.path().join("no-such-tool"));

        let err = tool.stream_durations(Path::new("/tv/a.mkv")).await.unwrap_err();
        assert!(matches!(err, HookError::Probe { exit_code: None, .. }));
        assert_eq!(err.exit_code(), 1);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn test_result_independent_of_stream_order(
            mut durations in prop::collection::vec(0.1f64..20_000.0, 1..8),
        ) {
            let expected = durations.iter().cloned().fold(f64::MIN, f64::max);
            let forward: Vec<String> = durations.iter().map(|d| d.to_string()).collect();
            durations.reverse();
            let backward: Vec<String> = durations.iter().map(|d| d.to_string()).collect();

            prop_assert_eq!(max_duration(&forward.join("\n")), Some(expected));
            prop_assert_eq!(max_duration(&backward.join("\n")), Some(expected));
        }
    }
}
