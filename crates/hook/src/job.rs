use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use chrono::{NaiveDate, NaiveTime};
use log::info;
use uuid::Uuid;
use crate::config::HookConfig;
use crate::error::Result;
use crate::schedule::{self, JobQueue, Slot};

/// A deferred re-encode of one imported file
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionJob {
    /// Names the two-pass statistics files so concurrent jobs never share them
    pub id: Uuid,
    pub input_path: PathBuf,
    pub output_bitrate_mbps: f64,
    pub scheduled_date: NaiveDate,
    /// Days after the allocation base, as handed to `at`
    pub offset_days: u64,
}

impl ConversionJob {
    pub fn new(input_path: PathBuf, output_bitrate_mbps: f64, slot: Slot) -> Self {
        ConversionJob {
            id: Uuid::new_v4(),
            input_path,
            output_bitrate_mbps,
            scheduled_date: slot.date,
            offset_days: slot.offset_days,
        }
    }

    /// Sibling path the second pass writes to: `<stem>_converted.<ext>`
    pub fn converted_path(&self) -> PathBuf {
        converted_path(&self.input_path)
    }
}

/// Get the path of the converted sibling for a media file
pub fn converted_path(input: &Path) -> PathBuf {
    let mut name = input.file_stem().map(OsStr::to_os_string).unwrap_or_default();
    name.push("_converted");
    if let Some(ext) = input.extension() {
        name.push(".");
        name.push(ext);
    }
    input.with_file_name(name)
}

/// One step of a conversion job, executed in order by the deferred shell
#[derive(Debug, Clone, PartialEq)]
pub enum JobStep {
    /// ffmpeg two-pass encode; pass 1 discards its output
    EncodePass {
        pass: u8,
        ffmpeg_bin: PathBuf,
        input: PathBuf,
        output: Option<PathBuf>,
        video_codec: String,
        bitrate_mbps: f64,
        pass_log: PathBuf,
    },
    RemoveOriginal { path: PathBuf },
    RenameConverted { from: PathBuf, to: PathBuf },
    RemovePassLogs { pass_log: PathBuf },
}

impl JobStep {
    /// Command line for this step; paths keep their exact bytes
    pub fn argv(&self) -> Vec<OsString> {
        match self {
            JobStep::EncodePass {
                pass,
                ffmpeg_bin,
                input,
                output,
                video_codec,
                bitrate_mbps,
                pass_log,
            } => {
                let mut args: Vec<OsString> = vec![
                    ffmpeg_bin.into(),
                    "-y".into(),
                    "-i".into(),
                    input.into(),
                    "-c:v".into(),
                    video_codec.into(),
                    "-b:v".into(),
                    format!("{}M", bitrate_mbps).into(),
                    "-pass".into(),
                    pass.to_string().into(),
                ];
                match output {
                    None => {
                        args.push("-vsync".into());
                        args.push("cfr".into());
                        args.push("-passlogfile".into());
                        args.push(pass_log.into());
                        args.push("-f".into());
                        args.push("null".into());
                        args.push("/dev/null".into());
                    }
                    Some(output) => {
                        args.push("-passlogfile".into());
                        args.push(pass_log.into());
                        args.push(output.into());
                    }
                }
                args
            }
            JobStep::RemoveOriginal { path } => vec!["rm".into(), "-f".into(), path.into()],
            JobStep::RenameConverted { from, to } => vec!["mv".into(), from.into(), to.into()],
            JobStep::RemovePassLogs { pass_log } => {
                let with_suffix = |suffix: &str| {
                    let mut name = pass_log.as_os_str().to_os_string();
                    name.push(suffix);
                    name
                };
                vec![
                    "rm".into(),
                    "-f".into(),
                    with_suffix("-0.log"),
                    with_suffix("-0.log.mbtree"),
                ]
            }
        }
    }
}

/// Builds conversion jobs and hands them to the deferred-job queue
pub struct JobComposer {
    ffmpeg_bin: PathBuf,
    video_codec: String,
    pass_log_dir: PathBuf,
    run_at: NaiveTime,
}

impl JobComposer {
    pub fn new(ffmpeg_bin: PathBuf, video_codec: String, pass_log_dir: PathBuf, run_at: NaiveTime) -> Self {
        JobComposer {
            ffmpeg_bin,
            video_codec,
            pass_log_dir,
            run_at,
        }
    }

    pub fn from_config(cfg: &HookConfig) -> anyhow::Result<Self> {
        Ok(Self::new(
            cfg.ffmpeg_bin.clone(),
            cfg.video_codec.clone(),
            cfg.pass_log_dir.clone(),
            cfg.run_time()?,
        ))
    }

    /// Ordered steps: analysis pass, encode pass, delete original, rename, clean up
    pub fn steps(&self, job: &ConversionJob) -> Vec<JobStep> {
        let pass_log = self.pass_log_dir.join(format!("reencode-{}", job.id));
        let converted = job.converted_path();
        let encode = |pass: u8, output: Option<PathBuf>| JobStep::EncodePass {
            pass,
            ffmpeg_bin: self.ffmpeg_bin.clone(),
            input: job.input_path.clone(),
            output,
            video_codec: self.video_codec.clone(),
            bitrate_mbps: job.output_bitrate_mbps,
            pass_log: pass_log.clone(),
        };

        vec![
            encode(1, None),
            encode(2, Some(converted.clone())),
            JobStep::RemoveOriginal {
                path: job.input_path.clone(),
            },
            JobStep::RenameConverted {
                from: converted,
                to: job.input_path.clone(),
            },
            JobStep::RemovePassLogs { pass_log },
        ]
    }

    /// Shell script for the whole job; each step runs only if the previous succeeded
    pub fn script(&self, job: &ConversionJob) -> OsString {
        render_script(&self.steps(job))
    }

    /// `at` timespec for the job's slot
    pub fn timespec(&self, job: &ConversionJob) -> String {
        schedule::timespec(self.run_at, job.offset_days)
    }

    /// Queue the job. Nothing on disk changes until the job itself runs.
    pub async fn submit(&self, queue: &dyn JobQueue, job: &ConversionJob) -> Result<()> {
        let script = self.script(job);
        let timespec = self.timespec(job);
        info!("Submitting job {} at '{}': {}", job.id, timespec, script.to_string_lossy());
        queue.submit(&script, &timespec).await
    }
}

/// Join steps into one `&&` chain of shell-quoted commands
pub fn render_script(steps: &[JobStep]) -> OsString {
    let mut script = OsString::new();
    for (i, step) in steps.iter().enumerate() {
        if i > 0 {
            script.push(" && ");
        }
        for (j, arg) in step.argv().iter().enumerate() {
            if j > 0 {
                script.push(" ");
            }
            script.push(shell_quote(arg));
        }
    }
    script
}

fn is_plain(bytes: &[u8]) -> bool {
    !bytes.is_empty()
        && bytes
            .iter()
            .all(|b| b.is_ascii_alphanumeric() || b"-_./:=+,@%".contains(b))
}

/// Quote a word for POSIX sh. Plain words pass through unchanged.
#[cfg(unix)]
pub fn shell_quote(word: &OsStr) -> OsString {
    use std::os::unix::ffi::{OsStrExt, OsStringExt};

    let bytes = word.as_bytes();
    if is_plain(bytes) {
        return word.to_os_string();
    }
    let mut quoted = Vec::with_capacity(bytes.len() + 2);
    quoted.push(b'\'');
    for &b in bytes {
        if b == b'\'' {
            quoted.extend_from_slice(br"'\''");
        } else {
            quoted.push(b);
        }
    }
    quoted.push(b'\'');
    OsString::from_vec(quoted)
}

/// Quote a word for POSIX sh. Plain words pass through unchanged.
#[cfg(not(unix))]
pub fn shell_quote(word: &OsStr) -> OsString {
    let text = word.to_string_lossy();
    if is_plain(text.as_bytes()) {
        return word.to_os_string();
    }
    format!("'{}'", text.replace('\'', r"'\''")).into()
}
