use std::collections::BTreeSet;
use std::ffi::OsString;
use chrono::{NaiveDateTime, NaiveTime};
use log::info;
use crate::bitrate::{self, BitrateEstimate, BlockSizer, FileSizer};
use crate::config::HookConfig;
use crate::error::{HookError, Result};
use crate::event::{EventType, ImportEvent};
use crate::ffprobe::{DurationProbe, FfprobeDuration};
use crate::job::{ConversionJob, JobComposer};
use crate::quality::{self, QualityProfile};
use crate::schedule::{self, AtQueue, JobQueue};

/// How an invocation ended without error
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Download manager connection test
    TestEvent,
    /// Quality label matched no profile
    UnrecognizedQuality { label: String },
    /// Bitrate at or below the profile threshold
    UnderThreshold {
        estimate: BitrateEstimate,
        profile: QualityProfile,
    },
    /// Job composed but not submitted
    DryRun {
        job: ConversionJob,
        script: OsString,
        timespec: String,
    },
    /// Job handed to the deferred-job scheduler
    Scheduled { job: ConversionJob },
}

/// One import event in, at most one conversion job out
pub struct Hook {
    composer: JobComposer,
    run_at: NaiveTime,
    dry_run: bool,
    sizer: Box<dyn FileSizer>,
    probe: Box<dyn DurationProbe>,
    queue: Box<dyn JobQueue>,
}

impl Hook {
    pub fn new(
        composer: JobComposer,
        run_at: NaiveTime,
        dry_run: bool,
        sizer: Box<dyn FileSizer>,
        probe: Box<dyn DurationProbe>,
        queue: Box<dyn JobQueue>,
    ) -> Self {
        Hook {
            composer,
            run_at,
            dry_run,
            sizer,
            probe,
            queue,
        }
    }

    /// Hook backed by the filesystem, ffprobe and at/atq
    pub fn from_config(cfg: &HookConfig) -> anyhow::Result<Self> {
        Ok(Self::new(
            JobComposer::from_config(cfg)?,
            cfg.run_time()?,
            cfg.dry_run,
            Box::new(BlockSizer),
            Box::new(FfprobeDuration::new(cfg.ffprobe_bin.clone())),
            Box::new(AtQueue::new(cfg.at_bin.clone(), cfg.atq_bin.clone())),
        ))
    }

    /// Process one import event. `now` is local wall-clock time.
    pub async fn run(&self, event: &ImportEvent, now: NaiveDateTime) -> Result<Outcome> {
        match &event.event_type {
            EventType::Test => {
                info!("Test event received, nothing to do");
                return Ok(Outcome::TestEvent);
            }
            EventType::Download => {}
            EventType::Other(kind) => {
                return Err(HookError::Input(format!(
                    "unsupported event type {}, only Download (import/upgrade) events are handled",
                    kind
                )));
            }
        }

        let Some(profile) = quality::classify(&event.quality_label) else {
            info!("Unrecognized quality '{}', exiting", event.quality_label);
            return Ok(Outcome::UnrecognizedQuality {
                label: event.quality_label.clone(),
            });
        };

        let estimate =
            bitrate::estimate(self.sizer.as_ref(), self.probe.as_ref(), &event.file_path).await?;

        if estimate.mbps() <= profile.target_bitrate_mbps {
            info!(
                "{} is {:.3}Mb/s, within the {}Mb/s limit for '{}'",
                event.file_path.display(),
                estimate.mbps(),
                profile.target_bitrate_mbps,
                event.quality_label
            );
            return Ok(Outcome::UnderThreshold { estimate, profile });
        }

        info!(
            "Converting {} from {:.3}Mb/s -> {}Mb/s",
            event.file_path.display(),
            estimate.mbps(),
            profile.conversion_bitrate_mbps
        );

        let queued = self.queue.scheduled_dates().await?;
        info!("{} conversion task(s) already in queue", queued.len());

        let occupied: BTreeSet<_> = queued.into_iter().collect();
        let base = schedule::allocation_base(now, self.run_at);
        let slot = schedule::allocate(&occupied, base).ok_or_else(|| HookError::SchedulerQuery {
            reason: format!("no free day left on the calendar after {}", base),
            exit_code: None,
        })?;
        info!("Allocated {} ({} day(s) from {})", slot.date, slot.offset_days, base);

        let job = ConversionJob::new(
            event.file_path.clone(),
            profile.conversion_bitrate_mbps,
            slot,
        );

        if self.dry_run {
            let script = self.composer.script(&job);
            let timespec = self.composer.timespec(&job);
            info!("Dry run, not submitting job {} at '{}': {}", job.id, timespec, script.to_string_lossy());
            return Ok(Outcome::DryRun {
                job,
                script,
                timespec,
            });
        }

        self.composer.submit(self.queue.as_ref(), &job).await?;
        Ok(Outcome::Scheduled { job })
    }
}
