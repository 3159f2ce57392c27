//! Sequential job submission with polling and API-key rotation.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use loopgen_contracts::characters::ActionSpec;
use loopgen_contracts::events::EventWriter;
use serde_json::json;

use crate::credentials::{CredentialPool, Rotation};
use crate::normalize::backup_path_for;
use crate::providers::{GeneratedVideo, Operation, VideoProvider, VideoRequest};
use crate::{error_chain_text, mime_for_path, output_extension_from_mime, truncate_text};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_POLLS: u64 = 120;

#[derive(Debug, Clone)]
pub struct SubmitSettings {
    pub model: String,
    pub aspect_ratio: String,
    pub output_dir: PathBuf,
    pub poll_interval: Duration,
    /// `None` waits for as long as the service keeps the job open.
    pub max_polls: Option<u64>,
}

impl SubmitSettings {
    pub fn new(model: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            model: model.into(),
            aspect_ratio: "9:16".to_string(),
            output_dir: output_dir.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_polls: Some(DEFAULT_MAX_POLLS),
        }
    }
}

/// The fixed first frame every clip starts from.
#[derive(Debug, Clone)]
pub struct StartFrame {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl StartFrame {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)
            .with_context(|| format!("failed reading start frame {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            bytes,
            mime_type: mime_for_path(path).unwrap_or("image/jpeg").to_string(),
        })
    }
}

/// In-flight request for one action; dropped once the attempt resolves.
#[derive(Debug)]
struct GenerationJob {
    action: String,
    operation: Operation,
    polls: u64,
}

#[derive(Debug)]
enum JobResult {
    Completed(GeneratedVideo),
    /// The job finished but produced nothing usable.
    Empty { reason: String },
}

/// `Err` from `attempt` is reserved for local failures (event log IO) that
/// must stop the run; anything the provider does wrong is `Failed`.
#[derive(Debug)]
enum Attempt {
    Saved(PathBuf),
    Empty(String),
    Failed(anyhow::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionStatus {
    Succeeded { path: PathBuf },
    Failed { reason: String, exhausted: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    pub action: String,
    pub status: ActionStatus,
    pub attempts: usize,
    /// Rotations caused by failed attempts.
    pub retry_rotations: Vec<Rotation>,
    /// Rotation applied after a success to spread load across keys.
    pub balance_rotation: Option<Rotation>,
}

impl ActionOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self.status, ActionStatus::Succeeded { .. })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub succeeded: u64,
    pub failed: u64,
    pub outcomes: Vec<ActionOutcome>,
}

pub struct Submitter<'a> {
    provider: &'a dyn VideoProvider,
    pool: CredentialPool,
    settings: SubmitSettings,
    start_frame: StartFrame,
    events: EventWriter,
}

impl<'a> Submitter<'a> {
    pub fn new(
        provider: &'a dyn VideoProvider,
        pool: CredentialPool,
        settings: SubmitSettings,
        start_frame: StartFrame,
        events: EventWriter,
    ) -> Self {
        Self {
            provider,
            pool,
            settings,
            start_frame,
            events,
        }
    }

    pub fn pool(&self) -> &CredentialPool {
        &self.pool
    }

    /// Runs every action to completion, one after another, in the given order.
    pub fn run_batch(&mut self, actions: &[ActionSpec]) -> Result<BatchReport> {
        fs::create_dir_all(&self.settings.output_dir).with_context(|| {
            format!(
                "failed creating output directory {}",
                self.settings.output_dir.display()
            )
        })?;
        let mut report = BatchReport::default();
        for spec in actions {
            let outcome = self.run_action(spec)?;
            if outcome.succeeded() {
                report.succeeded += 1;
            } else {
                report.failed += 1;
            }
            report.outcomes.push(outcome);
        }
        Ok(report)
    }

    /// Tries each key at most once for `spec`.
    pub fn run_action(&mut self, spec: &ActionSpec) -> Result<ActionOutcome> {
        let max_attempts = self.pool.len();
        let mut retry_rotations = Vec::new();
        let mut last_reason = String::new();

        for attempt in 1..=max_attempts {
            self.events.emit_value(
                "action_started",
                json!({
                    "action": spec.id,
                    "attempt": attempt,
                    "key_index": self.pool.index(),
                }),
            )?;

            match self.attempt(spec)? {
                Attempt::Saved(path) => {
                    println!("  saved: {}", path.display());
                    let balance_rotation = self.rotate(&spec.id, "load_balance")?;
                    self.events.emit_value(
                        "action_succeeded",
                        json!({
                            "action": spec.id,
                            "attempt": attempt,
                            "path": path.to_string_lossy(),
                        }),
                    )?;
                    return Ok(ActionOutcome {
                        action: spec.id.clone(),
                        status: ActionStatus::Succeeded { path },
                        attempts: attempt,
                        retry_rotations,
                        balance_rotation,
                    });
                }
                Attempt::Empty(reason) => {
                    println!("  error: video generation failed ({reason})");
                    last_reason = reason;
                }
                Attempt::Failed(err) => {
                    let text = error_chain_text(&err, 512);
                    println!("  error: {text}");
                    last_reason = text;
                }
            }

            match self.rotate(&spec.id, "retry")? {
                Some(rotation) => {
                    retry_rotations.push(rotation);
                    println!("  retrying [{}]...", spec.id);
                }
                None => {
                    return self.fail(spec, attempt, retry_rotations, last_reason, false);
                }
            }
        }

        println!("  all API keys exhausted, skipping [{}]", spec.id);
        self.fail(spec, max_attempts, retry_rotations, last_reason, true)
    }

    fn fail(
        &self,
        spec: &ActionSpec,
        attempts: usize,
        retry_rotations: Vec<Rotation>,
        reason: String,
        exhausted: bool,
    ) -> Result<ActionOutcome> {
        self.events.emit_value(
            "action_failed",
            json!({
                "action": spec.id,
                "attempts": attempts,
                "reason": reason,
                "exhausted": exhausted,
            }),
        )?;
        Ok(ActionOutcome {
            action: spec.id.clone(),
            status: ActionStatus::Failed { reason, exhausted },
            attempts,
            retry_rotations,
            balance_rotation: None,
        })
    }

    fn rotate(&mut self, action: &str, cause: &str) -> Result<Option<Rotation>> {
        let Some(rotation) = self.pool.rotate() else {
            return Ok(None);
        };
        println!("  🔑 switching API key: {rotation}");
        self.events.emit_value(
            "key_rotated",
            json!({
                "action": action,
                "cause": cause,
                "from": rotation.from,
                "to": rotation.to,
            }),
        )?;
        Ok(Some(rotation))
    }

    fn attempt(&self, spec: &ActionSpec) -> Result<Attempt> {
        let api_key = self.pool.current();
        println!("\n[{}] starting video generation...", spec.id);
        println!("  duration: {}s", spec.duration_seconds);
        println!("  start frame: {}", self.start_frame.path.display());
        println!("  api key: {}", self.pool.describe_current());

        let request = VideoRequest {
            model: self.settings.model.clone(),
            prompt: spec.prompt.clone(),
            image_bytes: self.start_frame.bytes.clone(),
            image_mime_type: self.start_frame.mime_type.clone(),
            aspect_ratio: self.settings.aspect_ratio.clone(),
            duration_seconds: spec.duration_seconds,
            number_of_videos: 1,
        };

        println!("  sending request...");
        let operation = match self
            .provider
            .submit(api_key, &request)
            .with_context(|| format!("{} submit failed for [{}]", self.provider.name(), spec.id))
        {
            Ok(operation) => operation,
            Err(err) => return Ok(Attempt::Failed(err)),
        };
        self.events.emit_value(
            "job_submitted",
            json!({
                "action": spec.id,
                "operation": operation.name,
                "provider": self.provider.name(),
            }),
        )?;

        let mut job = GenerationJob {
            action: spec.id.clone(),
            operation,
            polls: 0,
        };
        let result = match self.wait_for_video(api_key, &mut job) {
            Ok(result) => result,
            Err(err) => return Ok(Attempt::Failed(err)),
        };
        self.events.emit_value(
            "job_finished",
            json!({
                "action": job.action,
                "operation": job.operation.name,
                "polls": job.polls,
                "empty": matches!(result, JobResult::Empty { .. }),
            }),
        )?;

        let video = match result {
            JobResult::Completed(video) => video,
            JobResult::Empty { reason } => return Ok(Attempt::Empty(reason)),
        };
        let ext = output_extension_from_mime(video.mime_type.as_deref());
        let output_path = self.output_path(&spec.id, ext);
        if let Err(err) = self
            .provider
            .download(api_key, &video, &output_path)
            .with_context(|| format!("failed saving [{}] output", spec.id))
        {
            return Ok(Attempt::Failed(err));
        }
        Ok(Attempt::Saved(output_path))
    }

    /// `<action>.<ext>`, or `<action>_clip.<ext>` when that name would land on
    /// the start frame, its PNG source, or its backup.
    fn output_path(&self, action: &str, ext: &str) -> PathBuf {
        let candidate = self.settings.output_dir.join(format!("{action}.{ext}"));
        let frame = &self.start_frame.path;
        let reserved = [
            frame.clone(),
            frame.with_extension("png"),
            frame.with_extension("jpg"),
            backup_path_for(frame),
        ];
        if reserved.iter().any(|path| same_path(path, &candidate)) {
            return self
                .settings
                .output_dir
                .join(format!("{action}_clip.{ext}"));
        }
        candidate
    }

    /// Polls until the operation reports done, or `max_polls` checks have passed.
    fn wait_for_video(&self, api_key: &str, job: &mut GenerationJob) -> Result<JobResult> {
        println!("    waiting for video generation...");
        while !job.operation.done {
            if let Some(limit) = self.settings.max_polls {
                if job.polls >= limit {
                    bail!(
                        "gave up on {} after {} checks; the remote job may still be running",
                        job.operation.name,
                        job.polls
                    );
                }
            }
            job.polls += 1;
            println!("    generating... (check #{})", job.polls);
            thread::sleep(self.settings.poll_interval);
            job.operation = self
                .provider
                .refresh(api_key, &job.operation)
                .with_context(|| format!("polling {} failed", job.operation.name))?;
        }

        if let Some(error) = job.operation.error.as_deref() {
            return Ok(JobResult::Empty {
                reason: format!("operation finished with an error: {error}"),
            });
        }
        match job.operation.videos.first() {
            Some(video) => Ok(JobResult::Completed(video.clone())),
            None => Ok(JobResult::Empty {
                reason: format!(
                    "no video generated, response: {}",
                    truncate_text(&job.operation.raw.to_string(), 256)
                ),
            }),
        }
    }
}

fn same_path(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
