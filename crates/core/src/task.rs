//! Transcode task runner.
//!
//! Collapses the event stream of one engine invocation into a single outcome.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::engine::{EncodeRequest, Engine, EngineEvent};
use crate::layout::ProfileName;
use crate::metrics;

/// One preset's unit of work within a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeTask {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub profile: ProfileName,
    pub download_url: String,
}

/// What a successful task hands back to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutput {
    pub profile: ProfileName,
    pub download_url: String,
}

/// Why a single task failed.
#[derive(Debug, Error)]
pub enum TranscodeError {
    /// The engine emitted an error event.
    #[error("Encoding with preset '{profile}' failed: {message}")]
    Engine {
        profile: ProfileName,
        message: String,
    },

    #[error("Encoding with preset '{profile}' timed out after {timeout_secs} seconds")]
    Timeout {
        profile: ProfileName,
        timeout_secs: u64,
    },

    #[error("Encoding with preset '{profile}' was cancelled")]
    Cancelled { profile: ProfileName },

    /// The event stream closed without a terminal event.
    #[error("Engine stopped reporting on preset '{profile}' before it finished")]
    EngineVanished { profile: ProfileName },

    /// The task itself panicked or was aborted.
    #[error("Task for preset '{profile}' did not run to completion")]
    Aborted { profile: ProfileName },
}

impl TranscodeError {
    pub fn profile(&self) -> &ProfileName {
        match self {
            Self::Engine { profile, .. }
            | Self::Timeout { profile, .. }
            | Self::Cancelled { profile }
            | Self::EngineVanished { profile }
            | Self::Aborted { profile } => profile,
        }
    }

    fn outcome_label(&self) -> &'static str {
        match self {
            Self::Engine { .. } => "failed",
            Self::Timeout { .. } => "timeout",
            Self::Cancelled { .. } => "cancelled",
            Self::EngineVanished { .. } | Self::Aborted { .. } => "aborted",
        }
    }
}

/// Lifecycle of a task as seen by the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Started,
    Failed,
    Ended,
}

/// Folds engine events into at most one terminal outcome.
///
/// The first `Error` or `End` decides; everything after that is ignored.
#[derive(Debug)]
pub struct TaskMonitor {
    profile: ProfileName,
    state: TaskState,
}

impl TaskMonitor {
    pub fn new(profile: ProfileName) -> Self {
        Self {
            profile,
            state: TaskState::Started,
        }
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Feeds one event. Returns the outcome the first time a terminal event arrives.
    pub fn observe(&mut self, event: EngineEvent) -> Option<Result<(), String>> {
        if self.state != TaskState::Started {
            trace!(profile = %self.profile, ?event, "Ignoring event after outcome");
            return None;
        }

        match event {
            EngineEvent::Begin => {
                debug!(profile = %self.profile, "Starting encode");
                None
            }
            EngineEvent::Progress(progress) => {
                debug!(
                    profile = %self.profile,
                    percent = progress.percent,
                    eta = progress.eta.as_deref().unwrap_or("-"),
                    "Encode progress"
                );
                None
            }
            EngineEvent::Output(line) => {
                trace!(profile = %self.profile, "{}", line);
                None
            }
            EngineEvent::Complete => {
                debug!(profile = %self.profile, "Encode completed");
                None
            }
            EngineEvent::Error(message) => {
                self.state = TaskState::Failed;
                Some(Err(message))
            }
            EngineEvent::End => {
                self.state = TaskState::Ended;
                Some(Ok(()))
            }
        }
    }
}

/// Runs transcode tasks against an engine, at most `permits` at a time.
#[derive(Clone)]
pub struct TaskRunner {
    engine: Arc<dyn Engine>,
    permits: Arc<Semaphore>,
    timeout: Option<Duration>,
}

impl TaskRunner {
    pub fn new(engine: Arc<dyn Engine>, max_concurrent: usize, timeout: Option<Duration>) -> Self {
        Self {
            engine,
            permits: Arc::new(Semaphore::new(max_concurrent)),
            timeout,
        }
    }

    /// Runs one task to its outcome. Never retries.
    ///
    /// Resolves only on the engine's terminal `End` event and rejects on the
    /// first `Error` event. Cancelling `cancel` stops a queued task before it
    /// starts and asks the engine to kill a running one.
    pub async fn run(
        &self,
        task: TranscodeTask,
        cancel: CancellationToken,
    ) -> Result<TaskOutput, TranscodeError> {
        let profile = task.profile.clone();

        let _permit = tokio::select! {
            permit = Arc::clone(&self.permits).acquire_owned() => {
                permit.map_err(|_| TranscodeError::Cancelled { profile: profile.clone() })?
            }
            _ = cancel.cancelled() => {
                return Err(TranscodeError::Cancelled { profile });
            }
        };

        metrics::TASKS_ACTIVE.inc();
        let started = Instant::now();

        let task_cancel = cancel.child_token();
        let events = self.engine.start_encode(
            EncodeRequest {
                input_path: task.input_path,
                output_path: task.output_path,
                profile: profile.clone(),
            },
            task_cancel.clone(),
        );

        let outcome = match self.timeout {
            Some(limit) => {
                match tokio::time::timeout(limit, drive(profile.clone(), events, &task_cancel)).await
                {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        task_cancel.cancel();
                        Err(TranscodeError::Timeout {
                            profile: profile.clone(),
                            timeout_secs: limit.as_secs(),
                        })
                    }
                }
            }
            None => drive(profile.clone(), events, &task_cancel).await,
        };

        metrics::TASKS_ACTIVE.dec();
        let label = match &outcome {
            Ok(()) => "succeeded",
            Err(e) => e.outcome_label(),
        };
        metrics::TASKS_TOTAL.with_label_values(&[label]).inc();
        metrics::TASK_DURATION
            .with_label_values(&[label])
            .observe(started.elapsed().as_secs_f64());

        match outcome {
            Ok(()) => {
                debug!(profile = %profile, elapsed_ms = started.elapsed().as_millis() as u64, "Task finished");
                Ok(TaskOutput {
                    profile,
                    download_url: task.download_url,
                })
            }
            Err(e) => {
                warn!(profile = %profile, error = %e, "Task failed");
                Err(e)
            }
        }
    }
}

async fn drive(
    profile: ProfileName,
    mut events: mpsc::Receiver<EngineEvent>,
    cancel: &CancellationToken,
) -> Result<(), TranscodeError> {
    let mut monitor = TaskMonitor::new(profile.clone());

    while let Some(event) = events.recv().await {
        match monitor.observe(event) {
            Some(Ok(())) => return Ok(()),
            Some(Err(_)) if cancel.is_cancelled() => {
                return Err(TranscodeError::Cancelled { profile });
            }
            Some(Err(message)) => return Err(TranscodeError::Engine { profile, message }),
            None => {}
        }
    }

    Err(TranscodeError::EngineVanished { profile })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EncodeProgress;
    use crate::testing::{MockBehavior, MockEngine};
    use tokio_test::{assert_err, assert_ok};

    fn task(profile: &str) -> TranscodeTask {
        TranscodeTask {
            input_path: PathBuf::from("/jobs/1/Original/clip.mp4"),
            output_path: PathBuf::from(format!("/jobs/1/{}/clip.mp4", profile)),
            profile: ProfileName::from(profile),
            download_url: format!("/jobs/1/{}/clip.mp4", profile),
        }
    }

    #[test]
    fn test_monitor_resolves_on_end_not_complete() {
        let mut monitor = TaskMonitor::new(ProfileName::from("Fast 1080p30"));
        assert_eq!(monitor.observe(EngineEvent::Begin), None);
        assert_eq!(
            monitor.observe(EngineEvent::Progress(EncodeProgress {
                task: 1,
                task_count: 1,
                percent: 50.0,
                fps: None,
                avg_fps: None,
                eta: None,
            })),
            None
        );
        assert_eq!(monitor.observe(EngineEvent::Complete), None);
        assert_eq!(monitor.state(), TaskState::Started);
        assert_eq!(monitor.observe(EngineEvent::End), Some(Ok(())));
        assert_eq!(monitor.state(), TaskState::Ended);
    }

    #[test]
    fn test_monitor_first_error_wins() {
        let mut monitor = TaskMonitor::new(ProfileName::from("Fast 1080p30"));
        assert_eq!(
            monitor.observe(EngineEvent::Error("boom".to_string())),
            Some(Err("boom".to_string()))
        );
        assert_eq!(monitor.observe(EngineEvent::Error("again".to_string())), None);
        assert_eq!(monitor.observe(EngineEvent::End), None);
        assert_eq!(monitor.state(), TaskState::Failed);
    }

    #[test]
    fn test_monitor_ignores_error_after_end() {
        let mut monitor = TaskMonitor::new(ProfileName::from("Fast 1080p30"));
        assert_eq!(monitor.observe(EngineEvent::End), Some(Ok(())));
        assert_eq!(monitor.observe(EngineEvent::Error("late".to_string())), None);
        assert_eq!(monitor.state(), TaskState::Ended);
    }

    #[tokio::test]
    async fn test_run_success_returns_download_url() {
        let engine = Arc::new(MockEngine::new());
        let runner = TaskRunner::new(engine.clone(), 4, None);

        let output = assert_ok!(runner.run(task("Fast 1080p30"), CancellationToken::new()).await);
        assert_eq!(output.profile.as_str(), "Fast 1080p30");
        assert_eq!(output.download_url, "/jobs/1/Fast 1080p30/clip.mp4");
        assert_eq!(engine.invocation_count(), 1);
    }

    #[tokio::test]
    async fn test_run_success_without_complete_event() {
        let engine = Arc::new(MockEngine::new());
        engine.set_behavior("Fast 1080p30", MockBehavior::SucceedWithoutComplete);
        let runner = TaskRunner::new(engine, 4, None);

        assert_ok!(runner.run(task("Fast 1080p30"), CancellationToken::new()).await);
    }

    #[tokio::test]
    async fn test_run_error_event_rejects() {
        let engine = Arc::new(MockEngine::new());
        engine.set_behavior("Bogus", MockBehavior::Fail("Invalid preset".to_string()));
        let runner = TaskRunner::new(engine.clone(), 4, None);

        let err = assert_err!(runner.run(task("Bogus"), CancellationToken::new()).await);
        assert!(matches!(&err, TranscodeError::Engine { message, .. } if message == "Invalid preset"));
        assert_eq!(err.profile().as_str(), "Bogus");
        assert_eq!(engine.invocation_count(), 1);
    }

    #[tokio::test]
    async fn test_run_error_after_end_is_ignored() {
        let engine = Arc::new(MockEngine::new());
        engine.set_behavior("Fast 1080p30", MockBehavior::ErrorAfterEnd("late".to_string()));
        let runner = TaskRunner::new(engine, 4, None);

        assert_ok!(runner.run(task("Fast 1080p30"), CancellationToken::new()).await);
    }

    #[tokio::test]
    async fn test_run_stream_closed_without_end() {
        let engine = Arc::new(MockEngine::new());
        engine.set_behavior("Fast 1080p30", MockBehavior::Vanish);
        let runner = TaskRunner::new(engine, 4, None);

        let err = assert_err!(runner.run(task("Fast 1080p30"), CancellationToken::new()).await);
        assert!(matches!(err, TranscodeError::EngineVanished { .. }));
    }

    #[tokio::test]
    async fn test_run_timeout_kills_hung_engine() {
        let engine = Arc::new(MockEngine::new());
        engine.set_behavior("Fast 1080p30", MockBehavior::Hang);
        let runner = TaskRunner::new(engine.clone(), 4, Some(Duration::from_millis(50)));

        let err = assert_err!(runner.run(task("Fast 1080p30"), CancellationToken::new()).await);
        assert!(matches!(err, TranscodeError::Timeout { .. }));

        // The hung encode observed the cancellation and wound down.
        tokio::time::timeout(Duration::from_secs(1), engine.wait_idle())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_run_cancel_reports_cancelled() {
        let engine = Arc::new(MockEngine::new());
        engine.set_behavior("Fast 1080p30", MockBehavior::Hang);
        let runner = TaskRunner::new(engine, 4, None);
        let cancel = CancellationToken::new();

        let handle = tokio::spawn({
            let runner = runner.clone();
            let cancel = cancel.clone();
            async move { runner.run(task("Fast 1080p30"), cancel).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let err = assert_err!(handle.await.unwrap());
        assert!(matches!(err, TranscodeError::Cancelled { .. }));
    }

    #[tokio::test]
    async fn test_run_respects_concurrency_cap() {
        let engine = Arc::new(MockEngine::new());
        engine.set_encode_duration(Duration::from_millis(30));
        let runner = TaskRunner::new(engine.clone(), 2, None);

        let handles: Vec<_> = (0..6)
            .map(|i| {
                let runner = runner.clone();
                tokio::spawn(async move {
                    runner
                        .run(task(&format!("Preset {}", i)), CancellationToken::new())
                        .await
                })
            })
            .collect();

        for handle in handles {
            assert_ok!(handle.await.unwrap());
        }
        assert_eq!(engine.invocation_count(), 6);
        assert!(engine.peak_concurrency() <= 2);
    }
}
