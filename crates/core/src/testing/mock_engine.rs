//! Mock engine for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::fixtures;
use crate::engine::{
    CatalogOutput, EncodeProgress, EncodeRequest, Engine, EngineError, EngineEvent,
};

/// How the mock reacts to an encode of a given preset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockBehavior {
    /// Copies the input to the output and reports a full successful lifecycle.
    Succeed,
    /// Like `Succeed` but never emits `Complete`.
    SucceedWithoutComplete,
    /// Emits an `Error` event with the message, then `End`.
    Fail(String),
    /// Succeeds, then emits a stray `Error` after `End`.
    ErrorAfterEnd(String),
    /// Emits `Begin` and then nothing until cancelled.
    Hang,
    /// Emits `Begin` and closes the stream without a terminal event.
    Vanish,
}

/// Mock implementation of the [`Engine`] trait.
///
/// Provides controllable behavior for testing:
/// - Per-preset encode behavior (see [`MockBehavior`])
/// - Configurable catalog output or catalog failure
/// - Recorded encode requests
/// - Concurrency tracking
#[derive(Debug)]
pub struct MockEngine {
    behaviors: Mutex<HashMap<String, MockBehavior>>,
    catalog: Mutex<Result<CatalogOutput, String>>,
    invocations: Mutex<Vec<EncodeRequest>>,
    encode_duration: Mutex<Duration>,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    /// Create a new mock engine: every encode succeeds, the catalog is empty.
    pub fn new() -> Self {
        Self {
            behaviors: Mutex::new(HashMap::new()),
            catalog: Mutex::new(Ok(CatalogOutput::default())),
            invocations: Mutex::new(Vec::new()),
            encode_duration: Mutex::new(Duration::from_millis(5)),
            active: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create a mock whose catalog lists `profiles`.
    pub fn with_profiles(profiles: &[&str]) -> Self {
        let engine = Self::new();
        engine.set_catalog_output(fixtures::catalog_on_stderr(profiles));
        engine
    }

    /// Set the behavior for encodes of `profile`.
    pub fn set_behavior(&self, profile: &str, behavior: MockBehavior) {
        self.behaviors
            .lock()
            .unwrap()
            .insert(profile.to_string(), behavior);
    }

    /// Set what the catalog query prints.
    pub fn set_catalog_output(&self, output: CatalogOutput) {
        *self.catalog.lock().unwrap() = Ok(output);
    }

    /// Make the catalog query fail.
    pub fn fail_catalog(&self, reason: &str) {
        *self.catalog.lock().unwrap() = Err(reason.to_string());
    }

    /// Set how long a simulated encode takes.
    pub fn set_encode_duration(&self, duration: Duration) {
        *self.encode_duration.lock().unwrap() = duration;
    }

    /// All encode requests received so far.
    pub fn invocations(&self) -> Vec<EncodeRequest> {
        self.invocations.lock().unwrap().clone()
    }

    pub fn invocation_count(&self) -> usize {
        self.invocations.lock().unwrap().len()
    }

    /// Encodes currently in flight.
    pub fn active_encodes(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Highest number of encodes that were in flight at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Waits until no encode is in flight.
    pub async fn wait_idle(&self) {
        while self.active_encodes() > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    fn behavior_for(&self, profile: &str) -> MockBehavior {
        self.behaviors
            .lock()
            .unwrap()
            .get(profile)
            .cloned()
            .unwrap_or(MockBehavior::Succeed)
    }
}

#[async_trait]
impl Engine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    async fn query_profile_catalog(&self) -> Result<CatalogOutput, EngineError> {
        self.catalog
            .lock()
            .unwrap()
            .clone()
            .map_err(|reason| EngineError::query_failed(reason, ""))
    }

    fn start_encode(
        &self,
        request: EncodeRequest,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<EngineEvent> {
        let (tx, rx) = mpsc::channel(16);
        let behavior = self.behavior_for(request.profile.as_str());
        let duration = *self.encode_duration.lock().unwrap();
        self.invocations.lock().unwrap().push(request.clone());

        let active = Arc::clone(&self.active);
        let peak = Arc::clone(&self.peak);
        let now_active = active.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now_active, Ordering::SeqCst);

        tokio::spawn(async move {
            let _ = tx.send(EngineEvent::Begin).await;
            let events = simulate(&request, behavior, duration, &cancel).await;
            active.fetch_sub(1, Ordering::SeqCst);
            for event in events {
                let _ = tx.send(event).await;
            }
        });

        rx
    }

    async fn validate(&self) -> Result<(), EngineError> {
        Ok(())
    }
}

/// Plays out one encode and returns the events that follow `Begin`.
async fn simulate(
    request: &EncodeRequest,
    behavior: MockBehavior,
    duration: Duration,
    cancel: &CancellationToken,
) -> Vec<EngineEvent> {
    let cancelled = vec![
        EngineEvent::Error("Encode cancelled".to_string()),
        EngineEvent::End,
    ];

    if behavior == MockBehavior::Hang {
        cancel.cancelled().await;
        return cancelled;
    }

    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        _ = cancel.cancelled() => return cancelled,
    }

    let progress = EngineEvent::Progress(EncodeProgress {
        task: 1,
        task_count: 1,
        percent: 50.0,
        fps: Some(120.0),
        avg_fps: Some(118.5),
        eta: Some("00h00m01s".to_string()),
    });

    match behavior {
        MockBehavior::Succeed
        | MockBehavior::SucceedWithoutComplete
        | MockBehavior::ErrorAfterEnd(_) => {
            if tokio::fs::metadata(&request.input_path).await.is_ok() {
                if let Err(e) = tokio::fs::copy(&request.input_path, &request.output_path).await {
                    return vec![
                        EngineEvent::Error(format!("mock copy failed: {}", e)),
                        EngineEvent::End,
                    ];
                }
            }

            let mut events = vec![
                progress,
                EngineEvent::Output("Muxing: this may take awhile...".to_string()),
            ];
            if behavior != MockBehavior::SucceedWithoutComplete {
                events.push(EngineEvent::Complete);
            }
            events.push(EngineEvent::End);
            if let MockBehavior::ErrorAfterEnd(message) = behavior {
                events.push(EngineEvent::Error(message));
            }
            events
        }
        MockBehavior::Fail(message) => vec![progress, EngineEvent::Error(message), EngineEvent::End],
        MockBehavior::Vanish => Vec::new(),
        MockBehavior::Hang => cancelled,
    }
}
