//! HandBrakeCLI-based engine implementation.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::error::EngineError;
use super::traits::Engine;
use super::types::{CatalogOutput, EncodeProgress, EncodeRequest, EngineEvent};
use crate::config::EngineConfig;

/// Capacity of each encode's event channel.
const EVENT_BUFFER: usize = 64;

/// Printed by HandBrakeCLI on stderr after a successful encode.
const ENCODE_DONE_MARKER: &str = "Encode done!";

/// Engine backed by the `HandBrakeCLI` executable.
pub struct HandbrakeEngine {
    config: EngineConfig,
}

impl HandbrakeEngine {
    /// Creates a new engine with the given configuration.
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Creates an engine with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(EngineConfig::default())
    }

    /// Builds HandBrakeCLI arguments for one encode.
    fn build_encode_args(&self, request: &EncodeRequest) -> Vec<String> {
        let mut args = vec![
            "-i".to_string(),
            request.input_path.to_string_lossy().to_string(),
            "-o".to_string(),
            request.output_path.to_string_lossy().to_string(),
            "--preset".to_string(),
            request.profile.as_str().to_string(),
        ];

        args.extend(self.config.extra_args.iter().cloned());

        args
    }

    fn spawn_error(&self, e: std::io::Error) -> EngineError {
        if e.kind() == std::io::ErrorKind::NotFound {
            EngineError::BinaryNotFound {
                path: self.config.binary_path.clone(),
            }
        } else {
            EngineError::Io(e)
        }
    }
}

#[async_trait]
impl Engine for HandbrakeEngine {
    fn name(&self) -> &str {
        "handbrake"
    }

    async fn query_profile_catalog(&self) -> Result<CatalogOutput, EngineError> {
        let output = Command::new(&self.config.binary_path)
            .arg("--preset-list")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(EngineError::query_failed(
                format!("HandBrakeCLI exited with code: {:?}", output.status.code()),
                &stderr,
            ));
        }

        Ok(CatalogOutput { stdout, stderr })
    }

    fn start_encode(
        &self,
        request: EncodeRequest,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<EngineEvent> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let binary = self.config.binary_path.clone();
        let args = self.build_encode_args(&request);

        tokio::spawn(run_encode(binary, args, request.output_path, tx, cancel));

        rx
    }

    async fn validate(&self) -> Result<(), EngineError> {
        let output = Command::new(&self.config.binary_path)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            return Err(EngineError::query_failed(
                "HandBrakeCLI --version failed",
                &String::from_utf8_lossy(&output.stderr),
            ));
        }

        Ok(())
    }
}

/// Runs one HandBrakeCLI process to completion, translating it into events.
async fn run_encode(
    binary: PathBuf,
    args: Vec<String>,
    output_path: PathBuf,
    events: mpsc::Sender<EngineEvent>,
    cancel: CancellationToken,
) {
    let spawned = Command::new(&binary)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn();

    let mut child = match spawned {
        Ok(child) => child,
        Err(e) => {
            let message = if e.kind() == std::io::ErrorKind::NotFound {
                format!("HandBrakeCLI not found at path: {}", binary.display())
            } else {
                format!("Failed to start HandBrakeCLI: {}", e)
            };
            let _ = events.send(EngineEvent::Error(message)).await;
            return;
        }
    };

    let _ = events.send(EngineEvent::Begin).await;

    let stdout_pump = child
        .stdout
        .take()
        .map(|out| tokio::spawn(pump_output(out, events.clone())));
    let stderr_pump = child
        .stderr
        .take()
        .map(|err| tokio::spawn(pump_output(err, events.clone())));

    let status = tokio::select! {
        status = child.wait() => Some(status),
        _ = cancel.cancelled() => None,
    };

    if status.is_none() {
        if let Err(e) = child.kill().await {
            warn!(error = %e, "Failed to kill cancelled HandBrakeCLI process");
        }
    }

    // Drain what the process printed before reporting the outcome.
    for pump in [stdout_pump, stderr_pump].into_iter().flatten() {
        let _ = pump.await;
    }

    let failure = match status {
        None => Some("Encode cancelled".to_string()),
        Some(Err(e)) => Some(format!("Failed to wait for HandBrakeCLI: {}", e)),
        Some(Ok(status)) if !status.success() => Some(format!(
            "HandBrakeCLI exited with code: {:?}",
            status.code()
        )),
        Some(Ok(_)) => missing_output(&output_path).await,
    };

    if let Some(message) = failure {
        let _ = events.send(EngineEvent::Error(message)).await;
    }
    let _ = events.send(EngineEvent::End).await;
}

async fn missing_output(path: &Path) -> Option<String> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => None,
        _ => Some(format!(
            "HandBrakeCLI finished without writing {}",
            path.display()
        )),
    }
}

/// Forwards an output stream as events.
///
/// HandBrakeCLI redraws its progress line with carriage returns, so both `\r`
/// and `\n` end a line here.
async fn pump_output<R>(stream: R, events: mpsc::Sender<EngineEvent>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut pending = Vec::new();

    loop {
        let mut lines = Vec::new();
        let consumed = match reader.fill_buf().await {
            Ok([]) => break,
            Ok(buf) => {
                for &byte in buf {
                    if byte == b'\r' || byte == b'\n' {
                        if !pending.is_empty() {
                            lines.push(String::from_utf8_lossy(&pending).into_owned());
                            pending.clear();
                        }
                    } else {
                        pending.push(byte);
                    }
                }
                buf.len()
            }
            Err(e) => {
                debug!(error = %e, "Stopped reading HandBrakeCLI output");
                break;
            }
        };
        reader.consume(consumed);

        for line in lines {
            let _ = events.send(classify_line(line)).await;
        }
    }

    if !pending.is_empty() {
        let line = String::from_utf8_lossy(&pending).into_owned();
        let _ = events.send(classify_line(line)).await;
    }
}

fn classify_line(line: String) -> EngineEvent {
    if let Some(progress) = EncodeProgress::parse(&line) {
        EngineEvent::Progress(progress)
    } else if line.contains(ENCODE_DONE_MARKER) {
        EngineEvent::Complete
    } else {
        EngineEvent::Output(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::ProfileName;
    use tempfile::TempDir;

    fn engine_with_binary(binary: &str) -> HandbrakeEngine {
        HandbrakeEngine::new(EngineConfig {
            binary_path: PathBuf::from(binary),
            ..Default::default()
        })
    }

    fn request(dir: &Path) -> EncodeRequest {
        EncodeRequest {
            input_path: dir.join("Original/clip.mp4"),
            output_path: dir.join("Fast 1080p30/clip.mp4"),
            profile: ProfileName::from("Fast 1080p30"),
        }
    }

    async fn collect(mut rx: mpsc::Receiver<EngineEvent>) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_build_encode_args() {
        let engine = HandbrakeEngine::new(EngineConfig {
            extra_args: vec!["--optimize".to_string()],
            ..Default::default()
        });
        let args = engine.build_encode_args(&request(Path::new("/jobs/1")));
        assert_eq!(
            args,
            vec![
                "-i",
                "/jobs/1/Original/clip.mp4",
                "-o",
                "/jobs/1/Fast 1080p30/clip.mp4",
                "--preset",
                "Fast 1080p30",
                "--optimize",
            ]
        );
    }

    #[test]
    fn test_classify_lines() {
        assert!(matches!(
            classify_line("Encoding: task 1 of 1, 10.00 %".to_string()),
            EngineEvent::Progress(_)
        ));
        assert_eq!(
            classify_line("Encode done!".to_string()),
            EngineEvent::Complete
        );
        assert_eq!(
            classify_line("x264 [info]: profile High".to_string()),
            EngineEvent::Output("x264 [info]: profile High".to_string())
        );
    }

    #[tokio::test]
    async fn test_pump_splits_on_carriage_returns() {
        let (tx, rx) = mpsc::channel(16);
        let output: &[u8] =
            b"Encoding: task 1 of 1, 10.00 %\rEncoding: task 1 of 1, 20.00 %\r\nEncode done!\nlast";
        pump_output(output, tx).await;

        let events = collect(rx).await;
        assert_eq!(events.len(), 4);
        assert!(matches!(&events[0], EngineEvent::Progress(p) if (p.percent - 10.0).abs() < 0.01));
        assert!(matches!(&events[1], EngineEvent::Progress(p) if (p.percent - 20.0).abs() < 0.01));
        assert_eq!(events[2], EngineEvent::Complete);
        assert_eq!(events[3], EngineEvent::Output("last".to_string()));
    }

    #[tokio::test]
    async fn test_missing_binary_reports_error_event() {
        let temp = TempDir::new().unwrap();
        let engine = engine_with_binary("/nonexistent/HandBrakeCLI");
        let rx = engine.start_encode(request(temp.path()), CancellationToken::new());

        let events = collect(rx).await;
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], EngineEvent::Error(msg) if msg.contains("not found")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_reports_error_then_end() {
        let temp = TempDir::new().unwrap();
        let engine = engine_with_binary("false");
        let rx = engine.start_encode(request(temp.path()), CancellationToken::new());

        let events = collect(rx).await;
        assert_eq!(events.first(), Some(&EngineEvent::Begin));
        assert!(events
            .iter()
            .any(|e| matches!(e, EngineEvent::Error(msg) if msg.contains("exited with code"))));
        assert_eq!(events.last(), Some(&EngineEvent::End));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_clean_exit_without_output_is_an_error() {
        let temp = TempDir::new().unwrap();
        let engine = engine_with_binary("true");
        let rx = engine.start_encode(request(temp.path()), CancellationToken::new());

        let events = collect(rx).await;
        assert!(events
            .iter()
            .any(|e| matches!(e, EngineEvent::Error(msg) if msg.contains("without writing"))));
        assert_eq!(events.last(), Some(&EngineEvent::End));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_clean_exit_with_output_is_a_success() {
        let temp = TempDir::new().unwrap();
        let request = request(temp.path());
        std::fs::create_dir_all(request.output_path.parent().unwrap()).unwrap();
        std::fs::write(&request.output_path, b"encoded").unwrap();

        let engine = engine_with_binary("true");
        let events = collect(engine.start_encode(request, CancellationToken::new())).await;
        assert_eq!(events, vec![EngineEvent::Begin, EngineEvent::End]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_query_catalog_captures_stdout() {
        let engine = engine_with_binary("echo");
        let output = engine.query_profile_catalog().await.unwrap();
        assert_eq!(output.stdout, "--preset-list\n");
        assert!(output.stderr.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_query_catalog_nonzero_exit_fails() {
        let engine = engine_with_binary("false");
        let result = engine.query_profile_catalog().await;
        assert!(matches!(result, Err(EngineError::QueryFailed { .. })));
    }

    #[tokio::test]
    async fn test_query_catalog_missing_binary() {
        let engine = engine_with_binary("/nonexistent/HandBrakeCLI");
        let result = engine.query_profile_catalog().await;
        assert!(matches!(result, Err(EngineError::BinaryNotFound { .. })));
        assert!(engine.validate().await.is_err());
    }
}
