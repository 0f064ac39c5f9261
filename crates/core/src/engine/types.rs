//! Types exchanged with the engine.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::Serialize;
use std::path::PathBuf;

use crate::layout::ProfileName;

/// One encode: read `input_path`, write `output_path` using `profile`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeRequest {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub profile: ProfileName,
}

/// Raw output of the engine's catalog listing mode.
///
/// The engine prints the catalog on either stream depending on version and
/// platform, so both are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Lifecycle of a single encode, in the order an engine emits it.
///
/// `End` is the terminal event and is emitted once the engine process is gone.
/// `Complete` is advisory only: some engine versions never print it.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Begin,
    Progress(EncodeProgress),
    Output(String),
    Error(String),
    Complete,
    End,
}

/// Encoding progress as printed by HandBrakeCLI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncodeProgress {
    pub task: u32,
    pub task_count: u32,
    pub percent: f32,
    pub fps: Option<f32>,
    pub avg_fps: Option<f32>,
    pub eta: Option<String>,
}

static PROGRESS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"Encoding: task (\d+) of (\d+), (\d+(?:\.\d+)?) %(?: \((\d+(?:\.\d+)?) fps, avg (\d+(?:\.\d+)?) fps, ETA (\w+)\))?",
    )
    .unwrap()
});

impl EncodeProgress {
    /// Parses a line like
    /// `Encoding: task 1 of 1, 45.12 % (98.70 fps, avg 101.33 fps, ETA 00h00m21s)`.
    pub fn parse(line: &str) -> Option<Self> {
        let caps = PROGRESS_RE.captures(line)?;
        let number = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<f32>().ok());

        Some(Self {
            task: caps.get(1)?.as_str().parse().ok()?,
            task_count: caps.get(2)?.as_str().parse().ok()?,
            percent: number(3)?,
            fps: number(4),
            avg_fps: number(5),
            eta: caps.get(6).map(|m| m.as_str().to_string()),
        })
    }
}
