use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

use super::ids::{JobId, ProfileName};

/// Errors produced while mapping identifiers onto the filesystem.
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("Invalid job id: {0}")]
    InvalidJobId(String),

    /// A profile or file name that is not a single plain path segment.
    #[error("Invalid {kind} name: {value:?}")]
    UnsafeComponent { kind: &'static str, value: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Maps jobs, profiles and filenames onto paths below a fixed root.
///
/// All mapping functions are pure; only the `ensure_*` methods touch the disk.
#[derive(Debug, Clone)]
pub struct JobLayout {
    root: PathBuf,
}

impl JobLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory owning everything produced for `job`.
    pub fn job_dir(&self, job: &JobId) -> PathBuf {
        self.root.join(job.to_string())
    }

    /// Creates the job directory if needed. Safe to call concurrently.
    pub async fn ensure_job_dir(&self, job: &JobId) -> Result<PathBuf, LayoutError> {
        let dir = self.job_dir(job);
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Directory holding the output of `profile` for `job`.
    pub fn profile_dir(&self, job: &JobId, profile: &ProfileName) -> Result<PathBuf, LayoutError> {
        let segment = leaf(profile.as_str(), "preset")?;
        Ok(self.job_dir(job).join(segment))
    }

    pub async fn ensure_profile_dir(
        &self,
        job: &JobId,
        profile: &ProfileName,
    ) -> Result<PathBuf, LayoutError> {
        let dir = self.profile_dir(job, profile)?;
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Location of `filename` produced under `profile`, used both when writing
    /// and when serving. `filename` is always a leaf; separators and dot
    /// segments are rejected rather than interpreted.
    pub fn download_path(
        &self,
        job: &JobId,
        profile: &ProfileName,
        filename: &str,
    ) -> Result<PathBuf, LayoutError> {
        let file = leaf(filename, "file")?;
        Ok(self.profile_dir(job, profile)?.join(file))
    }

    /// Public URL under which [`Self::download_path`] is served.
    pub fn download_url(job: &JobId, profile: &ProfileName, filename: &str) -> String {
        format!(
            "/jobs/{}/{}/{}",
            job,
            urlencoding::encode(profile.as_str()),
            urlencoding::encode(filename)
        )
    }
}

/// Checks that `value` names exactly one ordinary path segment.
pub(crate) fn leaf<'a>(value: &'a str, kind: &'static str) -> Result<&'a str, LayoutError> {
    let unsafe_component = || LayoutError::UnsafeComponent {
        kind,
        value: value.to_string(),
    };

    if value.is_empty() || value.contains(['/', '\\', '\0']) {
        return Err(unsafe_component());
    }

    let mut components = Path::new(value).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(value),
        _ => Err(unsafe_component()),
    }
}
