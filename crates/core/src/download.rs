//! Download resolver.

use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::error::ServiceError;
use crate::layout::{JobId, JobLayout, ProfileName};

/// A finished output located on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDownload {
    pub path: PathBuf,
    pub file_name: String,
    pub size: u64,
}

/// Maps `/jobs/{id}/{preset}/{filename}` back onto the file a conversion wrote.
///
/// Uses the same [`JobLayout`] as the writer. There is no access control:
/// knowing the three components is enough to fetch the file.
#[derive(Debug, Clone)]
pub struct DownloadResolver {
    layout: Arc<JobLayout>,
}

impl DownloadResolver {
    pub fn new(layout: Arc<JobLayout>) -> Self {
        Self { layout }
    }

    /// Locates an existing regular file. Anything unparsable, unsafe or absent is `NotFound`.
    pub async fn resolve(
        &self,
        job_id: &str,
        profile: &str,
        filename: &str,
    ) -> Result<ResolvedDownload, ServiceError> {
        let not_found = || ServiceError::NotFound(format!("{}/{}/{}", job_id, profile, filename));

        let job: JobId = job_id.parse().map_err(|_| not_found())?;
        let path = self
            .layout
            .download_path(&job, &ProfileName::from(profile), filename)
            .map_err(|_| not_found())?;

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => metadata,
            _ => {
                debug!(path = %path.display(), "Download not found");
                return Err(not_found());
            }
        };

        Ok(ResolvedDownload {
            path,
            file_name: filename.to_string(),
            size: metadata.len(),
        })
    }
}
