//! Conversion orchestrator.
//!
//! One [`ConversionService::convert`] call handles one upload:
//!
//! ```text
//! Validating -> PreparingOriginal -> TranscodingAll -> Succeeded | Failed
//! ```
//!
//! Validation failures have no side effects. Once transcoding starts, the first
//! failing preset fails the whole request; outputs already written by other
//! presets stay on disk.

use futures::future::try_join_all;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::catalog::ProfileCatalog;
use crate::config::{ConversionConfig, EngineConfig};
use crate::engine::Engine;
use crate::error::{ErrorKind, ServiceError};
use crate::layout::{self, JobId, JobLayout, LayoutError, ProfileName};
use crate::metrics;
use crate::task::{TaskRunner, TranscodeError, TranscodeTask};

pub const NO_FILES_MESSAGE: &str = "No files were uploaded.";
pub const TOO_MANY_FILES_MESSAGE: &str =
    "More than one file uploaded. You must upload one video file";
pub const NO_PRESET_MESSAGE: &str = "No preset specified. You need to specify an handbrake preset. Call GET /presets to get a list of available presets";

/// A file the upload decoder already wrote to a temporary location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub temp_path: PathBuf,
    pub original_filename: String,
}

/// Decoded form of a `/convert` request.
#[derive(Debug, Clone, Default)]
pub struct ConversionUpload {
    pub files: Vec<UploadedFile>,
    /// Raw comma separated preset list, if the field was sent.
    pub preset: Option<String>,
}

/// Download URLs of a finished job, `Original` first, then presets in request order.
///
/// Serializes as a JSON object that keeps this order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionResult {
    job_id: JobId,
    entries: Vec<(String, String)>,
}

impl ConversionResult {
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    /// Download URL for `profile` (or `"Original"`).
    pub fn get(&self, profile: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(name, _)| name == profile)
            .map(|(_, url)| url.as_str())
    }
}

impl Serialize for ConversionResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (profile, url) in &self.entries {
            map.serialize_entry(profile, url)?;
        }
        map.end()
    }
}

/// Splits a preset field on commas, trims each entry, and drops empty and
/// repeated entries. The first occurrence of a name keeps its position.
pub fn parse_preset_list(raw: &str) -> Vec<ProfileName> {
    let mut profiles: Vec<ProfileName> = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|name| !name.is_empty()) {
        if !profiles.iter().any(|p| p.as_str() == name) {
            profiles.push(ProfileName::new(name));
        }
    }
    profiles
}

/// Upload that passed validation.
#[derive(Debug)]
struct ValidatedUpload {
    file: UploadedFile,
    filename: String,
    profiles: Vec<ProfileName>,
}

/// Runs conversions: validation, job preparation and the per-preset fan-out.
#[derive(Clone)]
pub struct ConversionService {
    layout: Arc<JobLayout>,
    catalog: ProfileCatalog,
    runner: TaskRunner,
    config: ConversionConfig,
}

impl ConversionService {
    pub fn new(
        layout: JobLayout,
        engine: Arc<dyn Engine>,
        engine_config: &EngineConfig,
        config: ConversionConfig,
    ) -> Self {
        let timeout = engine_config.task_timeout_secs.map(Duration::from_secs);
        Self {
            layout: Arc::new(layout),
            catalog: ProfileCatalog::new(Arc::clone(&engine)),
            runner: TaskRunner::new(engine, engine_config.max_concurrent_tasks, timeout),
            config,
        }
    }

    pub fn layout(&self) -> &Arc<JobLayout> {
        &self.layout
    }

    pub fn catalog(&self) -> &ProfileCatalog {
        &self.catalog
    }

    /// Converts one upload into every requested preset.
    pub async fn convert(&self, upload: ConversionUpload) -> Result<ConversionResult, ServiceError> {
        let result = self.run_conversion(upload).await;

        let outcome = match &result {
            Ok(_) => "succeeded",
            Err(e) => match e.kind() {
                ErrorKind::Validation | ErrorKind::NotFound => "rejected",
                ErrorKind::Storage => "storage_failed",
                ErrorKind::Transcode => "transcode_failed",
                ErrorKind::EngineQuery => "catalog_failed",
            },
        };
        metrics::CONVERSIONS_TOTAL.with_label_values(&[outcome]).inc();

        result
    }

    async fn run_conversion(
        &self,
        upload: ConversionUpload,
    ) -> Result<ConversionResult, ServiceError> {
        let upload = validate_upload(upload)?;
        if self.config.validate_profiles {
            self.check_profiles_known(&upload.profiles).await?;
        }

        let job = JobId::new();
        info!(
            job_id = %job,
            filename = %upload.filename,
            presets = upload.profiles.len(),
            "Starting conversion"
        );

        let original_path = self.prepare_original(&job, &upload).await?;
        let original = ProfileName::original();
        let mut entries = vec![(
            original.to_string(),
            JobLayout::download_url(&job, &original, &upload.filename),
        )];

        let tasks = self
            .prepare_tasks(&job, original_path, &upload.filename, &upload.profiles)
            .await?;

        match self.transcode_all(tasks).await {
            Ok(outputs) => {
                entries.extend(outputs);
                info!(job_id = %job, "Conversion succeeded");
                Ok(ConversionResult {
                    job_id: job,
                    entries,
                })
            }
            Err(e) => {
                error!(job_id = %job, profile = %e.profile(), error = %e, "Conversion failed");
                Err(ServiceError::Transcode(e))
            }
        }
    }

    async fn check_profiles_known(&self, profiles: &[ProfileName]) -> Result<(), ServiceError> {
        let known = self
            .catalog
            .list_profiles()
            .await
            .map_err(ServiceError::EngineQuery)?;

        match profiles.iter().find(|p| !known.contains(p)) {
            Some(unknown) => Err(ServiceError::validation(format!(
                "Unknown preset '{}'. Call GET /presets to get a list of available presets",
                unknown
            ))),
            None => Ok(()),
        }
    }

    /// Copies the upload into `<job>/Original/<filename>` and removes the temporary file.
    async fn prepare_original(
        &self,
        job: &JobId,
        upload: &ValidatedUpload,
    ) -> Result<PathBuf, ServiceError> {
        let original = ProfileName::original();

        self.layout
            .ensure_job_dir(job)
            .await
            .map_err(|e| layout_error("Error creating job directory", e))?;
        self.layout
            .ensure_profile_dir(job, &original)
            .await
            .map_err(|e| layout_error("Error creating job directory", e))?;

        let target = self
            .layout
            .download_path(job, &original, &upload.filename)
            .map_err(|e| layout_error("Error creating job directory", e))?;

        tokio::fs::copy(&upload.file.temp_path, &target)
            .await
            .map_err(|e| ServiceError::storage("Error copying uploaded file", e))?;
        tokio::fs::remove_file(&upload.file.temp_path)
            .await
            .map_err(|e| ServiceError::storage("Error removing uploaded file", e))?;

        debug!(job_id = %job, path = %target.display(), "Stored original upload");
        Ok(target)
    }

    /// Builds one task per preset, creating each preset directory up front.
    async fn prepare_tasks(
        &self,
        job: &JobId,
        input: PathBuf,
        filename: &str,
        profiles: &[ProfileName],
    ) -> Result<Vec<TranscodeTask>, ServiceError> {
        let mut tasks = Vec::with_capacity(profiles.len());
        for profile in profiles {
            self.layout
                .ensure_profile_dir(job, profile)
                .await
                .map_err(|e| layout_error("Error creating preset directory", e))?;
            let output_path = self
                .layout
                .download_path(job, profile, filename)
                .map_err(|e| layout_error("Error creating preset directory", e))?;

            tasks.push(TranscodeTask {
                input_path: input.clone(),
                output_path,
                profile: profile.clone(),
                download_url: JobLayout::download_url(job, profile, filename),
            });
        }
        Ok(tasks)
    }

    /// Starts every task and waits for all of them or the first failure.
    async fn transcode_all(
        &self,
        tasks: Vec<TranscodeTask>,
    ) -> Result<Vec<(String, String)>, TranscodeError> {
        let cancel = CancellationToken::new();
        let cancel_siblings = self.config.cancel_siblings_on_failure;

        let joins = tasks.into_iter().map(|task| {
            let profile = task.profile.clone();
            let runner = self.runner.clone();
            let token = cancel.clone();
            let handle = tokio::spawn(async move { runner.run(task, token).await });

            let cancel = cancel.clone();
            async move {
                let result = match handle.await {
                    Ok(result) => result,
                    Err(e) => {
                        warn!(profile = %profile, error = %e, "Transcode task aborted");
                        Err(TranscodeError::Aborted { profile })
                    }
                };
                if result.is_err() && cancel_siblings {
                    cancel.cancel();
                }
                result
            }
        });

        // Tasks run detached: returning early here does not stop the siblings.
        let outputs = try_join_all(joins.collect::<Vec<_>>()).await?;

        Ok(outputs
            .into_iter()
            .map(|output| (output.profile.into_string(), output.download_url))
            .collect())
    }
}

fn validate_upload(upload: ConversionUpload) -> Result<ValidatedUpload, ServiceError> {
    let mut files = upload.files;
    let file = match files.len() {
        0 => return Err(ServiceError::validation(NO_FILES_MESSAGE)),
        1 => files.remove(0),
        _ => return Err(ServiceError::validation(TOO_MANY_FILES_MESSAGE)),
    };

    let profiles = upload
        .preset
        .as_deref()
        .map(parse_preset_list)
        .unwrap_or_default();
    if profiles.is_empty() {
        return Err(ServiceError::validation(NO_PRESET_MESSAGE));
    }

    for profile in &profiles {
        if profile.is_original() {
            return Err(ServiceError::validation(format!(
                "Preset name '{}' is reserved for the uploaded file",
                profile
            )));
        }
        layout::leaf(profile.as_str(), "preset")
            .map_err(|e| ServiceError::validation(e.to_string()))?;
    }

    let filename = file
        .original_filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .to_string();
    layout::leaf(&filename, "file").map_err(|e| ServiceError::validation(e.to_string()))?;

    Ok(ValidatedUpload {
        file,
        filename,
        profiles,
    })
}

fn layout_error(context: &str, err: LayoutError) -> ServiceError {
    match err {
        LayoutError::Io(e) => ServiceError::storage(context, e),
        other => ServiceError::validation(other.to_string()),
    }
}
