use tokio::sync::Semaphore;

use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Upload limit is positive
/// - Engine concurrency is between 1 and the semaphore permit limit
/// - A configured task timeout is not 0
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.server.max_upload_bytes == 0 {
        return Err(ConfigError::ValidationError(
            "server.max_upload_bytes must be greater than 0".to_string(),
        ));
    }

    if config.engine.max_concurrent_tasks == 0 {
        return Err(ConfigError::ValidationError(
            "engine.max_concurrent_tasks must be at least 1".to_string(),
        ));
    }

    if config.engine.max_concurrent_tasks > Semaphore::MAX_PERMITS {
        return Err(ConfigError::ValidationError(format!(
            "engine.max_concurrent_tasks cannot exceed {}",
            Semaphore::MAX_PERMITS
        )));
    }

    if config.engine.task_timeout_secs == Some(0) {
        return Err(ConfigError::ValidationError(
            "engine.task_timeout_secs cannot be 0 (omit it to disable the timeout)".to_string(),
        ));
    }

    Ok(())
}
