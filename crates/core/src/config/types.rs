use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub conversion: ConversionConfig,
    #[serde(default)]
    pub environment: Environment,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Largest accepted `/convert` request body.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    /// Directory holding the landing page (`index.html`).
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
            static_dir: default_static_dir(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    3000
}

fn default_max_upload_bytes() -> usize {
    usize::try_from(4u64 * 1024 * 1024 * 1024).unwrap_or(usize::MAX)
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("crates/server/static")
}

/// Where jobs and in-flight uploads live on disk.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Root of every job directory.
    #[serde(default = "default_jobs_dir")]
    pub jobs_dir: PathBuf,
    /// Scratch directory for decoded multipart uploads.
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            jobs_dir: default_jobs_dir(),
            upload_dir: default_upload_dir(),
        }
    }
}

fn default_jobs_dir() -> PathBuf {
    PathBuf::from("data/jobs")
}

fn default_upload_dir() -> PathBuf {
    std::env::temp_dir().join("brakeweb-uploads")
}

/// External transcoding engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Path to the HandBrakeCLI binary.
    #[serde(default = "default_binary_path")]
    pub binary_path: PathBuf,

    /// Maximum engine processes running at once, across all requests.
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: usize,

    /// Per-task timeout. Unset means a task may run indefinitely.
    #[serde(default)]
    pub task_timeout_secs: Option<u64>,

    /// Additional arguments appended to every encode invocation.
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            binary_path: default_binary_path(),
            max_concurrent_tasks: default_max_concurrent_tasks(),
            task_timeout_secs: None,
            extra_args: Vec::new(),
        }
    }
}

fn default_binary_path() -> PathBuf {
    PathBuf::from("HandBrakeCLI")
}

fn default_max_concurrent_tasks() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Policies applied by the conversion orchestrator.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConversionConfig {
    /// Check requested presets against the engine catalog before starting any task.
    #[serde(default)]
    pub validate_profiles: bool,

    /// Kill still-running sibling tasks once one task of the same job fails.
    #[serde(default)]
    pub cancel_siblings_on_failure: bool,
}

/// Deployment mode. Development responses carry error diagnostics.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    #[default]
    Production,
}

impl Environment {
    pub fn is_development(self) -> bool {
        matches!(self, Environment::Development)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.storage.jobs_dir, PathBuf::from("data/jobs"));
        assert_eq!(config.server.static_dir, PathBuf::from("crates/server/static"));
        assert_eq!(
            config.server.max_upload_bytes as u64,
            (4u64 << 30).min(usize::MAX as u64)
        );
        assert_eq!(config.engine.binary_path, PathBuf::from("HandBrakeCLI"));
        assert!(config.engine.max_concurrent_tasks >= 1);
        assert!(config.engine.task_timeout_secs.is_none());
        assert!(!config.conversion.validate_profiles);
        assert!(!config.conversion.cancel_siblings_on_failure);
        assert_eq!(config.environment, Environment::Production);
    }

    #[test]
    fn test_deserialize_full_config() {
        let toml = r#"
environment = "development"

[server]
host = "127.0.0.1"
port = 9000
static_dir = "/srv/brakeweb"

[storage]
jobs_dir = "/var/lib/brakeweb/jobs"
upload_dir = "/var/tmp/uploads"

[engine]
binary_path = "/opt/handbrake/HandBrakeCLI"
max_concurrent_tasks = 2
task_timeout_secs = 600
extra_args = ["--verbose", "0"]

[conversion]
validate_profiles = true
cancel_siblings_on_failure = true
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.static_dir, PathBuf::from("/srv/brakeweb"));
        assert_eq!(
            config.storage.jobs_dir,
            PathBuf::from("/var/lib/brakeweb/jobs")
        );
        assert_eq!(config.engine.max_concurrent_tasks, 2);
        assert_eq!(config.engine.task_timeout_secs, Some(600));
        assert_eq!(config.engine.extra_args, vec!["--verbose", "0"]);
        assert!(config.conversion.validate_profiles);
        assert!(config.conversion.cancel_siblings_on_failure);
        assert!(config.environment.is_development());
    }

    #[test]
    fn test_unknown_environment_fails() {
        let result: Result<Config, _> = toml::from_str(r#"environment = "staging""#);
        assert!(result.is_err());
    }
}
