pub mod catalog;
pub mod config;
pub mod conversion;
pub mod download;
pub mod engine;
pub mod error;
pub mod layout;
pub mod metrics;
pub mod task;
pub mod testing;

pub use catalog::{parse_profile_catalog, select_catalog_text, ProfileCatalog};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, ConversionConfig,
    EngineConfig, Environment, ServerConfig, StorageConfig, CONFIG_PATH_ENV,
};
pub use conversion::{
    parse_preset_list, ConversionResult, ConversionService, ConversionUpload, UploadedFile,
};
pub use download::{DownloadResolver, ResolvedDownload};
pub use engine::{
    CatalogOutput, EncodeProgress, EncodeRequest, Engine, EngineError, EngineEvent,
    HandbrakeEngine,
};
pub use error::{ErrorKind, ServiceError};
pub use layout::{JobId, JobLayout, LayoutError, ProfileName, ORIGINAL_PROFILE};
pub use task::{TaskMonitor, TaskOutput, TaskRunner, TaskState, TranscodeError, TranscodeTask};
