//! Trait definitions for the engine module.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::error::EngineError;
use super::types::{CatalogOutput, EncodeRequest, EngineEvent};

/// An external transcoding engine.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Returns the name of this engine implementation.
    fn name(&self) -> &str;

    /// Runs the engine in catalog mode and returns whatever it printed.
    ///
    /// Fails if the engine cannot be started or exits unsuccessfully.
    async fn query_profile_catalog(&self) -> Result<CatalogOutput, EngineError>;

    /// Starts one encode in the background and returns its event stream.
    ///
    /// Failures, including a failure to launch, are reported as
    /// [`EngineEvent::Error`] on the stream. Once the engine has finished the
    /// stream yields [`EngineEvent::End`] and closes. Cancelling `cancel`
    /// terminates the encode. Dropping the receiver does not.
    fn start_encode(
        &self,
        request: EncodeRequest,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<EngineEvent>;

    /// Validates that the engine is installed and runnable.
    async fn validate(&self) -> Result<(), EngineError>;
}
