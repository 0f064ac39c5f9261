//! External transcoding engine.
//!
//! The service never encodes anything itself. It talks to an [`Engine`], which
//! can print its preset catalog and run one encode per call, reporting the
//! encode's lifecycle as a stream of [`EngineEvent`]s. [`HandbrakeEngine`]
//! drives `HandBrakeCLI`; tests use `testing::MockEngine`.

mod error;
mod handbrake;
mod traits;
mod types;

pub use error::EngineError;
pub use handbrake::HandbrakeEngine;
pub use traits::Engine;
pub use types::{CatalogOutput, EncodeProgress, EncodeRequest, EngineEvent};
