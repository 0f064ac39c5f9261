//! Testing utilities and mock implementations.
//!
//! [`MockEngine`] stands in for HandBrakeCLI so the orchestrator and the HTTP
//! layer can be exercised without an encoder installed.
//!
//! # Example
//!
//! ```rust,ignore
//! use brakeweb_core::testing::{MockBehavior, MockEngine};
//!
//! let engine = MockEngine::with_profiles(&["Fast 1080p30", "Fast 720p30"]);
//! engine.set_behavior("Fast 720p30", MockBehavior::Fail("Invalid preset".into()));
//! ```

mod mock_engine;

pub use mock_engine::{MockBehavior, MockEngine};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::engine::CatalogOutput;

    /// Renders preset names the way HandBrakeCLI prints its catalog.
    pub fn catalog_text(profiles: &[&str]) -> String {
        let mut text = String::from("General/\n");
        for profile in profiles {
            text.push_str("    ");
            text.push_str(profile);
            text.push('\n');
            text.push_str("        Encodes with the ");
            text.push_str(profile);
            text.push_str(" settings.\n");
        }
        text
    }

    /// Catalog output with the listing on stderr, as recent HandBrakeCLI builds print it.
    pub fn catalog_on_stderr(profiles: &[&str]) -> CatalogOutput {
        CatalogOutput {
            stdout: String::new(),
            stderr: catalog_text(profiles),
        }
    }
}
