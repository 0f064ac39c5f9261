//! Profile catalog reader.
//!
//! The set of valid preset names is whatever the engine says it is; nothing is
//! cached between calls.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::sync::Arc;
use tracing::debug;

use crate::engine::{CatalogOutput, Engine, EngineError};
use crate::layout::ProfileName;

/// A catalog entry: exactly four spaces, then a word character, then word
/// characters or spaces up to the end of the line.
static PROFILE_LINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^ {4}(\w[\w ]*)$").unwrap());

/// Lists the presets known to an engine.
#[derive(Clone)]
pub struct ProfileCatalog {
    engine: Arc<dyn Engine>,
}

impl ProfileCatalog {
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self { engine }
    }

    /// Queries the engine and returns its presets in catalog order.
    pub async fn list_profiles(&self) -> Result<Vec<ProfileName>, EngineError> {
        let output = self.engine.query_profile_catalog().await?;
        let profiles = parse_profile_catalog(select_catalog_text(&output));
        debug!(
            engine = self.engine.name(),
            count = profiles.len(),
            "Read profile catalog"
        );
        Ok(profiles)
    }
}

/// Picks the stream that actually carries the catalog: stdout, unless it is blank.
pub fn select_catalog_text(output: &CatalogOutput) -> &str {
    if output.stdout.trim().is_empty() {
        &output.stderr
    } else {
        &output.stdout
    }
}

/// Extracts preset names from catalog text. Order and duplicates are kept.
pub fn parse_profile_catalog(text: &str) -> Vec<ProfileName> {
    text.lines()
        .filter_map(|line| PROFILE_LINE_RE.captures(line))
        .filter_map(|caps| caps.get(1))
        .map(|name| ProfileName::new(name.as_str()))
        .collect()
}
