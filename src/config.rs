//! File publisher configuration
//!
//! The owning application hands the recorder an explicit, read-only snapshot
//! of its configuration and stream identity instead of letting it reach into
//! shared state.

use crate::media::Track;
use crate::utils::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Path templates for the file publisher
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilePublisherConfig {
    /// Template for the final recording path. The in-progress file uses the
    /// same template with a `.tmp` suffix.
    pub file_path: String,

    /// Template for the auxiliary info/metadata file
    pub file_info_path: String,
}

impl FilePublisherConfig {
    /// Parse the publisher block from JSON
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load the publisher block from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&content)?;

        tracing::debug!("Loaded file publisher config from {:?}", path);

        Ok(config)
    }
}

/// Names used for macro substitution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamIdentity {
    pub virtual_host: String,

    /// Application name, possibly carrying a `#<host>#` prefix
    pub application: String,

    pub stream: String,
}

impl StreamIdentity {
    pub fn new(
        virtual_host: impl Into<String>,
        application: impl Into<String>,
        stream: impl Into<String>,
    ) -> Self {
        Self {
            virtual_host: virtual_host.into(),
            application: application.into(),
            stream: stream.into(),
        }
    }

    /// Application name with the `#<host>#` prefix removed
    pub fn application_name(&self) -> &str {
        let prefix = format!("#{}#", self.virtual_host);
        self.application
            .strip_prefix(prefix.as_str())
            .unwrap_or(&self.application)
    }
}

/// Everything the recorder reads from the owning stream
#[derive(Debug, Clone)]
pub struct StreamContext {
    pub identity: StreamIdentity,
    pub config: FilePublisherConfig,
    /// Track descriptors keyed by track id
    pub tracks: BTreeMap<i32, Track>,
}

impl StreamContext {
    pub fn new(identity: StreamIdentity, config: FilePublisherConfig) -> Self {
        Self {
            identity,
            config,
            tracks: BTreeMap::new(),
        }
    }

    /// Add or replace a track descriptor
    pub fn with_track(mut self, track: Track) -> Self {
        self.tracks.insert(track.id, track);
        self
    }
}
