//! Conversion configuration.
//!
//! Resolved once per run from CLI arguments and treated as read-only
//! afterwards: the processor chain order, the post-processor order, the
//! enabled custom block content types and the relative links source.

use thiserror::Error;
use url::Url;

use crate::postprocessors::POST_PROCESSOR_NAMES;
use crate::processors::CONTENT_PROCESSOR_NAMES;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown content processor: {0}")]
    UnknownContentProcessor(String),

    #[error("Unknown content post-processor: {0}")]
    UnknownPostProcessor(String),

    #[error("Unknown custom block content type: {0}")]
    UnknownCustomBlockType(String),

    #[error("Invalid relative links source {value:?}: {source}")]
    InvalidRelativeLinksSource {
        value: String,
        source: url::ParseError,
    },
}

/// Content types rendered with custom xblocks instead of plain HTML.
/// Their processors only claim resources when the type is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomBlockType {
    Pdf,
    GoogleDocument,
}

impl CustomBlockType {
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        match name {
            "pdf" => Ok(Self::Pdf),
            "google_document" => Ok(Self::GoogleDocument),
            other => Err(ConfigError::UnknownCustomBlockType(other.to_string())),
        }
    }

    /// The advanced module name the consuming LMS expects in the course
    /// policy for this block type.
    pub fn advanced_module(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::GoogleDocument => "google-document",
        }
    }

    /// File extensions a webcontent payload must carry to be claimed.
    pub fn file_extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Pdf => &["pdf"],
            Self::GoogleDocument => &[],
        }
    }
}

/// Per-run conversion options.
#[derive(Debug, Clone)]
pub struct ConversionConfig {
    pub content_processor_names: Vec<String>,
    pub post_processor_names: Vec<String>,
    pub custom_block_types: Vec<CustomBlockType>,
    pub relative_links_source: Option<String>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            content_processor_names: CONTENT_PROCESSOR_NAMES.iter().map(|s| s.to_string()).collect(),
            post_processor_names: POST_PROCESSOR_NAMES.iter().map(|s| s.to_string()).collect(),
            custom_block_types: Vec::new(),
            relative_links_source: None,
        }
    }
}

impl ConversionConfig {
    /// Check the configuration before any conversion begins.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for name in &self.content_processor_names {
            if !CONTENT_PROCESSOR_NAMES.contains(&name.as_str()) {
                return Err(ConfigError::UnknownContentProcessor(name.clone()));
            }
        }
        for name in &self.post_processor_names {
            if !POST_PROCESSOR_NAMES.contains(&name.as_str()) {
                return Err(ConfigError::UnknownPostProcessor(name.clone()));
            }
        }
        if let Some(source) = &self.relative_links_source {
            Url::parse(source).map_err(|err| ConfigError::InvalidRelativeLinksSource {
                value: source.clone(),
                source: err,
            })?;
        }
        Ok(())
    }
}
