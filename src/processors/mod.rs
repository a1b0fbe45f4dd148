//! Content processor pipeline.
//!
//! Each Common Cartridge resource is offered to an ordered chain of
//! processors; the first one returning nodes wins. Specific processors
//! come first, the HTML processor last as the fallback. The chain is
//! built once per run from configured names, a static match with no
//! load-by-string indirection.
//!
//! Processors read the cartridge and write only through the context:
//! LTI consumer ids and static asset paths. The cartridge itself stays
//! untouched.

pub mod assignment;
pub mod discussion;
pub mod google_document;
pub mod html;
pub mod lti;
pub mod pdf;
pub mod qti;
pub mod utils;
pub mod video;

use indexmap::IndexSet;
use thiserror::Error;

use crate::cartridge::{Cartridge, StaticAssetPathTable};
use crate::cartridge::manifest::ResourceRecord;
use crate::config::{ConfigError, CustomBlockType};
use crate::filesystem::FilesystemError;
use crate::olx::OlxNode;
use crate::xml::XmlError;

pub use qti::QtiError;

/// Names accepted in the configured content processor list, in the
/// default chain order.
pub const CONTENT_PROCESSOR_NAMES: &[&str] = &[
    "pdf",
    "google_document",
    "video",
    "lti",
    "qti",
    "assignment",
    "discussion",
    "html",
];

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error(transparent)]
    Filesystem(#[from] FilesystemError),

    #[error(transparent)]
    Xml(#[from] XmlError),

    #[error(transparent)]
    Qti(#[from] QtiError),
}

/// Mutable state shared across processor invocations within one file's
/// conversion. Both collections are append-only for the conversion's
/// duration.
#[derive(Debug, Default)]
pub struct ProcessorContext {
    relative_links_source: Option<String>,
    custom_block_types: Vec<CustomBlockType>,
    lti_consumer_ids: IndexSet<String>,
    static_paths: StaticAssetPathTable,
}

impl ProcessorContext {
    pub fn new(relative_links_source: Option<String>, custom_block_types: Vec<CustomBlockType>) -> Self {
        Self {
            relative_links_source,
            custom_block_types,
            ..Self::default()
        }
    }

    pub fn relative_links_source(&self) -> Option<&str> {
        self.relative_links_source.as_deref()
    }

    pub fn add_lti_consumer_id(&mut self, lti_consumer_id: String) {
        self.lti_consumer_ids.insert(lti_consumer_id);
    }

    pub fn lti_consumer_ids(&self) -> &IndexSet<String> {
        &self.lti_consumer_ids
    }

    pub fn is_custom_block_enabled(&self, block_type: CustomBlockType) -> bool {
        self.custom_block_types.contains(&block_type)
    }

    pub fn static_paths(&self) -> &StaticAssetPathTable {
        &self.static_paths
    }

    pub fn static_paths_mut(&mut self) -> &mut StaticAssetPathTable {
        &mut self.static_paths
    }
}

/// One resource-type-specific conversion strategy.
pub trait ContentProcessor {
    fn name(&self) -> &'static str;

    /// Build the OLX nodes for a resource, or `None` when the processor
    /// does not apply to it. Some resources expand to several nodes, a
    /// QTI assessment with several items for example.
    fn process(
        &self,
        cartridge: &Cartridge,
        context: &mut ProcessorContext,
        resource: &ResourceRecord,
        idref: &str,
    ) -> Result<Option<Vec<OlxNode>>, ProcessError>;
}

/// Build the processor chain from configured names.
pub fn build_registry(names: &[String]) -> Result<Vec<Box<dyn ContentProcessor>>, ConfigError> {
    names
        .iter()
        .map(|name| -> Result<Box<dyn ContentProcessor>, ConfigError> {
            match name.as_str() {
                "pdf" => Ok(Box::new(pdf::PdfProcessor)),
                "google_document" => Ok(Box::new(google_document::GoogleDocumentProcessor)),
                "video" => Ok(Box::new(video::VideoProcessor)),
                "lti" => Ok(Box::new(lti::LtiProcessor)),
                "qti" => Ok(Box::new(qti::QtiProcessor)),
                "assignment" => Ok(Box::new(assignment::AssignmentProcessor)),
                "discussion" => Ok(Box::new(discussion::DiscussionProcessor)),
                "html" => Ok(Box::new(html::HtmlProcessor)),
                other => Err(ConfigError::UnknownContentProcessor(other.to_string())),
            }
        })
        .collect()
}

/// Run the chain for one resource. Every leaf yields nodes: when no
/// configured processor claims the resource, the not-imported
/// placeholder is emitted.
pub fn dispatch(
    processors: &[Box<dyn ContentProcessor>],
    cartridge: &Cartridge,
    context: &mut ProcessorContext,
    resource: &ResourceRecord,
    idref: &str,
) -> Result<Vec<OlxNode>, ProcessError> {
    for processor in processors {
        if let Some(nodes) = processor.process(cartridge, context, resource, idref)? {
            if !nodes.is_empty() {
                return Ok(nodes);
            }
        }
    }
    Ok(vec![html::not_imported_node(resource)])
}
