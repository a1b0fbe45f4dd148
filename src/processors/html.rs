//! HTML content processor.
//!
//! The last processor in the chain and the guaranteed fallback: it
//! claims every resource it is offered. Webcontent HTML files are
//! inlined, images and other binary payloads become static references,
//! web links become anchors, and everything unknown becomes a
//! placeholder node.

use std::path::Path;

use tracing::{error, info, warn};

use crate::cartridge::manifest::ResourceRecord;
use crate::cartridge::{resource_type, Cartridge};
use crate::filesystem;
use crate::olx::OlxNode;
use crate::processors::utils::{parse_web_link, WebContentFile};
use crate::processors::{ContentProcessor, ProcessError, ProcessorContext};
use crate::utils::clean_from_cdata;

const FALLBACK_CONTENT: &str = "<p>MISSING CONTENT</p>";
const HTML_FILENAME_EXTENSION: &str = "html";

const IMAGE_FILE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp", "svg"];

pub struct HtmlProcessor;

impl ContentProcessor for HtmlProcessor {
    fn name(&self) -> &'static str {
        "html"
    }

    fn process(
        &self,
        cartridge: &Cartridge,
        context: &mut ProcessorContext,
        resource: &ResourceRecord,
        idref: &str,
    ) -> Result<Option<Vec<OlxNode>>, ProcessError> {
        let html = self.parse(cartridge, context, resource, idref)?;
        Ok(Some(vec![html_node(&html)]))
    }
}

impl HtmlProcessor {
    fn parse(
        &self,
        cartridge: &Cartridge,
        context: &mut ProcessorContext,
        resource: &ResourceRecord,
        idref: &str,
    ) -> Result<String, ProcessError> {
        if resource.resource_type == resource_type::WEB_CONTENT {
            self.parse_webcontent(cartridge, context, resource, idref)
        } else if let Some(web_link) = parse_web_link(cartridge, resource)? {
            Ok(format!(
                r#"<a href="{}">{}</a>"#,
                web_link.url.unwrap_or_default(),
                web_link.title.unwrap_or_default()
            ))
        } else if is_known_unprocessed_resource_type(&resource.resource_type) {
            Ok(FALLBACK_CONTENT.to_string())
        } else {
            Ok(not_imported_text(resource))
        }
    }

    fn parse_webcontent(
        &self,
        cartridge: &Cartridge,
        context: &mut ProcessorContext,
        resource: &ResourceRecord,
        idref: &str,
    ) -> Result<String, ProcessError> {
        let Some(resource_file) = resource.first_file() else {
            warn!("Webcontent resource {} has no files", resource.identifier);
            return Ok(FALLBACK_CONTENT.to_string());
        };
        let web_content = WebContentFile::new(cartridge, resource_file);
        let file_path = web_content.file_path();

        if has_extension(file_path, HTML_FILENAME_EXTENSION) {
            filesystem::read_file(file_path).map_err(|err| {
                error!("Failure reading {} from id {}", file_path.display(), idref);
                ProcessError::from(err)
            })
        } else if web_content.is_from_web_resources_dir() && is_image(file_path) {
            let olx_static_path = web_content.olx_static_path();
            context
                .static_paths_mut()
                .add_web_resource_path(olx_static_path.clone(), file_path.display().to_string());
            Ok(format!(
                r#"<p><img src="{olx_static_path}" alt="{}"/></p>"#,
                web_content.static_file_name()
            ))
        } else if !web_content.is_from_web_resources_dir() {
            // Has to be copied into the static directory at packaging
            // time, hence the extra path registration.
            let olx_static_path = web_content.olx_static_path();
            context
                .static_paths_mut()
                .add_extra_path(olx_static_path.clone(), web_content.relative_path().to_string());
            Ok(format!(
                r#"<p><a href="{olx_static_path}" target="_blank">{}</a></p>"#,
                web_content.relative_path()
            ))
        } else {
            info!("Skipping webcontent: {}", file_path.display());
            Ok(FALLBACK_CONTENT.to_string())
        }
    }
}

/// Whether the type belongs to another processor's territory; reaching
/// the HTML processor with one of these means that processor declined,
/// so a placeholder is the best available output.
fn is_known_unprocessed_resource_type(value: &str) -> bool {
    resource_type::is_lti_link(value)
        || resource_type::is_qti_assessment(value)
        || resource_type::is_discussion_topic(value)
        || resource_type::is_assignment(value)
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
}

fn is_image(path: &Path) -> bool {
    IMAGE_FILE_EXTENSIONS
        .iter()
        .any(|extension| has_extension(path, extension))
}

/// Wrap markup into an `<html>` OLX node. Nested CDATA markers are
/// stripped first since CDATA sections do not nest.
pub fn html_node(html: &str) -> OlxNode {
    OlxNode::new("html").with_cdata(clean_from_cdata(html))
}

pub fn not_imported_node(resource: &ResourceRecord) -> OlxNode {
    html_node(&not_imported_text(resource))
}

fn not_imported_text(resource: &ResourceRecord) -> String {
    let mut text = format!("Not imported content: type = {:?}", resource.resource_type);
    if let Some(href) = &resource.href {
        text.push_str(&format!(", href = {href:?}"));
    }
    info!("{}", text);
    text
}
