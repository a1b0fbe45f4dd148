//! PDF content processor.
//!
//! Emits the PDF xblock OLX for resources carrying a PDF document, so
//! the document is displayed on the course page directly instead of
//! being offered as a download. Only active when the `pdf` custom block
//! content type is enabled.

use url::Url;

use crate::cartridge::manifest::ResourceRecord;
use crate::cartridge::{resource_type, Cartridge};
use crate::config::CustomBlockType;
use crate::olx::OlxNode;
use crate::processors::utils::{parse_web_link, WebContentFile};
use crate::processors::{ContentProcessor, ProcessError, ProcessorContext};

pub struct PdfProcessor;

impl ContentProcessor for PdfProcessor {
    fn name(&self) -> &'static str {
        "pdf"
    }

    fn process(
        &self,
        cartridge: &Cartridge,
        context: &mut ProcessorContext,
        resource: &ResourceRecord,
        _idref: &str,
    ) -> Result<Option<Vec<OlxNode>>, ProcessError> {
        if !context.is_custom_block_enabled(CustomBlockType::Pdf) {
            return Ok(None);
        }

        let url = if resource.resource_type == resource_type::WEB_CONTENT {
            self.parse_webcontent(cartridge, context, resource)
        } else {
            self.parse_web_link(cartridge, resource)?
        };

        Ok(url.map(|url| vec![OlxNode::new("pdf").with_attribute("url", url)]))
    }
}

impl PdfProcessor {
    fn parse_webcontent(
        &self,
        cartridge: &Cartridge,
        context: &mut ProcessorContext,
        resource: &ResourceRecord,
    ) -> Option<String> {
        let resource_file = resource.first_file()?;
        let web_content = WebContentFile::new(cartridge, resource_file);
        if !has_pdf_extension(web_content.relative_path()) {
            return None;
        }

        let olx_static_path = web_content.olx_static_path();
        if web_content.is_from_web_resources_dir() {
            context.static_paths_mut().add_web_resource_path(
                olx_static_path.clone(),
                web_content.file_path().display().to_string(),
            );
        } else {
            context
                .static_paths_mut()
                .add_extra_path(olx_static_path.clone(), web_content.relative_path().to_string());
        }
        Some(olx_static_path)
    }

    fn parse_web_link(
        &self,
        cartridge: &Cartridge,
        resource: &ResourceRecord,
    ) -> Result<Option<String>, ProcessError> {
        let Some(web_link) = parse_web_link(cartridge, resource)? else {
            return Ok(None);
        };
        let Some(url) = web_link.url else {
            return Ok(None);
        };
        let points_to_pdf = Url::parse(&url)
            .map(|parsed| has_pdf_extension(parsed.path()))
            .unwrap_or(false);
        Ok(points_to_pdf.then_some(url))
    }
}

fn has_pdf_extension(path: &str) -> bool {
    CustomBlockType::Pdf
        .file_extensions()
        .iter()
        .any(|extension| path.to_ascii_lowercase().ends_with(&format!(".{extension}")))
}
