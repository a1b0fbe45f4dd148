//! Google document content processor.
//!
//! Claims web link resources pointing at Google documents (documents,
//! spreadsheets, presentations, forms) except drawings, and emits the
//! Google Drive xblock OLX embedding the document. Only active when the
//! `google_document` custom block content type is enabled.

use std::sync::OnceLock;

use regex::Regex;

use crate::cartridge::manifest::ResourceRecord;
use crate::cartridge::Cartridge;
use crate::config::CustomBlockType;
use crate::olx::OlxNode;
use crate::processors::utils::parse_web_link;
use crate::processors::{ContentProcessor, ProcessError, ProcessorContext};

const UNSUPPORTED_DOCUMENT_KIND: &str = "drawings";

// Standard iframe settings the Google document xblock applies by default.
const DEFAULT_IFRAME_ATTRIBUTES: &str = "frameborder=\"0\" width=\"960\" height=\"569\" \
    allowfullscreen=\"true\" mozallowfullscreen=\"true\" webkitallowfullscreen=\"true\"";

fn google_document_url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^https?://docs\.google\.com/([^/]+)/d/.*$").expect("valid regex")
    })
}

/// Whether the URL points at an embeddable Google document. Drawing
/// URLs share the host and shape but are not supported by the xblock.
fn is_supported_google_document_url(url: &str) -> bool {
    google_document_url_pattern()
        .captures(url)
        .is_some_and(|captures| !captures[1].eq_ignore_ascii_case(UNSUPPORTED_DOCUMENT_KIND))
}

pub struct GoogleDocumentProcessor;

impl ContentProcessor for GoogleDocumentProcessor {
    fn name(&self) -> &'static str {
        "google_document"
    }

    fn process(
        &self,
        cartridge: &Cartridge,
        context: &mut ProcessorContext,
        resource: &ResourceRecord,
        _idref: &str,
    ) -> Result<Option<Vec<OlxNode>>, ProcessError> {
        if !context.is_custom_block_enabled(CustomBlockType::GoogleDocument) {
            return Ok(None);
        }

        let Some(web_link) = parse_web_link(cartridge, resource)? else {
            return Ok(None);
        };
        let Some(url) = web_link.url else {
            return Ok(None);
        };
        if !is_supported_google_document_url(&url) {
            return Ok(None);
        }

        let embed_code = format!(r#"<iframe {DEFAULT_IFRAME_ATTRIBUTES} src="{url}"></iframe>"#);
        let node = OlxNode::new("google-document").with_attribute("embed_code", embed_code);
        Ok(Some(vec![node]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use crate::cartridge::manifest::Manifest;
    use crate::cartridge::module_meta::ModuleMeta;

    fn cartridge(url: &str) -> (tempfile::TempDir, Cartridge) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("link.xml"),
            format!(r#"<webLink><title>Doc</title><url href="{url}"/></webLink>"#),
        )
        .unwrap();
        let manifest = Manifest::parse(
            r#"<manifest><resources>
                <resource identifier="r1" type="imswl_xmlv1p1" href="link.xml">
                  <file href="link.xml"/>
                </resource>
            </resources></manifest>"#,
        )
        .unwrap();
        let cartridge = Cartridge::from_manifest(
            manifest,
            "c.imscc".into(),
            dir.path().to_path_buf(),
            false,
            ModuleMeta::default(),
        );
        (dir, cartridge)
    }

    #[test]
    fn test_url_matching() {
        assert!(is_supported_google_document_url(
            "https://docs.google.com/document/d/abc123/edit"
        ));
        assert!(is_supported_google_document_url(
            "https://docs.google.com/spreadsheets/d/abc123"
        ));
        assert!(!is_supported_google_document_url(
            "https://docs.google.com/drawings/d/abc123"
        ));
        assert!(!is_supported_google_document_url("https://example.com/document/d/abc"));
    }

    #[test]
    fn test_google_document_node() {
        let (_dir, cartridge) = cartridge("https://docs.google.com/presentation/d/xyz/embed");
        let mut context = ProcessorContext::new(None, vec![CustomBlockType::GoogleDocument]);
        let resource = cartridge.resource_by_id("r1").unwrap().clone();

        let nodes = GoogleDocumentProcessor
            .process(&cartridge, &mut context, &resource, "r1")
            .unwrap()
            .unwrap();
        assert_eq!(nodes[0].tag, "google-document");
        let embed_code = nodes[0].attribute("embed_code").unwrap();
        assert!(embed_code.contains(r#"src="https://docs.google.com/presentation/d/xyz/embed""#));
        assert!(embed_code.contains(r#"width="960""#));
    }

    #[test]
    fn test_declined_when_disabled() {
        let (_dir, cartridge) = cartridge("https://docs.google.com/document/d/abc");
        let mut context = ProcessorContext::default();
        let resource = cartridge.resource_by_id("r1").unwrap().clone();

        let result = GoogleDocumentProcessor
            .process(&cartridge, &mut context, &resource, "r1")
            .unwrap();
        assert!(result.is_none());
    }
}
