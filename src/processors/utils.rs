//! Helpers shared by several content processors.

use std::path::{Path, PathBuf};

use crate::cartridge::manifest::{ResourceFile, ResourceRecord};
use crate::cartridge::{resource_type, Cartridge};
use crate::filesystem;
use crate::olx::OlxNode;
use crate::processors::ProcessError;
use crate::xml::WebLink;

pub const WEB_RESOURCES_DIR_NAME: &str = "web_resources";

/// Build the `/static/...` path a file is reachable under after import.
pub fn olx_static_path(static_filename: &str) -> String {
    format!("/static/{static_filename}")
}

/// A webcontent payload file with its location facts resolved.
pub struct WebContentFile {
    relative_path: String,
    file_path: PathBuf,
}

impl WebContentFile {
    pub fn new(cartridge: &Cartridge, resource_file: &ResourceFile) -> Self {
        Self {
            relative_path: resource_file.href.clone(),
            file_path: cartridge.build_resource_file_path(&resource_file.href),
        }
    }

    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn is_from_web_resources_dir(&self) -> bool {
        self.relative_path.contains(WEB_RESOURCES_DIR_NAME)
    }

    /// The file name under `/static/`: files inside `web_resources` keep
    /// their path below that directory, everything else keeps its full
    /// package-relative path.
    pub fn static_file_name(&self) -> &str {
        self.relative_path
            .split_once(&format!("{WEB_RESOURCES_DIR_NAME}/"))
            .map(|(_, after)| after)
            .unwrap_or(&self.relative_path)
    }

    pub fn olx_static_path(&self) -> String {
        olx_static_path(self.static_file_name())
    }
}

/// Load and parse a resource's web link document, when the resource is
/// of the web link type.
pub fn parse_web_link(
    cartridge: &Cartridge,
    resource: &ResourceRecord,
) -> Result<Option<WebLink>, ProcessError> {
    if !resource_type::is_web_link(&resource.resource_type) {
        return Ok(None);
    }
    let Some(resource_file) = resource.first_file() else {
        return Ok(None);
    };

    let file_path = cartridge.build_resource_file_path(&resource_file.href);
    let xml_text = filesystem::read_xml_text(&file_path)?;
    Ok(Some(WebLink::parse(&xml_text)?))
}

fn rubric_option(name: &str, points: &str, explanation: &str) -> OlxNode {
    OlxNode::new("option")
        .with_attribute("points", points)
        .with_element(OlxNode::new("name").with_text(name))
        .with_element(OlxNode::new("label").with_text(name))
        .with_element(OlxNode::new("explanation").with_text(explanation))
}

/// Default open response assessment rubric criteria, used when the
/// source assignment carries no rubric of its own.
pub fn default_ora_criteria() -> Vec<OlxNode> {
    vec![
        OlxNode::new("criterion")
            .with_attribute("feedback", "optional")
            .with_element(OlxNode::new("name").with_text("Ideas"))
            .with_element(OlxNode::new("label").with_text("Ideas"))
            .with_element(OlxNode::new("prompt").with_text("Determine if there is a unifying theme or main idea."))
            .with_element(rubric_option(
                "Poor",
                "0",
                "Difficult for the reader to discern the main idea.",
            ))
            .with_element(rubric_option(
                "Fair",
                "3",
                "Presents a unifying theme or main idea, but may include minor tangents.",
            ))
            .with_element(rubric_option(
                "Good",
                "5",
                "Presents a unifying theme or main idea without going off on tangents.",
            )),
        OlxNode::new("criterion")
            .with_attribute("feedback", "optional")
            .with_element(OlxNode::new("name").with_text("Content"))
            .with_element(OlxNode::new("label").with_text("Content"))
            .with_element(OlxNode::new("prompt").with_text("Assess the content of the submission."))
            .with_element(rubric_option(
                "Poor",
                "0",
                "Includes little information with few or no details or unrelated details.",
            ))
            .with_element(rubric_option(
                "Fair",
                "1",
                "Includes little information and few or no details.",
            ))
            .with_element(rubric_option(
                "Good",
                "3",
                "Includes sufficient information and supporting details.",
            ))
            .with_element(rubric_option(
                "Excellent",
                "5",
                "Includes in-depth information and exceptional supporting details.",
            )),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::module_meta::ModuleMeta;
    use crate::cartridge::manifest::Manifest;

    fn test_cartridge() -> Cartridge {
        let manifest = Manifest::parse("<manifest/>").unwrap();
        Cartridge::from_manifest(
            manifest,
            "c.imscc".into(),
            "/course".into(),
            false,
            ModuleMeta::default(),
        )
    }

    #[test]
    fn test_web_content_file_inside_web_resources() {
        let cartridge = test_cartridge();
        let file = ResourceFile {
            href: "web_resources/images/logo.png".to_string(),
        };
        let web_content = WebContentFile::new(&cartridge, &file);

        assert!(web_content.is_from_web_resources_dir());
        assert_eq!(web_content.static_file_name(), "images/logo.png");
        assert_eq!(web_content.olx_static_path(), "/static/images/logo.png");
    }

    #[test]
    fn test_web_content_file_outside_web_resources() {
        let cartridge = test_cartridge();
        let file = ResourceFile {
            href: "files/handout.pdf".to_string(),
        };
        let web_content = WebContentFile::new(&cartridge, &file);

        assert!(!web_content.is_from_web_resources_dir());
        assert_eq!(web_content.static_file_name(), "files/handout.pdf");
        assert_eq!(web_content.olx_static_path(), "/static/files/handout.pdf");
    }

    #[test]
    fn test_default_ora_criteria_shape() {
        let criteria = default_ora_criteria();
        assert_eq!(criteria.len(), 2);
        assert!(criteria.iter().all(|criterion| criterion.tag == "criterion"));
    }
}
