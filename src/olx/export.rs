//! Course export assembly.
//!
//! [`OlxExport`] drives one cartridge through the full conversion: the
//! canonical course tree becomes the `course.xml` chapter, sequential
//! and vertical skeleton, leaves go through the content processor
//! chain, every produced node through the post-processor chain, and the
//! course policy document is derived from what was emitted.

use indexmap::IndexSet;
use serde_json::json;
use tracing::warn;

use crate::cartridge::normalize::{CanonicalCourseTree, NormalizerConfig, Section, Subsection, Unit};
use crate::cartridge::Cartridge;
use crate::config::{ConfigError, ConversionConfig};
use crate::olx::OlxNode;
use crate::postprocessors::{self, ContentPostProcessor};
use crate::processors::{self, ContentProcessor, ProcessError, ProcessorContext};

const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

/// LTI consumers always need an `advanced_modules` policy entry; the
/// enabled custom block types contribute theirs on top.
const LTI_CONSUMER_TAG: &str = "lti_consumer";

pub struct OlxExport<'a> {
    cartridge: &'a Cartridge,
    processors: Vec<Box<dyn ContentProcessor>>,
    post_processors: Vec<Box<dyn ContentPostProcessor>>,
    context: ProcessorContext,
    advanced_module_tags: Vec<&'static str>,
    advanced_modules: IndexSet<String>,
}

impl<'a> OlxExport<'a> {
    pub fn new(cartridge: &'a Cartridge, config: &ConversionConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            cartridge,
            processors: processors::build_registry(&config.content_processor_names)?,
            post_processors: postprocessors::build_registry(&config.post_processor_names)?,
            context: ProcessorContext::new(
                config.relative_links_source.clone(),
                config.custom_block_types.clone(),
            ),
            advanced_module_tags: std::iter::once(LTI_CONSUMER_TAG)
                .chain(config.custom_block_types.iter().map(|block| block.advanced_module()))
                .collect(),
            advanced_modules: IndexSet::new(),
        })
    }

    /// Conversion state accumulated while building the course XML; the
    /// packaging step reads the static asset paths out of it.
    pub fn context(&self) -> &ProcessorContext {
        &self.context
    }

    /// Build the complete `course.xml` document.
    pub fn xml(&mut self) -> Result<String, ProcessError> {
        let mut course = OlxNode::new("course")
            .with_attribute("org", self.cartridge.course_org())
            .with_attribute("course", self.cartridge.course_number())
            .with_attribute("name", self.cartridge.title());

        // Zero organizations is legal; the course is just empty then.
        if let Some(tree) = self.cartridge.normalized_tree(NormalizerConfig::default()) {
            course = self.add_sections(course, &tree)?;
        }

        Ok(format!("{XML_DECLARATION}{}", course.to_xml()))
    }

    fn add_sections(&mut self, mut course: OlxNode, tree: &CanonicalCourseTree) -> Result<OlxNode, ProcessError> {
        for section in &tree.sections {
            course = course.with_element(self.build_chapter(section)?);
        }
        Ok(course)
    }

    fn build_chapter(&mut self, section: &Section) -> Result<OlxNode, ProcessError> {
        let mut chapter = structural_node("chapter", &section.identifier, &section.title);
        for subsection in &section.subsections {
            chapter = chapter.with_element(self.build_sequential(subsection)?);
        }
        Ok(chapter)
    }

    fn build_sequential(&mut self, subsection: &Subsection) -> Result<OlxNode, ProcessError> {
        let mut sequential = structural_node("sequential", &subsection.identifier, &subsection.title);
        for unit in &subsection.units {
            sequential = sequential.with_element(self.build_vertical(unit)?);
        }
        Ok(sequential)
    }

    fn build_vertical(&mut self, unit: &Unit) -> Result<OlxNode, ProcessError> {
        let mut vertical = structural_node("vertical", &unit.identifier, &unit.title);

        for component in &unit.components {
            let Some(idref) = component.identifierref.as_deref() else {
                continue;
            };
            let Some(resource) = self.cartridge.resource_by_id(idref).cloned() else {
                warn!("Unknown resource reference: {}", idref);
                continue;
            };

            let nodes = processors::dispatch(
                &self.processors,
                self.cartridge,
                &mut self.context,
                &resource,
                idref,
            )?;
            for mut node in nodes {
                for post_processor in &self.post_processors {
                    post_processor.process(&mut node, self.cartridge, &self.context);
                }
                if self.advanced_module_tags.contains(&node.tag.as_str()) {
                    self.advanced_modules.insert(node.tag.clone());
                }
                vertical = vertical.with_element(node);
            }
        }

        Ok(vertical)
    }

    /// Build the course policy document.
    ///
    /// LTI passports are placeholders derived from the consumer ids;
    /// real keys and secrets have to be filled in on the platform.
    pub fn policy(&self) -> serde_json::Value {
        let mut course_policy = json!({
            "display_name": self.cartridge.title(),
            "language": self.cartridge.language(),
            "tabs": [
                {"course_staff_only": false, "name": "Home", "type": "course_info"},
                {"course_staff_only": false, "name": "Course", "type": "courseware"},
                {"course_staff_only": false, "name": "Wiki", "type": "wiki", "is_hidden": true},
                {"course_staff_only": false, "name": "Progress", "type": "progress"},
            ],
        });

        if !self.advanced_modules.is_empty() {
            course_policy["advanced_modules"] =
                json!(self.advanced_modules.iter().collect::<Vec<_>>());
        }
        if !self.context.lti_consumer_ids().is_empty() {
            let passports: Vec<String> = self
                .context
                .lti_consumer_ids()
                .iter()
                .map(|id| format!("{id}:{id}_key:{id}_secret"))
                .collect();
            course_policy["lti_passports"] = json!(passports);
        }

        json!({ "course/course": course_policy })
    }
}

fn structural_node(tag: &str, identifier: &Option<String>, title: &Option<String>) -> OlxNode {
    OlxNode::new(tag)
        .with_attribute("url_name", identifier.clone().unwrap_or_default())
        .with_attribute("display_name", title.clone().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use crate::cartridge::manifest::Manifest;
    use crate::cartridge::module_meta::ModuleMeta;
    use crate::config::CustomBlockType;

    const MANIFEST_XML: &str = r#"<manifest>
        <metadata>
            <lomimscc:lom xmlns:lomimscc="http://ltsc.ieee.org/xsd/imsccv1p1/LOM/manifest">
                <lomimscc:general>
                    <lomimscc:title><lomimscc:string>Sample Course</lomimscc:string></lomimscc:title>
                </lomimscc:general>
            </lomimscc:lom>
        </metadata>
        <organizations>
            <organization identifier="org_1" structure="rooted-hierarchy">
                <item identifier="root">
                    <item identifier="module_1">
                        <title>Week 1</title>
                        <item identifier="item_1" identifierref="res_page">
                            <title>Intro Page</title>
                        </item>
                        <item identifier="item_2" identifierref="res_tool">
                            <title>External Tool</title>
                        </item>
                    </item>
                </item>
            </organization>
        </organizations>
        <resources>
            <resource identifier="res_page" type="webcontent" href="page.html">
                <file href="page.html"/>
            </resource>
            <resource identifier="res_tool" type="imsbasiclti_xmlv1p0" href="tool.xml">
                <file href="tool.xml"/>
            </resource>
        </resources>
    </manifest>"#;

    fn sample_cartridge() -> (tempfile::TempDir, Cartridge) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("page.html"), "<html><body><p>Hello</p></body></html>").unwrap();
        fs::write(
            dir.path().join("tool.xml"),
            r#"<cartridge_basiclti_link>
                <title>Quiz Tool</title>
                <launch_url>https://tool.example.com/launch</launch_url>
            </cartridge_basiclti_link>"#,
        )
        .unwrap();

        let manifest = Manifest::parse(MANIFEST_XML).unwrap();
        let cartridge = Cartridge::from_manifest(
            manifest,
            "course.imscc".into(),
            dir.path().to_path_buf(),
            false,
            ModuleMeta::default(),
        );
        (dir, cartridge)
    }

    #[test]
    fn test_course_xml_skeleton() {
        let (_dir, cartridge) = sample_cartridge();
        let config = ConversionConfig::default();
        let mut export = OlxExport::new(&cartridge, &config).unwrap();

        let xml = export.xml().unwrap();
        assert!(xml.starts_with(XML_DECLARATION));
        assert!(xml.contains(r#"<course org="org" course="number" name="Sample Course">"#));
        assert!(xml.contains(r#"<chapter url_name="module_1" display_name="Week 1">"#));
        assert!(xml.contains("<sequential"));
        assert!(xml.contains("<vertical"));
        assert!(xml.contains("<p>Hello</p>"));
        assert!(xml.contains("<lti_consumer"));
    }

    #[test]
    fn test_policy_document() {
        let (_dir, cartridge) = sample_cartridge();
        let config = ConversionConfig::default();
        let mut export = OlxExport::new(&cartridge, &config).unwrap();
        export.xml().unwrap();

        let policy = export.policy();
        let course = &policy["course/course"];
        assert_eq!(course["display_name"], "Sample Course");
        assert_eq!(course["language"], "en");

        let tabs = course["tabs"].as_array().unwrap();
        let wiki = tabs.iter().find(|tab| tab["name"] == "Wiki").unwrap();
        assert_eq!(wiki["is_hidden"], true);

        assert_eq!(course["advanced_modules"], json!(["lti_consumer"]));
        assert_eq!(
            course["lti_passports"],
            json!(["quiz_tool:quiz_tool_key:quiz_tool_secret"])
        );
    }

    #[test]
    fn test_policy_without_advanced_content() {
        let manifest = Manifest::parse("<manifest/>").unwrap();
        let cartridge = Cartridge::from_manifest(
            manifest,
            "c.imscc".into(),
            "/tmp/c".into(),
            false,
            ModuleMeta::default(),
        );
        let config = ConversionConfig::default();
        let export = OlxExport::new(&cartridge, &config).unwrap();

        let policy = export.policy();
        let course = &policy["course/course"];
        assert_eq!(course["display_name"], "Default Course Title");
        assert!(course.get("advanced_modules").is_none());
        assert!(course.get("lti_passports").is_none());
    }

    #[test]
    fn test_unknown_resource_reference_skipped() {
        let manifest = Manifest::parse(
            r#"<manifest>
                <organizations>
                    <organization identifier="org_1">
                        <item identifier="root">
                            <item identifier="module_1">
                                <title>Week 1</title>
                                <item identifier="item_1" identifierref="missing">
                                    <title>Gone</title>
                                </item>
                            </item>
                        </item>
                    </organization>
                </organizations>
            </manifest>"#,
        )
        .unwrap();
        let cartridge = Cartridge::from_manifest(
            manifest,
            "c.imscc".into(),
            "/tmp/c".into(),
            false,
            ModuleMeta::default(),
        );
        let config = ConversionConfig::default();
        let mut export = OlxExport::new(&cartridge, &config).unwrap();

        let xml = export.xml().unwrap();
        assert!(xml.contains(r#"<chapter url_name="module_1""#));
        assert!(!xml.contains("Gone</"));
    }

    #[test]
    fn test_custom_block_advanced_modules_recorded() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("web_resources")).unwrap();
        fs::write(dir.path().join("web_resources/doc.pdf"), "pdf bytes").unwrap();

        let manifest = Manifest::parse(
            r#"<manifest>
                <organizations>
                    <organization identifier="org_1">
                        <item identifier="root">
                            <item identifier="module_1">
                                <title>Docs</title>
                                <item identifier="item_1" identifierref="res_pdf">
                                    <title>Reading</title>
                                </item>
                            </item>
                        </item>
                    </organization>
                </organizations>
                <resources>
                    <resource identifier="res_pdf" type="webcontent" href="web_resources/doc.pdf">
                        <file href="web_resources/doc.pdf"/>
                    </resource>
                </resources>
            </manifest>"#,
        )
        .unwrap();
        let cartridge = Cartridge::from_manifest(
            manifest,
            "c.imscc".into(),
            dir.path().to_path_buf(),
            false,
            ModuleMeta::default(),
        );
        let config = ConversionConfig {
            custom_block_types: vec![CustomBlockType::Pdf],
            ..ConversionConfig::default()
        };
        let mut export = OlxExport::new(&cartridge, &config).unwrap();
        export.xml().unwrap();

        let policy = export.policy();
        assert_eq!(policy["course/course"]["advanced_modules"], json!(["pdf"]));
    }
}
