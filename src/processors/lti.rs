//! LTI content processor.
//!
//! Turns a basic LTI link resource into an `<lti_consumer>` block and
//! records the consumer id for the course policy passports.

use crate::cartridge::manifest::ResourceRecord;
use crate::cartridge::{resource_type, Cartridge};
use crate::filesystem;
use crate::olx::OlxNode;
use crate::processors::{ContentProcessor, ProcessError, ProcessorContext};
use crate::utils::simple_slug;
use crate::xml::BasicLtiLink;

const DEFAULT_WIDTH: &str = "500";
const DEFAULT_HEIGHT: &str = "500";

pub struct LtiProcessor;

struct LtiContent {
    title: String,
    description: String,
    launch_url: String,
    width: String,
    height: String,
    custom_parameters: Vec<(String, String)>,
    lti_id: String,
}

impl ContentProcessor for LtiProcessor {
    fn name(&self) -> &'static str {
        "lti"
    }

    fn process(
        &self,
        cartridge: &Cartridge,
        context: &mut ProcessorContext,
        resource: &ResourceRecord,
        idref: &str,
    ) -> Result<Option<Vec<OlxNode>>, ProcessError> {
        let Some(content) = self.parse(cartridge, resource, idref)? else {
            return Ok(None);
        };
        context.add_lti_consumer_id(content.lti_id.clone());
        Ok(Some(vec![create_node(&content)]))
    }
}

impl LtiProcessor {
    fn parse(
        &self,
        cartridge: &Cartridge,
        resource: &ResourceRecord,
        idref: &str,
    ) -> Result<Option<LtiContent>, ProcessError> {
        if !resource_type::is_lti_link(&resource.resource_type) {
            return Ok(None);
        }
        let Some(resource_file) = resource.first_file() else {
            return Ok(None);
        };

        let file_path = cartridge.build_resource_file_path(&resource_file.href);
        let xml_text = filesystem::read_xml_text(&file_path)?;
        let link = BasicLtiLink::parse(&xml_text)?;

        let title = link.title.clone().unwrap_or_default();
        let mut launch_url = link.launch_url().unwrap_or_default().to_string();

        // Canvas flavored courses carry the correct launch URL in the
        // module meta instead of the LTI link document.
        if cartridge.is_canvas_flavor() {
            if let Some(url) = cartridge.module_meta().external_tool_url(idref) {
                launch_url = url.to_string();
            }
        }

        Ok(Some(LtiContent {
            lti_id: link
                .tool_id
                .clone()
                .unwrap_or_else(|| simple_slug(&title)),
            description: link.description.clone().unwrap_or_default(),
            width: link
                .selection_width
                .clone()
                .unwrap_or_else(|| DEFAULT_WIDTH.to_string()),
            height: link
                .selection_height
                .clone()
                .unwrap_or_else(|| DEFAULT_HEIGHT.to_string()),
            custom_parameters: link.custom_parameters,
            title,
            launch_url,
        }))
    }
}

fn create_node(content: &LtiContent) -> OlxNode {
    let custom_parameters = format!(
        "[{}]",
        content
            .custom_parameters
            .iter()
            .map(|(key, value)| format!(r#""{key}={value}""#))
            .collect::<Vec<_>>()
            .join(", ")
    );

    OlxNode::new("lti_consumer")
        .with_attribute("custom_parameters", custom_parameters)
        .with_attribute("description", &content.description)
        .with_attribute("display_name", &content.title)
        .with_attribute("inline_height", &content.height)
        .with_attribute("inline_width", &content.width)
        .with_attribute("launch_url", &content.launch_url)
        .with_attribute("modal_height", &content.height)
        .with_attribute("modal_width", &content.width)
        .with_attribute("xblock-family", "xblock.v1")
        .with_attribute("lti_id", &content.lti_id)
}
