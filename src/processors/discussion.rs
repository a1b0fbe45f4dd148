//! Discussion topic content processor.
//!
//! A discussion topic maps to a pair of nodes: an `<html>` block with
//! the topic text and a `<discussion>` block wired to a category named
//! after the topic title.

use crate::cartridge::manifest::ResourceRecord;
use crate::cartridge::{resource_type, Cartridge};
use crate::filesystem;
use crate::olx::OlxNode;
use crate::processors::html::html_node;
use crate::processors::{ContentProcessor, ProcessError, ProcessorContext};
use crate::xml::DiscussionTopic;

const DEFAULT_TEXT: &str = "MISSING CONTENT";

pub struct DiscussionProcessor;

impl ContentProcessor for DiscussionProcessor {
    fn name(&self) -> &'static str {
        "discussion"
    }

    fn process(
        &self,
        cartridge: &Cartridge,
        _context: &mut ProcessorContext,
        resource: &ResourceRecord,
        _idref: &str,
    ) -> Result<Option<Vec<OlxNode>>, ProcessError> {
        if !resource_type::is_discussion_topic(&resource.resource_type) {
            return Ok(None);
        }

        let mut topic = DiscussionTopic::default();
        for resource_file in resource.files() {
            let file_path = cartridge.build_resource_file_path(&resource_file.href);
            let xml_text = filesystem::read_xml_text(&file_path)?;
            topic = DiscussionTopic::parse(&xml_text)?;
        }

        let title = topic.title.unwrap_or_default();
        let text = topic.text.unwrap_or_else(|| DEFAULT_TEXT.to_string());

        let discussion_node = OlxNode::new("discussion")
            .with_attribute("display_name", "")
            .with_attribute("discussion_category", &title)
            .with_attribute("discussion_target", &title);

        Ok(Some(vec![html_node(&text), discussion_node]))
    }
}
