//! Assignment content processor.
//!
//! Converts Common Cartridge assignment extension resources into OLX
//! open response assessment (ORA) blocks. The mapping is partial in
//! both directions: assignments have attachments ORA lacks, ORA has
//! rubrics assignments lack, so ORA defaults fill the gaps.

use std::collections::HashSet;

use crate::cartridge::manifest::ResourceRecord;
use crate::cartridge::{resource_type, Cartridge};
use crate::filesystem;
use crate::olx::OlxNode;
use crate::processors::utils::default_ora_criteria;
use crate::processors::{ContentProcessor, ProcessError, ProcessorContext};
use crate::xml::AssignmentDescriptor;

const FORMAT_FILE: &str = "file";
const FORMAT_HTML: &str = "html";
const FORMAT_TEXT: &str = "text";
const FORMAT_URL: &str = "url";

const DEFAULT_FILE_UPLOAD_TYPE: &str = "pdf-and-image";
const DEFAULT_WHITE_LISTED_FILE_TYPES: &str = "pdf,gif,jpg,jpeg,jfif,pjpeg,pjp,png";

pub struct AssignmentProcessor;

struct AssignmentContent {
    title: String,
    prompt: String,
    prompts_type: &'static str,
    text_response: &'static str,
    text_response_editor: &'static str,
    file_upload_response: &'static str,
}

impl ContentProcessor for AssignmentProcessor {
    fn name(&self) -> &'static str {
        "assignment"
    }

    fn process(
        &self,
        cartridge: &Cartridge,
        _context: &mut ProcessorContext,
        resource: &ResourceRecord,
        _idref: &str,
    ) -> Result<Option<Vec<OlxNode>>, ProcessError> {
        if !resource_type::is_assignment(&resource.resource_type) {
            return Ok(None);
        }
        let Some(resource_file) = resource.first_file() else {
            return Ok(None);
        };

        let file_path = cartridge.build_resource_file_path(&resource_file.href);
        let xml_text = filesystem::read_xml_text(&file_path)?;
        let descriptor = AssignmentDescriptor::parse(&xml_text)?;

        Ok(Some(vec![create_node(&parse_content(&descriptor))]))
    }
}

fn parse_content(descriptor: &AssignmentDescriptor) -> AssignmentContent {
    let accepted_formats: HashSet<&str> = if descriptor.submission_formats.is_empty() {
        // The CC specification allows omitting the formats entirely.
        HashSet::from([FORMAT_HTML, FORMAT_FILE])
    } else {
        descriptor
            .submission_formats
            .iter()
            .map(String::as_str)
            .collect()
    };

    let is_file_submission_allowed = accepted_formats.contains(FORMAT_FILE);
    let is_textual_submission_allowed = [FORMAT_HTML, FORMAT_TEXT, FORMAT_URL]
        .iter()
        .any(|format| accepted_formats.contains(format));

    // When neither mode is declared, requiring text is a default of
    // convenience rather than a specification mandate.
    let text_response = if is_file_submission_allowed {
        if is_textual_submission_allowed {
            "optional"
        } else {
            ""
        }
    } else {
        "required"
    };
    let file_upload_response = if is_file_submission_allowed {
        if is_textual_submission_allowed {
            "optional"
        } else {
            "required"
        }
    } else {
        ""
    };

    let (prompt, prompt_type) = if descriptor.text.is_some() {
        (descriptor.text.clone(), descriptor.text_type.as_deref())
    } else {
        (
            descriptor.instructor_text.clone(),
            descriptor.instructor_text_type.as_deref(),
        )
    };

    AssignmentContent {
        title: descriptor.title.clone().unwrap_or_default(),
        prompt: prompt.unwrap_or_default(),
        prompts_type: if prompt_type == Some("text/html") { "html" } else { "text" },
        text_response,
        text_response_editor: if accepted_formats.contains(FORMAT_HTML) {
            "tinymce"
        } else {
            "text"
        },
        file_upload_response,
    }
}

fn create_node(content: &AssignmentContent) -> OlxNode {
    let mut rubric = OlxNode::new("rubric");
    for criterion in default_ora_criteria() {
        rubric = rubric.with_element(criterion);
    }
    rubric = rubric
        .with_element(OlxNode::new("feedbackprompt").with_text(
            "(Optional) What aspects of this response stood out to you? What did it do well? \
             How could it be improved?",
        ))
        .with_element(OlxNode::new("feedback_default_text").with_text("I think that this response..."));

    let mut node = OlxNode::new("openassessment")
        .with_attribute("prompts_type", content.prompts_type)
        .with_attribute("text_response_editor", content.text_response_editor)
        .with_attribute("text_response", content.text_response)
        .with_attribute("file_upload_response", content.file_upload_response)
        .with_attribute("allow_multiple_files", "True");

    if !content.file_upload_response.is_empty() {
        node = node
            .with_attribute("file_upload_type", DEFAULT_FILE_UPLOAD_TYPE)
            .with_attribute("white_listed_file_types", DEFAULT_WHITE_LISTED_FILE_TYPES);
    }

    node.with_element(OlxNode::new("title").with_text(&content.title))
        .with_element(
            OlxNode::new("assessments").with_element(
                OlxNode::new("assessment")
                    .with_attribute("name", "staff-assessment")
                    .with_attribute("required", "True"),
            ),
        )
        .with_element(
            OlxNode::new("prompts").with_element(
                OlxNode::new("prompt")
                    .with_element(OlxNode::new("description").with_text(&content.prompt)),
            ),
        )
        .with_element(rubric)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(formats: &[&str]) -> AssignmentDescriptor {
        AssignmentDescriptor {
            title: Some("Essay".to_string()),
            text: Some("Write an essay".to_string()),
            text_type: Some("text/html".to_string()),
            submission_formats: formats.iter().map(|s| s.to_string()).collect(),
            ..AssignmentDescriptor::default()
        }
    }

    #[test]
    fn test_file_only_submission() {
        let content = parse_content(&descriptor(&["file"]));
        assert_eq!(content.text_response, "");
        assert_eq!(content.file_upload_response, "required");
        assert_eq!(content.text_response_editor, "text");
    }

    #[test]
    fn test_textual_only_submission() {
        let content = parse_content(&descriptor(&["text", "url"]));
        assert_eq!(content.text_response, "required");
        assert_eq!(content.file_upload_response, "");
    }

    #[test]
    fn test_both_submission_modes() {
        let content = parse_content(&descriptor(&["file", "html"]));
        assert_eq!(content.text_response, "optional");
        assert_eq!(content.file_upload_response, "optional");
        assert_eq!(content.text_response_editor, "tinymce");
    }

    #[test]
    fn test_unrecognized_formats_default_to_required_text() {
        let content = parse_content(&descriptor(&["telepathy"]));
        assert_eq!(content.text_response, "required");
        assert_eq!(content.file_upload_response, "");
    }

    #[test]
    fn test_missing_formats_fall_back_to_html_and_file() {
        let content = parse_content(&descriptor(&[]));
        assert_eq!(content.text_response, "optional");
        assert_eq!(content.file_upload_response, "optional");
        assert_eq!(content.text_response_editor, "tinymce");
    }

    #[test]
    fn test_instructor_text_used_when_text_missing() {
        let descriptor = AssignmentDescriptor {
            title: Some("T".to_string()),
            instructor_text: Some("Grade carefully".to_string()),
            instructor_text_type: Some("text/plain".to_string()),
            submission_formats: vec!["text".to_string()],
            ..AssignmentDescriptor::default()
        };
        let content = parse_content(&descriptor);
        assert_eq!(content.prompt, "Grade carefully");
        assert_eq!(content.prompts_type, "text");
    }

    #[test]
    fn test_node_shape() {
        let node = create_node(&parse_content(&descriptor(&["file"])));
        assert_eq!(node.tag, "openassessment");
        assert_eq!(node.attribute("file_upload_type"), Some("pdf-and-image"));
        assert_eq!(node.attribute("allow_multiple_files"), Some("True"));

        let xml = node.to_xml();
        assert!(xml.contains("<title>Essay</title>"));
        assert!(xml.contains("staff-assessment"));
        assert!(xml.contains("<feedbackprompt>"));
    }

    #[test]
    fn test_no_upload_attributes_without_file_submission() {
        let node = create_node(&parse_content(&descriptor(&["text"])));
        assert_eq!(node.attribute("file_upload_type"), None);
        assert_eq!(node.attribute("white_listed_file_types"), None);
    }
}
