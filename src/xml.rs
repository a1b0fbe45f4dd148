//! Typed accessors over Common Cartridge XML documents.
//!
//! Each wrapper parses one document kind (web link, LTI link,
//! discussion topic, assignment, QTI assessment) into owned values so
//! callers never traverse raw XML trees. Lookups match element local
//! names only: namespace URIs vary per Common Cartridge version while
//! document shapes do not.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum XmlError {
    #[error("Malformed XML document: {0}")]
    Malformed(#[from] roxmltree::Error),
}

fn child_element<'a, 'input>(
    node: roxmltree::Node<'a, 'input>,
    name: &str,
) -> Option<roxmltree::Node<'a, 'input>> {
    node.children()
        .find(|child| child.is_element() && child.tag_name().name() == name)
}

fn descendant_element<'a, 'input>(
    node: roxmltree::Node<'a, 'input>,
    name: &str,
) -> Option<roxmltree::Node<'a, 'input>> {
    node.descendants()
        .find(|child| child.is_element() && child.tag_name().name() == name)
}

fn descendant_text(node: roxmltree::Node, name: &str) -> Option<String> {
    descendant_element(node, name)
        .and_then(|element| element.text())
        .map(str::to_string)
}

/// A CC web link document (`imswl_xmlv*`).
#[derive(Debug, Clone, Default)]
pub struct WebLink {
    pub title: Option<String>,
    pub url: Option<String>,
}

impl WebLink {
    pub fn parse(xml_text: &str) -> Result<Self, XmlError> {
        let document = roxmltree::Document::parse(xml_text)?;
        let root = document.root_element();
        Ok(Self {
            title: descendant_text(root, "title"),
            url: descendant_element(root, "url")
                .and_then(|url| url.attribute("href"))
                .map(str::to_string),
        })
    }
}

/// A CC basic LTI link document (`imsbasiclti_xmlv*`).
#[derive(Debug, Clone, Default)]
pub struct BasicLtiLink {
    pub title: Option<String>,
    pub description: Option<String>,
    secure_launch_url: Option<String>,
    plain_launch_url: Option<String>,
    pub selection_width: Option<String>,
    pub selection_height: Option<String>,
    pub tool_id: Option<String>,
    pub custom_parameters: Vec<(String, String)>,
}

impl BasicLtiLink {
    pub fn parse(xml_text: &str) -> Result<Self, XmlError> {
        let document = roxmltree::Document::parse(xml_text)?;
        let root = document.root_element();

        let mut link = Self {
            title: descendant_text(root, "title"),
            description: descendant_text(root, "description"),
            secure_launch_url: descendant_text(root, "secure_launch_url"),
            plain_launch_url: descendant_text(root, "launch_url"),
            ..Self::default()
        };

        if let Some(extensions) = descendant_element(root, "extensions") {
            for property in extensions
                .children()
                .filter(|child| child.is_element() && child.tag_name().name() == "property")
            {
                let Some(name) = property.attribute("name") else {
                    continue;
                };
                let value = property.text().map(str::to_string);
                match name {
                    "selection_width" => link.selection_width = value,
                    "selection_height" => link.selection_height = value,
                    "tool_id" => link.tool_id = value,
                    _ => {}
                }
            }
        }

        if let Some(custom) = descendant_element(root, "custom") {
            for property in custom
                .children()
                .filter(|child| child.is_element() && child.tag_name().name() == "property")
            {
                if let (Some(name), Some(value)) = (property.attribute("name"), property.text()) {
                    link.custom_parameters
                        .push((name.to_string(), value.to_string()));
                }
            }
        }

        Ok(link)
    }

    /// The launch URL, preferring the secure variant when present.
    pub fn launch_url(&self) -> Option<&str> {
        self.secure_launch_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .or(self.plain_launch_url.as_deref())
    }
}

/// A CC discussion topic document (`imsdt_xmlv*`).
#[derive(Debug, Clone, Default)]
pub struct DiscussionTopic {
    pub title: Option<String>,
    pub text: Option<String>,
}

impl DiscussionTopic {
    pub fn parse(xml_text: &str) -> Result<Self, XmlError> {
        let document = roxmltree::Document::parse(xml_text)?;
        let root = document.root_element();
        Ok(Self {
            title: descendant_text(root, "title"),
            text: descendant_text(root, "text"),
        })
    }
}

/// A CC assignment extension document (`assignment_xmlv*`).
#[derive(Debug, Clone, Default)]
pub struct AssignmentDescriptor {
    pub title: Option<String>,
    pub text: Option<String>,
    /// The `texttype` attribute of the `<text>` element.
    pub text_type: Option<String>,
    pub instructor_text: Option<String>,
    pub instructor_text_type: Option<String>,
    pub submission_formats: Vec<String>,
}

impl AssignmentDescriptor {
    pub fn parse(xml_text: &str) -> Result<Self, XmlError> {
        let document = roxmltree::Document::parse(xml_text)?;
        let root = document.root_element();

        let submission_formats = descendant_element(root, "submission_formats")
            .map(|formats| {
                formats
                    .children()
                    .filter(|child| child.is_element() && child.tag_name().name() == "format")
                    .filter_map(|format| format.attribute("type"))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let text_element = descendant_element(root, "text");
        let instructor_text_element = descendant_element(root, "instructor_text");

        Ok(Self {
            title: descendant_text(root, "title"),
            text: text_element.and_then(|element| element.text()).map(str::to_string),
            text_type: text_element
                .and_then(|element| element.attribute("texttype"))
                .map(str::to_string),
            instructor_text: instructor_text_element
                .and_then(|element| element.text())
                .map(str::to_string),
            instructor_text_type: instructor_text_element
                .and_then(|element| element.attribute("texttype"))
                .map(str::to_string),
            submission_formats,
        })
    }

    pub fn accepts_format(&self, format: &str) -> bool {
        self.submission_formats.iter().any(|entry| entry == format)
    }
}

/// One `<respcondition>` of a QTI item's response processing block.
#[derive(Debug, Clone, Default)]
pub struct QtiRespCondition {
    /// The `continue` attribute; a missing attribute reads as `No`.
    pub continue_processing: bool,
    pub varequals: Vec<String>,
    pub and_varequals: Vec<String>,
    pub or_varequals: Vec<String>,
    pub varsubstrings: Vec<String>,
    pub display_feedback_links: Vec<String>,
}

/// One `<itemfeedback>` entry, keyed by its ident.
#[derive(Debug, Clone, Default)]
pub struct QtiItemFeedback {
    pub ident: String,
    pub text: Option<String>,
}

/// One assessment `<item>`, flattened out of its section.
#[derive(Debug, Clone, Default)]
pub struct QtiItem {
    pub ident: Option<String>,
    pub title: Option<String>,
    pub cc_profile: Option<String>,
    /// Presentation material, the question stem markup.
    pub description: Option<String>,
    /// Response labels in document order: (ident, display markup).
    pub response_labels: Vec<(String, String)>,
    pub resp_conditions: Vec<QtiRespCondition>,
    pub feedbacks: Vec<QtiItemFeedback>,
    pub solution: Option<String>,
}

/// A QTI assessment document (`imsqti_xmlv*p*/imscc_xmlv*p*/assessment`).
#[derive(Debug, Clone, Default)]
pub struct QtiAssessment {
    pub title: Option<String>,
    pub items: Vec<QtiItem>,
}

impl QtiAssessment {
    pub fn parse(xml_text: &str) -> Result<Self, XmlError> {
        let document = roxmltree::Document::parse(xml_text)?;
        let root = document.root_element();

        let assessment = descendant_element(root, "assessment");
        let title = assessment
            .and_then(|node| node.attribute("title"))
            .map(str::to_string);

        // Items may sit in nested sections; document order is kept.
        let items = root
            .descendants()
            .filter(|node| node.is_element() && node.tag_name().name() == "item")
            .map(parse_qti_item)
            .collect();

        Ok(Self { title, items })
    }
}

fn parse_qti_item(node: roxmltree::Node) -> QtiItem {
    let mut item = QtiItem {
        ident: node.attribute("ident").map(str::to_string),
        title: node.attribute("title").map(str::to_string),
        ..QtiItem::default()
    };

    if let Some(metadata) = child_element(node, "itemmetadata") {
        item.cc_profile = metadata
            .descendants()
            .filter(|field| field.is_element() && field.tag_name().name() == "qtimetadatafield")
            .find(|field| {
                descendant_text(*field, "fieldlabel").as_deref() == Some("cc_profile")
            })
            .and_then(|field| descendant_text(field, "fieldentry"));
    }

    if let Some(presentation) = child_element(node, "presentation") {
        item.description = child_element(presentation, "material")
            .and_then(|material| descendant_text(material, "mattext"));

        item.response_labels = presentation
            .descendants()
            .filter(|label| label.is_element() && label.tag_name().name() == "response_label")
            .filter_map(|label| {
                let ident = label.attribute("ident")?;
                let text = descendant_text(label, "mattext").unwrap_or_default();
                Some((ident.to_string(), text))
            })
            .collect();
    }

    if let Some(resprocessing) = child_element(node, "resprocessing") {
        item.resp_conditions = resprocessing
            .children()
            .filter(|child| child.is_element() && child.tag_name().name() == "respcondition")
            .map(parse_resp_condition)
            .collect();
    }

    item.feedbacks = node
        .children()
        .filter(|child| child.is_element() && child.tag_name().name() == "itemfeedback")
        .filter_map(|feedback| {
            let ident = feedback.attribute("ident")?;
            Some(QtiItemFeedback {
                ident: ident.to_string(),
                text: feedback
                    .descendants()
                    .find(|child| child.is_element() && child.tag_name().name() == "flow_mat")
                    .and_then(|flow| descendant_text(flow, "mattext")),
            })
        })
        .collect();

    item.solution = descendant_element(node, "solution")
        .and_then(|solution| descendant_text(solution, "mattext"));

    item
}

fn parse_resp_condition(node: roxmltree::Node) -> QtiRespCondition {
    let mut condition = QtiRespCondition {
        continue_processing: node
            .attribute("continue")
            .is_some_and(|value| value.eq_ignore_ascii_case("yes")),
        ..QtiRespCondition::default()
    };

    if let Some(conditionvar) = child_element(node, "conditionvar") {
        for child in conditionvar.children().filter(roxmltree::Node::is_element) {
            match child.tag_name().name() {
                "varequal" => {
                    if let Some(text) = child.text() {
                        condition.varequals.push(text.to_string());
                    }
                }
                "varsubstring" => {
                    if let Some(text) = child.text() {
                        condition.varsubstrings.push(text.to_string());
                    }
                }
                "and" => collect_varequals(child, &mut condition.and_varequals),
                "or" => {
                    collect_varequals(child, &mut condition.or_varequals);
                    for nested in child
                        .descendants()
                        .filter(|n| n.is_element() && n.tag_name().name() == "varsubstring")
                    {
                        if let Some(text) = nested.text() {
                            condition.varsubstrings.push(text.to_string());
                        }
                    }
                }
                _ => {}
            }
        }
    }

    condition.display_feedback_links = node
        .children()
        .filter(|child| child.is_element() && child.tag_name().name() == "displayfeedback")
        .filter_map(|feedback| feedback.attribute("linkrefid"))
        .map(str::to_string)
        .collect();

    condition
}

fn collect_varequals(node: roxmltree::Node, into: &mut Vec<String>) {
    for varequal in node
        .descendants()
        .filter(|child| child.is_element() && child.tag_name().name() == "varequal")
    {
        if let Some(text) = varequal.text() {
            into.push(text.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_web_link() {
        let link = WebLink::parse(
            r#"<webLink xmlns="http://www.imsglobal.org/xsd/imsccv1p1/imswl_v1p1">
                <title>Example</title>
                <url href="https://example.com/page" target="_blank"/>
            </webLink>"#,
        )
        .unwrap();
        assert_eq!(link.title.as_deref(), Some("Example"));
        assert_eq!(link.url.as_deref(), Some("https://example.com/page"));
    }

    #[test]
    fn test_lti_link_prefers_secure_launch_url() {
        let link = BasicLtiLink::parse(
            r#"<cartridge_basiclti_link>
                <title>Tool</title>
                <description>A tool</description>
                <launch_url>http://tool.example.com/launch</launch_url>
                <secure_launch_url>https://tool.example.com/launch</secure_launch_url>
                <extensions platform="canvas.instructure.com">
                    <property name="selection_width">500</property>
                    <property name="selection_height">400</property>
                    <property name="tool_id">external_tool</property>
                </extensions>
                <custom>
                    <property name="custom_key">custom_value</property>
                </custom>
            </cartridge_basiclti_link>"#,
        )
        .unwrap();
        assert_eq!(link.launch_url(), Some("https://tool.example.com/launch"));
        assert_eq!(link.selection_width.as_deref(), Some("500"));
        assert_eq!(link.tool_id.as_deref(), Some("external_tool"));
        assert_eq!(
            link.custom_parameters,
            vec![("custom_key".to_string(), "custom_value".to_string())]
        );
    }

    #[test]
    fn test_lti_link_falls_back_to_plain_launch_url() {
        let link = BasicLtiLink::parse(
            r#"<cartridge_basiclti_link>
                <launch_url>http://tool.example.com/launch</launch_url>
            </cartridge_basiclti_link>"#,
        )
        .unwrap();
        assert_eq!(link.launch_url(), Some("http://tool.example.com/launch"));
    }

    #[test]
    fn test_discussion_topic() {
        let topic = DiscussionTopic::parse(
            r#"<topic><title>Week 1</title><text texttype="text/html">&lt;p&gt;Discuss&lt;/p&gt;</text></topic>"#,
        )
        .unwrap();
        assert_eq!(topic.title.as_deref(), Some("Week 1"));
        assert_eq!(topic.text.as_deref(), Some("<p>Discuss</p>"));
    }

    #[test]
    fn test_assignment_descriptor() {
        let assignment = AssignmentDescriptor::parse(
            r#"<assignment identifier="a1">
                <title>Essay</title>
                <text texttype="text/html">Write things</text>
                <instructor_text texttype="text/html">Grade things</instructor_text>
                <submission_formats>
                    <format type="html"/>
                    <format type="file"/>
                </submission_formats>
            </assignment>"#,
        )
        .unwrap();
        assert_eq!(assignment.title.as_deref(), Some("Essay"));
        assert_eq!(assignment.text_type.as_deref(), Some("text/html"));
        assert!(assignment.accepts_format("html"));
        assert!(assignment.accepts_format("file"));
        assert!(!assignment.accepts_format("url"));
    }

    #[test]
    fn test_qti_assessment_items() {
        let assessment = QtiAssessment::parse(QTI_XML).unwrap();
        assert_eq!(assessment.title.as_deref(), Some("Quiz 1"));
        assert_eq!(assessment.items.len(), 1);

        let item = &assessment.items[0];
        assert_eq!(item.ident.as_deref(), Some("q1"));
        assert_eq!(item.cc_profile.as_deref(), Some("cc.multiple_choice.v0p1"));
        assert_eq!(item.description.as_deref(), Some("<p>Pick one</p>"));
        assert_eq!(item.response_labels.len(), 2);
        assert_eq!(item.response_labels[0].0, "a1");

        assert_eq!(item.resp_conditions.len(), 2);
        let correct = &item.resp_conditions[0];
        assert!(!correct.continue_processing);
        assert_eq!(correct.varequals, vec!["a1".to_string()]);
        assert_eq!(correct.display_feedback_links, vec!["correct_fb".to_string()]);

        assert_eq!(item.feedbacks.len(), 1);
        assert_eq!(item.feedbacks[0].ident, "correct_fb");
    }

    const QTI_XML: &str = r#"<?xml version="1.0"?>
<questestinterop>
  <assessment ident="assess_1" title="Quiz 1">
    <section ident="root_section">
      <item ident="q1" title="Question 1">
        <itemmetadata>
          <qtimetadata>
            <qtimetadatafield>
              <fieldlabel>cc_profile</fieldlabel>
              <fieldentry>cc.multiple_choice.v0p1</fieldentry>
            </qtimetadatafield>
          </qtimetadata>
        </itemmetadata>
        <presentation>
          <material><mattext texttype="text/html">&lt;p&gt;Pick one&lt;/p&gt;</mattext></material>
          <response_lid ident="response1" rcardinality="Single">
            <render_choice>
              <response_label ident="a1"><material><mattext>First</mattext></material></response_label>
              <response_label ident="a2"><material><mattext>Second</mattext></material></response_label>
            </render_choice>
          </response_lid>
        </presentation>
        <resprocessing>
          <outcomes><decvar maxvalue="100" minvalue="0" varname="SCORE" vartype="Decimal"/></outcomes>
          <respcondition>
            <conditionvar><varequal respident="response1">a1</varequal></conditionvar>
            <setvar action="Set" varname="SCORE">100</setvar>
            <displayfeedback feedbacktype="Response" linkrefid="correct_fb"/>
          </respcondition>
          <respcondition continue="Yes">
            <conditionvar><other/></conditionvar>
          </respcondition>
        </resprocessing>
        <itemfeedback ident="correct_fb">
          <flow_mat><material><mattext>Well done</mattext></material></flow_mat>
        </itemfeedback>
      </item>
    </section>
  </assessment>
</questestinterop>
"#;
}
