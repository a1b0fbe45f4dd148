//! Canvas `module_meta.xml` support.
//!
//! Canvas-flavored cartridges ship a `course_settings/module_meta.xml`
//! file describing module items with metadata the manifest itself does
//! not carry (content types, external tool URLs, cross-referencing
//! identifiers). The lookup table built here drives sub-header
//! collapsing and LTI launch URL overrides.

use std::collections::HashMap;

use tracing::info;

const SUB_HEADER_CONTENT_TYPE: &str = "ContextModuleSubHeader";
const EXTERNAL_TOOL_CONTENT_TYPE: &str = "ContextExternalTool";

/// One `<item>` entry of the module meta document.
#[derive(Debug, Clone, Default)]
pub struct ModuleMetaItem {
    pub title: Option<String>,
    pub content_type: Option<String>,
    pub identifierref: Option<String>,
    pub url: Option<String>,
}

/// Identifier-keyed module item table.
#[derive(Debug, Clone, Default)]
pub struct ModuleMeta {
    items: HashMap<String, ModuleMetaItem>,
}

impl ModuleMeta {
    /// Parse the module meta document. Malformed XML yields an empty
    /// table rather than an error: the file is auxiliary metadata.
    pub fn parse(xml_text: &str) -> Self {
        info!("Initializing module meta for Canvas flavored cartridge");

        let Ok(document) = roxmltree::Document::parse(xml_text) else {
            return Self::default();
        };

        let mut items = HashMap::new();
        for node in document
            .descendants()
            .filter(|node| node.is_element() && node.tag_name().name() == "item")
        {
            let Some(identifier) = node.attribute("identifier") else {
                continue;
            };
            items.insert(
                identifier.to_string(),
                ModuleMetaItem {
                    title: child_text(node, "title"),
                    content_type: child_text(node, "content_type"),
                    identifierref: child_text(node, "identifierref"),
                    url: child_text(node, "url"),
                },
            );
        }

        Self { items }
    }

    pub fn item(&self, identifier: &str) -> Option<&ModuleMetaItem> {
        self.items.get(identifier)
    }

    /// Whether the identified item is a Canvas sub-header marker.
    pub fn is_sub_header(&self, identifier: &str) -> bool {
        self.item(identifier)
            .is_some_and(|item| item.content_type.as_deref() == Some(SUB_HEADER_CONTENT_TYPE))
    }

    /// The resource identifier a module item points at, when recorded.
    pub fn identifierref(&self, identifier: &str) -> Option<&str> {
        self.item(identifier)?.identifierref.as_deref()
    }

    /// The external tool launch URL for an item of type
    /// `ContextExternalTool`.
    pub fn external_tool_url(&self, identifier: &str) -> Option<&str> {
        let item = self.item(identifier)?;
        if item.content_type.as_deref() == Some(EXTERNAL_TOOL_CONTENT_TYPE) {
            item.url.as_deref()
        } else {
            None
        }
    }
}

fn child_text(node: roxmltree::Node, name: &str) -> Option<String> {
    node.children()
        .find(|child| child.is_element() && child.tag_name().name() == name)
        .and_then(|child| child.text())
        .map(str::to_string)
}
