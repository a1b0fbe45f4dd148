//! Manifest model.
//!
//! Parses the `imsmanifest.xml` of an extracted Common Cartridge package
//! into three owned structures: course metadata, the organization forest
//! and the resource table. Everything here is immutable after load; the
//! rest of the pipeline only reads it.

use thiserror::Error;
use tracing::info;

use crate::utils::clean_file_name;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Malformed manifest XML: {0}")]
    Xml(#[from] roxmltree::Error),
}

/// A physical file owned by a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceFile {
    pub href: String,
}

/// A weak back-reference to another resource, used only for traversal.
/// It never implies containment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDependency {
    pub identifierref: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceChild {
    File(ResourceFile),
    Dependency(ResourceDependency),
}

/// One `<resource>` manifest entry.
#[derive(Debug, Clone, Default)]
pub struct ResourceRecord {
    pub identifier: String,
    pub resource_type: String,
    pub href: Option<String>,
    pub children: Vec<ResourceChild>,
}

impl ResourceRecord {
    /// The first physical file of the resource, which by convention is
    /// the one describing its content.
    pub fn first_file(&self) -> Option<&ResourceFile> {
        self.children.iter().find_map(|child| match child {
            ResourceChild::File(file) => Some(file),
            ResourceChild::Dependency(_) => None,
        })
    }

    pub fn files(&self) -> impl Iterator<Item = &ResourceFile> {
        self.children.iter().filter_map(|child| match child {
            ResourceChild::File(file) => Some(file),
            ResourceChild::Dependency(_) => None,
        })
    }
}

/// One `<item>` node of an organization tree. Child order defines
/// display order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrganizationNode {
    pub identifier: Option<String>,
    pub identifierref: Option<String>,
    pub title: Option<String>,
    pub children: Vec<OrganizationNode>,
}

impl OrganizationNode {
    /// A node referencing a resource and carrying no further structure.
    pub fn is_leaf(&self) -> bool {
        self.identifierref.is_some() && self.children.is_empty()
    }

    pub fn has_only_leaves(&self) -> bool {
        self.children.iter().all(OrganizationNode::is_leaf)
    }

    fn is_empty(&self) -> bool {
        self.identifier.is_none()
            && self.identifierref.is_none()
            && self.title.is_none()
            && self.children.is_empty()
    }
}

/// An `<organization>` root: a forest entry of item nodes.
#[derive(Debug, Clone, Default)]
pub struct Organization {
    pub identifier: Option<String>,
    pub structure: Option<String>,
    pub children: Vec<OrganizationNode>,
}

#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub name: Option<String>,
    pub version: Option<String>,
}

/// Course metadata from the manifest `<metadata>` block. Only the
/// fields the OLX output consumes are kept.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    pub schema: Schema,
    pub title: Option<String>,
    pub language: Option<String>,
}

/// The fully parsed manifest.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    pub metadata: Metadata,
    pub organizations: Vec<Organization>,
    pub resources: Vec<ResourceRecord>,
}

impl Manifest {
    /// Parse manifest XML text.
    ///
    /// Element lookups match local names only: Common Cartridge minor
    /// versions change namespace URIs but not the document shape, and
    /// real-world exports are frequently sloppy about declarations.
    pub fn parse(xml_text: &str) -> Result<Self, ManifestError> {
        let document = roxmltree::Document::parse(xml_text)?;
        let root = document.root_element();

        Ok(Self {
            metadata: parse_metadata(root),
            organizations: parse_organizations(root),
            resources: parse_resources(root),
        })
    }
}

fn child_element<'a, 'input>(
    node: roxmltree::Node<'a, 'input>,
    name: &str,
) -> Option<roxmltree::Node<'a, 'input>> {
    node.children()
        .find(|child| child.is_element() && child.tag_name().name() == name)
}

fn descendant_text(node: roxmltree::Node, path: &[&str]) -> Option<String> {
    let mut current = node;
    for name in path {
        current = child_element(current, name)?;
    }
    current.text().map(str::to_string)
}

fn parse_metadata(root: roxmltree::Node) -> Metadata {
    let mut metadata = Metadata::default();

    let Some(metadata_node) = child_element(root, "metadata") else {
        return metadata;
    };

    metadata.schema = Schema {
        name: descendant_text(metadata_node, &["schema"]),
        version: descendant_text(metadata_node, &["schemaversion"]),
    };

    if let Some(lom) = child_element(metadata_node, "lom") {
        if let Some(general) = child_element(lom, "general") {
            metadata.title = descendant_text(general, &["title", "string"]);
            metadata.language = descendant_text(general, &["language", "string"]);
        }
    }

    metadata
}

fn parse_organizations(root: roxmltree::Node) -> Vec<Organization> {
    let Some(organizations_node) = child_element(root, "organizations") else {
        return Vec::new();
    };

    organizations_node
        .children()
        .filter(|node| node.is_element() && node.tag_name().name() == "organization")
        .map(parse_organization)
        .collect()
}

fn parse_organization(node: roxmltree::Node) -> Organization {
    Organization {
        identifier: node.attribute("identifier").map(str::to_string),
        structure: node.attribute("structure").map(str::to_string),
        children: node
            .children()
            .filter(|child| child.is_element() && child.tag_name().name() == "item")
            .filter_map(parse_item)
            .collect(),
    }
}

fn parse_item(node: roxmltree::Node) -> Option<OrganizationNode> {
    let item = OrganizationNode {
        identifier: node.attribute("identifier").map(str::to_string),
        identifierref: node.attribute("identifierref").map(str::to_string),
        title: descendant_text(node, &["title"]),
        children: node
            .children()
            .filter(|child| child.is_element() && child.tag_name().name() == "item")
            .filter_map(parse_item)
            .collect(),
    };

    // Items carrying no information at all are dropped.
    (!item.is_empty()).then_some(item)
}

fn parse_resources(root: roxmltree::Node) -> Vec<ResourceRecord> {
    let Some(resources_node) = child_element(root, "resources") else {
        return Vec::new();
    };

    resources_node
        .children()
        .filter(|node| node.is_element() && node.tag_name().name() == "resource")
        .map(parse_resource)
        .collect()
}

fn parse_resource(node: roxmltree::Node) -> ResourceRecord {
    let mut record = ResourceRecord {
        identifier: node.attribute("identifier").unwrap_or_default().to_string(),
        resource_type: node.attribute("type").unwrap_or_default().to_string(),
        href: node.attribute("href").map(clean_file_name),
        children: Vec::new(),
    };

    for child in node.children().filter(roxmltree::Node::is_element) {
        match child.tag_name().name() {
            "file" => {
                if let Some(href) = child.attribute("href") {
                    record
                        .children
                        .push(ResourceChild::File(ResourceFile { href: clean_file_name(href) }));
                }
            }
            "dependency" => {
                if let Some(identifierref) = child.attribute("identifierref") {
                    record.children.push(ResourceChild::Dependency(ResourceDependency {
                        identifierref: identifierref.to_string(),
                    }));
                }
            }
            "metadata" => {}
            other => info!("Unsupported resource child element {}", other),
        }
    }

    record
}
