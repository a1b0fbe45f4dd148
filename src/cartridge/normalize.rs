//! Hierarchy normalizer.
//!
//! Common Cartridge organizations are arbitrarily shaped trees; OLX
//! wants exactly four levels below the course root. The normalizer
//! forces any organization forest into the canonical
//! section → subsection → unit → component shape:
//!
//! - structure that is too shallow gets wrapped, either verbatim (a
//!   lone leaf) or under synthetic intermediate nodes according to the
//!   configured diffusion policy;
//! - structure that is too deep is flattened at the component level, a
//!   depth-first walk collecting every leaf in order;
//! - irregular manifests (zero organizations, several organizations)
//!   degrade to a best-effort result and never fail.
//!
//! The input forest is read-only; the output tree is built fresh.

use super::manifest::{Organization, OrganizationNode};

/// Identifier given to synthesized intermediate nodes. Fixed length so
/// it can never collide with real Common Cartridge identifiers.
pub const SYNTHETIC_IDENTIFIER: &str = "xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx";

const PLACEHOLDER_TITLE: &str = "none";

/// How to synthesize a missing hierarchy level when a node holds only
/// leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffusionPolicy {
    /// Group all leaves under a single synthetic wrapper.
    Group,

    /// Give each leaf its own synthetic wrapper.
    Diffuse,
}

/// Per-boundary diffusion configuration.
///
/// The shipped asymmetry (group at the section boundary, diffuse at the
/// subsection boundary) is intentional: courses read better with one
/// subsection holding sibling pages but one unit per page.
#[derive(Debug, Clone, Copy)]
pub struct NormalizerConfig {
    pub shallow_sections: DiffusionPolicy,
    pub shallow_subsections: DiffusionPolicy,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            shallow_sections: DiffusionPolicy::Group,
            shallow_subsections: DiffusionPolicy::Diffuse,
        }
    }
}

/// A resource-referencing leaf at the bottom of the canonical tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Component {
    pub identifier: Option<String>,
    pub identifierref: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Unit {
    pub identifier: Option<String>,
    pub identifierref: Option<String>,
    pub title: Option<String>,
    pub components: Vec<Component>,
}

#[derive(Debug, Clone, Default)]
pub struct Subsection {
    pub identifier: Option<String>,
    pub identifierref: Option<String>,
    pub title: Option<String>,
    pub units: Vec<Unit>,
}

#[derive(Debug, Clone, Default)]
pub struct Section {
    pub identifier: Option<String>,
    pub identifierref: Option<String>,
    pub title: Option<String>,
    pub subsections: Vec<Subsection>,
}

/// The canonical fixed-depth course tree.
#[derive(Debug, Clone, Default)]
pub struct CanonicalCourseTree {
    pub identifier: String,
    pub sections: Vec<Section>,
}

/// Normalize an organization forest into the canonical course tree.
///
/// Zero organizations is spec-legal and yields `None`. More than one is
/// not spec-legal; the first one is used deterministically.
pub fn normalize(organizations: &[Organization], config: NormalizerConfig) -> Option<CanonicalCourseTree> {
    let organization = organizations.first()?;
    let identifier = organization
        .identifier
        .clone()
        .unwrap_or_else(|| "org_1".to_string());

    // An organization should carry a single courseware root item; with
    // several, the first is used.
    let course_root = organization.children.first()?;

    let sections = course_root
        .children
        .iter()
        .map(|section| normalize_section(section, config))
        .collect();

    Some(CanonicalCourseTree { identifier, sections })
}

fn synthetic_wrapper(title: Option<String>, children: Vec<OrganizationNode>) -> OrganizationNode {
    OrganizationNode {
        identifier: Some(SYNTHETIC_IDENTIFIER.to_string()),
        identifierref: None,
        title: Some(title.unwrap_or_else(|| PLACEHOLDER_TITLE.to_string())),
        children,
    }
}

fn has_placeholder_title(node: &OrganizationNode) -> bool {
    matches!(node.title.as_deref(), None | Some(PLACEHOLDER_TITLE))
}

fn normalize_section(section: &OrganizationNode, config: NormalizerConfig) -> Section {
    let mut subsections = if section.is_leaf() {
        // Structure is too shallow: a leaf at section level is wrapped
        // verbatim all the way down.
        vec![section.clone()]
    } else if section.has_only_leaves() {
        match config.shallow_sections {
            DiffusionPolicy::Diffuse => section
                .children
                .iter()
                .map(|leaf| synthetic_wrapper(None, vec![leaf.clone()]))
                .collect(),
            DiffusionPolicy::Group => vec![synthetic_wrapper(None, section.children.clone())],
        }
    } else {
        section.children.clone()
    };

    // A single untitled subsection inherits the section title, so
    // single-item wrappers do not show a placeholder.
    if subsections.len() == 1 && has_placeholder_title(&subsections[0]) {
        subsections[0].title = Some(
            section
                .title
                .clone()
                .unwrap_or_else(|| PLACEHOLDER_TITLE.to_string()),
        );
    }

    Section {
        identifier: section.identifier.clone(),
        identifierref: section.identifierref.clone(),
        title: section.title.clone(),
        subsections: subsections
            .iter()
            .map(|subsection| normalize_subsection(subsection, config))
            .collect(),
    }
}

fn normalize_subsection(subsection: &OrganizationNode, config: NormalizerConfig) -> Subsection {
    let units = if subsection.is_leaf() {
        vec![subsection.clone()]
    } else if subsection.has_only_leaves() {
        match config.shallow_subsections {
            DiffusionPolicy::Diffuse => subsection
                .children
                .iter()
                .map(|leaf| synthetic_wrapper(leaf.title.clone(), vec![leaf.clone()]))
                .collect(),
            DiffusionPolicy::Group => vec![synthetic_wrapper(None, subsection.children.clone())],
        }
    } else {
        subsection.children.clone()
    };

    Subsection {
        identifier: subsection.identifier.clone(),
        identifierref: subsection.identifierref.clone(),
        title: subsection.title.clone(),
        units: units.iter().map(normalize_unit).collect(),
    }
}

fn normalize_unit(unit: &OrganizationNode) -> Unit {
    let components = if unit.is_leaf() {
        vec![component_from(unit)]
    } else {
        // Anything deeper than one level below the unit is flattened:
        // OLX units hold a flat list of components, never sub-groups.
        let mut leaves = Vec::new();
        flatten_into(&unit.children, &mut leaves);
        leaves
    };

    Unit {
        identifier: unit.identifier.clone(),
        identifierref: unit.identifierref.clone(),
        title: unit.title.clone(),
        components,
    }
}

fn flatten_into(nodes: &[OrganizationNode], out: &mut Vec<Component>) {
    for node in nodes {
        if node.is_leaf() {
            out.push(component_from(node));
        } else {
            flatten_into(&node.children, out);
        }
    }
}

fn component_from(leaf: &OrganizationNode) -> Component {
    Component {
        identifier: leaf.identifier.clone(),
        identifierref: leaf.identifierref.clone(),
        title: leaf.title.clone(),
    }
}
