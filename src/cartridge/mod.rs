//! Cartridge loading and access.
//!
//! A [`Cartridge`] is one extracted Common Cartridge package: the
//! manifest model, the extraction root for payload file access, Canvas
//! flavor metadata, and convenience lookups derived from the manifest.
//! It is immutable once loaded; all conversion side effects live in the
//! processor context instead.

pub mod manifest;
pub mod module_meta;
pub mod normalize;
pub mod resource_type;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::filesystem::{self, FilesystemError};
use manifest::{Manifest, ManifestError, Metadata, Organization, OrganizationNode, ResourceRecord};
use module_meta::ModuleMeta;
use normalize::{normalize, CanonicalCourseTree, NormalizerConfig};

const MANIFEST_FILE_NAME: &str = "imsmanifest.xml";
const COURSE_SETTINGS_DIR: &str = "course_settings";
const MODULE_META_FILE_NAME: &str = "module_meta.xml";
const CANVAS_REPORT_FILE_NAME: &str = "canvas_export.txt";

const DEFAULT_VERSION: &str = "1.1";
const DEFAULT_TITLE: &str = "Default Course Title";
const DEFAULT_LANGUAGE: &str = "en";

#[derive(Debug, Error)]
pub enum CartridgeError {
    #[error(transparent)]
    Filesystem(#[from] FilesystemError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

/// OLX static path to original cartridge path mappings.
///
/// `web_resources` holds files physically under the canonical
/// `web_resources` directory; `extra` holds files elsewhere in the
/// package that still had to be surfaced. Lookups read through both
/// with `extra` taking precedence; overlaps are not expected but must
/// not raise. Both maps are append-only during one conversion and are
/// consumed once at packaging time.
#[derive(Debug, Clone, Default)]
pub struct StaticAssetPathTable {
    web_resources: HashMap<String, String>,
    extra: HashMap<String, String>,
}

impl StaticAssetPathTable {
    pub fn add_web_resource_path(&mut self, olx_static_path: String, cc_static_path: String) {
        self.web_resources.insert(olx_static_path, cc_static_path);
    }

    pub fn add_extra_path(&mut self, olx_static_path: String, cc_static_path: String) {
        self.extra.insert(olx_static_path, cc_static_path);
    }

    /// Whether an OLX static path is known, regardless of which side of
    /// the `web_resources` boundary it came from.
    pub fn contains(&self, olx_static_path: &str) -> bool {
        self.extra.contains_key(olx_static_path) || self.web_resources.contains_key(olx_static_path)
    }

    /// Static files located outside the `web_resources` directory,
    /// keyed by OLX static path.
    pub fn extra(&self) -> &HashMap<String, String> {
        &self.extra
    }
}

/// One loaded Common Cartridge package.
#[derive(Debug)]
pub struct Cartridge {
    file_path: PathBuf,
    directory: PathBuf,
    version: String,
    metadata: Metadata,
    organizations: Vec<Organization>,
    resources: Vec<ResourceRecord>,
    resource_index_by_id: HashMap<String, usize>,
    resource_id_by_href: HashMap<String, String>,
    is_canvas_flavor: bool,
    module_meta: ModuleMeta,
}

impl Cartridge {
    /// Extract the package into the workspace and load its manifest.
    pub fn load(cartridge_file: &Path, workspace: &Path) -> Result<Self, CartridgeError> {
        let directory = filesystem::unzip_directory(cartridge_file, workspace)?;

        let is_canvas_flavor = directory
            .join(COURSE_SETTINGS_DIR)
            .join(CANVAS_REPORT_FILE_NAME)
            .exists();
        let module_meta = if is_canvas_flavor {
            let module_meta_path = directory.join(COURSE_SETTINGS_DIR).join(MODULE_META_FILE_NAME);
            match filesystem::read_xml_text(&module_meta_path) {
                Ok(xml_text) => ModuleMeta::parse(&xml_text),
                Err(_) => ModuleMeta::default(),
            }
        } else {
            ModuleMeta::default()
        };

        let manifest_text = filesystem::read_xml_text(&directory.join(MANIFEST_FILE_NAME))?;
        let manifest = Manifest::parse(&manifest_text)?;

        Ok(Self::from_manifest(
            manifest,
            cartridge_file.to_path_buf(),
            directory,
            is_canvas_flavor,
            module_meta,
        ))
    }

    /// Build a cartridge from an already parsed manifest. The loader
    /// goes through here; tests use it to skip archive extraction.
    pub fn from_manifest(
        manifest: Manifest,
        file_path: PathBuf,
        directory: PathBuf,
        is_canvas_flavor: bool,
        module_meta: ModuleMeta,
    ) -> Self {
        let Manifest {
            metadata,
            organizations,
            resources,
        } = manifest;

        let resource_index_by_id = resources
            .iter()
            .enumerate()
            .map(|(index, resource)| (resource.identifier.clone(), index))
            .collect();
        let resource_id_by_href = resources
            .iter()
            .filter_map(|resource| {
                resource
                    .href
                    .clone()
                    .map(|href| (href, resource.identifier.clone()))
            })
            .collect();

        let version = metadata
            .schema
            .version
            .clone()
            .unwrap_or_else(|| DEFAULT_VERSION.to_string());

        Self {
            file_path,
            directory,
            version,
            metadata,
            organizations,
            resources,
            resource_index_by_id,
            resource_id_by_href,
            is_canvas_flavor,
            module_meta,
        }
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn organizations(&self) -> &[Organization] {
        &self.organizations
    }

    pub fn is_canvas_flavor(&self) -> bool {
        self.is_canvas_flavor
    }

    pub fn module_meta(&self) -> &ModuleMeta {
        &self.module_meta
    }

    /// Resource href to identifier mapping, used when rewriting wiki
    /// style links against known static content.
    pub fn resource_id_by_href(&self) -> &HashMap<String, String> {
        &self.resource_id_by_href
    }

    /// Look a resource up by identifier reference.
    ///
    /// Canvas-flavored packages sometimes reference module meta items
    /// instead of resources; those are chased one step through the
    /// module meta table.
    pub fn resource_by_id(&self, idref: &str) -> Option<&ResourceRecord> {
        let index = self.resource_index_by_id.get(idref).copied().or_else(|| {
            if self.is_canvas_flavor {
                let meta_idref = self.module_meta.identifierref(idref)?;
                self.resource_index_by_id.get(meta_idref).copied()
            } else {
                None
            }
        })?;
        self.resources.get(index)
    }

    /// Absolute path of an unpacked resource payload file.
    pub fn build_resource_file_path(&self, file_name: &str) -> PathBuf {
        self.directory.join(file_name)
    }

    pub fn title(&self) -> &str {
        self.metadata.title.as_deref().unwrap_or(DEFAULT_TITLE)
    }

    pub fn language(&self) -> &str {
        self.metadata.language.as_deref().unwrap_or(DEFAULT_LANGUAGE)
    }

    pub fn course_org(&self) -> &str {
        "org"
    }

    pub fn course_number(&self) -> &str {
        "number"
    }

    /// Produce the canonical course tree for this cartridge.
    ///
    /// Canvas packages get their sub-header runs collapsed into
    /// synthetic groupings first; the normalizer itself knows nothing
    /// about module meta.
    pub fn normalized_tree(&self, config: NormalizerConfig) -> Option<CanonicalCourseTree> {
        if self.is_canvas_flavor {
            let organizations: Vec<Organization> = self
                .organizations
                .iter()
                .map(|organization| Organization {
                    identifier: organization.identifier.clone(),
                    structure: organization.structure.clone(),
                    children: organization
                        .children
                        .iter()
                        .map(|item| collapse_sub_headers(&self.module_meta, item.clone()))
                        .collect(),
                })
                .collect();
            normalize(&organizations, config)
        } else {
            normalize(&self.organizations, config)
        }
    }
}

/// Collapse runs of sibling items following a Canvas sub-header marker
/// into children of that marker. Applied bottom-up so nested modules
/// are handled before their parents.
fn collapse_sub_headers(module_meta: &ModuleMeta, mut item: OrganizationNode) -> OrganizationNode {
    let children = std::mem::take(&mut item.children);
    let mut collapsed: Vec<OrganizationNode> = Vec::new();
    let mut current_header: Option<usize> = None;

    for child in children {
        let child = collapse_sub_headers(module_meta, child);
        let is_header = child
            .identifier
            .as_deref()
            .is_some_and(|identifier| module_meta.is_sub_header(identifier));

        if is_header {
            collapsed.push(child);
            current_header = Some(collapsed.len() - 1);
        } else if let Some(header_index) = current_header {
            collapsed[header_index].children.push(child);
        } else {
            collapsed.push(child);
        }
    }

    item.children = collapsed;
    item
}
