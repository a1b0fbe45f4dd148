//! Filesystem boundary: archive extraction, lenient XML source loading
//! and output packaging.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use flate2::write::GzEncoder;
use flate2::Compression;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::utils::clean_file_name;

#[derive(Debug, Error)]
pub enum FilesystemError {
    /// A required file is missing or cannot be read. Distinct from
    /// malformed content so callers can tell I/O failures apart from
    /// parse failures.
    #[error("File not found or unreadable: {path}: {source}")]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to process archive {path}: {message}")]
    Archive { path: PathBuf, message: String },
}

pub fn create_directory(directory_path: &Path) -> Result<(), FilesystemError> {
    if !directory_path.exists() {
        fs::create_dir_all(directory_path).map_err(|source| FilesystemError::Unreadable {
            path: directory_path.to_path_buf(),
            source,
        })?;
        debug!("Created the folder: {}", directory_path.display());
    }
    Ok(())
}

/// Extract a cartridge zip next to `destination_base`, into a directory
/// named after the archive stem. Member names go through reserved
/// character cleanup so they are writable on any filesystem; manifest
/// hrefs receive the same treatment at parse time.
pub fn unzip_directory(archive_path: &Path, destination_base: &Path) -> Result<PathBuf, FilesystemError> {
    let stem = archive_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "cartridge".to_string());
    let destination = destination_base.join(stem);

    let file = fs::File::open(archive_path).map_err(|source| FilesystemError::Unreadable {
        path: archive_path.to_path_buf(),
        source,
    })?;
    let mut archive = zip::ZipArchive::new(file).map_err(|err| FilesystemError::Archive {
        path: archive_path.to_path_buf(),
        message: err.to_string(),
    })?;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(|err| FilesystemError::Archive {
            path: archive_path.to_path_buf(),
            message: err.to_string(),
        })?;

        let cleaned_name = clean_file_name(entry.name());
        let target = destination.join(cleaned_name.trim_start_matches('/'));

        if entry.is_dir() {
            create_directory(&target)?;
            continue;
        }

        if let Some(parent) = target.parent() {
            create_directory(parent)?;
        }

        let mut contents = Vec::new();
        entry
            .read_to_end(&mut contents)
            .map_err(|source| FilesystemError::Unreadable {
                path: target.clone(),
                source,
            })?;
        fs::write(&target, contents).map_err(|source| FilesystemError::Unreadable {
            path: target.clone(),
            source,
        })?;
    }

    Ok(destination)
}

/// Read a payload file as text.
pub fn read_file(path: &Path) -> Result<String, FilesystemError> {
    fs::read_to_string(path).map_err(|source| FilesystemError::Unreadable {
        path: path.to_path_buf(),
        source,
    })
}

/// Read an XML document, resolving entity references the XML parser
/// would reject.
///
/// Exported cartridges routinely contain HTML-only entities such as
/// `&nbsp;` inside otherwise well-formed XML. Those are rewritten to
/// numeric character references before parsing; unknown references get
/// their ampersand escaped so extraction can continue.
pub fn read_xml_text(path: &Path) -> Result<String, FilesystemError> {
    info!("Loading file {}", path.display());
    let text = read_file(path)?;
    Ok(sanitize_xml_entities(&text))
}

fn entity_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"&([a-zA-Z][a-zA-Z0-9]{1,30});").expect("valid regex"))
}

/// Rewrite non-XML named entities into numeric character references.
pub fn sanitize_xml_entities(text: &str) -> String {
    entity_pattern()
        .replace_all(text, |captures: &regex::Captures| match &captures[1] {
            "amp" | "lt" | "gt" | "quot" | "apos" => captures[0].to_string(),
            "nbsp" => "&#160;".to_string(),
            "copy" => "&#169;".to_string(),
            "reg" => "&#174;".to_string(),
            "trade" => "&#8482;".to_string(),
            "mdash" => "&#8212;".to_string(),
            "ndash" => "&#8211;".to_string(),
            "hellip" => "&#8230;".to_string(),
            "ldquo" => "&#8220;".to_string(),
            "rdquo" => "&#8221;".to_string(),
            "lsquo" => "&#8216;".to_string(),
            "rsquo" => "&#8217;".to_string(),
            _ => format!("&amp;{};", &captures[1]),
        })
        .into_owned()
}

/// Create a `.tar.gz` archive out of the given inputs, each a source
/// path paired with its name inside the archive. Missing inputs are
/// skipped with an error log instead of failing the packaging run.
pub fn add_in_tar_gz(archive_path: &Path, inputs: &[(PathBuf, String)]) -> Result<(), FilesystemError> {
    let file = fs::File::create(archive_path).map_err(|source| FilesystemError::Unreadable {
        path: archive_path.to_path_buf(),
        source,
    })?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for (source_path, archive_name) in inputs {
        if !source_path.exists() {
            error!("{} was not found. Skipping", source_path.display());
            continue;
        }

        let archive_name = archive_name.trim_matches('/');
        let result = if source_path.is_dir() {
            builder.append_dir_all(archive_name, source_path)
        } else {
            builder.append_path_with_name(source_path, archive_name)
        };
        result.map_err(|source| FilesystemError::Unreadable {
            path: source_path.clone(),
            source,
        })?;
    }

    let encoder = builder.into_inner().map_err(|source| FilesystemError::Unreadable {
        path: archive_path.to_path_buf(),
        source,
    })?;
    encoder
        .finish()
        .map_err(|source| FilesystemError::Unreadable {
            path: archive_path.to_path_buf(),
            source,
        })?
        .flush()
        .map_err(|source| FilesystemError::Unreadable {
            path: archive_path.to_path_buf(),
            source,
        })?;

    Ok(())
}
