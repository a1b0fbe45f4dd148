//! Command-line interface for cc2olx.
//!
//! One command: convert a batch of Common Cartridge files into OLX
//! archives. Inputs are converted independently; a failing file is
//! logged and skipped so one broken export cannot sink the batch.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{error, info, warn};

use crate::cartridge::Cartridge;
use crate::config::{ConversionConfig, CustomBlockType};
use crate::filesystem;
use crate::olx::OlxExport;

const CARTRIDGE_EXTENSION: &str = "imscc";
const COURSE_XML_FILE_NAME: &str = "course.xml";
const POLICY_ARCHIVE_NAME: &str = "policies/course/policy.json";
const STATIC_ARCHIVE_DIR: &str = "static";

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultFormat {
    Folder,
    Zip,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn env_filter_directive(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warn",
            Self::Error => "error",
        }
    }
}

/// cc2olx - Convert IMS Common Cartridge courses to OLX
#[derive(Parser, Debug)]
#[command(name = "cc2olx")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Common Cartridge files to convert, or directories to scan for
    /// .imscc files
    #[arg(short, long, required = true, num_args = 1.., value_name = "PATH")]
    pub inputs: Vec<PathBuf>,

    /// Output location, a directory or a zip archive per --result
    #[arg(short, long, default_value = "output")]
    pub output: PathBuf,

    /// How the converted courses are delivered
    #[arg(short, long, value_enum, default_value_t = ResultFormat::Folder)]
    pub result: ResultFormat,

    /// Logging verbosity, overridable through RUST_LOG
    #[arg(short, long, value_enum, default_value_t = LogLevel::Info)]
    pub loglevel: LogLevel,

    /// Site to absolutize relative links against, e.g. the original
    /// LMS origin
    #[arg(short = 's', long, value_name = "URL")]
    pub relative_links_source: Option<String>,

    /// Content types to render with custom xblocks instead of plain
    /// HTML (pdf, google_document)
    #[arg(long = "content-types-with-custom-blocks", value_name = "TYPE", num_args = 0..)]
    pub content_types_with_custom_blocks: Vec<String>,
}

impl Cli {
    pub fn execute(self) -> Result<()> {
        let config = self.conversion_config()?;
        config.validate()?;

        let input_files = collect_input_files(&self.inputs)?;
        if input_files.is_empty() {
            warn!("No cartridge files found in the given inputs");
        }

        let workspace = tempfile::tempdir().context("failed to create a workspace directory")?;
        let staging_dir = workspace.path().join("output");
        filesystem::create_directory(&staging_dir)?;

        for input_file in &input_files {
            info!("Converting {}", input_file.display());
            match convert_one_file(input_file, workspace.path(), &staging_dir, &config) {
                Ok(()) => info!("Converted {}", input_file.display()),
                Err(err) => error!("Failed to convert {}: {:#}", input_file.display(), err),
            }
        }

        match self.result {
            ResultFormat::Folder => {
                copy_directory(&staging_dir, &self.output)
                    .with_context(|| format!("failed to copy results to {}", self.output.display()))?;
            }
            ResultFormat::Zip => {
                let archive_path = self.output.with_extension("zip");
                zip_directory(&staging_dir, &archive_path)
                    .with_context(|| format!("failed to zip results to {}", archive_path.display()))?;
            }
        }

        info!("Conversion complete");
        Ok(())
    }

    fn conversion_config(&self) -> Result<ConversionConfig> {
        let custom_block_types = self
            .content_types_with_custom_blocks
            .iter()
            .map(|name| CustomBlockType::parse(name))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ConversionConfig {
            custom_block_types,
            relative_links_source: self.relative_links_source.clone(),
            ..ConversionConfig::default()
        })
    }
}

/// Convert one cartridge into a `.tar.gz` OLX archive in `staging_dir`.
pub fn convert_one_file(
    input_file: &Path,
    workspace: &Path,
    staging_dir: &Path,
    config: &ConversionConfig,
) -> Result<()> {
    let cartridge = Cartridge::load(input_file, workspace)?;
    info!("Cartridge version: {}", cartridge.version());
    let mut export = OlxExport::new(&cartridge, config)?;

    let course_xml = export.xml()?;
    let policy = serde_json::to_string_pretty(&export.policy())?;

    let stem = input_file
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "course".to_string());
    let course_dir = workspace.join(format!("{stem}_olx"));
    filesystem::create_directory(&course_dir)?;

    let course_xml_path = course_dir.join(COURSE_XML_FILE_NAME);
    let policy_path = course_dir.join("policy.json");
    fs::write(&course_xml_path, course_xml)
        .with_context(|| format!("failed to write {}", course_xml_path.display()))?;
    fs::write(&policy_path, policy)
        .with_context(|| format!("failed to write {}", policy_path.display()))?;

    let mut archive_inputs = vec![
        (course_xml_path, COURSE_XML_FILE_NAME.to_string()),
        (policy_path, POLICY_ARCHIVE_NAME.to_string()),
        (
            cartridge.directory().join(crate::processors::utils::WEB_RESOURCES_DIR_NAME),
            STATIC_ARCHIVE_DIR.to_string(),
        ),
    ];
    // Static files collected from outside web_resources join the same
    // static/ tree under their OLX names.
    for (olx_static_path, cc_static_path) in export.context().static_paths().extra() {
        archive_inputs.push((
            cartridge.directory().join(cc_static_path),
            format!("{STATIC_ARCHIVE_DIR}{}", olx_static_path.trim_start_matches("/static")),
        ));
    }

    let archive_path = staging_dir.join(format!("{stem}.tar.gz"));
    filesystem::add_in_tar_gz(&archive_path, &archive_inputs)?;
    Ok(())
}

/// Resolve the input arguments into a flat list of cartridge files.
fn collect_input_files(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let entries = fs::read_dir(input)
                .with_context(|| format!("failed to read directory {}", input.display()))?;
            let mut found: Vec<PathBuf> = entries
                .filter_map(|entry| entry.ok().map(|entry| entry.path()))
                .filter(|path| {
                    path.extension()
                        .is_some_and(|extension| extension == CARTRIDGE_EXTENSION)
                })
                .collect();
            found.sort();
            files.extend(found);
        } else {
            files.push(input.clone());
        }
    }
    Ok(files)
}

fn copy_directory(source: &Path, destination: &Path) -> Result<()> {
    fs::create_dir_all(destination)?;
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let target = destination.join(entry.file_name());
        if entry.path().is_dir() {
            copy_directory(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

fn zip_directory(source: &Path, archive_path: &Path) -> Result<()> {
    let file = fs::File::create(archive_path)?;
    let mut writer = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();

    let mut pending = vec![source.to_path_buf()];
    while let Some(directory) = pending.pop() {
        for entry in fs::read_dir(&directory)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
                continue;
            }
            let name = path
                .strip_prefix(source)
                .expect("entry under source directory")
                .to_string_lossy()
                .into_owned();
            writer.start_file(name, options)?;
            let contents = fs::read(&path)?;
            writer.write_all(&contents)?;
        }
    }

    writer.finish()?;
    Ok(())
}
