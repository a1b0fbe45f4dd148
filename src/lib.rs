//! Converts IMS Common Cartridge course packages into OLX course trees.
//!
//! The pipeline per input file: extract the `.imscc` archive, parse
//! `imsmanifest.xml` into the cartridge model, normalize the
//! organization hierarchy into the fixed OLX depth, run every leaf
//! resource through the content processor chain, rewrite static links,
//! and package `course.xml`, `policy.json` and the static assets into a
//! `.tar.gz` archive.

pub mod cartridge;
pub mod cli;
pub mod config;
pub mod filesystem;
pub mod olx;
pub mod postprocessors;
pub mod processors;
pub mod utils;
pub mod xml;

pub use cartridge::Cartridge;
pub use config::ConversionConfig;
pub use olx::OlxExport;
