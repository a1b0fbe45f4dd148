//! Static link rewriting.
//!
//! Cartridge HTML refers to course content through LMS placeholder
//! keywords (`$IMS-CC-FILEBASE$`, `$WIKI_REFERENCE$`,
//! `$CANVAS_OBJECT_REFERENCE$`) and Canvas external tool redirect URLs.
//! This pass rewrites them to OLX `/static/` paths and `/jump_to_id/`
//! references, and optionally absolutizes leftover relative links
//! against a configured source site.

use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;
use url::Url;

use crate::cartridge::Cartridge;
use crate::olx::{OlxChild, OlxNode};
use crate::postprocessors::ContentPostProcessor;
use crate::processors::ProcessorContext;
use crate::utils::{percent_decode, unescape_html_entities};

const FILEBASE_KEYWORD: &str = "$IMS-CC-FILEBASE$";
const WIKI_REFERENCE_KEYWORD: &str = "$WIKI_REFERENCE$";
const CANVAS_OBJECT_REFERENCE_KEYWORD: &str = "$CANVAS_OBJECT_REFERENCE$";
const EXTERNAL_TOOLS_MARKER: &str = "external_tools";

fn html_link_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"(?:src|href)\s*=\s*"(.+?)""#).expect("valid regex"))
}

pub struct StaticLinkPostProcessor;

impl ContentPostProcessor for StaticLinkPostProcessor {
    fn name(&self) -> &'static str {
        "static_links"
    }

    fn process(&self, node: &mut OlxNode, cartridge: &Cartridge, context: &ProcessorContext) {
        rewrite_node(node, cartridge, context);
    }
}

fn rewrite_node(node: &mut OlxNode, cartridge: &Cartridge, context: &ProcessorContext) {
    for attribute in ["src", "href", "url"] {
        if let Some(value) = node.attribute(attribute).map(str::to_string) {
            if let Some(rewritten) = rewrite_link(&value, cartridge, context) {
                node.set_attribute(attribute, rewritten);
            }
        }
    }

    for child in &mut node.children {
        match child {
            OlxChild::Element(element) => rewrite_node(element, cartridge, context),
            OlxChild::Text(markup) | OlxChild::Cdata(markup) | OlxChild::Raw(markup) => {
                *markup = rewrite_markup(markup, cartridge, context);
            }
        }
    }
}

/// Rewrite every src/href link inside an HTML fragment.
fn rewrite_markup(markup: &str, cartridge: &Cartridge, context: &ProcessorContext) -> String {
    let links: Vec<String> = html_link_pattern()
        .captures_iter(markup)
        .map(|captures| captures[1].to_string())
        .collect();

    let mut result = markup.to_string();
    for link in links {
        if let Some(rewritten) = rewrite_link(&link, cartridge, context) {
            result = result.replace(&link, &rewritten);
        }
    }
    result
}

/// Rewrite one link, or `None` when it should stay as it is.
fn rewrite_link(link: &str, cartridge: &Cartridge, context: &ProcessorContext) -> Option<String> {
    if link.contains(FILEBASE_KEYWORD) {
        Some(rewrite_filebase_link(link))
    } else if link.contains(WIKI_REFERENCE_KEYWORD) {
        rewrite_wiki_link(link, cartridge)
    } else if link.contains(EXTERNAL_TOOLS_MARKER) {
        rewrite_external_tool_link(link)
    } else if link.contains(CANVAS_OBJECT_REFERENCE_KEYWORD) {
        Some(rewrite_canvas_object_link(link))
    } else {
        absolutize_relative_link(link, context)
    }
}

/// `$IMS-CC-FILEBASE$` paths become `/static/` paths; cache-busting
/// query strings are dropped.
fn rewrite_filebase_link(link: &str) -> String {
    let decoded = percent_decode(link).replace(FILEBASE_KEYWORD, "/static");
    let path = decoded.split('?').next().unwrap_or(&decoded);
    path.replace("&amp;", "&")
}

/// Wiki page links are matched against manifest resource hrefs by their
/// trailing `<slug>.html` segment; a hit becomes an in-course jump.
fn rewrite_wiki_link(link: &str, cartridge: &Cartridge) -> Option<String> {
    let decoded = percent_decode(link);
    let stem = decoded.replace(&format!("{WIKI_REFERENCE_KEYWORD}/pages/"), "");
    let stem = stem.split('?').next().unwrap_or(&stem);
    let search_key = format!("{stem}.html");

    let rewritten = cartridge
        .resource_id_by_href()
        .iter()
        .find(|(href, _)| href.ends_with(&search_key))
        .map(|(_, identifier)| format!("/jump_to_id/{identifier}"));
    if rewritten.is_none() {
        warn!("Unable to process Wiki link: {}", link);
    }
    rewritten
}

/// Canvas external tool redirects carry the launch URL in their `url`
/// query parameter. A redirect without one is cleared entirely rather
/// than left pointing into the source LMS.
fn rewrite_external_tool_link(link: &str) -> Option<String> {
    let unescaped = unescape_html_entities(link);
    let url_parameter = unescaped.split_once('?').and_then(|(_, query)| {
        query.split('&').find_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            (name == "url").then(|| percent_decode(value))
        })
    });
    if url_parameter.is_none() {
        warn!("Unable to process external tool link: {}", link);
    }
    Some(url_parameter.unwrap_or_default())
}

fn rewrite_canvas_object_link(link: &str) -> String {
    percent_decode(link).replace(
        &format!("{CANVAS_OBJECT_REFERENCE_KEYWORD}/quizzes/"),
        "/jump_to_id/",
    )
}

/// Remaining relative links either point at collected static assets,
/// which stay relative, or at pages on the course's original site and
/// get absolutized against the configured source.
fn absolutize_relative_link(link: &str, context: &ProcessorContext) -> Option<String> {
    let source = context.relative_links_source()?;
    if context.static_paths().contains(link) {
        return None;
    }
    match Url::parse(link) {
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            Url::parse(source).ok()?.join(link).ok().map(String::from)
        }
        _ => None,
    }
}
