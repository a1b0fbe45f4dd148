//! Common Cartridge resource type matching.
//!
//! Resource `type` attributes are either exact literals (`webcontent`)
//! or versioned tokens such as `imswl_xmlv1p1`. The versioned ones are
//! matched with regular expressions over the `vDpD` suffix so any new
//! Common Cartridge minor or major version matches without code
//! changes.

use std::sync::OnceLock;

use regex::Regex;

pub const WEB_CONTENT: &str = "webcontent";

fn pattern(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("valid regex"))
}

pub fn is_web_link(resource_type: &str) -> bool {
    static CELL: OnceLock<Regex> = OnceLock::new();
    pattern(&CELL, r"^imswl_xmlv\d+p\d+$").is_match(resource_type)
}

pub fn is_lti_link(resource_type: &str) -> bool {
    static CELL: OnceLock<Regex> = OnceLock::new();
    pattern(&CELL, r"^imsbasiclti_xmlv\d+p\d+$").is_match(resource_type)
}

pub fn is_qti_assessment(resource_type: &str) -> bool {
    static CELL: OnceLock<Regex> = OnceLock::new();
    pattern(&CELL, r"^imsqti_xmlv\d+p\d+/imscc_xmlv\d+p\d+/assessment$").is_match(resource_type)
}

pub fn is_discussion_topic(resource_type: &str) -> bool {
    static CELL: OnceLock<Regex> = OnceLock::new();
    pattern(&CELL, r"^imsdt_xmlv\d+p\d+$").is_match(resource_type)
}

pub fn is_assignment(resource_type: &str) -> bool {
    static CELL: OnceLock<Regex> = OnceLock::new();
    pattern(&CELL, r"^assignment_xmlv\d+p\d+$").is_match(resource_type)
}
