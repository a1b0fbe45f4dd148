//! Video content processor.
//!
//! Claims web link resources pointing at YouTube watch URLs and emits a
//! `<video>` block referencing the video id.

use std::sync::OnceLock;

use regex::Regex;

use crate::cartridge::manifest::ResourceRecord;
use crate::cartridge::Cartridge;
use crate::olx::OlxNode;
use crate::processors::utils::parse_web_link;
use crate::processors::{ContentProcessor, ProcessError, ProcessorContext};

fn youtube_link_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"youtube\.com/watch\?v=(?P<video_id>[-\w]+)").expect("valid regex")
    })
}

pub struct VideoProcessor;

impl ContentProcessor for VideoProcessor {
    fn name(&self) -> &'static str {
        "video"
    }

    fn process(
        &self,
        cartridge: &Cartridge,
        _context: &mut ProcessorContext,
        resource: &ResourceRecord,
        _idref: &str,
    ) -> Result<Option<Vec<OlxNode>>, ProcessError> {
        let Some(web_link) = parse_web_link(cartridge, resource)? else {
            return Ok(None);
        };
        let Some(url) = web_link.url.as_deref() else {
            return Ok(None);
        };
        let Some(captures) = youtube_link_pattern().captures(url) else {
            return Ok(None);
        };

        let video_id = &captures["video_id"];
        let node = OlxNode::new("video")
            .with_attribute("youtube", format!("1.00:{video_id}"))
            .with_attribute("youtube_id_1_0", video_id);
        Ok(Some(vec![node]))
    }
}
