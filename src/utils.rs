//! Small helpers shared across the conversion pipeline.

use std::sync::OnceLock;

use regex::Regex;

fn cdata_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)<!\[CDATA\[(?P<content>.*?)\]\]>").expect("valid regex"))
}

fn reserved_chars_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[\?\*\|:><]").expect("valid regex"))
}

/// Replace characters that are reserved on some filesystems with an
/// underscore so extracted file names are usable in read and write
/// operations. Manifest hrefs must go through the same replacement to
/// keep referring to the renamed files.
pub fn clean_file_name(filename: &str) -> String {
    reserved_chars_pattern().replace_all(filename, "_").into_owned()
}

/// Delete CDATA markers from an XML string while keeping their content.
pub fn clean_from_cdata(xml_string: &str) -> String {
    cdata_pattern().replace_all(xml_string, "$content").into_owned()
}

/// Build a lowercase identifier out of a display title: punctuation and
/// spaces become single underscores.
pub fn simple_slug(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut last_was_separator = false;
    for ch in value.chars() {
        if ch.is_ascii_punctuation() || ch == ' ' {
            if !last_was_separator {
                slug.push('_');
            }
            last_was_separator = true;
        } else {
            slug.extend(ch.to_lowercase());
            last_was_separator = false;
        }
    }
    slug.trim_matches('_').to_string()
}

/// Resolve HTML character references in a string.
///
/// Material texts inside QTI documents frequently arrive as escaped HTML
/// markup. Only the named entities that actually occur in Common
/// Cartridge exports are handled, plus numeric references.
pub fn unescape_html_entities(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find('&') {
        result.push_str(&rest[..start]);
        rest = &rest[start..];

        // Bound the search by position, not by slicing: a byte offset
        // can land inside a multibyte character.
        let Some(end) = rest.find(';').filter(|&end| end < 10) else {
            result.push('&');
            rest = &rest[1..];
            continue;
        };
        let entity = &rest[1..end];

        let replacement = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some('\u{a0}'),
            _ => entity
                .strip_prefix('#')
                .and_then(|num| {
                    if let Some(hex) = num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
                        u32::from_str_radix(hex, 16).ok()
                    } else {
                        num.parse::<u32>().ok()
                    }
                })
                .and_then(char::from_u32),
        };

        match replacement {
            Some(ch) => {
                result.push(ch);
                rest = &rest[end + 1..];
            }
            None => {
                result.push('&');
                rest = &rest[1..];
            }
        }
    }

    result.push_str(rest);
    result
}

/// Percent-decode a string, leaving it untouched when the encoding is
/// not valid UTF-8.
pub fn percent_decode(value: &str) -> String {
    urlencoding::decode(value)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_file_name() {
        assert_eq!(clean_file_name("with?query*and|pipe"), "with_query_and_pipe");
        assert_eq!(clean_file_name("plain.html"), "plain.html");
    }

    #[test]
    fn test_clean_from_cdata() {
        let cleaned = clean_from_cdata("<html><![CDATA[<p>one</p>]]><![CDATA[two]]></html>");
        assert_eq!(cleaned, "<html><p>one</p>two</html>");
    }

    #[test]
    fn test_simple_slug() {
        assert_eq!(simple_slug("My LTI Tool (v2)"), "my_lti_tool_v2");
        assert_eq!(simple_slug("__already__slugged__"), "already_slugged");
    }

    #[test]
    fn test_unescape_near_multibyte_text() {
        // An ampersand running into multibyte text must come through
        // untouched instead of splitting a character.
        assert_eq!(unescape_html_entities("&12345678é"), "&12345678é");
        assert_eq!(unescape_html_entities("café &amp; thé"), "café & thé");
    }

    #[test]
    fn test_unescape_html_entities() {
        assert_eq!(
            unescape_html_entities("&lt;p&gt;a &amp; b&lt;/p&gt;"),
            "<p>a & b</p>"
        );
        assert_eq!(unescape_html_entities("&#65;&#x42;"), "AB");
        // Unknown references survive untouched.
        assert_eq!(unescape_html_entities("&unknown;"), "&unknown;");
    }
}
