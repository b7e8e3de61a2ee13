//! Content sanitization for block custom fields
//!
//! Two policies, by content kind:
//! - plain text: every tag is stripped, only the text survives
//! - limited rich text: a fixed tag allow-list survives with all
//!   attributes removed; any other tag is deleted together with its
//!   enclosed content (dropped, not hoisted)

use std::sync::OnceLock;

use regex::Regex;

/// Tags that survive limited rich text sanitization
const ALLOWED_TAGS: &[&str] = &[
    "b", "i", "u", "br", "ul", "ol", "li", "p", "strong", "em",
];

fn tag_pattern() -> &'static Regex {
    static TAG_RE: OnceLock<Regex> = OnceLock::new();
    TAG_RE.get_or_init(|| Regex::new(r"<(/?)([a-zA-Z][a-zA-Z0-9]*)([^>]*)>").unwrap())
}

fn is_allowed(tag: &str) -> bool {
    ALLOWED_TAGS.contains(&tag)
}

/// Sanitize limited rich text
///
/// Keeps only the allow-listed tags, strips every attribute
/// unconditionally, and drops disallowed tags along with their content.
/// An unknown tag left unclosed swallows the rest of the input; the
/// policy favors safety over content preservation.
pub fn sanitize_limited(input: &str) -> String {
    if input.is_empty() {
        return String::new();
    }

    let mut out = String::with_capacity(input.len());
    let mut last = 0;
    // Stack of unknown open tags whose content is being dropped
    let mut skip_stack: Vec<String> = Vec::new();

    for caps in tag_pattern().captures_iter(input) {
        let whole = caps.get(0).unwrap();
        let closing = !caps[1].is_empty();
        let name = caps[2].to_lowercase();
        let attrs = caps.get(3).map(|m| m.as_str()).unwrap_or("");

        if skip_stack.is_empty() {
            out.push_str(&input[last..whole.start()]);
        }
        last = whole.end();

        if is_allowed(&name) {
            if skip_stack.is_empty() {
                if closing {
                    if name != "br" {
                        out.push_str("</");
                        out.push_str(&name);
                        out.push('>');
                    }
                } else if name == "br" {
                    out.push_str("<br>");
                } else {
                    out.push('<');
                    out.push_str(&name);
                    out.push('>');
                }
            }
        } else if closing {
            if skip_stack.last().map(|t| t == &name).unwrap_or(false) {
                skip_stack.pop();
            }
            // An unmatched unknown close tag is simply dropped
        } else if !attrs.trim_end().ends_with('/') {
            skip_stack.push(name);
        }
    }

    if skip_stack.is_empty() {
        out.push_str(&input[last..]);
    }

    out
}

/// Strip every tag and return the plain text, trimmed
pub fn strip_all_tags(input: &str) -> String {
    static STRIP_RE: OnceLock<Regex> = OnceLock::new();
    let re = STRIP_RE.get_or_init(|| Regex::new(r"<[^>]+>").unwrap());

    let text = re.replace_all(input, "");
    decode_entities(&text).trim().to_string()
}

/// Decode the basic named entities left behind after tag stripping
fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}
