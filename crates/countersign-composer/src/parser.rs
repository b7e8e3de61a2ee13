//! Template block parsing
//!
//! Raw templates declare content slots as `[[BLOCK:key]] … [[/BLOCK]]`.
//! The parser extracts those fragments and rewrites the template so the
//! downstream renderer only ever sees `{{ __block_key__ }}` placeholders.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use countersign_domain::BlockDefinition;
use regex::Regex;

fn block_pattern() -> &'static Regex {
    static BLOCK_RE: OnceLock<Regex> = OnceLock::new();
    BLOCK_RE.get_or_init(|| Regex::new(r"(?s)\[\[BLOCK:(\w+)\]\](.*?)\[\[/BLOCK\]\]").unwrap())
}

/// One block occurrence found in a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedBlock {
    /// Block key
    pub key: String,

    /// Byte offset of the opening marker
    pub start: usize,

    /// Byte offset just past the closing marker
    pub end: usize,

    /// Trimmed content between the markers
    pub inner_template: String,
}

/// Parse every `[[BLOCK:…]] … [[/BLOCK]]` occurrence in a template
pub fn parse_template(template: &str) -> Vec<ParsedBlock> {
    block_pattern()
        .captures_iter(template)
        .map(|caps| {
            let whole = caps.get(0).unwrap();
            ParsedBlock {
                key: caps[1].to_string(),
                start: whole.start(),
                end: whole.end(),
                inner_template: caps[2].trim().to_string(),
            }
        })
        .collect()
}

/// Extract just the block keys, in template order
pub fn extract_block_keys(template: &str) -> Vec<String> {
    parse_template(template)
        .into_iter()
        .map(|block| block.key)
        .collect()
}

/// Rewrite a template, replacing each block span with its placeholder
///
/// Each `[[BLOCK:key]] … [[/BLOCK]]` span becomes `{{ __block_key__ }}`,
/// and the span's inner fragment is recorded on the matching definition
/// so later composition uses the template's own wording.
pub fn prepare_template(
    template: &str,
    definitions: &mut BTreeMap<String, BlockDefinition>,
) -> String {
    let mut result = template.to_string();

    // Replace back to front so earlier spans keep their offsets
    for block in parse_template(template).into_iter().rev() {
        if let Some(definition) = definitions.get_mut(&block.key) {
            definition.inner_template = block.inner_template.clone();
        }
        let placeholder = format!("{{{{ __block_{}__ }}}}", block.key);
        result.replace_range(block.start..block.end, &placeholder);
    }

    result
}
