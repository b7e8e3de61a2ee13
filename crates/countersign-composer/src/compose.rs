//! Block content composition

use std::collections::BTreeMap;
use std::sync::OnceLock;

use countersign_domain::{AppendMode, BlockDefinition, DataMap};
use regex::{Captures, Regex};
use serde_json::Value;

fn var_pattern() -> &'static Regex {
    static VAR_RE: OnceLock<Regex> = OnceLock::new();
    VAR_RE.get_or_init(|| Regex::new(r"\{\{\s*(\w+)\s*\}\}").unwrap())
}

fn value_to_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Substitute `{{ name }}` placeholders in a block's inner fragment
///
/// Missing or null variables substitute as an empty string; there is no
/// error path.
pub fn render_inner(fragment: &str, data: &DataMap) -> String {
    var_pattern()
        .replace_all(fragment, |caps: &Captures<'_>| {
            value_to_text(data.get(&caps[1]))
        })
        .into_owned()
}

/// Append a custom supplement to rendered base content
///
/// An empty or whitespace-only supplement leaves the base verbatim: no
/// trailing separators, no label.
pub fn combine(base: &str, custom: &str, mode: AppendMode, label: &str) -> String {
    let custom = custom.trim();
    if custom.is_empty() {
        return base.to_string();
    }

    match mode {
        AppendMode::Newline => format!("{}\n{}", base, custom),
        AppendMode::Inline => format!("{} {}", base, custom),
        AppendMode::Labelled => {
            if label.is_empty() {
                format!("{}\n{}", base, custom)
            } else {
                format!("{}\n{} {}", base, label, custom)
            }
        }
    }
}

/// A block with its rendered base and combined final content
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedBlock {
    /// Block key
    pub key: String,

    /// Inner fragment rendered against the data map
    pub base_rendered: String,

    /// The author's supplement, possibly empty
    pub custom_content: String,

    /// Base and supplement combined per the append mode
    pub final_content: String,
}

/// Render one block: substitute the fragment, then append the supplement
pub fn render_block(block: &BlockDefinition, data: &DataMap) -> RenderedBlock {
    let base_rendered = render_inner(&block.inner_template, data);
    let custom_content = value_to_text(data.get(&block.custom_field_name()));
    let final_content = combine(
        &base_rendered,
        &custom_content,
        block.append_mode,
        &block.label,
    );

    RenderedBlock {
        key: block.key.clone(),
        base_rendered,
        custom_content,
        final_content,
    }
}

/// Compute the `__block_{key}__` variable for every block definition
///
/// The returned map is merged into the data handed to the external
/// renderer, whose own substitution pass then needs no block-specific
/// logic.
pub fn generate_variables(blocks: &BTreeMap<String, BlockDefinition>, data: &DataMap) -> DataMap {
    blocks
        .values()
        .map(|block| {
            let rendered = render_block(block, data);
            (
                block.variable_name(),
                Value::String(rendered.final_content),
            )
        })
        .collect()
}
