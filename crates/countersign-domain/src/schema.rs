//! Per-document-type schema: the field whitelist and block slots
//!
//! Schemas are loaded from JSON files by the gatekeeper crate and are
//! immutable during a request. The shapes here mirror the schema file
//! layout: a `fields` map driving whitelist validation and a `blocks` map
//! declaring content slots.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Kind of a schema field, as a closed variant
///
/// Each kind has its own validation function in the gatekeeper; there is
/// no runtime type inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Free-form string
    #[default]
    String,

    /// True/false flag
    Boolean,

    /// Calendar date, accepted as YYYY-MM-DD or DD/MM/YYYY
    Date,

    /// One of the values enumerated in the field spec
    Enum,

    /// List of objects validated against the item schema
    List,
}

/// Extra validation rules attached to a field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationRules {
    /// Regular expression the value must match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    /// Minimum length in characters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,

    /// Maximum length in characters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,

    /// Minimum numeric value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,

    /// Maximum numeric value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

/// Requirements on one field of a list item
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemFieldSpec {
    /// Whether the item field must be present
    #[serde(default)]
    pub required: bool,
}

/// Specification of a single schema field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Field kind
    #[serde(rename = "type", default)]
    pub kind: FieldKind,

    /// Human-readable label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Whether the author may mutate this field while the review is DRAFT
    #[serde(default)]
    pub editable: bool,

    /// Whether a value must be present
    #[serde(default)]
    pub required: bool,

    /// Allowed values for `FieldKind::Enum`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<String>,

    /// Extra validation rules
    #[serde(default)]
    pub validation: ValidationRules,

    /// Per-item field requirements for `FieldKind::List`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub item_schema: BTreeMap<String, ItemFieldSpec>,
}

/// Policy for appending a block's custom supplement to its base content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppendMode {
    /// base + "\n" + custom
    #[default]
    Newline,

    /// base + " " + custom
    Inline,

    /// base + "\n" + label + " " + custom; falls back to newline without a label
    Labelled,
}

impl AppendMode {
    /// Get the mode name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            AppendMode::Newline => "newline",
            AppendMode::Inline => "inline",
            AppendMode::Labelled => "labelled",
        }
    }

    /// Parse a mode from a string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "newline" => Some(AppendMode::Newline),
            "inline" => Some(AppendMode::Inline),
            "labelled" => Some(AppendMode::Labelled),
            _ => None,
        }
    }
}

/// Content kind of a block's custom field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ContentKind {
    /// Plain text; all markup is stripped
    #[default]
    #[serde(rename = "text")]
    Text,

    /// Limited rich text; only the tag allow-list survives
    #[serde(rename = "richtext_limited")]
    RichTextLimited,
}

fn default_max_length() -> usize {
    2000
}

/// A schema-declared content slot
///
/// Combines a system-authored template fragment with an optional
/// user-supplied supplement according to the append mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockDefinition {
    /// Block key; filled in from the schema map key on load
    #[serde(default)]
    pub key: String,

    /// Inner template fragment with `{{ variable }}` placeholders
    #[serde(default)]
    pub inner_template: String,

    /// Name of the bound custom field; defaults to `{key}_custom`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_field: Option<String>,

    /// How the custom supplement is appended
    #[serde(default)]
    pub append_mode: AppendMode,

    /// Label used by the labelled append mode
    #[serde(default)]
    pub label: String,

    /// Content kind of the custom field
    #[serde(rename = "custom_type", default)]
    pub content_kind: ContentKind,

    /// Maximum length of the custom field, enforced after sanitization
    #[serde(default = "default_max_length")]
    pub max_length: usize,

    /// Whether the custom field must be filled
    #[serde(default)]
    pub required: bool,
}

impl BlockDefinition {
    /// The custom field name bound to this block
    pub fn custom_field_name(&self) -> String {
        self.custom_field
            .clone()
            .unwrap_or_else(|| format!("{}_custom", self.key))
    }

    /// The synthetic variable emitted for the renderer
    pub fn variable_name(&self) -> String {
        format!("__block_{}__", self.key)
    }
}

/// A document type's full schema
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocSchema {
    /// Field specifications by name
    #[serde(default)]
    pub fields: BTreeMap<String, FieldSpec>,

    /// Block definitions by key
    #[serde(default)]
    pub blocks: BTreeMap<String, BlockDefinition>,
}

impl DocSchema {
    /// Fill in each block's key from its map key
    ///
    /// Must run once after deserialization, before the blocks are handed
    /// to the composer or the validator.
    pub fn normalize(&mut self) {
        for (key, block) in self.blocks.iter_mut() {
            block.key = key.clone();
        }
    }

    /// Look up a field spec by name
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    /// The editable-field set: declared editable fields plus every block
    /// custom field (block custom fields are implicitly editable)
    pub fn editable_fields(&self) -> Vec<String> {
        let mut editable: Vec<String> = self
            .fields
            .iter()
            .filter(|(_, spec)| spec.editable)
            .map(|(name, _)| name.clone())
            .collect();
        editable.extend(self.block_custom_fields());
        editable
    }

    /// Names of all block custom fields
    pub fn block_custom_fields(&self) -> Vec<String> {
        self.blocks
            .values()
            .map(BlockDefinition::custom_field_name)
            .collect()
    }

    /// The block bound to a custom field name, if any
    pub fn block_for_custom_field(&self, field_name: &str) -> Option<&BlockDefinition> {
        self.blocks
            .values()
            .find(|block| block.custom_field_name() == field_name)
    }
}
