//! Schema-driven whitelist validation

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use countersign_domain::{
    BlockDefinition, ContentKind, DataMap, DocSchema, FieldKind, FieldSpec, ValidationRules,
};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::error::GatekeeperError;
use crate::sanitizer::{sanitize_limited, strip_all_tags};

/// A per-field validation failure
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    /// Field the error applies to
    pub field: String,

    /// Human-readable message
    pub message: String,
}

/// Result of validating a proposed update
///
/// Unauthorized fields never reach `filtered_data`; they are reported so
/// the caller can log each as an unauthorized attempt. Fields that fail
/// validation are likewise excluded and reported in `errors`.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// Whether every authorized field passed validation
    pub is_valid: bool,

    /// Authorized fields that passed, with sanitized values
    pub filtered_data: DataMap,

    /// Per-field validation failures
    pub errors: Vec<FieldError>,

    /// Fields rejected by the whitelist
    pub unauthorized_fields: Vec<String>,
}

/// Schema-based validator with strict whitelist enforcement
///
/// Loads per-document-type schemas from a directory of JSON files and
/// caches them by doc_type after the first load.
pub struct SchemaValidator {
    schemas_dir: PathBuf,
    cache: RwLock<HashMap<String, Arc<DocSchema>>>,
}

impl SchemaValidator {
    /// Create a validator reading schemas from the given directory
    pub fn new<P: AsRef<Path>>(schemas_dir: P) -> Self {
        Self {
            schemas_dir: schemas_dir.as_ref().to_path_buf(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Register a schema directly, bypassing the filesystem
    ///
    /// Used by embedders and tests that assemble schemas in memory.
    pub fn register_schema(&self, doc_type: impl Into<String>, mut schema: DocSchema) {
        schema.normalize();
        self.cache
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(doc_type.into(), Arc::new(schema));
    }

    /// Load and cache the schema for a document type
    pub fn load_schema(&self, doc_type: &str) -> Result<Arc<DocSchema>, GatekeeperError> {
        if let Some(schema) = self
            .cache
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(doc_type)
        {
            return Ok(Arc::clone(schema));
        }

        // doc_type names a file; path separators are never legitimate
        if doc_type.is_empty() || doc_type.contains(['/', '\\']) || doc_type.starts_with('.') {
            return Err(GatekeeperError::UnknownDocType(doc_type.to_string()));
        }

        let schema_file = self.schemas_dir.join(format!("{}.json", doc_type));
        if !schema_file.exists() {
            return Err(GatekeeperError::UnknownDocType(doc_type.to_string()));
        }

        let raw = std::fs::read_to_string(&schema_file)?;
        let mut schema: DocSchema = serde_json::from_str(&raw)
            .map_err(|e| GatekeeperError::Schema(format!("{}: {}", doc_type, e)))?;
        schema.normalize();

        let schema = Arc::new(schema);
        self.cache
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(doc_type.to_string(), Arc::clone(&schema));
        Ok(schema)
    }

    /// The editable-field set for a document type
    ///
    /// Declared editable fields plus every block custom field.
    pub fn editable_fields(&self, doc_type: &str) -> Result<Vec<String>, GatekeeperError> {
        Ok(self.load_schema(doc_type)?.editable_fields())
    }

    /// Validate a proposed update with strict whitelist enforcement
    ///
    /// 1. Partitions the changes into authorized and unauthorized fields
    /// 2. Type/rule-validates each authorized field against the schema
    /// 3. Sanitizes block custom fields by content kind
    /// 4. Returns only the valid, editable fields with sanitized values
    pub fn validate_update(
        &self,
        doc_type: &str,
        proposed_changes: &DataMap,
    ) -> Result<ValidationResult, GatekeeperError> {
        let schema = self.load_schema(doc_type)?;
        let editable_fields = schema.editable_fields();

        let mut result = ValidationResult::default();

        for (field_name, value) in proposed_changes {
            if !editable_fields.iter().any(|f| f == field_name) {
                warn!(doc_type, field = %field_name, "unauthorized field rejected");
                result.unauthorized_fields.push(field_name.clone());
                continue;
            }

            match self.validate_field_value(&schema, field_name, value) {
                Ok(sanitized) => {
                    result.filtered_data.insert(field_name.clone(), sanitized);
                }
                Err(message) => {
                    result.errors.push(FieldError {
                        field: field_name.clone(),
                        message,
                    });
                }
            }
        }

        result.is_valid = result.errors.is_empty();
        Ok(result)
    }

    /// Validate complete data against the full schema (creation path)
    ///
    /// Checks every declared field including non-editable ones, and
    /// enforces required fields. The data itself passes through
    /// unfiltered; this is a well-formedness gate, not a whitelist.
    pub fn validate_complete_data(
        &self,
        doc_type: &str,
        data: &DataMap,
    ) -> Result<ValidationResult, GatekeeperError> {
        let schema = self.load_schema(doc_type)?;

        let mut result = ValidationResult {
            filtered_data: data.clone(),
            ..Default::default()
        };

        for (field_name, spec) in &schema.fields {
            let value = data.get(field_name);

            if spec.required && value.map(is_empty_value).unwrap_or(true) {
                result.errors.push(FieldError {
                    field: field_name.clone(),
                    message: format!("Field '{}' is required", field_name),
                });
                continue;
            }

            if let Some(value) = value {
                if !is_empty_value(value) {
                    if let Err(message) = self.validate_field_value(&schema, field_name, value) {
                        result.errors.push(FieldError {
                            field: field_name.clone(),
                            message,
                        });
                    }
                }
            }
        }

        result.is_valid = result.errors.is_empty();
        Ok(result)
    }

    /// Validate one field value; returns the (possibly sanitized) value
    fn validate_field_value(
        &self,
        schema: &DocSchema,
        field_name: &str,
        value: &Value,
    ) -> Result<Value, String> {
        if let Some(block) = schema.block_for_custom_field(field_name) {
            return validate_block_custom_field(field_name, value, block);
        }

        let spec = schema
            .field(field_name)
            .ok_or_else(|| format!("Unknown field: {}", field_name))?;

        if spec.required && is_empty_value(value) {
            return Err(format!("Field '{}' is required", field_name));
        }

        // Empty non-required values pass through: updates may clear a field
        if is_empty_value(value) {
            return Ok(value.clone());
        }

        validate_kind(field_name, value, spec)?;
        apply_rules(field_name, value, &spec.validation)?;

        Ok(value.clone())
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Type validation, one arm per field kind
fn validate_kind(field_name: &str, value: &Value, spec: &FieldSpec) -> Result<(), String> {
    match spec.kind {
        FieldKind::String => validate_string(field_name, value),
        FieldKind::Boolean => validate_boolean(field_name, value),
        FieldKind::Date => validate_date(field_name, value),
        FieldKind::Enum => validate_enum(field_name, value, &spec.enum_values),
        FieldKind::List => validate_list(field_name, value, spec),
    }
}

fn validate_string(field_name: &str, value: &Value) -> Result<(), String> {
    if value.is_string() {
        Ok(())
    } else {
        Err(format!("Field '{}' must be a string", field_name))
    }
}

fn validate_boolean(field_name: &str, value: &Value) -> Result<(), String> {
    if value.is_boolean() {
        Ok(())
    } else {
        Err(format!("Field '{}' must be a boolean", field_name))
    }
}

fn validate_date(field_name: &str, value: &Value) -> Result<(), String> {
    let text = value.as_str().ok_or_else(|| {
        format!("Field '{}' must be a date string", field_name)
    })?;

    let parsed = chrono::NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .or_else(|_| chrono::NaiveDate::parse_from_str(text, "%d/%m/%Y"));
    parsed.map(|_| ()).map_err(|_| {
        format!(
            "Field '{}' must be a valid date (YYYY-MM-DD or DD/MM/YYYY)",
            field_name
        )
    })
}

fn validate_enum(field_name: &str, value: &Value, enum_values: &[String]) -> Result<(), String> {
    let text = value
        .as_str()
        .ok_or_else(|| format!("Field '{}' must be one of: {:?}", field_name, enum_values))?;
    if enum_values.iter().any(|v| v == text) {
        Ok(())
    } else {
        Err(format!(
            "Field '{}' must be one of: {:?}",
            field_name, enum_values
        ))
    }
}

fn validate_list(field_name: &str, value: &Value, spec: &FieldSpec) -> Result<(), String> {
    let items = value
        .as_array()
        .ok_or_else(|| format!("Field '{}' must be a list", field_name))?;

    if spec.item_schema.is_empty() {
        return Ok(());
    }

    for (i, item) in items.iter().enumerate() {
        let obj = item
            .as_object()
            .ok_or_else(|| format!("Field '{}' item {} must be an object", field_name, i))?;
        for (item_field, item_spec) in &spec.item_schema {
            if item_spec.required && !obj.contains_key(item_field) {
                return Err(format!(
                    "Field '{}' item {} missing required field '{}'",
                    field_name, i, item_field
                ));
            }
        }
    }

    Ok(())
}

/// Additional schema rules: pattern, length bounds, numeric bounds
fn apply_rules(field_name: &str, value: &Value, rules: &ValidationRules) -> Result<(), String> {
    let text = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    if let Some(pattern) = &rules.pattern {
        // Anchored at the start, matching the conventional match-from-
        // beginning semantics schemas are written against
        let re = Regex::new(&format!("^(?:{})", pattern))
            .map_err(|e| format!("Field '{}' has an invalid pattern: {}", field_name, e))?;
        if !re.is_match(&text) {
            return Err(format!(
                "Field '{}' does not match required pattern",
                field_name
            ));
        }
    }

    let length = text.chars().count();
    if let Some(min_length) = rules.min_length {
        if length < min_length {
            return Err(format!(
                "Field '{}' must be at least {} characters",
                field_name, min_length
            ));
        }
    }
    if let Some(max_length) = rules.max_length {
        if length > max_length {
            return Err(format!(
                "Field '{}' must be at most {} characters",
                field_name, max_length
            ));
        }
    }

    // Numeric bounds apply when the value parses as a number
    if let Ok(number) = text.parse::<f64>() {
        if let Some(min) = rules.min {
            if number < min {
                return Err(format!("Field '{}' must be at least {}", field_name, min));
            }
        }
        if let Some(max) = rules.max {
            if number > max {
                return Err(format!("Field '{}' must be at most {}", field_name, max));
            }
        }
    }

    Ok(())
}

/// Validate and sanitize a block custom field value
///
/// The maximum length is enforced on the sanitized result, not the raw
/// input: sanitization can shrink the string.
fn validate_block_custom_field(
    field_name: &str,
    value: &Value,
    block: &BlockDefinition,
) -> Result<Value, String> {
    if is_empty_value(value) {
        if block.required {
            return Err(format!("Field '{}' is required", field_name));
        }
        return Ok(value.clone());
    }

    let text = value
        .as_str()
        .ok_or_else(|| format!("Field '{}' must be a string", field_name))?;

    let sanitized = match block.content_kind {
        ContentKind::RichTextLimited => sanitize_limited(text),
        ContentKind::Text => strip_all_tags(text),
    };

    if sanitized.chars().count() > block.max_length {
        return Err(format!(
            "Field '{}' must be at most {} characters",
            field_name, block.max_length
        ));
    }

    Ok(Value::String(sanitized))
}
