//! Countersign Block Composer
//!
//! Merges system-authored template fragments with user-supplied
//! supplements and emits the synthetic `__block_{key}__` variables the
//! external renderer substitutes like any other variable.
//!
//! The substitution grammar here is deliberately minimal: `{{ name }}`
//! only, no conditionals, loops, or nested expressions, to avoid
//! collision with the full rendering engine used downstream.
//!
//! # Examples
//!
//! ```
//! use countersign_composer::render_inner;
//! use countersign_domain::DataMap;
//!
//! let mut data = DataMap::new();
//! data.insert("client".to_string(), "Acme".into());
//! assert_eq!(render_inner("Dear {{ client }},", &data), "Dear Acme,");
//! ```

#![warn(missing_docs)]

mod compose;
mod parser;

pub use compose::{combine, generate_variables, render_block, render_inner, RenderedBlock};
pub use parser::{extract_block_keys, parse_template, prepare_template, ParsedBlock};
