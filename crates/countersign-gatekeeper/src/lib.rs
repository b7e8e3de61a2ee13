//! Countersign Gatekeeper
//!
//! The sole authority deciding which submitted fields are applied to a
//! review's data map.
//!
//! The gatekeeper provides:
//! - Schema-driven whitelist enforcement (editable fields plus block
//!   custom fields)
//! - Per-kind field validation (string/boolean/date/enum/list)
//! - Content sanitization for block custom fields
//!
//! Rejection is silent with respect to data mutation but always
//! observable: unauthorized fields and per-field errors come back in the
//! validation result so the caller can log and report them.
//!
//! # Examples
//!
//! ```no_run
//! use countersign_gatekeeper::SchemaValidator;
//!
//! let validator = SchemaValidator::new("schemas");
//!
//! // Validate a proposed update before touching the review
//! // let result = validator.validate_update("engagement_letter", &changes)?;
//! ```

#![warn(missing_docs)]

mod error;
mod sanitizer;
mod validator;

pub use error::GatekeeperError;
pub use sanitizer::{sanitize_limited, strip_all_tags};
pub use validator::{FieldError, SchemaValidator, ValidationResult};
