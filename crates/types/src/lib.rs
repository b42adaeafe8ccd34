//! # Actionflow Types
//!
//! Shared parameter model for the actionflow engine: explicit runtime type
//! tags with a declared subtype order, named slot declarations, ordered
//! declaration sets with the compatibility test, and the type-erased values
//! that flow between actions.

use thiserror::Error;

pub mod param;
pub mod type_tag;
pub mod value;

pub use param::{Declaration, DeclarationSet, InputParam, OutputParam, Param};
pub use type_tag::TypeTag;
pub use value::{ParamValue, Update};

/// Errors raised while building parameter values.
#[derive(Debug, Error)]
pub enum ParamError {
    #[error("value of type `{actual}` cannot be tagged as `{tag}`")]
    TagMismatch { tag: String, actual: String },
}
