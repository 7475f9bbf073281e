//! Error types for the IR.

use thiserror::Error;

use crate::types::Type;

/// Errors reported by graph construction and mutation.
///
/// Structural errors are assertion-class: they indicate a programming
/// error in the caller, and the graph is left in its pre-operation
/// state. Reductions and normalizations never surface errors; they
/// either apply or leave the graph unchanged.
#[derive(Error, Debug)]
pub enum IrError {
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: Type, found: Type },
    #[error("operand originates in region r{found}, expected region r{expected}")]
    RegionMismatch { expected: usize, found: usize },
    #[error("arity mismatch in {what}: expected {expected}, got {actual}")]
    ArityMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },
    #[error("invariant violation: {message}")]
    InvariantViolation { message: String },
    #[error("operator {operator} is not associative and cannot be flattened")]
    UnreducibleOperator { operator: String },
    #[error("operator {operator} is not part of the serializable operator library")]
    UnknownOperator { operator: String },
    #[error("unknown linkage attribute '{name}'")]
    InvalidLinkage { name: String },
}

impl IrError {
    pub(crate) fn invariant(message: impl Into<String>) -> Self {
        IrError::InvariantViolation {
            message: message.into(),
        }
    }
}
