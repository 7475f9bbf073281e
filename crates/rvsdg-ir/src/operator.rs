//! Operator descriptors.
//!
//! An [`Operator`] is an immutable description of a primitive
//! computation: its typed operand and result ports, an equality
//! predicate, and a debug string. Operators are attached to simple
//! nodes; the graph never interprets them beyond the capabilities
//! declared here.

use std::any::{Any, TypeId};
use std::fmt;

use crate::binary::BinaryOperator;
use crate::graph::normal_form::{NormalForm, SimpleNormalForm};
use crate::types::Type;

/// Identity token for an operator class.
///
/// Normal forms are registered per class, and lookup happens on every
/// node creation, so the token is a plain `TypeId` rather than a name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OperatorClass(TypeId);

impl OperatorClass {
    pub fn of<T: 'static>() -> Self {
        OperatorClass(TypeId::of::<T>())
    }
}

/// Capability trait implemented by every operator.
///
/// Implementations are expected to be cheap immutable values. The
/// `as_any` hook supports downcasting (reductions inspect concrete
/// operators); `as_binary` exposes the binary reduction capability
/// without a second registry.
pub trait Operator: fmt::Debug {
    /// Ordered operand port types.
    fn operand_types(&self) -> &[Type];

    /// Ordered result port types.
    fn result_types(&self) -> &[Type];

    fn debug_string(&self) -> String;

    /// Structural equality against another operator instance.
    fn eq_operator(&self, other: &dyn Operator) -> bool;

    fn copy_operator(&self) -> Box<dyn Operator>;

    /// The class token under which this operator's normal form is
    /// registered. Implementations return `OperatorClass::of::<Self>()`.
    fn class(&self) -> OperatorClass;

    /// Side-effecting operators anchor dead-node elimination: they
    /// survive pruning even when none of their outputs is consumed.
    fn has_side_effects(&self) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any;

    fn as_binary(&self) -> Option<&dyn BinaryOperator> {
        None
    }

    /// The normal form installed for this operator's class when none
    /// has been registered explicitly.
    fn default_normal_form(&self) -> Box<dyn NormalForm> {
        Box::new(SimpleNormalForm::default())
    }

    fn narguments(&self) -> usize {
        self.operand_types().len()
    }

    fn nresults(&self) -> usize {
        self.result_types().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_tokens_distinguish_types() {
        struct A;
        struct B;
        assert_eq!(OperatorClass::of::<A>(), OperatorClass::of::<A>());
        assert_ne!(OperatorClass::of::<A>(), OperatorClass::of::<B>());
    }
}
