//! Control tokens.
//!
//! A `Control(k)` value carries the selected index `0..k-1`; γ
//! predicates consume them, and θ bodies produce a `Control(2)`
//! continuation token. [`Match`] translates a bitstring into a control
//! token through an explicit value→alternative table.

use std::any::Any;

use crate::operator::{Operator, OperatorClass};
use crate::types::Type;

/// A constant control token selecting `alternative` out of
/// `nalternatives`.
#[derive(Debug, Clone)]
pub struct ControlConstant {
    nalternatives: u32,
    alternative: u32,
    result_types: Vec<Type>,
}

impl ControlConstant {
    pub fn new(nalternatives: u32, alternative: u32) -> Self {
        debug_assert!(alternative < nalternatives);
        ControlConstant {
            nalternatives,
            alternative,
            result_types: vec![Type::Control(nalternatives)],
        }
    }

    pub fn nalternatives(&self) -> u32 {
        self.nalternatives
    }

    pub fn alternative(&self) -> u32 {
        self.alternative
    }
}

impl Operator for ControlConstant {
    fn operand_types(&self) -> &[Type] {
        &[]
    }

    fn result_types(&self) -> &[Type] {
        &self.result_types
    }

    fn debug_string(&self) -> String {
        format!("ctl{}({})", self.nalternatives, self.alternative)
    }

    fn eq_operator(&self, other: &dyn Operator) -> bool {
        other
            .as_any()
            .downcast_ref::<ControlConstant>()
            .map(|other| {
                self.nalternatives == other.nalternatives
                    && self.alternative == other.alternative
            })
            .unwrap_or(false)
    }

    fn copy_operator(&self) -> Box<dyn Operator> {
        Box::new(self.clone())
    }

    fn class(&self) -> OperatorClass {
        OperatorClass::of::<ControlConstant>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Map a bitstring value onto a control token: listed values select
/// their alternative, everything else the default.
#[derive(Debug, Clone)]
pub struct Match {
    nbits: u32,
    mapping: Vec<(u64, u64)>,
    default_alternative: u64,
    nalternatives: u32,
    operand_types: Vec<Type>,
    result_types: Vec<Type>,
}

impl Match {
    pub fn new(
        nbits: u32,
        mapping: impl IntoIterator<Item = (u64, u64)>,
        default_alternative: u64,
        nalternatives: u32,
    ) -> Self {
        Match {
            nbits,
            mapping: mapping.into_iter().collect(),
            default_alternative,
            nalternatives,
            operand_types: vec![Type::Bits(nbits)],
            result_types: vec![Type::Control(nalternatives)],
        }
    }

    pub fn nalternatives(&self) -> u32 {
        self.nalternatives
    }

    pub fn nbits(&self) -> u32 {
        self.nbits
    }

    pub fn mapping(&self) -> &[(u64, u64)] {
        &self.mapping
    }

    pub fn default_alternative(&self) -> u64 {
        self.default_alternative
    }

    /// The alternative selected by `value`.
    pub fn alternative(&self, value: u64) -> u64 {
        self.mapping
            .iter()
            .find(|(from, _)| *from == value)
            .map(|(_, to)| *to)
            .unwrap_or(self.default_alternative)
    }
}

impl Operator for Match {
    fn operand_types(&self) -> &[Type] {
        &self.operand_types
    }

    fn result_types(&self) -> &[Type] {
        &self.result_types
    }

    fn debug_string(&self) -> String {
        format!("match{}[{}]", self.nbits, self.nalternatives)
    }

    fn eq_operator(&self, other: &dyn Operator) -> bool {
        other
            .as_any()
            .downcast_ref::<Match>()
            .map(|other| {
                self.nbits == other.nbits
                    && self.mapping == other.mapping
                    && self.default_alternative == other.default_alternative
                    && self.nalternatives == other.nalternatives
            })
            .unwrap_or(false)
    }

    fn copy_operator(&self) -> Box<dyn Operator> {
        Box::new(self.clone())
    }

    fn class(&self) -> OperatorClass {
        OperatorClass::of::<Match>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_constant_type() {
        let constant = ControlConstant::new(4, 2);
        assert_eq!(constant.result_types(), &[Type::Control(4)]);
        assert_eq!(constant.alternative(), 2);
    }

    #[test]
    fn test_match_table() {
        let matcher = Match::new(1, [(1, 1)], 0, 2);
        assert_eq!(matcher.alternative(1), 1);
        assert_eq!(matcher.alternative(0), 0);
        assert_eq!(matcher.operand_types(), &[Type::Bits(1)]);
        assert_eq!(matcher.result_types(), &[Type::Control(2)]);
    }

    #[test]
    fn test_equality_is_structural() {
        let a = Match::new(1, [(1, 1)], 0, 2);
        let b = Match::new(1, [(1, 1)], 0, 2);
        let c = Match::new(1, [(1, 0)], 1, 2);
        assert!(a.eq_operator(&b));
        assert!(!a.eq_operator(&c));
    }
}
