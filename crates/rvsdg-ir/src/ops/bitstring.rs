//! Bitstring constants, arithmetic and comparison.
//!
//! Values are fixed-width bit vectors; arithmetic wraps. Widths above
//! 64 bits are not representable by this library.

use std::any::Any;

use crate::binary::{BinaryFlags, BinaryNormalForm, BinaryOperator, ReductionPath};
use crate::error::IrError;
use crate::graph::normal_form::NormalForm;
use crate::graph::{Graph, Origin};
use crate::operator::{Operator, OperatorClass};
use crate::types::Type;

fn value_mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

/// The constant value produced by `origin`, when its producer is a
/// [`BitConstant`].
pub fn constant_value(graph: &Graph, origin: Origin) -> Option<(u32, u64)> {
    let producer = origin.producer()?;
    graph
        .kind(producer)
        .operator()?
        .as_any()
        .downcast_ref::<BitConstant>()
        .map(|constant| (constant.width(), constant.value()))
}

#[derive(Debug, Clone)]
pub struct BitConstant {
    width: u32,
    value: u64,
    result_types: Vec<Type>,
}

impl BitConstant {
    pub fn new(width: u32, value: u64) -> Self {
        BitConstant {
            width,
            value: value & value_mask(width),
            result_types: vec![Type::Bits(width)],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn value(&self) -> u64 {
        self.value
    }
}

impl Operator for BitConstant {
    fn operand_types(&self) -> &[Type] {
        &[]
    }

    fn result_types(&self) -> &[Type] {
        &self.result_types
    }

    fn debug_string(&self) -> String {
        format!("bits{}({})", self.width, self.value)
    }

    fn eq_operator(&self, other: &dyn Operator) -> bool {
        other
            .as_any()
            .downcast_ref::<BitConstant>()
            .map(|other| self.width == other.width && self.value == other.value)
            .unwrap_or(false)
    }

    fn copy_operator(&self) -> Box<dyn Operator> {
        Box::new(self.clone())
    }

    fn class(&self) -> OperatorClass {
        OperatorClass::of::<BitConstant>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

macro_rules! binary_operator_boilerplate {
    ($name:ident, $label:expr) => {
        impl $name {
            pub fn new(width: u32) -> Self {
                $name {
                    width,
                    operand_types: vec![Type::Bits(width); 2],
                    result_types: vec![Type::Bits(width)],
                }
            }

            pub fn width(&self) -> u32 {
                self.width
            }
        }

        impl Operator for $name {
            fn operand_types(&self) -> &[Type] {
                &self.operand_types
            }

            fn result_types(&self) -> &[Type] {
                &self.result_types
            }

            fn debug_string(&self) -> String {
                format!("{}{}", $label, self.width)
            }

            fn eq_operator(&self, other: &dyn Operator) -> bool {
                other
                    .as_any()
                    .downcast_ref::<$name>()
                    .map(|other| self.width == other.width)
                    .unwrap_or(false)
            }

            fn copy_operator(&self) -> Box<dyn Operator> {
                Box::new(self.clone())
            }

            fn class(&self) -> OperatorClass {
                OperatorClass::of::<$name>()
            }

            fn default_normal_form(&self) -> Box<dyn NormalForm> {
                Box::new(BinaryNormalForm::default())
            }

            fn as_any(&self) -> &dyn Any {
                self
            }

            fn as_binary(&self) -> Option<&dyn BinaryOperator> {
                Some(self)
            }
        }
    };
}

/// Wrapping addition; associative and commutative with neutral zero.
#[derive(Debug, Clone)]
pub struct BitAdd {
    width: u32,
    operand_types: Vec<Type>,
    result_types: Vec<Type>,
}

binary_operator_boilerplate!(BitAdd, "bitadd");

impl BinaryOperator for BitAdd {
    fn flags(&self) -> BinaryFlags {
        BinaryFlags::ASSOCIATIVE_COMMUTATIVE
    }

    fn can_reduce_operand_pair(
        &self,
        graph: &Graph,
        op1: Origin,
        op2: Origin,
    ) -> Option<ReductionPath> {
        match (constant_value(graph, op1), constant_value(graph, op2)) {
            (Some(_), Some(_)) => Some(ReductionPath::Constants),
            (Some((_, 0)), _) => Some(ReductionPath::LNeutral),
            (_, Some((_, 0))) => Some(ReductionPath::RNeutral),
            _ => None,
        }
    }

    fn reduce_operand_pair(
        &self,
        graph: &mut Graph,
        path: ReductionPath,
        op1: Origin,
        op2: Origin,
    ) -> Result<Origin, IrError> {
        match path {
            ReductionPath::Constants => fold_constants(graph, op1, op2, u64::wrapping_add),
            ReductionPath::LNeutral => Ok(op2),
            ReductionPath::RNeutral => Ok(op1),
            _ => Err(IrError::invariant("unsupported reduction path for bitadd")),
        }
    }

    fn copy_binary(&self) -> Box<dyn BinaryOperator> {
        Box::new(self.clone())
    }

    fn as_operator(&self) -> &dyn Operator {
        self
    }
}

/// Wrapping multiplication; associative and commutative with neutral
/// one and absorbing zero.
#[derive(Debug, Clone)]
pub struct BitMul {
    width: u32,
    operand_types: Vec<Type>,
    result_types: Vec<Type>,
}

binary_operator_boilerplate!(BitMul, "bitmul");

impl BinaryOperator for BitMul {
    fn flags(&self) -> BinaryFlags {
        BinaryFlags::ASSOCIATIVE_COMMUTATIVE
    }

    fn can_reduce_operand_pair(
        &self,
        graph: &Graph,
        op1: Origin,
        op2: Origin,
    ) -> Option<ReductionPath> {
        match (constant_value(graph, op1), constant_value(graph, op2)) {
            (Some(_), Some(_)) => Some(ReductionPath::Constants),
            (Some((_, 1)), _) => Some(ReductionPath::LNeutral),
            (_, Some((_, 1))) => Some(ReductionPath::RNeutral),
            // Zero absorbs the other operand entirely.
            (Some((_, 0)), _) | (_, Some((_, 0))) => Some(ReductionPath::Merge),
            _ => None,
        }
    }

    fn reduce_operand_pair(
        &self,
        graph: &mut Graph,
        path: ReductionPath,
        op1: Origin,
        op2: Origin,
    ) -> Result<Origin, IrError> {
        match path {
            ReductionPath::Constants => fold_constants(graph, op1, op2, u64::wrapping_mul),
            ReductionPath::LNeutral => Ok(op2),
            ReductionPath::RNeutral => Ok(op1),
            ReductionPath::Merge => match constant_value(graph, op1) {
                Some((_, 0)) => Ok(op1),
                _ => Ok(op2),
            },
            _ => Err(IrError::invariant("unsupported reduction path for bitmul")),
        }
    }

    fn copy_binary(&self) -> Box<dyn BinaryOperator> {
        Box::new(self.clone())
    }

    fn as_operator(&self) -> &dyn Operator {
        self
    }
}

/// Wrapping subtraction; neither associative nor commutative.
#[derive(Debug, Clone)]
pub struct BitSub {
    width: u32,
    operand_types: Vec<Type>,
    result_types: Vec<Type>,
}

binary_operator_boilerplate!(BitSub, "bitsub");

impl BinaryOperator for BitSub {
    fn can_reduce_operand_pair(
        &self,
        graph: &Graph,
        op1: Origin,
        op2: Origin,
    ) -> Option<ReductionPath> {
        match (constant_value(graph, op1), constant_value(graph, op2)) {
            (Some(_), Some(_)) => Some(ReductionPath::Constants),
            (_, Some((_, 0))) => Some(ReductionPath::RNeutral),
            _ => None,
        }
    }

    fn reduce_operand_pair(
        &self,
        graph: &mut Graph,
        path: ReductionPath,
        op1: Origin,
        op2: Origin,
    ) -> Result<Origin, IrError> {
        match path {
            ReductionPath::Constants => fold_constants(graph, op1, op2, u64::wrapping_sub),
            ReductionPath::RNeutral => Ok(op1),
            _ => Err(IrError::invariant("unsupported reduction path for bitsub")),
        }
    }

    fn copy_binary(&self) -> Box<dyn BinaryOperator> {
        Box::new(self.clone())
    }

    fn as_operator(&self) -> &dyn Operator {
        self
    }
}

fn fold_constants(
    graph: &mut Graph,
    op1: Origin,
    op2: Origin,
    fold: fn(u64, u64) -> u64,
) -> Result<Origin, IrError> {
    match (constant_value(graph, op1), constant_value(graph, op2)) {
        (Some((width, a)), Some((_, b))) => {
            let region = graph.origin_region(op1);
            let folded = fold(a, b) & value_mask(width);
            let outputs =
                graph.add_simple_node(region, Box::new(BitConstant::new(width, folded)), &[])?;
            Ok(outputs[0])
        }
        _ => Err(IrError::invariant(
            "constants reduction without constant operands",
        )),
    }
}

/// Signed less-than comparison producing a single bit.
#[derive(Debug, Clone)]
pub struct BitSlt {
    width: u32,
    operand_types: Vec<Type>,
    result_types: Vec<Type>,
}

impl BitSlt {
    pub fn new(width: u32) -> Self {
        BitSlt {
            width,
            operand_types: vec![Type::Bits(width); 2],
            result_types: vec![Type::Bits(1)],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }
}

impl Operator for BitSlt {
    fn operand_types(&self) -> &[Type] {
        &self.operand_types
    }

    fn result_types(&self) -> &[Type] {
        &self.result_types
    }

    fn debug_string(&self) -> String {
        format!("bitslt{}", self.width)
    }

    fn eq_operator(&self, other: &dyn Operator) -> bool {
        other
            .as_any()
            .downcast_ref::<BitSlt>()
            .map(|other| self.width == other.width)
            .unwrap_or(false)
    }

    fn copy_operator(&self) -> Box<dyn Operator> {
        Box::new(self.clone())
    }

    fn class(&self) -> OperatorClass {
        OperatorClass::of::<BitSlt>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphImport, Linkage};

    #[test]
    fn test_constant_masks_to_width() {
        let constant = BitConstant::new(8, 0x1ff);
        assert_eq!(constant.value(), 0xff);
    }

    #[test]
    fn test_neutral_element_reduction() {
        let mut graph = Graph::new();
        let x = graph.add_import(GraphImport {
            name: "x".into(),
            linkage: Linkage::External,
            ty: Type::Bits(16),
        });
        let root = graph.root();
        let zero = graph
            .add_simple_node(root, Box::new(BitConstant::new(16, 0)), &[])
            .unwrap();
        let sum = graph
            .add_simple_node(root, Box::new(BitAdd::new(16)), &[zero[0], x])
            .unwrap();
        assert_eq!(sum[0], x);
    }

    #[test]
    fn test_multiplication_absorbs_zero() {
        let mut graph = Graph::new();
        let x = graph.add_import(GraphImport {
            name: "x".into(),
            linkage: Linkage::External,
            ty: Type::Bits(16),
        });
        let root = graph.root();
        let zero = graph
            .add_simple_node(root, Box::new(BitConstant::new(16, 0)), &[])
            .unwrap();
        let product = graph
            .add_simple_node(root, Box::new(BitMul::new(16)), &[x, zero[0]])
            .unwrap();
        assert_eq!(product[0], zero[0]);
    }

    #[test]
    fn test_subtraction_folds_constants() {
        let mut graph = Graph::new();
        let root = graph.root();
        let five = graph
            .add_simple_node(root, Box::new(BitConstant::new(32, 5)), &[])
            .unwrap();
        let three = graph
            .add_simple_node(root, Box::new(BitConstant::new(32, 3)), &[])
            .unwrap();
        let diff = graph
            .add_simple_node(root, Box::new(BitSub::new(32)), &[five[0], three[0]])
            .unwrap();
        let producer = diff[0].producer().unwrap();
        let constant = graph
            .kind(producer)
            .operator()
            .unwrap()
            .as_any()
            .downcast_ref::<BitConstant>()
            .unwrap();
        assert_eq!(constant.value(), 2);
    }
}
