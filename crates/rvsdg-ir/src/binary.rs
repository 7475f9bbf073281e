//! Binary operators and their flattened n-ary form.
//!
//! A binary operator takes exactly two operands of one type; operators
//! flagged associative additionally admit a *flattened* rendition, a
//! virtual n-ary node wrapping the same operator. Flattening turns
//! right-leaning chains `a ⊕ (b ⊕ c)` into `⊕ᶠ(a, b, c)`, which
//! exposes pairwise reductions and, for commutative operators,
//! canonical operand reordering.

use crate::error::IrError;
use crate::graph::normal_form::{
    cse_node, find_congruent_node, NormalForm, NormalFormFlags,
};
use crate::graph::{Graph, Node, NodeKind, Origin, Region};
use crate::operator::{Operator, OperatorClass};
use crate::types::Type;

/// Algebraic flags carried by a binary operator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BinaryFlags {
    pub associative: bool,
    pub commutative: bool,
}

impl BinaryFlags {
    pub const NONE: BinaryFlags = BinaryFlags {
        associative: false,
        commutative: false,
    };
    pub const ASSOCIATIVE: BinaryFlags = BinaryFlags {
        associative: true,
        commutative: false,
    };
    pub const COMMUTATIVE: BinaryFlags = BinaryFlags {
        associative: false,
        commutative: true,
    };
    pub const ASSOCIATIVE_COMMUTATIVE: BinaryFlags = BinaryFlags {
        associative: true,
        commutative: true,
    };
}

/// How an operand pair can be simplified.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReductionPath {
    /// Both operands are constants.
    Constants,
    /// Both operands merge into a single, simpler form.
    Merge,
    /// Part of the left operand folds into the right.
    LFold,
    /// Part of the right operand folds into the left.
    RFold,
    /// The left operand is the neutral element.
    LNeutral,
    /// The right operand is the neutral element.
    RNeutral,
    /// Both operands share a form that factors over the operator.
    Factor,
}

/// Capability trait for binary operators.
///
/// `can_reduce_operand_pair` classifies a pair without mutating the
/// graph; `reduce_operand_pair` performs the classified rewrite and
/// returns the replacement origin. A hook that offers a path must be
/// able to take it; reductions never fail.
pub trait BinaryOperator: Operator {
    fn flags(&self) -> BinaryFlags {
        BinaryFlags::NONE
    }

    fn can_reduce_operand_pair(
        &self,
        graph: &Graph,
        op1: Origin,
        op2: Origin,
    ) -> Option<ReductionPath>;

    fn reduce_operand_pair(
        &self,
        graph: &mut Graph,
        path: ReductionPath,
        op1: Origin,
        op2: Origin,
    ) -> Result<Origin, IrError>;

    fn copy_binary(&self) -> Box<dyn BinaryOperator>;

    /// Upcast to the base capability (no trait upcasting on the MSRV).
    fn as_operator(&self) -> &dyn Operator;

    fn is_associative(&self) -> bool {
        self.flags().associative
    }

    fn is_commutative(&self) -> bool {
        self.flags().commutative
    }
}

/// A virtual n-ary node wrapping an associative binary operator.
#[derive(Debug)]
pub struct FlattenedBinary {
    op: Box<dyn BinaryOperator>,
    operand_types: Vec<Type>,
    result_types: Vec<Type>,
}

impl FlattenedBinary {
    /// Wrap `op` with `narguments` operand ports. Fails with
    /// [`IrError::UnreducibleOperator`] when `op` is not associative.
    pub fn new(op: &dyn BinaryOperator, narguments: usize) -> Result<Self, IrError> {
        if !op.is_associative() {
            return Err(IrError::UnreducibleOperator {
                operator: op.debug_string(),
            });
        }
        let operand_ty = op.operand_types()[0].clone();
        let result_ty = op.result_types()[0].clone();
        Ok(FlattenedBinary {
            op: op.copy_binary(),
            operand_types: vec![operand_ty; narguments],
            result_types: vec![result_ty],
        })
    }

    /// The wrapped binary operator.
    pub fn operation(&self) -> &dyn BinaryOperator {
        self.op.as_ref()
    }
}

impl Operator for FlattenedBinary {
    fn operand_types(&self) -> &[Type] {
        &self.operand_types
    }

    fn result_types(&self) -> &[Type] {
        &self.result_types
    }

    fn debug_string(&self) -> String {
        format!(
            "flattened_{}[{}]",
            self.op.debug_string(),
            self.operand_types.len()
        )
    }

    fn eq_operator(&self, other: &dyn Operator) -> bool {
        other
            .as_any()
            .downcast_ref::<FlattenedBinary>()
            .map(|other| {
                self.operand_types.len() == other.operand_types.len()
                    && self.op.eq_operator(other.op.as_operator())
            })
            .unwrap_or(false)
    }

    fn copy_operator(&self) -> Box<dyn Operator> {
        Box::new(FlattenedBinary {
            op: self.op.copy_binary(),
            operand_types: self.operand_types.clone(),
            result_types: self.result_types.clone(),
        })
    }

    fn class(&self) -> OperatorClass {
        OperatorClass::of::<FlattenedBinary>()
    }

    fn default_normal_form(&self) -> Box<dyn NormalForm> {
        Box::new(FlattenedBinaryNormalForm::default())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// Evaluation order for collapsing a flattened node back into binary
/// applications.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlattenedReduction {
    /// Left fold: `((a ⊕ b) ⊕ c) ⊕ d`.
    Linear,
    /// Balanced tree: `(a ⊕ b) ⊕ (c ⊕ d)`.
    Parallel,
}

// ---- flattening helpers ------------------------------------------------

/// The operand list of `origin`'s producer, when that producer applies
/// an operator congruent with `op` (either the binary itself or a
/// flattened wrapping of it).
fn chain_operands(graph: &Graph, op: &dyn BinaryOperator, origin: Origin) -> Option<Vec<Origin>> {
    let producer = origin.producer()?;
    let candidate = graph.kind(producer).operator()?;
    if let Some(flattened) = candidate.as_any().downcast_ref::<FlattenedBinary>() {
        if flattened.operation().eq_operator(op.as_operator()) {
            return Some(graph.operands(producer));
        }
        return None;
    }
    if candidate.eq_operator(op.as_operator()) {
        return Some(graph.operands(producer));
    }
    None
}

/// Expand `operands` by splicing in congruent producer chains until a
/// fixpoint. Returns `None` when nothing expands.
fn expand_operands(
    graph: &Graph,
    op: &dyn BinaryOperator,
    operands: &[Origin],
) -> Option<Vec<Origin>> {
    let mut current = operands.to_vec();
    let mut expanded_any = false;
    loop {
        let mut next = Vec::with_capacity(current.len());
        let mut changed = false;
        for origin in &current {
            match chain_operands(graph, op, *origin) {
                Some(inner) => {
                    next.extend(inner);
                    changed = true;
                }
                None => next.push(*origin),
            }
        }
        current = next;
        if !changed {
            break;
        }
        expanded_any = true;
    }
    expanded_any.then_some(current)
}

/// Collapse `operands` under `op` into a single origin, applying
/// pairwise reductions in the requested order and materializing binary
/// nodes for irreducible pairs.
pub fn reduce_flattened_operands(
    graph: &mut Graph,
    region: Region,
    op: &dyn BinaryOperator,
    operands: &[Origin],
    reduction: FlattenedReduction,
) -> Result<Origin, IrError> {
    if operands.is_empty() {
        return Err(IrError::ArityMismatch {
            what: op.debug_string(),
            expected: 1,
            actual: 0,
        });
    }
    let apply_pair =
        |graph: &mut Graph, a: Origin, b: Origin| -> Result<Origin, IrError> {
            if let Some(path) = op.can_reduce_operand_pair(graph, a, b) {
                op.reduce_operand_pair(graph, path, a, b)
            } else {
                let outputs = graph.add_simple_node(region, op.copy_operator(), &[a, b])?;
                Ok(outputs[0])
            }
        };
    match reduction {
        FlattenedReduction::Linear => {
            let mut acc = operands[0];
            for &next in &operands[1..] {
                acc = apply_pair(graph, acc, next)?;
            }
            Ok(acc)
        }
        FlattenedReduction::Parallel => {
            let mut layer = operands.to_vec();
            while layer.len() > 1 {
                let mut next = Vec::with_capacity(layer.len().div_ceil(2));
                let mut chunks = layer.chunks_exact(2);
                for pair in chunks.by_ref() {
                    next.push(apply_pair(graph, pair[0], pair[1])?);
                }
                next.extend(chunks.remainder().iter().copied());
                layer = next;
            }
            Ok(layer[0])
        }
    }
}

/// Replace every flattened binary node in `region` (and nested regions)
/// by the equivalent chain of binary applications. Returns the number
/// of replaced nodes.
///
/// Callers normally disable the `flatten` toggle on the wrapped
/// operator's normal form first, otherwise the freshly built chain
/// re-flattens on creation.
pub fn reduce_flattened(
    graph: &mut Graph,
    region: Region,
    reduction: FlattenedReduction,
) -> Result<usize, IrError> {
    let mut count = 0;
    let order = graph.topological_order(region);
    for node in order {
        if !graph.is_alive(node) {
            continue;
        }
        for sub in graph.kind(node).subregions() {
            count += reduce_flattened(graph, sub, reduction)?;
        }
        let inner = match graph.kind(node) {
            NodeKind::Simple(op) => match op.as_any().downcast_ref::<FlattenedBinary>() {
                Some(flattened) => flattened.operation().copy_binary(),
                None => continue,
            },
            _ => continue,
        };
        let operands = graph.operands(node);
        let node_region = graph.region_of(node);
        let replacement =
            reduce_flattened_operands(graph, node_region, inner.as_ref(), &operands, reduction)?;
        let out = graph.output(node, 0);
        graph.divert_users(out, replacement)?;
        graph.remove_node(node)?;
        count += 1;
    }
    log::trace!("unflattened {} nodes in {}", count, region);
    Ok(count)
}

// ---- normal forms ------------------------------------------------------

/// Normal form for binary operator classes.
#[derive(Debug)]
pub struct BinaryNormalForm {
    flags: NormalFormFlags,
    pub reducible: bool,
    pub flatten: bool,
    pub reorder: bool,
    pub distribute: bool,
    pub factorize: bool,
}

impl Default for BinaryNormalForm {
    fn default() -> Self {
        BinaryNormalForm {
            flags: NormalFormFlags::default(),
            reducible: true,
            flatten: true,
            reorder: true,
            // Off by default: only meaningful when the distributing and
            // distributed-over operators declare mutual compatibility,
            // which no built-in operator pair does.
            distribute: false,
            factorize: false,
        }
    }
}

impl BinaryNormalForm {
    pub fn set_reducible(&mut self, enable: bool) {
        self.reducible = enable;
    }

    pub fn set_flatten(&mut self, enable: bool) {
        self.flatten = enable;
    }

    pub fn set_reorder(&mut self, enable: bool) {
        self.reorder = enable;
    }

    pub fn set_distribute(&mut self, enable: bool) {
        self.distribute = enable;
    }

    pub fn set_factorize(&mut self, enable: bool) {
        self.factorize = enable;
    }
}

impl NormalForm for BinaryNormalForm {
    fn flags(&self) -> &NormalFormFlags {
        &self.flags
    }

    fn flags_mut(&mut self) -> &mut NormalFormFlags {
        &mut self.flags
    }

    fn normalized_create(
        &self,
        graph: &mut Graph,
        region: Region,
        op: Box<dyn Operator>,
        operands: &[Origin],
    ) -> Result<Vec<Origin>, IrError> {
        if operands.len() != 2 {
            return Err(IrError::ArityMismatch {
                what: op.debug_string(),
                expected: 2,
                actual: operands.len(),
            });
        }
        for (operand, ty) in operands.iter().zip(op.operand_types()) {
            graph.check_origin(region, *operand, ty)?;
        }
        let bop = match op.as_binary() {
            Some(bop) => bop.copy_binary(),
            None => {
                let node = graph.create_simple_node(region, op, operands)?;
                return Ok(graph.outputs(node));
            }
        };
        if !self.flags.mutable {
            let node = graph.create_simple_node(region, op, operands)?;
            return Ok(graph.outputs(node));
        }

        let (a, b) = (operands[0], operands[1]);
        if self.reducible {
            if let Some(path) = bop.can_reduce_operand_pair(graph, a, b) {
                let replacement = bop.reduce_operand_pair(graph, path, a, b)?;
                return Ok(vec![replacement]);
            }
        }
        if self.flatten && bop.is_associative() {
            if let Some(expanded) = expand_operands(graph, bop.as_ref(), operands) {
                let flattened = FlattenedBinary::new(bop.as_ref(), expanded.len())?;
                return graph.add_simple_node(region, Box::new(flattened), &expanded);
            }
        }
        let mut pair = [a, b];
        if self.reorder && bop.is_commutative() {
            pair.sort();
        }
        if self.flags.cse {
            if let Some(existing) = find_congruent_node(graph, region, op.as_ref(), &pair) {
                return Ok(graph.outputs(existing));
            }
        }
        let node = graph.create_simple_node(region, op, &pair)?;
        Ok(graph.outputs(node))
    }

    fn normalize_node(&self, graph: &mut Graph, node: Node) -> Result<bool, IrError> {
        if !self.flags.mutable {
            return Ok(false);
        }
        let bop = match graph.kind(node).operator().and_then(|op| op.as_binary()) {
            Some(bop) => bop.copy_binary(),
            None => return Ok(false),
        };
        let operands = graph.operands(node);
        let region = graph.region_of(node);

        if self.flatten && bop.is_associative() {
            if let Some(expanded) = expand_operands(graph, bop.as_ref(), &operands) {
                let flattened = FlattenedBinary::new(bop.as_ref(), expanded.len())?;
                let outputs = graph.add_simple_node(region, Box::new(flattened), &expanded)?;
                let out = graph.output(node, 0);
                graph.divert_users(out, outputs[0])?;
                graph.remove_node(node)?;
                return Ok(true);
            }
        }
        if self.reducible {
            if let Some(path) = bop.can_reduce_operand_pair(graph, operands[0], operands[1]) {
                let replacement =
                    bop.reduce_operand_pair(graph, path, operands[0], operands[1])?;
                let out = graph.output(node, 0);
                if out != replacement {
                    graph.divert_users(out, replacement)?;
                    graph.remove_node(node)?;
                    return Ok(true);
                }
            }
        }
        if self.reorder && bop.is_commutative() {
            let mut sorted = [operands[0], operands[1]];
            sorted.sort();
            if sorted != [operands[0], operands[1]] {
                for (index, origin) in sorted.iter().enumerate() {
                    graph.rebind(
                        crate::graph::User::Input {
                            consumer: node,
                            index,
                        },
                        *origin,
                    )?;
                }
                return Ok(true);
            }
        }
        if self.flags.cse {
            return cse_node(graph, node);
        }
        Ok(false)
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

/// Normal form for the flattened binary class.
#[derive(Debug)]
pub struct FlattenedBinaryNormalForm {
    flags: NormalFormFlags,
    pub reorder: bool,
}

impl Default for FlattenedBinaryNormalForm {
    fn default() -> Self {
        FlattenedBinaryNormalForm {
            flags: NormalFormFlags::default(),
            reorder: true,
        }
    }
}

impl FlattenedBinaryNormalForm {
    pub fn set_reorder(&mut self, enable: bool) {
        self.reorder = enable;
    }
}

impl NormalForm for FlattenedBinaryNormalForm {
    fn flags(&self) -> &NormalFormFlags {
        &self.flags
    }

    fn flags_mut(&mut self) -> &mut NormalFormFlags {
        &mut self.flags
    }

    fn normalized_create(
        &self,
        graph: &mut Graph,
        region: Region,
        op: Box<dyn Operator>,
        operands: &[Origin],
    ) -> Result<Vec<Origin>, IrError> {
        let flattened = match op.as_any().downcast_ref::<FlattenedBinary>() {
            Some(flattened) if self.flags.mutable => flattened,
            _ => {
                let node = graph.create_simple_node(region, op, operands)?;
                return Ok(graph.outputs(node));
            }
        };
        if operands.len() != op.narguments() {
            return Err(IrError::ArityMismatch {
                what: op.debug_string(),
                expected: op.narguments(),
                actual: operands.len(),
            });
        }
        for (operand, ty) in operands.iter().zip(op.operand_types()) {
            graph.check_origin(region, *operand, ty)?;
        }
        let inner = flattened.operation().copy_binary();
        let mut expanded = expand_operands(graph, inner.as_ref(), operands)
            .unwrap_or_else(|| operands.to_vec());
        // A flattened node of arity one is its operand.
        if expanded.len() == 1 {
            return Ok(vec![expanded[0]]);
        }
        if self.reorder && inner.is_commutative() {
            expanded.sort();
        }
        let op: Box<dyn Operator> = if expanded.len() == operands.len() {
            op
        } else {
            Box::new(FlattenedBinary::new(inner.as_ref(), expanded.len())?)
        };
        if self.flags.cse {
            if let Some(existing) = find_congruent_node(graph, region, op.as_ref(), &expanded) {
                return Ok(graph.outputs(existing));
            }
        }
        let node = graph.create_simple_node(region, op, &expanded)?;
        Ok(graph.outputs(node))
    }

    fn normalize_node(&self, graph: &mut Graph, node: Node) -> Result<bool, IrError> {
        if !self.flags.mutable {
            return Ok(false);
        }
        let inner = match graph.kind(node).operator() {
            Some(op) => match op.as_any().downcast_ref::<FlattenedBinary>() {
                Some(flattened) => flattened.operation().copy_binary(),
                None => return Ok(false),
            },
            None => return Ok(false),
        };
        let operands = graph.operands(node);
        if operands.len() == 1 {
            let out = graph.output(node, 0);
            graph.divert_users(out, operands[0])?;
            graph.remove_node(node)?;
            return Ok(true);
        }
        if let Some(expanded) = expand_operands(graph, inner.as_ref(), &operands) {
            let region = graph.region_of(node);
            let flattened = FlattenedBinary::new(inner.as_ref(), expanded.len())?;
            let outputs = graph.add_simple_node(region, Box::new(flattened), &expanded)?;
            let out = graph.output(node, 0);
            graph.divert_users(out, outputs[0])?;
            graph.remove_node(node)?;
            return Ok(true);
        }
        if self.reorder && inner.is_commutative() {
            let mut sorted = operands.clone();
            sorted.sort();
            if sorted != operands {
                for (index, origin) in sorted.iter().enumerate() {
                    graph.rebind(
                        crate::graph::User::Input {
                            consumer: node,
                            index,
                        },
                        *origin,
                    )?;
                }
                return Ok(true);
            }
        }
        if self.flags.cse {
            return cse_node(graph, node);
        }
        Ok(false)
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphImport, Linkage};
    use crate::ops::bitstring::{BitAdd, BitConstant, BitSub};

    fn import(graph: &mut Graph, name: &str) -> Origin {
        graph.add_import(GraphImport {
            name: name.into(),
            linkage: Linkage::External,
            ty: Type::Bits(32),
        })
    }

    #[test]
    fn test_flattening_collapses_chains() {
        let mut graph = Graph::new();
        let a = import(&mut graph, "a");
        let b = import(&mut graph, "b");
        let c = import(&mut graph, "c");
        let root = graph.root();
        let inner = graph
            .add_simple_node(root, Box::new(BitAdd::new(32)), &[b, c])
            .unwrap();
        let outer = graph
            .add_simple_node(root, Box::new(BitAdd::new(32)), &[a, inner[0]])
            .unwrap();
        let producer = outer[0].producer().unwrap();
        let op = graph.kind(producer).operator().unwrap();
        let flattened = op.as_any().downcast_ref::<FlattenedBinary>().unwrap();
        assert_eq!(flattened.narguments(), 3);
    }

    #[test]
    fn test_flattened_arity_one_reduces_to_operand() {
        let mut graph = Graph::new();
        let a = import(&mut graph, "a");
        let root = graph.root();
        let add = BitAdd::new(32);
        let flattened = FlattenedBinary::new(&add, 1).unwrap();
        let outputs = graph
            .add_simple_node(root, Box::new(flattened), &[a])
            .unwrap();
        assert_eq!(outputs[0], a);
    }

    #[test]
    fn test_non_associative_operator_cannot_flatten() {
        let sub = BitSub::new(32);
        let err = FlattenedBinary::new(&sub, 3).unwrap_err();
        assert!(matches!(err, IrError::UnreducibleOperator { .. }));
    }

    #[test]
    fn test_unflatten_linear_builds_chain() {
        let mut graph = Graph::new();
        let a = import(&mut graph, "a");
        let b = import(&mut graph, "b");
        let c = import(&mut graph, "c");
        let root = graph.root();
        let inner = graph
            .add_simple_node(root, Box::new(BitAdd::new(32)), &[b, c])
            .unwrap();
        let outer = graph
            .add_simple_node(root, Box::new(BitAdd::new(32)), &[a, inner[0]])
            .unwrap();
        graph.add_export(outer[0], "sum").unwrap();

        graph
            .normal_form::<BinaryNormalForm>(OperatorClass::of::<BitAdd>())
            .set_flatten(false);
        let replaced = reduce_flattened(&mut graph, root, FlattenedReduction::Linear).unwrap();
        assert_eq!(replaced, 1);
        graph.prune().unwrap();
        // Only binary adds remain.
        for node in graph.region_nodes(root) {
            let op = graph.kind(*node).operator().unwrap();
            assert!(op.as_any().downcast_ref::<FlattenedBinary>().is_none());
            assert_eq!(op.narguments(), 2);
        }
    }

    #[test]
    fn test_constant_folding_on_creation() {
        let mut graph = Graph::new();
        let root = graph.root();
        let one = graph
            .add_simple_node(root, Box::new(BitConstant::new(32, 1)), &[])
            .unwrap();
        let two = graph
            .add_simple_node(root, Box::new(BitConstant::new(32, 2)), &[])
            .unwrap();
        let sum = graph
            .add_simple_node(root, Box::new(BitAdd::new(32)), &[one[0], two[0]])
            .unwrap();
        let producer = sum[0].producer().unwrap();
        let op = graph.kind(producer).operator().unwrap();
        let constant = op.as_any().downcast_ref::<BitConstant>().unwrap();
        assert_eq!(constant.value(), 3);
    }
}
