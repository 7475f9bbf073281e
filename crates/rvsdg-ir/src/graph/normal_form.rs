//! The normal-form framework.
//!
//! Every operator class has a normal form registered on the graph; it
//! is consulted on node creation ([`Graph::add_simple_node`]) and by
//! [`Graph::normalize`]. The default behavior constructs the requested
//! node; concrete normal forms may reuse an existing node (CSE), build
//! a reduced replacement, or rewrite an existing node in place.
//!
//! Unregistered classes receive a default on first use: a
//! [`BinaryNormalForm`](crate::binary::BinaryNormalForm) when the
//! operator reports binary capability, otherwise a
//! [`SimpleNormalForm`].

use std::any::Any;

use indexmap::IndexMap;

use crate::error::IrError;
use crate::operator::{Operator, OperatorClass};

use super::{Graph, Node, NodeKind, Origin, Region};

/// Toggles shared by every normal form.
///
/// With `mutable` off, passes must not rewrite nodes of this class and
/// `add_simple_node` materializes the requested node unchanged.
#[derive(Clone, Copy, Debug)]
pub struct NormalFormFlags {
    pub mutable: bool,
    pub cse: bool,
}

impl Default for NormalFormFlags {
    fn default() -> Self {
        NormalFormFlags {
            mutable: true,
            cse: true,
        }
    }
}

/// Behavior record attached to one operator class.
pub trait NormalForm: Any {
    fn flags(&self) -> &NormalFormFlags;

    fn flags_mut(&mut self) -> &mut NormalFormFlags;

    /// Create (or reuse, or reduce away) a node for `op` over
    /// `operands`, returning the origins the caller should consume.
    fn normalized_create(
        &self,
        graph: &mut Graph,
        region: Region,
        op: Box<dyn Operator>,
        operands: &[Origin],
    ) -> Result<Vec<Origin>, IrError>;

    /// Rewrite an existing node of this class. Returns whether the
    /// graph changed.
    fn normalize_node(&self, graph: &mut Graph, node: Node) -> Result<bool, IrError>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn set_mutable(&mut self, enable: bool)
    where
        Self: Sized,
    {
        self.flags_mut().mutable = enable;
    }

    fn set_cse(&mut self, enable: bool)
    where
        Self: Sized,
    {
        self.flags_mut().cse = enable;
    }
}

/// Default normal form: plain construction with common-subexpression
/// reuse.
#[derive(Debug, Default)]
pub struct SimpleNormalForm {
    flags: NormalFormFlags,
}

impl NormalForm for SimpleNormalForm {
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
        if self.flags.mutable && self.flags.cse {
            if let Some(existing) = find_congruent_node(graph, region, op.as_ref(), operands) {
                return Ok(graph.outputs(existing));
            }
        }
        let node = graph.create_simple_node(region, op, operands)?;
        Ok(graph.outputs(node))
    }

    fn normalize_node(&self, graph: &mut Graph, node: Node) -> Result<bool, IrError> {
        if !self.flags.mutable || !self.flags.cse {
            return Ok(false);
        }
        cse_node(graph, node)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Find an existing simple node in `region` equal to `op` applied to
/// `operands` (same operator, identical operand origins), skipping
/// `node` itself when given.
pub(crate) fn find_congruent_node_except(
    graph: &Graph,
    region: Region,
    op: &dyn Operator,
    operands: &[Origin],
    except: Option<Node>,
) -> Option<Node> {
    for candidate in graph.region_nodes(region) {
        if Some(*candidate) == except {
            continue;
        }
        let data = graph.kind(*candidate);
        let other = match data.operator() {
            Some(other) => other,
            None => continue,
        };
        if !op.eq_operator(other) {
            continue;
        }
        if graph.operands(*candidate) == operands {
            return Some(*candidate);
        }
    }
    None
}

pub(crate) fn find_congruent_node(
    graph: &Graph,
    region: Region,
    op: &dyn Operator,
    operands: &[Origin],
) -> Option<Node> {
    find_congruent_node_except(graph, region, op, operands, None)
}

/// Merge `node` into an earlier congruent node, if any. Returns whether
/// a merge happened.
pub(crate) fn cse_node(graph: &mut Graph, node: Node) -> Result<bool, IrError> {
    let region = graph.region_of(node);
    let operands = graph.operands(node);
    let existing = {
        let op = match graph.kind(node).operator() {
            Some(op) => op,
            None => return Ok(false),
        };
        find_congruent_node_except(graph, region, op, &operands, Some(node))
    };
    let existing = match existing {
        Some(existing) => existing,
        None => return Ok(false),
    };
    for index in 0..graph.n_outputs(node) {
        let from = graph.output(node, index);
        let to = graph.output(existing, index);
        graph.divert_users(from, to)?;
    }
    graph.remove_node(node)?;
    Ok(true)
}

/// Registry mapping operator classes to their normal forms.
///
/// Entries are taken out for the duration of a call so the normal form
/// can mutate the graph; a recursive creation of the *same* class falls
/// back to plain construction, which is sound because reduction hooks
/// emit already-reduced replacements.
pub(crate) struct NormalFormRegistry {
    map: IndexMap<OperatorClass, Box<dyn NormalForm>>,
}

impl NormalFormRegistry {
    pub(crate) fn new() -> Self {
        NormalFormRegistry {
            map: IndexMap::new(),
        }
    }

    fn take(&mut self, class: OperatorClass) -> Option<Box<dyn NormalForm>> {
        self.map.shift_remove(&class)
    }

    fn put(&mut self, class: OperatorClass, nf: Box<dyn NormalForm>) {
        self.map.insert(class, nf);
    }
}

impl Graph {
    /// The normal form registered for `class`, creating `N::default()`
    /// when absent.
    ///
    /// # Panics
    ///
    /// Panics if the class is registered with a different normal-form
    /// type (a programmer error).
    pub fn normal_form<N: NormalForm + Default>(&mut self, class: OperatorClass) -> &mut N {
        let entry = self
            .normal_forms
            .map
            .entry(class)
            .or_insert_with(|| Box::new(N::default()));
        entry
            .as_any_mut()
            .downcast_mut::<N>()
            .expect("operator class registered with a different normal form")
    }

    /// Register (or replace) the normal form for `class`.
    pub fn register_normal_form(&mut self, class: OperatorClass, nf: Box<dyn NormalForm>) {
        self.normal_forms.put(class, nf);
    }
}

pub(crate) fn normalized_create(
    graph: &mut Graph,
    region: Region,
    op: Box<dyn Operator>,
    operands: &[Origin],
) -> Result<Vec<Origin>, IrError> {
    let class = op.class();
    match graph.normal_forms.take(class) {
        Some(nf) => {
            let result = nf.normalized_create(graph, region, op, operands);
            graph.normal_forms.put(class, nf);
            result
        }
        None => {
            let nf = op.default_normal_form();
            let result = nf.normalized_create(graph, region, op, operands);
            graph.normal_forms.put(class, nf);
            result
        }
    }
}

pub(crate) fn normalize_simple(
    graph: &mut Graph,
    class: OperatorClass,
    node: Node,
) -> Result<bool, IrError> {
    let nf = match graph.normal_forms.take(class) {
        Some(nf) => nf,
        None => match &graph.node(node).kind {
            NodeKind::Simple(op) => op.default_normal_form(),
            _ => return Ok(false),
        },
    };
    let result = nf.normalize_node(graph, node);
    graph.normal_forms.put(class, nf);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphImport, Linkage};
    use crate::ops::bitstring::{BitConstant, BitSub};
    use crate::types::Type;

    #[test]
    fn test_cse_reuses_existing_node() {
        let mut graph = Graph::new();
        let root = graph.root();
        let a = graph
            .add_simple_node(root, Box::new(BitConstant::new(32, 5)), &[])
            .unwrap();
        let b = graph
            .add_simple_node(root, Box::new(BitConstant::new(32, 5)), &[])
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(graph.region_nodes(root).len(), 1);
    }

    #[test]
    fn test_cse_can_be_disabled() {
        let mut graph = Graph::new();
        let class = OperatorClass::of::<BitConstant>();
        graph
            .normal_form::<SimpleNormalForm>(class)
            .flags_mut()
            .cse = false;
        let root = graph.root();
        let a = graph
            .add_simple_node(root, Box::new(BitConstant::new(32, 5)), &[])
            .unwrap();
        let b = graph
            .add_simple_node(root, Box::new(BitConstant::new(32, 5)), &[])
            .unwrap();
        assert_ne!(a, b);
        assert_eq!(graph.region_nodes(root).len(), 2);
    }

    #[test]
    fn test_immutable_normal_form_materializes_requested_node() {
        let mut graph = Graph::new();
        let x = graph.add_import(GraphImport {
            name: "x".into(),
            linkage: Linkage::External,
            ty: Type::Bits(8),
        });
        let class = OperatorClass::of::<BitSub>();
        graph
            .normal_form::<crate::binary::BinaryNormalForm>(class)
            .set_mutable(false);
        let root = graph.root();
        let zero = graph
            .add_simple_node(root, Box::new(BitConstant::new(8, 0)), &[])
            .unwrap();
        // x - 0 would normally reduce to x; with mutable off the node
        // is built as requested.
        let diff = graph
            .add_simple_node(root, Box::new(BitSub::new(8)), &[x, zero[0]])
            .unwrap();
        assert_ne!(diff[0], x);
        assert!(matches!(diff[0], Origin::Output { .. }));
        assert_eq!(graph.region_nodes(root).len(), 2);
    }
}
