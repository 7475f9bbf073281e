//! δ nodes: global data definitions.
//!
//! A δ node owns one subregion that evaluates to the initializer of a
//! global; its single output is a pointer to the initialized value.
//! Like λ, closed-over values enter through context variables; unlike
//! λ there are no formal parameters and exactly one result.

use crate::error::IrError;
use crate::graph::{Graph, Linkage, Node, NodeKind, Origin, Region};
use crate::types::Type;

#[derive(Debug)]
pub struct DeltaData {
    pub(crate) subregion: Region,
    pub(crate) name: String,
    pub(crate) linkage: Linkage,
    pub(crate) section: Option<String>,
    pub(crate) constant: bool,
    pub(crate) value_type: Type,
    pub(crate) n_ctx: usize,
    pub(crate) finalized: bool,
}

impl Graph {
    fn delta_data(&self, node: Node) -> &DeltaData {
        match &self.node(node).kind {
            NodeKind::Delta(data) => data,
            _ => panic!("{} is not a delta node", node),
        }
    }

    /// Create a global definition of `value_type`.
    pub fn add_delta(
        &mut self,
        region: Region,
        name: impl Into<String>,
        value_type: Type,
        linkage: Linkage,
        constant: bool,
    ) -> Result<Node, IrError> {
        let node = self.create_structural_node(
            region,
            NodeKind::Delta(DeltaData {
                subregion: Region(u32::MAX),
                name: name.into(),
                linkage,
                section: None,
                constant,
                value_type,
                n_ctx: 0,
                finalized: false,
            }),
            &[],
        )?;
        let sub = self.alloc_region(Some(node));
        match &mut self.node_mut(node).kind {
            NodeKind::Delta(data) => data.subregion = sub,
            _ => unreachable!(),
        }
        Ok(node)
    }

    pub fn delta_subregion(&self, delta: Node) -> Region {
        self.delta_data(delta).subregion
    }

    pub fn delta_name(&self, delta: Node) -> &str {
        &self.delta_data(delta).name
    }

    pub fn delta_linkage(&self, delta: Node) -> Linkage {
        self.delta_data(delta).linkage
    }

    pub fn delta_section(&self, delta: Node) -> Option<&str> {
        self.delta_data(delta).section.as_deref()
    }

    pub fn delta_is_constant(&self, delta: Node) -> bool {
        self.delta_data(delta).constant
    }

    pub fn delta_value_type(&self, delta: Node) -> &Type {
        &self.delta_data(delta).value_type
    }

    pub fn delta_n_ctx_vars(&self, delta: Node) -> usize {
        self.delta_data(delta).n_ctx
    }

    pub fn delta_set_section(&mut self, delta: Node, section: impl Into<String>) {
        match &mut self.node_mut(delta).kind {
            NodeKind::Delta(data) => data.section = Some(section.into()),
            _ => panic!("{} is not a delta node", delta),
        }
    }

    pub fn delta_ctx_argument(&self, delta: Node, index: usize) -> Origin {
        let data = self.delta_data(delta);
        debug_assert!(index < data.n_ctx);
        Origin::Argument {
            region: data.subregion,
            index,
        }
    }

    pub fn delta_add_ctx_var(&mut self, delta: Node, origin: Origin) -> Result<Origin, IrError> {
        let ty = self.origin_type(origin).clone();
        self.push_input(delta, origin, ty.clone())?;
        let sub = self.delta_subregion(delta);
        let argument = self.push_argument(sub, ty);
        match &mut self.node_mut(delta).kind {
            NodeKind::Delta(data) => data.n_ctx += 1,
            _ => unreachable!(),
        }
        Ok(argument)
    }

    /// Bind the initializer and materialize the pointer output.
    pub fn delta_finalize(&mut self, delta: Node, initializer: Origin) -> Result<Origin, IrError> {
        let data = self.delta_data(delta);
        if data.finalized {
            return Err(IrError::invariant("delta is already finalized"));
        }
        let sub = data.subregion;
        let value_type = data.value_type.clone();
        self.check_origin(sub, initializer, &value_type)?;
        self.push_result(sub, initializer)?;
        match &mut self.node_mut(delta).kind {
            NodeKind::Delta(data) => data.finalized = true,
            _ => unreachable!(),
        }
        Ok(self.push_output(delta, Type::Pointer))
    }

    pub fn delta_output(&self, delta: Node) -> Origin {
        self.output(delta, 0)
    }
}

/// Drop unused context variables, then prune the initializer region.
pub(crate) fn prune_delta(graph: &mut Graph, delta: Node) -> Result<usize, IrError> {
    let sub = graph.delta_subregion(delta);
    for index in (0..graph.delta_n_ctx_vars(delta)).rev() {
        let argument = Origin::Argument {
            region: sub,
            index,
        };
        if !graph.users(argument).is_empty() {
            continue;
        }
        graph.remove_input(delta, index);
        graph.remove_argument(sub, index)?;
        match &mut graph.node_mut(delta).kind {
            NodeKind::Delta(data) => data.n_ctx -= 1,
            _ => unreachable!(),
        }
    }
    graph.prune_region(sub)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::bitstring::BitConstant;

    #[test]
    fn test_delta_construction() {
        let mut graph = Graph::new();
        let root = graph.root();
        let delta = graph
            .add_delta(root, "answer", Type::Bits(32), Linkage::Internal, true)
            .unwrap();
        let sub = graph.delta_subregion(delta);
        let value = graph
            .add_simple_node(sub, Box::new(BitConstant::new(32, 42)), &[])
            .unwrap();
        let out = graph.delta_finalize(delta, value[0]).unwrap();
        graph.add_export(out, "answer").unwrap();

        assert_eq!(graph.origin_type(out), &Type::Pointer);
        assert!(graph.delta_is_constant(delta));
        assert_eq!(graph.delta_section(delta), None);
    }

    #[test]
    fn test_initializer_type_is_checked() {
        let mut graph = Graph::new();
        let root = graph.root();
        let delta = graph
            .add_delta(root, "g", Type::Bits(64), Linkage::External, false)
            .unwrap();
        let sub = graph.delta_subregion(delta);
        let narrow = graph
            .add_simple_node(sub, Box::new(BitConstant::new(32, 1)), &[])
            .unwrap();
        let err = graph.delta_finalize(delta, narrow[0]).unwrap_err();
        assert!(matches!(err, IrError::TypeMismatch { .. }));
    }
}
