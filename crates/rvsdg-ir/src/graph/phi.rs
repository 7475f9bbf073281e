//! φ nodes: mutually recursive definition groups.
//!
//! A φ node's subregion declares *recursion variables*, each of which
//! is simultaneously an argument (so any body may reference any peer)
//! and a result (binding its definition). Each recursion variable
//! projects to one φ output. Recursion-variable arguments occupy
//! indices `0..n_rec`; context-variable arguments follow them.
//!
//! The subregion itself stays acyclic: bodies reference peers through
//! the argument form, so the definitional cycle closes across the
//! argument/result mapping rather than through edges.

use std::collections::HashSet;

use crate::error::IrError;
use crate::graph::{Graph, Node, NodeKind, Origin, Region};
use crate::types::Type;

#[derive(Debug)]
pub struct PhiData {
    pub(crate) subregion: Region,
    pub(crate) rec_types: Vec<Type>,
    pub(crate) definitions: Vec<Option<Origin>>,
    pub(crate) n_ctx: usize,
    pub(crate) finalized: bool,
}

impl Graph {
    fn phi_data(&self, node: Node) -> &PhiData {
        match &self.node(node).kind {
            NodeKind::Phi(data) => data,
            _ => panic!("{} is not a phi node", node),
        }
    }

    pub fn add_phi(&mut self, region: Region) -> Result<Node, IrError> {
        let node = self.create_structural_node(
            region,
            NodeKind::Phi(PhiData {
                subregion: Region(u32::MAX),
                rec_types: Vec::new(),
                definitions: Vec::new(),
                n_ctx: 0,
                finalized: false,
            }),
            &[],
        )?;
        let sub = self.alloc_region(Some(node));
        match &mut self.node_mut(node).kind {
            NodeKind::Phi(data) => data.subregion = sub,
            _ => unreachable!(),
        }
        Ok(node)
    }

    pub fn phi_subregion(&self, phi: Node) -> Region {
        self.phi_data(phi).subregion
    }

    pub fn phi_n_rec_vars(&self, phi: Node) -> usize {
        self.phi_data(phi).rec_types.len()
    }

    pub fn phi_n_ctx_vars(&self, phi: Node) -> usize {
        self.phi_data(phi).n_ctx
    }

    /// Declare a recursion variable of type `ty`; returns its index.
    /// The matching argument is inserted before any context arguments.
    pub fn phi_add_rec_var(&mut self, phi: Node, ty: Type) -> Result<usize, IrError> {
        let data = self.phi_data(phi);
        if data.finalized {
            return Err(IrError::invariant("phi is already finalized"));
        }
        let sub = data.subregion;
        let index = data.rec_types.len();
        self.insert_argument(sub, index, ty.clone());
        match &mut self.node_mut(phi).kind {
            NodeKind::Phi(data) => {
                data.rec_types.push(ty);
                data.definitions.push(None);
            }
            _ => unreachable!(),
        }
        Ok(index)
    }

    /// The self-reference argument of recursion variable `index`.
    pub fn phi_rec_argument(&self, phi: Node, index: usize) -> Origin {
        let data = self.phi_data(phi);
        debug_assert!(index < data.rec_types.len());
        Origin::Argument {
            region: data.subregion,
            index,
        }
    }

    pub fn phi_ctx_argument(&self, phi: Node, index: usize) -> Origin {
        let data = self.phi_data(phi);
        debug_assert!(index < data.n_ctx);
        Origin::Argument {
            region: data.subregion,
            index: data.rec_types.len() + index,
        }
    }

    pub fn phi_add_ctx_var(&mut self, phi: Node, origin: Origin) -> Result<Origin, IrError> {
        let ty = self.origin_type(origin).clone();
        self.push_input(phi, origin, ty.clone())?;
        let sub = self.phi_subregion(phi);
        let argument = self.push_argument(sub, ty);
        match &mut self.node_mut(phi).kind {
            NodeKind::Phi(data) => data.n_ctx += 1,
            _ => unreachable!(),
        }
        Ok(argument)
    }

    /// Bind the definition of recursion variable `index`.
    pub fn phi_set_rec_var(
        &mut self,
        phi: Node,
        index: usize,
        origin: Origin,
    ) -> Result<(), IrError> {
        let data = self.phi_data(phi);
        if data.finalized {
            return Err(IrError::invariant("phi is already finalized"));
        }
        let sub = data.subregion;
        let ty = data.rec_types[index].clone();
        self.check_origin(sub, origin, &ty)?;
        match &mut self.node_mut(phi).kind {
            NodeKind::Phi(data) => data.definitions[index] = Some(origin),
            _ => unreachable!(),
        }
        Ok(())
    }

    /// Check that every recursion variable is defined, bind the results
    /// and materialize one output per recursion variable.
    pub fn phi_finalize(&mut self, phi: Node) -> Result<(), IrError> {
        let data = self.phi_data(phi);
        if data.finalized {
            return Err(IrError::invariant("phi is already finalized"));
        }
        let sub = data.subregion;
        let mut bound = Vec::with_capacity(data.definitions.len());
        for (index, definition) in data.definitions.iter().enumerate() {
            match definition {
                Some(origin) => bound.push(*origin),
                None => {
                    return Err(IrError::invariant(format!(
                        "recursion variable {} has no definition",
                        index
                    )))
                }
            }
        }
        let rec_types = data.rec_types.clone();
        for origin in bound {
            self.push_result(sub, origin)?;
        }
        for ty in rec_types {
            self.push_output(phi, ty);
        }
        match &mut self.node_mut(phi).kind {
            NodeKind::Phi(data) => data.finalized = true,
            _ => unreachable!(),
        }
        Ok(())
    }

    pub fn phi_output(&self, phi: Node, index: usize) -> Origin {
        self.output(phi, index)
    }
}

/// Remove recursion variables that are dead under the mutual-recursion
/// closure, drop unused context variables, then prune the subregion.
///
/// A recursion variable is live when its φ output is consumed, or when
/// the definition cone of a live variable (or a side-effect anchor)
/// references its argument.
pub(crate) fn prune_phi(graph: &mut Graph, phi: Node) -> Result<usize, IrError> {
    let sub = graph.phi_subregion(phi);
    let finalized = match graph.kind(phi) {
        NodeKind::Phi(data) => data.finalized,
        _ => false,
    };
    // A group under construction has no outputs to judge liveness by.
    if !finalized {
        return graph.prune_region(sub);
    }
    let n_rec = graph.phi_n_rec_vars(phi);

    let mut live: Vec<bool> = (0..n_rec)
        .map(|index| graph.n_users(graph.phi_output(phi, index)) > 0)
        .collect();
    loop {
        let marked = mark_from_live_results(graph, phi, sub, &live);
        let mut changed = false;
        let mut note = |origin: Origin, live: &mut Vec<bool>, changed: &mut bool| {
            if let Origin::Argument { region, index } = origin {
                if region == sub && index < n_rec && !live[index] {
                    live[index] = true;
                    *changed = true;
                }
            }
        };
        for (index, is_live) in live.clone().iter().enumerate() {
            if *is_live {
                note(graph.result_origin(sub, index), &mut live, &mut changed);
            }
        }
        for node in &marked {
            for origin in graph.operands(*node) {
                note(origin, &mut live, &mut changed);
            }
        }
        if !changed {
            break;
        }
    }

    // Unbind dead definitions, sweep their cones, then drop the dead
    // mapping entries.
    let dead: Vec<usize> = (0..n_rec).rev().filter(|i| !live[*i]).collect();
    for &index in &dead {
        graph.remove_result(sub, index);
    }
    let removed = graph.prune_region(sub)?;
    for &index in &dead {
        graph.remove_output(phi, index)?;
        graph.remove_argument(sub, index)?;
        match &mut graph.node_mut(phi).kind {
            NodeKind::Phi(data) => {
                data.rec_types.remove(index);
                data.definitions.remove(index);
            }
            _ => unreachable!(),
        }
    }

    for index in (0..graph.phi_n_ctx_vars(phi)).rev() {
        let argument = graph.phi_ctx_argument(phi, index);
        if !graph.users(argument).is_empty() {
            continue;
        }
        graph.remove_input(phi, index);
        if let Origin::Argument { index: arg, .. } = argument {
            graph.remove_argument(sub, arg)?;
        }
        match &mut graph.node_mut(phi).kind {
            NodeKind::Phi(data) => data.n_ctx -= 1,
            _ => unreachable!(),
        }
    }
    Ok(removed)
}

/// Nodes of `sub` reachable from the results of live recursion
/// variables or from side-effect anchors.
fn mark_from_live_results(
    graph: &Graph,
    phi: Node,
    sub: Region,
    live: &[bool],
) -> HashSet<Node> {
    let mut marked: HashSet<Node> = HashSet::new();
    let mut worklist: Vec<Node> = Vec::new();
    let n_rec = graph.phi_n_rec_vars(phi);
    for index in 0..graph.n_results(sub) {
        let rooted = index >= n_rec || live[index];
        if !rooted {
            continue;
        }
        if let Some(producer) = graph.result_origin(sub, index).producer() {
            if marked.insert(producer) {
                worklist.push(producer);
            }
        }
    }
    for node in graph.region_nodes(sub) {
        if graph.is_side_effect_anchor(*node) && marked.insert(*node) {
            worklist.push(*node);
        }
    }
    while let Some(node) = worklist.pop() {
        for origin in graph.operands(node) {
            if let Some(producer) = origin.producer() {
                if marked.insert(producer) {
                    worklist.push(producer);
                }
            }
        }
    }
    marked
}
