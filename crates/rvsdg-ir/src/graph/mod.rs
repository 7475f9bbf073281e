//! The graph container and region mechanics.
//!
//! A [`Graph`] owns a root region plus arenas for every node and
//! region reachable from it. Regions form a strict hierarchy: each
//! region belongs to exactly one structural node, except the root,
//! which belongs to the graph. Within a region the producer→consumer
//! relation is a DAG; recursion exists only through φ nodes, whose
//! cycles close across the argument/result mapping rather than through
//! edges.

pub mod copy;
pub mod delta;
pub mod gamma;
pub mod lambda;
mod linkage;
mod node;
pub mod normal_form;
pub mod optimization;
pub mod phi;
pub mod theta;
pub mod validation;

use std::collections::HashSet;

pub use linkage::Linkage;
pub use node::{Node, NodeKind, Origin, Region, User};

pub(crate) use node::{InputPort, NodeData, OutputPort};

use crate::error::IrError;
use crate::operator::Operator;
use crate::types::Type;

use normal_form::NormalFormRegistry;

/// A root-region argument pre-bound to an external symbol.
#[derive(Clone, Debug, PartialEq)]
pub struct GraphImport {
    pub name: String,
    pub linkage: Linkage,
    pub ty: Type,
}

/// A root-region result naming a root to preserve across pruning.
#[derive(Clone, Debug, PartialEq)]
pub struct GraphExport {
    pub name: String,
}

#[derive(Debug)]
pub(crate) struct RegionData {
    pub owner: Option<Node>,
    /// Nodes in creation order.
    pub nodes: Vec<Node>,
    pub arguments: Vec<OutputPort>,
    pub results: Vec<InputPort>,
}

/// The top-level IR container.
///
/// All mutation goes through `&mut self`, so the single-mutator
/// discipline of the IR falls out of the borrow rules: no iterator
/// into a region can be live across a mutation.
pub struct Graph {
    nodes: Vec<Option<NodeData>>,
    regions: Vec<Option<RegionData>>,
    root: Region,
    pub(crate) normal_forms: NormalFormRegistry,
    imports: Vec<GraphImport>,
    exports: Vec<GraphExport>,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    pub fn new() -> Self {
        let mut graph = Graph {
            nodes: Vec::new(),
            regions: Vec::new(),
            root: Region(0),
            normal_forms: NormalFormRegistry::new(),
            imports: Vec::new(),
            exports: Vec::new(),
        };
        graph.root = graph.alloc_region(None);
        graph
    }

    pub fn root(&self) -> Region {
        self.root
    }

    // ---- arena access -------------------------------------------------

    pub(crate) fn node(&self, node: Node) -> &NodeData {
        self.nodes[node.index()]
            .as_ref()
            .expect("stale node handle")
    }

    pub(crate) fn node_mut(&mut self, node: Node) -> &mut NodeData {
        self.nodes[node.index()]
            .as_mut()
            .expect("stale node handle")
    }

    pub(crate) fn region_data(&self, region: Region) -> &RegionData {
        self.regions[region.index()]
            .as_ref()
            .expect("stale region handle")
    }

    pub(crate) fn region_data_mut(&mut self, region: Region) -> &mut RegionData {
        self.regions[region.index()]
            .as_mut()
            .expect("stale region handle")
    }

    pub(crate) fn alloc_region(&mut self, owner: Option<Node>) -> Region {
        let region = Region(self.regions.len() as u32);
        self.regions.push(Some(RegionData {
            owner,
            nodes: Vec::new(),
            arguments: Vec::new(),
            results: Vec::new(),
        }));
        region
    }

    pub(crate) fn alloc_node(&mut self, data: NodeData) -> Node {
        let node = Node(self.nodes.len() as u32);
        let region = data.region;
        self.nodes.push(Some(data));
        self.region_data_mut(region).nodes.push(node);
        node
    }

    /// Whether `node` is a live handle.
    pub fn is_alive(&self, node: Node) -> bool {
        self.nodes
            .get(node.index())
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }

    pub fn is_region_alive(&self, region: Region) -> bool {
        self.regions
            .get(region.index())
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }

    // ---- read access --------------------------------------------------

    pub fn kind(&self, node: Node) -> &NodeKind {
        &self.node(node).kind
    }

    pub fn region_of(&self, node: Node) -> Region {
        self.node(node).region
    }

    pub fn n_inputs(&self, node: Node) -> usize {
        self.node(node).inputs.len()
    }

    pub fn n_outputs(&self, node: Node) -> usize {
        self.node(node).outputs.len()
    }

    /// The origin bound to input `index` of `node`.
    pub fn operand(&self, node: Node, index: usize) -> Origin {
        self.node(node).inputs[index].origin
    }

    pub fn operands(&self, node: Node) -> Vec<Origin> {
        self.node(node).inputs.iter().map(|i| i.origin).collect()
    }

    pub fn input_type(&self, node: Node, index: usize) -> &Type {
        &self.node(node).inputs[index].ty
    }

    /// Output `index` of `node` as an origin.
    pub fn output(&self, node: Node, index: usize) -> Origin {
        debug_assert!(index < self.n_outputs(node));
        Origin::Output {
            producer: node,
            index,
        }
    }

    pub fn outputs(&self, node: Node) -> Vec<Origin> {
        (0..self.n_outputs(node)).map(|i| self.output(node, i)).collect()
    }

    pub fn origin_type(&self, origin: Origin) -> &Type {
        &self.origin_port(origin).ty
    }

    pub fn origin_region(&self, origin: Origin) -> Region {
        match origin {
            Origin::Output { producer, .. } => self.node(producer).region,
            Origin::Argument { region, .. } => region,
        }
    }

    pub fn users(&self, origin: Origin) -> &[User] {
        &self.origin_port(origin).users
    }

    pub fn n_users(&self, origin: Origin) -> usize {
        self.users(origin).len()
    }

    pub fn region_nodes(&self, region: Region) -> &[Node] {
        &self.region_data(region).nodes
    }

    pub fn region_owner(&self, region: Region) -> Option<Node> {
        self.region_data(region).owner
    }

    pub fn n_arguments(&self, region: Region) -> usize {
        self.region_data(region).arguments.len()
    }

    pub fn n_results(&self, region: Region) -> usize {
        self.region_data(region).results.len()
    }

    pub fn argument_type(&self, region: Region, index: usize) -> &Type {
        &self.region_data(region).arguments[index].ty
    }

    pub fn argument(&self, region: Region, index: usize) -> Origin {
        debug_assert!(index < self.n_arguments(region));
        Origin::Argument { region, index }
    }

    pub fn result_origin(&self, region: Region, index: usize) -> Origin {
        self.region_data(region).results[index].origin
    }

    pub fn result_type(&self, region: Region, index: usize) -> &Type {
        &self.region_data(region).results[index].ty
    }

    pub fn imports(&self) -> &[GraphImport] {
        &self.imports
    }

    pub fn exports(&self) -> &[GraphExport] {
        &self.exports
    }

    // ---- port plumbing ------------------------------------------------

    pub(crate) fn origin_port(&self, origin: Origin) -> &OutputPort {
        match origin {
            Origin::Output { producer, index } => &self.node(producer).outputs[index],
            Origin::Argument { region, index } => &self.region_data(region).arguments[index],
        }
    }

    pub(crate) fn origin_port_mut(&mut self, origin: Origin) -> &mut OutputPort {
        match origin {
            Origin::Output { producer, index } => &mut self.node_mut(producer).outputs[index],
            Origin::Argument { region, index } => &mut self.region_data_mut(region).arguments[index],
        }
    }

    pub(crate) fn user_origin(&self, user: User) -> Origin {
        match user {
            User::Input { consumer, index } => self.node(consumer).inputs[index].origin,
            User::Result { region, index } => self.region_data(region).results[index].origin,
        }
    }

    fn set_user_origin(&mut self, user: User, origin: Origin) {
        match user {
            User::Input { consumer, index } => {
                self.node_mut(consumer).inputs[index].origin = origin;
            }
            User::Result { region, index } => {
                self.region_data_mut(region).results[index].origin = origin;
            }
        }
    }

    pub(crate) fn link(&mut self, origin: Origin, user: User) {
        self.origin_port_mut(origin).users.push(user);
    }

    pub(crate) fn unlink(&mut self, origin: Origin, user: User) {
        let users = &mut self.origin_port_mut(origin).users;
        if let Some(pos) = users.iter().position(|u| *u == user) {
            users.remove(pos);
        }
    }

    /// Rewrite the stored identity of a user entry in its origin's list.
    pub(crate) fn replace_user_entry(&mut self, origin: Origin, old: User, new: User) {
        let users = &mut self.origin_port_mut(origin).users;
        if let Some(pos) = users.iter().position(|u| *u == old) {
            users[pos] = new;
        }
    }

    pub(crate) fn check_origin(
        &self,
        region: Region,
        origin: Origin,
        expected: &Type,
    ) -> Result<(), IrError> {
        let found = self.origin_region(origin);
        if found != region {
            return Err(IrError::RegionMismatch {
                expected: region.index(),
                found: found.index(),
            });
        }
        let ty = self.origin_type(origin);
        if ty != expected {
            return Err(IrError::TypeMismatch {
                expected: expected.clone(),
                found: ty.clone(),
            });
        }
        Ok(())
    }

    /// Rebind a single consumer site to a new origin of the same region
    /// and type.
    pub fn rebind(&mut self, user: User, to: Origin) -> Result<(), IrError> {
        let old = self.user_origin(user);
        if old == to {
            return Ok(());
        }
        let region = self.origin_region(old);
        let ty = self.origin_type(old).clone();
        self.check_origin(region, to, &ty)?;
        self.unlink(old, user);
        self.set_user_origin(user, to);
        self.link(to, user);
        Ok(())
    }

    /// Divert every consumer of `from` to `to`, preserving the fan-out
    /// of `to`. Returns the number of rebound consumers.
    pub fn divert_users(&mut self, from: Origin, to: Origin) -> Result<usize, IrError> {
        if from == to {
            return Ok(0);
        }
        let region = self.origin_region(from);
        let ty = self.origin_type(from).clone();
        self.check_origin(region, to, &ty)?;
        let users = std::mem::take(&mut self.origin_port_mut(from).users);
        let count = users.len();
        for user in users {
            self.set_user_origin(user, to);
            self.link(to, user);
        }
        Ok(count)
    }

    // ---- region arguments and results ---------------------------------

    /// Append an argument to a non-root region. Root-region arguments
    /// are created through [`Graph::add_import`] only.
    pub fn add_argument(&mut self, region: Region, ty: Type) -> Result<Origin, IrError> {
        if region == self.root {
            return Err(IrError::invariant(
                "root-region arguments are created via add_import",
            ));
        }
        Ok(self.push_argument(region, ty))
    }

    pub(crate) fn push_argument(&mut self, region: Region, ty: Type) -> Origin {
        let data = self.region_data_mut(region);
        let index = data.arguments.len();
        data.arguments.push(OutputPort::new(ty));
        Origin::Argument { region, index }
    }

    /// Append a result to a non-root region, bound to `origin`. The
    /// result type is the origin's type. Root-region results are
    /// created through [`Graph::add_export`] only.
    pub fn add_result(&mut self, region: Region, origin: Origin) -> Result<usize, IrError> {
        if region == self.root {
            return Err(IrError::invariant(
                "root-region results are created via add_export",
            ));
        }
        self.push_result(region, origin)
    }

    pub(crate) fn push_result(&mut self, region: Region, origin: Origin) -> Result<usize, IrError> {
        let found = self.origin_region(origin);
        if found != region {
            return Err(IrError::RegionMismatch {
                expected: region.index(),
                found: found.index(),
            });
        }
        let ty = self.origin_type(origin).clone();
        let data = self.region_data_mut(region);
        let index = data.results.len();
        data.results.push(InputPort { ty, origin });
        self.link(origin, User::Result { region, index });
        Ok(index)
    }

    /// Declare an external symbol as a root-region argument.
    pub fn add_import(&mut self, import: GraphImport) -> Origin {
        let ty = import.ty.clone();
        self.imports.push(import);
        self.push_argument(self.root, ty)
    }

    /// Mark `origin` as an export root, preserving it across pruning.
    pub fn add_export(&mut self, origin: Origin, name: impl Into<String>) -> Result<usize, IrError> {
        let root = self.root;
        let found = self.origin_region(origin);
        if found != root {
            return Err(IrError::RegionMismatch {
                expected: root.index(),
                found: found.index(),
            });
        }
        self.exports.push(GraphExport { name: name.into() });
        self.push_result(root, origin)
    }

    /// Insert an argument at `index`, shifting later arguments up and
    /// renumbering their consumers.
    pub(crate) fn insert_argument(&mut self, region: Region, index: usize, ty: Type) -> Origin {
        let data = self.region_data_mut(region);
        data.arguments.insert(index, OutputPort::new(ty));
        let n = data.arguments.len();
        for i in index + 1..n {
            let users = self.region_data(region).arguments[i].users.clone();
            for user in users {
                self.set_user_origin(user, Origin::Argument { region, index: i });
            }
        }
        Origin::Argument { region, index }
    }

    /// Remove an unused argument, renumbering later arguments.
    pub(crate) fn remove_argument(&mut self, region: Region, index: usize) -> Result<(), IrError> {
        if !self.region_data(region).arguments[index].users.is_empty() {
            return Err(IrError::invariant(format!(
                "argument {} of {} still has users",
                index, region
            )));
        }
        self.region_data_mut(region).arguments.remove(index);
        let n = self.region_data(region).arguments.len();
        for i in index..n {
            let users = self.region_data(region).arguments[i].users.clone();
            for user in users {
                self.set_user_origin(user, Origin::Argument { region, index: i });
            }
        }
        Ok(())
    }

    /// Remove a result, renumbering later results.
    pub(crate) fn remove_result(&mut self, region: Region, index: usize) {
        let origin = self.region_data(region).results[index].origin;
        self.unlink(origin, User::Result { region, index });
        self.region_data_mut(region).results.remove(index);
        let n = self.region_data(region).results.len();
        for i in index..n {
            let origin = self.region_data(region).results[i].origin;
            self.replace_user_entry(
                origin,
                User::Result {
                    region,
                    index: i + 1,
                },
                User::Result { region, index: i },
            );
        }
    }

    /// Remove an input port, renumbering later inputs.
    pub(crate) fn remove_input(&mut self, node: Node, index: usize) {
        let origin = self.node(node).inputs[index].origin;
        self.unlink(
            origin,
            User::Input {
                consumer: node,
                index,
            },
        );
        self.node_mut(node).inputs.remove(index);
        let n = self.node(node).inputs.len();
        for i in index..n {
            let origin = self.node(node).inputs[i].origin;
            self.replace_user_entry(
                origin,
                User::Input {
                    consumer: node,
                    index: i + 1,
                },
                User::Input {
                    consumer: node,
                    index: i,
                },
            );
        }
    }

    /// Remove an unused output port, renumbering later outputs.
    pub(crate) fn remove_output(&mut self, node: Node, index: usize) -> Result<(), IrError> {
        if !self.node(node).outputs[index].users.is_empty() {
            return Err(IrError::invariant(format!(
                "output {} of {} still has users",
                index, node
            )));
        }
        self.node_mut(node).outputs.remove(index);
        let n = self.node(node).outputs.len();
        for i in index..n {
            let users = self.node(node).outputs[i].users.clone();
            for user in users {
                self.set_user_origin(
                    user,
                    Origin::Output {
                        producer: node,
                        index: i,
                    },
                );
            }
        }
        Ok(())
    }

    // ---- node creation ------------------------------------------------

    /// Create a simple node wrapping `op`, consulting the operator
    /// class's normal form. The returned origins are the outputs the
    /// caller should use; they may belong to an existing node (CSE) or
    /// to a reduced replacement instead of a fresh node.
    pub fn add_simple_node(
        &mut self,
        region: Region,
        op: Box<dyn Operator>,
        operands: &[Origin],
    ) -> Result<Vec<Origin>, IrError> {
        normal_form::normalized_create(self, region, op, operands)
    }

    /// Materialize a simple node without consulting normal forms.
    pub(crate) fn create_simple_node(
        &mut self,
        region: Region,
        op: Box<dyn Operator>,
        operands: &[Origin],
    ) -> Result<Node, IrError> {
        if op.narguments() != operands.len() {
            return Err(IrError::ArityMismatch {
                what: op.debug_string(),
                expected: op.narguments(),
                actual: operands.len(),
            });
        }
        for (operand, ty) in operands.iter().zip(op.operand_types()) {
            self.check_origin(region, *operand, ty)?;
        }

        let inputs = operands
            .iter()
            .zip(op.operand_types())
            .map(|(origin, ty)| InputPort {
                ty: ty.clone(),
                origin: *origin,
            })
            .collect();
        let outputs = op
            .result_types()
            .iter()
            .map(|ty| OutputPort::new(ty.clone()))
            .collect();
        let node = self.alloc_node(NodeData {
            region,
            kind: NodeKind::Simple(op),
            inputs,
            outputs,
        });
        for (index, operand) in operands.iter().enumerate() {
            self.link(
                *operand,
                User::Input {
                    consumer: node,
                    index,
                },
            );
        }
        Ok(node)
    }

    /// Allocate a structural node shell with validated inputs.
    pub(crate) fn create_structural_node(
        &mut self,
        region: Region,
        kind: NodeKind,
        operands: &[(Origin, Type)],
    ) -> Result<Node, IrError> {
        for (origin, ty) in operands {
            self.check_origin(region, *origin, ty)?;
        }
        let inputs = operands
            .iter()
            .map(|(origin, ty)| InputPort {
                ty: ty.clone(),
                origin: *origin,
            })
            .collect();
        let node = self.alloc_node(NodeData {
            region,
            kind,
            inputs,
            outputs: Vec::new(),
        });
        for (index, (origin, _)) in operands.iter().enumerate() {
            self.link(
                *origin,
                User::Input {
                    consumer: node,
                    index,
                },
            );
        }
        Ok(node)
    }

    /// Append an input port to an existing node (structural mappings).
    pub(crate) fn push_input(&mut self, node: Node, origin: Origin, ty: Type) -> Result<usize, IrError> {
        let region = self.node(node).region;
        self.check_origin(region, origin, &ty)?;
        let index = self.node(node).inputs.len();
        self.node_mut(node).inputs.push(InputPort { ty, origin });
        self.link(
            origin,
            User::Input {
                consumer: node,
                index,
            },
        );
        Ok(index)
    }

    /// Append an output port to an existing node (structural mappings).
    pub(crate) fn push_output(&mut self, node: Node, ty: Type) -> Origin {
        let index = self.node(node).outputs.len();
        self.node_mut(node).outputs.push(OutputPort::new(ty));
        Origin::Output {
            producer: node,
            index,
        }
    }

    // ---- node removal -------------------------------------------------

    /// Remove a node whose outputs are all unused. Subregions of
    /// structural nodes are destroyed recursively.
    pub fn remove_node(&mut self, node: Node) -> Result<(), IrError> {
        for (index, port) in self.node(node).outputs.iter().enumerate() {
            if !port.users.is_empty() {
                return Err(IrError::invariant(format!(
                    "cannot remove {}: output {} still has users",
                    node, index
                )));
            }
        }
        for index in 0..self.node(node).inputs.len() {
            let origin = self.node(node).inputs[index].origin;
            self.unlink(
                origin,
                User::Input {
                    consumer: node,
                    index,
                },
            );
        }
        for sub in self.node(node).kind.subregions() {
            self.destroy_region(sub);
        }
        let region = self.node(node).region;
        self.region_data_mut(region).nodes.retain(|n| *n != node);
        self.nodes[node.index()] = None;
        Ok(())
    }

    fn destroy_region(&mut self, region: Region) {
        let nodes = std::mem::take(&mut self.region_data_mut(region).nodes);
        for node in nodes {
            for sub in self.node(node).kind.subregions() {
                self.destroy_region(sub);
            }
            self.nodes[node.index()] = None;
        }
        self.regions[region.index()] = None;
    }

    // ---- traversal ----------------------------------------------------

    /// Nodes of `region` in a stable topological order: a node is
    /// emitted once all of its intra-region producers are emitted, ties
    /// broken by creation order.
    pub fn topological_order(&self, region: Region) -> Vec<Node> {
        match self.try_topological_order(region) {
            Ok(order) => order,
            // A cyclic region can only arise from a misuse of rebind;
            // emit the placeable prefix, then the remainder in creation
            // order so traversal still terminates. Validation reports
            // the cycle.
            Err(mut partial) => {
                let placed: HashSet<Node> = partial.iter().copied().collect();
                for node in &self.region_data(region).nodes {
                    if !placed.contains(node) {
                        partial.push(*node);
                    }
                }
                partial
            }
        }
    }

    /// Topological order, or the partial order as the error value when
    /// the region contains a cycle.
    pub(crate) fn try_topological_order(&self, region: Region) -> Result<Vec<Node>, Vec<Node>> {
        let nodes = &self.region_data(region).nodes;
        let mut placed: HashSet<Node> = HashSet::new();
        let mut order = Vec::with_capacity(nodes.len());
        loop {
            let mut progressed = false;
            for node in nodes {
                if placed.contains(node) {
                    continue;
                }
                let ready = self.node(*node).inputs.iter().all(|input| {
                    match input.origin {
                        Origin::Output { producer, .. } => placed.contains(&producer),
                        Origin::Argument { .. } => true,
                    }
                });
                if ready {
                    placed.insert(*node);
                    order.push(*node);
                    progressed = true;
                }
            }
            if order.len() == nodes.len() {
                return Ok(order);
            }
            if !progressed {
                return Err(order);
            }
        }
    }

    // ---- normalization ------------------------------------------------

    /// Apply every enabled normal form and structural reduction across
    /// the whole graph until a fixpoint is reached. Returns the number
    /// of rewrites applied.
    pub fn normalize(&mut self) -> Result<usize, IrError> {
        let mut total = 0;
        loop {
            let changed = self.normalize_region(self.root)?;
            total += changed;
            if changed == 0 {
                break;
            }
        }
        Ok(total)
    }

    pub(crate) fn normalize_region(&mut self, region: Region) -> Result<usize, IrError> {
        let mut changed = 0;
        let order = self.topological_order(region);
        for node in order {
            if !self.is_alive(node) {
                continue;
            }
            for sub in self.node(node).kind.subregions() {
                changed += self.normalize_region(sub)?;
            }
            match &self.node(node).kind {
                NodeKind::Simple(op) => {
                    let class = op.class();
                    if normal_form::normalize_simple(self, class, node)? {
                        changed += 1;
                    }
                }
                NodeKind::Gamma(_) => {
                    if gamma::normalize_gamma(self, node)? {
                        changed += 1;
                    }
                }
                NodeKind::Theta(_) => {
                    if theta::normalize_theta(self, node)? {
                        changed += 1;
                    }
                }
                _ => {}
            }
        }
        Ok(changed)
    }

    // ---- pruning ------------------------------------------------------

    /// Remove every node not reachable from a region result or a
    /// side-effect anchor, across all regions. Returns the number of
    /// removed nodes.
    pub fn prune(&mut self) -> Result<usize, IrError> {
        let removed = self.prune_region(self.root)?;
        log::debug!("prune removed {} nodes", removed);
        Ok(removed)
    }

    /// Prune a single region and, recursively, the subregions of its
    /// surviving structural nodes.
    pub fn prune_region(&mut self, region: Region) -> Result<usize, IrError> {
        let mut marked: HashSet<Node> = HashSet::new();
        let mut worklist: Vec<Node> = Vec::new();

        for index in 0..self.n_results(region) {
            if let Some(producer) = self.result_origin(region, index).producer() {
                if marked.insert(producer) {
                    worklist.push(producer);
                }
            }
        }
        for node in self.region_data(region).nodes.clone() {
            if self.is_side_effect_anchor(node) && marked.insert(node) {
                worklist.push(node);
            }
        }
        while let Some(node) = worklist.pop() {
            for input in &self.node(node).inputs {
                if let Some(producer) = input.origin.producer() {
                    if marked.insert(producer) {
                        worklist.push(producer);
                    }
                }
            }
        }

        let order = self.topological_order(region);
        let mut removed = 0;
        for node in order.iter().rev() {
            if !marked.contains(node) {
                self.remove_node(*node)?;
                removed += 1;
            }
        }

        for node in order {
            if !self.is_alive(node) {
                continue;
            }
            removed += match self.node(node).kind {
                NodeKind::Gamma(_) => gamma::prune_gamma(self, node)?,
                NodeKind::Theta(_) => theta::prune_theta(self, node)?,
                NodeKind::Lambda(_) => lambda::prune_lambda(self, node)?,
                NodeKind::Delta(_) => delta::prune_delta(self, node)?,
                NodeKind::Phi(_) => phi::prune_phi(self, node)?,
                NodeKind::Simple(_) => 0,
            };
        }
        Ok(removed)
    }

    /// Whether `node` must survive pruning regardless of uses: a simple
    /// node with a side-effecting operator, or a structural node
    /// containing one.
    pub fn is_side_effect_anchor(&self, node: Node) -> bool {
        match &self.node(node).kind {
            NodeKind::Simple(op) => op.has_side_effects(),
            kind => kind
                .subregions()
                .iter()
                .any(|sub| self.region_has_anchor(*sub)),
        }
    }

    fn region_has_anchor(&self, region: Region) -> bool {
        self.region_data(region)
            .nodes
            .iter()
            .any(|node| self.is_side_effect_anchor(*node))
    }
}
