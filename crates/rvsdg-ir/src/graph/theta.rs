//! θ nodes: tail-controlled loops.
//!
//! A θ node owns a single subregion with one argument and one result
//! per *loop variable*, plus a `Control(2)` result at position 0, the
//! loop predicate (alternative 1 continues, 0 exits). Arguments are
//! initialized from the node inputs; while the predicate selects
//! continue, they are re-initialized from the corresponding results.
//!
//! Creation seeds the predicate with a constant "exit" token so result
//! 0 is always bound; [`Graph::theta_set_predicate`] diverts it and
//! drops the orphaned seed.

use crate::error::IrError;
use crate::graph::{Graph, Node, NodeKind, Origin, Region, User};
use crate::ops::control::ControlConstant;
use crate::types::Type;

#[derive(Debug)]
pub struct ThetaData {
    pub(crate) subregion: Region,
}

impl Graph {
    fn theta_data(&self, node: Node) -> &ThetaData {
        match &self.node(node).kind {
            NodeKind::Theta(data) => data,
            _ => panic!("{} is not a theta node", node),
        }
    }

    /// Create a θ node with an empty body and a seeded exit predicate.
    pub fn add_theta(&mut self, region: Region) -> Result<Node, IrError> {
        let node = self.create_structural_node(
            region,
            NodeKind::Theta(ThetaData {
                subregion: Region(u32::MAX),
            }),
            &[],
        )?;
        let sub = self.alloc_region(Some(node));
        match &mut self.node_mut(node).kind {
            NodeKind::Theta(data) => data.subregion = sub,
            _ => unreachable!(),
        }
        let seed = self.create_simple_node(sub, Box::new(ControlConstant::new(2, 0)), &[])?;
        let seed_out = self.output(seed, 0);
        self.push_result(sub, seed_out)?;
        Ok(node)
    }

    pub fn theta_subregion(&self, theta: Node) -> Region {
        self.theta_data(theta).subregion
    }

    pub fn theta_n_loop_vars(&self, theta: Node) -> usize {
        self.n_inputs(theta)
    }

    /// Add a loop variable initialized from `init`; returns its index.
    pub fn theta_add_loop_var(&mut self, theta: Node, init: Origin) -> Result<usize, IrError> {
        let ty = self.origin_type(init).clone();
        let index = self.push_input(theta, init, ty.clone())?;
        let sub = self.theta_subregion(theta);
        let argument = self.push_argument(sub, ty.clone());
        let result = self.push_result(sub, argument)?;
        debug_assert_eq!(result, index + 1);
        self.push_output(theta, ty);
        Ok(index)
    }

    /// The body-side argument of loop variable `index`.
    pub fn theta_argument(&self, theta: Node, index: usize) -> Origin {
        let sub = self.theta_subregion(theta);
        debug_assert!(index < self.n_arguments(sub));
        Origin::Argument { region: sub, index }
    }

    pub fn theta_output(&self, theta: Node, index: usize) -> Origin {
        self.output(theta, index)
    }

    /// The origin currently bound as the continuation predicate.
    pub fn theta_predicate(&self, theta: Node) -> Origin {
        self.result_origin(self.theta_subregion(theta), 0)
    }

    /// Bind the body result of loop variable `index`.
    pub fn theta_set_loop_var_result(
        &mut self,
        theta: Node,
        index: usize,
        origin: Origin,
    ) -> Result<(), IrError> {
        let sub = self.theta_subregion(theta);
        self.rebind(
            User::Result {
                region: sub,
                index: index + 1,
            },
            origin,
        )
    }

    /// Bind the continuation predicate (result 0 of the body). The
    /// seeded constant is removed once it has no remaining consumers.
    pub fn theta_set_predicate(&mut self, theta: Node, origin: Origin) -> Result<(), IrError> {
        let sub = self.theta_subregion(theta);
        self.check_origin(sub, origin, &Type::Control(2))?;
        let old = self.result_origin(sub, 0);
        if old == origin {
            return Ok(());
        }
        self.rebind(User::Result { region: sub, index: 0 }, origin)?;
        if let Some(producer) = old.producer() {
            let orphaned_seed = self
                .kind(producer)
                .operator()
                .map(|op| op.as_any().is::<ControlConstant>())
                .unwrap_or(false)
                && self.outputs(producer).iter().all(|out| self.n_users(*out) == 0);
            if orphaned_seed {
                self.remove_node(producer)?;
            }
        }
        Ok(())
    }
}

/// θ invariance lifting: a loop variable whose body result is its own
/// argument is routed around the loop, and deleted entirely once
/// nothing inside the body reads it.
pub fn normalize_theta(graph: &mut Graph, theta: Node) -> Result<bool, IrError> {
    let sub = graph.theta_subregion(theta);
    let mut changed = false;
    for index in (0..graph.theta_n_loop_vars(theta)).rev() {
        let argument = graph.theta_argument(theta, index);
        if graph.result_origin(sub, index + 1) != argument {
            continue;
        }
        let out = graph.theta_output(theta, index);
        if graph.n_users(out) > 0 {
            let init = graph.operand(theta, index);
            graph.divert_users(out, init)?;
            changed = true;
        }
        let only_self_use = graph.users(argument).len() == 1
            && graph.users(argument)[0]
                == User::Result {
                    region: sub,
                    index: index + 1,
                };
        if only_self_use {
            remove_loop_var(graph, theta, index)?;
            changed = true;
        }
    }
    Ok(changed)
}

fn remove_loop_var(graph: &mut Graph, theta: Node, index: usize) -> Result<(), IrError> {
    let sub = graph.theta_subregion(theta);
    graph.remove_result(sub, index + 1);
    graph.remove_argument(sub, index)?;
    graph.remove_output(theta, index)?;
    graph.remove_input(theta, index);
    Ok(())
}

/// Trim loop variables that are observed neither inside nor outside the
/// body, then prune the body.
pub(crate) fn prune_theta(graph: &mut Graph, theta: Node) -> Result<usize, IrError> {
    let sub = graph.theta_subregion(theta);
    for index in (0..graph.theta_n_loop_vars(theta)).rev() {
        let out = graph.theta_output(theta, index);
        if graph.n_users(out) > 0 {
            continue;
        }
        let argument = graph.theta_argument(theta, index);
        let self_result = User::Result {
            region: sub,
            index: index + 1,
        };
        let unobserved = graph
            .users(argument)
            .iter()
            .all(|user| *user == self_result);
        if unobserved {
            remove_loop_var(graph, theta, index)?;
        }
    }
    graph.prune_region(sub)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphImport, Linkage};
    use crate::ops::bitstring::{BitAdd, BitConstant, BitSlt};
    use crate::ops::control::Match;

    fn import(graph: &mut Graph, name: &str, ty: Type) -> Origin {
        graph.add_import(GraphImport {
            name: name.into(),
            linkage: Linkage::External,
            ty,
        })
    }

    /// Counting loop: `i` steps by one until `i < n` fails; `n` is
    /// never written.
    fn counting_theta(graph: &mut Graph) -> (Node, Origin, Origin) {
        let i0 = import(graph, "i0", Type::Bits(32));
        let n = import(graph, "n", Type::Bits(32));
        let root = graph.root();
        let theta = graph.add_theta(root).unwrap();
        let iv = graph.theta_add_loop_var(theta, i0).unwrap();
        let nv = graph.theta_add_loop_var(theta, n).unwrap();
        let sub = graph.theta_subregion(theta);
        let i_arg = graph.theta_argument(theta, iv);
        let n_arg = graph.theta_argument(theta, nv);
        let one = graph
            .add_simple_node(sub, Box::new(BitConstant::new(32, 1)), &[])
            .unwrap();
        let next = graph
            .add_simple_node(sub, Box::new(BitAdd::new(32)), &[i_arg, one[0]])
            .unwrap();
        let more = graph
            .add_simple_node(sub, Box::new(BitSlt::new(32)), &[next[0], n_arg])
            .unwrap();
        let repeat = graph
            .add_simple_node(sub, Box::new(Match::new(1, [(1, 1)], 0, 2)), &[more[0]])
            .unwrap();
        graph.theta_set_loop_var_result(theta, iv, next[0]).unwrap();
        graph.theta_set_predicate(theta, repeat[0]).unwrap();
        (theta, graph.theta_output(theta, iv), graph.theta_output(theta, nv))
    }

    #[test]
    fn test_theta_signature() {
        let mut graph = Graph::new();
        let (theta, _, _) = counting_theta(&mut graph);
        let sub = graph.theta_subregion(theta);
        assert_eq!(graph.theta_n_loop_vars(theta), 2);
        assert_eq!(graph.n_arguments(sub), 2);
        assert_eq!(graph.n_results(sub), 3);
        assert_eq!(graph.result_type(sub, 0), &Type::Control(2));
    }

    #[test]
    fn test_predicate_seed_is_replaced() {
        let mut graph = Graph::new();
        let (theta, _, _) = counting_theta(&mut graph);
        let sub = graph.theta_subregion(theta);
        // The seeded exit constant is gone; the comparison drives the loop.
        let pred = graph.theta_predicate(theta);
        let producer = pred.producer().unwrap();
        assert!(graph
            .kind(producer)
            .operator()
            .unwrap()
            .as_any()
            .downcast_ref::<ControlConstant>()
            .is_none());
        assert_eq!(graph.n_results(sub), 3);
    }

    #[test]
    fn test_invariant_loop_var_is_lifted() {
        let mut graph = Graph::new();
        let (theta, i_out, n_out) = counting_theta(&mut graph);
        graph.add_export(i_out, "i").unwrap();
        graph.add_export(n_out, "n").unwrap();

        assert!(normalize_theta(&mut graph, theta).unwrap());
        // n is routed around the loop...
        let root = graph.root();
        let n_import = graph.argument(root, 1);
        assert_eq!(graph.result_origin(root, 1), n_import);
        // ...but the loop variable survives: the body still reads it.
        assert_eq!(graph.theta_n_loop_vars(theta), 2);
    }

    #[test]
    fn test_fully_unused_loop_var_is_deleted() {
        let mut graph = Graph::new();
        let x = import(&mut graph, "x", Type::Bits(8));
        let root = graph.root();
        let theta = graph.add_theta(root).unwrap();
        let _v = graph.theta_add_loop_var(theta, x).unwrap();
        // Body leaves the variable untouched and nothing reads the output.
        assert!(normalize_theta(&mut graph, theta).unwrap());
        assert_eq!(graph.theta_n_loop_vars(theta), 0);
        assert_eq!(graph.n_users(x), 0);
    }
}
