//! γ nodes: predicated multi-way choice.
//!
//! A γ node owns one subregion per alternative and picks among them
//! with a `Control(k)` predicate (input 0). Every *entry variable*
//! threads one input into argument position `i` of every subregion;
//! every *exit variable* collects result position `j` of every
//! subregion into one output. All subregions therefore share a single
//! argument/result signature.

use crate::error::IrError;
use crate::graph::copy::{copy_region_contents, Substitution};
use crate::graph::{Graph, Node, NodeKind, Origin, Region};
use crate::ops::control::ControlConstant;
use crate::types::Type;

#[derive(Debug)]
pub struct GammaData {
    pub(crate) subregions: Vec<Region>,
}

impl Graph {
    fn gamma_data(&self, node: Node) -> &GammaData {
        match &self.node(node).kind {
            NodeKind::Gamma(data) => data,
            _ => panic!("{} is not a gamma node", node),
        }
    }

    /// Create a γ node with `nalternatives` empty subregions, selected
    /// by `predicate` (which must be of type `Control(nalternatives)`).
    pub fn add_gamma(
        &mut self,
        region: Region,
        predicate: Origin,
        nalternatives: usize,
    ) -> Result<Node, IrError> {
        if nalternatives < 2 {
            return Err(IrError::invariant(
                "a gamma node requires at least two alternatives",
            ));
        }
        let ctl = Type::Control(nalternatives as u32);
        self.check_origin(region, predicate, &ctl)?;
        let node = self.create_structural_node(
            region,
            NodeKind::Gamma(GammaData {
                subregions: Vec::new(),
            }),
            &[(predicate, ctl)],
        )?;
        let subregions = (0..nalternatives)
            .map(|_| self.alloc_region(Some(node)))
            .collect();
        match &mut self.node_mut(node).kind {
            NodeKind::Gamma(data) => data.subregions = subregions,
            _ => unreachable!(),
        }
        Ok(node)
    }

    pub fn gamma_subregions(&self, gamma: Node) -> &[Region] {
        &self.gamma_data(gamma).subregions
    }

    pub fn gamma_subregion(&self, gamma: Node, alternative: usize) -> Region {
        self.gamma_data(gamma).subregions[alternative]
    }

    pub fn gamma_nalternatives(&self, gamma: Node) -> usize {
        self.gamma_data(gamma).subregions.len()
    }

    pub fn gamma_predicate(&self, gamma: Node) -> Origin {
        self.operand(gamma, 0)
    }

    pub fn gamma_n_entry_vars(&self, gamma: Node) -> usize {
        self.n_inputs(gamma) - 1
    }

    pub fn gamma_n_exit_vars(&self, gamma: Node) -> usize {
        self.n_outputs(gamma)
    }

    /// Thread `origin` into every subregion; returns the entry-variable
    /// index.
    pub fn gamma_add_entry_var(&mut self, gamma: Node, origin: Origin) -> Result<usize, IrError> {
        let ty = self.origin_type(origin).clone();
        let index = self.push_input(gamma, origin, ty.clone())? - 1;
        for sub in self.gamma_data(gamma).subregions.clone() {
            self.push_argument(sub, ty.clone());
        }
        Ok(index)
    }

    /// The origin feeding entry variable `ev` in the surrounding region.
    pub fn gamma_entry_origin(&self, gamma: Node, ev: usize) -> Origin {
        self.operand(gamma, ev + 1)
    }

    /// The argument of entry variable `ev` inside `alternative`.
    pub fn gamma_entry_argument(&self, gamma: Node, ev: usize, alternative: usize) -> Origin {
        let sub = self.gamma_subregion(gamma, alternative);
        Origin::Argument {
            region: sub,
            index: ev,
        }
    }

    /// Collect one result per subregion into a fresh γ output; returns
    /// the output origin.
    pub fn gamma_add_exit_var(
        &mut self,
        gamma: Node,
        origins: &[Origin],
    ) -> Result<Origin, IrError> {
        let data = self.gamma_data(gamma);
        let subregions = data.subregions.clone();
        if origins.len() != subregions.len() {
            return Err(IrError::ArityMismatch {
                what: "gamma exit variable".into(),
                expected: subregions.len(),
                actual: origins.len(),
            });
        }
        let ty = self.origin_type(origins[0]).clone();
        for (sub, origin) in subregions.iter().zip(origins) {
            self.check_origin(*sub, *origin, &ty)?;
        }
        for (sub, origin) in subregions.iter().zip(origins) {
            self.push_result(*sub, *origin)?;
        }
        Ok(self.push_output(gamma, ty))
    }
}

/// Apply the γ reduction catalogue to one node: dead-exit removal,
/// invariance hoisting, and constant-predicate inlining. Returns
/// whether the graph changed.
pub fn normalize_gamma(graph: &mut Graph, gamma: Node) -> Result<bool, IrError> {
    let mut changed = false;
    changed |= remove_dead_exit_vars(graph, gamma)? > 0;
    changed |= hoist_invariant_exit_vars(graph, gamma)? > 0;
    if fold_constant_predicate(graph, gamma)? {
        return Ok(true);
    }
    Ok(changed)
}

/// Remove exit variables whose γ output has no consumers.
fn remove_dead_exit_vars(graph: &mut Graph, gamma: Node) -> Result<usize, IrError> {
    let mut removed = 0;
    for j in (0..graph.gamma_n_exit_vars(gamma)).rev() {
        let out = graph.output(gamma, j);
        if graph.n_users(out) > 0 {
            continue;
        }
        graph.remove_output(gamma, j)?;
        for sub in graph.gamma_subregions(gamma).to_vec() {
            graph.remove_result(sub, j);
        }
        removed += 1;
    }
    Ok(removed)
}

/// Replace outputs whose every subregion passes entry variable `i`
/// straight through with the γ input feeding `i`.
fn hoist_invariant_exit_vars(graph: &mut Graph, gamma: Node) -> Result<usize, IrError> {
    let mut hoisted = 0;
    for j in (0..graph.gamma_n_exit_vars(gamma)).rev() {
        let subregions = graph.gamma_subregions(gamma).to_vec();
        let mut common: Option<usize> = None;
        let invariant = subregions.iter().all(|sub| {
            match graph.result_origin(*sub, j) {
                Origin::Argument { region, index } if region == *sub => match common {
                    None => {
                        common = Some(index);
                        true
                    }
                    Some(prev) => prev == index,
                },
                _ => false,
            }
        });
        let entry = match (invariant, common) {
            (true, Some(entry)) => entry,
            _ => continue,
        };
        let replacement = graph.gamma_entry_origin(gamma, entry);
        let out = graph.output(gamma, j);
        graph.divert_users(out, replacement)?;
        graph.remove_output(gamma, j)?;
        for sub in subregions {
            graph.remove_result(sub, j);
        }
        hoisted += 1;
    }
    Ok(hoisted)
}

/// When the predicate is a constant control token, inline the chosen
/// subregion into the parent region and drop the γ node.
fn fold_constant_predicate(graph: &mut Graph, gamma: Node) -> Result<bool, IrError> {
    let chosen = {
        let predicate = graph.gamma_predicate(gamma);
        let producer = match predicate.producer() {
            Some(producer) => producer,
            None => return Ok(false),
        };
        match graph
            .kind(producer)
            .operator()
            .and_then(|op| op.as_any().downcast_ref::<ControlConstant>())
        {
            Some(constant) => constant.alternative() as usize,
            None => return Ok(false),
        }
    };

    let region = graph.region_of(gamma);
    let sub = graph.gamma_subregion(gamma, chosen);
    let mut subst = Substitution::new();
    for ev in 0..graph.gamma_n_entry_vars(gamma) {
        subst.insert(
            graph.gamma_entry_argument(gamma, ev, chosen),
            graph.gamma_entry_origin(gamma, ev),
        );
    }
    copy_region_contents(graph, sub, region, &mut subst)?;
    for j in 0..graph.gamma_n_exit_vars(gamma) {
        let mapped = subst.apply(graph.result_origin(sub, j));
        let out = graph.output(gamma, j);
        graph.divert_users(out, mapped)?;
    }
    graph.remove_node(gamma)?;
    Ok(true)
}

/// Trim unused entry and exit mappings, then prune the subregions.
pub(crate) fn prune_gamma(graph: &mut Graph, gamma: Node) -> Result<usize, IrError> {
    remove_dead_exit_vars(graph, gamma)?;
    for ev in (0..graph.gamma_n_entry_vars(gamma)).rev() {
        let subregions = graph.gamma_subregions(gamma).to_vec();
        let unused = subregions.iter().all(|sub| {
            graph
                .users(Origin::Argument {
                    region: *sub,
                    index: ev,
                })
                .is_empty()
        });
        if !unused {
            continue;
        }
        graph.remove_input(gamma, ev + 1);
        for sub in subregions {
            graph.remove_argument(sub, ev)?;
        }
    }
    let mut removed = 0;
    for sub in graph.gamma_subregions(gamma).to_vec() {
        removed += graph.prune_region(sub)?;
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphImport, Linkage};
    use crate::ops::bitstring::BitAdd;

    fn import(graph: &mut Graph, name: &str, ty: Type) -> Origin {
        graph.add_import(GraphImport {
            name: name.into(),
            linkage: Linkage::External,
            ty,
        })
    }

    fn passthrough_gamma(graph: &mut Graph, predicate: Origin, value: Origin) -> (Node, Origin) {
        let root = graph.root();
        let gamma = graph.add_gamma(root, predicate, 2).unwrap();
        let ev = graph.gamma_add_entry_var(gamma, value).unwrap();
        let a0 = graph.gamma_entry_argument(gamma, ev, 0);
        let a1 = graph.gamma_entry_argument(gamma, ev, 1);
        let out = graph.gamma_add_exit_var(gamma, &[a0, a1]).unwrap();
        (gamma, out)
    }

    #[test]
    fn test_gamma_signature() {
        let mut graph = Graph::new();
        let pred = import(&mut graph, "p", Type::Control(2));
        let x = import(&mut graph, "x", Type::Bits(32));
        let (gamma, _) = passthrough_gamma(&mut graph, pred, x);
        assert_eq!(graph.gamma_nalternatives(gamma), 2);
        assert_eq!(graph.gamma_n_entry_vars(gamma), 1);
        assert_eq!(graph.gamma_n_exit_vars(gamma), 1);
        for alt in 0..2 {
            let sub = graph.gamma_subregion(gamma, alt);
            assert_eq!(graph.n_arguments(sub), 1);
            assert_eq!(graph.n_results(sub), 1);
        }
    }

    #[test]
    fn test_gamma_predicate_type_is_checked() {
        let mut graph = Graph::new();
        let x = import(&mut graph, "x", Type::Bits(32));
        let root = graph.root();
        let err = graph.add_gamma(root, x, 2).unwrap_err();
        assert!(matches!(err, IrError::TypeMismatch { .. }));
    }

    #[test]
    fn test_invariance_hoisting() {
        let mut graph = Graph::new();
        let pred = import(&mut graph, "p", Type::Control(2));
        let x = import(&mut graph, "x", Type::Bits(32));
        let (gamma, out) = passthrough_gamma(&mut graph, pred, x);
        graph.add_export(out, "out").unwrap();

        assert!(normalize_gamma(&mut graph, gamma).unwrap());
        // The export now reads the gamma input directly.
        let root = graph.root();
        assert_eq!(graph.result_origin(root, 0), x);
        assert_eq!(graph.gamma_n_exit_vars(gamma), 0);
    }

    #[test]
    fn test_distinct_branch_results_are_not_hoisted() {
        let mut graph = Graph::new();
        let pred = import(&mut graph, "p", Type::Control(2));
        let x = import(&mut graph, "x", Type::Bits(32));
        let root = graph.root();
        let gamma = graph.add_gamma(root, pred, 2).unwrap();
        let ev = graph.gamma_add_entry_var(gamma, x).unwrap();
        let a0 = graph.gamma_entry_argument(gamma, ev, 0);
        let a1 = graph.gamma_entry_argument(gamma, ev, 1);
        let sub1 = graph.gamma_subregion(gamma, 1);
        let doubled = graph
            .add_simple_node(sub1, Box::new(BitAdd::new(32)), &[a1, a1])
            .unwrap();
        let out = graph.gamma_add_exit_var(gamma, &[a0, doubled[0]]).unwrap();
        graph.add_export(out, "out").unwrap();

        assert!(!normalize_gamma(&mut graph, gamma).unwrap());
        assert_eq!(graph.gamma_n_exit_vars(gamma), 1);
    }

    #[test]
    fn test_prune_drops_unused_entry_var() {
        let mut graph = Graph::new();
        let pred = import(&mut graph, "p", Type::Control(2));
        let x = import(&mut graph, "x", Type::Bits(32));
        let y = import(&mut graph, "y", Type::Bits(32));
        let root = graph.root();
        let gamma = graph.add_gamma(root, pred, 2).unwrap();
        let used = graph.gamma_add_entry_var(gamma, x).unwrap();
        let _unused = graph.gamma_add_entry_var(gamma, y).unwrap();
        let a0 = graph.gamma_entry_argument(gamma, used, 0);
        let a1 = graph.gamma_entry_argument(gamma, used, 1);
        let out = graph.gamma_add_exit_var(gamma, &[a0, a1]).unwrap();
        graph.add_export(out, "out").unwrap();

        graph.prune().unwrap();
        assert_eq!(graph.gamma_n_entry_vars(gamma), 1);
        assert_eq!(graph.n_users(y), 0);
    }
}
