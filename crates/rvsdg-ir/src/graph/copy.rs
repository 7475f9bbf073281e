//! Node copying under origin substitution.
//!
//! Copying maps a node (recursively, for structural nodes) into a
//! target region, rewriting every external origin through a
//! [`Substitution`]. The substitution accumulates the copied node's own
//! output and argument correspondences, so chains of copies can be
//! driven off one shared map.

use std::collections::HashMap;

use crate::error::IrError;
use crate::graph::{Graph, Linkage, Node, NodeKind, Origin, Region};
use crate::operator::Operator;
use crate::types::Type;

/// Mapping from origins in the source context to origins in the target
/// context.
#[derive(Debug, Default)]
pub struct Substitution {
    map: HashMap<Origin, Origin>,
}

impl Substitution {
    pub fn new() -> Self {
        Substitution::default()
    }

    pub fn insert(&mut self, old: Origin, new: Origin) {
        self.map.insert(old, new);
    }

    pub fn lookup(&self, origin: Origin) -> Option<Origin> {
        self.map.get(&origin).copied()
    }

    /// Map `origin`, falling back to the identity for origins the
    /// substitution does not cover (origins already in the target).
    pub fn apply(&self, origin: Origin) -> Origin {
        self.lookup(origin).unwrap_or(origin)
    }
}

/// Copy every node of `source` into `target` in topological order.
pub fn copy_region_contents(
    graph: &mut Graph,
    source: Region,
    target: Region,
    subst: &mut Substitution,
) -> Result<(), IrError> {
    for node in graph.topological_order(source) {
        copy_node(graph, node, target, subst)?;
    }
    Ok(())
}

enum CopyInfo {
    Simple(Box<dyn Operator>),
    Gamma {
        subregions: Vec<Region>,
    },
    Theta {
        subregion: Region,
    },
    Lambda {
        subregion: Region,
        name: String,
        linkage: Linkage,
        ty: Type,
        n_ctx: usize,
        finalized: bool,
    },
    Delta {
        subregion: Region,
        name: String,
        linkage: Linkage,
        section: Option<String>,
        constant: bool,
        value_type: Type,
        n_ctx: usize,
        finalized: bool,
    },
    Phi {
        subregion: Region,
        rec_types: Vec<Type>,
        definitions: Vec<Option<Origin>>,
        n_ctx: usize,
        finalized: bool,
    },
}

/// Copy `node` into `target`, mapping its operands through `subst` and
/// recording output correspondences. Returns the copy.
pub fn copy_node(
    graph: &mut Graph,
    node: Node,
    target: Region,
    subst: &mut Substitution,
) -> Result<Node, IrError> {
    let operands: Vec<Origin> = graph
        .operands(node)
        .iter()
        .map(|origin| subst.apply(*origin))
        .collect();
    let info = match &graph.node(node).kind {
        NodeKind::Simple(op) => CopyInfo::Simple(op.copy_operator()),
        NodeKind::Gamma(data) => CopyInfo::Gamma {
            subregions: data.subregions.clone(),
        },
        NodeKind::Theta(data) => CopyInfo::Theta {
            subregion: data.subregion,
        },
        NodeKind::Lambda(data) => CopyInfo::Lambda {
            subregion: data.subregion,
            name: data.name.clone(),
            linkage: data.linkage,
            ty: data.ty.clone(),
            n_ctx: data.n_ctx,
            finalized: data.finalized,
        },
        NodeKind::Delta(data) => CopyInfo::Delta {
            subregion: data.subregion,
            name: data.name.clone(),
            linkage: data.linkage,
            section: data.section.clone(),
            constant: data.constant,
            value_type: data.value_type.clone(),
            n_ctx: data.n_ctx,
            finalized: data.finalized,
        },
        NodeKind::Phi(data) => CopyInfo::Phi {
            subregion: data.subregion,
            rec_types: data.rec_types.clone(),
            definitions: data.definitions.clone(),
            n_ctx: data.n_ctx,
            finalized: data.finalized,
        },
    };

    let copy = match info {
        CopyInfo::Simple(op) => {
            let copy = graph.create_simple_node(target, op, &operands)?;
            for index in 0..graph.n_outputs(copy) {
                subst.insert(graph.output(node, index), graph.output(copy, index));
            }
            copy
        }
        CopyInfo::Gamma { subregions } => {
            let copy = graph.add_gamma(target, operands[0], subregions.len())?;
            let n_entry = graph.gamma_n_entry_vars(node);
            for ev in 0..n_entry {
                graph.gamma_add_entry_var(copy, operands[ev + 1])?;
                for alt in 0..subregions.len() {
                    subst.insert(
                        graph.gamma_entry_argument(node, ev, alt),
                        graph.gamma_entry_argument(copy, ev, alt),
                    );
                }
            }
            for (alt, source) in subregions.iter().enumerate() {
                let target_sub = graph.gamma_subregion(copy, alt);
                copy_region_contents(graph, *source, target_sub, subst)?;
            }
            for j in 0..graph.gamma_n_exit_vars(node) {
                let origins: Vec<Origin> = subregions
                    .iter()
                    .map(|sub| subst.apply(graph.result_origin(*sub, j)))
                    .collect();
                let out = graph.gamma_add_exit_var(copy, &origins)?;
                subst.insert(graph.output(node, j), out);
            }
            copy
        }
        CopyInfo::Theta { subregion } => {
            let copy = graph.add_theta(target)?;
            for (index, init) in operands.iter().enumerate() {
                graph.theta_add_loop_var(copy, *init)?;
                subst.insert(
                    graph.theta_argument(node, index),
                    graph.theta_argument(copy, index),
                );
            }
            let target_sub = graph.theta_subregion(copy);
            copy_region_contents(graph, subregion, target_sub, subst)?;
            graph.theta_set_predicate(copy, subst.apply(graph.result_origin(subregion, 0)))?;
            for index in 0..operands.len() {
                graph.theta_set_loop_var_result(
                    copy,
                    index,
                    subst.apply(graph.result_origin(subregion, index + 1)),
                )?;
                subst.insert(graph.output(node, index), graph.output(copy, index));
            }
            copy
        }
        CopyInfo::Lambda {
            subregion,
            name,
            linkage,
            ty,
            n_ctx,
            finalized,
        } => {
            let copy = graph.add_lambda(target, name, ty, linkage)?;
            for index in 0..n_ctx {
                let argument = graph.lambda_add_ctx_var(copy, operands[index])?;
                subst.insert(graph.lambda_ctx_argument(node, index), argument);
            }
            for index in 0..graph.lambda_n_parameters(node) {
                subst.insert(
                    graph.lambda_parameter(node, index),
                    graph.lambda_parameter(copy, index),
                );
            }
            let target_sub = graph.lambda_subregion(copy);
            copy_region_contents(graph, subregion, target_sub, subst)?;
            if finalized {
                let results: Vec<Origin> = (0..graph.n_results(subregion))
                    .map(|index| subst.apply(graph.result_origin(subregion, index)))
                    .collect();
                let out = graph.lambda_finalize(copy, &results)?;
                subst.insert(graph.output(node, 0), out);
            }
            copy
        }
        CopyInfo::Delta {
            subregion,
            name,
            linkage,
            section,
            constant,
            value_type,
            n_ctx,
            finalized,
        } => {
            let copy = graph.add_delta(target, name, value_type, linkage, constant)?;
            if let Some(section) = section {
                graph.delta_set_section(copy, section);
            }
            for index in 0..n_ctx {
                let argument = graph.delta_add_ctx_var(copy, operands[index])?;
                subst.insert(graph.delta_ctx_argument(node, index), argument);
            }
            let target_sub = graph.delta_subregion(copy);
            copy_region_contents(graph, subregion, target_sub, subst)?;
            if finalized {
                let init = subst.apply(graph.result_origin(subregion, 0));
                let out = graph.delta_finalize(copy, init)?;
                subst.insert(graph.output(node, 0), out);
            }
            copy
        }
        CopyInfo::Phi {
            subregion,
            rec_types,
            definitions,
            n_ctx,
            finalized,
        } => {
            let copy = graph.add_phi(target)?;
            for (index, ty) in rec_types.iter().enumerate() {
                graph.phi_add_rec_var(copy, ty.clone())?;
                subst.insert(
                    graph.phi_rec_argument(node, index),
                    graph.phi_rec_argument(copy, index),
                );
            }
            for index in 0..n_ctx {
                let argument = graph.phi_add_ctx_var(copy, operands[index])?;
                subst.insert(graph.phi_ctx_argument(node, index), argument);
            }
            let target_sub = graph.phi_subregion(copy);
            copy_region_contents(graph, subregion, target_sub, subst)?;
            for (index, _) in rec_types.iter().enumerate() {
                let definition = if finalized {
                    Some(graph.result_origin(subregion, index))
                } else {
                    definitions[index]
                };
                if let Some(definition) = definition {
                    graph.phi_set_rec_var(copy, index, subst.apply(definition))?;
                }
            }
            if finalized {
                graph.phi_finalize(copy)?;
                for index in 0..rec_types.len() {
                    subst.insert(graph.output(node, index), graph.output(copy, index));
                }
            }
            copy
        }
    };

    Ok(copy)
}
