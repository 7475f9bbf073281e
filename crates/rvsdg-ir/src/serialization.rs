//! Versioned graph serialization.
//!
//! Graphs serialize to a canonical JSON form: nodes are listed per
//! region in deterministic topological order and referenced by
//! position, so two structurally equal graphs produce identical
//! serialized forms regardless of construction history. This is also
//! how [`are_graphs_equivalent`] decides equality.
//!
//! The format covers the built-in operator library only; foreign
//! operators yield [`IrError::UnknownOperator`]. Unfinalized λ/δ/φ
//! nodes cannot be serialized. Parsing rebuilds the graph through the
//! raw construction layer, so the round trip is exact and no normal
//! forms run.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::binary::FlattenedBinary;
use crate::error::IrError;
use crate::graph::{Graph, GraphImport, Linkage, Node, NodeKind, Origin, Region};
use crate::operator::Operator;
use crate::ops::bitstring::{BitAdd, BitConstant, BitMul, BitSlt, BitSub};
use crate::ops::control::{ControlConstant, Match};
use crate::ops::memory::{Alloca, Load, MemStateMerge, Store};
use crate::types::Type;

/// Current serialization format version.
pub const FORMAT_VERSION: &str = "1.0.0";

/// Versioned wrapper around a serialized graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionedGraph {
    /// Format version (semver).
    pub version: String,
    /// Creation timestamp (RFC 3339).
    pub created_at: Option<String>,
    pub graph: SerializedGraph,
}

impl VersionedGraph {
    pub fn new(graph: SerializedGraph) -> Self {
        VersionedGraph {
            version: FORMAT_VERSION.to_string(),
            created_at: Some(chrono::Utc::now().to_rfc3339()),
            graph,
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_json_compact(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedGraph {
    pub imports: Vec<SerializedImport>,
    pub exports: Vec<SerializedExport>,
    pub root: SerializedRegion,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedImport {
    pub name: String,
    pub linkage: Linkage,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedExport {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedRegion {
    pub arguments: Vec<Type>,
    pub nodes: Vec<SerializedNode>,
    pub results: Vec<SerializedOrigin>,
}

/// An origin local to one serialized region: either the region's
/// argument `index`, or output `index` of the `node`-th node in the
/// region's node list.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SerializedOrigin {
    Argument { index: usize },
    Node { node: usize, index: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SerializedNode {
    Simple {
        operator: SerializedOperator,
        operands: Vec<SerializedOrigin>,
    },
    Gamma {
        predicate: SerializedOrigin,
        entries: Vec<SerializedOrigin>,
        subregions: Vec<SerializedRegion>,
    },
    Theta {
        inits: Vec<SerializedOrigin>,
        subregion: SerializedRegion,
    },
    Lambda {
        name: String,
        linkage: Linkage,
        ty: Type,
        ctx: Vec<SerializedOrigin>,
        subregion: SerializedRegion,
    },
    Delta {
        name: String,
        linkage: Linkage,
        section: Option<String>,
        constant: bool,
        value_type: Type,
        ctx: Vec<SerializedOrigin>,
        subregion: SerializedRegion,
    },
    Phi {
        rec_types: Vec<Type>,
        ctx: Vec<SerializedOrigin>,
        subregion: SerializedRegion,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SerializedOperator {
    BitConstant {
        width: u32,
        value: u64,
    },
    BitAdd {
        width: u32,
    },
    BitMul {
        width: u32,
    },
    BitSub {
        width: u32,
    },
    BitSlt {
        width: u32,
    },
    ControlConstant {
        nalternatives: u32,
        alternative: u32,
    },
    Match {
        nbits: u32,
        mapping: Vec<(u64, u64)>,
        default_alternative: u64,
        nalternatives: u32,
    },
    Alloca {
        value_type: Type,
    },
    Store {
        stored_type: Type,
        nstates: usize,
    },
    Load {
        loaded_type: Type,
        nstates: usize,
    },
    MemStateMerge {
        noperands: usize,
    },
    FlattenedBinary {
        operator: Box<SerializedOperator>,
        narguments: usize,
    },
}

// ---- encoding ----------------------------------------------------------

fn encode_operator(op: &dyn Operator) -> Result<SerializedOperator, IrError> {
    let any = op.as_any();
    if let Some(op) = any.downcast_ref::<BitConstant>() {
        return Ok(SerializedOperator::BitConstant {
            width: op.width(),
            value: op.value(),
        });
    }
    if let Some(op) = any.downcast_ref::<BitAdd>() {
        return Ok(SerializedOperator::BitAdd { width: op.width() });
    }
    if let Some(op) = any.downcast_ref::<BitMul>() {
        return Ok(SerializedOperator::BitMul { width: op.width() });
    }
    if let Some(op) = any.downcast_ref::<BitSub>() {
        return Ok(SerializedOperator::BitSub { width: op.width() });
    }
    if let Some(op) = any.downcast_ref::<BitSlt>() {
        return Ok(SerializedOperator::BitSlt { width: op.width() });
    }
    if let Some(op) = any.downcast_ref::<ControlConstant>() {
        return Ok(SerializedOperator::ControlConstant {
            nalternatives: op.nalternatives(),
            alternative: op.alternative(),
        });
    }
    if let Some(op) = any.downcast_ref::<Match>() {
        return Ok(SerializedOperator::Match {
            nbits: op.nbits(),
            mapping: op.mapping().to_vec(),
            default_alternative: op.default_alternative(),
            nalternatives: op.nalternatives(),
        });
    }
    if let Some(op) = any.downcast_ref::<Alloca>() {
        return Ok(SerializedOperator::Alloca {
            value_type: op.value_type().clone(),
        });
    }
    if let Some(op) = any.downcast_ref::<Store>() {
        return Ok(SerializedOperator::Store {
            stored_type: op.stored_type().clone(),
            nstates: op.nstates(),
        });
    }
    if let Some(op) = any.downcast_ref::<Load>() {
        return Ok(SerializedOperator::Load {
            loaded_type: op.loaded_type().clone(),
            nstates: op.nstates(),
        });
    }
    if let Some(op) = any.downcast_ref::<MemStateMerge>() {
        return Ok(SerializedOperator::MemStateMerge {
            noperands: op.noperands(),
        });
    }
    if let Some(op) = any.downcast_ref::<FlattenedBinary>() {
        return Ok(SerializedOperator::FlattenedBinary {
            operator: Box::new(encode_operator(op.operation().as_operator())?),
            narguments: op.narguments(),
        });
    }
    Err(IrError::UnknownOperator {
        operator: op.debug_string(),
    })
}

fn decode_operator(serialized: &SerializedOperator) -> Result<Box<dyn Operator>, IrError> {
    Ok(match serialized {
        SerializedOperator::BitConstant { width, value } => {
            Box::new(BitConstant::new(*width, *value))
        }
        SerializedOperator::BitAdd { width } => Box::new(BitAdd::new(*width)),
        SerializedOperator::BitMul { width } => Box::new(BitMul::new(*width)),
        SerializedOperator::BitSub { width } => Box::new(BitSub::new(*width)),
        SerializedOperator::BitSlt { width } => Box::new(BitSlt::new(*width)),
        SerializedOperator::ControlConstant {
            nalternatives,
            alternative,
        } => Box::new(ControlConstant::new(*nalternatives, *alternative)),
        SerializedOperator::Match {
            nbits,
            mapping,
            default_alternative,
            nalternatives,
        } => Box::new(Match::new(
            *nbits,
            mapping.iter().copied(),
            *default_alternative,
            *nalternatives,
        )),
        SerializedOperator::Alloca { value_type } => Box::new(Alloca::new(value_type.clone())),
        SerializedOperator::Store {
            stored_type,
            nstates,
        } => Box::new(Store::new(stored_type.clone(), *nstates)),
        SerializedOperator::Load {
            loaded_type,
            nstates,
        } => Box::new(Load::new(loaded_type.clone(), *nstates)),
        SerializedOperator::MemStateMerge { noperands } => {
            Box::new(MemStateMerge::new(*noperands))
        }
        SerializedOperator::FlattenedBinary {
            operator,
            narguments,
        } => {
            let inner = decode_operator(operator)?;
            match inner.as_binary() {
                Some(binary) => Box::new(FlattenedBinary::new(binary, *narguments)?),
                None => {
                    return Err(IrError::UnknownOperator {
                        operator: inner.debug_string(),
                    })
                }
            }
        }
    })
}

fn encode_origin(
    origin: Origin,
    region: Region,
    position: &HashMap<Node, usize>,
) -> Result<SerializedOrigin, IrError> {
    match origin {
        Origin::Argument { region: found, index } if found == region => {
            Ok(SerializedOrigin::Argument { index })
        }
        Origin::Output { producer, index } => match position.get(&producer) {
            Some(node) => Ok(SerializedOrigin::Node { node: *node, index }),
            None => Err(IrError::invariant(format!(
                "origin {} escapes its region",
                origin
            ))),
        },
        Origin::Argument { .. } => Err(IrError::invariant(format!(
            "origin {} escapes its region",
            origin
        ))),
    }
}

fn serialize_region(graph: &Graph, region: Region) -> Result<SerializedRegion, IrError> {
    let order = graph.topological_order(region);
    let position: HashMap<Node, usize> = order
        .iter()
        .enumerate()
        .map(|(index, node)| (*node, index))
        .collect();

    let mut nodes = Vec::with_capacity(order.len());
    for node in &order {
        let operands: Vec<SerializedOrigin> = graph
            .operands(*node)
            .into_iter()
            .map(|origin| encode_origin(origin, region, &position))
            .collect::<Result<_, _>>()?;
        let serialized = match graph.kind(*node) {
            NodeKind::Simple(op) => SerializedNode::Simple {
                operator: encode_operator(op.as_ref())?,
                operands,
            },
            NodeKind::Gamma(_) => {
                let mut subregions = Vec::new();
                for sub in graph.gamma_subregions(*node) {
                    subregions.push(serialize_region(graph, *sub)?);
                }
                SerializedNode::Gamma {
                    predicate: operands[0],
                    entries: operands[1..].to_vec(),
                    subregions,
                }
            }
            NodeKind::Theta(_) => SerializedNode::Theta {
                inits: operands,
                subregion: serialize_region(graph, graph.theta_subregion(*node))?,
            },
            NodeKind::Lambda(_) => {
                require_finalized(graph.n_outputs(*node) == 1, "lambda")?;
                SerializedNode::Lambda {
                    name: graph.lambda_name(*node).to_string(),
                    linkage: graph.lambda_linkage(*node),
                    ty: graph.lambda_type(*node).clone(),
                    ctx: operands,
                    subregion: serialize_region(graph, graph.lambda_subregion(*node))?,
                }
            }
            NodeKind::Delta(_) => {
                require_finalized(graph.n_outputs(*node) == 1, "delta")?;
                SerializedNode::Delta {
                    name: graph.delta_name(*node).to_string(),
                    linkage: graph.delta_linkage(*node),
                    section: graph.delta_section(*node).map(str::to_string),
                    constant: graph.delta_is_constant(*node),
                    value_type: graph.delta_value_type(*node).clone(),
                    ctx: operands,
                    subregion: serialize_region(graph, graph.delta_subregion(*node))?,
                }
            }
            NodeKind::Phi(data) => {
                require_finalized(data.finalized, "phi")?;
                SerializedNode::Phi {
                    rec_types: data.rec_types.clone(),
                    ctx: operands,
                    subregion: serialize_region(graph, graph.phi_subregion(*node))?,
                }
            }
        };
        nodes.push(serialized);
    }

    let arguments = (0..graph.n_arguments(region))
        .map(|index| graph.argument_type(region, index).clone())
        .collect();
    let results = (0..graph.n_results(region))
        .map(|index| encode_origin(graph.result_origin(region, index), region, &position))
        .collect::<Result<_, _>>()?;
    Ok(SerializedRegion {
        arguments,
        nodes,
        results,
    })
}

fn require_finalized(finalized: bool, what: &str) -> Result<(), IrError> {
    if finalized {
        Ok(())
    } else {
        Err(IrError::invariant(format!(
            "cannot serialize an unfinalized {} node",
            what
        )))
    }
}

/// Serialize `graph` into a versioned wrapper.
pub fn serialize_graph(graph: &Graph) -> Result<VersionedGraph, IrError> {
    let root = serialize_region(graph, graph.root())?;
    let imports = graph
        .imports()
        .iter()
        .map(|import| SerializedImport {
            name: import.name.clone(),
            linkage: import.linkage,
            ty: import.ty.clone(),
        })
        .collect();
    let exports = graph
        .exports()
        .iter()
        .map(|export| SerializedExport {
            name: export.name.clone(),
        })
        .collect();
    Ok(VersionedGraph::new(SerializedGraph {
        imports,
        exports,
        root,
    }))
}

// ---- decoding ----------------------------------------------------------

fn decode_origin(
    serialized: &SerializedOrigin,
    region: Region,
    nodes: &[Node],
) -> Result<Origin, IrError> {
    match serialized {
        SerializedOrigin::Argument { index } => Ok(Origin::Argument {
            region,
            index: *index,
        }),
        SerializedOrigin::Node { node, index } => match nodes.get(*node) {
            Some(producer) => Ok(Origin::Output {
                producer: *producer,
                index: *index,
            }),
            None => Err(IrError::invariant(
                "serialized origin references a node out of range",
            )),
        },
    }
}

fn decode_origins(
    serialized: &[SerializedOrigin],
    region: Region,
    nodes: &[Node],
) -> Result<Vec<Origin>, IrError> {
    serialized
        .iter()
        .map(|origin| decode_origin(origin, region, nodes))
        .collect()
}

fn check_signature(
    graph: &Graph,
    region: Region,
    serialized: &SerializedRegion,
) -> Result<(), IrError> {
    if graph.n_arguments(region) != serialized.arguments.len() {
        return Err(IrError::ArityMismatch {
            what: format!("arguments of serialized {}", region),
            expected: serialized.arguments.len(),
            actual: graph.n_arguments(region),
        });
    }
    for (index, ty) in serialized.arguments.iter().enumerate() {
        if graph.argument_type(region, index) != ty {
            return Err(IrError::TypeMismatch {
                expected: ty.clone(),
                found: graph.argument_type(region, index).clone(),
            });
        }
    }
    Ok(())
}

fn build_nodes(
    graph: &mut Graph,
    region: Region,
    serialized: &SerializedRegion,
) -> Result<Vec<Node>, IrError> {
    let mut nodes: Vec<Node> = Vec::with_capacity(serialized.nodes.len());
    for snode in &serialized.nodes {
        let node = match snode {
            SerializedNode::Simple { operator, operands } => {
                let op = decode_operator(operator)?;
                let operands = decode_origins(operands, region, &nodes)?;
                graph.create_simple_node(region, op, &operands)?
            }
            SerializedNode::Gamma {
                predicate,
                entries,
                subregions,
            } => {
                let predicate = decode_origin(predicate, region, &nodes)?;
                let gamma = graph.add_gamma(region, predicate, subregions.len())?;
                for entry in entries {
                    let origin = decode_origin(entry, region, &nodes)?;
                    graph.gamma_add_entry_var(gamma, origin)?;
                }
                let mut sub_nodes = Vec::with_capacity(subregions.len());
                for (alt, ssub) in subregions.iter().enumerate() {
                    let sub = graph.gamma_subregion(gamma, alt);
                    check_signature(graph, sub, ssub)?;
                    sub_nodes.push(build_nodes(graph, sub, ssub)?);
                }
                let n_exit = subregions
                    .first()
                    .map(|sub| sub.results.len())
                    .unwrap_or(0);
                for ssub in subregions {
                    if ssub.results.len() != n_exit {
                        return Err(IrError::invariant(
                            "gamma subregions disagree on exit count",
                        ));
                    }
                }
                for exit in 0..n_exit {
                    let origins = subregions
                        .iter()
                        .enumerate()
                        .map(|(alt, ssub)| {
                            decode_origin(
                                &ssub.results[exit],
                                graph.gamma_subregion(gamma, alt),
                                &sub_nodes[alt],
                            )
                        })
                        .collect::<Result<Vec<_>, _>>()?;
                    graph.gamma_add_exit_var(gamma, &origins)?;
                }
                gamma
            }
            SerializedNode::Theta { inits, subregion } => {
                let theta = graph.add_theta(region)?;
                for init in inits {
                    let origin = decode_origin(init, region, &nodes)?;
                    graph.theta_add_loop_var(theta, origin)?;
                }
                let sub = graph.theta_subregion(theta);
                check_signature(graph, sub, subregion)?;
                let sub_nodes = build_nodes(graph, sub, subregion)?;
                if subregion.results.len() != inits.len() + 1 {
                    return Err(IrError::invariant(
                        "theta subregion result count does not match loop variables",
                    ));
                }
                let predicate = decode_origin(&subregion.results[0], sub, &sub_nodes)?;
                graph.theta_set_predicate(theta, predicate)?;
                for index in 0..inits.len() {
                    let origin = decode_origin(&subregion.results[index + 1], sub, &sub_nodes)?;
                    graph.theta_set_loop_var_result(theta, index, origin)?;
                }
                theta
            }
            SerializedNode::Lambda {
                name,
                linkage,
                ty,
                ctx,
                subregion,
            } => {
                let lambda = graph.add_lambda(region, name.clone(), ty.clone(), *linkage)?;
                for entry in ctx {
                    let origin = decode_origin(entry, region, &nodes)?;
                    graph.lambda_add_ctx_var(lambda, origin)?;
                }
                let sub = graph.lambda_subregion(lambda);
                check_signature(graph, sub, subregion)?;
                let sub_nodes = build_nodes(graph, sub, subregion)?;
                let results = decode_origins(&subregion.results, sub, &sub_nodes)?;
                graph.lambda_finalize(lambda, &results)?;
                lambda
            }
            SerializedNode::Delta {
                name,
                linkage,
                section,
                constant,
                value_type,
                ctx,
                subregion,
            } => {
                let delta =
                    graph.add_delta(region, name.clone(), value_type.clone(), *linkage, *constant)?;
                if let Some(section) = section {
                    graph.delta_set_section(delta, section.clone());
                }
                for entry in ctx {
                    let origin = decode_origin(entry, region, &nodes)?;
                    graph.delta_add_ctx_var(delta, origin)?;
                }
                let sub = graph.delta_subregion(delta);
                check_signature(graph, sub, subregion)?;
                let sub_nodes = build_nodes(graph, sub, subregion)?;
                if subregion.results.len() != 1 {
                    return Err(IrError::invariant(
                        "delta subregion must have exactly one result",
                    ));
                }
                let initializer = decode_origin(&subregion.results[0], sub, &sub_nodes)?;
                graph.delta_finalize(delta, initializer)?;
                delta
            }
            SerializedNode::Phi {
                rec_types,
                ctx,
                subregion,
            } => {
                let phi = graph.add_phi(region)?;
                for ty in rec_types {
                    graph.phi_add_rec_var(phi, ty.clone())?;
                }
                for entry in ctx {
                    let origin = decode_origin(entry, region, &nodes)?;
                    graph.phi_add_ctx_var(phi, origin)?;
                }
                let sub = graph.phi_subregion(phi);
                check_signature(graph, sub, subregion)?;
                let sub_nodes = build_nodes(graph, sub, subregion)?;
                if subregion.results.len() != rec_types.len() {
                    return Err(IrError::invariant(
                        "phi subregion result count does not match recursion variables",
                    ));
                }
                for (index, result) in subregion.results.iter().enumerate() {
                    let origin = decode_origin(result, sub, &sub_nodes)?;
                    graph.phi_set_rec_var(phi, index, origin)?;
                }
                graph.phi_finalize(phi)?;
                phi
            }
        };
        nodes.push(node);
    }
    Ok(nodes)
}

/// Rebuild a graph from its serialized form.
pub fn deserialize_graph(versioned: &VersionedGraph) -> Result<Graph, IrError> {
    let serialized = &versioned.graph;
    let mut graph = Graph::new();
    for import in &serialized.imports {
        graph.add_import(GraphImport {
            name: import.name.clone(),
            linkage: import.linkage,
            ty: import.ty.clone(),
        });
    }
    let root = graph.root();
    check_signature(&graph, root, &serialized.root)?;
    let nodes = build_nodes(&mut graph, root, &serialized.root)?;
    if serialized.root.results.len() != serialized.exports.len() {
        return Err(IrError::invariant(
            "root results and exports disagree in count",
        ));
    }
    for (export, result) in serialized.exports.iter().zip(&serialized.root.results) {
        let origin = decode_origin(result, root, &nodes)?;
        graph.add_export(origin, export.name.clone())?;
    }
    Ok(graph)
}

/// Structural graph equality, decided on the canonical serialized form.
pub fn are_graphs_equivalent(a: &Graph, b: &Graph) -> Result<bool, IrError> {
    Ok(serialize_graph(a)?.graph == serialize_graph(b)?.graph)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn import(graph: &mut Graph, name: &str, ty: Type) -> Origin {
        graph.add_import(GraphImport {
            name: name.into(),
            linkage: Linkage::External,
            ty,
        })
    }

    #[test]
    fn test_simple_graph_roundtrip() {
        let mut graph = Graph::new();
        let x = import(&mut graph, "x", Type::Bits(32));
        let y = import(&mut graph, "y", Type::Bits(32));
        let root = graph.root();
        let sum = graph
            .add_simple_node(root, Box::new(BitAdd::new(32)), &[x, y])
            .unwrap();
        graph.add_export(sum[0], "sum").unwrap();

        let serialized = serialize_graph(&graph).unwrap();
        let json = serialized.to_json_pretty().unwrap();
        let parsed = VersionedGraph::from_json(&json).unwrap();
        let rebuilt = deserialize_graph(&parsed).unwrap();
        assert!(are_graphs_equivalent(&graph, &rebuilt).unwrap());
    }

    #[test]
    fn test_structural_roundtrip() {
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

        let serialized = serialize_graph(&graph).unwrap();
        let rebuilt = deserialize_graph(&serialized).unwrap();
        assert!(are_graphs_equivalent(&graph, &rebuilt).unwrap());
        assert!(rebuilt.validate().is_ok());
    }

    #[test]
    fn test_theta_roundtrip_drops_orphaned_seed() {
        let mut graph = Graph::new();
        let x = import(&mut graph, "x", Type::Bits(32));
        let root = graph.root();
        let theta = graph.add_theta(root).unwrap();
        let v = graph.theta_add_loop_var(theta, x).unwrap();
        graph.add_export(graph.theta_output(theta, v), "v").unwrap();

        // The freshly built theta still carries its seeded predicate.
        let serialized = serialize_graph(&graph).unwrap();
        let rebuilt = deserialize_graph(&serialized).unwrap();
        assert!(are_graphs_equivalent(&graph, &rebuilt).unwrap());
    }

    #[test]
    fn test_foreign_operator_is_rejected() {
        use crate::operator::{Operator, OperatorClass};

        #[derive(Debug, Clone)]
        struct Opaque;
        impl Operator for Opaque {
            fn operand_types(&self) -> &[Type] {
                &[]
            }
            fn result_types(&self) -> &[Type] {
                const RESULT: [Type; 1] = [Type::Pointer];
                &RESULT
            }
            fn debug_string(&self) -> String {
                "opaque".into()
            }
            fn eq_operator(&self, other: &dyn Operator) -> bool {
                other.as_any().is::<Opaque>()
            }
            fn copy_operator(&self) -> Box<dyn Operator> {
                Box::new(self.clone())
            }
            fn class(&self) -> OperatorClass {
                OperatorClass::of::<Opaque>()
            }
            fn as_any(&self) -> &dyn std::any::Any {
                self
            }
        }

        let mut graph = Graph::new();
        let root = graph.root();
        let out = graph
            .add_simple_node(root, Box::new(Opaque), &[])
            .unwrap();
        graph.add_export(out[0], "o").unwrap();
        let err = serialize_graph(&graph).unwrap_err();
        assert!(matches!(err, IrError::UnknownOperator { .. }));
    }
}
