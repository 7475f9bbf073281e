//! # rvsdg-ir
//!
//! **Regionalized Value State Dependence Graph kernel and rewrite engine**
//!
//! This crate provides the intermediate representation at the center of
//! a compiler middle-end: a hierarchical, demand-driven graph in which
//! computation is a DAG of operator nodes connected by typed value
//! edges, with explicit *state* edges serializing side effects. A
//! front-end lifts a control-flow-graph IR into this representation;
//! passes rewrite it equationally, free of implicit sequencing; a
//! back-end lowers it to a CFG again. Only the kernel lives here; the
//! translations and code generators are separate components built on
//! the construction and traversal APIs.
//!
//! ## Core components
//!
//! ### Types ([`Type`])
//! A small closed hierarchy: bitstrings, floats, control tokens, state
//! tokens, pointers, arrays, records and function signatures. Equality
//! is structural, values are immutable and cheap to clone.
//!
//! ### Operators ([`Operator`], [`BinaryOperator`])
//! Immutable descriptors of primitive computations with typed operand
//! and result ports. Binary operators additionally carry associativity
//! and commutativity flags and the pair of reduction hooks driving the
//! algebraic rewrites.
//!
//! ### Graph, regions and nodes ([`Graph`], [`Region`], [`Node`])
//! A graph owns a root region; regions own nodes; the five structural
//! node kinds (γ predicated choice, θ tail-controlled loop, λ function,
//! δ global, φ recursion group) own nested
//! subregions, with every cross-region flow made explicit by entry,
//! exit, loop, context and recursion variable mappings.
//!
//! ### Normal forms ([`NormalForm`])
//! Every operator class carries a behavior record consulted on node
//! creation and by [`Graph::normalize`]: common-subexpression reuse,
//! constant folding, neutral and absorbing elements, associative
//! flattening, commutative reordering, and the memory-operator
//! catalogue (store/store, store/mux, store/alloca, load/store,
//! load/load, load/alloca, duplicate-state elimination). Each rewrite
//! is individually toggleable.
//!
//! ### Passes
//! Free functions over the graph: dead-node pruning
//! ([`Graph::prune`]), region-level CSE
//! ([`eliminate_common_subexpressions`]), flattened-binary collapsing
//! ([`reduce_flattened`]) and the [`optimize_graph`] fixpoint driver.
//!
//! ## Quick start
//!
//! ```rust
//! use rvsdg_ir::ops::bitstring::BitAdd;
//! use rvsdg_ir::{Graph, GraphImport, Linkage, Type};
//!
//! let mut graph = Graph::new();
//! let x = graph.add_import(GraphImport {
//!     name: "x".into(),
//!     linkage: Linkage::External,
//!     ty: Type::Bits(32),
//! });
//! let root = graph.root();
//! let sum = graph
//!     .add_simple_node(root, Box::new(BitAdd::new(32)), &[x, x])
//!     .unwrap();
//! graph.add_export(sum[0], "twice").unwrap();
//! assert!(graph.validate().is_ok());
//! ```
//!
//! ## Concurrency
//!
//! A graph is a plain owned value: one mutator at a time, enforced by
//! the borrow rules. Distinct graphs are independent and may live on
//! different threads.

mod binary;
mod display;
mod error;
mod graph;
mod operator;
pub mod ops;
mod serialization;
mod types;

#[cfg(test)]
mod tests;

pub use binary::{
    reduce_flattened, reduce_flattened_operands, BinaryFlags, BinaryNormalForm, BinaryOperator,
    FlattenedBinary, FlattenedBinaryNormalForm, FlattenedReduction, ReductionPath,
};
pub use display::{graph_stats, view, GraphStats};
pub use error::IrError;
pub use graph::copy::{copy_node, copy_region_contents, Substitution};
pub use graph::delta::DeltaData;
pub use graph::gamma::{normalize_gamma, GammaData};
pub use graph::lambda::LambdaData;
pub use graph::normal_form::{NormalForm, NormalFormFlags, SimpleNormalForm};
pub use graph::optimization::{
    eliminate_common_subexpressions, optimize_graph, OptimizationStats,
};
pub use graph::phi::PhiData;
pub use graph::theta::{normalize_theta, ThetaData};
pub use graph::validation::{validate_graph, ValidationReport};
pub use graph::{
    Graph, GraphExport, GraphImport, Linkage, Node, NodeKind, Origin, Region, User,
};
pub use operator::{Operator, OperatorClass};
pub use serialization::{
    are_graphs_equivalent, deserialize_graph, serialize_graph, SerializedGraph, VersionedGraph,
    FORMAT_VERSION,
};
pub use types::{FloatSize, Type};
