//! λ nodes: function definitions.
//!
//! A λ node owns one subregion whose arguments are the closed-over
//! context variables followed by the formal parameters, and whose
//! results are the function's return values. Its single output is a
//! callable value of the function type. Context variables are the only
//! path by which surrounding values enter the body.

use crate::error::IrError;
use crate::graph::{Graph, Linkage, Node, NodeKind, Origin, Region};
use crate::types::Type;

#[derive(Debug)]
pub struct LambdaData {
    pub(crate) subregion: Region,
    pub(crate) name: String,
    pub(crate) linkage: Linkage,
    pub(crate) ty: Type,
    pub(crate) n_ctx: usize,
    pub(crate) finalized: bool,
}

impl Graph {
    fn lambda_data(&self, node: Node) -> &LambdaData {
        match &self.node(node).kind {
            NodeKind::Lambda(data) => data,
            _ => panic!("{} is not a lambda node", node),
        }
    }

    /// Create a function definition of type `ty` (which must be a
    /// `Type::Function`). The subregion starts with one argument per
    /// formal parameter.
    pub fn add_lambda(
        &mut self,
        region: Region,
        name: impl Into<String>,
        ty: Type,
        linkage: Linkage,
    ) -> Result<Node, IrError> {
        let parameters = match &ty {
            Type::Function { arguments, .. } => arguments.clone(),
            _ => {
                return Err(IrError::invariant(
                    "a lambda node requires a function type",
                ))
            }
        };
        let node = self.create_structural_node(
            region,
            NodeKind::Lambda(LambdaData {
                subregion: Region(u32::MAX),
                name: name.into(),
                linkage,
                ty,
                n_ctx: 0,
                finalized: false,
            }),
            &[],
        )?;
        let sub = self.alloc_region(Some(node));
        match &mut self.node_mut(node).kind {
            NodeKind::Lambda(data) => data.subregion = sub,
            _ => unreachable!(),
        }
        for ty in parameters {
            self.push_argument(sub, ty);
        }
        Ok(node)
    }

    pub fn lambda_subregion(&self, lambda: Node) -> Region {
        self.lambda_data(lambda).subregion
    }

    pub fn lambda_name(&self, lambda: Node) -> &str {
        &self.lambda_data(lambda).name
    }

    pub fn lambda_linkage(&self, lambda: Node) -> Linkage {
        self.lambda_data(lambda).linkage
    }

    pub fn lambda_type(&self, lambda: Node) -> &Type {
        &self.lambda_data(lambda).ty
    }

    pub fn lambda_n_ctx_vars(&self, lambda: Node) -> usize {
        self.lambda_data(lambda).n_ctx
    }

    pub fn lambda_n_parameters(&self, lambda: Node) -> usize {
        let data = self.lambda_data(lambda);
        self.n_arguments(data.subregion) - data.n_ctx
    }

    /// The body-side argument of formal parameter `index`.
    pub fn lambda_parameter(&self, lambda: Node, index: usize) -> Origin {
        let data = self.lambda_data(lambda);
        debug_assert!(index < self.lambda_n_parameters(lambda));
        Origin::Argument {
            region: data.subregion,
            index: data.n_ctx + index,
        }
    }

    /// The body-side argument of context variable `index`.
    pub fn lambda_ctx_argument(&self, lambda: Node, index: usize) -> Origin {
        let data = self.lambda_data(lambda);
        debug_assert!(index < data.n_ctx);
        Origin::Argument {
            region: data.subregion,
            index,
        }
    }

    /// Close over `origin`: adds input `n_ctx` and inserts the matching
    /// argument before the formal parameters, renumbering them.
    pub fn lambda_add_ctx_var(&mut self, lambda: Node, origin: Origin) -> Result<Origin, IrError> {
        let ty = self.origin_type(origin).clone();
        self.push_input(lambda, origin, ty.clone())?;
        let (sub, position) = {
            let data = self.lambda_data(lambda);
            (data.subregion, data.n_ctx)
        };
        let argument = self.insert_argument(sub, position, ty);
        match &mut self.node_mut(lambda).kind {
            NodeKind::Lambda(data) => data.n_ctx += 1,
            _ => unreachable!(),
        }
        Ok(argument)
    }

    /// Bind the function's return values and materialize the callable
    /// output.
    pub fn lambda_finalize(&mut self, lambda: Node, results: &[Origin]) -> Result<Origin, IrError> {
        let data = self.lambda_data(lambda);
        if data.finalized {
            return Err(IrError::invariant("lambda is already finalized"));
        }
        let sub = data.subregion;
        let ty = data.ty.clone();
        let expected = match &ty {
            Type::Function { results, .. } => results.clone(),
            _ => unreachable!(),
        };
        if results.len() != expected.len() {
            return Err(IrError::ArityMismatch {
                what: format!("results of lambda {}", self.lambda_name(lambda)),
                expected: expected.len(),
                actual: results.len(),
            });
        }
        for (origin, ty) in results.iter().zip(&expected) {
            self.check_origin(sub, *origin, ty)?;
        }
        for origin in results {
            self.push_result(sub, *origin)?;
        }
        match &mut self.node_mut(lambda).kind {
            NodeKind::Lambda(data) => data.finalized = true,
            _ => unreachable!(),
        }
        Ok(self.push_output(lambda, ty))
    }

    /// The callable value produced by a finalized λ.
    pub fn lambda_output(&self, lambda: Node) -> Origin {
        self.output(lambda, 0)
    }
}

/// Drop context variables whose body-side argument is unused, then
/// prune the body.
pub(crate) fn prune_lambda(graph: &mut Graph, lambda: Node) -> Result<usize, IrError> {
    let sub = graph.lambda_subregion(lambda);
    for index in (0..graph.lambda_n_ctx_vars(lambda)).rev() {
        let argument = Origin::Argument {
            region: sub,
            index,
        };
        if !graph.users(argument).is_empty() {
            continue;
        }
        graph.remove_input(lambda, index);
        graph.remove_argument(sub, index)?;
        match &mut graph.node_mut(lambda).kind {
            NodeKind::Lambda(data) => data.n_ctx -= 1,
            _ => unreachable!(),
        }
    }
    graph.prune_region(sub)
}
