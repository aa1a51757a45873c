//! The expression algebra: literals, variable reads, address-of, and node
//! pointers.

use serde::{Deserialize, Serialize};

use crate::context::ExecutionContext;
use crate::value::{Value, ValueKind};

/// Which node a `NodePtr` expression refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeSpecifier {
    CurrentNode,
    RootNode,
}

/// One expression, identified by its index within the owning `Function`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Expression {
    Literal(Value),
    VariableRead(ValueKind, String),
    VariableAddress(String),
    NodePtr(NodeSpecifier),
}

impl Expression {
    pub fn kind(&self) -> ValueKind {
        match self {
            Expression::Literal(v) => v.kind(),
            Expression::VariableRead(kind, _) => *kind,
            Expression::VariableAddress(_) => ValueKind::ValuePtr,
            Expression::NodePtr(_) => ValueKind::NodePtr,
        }
    }

    /// Indices (and expected kinds) of the sub-expressions this expression
    /// depends on. None of the four concrete kinds declare any, matching
    /// the source engine where only derived expression classes would
    /// override `getDependency`'s no-op default.
    pub fn dependencies(&self) -> &[(usize, ValueKind)] {
        &[]
    }

    /// Bare variable names this expression references, for the
    /// local-or-extern resolution check performed at function-validate time.
    pub fn variable_name_reference(&self) -> Option<&str> {
        match self {
            Expression::VariableRead(_, name) | Expression::VariableAddress(name) => Some(name),
            _ => None,
        }
    }

    /// Evaluates this expression in the current frame. `dependent_results`
    /// holds the already-evaluated results of `dependencies()`, in order
    /// (always empty for the kinds implemented here). Returns `None` on a
    /// fatal runtime error; the context has already emitted a diagnostic.
    pub fn evaluate(&self, ctx: &mut ExecutionContext<'_>, dependent_results: &[Value]) -> Option<Value> {
        let _ = dependent_results;
        match self {
            Expression::Literal(value) => Some(value.clone()),
            Expression::VariableRead(kind, name) => ctx.read_by_name(name, *kind),
            Expression::VariableAddress(name) => ctx.take_address_by_name(name).map(Value::ValuePtr),
            Expression::NodePtr(NodeSpecifier::CurrentNode) => Some(Value::NodePtr(ctx.current_node_ptr())),
            Expression::NodePtr(NodeSpecifier::RootNode) => Some(Value::NodePtr(ctx.root_node_ptr())),
        }
    }
}
