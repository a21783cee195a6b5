//! Immutable computation-graph nodes.
//!
//! A graph is a DAG of reference-counted [`Node`]s. Construction is the only
//! mutation point: once built, a node never changes, so subgraphs are shared
//! freely across graphs and threads and rewrites reuse untouched branches by
//! handle instead of copying them.
//!
//! Typed construction goes through
//! [`OpRegistry::apply`](crate::ops::OpRegistry::apply), which checks input
//! types against the op signature. The raw [`Node::output`] constructor does
//! not re-check and exists for the registry and the wire decoder.

use std::fmt;
use std::sync::Arc;

use lace_result::{Error, Result};
use lace_types::{Type, Value};

/// Shared handle to an immutable graph node.
pub type NodeRef = Arc<Node>;

/// One node of a computation graph.
///
/// Structural equality compares the full subtree; use [`Arc::ptr_eq`] when
/// handle identity is what matters (e.g. asserting that a rewrite reused a
/// branch instead of rebuilding an equal one).
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// A literal embedded in the graph.
    Const { ty: Type, value: Value },
    /// An operation applied to input nodes.
    Output {
        op: String,
        ty: Type,
        inputs: Vec<NodeRef>,
    },
}

impl Node {
    /// Constant node with its type inferred from the value.
    pub fn constant(value: impl Into<Value>) -> NodeRef {
        let value = value.into();
        let ty = value.ty();
        Arc::new(Node::Const { ty, value })
    }

    /// Constant node with an explicit (usually wider) type annotation.
    ///
    /// Errors when the value does not fit the annotation; the inferred type
    /// must be assignable to `ty`.
    pub fn constant_typed(ty: Type, value: impl Into<Value>) -> Result<NodeRef> {
        let value = value.into();
        let inferred = value.ty();
        if !ty.assign_type(&inferred) {
            return Err(Error::type_mismatch("const", "value", &ty, &inferred));
        }
        Ok(Arc::new(Node::Const { ty, value }))
    }

    /// Output node with a caller-supplied output type.
    ///
    /// Does not validate `ty` against the op's signature;
    /// [`OpRegistry::apply`](crate::ops::OpRegistry::apply) is the checked
    /// path for client code.
    pub fn output(op: impl Into<String>, ty: Type, inputs: Vec<NodeRef>) -> NodeRef {
        Arc::new(Node::Output {
            op: op.into(),
            ty,
            inputs,
        })
    }

    /// The declared output type of this node.
    pub fn ty(&self) -> &Type {
        match self {
            Node::Const { ty, .. } | Node::Output { ty, .. } => ty,
        }
    }

    /// The op name for output nodes, `None` for constants.
    pub fn op(&self) -> Option<&str> {
        match self {
            Node::Const { .. } => None,
            Node::Output { op, .. } => Some(op),
        }
    }

    /// Input nodes in declaration order; empty for constants.
    pub fn inputs(&self) -> &[NodeRef] {
        match self {
            Node::Const { .. } => &[],
            Node::Output { inputs, .. } => inputs,
        }
    }

    /// The literal value for constant nodes.
    pub fn as_const(&self) -> Option<&Value> {
        match self {
            Node::Const { value, .. } => Some(value),
            Node::Output { .. } => None,
        }
    }

    pub fn is_const(&self) -> bool {
        matches!(self, Node::Const { .. })
    }

    /// Number of nodes in this subtree counting shared nodes once.
    pub fn node_count(self: &Arc<Self>) -> usize {
        fn walk(node: &NodeRef, seen: &mut Vec<*const Node>) {
            let ptr = Arc::as_ptr(node);
            if seen.contains(&ptr) {
                return;
            }
            seen.push(ptr);
            for input in node.inputs() {
                walk(input, seen);
            }
        }
        let mut seen = Vec::new();
        walk(self, &mut seen);
        seen.len()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Const { value, .. } => write!(f, "{}", value),
            Node::Output { op, inputs, .. } => {
                write!(f, "{}(", op)?;
                for (i, input) in inputs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", input)?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_infers_type() {
        let node = Node::constant(42i64);
        assert_eq!(node.ty(), &Type::INT);
        assert_eq!(node.as_const(), Some(&Value::Int(42)));
        assert!(node.inputs().is_empty());
    }

    #[test]
    fn test_constant_typed_rejects_misfit() {
        let ok = Node::constant_typed(Type::optional(Type::INT), Value::Null);
        assert!(ok.is_ok());
        let err = Node::constant_typed(Type::INT, "hello");
        assert!(err.is_err());
    }

    #[test]
    fn test_display_renders_call_shape() {
        let lhs = Node::constant(1i64);
        let rhs = Node::constant(2i64);
        let node = Node::output("eq", Type::BOOL, vec![lhs, rhs]);
        assert_eq!(node.to_string(), "eq(1, 2)");
    }

    #[test]
    fn test_node_count_counts_shared_once() {
        let shared = Node::constant(1i64);
        let left = Node::output("eq", Type::BOOL, vec![shared.clone(), shared.clone()]);
        assert_eq!(left.node_count(), 2);
    }
}
