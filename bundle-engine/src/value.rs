use serde::{Deserialize, Serialize};

/// The five value kinds every node parameter, local variable, and expression
/// result is tagged with. `Void` only ever appears as an expression or
/// statement's absence of a useful result; it is never a valid kind for an
/// IR parameter, a local variable, or a stored [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    Void,
    Int64,
    String,
    NodePtr,
    ValuePtr,
}

impl ValueKind {
    /// IR node parameters may only ever declare these two kinds.
    pub fn is_valid_ir_param_kind(self) -> bool {
        matches!(self, ValueKind::Int64 | ValueKind::String)
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ValueKind::Void => "Void",
            ValueKind::Int64 => "Int64",
            ValueKind::String => "String",
            ValueKind::NodePtr => "NodePtr",
            ValueKind::ValuePtr => "ValuePtr",
        }
    }
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Metadata stamped onto every pointer at the moment it is created: which
/// function, which statement, and which activation of that function. Used
/// only for diagnostics text and for deciding whether a `ValuePtr` into a
/// call frame is still live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointerHead {
    pub function_index: i64,
    pub stmt_index: i64,
    pub activation_index: u64,
}

impl PointerHead {
    pub fn new(function_index: i64, stmt_index: i64, activation_index: u64) -> Self {
        PointerHead {
            function_index,
            stmt_index,
            activation_index,
        }
    }
}

/// A pointer into the IR tree. `node_index < 0` is the null node pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodePtr {
    pub head: PointerHead,
    pub node_index: i64,
}

impl NodePtr {
    pub fn null(head: PointerHead) -> Self {
        NodePtr {
            head,
            node_index: -1,
        }
    }

    pub fn is_null(self) -> bool {
        self.node_index < 0
    }
}

/// The kind of storage a `ValuePtr` targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValuePtrKind {
    Null,
    LocalVariable,
    NodeRWMember,
    NodeROParameter,
    GlobalVariable,
}

/// A pointer to a value slot: a local variable in some activation, a
/// per-node read/write member, a read-only schema parameter, or a global.
/// `node_index` is only meaningful for the two `Node*` kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValuePtr {
    pub head: PointerHead,
    pub kind: ValuePtrKind,
    pub value_index: i64,
    pub node_index: i64,
}

impl ValuePtr {
    pub fn null(head: PointerHead) -> Self {
        ValuePtr {
            head,
            kind: ValuePtrKind::Null,
            value_index: -1,
            node_index: -1,
        }
    }

    pub fn is_null(self) -> bool {
        matches!(self.kind, ValuePtrKind::Null)
    }
}

/// A runtime value. Uninitialized storage is modeled by the *absence* of a
/// `Value` at a slot (`Option<Value>` is `None`), not by a sixth variant
/// here; this keeps the tagged union itself a plain four-shape enum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int64(i64),
    String(String),
    NodePtr(NodePtr),
    ValuePtr(ValuePtr),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Int64(_) => ValueKind::Int64,
            Value::String(_) => ValueKind::String,
            Value::NodePtr(_) => ValueKind::NodePtr,
            Value::ValuePtr(_) => ValueKind::ValuePtr,
        }
    }

    /// The zero value for a declared kind, used to default-initialize a slot
    /// on first (uninitialized) read. `Void` has no zero value.
    pub fn zero_of(kind: ValueKind, head: PointerHead) -> Option<Value> {
        match kind {
            ValueKind::Int64 => Some(Value::Int64(0)),
            ValueKind::String => Some(Value::String(String::new())),
            ValueKind::NodePtr => Some(Value::NodePtr(NodePtr::null(head))),
            ValueKind::ValuePtr => Some(Value::ValuePtr(ValuePtr::null(head))),
            ValueKind::Void => None,
        }
    }

    /// Truthiness used by `Branch` conditions: a non-zero `Int64` or a
    /// non-null `ValuePtr`. Any other kind is not a valid branch condition
    /// and is rejected before this is ever called.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Int64(i) => *i != 0,
            Value::ValuePtr(p) => !p.is_null(),
            Value::String(_) | Value::NodePtr(_) => false,
        }
    }

    pub fn as_int64(&self) -> Option<i64> {
        match self {
            Value::Int64(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_node_ptr(&self) -> Option<NodePtr> {
        match self {
            Value::NodePtr(p) => Some(*p),
            _ => None,
        }
    }

    pub fn as_value_ptr(&self) -> Option<ValuePtr> {
        match self {
            Value::ValuePtr(p) => Some(*p),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn head() -> PointerHead {
        PointerHead::new(1, 2, 3)
    }

    #[test]
    fn zero_of_yields_declared_kind_zero_value() {
        assert_eq!(Value::zero_of(ValueKind::Int64, head()), Some(Value::Int64(0)));
        assert_eq!(Value::zero_of(ValueKind::String, head()), Some(Value::String(String::new())));
        assert_eq!(Value::zero_of(ValueKind::NodePtr, head()), Some(Value::NodePtr(NodePtr::null(head()))));
        assert_eq!(Value::zero_of(ValueKind::ValuePtr, head()), Some(Value::ValuePtr(ValuePtr::null(head()))));
        assert_eq!(Value::zero_of(ValueKind::Void, head()), None);
    }

    #[test]
    fn truthiness_matches_branch_condition_rules() {
        assert!(!Value::Int64(0).is_truthy());
        assert!(Value::Int64(1).is_truthy());
        assert!(Value::Int64(-1).is_truthy());
        assert!(!Value::ValuePtr(ValuePtr::null(head())).is_truthy());
        let mut non_null = ValuePtr::null(head());
        non_null.kind = ValuePtrKind::GlobalVariable;
        non_null.value_index = 0;
        assert!(Value::ValuePtr(non_null).is_truthy());
        assert!(!Value::String("anything".to_string()).is_truthy());
        assert!(!Value::NodePtr(NodePtr::null(head())).is_truthy());
    }

    #[test]
    fn node_ptr_null_is_negative_index() {
        let p = NodePtr::null(head());
        assert!(p.is_null());
        assert!(p.node_index < 0);
    }

    #[test]
    fn is_valid_ir_param_kind_excludes_void_and_pointers() {
        assert!(ValueKind::Int64.is_valid_ir_param_kind());
        assert!(ValueKind::String.is_valid_ir_param_kind());
        assert!(!ValueKind::Void.is_valid_ir_param_kind());
        assert!(!ValueKind::NodePtr.is_valid_ir_param_kind());
        assert!(!ValueKind::ValuePtr.is_valid_ir_param_kind());
    }
}
