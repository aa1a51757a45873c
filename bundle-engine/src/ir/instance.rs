//! A concrete tree conforming to a `RootType`.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::debug_span;

use crate::diagnostics::{DiagnosticId, Diagnostics};
use crate::ir::schema::RootType;
use crate::value::Value;

/// The hashable projection of a `Value` used as a uniqueness key. Only
/// `Int64` and `String` ever appear here since those are the only kinds an
/// IR parameter may declare.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyValue {
    Int64(i64),
    Str(String),
}

impl KeyValue {
    fn from_value(value: &Value) -> Option<KeyValue> {
        match value {
            Value::Int64(i) => Some(KeyValue::Int64(*i)),
            Value::String(s) => Some(KeyValue::Str(s.clone())),
            _ => None,
        }
    }
}

impl std::fmt::Display for KeyValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyValue::Int64(i) => write!(f, "{i}"),
            KeyValue::Str(s) => write!(f, "{s}"),
        }
    }
}

/// The records built, for one node instance, for one of its permitted child
/// node types: the sibling list and the per-unique-parameter lookup table.
#[derive(Debug, Clone, Default)]
struct ChildTypeRecord {
    node_type_index: usize,
    node_list: Vec<usize>,
    per_param_hash: HashMap<usize, HashMap<KeyValue, usize>>,
}

/// A single node in a `RootInstance`. `type_index` and `node_index` are
/// fixed at construction; `node_index` equals this node's position in the
/// owning `RootInstance`'s node list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeInstance {
    pub type_index: usize,
    pub node_index: usize,
    pub parent_index: i64,
    pub parameters: Vec<Value>,
    pub child_node_list: Vec<usize>,

    #[serde(skip)]
    child_node_type_index_to_local: HashMap<usize, usize>,
    #[serde(skip)]
    child_type_records: Vec<ChildTypeRecord>,
}

impl NodeInstance {
    pub fn new(type_index: usize, node_index: usize, parent_index: i64, parameters: Vec<Value>) -> Self {
        NodeInstance {
            type_index,
            node_index,
            parent_index,
            parameters,
            child_node_list: Vec::new(),
            child_node_type_index_to_local: HashMap::new(),
            child_type_records: Vec::new(),
        }
    }

    /// Looks up a previously-resolved child by a unique parameter's value.
    /// A miss is not an error: it yields `None`, and callers translate that
    /// into a null `NodePtr`.
    fn lookup_child(&self, child_type_index: usize, param_index: usize, key: &KeyValue) -> Option<usize> {
        let local = *self.child_node_type_index_to_local.get(&child_type_index)?;
        let record = self.child_type_records.get(local)?;
        record.per_param_hash.get(&param_index)?.get(key).copied()
    }

    pub fn find_child_by_primary_key(&self, child_type_index: usize, primary_key_index: usize, key_value: &Value) -> Option<usize> {
        let key = KeyValue::from_value(key_value)?;
        self.lookup_child(child_type_index, primary_key_index, &key)
    }

    pub fn find_child_by_param(&self, child_type_index: usize, param_index: usize, key_value: &Value) -> Option<usize> {
        let key = KeyValue::from_value(key_value)?;
        self.lookup_child(child_type_index, param_index, &key)
    }
}

/// An ordered tree of `NodeInstance`s conforming to a `RootType`. Position 0
/// is always the root. Unlike the source engine, this does not keep a
/// reference to its `RootType` across its lifetime — `validate` and later
/// traversal both take `&RootType` explicitly, which keeps `Task` and
/// `ExecutionContext` free of an extra lifetime parameter while preserving
/// the read-only contract the schema reference exists for.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RootInstance {
    nodes: Vec<NodeInstance>,

    #[serde(skip)]
    validated: bool,
}

impl RootInstance {
    pub fn new() -> Self {
        RootInstance::default()
    }

    pub fn add_node(&mut self, node: NodeInstance) -> usize {
        let index = self.nodes.len();
        self.nodes.push(node);
        index
    }

    pub fn add_child(&mut self, parent_index: usize, child_index: usize) {
        self.nodes[parent_index].child_node_list.push(child_index);
    }

    pub fn nodes(&self) -> &[NodeInstance] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> &NodeInstance {
        &self.nodes[index]
    }

    pub fn root_node(&self) -> &NodeInstance {
        &self.nodes[0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn validated(&self) -> bool {
        self.validated
    }

    pub fn validate(&mut self, diag: &mut Diagnostics, schema: &RootType) -> bool {
        let _span = debug_span!("RootInstance::validate").entered();
        let _guard = diag.scoped_node("Root");

        if self.nodes.is_empty() {
            _guard.emit0(DiagnosticId::Error_IR_BadTree_EmptyTree);
            self.validated = false;
            return false;
        }

        let mut ok = true;
        // -2 means unreached; any other value is the traversal parent that
        // first reached this node.
        let mut reached: Vec<i64> = vec![-2; self.nodes.len()];
        let mut queue: VecDeque<(i64, usize)> = VecDeque::new();
        queue.push_back((-1, 0));

        while let Some((parent, current)) = queue.pop_front() {
            let mut node_good = true;

            if reached[current] != -2 {
                _guard.emit(
                    DiagnosticId::Error_IR_BadTree_DuplicatedReference_ChildNode,
                    vec![(current as i64).into(), reached[current].into(), parent.into()],
                );
                ok = false;
                node_good = false;
            } else if current as i64 <= parent {
                _guard.emit(
                    DiagnosticId::Error_IR_BadTree_BadNodeOrder,
                    vec![(current as i64).into(), parent.into()],
                );
                ok = false;
                node_good = false;
            } else if self.nodes[current].parent_index != parent {
                _guard.emit(
                    DiagnosticId::Error_IR_BadTree_ConflictingParentReference,
                    vec![(current as i64).into(), self.nodes[current].parent_index.into(), parent.into()],
                );
                ok = false;
                node_good = false;
            } else if self.nodes[current].type_index >= schema.node_types().len() {
                _guard.emit(
                    DiagnosticId::Error_IR_BadTree_BadNodeTypeIndex,
                    vec![(current as i64).into(), (self.nodes[current].type_index as i64).into()],
                );
                ok = false;
                node_good = false;
            }

            if reached[current] == -2 {
                reached[current] = parent;
            }

            if node_good {
                for &child in &self.nodes[current].child_node_list.clone() {
                    queue.push_back((current as i64, child));
                }
            }
        }

        for (index, parent) in reached.iter().enumerate() {
            if *parent == -2 {
                _guard.emit(DiagnosticId::Error_IR_BadTree_UnreachableNode, vec![(index as i64).into()]);
                ok = false;
            }
        }

        if ok {
            ok = validate_node(&mut self.nodes, 0, schema, &mut *_guard);
        }

        self.validated = ok;
        ok
    }
}

/// Validates a single node instance: parameter shape, then recursively its
/// children, then (only if everything below it is good) the per-child-type
/// uniqueness constraints.
fn validate_node(nodes: &mut [NodeInstance], index: usize, schema: &RootType, diag: &mut Diagnostics) -> bool {
    let type_index = nodes[index].type_index;
    let node_type = schema.node_type(type_index);
    let mut ok = true;

    if nodes[index].parameters.len() != node_type.parameters().len() {
        diag.emit(
            DiagnosticId::Error_IR_BadParameterList_Count,
            vec![(node_type.parameters().len() as i64).into(), (nodes[index].parameters.len() as i64).into()],
        );
        ok = false;
    } else {
        for (param_index, decl) in node_type.parameters().iter().enumerate() {
            let actual_kind = nodes[index].parameters[param_index].kind();
            if actual_kind != decl.kind {
                diag.emit(
                    DiagnosticId::Error_IR_BadParameterList_Type,
                    vec![(param_index as i64).into(), decl.kind.into(), actual_kind.into()],
                );
                ok = false;
            }
        }
    }

    let mut local_index_map: HashMap<usize, usize> = HashMap::new();
    let mut records: Vec<ChildTypeRecord> = Vec::new();
    for child_type_name in node_type.child_node_types() {
        if let Some(global_index) = schema.get_node_type_index(child_type_name) {
            local_index_map.insert(global_index, records.len());
            records.push(ChildTypeRecord {
                node_type_index: global_index,
                node_list: Vec::new(),
                per_param_hash: HashMap::new(),
            });
        }
    }

    let child_node_list = nodes[index].child_node_list.clone();
    let mut child_type_good: Vec<bool> = vec![true; records.len()];
    for child_index in child_node_list {
        let child_type_index = nodes[child_index].type_index;
        match local_index_map.get(&child_type_index).copied() {
            None => {
                let name = schema.node_type(child_type_index).name().to_string();
                diag.emit(DiagnosticId::Error_IR_BadTree_UnexpectedChild, vec![name.into()]);
                ok = false;
            }
            Some(local_index) => {
                let child_ok = validate_node(nodes, child_index, schema, diag);
                if !child_ok {
                    child_type_good[local_index] = false;
                }
                records[local_index].node_list.push(child_index);
            }
        }
    }

    if ok {
        for (local_index, record) in records.iter_mut().enumerate() {
            if !child_type_good[local_index] {
                continue;
            }
            let child_type = schema.node_type(record.node_type_index);
            for (param_index, decl) in child_type.parameters().iter().enumerate() {
                if !decl.unique {
                    continue;
                }
                let mut hash: HashMap<KeyValue, usize> = HashMap::new();
                for &child_index in &record.node_list {
                    let value = &nodes[child_index].parameters[param_index];
                    let Some(key) = KeyValue::from_value(value) else {
                        continue;
                    };
                    match hash.get(&key) {
                        Some(&existing) => {
                            diag.emit(
                                DiagnosticId::Error_IR_BadTree_BrokenConstraint_ParamNotUnique,
                                vec![
                                    child_type.name().into(),
                                    decl.name.clone().into(),
                                    (existing as i64).into(),
                                    (child_index as i64).into(),
                                    key.to_string().into(),
                                ],
                            );
                            ok = false;
                        }
                        None => {
                            hash.insert(key, child_index);
                        }
                    }
                }
                record.per_param_hash.insert(param_index, hash);
            }
        }
    }

    nodes[index].child_node_type_index_to_local = local_index_map;
    nodes[index].child_type_records = records;

    ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::ir::schema::NodeType;

    /// `root -> speech*` where `speech.character` is unique and its primary key.
    fn schema() -> RootType {
        let mut root = RootType::new("HelloWorld");
        let mut root_ty = NodeType::new("root");
        root_ty.add_child_node("speech");
        let mut speech = NodeType::new("speech");
        speech.add_parameter("character", ValueKind::String, true);
        speech.add_parameter("text", ValueKind::String, false);
        speech.set_primary_key("character");
        root.add_node_type(root_ty);
        root.add_node_type(speech);
        root.set_root_node_type("root");
        let mut diag = Diagnostics::new();
        assert!(root.validate(&mut diag));
        root
    }

    fn speech(node_index: usize, parent: i64, character: &str, text: &str) -> NodeInstance {
        NodeInstance::new(1, node_index, parent, vec![Value::String(character.into()), Value::String(text.into())])
    }

    #[test]
    fn empty_tree_is_rejected() {
        let mut instance = RootInstance::new();
        let mut diag = Diagnostics::new();
        assert!(!instance.validate(&mut diag, &schema()));
        assert!(diag.records().iter().any(|r| r.id == DiagnosticId::Error_IR_BadTree_EmptyTree));
    }

    #[test]
    fn well_formed_tree_validates_and_builds_lookup() {
        let schema = schema();
        let mut instance = RootInstance::new();
        instance.add_node(NodeInstance::new(0, 0, -1, Vec::new()));
        instance.add_node(speech(1, 0, "TA", "Hello"));
        instance.add_child(0, 1);
        let mut diag = Diagnostics::new();
        assert!(instance.validate(&mut diag, &schema));

        let primary_key_index = schema.node_type(1).primary_key_index() as usize;
        let found = instance.root_node().find_child_by_primary_key(1, primary_key_index, &Value::String("TA".into()));
        assert_eq!(found, Some(1));
        let miss = instance.root_node().find_child_by_primary_key(1, primary_key_index, &Value::String("Nobody".into()));
        assert_eq!(miss, None);
    }

    #[test]
    fn zero_parameter_node_with_empty_parameter_list_succeeds() {
        let mut instance = RootInstance::new();
        instance.add_node(NodeInstance::new(0, 0, -1, Vec::new()));
        let mut diag = Diagnostics::new();
        assert!(instance.validate(&mut diag, &schema()));
    }

    #[test]
    fn bad_node_order_is_detected() {
        // `speech` nests under itself here so a not-yet-reached node (index
        // 1) can be referenced as the child of a node with a *higher* index
        // (2) without first tripping the duplicated-reference check.
        let mut root = RootType::new("Root");
        let mut root_ty = NodeType::new("root");
        root_ty.add_child_node("speech");
        let mut speech_ty = NodeType::new("speech");
        speech_ty.add_parameter("character", ValueKind::String, false);
        speech_ty.add_child_node("speech");
        root.add_node_type(root_ty);
        root.add_node_type(speech_ty);
        root.set_root_node_type("root");
        let mut schema_diag = Diagnostics::new();
        assert!(root.validate(&mut schema_diag));

        let mut instance = RootInstance::new();
        instance.add_node(NodeInstance::new(0, 0, -1, Vec::new()));
        instance.add_node(NodeInstance::new(1, 1, 2, vec![Value::String("inner".into())]));
        instance.add_node(NodeInstance::new(1, 2, 0, vec![Value::String("outer".into())]));
        instance.add_child(0, 2);
        instance.add_child(2, 1);
        let mut diag = Diagnostics::new();
        assert!(!instance.validate(&mut diag, &root));
        assert!(diag.records().iter().any(|r| r.id == DiagnosticId::Error_IR_BadTree_BadNodeOrder));
    }

    #[test]
    fn conflicting_parent_reference_is_detected() {
        let schema = schema();
        let mut instance = RootInstance::new();
        instance.add_node(NodeInstance::new(0, 0, -1, Vec::new()));
        // stored parent_index (-1, i.e. itself a root) disagrees with the
        // traversal parent (0) that reaches it as root's child.
        instance.add_node(speech(1, -1, "TA", "Hello"));
        instance.add_child(0, 1);
        let mut diag = Diagnostics::new();
        assert!(!instance.validate(&mut diag, &schema));
        assert!(diag.records().iter().any(|r| r.id == DiagnosticId::Error_IR_BadTree_ConflictingParentReference));
    }

    #[test]
    fn duplicated_child_reference_is_detected() {
        let schema = schema();
        let mut instance = RootInstance::new();
        instance.add_node(NodeInstance::new(0, 0, -1, Vec::new()));
        instance.add_node(speech(1, 0, "TA", "Hello"));
        instance.add_child(0, 1);
        instance.add_child(0, 1);
        let mut diag = Diagnostics::new();
        assert!(!instance.validate(&mut diag, &schema));
        assert!(diag.records().iter().any(|r| r.id == DiagnosticId::Error_IR_BadTree_DuplicatedReference_ChildNode));
    }

    #[test]
    fn unreachable_node_is_detected() {
        let schema = schema();
        let mut instance = RootInstance::new();
        instance.add_node(NodeInstance::new(0, 0, -1, Vec::new()));
        // never linked in as a child of anything.
        instance.add_node(speech(1, 0, "TA", "Hello"));
        let mut diag = Diagnostics::new();
        assert!(!instance.validate(&mut diag, &schema));
        assert!(diag.records().iter().any(|r| r.id == DiagnosticId::Error_IR_BadTree_UnreachableNode));
    }

    #[test]
    fn bad_node_type_index_is_detected() {
        let schema = schema();
        let mut instance = RootInstance::new();
        instance.add_node(NodeInstance::new(0, 0, -1, Vec::new()));
        instance.add_node(NodeInstance::new(99, 1, 0, Vec::new()));
        instance.add_child(0, 1);
        let mut diag = Diagnostics::new();
        assert!(!instance.validate(&mut diag, &schema));
        assert!(diag.records().iter().any(|r| r.id == DiagnosticId::Error_IR_BadTree_BadNodeTypeIndex));
    }

    #[test]
    fn parameter_count_mismatch_is_detected() {
        let schema = schema();
        let mut instance = RootInstance::new();
        instance.add_node(NodeInstance::new(0, 0, -1, Vec::new()));
        instance.add_node(NodeInstance::new(1, 1, 0, vec![Value::String("TA".into())]));
        instance.add_child(0, 1);
        let mut diag = Diagnostics::new();
        assert!(!instance.validate(&mut diag, &schema));
        assert!(diag.records().iter().any(|r| r.id == DiagnosticId::Error_IR_BadParameterList_Count));
    }

    #[test]
    fn parameter_type_mismatch_is_detected() {
        let schema = schema();
        let mut instance = RootInstance::new();
        instance.add_node(NodeInstance::new(0, 0, -1, Vec::new()));
        instance.add_node(NodeInstance::new(1, 1, 0, vec![Value::Int64(1), Value::String("Hello".into())]));
        instance.add_child(0, 1);
        let mut diag = Diagnostics::new();
        assert!(!instance.validate(&mut diag, &schema));
        assert!(diag.records().iter().any(|r| r.id == DiagnosticId::Error_IR_BadParameterList_Type));
    }

    #[test]
    fn unexpected_child_type_is_detected() {
        let mut root = RootType::new("Root");
        let mut root_ty = NodeType::new("root");
        root_ty.add_child_node("allowed");
        root.add_node_type(root_ty);
        root.add_node_type(NodeType::new("allowed"));
        root.add_node_type(NodeType::new("disallowed"));
        root.set_root_node_type("root");
        let mut schema_diag = Diagnostics::new();
        assert!(root.validate(&mut schema_diag));

        let mut instance = RootInstance::new();
        instance.add_node(NodeInstance::new(0, 0, -1, Vec::new()));
        instance.add_node(NodeInstance::new(2, 1, 0, Vec::new()));
        instance.add_child(0, 1);
        let mut diag = Diagnostics::new();
        assert!(!instance.validate(&mut diag, &root));
        assert!(diag.records().iter().any(|r| r.id == DiagnosticId::Error_IR_BadTree_UnexpectedChild));
    }

    #[test]
    fn unique_parameter_collision_reports_both_node_indices_and_value() {
        let schema = schema();
        let mut instance = RootInstance::new();
        instance.add_node(NodeInstance::new(0, 0, -1, Vec::new()));
        instance.add_node(speech(1, 0, "TA", "Hello"));
        instance.add_node(speech(2, 0, "TA", "Again"));
        instance.add_child(0, 1);
        instance.add_child(0, 2);
        let mut diag = Diagnostics::new();
        assert!(!instance.validate(&mut diag, &schema));
        let record = diag
            .records()
            .iter()
            .find(|r| r.id == DiagnosticId::Error_IR_BadTree_BrokenConstraint_ParamNotUnique)
            .expect("uniqueness violation reported");
        assert!(record.params.iter().any(|p| p.to_string() == "TA"));
        assert!(record.params.iter().any(|p| p.to_string() == "1"));
        assert!(record.params.iter().any(|p| p.to_string() == "2"));
    }
}
