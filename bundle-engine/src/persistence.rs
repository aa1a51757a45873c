//! A faithful JSON encoding of an IR instance, used for round-trip tests
//! and by `bundle-cli` to read an instance off disk. Grounded on spec §6's
//! "root element carries the schema name, each node element carries its
//! type name, per-parameter name/kind/text content, and nested children in
//! order" and on the source's JSON front-end diagnostic ids
//! (`original_source/core/DiagnosticEmitter.h`'s `Diag::ID::Json*` family).
//! Text format fidelity beyond that is explicitly not part of the core
//! contract (spec §6), so this is *a* faithful encoding, not *the* one.

use serde::{Deserialize, Serialize};

use crate::diag;
use crate::diagnostics::{DiagnosticId, Diagnostics};
use crate::ir::{NodeInstance, RootInstance, RootType};
use crate::value::{Value, ValueKind};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedParameter {
    pub name: String,
    pub kind: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedNode {
    pub node_type: String,
    #[serde(default)]
    pub parameters: Vec<PersistedParameter>,
    #[serde(default)]
    pub children: Vec<PersistedNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedRoot {
    pub schema_name: String,
    pub root: PersistedNode,
}

impl PersistedRoot {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Serializes a validated `RootInstance` to its hierarchical form. The
/// `RootType` is only consulted for names (parameter and node-type names
/// aren't stored on `NodeInstance` itself).
pub fn save(instance: &RootInstance, schema: &RootType, schema_name: &str) -> PersistedRoot {
    PersistedRoot {
        schema_name: schema_name.to_string(),
        root: save_node(instance, schema, 0),
    }
}

fn save_node(instance: &RootInstance, schema: &RootType, node_index: usize) -> PersistedNode {
    let node = instance.node(node_index);
    let node_type = schema.node_type(node.type_index);

    let parameters = node_type
        .parameters()
        .iter()
        .zip(&node.parameters)
        .map(|(decl, value)| PersistedParameter {
            name: decl.name.clone(),
            kind: decl.kind.display_name().to_string(),
            value: match value {
                Value::Int64(i) => i.to_string(),
                Value::String(s) => s.clone(),
                _ => String::new(),
            },
        })
        .collect();

    let children = node
        .child_node_list
        .iter()
        .map(|&child| save_node(instance, schema, child))
        .collect();

    PersistedNode {
        node_type: node_type.name().to_string(),
        parameters,
        children,
    }
}

/// Deserializes a `PersistedRoot` back into a `RootInstance`, pre-order
/// numbering nodes as they're flattened so the result satisfies the
/// `node_index`-ordering invariant `RootInstance::validate` checks.
/// Unknown node-type names, unknown value kinds, and unparsable literals
/// are reported as `Json*` diagnostics; on any such failure this returns
/// `None` without a partially-built instance.
pub fn load(doc: &PersistedRoot, schema: &RootType, diag: &mut Diagnostics) -> Option<RootInstance> {
    let mut instance = RootInstance::new();
    build_node(&doc.root, -1, schema, &mut instance, diag)?;
    Some(instance)
}

fn parse_kind(kind: &str, diag: &mut Diagnostics) -> Option<ValueKind> {
    match kind {
        "Int64" => Some(ValueKind::Int64),
        "String" => Some(ValueKind::String),
        other => {
            diag!(diag, DiagnosticId::Error_Json_UnknownType_String, other);
            None
        }
    }
}

fn build_node(
    node: &PersistedNode,
    parent_index: i64,
    schema: &RootType,
    instance: &mut RootInstance,
    diag: &mut Diagnostics,
) -> Option<usize> {
    let Some(type_index) = schema.get_node_type_index(&node.node_type) else {
        diag!(diag, DiagnosticId::Error_Json_BadReference_IRNodeType, node.node_type.as_str());
        return None;
    };

    let mut parameters = Vec::with_capacity(node.parameters.len());
    for param in &node.parameters {
        let kind = parse_kind(&param.kind, diag)?;
        let value = match kind {
            ValueKind::Int64 => match param.value.parse::<i64>() {
                Ok(i) => Value::Int64(i),
                Err(_) => {
                    diag!(diag, DiagnosticId::Error_Json_UnexpectedInitializer, param.name.as_str());
                    return None;
                }
            },
            ValueKind::String => Value::String(param.value.clone()),
            _ => unreachable!("parse_kind only yields Int64 or String"),
        };
        parameters.push(value);
    }

    let node_index = instance.len();
    instance.add_node(NodeInstance::new(type_index, node_index, parent_index, parameters));

    for child in &node.children {
        let child_index = build_node(child, node_index as i64, schema, instance, diag)?;
        instance.add_child(node_index, child_index);
    }

    Some(node_index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{NodeType, RootType};
    use crate::value::ValueKind;

    fn schema() -> RootType {
        let mut root = RootType::new("HelloWorld");
        let mut root_ty = NodeType::new("root");
        root_ty.add_child_node("speech");
        let mut speech = NodeType::new("speech");
        speech.add_parameter("character", ValueKind::String, false);
        speech.add_parameter("text", ValueKind::String, false);
        root.add_node_type(root_ty);
        root.add_node_type(speech);
        root.set_root_node_type("root");
        let mut diag = Diagnostics::new();
        assert!(root.validate(&mut diag));
        root
    }

    #[test]
    fn round_trips_a_small_tree() {
        let schema = schema();
        let mut instance = RootInstance::new();
        instance.add_node(NodeInstance::new(0, 0, -1, Vec::new()));
        instance.add_node(NodeInstance::new(
            1,
            1,
            0,
            vec![Value::String("TA".into()), Value::String("Hello".into())],
        ));
        instance.add_child(0, 1);
        let mut diag = Diagnostics::new();
        assert!(instance.validate(&mut diag, &schema));

        let persisted = save(&instance, &schema, "HelloWorld");
        let json = persisted.to_json().unwrap();
        let reloaded_doc = PersistedRoot::from_json(&json).unwrap();

        let mut load_diag = Diagnostics::new();
        let mut reloaded = load(&reloaded_doc, &schema, &mut load_diag).expect("load should succeed");
        assert!(reloaded.validate(&mut load_diag, &schema));
        assert_eq!(reloaded.len(), instance.len());
        assert_eq!(reloaded.node(1).parameters, instance.node(1).parameters);
    }

    #[test]
    fn unknown_node_type_is_reported() {
        let schema = schema();
        let doc = PersistedRoot {
            schema_name: "HelloWorld".to_string(),
            root: PersistedNode {
                node_type: "nonexistent".to_string(),
                parameters: Vec::new(),
                children: Vec::new(),
            },
        };
        let mut diag = Diagnostics::new();
        assert!(load(&doc, &schema, &mut diag).is_none());
        assert!(diag.has_errors());
    }
}
