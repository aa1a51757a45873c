//! Declarative IR schema: `NodeType` (one kind of tree node) and `RootType`
//! (a named collection of node types plus a designated root).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span};

use crate::diagnostics::{DiagnosticId, Diagnostics};
use crate::value::ValueKind;

const ILLEGAL_PUNCTUATION: &str = ".[]()<>\\/+=*~`'\",?@#$%^&|:; ";

fn illegal_char_label(ch: char) -> Option<String> {
    match ch {
        '\t' => Some("\\t".to_string()),
        '\n' => Some("\\n".to_string()),
        '\r' => Some("\\r".to_string()),
        '\x0C' => Some("\\f".to_string()),
        '\x07' => Some("\\a".to_string()),
        '\x08' => Some("\\b".to_string()),
        '\0' => Some("\\0".to_string()),
        c if ILLEGAL_PUNCTUATION.contains(c) => Some(c.to_string()),
        _ => None,
    }
}

/// Mirrors Qt's `QChar::isPrint()`: false for control characters, line/
/// paragraph separators, and Unicode format characters (bidi marks,
/// zero-width joiners, BOM), not just the `Cc` control-character class.
fn is_unprintable(ch: char) -> bool {
    ch.is_control()
        || matches!(ch, '\u{2028}' | '\u{2029}')
        || matches!(ch, '\u{200B}'..='\u{200F}' | '\u{202A}'..='\u{202E}' | '\u{2060}'..='\u{206F}' | '\u{FEFF}')
}

/// Validates a name against the illegal-character set, printability, and
/// the pure-number rule. Every check runs regardless of earlier failures so
/// that a single bad name can surface more than one diagnostic, matching
/// the source's un-short-circuited `validateName`.
pub fn validate_name(diag: &mut Diagnostics, name: &str) -> bool {
    let mut ok = true;

    if name.is_empty() {
        diag.emit0(DiagnosticId::Error_IR_BadName_Empty);
        ok = false;
    }

    for ch in name.chars() {
        if let Some(label) = illegal_char_label(ch) {
            diag.emit(
                DiagnosticId::Error_IR_BadName_IllegalChar,
                vec![label.into(), name.into()],
            );
            ok = false;
        }
    }

    if name.chars().any(is_unprintable) {
        diag.emit0(DiagnosticId::Error_IR_BadName_UnprintableChar);
        ok = false;
    }

    if !name.is_empty() && name.parse::<i64>().is_ok() {
        diag.emit(DiagnosticId::Error_IR_BadName_PureNumber, vec![name.into()]);
        ok = false;
    }

    ok
}

/// One parameter declared on a `NodeType`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamDecl {
    pub name: String,
    pub kind: ValueKind,
    pub unique: bool,
}

impl ParamDecl {
    pub fn new(name: impl Into<String>, kind: ValueKind, unique: bool) -> Self {
        ParamDecl {
            name: name.into(),
            kind,
            unique,
        }
    }
}

/// A kind of tree node: its parameters, which of them (if any) is the
/// primary key, and which node types are permitted as direct children.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeType {
    name: String,
    parameters: Vec<ParamDecl>,
    primary_key_name: String,
    child_node_types: Vec<String>,

    #[serde(skip)]
    parameter_name_to_index: HashMap<String, usize>,
    #[serde(skip)]
    child_node_name_to_index: HashMap<String, usize>,
    #[serde(skip)]
    primary_key_index: i64,
}

impl NodeType {
    pub fn new(name: impl Into<String>) -> Self {
        NodeType {
            name: name.into(),
            parameters: Vec::new(),
            primary_key_name: String::new(),
            child_node_types: Vec::new(),
            parameter_name_to_index: HashMap::new(),
            child_node_name_to_index: HashMap::new(),
            primary_key_index: -1,
        }
    }

    pub fn add_parameter(&mut self, name: impl Into<String>, kind: ValueKind, unique: bool) {
        self.parameters.push(ParamDecl::new(name, kind, unique));
    }

    pub fn set_primary_key(&mut self, name: impl Into<String>) {
        self.primary_key_name = name.into();
    }

    pub fn add_child_node(&mut self, name: impl Into<String>) {
        self.child_node_types.push(name.into());
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &[ParamDecl] {
        &self.parameters
    }

    pub fn child_node_types(&self) -> &[String] {
        &self.child_node_types
    }

    pub fn primary_key_index(&self) -> i64 {
        self.primary_key_index
    }

    pub fn get_parameter_index(&self, name: &str) -> Option<usize> {
        self.parameter_name_to_index.get(name).copied()
    }

    pub fn get_child_node_type_index(&self, name: &str) -> Option<usize> {
        self.child_node_name_to_index.get(name).copied()
    }

    /// Validates this node type's own name, parameters, primary key, and
    /// child-type references. `root_node_names` maps every node type name in
    /// the owning `RootType` to its index, already built by the caller.
    pub fn validate(&mut self, diag: &mut Diagnostics, root_node_names: &HashMap<String, usize>) -> bool {
        let _span = debug_span!("NodeType::validate", name = %self.name).entered();
        let mut ok = true;

        if validate_name(diag, &self.name) {
            diag.set_detailed_name(self.name.clone());
        } else {
            ok = false;
        }

        self.parameter_name_to_index.clear();
        for (index, param) in self.parameters.iter().enumerate() {
            let _guard = diag.scoped_node(format!("Parameter {index}"));
            if !validate_name(&mut *_guard, &param.name) {
                ok = false;
            }
            if !param.kind.is_valid_ir_param_kind() {
                _guard.emit(
                    DiagnosticId::Error_IR_BadType_BadTypeForNodeParam,
                    vec![param.name.clone().into(), param.kind.into()],
                );
                ok = false;
            }
            match self.parameter_name_to_index.get(&param.name) {
                Some(&first_index) => {
                    _guard.emit(
                        DiagnosticId::Error_IR_NameClash_NodeParam,
                        vec![param.name.clone().into(), (first_index as i64).into(), (index as i64).into()],
                    );
                    ok = false;
                }
                None => {
                    self.parameter_name_to_index.insert(param.name.clone(), index);
                }
            }
        }

        if self.primary_key_name.is_empty() {
            self.primary_key_index = -1;
        } else {
            match self.parameter_name_to_index.get(&self.primary_key_name) {
                None => {
                    diag.emit(
                        DiagnosticId::Error_IR_BadPrimaryKey_KeyNotFound,
                        vec![self.primary_key_name.clone().into()],
                    );
                    ok = false;
                    self.primary_key_index = -1;
                }
                Some(&index) => {
                    if self.parameters[index].unique {
                        self.primary_key_index = index as i64;
                    } else {
                        diag.emit(
                            DiagnosticId::Error_IR_BadPrimaryKey_KeyNotUnique,
                            vec![self.primary_key_name.clone().into()],
                        );
                        ok = false;
                        self.primary_key_index = -1;
                    }
                }
            }
        }

        self.child_node_name_to_index.clear();
        for name in &self.child_node_types {
            if !root_node_names.contains_key(name) {
                diag.emit(
                    DiagnosticId::Error_IR_BadReference_ChildNodeType,
                    vec![name.clone().into()],
                );
                ok = false;
                continue;
            }
            if self.child_node_name_to_index.contains_key(name) {
                diag.emit(
                    DiagnosticId::Error_IR_DuplicatedReference_ChildNodeType,
                    vec![name.clone().into()],
                );
                ok = false;
                continue;
            }
            let local_index = self.child_node_name_to_index.len();
            self.child_node_name_to_index.insert(name.clone(), local_index);
        }

        ok
    }
}

/// A named schema: an ordered list of node types plus a designated root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootType {
    name: String,
    node_types: Vec<NodeType>,
    root_node_type_name: String,

    #[serde(skip)]
    node_name_to_index: HashMap<String, usize>,
    #[serde(skip)]
    root_node_type_index: i64,
    #[serde(skip)]
    validated: bool,
}

impl RootType {
    pub fn new(name: impl Into<String>) -> Self {
        RootType {
            name: name.into(),
            node_types: Vec::new(),
            root_node_type_name: String::new(),
            node_name_to_index: HashMap::new(),
            root_node_type_index: -1,
            validated: false,
        }
    }

    pub fn add_node_type(&mut self, node_type: NodeType) -> usize {
        self.node_types.push(node_type);
        self.node_types.len() - 1
    }

    pub fn set_root_node_type(&mut self, name: impl Into<String>) {
        self.root_node_type_name = name.into();
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node_types(&self) -> &[NodeType] {
        &self.node_types
    }

    pub fn node_type(&self, index: usize) -> &NodeType {
        &self.node_types[index]
    }

    pub fn get_node_type_index(&self, name: &str) -> Option<usize> {
        self.node_name_to_index.get(name).copied()
    }

    pub fn root_node_type_index(&self) -> i64 {
        self.root_node_type_index
    }

    pub fn validated(&self) -> bool {
        self.validated
    }

    /// Idempotent: validating twice yields the same verdict and rebuilds
    /// the same lookup tables.
    pub fn validate(&mut self, diag: &mut Diagnostics) -> bool {
        let _span = debug_span!("RootType::validate", name = %self.name).entered();
        let mut ok = true;

        if validate_name(diag, &self.name) {
            diag.set_detailed_name(self.name.clone());
        } else {
            ok = false;
        }

        self.node_name_to_index.clear();
        for (index, node_type) in self.node_types.iter().enumerate() {
            match self.node_name_to_index.get(node_type.name()) {
                Some(_) => {
                    diag.emit(
                        DiagnosticId::Error_IR_NameClash_NodeType,
                        vec![node_type.name().into()],
                    );
                    ok = false;
                }
                None => {
                    self.node_name_to_index.insert(node_type.name().to_string(), index);
                }
            }
        }

        if self.root_node_type_name.is_empty() {
            self.root_node_type_index = -1;
        } else {
            match self.node_name_to_index.get(&self.root_node_type_name) {
                Some(&index) => self.root_node_type_index = index as i64,
                None => {
                    diag.emit(
                        DiagnosticId::Error_IR_BadReference_RootNodeType,
                        vec![self.root_node_type_name.clone().into()],
                    );
                    ok = false;
                    self.root_node_type_index = -1;
                }
            }
        }

        // Must happen after node_name_to_index is fully built; validate runs
        // unconditionally over every node type so that schema errors in one
        // node type never hide errors in another.
        for (index, node_type) in self.node_types.iter_mut().enumerate() {
            let _guard = diag.scoped_node(format!("NodeType[{index}]"));
            ok = node_type.validate(&mut *_guard, &self.node_name_to_index) && ok;
        }

        self.validated = ok;
        debug!(ok, "RootType validated");
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hello_world_schema() -> RootType {
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
        root
    }

    #[test]
    fn valid_schema_validates_and_resolves_indexes() {
        let mut schema = hello_world_schema();
        let mut diag = Diagnostics::new();
        assert!(schema.validate(&mut diag));
        assert!(diag.records().is_empty());
        assert_eq!(schema.root_node_type_index(), 0);
        assert_eq!(schema.get_node_type_index("speech"), Some(1));
        assert_eq!(schema.node_type(1).primary_key_index(), 0);
        assert!(schema.validated());
    }

    #[test]
    fn validate_is_idempotent() {
        let mut schema = hello_world_schema();
        let mut diag = Diagnostics::new();
        let first = schema.validate(&mut diag);
        let first_count = diag.records().len();
        let second = schema.validate(&mut diag);
        assert_eq!(first, second);
        assert_eq!(diag.records().len(), first_count * 2);
    }

    #[test]
    fn pure_number_name_is_rejected() {
        let mut diag = Diagnostics::new();
        assert!(!validate_name(&mut diag, "0"));
        assert!(diag.records().iter().any(|r| r.id == DiagnosticId::Error_IR_BadName_PureNumber));
    }

    #[test]
    fn tab_in_name_is_an_illegal_char() {
        let mut diag = Diagnostics::new();
        assert!(!validate_name(&mut diag, "bad\tname"));
        assert!(diag.records().iter().any(|r| r.id == DiagnosticId::Error_IR_BadName_IllegalChar));
    }

    #[test]
    fn backtick_in_name_is_an_illegal_char() {
        let mut diag = Diagnostics::new();
        assert!(!validate_name(&mut diag, "bad`name"));
        assert!(diag.records().iter().any(|r| r.id == DiagnosticId::Error_IR_BadName_IllegalChar));
    }

    #[test]
    fn vertical_tab_is_unprintable_not_an_illegal_char() {
        let mut diag = Diagnostics::new();
        assert!(!validate_name(&mut diag, "bad\x0Bname"));
        assert!(!diag.records().iter().any(|r| r.id == DiagnosticId::Error_IR_BadName_IllegalChar));
        assert!(diag.records().iter().any(|r| r.id == DiagnosticId::Error_IR_BadName_UnprintableChar));
    }

    #[test]
    fn line_separator_is_unprintable() {
        let mut diag = Diagnostics::new();
        assert!(!validate_name(&mut diag, "bad\u{2028}name"));
        assert!(diag.records().iter().any(|r| r.id == DiagnosticId::Error_IR_BadName_UnprintableChar));
    }

    #[test]
    fn duplicate_node_type_name_is_a_clash() {
        let mut root = RootType::new("Dup");
        root.add_node_type(NodeType::new("a"));
        root.add_node_type(NodeType::new("a"));
        let mut diag = Diagnostics::new();
        assert!(!root.validate(&mut diag));
        assert!(diag.records().iter().any(|r| r.id == DiagnosticId::Error_IR_NameClash_NodeType));
    }

    #[test]
    fn unresolved_root_node_type_is_reported() {
        let mut root = RootType::new("Root");
        root.add_node_type(NodeType::new("a"));
        root.set_root_node_type("missing");
        let mut diag = Diagnostics::new();
        assert!(!root.validate(&mut diag));
        assert!(diag.records().iter().any(|r| r.id == DiagnosticId::Error_IR_BadReference_RootNodeType));
    }

    #[test]
    fn empty_root_node_type_name_is_not_an_error() {
        let mut root = RootType::new("Root");
        root.add_node_type(NodeType::new("a"));
        let mut diag = Diagnostics::new();
        assert!(root.validate(&mut diag));
        assert_eq!(root.root_node_type_index(), -1);
    }

    #[test]
    fn primary_key_must_name_a_unique_parameter() {
        let mut root = RootType::new("Root");
        let mut ty = NodeType::new("a");
        ty.add_parameter("x", ValueKind::Int64, false);
        ty.set_primary_key("x");
        root.add_node_type(ty);
        let mut diag = Diagnostics::new();
        assert!(!root.validate(&mut diag));
        assert!(diag.records().iter().any(|r| r.id == DiagnosticId::Error_IR_BadPrimaryKey_KeyNotUnique));
    }

    #[test]
    fn primary_key_referencing_missing_parameter_is_reported() {
        let mut root = RootType::new("Root");
        let mut ty = NodeType::new("a");
        ty.set_primary_key("nonexistent");
        root.add_node_type(ty);
        let mut diag = Diagnostics::new();
        assert!(!root.validate(&mut diag));
        assert!(diag.records().iter().any(|r| r.id == DiagnosticId::Error_IR_BadPrimaryKey_KeyNotFound));
    }

    #[test]
    fn node_param_with_void_kind_is_rejected() {
        let mut root = RootType::new("Root");
        let mut ty = NodeType::new("a");
        ty.add_parameter("x", ValueKind::Void, false);
        root.add_node_type(ty);
        let mut diag = Diagnostics::new();
        assert!(!root.validate(&mut diag));
        assert!(diag.records().iter().any(|r| r.id == DiagnosticId::Error_IR_BadType_BadTypeForNodeParam));
    }

    #[test]
    fn duplicate_parameter_names_within_a_node_type_are_rejected() {
        let mut root = RootType::new("Root");
        let mut ty = NodeType::new("a");
        ty.add_parameter("x", ValueKind::Int64, false);
        ty.add_parameter("x", ValueKind::Int64, false);
        root.add_node_type(ty);
        let mut diag = Diagnostics::new();
        assert!(!root.validate(&mut diag));
        assert!(diag.records().iter().any(|r| r.id == DiagnosticId::Error_IR_NameClash_NodeParam));
    }

    #[test]
    fn unresolvable_child_type_reference_is_rejected() {
        let mut root = RootType::new("Root");
        let mut ty = NodeType::new("a");
        ty.add_child_node("nonexistent");
        root.add_node_type(ty);
        let mut diag = Diagnostics::new();
        assert!(!root.validate(&mut diag));
        assert!(diag.records().iter().any(|r| r.id == DiagnosticId::Error_IR_BadReference_ChildNodeType));
    }

    #[test]
    fn duplicate_child_type_reference_is_rejected() {
        let mut root = RootType::new("Root");
        let mut ty = NodeType::new("a");
        ty.add_child_node("b");
        ty.add_child_node("b");
        root.add_node_type(ty);
        root.add_node_type(NodeType::new("b"));
        let mut diag = Diagnostics::new();
        assert!(!root.validate(&mut diag));
        assert!(diag.records().iter().any(|r| r.id == DiagnosticId::Error_IR_DuplicatedReference_ChildNodeType));
    }
}
