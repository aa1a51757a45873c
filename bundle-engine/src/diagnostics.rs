//! The structured diagnostics sink. Every validator and the interpreter
//! report through here rather than by returning `Result` from `validate` —
//! see `error.rs` for the typed view embedders can convert a single
//! diagnostic into.

use crate::value::ValueKind;

/// One of the three restricted parameter shapes a diagnostic may carry.
#[derive(Debug, Clone, PartialEq)]
pub enum Parameter {
    Kind(ValueKind),
    Int(i64),
    Str(String),
}

impl From<ValueKind> for Parameter {
    fn from(k: ValueKind) -> Self {
        Parameter::Kind(k)
    }
}

impl From<i64> for Parameter {
    fn from(i: i64) -> Self {
        Parameter::Int(i)
    }
}

impl From<i32> for Parameter {
    fn from(i: i32) -> Self {
        Parameter::Int(i as i64)
    }
}

impl From<usize> for Parameter {
    fn from(i: usize) -> Self {
        Parameter::Int(i as i64)
    }
}

impl From<&str> for Parameter {
    fn from(s: &str) -> Self {
        Parameter::Str(s.to_string())
    }
}

impl From<String> for Parameter {
    fn from(s: String) -> Self {
        Parameter::Str(s)
    }
}

impl std::fmt::Display for Parameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Parameter::Kind(k) => write!(f, "{k}"),
            Parameter::Int(i) => write!(f, "{i}"),
            Parameter::Str(s) => write!(f, "{s}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Every distinct condition the validators and the interpreter can report.
/// Names are preserved verbatim from the source engine's `Diag::ID` so the
/// mapping back to that implementation stays exact and auditable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum DiagnosticId {
    Warn_Exec_UninitializedRead,
    Warn_Task_UnreachableFunction,

    Error_IR_BadName_Empty,
    Error_IR_BadName_IllegalChar,
    Error_IR_BadName_UnprintableChar,
    Error_IR_BadName_PureNumber,
    Error_IR_BadType_BadTypeForNodeParam,
    Error_IR_NameClash_NodeParam,
    Error_IR_NameClash_NodeType,
    Error_IR_BadPrimaryKey_KeyNotFound,
    Error_IR_BadPrimaryKey_KeyNotUnique,
    Error_IR_BadReference_ChildNodeType,
    Error_IR_BadReference_RootNodeType,
    Error_IR_DuplicatedReference_ChildNodeType,
    Error_IR_BadParameterList_Count,
    Error_IR_BadParameterList_Type,
    Error_IR_BadTree_UnexpectedChild,
    Error_IR_BadTree_BrokenConstraint_ParamNotUnique,
    Error_IR_BadTree_EmptyTree,
    Error_IR_BadTree_DuplicatedReference_ChildNode,
    Error_IR_BadTree_BadNodeOrder,
    Error_IR_BadTree_ConflictingParentReference,
    Error_IR_BadTree_BadNodeTypeIndex,
    Error_IR_BadTree_UnreachableNode,

    Error_Task_BadInitializer_ExternVariable,
    Error_Task_NameClash_ExternVariable,
    Error_Task_NameClash_Function,
    Error_Task_BadFunctionIndex_NodeTraverseCallback,
    Error_Task_NoCallback,

    Error_Func_NameClash_ExternVariable,
    Error_Func_NameClash_LocalVariable,
    Error_Func_BadType_ExternVariableVoid,
    Error_Func_BadType_LocalVariableVoid,
    Error_Func_InvalidValue_TotalParamCount,
    Error_Func_InvalidValue_RequiredParamCount,
    Error_Func_MissingInitializer_OptionalParam,
    Error_Func_BadInitializer_LocalVariable,
    Error_Func_BadExprDependence_BadIndex,
    Error_Func_BadExprDependence_TypeMismatch,
    Error_Func_BadExpr_BadNameReference,
    Error_Func_Stmt_BadExprIndex,
    Error_Func_Stmt_BadExprIndex_BranchCondition,
    Error_Func_Assign_BadRHS_RHSVoid,
    Error_Func_Assign_BadRHS_VariableTypeMismatch,
    Error_Func_Assign_BadLHS_Type,
    Error_Func_Assign_BadLHS_BadNameReference,
    Error_Func_Output_BadRHS_Type,
    Error_Func_Call_CalleeNotFound,
    Error_Func_Call_BadParamList_Count,
    Error_Func_Call_BadParamList_Type,
    Error_Func_Branch_BadLabelReference,
    Error_Func_Branch_BadConditionType,
    Error_Func_DuplicateLabel,

    Error_Exec_TypeMismatch_ReadByName,
    Error_Exec_TypeMismatch_WriteByName,
    Error_Exec_TypeMismatch_WriteByPointer,
    Error_Exec_TypeMismatch_ExpressionDependency,
    Error_Exec_BadReference_VariableRead,
    Error_Exec_BadReference_VariableWrite,
    Error_Exec_BadReference_VariableTakeAddress,
    Error_Exec_NullPointerException_ReadValue,
    Error_Exec_NullPointerException_WriteValue,
    Error_Exec_DanglingPointerException_ReadValue,
    Error_Exec_DanglingPointerException_WriteValue,
    Error_Exec_WriteToConst_WriteNodeParamByName,
    Error_Exec_WriteToConst_WriteNodeParamByPointer,
    Error_Exec_BadNodePointer_TraverseToParent,
    Error_Exec_BadNodePointer_TraverseToChild,
    Error_Exec_BadTraverse_ChildWithoutPrimaryKey,
    Error_Exec_BadTraverse_PrimaryKeyTypeMismatch,
    Error_Exec_BadTraverse_ParameterNotFound,
    Error_Exec_BadTraverse_ParameterNotUnique,
    Error_Exec_BadTraverse_UniqueKeyTypeMismatch,
    Error_Exec_Unreachable,
    Error_Exec_Assign_InvalidLHSType,
    Error_Exec_Output_Unknown_String,
    Error_Exec_Output_InvalidType,
    Error_Exec_Call_BadReference,
    Error_Exec_Call_BadArgumentList_Count,
    Error_Exec_Call_BadArgumentList_Type,
    Error_Exec_Branch_InvalidConditionType,
    Error_Exec_Branch_InvalidLabelAddress,
    Error_Exec_Branch_Unreachable,

    Error_Json_UnknownType_String,
    Error_Json_UnsupportedLiteralType,
    Error_Json_UnexpectedInitializer,
    Error_Json_UnknownBranchAction,
    Error_Json_UnknownStatementType,
    Error_Json_BadReference_Variable,
    Error_Json_BadReference_IR,
    Error_Json_BadReference_Output,
    Error_Json_BadReference_IRNodeType,

    InvalidID,
}

impl DiagnosticId {
    pub fn severity(self) -> Severity {
        use DiagnosticId::*;
        match self {
            Warn_Exec_UninitializedRead | Warn_Task_UnreachableFunction => Severity::Warning,
            InvalidID => Severity::Info,
            _ => Severity::Error,
        }
    }
}

/// One frame of the hierarchical path stack. `detailed_name` is filled in
/// lazily once the owning object's own name has been validated.
#[derive(Debug, Clone)]
struct PathFrame {
    path_name: String,
    detailed_name: Option<String>,
}

/// A single reported diagnostic: its id, the restricted parameters attached
/// to it, and a snapshot of the path stack at the moment it was emitted.
#[derive(Debug, Clone)]
pub struct DiagnosticRecord {
    pub id: DiagnosticId,
    pub params: Vec<Parameter>,
    pub path: Vec<String>,
}

impl std::fmt::Display for DiagnosticRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {:?}", self.path.join("/"), self.id)?;
        if !self.params.is_empty() {
            write!(f, "(")?;
            for (i, p) in self.params.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{p}")?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

/// The sink every validator and the interpreter report through. Maintains a
/// LIFO stack of named path frames; `push_node` returns a guard that pops
/// its frame on drop, so a frame is released on every exit path including an
/// early `return` or `?`.
#[derive(Debug, Default)]
pub struct Diagnostics {
    records: Vec<DiagnosticRecord>,
    path: Vec<PathFrame>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Diagnostics::default()
    }

    pub fn push_node(&mut self, name: impl Into<String>) {
        self.path.push(PathFrame {
            path_name: name.into(),
            detailed_name: None,
        });
    }

    pub fn pop_node(&mut self) {
        self.path.pop();
    }

    /// Scoped path frame: pops automatically when the guard is dropped.
    pub fn scoped_node(&mut self, name: impl Into<String>) -> PathGuard<'_> {
        self.push_node(name);
        PathGuard { diagnostics: self }
    }

    pub fn set_detailed_name(&mut self, name: impl Into<String>) {
        if let Some(frame) = self.path.last_mut() {
            frame.detailed_name = Some(name.into());
        }
    }

    fn current_path(&self) -> Vec<String> {
        self.path
            .iter()
            .map(|f| match &f.detailed_name {
                Some(d) => format!("{} {}", f.path_name, d),
                None => f.path_name.clone(),
            })
            .collect()
    }

    pub fn emit(&mut self, id: DiagnosticId, params: Vec<Parameter>) {
        let path = self.current_path();
        self.records.push(DiagnosticRecord { id, params, path });
    }

    pub fn emit0(&mut self, id: DiagnosticId) {
        self.emit(id, Vec::new());
    }

    pub fn records(&self) -> &[DiagnosticRecord] {
        &self.records
    }

    pub fn has_errors(&self) -> bool {
        self.records
            .iter()
            .any(|r| r.id.severity() == Severity::Error)
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.path.clear();
    }
}

/// RAII guard returned by [`Diagnostics::scoped_node`]. Pops its path frame
/// on drop, regardless of how the scope is exited.
pub struct PathGuard<'a> {
    diagnostics: &'a mut Diagnostics,
}

impl Drop for PathGuard<'_> {
    fn drop(&mut self) {
        self.diagnostics.pop_node();
    }
}

impl std::ops::Deref for PathGuard<'_> {
    type Target = Diagnostics;
    fn deref(&self) -> &Diagnostics {
        self.diagnostics
    }
}

impl std::ops::DerefMut for PathGuard<'_> {
    fn deref_mut(&mut self) -> &mut Diagnostics {
        self.diagnostics
    }
}

/// Shorthand for building a diagnostic with its parameter list, mirroring
/// the source engine's variadic `operator()`.
#[macro_export]
macro_rules! diag {
    ($sink:expr, $id:expr) => {
        $sink.emit0($id)
    };
    ($sink:expr, $id:expr, $($param:expr),+ $(,)?) => {
        $sink.emit($id, vec![$(::std::convert::Into::into($param)),+])
    };
}
