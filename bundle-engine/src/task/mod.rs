//! A program acting on an IR tree: global/per-node storage declarations, a
//! set of functions, and per-pass per-node-type entry/exit callbacks.

pub mod function;

pub use function::{BranchAction, BranchCase, BranchStatement, CalleeInfo, Function, Lvalue, Statement};

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::debug_span;

use crate::diagnostics::{DiagnosticId, Diagnostics};
use crate::ir::validate_name;
use crate::value::{Value, ValueKind};

/// A flat name/kind/initializer declaration list shared by globals and
/// per-node-type extra members. Grounded on `Task.h`'s `MemberDecl`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemberDecl {
    names: Vec<String>,
    kinds: Vec<ValueKind>,
    initializers: Vec<Option<Value>>,

    #[serde(skip)]
    name_to_index: HashMap<String, usize>,
}

impl MemberDecl {
    pub fn add(&mut self, name: impl Into<String>, kind: ValueKind, initializer: Option<Value>) -> usize {
        self.names.push(name.into());
        self.kinds.push(kind);
        self.initializers.push(initializer);
        self.names.len() - 1
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn name(&self, index: usize) -> &str {
        &self.names[index]
    }

    pub fn kind(&self, index: usize) -> ValueKind {
        self.kinds[index]
    }

    pub fn initializer(&self, index: usize) -> Option<&Value> {
        self.initializers[index].as_ref()
    }

    pub fn get_index(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    fn validate(&mut self, diag: &mut Diagnostics) -> bool {
        let mut ok = true;
        self.name_to_index.clear();
        for i in 0..self.names.len() {
            let name = self.names[i].clone();
            if !validate_name(diag, &name) {
                ok = false;
                continue;
            }
            match self.name_to_index.get(&name) {
                Some(&first) => {
                    diag.emit(
                        DiagnosticId::Error_Task_NameClash_ExternVariable,
                        vec![name.clone().into(), (first as i64).into(), (i as i64).into()],
                    );
                    ok = false;
                }
                None => {
                    self.name_to_index.insert(name.clone(), i);
                    if let Some(initializer) = &self.initializers[i] {
                        let init_kind = initializer.kind();
                        if init_kind != self.kinds[i] {
                            diag.emit(
                                DiagnosticId::Error_Task_BadInitializer_ExternVariable,
                                vec![name.clone().into(), self.kinds[i].into(), init_kind.into()],
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

#[derive(Debug, Clone, Copy)]
pub enum CallbackType {
    OnEntry,
    OnExit,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NodeCallbackRecord {
    pub on_entry_function_index: i64,
    pub on_exit_function_index: i64,
}

impl Default for NodeCallbackRecord {
    fn default() -> Self {
        NodeCallbackRecord {
            on_entry_function_index: -1,
            on_exit_function_index: -1,
        }
    }
}

/// A program: global variables, per-node-type extra members, named
/// functions, and a list of passes, each mapping every node type to an
/// optional entry/exit callback function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    num_node_types: usize,
    global_variables: MemberDecl,
    node_member_decls: Vec<MemberDecl>,
    functions: Vec<Function>,
    passes: Vec<Vec<NodeCallbackRecord>>,

    #[serde(skip)]
    function_name_to_index: HashMap<String, usize>,
    #[serde(skip)]
    validated: bool,
}

impl Task {
    /// `num_node_types` is the validated schema's node type count
    /// (`RootType::node_types().len()`); it is all a `Task` ever needs from
    /// its schema, so no reference to `RootType` is kept.
    pub fn new(num_node_types: usize) -> Self {
        Task {
            num_node_types,
            global_variables: MemberDecl::default(),
            node_member_decls: (0..num_node_types).map(|_| MemberDecl::default()).collect(),
            functions: Vec::new(),
            passes: vec![vec![NodeCallbackRecord::default(); num_node_types]],
            function_name_to_index: HashMap::new(),
            validated: false,
        }
    }

    pub fn add_global_variable(&mut self, name: impl Into<String>, kind: ValueKind, initializer: Option<Value>) -> usize {
        self.global_variables.add(name, kind, initializer)
    }

    pub fn add_node_member(&mut self, node_type_index: usize, name: impl Into<String>, kind: ValueKind, initializer: Option<Value>) -> usize {
        self.node_member_decls[node_type_index].add(name, kind, initializer)
    }

    pub fn add_function(&mut self, function: Function) -> usize {
        let index = self.functions.len();
        self.function_name_to_index.entry(function.name().to_string()).or_insert(index);
        self.functions.push(function);
        index
    }

    pub fn add_new_pass(&mut self) -> usize {
        let index = self.passes.len();
        self.passes.push(vec![NodeCallbackRecord::default(); self.num_node_types]);
        index
    }

    /// Always targets the most recently added pass, matching the source
    /// engine's `nodeCallbacks.back()` regardless of any pass index the
    /// caller might otherwise have expected to address.
    pub fn set_node_callback(&mut self, node_type_index: usize, function_name: &str, callback_type: CallbackType) {
        let function_index = self
            .function_name_to_index
            .get(function_name)
            .copied()
            .map(|i| i as i64)
            .unwrap_or(-1);
        let record = self
            .passes
            .last_mut()
            .expect("Task always has at least one pass")
            .get_mut(node_type_index)
            .expect("node_type_index in range");
        match callback_type {
            CallbackType::OnEntry => record.on_entry_function_index = function_index,
            CallbackType::OnExit => record.on_exit_function_index = function_index,
        }
    }

    pub fn num_node_types(&self) -> usize {
        self.num_node_types
    }

    pub fn global_variables(&self) -> &MemberDecl {
        &self.global_variables
    }

    pub fn node_members(&self, node_type_index: usize) -> &MemberDecl {
        &self.node_member_decls[node_type_index]
    }

    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    pub fn function(&self, index: usize) -> &Function {
        &self.functions[index]
    }

    pub fn get_function_index(&self, name: &str) -> Option<usize> {
        self.function_name_to_index.get(name).copied()
    }

    pub fn passes(&self) -> &[Vec<NodeCallbackRecord>] {
        &self.passes
    }

    pub fn validated(&self) -> bool {
        self.validated
    }

    /// Validates globals, function-name uniqueness, every callback
    /// reference, then every function body (skipped if any top-level check
    /// already failed, to avoid cascading errors), then reports unreachable
    /// functions as warnings.
    pub fn validate(&mut self, diag: &mut Diagnostics) -> bool {
        let _span = debug_span!("Task::validate").entered();
        let mut ok = true;

        {
            let _guard = diag.scoped_node("Global Variable");
            ok = self.global_variables.validate(&mut *_guard) && ok;
        }

        self.function_name_to_index.clear();
        {
            let _guard = diag.scoped_node("Function");
            for (i, function) in self.functions.iter().enumerate() {
                let name = function.name();
                if !validate_name(&mut *_guard, name) {
                    ok = false;
                    continue;
                }
                match self.function_name_to_index.get(name) {
                    Some(&first) => {
                        _guard.emit(
                            DiagnosticId::Error_Task_NameClash_Function,
                            vec![name.into(), (first as i64).into(), (i as i64).into()],
                        );
                        ok = false;
                    }
                    None => {
                        self.function_name_to_index.insert(name.to_string(), i);
                    }
                }
            }
        }

        let mut reachable = vec![false; self.functions.len()];
        let mut queue: VecDeque<usize> = VecDeque::new();
        let mut enqueue = |index: i64, reachable: &mut Vec<bool>, queue: &mut VecDeque<usize>| {
            if index < 0 {
                return;
            }
            let index = index as usize;
            if let Some(slot) = reachable.get_mut(index) {
                if !*slot {
                    *slot = true;
                    queue.push_back(index);
                }
            }
        };

        let mut is_any_callback_set = false;
        {
            let _guard = diag.scoped_node("Callback");
            for (pass_index, pass) in self.passes.iter().enumerate() {
                let _pass_guard = _guard.scoped_node(format!("Pass {pass_index}"));
                for (node_index, record) in pass.iter().enumerate() {
                    for function_index in [record.on_entry_function_index, record.on_exit_function_index] {
                        if function_index >= 0 {
                            if function_index as usize >= self.functions.len() {
                                let node_type_name = format!("node type {node_index}");
                                _pass_guard.emit(
                                    DiagnosticId::Error_Task_BadFunctionIndex_NodeTraverseCallback,
                                    vec![node_type_name.into(), (pass_index as i64).into(), function_index.into()],
                                );
                                ok = false;
                            } else {
                                enqueue(function_index, &mut reachable, &mut queue);
                                is_any_callback_set = true;
                            }
                        }
                    }
                }
            }
        }

        if !is_any_callback_set {
            diag.emit0(DiagnosticId::Error_Task_NoCallback);
            ok = false;
        }

        if !ok {
            self.validated = ok;
            return ok;
        }

        let callees: Vec<CalleeInfo> = self.functions.iter().map(CalleeInfo::from).collect();
        for i in 0..self.functions.len() {
            let name = self.functions[i].name().to_string();
            let mut _guard = diag.scoped_node(format!("Function[{i}] {name}"));
            let function_ok = self.functions[i].validate(&mut *_guard, &self.function_name_to_index, &callees);
            ok = function_ok && ok;
        }

        for i in 0..self.functions.len() {
            if reachable[i] {
                for name in self.functions[i].referenced_function_list().to_vec() {
                    if let Some(index) = self.get_function_index(&name) {
                        enqueue(index as i64, &mut reachable, &mut queue);
                    }
                }
            }
        }
        while let Some(index) = queue.pop_front() {
            for name in self.functions[index].referenced_function_list().to_vec() {
                if let Some(target) = self.get_function_index(&name) {
                    enqueue(target as i64, &mut reachable, &mut queue);
                }
            }
        }

        for (i, function) in self.functions.iter().enumerate() {
            if !reachable[i] {
                diag.emit(
                    DiagnosticId::Warn_Task_UnreachableFunction,
                    vec![function.name().into()],
                );
            }
        }

        self.validated = ok;
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::expression::Expression;

    #[test]
    fn task_with_no_callback_anywhere_is_rejected() {
        let mut task = Task::new(1);
        let mut f = Function::new("helper");
        f.add_statement(Statement::Return);
        task.add_function(f);
        let mut diag = Diagnostics::new();
        assert!(!task.validate(&mut diag));
        assert!(diag.records().iter().any(|r| r.id == DiagnosticId::Error_Task_NoCallback));
    }

    #[test]
    fn unreachable_function_is_a_warning_not_an_error() {
        let mut task = Task::new(1);
        let mut greet = Function::new("greet");
        greet.add_statement(Statement::Return);
        task.add_function(greet);
        let mut helper = Function::new("helper");
        helper.add_statement(Statement::Return);
        task.add_function(helper);
        task.set_node_callback(0, "greet", CallbackType::OnEntry);

        let mut diag = Diagnostics::new();
        assert!(task.validate(&mut diag));
        let record = diag
            .records()
            .iter()
            .find(|r| r.id == DiagnosticId::Warn_Task_UnreachableFunction)
            .expect("helper should be reported unreachable");
        assert_eq!(record.params[0].to_string(), "helper");
        assert!(!diag.has_errors());
    }

    #[test]
    fn function_called_from_a_callback_reachable_function_is_not_unreachable() {
        let mut task = Task::new(1);
        let mut greet = Function::new("greet");
        let call_index = greet.add_statement(Statement::Call { callee_name: "helper".to_string(), argument_expr_indices: Vec::new() });
        let _ = call_index;
        greet.add_statement(Statement::Return);
        task.add_function(greet);
        let mut helper = Function::new("helper");
        helper.add_statement(Statement::Return);
        task.add_function(helper);
        task.set_node_callback(0, "greet", CallbackType::OnEntry);

        let mut diag = Diagnostics::new();
        assert!(task.validate(&mut diag));
        assert!(!diag.records().iter().any(|r| r.id == DiagnosticId::Warn_Task_UnreachableFunction));
    }

    #[test]
    fn duplicate_function_name_is_rejected() {
        let mut task = Task::new(1);
        task.add_function(Function::new("dup"));
        task.add_function(Function::new("dup"));
        task.set_node_callback(0, "dup", CallbackType::OnEntry);
        let mut diag = Diagnostics::new();
        assert!(!task.validate(&mut diag));
        assert!(diag.records().iter().any(|r| r.id == DiagnosticId::Error_Task_NameClash_Function));
    }

    #[test]
    fn global_variable_initializer_kind_mismatch_is_rejected() {
        let mut task = Task::new(1);
        let mut f = Function::new("greet");
        f.add_statement(Statement::Return);
        task.add_function(f);
        task.set_node_callback(0, "greet", CallbackType::OnEntry);
        task.add_global_variable("g", ValueKind::Int64, Some(Value::String("oops".to_string())));
        let mut diag = Diagnostics::new();
        assert!(!task.validate(&mut diag));
        assert!(diag.records().iter().any(|r| r.id == DiagnosticId::Error_Task_BadInitializer_ExternVariable));
    }

    #[test]
    fn set_node_callback_always_targets_the_most_recently_added_pass() {
        let mut task = Task::new(1);
        let mut f = Function::new("greet");
        f.add_statement(Statement::Return);
        task.add_function(f);
        task.add_new_pass();
        task.set_node_callback(0, "greet", CallbackType::OnEntry);
        assert_eq!(task.passes()[0][0].on_entry_function_index, -1);
        assert_eq!(task.passes()[1][0].on_entry_function_index, 0);
    }

    #[test]
    fn body_validation_is_skipped_when_a_top_level_error_already_fired() {
        // A function that would otherwise fail its own body validation
        // (referencing an undeclared name) must not additionally surface
        // that failure when a top-level Task error (no callback at all)
        // already stopped validation, matching the accumulate-but-stop-at
        // cascades contract.
        let mut task = Task::new(1);
        let mut f = Function::new("broken");
        let bad_read = f.add_expression(Expression::VariableRead(ValueKind::Int64, "nowhere".to_string()));
        f.add_statement(Statement::Output { expr_index: bad_read });
        task.add_function(f);
        let mut diag = Diagnostics::new();
        assert!(!task.validate(&mut diag));
        assert!(!diag.records().iter().any(|r| r.id == DiagnosticId::Error_Func_BadExpr_BadNameReference));
        assert!(diag.records().iter().any(|r| r.id == DiagnosticId::Error_Task_NoCallback));
    }
}
