//! The tree-walking interpreter. Initializes global and per-node storage,
//! runs each pass's pre-/post-order traversal of the IR tree, drives a call
//! stack, evaluates expressions, and writes to an output sink. Grounded on
//! `original_source/core/ExecutionContext.h` and `ExecutionContext.cpp`.

use tracing::{debug, info_span, trace};

use crate::diag;
use crate::diagnostics::{DiagnosticId, Diagnostics};
use crate::ir::{RootInstance, RootType};
use crate::output::OutputSink;
use crate::task::{BranchAction, Lvalue, Statement, Task};
use crate::value::{NodePtr, PointerHead, Value, ValueKind, ValuePtr, ValuePtrKind};

/// Either the primary-key form or the named-field form of a `child()`
/// lookup (spec §4.8).
pub enum ChildKey<'a> {
    PrimaryKey(Value),
    Named(&'a str, Value),
}

/// One activation of a function on the call stack. `executing_stmt_index`
/// is the statement currently being executed (used to stamp pointer heads);
/// `stmt_index` is the *next* statement to run, pre-incremented before each
/// dispatch so `Branch` can overwrite it and `Call` can safely push a nested
/// frame on top without disturbing this one.
#[derive(Debug)]
struct Frame {
    function_index: usize,
    activation_index: u64,
    ir_node_index: usize,
    stmt_index: usize,
    executing_stmt_index: usize,
    locals: Vec<Option<Value>>,
}

/// Where a bare name resolved to, per the fixed order of spec §4.6: local
/// variables of the top frame, then the frame's IR node's RW members, then
/// its RO parameters, then globals.
#[derive(Debug, Clone, Copy)]
enum Resolution {
    Local(usize),
    NodeRw(usize, usize),
    NodeRo(usize, usize),
    Global(usize),
}

/// Drives one execution of a `Task` against a `RootInstance`. Borrows the
/// task, schema, and instance read-only for its whole lifetime; diagnostics
/// and the output sink are single-writer for the duration of the run.
pub struct ExecutionContext<'a> {
    task: &'a Task,
    schema: &'a RootType,
    instance: &'a RootInstance,
    diagnostics: &'a mut Diagnostics,
    sink: &'a mut dyn OutputSink,

    globals: Vec<Option<Value>>,
    node_members: Vec<Vec<Option<Value>>>,

    call_stack: Vec<Frame>,
    next_activation_index: u64,
    aborted: bool,

    /// Breakpoint data model only, per spec §5/§9: the original tracks
    /// `(function_index, stmt_index)` pairs addressable by integer id, but
    /// implements no suspension protocol. Nothing in `function_loop` ever
    /// consults this; it exists so embedders can query/mutate the same
    /// bookkeeping the source exposes.
    breakpoints: Vec<Option<(usize, usize)>>,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(
        task: &'a Task,
        schema: &'a RootType,
        instance: &'a RootInstance,
        diagnostics: &'a mut Diagnostics,
        sink: &'a mut dyn OutputSink,
    ) -> Self {
        let globals = (0..task.global_variables().len())
            .map(|i| task.global_variables().initializer(i).cloned())
            .collect();

        let node_members = instance
            .nodes()
            .iter()
            .map(|node| {
                let decl = task.node_members(node.type_index);
                (0..decl.len()).map(|i| decl.initializer(i).cloned()).collect()
            })
            .collect();

        ExecutionContext {
            task,
            schema,
            instance,
            diagnostics,
            sink,
            globals,
            node_members,
            call_stack: Vec::new(),
            next_activation_index: 0,
            aborted: false,
            breakpoints: Vec::new(),
        }
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        self.diagnostics
    }

    pub fn aborted(&self) -> bool {
        self.aborted
    }

    /// Adds a breakpoint at `(function_index, stmt_index)`, returning its
    /// id. A duplicate location returns the existing id rather than
    /// inserting a second entry.
    pub fn add_breakpoint(&mut self, function_index: usize, stmt_index: usize) -> usize {
        if let Some(existing) = self
            .breakpoints
            .iter()
            .position(|bp| *bp == Some((function_index, stmt_index)))
        {
            return existing;
        }
        self.breakpoints.push(Some((function_index, stmt_index)));
        self.breakpoints.len() - 1
    }

    /// Removes the breakpoint with the given id, or every breakpoint if
    /// `breakpoint_index` is `-1`. Unknown ids are ignored.
    pub fn remove_breakpoint(&mut self, breakpoint_index: i64) {
        if breakpoint_index < 0 {
            self.breakpoints.clear();
            return;
        }
        if let Some(slot) = self.breakpoints.get_mut(breakpoint_index as usize) {
            *slot = None;
        }
    }

    /// Currently active breakpoint locations, in id order (gaps from
    /// removed entries are skipped).
    pub fn breakpoints(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.breakpoints.iter().filter_map(|bp| *bp)
    }

    fn abort(&mut self) {
        self.aborted = true;
    }

    fn current_frame(&self) -> &Frame {
        self.call_stack.last().expect("no active frame")
    }

    fn current_frame_mut(&mut self) -> &mut Frame {
        self.call_stack.last_mut().expect("no active frame")
    }

    fn current_pointer_head(&self) -> PointerHead {
        let frame = self.current_frame();
        PointerHead::new(
            frame.function_index as i64,
            frame.executing_stmt_index as i64,
            frame.activation_index,
        )
    }

    // ---- driver: passes, traversal, call stack -------------------------

    /// Runs every pass, in order, to completion. Returns `false` iff a
    /// fatal runtime error aborted execution (a diagnostic has already been
    /// emitted in that case).
    pub fn continue_execution(&mut self) -> bool {
        for pass_index in 0..self.task.passes().len() {
            let _span = info_span!("pass", pass_index).entered();
            self.traverse(pass_index, 0);
            if self.aborted {
                break;
            }
        }
        !self.aborted
    }

    fn traverse(&mut self, pass_index: usize, node_index: usize) {
        if self.aborted {
            return;
        }
        trace!(node_index, pass_index, "enter node");

        let type_index = self.instance.node(node_index).type_index;
        let record = self.task.passes()[pass_index][type_index];

        if record.on_entry_function_index >= 0 {
            self.push_frame(record.on_entry_function_index as usize, node_index, Vec::new());
            self.function_loop();
            if self.aborted {
                return;
            }
        }

        let children = self.instance.node(node_index).child_node_list.clone();
        for child in children {
            self.traverse(pass_index, child);
            if self.aborted {
                return;
            }
        }

        if record.on_exit_function_index >= 0 {
            self.push_frame(record.on_exit_function_index as usize, node_index, Vec::new());
            self.function_loop();
            if self.aborted {
                return;
            }
        }

        trace!(node_index, pass_index, "exit node");
    }

    /// Pushes a new activation. `args` provides the first `args.len()`
    /// locals; the rest default from their declared initializer, or start
    /// uninitialized if they have none. Callers MUST NOT hold a reference
    /// to a previous top frame across this call: the backing `Vec` may
    /// reallocate.
    fn push_frame(&mut self, function_index: usize, ir_node_index: usize, args: Vec<Value>) {
        let function = self.task.function(function_index);
        let mut args = args.into_iter();
        let mut locals = Vec::with_capacity(function.num_local_variables());
        for i in 0..function.num_local_variables() {
            if let Some(value) = args.next() {
                locals.push(Some(value));
            } else {
                locals.push(function.local_variable_initializer(i).cloned());
            }
        }

        let activation_index = self.next_activation_index;
        self.next_activation_index += 1;
        debug!(function = function.name(), activation_index, "push frame");

        self.call_stack.push(Frame {
            function_index,
            activation_index,
            ir_node_index,
            stmt_index: 0,
            executing_stmt_index: 0,
            locals,
        });
    }

    fn pop_frame(&mut self) {
        if let Some(frame) = self.call_stack.pop() {
            debug!(activation_index = frame.activation_index, "pop frame");
        }
    }

    /// Runs until the call stack drains back to the depth it had when this
    /// was called (normally zero: one `push_frame` followed by draining
    /// every nested call it makes).
    fn function_loop(&mut self) {
        loop {
            if self.aborted || self.call_stack.is_empty() {
                return;
            }

            let top = self.current_frame();
            let function = self.task.function(top.function_index);

            if top.stmt_index >= function.statements().len() {
                self.pop_frame();
                continue;
            }

            let stmt_index = top.stmt_index;
            let statement = function.statement(stmt_index).clone();
            {
                let frame = self.current_frame_mut();
                frame.executing_stmt_index = stmt_index;
                frame.stmt_index = stmt_index + 1;
            }
            trace!(stmt_index, "execute statement");
            self.execute_statement(&statement);
        }
    }

    fn execute_statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Unreachable => {
                diag!(self.diagnostics, DiagnosticId::Error_Exec_Unreachable);
                self.abort();
            }
            Statement::Assignment { lvalue, rvalue_expr_index } => {
                let Some(rhs) = self.evaluate_expression(*rvalue_expr_index) else {
                    return;
                };
                match lvalue {
                    Lvalue::Name(name) => {
                        self.write_by_name(name, rhs);
                    }
                    Lvalue::Expr(expr_index) => {
                        let Some(target) = self.evaluate_expression(*expr_index) else {
                            return;
                        };
                        match target {
                            Value::ValuePtr(ptr) => {
                                self.write_ptr(ptr, rhs);
                            }
                            other => {
                                diag!(self.diagnostics, DiagnosticId::Error_Exec_Assign_InvalidLHSType, other.kind());
                                self.abort();
                            }
                        }
                    }
                }
            }
            Statement::Output { expr_index } => {
                let Some(value) = self.evaluate_expression(*expr_index) else {
                    return;
                };
                if !self.sink.accepted_kinds().contains(&value.kind()) {
                    diag!(self.diagnostics, DiagnosticId::Error_Exec_Output_InvalidType, value.kind());
                    self.abort();
                    return;
                }
                if !self.sink.add_output(&value) {
                    diag!(self.diagnostics, DiagnosticId::Error_Exec_Output_Unknown_String);
                    self.abort();
                }
            }
            Statement::Call { callee_name, argument_expr_indices } => {
                let Some(callee_index) = self.task.get_function_index(callee_name) else {
                    diag!(self.diagnostics, DiagnosticId::Error_Exec_Call_BadReference, callee_name.as_str());
                    self.abort();
                    return;
                };
                let callee = self.task.function(callee_index);
                let total = callee.num_parameter();
                let required = callee.num_required_parameter();
                let provided = argument_expr_indices.len();
                if provided < required || provided > total {
                    diag!(
                        self.diagnostics,
                        DiagnosticId::Error_Exec_Call_BadArgumentList_Count,
                        callee_name.as_str(),
                        required,
                        total,
                        provided
                    );
                    self.abort();
                    return;
                }

                let mut args = Vec::with_capacity(provided);
                for (i, &expr_index) in argument_expr_indices.iter().enumerate() {
                    let Some(value) = self.evaluate_expression(expr_index) else {
                        return;
                    };
                    let expected = self.task.function(callee_index).local_variable_kind(i);
                    if value.kind() != expected {
                        diag!(
                            self.diagnostics,
                            DiagnosticId::Error_Exec_Call_BadArgumentList_Type,
                            callee_name.as_str(),
                            i,
                            expected,
                            value.kind()
                        );
                        self.abort();
                        return;
                    }
                    args.push(value);
                }

                let ir_node_index = self.current_frame().ir_node_index;
                self.push_frame(callee_index, ir_node_index, args);
            }
            Statement::Return => {
                self.pop_frame();
            }
            Statement::Branch(branch) => {
                let mut chosen: Option<i64> = None;
                for case in &branch.cases {
                    let Some(value) = self.evaluate_expression(case.expr_index) else {
                        return;
                    };
                    if !matches!(value.kind(), ValueKind::Int64 | ValueKind::ValuePtr) {
                        diag!(self.diagnostics, DiagnosticId::Error_Exec_Branch_InvalidConditionType, value.kind());
                        self.abort();
                        return;
                    }
                    if value.is_truthy() {
                        chosen = Some(case.resolved_target);
                        break;
                    }
                }
                let target = chosen.unwrap_or(branch.default_resolved_target);
                match target {
                    -2 => {
                        diag!(self.diagnostics, DiagnosticId::Error_Exec_Branch_Unreachable);
                        self.abort();
                    }
                    -1 => {}
                    target => {
                        self.current_frame_mut().stmt_index = target as usize;
                    }
                }
            }
        }
    }

    // ---- expressions -----------------------------------------------------

    /// Evaluates the expression at `index` in the current frame's function,
    /// bottom-up: dependencies first, each checked against its declared
    /// kind before the expression itself is dispatched.
    pub fn evaluate_expression(&mut self, index: usize) -> Option<Value> {
        let function_index = self.current_frame().function_index;
        let expr = self.task.function(function_index).expression(index).clone();
        let deps = expr.dependencies().to_vec();

        let mut dependent_results = Vec::with_capacity(deps.len());
        for (dep_index, expected_kind) in deps {
            let value = self.evaluate_expression(dep_index)?;
            if value.kind() != expected_kind {
                diag!(
                    self.diagnostics,
                    DiagnosticId::Error_Exec_TypeMismatch_ExpressionDependency,
                    index,
                    dep_index,
                    expected_kind,
                    value.kind()
                );
                self.abort();
                return None;
            }
            dependent_results.push(value);
        }

        expr.evaluate(self, &dependent_results)
    }

    pub fn current_node_ptr(&self) -> NodePtr {
        NodePtr {
            head: self.current_pointer_head(),
            node_index: self.current_frame().ir_node_index as i64,
        }
    }

    pub fn root_node_ptr(&self) -> NodePtr {
        NodePtr {
            head: self.current_pointer_head(),
            node_index: 0,
        }
    }

    // ---- name resolution (spec §4.6) --------------------------------------

    fn resolve_name(&self, name: &str) -> Option<Resolution> {
        let frame = self.current_frame();
        let function = self.task.function(frame.function_index);
        if let Some(index) = function.get_local_variable_index(name) {
            return Some(Resolution::Local(index));
        }

        let node_index = frame.ir_node_index;
        let type_index = self.instance.node(node_index).type_index;
        if let Some(index) = self.task.node_members(type_index).get_index(name) {
            return Some(Resolution::NodeRw(node_index, index));
        }
        if let Some(index) = self.schema.node_type(type_index).get_parameter_index(name) {
            return Some(Resolution::NodeRo(node_index, index));
        }
        if let Some(index) = self.task.global_variables().get_index(name) {
            return Some(Resolution::Global(index));
        }
        None
    }

    fn declared_kind(&self, res: Resolution) -> ValueKind {
        match res {
            Resolution::Local(i) => {
                let frame = self.current_frame();
                self.task.function(frame.function_index).local_variable_kind(i)
            }
            Resolution::NodeRw(n, m) => {
                let type_index = self.instance.node(n).type_index;
                self.task.node_members(type_index).kind(m)
            }
            Resolution::NodeRo(n, p) => {
                let type_index = self.instance.node(n).type_index;
                self.schema.node_type(type_index).parameters()[p].kind
            }
            Resolution::Global(i) => self.task.global_variables().kind(i),
        }
    }

    fn read_resolution(&mut self, res: Resolution) -> Option<Value> {
        match res {
            Resolution::Local(i) => {
                let pos = self.call_stack.len() - 1;
                self.read_local(pos, i)
            }
            Resolution::NodeRw(n, m) => self.read_node_rw(n, m),
            Resolution::NodeRo(n, p) => Some(self.instance.node(n).parameters[p].clone()),
            Resolution::Global(i) => self.read_global(i),
        }
    }

    fn write_resolution(&mut self, res: Resolution, value: Value) {
        match res {
            Resolution::Local(i) => {
                let pos = self.call_stack.len() - 1;
                self.call_stack[pos].locals[i] = Some(value);
            }
            Resolution::NodeRw(n, m) => {
                self.node_members[n][m] = Some(value);
            }
            Resolution::NodeRo(..) => unreachable!("caller must reject writes to RO parameters"),
            Resolution::Global(i) => {
                self.globals[i] = Some(value);
            }
        }
    }

    fn address_of(&self, res: Resolution) -> ValuePtr {
        let head = self.current_pointer_head();
        match res {
            Resolution::Local(i) => ValuePtr {
                head,
                kind: ValuePtrKind::LocalVariable,
                value_index: i as i64,
                node_index: -1,
            },
            Resolution::NodeRw(n, m) => ValuePtr {
                head,
                kind: ValuePtrKind::NodeRWMember,
                value_index: m as i64,
                node_index: n as i64,
            },
            Resolution::NodeRo(n, p) => ValuePtr {
                head,
                kind: ValuePtrKind::NodeROParameter,
                value_index: p as i64,
                node_index: n as i64,
            },
            Resolution::Global(i) => ValuePtr {
                head,
                kind: ValuePtrKind::GlobalVariable,
                value_index: i as i64,
                node_index: -1,
            },
        }
    }

    pub fn read_by_name(&mut self, name: &str, expected_kind: ValueKind) -> Option<Value> {
        let Some(res) = self.resolve_name(name) else {
            diag!(self.diagnostics, DiagnosticId::Error_Exec_BadReference_VariableRead, name);
            self.abort();
            return None;
        };
        let value = self.read_resolution(res)?;
        if value.kind() != expected_kind {
            diag!(
                self.diagnostics,
                DiagnosticId::Error_Exec_TypeMismatch_ReadByName,
                name,
                expected_kind,
                value.kind()
            );
            self.abort();
            return None;
        }
        Some(value)
    }

    pub fn write_by_name(&mut self, name: &str, value: Value) -> bool {
        let Some(res) = self.resolve_name(name) else {
            diag!(self.diagnostics, DiagnosticId::Error_Exec_BadReference_VariableWrite, name);
            self.abort();
            return false;
        };
        if matches!(res, Resolution::NodeRo(..)) {
            diag!(self.diagnostics, DiagnosticId::Error_Exec_WriteToConst_WriteNodeParamByName, name);
            self.abort();
            return false;
        }
        let declared = self.declared_kind(res);
        if declared != value.kind() {
            diag!(
                self.diagnostics,
                DiagnosticId::Error_Exec_TypeMismatch_WriteByName,
                name,
                declared,
                value.kind()
            );
            self.abort();
            return false;
        }
        self.write_resolution(res, value);
        true
    }

    pub fn take_address_by_name(&mut self, name: &str) -> Option<ValuePtr> {
        let Some(res) = self.resolve_name(name) else {
            diag!(self.diagnostics, DiagnosticId::Error_Exec_BadReference_VariableTakeAddress, name);
            self.abort();
            return None;
        };
        Some(self.address_of(res))
    }

    // ---- uninitialized-read handling & raw storage access -----------------

    fn read_local(&mut self, frame_pos: usize, value_index: usize) -> Option<Value> {
        if let Some(value) = self.call_stack[frame_pos].locals[value_index].clone() {
            return Some(value);
        }
        let function_index = self.call_stack[frame_pos].function_index;
        let declared_kind = self.task.function(function_index).local_variable_kind(value_index);
        let head = PointerHead::new(
            function_index as i64,
            self.call_stack[frame_pos].executing_stmt_index as i64,
            self.call_stack[frame_pos].activation_index,
        );
        diag!(self.diagnostics, DiagnosticId::Warn_Exec_UninitializedRead);
        let zero = Value::zero_of(declared_kind, head)?;
        self.call_stack[frame_pos].locals[value_index] = Some(zero.clone());
        Some(zero)
    }

    fn read_node_rw(&mut self, node_index: usize, member_index: usize) -> Option<Value> {
        if let Some(value) = self.node_members[node_index][member_index].clone() {
            return Some(value);
        }
        let type_index = self.instance.node(node_index).type_index;
        let declared_kind = self.task.node_members(type_index).kind(member_index);
        diag!(self.diagnostics, DiagnosticId::Warn_Exec_UninitializedRead);
        let zero = Value::zero_of(declared_kind, self.current_pointer_head())?;
        self.node_members[node_index][member_index] = Some(zero.clone());
        Some(zero)
    }

    fn read_global(&mut self, value_index: usize) -> Option<Value> {
        if let Some(value) = self.globals[value_index].clone() {
            return Some(value);
        }
        let declared_kind = self.task.global_variables().kind(value_index);
        diag!(self.diagnostics, DiagnosticId::Warn_Exec_UninitializedRead);
        let zero = Value::zero_of(declared_kind, self.current_pointer_head())?;
        self.globals[value_index] = Some(zero.clone());
        Some(zero)
    }

    /// Linear scan of every live frame for a matching activation id. Order
    /// is unspecified beyond "some live frame with this id, if any" — spec
    /// §9 flags the original's stack-walk direction as suspect and asks
    /// implementations not to rely on inspection order.
    fn frame_position(&self, activation_index: u64) -> Option<usize> {
        self.call_stack.iter().position(|f| f.activation_index == activation_index)
    }

    // ---- pointer dereference (spec §4.7) -----------------------------------

    pub fn read_ptr(&mut self, ptr: ValuePtr) -> Option<Value> {
        match ptr.kind {
            ValuePtrKind::Null => {
                diag!(self.diagnostics, DiagnosticId::Error_Exec_NullPointerException_ReadValue);
                self.abort();
                None
            }
            ValuePtrKind::LocalVariable => match self.frame_position(ptr.head.activation_index) {
                Some(pos) => self.read_local(pos, ptr.value_index as usize),
                None => {
                    diag!(self.diagnostics, DiagnosticId::Error_Exec_DanglingPointerException_ReadValue);
                    self.abort();
                    None
                }
            },
            ValuePtrKind::NodeRWMember => self.read_node_rw(ptr.node_index as usize, ptr.value_index as usize),
            ValuePtrKind::NodeROParameter => {
                Some(self.instance.node(ptr.node_index as usize).parameters[ptr.value_index as usize].clone())
            }
            ValuePtrKind::GlobalVariable => self.read_global(ptr.value_index as usize),
        }
    }

    /// Cross-frame writes through a `LocalVariable` pointer always fail as
    /// dangling, even when a live matching frame is found by the scan —
    /// this preserves the source's documented behavior; see spec §9 open
    /// question 1 and DESIGN.md.
    pub fn write_ptr(&mut self, ptr: ValuePtr, value: Value) -> bool {
        match ptr.kind {
            ValuePtrKind::Null => {
                diag!(self.diagnostics, DiagnosticId::Error_Exec_NullPointerException_WriteValue);
                self.abort();
                false
            }
            ValuePtrKind::LocalVariable => {
                let top_activation = self.current_frame().activation_index;
                if ptr.head.activation_index != top_activation {
                    diag!(self.diagnostics, DiagnosticId::Error_Exec_DanglingPointerException_WriteValue);
                    self.abort();
                    return false;
                }
                let function_index = self.current_frame().function_index;
                let declared = self.task.function(function_index).local_variable_kind(ptr.value_index as usize);
                if declared != value.kind() {
                    diag!(
                        self.diagnostics,
                        DiagnosticId::Error_Exec_TypeMismatch_WriteByPointer,
                        declared,
                        value.kind()
                    );
                    self.abort();
                    return false;
                }
                let pos = self.call_stack.len() - 1;
                self.call_stack[pos].locals[ptr.value_index as usize] = Some(value);
                true
            }
            ValuePtrKind::NodeRWMember => {
                let type_index = self.instance.node(ptr.node_index as usize).type_index;
                let declared = self.task.node_members(type_index).kind(ptr.value_index as usize);
                if declared != value.kind() {
                    diag!(
                        self.diagnostics,
                        DiagnosticId::Error_Exec_TypeMismatch_WriteByPointer,
                        declared,
                        value.kind()
                    );
                    self.abort();
                    return false;
                }
                self.node_members[ptr.node_index as usize][ptr.value_index as usize] = Some(value);
                true
            }
            ValuePtrKind::NodeROParameter => {
                diag!(self.diagnostics, DiagnosticId::Error_Exec_WriteToConst_WriteNodeParamByPointer);
                self.abort();
                false
            }
            ValuePtrKind::GlobalVariable => {
                let declared = self.task.global_variables().kind(ptr.value_index as usize);
                if declared != value.kind() {
                    diag!(
                        self.diagnostics,
                        DiagnosticId::Error_Exec_TypeMismatch_WriteByPointer,
                        declared,
                        value.kind()
                    );
                    self.abort();
                    return false;
                }
                self.globals[ptr.value_index as usize] = Some(value);
                true
            }
        }
    }

    // ---- node-pointer traversal (spec §4.8) --------------------------------

    pub fn node_parent(&mut self, ptr: NodePtr) -> Option<NodePtr> {
        if ptr.node_index < 0 {
            diag!(self.diagnostics, DiagnosticId::Error_Exec_BadNodePointer_TraverseToParent);
            self.abort();
            return None;
        }
        let parent_index = self.instance.node(ptr.node_index as usize).parent_index;
        Some(NodePtr {
            head: self.current_pointer_head(),
            node_index: parent_index,
        })
    }

    pub fn node_child(&mut self, ptr: NodePtr, child_type_name: &str, key: ChildKey<'_>) -> Option<NodePtr> {
        if ptr.node_index < 0 {
            diag!(self.diagnostics, DiagnosticId::Error_Exec_BadNodePointer_TraverseToChild);
            self.abort();
            return None;
        }

        let head = self.current_pointer_head();
        let Some(child_type_index) = self.schema.get_node_type_index(child_type_name) else {
            // Unlike a resolved hash-lookup miss, an unresolvable child type
            // name has no dedicated diagnostic in the source's Diag::ID
            // table; treated as a lookup miss (null result) rather than an
            // abort, consistent with "a miss yields a null node pointer".
            return Some(NodePtr::null(head));
        };

        let parent_node = self.instance.node(ptr.node_index as usize);
        let child_node_type = self.schema.node_type(child_type_index);

        let (param_index, key_value) = match key {
            ChildKey::PrimaryKey(value) => {
                let primary_key_index = child_node_type.primary_key_index();
                if primary_key_index < 0 {
                    diag!(self.diagnostics, DiagnosticId::Error_Exec_BadTraverse_ChildWithoutPrimaryKey, child_type_name);
                    self.abort();
                    return None;
                }
                let decl = &child_node_type.parameters()[primary_key_index as usize];
                if decl.kind != value.kind() {
                    diag!(
                        self.diagnostics,
                        DiagnosticId::Error_Exec_BadTraverse_PrimaryKeyTypeMismatch,
                        decl.kind,
                        value.kind()
                    );
                    self.abort();
                    return None;
                }
                (primary_key_index as usize, value)
            }
            ChildKey::Named(field_name, value) => {
                let Some(param_index) = child_node_type.get_parameter_index(field_name) else {
                    diag!(self.diagnostics, DiagnosticId::Error_Exec_BadTraverse_ParameterNotFound, field_name);
                    self.abort();
                    return None;
                };
                let decl = &child_node_type.parameters()[param_index];
                if !decl.unique {
                    diag!(self.diagnostics, DiagnosticId::Error_Exec_BadTraverse_ParameterNotUnique, field_name);
                    self.abort();
                    return None;
                }
                if decl.kind != value.kind() {
                    diag!(
                        self.diagnostics,
                        DiagnosticId::Error_Exec_BadTraverse_UniqueKeyTypeMismatch,
                        decl.kind,
                        value.kind()
                    );
                    self.abort();
                    return None;
                }
                (param_index, value)
            }
        };

        let found = parent_node.find_child_by_param(child_type_index, param_index, &key_value);
        Some(match found {
            Some(index) => NodePtr { head, node_index: index as i64 },
            None => NodePtr::null(head),
        })
    }
}
