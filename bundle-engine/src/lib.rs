//! Typed IR, schema/task validation, and a tree-walking interpreter for
//! Bundle processing. See `SPEC_FULL.md` at the workspace root for the
//! full module-by-module contract; `DESIGN.md` records what each module is
//! grounded on.
//!
//! This crate does no I/O and no printing: it is a library of data types
//! and algorithms operating entirely on in-memory structures. Reading a
//! bundle manifest or a serialized IR instance off disk is `bundle-cli`'s
//! job.

pub mod bundle;
pub mod context;
pub mod diagnostics;
pub mod error;
pub mod expression;
pub mod ir;
pub mod output;
pub mod persistence;
pub mod task;
pub mod value;

pub use bundle::Bundle;
pub use context::{ChildKey, ExecutionContext};
pub use diagnostics::{DiagnosticId, Diagnostics, DiagnosticRecord, Parameter, Severity};
pub use expression::{Expression, NodeSpecifier};
pub use ir::{validate_name, NodeInstance, NodeType, ParamDecl, RootInstance, RootType};
pub use output::{OutputSink, TextEncoding, TextSink};
pub use task::{
    BranchAction, BranchCase, BranchStatement, CallbackType, Function, Lvalue, MemberDecl,
    NodeCallbackRecord, Statement, Task,
};
pub use value::{NodePtr, PointerHead, Value, ValueKind, ValuePtr, ValuePtrKind};
