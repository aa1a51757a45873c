//! Typed error views over a single diagnostic, grouped by concern the way
//! the source repository's own `error.rs` groups `RuntimeError` and
//! `ValidationError` rather than flattening everything into one enum.
//!
//! Nothing in this crate returns these from `validate()` — validation always
//! accumulates into [`crate::diagnostics::Diagnostics`] and returns `bool`,
//! per the source contract. These exist for embedders who want a `Result`
//! view of one diagnostic at a time (e.g. to `?`-propagate the first schema
//! error out of a builder function).

use std::fmt;

use crate::diagnostics::DiagnosticId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaError(pub DiagnosticId);

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "schema error: {:?}", self.0)
    }
}
impl std::error::Error for SchemaError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceError(pub DiagnosticId);

impl fmt::Display for InstanceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "instance error: {:?}", self.0)
    }
}
impl std::error::Error for InstanceError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskError(pub DiagnosticId);

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task error: {:?}", self.0)
    }
}
impl std::error::Error for TaskError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    Diagnostic(DiagnosticId),
    Aborted,
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::Diagnostic(id) => write!(f, "runtime error: {id:?}"),
            RuntimeError::Aborted => write!(f, "execution aborted"),
        }
    }
}
impl std::error::Error for RuntimeError {}

impl From<DiagnosticId> for RuntimeError {
    fn from(id: DiagnosticId) -> Self {
        RuntimeError::Diagnostic(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    Diagnostic(DiagnosticId),
    Json(String),
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistenceError::Diagnostic(id) => write!(f, "persistence error: {id:?}"),
            PersistenceError::Json(msg) => write!(f, "malformed json: {msg}"),
        }
    }
}
impl std::error::Error for PersistenceError {}

impl From<serde_json::Error> for PersistenceError {
    fn from(e: serde_json::Error) -> Self {
        PersistenceError::Json(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_impls_name_their_diagnostic() {
        let id = DiagnosticId::Error_IR_BadName_Empty;
        assert_eq!(SchemaError(id).to_string(), format!("schema error: {id:?}"));
        assert_eq!(InstanceError(id).to_string(), format!("instance error: {id:?}"));
        assert_eq!(TaskError(id).to_string(), format!("task error: {id:?}"));
        assert_eq!(RuntimeError::Diagnostic(id).to_string(), format!("runtime error: {id:?}"));
        assert_eq!(RuntimeError::Aborted.to_string(), "execution aborted");
    }

    #[test]
    fn runtime_error_converts_from_a_diagnostic_id() {
        let err: RuntimeError = DiagnosticId::Error_Exec_Unreachable.into();
        assert_eq!(err, RuntimeError::Diagnostic(DiagnosticId::Error_Exec_Unreachable));
    }

    #[test]
    fn persistence_error_wraps_a_serde_json_error_message() {
        let parse_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: PersistenceError = parse_err.into();
        match err {
            PersistenceError::Json(msg) => assert!(!msg.is_empty()),
            PersistenceError::Diagnostic(_) => panic!("expected a Json variant"),
        }
    }
}
