//! A thin container bundling one or more IR schemas and tasks, addressable
//! by name. No algorithmic content lives here beyond delegating to
//! `RootType::validate` and `Task::validate` for each entry.

use crate::diagnostics::Diagnostics;
use crate::ir::RootType;
use crate::task::Task;

#[derive(Debug, Default)]
pub struct Bundle {
    schemas: Vec<(String, RootType)>,
    tasks: Vec<(String, Task)>,
}

impl Bundle {
    pub fn new() -> Self {
        Bundle::default()
    }

    pub fn add_schema(&mut self, name: impl Into<String>, schema: RootType) {
        self.schemas.push((name.into(), schema));
    }

    pub fn add_task(&mut self, name: impl Into<String>, task: Task) {
        self.tasks.push((name.into(), task));
    }

    pub fn schema(&self, name: &str) -> Option<&RootType> {
        self.schemas.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    pub fn schema_mut(&mut self, name: &str) -> Option<&mut RootType> {
        self.schemas.iter_mut().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    pub fn task(&self, name: &str) -> Option<&Task> {
        self.tasks.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }

    pub fn task_mut(&mut self, name: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|(n, _)| n == name).map(|(_, t)| t)
    }

    pub fn schemas(&self) -> impl Iterator<Item = (&str, &RootType)> {
        self.schemas.iter().map(|(n, s)| (n.as_str(), s))
    }

    pub fn tasks(&self) -> impl Iterator<Item = (&str, &Task)> {
        self.tasks.iter().map(|(n, t)| (n.as_str(), t))
    }

    /// Validates every schema, then every task (each task is validated
    /// against its own schema's node-type count only — see `Task::new`).
    /// Accumulates across all entries; does not short-circuit on the first
    /// failure, matching the accumulate-never-short-circuit rule spec §7
    /// states for validation in general.
    pub fn validate(&mut self, diag: &mut Diagnostics) -> bool {
        let mut ok = true;
        for (name, schema) in &mut self.schemas {
            let _guard = diag.scoped_node(format!("Schema {name}"));
            ok = schema.validate(&mut *_guard) && ok;
        }
        for (name, task) in &mut self.tasks {
            let _guard = diag.scoped_node(format!("Task {name}"));
            ok = task.validate(&mut *_guard) && ok;
        }
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticId;
    use crate::ir::NodeType;

    fn valid_schema() -> RootType {
        let mut root = RootType::new("Root");
        root.add_node_type(NodeType::new("root"));
        root.set_root_node_type("root");
        root
    }

    #[test]
    fn lookups_find_entries_by_name_and_miss_on_unknown_names() {
        let mut bundle = Bundle::new();
        bundle.add_schema("main", valid_schema());
        bundle.add_task("main", Task::new(1));
        assert!(bundle.schema("main").is_some());
        assert!(bundle.task("main").is_some());
        assert!(bundle.schema("missing").is_none());
        assert!(bundle.task("missing").is_none());
    }

    #[test]
    fn schemas_and_tasks_iterate_in_insertion_order() {
        let mut bundle = Bundle::new();
        bundle.add_schema("a", valid_schema());
        bundle.add_schema("b", valid_schema());
        bundle.add_task("x", Task::new(1));
        bundle.add_task("y", Task::new(1));
        assert_eq!(bundle.schemas().map(|(n, _)| n).collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(bundle.tasks().map(|(n, _)| n).collect::<Vec<_>>(), vec!["x", "y"]);
    }

    #[test]
    fn validate_accumulates_across_all_schemas_and_tasks() {
        let mut bundle = Bundle::new();
        bundle.add_schema("good", valid_schema());
        // An empty root type name is rejected, so this schema contributes
        // its own failure independent of "good"'s success.
        bundle.add_schema("bad", RootType::new(""));
        bundle.add_task("no_callback", Task::new(1));

        let mut diag = Diagnostics::new();
        assert!(!bundle.validate(&mut diag));
        assert!(diag.records().iter().any(|r| r.id == DiagnosticId::Error_Task_NoCallback));
    }

    #[test]
    fn validate_succeeds_when_every_schema_and_task_is_valid() {
        let mut bundle = Bundle::new();
        bundle.add_schema("main", valid_schema());
        let mut task = Task::new(1);
        let mut f = crate::task::Function::new("f");
        f.add_statement(crate::task::Statement::Return);
        task.add_function(f);
        task.set_node_callback(0, "f", crate::task::CallbackType::OnEntry);
        bundle.add_task("main", task);

        let mut diag = Diagnostics::new();
        assert!(bundle.validate(&mut diag));
        assert!(!diag.has_errors());
    }

    #[test]
    fn mutable_accessors_allow_editing_entries_in_place() {
        let mut bundle = Bundle::new();
        bundle.add_schema("main", valid_schema());
        bundle
            .schema_mut("main")
            .expect("schema was just added")
            .add_node_type(NodeType::new("extra"));
        assert_eq!(bundle.schema("main").unwrap().node_types().len(), 2);
    }
}
