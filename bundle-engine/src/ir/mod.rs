pub mod instance;
pub mod schema;

pub use instance::{NodeInstance, RootInstance};
pub use schema::{validate_name, NodeType, ParamDecl, RootType};
