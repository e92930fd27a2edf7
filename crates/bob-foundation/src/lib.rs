// Shared names, canonical maps and hashing primitives used by every layer
// of the package graph engine: the recipe loader, the graph instantiator,
// the identity/hashing engine, the workspace manager and the scheduler.

pub mod bool_expr;
pub mod digest;
pub mod env;
pub mod name;

pub use bool_expr::is_truthy;
pub use digest::{Digest, HashAlgorithm};
pub use env::EnvMap;
pub use name::{Error as NameError, PackagePath, RecipeName, ToolName, VarName};
