//! Compile and dispatch core: staged values, scopes, coercion, pattern
//! matching, multi-dispatch methods, modules and the fixpoint module loader.

pub mod base;
pub mod coerce;
pub mod compiler;
pub mod context;
pub mod dispatch;
pub mod env;
pub mod generic;
pub mod loader;
pub mod macros;
pub mod matcher;
pub mod method;
pub mod module;
pub mod scope;
pub mod staged;
pub mod testing;
pub mod typebox;

pub use compiler::{evaluate, FunctionCompiler};
pub use context::CompileContext;
pub use env::Environment;
pub use loader::ModuleLoader;
pub use method::{Method, MethodCase};
pub use module::Module;
pub use staged::StagedValue;
