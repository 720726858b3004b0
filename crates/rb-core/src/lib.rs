#[macro_use]
pub mod macros;

pub mod ast;
pub mod collections;
pub mod config;
pub mod error;
pub mod ir;
pub mod native;
pub mod value;

// Re-export commonly used items for convenience
pub use tracing;

// Alias for error types
pub type Error = crate::error::Error;
pub type Result<T> = crate::error::Result<T>;
