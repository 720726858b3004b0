//! Front end reading Rust-syntax source into the module and expression
//! trees understood by the compiler.

pub mod parser;

pub use parser::RustParser;
