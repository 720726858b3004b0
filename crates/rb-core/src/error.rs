use crate::ast::Location;
use miette::Diagnostic;
use std::result;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Diagnostic)]
pub enum Error {
    #[error("unbound name `{name}` at {location}")]
    #[diagnostic(
        code(roboot::unbound_name),
        help("declare the name in an enclosing block, the module, or an imported module")
    )]
    UnboundName { name: String, location: Location },

    #[error("cannot coerce {value} to {target} at {location}")]
    #[diagnostic(code(roboot::bad_coercion))]
    BadCoercion {
        value: String,
        target: String,
        location: Location,
    },

    #[error("no case of `{method}` matches {shape}")]
    #[diagnostic(code(roboot::no_match))]
    NoMatch { method: String, shape: String },

    #[error("call {shape} to `{method}` is ambiguous: several cases match at cost {cost}")]
    #[diagnostic(
        code(roboot::ambiguous_match),
        help("make one case strictly more specific than the others")
    )]
    AmbiguousMatch {
        method: String,
        shape: String,
        cost: i64,
    },

    #[error("`{name}` resolves to incompatible bindings: {candidates}")]
    #[diagnostic(
        code(roboot::conflict),
        help("only methods merge across imports; rename one of the bindings")
    )]
    Conflict { name: String, candidates: String },

    #[error("loading {path} did not reach a fixpoint after {rounds} rounds")]
    #[diagnostic(
        code(roboot::macro_recursion),
        help("a type macro keeps generating new type declarations")
    )]
    MacroRecursionExceeded { path: String, rounds: usize },

    #[error("type handle error: {message}")]
    #[diagnostic(code(roboot::type_box))]
    TypeBox { message: String },

    #[error("unresolved import `{path}` at {location}")]
    #[diagnostic(code(roboot::unresolved_import))]
    UnresolvedImport { path: String, location: Location },

    #[error("{value} is not callable")]
    #[diagnostic(code(roboot::not_callable))]
    NotCallable { value: String },

    #[error("`{name}` is a runtime variable of another function and cannot be captured")]
    #[diagnostic(code(roboot::capture))]
    Capture { name: String },

    #[error("{function}: {message}")]
    #[diagnostic(code(roboot::native))]
    Native { function: String, message: String },

    #[error("{0}")]
    #[diagnostic(code(roboot::generic))]
    Generic(String),
}

pub type Result<T> = result::Result<T, Error>;

impl Error {
    pub fn native(function: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Native {
            function: function.into(),
            message: message.into(),
        }
    }

    pub fn type_box(message: impl Into<String>) -> Self {
        Error::TypeBox {
            message: message.into(),
        }
    }
}

// Convert from eyre::Report to our Error type
impl From<eyre::Report> for Error {
    fn from(err: eyre::Report) -> Self {
        Error::Generic(err.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Generic(s)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Generic(e.to_string())
    }
}
