//! Runtime values shared by the compiler and the backends.

mod callable;
mod params;
mod record;
mod ty;

pub use callable::*;
pub use params::*;
pub use record::*;
pub use ty::*;

use derive_more::{Display, From};
use itertools::Itertools;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Stable index of a forward type handle inside an environment's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, From, Display)]
#[display("typebox#{_0}")]
pub struct TypeBoxId(pub usize);

#[derive(Clone)]
pub enum Value {
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Tuple(Vec<Value>),
    List(Vec<Value>),
    Type(Ty),
    Params(Arc<Params>),
    Record(Arc<RecordValue>),
    Callable(CallableRef),
    Struct(Arc<Struct>),
    TypeBox(TypeBoxId),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }
    pub fn callable(callable: impl Callable + 'static) -> Self {
        Value::Callable(Arc::new(callable))
    }
    pub fn params(params: Params) -> Self {
        Value::Params(Arc::new(params))
    }

    pub fn runtime_ty(&self) -> Ty {
        match self {
            Value::Unit => Ty::Unit,
            Value::Bool(_) => Ty::Bool,
            Value::Int(_) => Ty::Int,
            Value::Float(_) => Ty::Float,
            Value::String(_) => Ty::String,
            Value::Tuple(items) => Ty::Tuple(items.iter().map(Value::runtime_ty).collect()),
            Value::List(items) => Ty::list(Ty::common_of(items.iter().map(Value::runtime_ty))),
            Value::Type(_) | Value::TypeBox(_) => Ty::Type,
            Value::Params(_) => Ty::Params,
            Value::Record(record) => Ty::Record(record.ty().clone()),
            Value::Callable(_) => Ty::Callable,
            Value::Struct(_) => Ty::Struct,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }
    pub fn as_params(&self) -> Option<&Arc<Params>> {
        match self {
            Value::Params(p) => Some(p),
            _ => None,
        }
    }
    pub fn as_callable(&self) -> Option<&CallableRef> {
        match self {
            Value::Callable(c) => Some(c),
            _ => None,
        }
    }

    /// Shape of the value as used in dispatch errors: types, not contents.
    pub fn shape(&self) -> String {
        match self {
            Value::Params(params) => params.shape(),
            other => other.runtime_ty().to_string(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Unit, Value::Unit) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Type(a), Value::Type(b)) => a == b,
            (Value::Params(a), Value::Params(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => a == b,
            (Value::Callable(a), Value::Callable(b)) => {
                std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            }
            (Value::Struct(a), Value::Struct(b)) => a == b,
            (Value::TypeBox(a), Value::TypeBox(b)) => a == b,
            _ => false,
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::String(s) => write!(f, "{:?}", s),
            Value::Callable(c) => write!(f, "<callable {}>", c.name()),
            other => write!(f, "{}", other),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Unit => write!(f, "()"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::String(s) => write!(f, "{}", s),
            Value::Tuple(items) => write!(f, "({})", items.iter().join(", ")),
            Value::List(items) => write!(f, "[{}]", items.iter().join(", ")),
            Value::Type(t) => write!(f, "{}", t),
            Value::Params(p) => write!(f, "{}", p),
            Value::Record(r) => write!(f, "{}", r),
            Value::Callable(c) => write!(f, "{}", c.name()),
            Value::Struct(s) => write!(f, "{}", s),
            Value::TypeBox(id) => write!(f, "{}", id),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}
impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}
impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}
impl From<Ty> for Value {
    fn from(t: Ty) -> Self {
        Value::Type(t)
    }
}
