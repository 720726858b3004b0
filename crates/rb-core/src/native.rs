//! Externally implemented primitives callable from compiled code.

use crate::error::Error;
use crate::value::{Ty, Value};
use crate::Result;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

type NativeBody = dyn Fn(Vec<Value>) -> Result<Value> + Send + Sync;

/// A native function together with its parameter and return types.
pub struct NativeFn {
    name: String,
    params: Vec<Ty>,
    ret: Ty,
    body: Box<NativeBody>,
}

pub type NativeRef = Arc<NativeFn>;

impl NativeFn {
    pub fn new(
        name: impl Into<String>,
        params: Vec<Ty>,
        ret: Ty,
        body: impl Fn(Vec<Value>) -> Result<Value> + Send + Sync + 'static,
    ) -> NativeRef {
        Arc::new(Self {
            name: name.into(),
            params,
            ret,
            body: Box::new(body),
        })
    }

    pub fn unary<A, R>(
        name: impl Into<String>,
        f: impl Fn(A) -> Result<R> + Send + Sync + 'static,
    ) -> NativeRef
    where
        A: NativeType,
        R: NativeType,
    {
        let name = name.into();
        let fname = name.clone();
        Self::new(name, vec![A::ty()], R::ty(), move |args| {
            let [a] = take_args::<1>(&fname, args)?;
            f(A::from_value(&fname, a)?).map(R::into_value)
        })
    }

    pub fn binary<A, B, R>(
        name: impl Into<String>,
        f: impl Fn(A, B) -> Result<R> + Send + Sync + 'static,
    ) -> NativeRef
    where
        A: NativeType,
        B: NativeType,
        R: NativeType,
    {
        let name = name.into();
        let fname = name.clone();
        Self::new(name, vec![A::ty(), B::ty()], R::ty(), move |args| {
            let [a, b] = take_args::<2>(&fname, args)?;
            f(A::from_value(&fname, a)?, B::from_value(&fname, b)?).map(R::into_value)
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn params(&self) -> &[Ty] {
        &self.params
    }
    pub fn ret(&self) -> &Ty {
        &self.ret
    }

    pub fn invoke(&self, args: Vec<Value>) -> Result<Value> {
        (self.body)(args)
    }
}

fn take_args<const N: usize>(function: &str, args: Vec<Value>) -> Result<[Value; N]> {
    let len = args.len();
    args.try_into()
        .map_err(|_| Error::native(function, format!("expected {} arguments, got {}", N, len)))
}

impl Debug for NativeFn {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "<native {}>", self.name)
    }
}

impl PartialEq for NativeFn {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

/// Rust types that cross the native boundary.
pub trait NativeType: Sized {
    fn ty() -> Ty;
    fn from_value(function: &str, value: Value) -> Result<Self>;
    fn into_value(self) -> Value;
}

fn mismatch(function: &str, expected: Ty, value: &Value) -> Error {
    Error::native(function, format!("expected {}, got {}", expected, value.runtime_ty()))
}

macro_rules! native_type {
    ($rust:ty, $variant:ident, $ty:expr) => {
        impl NativeType for $rust {
            fn ty() -> Ty {
                $ty
            }
            fn from_value(function: &str, value: Value) -> Result<Self> {
                match value {
                    Value::$variant(inner) => Ok(inner),
                    other => Err(mismatch(function, $ty, &other)),
                }
            }
            fn into_value(self) -> Value {
                Value::$variant(self)
            }
        }
    };
}

native_type!(i64, Int, Ty::Int);
native_type!(f64, Float, Ty::Float);
native_type!(bool, Bool, Ty::Bool);
native_type!(String, String, Ty::String);
native_type!(Ty, Type, Ty::Type);

impl NativeType for Value {
    fn ty() -> Ty {
        Ty::Any
    }
    fn from_value(_function: &str, value: Value) -> Result<Self> {
        Ok(value)
    }
    fn into_value(self) -> Value {
        self
    }
}

impl NativeType for Vec<Value> {
    fn ty() -> Ty {
        Ty::list(Ty::Any)
    }
    fn from_value(function: &str, value: Value) -> Result<Self> {
        match value {
            Value::List(items) => Ok(items),
            other => Err(mismatch(function, Self::ty(), &other)),
        }
    }
    fn into_value(self) -> Value {
        Value::List(self)
    }
}

impl NativeType for () {
    fn ty() -> Ty {
        Ty::Unit
    }
    fn from_value(function: &str, value: Value) -> Result<Self> {
        match value {
            Value::Unit => Ok(()),
            other => Err(mismatch(function, Ty::Unit, &other)),
        }
    }
    fn into_value(self) -> Value {
        Value::Unit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn typed_natives_derive_their_signature() -> Result<()> {
        let add = NativeFn::binary("+", |a: i64, b: i64| Ok(a + b));
        assert_eq!(add.params(), &[Ty::Int, Ty::Int]);
        assert_eq!(add.ret(), &Ty::Int);
        assert_eq!(add.invoke(vec![Value::Int(2), Value::Int(3)])?, Value::Int(5));
        Ok(())
    }

    #[test]
    fn wrong_arguments_are_native_errors() {
        let neg = NativeFn::unary("-", |a: i64| Ok(-a));
        let err = neg.invoke(vec![Value::from("x")]).unwrap_err();
        assert!(matches!(err, Error::Native { .. }));
        assert!(neg.invoke(vec![]).is_err());
    }
}
