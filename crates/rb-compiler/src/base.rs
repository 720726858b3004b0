//! The module every environment imports implicitly: primitive types and the
//! native operations over them.

use crate::context::CompileContext;
use crate::module::Module;
use rb_core::error::Error;
use rb_core::native::NativeFn;
use rb_core::value::{Ty, Value};
use rb_core::Result;
use std::sync::Arc;

pub const BASE_MODULE: &str = "base";

fn overflow(function: &str) -> Error {
    Error::native(function, "integer overflow")
}

pub fn base_module(ctx: Arc<CompileContext>) -> Result<Arc<Module>> {
    let module = Module::new(BASE_MODULE, ctx);
    for (name, ty) in [
        ("Any", Ty::Any),
        ("Never", Ty::Never),
        ("Unit", Ty::Unit),
        ("Bool", Ty::Bool),
        ("Int", Ty::Int),
        ("Float", Ty::Float),
        ("String", Ty::String),
        ("Type", Ty::Type),
    ] {
        module.define(name, Value::Type(ty));
    }
    module.define("true", Value::Bool(true));
    module.define("false", Value::Bool(false));

    register_int(&module)?;
    register_float(&module)?;

    module.register_native("==", NativeFn::binary("==", |a: Value, b: Value| Ok(a == b)))?;
    module.register_native(
        "==",
        NativeFn::binary("==", |a: f64, b: f64| Ok(a == b || (a.is_nan() && b.is_nan()))),
    )?;
    module.register_native(
        "parseInt",
        NativeFn::unary("parseInt", |s: String| {
            s.trim()
                .parse::<i64>()
                .map_err(|err| Error::native("parseInt", format!("{:?}: {}", s, err)))
        }),
    )?;
    module.register_native("Array", NativeFn::unary("Array", |item: Ty| Ok(Ty::list(item))))?;
    module.register_native(
        "to_string",
        NativeFn::unary("to_string", |value: Value| Ok(value.to_string())),
    )?;
    module.register_native(
        "construct",
        NativeFn::binary("construct", |ty: Ty, args: Vec<Value>| match ty {
            Ty::Record(record) => record.construct(args),
            other => Err(Error::native("construct", format!("{} is not a record type", other))),
        }),
    )?;
    module.register_native(
        "field",
        NativeFn::binary("field", |value: Value, name: String| match value {
            Value::Record(record) => record.field(&name).cloned(),
            other => Err(Error::native("field", format!("{} is not a record", other))),
        }),
    )?;
    Ok(module)
}

fn register_int(module: &Arc<Module>) -> Result<()> {
    module.register_native(
        "+",
        NativeFn::binary("+", |a: i64, b: i64| a.checked_add(b).ok_or_else(|| overflow("+"))),
    )?;
    module.register_native(
        "-",
        NativeFn::binary("-", |a: i64, b: i64| a.checked_sub(b).ok_or_else(|| overflow("-"))),
    )?;
    module.register_native(
        "*",
        NativeFn::binary("*", |a: i64, b: i64| a.checked_mul(b).ok_or_else(|| overflow("*"))),
    )?;
    module.register_native(
        "-",
        NativeFn::unary("-", |a: i64| a.checked_neg().ok_or_else(|| overflow("-"))),
    )?;
    module.register_native(
        "abs",
        NativeFn::unary("abs", |a: i64| a.checked_abs().ok_or_else(|| overflow("abs"))),
    )?;
    module.register_native(
        "div",
        NativeFn::binary("div", |a: i64, b: i64| {
            a.checked_div(b).ok_or_else(|| {
                if b == 0 {
                    Error::native("div", "division by zero")
                } else {
                    overflow("div")
                }
            })
        }),
    )
}

fn register_float(module: &Arc<Module>) -> Result<()> {
    module.register_native("+", NativeFn::binary("+", |a: f64, b: f64| Ok(a + b)))?;
    module.register_native("-", NativeFn::binary("-", |a: f64, b: f64| Ok(a - b)))?;
    module.register_native("*", NativeFn::binary("*", |a: f64, b: f64| Ok(a * b)))?;
    module.register_native("-", NativeFn::unary("-", |a: f64| Ok(-a)))
}
