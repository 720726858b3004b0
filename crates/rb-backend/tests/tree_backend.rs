use pretty_assertions::assert_eq;
use rb_backend::{CodegenBackend, TreeBackend};
use rb_core::error::Error;
use rb_core::ir::{Ir, IrUnit, RaiseKind, TypeRelation};
use rb_core::native::NativeFn;
use rb_core::value::{Params, RecordField, Ty, Value};
use rb_core::Result;

fn unit(locals: u32, body: Ir) -> IrUnit {
    IrUnit {
        name: "test".into(),
        locals,
        body,
    }
}

// ===== CONTROL FLOW =====

#[test]
fn test_guard_reports_failure_as_false() -> Result<()> {
    let backend = TreeBackend::new();
    let body = Ir::MakeTuple(vec![
        Ir::Guard {
            label: 0,
            body: Ir::seq(vec![Ir::assign(0, Ir::int(1)), Ir::Fail(0)]).into(),
        },
        Ir::Guard {
            label: 1,
            body: Ir::when(Ir::Const(Value::Bool(false)), Ir::Fail(1)).into(),
        },
        Ir::Local(0),
    ]);
    let compiled = backend.compile(unit(1, body))?;
    assert_eq!(
        compiled.invoke(Value::Unit)?,
        Value::Tuple(vec![Value::Bool(false), Value::Bool(true), Value::Int(1)])
    );
    Ok(())
}

#[test]
fn test_params_inspection() -> Result<()> {
    let backend = TreeBackend::new();
    let body = Ir::MakeList(vec![
        Ir::PositionalCount(Ir::Input.into()),
        Ir::PositionalGet(Ir::Input.into(), 1),
        Ir::NamedGet(Ir::Input.into(), "scale".into()),
    ]);
    let compiled = backend.compile(unit(0, body))?;
    let params = Params::new(
        vec![Value::Int(4), Value::Int(5)],
        vec![("scale".into(), Value::Int(9))],
    )?;
    assert_eq!(
        compiled.invoke(Value::params(params))?,
        Value::List(vec![Value::Int(2), Value::Int(5), Value::Int(9)])
    );
    Ok(())
}

#[test]
fn test_named_within_rejects_unknown_names() -> Result<()> {
    let backend = TreeBackend::new();
    let body = Ir::NamedWithin(Ir::Input.into(), vec!["x".into()]);
    let compiled = backend.compile(unit(0, body))?;
    let known = Params::new(vec![], vec![("x".into(), Value::Int(1))])?;
    let unknown = Params::new(vec![], vec![("y".into(), Value::Int(1))])?;
    assert_eq!(compiled.invoke(Value::params(known))?, Value::Bool(true));
    assert_eq!(compiled.invoke(Value::params(unknown))?, Value::Bool(false));
    Ok(())
}

#[test]
fn test_type_tests() -> Result<()> {
    let backend = TreeBackend::new();
    let test = |target: Ty, relation| Ir::TypeTest {
        value: Ir::Input.into(),
        target,
        relation,
    };
    let body = Ir::MakeTuple(vec![
        test(Ty::Int, TypeRelation::Exact),
        test(Ty::Any, TypeRelation::Exact),
        test(Ty::Any, TypeRelation::Subtype),
    ]);
    let compiled = backend.compile(unit(0, body))?;
    assert_eq!(
        compiled.invoke(Value::Int(3))?,
        Value::Tuple(vec![Value::Bool(true), Value::Bool(false), Value::Bool(true)])
    );
    Ok(())
}

// ===== CONSTANTS AND NATIVES =====

#[test]
fn test_non_scalar_constants_are_pooled_once() -> Result<()> {
    let backend = TreeBackend::new();
    let list = Value::List(vec![Value::Int(1), Value::Int(2)]);
    let body = Ir::MakeTuple(vec![
        Ir::Const(list.clone()),
        Ir::Const(list.clone()),
        Ir::int(7),
    ]);
    let compiled = backend.compile(unit(0, body.clone()))?;
    assert_eq!(
        compiled.invoke(Value::Unit)?,
        Value::Tuple(vec![list.clone(), list.clone(), Value::Int(7)])
    );

    let lowered = backend.lower(unit(0, body));
    assert_eq!(lowered.pool(), &[list][..]);
    assert_eq!(
        lowered.body(),
        &Ir::MakeTuple(vec![Ir::ConstSlot(0), Ir::ConstSlot(0), Ir::int(7)])
    );
    assert_eq!(backend.compiled_units(), 2);
    Ok(())
}

#[test]
fn test_native_errors_propagate_unchanged() -> Result<()> {
    let backend = TreeBackend::new();
    let fail = NativeFn::unary("boom", |_: i64| -> Result<i64> {
        Err(Error::native("boom", "exploded"))
    });
    let body = Ir::NativeCall {
        function: fail,
        args: vec![Ir::int(1)],
    };
    let compiled = backend.compile(unit(0, body))?;
    assert_eq!(
        compiled.invoke(Value::Unit),
        Err(Error::native("boom", "exploded"))
    );
    Ok(())
}

#[test]
fn test_raise_carries_call_shape() -> Result<()> {
    let backend = TreeBackend::new();
    let body = Ir::Raise {
        kind: RaiseKind::NoMatch {
            method: "f".into(),
        },
        operands: vec![Ir::Input],
    };
    let compiled = backend.compile(unit(0, body))?;
    let params = Params::positional(vec![Value::Int(1), Value::from("a")]);
    assert_eq!(
        compiled.invoke(Value::params(params)),
        Err(Error::NoMatch {
            method: "f".into(),
            shape: "(Int, String)".into(),
        })
    );
    Ok(())
}

// ===== TYPES =====

#[test]
fn test_finish_type_seals_builder_type() -> Result<()> {
    let backend = TreeBackend::new();
    let builder = backend.begin_type("Point");
    let open = builder.record_type().clone();
    assert!(!open.is_sealed());
    let fields = vec![
        RecordField {
            name: "a".into(),
            ty: Ty::Int,
        },
        RecordField {
            name: "b".into(),
            ty: Ty::Int,
        },
    ];
    let finished = backend.finish_type(builder, fields)?;
    assert_eq!(finished, open);
    assert!(open.is_sealed());
    let point = finished.construct(vec![Value::Int(1), Value::Int(2)])?;
    assert_eq!(point.runtime_ty(), Ty::Record(finished));
    Ok(())
}
