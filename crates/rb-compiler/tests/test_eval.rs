// End-to-end evaluation against the base module

use pretty_assertions::assert_eq;
use rb_compiler::testing::init_logs;
use rb_compiler::Environment;
use rb_core::error::Error;
use rb_core::value::{Ty, Value};
use rb_core::Result;
use rb_rust_lang::{rb_parse_expr, rb_parse_items};

// ===== ARITHMETIC =====

#[test]
fn test_nested_arithmetic_and_equality() -> Result<()> {
    init_logs();
    let env = Environment::new()?;
    let main = env.create_module("main");
    let expr = rb_parse_expr!((1 + 2 + (3 - 7) == -1) == true);
    assert_eq!(env.evaluate(&main, &expr)?, Value::Bool(true));
    Ok(())
}

#[test]
fn test_integer_division() -> Result<()> {
    let env = Environment::new()?;
    let main = env.create_module("main");
    assert_eq!(env.evaluate(&main, &rb_parse_expr!(div(10, 2)))?, Value::Int(5));

    let err = env.evaluate(&main, &rb_parse_expr!(div(1, 0))).unwrap_err();
    assert_eq!(err, Error::native("div", "division by zero"));
    Ok(())
}

#[test]
fn test_overflow_is_a_native_error() -> Result<()> {
    let env = Environment::new()?;
    let main = env.create_module("main");
    let err = env
        .evaluate(&main, &rb_parse_expr!(9223372036854775807 + 1))
        .unwrap_err();
    assert!(matches!(err, Error::Native { ref function, .. } if function == "+"));
    Ok(())
}

#[test]
fn test_floats_prefer_their_exact_cases() -> Result<()> {
    let env = Environment::new()?;
    let main = env.create_module("main");
    assert_eq!(
        env.evaluate(&main, &rb_parse_expr!(1.5 * 2.0 == 3.0))?,
        Value::Bool(true)
    );
    assert_eq!(env.evaluate(&main, &rb_parse_expr!(-(0.5)))?, Value::Float(-0.5));
    Ok(())
}

#[test]
fn test_string_natives() -> Result<()> {
    let env = Environment::new()?;
    let main = env.create_module("main");
    assert_eq!(
        env.evaluate(&main, &rb_parse_expr!(parseInt(" 42 ") + 1))?,
        Value::Int(43)
    );
    assert_eq!(
        env.evaluate(&main, &rb_parse_expr!(to_string(12)))?,
        Value::string("12")
    );
    assert!(matches!(
        env.evaluate(&main, &rb_parse_expr!(parseInt("x"))),
        Err(Error::Native { .. })
    ));
    Ok(())
}

#[test]
fn test_type_expressions() -> Result<()> {
    let env = Environment::new()?;
    let main = env.create_module("main");
    assert_eq!(
        env.evaluate(&main, &rb_parse_expr!(Array(Int)))?,
        Value::Type(Ty::list(Ty::Int))
    );
    Ok(())
}

// ===== FUNCTIONS =====

#[test]
fn test_functions_as_values() -> Result<()> {
    let env = Environment::new()?;
    let items = rb_parse_items! {
        fn f(g: _, x: _) {
            g(x)
        }
        fn g(x: Int) {
            x + 1
        }
    };
    let main = env.load_stmts("main", "main.rs", items)?;
    assert_eq!(env.evaluate(&main, &rb_parse_expr!(f(g, 2)))?, Value::Int(3));
    Ok(())
}

#[test]
fn test_blocks_and_conditionals() -> Result<()> {
    let env = Environment::new()?;
    let items = rb_parse_items! {
        fn sign(x: Int) {
            if x == 0 {
                0
            } else {
                let negative = (x == abs(x)) == false;
                if negative { -1 } else { 1 }
            }
        }
    };
    let main = env.load_stmts("main", "main.rs", items)?;
    assert_eq!(env.evaluate(&main, &rb_parse_expr!(sign(-7)))?, Value::Int(-1));
    assert_eq!(env.evaluate(&main, &rb_parse_expr!(sign(0)))?, Value::Int(0));
    assert_eq!(
        env.evaluate(&main, &rb_parse_expr!([sign(3), sign(-3)]))?,
        Value::List(vec![Value::Int(1), Value::Int(-1)])
    );
    Ok(())
}

#[test]
fn test_trailing_let_yields_unit() -> Result<()> {
    let env = Environment::new()?;
    let main = env.create_module("main");
    let expr = rb_parse_expr!({
        let x = 1;
    });
    assert_eq!(env.evaluate(&main, &expr)?, Value::Unit);
    Ok(())
}

#[test]
fn test_closures_capture_enclosing_values() -> Result<()> {
    let env = Environment::new()?;
    let items = rb_parse_items! {
        fn shifted(x: _) {
            let k = 10;
            let add = |y: _| k + y;
            add(x)
        }
        fn computed(x: _) {
            let k = 5 + 5;
            let add = |y: _| k + y;
            add(x)
        }
        fn parameter(x: _) {
            let add = |y: _| x + y;
            add(1)
        }
        fn nested(x: _) {
            let outer = |y: _| {
                let inner = |z: _| x + y + z;
                inner(1)
            };
            outer(10)
        }
    };
    let main = env.load_stmts("main", "main.rs", items)?;
    assert_eq!(env.evaluate(&main, &rb_parse_expr!(shifted(1)))?, Value::Int(11));
    assert_eq!(env.evaluate(&main, &rb_parse_expr!(computed(1)))?, Value::Int(11));
    assert_eq!(env.evaluate(&main, &rb_parse_expr!(parameter(4)))?, Value::Int(5));
    assert_eq!(env.evaluate(&main, &rb_parse_expr!(parameter(6)))?, Value::Int(7));
    assert_eq!(env.evaluate(&main, &rb_parse_expr!(nested(100)))?, Value::Int(111));
    Ok(())
}

#[test]
fn test_type_annotations_cannot_read_runtime_locals() -> Result<()> {
    let env = Environment::new()?;
    let items = rb_parse_items! {
        fn annotated(t: _) {
            let v: t = 1;
            v
        }
    };
    let main = env.load_stmts("main", "main.rs", items)?;
    assert_eq!(
        env.evaluate(&main, &rb_parse_expr!(annotated(Int))).unwrap_err(),
        Error::Capture { name: "t".into() }
    );
    Ok(())
}

// ===== ERRORS =====

#[test]
fn test_unbound_name_is_a_compile_error() -> Result<()> {
    let env = Environment::new()?;
    let main = env.create_module("main");
    let err = env.evaluate(&main, &rb_parse_expr!(nowhere + 1)).unwrap_err();
    assert!(matches!(err, Error::UnboundName { ref name, .. } if name == "nowhere"));
    Ok(())
}

#[test]
fn test_let_type_assertions() -> Result<()> {
    let env = Environment::new()?;
    let items = rb_parse_items! {
        fn checked(v: _) {
            let y: Int = v;
            y
        }
        fn broken() {
            let y: Int = "s";
            y
        }
    };
    let main = env.load_stmts("main", "main.rs", items)?;
    assert_eq!(env.evaluate(&main, &rb_parse_expr!(checked(4)))?, Value::Int(4));
    assert!(matches!(
        env.evaluate(&main, &rb_parse_expr!(checked("s"))),
        Err(Error::BadCoercion { ref target, .. }) if target == "Int"
    ));
    assert!(matches!(
        env.evaluate(&main, &rb_parse_expr!(broken())),
        Err(Error::BadCoercion { ref value, .. }) if value == "s"
    ));
    Ok(())
}

#[test]
fn test_calling_a_constant_fails() -> Result<()> {
    let env = Environment::new()?;
    let main = env.create_module("main");
    assert_eq!(
        env.evaluate(&main, &rb_parse_expr!(1(2))).unwrap_err(),
        Error::NotCallable { value: "1".into() }
    );
    Ok(())
}
