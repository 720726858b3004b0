// Module lookup, merging and round-based loading

use pretty_assertions::assert_eq;
use rb_backend::TreeBackend;
use rb_compiler::macros::TypeMacro;
use rb_compiler::module::Module;
use rb_compiler::{Environment, Method};
use rb_core::ast::{DataDecl, Expr, ExprKind, ModuleStmt, RecordDef};
use rb_core::config::LoaderOptions;
use rb_core::error::Error;
use rb_core::value::{RecordField, RecordTypeRef, Ty, Value};
use rb_core::Result;
use rb_rust_lang::{rb_parse_expr, rb_parse_items, RustParser};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn method_of_value(value: &Value) -> &Method {
    let callable = value.as_callable().expect("a method");
    callable.as_any().downcast_ref::<Method>().expect("a method")
}

fn method_of(module: &Module, name: &str) -> Result<Method> {
    let value = module.lookup(name, true)?.expect("name is bound");
    Method::merge(&[method_of_value(&value)], name)
}

// ===== LOOKUP =====

#[test]
fn test_imported_methods_merge_in_order() -> Result<()> {
    let env = Environment::new()?;
    let a = env.load_stmts(
        "a",
        "a.rs",
        rb_parse_items! {
            fn describe(x: Int) { "int" }
        },
    )?;
    let b = env.load_stmts(
        "b",
        "b.rs",
        rb_parse_items! {
            fn describe(x: String) { "string" }
            fn describe(x: Bool) { "bool" }
        },
    )?;
    let mut stmts = vec![ModuleStmt::import("a"), ModuleStmt::import("b")];
    stmts.extend(rb_parse_items! {
        const ALL: _ = [describe(1), describe("s"), describe(true)];
    });
    let c = env.load_stmts("c", "c.rs", stmts)?;

    assert!(Arc::ptr_eq(&env.module("c").expect("c is registered"), &c));
    let merged = method_of(&c, "describe")?;
    let from_a = method_of(&a, "describe")?;
    let from_b = method_of(&b, "describe")?;
    let expected: Vec<_> = from_a.cases().iter().chain(from_b.cases()).collect();
    assert_eq!(merged.cases().len(), 3);
    for (merged, expected) in merged.cases().iter().zip(expected) {
        assert!(merged.same_case(expected));
    }
    assert_eq!(
        c.lookup_local("ALL"),
        Some(Value::List(vec![
            Value::string("int"),
            Value::string("string"),
            Value::string("bool"),
        ]))
    );
    Ok(())
}

#[test]
fn test_merged_methods_are_shared_until_a_candidate_changes() -> Result<()> {
    let env = Environment::new()?;
    env.load_stmts("a", "a.rs", rb_parse_items! { fn kind(x: Int) { "int" } })?;
    let mut stmts = vec![ModuleStmt::import("a")];
    stmts.extend(rb_parse_items! { fn kind(x: String) { "string" } });
    let c = env.load_stmts("c", "c.rs", stmts)?;

    let first = c.lookup("kind", true)?.expect("kind is bound");
    assert_eq!(c.lookup("kind", true)?, Some(first.clone()));
    assert_eq!(env.evaluate(&c, &rb_parse_expr!(kind(1)))?, Value::string("int"));
    let method = method_of_value(&first);
    assert!(method.is_compiled());

    env.loader(c.clone())
        .load("more.rs", rb_parse_items! { fn kind(x: Bool) { "bool" } })?;
    let second = c.lookup("kind", true)?.expect("kind is bound");
    assert_ne!(second, first);
    assert_eq!(method_of_value(&second).cases().len(), 3);
    assert!(!method_of_value(&second).is_compiled());
    Ok(())
}

#[test]
fn test_imported_constants_conflict() -> Result<()> {
    let env = Environment::new()?;
    env.load_stmts("a", "a.rs", rb_parse_items! { const X: _ = 1; })?;
    env.load_stmts("b", "b.rs", rb_parse_items! { const X: _ = 2; })?;
    let c = env.load_stmts(
        "c",
        "c.rs",
        vec![ModuleStmt::import("a"), ModuleStmt::import("b")],
    )?;
    assert!(matches!(
        c.lookup("X", true),
        Err(Error::Conflict { ref name, .. }) if name == "X"
    ));
    // a local binding is looked up together with the imported ones
    c.define("X", Value::Int(3));
    assert!(c.lookup("X", true).is_err());
    assert_eq!(c.lookup("X", false)?, Some(Value::Int(3)));
    Ok(())
}

#[test]
fn test_imports_are_one_level_deep() -> Result<()> {
    let env = Environment::new()?;
    env.load_stmts("a", "a.rs", rb_parse_items! { const DEEP: _ = 1; })?;
    let b = env.load_stmts("b", "b.rs", vec![ModuleStmt::import("a")])?;
    assert_eq!(b.lookup("DEEP", true)?, Some(Value::Int(1)));
    let c = env.load_stmts("c", "c.rs", vec![ModuleStmt::import("b")])?;
    assert_eq!(c.lookup("DEEP", true)?, None);
    Ok(())
}

#[test]
fn test_unresolved_import() -> Result<()> {
    let env = Environment::new()?;
    let err = env
        .load_stmts("c", "c.rs", vec![ModuleStmt::import("missing")])
        .unwrap_err();
    assert!(matches!(err, Error::UnresolvedImport { ref path, .. } if path == "missing"));

    let base = env.module("base").expect("the base module is registered");
    assert!(Arc::ptr_eq(&base, env.base()));
    assert_eq!(base.lookup_local("Int"), Some(Value::Type(Ty::Int)));
    Ok(())
}

#[test]
fn test_failed_load_leaves_nothing_importable() -> Result<()> {
    let env = Environment::new()?;
    let items = rb_parse_items! {
        fn good(x: _) { x + 1 }
        const BAD: Int = nowhere;
    };
    let err = env.load_stmts("lib", "lib.rs", items).unwrap_err();
    assert!(matches!(err, Error::UnboundName { ref name, .. } if name == "nowhere"));
    assert!(env.module("lib").is_none());

    let err = env
        .load_stmts("user", "user.rs", vec![ModuleStmt::import("lib")])
        .unwrap_err();
    assert!(matches!(err, Error::UnresolvedImport { ref path, .. } if path == "lib"));
    assert!(env.module("user").is_none());

    let lib = env.load_stmts("lib", "lib.rs", rb_parse_items! { fn good(x: _) { x + 1 } })?;
    assert!(Arc::ptr_eq(&env.module("lib").expect("lib loaded"), &lib));
    Ok(())
}

#[test]
fn test_function_cannot_extend_a_constant() -> Result<()> {
    let env = Environment::new()?;
    let main = env.load_stmts("main", "main.rs", rb_parse_items! { const f: _ = 1; })?;
    let err = env
        .loader(main.clone())
        .load("more.rs", rb_parse_items! { fn f(x: _) { x } })
        .unwrap_err();
    assert!(matches!(err, Error::Conflict { ref name, .. } if name == "f"));
    assert_eq!(main.lookup_local("f"), Some(Value::Int(1)));
    Ok(())
}

#[test]
fn test_constants_wait_for_generated_functions() -> Result<()> {
    let env = Environment::new()?;
    // `makeBox` only exists after the struct macro has run
    let main = env.load_stmts(
        "main",
        "main.rs",
        rb_parse_items! {
            const B: _ = makeBox(41);
            fn bump(b: Box) { b.value + 1 }
            struct Box { value: Int }
        },
    )?;
    assert_eq!(env.evaluate(&main, &rb_parse_expr!(bump(B)))?, Value::Int(42));
    Ok(())
}

// ===== DATA DECLARATIONS =====

#[test]
fn test_struct_generates_accessors_and_constructor() -> Result<()> {
    let env = Environment::new()?.with_frontend(Arc::new(RustParser::new()));
    let source = r#"
        struct Point { a: Int, b: Int }

        const ORIGIN: _ = makePoint(0, 0);
        const P: Point = makePoint(1, 2);

        fn sum(p: Point) {
            p.a + p.b
        }
    "#;
    let main = env.load_source("main", "point.rs", source)?;

    let Some(Value::Type(Ty::Record(point))) = main.lookup_local("Point") else {
        panic!("Point is not a finished type");
    };
    assert!(point.is_sealed());
    assert_eq!(
        point.fields()?,
        &[
            RecordField {
                name: "a".into(),
                ty: Ty::Int
            },
            RecordField {
                name: "b".into(),
                ty: Ty::Int
            },
        ]
    );
    for name in ["a", "b", "makePoint", "sum"] {
        assert!(main.lookup_local(name).is_some(), "{} is not bound", name);
    }
    assert_eq!(env.evaluate(&main, &rb_parse_expr!(sum(P)))?, Value::Int(3));
    assert_eq!(env.evaluate(&main, &rb_parse_expr!(P.b))?, Value::Int(2));
    assert_eq!(
        env.evaluate(&main, &rb_parse_expr!(field(ORIGIN, "a")))?,
        Value::Int(0)
    );
    assert!(matches!(
        env.evaluate(&main, &rb_parse_expr!(makePoint(1, "two"))),
        Err(Error::NoMatch { .. })
    ));
    Ok(())
}

#[test]
fn test_declarations_may_refer_to_each_other() -> Result<()> {
    let env = Environment::new()?;
    let main = env.load_stmts(
        "main",
        "main.rs",
        rb_parse_items! {
            struct Line { from: Point, to: Point }
            struct Point { x: Int, y: Int }
            const L: _ = makeLine(makePoint(0, 1), makePoint(2, 3));
        },
    )?;
    assert_eq!(env.evaluate(&main, &rb_parse_expr!(L.to.y))?, Value::Int(3));
    Ok(())
}

#[test]
fn test_generic_declarations_are_memoized() -> Result<()> {
    let env = Environment::new()?;
    let main = env.load_stmts(
        "main",
        "main.rs",
        rb_parse_items! {
            struct Pair<T> { left: T, right: T }
        },
    )?;
    let ty = env.evaluate(&main, &rb_parse_expr!(Pair(Int)))?;
    let Value::Type(Ty::Record(pair)) = &ty else {
        panic!("expected a record type, got {}", ty);
    };
    assert_eq!(pair.name(), "Pair(Int)");
    assert_eq!(pair.fields()?.len(), 2);
    assert_eq!(
        env.evaluate(&main, &rb_parse_expr!(Pair(Int) == Pair(Int)))?,
        Value::Bool(true)
    );
    assert_eq!(
        env.evaluate(&main, &rb_parse_expr!(Pair(Int) == Pair(Float)))?,
        Value::Bool(false)
    );
    assert_eq!(
        env.evaluate(&main, &rb_parse_expr!(field(construct(Pair(Int), [1, 2]), "right")))?,
        Value::Int(2)
    );
    Ok(())
}

/// Emits one more declaration every time it runs.
struct Spawning {
    runs: AtomicUsize,
}

impl TypeMacro for Spawning {
    fn name(&self) -> &str {
        "spawning"
    }

    fn expand(
        &self,
        _decl: &DataDecl,
        _ty: &RecordTypeRef,
        _fields: &[RecordField],
    ) -> Result<Vec<ModuleStmt>> {
        let run = self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(vec![ModuleStmt::data(DataDecl {
            name: format!("Spawned{}", run),
            params: None,
            body: Expr::new(ExprKind::Record(RecordDef::default())),
            macro_name: Some("spawning".into()),
        })])
    }
}

#[test]
fn test_endless_macro_expansion_is_bounded() -> Result<()> {
    let env = Environment::with_backend(
        Arc::new(TreeBackend::new()),
        LoaderOptions::default().with_max_rounds(5),
    )?;
    let spawning = Arc::new(Spawning {
        runs: AtomicUsize::new(0),
    });
    env.register_macro(spawning.clone());
    let err = env
        .load_stmts(
            "seed",
            "seed.rs",
            rb_parse_items! {
                #[type_macro(spawning)]
                struct Seed {}
            },
        )
        .unwrap_err();
    assert_eq!(
        err,
        Error::MacroRecursionExceeded {
            path: "seed.rs".into(),
            rounds: 5,
        }
    );
    assert_eq!(spawning.runs.load(Ordering::SeqCst), 5);
    Ok(())
}

#[test]
fn test_unknown_type_macro() -> Result<()> {
    let env = Environment::new()?;
    let err = env
        .load_stmts(
            "main",
            "main.rs",
            rb_parse_items! {
                #[type_macro(nothing)]
                struct Empty {}
            },
        )
        .unwrap_err();
    assert!(matches!(err, Error::Generic(ref message) if message.contains("nothing")));
    Ok(())
}
