// Cost-ordered selection among method cases

use pretty_assertions::assert_eq;
use rb_backend::{CodegenBackend, InvocableRef, TreeBackend};
use rb_compiler::{Environment, FunctionCompiler, MethodCase};
use rb_core::ast::{ExprKind, MatchCase};
use rb_core::config::LoaderOptions;
use rb_core::error::Error;
use rb_core::ir::IrUnit;
use rb_core::value::{Callable, Params, Value};
use rb_core::Result;
use rb_rust_lang::{rb_parse_expr, rb_parse_items};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn case_of(expr: rb_core::ast::Expr) -> MatchCase {
    match expr.kind {
        ExprKind::FunDef(fundef) => fundef.to_match_case(),
        other => panic!("expected a closure, got {:?}", other),
    }
}

// ===== COST ORDERING =====

#[test]
fn test_cheapest_case_wins_regardless_of_order() -> Result<()> {
    let env = Environment::new()?;
    let items = rb_parse_items! {
        fn pick(x: Any, y: Any) { "both any" }
        fn pick(x: Int, y: Any) { "int first" }
    };
    let main = env.load_stmts("main", "main.rs", items)?;
    assert_eq!(
        env.evaluate(&main, &rb_parse_expr!(pick(1, 2)))?,
        Value::string("int first")
    );
    assert_eq!(
        env.evaluate(&main, &rb_parse_expr!(pick("a", 2)))?,
        Value::string("both any")
    );
    Ok(())
}

#[test]
fn test_equal_cost_is_ambiguous() -> Result<()> {
    let env = Environment::new()?;
    let items = rb_parse_items! {
        fn amb(x: Int, y: Any) { 1 }
        fn amb(x: Any, y: Int) { 2 }
    };
    let main = env.load_stmts("main", "main.rs", items)?;
    assert_eq!(
        env.evaluate(&main, &rb_parse_expr!(amb(1, 2))).unwrap_err(),
        Error::AmbiguousMatch {
            method: "amb".into(),
            shape: "(Int, Int)".into(),
            cost: 1,
        }
    );
    assert_eq!(env.evaluate(&main, &rb_parse_expr!(amb(1, "y")))?, Value::Int(1));
    Ok(())
}

#[test]
fn test_no_matching_case() -> Result<()> {
    let env = Environment::new()?;
    let items = rb_parse_items! {
        fn amb(x: Int, y: Any) { 1 }
        fn amb(x: Any, y: Int) { 2 }
    };
    let main = env.load_stmts("main", "main.rs", items)?;
    assert_eq!(
        env.evaluate(&main, &rb_parse_expr!(amb("s", "t"))).unwrap_err(),
        Error::NoMatch {
            method: "amb".into(),
            shape: "(String, String)".into(),
        }
    );
    assert!(matches!(
        env.evaluate(&main, &rb_parse_expr!(amb(1, 2, 3))),
        Err(Error::NoMatch { .. })
    ));
    Ok(())
}

#[test]
fn test_higher_cost_tie_does_not_hide_cheaper_case() -> Result<()> {
    let env = Environment::new()?;
    let items = rb_parse_items! {
        fn tie(x: Any, y: Any) { "first" }
        fn tie(x: Any, y: Any) { "second" }
        fn tie(x: Int, y: Int) { "exact" }
    };
    let main = env.load_stmts("main", "main.rs", items)?;
    assert_eq!(
        env.evaluate(&main, &rb_parse_expr!(tie(1, 2)))?,
        Value::string("exact")
    );
    assert!(matches!(
        env.evaluate(&main, &rb_parse_expr!(tie(1, "b"))),
        Err(Error::AmbiguousMatch { cost: 2, .. })
    ));
    Ok(())
}

// ===== PARAMETER LISTS =====

#[test]
fn test_named_arguments_must_be_declared() -> Result<()> {
    let env = Environment::new()?;
    let items = rb_parse_items! {
        fn scale(x: Int, #[named] by: Int) { x * by }
    };
    let main = env.load_stmts("main", "main.rs", items)?;
    assert_eq!(
        env.evaluate(&main, &rb_parse_expr!(scale(3, by = 2)))?,
        Value::Int(6)
    );
    assert!(matches!(
        env.evaluate(&main, &rb_parse_expr!(scale(3, at = 2))),
        Err(Error::NoMatch { ref shape, .. }) if shape == "(Int, at: Int)"
    ));
    Ok(())
}

#[test]
fn test_defaults_fill_missing_arguments() -> Result<()> {
    let env = Environment::new()?;
    let items = rb_parse_items! {
        fn scale(x: Int, #[named] #[default(2)] by: Int) { x * by }
        fn offset(x: Int, #[default(10)] dx: Int) { x + dx }
    };
    let main = env.load_stmts("main", "main.rs", items)?;
    assert_eq!(env.evaluate(&main, &rb_parse_expr!(scale(3)))?, Value::Int(6));
    assert_eq!(
        env.evaluate(&main, &rb_parse_expr!(scale(3, by = 3)))?,
        Value::Int(9)
    );
    assert_eq!(env.evaluate(&main, &rb_parse_expr!(offset(1)))?, Value::Int(11));
    assert_eq!(env.evaluate(&main, &rb_parse_expr!(offset(1, 1)))?, Value::Int(2));
    Ok(())
}

#[test]
fn test_omitted_named_argument_without_default_does_not_match() -> Result<()> {
    let env = Environment::new()?;
    let items = rb_parse_items! {
        fn opt(x: Int, #[named] by: _) { by }
    };
    let main = env.load_stmts("main", "main.rs", items)?;
    assert_eq!(
        env.evaluate(&main, &rb_parse_expr!(opt(3))).unwrap_err(),
        Error::NoMatch {
            method: "opt".into(),
            shape: "(Int)".into(),
        }
    );
    assert_eq!(env.evaluate(&main, &rb_parse_expr!(opt(3, by = 4)))?, Value::Int(4));

    // the same case against constant arguments fails while compiling
    let opt = main.lookup_local("opt").expect("opt is defined");
    let method = opt
        .as_callable()
        .and_then(|callable| callable.as_any().downcast_ref::<rb_compiler::Method>())
        .expect("opt is a method");
    let case = &method.cases()[0];
    let mut compiler = FunctionCompiler::new(env.ctx().clone(), "opt");
    let actual = Value::params(Params::positional(vec![Value::Int(3)]));
    let outcome = compiler.compile_match_case(&actual.into(), case.case(), case.scope())?;
    assert_eq!(outcome.success.as_bool(), Some(false));
    Ok(())
}

#[test]
fn test_repeated_variable_unifies() -> Result<()> {
    let env = Environment::new()?;
    let main = env.create_module("main");
    let mut case = case_of(rb_parse_expr!(|x: _, y: _| "same"));
    // the second slot binds `x` again instead of `y`
    if let ExprKind::Params(list) = &mut case.pattern.kind {
        list.params[1].pattern = rb_core::ast::Expr::name("x");
    }
    case.implicit_vars.truncate(1);
    let fallback = case_of(rb_parse_expr!(|x: Any, y: Any| "different"));
    let method = rb_compiler::Method::new(
        "same",
        vec![
            MethodCase::new(main.scope(), case),
            MethodCase::new(main.scope(), fallback),
        ],
        env.ctx().clone(),
    );
    let call = |a: i64, b: i64| method.call(Params::positional(vec![Value::Int(a), Value::Int(b)]));
    assert_eq!(call(4, 4)?, Value::string("same"));
    assert_eq!(call(4, 5)?, Value::string("different"));
    Ok(())
}

// ===== STATIC SELECTION =====

#[test]
fn test_constant_arguments_select_while_compiling() -> Result<()> {
    let env = Environment::new()?;
    let main = env.create_module("main");
    let cases = vec![
        MethodCase::new(main.scope(), case_of(rb_parse_expr!(|x: Any| "any"))),
        MethodCase::new(main.scope(), case_of(rb_parse_expr!(|x: Int| "int"))),
    ];
    let mut compiler = FunctionCompiler::new(env.ctx().clone(), "static");
    let actual = Value::params(Params::positional(vec![Value::Int(1)]));
    let selected = compiler.compile_match_cases(actual.into(), &cases, "static")?;
    assert_eq!(selected.as_immediate(), Some(&Value::string("int")));
    Ok(())
}

// ===== COMPILE ONCE =====

#[derive(Default)]
struct CountingBackend {
    inner: TreeBackend,
    compiles: AtomicUsize,
}

impl CodegenBackend for CountingBackend {
    fn compile(&self, unit: IrUnit) -> Result<InvocableRef> {
        self.compiles.fetch_add(1, Ordering::SeqCst);
        self.inner.compile(unit)
    }
}

#[test]
fn test_method_compiles_once_under_concurrent_first_calls() -> Result<()> {
    let backend = Arc::new(CountingBackend::default());
    let env = Environment::with_backend(backend.clone(), LoaderOptions::default())?;
    let items = rb_parse_items! {
        fn id(x: _) { x }
    };
    let main = env.load_stmts("main", "main.rs", items)?;
    let id = main
        .lookup_local("id")
        .and_then(|value| value.as_callable().cloned())
        .expect("id is defined");
    assert_eq!(backend.compiles.load(Ordering::SeqCst), 0);

    std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let id = id.clone();
                s.spawn(move || id.call(Params::positional(vec![Value::Int(i)])))
            })
            .collect();
        for (i, handle) in handles.into_iter().enumerate() {
            let result = handle.join().expect("thread panicked");
            assert_eq!(result, Ok(Value::Int(i as i64)));
        }
    });
    assert_eq!(backend.compiles.load(Ordering::SeqCst), 1);
    Ok(())
}

#[test]
fn test_failed_compilation_is_retried() -> Result<()> {
    let env = Environment::new()?;
    let items = rb_parse_items! {
        fn late() { later }
    };
    let main = env.load_stmts("main", "main.rs", items)?;
    assert!(matches!(
        env.evaluate(&main, &rb_parse_expr!(late())),
        Err(Error::UnboundName { .. })
    ));
    main.define("later", Value::Int(7));
    assert_eq!(env.evaluate(&main, &rb_parse_expr!(late()))?, Value::Int(7));
    Ok(())
}
