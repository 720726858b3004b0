//! Multi-dispatch methods: mergeable case lists compiled once on first call.

use crate::compiler::FunctionCompiler;
use crate::context::CompileContext;
use crate::scope::ScopeRef;
use crate::staged::StagedValue;
use once_cell::sync::OnceCell;
use rb_backend::InvocableRef;
use rb_core::ast::MatchCase;
use rb_core::error::Error;
use rb_core::ir::Ir;
use rb_core::value::{Callable, Params, Ty, Value};
use rb_core::Result;
use std::any::Any;
use std::cell::RefCell;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// A case together with the scope it was declared in.
#[derive(Clone)]
pub struct MethodCase {
    scope: ScopeRef,
    case: Arc<MatchCase>,
}

impl MethodCase {
    pub fn new(scope: ScopeRef, case: MatchCase) -> Self {
        Self {
            scope,
            case: Arc::new(case),
        }
    }
    pub fn scope(&self) -> &ScopeRef {
        &self.scope
    }
    pub fn case(&self) -> &MatchCase {
        &self.case
    }
    /// The same case declared in another scope.
    pub fn with_scope(&self, scope: ScopeRef) -> Self {
        Self {
            scope,
            case: self.case.clone(),
        }
    }
    pub fn same_case(&self, other: &MethodCase) -> bool {
        Arc::ptr_eq(&self.case, &other.case)
    }
}

impl Debug for MethodCase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "case@{}", self.case.location)
    }
}

thread_local! {
    static COMPILING: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

struct CompilingGuard;

impl CompilingGuard {
    fn enter(method: &Method) -> Result<Self> {
        let key = method as *const Method as usize;
        COMPILING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.contains(&key) {
                return Err(Error::Generic(format!(
                    "method `{}` is needed while compiling itself",
                    method.name
                )));
            }
            stack.push(key);
            Ok(CompilingGuard)
        })
    }
}

impl Drop for CompilingGuard {
    fn drop(&mut self) {
        COMPILING.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

pub struct Method {
    name: String,
    cases: Vec<MethodCase>,
    ctx: Arc<CompileContext>,
    compiled: OnceCell<InvocableRef>,
}

impl Method {
    pub fn new(name: impl Into<String>, cases: Vec<MethodCase>, ctx: Arc<CompileContext>) -> Self {
        Self {
            name: name.into(),
            cases,
            ctx,
            compiled: OnceCell::new(),
        }
    }

    /// Concatenates the cases of `methods` in order into a fresh method.
    pub fn merge(methods: &[&Method], name: impl Into<String>) -> Result<Method> {
        let Some(first) = methods.first() else {
            return Err(Error::Generic("cannot merge an empty list of methods".into()));
        };
        let cases = methods
            .iter()
            .flat_map(|method| method.cases.iter().cloned())
            .collect();
        Ok(Method::new(name, cases, first.ctx.clone()))
    }

    /// A new method with `case` appended after the existing cases.
    pub fn with_case(&self, case: MethodCase) -> Method {
        let mut cases = self.cases.clone();
        cases.push(case);
        Method::new(self.name.clone(), cases, self.ctx.clone())
    }

    pub fn cases(&self) -> &[MethodCase] {
        &self.cases
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled.get().is_some()
    }

    /// The compiled dispatcher, built by the first caller. Concurrent first
    /// callers wait for that build; a failed build leaves the method
    /// uncompiled.
    pub fn compiled(&self) -> Result<&InvocableRef> {
        if let Some(compiled) = self.compiled.get() {
            return Ok(compiled);
        }
        let _guard = CompilingGuard::enter(self)?;
        self.compiled.get_or_try_init(|| self.compile())
    }

    fn compile(&self) -> Result<InvocableRef> {
        rb_core::debug!("compiling method {} with {} cases", self.name, self.cases.len());
        let mut compiler = FunctionCompiler::new(self.ctx.clone(), self.name.clone());
        let actual = StagedValue::dynamic(Ir::Input, Ty::Params);
        let body = compiler.compile_match_cases(actual, &self.cases, &self.name)?;
        let unit = compiler.finish(body.into_ir());
        if self.ctx.options().trace_ir {
            rb_core::debug!("{}", unit);
        }
        self.ctx.backend().compile(unit)
    }
}

impl Callable for Method {
    fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, params: Params) -> Result<Value> {
        self.compiled()?.invoke(Value::params(params))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Debug for Method {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Method")
            .field("name", &self.name)
            .field("cases", &self.cases)
            .field("compiled", &self.is_compiled())
            .finish()
    }
}
