//! Expression compiler: lowers syntax trees to staged values and IR.

mod expr;

use crate::context::CompileContext;
use crate::scope::{FunctionScope, ScopeRef, UnitId};
use crate::staged::{Repr, StagedValue};
use rb_core::ast::Expr;
use rb_core::ir::{Ir, IrUnit, Label, LocalId};
use rb_core::value::{Ty, Value};
use rb_core::Result;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_UNIT: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_unit() -> UnitId {
    NEXT_UNIT.fetch_add(1, Ordering::Relaxed)
}

/// Compiles the body of one unit. Locals and labels are numbered per unit.
pub struct FunctionCompiler {
    ctx: Arc<CompileContext>,
    unit: UnitId,
    name: String,
    locals: u32,
    labels: u32,
}

impl FunctionCompiler {
    pub fn new(ctx: Arc<CompileContext>, name: impl Into<String>) -> Self {
        Self {
            ctx,
            unit: next_unit(),
            name: name.into(),
            locals: 0,
            labels: 0,
        }
    }

    pub fn ctx(&self) -> &Arc<CompileContext> {
        &self.ctx
    }
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn new_local(&mut self) -> LocalId {
        self.locals += 1;
        self.locals - 1
    }

    pub fn new_label(&mut self) -> Label {
        self.labels += 1;
        self.labels - 1
    }

    pub fn child_scope(&self, parent: &ScopeRef) -> Arc<FunctionScope> {
        FunctionScope::new(parent.clone(), self.unit)
    }

    pub fn finish(self, body: Ir) -> IrUnit {
        IrUnit {
            name: self.name,
            locals: self.locals,
            body,
        }
    }

    /// Makes `value` cheap to read more than once, spilling it to a local.
    pub fn materialize(&mut self, value: StagedValue, instrs: &mut Vec<Ir>) -> StagedValue {
        if value.is_trivial() {
            return value;
        }
        let local = self.new_local();
        let ty = value.ty.clone();
        instrs.push(Ir::assign(local, value.into_ir()));
        StagedValue::dynamic(Ir::Local(local), ty)
    }

    /// Introduces `name` in `scope`. Constants bind without code; runtime
    /// values get a local and the returned assignment.
    pub fn define(&mut self, scope: &FunctionScope, name: &str, value: StagedValue) -> Ir {
        if matches!(value.repr, Repr::Immediate(_) | Repr::Dynamic(Ir::Local(_))) {
            scope.bind(name, value);
            return Ir::Seq(vec![]);
        }
        let mut instrs = vec![];
        let local = self.materialize(value, &mut instrs);
        scope.bind(name, local);
        Ir::seq(instrs)
    }

    pub fn compile_eq(&self, a: &StagedValue, b: &StagedValue) -> StagedValue {
        match (a.as_immediate(), b.as_immediate()) {
            (Some(a), Some(b)) => StagedValue::immediate(Value::Bool(a == b)),
            _ => StagedValue::dynamic(Ir::Eq(a.to_ir().into(), b.to_ir().into()), Ty::Bool),
        }
    }

    /// Evaluates a type annotation to a type, running it if it is not constant.
    pub fn eval_type(&self, expr: &Expr, scope: &ScopeRef) -> Result<Ty> {
        let value = evaluate(&self.ctx, scope, expr)?;
        self.ctx.resolve_type(&value)
    }
}

/// Compiles `expr` in its own unit and runs it. Constants short-circuit
/// without involving the backend.
pub fn evaluate(ctx: &Arc<CompileContext>, scope: &ScopeRef, expr: &Expr) -> Result<Value> {
    let mut compiler = FunctionCompiler::new(ctx.clone(), "<eval>");
    let value = compiler.compile_expr(expr, scope)?;
    match value.repr {
        Repr::Immediate(value) => Ok(value),
        Repr::Dynamic(ir) => {
            let unit = compiler.finish(ir);
            if ctx.options().trace_ir {
                rb_core::debug!("{}", unit);
            }
            ctx.backend().compile(unit)?.invoke(Value::Unit)
        }
    }
}
