use super::{next_unit, FunctionCompiler};
use crate::method::{Method, MethodCase};
use crate::scope::{FunctionScope, ScopeRef};
use crate::staged::{Repr, StagedValue};
use itertools::Itertools;
use rb_core::ast::{
    Block, BlockStmt, Call, Expr, ExprKind, FunDef, If, MatchCase, NativeCall, Param, RecordDef,
};
use rb_core::error::Error;
use rb_core::ir::Ir;
use rb_core::native::NativeFn;
use rb_core::value::{Params, Struct, StructField, Ty, Value};
use rb_core::Result;
use std::sync::Arc;

impl FunctionCompiler {
    pub fn compile_expr(&mut self, expr: &Expr, scope: &ScopeRef) -> Result<StagedValue> {
        let value = self.compile_expr_kind(expr, scope)?;
        if expr.location.is_unknown() {
            return Ok(value);
        }
        Ok(match value.repr {
            Repr::Dynamic(ir) => StagedValue::dynamic(
                Ir::Located {
                    location: expr.location.clone(),
                    body: ir.into(),
                },
                value.ty,
            ),
            repr => StagedValue { ty: value.ty, repr },
        })
    }

    fn compile_expr_kind(&mut self, expr: &Expr, scope: &ScopeRef) -> Result<StagedValue> {
        match &expr.kind {
            ExprKind::Name(name) => scope
                .lookup(name, self.unit)?
                .ok_or_else(|| Error::UnboundName {
                    name: name.clone(),
                    location: expr.location.clone(),
                }),
            ExprKind::Literal(literal) => Ok(StagedValue::immediate(literal.to_value())),
            ExprKind::Call(call) => self.compile_call(call, scope),
            ExprKind::Block(block) => self.compile_block(block, scope),
            ExprKind::If(if_) => self.compile_if(if_, expr, scope),
            ExprKind::Tuple(items) => self.compile_aggregate(items, scope, true),
            ExprKind::List(items) => self.compile_aggregate(items, scope, false),
            ExprKind::FunDef(fundef) => {
                let name = format!("fn@{}", fundef.location);
                Ok(self.compile_closure(name, fundef.to_match_case(), scope))
            }
            ExprKind::Case(case) => {
                let name = format!("case@{}", case.location);
                Ok(self.compile_closure(name, MatchCase::clone(case), scope))
            }
            ExprKind::Params(_) => Err(Error::Generic(format!(
                "parameter list pattern outside of a match at {}",
                expr.location
            ))),
            ExprKind::Record(record) => self.compile_record(record, scope),
            ExprKind::Native(value) => Ok(StagedValue::immediate(value.clone())),
            ExprKind::NativeCall(call) => self.compile_native_call(call, scope),
        }
    }

    /// A function value with a single case. Runtime values of this unit that
    /// the case refers to are captured when the value is created: each
    /// evaluation binds them as constants in a fresh frame and builds its own
    /// method over that frame.
    fn compile_closure(&self, name: String, case: MatchCase, scope: &ScopeRef) -> StagedValue {
        let mut names = vec![];
        case_names(&case, &mut names);
        let (captured, values): (Vec<String>, Vec<StagedValue>) = names
            .into_iter()
            .unique()
            // failed lookups are reported again when the body compiles
            .filter_map(|name| match scope.lookup(&name, self.unit) {
                Ok(Some(value)) if !value.is_immediate() => Some((name, value)),
                _ => None,
            })
            .unzip();

        let template = MethodCase::new(scope.clone(), case);
        if captured.is_empty() {
            let method = Method::new(name, vec![template], self.ctx.clone());
            return StagedValue::immediate(Value::callable(method));
        }
        rb_core::trace!("{} captures {}", name, captured.join(", "));
        let ctx = self.ctx.clone();
        let parent = scope.clone();
        let build = NativeFn::new(
            "closure",
            vec![Ty::Any; captured.len()],
            Ty::Callable,
            move |values| {
                let frame = FunctionScope::new(parent.clone(), next_unit());
                for (name, value) in captured.iter().zip(values) {
                    frame.bind(name.clone(), StagedValue::immediate(value));
                }
                let case = template.with_scope(frame);
                Ok(Value::callable(Method::new(name.clone(), vec![case], ctx.clone())))
            },
        );
        StagedValue::dynamic(
            Ir::NativeCall {
                function: build,
                args: values.into_iter().map(StagedValue::into_ir).collect(),
            },
            Ty::Callable,
        )
    }

    pub fn compile_block(&mut self, block: &Block, scope: &ScopeRef) -> Result<StagedValue> {
        let frame = self.child_scope(scope);
        let frame_ref: ScopeRef = frame.clone();
        let mut instrs = vec![];
        let mut last = StagedValue::unit();
        for stmt in &block.stmts {
            match stmt {
                BlockStmt::Let(let_) => {
                    if let Some(previous) =
                        std::mem::replace(&mut last, StagedValue::unit()).into_statement()
                    {
                        instrs.push(previous);
                    }
                    let mut value = self.compile_expr(&let_.value, &frame_ref)?;
                    if let Some(ty) = &let_.ty {
                        let target = self.eval_type(ty, &frame_ref)?;
                        value = self.coerce_or_throw(value, &target, &let_.location, &mut instrs)?;
                    }
                    let assign = self.define(&frame, &let_.name, value);
                    if !assign.is_nop() {
                        instrs.push(assign);
                    }
                }
                BlockStmt::Expr(expr) => {
                    let value = self.compile_expr(expr, &frame_ref)?;
                    if let Some(previous) = std::mem::replace(&mut last, value).into_statement() {
                        instrs.push(previous);
                    }
                }
            }
        }
        if instrs.is_empty() {
            return Ok(last);
        }
        let ty = last.ty.clone();
        instrs.push(last.into_ir());
        Ok(StagedValue::dynamic(Ir::seq(instrs), ty))
    }

    fn compile_call(&mut self, call: &Call, scope: &ScopeRef) -> Result<StagedValue> {
        let callee = self.compile_expr(&call.func, scope)?;
        let mut args = Vec::with_capacity(call.args.len());
        for arg in &call.args {
            args.push(self.compile_expr(arg, scope)?);
        }
        let mut named = Vec::with_capacity(call.named.len());
        for (name, arg) in &call.named {
            named.push((name.clone(), self.compile_expr(arg, scope)?));
        }
        let params = make_params(args, named)?;

        if let Some(value) = callee.as_immediate() {
            if value.as_callable().is_none() {
                return Err(Error::NotCallable {
                    value: value.to_string(),
                });
            }
        }
        Ok(StagedValue::dynamic(
            Ir::Invoke {
                callee: callee.into_ir().into(),
                params: params.into_ir().into(),
            },
            Ty::Any,
        ))
    }

    fn compile_if(&mut self, if_: &If, expr: &Expr, scope: &ScopeRef) -> Result<StagedValue> {
        let mut instrs = vec![];
        let cond = self.compile_expr(&if_.cond, scope)?;
        let cond = self.coerce_or_throw(cond, &Ty::Bool, &expr.location, &mut instrs)?;
        let then = self.compile_expr(&if_.then, scope)?;
        let else_ = self.compile_expr(&if_.else_, scope)?;
        let ty = then.ty.common(&else_.ty);

        let value = match cond.as_bool() {
            Some(true) => then.with_ty(ty),
            Some(false) => else_.with_ty(ty),
            None => StagedValue::dynamic(Ir::if_(cond.into_ir(), then.into_ir(), else_.into_ir()), ty),
        };
        if instrs.is_empty() {
            return Ok(value);
        }
        let ty = value.ty.clone();
        instrs.push(value.into_ir());
        Ok(StagedValue::dynamic(Ir::seq(instrs), ty))
    }

    fn compile_aggregate(
        &mut self,
        items: &[Expr],
        scope: &ScopeRef,
        tuple: bool,
    ) -> Result<StagedValue> {
        let mut values = Vec::with_capacity(items.len());
        for item in items {
            values.push(self.compile_expr(item, scope)?);
        }
        let types: Vec<Ty> = values.iter().map(|x| x.ty.clone()).collect();
        let ty = if tuple {
            Ty::Tuple(types)
        } else {
            Ty::list(Ty::common_of(types))
        };
        if let Some(immediates) = all_immediate(&values) {
            let value = if tuple {
                Value::Tuple(immediates)
            } else {
                Value::List(immediates)
            };
            return Ok(StagedValue::immediate(value));
        }
        let irs = values.into_iter().map(StagedValue::into_ir).collect();
        Ok(StagedValue::dynamic(
            if tuple {
                Ir::MakeTuple(irs)
            } else {
                Ir::MakeList(irs)
            },
            ty,
        ))
    }

    /// Field types are compiled in this unit so a type-level function can use
    /// its parameters; the descriptor is built at run time when any is dynamic.
    fn compile_record(&mut self, record: &RecordDef, scope: &ScopeRef) -> Result<StagedValue> {
        let mut types = Vec::with_capacity(record.fields.len());
        for field in &record.fields {
            types.push(self.compile_expr(&field.ty, scope)?);
        }
        let names: Vec<(String, Vec<String>)> = record
            .fields
            .iter()
            .map(|field| (field.name.clone(), field.attributes.clone()))
            .collect();
        let attributes = record.attributes.clone();

        if let Some(types) = all_immediate(&types) {
            for ty in &types {
                // forward handles stay boxed until the loader finishes them
                if !matches!(ty, Value::TypeBox(_)) {
                    self.ctx.resolve_type(ty)?;
                }
            }
            return Ok(StagedValue::immediate(make_struct(&names, &attributes, types)));
        }
        let build = NativeFn::new(
            "struct",
            vec![Ty::Any; types.len()],
            Ty::Struct,
            move |types| Ok(make_struct(&names, &attributes, types)),
        );
        Ok(StagedValue::dynamic(
            Ir::NativeCall {
                function: build,
                args: types.into_iter().map(StagedValue::into_ir).collect(),
            },
            Ty::Struct,
        ))
    }

    fn compile_native_call(&mut self, call: &NativeCall, scope: &ScopeRef) -> Result<StagedValue> {
        let mut args = Vec::with_capacity(call.args.len());
        for arg in &call.args {
            args.push(self.compile_expr(arg, scope)?.into_ir());
        }
        Ok(StagedValue::dynamic(
            Ir::NativeCall {
                function: call.function.clone(),
                args,
            },
            call.function.ret().clone(),
        ))
    }
}

fn make_struct(names: &[(String, Vec<String>)], attributes: &[String], types: Vec<Value>) -> Value {
    let fields = names
        .iter()
        .zip(types)
        .map(|((name, field_attributes), ty)| StructField {
            name: name.clone(),
            ty,
            attributes: field_attributes.clone(),
        })
        .collect();
    Value::Struct(Arc::new(Struct {
        name: String::new(),
        fields,
        attributes: attributes.to_vec(),
    }))
}

fn all_immediate(values: &[StagedValue]) -> Option<Vec<Value>> {
    values.iter().map(|x| x.as_immediate().cloned()).collect()
}

/// Builds the argument bundle of a call site, constant when every argument is.
pub(crate) fn make_params(
    args: Vec<StagedValue>,
    named: Vec<(String, StagedValue)>,
) -> Result<StagedValue> {
    let named_values: Option<Vec<(String, Value)>> = named
        .iter()
        .map(|(name, value)| value.as_immediate().map(|v| (name.clone(), v.clone())))
        .collect();
    if let (Some(args), Some(named)) = (all_immediate(&args), named_values) {
        return Ok(StagedValue::immediate(Value::params(Params::new(args, named)?)));
    }
    if let Some(duplicate) = named.iter().map(|(name, _)| name).duplicates().next() {
        return Err(Error::Generic(format!(
            "named argument `{}` given more than once",
            duplicate
        )));
    }
    Ok(StagedValue::dynamic(
        Ir::MakeParams {
            args: args.into_iter().map(StagedValue::into_ir).collect(),
            named: named
                .into_iter()
                .map(|(name, value)| (name, value.into_ir()))
                .collect(),
        },
        Ty::Params,
    ))
}

/// Every name a case refers to, including names bound inside it.
fn case_names(case: &MatchCase, out: &mut Vec<String>) {
    for var in &case.implicit_vars {
        if let Some(ty) = &var.ty {
            expr_names(ty, out);
        }
    }
    expr_names(&case.pattern, out);
    expr_names(&case.body, out);
}

fn expr_names(expr: &Expr, out: &mut Vec<String>) {
    match &expr.kind {
        ExprKind::Name(name) => out.push(name.clone()),
        ExprKind::Literal(_) | ExprKind::Native(_) => {}
        ExprKind::Call(call) => {
            expr_names(&call.func, out);
            call.args.iter().for_each(|arg| expr_names(arg, out));
            call.named.iter().for_each(|(_, arg)| expr_names(arg, out));
        }
        ExprKind::Block(block) => {
            for stmt in &block.stmts {
                match stmt {
                    BlockStmt::Let(let_) => {
                        if let Some(ty) = &let_.ty {
                            expr_names(ty, out);
                        }
                        expr_names(&let_.value, out);
                    }
                    BlockStmt::Expr(expr) => expr_names(expr, out),
                }
            }
        }
        ExprKind::If(if_) => {
            expr_names(&if_.cond, out);
            expr_names(&if_.then, out);
            expr_names(&if_.else_, out);
        }
        ExprKind::Tuple(items) | ExprKind::List(items) => {
            items.iter().for_each(|item| expr_names(item, out));
        }
        ExprKind::FunDef(fundef) => fundef_names(fundef, out),
        ExprKind::Case(case) => case_names(case, out),
        ExprKind::Params(list) => list.params.iter().for_each(|param| param_names(param, out)),
        ExprKind::Record(record) => {
            record.fields.iter().for_each(|field| expr_names(&field.ty, out));
        }
        ExprKind::NativeCall(call) => call.args.iter().for_each(|arg| expr_names(arg, out)),
    }
}

fn fundef_names(fundef: &FunDef, out: &mut Vec<String>) {
    for param in &fundef.params {
        param.ty.iter().chain(&param.default).for_each(|expr| expr_names(expr, out));
    }
    expr_names(&fundef.body, out);
}

fn param_names(param: &Param, out: &mut Vec<String>) {
    expr_names(&param.pattern, out);
    if let Some(default) = &param.default {
        expr_names(default, out);
    }
}
