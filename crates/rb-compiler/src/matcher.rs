//! Pattern matching of a staged value against the pattern of one match case.

use crate::coerce::FAILURE_COST;
use crate::compiler::FunctionCompiler;
use crate::scope::ScopeRef;
use crate::staged::StagedValue;
use rb_core::ast::{Expr, ExprKind, ImplicitVar, MatchCase, Param, ParamList};
use rb_core::error::Error;
use rb_core::ir::{Ir, Label, LocalId};
use rb_core::value::{Ty, Value};
use rb_core::Result;
use std::collections::HashMap;

type Bindings = HashMap<String, Option<StagedValue>>;

/// Compiled form of one match case.
#[derive(Debug, Clone)]
pub struct CaseOutcome {
    /// `Bool`; dynamic outcomes run the match code when evaluated.
    pub success: StagedValue,
    /// `Int`; only meaningful once `success` has been evaluated to `true`.
    pub cost: StagedValue,
    pub body: StagedValue,
}

impl CaseOutcome {
    fn failed() -> Self {
        Self {
            success: StagedValue::immediate(Value::Bool(false)),
            cost: StagedValue::immediate(Value::Int(FAILURE_COST)),
            body: StagedValue::unit(),
        }
    }

    /// The cost, when the case is known at compile time to match.
    pub fn static_cost(&self) -> Option<i64> {
        match self.success.as_bool() {
            Some(true) => self.cost.as_immediate().and_then(Value::as_int),
            _ => None,
        }
    }
}

/// State threaded through the match of one case.
pub struct MatchState {
    fail: Label,
    implicit: Bindings,
    /// Locals holding variables first bound inside a conditional slot.
    reserved: HashMap<String, LocalId>,
    static_fail: bool,
    may_fail: bool,
    branch_depth: usize,
}

impl MatchState {
    pub fn new(fail: Label, vars: &[ImplicitVar]) -> Self {
        Self {
            fail,
            implicit: vars.iter().map(|var| (var.name.clone(), None)).collect(),
            reserved: HashMap::new(),
            static_fail: false,
            may_fail: false,
            branch_depth: 0,
        }
    }

    pub fn binding(&self, name: &str) -> Option<&StagedValue> {
        self.implicit.get(name).and_then(Option::as_ref)
    }

    /// Whether skipping `pattern` would leave one of its variables unbound.
    fn leaves_unbound(&self, pattern: &Expr) -> bool {
        match &pattern.kind {
            ExprKind::Name(name) => matches!(self.implicit.get(name), Some(None)),
            ExprKind::Params(list) => list
                .params
                .iter()
                .any(|param| self.leaves_unbound(&param.pattern)),
            _ => false,
        }
    }

    fn fail_unless(&mut self, check: StagedValue, out: &mut Vec<Ir>) {
        match check.as_bool() {
            Some(true) => {}
            Some(false) => self.static_fail = true,
            None => {
                out.push(Ir::when(Ir::Not(check.into_ir().into()), Ir::Fail(self.fail)));
                self.may_fail = true;
            }
        }
    }
}

impl FunctionCompiler {
    /// Compiles the match of `actual` against `pattern`, appending checks and
    /// bindings to `out`.
    pub fn compile_match(
        &mut self,
        state: &mut MatchState,
        actual: StagedValue,
        pattern: &Expr,
        scope: &ScopeRef,
        out: &mut Vec<Ir>,
    ) -> Result<()> {
        if state.static_fail {
            return Ok(());
        }
        match &pattern.kind {
            ExprKind::Name(name) if state.implicit.contains_key(name) => {
                match state.binding(name).cloned() {
                    None => self.bind_implicit(state, name, actual, out),
                    Some(bound) => {
                        let check = self.compile_eq(&bound, &actual);
                        state.fail_unless(check, out);
                    }
                }
                Ok(())
            }
            ExprKind::Params(list) => self.compile_match_params(state, actual, list, scope, out),
            _ => {
                let expected = self.compile_expr(pattern, scope)?;
                let check = self.compile_eq(&actual, &expected);
                state.fail_unless(check, out);
                Ok(())
            }
        }
    }

    fn bind_implicit(
        &mut self,
        state: &mut MatchState,
        name: &str,
        actual: StagedValue,
        out: &mut Vec<Ir>,
    ) {
        let value = if state.branch_depth == 0 {
            self.materialize(actual, out)
        } else {
            let local = match state.reserved.get(name) {
                Some(local) => *local,
                None => {
                    let local = self.new_local();
                    state.reserved.insert(name.to_string(), local);
                    local
                }
            };
            let ty = actual.ty.clone();
            out.push(Ir::assign(local, actual.into_ir()));
            StagedValue::dynamic(Ir::Local(local), ty)
        };
        state.implicit.insert(name.to_string(), Some(value));
    }

    fn compile_match_params(
        &mut self,
        state: &mut MatchState,
        actual: StagedValue,
        list: &ParamList,
        scope: &ScopeRef,
        out: &mut Vec<Ir>,
    ) -> Result<()> {
        let (named, positional): (Vec<&Param>, Vec<&Param>) =
            list.params.iter().partition(|param| param.is_named());
        let declared_names: Vec<String> = named.iter().filter_map(|p| p.name.clone()).collect();

        if let Some(value) = actual.as_immediate() {
            let Some(params) = value.as_params().cloned() else {
                state.static_fail = true;
                return Ok(());
            };
            if params.args().len() > positional.len()
                || params
                    .named()
                    .iter()
                    .any(|(name, _)| !declared_names.contains(name))
            {
                state.static_fail = true;
                return Ok(());
            }
            for (index, param) in positional.iter().enumerate() {
                match params.arg(index) {
                    Some(arg) => {
                        let arg = StagedValue::immediate(arg.clone());
                        self.compile_match(state, arg, &param.pattern, scope, out)?;
                    }
                    None => self.match_default(state, param, true, scope, out)?,
                }
            }
            for param in named {
                match param.name.as_deref().and_then(|name| params.named_arg(name)) {
                    Some(arg) => {
                        let arg = StagedValue::immediate(arg.clone());
                        self.compile_match(state, arg, &param.pattern, scope, out)?;
                    }
                    None => self.match_default(state, param, false, scope, out)?,
                }
            }
            return Ok(());
        }

        let actual = self.materialize(actual, out);
        let subject: Box<Ir> = actual.to_ir().into();
        if actual.ty != Ty::Params {
            if !Ty::Params.is_subtype_of(&actual.ty) {
                state.static_fail = true;
                return Ok(());
            }
            state.fail_unless(StagedValue::dynamic(Ir::IsParams(subject.clone()), Ty::Bool), out);
        }
        let too_many = Ir::IntLess(
            Ir::int(positional.len() as i64).into(),
            Ir::PositionalCount(subject.clone()).into(),
        );
        state.fail_unless(StagedValue::dynamic(Ir::Not(too_many.into()), Ty::Bool), out);

        for (index, param) in positional.iter().enumerate() {
            let arg = StagedValue::dynamic(Ir::PositionalGet(subject.clone(), index), Ty::Any);
            let present = Ir::IntLess(
                Ir::int(index as i64).into(),
                Ir::PositionalCount(subject.clone()).into(),
            );
            let slot = self.match_slot(state, arg, present, param, true, scope)?;
            out.push(slot);
        }
        for param in named {
            let Some(name) = param.name.clone() else {
                continue;
            };
            let arg = StagedValue::dynamic(Ir::NamedGet(subject.clone(), name.clone()), Ty::Any);
            let present = Ir::HasNamed(subject.clone(), name);
            let slot = self.match_slot(state, arg, present, param, false, scope)?;
            out.push(slot);
        }
        state.fail_unless(
            StagedValue::dynamic(Ir::NamedWithin(subject, declared_names), Ty::Bool),
            out,
        );
        Ok(())
    }

    /// Matches the default of an absent slot. Without a default a positional
    /// slot fails, and so does a named slot whose pattern is the only thing
    /// that would bind one of the case's variables.
    fn match_default(
        &mut self,
        state: &mut MatchState,
        param: &Param,
        required: bool,
        scope: &ScopeRef,
        out: &mut Vec<Ir>,
    ) -> Result<()> {
        match &param.default {
            Some(default) => {
                let value = self.compile_expr(default, scope)?;
                self.compile_match(state, value, &param.pattern, scope, out)
            }
            None => {
                if required || state.leaves_unbound(&param.pattern) {
                    state.static_fail = true;
                }
                Ok(())
            }
        }
    }

    /// A slot whose presence is only known at run time: both alternatives are
    /// compiled and variables they bind are merged.
    fn match_slot(
        &mut self,
        state: &mut MatchState,
        arg: StagedValue,
        present: Ir,
        param: &Param,
        required: bool,
        scope: &ScopeRef,
    ) -> Result<Ir> {
        let before = state.implicit.clone();
        let then = self.match_branch(state, |compiler, state, out| {
            compiler.compile_match(state, arg, &param.pattern, scope, out)
        })?;
        let bound_then = std::mem::replace(&mut state.implicit, before);
        let else_ = self.match_branch(state, |compiler, state, out| {
            compiler.match_default(state, param, required, scope, out)
        })?;
        let bound_else = std::mem::take(&mut state.implicit);
        state.implicit = merge_bindings(bound_then, bound_else);
        Ok(Ir::if_(present, then, else_))
    }

    fn match_branch(
        &mut self,
        state: &mut MatchState,
        f: impl FnOnce(&mut Self, &mut MatchState, &mut Vec<Ir>) -> Result<()>,
    ) -> Result<Ir> {
        let mut out = vec![];
        state.branch_depth += 1;
        let result = f(self, state, &mut out);
        state.branch_depth -= 1;
        result?;
        if std::mem::take(&mut state.static_fail) {
            state.may_fail = true;
            return Ok(Ir::Fail(state.fail));
        }
        Ok(Ir::seq(out))
    }

    /// Compiles one case against `actual`: the pattern, then the typed
    /// implicit variables, then the body in a scope binding them.
    pub fn compile_match_case(
        &mut self,
        actual: &StagedValue,
        case: &MatchCase,
        scope: &ScopeRef,
    ) -> Result<CaseOutcome> {
        let label = self.new_label();
        let mut state = MatchState::new(label, &case.implicit_vars);
        let mut instrs = vec![];
        self.compile_match(&mut state, actual.clone(), &case.pattern, scope, &mut instrs)?;
        if state.static_fail {
            return Ok(CaseOutcome::failed());
        }

        let body_scope = self.child_scope(scope);
        let mut static_cost = 0;
        let mut dynamic_costs = vec![];
        for var in &case.implicit_vars {
            let value = state.binding(&var.name).cloned().ok_or_else(|| {
                Error::Generic(format!(
                    "variable {} was not instantiated at {}",
                    var.name, case.location
                ))
            })?;
            let value = match &var.ty {
                Some(ty) => {
                    let target = self.eval_type(ty, scope)?;
                    let coercion = self.coerce(value, &target, &mut instrs);
                    state.fail_unless(coercion.success, &mut instrs);
                    if state.static_fail {
                        return Ok(CaseOutcome::failed());
                    }
                    match coercion.cost.as_immediate().and_then(Value::as_int) {
                        Some(cost) => static_cost += cost,
                        None => dynamic_costs.push(coercion.cost.into_ir()),
                    }
                    coercion.value
                }
                None => value,
            };
            let assign = self.define(&body_scope, &var.name, value);
            if !assign.is_nop() {
                instrs.push(assign);
            }
        }

        let cost = match dynamic_costs.into_iter().reduce(|a, b| Ir::IntAdd(a.into(), b.into())) {
            None => StagedValue::immediate(Value::Int(static_cost)),
            Some(sum) => {
                let local = self.new_local();
                instrs.push(Ir::assign(local, sum));
                StagedValue::dynamic(
                    Ir::IntAdd(Ir::Local(local).into(), Ir::int(static_cost).into()),
                    Ty::Int,
                )
            }
        };
        let body_scope: ScopeRef = body_scope;
        let body = self.compile_expr(&case.body, &body_scope)?;

        if !state.may_fail && cost.is_immediate() {
            let body = if instrs.is_empty() {
                body
            } else {
                let ty = body.ty.clone();
                instrs.push(body.into_ir());
                StagedValue::dynamic(Ir::seq(instrs), ty)
            };
            return Ok(CaseOutcome {
                success: StagedValue::immediate(Value::Bool(true)),
                cost,
                body,
            });
        }
        Ok(CaseOutcome {
            success: StagedValue::dynamic(
                Ir::Guard {
                    label,
                    body: Ir::Seq(instrs).into(),
                },
                Ty::Bool,
            ),
            cost,
            body,
        })
    }
}

/// Joins the bindings of two alternatives. Variables first bound inside a
/// branch live in the same reserved local on both sides.
fn merge_bindings(then: Bindings, mut else_: Bindings) -> Bindings {
    then.into_iter()
        .map(|(name, a)| {
            let b = else_.remove(&name).flatten();
            let merged = match (a, b) {
                (Some(a), Some(b)) if a != b => {
                    let ty = a.ty.common(&b.ty);
                    Some(a.with_ty(ty))
                }
                (a, b) => a.or(b),
            };
            (name, merged)
        })
        .collect()
}
