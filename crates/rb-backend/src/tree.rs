use crate::{CodegenBackend, Invocable, InvocableRef};
use rb_core::error::Error;
use rb_core::ir::{Ir, IrUnit, Label, RaiseKind, TypeRelation};
use rb_core::value::{Params, Value};
use rb_core::Result;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Evaluates IR trees directly. Values that are not cheap to rebuild inline
/// are hoisted into a per-unit constant pool at compile time.
#[derive(Default)]
pub struct TreeBackend {
    function_counter: AtomicU64,
}

impl TreeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compiled_units(&self) -> u64 {
        self.function_counter.load(Ordering::SeqCst)
    }

    pub fn lower(&self, unit: IrUnit) -> CompiledUnit {
        let index = self.function_counter.fetch_add(1, Ordering::SeqCst);
        let IrUnit {
            name,
            locals,
            mut body,
        } = unit;
        let mut pool = vec![];
        hoist_constants(&mut body, &mut pool);
        tracing::trace!(
            "compiled unit {} as function {} ({} pooled constants)",
            name,
            index,
            pool.len()
        );
        CompiledUnit {
            name: format!("{}#{}", name, index),
            locals: locals as usize,
            pool,
            body,
        }
    }
}

impl CodegenBackend for TreeBackend {
    fn compile(&self, unit: IrUnit) -> Result<InvocableRef> {
        Ok(Arc::new(self.lower(unit)))
    }
}

/// Scalars embed in the tree; everything else lives in the pool.
fn is_embeddable(value: &Value) -> bool {
    matches!(
        value,
        Value::Unit | Value::Bool(_) | Value::Int(_) | Value::Float(_)
    ) || matches!(value, Value::String(s) if s.len() <= 64)
}

fn hoist_constants(ir: &mut Ir, pool: &mut Vec<Value>) {
    if let Ir::Const(value) = ir {
        if !is_embeddable(value) {
            let slot = pool.iter().position(|pooled| pooled == value).unwrap_or_else(|| {
                pool.push(value.clone());
                pool.len() - 1
            });
            *ir = Ir::ConstSlot(slot);
        }
        return;
    }
    for child in ir.children_mut() {
        hoist_constants(child, pool);
    }
}

pub struct CompiledUnit {
    name: String,
    locals: usize,
    pool: Vec<Value>,
    body: Ir,
}

impl CompiledUnit {
    pub fn pool(&self) -> &[Value] {
        &self.pool
    }
    pub fn body(&self) -> &Ir {
        &self.body
    }
}

impl Invocable for CompiledUnit {
    fn name(&self) -> &str {
        &self.name
    }

    fn invoke(&self, input: Value) -> Result<Value> {
        let mut frame = Frame {
            unit: self,
            input,
            locals: vec![Value::Unit; self.locals],
        };
        match frame.eval(&self.body) {
            Ok(value) => Ok(value),
            Err(Unwind::Error(err)) => Err(err),
            Err(Unwind::Fail(label)) => Err(Error::Generic(format!(
                "{}: failure label @{} escaped its guard",
                self.name, label
            ))),
        }
    }
}

enum Unwind {
    Fail(Label),
    Error(Error),
}

impl From<Error> for Unwind {
    fn from(err: Error) -> Self {
        Unwind::Error(err)
    }
}

type Flow<T> = std::result::Result<T, Unwind>;

struct Frame<'a> {
    unit: &'a CompiledUnit,
    input: Value,
    locals: Vec<Value>,
}

fn expect_bool(value: Value) -> Result<bool> {
    value
        .as_bool()
        .ok_or_else(|| Error::Generic(format!("expected Bool, got {}", value.runtime_ty())))
}

fn expect_int(value: Value) -> Result<i64> {
    value
        .as_int()
        .ok_or_else(|| Error::Generic(format!("expected Int, got {}", value.runtime_ty())))
}

fn expect_params(value: Value) -> Result<Arc<Params>> {
    match value {
        Value::Params(params) => Ok(params),
        other => Err(Error::Generic(format!(
            "expected Params, got {}",
            other.runtime_ty()
        ))),
    }
}

impl Frame<'_> {
    fn local(&mut self, id: u32) -> Result<&mut Value> {
        let name = &self.unit.name;
        self.locals
            .get_mut(id as usize)
            .ok_or_else(|| Error::Generic(format!("{}: local %{} out of range", name, id)))
    }

    fn eval_all(&mut self, items: &[Ir]) -> Flow<Vec<Value>> {
        items.iter().map(|item| self.eval(item)).collect()
    }

    fn eval_params(&mut self, ir: &Ir) -> Flow<Arc<Params>> {
        let value = self.eval(ir)?;
        Ok(expect_params(value)?)
    }

    fn eval(&mut self, ir: &Ir) -> Flow<Value> {
        Ok(match ir {
            Ir::Const(value) => value.clone(),
            Ir::ConstSlot(slot) => self.unit.pool.get(*slot).cloned().ok_or_else(|| {
                Error::Generic(format!("{}: pool slot {} out of range", self.unit.name, slot))
            })?,
            Ir::Input => self.input.clone(),
            Ir::Local(id) => self.local(*id)?.clone(),
            Ir::Assign(id, value) => {
                let value = self.eval(value)?;
                *self.local(*id)? = value;
                Value::Unit
            }
            Ir::Seq(items) => {
                let mut last = Value::Unit;
                for item in items {
                    last = self.eval(item)?;
                }
                last
            }
            Ir::If { cond, then, else_ } => {
                let cond = self.eval(cond)?;
                if expect_bool(cond)? {
                    self.eval(then)?
                } else {
                    self.eval(else_)?
                }
            }
            Ir::Guard { label, body } => match self.eval(body) {
                Ok(_) => Value::Bool(true),
                Err(Unwind::Fail(failed)) if failed == *label => Value::Bool(false),
                Err(other) => return Err(other),
            },
            Ir::Fail(label) => return Err(Unwind::Fail(*label)),
            Ir::Not(x) => {
                let x = self.eval(x)?;
                Value::Bool(!expect_bool(x)?)
            }
            Ir::Eq(a, b) => {
                let a = self.eval(a)?;
                let b = self.eval(b)?;
                Value::Bool(a == b)
            }
            Ir::IntAdd(a, b) => {
                let a = expect_int(self.eval(a)?)?;
                let b = expect_int(self.eval(b)?)?;
                Value::Int(a.saturating_add(b))
            }
            Ir::IntLess(a, b) => {
                let a = expect_int(self.eval(a)?)?;
                let b = expect_int(self.eval(b)?)?;
                Value::Bool(a < b)
            }
            Ir::IntEq(a, b) => {
                let a = expect_int(self.eval(a)?)?;
                let b = expect_int(self.eval(b)?)?;
                Value::Bool(a == b)
            }
            Ir::TypeTest {
                value,
                target,
                relation,
            } => {
                let ty = self.eval(value)?.runtime_ty();
                Value::Bool(match relation {
                    TypeRelation::Exact => &ty == target,
                    TypeRelation::Subtype => ty.is_subtype_of(target),
                })
            }
            Ir::IsParams(x) => Value::Bool(matches!(self.eval(x)?, Value::Params(_))),
            Ir::PositionalCount(x) => Value::Int(self.eval_params(x)?.args().len() as i64),
            Ir::PositionalGet(x, index) => {
                let params = self.eval_params(x)?;
                params.arg(*index).cloned().ok_or_else(|| {
                    Error::Generic(format!("missing positional argument {}", index))
                })?
            }
            Ir::HasNamed(x, name) => Value::Bool(self.eval_params(x)?.has_named(name)),
            Ir::NamedGet(x, name) => {
                let params = self.eval_params(x)?;
                params
                    .named_arg(name)
                    .cloned()
                    .ok_or_else(|| Error::Generic(format!("missing named argument {}", name)))?
            }
            Ir::NamedWithin(x, names) => {
                let params = self.eval_params(x)?;
                Value::Bool(params.named().iter().all(|(name, _)| names.contains(name)))
            }
            Ir::MakeTuple(items) => Value::Tuple(self.eval_all(items)?),
            Ir::MakeList(items) => Value::List(self.eval_all(items)?),
            Ir::MakeParams { args, named } => {
                let args = self.eval_all(args)?;
                let mut named_values = Vec::with_capacity(named.len());
                for (name, value) in named {
                    named_values.push((name.clone(), self.eval(value)?));
                }
                Value::params(Params::new(args, named_values)?)
            }
            Ir::Invoke { callee, params } => {
                let callee = self.eval(callee)?;
                let params = self.eval_params(params)?;
                match callee {
                    Value::Callable(callable) => {
                        callable.call(Arc::unwrap_or_clone(params))?
                    }
                    other => {
                        return Err(Error::NotCallable {
                            value: other.to_string(),
                        }
                        .into())
                    }
                }
            }
            Ir::NativeCall { function, args } => {
                let args = self.eval_all(args)?;
                function.invoke(args)?
            }
            Ir::Raise { kind, operands } => {
                let operands = self.eval_all(operands)?;
                let subject = operands.first().cloned().unwrap_or(Value::Unit);
                return Err(raise(kind, &subject, operands.get(1)).into());
            }
            Ir::Located { location, body } => {
                tracing::trace!(%location, "{}", self.unit.name);
                self.eval(body)?
            }
        })
    }
}

fn raise(kind: &RaiseKind, subject: &Value, cost: Option<&Value>) -> Error {
    match kind {
        RaiseKind::NoMatch { method } => Error::NoMatch {
            method: method.clone(),
            shape: subject.shape(),
        },
        RaiseKind::AmbiguousMatch { method } => Error::AmbiguousMatch {
            method: method.clone(),
            shape: subject.shape(),
            cost: cost.and_then(Value::as_int).unwrap_or_default(),
        },
        RaiseKind::BadCoercion { target, location } => Error::BadCoercion {
            value: subject.to_string(),
            target: target.to_string(),
            location: location.clone(),
        },
    }
}
