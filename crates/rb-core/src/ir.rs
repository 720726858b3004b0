//! Structured tree IR handed to code generation backends.

use crate::ast::Location;
use crate::native::NativeRef;
use crate::value::{Ty, Value};
use itertools::Itertools;
use std::fmt::{Display, Formatter};

pub type LocalId = u32;
pub type Label = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeRelation {
    Exact,
    Subtype,
}

/// Runtime failures the compiler can emit directly.
#[derive(Debug, Clone, PartialEq)]
pub enum RaiseKind {
    NoMatch { method: String },
    AmbiguousMatch { method: String },
    BadCoercion { target: Ty, location: Location },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Ir {
    Const(Value),
    /// A constant hoisted into the unit's pool by a backend.
    ConstSlot(usize),
    /// The single argument a unit is invoked with.
    Input,
    Local(LocalId),
    Assign(LocalId, Box<Ir>),
    Seq(Vec<Ir>),
    If {
        cond: Box<Ir>,
        then: Box<Ir>,
        else_: Box<Ir>,
    },
    /// Runs `body`; yields `true` if it completes and `false` on `Fail(label)`.
    Guard { label: Label, body: Box<Ir> },
    Fail(Label),
    Not(Box<Ir>),
    Eq(Box<Ir>, Box<Ir>),
    IntAdd(Box<Ir>, Box<Ir>),
    IntLess(Box<Ir>, Box<Ir>),
    IntEq(Box<Ir>, Box<Ir>),
    TypeTest {
        value: Box<Ir>,
        target: Ty,
        relation: TypeRelation,
    },
    IsParams(Box<Ir>),
    PositionalCount(Box<Ir>),
    PositionalGet(Box<Ir>, usize),
    HasNamed(Box<Ir>, String),
    NamedGet(Box<Ir>, String),
    /// True when every named argument of the bundle is one of `names`.
    NamedWithin(Box<Ir>, Vec<String>),
    MakeTuple(Vec<Ir>),
    MakeList(Vec<Ir>),
    MakeParams {
        args: Vec<Ir>,
        named: Vec<(String, Ir)>,
    },
    Invoke {
        callee: Box<Ir>,
        params: Box<Ir>,
    },
    NativeCall {
        function: NativeRef,
        args: Vec<Ir>,
    },
    /// Operands: the failing subject, then (for ambiguity) the tied cost.
    Raise {
        kind: RaiseKind,
        operands: Vec<Ir>,
    },
    Located {
        location: Location,
        body: Box<Ir>,
    },
}

impl Ir {
    pub fn unit() -> Self {
        Ir::Const(Value::Unit)
    }
    pub fn int(i: i64) -> Self {
        Ir::Const(Value::Int(i))
    }
    pub fn if_(cond: Ir, then: Ir, else_: Ir) -> Self {
        Ir::If {
            cond: cond.into(),
            then: then.into(),
            else_: else_.into(),
        }
    }
    pub fn when(cond: Ir, then: Ir) -> Self {
        Self::if_(cond, then, Ir::unit())
    }
    pub fn assign(local: LocalId, value: Ir) -> Self {
        Ir::Assign(local, value.into())
    }

    /// Sequence that flattens nested sequences and drops empty statements.
    pub fn seq(items: impl IntoIterator<Item = Ir>) -> Self {
        let mut out = vec![];
        for item in items {
            match item {
                Ir::Seq(inner) => out.extend(inner),
                other => out.push(other),
            }
        }
        if out.len() == 1 {
            out.pop().unwrap_or(Ir::Seq(vec![]))
        } else {
            Ir::Seq(out)
        }
    }

    pub fn is_nop(&self) -> bool {
        matches!(self, Ir::Seq(items) if items.is_empty())
    }

    pub fn children_mut(&mut self) -> Vec<&mut Ir> {
        match self {
            Ir::Const(_) | Ir::ConstSlot(_) | Ir::Input | Ir::Local(_) | Ir::Fail(_) => vec![],
            Ir::Assign(_, value) => vec![value.as_mut()],
            Ir::Seq(items) | Ir::MakeTuple(items) | Ir::MakeList(items) => {
                items.iter_mut().collect()
            }
            Ir::If { cond, then, else_ } => vec![cond.as_mut(), then.as_mut(), else_.as_mut()],
            Ir::Guard { body, .. } | Ir::Located { body, .. } => vec![body.as_mut()],
            Ir::Not(x)
            | Ir::IsParams(x)
            | Ir::PositionalCount(x)
            | Ir::PositionalGet(x, _)
            | Ir::HasNamed(x, _)
            | Ir::NamedGet(x, _)
            | Ir::NamedWithin(x, _)
            | Ir::TypeTest { value: x, .. } => vec![x.as_mut()],
            Ir::Eq(a, b) | Ir::IntAdd(a, b) | Ir::IntLess(a, b) | Ir::IntEq(a, b) => {
                vec![a.as_mut(), b.as_mut()]
            }
            Ir::MakeParams { args, named } => args
                .iter_mut()
                .chain(named.iter_mut().map(|(_, value)| value))
                .collect(),
            Ir::Invoke { callee, params } => vec![callee.as_mut(), params.as_mut()],
            Ir::NativeCall { args, .. } | Ir::Raise { operands: args, .. } => {
                args.iter_mut().collect()
            }
        }
    }
}

/// One compiled function body: a tree over `locals` slots reading `Input`.
#[derive(Debug, Clone, PartialEq)]
pub struct IrUnit {
    pub name: String,
    pub locals: u32,
    pub body: Ir,
}

impl Display for IrUnit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "unit {} (locals: {})", self.name, self.locals)?;
        write_ir(f, &self.body, 1)
    }
}

fn nested(f: &mut Formatter<'_>, depth: usize, head: &str, children: &[&Ir]) -> std::fmt::Result {
    writeln!(f, "{}{}", "  ".repeat(depth), head)?;
    for child in children {
        write_ir(f, child, depth + 1)?;
    }
    Ok(())
}

fn write_ir(f: &mut Formatter<'_>, ir: &Ir, depth: usize) -> std::fmt::Result {
    let pad = "  ".repeat(depth);
    match ir {
        Ir::Const(value) => writeln!(f, "{}const {:?}", pad, value),
        Ir::ConstSlot(slot) => writeln!(f, "{}pool[{}]", pad, slot),
        Ir::Input => writeln!(f, "{}input", pad),
        Ir::Local(id) => writeln!(f, "{}%{}", pad, id),
        Ir::Fail(label) => writeln!(f, "{}fail @{}", pad, label),
        Ir::Assign(id, value) => nested(f, depth, &format!("%{} =", id), &[&**value]),
        Ir::Seq(items) => nested(f, depth, "seq", &items.iter().collect_vec()),
        Ir::If { cond, then, else_ } => nested(f, depth, "if", &[&**cond, &**then, &**else_]),
        Ir::Guard { label, body } => nested(f, depth, &format!("guard @{}", label), &[&**body]),
        Ir::Not(x) => nested(f, depth, "not", &[&**x]),
        Ir::Eq(a, b) => nested(f, depth, "eq", &[&**a, &**b]),
        Ir::IntAdd(a, b) => nested(f, depth, "add", &[&**a, &**b]),
        Ir::IntLess(a, b) => nested(f, depth, "less", &[&**a, &**b]),
        Ir::IntEq(a, b) => nested(f, depth, "int_eq", &[&**a, &**b]),
        Ir::TypeTest {
            value,
            target,
            relation,
        } => nested(f, depth, &format!("is {:?} {}", relation, target), &[&**value]),
        Ir::IsParams(x) => nested(f, depth, "is_params", &[&**x]),
        Ir::PositionalCount(x) => nested(f, depth, "positional_count", &[&**x]),
        Ir::PositionalGet(x, i) => nested(f, depth, &format!("positional[{}]", i), &[&**x]),
        Ir::HasNamed(x, name) => nested(f, depth, &format!("has_named {}", name), &[&**x]),
        Ir::NamedGet(x, name) => nested(f, depth, &format!("named[{}]", name), &[&**x]),
        Ir::NamedWithin(x, names) => {
            nested(f, depth, &format!("named_within [{}]", names.join(", ")), &[&**x])
        }
        Ir::MakeTuple(items) => nested(f, depth, "tuple", &items.iter().collect_vec()),
        Ir::MakeList(items) => nested(f, depth, "list", &items.iter().collect_vec()),
        Ir::MakeParams { args, named } => {
            writeln!(f, "{}params", pad)?;
            for arg in args {
                write_ir(f, arg, depth + 1)?;
            }
            for (name, value) in named {
                writeln!(f, "{}  {} =", pad, name)?;
                write_ir(f, value, depth + 2)?;
            }
            Ok(())
        }
        Ir::Invoke { callee, params } => nested(f, depth, "invoke", &[&**callee, &**params]),
        Ir::NativeCall { function, args } => nested(
            f,
            depth,
            &format!("native {}", function.name()),
            &args.iter().collect_vec(),
        ),
        Ir::Raise { kind, operands } => nested(
            f,
            depth,
            &format!("raise {:?}", kind),
            &operands.iter().collect_vec(),
        ),
        Ir::Located { location, body } => nested(f, depth, &format!("@ {}", location), &[&**body]),
    }
}
