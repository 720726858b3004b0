//! Syntax tree consumed by the compiler.
//!
//! Front ends produce these nodes; nothing in the core mutates them after
//! construction.

mod module;

pub use module::*;

use crate::native::NativeRef;
use crate::value::Value;
use derive_more::From;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub filename: String,
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

impl Location {
    pub fn unknown() -> Self {
        Self::default()
    }
    pub fn is_unknown(&self) -> bool {
        self.filename.is_empty() && self.start_line == 0
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_unknown() {
            return write!(f, "<unknown>");
        }
        write!(
            f,
            "{}:{}:{}",
            if self.filename.is_empty() {
                "<input>"
            } else {
                &self.filename
            },
            self.start_line,
            self.start_column
        )
    }
}

#[derive(Debug, Clone, PartialEq, From)]
pub enum Literal {
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Literal {
    pub fn to_value(&self) -> Value {
        match self {
            Literal::Unit => Value::Unit,
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Int(i) => Value::Int(*i),
            Literal::Float(f) => Value::Float(*f),
            Literal::String(s) => Value::String(s.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub location: Location,
    pub kind: ExprKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Name(String),
    Literal(Literal),
    Call(Call),
    Block(Block),
    If(If),
    Tuple(Vec<Expr>),
    List(Vec<Expr>),
    FunDef(Arc<FunDef>),
    Case(Arc<MatchCase>),
    /// Parameter-list pattern; only meaningful in match position.
    Params(ParamList),
    /// Record descriptor literal evaluated by data declarations.
    Record(RecordDef),
    /// An already evaluated value spliced into the tree.
    Native(Value),
    /// A direct invocation of a native function.
    NativeCall(NativeCall),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub func: Box<Expr>,
    pub args: Vec<Expr>,
    pub named: Vec<(String, Expr)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub stmts: Vec<BlockStmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockStmt {
    Let(BlockLet),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockLet {
    pub location: Location,
    pub name: String,
    pub ty: Option<Expr>,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct If {
    pub cond: Box<Expr>,
    pub then: Box<Expr>,
    pub else_: Box<Expr>,
}

/// A declared function parameter; `named` parameters are passed by keyword.
#[derive(Debug, Clone, PartialEq)]
pub struct FunParam {
    pub name: String,
    pub ty: Option<Expr>,
    pub default: Option<Expr>,
    pub named: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunDef {
    pub location: Location,
    pub params: Vec<FunParam>,
    pub body: Expr,
}

impl FunDef {
    /// The match case equivalent to this definition: every parameter becomes an
    /// implicit variable bound by a parameter-list pattern.
    pub fn to_match_case(&self) -> MatchCase {
        let implicit_vars = self
            .params
            .iter()
            .map(|param| ImplicitVar {
                name: param.name.clone(),
                ty: param.ty.clone(),
            })
            .collect();
        let params = self
            .params
            .iter()
            .map(|param| Param {
                name: param.named.then(|| param.name.clone()),
                pattern: Expr::name(&param.name).at(self.location.clone()),
                default: param.default.clone(),
            })
            .collect();
        MatchCase {
            location: self.location.clone(),
            implicit_vars,
            pattern: Expr::new(ExprKind::Params(ParamList { params }))
                .at(self.location.clone()),
            body: self.body.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImplicitVar {
    pub name: String,
    pub ty: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchCase {
    pub location: Location,
    pub implicit_vars: Vec<ImplicitVar>,
    pub pattern: Expr,
    pub body: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    /// `Some` for a named slot, `None` for a positional one.
    pub name: Option<String>,
    pub pattern: Expr,
    pub default: Option<Expr>,
}

impl Param {
    pub fn is_named(&self) -> bool {
        self.name.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParamList {
    pub params: Vec<Param>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordFieldDef {
    pub name: String,
    pub ty: Expr,
    pub attributes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordDef {
    pub fields: Vec<RecordFieldDef>,
    pub attributes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NativeCall {
    pub function: NativeRef,
    pub args: Vec<Expr>,
}

impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        Self {
            location: Location::unknown(),
            kind,
        }
    }
    pub fn at(mut self, location: Location) -> Self {
        self.location = location;
        self
    }
    pub fn name(name: impl Into<String>) -> Self {
        Self::new(ExprKind::Name(name.into()))
    }
    pub fn literal(literal: impl Into<Literal>) -> Self {
        Self::new(ExprKind::Literal(literal.into()))
    }
    pub fn unit() -> Self {
        Self::new(ExprKind::Literal(Literal::Unit))
    }
    pub fn native(value: Value) -> Self {
        Self::new(ExprKind::Native(value))
    }
    pub fn call(func: Expr, args: Vec<Expr>) -> Self {
        Self::new(ExprKind::Call(Call {
            func: func.into(),
            args,
            named: vec![],
        }))
    }
    pub fn call_named(func: Expr, args: Vec<Expr>, named: Vec<(String, Expr)>) -> Self {
        Self::new(ExprKind::Call(Call {
            func: func.into(),
            args,
            named,
        }))
    }
    pub fn block(stmts: Vec<BlockStmt>) -> Self {
        Self::new(ExprKind::Block(Block { stmts }))
    }
    pub fn if_(cond: Expr, then: Expr, else_: Expr) -> Self {
        Self::new(ExprKind::If(If {
            cond: cond.into(),
            then: then.into(),
            else_: else_.into(),
        }))
    }
    pub fn native_call(function: NativeRef, args: Vec<Expr>) -> Self {
        Self::new(ExprKind::NativeCall(NativeCall { function, args }))
    }
    pub fn params(params: Vec<Param>) -> Self {
        Self::new(ExprKind::Params(ParamList { params }))
    }

    pub fn as_name(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Name(name) => Some(name),
            _ => None,
        }
    }
}

impl FunParam {
    pub fn positional(name: impl Into<String>, ty: Option<Expr>) -> Self {
        Self {
            name: name.into(),
            ty,
            default: None,
            named: false,
        }
    }
    pub fn named(name: impl Into<String>, ty: Option<Expr>) -> Self {
        Self {
            named: true,
            ..Self::positional(name, ty)
        }
    }
    pub fn with_default(mut self, default: Expr) -> Self {
        self.default = Some(default);
        self
    }
}
