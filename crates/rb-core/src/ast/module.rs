use super::{Expr, FunDef, ImplicitVar, Location};
use crate::Result;

#[derive(Debug, Clone, PartialEq)]
pub struct ModuleStmt {
    pub location: Location,
    pub kind: ModuleStmtKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModuleStmtKind {
    Let(ModuleLet),
    Fun(ModuleFun),
    Data(DataDecl),
    Import(Import),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModuleLet {
    pub name: String,
    pub ty: Option<Expr>,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModuleFun {
    pub name: String,
    pub fundef: FunDef,
}

/// A data-type declaration. Declarations with `params` are type-level
/// functions instantiated on demand.
#[derive(Debug, Clone, PartialEq)]
pub struct DataDecl {
    pub name: String,
    pub params: Option<Vec<ImplicitVar>>,
    pub body: Expr,
    pub macro_name: Option<String>,
}

impl DataDecl {
    pub fn is_parametric(&self) -> bool {
        self.params.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    pub path: String,
}

impl ModuleStmt {
    pub fn new(kind: ModuleStmtKind) -> Self {
        Self {
            location: Location::unknown(),
            kind,
        }
    }
    pub fn at(mut self, location: Location) -> Self {
        self.location = location;
        self
    }
    pub fn let_(name: impl Into<String>, ty: Option<Expr>, value: Expr) -> Self {
        Self::new(ModuleStmtKind::Let(ModuleLet {
            name: name.into(),
            ty,
            value,
        }))
    }
    pub fn fun(name: impl Into<String>, fundef: FunDef) -> Self {
        let location = fundef.location.clone();
        Self::new(ModuleStmtKind::Fun(ModuleFun {
            name: name.into(),
            fundef,
        }))
        .at(location)
    }
    pub fn data(decl: DataDecl) -> Self {
        Self::new(ModuleStmtKind::Data(decl))
    }
    pub fn import(path: impl Into<String>) -> Self {
        Self::new(ModuleStmtKind::Import(Import { path: path.into() }))
    }

    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            ModuleStmtKind::Let(_) => "let",
            ModuleStmtKind::Fun(_) => "fun",
            ModuleStmtKind::Data(_) => "data",
            ModuleStmtKind::Import(_) => "import",
        }
    }
}

/// Turns a source unit into module statements.
pub trait ModuleFrontend: Send + Sync {
    fn parse_module(&self, path: &str, text: &str) -> Result<Vec<ModuleStmt>>;
}
