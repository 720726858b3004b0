//! Round-based module loading. Type macros emit statements that refer to the
//! types being declared, so loading iterates until no round produces new
//! statements.

use crate::compiler::evaluate;
use crate::generic::GenericType;
use crate::macros::{TypeMacro, DEFAULT_TYPE_MACRO};
use crate::method::{Method, MethodCase};
use crate::module::Module;
use rb_core::ast::{
    BlockLet, BlockStmt, DataDecl, Expr, MatchCase, ModuleFrontend, ModuleLet, ModuleStmt,
    ModuleStmtKind, Param,
};
use rb_core::collections::ConcurrentMap;
use rb_core::error::Error;
use rb_core::value::{RecordField, TypeBoxId, Value};
use rb_core::Result;
use std::sync::Arc;

pub type ModuleRegistry = ConcurrentMap<String, Arc<Module>>;
pub type MacroRegistry = ConcurrentMap<String, Arc<dyn TypeMacro>>;

/// A declaration whose forward handle was created this round.
struct PendingType<'a> {
    decl: &'a DataDecl,
    id: TypeBoxId,
    fields: Vec<RecordField>,
}

pub struct ModuleLoader {
    module: Arc<Module>,
    registry: Arc<ModuleRegistry>,
    macros: Arc<MacroRegistry>,
    max_rounds: usize,
}

impl ModuleLoader {
    pub fn new(
        module: Arc<Module>,
        registry: Arc<ModuleRegistry>,
        macros: Arc<MacroRegistry>,
        max_rounds: usize,
    ) -> Self {
        Self {
            module,
            registry,
            macros,
            max_rounds,
        }
    }

    pub fn load_source(&self, frontend: &dyn ModuleFrontend, path: &str, text: &str) -> Result<()> {
        let stmts = frontend.parse_module(path, text)?;
        self.load(path, stmts)
    }

    /// Loads `stmts` into the module. Fails without a fixpoint after the
    /// configured number of rounds.
    pub fn load(&self, path: &str, stmts: Vec<ModuleStmt>) -> Result<()> {
        let mut queue = stmts;
        let mut round = 0;
        while !queue.is_empty() {
            if round == self.max_rounds {
                return Err(Error::MacroRecursionExceeded {
                    path: path.to_string(),
                    rounds: self.max_rounds,
                });
            }
            round += 1;
            rb_core::debug!(
                "loading {} into {}: round {} with {} statements",
                path,
                self.module.name(),
                round,
                queue.len()
            );
            queue = self.run_round(queue)?;
        }
        Ok(())
    }

    /// Runs the passes of one round and returns the next round's queue.
    fn run_round(&self, stmts: Vec<ModuleStmt>) -> Result<Vec<ModuleStmt>> {
        self.resolve_imports(&stmts)?;
        let mut pending = self.init_types(&stmts)?;
        let generated = self.build_types(&mut pending)?;
        self.finish_types(pending)?;
        let deferred = self.define(&stmts, !generated.is_empty())?;
        Ok(generated.into_iter().chain(deferred).collect())
    }

    fn resolve_imports(&self, stmts: &[ModuleStmt]) -> Result<()> {
        for stmt in stmts {
            if let ModuleStmtKind::Import(import) = &stmt.kind {
                let module = self.registry.get_cloned(import.path.as_str()).ok_or_else(|| {
                    Error::UnresolvedImport {
                        path: import.path.clone(),
                        location: stmt.location.clone(),
                    }
                })?;
                rb_core::trace!("{} imports {}", self.module.name(), import.path);
                self.module.add_import(module);
            }
        }
        Ok(())
    }

    fn init_types<'a>(&self, stmts: &'a [ModuleStmt]) -> Result<Vec<PendingType<'a>>> {
        let ctx = self.module.ctx();
        let mut pending = vec![];
        for stmt in stmts {
            let ModuleStmtKind::Data(decl) = &stmt.kind else {
                continue;
            };
            match &decl.params {
                Some(params) => {
                    let case = MatchCase {
                        location: stmt.location.clone(),
                        implicit_vars: params.clone(),
                        pattern: Expr::params(
                            params
                                .iter()
                                .map(|param| Param {
                                    name: None,
                                    pattern: Expr::name(param.name.clone()),
                                    default: None,
                                })
                                .collect(),
                        )
                        .at(stmt.location.clone()),
                        body: decl.body.clone(),
                    };
                    let method = Method::new(
                        decl.name.clone(),
                        vec![MethodCase::new(self.module.type_scope(), case)],
                        ctx.clone(),
                    );
                    let generic = Value::callable(GenericType::new(
                        decl.name.clone(),
                        method,
                        ctx.clone(),
                    ));
                    rb_core::trace!("{}: generic type {}", self.module.name(), decl.name);
                    self.module.define(decl.name.clone(), generic.clone());
                    self.module.define_type(decl.name.clone(), generic);
                }
                None => {
                    let id = ctx.type_boxes().allocate(decl.name.clone());
                    rb_core::trace!("{}: {} is {}", self.module.name(), decl.name, id);
                    self.module.define(decl.name.clone(), Value::TypeBox(id));
                    self.module.define_type(decl.name.clone(), Value::TypeBox(id));
                    pending.push(PendingType {
                        decl,
                        id,
                        fields: vec![],
                    });
                }
            }
        }
        Ok(pending)
    }

    /// Opens every handle before evaluating any body so declarations of the
    /// same round may refer to each other.
    fn build_types(&self, pending: &mut [PendingType<'_>]) -> Result<Vec<ModuleStmt>> {
        let ctx = self.module.ctx();
        for ty in pending.iter() {
            ctx.type_boxes()
                .attach(ty.id, ctx.backend().begin_type(&ty.decl.name))?;
        }
        let scope = self.module.type_scope();
        let mut generated = vec![];
        for ty in pending.iter_mut() {
            let descriptor = match evaluate(ctx, &scope, &ty.decl.body)? {
                Value::Struct(descriptor) => descriptor,
                other => {
                    return Err(Error::Generic(format!(
                        "data declaration {} must evaluate to a struct, got {}",
                        ty.decl.name, other
                    )))
                }
            };
            ty.fields = ctx.record_fields(&descriptor)?;
            let macro_name = ty.decl.macro_name.as_deref().unwrap_or(DEFAULT_TYPE_MACRO);
            let type_macro = self
                .macros
                .get_cloned(macro_name)
                .ok_or_else(|| Error::Generic(format!("unknown type macro `{}`", macro_name)))?;
            let builder = ctx.type_boxes().builder(ty.id)?;
            let stmts = type_macro.expand(ty.decl, builder.record_type(), &ty.fields)?;
            rb_core::trace!(
                "{}: macro {} generated {} statements for {}",
                self.module.name(),
                macro_name,
                stmts.len(),
                ty.decl.name
            );
            generated.extend(stmts);
        }
        Ok(generated)
    }

    fn finish_types(&self, pending: Vec<PendingType<'_>>) -> Result<()> {
        let ctx = self.module.ctx();
        for ty in pending {
            let fields = ty.fields;
            let finished = ctx
                .type_boxes()
                .finish(ty.id, |builder| ctx.backend().finish_type(builder, fields))?;
            rb_core::trace!("{}: finished {}", self.module.name(), finished);
            self.module.define(ty.decl.name.clone(), Value::Type(finished.clone()));
            self.module.define_type(ty.decl.name.clone(), Value::Type(finished));
        }
        Ok(())
    }

    /// Binds functions, then constants. Constants wait for the next round
    /// while generated statements are pending.
    fn define(&self, stmts: &[ModuleStmt], defer_lets: bool) -> Result<Vec<ModuleStmt>> {
        for stmt in stmts {
            if let ModuleStmtKind::Fun(fun) = &stmt.kind {
                self.module
                    .define_method_case(&fun.name, fun.fundef.to_match_case())?;
            }
        }
        let mut deferred = vec![];
        for stmt in stmts {
            let ModuleStmtKind::Let(let_) = &stmt.kind else {
                continue;
            };
            if defer_lets {
                deferred.push(stmt.clone());
                continue;
            }
            let value = self.evaluate_let(stmt, let_)?;
            self.module.define(let_.name.clone(), value);
        }
        Ok(deferred)
    }

    fn evaluate_let(&self, stmt: &ModuleStmt, let_: &ModuleLet) -> Result<Value> {
        let expr = match &let_.ty {
            None => let_.value.clone(),
            Some(ty) => Expr::block(vec![
                BlockStmt::Let(BlockLet {
                    location: stmt.location.clone(),
                    name: let_.name.clone(),
                    ty: Some(ty.clone()),
                    value: let_.value.clone(),
                }),
                BlockStmt::Expr(Expr::name(let_.name.clone())),
            ]),
        };
        evaluate(self.module.ctx(), &self.module.scope(), &expr)
    }
}
