use crate::base::{base_module, BASE_MODULE};
use crate::compiler::evaluate;
use crate::context::CompileContext;
use crate::loader::{MacroRegistry, ModuleLoader, ModuleRegistry};
use crate::macros::{RecordMacro, TypeMacro};
use crate::module::Module;
use rb_backend::{CodegenBackend, TreeBackend};
use rb_core::ast::{Expr, ModuleFrontend, ModuleStmt};
use rb_core::config::LoaderOptions;
use rb_core::error::Error;
use rb_core::value::Value;
use rb_core::Result;
use std::sync::Arc;

/// One execution context: a backend, the base module, every loaded module
/// and the registered type macros. Environments share nothing but finished
/// types and syntax trees.
pub struct Environment {
    ctx: Arc<CompileContext>,
    base: Arc<Module>,
    modules: Arc<ModuleRegistry>,
    macros: Arc<MacroRegistry>,
    frontend: Option<Arc<dyn ModuleFrontend>>,
}

impl Environment {
    pub fn new() -> Result<Self> {
        Self::with_backend(Arc::new(TreeBackend::new()), LoaderOptions::default())
    }

    pub fn with_backend(backend: Arc<dyn CodegenBackend>, options: LoaderOptions) -> Result<Self> {
        let ctx = CompileContext::new(backend, options);
        let base = base_module(ctx.clone())?;
        let modules = Arc::new(ModuleRegistry::new());
        modules.insert(BASE_MODULE.to_string(), base.clone());
        let macros = Arc::new(MacroRegistry::new());
        let record: Arc<dyn TypeMacro> = Arc::new(RecordMacro);
        macros.insert(record.name().to_string(), record);
        Ok(Self {
            ctx,
            base,
            modules,
            macros,
            frontend: None,
        })
    }

    pub fn with_frontend(mut self, frontend: Arc<dyn ModuleFrontend>) -> Self {
        self.frontend = Some(frontend);
        self
    }

    pub fn ctx(&self) -> &Arc<CompileContext> {
        &self.ctx
    }
    pub fn base(&self) -> &Arc<Module> {
        &self.base
    }

    pub fn register_macro(&self, type_macro: Arc<dyn TypeMacro>) {
        self.macros.insert(type_macro.name().to_string(), type_macro);
    }

    /// Creates and registers an empty module importing the base module.
    pub fn create_module(&self, name: &str) -> Arc<Module> {
        let module = self.new_module(name);
        self.modules.insert(name.to_string(), module.clone());
        module
    }

    fn new_module(&self, name: &str) -> Arc<Module> {
        let module = Module::new(name, self.ctx.clone());
        module.add_import(self.base.clone());
        module
    }

    pub fn module(&self, name: &str) -> Option<Arc<Module>> {
        self.modules.get_cloned(name)
    }

    pub fn loader(&self, module: Arc<Module>) -> ModuleLoader {
        ModuleLoader::new(
            module,
            self.modules.clone(),
            self.macros.clone(),
            self.ctx.options().max_rounds,
        )
    }

    /// Loads already parsed statements into a new module called `name`. The
    /// module is registered only once every statement has bound.
    pub fn load_stmts(&self, name: &str, path: &str, stmts: Vec<ModuleStmt>) -> Result<Arc<Module>> {
        let module = self.new_module(name);
        self.loader(module.clone()).load(path, stmts)?;
        self.modules.insert(name.to_string(), module.clone());
        Ok(module)
    }

    /// Parses `text` with the configured front end and loads it into a new
    /// module called `name`.
    pub fn load_source(&self, name: &str, path: &str, text: &str) -> Result<Arc<Module>> {
        let frontend = self
            .frontend
            .clone()
            .ok_or_else(|| Error::Generic(format!("no front end to parse {}", path)))?;
        let module = self.new_module(name);
        self.loader(module.clone())
            .load_source(frontend.as_ref(), path, text)?;
        self.modules.insert(name.to_string(), module.clone());
        Ok(module)
    }

    /// Compiles and runs `expr` in the scope of `module`.
    pub fn evaluate(&self, module: &Arc<Module>, expr: &Expr) -> Result<Value> {
        evaluate(&self.ctx, &module.scope(), expr)
    }
}
