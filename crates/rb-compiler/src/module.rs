use crate::context::CompileContext;
use crate::method::{Method, MethodCase};
use crate::scope::{ModuleScope, ScopeRef};
use itertools::Itertools;
use rb_core::ast::{Expr, ImplicitVar, MatchCase, Param};
use rb_core::collections::ConcurrentMap;
use rb_core::error::Error;
use rb_core::native::NativeRef;
use rb_core::value::Value;
use rb_core::Result;
use std::sync::{Arc, RwLock};

/// A named symbol table with an overlay of type-scope bindings and a list of
/// imported modules.
pub struct Module {
    name: String,
    ctx: Arc<CompileContext>,
    values: ConcurrentMap<String, Value>,
    type_values: ConcurrentMap<String, Value>,
    imports: RwLock<Vec<Arc<Module>>>,
    /// Merged methods by name, with the candidates they were merged from.
    merged: ConcurrentMap<String, (Vec<Value>, Value)>,
}

impl Module {
    pub fn new(name: impl Into<String>, ctx: Arc<CompileContext>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            ctx,
            values: ConcurrentMap::new(),
            type_values: ConcurrentMap::new(),
            imports: RwLock::new(vec![]),
            merged: ConcurrentMap::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn ctx(&self) -> &Arc<CompileContext> {
        &self.ctx
    }

    pub fn scope(self: &Arc<Self>) -> ScopeRef {
        ModuleScope::new(self)
    }
    pub fn type_scope(self: &Arc<Self>) -> ScopeRef {
        ModuleScope::types(self)
    }

    /// Binds `name`, returning the value it replaces.
    pub fn define(&self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.values.insert(name.into(), value)
    }

    /// Binds `name` in the type-scope overlay only.
    pub fn define_type(&self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.type_values.insert(name.into(), value)
    }

    /// Adds `module` to the imports unless it is already there.
    pub fn add_import(&self, module: Arc<Module>) {
        let mut imports = self.imports.write().unwrap_or_else(|e| e.into_inner());
        if !imports.iter().any(|x| Arc::ptr_eq(x, &module)) {
            imports.push(module);
        }
    }

    pub fn imports(&self) -> Vec<Arc<Module>> {
        self.imports
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn lookup_local(&self, name: &str) -> Option<Value> {
        self.values.get_cloned(name)
    }

    /// Resolves `name` locally and, with `include_imports`, in each imported
    /// module's own bindings. Several candidates merge when all of them are
    /// methods; anything else conflicts. A merge is reused until one of its
    /// candidates changes, so its dispatcher compiles once.
    pub fn lookup(&self, name: &str, include_imports: bool) -> Result<Option<Value>> {
        let mut candidates: Vec<Value> = self.lookup_local(name).into_iter().collect();
        if include_imports {
            for import in self.imports() {
                if let Some(value) = import.lookup_local(name) {
                    if !candidates.contains(&value) {
                        candidates.push(value);
                    }
                }
            }
        }
        if candidates.len() <= 1 {
            return Ok(candidates.pop());
        }

        if let Some((sources, merged)) = self.merged.get_cloned(name) {
            if sources == candidates {
                return Ok(Some(merged));
            }
        }
        let methods: Option<Vec<&Method>> = candidates.iter().map(as_method).collect();
        let Some(methods) = methods else {
            return Err(Error::Conflict {
                name: name.to_string(),
                candidates: candidates.iter().map(Value::shape).join(", "),
            });
        };
        rb_core::trace!("{}: merging {} methods named {}", self.name, methods.len(), name);
        let merged = Value::callable(Method::merge(&methods, name)?);
        self.merged
            .insert(name.to_string(), (candidates.clone(), merged.clone()));
        Ok(Some(merged))
    }

    /// Type-scope lookup: the overlay first, then the ordinary tables.
    pub fn lookup_type(&self, name: &str) -> Result<Option<Value>> {
        match self.type_values.get_cloned(name) {
            Some(value) => Ok(Some(value)),
            None => self.lookup(name, true),
        }
    }

    /// Appends `case` to the local method called `name`, creating it if
    /// needed.
    pub fn define_method_case(self: &Arc<Self>, name: &str, case: MatchCase) -> Result<()> {
        let case = MethodCase::new(self.scope(), case);
        self.values.update(name.to_string(), |previous| match previous {
            None => Ok(Value::callable(Method::new(name, vec![case], self.ctx.clone()))),
            Some(value) => match as_method(value) {
                Some(method) => Ok(Value::callable(method.with_case(case))),
                None => Err(Error::Conflict {
                    name: name.to_string(),
                    candidates: format!("{}, Callable", value.shape()),
                }),
            },
        })
    }

    /// Exposes a native function as one more case of the method `name`.
    pub fn register_native(self: &Arc<Self>, name: &str, native: NativeRef) -> Result<()> {
        let vars: Vec<String> = (0..native.params().len()).map(|i| format!("a{}", i)).collect();
        let implicit_vars = vars
            .iter()
            .zip(native.params())
            .map(|(var, ty)| ImplicitVar {
                name: var.clone(),
                ty: Some(Expr::native(Value::Type(ty.clone()))),
            })
            .collect();
        let pattern = Expr::params(
            vars.iter()
                .map(|var| Param {
                    name: None,
                    pattern: Expr::name(var),
                    default: None,
                })
                .collect(),
        );
        let body = Expr::native_call(native, vars.iter().map(Expr::name).collect());
        self.define_method_case(
            name,
            MatchCase {
                location: Default::default(),
                implicit_vars,
                pattern,
                body,
            },
        )
    }
}

pub(crate) fn as_method(value: &Value) -> Option<&Method> {
    value.as_callable()?.as_any().downcast_ref::<Method>()
}

impl std::fmt::Debug for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Module({})", self.name)
    }
}
