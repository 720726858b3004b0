use crate::module::Module;
use crate::staged::{Repr, StagedValue};
use rb_core::collections::ConcurrentMap;
use rb_core::error::Error;
use rb_core::Result;
use std::sync::{Arc, Weak};

/// Identity of one compilation unit; runtime locals never cross units.
pub type UnitId = u64;

pub trait Scope: Send + Sync {
    /// Looks `name` up on behalf of code compiled into `unit`.
    fn lookup(&self, name: &str, unit: UnitId) -> Result<Option<StagedValue>>;
}

pub type ScopeRef = Arc<dyn Scope>;

/// A lexical frame owned by one function body or block.
pub struct FunctionScope {
    parent: ScopeRef,
    unit: UnitId,
    values: ConcurrentMap<String, StagedValue>,
}

impl FunctionScope {
    pub fn new(parent: ScopeRef, unit: UnitId) -> Arc<Self> {
        Arc::new(Self {
            parent,
            unit,
            values: ConcurrentMap::new(),
        })
    }

    /// Binds without emitting code; callers materialize dynamic values first.
    pub fn bind(&self, name: impl Into<String>, value: StagedValue) {
        self.values.insert(name.into(), value);
    }
}

impl Scope for FunctionScope {
    fn lookup(&self, name: &str, unit: UnitId) -> Result<Option<StagedValue>> {
        match self.values.get_cloned(name) {
            Some(value) => {
                if matches!(value.repr, Repr::Dynamic(_)) && unit != self.unit {
                    return Err(Error::Capture {
                        name: name.to_string(),
                    });
                }
                Ok(Some(value))
            }
            None => self.parent.lookup(name, unit),
        }
    }
}

/// Root frame resolving through a module's symbol table, or through its
/// type-scope overlay while declarations are being resolved.
pub struct ModuleScope {
    module: Weak<Module>,
    type_scope: bool,
}

impl ModuleScope {
    pub fn new(module: &Arc<Module>) -> Arc<Self> {
        Arc::new(Self {
            module: Arc::downgrade(module),
            type_scope: false,
        })
    }

    pub fn types(module: &Arc<Module>) -> Arc<Self> {
        Arc::new(Self {
            module: Arc::downgrade(module),
            type_scope: true,
        })
    }
}

impl Scope for ModuleScope {
    fn lookup(&self, name: &str, _unit: UnitId) -> Result<Option<StagedValue>> {
        let module = self
            .module
            .upgrade()
            .ok_or_else(|| Error::Generic(format!("module of `{}` was dropped", name)))?;
        let value = if self.type_scope {
            module.lookup_type(name)?
        } else {
            module.lookup(name, true)?
        };
        Ok(value.map(StagedValue::immediate))
    }
}
