use crate::context::CompileContext;
use crate::method::Method;
use rb_core::error::Error;
use rb_core::value::{Callable, Params, Ty, Value};
use rb_core::Result;
use std::any::Any;
use std::sync::{Arc, Mutex};

/// A parametric data declaration. Calling it with type arguments builds and
/// finishes one record type per distinct argument list.
pub struct GenericType {
    name: String,
    method: Method,
    ctx: Arc<CompileContext>,
    instances: Mutex<Vec<(Params, Ty)>>,
}

impl GenericType {
    pub fn new(name: impl Into<String>, method: Method, ctx: Arc<CompileContext>) -> Self {
        Self {
            name: name.into(),
            method,
            ctx,
            instances: Mutex::new(vec![]),
        }
    }

    fn with_instances<R>(&self, f: impl FnOnce(&mut Vec<(Params, Ty)>) -> R) -> R {
        let mut instances = self.instances.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut instances)
    }

    fn cached(&self, params: &Params) -> Option<Ty> {
        self.with_instances(|instances| {
            instances
                .iter()
                .find(|(key, _)| key == params)
                .map(|(_, ty)| ty.clone())
        })
    }

    pub fn instantiate(&self, params: Params) -> Result<Ty> {
        if let Some(ty) = self.cached(&params) {
            return Ok(ty);
        }
        let descriptor = match self.method.call(params.clone())? {
            Value::Struct(descriptor) => descriptor,
            other => {
                return Err(Error::Generic(format!(
                    "{} must evaluate to a struct, got {}",
                    self.name, other
                )))
            }
        };
        let fields = self.ctx.record_fields(&descriptor)?;
        let backend = self.ctx.backend();
        let builder = backend.begin_type(&format!("{}{}", self.name, params));
        let ty = Ty::Record(backend.finish_type(builder, fields)?);
        rb_core::debug!("instantiated {}", ty);

        // another caller may have finished the same instance meanwhile
        Ok(self.with_instances(|instances| {
            match instances.iter().find(|(key, _)| key == &params) {
                Some((_, existing)) => existing.clone(),
                None => {
                    instances.push((params, ty.clone()));
                    ty
                }
            }
        }))
    }
}

impl Callable for GenericType {
    fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, params: Params) -> Result<Value> {
        self.instantiate(params).map(Value::Type)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
