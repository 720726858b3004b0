use crate::typebox::TypeBoxArena;
use rb_backend::{CodegenBackend, TreeBackend};
use rb_core::config::LoaderOptions;
use rb_core::error::Error;
use rb_core::value::{RecordField, Struct, Ty, Value};
use rb_core::Result;
use std::sync::Arc;

/// State shared by every compilation inside one execution context.
pub struct CompileContext {
    backend: Arc<dyn CodegenBackend>,
    type_boxes: TypeBoxArena,
    options: LoaderOptions,
}

impl CompileContext {
    pub fn new(backend: Arc<dyn CodegenBackend>, options: LoaderOptions) -> Arc<Self> {
        Arc::new(Self {
            backend,
            type_boxes: TypeBoxArena::default(),
            options,
        })
    }

    pub fn with_tree_backend() -> Arc<Self> {
        Self::new(Arc::new(TreeBackend::new()), LoaderOptions::default())
    }

    pub fn backend(&self) -> &Arc<dyn CodegenBackend> {
        &self.backend
    }
    pub fn type_boxes(&self) -> &TypeBoxArena {
        &self.type_boxes
    }
    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    /// Interprets a value used in type position, unboxing forward handles.
    pub fn resolve_type(&self, value: &Value) -> Result<Ty> {
        match value {
            Value::Type(ty) => Ok(ty.clone()),
            Value::TypeBox(id) => self.type_boxes.unbox(*id),
            other => Err(Error::Generic(format!(
                "expected a type, found {} of type {}",
                other,
                other.runtime_ty()
            ))),
        }
    }

    /// Field list of a record descriptor with every field type resolved.
    pub fn record_fields(&self, descriptor: &Struct) -> Result<Vec<RecordField>> {
        descriptor
            .fields
            .iter()
            .map(|field| {
                Ok(RecordField {
                    name: field.name.clone(),
                    ty: self.resolve_type(&field.ty)?,
                })
            })
            .collect()
    }
}
