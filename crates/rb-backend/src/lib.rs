//! Code generation backends: turn finished IR into invocable units and
//! materialize nominal record types.

mod tree;

pub use tree::*;

use rb_core::ir::IrUnit;
use rb_core::value::{RecordField, RecordType, RecordTypeRef, Value};
use rb_core::Result;
use std::sync::Arc;

/// A compiled unit; invoked with the single input its IR reads.
pub trait Invocable: Send + Sync {
    fn name(&self) -> &str;
    fn invoke(&self, input: Value) -> Result<Value>;
}

pub type InvocableRef = Arc<dyn Invocable>;

/// An open record type awaiting its field list.
#[derive(Debug, Clone)]
pub struct TypeBuilder {
    ty: RecordTypeRef,
}

impl TypeBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            ty: RecordType::new(name),
        }
    }

    /// The type being built. Its identity survives `finish_type`.
    pub fn record_type(&self) -> &RecordTypeRef {
        &self.ty
    }
    pub fn name(&self) -> &str {
        self.ty.name()
    }
}

pub trait CodegenBackend: Send + Sync {
    fn compile(&self, unit: IrUnit) -> Result<InvocableRef>;

    fn begin_type(&self, name: &str) -> TypeBuilder {
        TypeBuilder::new(name)
    }

    /// Seals the builder's type with public fields and a positional constructor.
    fn finish_type(&self, builder: TypeBuilder, fields: Vec<RecordField>) -> Result<RecordTypeRef> {
        builder.ty.seal(fields)?;
        Ok(builder.ty)
    }
}
