use super::{Ty, Value};
use crate::error::Error;
use crate::Result;
use derive_more::Deref;
use itertools::Itertools;
use once_cell::sync::OnceCell;
use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_RECORD_TYPE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordField {
    pub name: String,
    pub ty: Ty,
}

/// A nominal record type. Created open by a backend's type builder and sealed
/// exactly once with its field list.
pub struct RecordType {
    id: u64,
    name: String,
    fields: OnceCell<Vec<RecordField>>,
}

impl RecordType {
    pub fn new(name: impl Into<String>) -> RecordTypeRef {
        RecordTypeRef(Arc::new(Self {
            id: NEXT_RECORD_TYPE_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            fields: OnceCell::new(),
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn is_sealed(&self) -> bool {
        self.fields.get().is_some()
    }

    pub fn seal(&self, fields: Vec<RecordField>) -> Result<()> {
        self.fields
            .set(fields)
            .map_err(|_| Error::type_box(format!("record type {} is already finished", self.name)))
    }

    pub fn fields(&self) -> Result<&[RecordField]> {
        self.fields
            .get()
            .map(Vec::as_slice)
            .ok_or_else(|| Error::type_box(format!("record type {} is not finished", self.name)))
    }

    pub fn field_index(&self, name: &str) -> Result<usize> {
        self.fields()?
            .iter()
            .position(|field| field.name == name)
            .ok_or_else(|| Error::Generic(format!("{} has no field {}", self.name, name)))
    }
}

#[derive(Clone, Deref)]
pub struct RecordTypeRef(Arc<RecordType>);

impl RecordTypeRef {
    /// Positional constructor: one argument per field, each of the declared type.
    pub fn construct(&self, args: Vec<Value>) -> Result<Value> {
        let fields = self.fields()?;
        if args.len() != fields.len() {
            return Err(Error::native(
                self.name(),
                format!("expected {} fields, got {}", fields.len(), args.len()),
            ));
        }
        for (field, arg) in fields.iter().zip(&args) {
            if !arg.runtime_ty().is_subtype_of(&field.ty) {
                return Err(Error::BadCoercion {
                    value: arg.to_string(),
                    target: field.ty.to_string(),
                    location: Default::default(),
                });
            }
        }
        Ok(Value::Record(Arc::new(RecordValue {
            ty: self.clone(),
            fields: args,
        })))
    }
}

impl PartialEq for RecordTypeRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for RecordTypeRef {}
impl Hash for RecordTypeRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state)
    }
}
impl Debug for RecordTypeRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.name, self.id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordValue {
    ty: RecordTypeRef,
    fields: Vec<Value>,
}

impl RecordValue {
    pub fn ty(&self) -> &RecordTypeRef {
        &self.ty
    }
    pub fn get(&self, index: usize) -> Result<&Value> {
        self.fields
            .get(index)
            .ok_or_else(|| Error::Generic(format!("{} has no field #{}", self.ty.name(), index)))
    }
    pub fn field(&self, name: &str) -> Result<&Value> {
        self.get(self.ty.field_index(name)?)
    }
}

impl Display for RecordValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let names = self
            .ty
            .fields()
            .map(|fields| fields.iter().map(|x| x.name.clone()).collect_vec())
            .unwrap_or_default();
        write!(f, "{} {{ ", self.ty.name())?;
        for (i, value) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match names.get(i) {
                Some(name) => write!(f, "{}: {}", name, value)?,
                None => write!(f, "{}", value)?,
            }
        }
        write!(f, " }}")
    }
}

/// A record descriptor: what a data declaration's body evaluates to.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Struct {
    pub name: String,
    pub fields: Vec<StructField>,
    pub attributes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructField {
    pub name: String,
    /// A type or a forward type handle.
    pub ty: Value,
    pub attributes: Vec<String>,
}

impl Display for Struct {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "struct {} {{ {} }}",
            self.name,
            self.fields
                .iter()
                .map(|field| format!("{}: {}", field.name, field.ty))
                .join(", ")
        )
    }
}
