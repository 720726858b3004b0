use rb_core::ir::Ir;
use rb_core::value::{Ty, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum Repr {
    /// Known while compiling.
    Immediate(Value),
    /// Known only once the emitted IR runs.
    Dynamic(Ir),
}

/// A value as the compiler sees it: either a constant or a pending
/// computation, always with a semantic type.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedValue {
    pub ty: Ty,
    pub repr: Repr,
}

impl StagedValue {
    pub fn immediate(value: Value) -> Self {
        Self {
            ty: value.runtime_ty(),
            repr: Repr::Immediate(value),
        }
    }

    pub fn dynamic(ir: Ir, ty: Ty) -> Self {
        Self {
            ty,
            repr: Repr::Dynamic(ir),
        }
    }

    pub fn unit() -> Self {
        Self::immediate(Value::Unit)
    }

    pub fn with_ty(mut self, ty: Ty) -> Self {
        self.ty = ty;
        self
    }

    pub fn is_immediate(&self) -> bool {
        matches!(self.repr, Repr::Immediate(_))
    }

    pub fn as_immediate(&self) -> Option<&Value> {
        match &self.repr {
            Repr::Immediate(value) => Some(value),
            Repr::Dynamic(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_immediate().and_then(Value::as_bool)
    }

    pub fn to_ir(&self) -> Ir {
        match &self.repr {
            Repr::Immediate(value) => Ir::Const(value.clone()),
            Repr::Dynamic(ir) => ir.clone(),
        }
    }

    pub fn into_ir(self) -> Ir {
        match self.repr {
            Repr::Immediate(value) => Ir::Const(value),
            Repr::Dynamic(ir) => ir,
        }
    }

    /// A dynamic value that may be read repeatedly without re-running work.
    pub fn is_trivial(&self) -> bool {
        match &self.repr {
            Repr::Immediate(_) => true,
            Repr::Dynamic(ir) => matches!(ir, Ir::Local(_) | Ir::Input),
        }
    }
}

impl StagedValue {
    /// The IR of a value computed for its effects only; constants have none.
    pub(crate) fn into_statement(self) -> Option<Ir> {
        match self.repr {
            Repr::Immediate(_) => None,
            Repr::Dynamic(ir) => Some(ir),
        }
    }
}

impl From<Value> for StagedValue {
    fn from(value: Value) -> Self {
        Self::immediate(value)
    }
}
