use super::RecordTypeRef;
use itertools::Itertools;
use std::fmt::{Display, Formatter};

/// Semantic types. Records are nominal; everything else is structural.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Ty {
    Any,
    Never,
    Unit,
    Bool,
    Int,
    Float,
    String,
    Type,
    Params,
    Callable,
    Struct,
    Tuple(Vec<Ty>),
    List(Box<Ty>),
    Record(RecordTypeRef),
}

impl Ty {
    pub fn list(item: Ty) -> Self {
        Ty::List(item.into())
    }

    pub fn is_subtype_of(&self, other: &Ty) -> bool {
        if self == other {
            return true;
        }
        match (self, other) {
            (_, Ty::Any) | (Ty::Never, _) => true,
            (Ty::Tuple(a), Ty::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(a, b)| a.is_subtype_of(b))
            }
            (Ty::List(a), Ty::List(b)) => a.is_subtype_of(b),
            _ => false,
        }
    }

    /// Equal types stay as they are; differing types widen to `Any`.
    pub fn common(&self, other: &Ty) -> Ty {
        if self == other || other == &Ty::Never {
            self.clone()
        } else if self == &Ty::Never {
            other.clone()
        } else {
            Ty::Any
        }
    }

    pub fn common_of(types: impl IntoIterator<Item = Ty>) -> Ty {
        types
            .into_iter()
            .fold(Ty::Never, |acc, ty| acc.common(&ty))
    }
}

impl Display for Ty {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Ty::Any => write!(f, "Any"),
            Ty::Never => write!(f, "Never"),
            Ty::Unit => write!(f, "Unit"),
            Ty::Bool => write!(f, "Bool"),
            Ty::Int => write!(f, "Int"),
            Ty::Float => write!(f, "Float"),
            Ty::String => write!(f, "String"),
            Ty::Type => write!(f, "Type"),
            Ty::Params => write!(f, "Params"),
            Ty::Callable => write!(f, "Callable"),
            Ty::Struct => write!(f, "Struct"),
            Ty::Tuple(items) => write!(f, "({})", items.iter().join(", ")),
            Ty::List(item) => write!(f, "Array({})", item),
            Ty::Record(record) => write!(f, "{}", record.name()),
        }
    }
}
