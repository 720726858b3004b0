//! Forward type handles: placeholders for record types whose declarations
//! are visible before their fields are fixed.

use rb_backend::TypeBuilder;
use rb_core::error::Error;
use rb_core::value::{RecordTypeRef, Ty, TypeBoxId};
use rb_core::Result;
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub enum TypeBoxState {
    Unbound,
    Building(TypeBuilder),
    Finished(Ty),
}

struct TypeBoxEntry {
    name: String,
    state: TypeBoxState,
}

/// Arena of forward type handles indexed by stable ids.
#[derive(Default)]
pub struct TypeBoxArena {
    boxes: Mutex<Vec<TypeBoxEntry>>,
}

impl TypeBoxArena {
    fn with_boxes<R>(&self, f: impl FnOnce(&mut Vec<TypeBoxEntry>) -> R) -> R {
        match self.boxes.lock() {
            Ok(mut boxes) => f(&mut boxes),
            Err(poison) => {
                // Recover from a poisoned lock by taking the inner value
                let mut boxes = poison.into_inner();
                f(&mut boxes)
            }
        }
    }

    fn with_entry<R>(
        &self,
        id: TypeBoxId,
        f: impl FnOnce(&mut TypeBoxEntry) -> Result<R>,
    ) -> Result<R> {
        self.with_boxes(|boxes| match boxes.get_mut(id.0) {
            Some(entry) => f(entry),
            None => Err(Error::type_box(format!("unknown {}", id))),
        })
    }

    pub fn allocate(&self, name: impl Into<String>) -> TypeBoxId {
        self.with_boxes(|boxes| {
            boxes.push(TypeBoxEntry {
                name: name.into(),
                state: TypeBoxState::Unbound,
            });
            TypeBoxId(boxes.len() - 1)
        })
    }

    pub fn state(&self, id: TypeBoxId) -> Result<TypeBoxState> {
        self.with_entry(id, |entry| Ok(entry.state.clone()))
    }

    pub fn attach(&self, id: TypeBoxId, builder: TypeBuilder) -> Result<()> {
        self.with_entry(id, |entry| match entry.state {
            TypeBoxState::Unbound => {
                entry.state = TypeBoxState::Building(builder);
                Ok(())
            }
            TypeBoxState::Building(_) => Err(Error::type_box(format!(
                "{} already has a type builder",
                entry.name
            ))),
            TypeBoxState::Finished(_) => Err(Error::type_box(format!(
                "{} is already finished",
                entry.name
            ))),
        })
    }

    pub fn builder(&self, id: TypeBoxId) -> Result<TypeBuilder> {
        self.with_entry(id, |entry| match &entry.state {
            TypeBoxState::Building(builder) => Ok(builder.clone()),
            TypeBoxState::Finished(_) => Err(Error::type_box(format!(
                "{} is already finished",
                entry.name
            ))),
            TypeBoxState::Unbound => Err(Error::type_box(format!(
                "{} doesn't have a type builder yet",
                entry.name
            ))),
        })
    }

    /// The single `Building -> Finished` transition. `build` runs outside the
    /// arena lock so it may unbox other handles.
    pub fn finish(
        &self,
        id: TypeBoxId,
        build: impl FnOnce(TypeBuilder) -> Result<RecordTypeRef>,
    ) -> Result<Ty> {
        let builder = self.builder(id)?;
        let ty = Ty::Record(build(builder)?);
        self.with_entry(id, |entry| match entry.state {
            TypeBoxState::Building(_) => {
                entry.state = TypeBoxState::Finished(ty.clone());
                Ok(ty)
            }
            _ => Err(Error::type_box(format!(
                "{} was finished concurrently",
                entry.name
            ))),
        })
    }

    /// The type a handle currently stands for: the open builder type while
    /// building, the finished type afterwards.
    pub fn unbox(&self, id: TypeBoxId) -> Result<Ty> {
        self.with_entry(id, |entry| match &entry.state {
            TypeBoxState::Building(builder) => Ok(Ty::Record(builder.record_type().clone())),
            TypeBoxState::Finished(ty) => Ok(ty.clone()),
            TypeBoxState::Unbound => Err(Error::type_box(format!(
                "{} doesn't yet contain a type or a type builder",
                entry.name
            ))),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rb_backend::{CodegenBackend, TreeBackend};

    #[test]
    fn handle_goes_through_three_states() -> Result<()> {
        let backend = TreeBackend::new();
        let arena = TypeBoxArena::default();
        let id = arena.allocate("Point");
        assert!(arena.unbox(id).is_err());
        assert!(arena.builder(id).is_err());

        let builder = backend.begin_type("Point");
        let open = builder.record_type().clone();
        arena.attach(id, builder)?;
        assert_eq!(arena.unbox(id)?, Ty::Record(open.clone()));

        let finished = arena.finish(id, |builder| backend.finish_type(builder, vec![]))?;
        assert_eq!(finished, Ty::Record(open));
        assert!(matches!(arena.state(id)?, TypeBoxState::Finished(_)));
        Ok(())
    }

    #[test]
    fn finished_handle_rejects_builder_use() -> Result<()> {
        let backend = TreeBackend::new();
        let arena = TypeBoxArena::default();
        let id = arena.allocate("Unit");
        arena.attach(id, backend.begin_type("Unit"))?;
        arena.finish(id, |builder| backend.finish_type(builder, vec![]))?;

        assert!(matches!(arena.builder(id), Err(Error::TypeBox { .. })));
        assert!(matches!(
            arena.finish(id, |builder| backend.finish_type(builder, vec![])),
            Err(Error::TypeBox { .. })
        ));
        assert!(matches!(
            arena.attach(id, backend.begin_type("Unit")),
            Err(Error::TypeBox { .. })
        ));
        Ok(())
    }
}
