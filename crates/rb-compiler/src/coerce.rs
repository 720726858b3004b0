//! Type coercion. The engine only knows identity and subtyping; a
//! user-defined coercion graph searched by shortest path would slot in here.

use crate::compiler::FunctionCompiler;
use crate::staged::StagedValue;
use rb_core::ast::Location;
use rb_core::error::Error;
use rb_core::ir::{Ir, RaiseKind, TypeRelation};
use rb_core::value::{Ty, Value};
use rb_core::Result;

pub const EXACT_COST: i64 = 0;
/// Charged when a value is accepted as one of its supertypes.
pub const SUBTYPE_COST: i64 = 1;
pub const FAILURE_COST: i64 = -1;

/// Outcome of `coerce`: whether it succeeds, at what cost, and the value
/// retyped as the target.
#[derive(Debug, Clone)]
pub struct Coercion {
    pub success: StagedValue,
    pub cost: StagedValue,
    pub value: StagedValue,
}

impl Coercion {
    fn fixed(success: bool, cost: i64, value: StagedValue) -> Self {
        Self {
            success: StagedValue::immediate(Value::Bool(success)),
            cost: StagedValue::immediate(Value::Int(cost)),
            value,
        }
    }
}

/// Whether values of a type can have a runtime type strictly below it.
fn has_proper_subtypes(ty: &Ty) -> bool {
    match ty {
        Ty::Any | Ty::List(_) => true,
        Ty::Tuple(items) => items.iter().any(has_proper_subtypes),
        _ => false,
    }
}

/// Cost of accepting a value of runtime type `actual` as `target`.
pub fn coercion_cost(actual: &Ty, target: &Ty) -> Option<i64> {
    if actual == target {
        Some(EXACT_COST)
    } else if actual.is_subtype_of(target) {
        Some(SUBTYPE_COST)
    } else {
        None
    }
}

impl FunctionCompiler {
    /// Coerces `value` to `target`. Dynamic values whose static type does not
    /// decide the outcome are tested at run time; `instrs` receives the spill
    /// that makes such a value safe to read twice.
    pub fn coerce(&mut self, value: StagedValue, target: &Ty, instrs: &mut Vec<Ir>) -> Coercion {
        if let Some(immediate) = value.as_immediate() {
            return match coercion_cost(&immediate.runtime_ty(), target) {
                Some(cost) => Coercion::fixed(true, cost, value.with_ty(target.clone())),
                None => Coercion::fixed(false, FAILURE_COST, value),
            };
        }

        let declared = value.ty.clone();
        if declared.is_subtype_of(target) {
            // runtime type <= declared <= target
            if &declared != target || target == &Ty::Any {
                return Coercion::fixed(true, SUBTYPE_COST, value.with_ty(target.clone()));
            }
            if !has_proper_subtypes(target) {
                return Coercion::fixed(true, EXACT_COST, value);
            }
            let value = self.materialize(value, instrs);
            let cost = exact_or_subtype_cost(&value, target);
            return Coercion {
                success: StagedValue::immediate(Value::Bool(true)),
                cost,
                value,
            };
        }
        if !has_proper_subtypes(&declared) {
            return Coercion::fixed(false, FAILURE_COST, value);
        }

        let value = self.materialize(value, instrs);
        let success = StagedValue::dynamic(
            Ir::TypeTest {
                value: value.to_ir().into(),
                target: target.clone(),
                relation: TypeRelation::Subtype,
            },
            Ty::Bool,
        );
        Coercion {
            success,
            cost: exact_or_subtype_cost(&value, target),
            value: value.with_ty(target.clone()),
        }
    }

    /// Coerces or fails: at compile time when the outcome is already known,
    /// otherwise through a runtime check appended to `instrs`.
    pub fn coerce_or_throw(
        &mut self,
        value: StagedValue,
        target: &Ty,
        location: &Location,
        instrs: &mut Vec<Ir>,
    ) -> Result<StagedValue> {
        let coercion = self.coerce(value, target, instrs);
        match coercion.success.as_bool() {
            Some(true) => Ok(coercion.value.with_ty(target.clone())),
            Some(false) => Err(Error::BadCoercion {
                value: match coercion.value.as_immediate() {
                    Some(value) => value.to_string(),
                    None => format!("value of type {}", coercion.value.ty),
                },
                target: target.to_string(),
                location: location.clone(),
            }),
            None => {
                instrs.push(Ir::when(
                    Ir::Not(coercion.success.into_ir().into()),
                    Ir::Raise {
                        kind: RaiseKind::BadCoercion {
                            target: target.clone(),
                            location: location.clone(),
                        },
                        operands: vec![coercion.value.to_ir()],
                    },
                ));
                Ok(coercion.value.with_ty(target.clone()))
            }
        }
    }
}

fn exact_or_subtype_cost(value: &StagedValue, target: &Ty) -> StagedValue {
    StagedValue::dynamic(
        Ir::if_(
            Ir::TypeTest {
                value: value.to_ir().into(),
                target: target.clone(),
                relation: TypeRelation::Exact,
            },
            Ir::int(EXACT_COST),
            Ir::int(SUBTYPE_COST),
        ),
        Ty::Int,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CompileContext;
    use pretty_assertions::assert_eq;

    fn compiler() -> FunctionCompiler {
        FunctionCompiler::new(CompileContext::with_tree_backend(), "coerce")
    }

    #[test]
    fn equal_immediates_coerce_for_free() {
        let mut compiler = compiler();
        let mut instrs = vec![];
        for value in [Value::Int(3), Value::from("x"), Value::Tuple(vec![Value::Bool(true)])] {
            let ty = value.runtime_ty();
            let coercion = compiler.coerce(StagedValue::immediate(value), &ty, &mut instrs);
            assert_eq!(coercion.success.as_bool(), Some(true));
            assert_eq!(coercion.cost.as_immediate(), Some(&Value::Int(EXACT_COST)));
        }
        assert!(instrs.is_empty());
    }

    #[test]
    fn supertypes_cost_more_than_exact_types() {
        let mut compiler = compiler();
        let mut instrs = vec![];
        let coercion = compiler.coerce(StagedValue::immediate(Value::Int(1)), &Ty::Any, &mut instrs);
        assert_eq!(coercion.cost.as_immediate(), Some(&Value::Int(SUBTYPE_COST)));
        assert_eq!(coercion.value.ty, Ty::Any);

        let coercion = compiler.coerce(StagedValue::immediate(Value::Int(1)), &Ty::String, &mut instrs);
        assert_eq!(coercion.success.as_bool(), Some(false));
    }

    #[test]
    fn unknown_runtime_types_are_tested_at_run_time() {
        let mut compiler = compiler();
        let mut instrs = vec![];
        let input = StagedValue::dynamic(Ir::Input, Ty::Any);
        let coercion = compiler.coerce(input, &Ty::Int, &mut instrs);
        assert!(coercion.success.as_bool().is_none());
        assert_eq!(coercion.value.ty, Ty::Int);

        let any = StagedValue::dynamic(Ir::Input, Ty::Any);
        let coercion = compiler.coerce(any, &Ty::Any, &mut instrs);
        assert_eq!(coercion.cost.as_immediate(), Some(&Value::Int(SUBTYPE_COST)));

        let int = StagedValue::dynamic(Ir::Input, Ty::Int);
        let coercion = compiler.coerce(int, &Ty::String, &mut instrs);
        assert_eq!(coercion.success.as_bool(), Some(false));
    }

    #[test]
    fn coerce_or_throw_reports_location() {
        let mut compiler = compiler();
        let mut instrs = vec![];
        let location = Location {
            filename: "m.rb".into(),
            start_line: 3,
            start_column: 5,
            end_line: 3,
            end_column: 9,
        };
        let err = compiler
            .coerce_or_throw(StagedValue::immediate(Value::Int(1)), &Ty::Bool, &location, &mut instrs)
            .unwrap_err();
        assert_eq!(
            err,
            Error::BadCoercion {
                value: "1".into(),
                target: "Bool".into(),
                location,
            }
        );
    }
}
