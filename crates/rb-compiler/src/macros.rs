//! Type macros: code generators run on a data declaration once its field
//! list is known. Their output is loaded in the following round, after the
//! declared type is finished.

use rb_core::ast::{DataDecl, Expr, FunDef, FunParam, ModuleStmt};
use rb_core::error::Error;
use rb_core::native::NativeFn;
use rb_core::value::{RecordField, RecordTypeRef, Ty, Value};
use rb_core::Result;

pub const DEFAULT_TYPE_MACRO: &str = "struct";

pub trait TypeMacro: Send + Sync {
    fn name(&self) -> &str;

    /// Statements generated for `decl`. `ty` is still open when this runs.
    fn expand(&self, decl: &DataDecl, ty: &RecordTypeRef, fields: &[RecordField])
        -> Result<Vec<ModuleStmt>>;
}

/// The default macro: one accessor per field plus a `make<Name>` constructor.
#[derive(Debug, Default, Clone, Copy)]
pub struct RecordMacro;

impl TypeMacro for RecordMacro {
    fn name(&self) -> &str {
        DEFAULT_TYPE_MACRO
    }

    fn expand(
        &self,
        decl: &DataDecl,
        ty: &RecordTypeRef,
        fields: &[RecordField],
    ) -> Result<Vec<ModuleStmt>> {
        let record = Ty::Record(ty.clone());
        let mut stmts = Vec::with_capacity(fields.len() + 1);
        for (index, field) in fields.iter().enumerate() {
            let getter = NativeFn::new(
                format!("{}.{}", decl.name, field.name),
                vec![record.clone()],
                field.ty.clone(),
                move |args| match args.first() {
                    Some(Value::Record(value)) => value.get(index).cloned(),
                    other => Err(Error::Generic(format!(
                        "field accessor applied to {:?}",
                        other
                    ))),
                },
            );
            let fundef = FunDef {
                location: Default::default(),
                params: vec![FunParam::positional("self", Some(type_expr(&record)))],
                body: Expr::native_call(getter, vec![Expr::name("self")]),
            };
            stmts.push(ModuleStmt::fun(field.name.clone(), fundef));
        }

        let constructor_ty = ty.clone();
        let constructor = NativeFn::new(
            format!("make{}", decl.name),
            fields.iter().map(|field| field.ty.clone()).collect(),
            record,
            move |args| constructor_ty.construct(args),
        );
        let fundef = FunDef {
            location: Default::default(),
            params: fields
                .iter()
                .map(|field| FunParam::positional(field.name.clone(), Some(type_expr(&field.ty))))
                .collect(),
            body: Expr::native_call(
                constructor,
                fields.iter().map(|field| Expr::name(field.name.clone())).collect(),
            ),
        };
        stmts.push(ModuleStmt::fun(format!("make{}", decl.name), fundef));
        Ok(stmts)
    }
}

fn type_expr(ty: &Ty) -> Expr {
    Expr::native(Value::Type(ty.clone()))
}
