use super::RustParser;
use itertools::Itertools;
use quote::ToTokens;
use rb_core::ast::{
    DataDecl, Expr, ExprKind, FunDef, FunParam, ImplicitVar, ModuleStmt, RecordDef,
    RecordFieldDef,
};
use rb_core::rb_bail;
use rb_core::Result;
use syn::spanned::Spanned;

fn has_attr(attrs: &[syn::Attribute], name: &str) -> bool {
    attrs.iter().any(|attr| attr.path().is_ident(name))
}

fn find_attr<'a>(attrs: &'a [syn::Attribute], name: &str) -> Option<&'a syn::Attribute> {
    attrs.iter().find(|attr| attr.path().is_ident(name))
}

fn attr_names(attrs: &[syn::Attribute]) -> Vec<String> {
    attrs
        .iter()
        .map(|attr| attr.path().to_token_stream().to_string())
        .collect()
}

fn parse_use_tree(tree: syn::UseTree) -> Result<Vec<String>> {
    Ok(match tree {
        syn::UseTree::Name(name) => vec![name.ident.to_string()],
        syn::UseTree::Path(path) => {
            let mut segments = vec![path.ident.to_string()];
            segments.extend(parse_use_tree(*path.tree)?);
            segments
        }
        other => rb_bail!("Use tree not supported: {}", other.to_token_stream()),
    })
}

impl RustParser {
    pub fn parse_item(&self, item: syn::Item) -> Result<ModuleStmt> {
        let location = self.location(item.span());
        let stmt = match item {
            syn::Item::Fn(f) => {
                let (name, fundef) = self.parse_fn(f)?;
                ModuleStmt::fun(name, fundef)
            }
            syn::Item::Const(c) => ModuleStmt::let_(
                c.ident.to_string(),
                self.parse_type(*c.ty)?,
                self.parse_expr(*c.expr)?,
            ),
            syn::Item::Static(s) => ModuleStmt::let_(
                s.ident.to_string(),
                self.parse_type(*s.ty)?,
                self.parse_expr(*s.expr)?,
            ),
            syn::Item::Struct(s) => ModuleStmt::data(self.parse_struct(s)?),
            syn::Item::Use(u) => ModuleStmt::import(parse_use_tree(u.tree)?.join("::")),
            other => rb_bail!("Item not supported: {}", other.to_token_stream()),
        };
        Ok(stmt.at(location))
    }

    /// Parameters may carry `#[named]` and `#[default(expr)]`.
    pub(crate) fn parse_fn(&self, f: syn::ItemFn) -> Result<(String, FunDef)> {
        let name = f.sig.ident.to_string();
        if !matches!(f.sig.output, syn::ReturnType::Default) {
            rb_bail!("Return types are not supported: fn {}", name);
        }
        if !f.sig.generics.params.is_empty() {
            rb_bail!("Generic functions are not supported: fn {}", name);
        }
        let mut params = vec![];
        for input in f.sig.inputs {
            let syn::FnArg::Typed(typed) = input else {
                rb_bail!("`self` receivers are not supported: fn {}", name);
            };
            let named = has_attr(&typed.attrs, "named");
            let default = match find_attr(&typed.attrs, "default") {
                Some(attr) => Some(self.parse_expr(attr.parse_args::<syn::Expr>().map_err(
                    |e| eyre::eyre!("bad default of fn {}: {}", name, e),
                )?)?),
                None => None,
            };
            let (param, ty) = self.parse_binding(syn::Pat::Type(typed))?;
            params.push(FunParam {
                name: param,
                ty,
                default,
                named,
            });
        }
        let location = self.location(f.block.span());
        let body = self.parse_block(*f.block)?;
        Ok((
            name,
            FunDef {
                location,
                params,
                body,
            },
        ))
    }

    /// Generic parameters make the declaration a type-level function.
    /// `#[type_macro(name)]` picks the macro run on the declared type.
    fn parse_struct(&self, s: syn::ItemStruct) -> Result<DataDecl> {
        let name = s.ident.to_string();
        let params: Option<Vec<ImplicitVar>> = if s.generics.params.is_empty() {
            None
        } else {
            Some(
                s.generics
                    .params
                    .iter()
                    .map(|param| match param {
                        syn::GenericParam::Type(ty) => Ok(ImplicitVar {
                            name: ty.ident.to_string(),
                            ty: Some(Expr::name("Type")),
                        }),
                        other => rb_bail!("Generic parameter not supported: {}", other.to_token_stream()),
                    })
                    .try_collect()?,
            )
        };
        let macro_name = match find_attr(&s.attrs, "type_macro") {
            Some(attr) => Some(
                attr.parse_args::<syn::Ident>()
                    .map_err(|e| eyre::eyre!("bad type_macro of {}: {}", name, e))?
                    .to_string(),
            ),
            None => None,
        };
        let fields: Vec<RecordFieldDef> = match s.fields {
            syn::Fields::Named(fields) => fields
                .named
                .into_iter()
                .map(|field| {
                    let Some(ident) = field.ident else {
                        rb_bail!("Unnamed field in {}", name);
                    };
                    let Some(ty) = self.parse_type(field.ty)? else {
                        rb_bail!("Field {}.{} needs a type", name, ident);
                    };
                    Ok(RecordFieldDef {
                        name: ident.to_string(),
                        ty,
                        attributes: attr_names(&field.attrs),
                    })
                })
                .try_collect()?,
            syn::Fields::Unit => vec![],
            syn::Fields::Unnamed(_) => rb_bail!("Tuple structs are not supported: {}", name),
        };
        let attributes = attr_names(&s.attrs)
            .into_iter()
            .filter(|attr| attr != "type_macro")
            .collect();
        Ok(DataDecl {
            name,
            params,
            body: Expr::new(ExprKind::Record(RecordDef { fields, attributes })),
            macro_name,
        })
    }
}
