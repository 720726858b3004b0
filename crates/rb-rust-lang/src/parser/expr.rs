use super::RustParser;
use eyre::eyre;
use quote::ToTokens;
use rb_core::ast::{BlockLet, BlockStmt, Expr, ExprKind, FunDef, FunParam, Literal};
use rb_core::rb_bail;
use rb_core::Result;
use std::sync::Arc;
use syn::spanned::Spanned;

/// Name of the method a binary operator dispatches to.
fn binary_method(op: &syn::BinOp) -> Option<&'static str> {
    Some(match op {
        syn::BinOp::Add(_) => "+",
        syn::BinOp::Sub(_) => "-",
        syn::BinOp::Mul(_) => "*",
        syn::BinOp::Div(_) => "/",
        syn::BinOp::Rem(_) => "%",
        syn::BinOp::Eq(_) => "==",
        syn::BinOp::Ne(_) => "!=",
        syn::BinOp::Lt(_) => "<",
        syn::BinOp::Le(_) => "<=",
        syn::BinOp::Gt(_) => ">",
        syn::BinOp::Ge(_) => ">=",
        syn::BinOp::BitAnd(_) => "&",
        syn::BinOp::BitOr(_) => "|",
        syn::BinOp::BitXor(_) => "^",
        syn::BinOp::Shl(_) => "<<",
        syn::BinOp::Shr(_) => ">>",
        _ => return None,
    })
}

impl RustParser {
    pub fn parse_expr(&self, expr: syn::Expr) -> Result<Expr> {
        let location = self.location(expr.span());
        let expr = match expr {
            syn::Expr::Binary(b) => self.parse_expr_binary(b)?,
            syn::Expr::Unary(u) => self.parse_expr_unary(u)?,
            syn::Expr::Lit(l) => Expr::literal(parse_literal(l.lit)?),
            syn::Expr::Path(p) => Expr::name(parse_name(&p.path)?),
            syn::Expr::Call(c) => self.parse_expr_call(c)?,
            syn::Expr::MethodCall(c) => self.parse_expr_method_call(c)?,
            syn::Expr::Field(f) => {
                let field = match f.member {
                    syn::Member::Named(name) => name.to_string(),
                    syn::Member::Unnamed(index) => {
                        rb_bail!("Positional field access not supported: .{}", index.index)
                    }
                };
                Expr::call(Expr::name(field), vec![self.parse_expr(*f.base)?])
            }
            syn::Expr::Block(b) if b.label.is_none() => self.parse_block(b.block)?,
            syn::Expr::If(i) => self.parse_expr_if(i)?,
            syn::Expr::Tuple(t) if t.elems.is_empty() => Expr::unit(),
            syn::Expr::Tuple(t) => Expr::new(ExprKind::Tuple(self.parse_exprs(t.elems)?)),
            syn::Expr::Array(a) => Expr::new(ExprKind::List(self.parse_exprs(a.elems)?)),
            syn::Expr::Paren(p) => return self.parse_expr(*p.expr),
            syn::Expr::Group(g) => return self.parse_expr(*g.expr),
            syn::Expr::Closure(c) => self.parse_expr_closure(c)?,
            other => rb_bail!("Expr not supported: {}", other.to_token_stream()),
        };
        Ok(expr.at(location))
    }

    fn parse_exprs(
        &self,
        exprs: impl IntoIterator<Item = syn::Expr>,
    ) -> Result<Vec<Expr>> {
        exprs.into_iter().map(|x| self.parse_expr(x)).collect()
    }

    fn parse_expr_binary(&self, b: syn::ExprBinary) -> Result<Expr> {
        let left = self.parse_expr(*b.left)?;
        let right = self.parse_expr(*b.right)?;
        Ok(match b.op {
            syn::BinOp::And(_) => Expr::if_(left, right, Expr::literal(false)),
            syn::BinOp::Or(_) => Expr::if_(left, Expr::literal(true), right),
            op => match binary_method(&op) {
                Some(method) => Expr::call(Expr::name(method), vec![left, right]),
                None => rb_bail!("Binary op not supported: {}", op.to_token_stream()),
            },
        })
    }

    fn parse_expr_unary(&self, u: syn::ExprUnary) -> Result<Expr> {
        let value = self.parse_expr(*u.expr)?;
        Ok(match u.op {
            syn::UnOp::Neg(_) => Expr::call(Expr::name("-"), vec![value]),
            syn::UnOp::Not(_) => Expr::if_(value, Expr::literal(false), Expr::literal(true)),
            op => rb_bail!("Unary op not supported: {}", op.to_token_stream()),
        })
    }

    /// `name = value` arguments are passed by name.
    fn parse_args(
        &self,
        args: impl IntoIterator<Item = syn::Expr>,
    ) -> Result<(Vec<Expr>, Vec<(String, Expr)>)> {
        let mut positional = vec![];
        let mut named = vec![];
        for arg in args {
            match arg {
                syn::Expr::Assign(assign) => {
                    let syn::Expr::Path(path) = *assign.left else {
                        rb_bail!("Named argument must be an identifier");
                    };
                    named.push((parse_name(&path.path)?, self.parse_expr(*assign.right)?));
                }
                arg => positional.push(self.parse_expr(arg)?),
            }
        }
        Ok((positional, named))
    }

    fn parse_expr_call(&self, c: syn::ExprCall) -> Result<Expr> {
        let func = self.parse_expr(*c.func)?;
        let (args, named) = self.parse_args(c.args)?;
        Ok(Expr::call_named(func, args, named))
    }

    /// `a.f(b)` calls `f(a, b)`.
    fn parse_expr_method_call(&self, c: syn::ExprMethodCall) -> Result<Expr> {
        if c.turbofish.is_some() {
            rb_bail!("Turbofish not supported: {}", c.to_token_stream());
        }
        let method = Expr::name(c.method.to_string()).at(self.location(c.method.span()));
        let receiver = self.parse_expr(*c.receiver)?;
        let (args, named) = self.parse_args(c.args)?;
        Ok(Expr::call_named(
            method,
            std::iter::once(receiver).chain(args).collect(),
            named,
        ))
    }

    fn parse_expr_if(&self, i: syn::ExprIf) -> Result<Expr> {
        let cond = self.parse_expr(*i.cond)?;
        let then = self.parse_block(i.then_branch)?;
        let else_ = match i.else_branch {
            Some((_, else_)) => self.parse_expr(*else_)?,
            None => Expr::unit(),
        };
        Ok(Expr::if_(cond, then, else_))
    }

    fn parse_expr_closure(&self, c: syn::ExprClosure) -> Result<Expr> {
        if !matches!(c.output, syn::ReturnType::Default) {
            rb_bail!("Closure return types are not supported");
        }
        let params = c
            .inputs
            .into_iter()
            .map(|pat| {
                let (name, ty) = self.parse_binding(pat)?;
                Ok(FunParam::positional(name, ty))
            })
            .collect::<Result<Vec<_>>>()?;
        let location = self.location(c.body.span());
        let body = self.parse_expr(*c.body)?;
        Ok(Expr::new(ExprKind::FunDef(Arc::new(FunDef {
            location,
            params,
            body,
        }))))
    }

    /// A binding pattern: an identifier, optionally with a type annotation.
    pub(crate) fn parse_binding(&self, pat: syn::Pat) -> Result<(String, Option<Expr>)> {
        match pat {
            syn::Pat::Ident(ident) => Ok((ident.ident.to_string(), None)),
            syn::Pat::Type(typed) => {
                let (name, _) = self.parse_binding(*typed.pat)?;
                Ok((name, self.parse_type(*typed.ty)?))
            }
            other => rb_bail!("Pattern not supported: {}", other.to_token_stream()),
        }
    }

    /// A type annotation as an expression evaluated at compile time. `_`
    /// leaves the binding untyped.
    pub(crate) fn parse_type(&self, ty: syn::Type) -> Result<Option<Expr>> {
        let location = self.location(ty.span());
        let expr = match ty {
            syn::Type::Infer(_) => return Ok(None),
            syn::Type::Tuple(t) if t.elems.is_empty() => Expr::name("Unit"),
            syn::Type::Paren(p) => return self.parse_type(*p.elem),
            syn::Type::Path(p) if p.qself.is_none() && p.path.segments.len() == 1 => {
                let Some(segment) = p.path.segments.into_iter().next() else {
                    rb_bail!("Empty type path");
                };
                let name = Expr::name(segment.ident.to_string()).at(location.clone());
                match segment.arguments {
                    syn::PathArguments::None => name,
                    syn::PathArguments::AngleBracketed(args) => {
                        let mut types = vec![];
                        for arg in args.args {
                            let syn::GenericArgument::Type(ty) = arg else {
                                rb_bail!("Type argument not supported: {}", arg.to_token_stream());
                            };
                            match self.parse_type(ty)? {
                                Some(ty) => types.push(ty),
                                None => rb_bail!("Type arguments must be given explicitly"),
                            }
                        }
                        Expr::call(name, types)
                    }
                    other => rb_bail!("Type arguments not supported: {}", other.to_token_stream()),
                }
            }
            other => rb_bail!("Type not supported: {}", other.to_token_stream()),
        };
        Ok(Some(expr.at(location)))
    }

    pub fn parse_block(&self, block: syn::Block) -> Result<Expr> {
        let location = self.location(block.span());
        let mut stmts = vec![];
        for stmt in block.stmts {
            stmts.push(self.parse_stmt(stmt)?);
        }
        Ok(Expr::block(stmts).at(location))
    }

    fn parse_stmt(&self, stmt: syn::Stmt) -> Result<BlockStmt> {
        Ok(match stmt {
            syn::Stmt::Local(local) => {
                let location = self.location(local.span());
                let (name, ty) = self.parse_binding(local.pat)?;
                let Some(init) = local.init else {
                    rb_bail!("`let {}` needs an initializer", name);
                };
                if init.diverge.is_some() {
                    rb_bail!("`let ... else` is not supported");
                }
                BlockStmt::Let(BlockLet {
                    location,
                    name,
                    ty,
                    value: self.parse_expr(*init.expr)?,
                })
            }
            syn::Stmt::Item(syn::Item::Fn(f)) => {
                let location = self.location(f.span());
                let (name, fundef) = self.parse_fn(f)?;
                BlockStmt::Let(BlockLet {
                    location,
                    name,
                    ty: None,
                    value: Expr::new(ExprKind::FunDef(Arc::new(fundef))),
                })
            }
            syn::Stmt::Expr(expr, _) => BlockStmt::Expr(self.parse_expr(expr)?),
            other => rb_bail!("Statement not supported: {}", other.to_token_stream()),
        })
    }
}

pub(crate) fn parse_name(path: &syn::Path) -> Result<String> {
    match path.get_ident() {
        Some(ident) => Ok(ident.to_string()),
        None => rb_bail!("Only plain names are supported: {}", path.to_token_stream()),
    }
}

pub(crate) fn parse_literal(lit: syn::Lit) -> Result<Literal> {
    Ok(match lit {
        syn::Lit::Int(i) => Literal::Int(i.base10_parse().map_err(|e| eyre!(e.to_string()))?),
        syn::Lit::Float(f) => Literal::Float(f.base10_parse().map_err(|e| eyre!(e.to_string()))?),
        syn::Lit::Str(s) => Literal::String(s.value()),
        syn::Lit::Bool(b) => Literal::Bool(b.value),
        other => rb_bail!("Lit not supported: {}", other.to_token_stream()),
    })
}
