mod expr;
mod item;
pub mod macros;

use eyre::eyre;
use proc_macro2::{Span, TokenStream};
use rb_core::ast::{Expr, Location, ModuleFrontend, ModuleStmt};
use rb_core::Result;

/// Parses Rust syntax with `syn` and lowers it to compiler trees. Spans are
/// turned into locations only when a file name is known.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RustParser {
    filename: String,
}

impl RustParser {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_filename(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
        }
    }

    pub(crate) fn location(&self, span: Span) -> Location {
        if self.filename.is_empty() {
            return Location::unknown();
        }
        let start = span.start();
        let end = span.end();
        Location {
            filename: self.filename.clone(),
            start_line: start.line as u32,
            start_column: start.column as u32 + 1,
            end_line: end.line as u32,
            end_column: end.column as u32 + 1,
        }
    }

    pub fn parse_expr_tokens(&self, tokens: TokenStream) -> Result<Expr> {
        let expr: syn::Expr = syn::parse2(tokens).map_err(|e| eyre!(e.to_string()))?;
        self.parse_expr(expr)
    }

    pub fn parse_expr_str(&self, code: &str) -> Result<Expr> {
        let expr: syn::Expr = syn::parse_str(code).map_err(|e| eyre!(e.to_string()))?;
        self.parse_expr(expr)
    }

    pub fn parse_items(&self, items: Vec<syn::Item>) -> Result<Vec<ModuleStmt>> {
        items.into_iter().map(|item| self.parse_item(item)).collect()
    }

    pub fn parse_file_str(&self, code: &str) -> Result<Vec<ModuleStmt>> {
        let file: syn::File = syn::parse_str(code).map_err(|e| eyre!(e.to_string()))?;
        self.parse_items(file.items)
    }
}

impl ModuleFrontend for RustParser {
    fn parse_module(&self, path: &str, text: &str) -> Result<Vec<ModuleStmt>> {
        rb_core::debug!("parsing {}", path);
        RustParser::with_filename(path).parse_file_str(text)
    }
}
