#[macro_export]
macro_rules! rb_parse_expr {
    ($($tt:tt)*) => {{
        let tokens: proc_macro2::TokenStream = quote::quote!($($tt)*);
        $crate::parser::RustParser::new().parse_expr_tokens(tokens)?
    }};
}
#[macro_export]
macro_rules! rb_parse_items {
    ($($tt:tt)*) => {{
        let file: syn::File = syn::parse_quote!($($tt)*);
        $crate::parser::RustParser::new().parse_items(file.items)?
    }};
}
