//! Rust front-end for the [stitch] shader code generator.
//!
//! The [`shader!`] macro takes regular Rust functions and turns each of them into a function of the same name and
//! visibility returning its `stitch::ast::FunctionDef`. Parameters typed `_` are left to be inferred per call site.
//!
//! ```ignore
//! stitch::shader! {
//!   pub fn lerp(a: _, b: _, t: f32) {
//!     a + (b - a) * t
//!   }
//! }
//!
//! let def = lerp();
//! ```
//!
//! The translation is purely syntactic: names are resolved when the definition is compiled, against the externals of
//! the helper function wrapping it. A handful of Rust forms map to shader constructs:
//!
//! - `let` binds a constant, `let mut` declares a variable; `let x: T = e` converts `e` to `T`.
//! - A trailing expression is returned.
//! - `for i in a..b` is a counting loop; `loop` loops forever.
//! - `x as T` and `1u32` are conversions.
//! - `Foo { a: 1 }` constructs the struct `Foo` from named fields.
//! - `a.f(b)` calls the `f` member of `a`, such as `std.max`.
//!
//! [stitch]: https://crates.io/crates/stitch

mod syntax;

use proc_macro::TokenStream;
use quote::ToTokens;
use syn::{
  parse::{Parse, ParseStream},
  parse_macro_input, ItemFn,
};

#[derive(Debug)]
struct TopLevel {
  fns: Vec<ItemFn>,
}

impl Parse for TopLevel {
  fn parse(input: ParseStream) -> syn::Result<Self> {
    let mut fns = Vec::new();

    while !input.is_empty() {
      let lookahead = input.lookahead1();

      if lookahead.peek(syn::Token![fn]) || lookahead.peek(syn::Token![pub]) || input.peek(syn::Token![#]) {
        fns.push(input.parse()?);
      } else {
        return Err(lookahead.error());
      }
    }

    Ok(TopLevel { fns })
  }
}

impl ToTokens for TopLevel {
  fn to_tokens(&self, tokens: &mut proc_macro2::TokenStream) {
    for item in &self.fns {
      match syntax::function(item) {
        Ok(translated) => translated.to_tokens(tokens),
        Err(err) => err.to_compile_error().to_tokens(tokens),
      }
    }
  }
}

#[proc_macro]
pub fn shader(tokens: TokenStream) -> TokenStream {
  let parsed = parse_macro_input!(tokens as TopLevel);
  parsed.to_token_stream().into()
}
