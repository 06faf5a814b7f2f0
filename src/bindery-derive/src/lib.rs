mod attrs;
mod impls;

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use syn::Result as SynResult;

/// Implements `Fragment` for the type of the annotated `impl` block.
///
/// The block must contain exactly one associated function marked
/// `#[inject]`, the constructor, and may contain `#[inject]` setters taking
/// `&mut self` and one parameter. Each parameter carries exactly one scope
/// attribute: `#[service]`, `#[structure]`, `#[this]`, `#[uses]`,
/// `#[invocation]`, `#[state]` (or `#[state("name")]`) or `#[concern_for]`.
///
/// `Option<T>` parameters are optional and `Vec<T>` parameters receive every
/// match. Service dependencies accept `#[optional]`, `#[tagged(...)]`,
/// `#[identified_by(...)]`, `#[active]`, `#[available]` and
/// `#[qualified(expr)]`.
///
/// `#[fragment(Output, post_fn)]` sets the constructed type and the function
/// converting the fragment to it.
#[proc_macro_attribute]
pub fn fragment(attr: TokenStream, item: TokenStream) -> TokenStream {
    match fragment_impl(attr, item) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.into_compile_error().into(),
    }
}

fn fragment_impl(attr: TokenStream, item: TokenStream) -> SynResult<TokenStream2> {
    let attr_data = attrs::parse_attributes(attr)?;
    let expanded = impls::expand_implementation(item, attr_data)?;
    Ok(expanded)
}
