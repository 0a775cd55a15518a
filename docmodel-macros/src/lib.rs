//! Procedural macros for the docmodel project.
//!
//! # `Tagged`
//!
//! Derives `docmodel::mapper::Tagged`, generating the field descriptors the structural mapper
//! reads at runtime. Each field lists the key it publishes under per tag namespace:
//!
//! ```rust,ignore
//! use docmodel::Tagged;
//!
//! #[derive(Tagged)]
//! pub struct User {
//!     #[tag(bson = "name", json = "name,omitempty")]
//!     pub name: String,
//!     #[tag(bson = "-", json = "-")]
//!     pub password: String,
//!     #[tag(nested, bson = "contact", json = "contact")]
//!     pub contact: Contact,
//! }
//! ```
//!
//! - Any `namespace = "key"` pair declares a key; the namespace name is free-form.
//! - `"-"` and `""` skip the field in that namespace.
//! - `nested` maps the field through its own `Tagged` implementation.
//! - Fields without a `#[tag]` attribute are never mapped.

#[allow(unused_extern_crates)]
extern crate self as docmodel_macros;

mod tagged;

use proc_macro::TokenStream;
use syn::{Data, DeriveInput, parse_macro_input};

use crate::tagged::generate_tagged_for_struct;

/// Derives the `Tagged` trait for a struct with named fields.
///
/// # Errors
///
/// Returns a compile error if applied to an enum, a union or a tuple struct, or if a
/// `#[tag]` attribute is malformed.
///
/// Tagged fields whose type involves a type parameter get a `Serialize` bound, or a
/// `Tagged` bound when marked `nested`.
#[proc_macro_derive(Tagged, attributes(tag))]
pub fn derive_tagged(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);

    match expand(ast) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(ast: DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    match ast.data {
        Data::Struct(ref data) => generate_tagged_for_struct(&ast, data),
        Data::Enum(_) => Err(syn::Error::new_spanned(
            &ast,
            "Cannot derive Tagged for enums. Only structs with named fields are supported.",
        )),
        Data::Union(_) => Err(syn::Error::new_spanned(
            &ast,
            "Cannot derive Tagged for unions. Only structs with named fields are supported.",
        )),
    }
}
