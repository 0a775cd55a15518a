use proc_macro2::{TokenStream, TokenTree};
use quote::{ToTokens, quote};
use syn::{DataStruct, DeriveInput, Field, Fields, Ident, LitStr, Result, Type, WherePredicate, parse_quote};

/// Tags declared on one field through `#[tag(...)]`.
struct FieldTags {
    nested: bool,
    tags: Vec<(String, String)>,
}

fn parse_field_tags(field: &Field) -> Result<Option<FieldTags>> {
    let mut parsed: Option<FieldTags> = None;

    for attr in field.attrs.iter().filter(|attr| attr.path().is_ident("tag")) {
        let entry = parsed.get_or_insert_with(|| FieldTags { nested: false, tags: Vec::new() });

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("nested") {
                entry.nested = true;
                return Ok(());
            }

            let namespace = meta
                .path
                .get_ident()
                .map(ToString::to_string)
                .ok_or_else(|| meta.error("expected a tag namespace such as `bson`"))?;
            if entry.tags.iter().any(|(ns, _)| *ns == namespace) {
                return Err(meta.error(format!("duplicate tag for namespace `{namespace}`")));
            }

            let value: LitStr = meta.value()?.parse()?;
            entry.tags.push((namespace, value.value()));
            Ok(())
        })?;
    }

    Ok(parsed)
}

fn mentions_any(tokens: TokenStream, params: &[&Ident]) -> bool {
    tokens.into_iter().any(|tree| match tree {
        TokenTree::Ident(ident) => params.contains(&&ident),
        TokenTree::Group(group) => mentions_any(group.stream(), params),
        _ => false,
    })
}

/// Bound a tagged field needs when its type involves one of the struct's type parameters.
fn field_bound(ty: &Type, nested: bool, params: &[&Ident]) -> Option<WherePredicate> {
    if !mentions_any(ty.to_token_stream(), params) {
        return None;
    }
    Some(if nested {
        parse_quote! { #ty: ::docmodel::mapper::Tagged }
    } else {
        parse_quote! { #ty: ::docmodel::mapper::Serialize }
    })
}

pub(crate) fn generate_tagged_for_struct(ast: &DeriveInput, data: &DataStruct) -> Result<TokenStream> {
    let fields = match &data.fields {
        Fields::Named(fields) => &fields.named,
        _ => {
            return Err(syn::Error::new_spanned(
                ast,
                format!(
                    "Cannot derive Tagged for '{}': only structs with named fields are supported",
                    ast.ident
                ),
            ));
        }
    };

    let type_params: Vec<&Ident> = ast.generics.type_params().map(|param| &param.ident).collect();
    let mut bounds = Vec::new();
    let mut inserts = Vec::with_capacity(fields.len());
    for field in fields {
        let Some(FieldTags { nested, tags }) = parse_field_tags(field)? else {
            continue;
        };
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };

        bounds.extend(field_bound(&field.ty, nested, &type_params));

        let namespaces = tags.iter().map(|(namespace, _)| namespace);
        let values = tags.iter().map(|(_, value)| value);
        let value = if nested {
            quote! { ::docmodel::mapper::nested_value(&self.#ident, namespace) }
        } else {
            quote! { ::docmodel::mapper::tag_value(&self.#ident) }
        };

        inserts.push(quote! {
            ::docmodel::mapper::insert_tagged(
                &mut map,
                ::docmodel::mapper::tag_for(namespace, &[#((#namespaces, #values)),*]),
                || #value,
            );
        });
    }

    let name = &ast.ident;
    let mut generics = ast.generics.clone();
    if !bounds.is_empty() {
        generics.make_where_clause().predicates.extend(bounds);
    }
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::docmodel::mapper::Tagged for #name #ty_generics #where_clause {
            #[allow(unused_mut, unused_variables)]
            fn tag_map(&self, namespace: &str) -> ::docmodel::mapper::TagMap {
                let mut map = ::docmodel::mapper::TagMap::new();
                #(#inserts)*
                map
            }
        }
    })
}
