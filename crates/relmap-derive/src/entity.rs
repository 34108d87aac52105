//! Entity derive macro implementation.

mod attrs;

use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Result};

use crate::common::syn_types::{RelationSlot, is_bytes};
use attrs::{EntityAttr, FieldAttr, RelationAttr};

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Entity can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "Entity can only be derived for structs",
            ));
        }
    };

    let entity_attr = EntityAttr::parse(&input.attrs)?;
    let mut registrations = Vec::with_capacity(fields.len() + 2);

    if let Some(table) = &entity_attr.table {
        registrations.push(quote! { def.table(#table); });
    }
    if let Some(entity_name) = &entity_attr.name {
        registrations.push(quote! { def.name(#entity_name); });
    }

    for field in fields {
        let attr = FieldAttr::parse(field)?;
        if attr.skip {
            continue;
        }
        registrations.push(field_registration(field, &attr)?);
    }

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    // Generic entities have no single type to register.
    let submit = if input.generics.params.is_empty() {
        let entity_name = entity_attr.name.unwrap_or_else(|| name.to_string());
        quote! {
            ::relmap::inventory::submit! {
                ::relmap::EntityRegistration {
                    name: #entity_name,
                    resolve: ::relmap::registry::resolve_entity::<#name>,
                }
            }
        }
    } else {
        quote! {}
    };

    Ok(quote! {
        impl #impl_generics ::relmap::Entity for #name #ty_generics #where_clause {
            fn describe(def: &mut ::relmap::EntityDef<Self>) {
                #(#registrations)*
            }
        }

        #submit
    })
}

fn field_registration(field: &syn::Field, attr: &FieldAttr) -> Result<TokenStream> {
    let Some(ident) = field.ident.as_ref() else {
        return Err(syn::Error::new_spanned(field, "expected a named field"));
    };
    let field_name = ident.to_string();
    let ty = &field.ty;
    let slot = if is_bytes(ty) {
        None
    } else {
        RelationSlot::of(ty)
    };

    let base = match (attr.relation, slot) {
        (Some(relation), Some(RelationSlot::Many(related))) if relation.is_many() => {
            let method = match relation {
                RelationAttr::OneToMany => quote!(one_to_many),
                _ => quote!(many_to_many),
            };
            quote! { def.#method::<#related>(#field_name) }
        }
        (Some(relation), Some(slot @ (RelationSlot::Boxed(_) | RelationSlot::Optional(_))))
            if !relation.is_many() =>
        {
            let related = slot.related();
            let method = match relation {
                RelationAttr::OneToOne => quote!(one_to_one),
                _ => quote!(many_to_one),
            };
            quote! { def.#method::<#related, _>(#field_name, |r| &r.#ident, |r| &mut r.#ident) }
        }
        (Some(relation), _) => {
            let expected = if relation.is_many() {
                "Vec<R>"
            } else {
                "Option<Box<R>> or Option<R>"
            };
            return Err(syn::Error::new_spanned(
                ty,
                format!("relation fields of this kind must have type {expected}"),
            ));
        }
        // A relation named only through `tag`.
        (None, Some(RelationSlot::Boxed(related))) => {
            if attr.tag.is_none() {
                return Err(syn::Error::new_spanned(
                    ty,
                    "Option<Box<R>> fields need one_to_one or many_to_one",
                ));
            }
            quote! { def.to_one::<#related, _>(#field_name, |r| &r.#ident, |r| &mut r.#ident) }
        }
        (None, Some(RelationSlot::Many(related))) if attr.tag.is_some() => {
            quote! { def.to_many::<#related>(#field_name) }
        }
        (None, _) => quote! { def.field(#field_name, |r| &r.#ident, |r| &mut r.#ident) },
    };

    let mut options = Vec::new();
    if let Some(column) = &attr.column {
        options.push(quote! { .column(#column) });
    }
    if let Some(tag) = &attr.tag {
        options.push(quote! { .tag(#tag) });
    }
    for marker in &attr.markers {
        options.push(quote! { .marker(#marker) });
    }
    if let Some(getter) = &attr.getter {
        options.push(quote! { .getter(#getter) });
    }
    if let Some(setter) = &attr.setter {
        options.push(quote! { .setter(#setter) });
    }
    if let Some(through) = &attr.through {
        let entity = &through.entity;
        let left = &through.left;
        let right = &through.right;
        options.push(quote! { .through::<#entity>(#left, #right) });
    }

    Ok(quote! { #base #(#options)*; })
}
