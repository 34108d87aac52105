//! Type helper utilities for syn type analysis.

/// The single type argument of `Name<T>`, matched on the last path segment.
fn single_arg<'a>(ty: &'a syn::Type, name: &str) -> Option<&'a syn::Type> {
    let syn::Type::Path(type_path) = ty else {
        return None;
    };
    if type_path.qself.is_some() {
        return None;
    }
    let seg = type_path.path.segments.last()?;
    if seg.ident != name {
        return None;
    }
    let syn::PathArguments::AngleBracketed(args) = &seg.arguments else {
        return None;
    };
    if args.args.len() != 1 {
        return None;
    }
    let syn::GenericArgument::Type(inner) = args.args.first()? else {
        return None;
    };
    Some(inner)
}

/// Extract `T` from `Option<T>`.
///
/// Recognizes `Option<T>`, `std::option::Option<T>`, and `core::option::Option<T>`.
pub fn option_inner(ty: &syn::Type) -> Option<&syn::Type> {
    single_arg(ty, "Option")
}

/// Extract `T` from `Vec<T>`.
pub fn vec_inner(ty: &syn::Type) -> Option<&syn::Type> {
    single_arg(ty, "Vec")
}

/// Extract `T` from `Box<T>`.
pub fn box_inner(ty: &syn::Type) -> Option<&syn::Type> {
    single_arg(ty, "Box")
}

/// How a field type can back a relation.
#[derive(Debug, Clone, Copy)]
pub enum RelationSlot<'a> {
    /// `Option<Box<R>>`
    Boxed(&'a syn::Type),
    /// `Option<R>`
    Optional(&'a syn::Type),
    /// `Vec<R>`
    Many(&'a syn::Type),
}

impl<'a> RelationSlot<'a> {
    pub fn of(ty: &'a syn::Type) -> Option<Self> {
        if let Some(inner) = option_inner(ty) {
            return Some(match box_inner(inner) {
                Some(related) => Self::Boxed(related),
                None => Self::Optional(inner),
            });
        }
        vec_inner(ty).map(Self::Many)
    }

    pub fn related(self) -> &'a syn::Type {
        match self {
            Self::Boxed(ty) | Self::Optional(ty) | Self::Many(ty) => ty,
        }
    }
}

/// `Vec<u8>` maps to a bytes column, never a relation.
pub fn is_bytes(ty: &syn::Type) -> bool {
    matches!(vec_inner(ty), Some(syn::Type::Path(p)) if p.path.is_ident("u8"))
}
