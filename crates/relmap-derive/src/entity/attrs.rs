//! Attribute parsing for the Entity derive macro.
//!
//! Handles struct-level and field-level `#[orm(...)]` attributes.

use syn::{LitStr, Result};

/// Struct-level options.
#[derive(Default)]
pub(super) struct EntityAttr {
    pub table: Option<String>,
    pub name: Option<String>,
}

impl EntityAttr {
    pub(super) fn parse(attrs: &[syn::Attribute]) -> Result<Self> {
        let mut out = Self::default();
        for attr in attrs.iter().filter(|a| a.path().is_ident("orm")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("table") {
                    out.table = Some(meta.value()?.parse::<LitStr>()?.value());
                } else if meta.path.is_ident("name") {
                    out.name = Some(meta.value()?.parse::<LitStr>()?.value());
                } else {
                    return Err(meta.error("expected `table` or `name`"));
                }
                Ok(())
            })?;
        }
        Ok(out)
    }
}

/// Relation kind named on a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum RelationAttr {
    OneToOne,
    ManyToOne,
    OneToMany,
    ManyToMany,
}

impl RelationAttr {
    pub(super) fn is_many(self) -> bool {
        matches!(self, Self::OneToMany | Self::ManyToMany)
    }
}

/// `through(Entity, left = "field", right = "field")`
pub(super) struct ThroughAttr {
    pub entity: syn::Path,
    pub left: LitStr,
    pub right: LitStr,
}

/// Field-level options.
#[derive(Default)]
pub(super) struct FieldAttr {
    pub column: Option<LitStr>,
    pub tag: Option<LitStr>,
    pub markers: Vec<&'static str>,
    pub relation: Option<RelationAttr>,
    pub through: Option<ThroughAttr>,
    pub getter: Option<syn::Path>,
    pub setter: Option<syn::Path>,
    pub skip: bool,
}

impl FieldAttr {
    pub(super) fn parse(field: &syn::Field) -> Result<Self> {
        let mut out = Self::default();
        for attr in field.attrs.iter().filter(|a| a.path().is_ident("orm")) {
            attr.parse_nested_meta(|meta| {
                let Some(ident) = meta.path.get_ident() else {
                    return Err(meta.error("expected identifier"));
                };
                match ident.to_string().as_str() {
                    "column" => out.column = Some(meta.value()?.parse()?),
                    "tag" => out.tag = Some(meta.value()?.parse()?),
                    "getter" => out.getter = Some(meta.value()?.parse()?),
                    "setter" => out.setter = Some(meta.value()?.parse()?),
                    "skip" => out.skip = true,
                    "primary_key" => out.markers.push("primary_key"),
                    "auto_increment" => out.markers.push("auto_increment"),
                    "created_at" => out.markers.push("created_at"),
                    "updated_at" => out.markers.push("updated_at"),
                    "one_to_one" => out.set_relation(&meta, RelationAttr::OneToOne)?,
                    "many_to_one" => out.set_relation(&meta, RelationAttr::ManyToOne)?,
                    "one_to_many" => out.set_relation(&meta, RelationAttr::OneToMany)?,
                    "many_to_many" => out.set_relation(&meta, RelationAttr::ManyToMany)?,
                    "through" => out.through = Some(parse_through(&meta)?),
                    _ => return Err(meta.error("unknown orm field attribute")),
                }
                Ok(())
            })?;
        }
        Ok(out)
    }

    fn set_relation(
        &mut self,
        meta: &syn::meta::ParseNestedMeta<'_>,
        relation: RelationAttr,
    ) -> Result<()> {
        if self.relation.replace(relation).is_some() {
            return Err(meta.error("field already has a relation kind"));
        }
        Ok(())
    }
}

fn parse_through(meta: &syn::meta::ParseNestedMeta<'_>) -> Result<ThroughAttr> {
    let mut entity = None;
    let mut left = None;
    let mut right = None;
    meta.parse_nested_meta(|inner| {
        if inner.path.is_ident("left") {
            left = Some(inner.value()?.parse::<LitStr>()?);
        } else if inner.path.is_ident("right") {
            right = Some(inner.value()?.parse::<LitStr>()?);
        } else if entity.is_none() {
            entity = Some(inner.path.clone());
        } else {
            return Err(inner.error("expected `left` or `right`"));
        }
        Ok(())
    })?;

    match (entity, left, right) {
        (Some(entity), Some(left), Some(right)) => Ok(ThroughAttr {
            entity,
            left,
            right,
        }),
        _ => Err(meta.error("expected through(Entity, left = \"..\", right = \"..\")")),
    }
}
