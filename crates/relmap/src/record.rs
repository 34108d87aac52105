//! Record <-> column map conversion.
//!
//! Maps are keyed by column name and never contain multi-valued relations,
//! which have no column on the owning table.

use std::any::Any;
use std::collections::{BTreeMap, HashSet};

use crate::error::{OrmError, OrmResult};
use crate::schema::{EntityDescriptor, FieldDescriptor};
use crate::value::Value;

/// Which columns an operation touches.
///
/// Names are looked up field name first, then column name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ColumnSelection {
    #[default]
    All,
    Include(Vec<String>),
    Exclude(Vec<String>),
}

impl ColumnSelection {
    /// A leading `"-"` turns the remaining names into an exclusion list.
    ///
    /// ```ignore
    /// assert_eq!(ColumnSelection::parse(&["-", "Password"]),
    ///            ColumnSelection::Exclude(vec!["Password".into()]));
    /// ```
    pub fn parse<S: AsRef<str>>(names: &[S]) -> Self {
        match names.split_first() {
            None => Self::All,
            Some((first, rest)) if first.as_ref() == "-" => {
                Self::Exclude(rest.iter().map(|s| s.as_ref().to_string()).collect())
            }
            Some(_) => Self::Include(names.iter().map(|s| s.as_ref().to_string()).collect()),
        }
    }

    pub fn include<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Self::Include(names.into_iter().map(Into::into).collect())
    }

    pub fn exclude<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Self::Exclude(names.into_iter().map(Into::into).collect())
    }

    /// Validate the names against `desc`.
    pub(crate) fn filter<'d>(&self, desc: &'d EntityDescriptor) -> OrmResult<ColumnFilter<'d>> {
        let (names, exclude) = match self {
            Self::All => return Ok(ColumnFilter::default()),
            Self::Include(names) => (names, false),
            Self::Exclude(names) => (names, true),
        };

        let mut fields = HashSet::with_capacity(names.len());
        for name in names {
            let field = desc.find_field(name).ok_or_else(|| {
                OrmError::not_found(format!("column {}.{name}", desc.name()))
            })?;
            if field.is_many() {
                return Err(OrmError::statement(
                    "columns",
                    format!("{} is a multi-valued relation", field.full_name()),
                ));
            }
            fields.insert(field.name());
        }
        Ok(ColumnFilter { fields, exclude })
    }
}

/// A validated [`ColumnSelection`]. Empty admits every column.
#[derive(Debug, Default)]
pub(crate) struct ColumnFilter<'d> {
    fields: HashSet<&'d str>,
    exclude: bool,
}

impl ColumnFilter<'_> {
    pub(crate) fn admits(&self, field: &FieldDescriptor) -> bool {
        self.fields.is_empty() || self.fields.contains(field.name()) != self.exclude
    }
}

/// Column values of `record`, filtered by `selection`.
pub fn to_map(
    desc: &EntityDescriptor,
    record: &dyn Any,
    selection: &ColumnSelection,
) -> OrmResult<BTreeMap<String, Value>> {
    let filter = selection.filter(desc)?;
    desc.columns()
        .filter(|field| filter.admits(field))
        .map(|field| Ok((field.column().to_string(), field.get_value(record)?)))
        .collect()
}

/// Write every column present in `map` into `record`.
///
/// Values go through [`FieldDescriptor::scan`], so database values of a
/// compatible kind are accepted. Keys that are not columns are ignored.
pub fn apply_map(
    desc: &EntityDescriptor,
    record: &mut dyn Any,
    map: &BTreeMap<String, Value>,
) -> OrmResult<()> {
    for field in desc.columns() {
        if let Some(value) = map.get(field.column()) {
            field.scan(record, value.clone())?;
        }
    }
    Ok(())
}
