//! Error types for relmap

use std::fmt;

use thiserror::Error;

use crate::value::ValueKind;

/// Result type alias for relmap operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Error types for schema resolution, SQL compilation and value access.
///
/// Errors are `Clone` because expressions and statement builders store the
/// first construction error and hand it back from every expansion.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrmError {
    /// Malformed record-type declaration
    #[error("Schema error on {}: {kind}", location(.entity, .field))]
    Schema {
        entity: String,
        field: Option<String>,
        kind: SchemaErrorKind,
    },

    /// Malformed expression template
    #[error("Template error in '{template}': {kind}")]
    Template {
        template: String,
        kind: TemplateErrorKind,
    },

    /// Malformed statement shape
    #[error("Statement error ({statement}): {message}")]
    Statement {
        statement: &'static str,
        message: String,
    },

    /// Value does not fit the field's declared kind
    #[error("Conversion error on '{field}': {message}")]
    Conversion { field: String, message: String },

    /// Unknown field or column in a lookup
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration file error
    #[error("Config error: {0}")]
    Config(String),
}

fn location(entity: &str, field: &Option<String>) -> String {
    match field {
        Some(field) => format!("{entity}.{field}"),
        None => entity.to_string(),
    }
}

impl OrmError {
    /// Create a schema error for an entity.
    pub fn schema(entity: impl Into<String>, kind: SchemaErrorKind) -> Self {
        Self::Schema {
            entity: entity.into(),
            field: None,
            kind,
        }
    }

    /// Create a schema error for a field of an entity.
    pub fn schema_field(
        entity: impl Into<String>,
        field: impl Into<String>,
        kind: SchemaErrorKind,
    ) -> Self {
        Self::Schema {
            entity: entity.into(),
            field: Some(field.into()),
            kind,
        }
    }

    /// Create a template error
    pub fn template(template: impl Into<String>, kind: TemplateErrorKind) -> Self {
        Self::Template {
            template: template.into(),
            kind,
        }
    }

    /// Create a statement shape error
    pub fn statement(statement: &'static str, message: impl Into<String>) -> Self {
        Self::Statement {
            statement,
            message: message.into(),
        }
    }

    /// Create a conversion error for a field
    pub fn conversion(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conversion {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// The schema error kind, if this is a schema error.
    pub fn schema_kind(&self) -> Option<&SchemaErrorKind> {
        match self {
            Self::Schema { kind, .. } => Some(kind),
            _ => None,
        }
    }

    /// Check if this is a value conversion error
    pub fn is_conversion(&self) -> bool {
        matches!(self, Self::Conversion { .. })
    }
}

/// One variant per schema validation rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaErrorKind {
    /// The same domain field name was declared twice
    DuplicateField,
    /// More than one field is marked primary key
    MultiplePrimaryKeys,
    /// More than one field carries the given role marker
    MultipleRoles(&'static str),
    /// Primary key declared on a one-to-many or many-to-many field
    ManyRelationPrimaryKey,
    /// Getter or setter attached to a relation field
    RelationAdapter,
    /// Getter or setter attached to an auto-increment or timestamp field
    RoleAdapter,
    /// Getter output kind and setter input kind differ
    AdapterKindMismatch { getter: ValueKind, setter: ValueKind },
    /// Auto-increment on a field whose kind is not an integer
    AutoIncrementNotInteger(ValueKind),
    /// A field is marked both create and update timestamp
    TimestampConflict,
    /// Timestamp role on a field whose kind is not a timestamp
    TimestampNotTime(ValueKind),
    /// Two mapped fields resolve to the same column
    DuplicateColumn(String),
    /// A tag contains a marker nobody understands
    UnknownMarker(String),
    /// Two different relation kinds on one field
    MultipleRelations,
    /// Relation marker incompatible with how the field was declared
    RelationShape(String),
    /// Every field is skipped
    NoColumns,
    /// A relation needs a primary key that the entity does not have
    MissingPrimaryKey(String),
    /// A primary key that refers back to itself through to-one relations
    CyclicPrimaryKey,
    /// More than two pipe-delimited overrides on a many-to-many name
    MalformedName(String),
    /// Through entity has no such field
    ThroughFieldNotFound(String),
    /// Through fields do not reference the owning and related entities
    ThroughMismatch,
    /// Left and right junction columns resolve to the same name
    DuplicateJunctionColumn(String),
}

impl fmt::Display for SchemaErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateField => f.write_str("field declared twice"),
            Self::MultiplePrimaryKeys => f.write_str("more than one primary_key"),
            Self::MultipleRoles(role) => write!(f, "more than one {role}"),
            Self::ManyRelationPrimaryKey => {
                f.write_str("primary_key not allowed on a multi-valued relation")
            }
            Self::RelationAdapter => f.write_str("relation field cannot have a getter or setter"),
            Self::RoleAdapter => {
                f.write_str("auto_increment or timestamp field cannot have a getter or setter")
            }
            Self::AdapterKindMismatch { getter, setter } => {
                write!(f, "getter returns {getter} but setter takes {setter}")
            }
            Self::AutoIncrementNotInteger(kind) => {
                write!(f, "auto_increment needs an integer kind, found {kind}")
            }
            Self::TimestampConflict => f.write_str("auto_now_add and auto_now on the same field"),
            Self::TimestampNotTime(kind) => {
                write!(f, "auto_now/auto_now_add need a timestamp kind, found {kind}")
            }
            Self::DuplicateColumn(column) => write!(f, "duplicate column '{column}'"),
            Self::UnknownMarker(marker) => write!(f, "unknown marker '{marker}'"),
            Self::MultipleRelations => f.write_str("more than one relation marker"),
            Self::RelationShape(message) => f.write_str(message),
            Self::NoColumns => f.write_str("no mapped columns"),
            Self::MissingPrimaryKey(entity) => write!(f, "{entity} needs a primary_key"),
            Self::CyclicPrimaryKey => f.write_str("primary_key refers back to itself"),
            Self::MalformedName(name) => write!(f, "malformed many_to_many name '{name}'"),
            Self::ThroughFieldNotFound(field) => write!(f, "through field '{field}' not found"),
            Self::ThroughMismatch => f.write_str(
                "through mismatch: through fields must be many_to_one to the owning and related entities",
            ),
            Self::DuplicateJunctionColumn(column) => {
                write!(f, "duplicate junction column '{column}'")
            }
        }
    }
}

/// Deferred template parse errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateErrorKind {
    /// Template has no text at all
    Empty,
    /// A back quote opens an identifier that never closes
    UnmatchedQuote,
    /// Fewer arguments than markers
    NotEnoughArguments { markers: usize, arguments: usize },
    /// More arguments than markers
    TooManyArguments { markers: usize, arguments: usize },
}

impl fmt::Display for TemplateErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("empty expression"),
            Self::UnmatchedQuote => f.write_str("back quote not closed"),
            Self::NotEnoughArguments { markers, arguments } => {
                write!(f, "{markers} markers but only {arguments} arguments")
            }
            Self::TooManyArguments { markers, arguments } => {
                write!(f, "{markers} markers but {arguments} arguments")
            }
        }
    }
}
