//! Mapper configuration.
//!
//! ```toml
//! dialect = "postgres"
//! naming = "snake_case"
//! table_prefix = "app_"
//! ```

use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use crate::dialect::{Dialect, DialectKind};
use crate::error::{OrmError, OrmResult};
use crate::schema::{DefaultNaming, NamingStrategy, Resolver, SnakeCaseNaming};

/// Built-in naming strategies selectable from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingKind {
    /// [`DefaultNaming`]: names taken verbatim from the domain
    #[default]
    Identity,
    /// [`SnakeCaseNaming`]
    SnakeCase,
}

/// Dialect and naming choices for one mapper.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MapperConfig {
    /// SQL dialect (default `mysql`).
    pub dialect: DialectKind,
    /// Naming strategy (default `identity`).
    pub naming: NamingKind,
    /// Prefix for table names derived from type names.
    pub table_prefix: Option<String>,
}

impl MapperConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document.
    pub fn from_toml_str(text: &str) -> OrmResult<Self> {
        toml::from_str(text).map_err(|e| OrmError::Config(e.to_string()))
    }

    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> OrmResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| OrmError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn with_dialect(mut self, dialect: DialectKind) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn with_naming(mut self, naming: NamingKind) -> Self {
        self.naming = naming;
        self
    }

    pub fn with_table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = Some(prefix.into());
        self
    }

    /// The configured built-in dialect.
    pub fn dialect(&self) -> &'static dyn Dialect {
        self.dialect.dialect()
    }

    /// The configured naming strategy.
    pub fn naming_strategy(&self) -> Arc<dyn NamingStrategy> {
        let prefix = self.table_prefix.clone();
        match (self.naming, prefix) {
            (NamingKind::Identity, None) => Arc::new(DefaultNaming::new()),
            (NamingKind::Identity, Some(p)) => Arc::new(DefaultNaming::new().with_table_prefix(p)),
            (NamingKind::SnakeCase, None) => Arc::new(SnakeCaseNaming::new()),
            (NamingKind::SnakeCase, Some(p)) => {
                Arc::new(SnakeCaseNaming::new().with_table_prefix(p))
            }
        }
    }

    /// A resolver with its own cache using the configured naming strategy.
    pub fn resolver(&self) -> Resolver {
        Resolver::with_shared_naming(self.naming_strategy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnContext, Entity, EntityDef};

    #[test]
    fn defaults() {
        let config = MapperConfig::from_toml_str("").unwrap();
        assert_eq!(config, MapperConfig::default());
        assert_eq!(config.dialect().name(), "mysql");
        assert_eq!(config.naming, NamingKind::Identity);
    }

    #[test]
    fn parses_every_key() {
        let config = MapperConfig::from_toml_str(
            r#"
            dialect = "postgres"
            naming = "snake_case"
            table_prefix = "app_"
            "#,
        )
        .unwrap();
        assert_eq!(
            config,
            MapperConfig::new()
                .with_dialect(DialectKind::Postgres)
                .with_naming(NamingKind::SnakeCase)
                .with_table_prefix("app_")
        );
        assert_eq!(config.dialect().name(), "postgres");
    }

    #[test]
    fn rejects_bad_documents() {
        assert!(matches!(
            MapperConfig::from_toml_str(r#"dialect = "oracle""#),
            Err(OrmError::Config(_))
        ));
        assert!(matches!(
            MapperConfig::from_toml_str(r#"pool_size = 4"#),
            Err(OrmError::Config(_))
        ));
        assert!(matches!(
            MapperConfig::load("/nonexistent/relmap.toml"),
            Err(OrmError::Config(_))
        ));
    }

    #[test]
    fn resolver_uses_configured_naming() {
        #[derive(Debug, Default)]
        struct UserAccount {
            id: i64,
        }

        impl Entity for UserAccount {
            fn describe(def: &mut EntityDef<Self>) {
                def.field("Id", |u| &u.id, |u| &mut u.id);
            }
        }

        let resolver = MapperConfig::new()
            .with_naming(NamingKind::SnakeCase)
            .with_table_prefix("app_")
            .resolver();
        let desc = resolver.resolve::<UserAccount>().unwrap();
        assert_eq!(desc.table(), "app_user_account");

        let ctx = ColumnContext {
            field: "LastLogin",
            entity: "UserAccount",
            table: "app_user_account",
            relation: None,
        };
        assert_eq!(resolver.naming().column_name(&ctx), "last_login");
    }
}
