//! Lowering configuration.
//!
//! ```toml
//! backend = "rpc"
//! dialect = "postgres"
//! fallback_backend = "sql"
//! log_hook = true
//!
//! [services]
//! Customers = "CustomerService"
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{LowerError, LowerResult};
use crate::transpiler::Dialect;

/// Execution strategy for DML statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Direct `database/sql` calls.
    #[default]
    Sql,
    /// gRPC client calls.
    Rpc,
    /// Calls on an injected in-memory store.
    Mock,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BackendKind::Sql => "sql",
            BackendKind::Rpc => "rpc",
            BackendKind::Mock => "mock",
        })
    }
}

impl FromStr for BackendKind {
    type Err = LowerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sql" | "db" => Ok(BackendKind::Sql),
            "rpc" | "grpc" => Ok(BackendKind::Rpc),
            "mock" => Ok(BackendKind::Mock),
            other => Err(LowerError::InvalidConfig(format!(
                "unknown backend '{}' (expected sql, rpc or mock)",
                other
            ))),
        }
    }
}

/// A Go import with the package name generated code refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSpec {
    pub alias: String,
    pub path: String,
}

impl ImportSpec {
    pub fn new(alias: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            path: path.into(),
        }
    }

    /// Import line, aliased only when the alias differs from the last path
    /// segment.
    pub fn import_line(&self) -> String {
        let last = self.path.rsplit('/').next().unwrap_or(&self.path);
        if last == self.alias {
            format!("{:?}", self.path)
        } else {
            format!("{} {:?}", self.alias, self.path)
        }
    }
}

/// Main lowering configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LowerConfig {
    /// Primary backend for DML.
    pub backend: BackendKind,

    /// SQL dialect for rendered query text.
    pub dialect: Dialect,

    /// Backend forced for temporary tables and table variables.
    pub fallback_backend: BackendKind,

    /// Emit `log/slog` calls at entry, for PRINT and in CATCH blocks.
    pub log_hook: bool,

    /// Go package clause of generated files.
    pub package: String,

    /// Generated protobuf package.
    pub rpc_package: ImportSpec,

    /// In-memory store package.
    pub mock_package: ImportSpec,

    /// Runtime helper package (`tsqlrt`).
    pub runtime_import: String,

    /// Table → service name overrides.
    pub services: BTreeMap<String, String>,

    /// Table → client variable overrides.
    pub clients: BTreeMap<String, String>,

    /// Service that serves EXEC calls on the RPC backend.
    pub exec_service: String,
}

impl Default for LowerConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Sql,
            dialect: Dialect::Postgres,
            fallback_backend: BackendKind::Sql,
            log_hook: false,
            package: "procedures".to_string(),
            rpc_package: ImportSpec::new("pb", "example.com/app/gen/pb"),
            mock_package: ImportSpec::new("mockstore", "example.com/app/internal/mockstore"),
            runtime_import: "example.com/app/internal/tsqlrt".to_string(),
            services: BTreeMap::new(),
            clients: BTreeMap::new(),
            exec_service: "ProcedureService".to_string(),
        }
    }
}

impl LowerConfig {
    /// Create a new configuration builder
    pub fn builder() -> LowerConfigBuilder {
        LowerConfigBuilder::default()
    }

    pub fn from_toml_str(input: &str) -> LowerResult<Self> {
        let config: LowerConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> LowerResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        tracing::debug!("Loaded config from {}", path.display());
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> LowerResult<()> {
        if self.fallback_backend == BackendKind::Rpc {
            return Err(LowerError::InvalidConfig(
                "fallback_backend cannot be rpc: temporary tables have no remote identity"
                    .to_string(),
            ));
        }
        if !is_go_identifier(&self.package) {
            return Err(LowerError::InvalidConfig(format!(
                "package '{}' is not a Go identifier",
                self.package
            )));
        }
        for spec in [&self.rpc_package, &self.mock_package] {
            if !is_go_identifier(&spec.alias) || spec.path.is_empty() {
                return Err(LowerError::InvalidConfig(format!(
                    "invalid import {} {:?}",
                    spec.alias, spec.path
                )));
            }
        }
        if let Some((table, client)) = self.clients.iter().find(|(_, c)| !is_go_identifier(c)) {
            return Err(LowerError::InvalidConfig(format!(
                "client '{}' for table '{}' is not a Go identifier",
                client, table
            )));
        }
        Ok(())
    }

    /// Runtime package import line.
    pub fn runtime_import_line(&self) -> String {
        ImportSpec::new("tsqlrt", self.runtime_import.clone()).import_line()
    }

    pub fn service_override(&self, table: &str) -> Option<&str> {
        lookup_folded(&self.services, table)
    }

    pub fn client_override(&self, table: &str) -> Option<&str> {
        lookup_folded(&self.clients, table)
    }
}

/// Case-insensitive lookup on the bare table name.
fn lookup_folded<'a>(map: &'a BTreeMap<String, String>, table: &str) -> Option<&'a str> {
    let bare = table.rsplit('.').next().unwrap_or(table);
    let bare = bare.trim_start_matches('[').trim_end_matches(']');
    map.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(bare) || k.eq_ignore_ascii_case(table))
        .map(|(_, v)| v.as_str())
}

fn is_go_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Builder for LowerConfig
#[derive(Debug, Default)]
pub struct LowerConfigBuilder {
    config: LowerConfig,
}

impl LowerConfigBuilder {
    pub fn backend(mut self, backend: BackendKind) -> Self {
        self.config.backend = backend;
        self
    }

    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.config.dialect = dialect;
        self
    }

    pub fn fallback(mut self, backend: BackendKind) -> Self {
        self.config.fallback_backend = backend;
        self
    }

    pub fn log_hook(mut self, enabled: bool) -> Self {
        self.config.log_hook = enabled;
        self
    }

    pub fn package(mut self, name: impl Into<String>) -> Self {
        self.config.package = name.into();
        self
    }

    pub fn rpc_package(mut self, alias: impl Into<String>, path: impl Into<String>) -> Self {
        self.config.rpc_package = ImportSpec::new(alias, path);
        self
    }

    pub fn mock_package(mut self, alias: impl Into<String>, path: impl Into<String>) -> Self {
        self.config.mock_package = ImportSpec::new(alias, path);
        self
    }

    pub fn runtime_import(mut self, path: impl Into<String>) -> Self {
        self.config.runtime_import = path.into();
        self
    }

    /// Route a table to a named service.
    pub fn service(mut self, table: impl Into<String>, service: impl Into<String>) -> Self {
        self.config.services.insert(table.into(), service.into());
        self
    }

    pub fn client(mut self, table: impl Into<String>, client: impl Into<String>) -> Self {
        self.config.clients.insert(table.into(), client.into());
        self
    }

    pub fn exec_service(mut self, service: impl Into<String>) -> Self {
        self.config.exec_service = service.into();
        self
    }

    /// Build the configuration
    pub fn build(self) -> LowerConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_toml() {
        let config = LowerConfig::from_toml_str(
            r#"
            backend = "rpc"
            dialect = "mysql"
            fallback_backend = "mock"
            log_hook = true

            [services]
            Customers = "AccountService"

            [clients]
            Customers = "accounts"
            "#,
        )
        .unwrap();
        assert_eq!(config.backend, BackendKind::Rpc);
        assert_eq!(config.dialect, Dialect::MySql);
        assert_eq!(config.fallback_backend, BackendKind::Mock);
        assert!(config.log_hook);
        assert_eq!(config.service_override("dbo.customers"), Some("AccountService"));
        assert_eq!(config.client_override("[Customers]"), Some("accounts"));
        assert_eq!(config.package, "procedures");
    }

    #[test]
    fn test_rejects_rpc_fallback() {
        let err = LowerConfig::from_toml_str("fallback_backend = \"rpc\"").unwrap_err();
        assert!(matches!(err, LowerError::InvalidConfig(_)));
    }

    #[test]
    fn test_rejects_unknown_keys() {
        assert!(matches!(
            LowerConfig::from_toml_str("backnd = \"sql\""),
            Err(LowerError::Toml(_))
        ));
    }

    #[test]
    fn test_builder() {
        let config = LowerConfig::builder()
            .backend(BackendKind::Mock)
            .dialect(Dialect::Sqlite)
            .package("billing")
            .build();
        assert_eq!(config.backend, BackendKind::Mock);
        assert_eq!(config.dialect, Dialect::Sqlite);
        assert_eq!(config.package, "billing");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_import_lines() {
        assert_eq!(
            ImportSpec::new("pb", "example.com/app/gen/pb").import_line(),
            "\"example.com/app/gen/pb\""
        );
        assert_eq!(
            ImportSpec::new("orderpb", "example.com/app/gen/orders/v1").import_line(),
            "orderpb \"example.com/app/gen/orders/v1\""
        );
    }
}
