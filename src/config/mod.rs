//! Configuration loading for the Docbox tenancy core.
//!
//! Loads layered `.env` files and environment variables prefixed with
//! `DOCBOX_`, producing a typed [`AppConfig`].

use std::{collections::BTreeMap, env, path::PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Placeholder every boundary locator template must contain.
pub const TENANT_ID_PLACEHOLDER: &str = "{tenant_id}";

/// Database engine behind the configured URL. Determines which isolation
/// strategy a deployment uses: schema isolation on Postgres, one database
/// file per tenant on SQLite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseEngine {
    Postgres,
    Sqlite,
}

impl DatabaseEngine {
    pub fn from_url(url: &str) -> Result<Self, ConfigError> {
        let scheme = url.split(':').next().unwrap_or_default();
        match scheme {
            "postgres" | "postgresql" => Ok(DatabaseEngine::Postgres),
            "sqlite" => Ok(DatabaseEngine::Sqlite),
            _ => Err(ConfigError::UnsupportedDatabaseUrl {
                url: url.to_string(),
            }),
        }
    }
}

/// Application configuration derived from `DOCBOX_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct AppConfig {
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_db_acquire_timeout_ms")]
    pub db_acquire_timeout_ms: u64,
    /// Base directory for file-based boundaries and the registry file.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Schema name template for schema-isolated tenants.
    #[serde(default = "default_schema_template")]
    pub schema_template: String,
    /// File path template (relative to `data_dir`) for file-isolated tenants.
    #[serde(default = "default_db_file_template")]
    pub db_file_template: String,
    /// Fixed schema name holding the registry on Postgres deployments.
    #[serde(default = "default_registry_schema")]
    pub registry_schema: String,
    /// Fixed file name (relative to `data_dir`) holding the registry on
    /// SQLite deployments.
    #[serde(default = "default_registry_db_file")]
    pub registry_db_file: String,
}

impl AppConfig {
    /// Engine implied by the configured database URL.
    pub fn database_engine(&self) -> Result<DatabaseEngine, ConfigError> {
        DatabaseEngine::from_url(&self.database_url)
    }

    /// Absolute-ish path of the registry database file (SQLite deployments).
    pub fn registry_db_file_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(&self.registry_db_file)
    }

    /// Path of a tenant's database file rendered from the configured
    /// template (SQLite deployments).
    pub fn tenant_db_file_path(&self, tenant_id: &str) -> PathBuf {
        let rendered = self.db_file_template.replace(TENANT_ID_PLACEHOLDER, tenant_id);
        PathBuf::from(&self.data_dir).join(rendered)
    }

    /// Schema name for a tenant rendered from the configured template
    /// (Postgres deployments).
    pub fn tenant_schema_name(&self, tenant_id: &str) -> String {
        self.schema_template.replace(TENANT_ID_PLACEHOLDER, tenant_id)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.schema_template.contains(TENANT_ID_PLACEHOLDER) {
            return Err(ConfigError::MissingTenantIdPlaceholder {
                field: "DOCBOX_SCHEMA_TEMPLATE",
                template: self.schema_template.clone(),
            });
        }
        if !self.db_file_template.contains(TENANT_ID_PLACEHOLDER) {
            return Err(ConfigError::MissingTenantIdPlaceholder {
                field: "DOCBOX_DB_FILE_TEMPLATE",
                template: self.db_file_template.clone(),
            });
        }
        self.database_engine()?;
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            database_url: default_database_url(),
            db_max_connections: default_db_max_connections(),
            db_acquire_timeout_ms: default_db_acquire_timeout_ms(),
            data_dir: default_data_dir(),
            schema_template: default_schema_template(),
            db_file_template: default_db_file_template(),
            registry_schema: default_registry_schema(),
            registry_db_file: default_registry_db_file(),
        }
    }
}

fn default_profile() -> String {
    "local".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_database_url() -> String {
    "sqlite://./data/docbox.db".to_string()
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_acquire_timeout_ms() -> u64 {
    5000
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_schema_template() -> String {
    "tenant_{tenant_id}".to_string()
}

fn default_db_file_template() -> String {
    "tenants/{tenant_id}.db".to_string()
}

fn default_registry_schema() -> String {
    "docbox_registry".to_string()
}

fn default_registry_db_file() -> String {
    "registry.db".to_string()
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load environment file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        source: dotenvy::Error,
    },
    #[error("{field} template '{template}' does not contain the {{tenant_id}} placeholder")]
    MissingTenantIdPlaceholder {
        field: &'static str,
        template: String,
    },
    #[error("unsupported database url '{url}'; expected a postgres:// or sqlite:// url")]
    UnsupportedDatabaseUrl { url: String },
}

/// Layered configuration loader.
///
/// Merge order (later wins): `.env`, `.env.local`, `.env.<profile>`,
/// `.env.<profile>.local`, then the process environment.
pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    /// Creates a new loader rooted at the current working directory.
    pub fn new() -> Self {
        Self {
            base_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Creates a loader rooted at the provided directory (useful for tests).
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Loads and validates the configuration.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let (mut layered, profile_hint) = self.collect_layered_env()?;

        // Overlay process environment last so it wins.
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix("DOCBOX_") {
                layered.insert(stripped.to_string(), value);
            }
        }

        let take = |layered: &mut BTreeMap<String, String>, key: &str| {
            layered.remove(key).filter(|v| !v.is_empty())
        };

        let profile = take(&mut layered, "PROFILE").unwrap_or(profile_hint);
        let config = AppConfig {
            profile,
            log_level: take(&mut layered, "LOG_LEVEL").unwrap_or_else(default_log_level),
            log_format: take(&mut layered, "LOG_FORMAT").unwrap_or_else(default_log_format),
            database_url: take(&mut layered, "DATABASE_URL").unwrap_or_else(default_database_url),
            db_max_connections: take(&mut layered, "DB_MAX_CONNECTIONS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_db_max_connections),
            db_acquire_timeout_ms: take(&mut layered, "DB_ACQUIRE_TIMEOUT_MS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_db_acquire_timeout_ms),
            data_dir: take(&mut layered, "DATA_DIR").unwrap_or_else(default_data_dir),
            schema_template: take(&mut layered, "SCHEMA_TEMPLATE")
                .unwrap_or_else(default_schema_template),
            db_file_template: take(&mut layered, "DB_FILE_TEMPLATE")
                .unwrap_or_else(default_db_file_template),
            registry_schema: take(&mut layered, "REGISTRY_SCHEMA")
                .unwrap_or_else(default_registry_schema),
            registry_db_file: take(&mut layered, "REGISTRY_DB_FILE")
                .unwrap_or_else(default_registry_db_file),
        };

        config.validate()?;
        Ok(config)
    }

    fn collect_layered_env(&self) -> Result<(BTreeMap<String, String>, String), ConfigError> {
        let mut values = BTreeMap::new();

        self.merge_dotenv(self.base_dir.join(".env"), &mut values)?;
        self.merge_dotenv(self.base_dir.join(".env.local"), &mut values)?;

        let profile = env::var("DOCBOX_PROFILE")
            .ok()
            .or_else(|| values.get("PROFILE").cloned())
            .unwrap_or_else(default_profile);

        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}", &profile)),
            &mut values,
        )?;
        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}.local", &profile)),
            &mut values,
        )?;

        Ok((values, profile))
    }

    fn merge_dotenv(
        &self,
        path: PathBuf,
        values: &mut BTreeMap<String, String>,
    ) -> Result<(), ConfigError> {
        if !path.exists() {
            return Ok(());
        }

        for item in dotenvy::from_path_iter(&path).map_err(|source| ConfigError::EnvFile {
            path: path.clone(),
            source,
        })? {
            let (key, value) = item.map_err(|source| ConfigError::EnvFile {
                path: path.clone(),
                source,
            })?;
            if let Some(stripped) = key.strip_prefix("DOCBOX_") {
                values.insert(stripped.to_string(), value);
            }
        }

        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn defaults_target_a_local_sqlite_deployment() {
        let config = AppConfig::default();
        assert_eq!(config.profile, "local");
        assert_eq!(config.database_engine().unwrap(), DatabaseEngine::Sqlite);
        assert_eq!(config.registry_db_file_path(), PathBuf::from("./data/registry.db"));
    }

    #[test]
    fn engine_detection_covers_both_supported_schemes() {
        assert_eq!(
            DatabaseEngine::from_url("postgresql://u:p@localhost:5432/docbox").unwrap(),
            DatabaseEngine::Postgres
        );
        assert_eq!(
            DatabaseEngine::from_url("postgres://localhost/docbox").unwrap(),
            DatabaseEngine::Postgres
        );
        assert_eq!(
            DatabaseEngine::from_url("sqlite://./data/docbox.db").unwrap(),
            DatabaseEngine::Sqlite
        );
        assert!(DatabaseEngine::from_url("mysql://localhost/docbox").is_err());
    }

    #[test]
    fn templates_render_the_tenant_id() {
        let config = AppConfig::default();
        assert_eq!(config.tenant_schema_name("acme-01"), "tenant_acme-01");
        assert_eq!(
            config.tenant_db_file_path("acme-01"),
            PathBuf::from("./data/tenants/acme-01.db")
        );
    }

    #[test]
    fn template_without_placeholder_is_rejected() {
        let config = AppConfig {
            schema_template: "tenant_static".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingTenantIdPlaceholder { field, .. })
                if field == "DOCBOX_SCHEMA_TEMPLATE"
        ));
    }

    #[test]
    fn layered_env_files_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(".env"),
            "DOCBOX_DATA_DIR=/var/lib/docbox\nDOCBOX_DB_MAX_CONNECTIONS=4\n",
        )
        .unwrap();
        fs::write(dir.path().join(".env.local"), "DOCBOX_DB_MAX_CONNECTIONS=7\n").unwrap();

        let config = ConfigLoader::with_base_dir(dir.path().to_path_buf())
            .load()
            .unwrap();
        assert_eq!(config.data_dir, "/var/lib/docbox");
        assert_eq!(config.db_max_connections, 7);
    }
}
