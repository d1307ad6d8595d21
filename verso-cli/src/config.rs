//! CLI configuration handling.
//!
//! Settings come from three layers, highest precedence first: command line
//! flags (or their `VERSO_*` environment variables), `verso.toml`, and
//! built-in defaults.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use verso_core::ConnectionArgs;

use crate::cli::{Cli, DbType};
use crate::error::{CliError, CliResult};

/// Default config file name (looked up in the working directory)
pub const CONFIG_FILE_NAME: &str = "verso.toml";

/// Contents of `verso.toml`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Path to the change log, relative to the config file
    pub changelog: Option<PathBuf>,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Refresh stored checksums of modified changesets
    pub update_checksums: bool,

    /// Directory holding the config file
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

/// Database configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Database type (mongo, memory)
    pub db_type: Option<String>,

    /// Server host
    pub host: Option<String>,

    /// Server port
    pub port: Option<u16>,

    /// Comma-separated host:port replica list
    pub replicas: Option<String>,

    /// Database name
    pub database: Option<String>,

    /// User name
    pub username: Option<String>,

    /// Password
    pub password: Option<String>,

    /// Connect over TLS
    pub enable_ssl: bool,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CliError::Config(format!("Failed to read '{}': {}", path.display(), e))
        })?;
        let mut config: Config = toml::from_str(&content)?;
        config.base_dir = path.parent().map(Path::to_path_buf);
        Ok(config)
    }

    /// Load the explicitly given file, or `./verso.toml` if it exists.
    pub fn discover(explicit: Option<&Path>) -> CliResult<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None => {
                let path = Path::new(CONFIG_FILE_NAME);
                if path.is_file() {
                    Self::load(path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// The change log path, resolved against the config file's directory.
    pub fn changelog_path(&self) -> Option<PathBuf> {
        let path = self.changelog.as_ref()?;
        match &self.base_dir {
            Some(base) if path.is_relative() => Some(base.join(path)),
            _ => Some(path.clone()),
        }
    }
}

/// Fully merged settings for one run
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Target database type
    pub db_type: DbType,

    /// Change log file
    pub changelog: PathBuf,

    /// Connection arguments handed to the versioner
    pub connection: ConnectionArgs,

    /// Refresh stored checksums of modified changesets
    pub update_checksums: bool,
}

impl Settings {
    /// Merge command line arguments over a loaded configuration.
    pub fn resolve(cli: &Cli, config: &Config) -> CliResult<Self> {
        let db_type = match (cli.db_type, config.database.db_type.as_deref()) {
            (Some(db_type), _) => db_type,
            (None, Some(name)) => name.parse::<DbType>().map_err(|_| {
                CliError::Config(format!(
                    "Unknown db_type '{}', expected one of: mongo, memory",
                    name
                ))
            })?,
            (None, None) => DbType::default(),
        };

        let changelog = cli
            .changelog
            .clone()
            .or_else(|| config.changelog_path())
            .ok_or_else(|| {
                CliError::Config(
                    "No change log given. Use --changelog or set `changelog` in verso.toml"
                        .to_string(),
                )
            })?;

        let db = &config.database;
        let connection = ConnectionArgs {
            host: cli.host.clone().or_else(|| db.host.clone()),
            port: cli.port.or(db.port),
            replicas: cli.replicas.clone().or_else(|| db.replicas.clone()),
            database: cli.database.clone().or_else(|| db.database.clone()),
            username: cli.username.clone().or_else(|| db.username.clone()),
            password: cli.password.clone().or_else(|| db.password.clone()),
            enable_ssl: cli.enable_ssl || db.enable_ssl,
        };

        Ok(Self {
            db_type,
            changelog,
            connection,
            update_checksums: cli.update_checksums || config.update_checksums,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_config() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"
changelog = "db/changelog.toml"

[database]
db_type = "mongo"
host = "db.local"
port = 27018
database = "app"
"#,
        );

        let config = Config::load(&path).unwrap();
        assert_eq!(config.database.host.as_deref(), Some("db.local"));
        assert_eq!(config.database.port, Some(27018));
        assert_eq!(
            config.changelog_path(),
            Some(dir.path().join("db/changelog.toml"))
        );
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "[database]\nhots = \"typo\"\n");
        assert!(matches!(Config::load(&path), Err(CliError::Config(_))));
    }

    #[test]
    fn test_missing_explicit_config() {
        let err = Config::discover(Some(Path::new("/nonexistent/verso.toml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }

    #[test]
    fn test_cli_overrides_config() {
        let config = Config {
            changelog: Some(PathBuf::from("from-config.toml")),
            database: DatabaseConfig {
                db_type: Some("memory".to_string()),
                host: Some("config-host".to_string()),
                port: Some(1000),
                database: Some("config-db".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let cli = Cli {
            host: Some("cli-host".to_string()),
            changelog: Some(PathBuf::from("from-cli.toml")),
            ..Default::default()
        };

        let settings = Settings::resolve(&cli, &config).unwrap();
        assert_eq!(settings.db_type, DbType::Memory);
        assert_eq!(settings.changelog, PathBuf::from("from-cli.toml"));
        assert_eq!(settings.connection.host.as_deref(), Some("cli-host"));
        assert_eq!(settings.connection.port, Some(1000));
        assert_eq!(settings.connection.database.as_deref(), Some("config-db"));
        assert!(!settings.update_checksums);
    }

    #[test]
    fn test_defaults() {
        let cli = Cli {
            changelog: Some(PathBuf::from("log.toml")),
            ..Default::default()
        };
        let settings = Settings::resolve(&cli, &Config::default()).unwrap();
        assert_eq!(settings.db_type, DbType::Mongo);
        assert_eq!(settings.connection, ConnectionArgs::default());
    }

    #[test]
    fn test_changelog_required() {
        let err = Settings::resolve(&Cli::default(), &Config::default()).unwrap_err();
        assert!(err.to_string().contains("No change log given"));
    }

    #[test]
    fn test_invalid_db_type_in_config() {
        let config = Config {
            changelog: Some(PathBuf::from("log.toml")),
            database: DatabaseConfig {
                db_type: Some("oracle".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let err = Settings::resolve(&Cli::default(), &config).unwrap_err();
        assert!(err.to_string().contains("Unknown db_type 'oracle'"));
    }
}
