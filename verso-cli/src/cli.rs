//! CLI argument definitions using clap.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Verso - apply versioned database change logs exactly once
#[derive(Parser, Debug, Default)]
#[command(name = "verso")]
#[command(version)]
#[command(about = "Verso - apply versioned database change logs exactly once", long_about = None)]
pub struct Cli {
    /// Path to the change log file (.toml or .json)
    #[arg(short, long, env = "VERSO_CHANGELOG")]
    pub changelog: Option<PathBuf>,

    /// Type of the target database
    #[arg(long, env = "VERSO_DB_TYPE")]
    pub db_type: Option<DbType>,

    /// Database host
    #[arg(long, env = "VERSO_HOST")]
    pub host: Option<String>,

    /// Database port
    #[arg(long, env = "VERSO_PORT")]
    pub port: Option<u16>,

    /// Comma-separated host:port replica list (takes precedence over host and port)
    #[arg(long, env = "VERSO_REPLICAS")]
    pub replicas: Option<String>,

    /// Database name
    #[arg(short, long, env = "VERSO_DATABASE")]
    pub database: Option<String>,

    /// User name
    #[arg(short, long, env = "VERSO_USERNAME")]
    pub username: Option<String>,

    /// Password
    #[arg(short, long, env = "VERSO_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Connect over TLS
    #[arg(long, env = "VERSO_ENABLE_SSL")]
    pub enable_ssl: bool,

    /// Refresh stored checksums of modified changesets instead of failing
    #[arg(long, env = "VERSO_UPDATE_CHECKSUMS")]
    pub update_checksums: bool,

    /// Path to the configuration file [default: ./verso.toml, if present]
    #[arg(long, env = "VERSO_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Do not print the banner
    #[arg(long)]
    pub no_banner: bool,
}

/// Supported database types
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DbType {
    /// MongoDB
    #[default]
    Mongo,
    /// Empty in-memory store, for dry runs
    Memory,
}

impl std::fmt::Display for DbType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DbType::Mongo => write!(f, "mongo"),
            DbType::Memory => write!(f, "memory"),
        }
    }
}

impl std::str::FromStr for DbType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <DbType as ValueEnum>::from_str(s, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_flags() {
        let cli = Cli::try_parse_from([
            "verso",
            "--changelog",
            "log.toml",
            "--db-type",
            "memory",
            "--port",
            "27018",
            "--enable-ssl",
        ])
        .unwrap();
        assert_eq!(cli.changelog, Some(PathBuf::from("log.toml")));
        assert_eq!(cli.db_type, Some(DbType::Memory));
        assert_eq!(cli.port, Some(27018));
        assert!(cli.enable_ssl);
        assert!(!cli.update_checksums);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_invalid_db_type() {
        assert!(Cli::try_parse_from(["verso", "--db-type", "oracle"]).is_err());
    }

    #[test]
    fn test_db_type_from_str() {
        assert_eq!("MONGO".parse::<DbType>(), Ok(DbType::Mongo));
        assert!("cassandra".parse::<DbType>().is_err());
    }
}
