//! MongoDB connection configuration.

use std::time::Duration;

use mongodb::options::{Acknowledgment, ClientOptions, Credential, Tls, TlsOptions, WriteConcern};
use regex_lite::Regex;
use verso_core::ConnectionArgs;

use crate::error::{MongoError, MongoResult};

/// Host used when neither a host nor replicas are given.
pub const DEFAULT_HOST: &str = "localhost";

/// Port used when no port is given.
pub const DEFAULT_PORT: u16 = 27017;

const HOST_PORT_PATTERN: &str = r"^([\w.\-]+):(\d+)$";

/// MongoDB connection configuration.
#[derive(Clone)]
pub struct MongoConfig {
    /// Servers as `(host, port)` pairs.
    pub hosts: Vec<(String, u16)>,
    /// Database name.
    pub database: String,
    /// User name.
    pub username: Option<String>,
    /// Password.
    pub password: Option<String>,
    /// Connect over TLS.
    pub tls: bool,
    /// Application name (shown in server logs).
    pub app_name: String,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Server selection timeout.
    pub server_selection_timeout: Duration,
}

impl std::fmt::Debug for MongoConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MongoConfig")
            .field("hosts", &self.hosts)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("tls", &self.tls)
            .field("app_name", &self.app_name)
            .finish()
    }
}

impl MongoConfig {
    /// Build a configuration from connection arguments.
    ///
    /// A replica list takes precedence over host and port.
    pub fn from_args(args: &ConnectionArgs) -> MongoResult<Self> {
        let database = args
            .database
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .ok_or_else(|| MongoError::config("database name is required"))?;

        let hosts = match args.replicas.as_deref().filter(|r| !r.trim().is_empty()) {
            Some(replicas) => parse_replicas(replicas)?,
            None => vec![(
                args.host.clone().unwrap_or_else(|| DEFAULT_HOST.to_string()),
                args.port.unwrap_or(DEFAULT_PORT),
            )],
        };

        if args.username.is_some() != args.password.is_some() {
            return Err(MongoError::config(
                "username and password must be given together",
            ));
        }

        Ok(Self {
            hosts,
            database: database.to_string(),
            username: args.username.clone(),
            password: args.password.clone(),
            tls: args.enable_ssl,
            app_name: "verso".to_string(),
            connect_timeout: Duration::from_secs(10),
            server_selection_timeout: Duration::from_secs(30),
        })
    }

    /// Connection URI without credentials.
    pub fn uri(&self) -> String {
        let hosts: Vec<String> = self
            .hosts
            .iter()
            .map(|(host, port)| format!("{}:{}", host, port))
            .collect();
        format!("mongodb://{}", hosts.join(","))
    }

    /// Convert to MongoDB ClientOptions.
    pub async fn to_client_options(&self) -> MongoResult<ClientOptions> {
        let mut options = ClientOptions::parse(self.uri())
            .await
            .map_err(|e| MongoError::config(format!("failed to parse URI: {}", e)))?;

        options.app_name = Some(self.app_name.clone());
        options.connect_timeout = Some(self.connect_timeout);
        options.server_selection_timeout = Some(self.server_selection_timeout);
        options.write_concern = Some(WriteConcern::builder().w(Acknowledgment::Nodes(1)).build());

        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            options.credential = Some(
                Credential::builder()
                    .username(username.clone())
                    .password(password.clone())
                    .source(self.database.clone())
                    .build(),
            );
        }

        if self.tls {
            options.tls = Some(Tls::Enabled(TlsOptions::default()));
        }

        Ok(options)
    }
}

/// Parse a comma-separated `host:port` list.
pub fn parse_replicas(replicas: &str) -> MongoResult<Vec<(String, u16)>> {
    let pattern = Regex::new(HOST_PORT_PATTERN)
        .map_err(|e| MongoError::config(format!("invalid host pattern: {}", e)))?;

    let mut hosts = Vec::new();
    for entry in replicas.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let caps = pattern
            .captures(entry)
            .ok_or_else(|| MongoError::config(format!("invalid replica '{}', expected host:port", entry)))?;
        let port = caps[2]
            .parse::<u16>()
            .map_err(|_| MongoError::config(format!("invalid port in replica '{}'", entry)))?;
        hosts.push((caps[1].to_string(), port));
    }

    if hosts.is_empty() {
        return Err(MongoError::config("replica list is empty"));
    }
    Ok(hosts)
}
