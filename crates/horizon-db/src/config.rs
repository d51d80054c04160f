use std::env;
use std::time::Duration;

/// Connection settings for the horizon database.
///
/// Besides the URL this carries the pool sizing knobs, so every caller that
/// builds a pool ends up with the same limits.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Full PostgreSQL connection URL.
    pub database_url: String,
    /// Upper bound on pooled connections.
    pub max_connections: u32,
    /// How long to wait for a free connection before giving up.
    pub acquire_timeout: Duration,
}

impl DbConfig {
    /// Connection URL used when nothing else is configured.
    pub const DEFAULT_URL: &str = "postgresql://localhost:5432/horizon";

    /// Build a config from an explicit URL with default pool limits.
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(10),
        }
    }

    /// Build a config from the environment: `HORIZON_DATABASE_URL` when set,
    /// [`Self::DEFAULT_URL`] otherwise.
    pub fn from_env() -> Self {
        match env::var("HORIZON_DATABASE_URL") {
            Ok(url) => Self::new(url),
            Err(_) => Self::new(Self::DEFAULT_URL),
        }
    }

    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    /// The database name: the last path segment of the URL, with any query
    /// string stripped. `None` when the URL has no usable path component.
    pub fn database_name(&self) -> Option<&str> {
        let without_query = self
            .database_url
            .split_once('?')
            .map_or(self.database_url.as_str(), |(head, _)| head);
        without_query.rsplit('/').next().filter(|s| !s.is_empty())
    }

    /// URL of the `postgres` maintenance database on the same server.
    ///
    /// Administrative statements like `CREATE DATABASE` have to run from a
    /// database other than the one being created.
    pub fn maintenance_url(&self) -> String {
        let (head, query) = match self.database_url.split_once('?') {
            Some((head, query)) => (head, Some(query)),
            None => (self.database_url.as_str(), None),
        };
        let base = match head.rfind('/') {
            Some(pos) => &head[..pos],
            None => head,
        };
        match query {
            Some(query) => format!("{base}/postgres?{query}"),
            None => format!("{base}/postgres"),
        }
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
