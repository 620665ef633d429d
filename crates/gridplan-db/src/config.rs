use std::env;

/// Where month plans live in PostgreSQL.
///
/// The URL comes from `GRIDPLAN_DATABASE_URL` or an explicit value; the
/// pool stays small because a planner session is the only writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    /// Full PostgreSQL connection URL, query parameters included.
    pub database_url: String,
    pub max_connections: u32,
}

impl DbConfig {
    pub const DEFAULT_URL: &str = "postgresql://localhost:5432/gridplan";

    /// Environment variable consulted by [`DbConfig::from_env`].
    pub const ENV_VAR: &str = "GRIDPLAN_DATABASE_URL";

    pub const DEFAULT_MAX_CONNECTIONS: u32 = 2;

    pub fn from_env() -> Self {
        Self::new(env::var(Self::ENV_VAR).unwrap_or_else(|_| Self::DEFAULT_URL.to_owned()))
    }

    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: Self::DEFAULT_MAX_CONNECTIONS,
        }
    }

    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections.max(1);
        self
    }

    /// `(base, path, query)` where `path` is the part after the last `/`
    /// of the authority and `query` keeps its leading `?`.
    fn split(&self) -> (&str, &str, &str) {
        let (before_query, query) = match self.database_url.find('?') {
            Some(pos) => self.database_url.split_at(pos),
            None => (self.database_url.as_str(), ""),
        };
        let authority_start = before_query.find("://").map_or(0, |p| p + 3);
        match before_query[authority_start..].find('/') {
            Some(rel) => {
                let slash = authority_start + rel;
                (&before_query[..slash], &before_query[slash + 1..], query)
            }
            None => (before_query, "", query),
        }
    }

    /// The database name, or `None` when the URL names none.
    pub fn database_name(&self) -> Option<&str> {
        Some(self.split().1).filter(|name| !name.is_empty())
    }

    /// Same server and parameters, but the `postgres` maintenance database.
    /// Used to issue `CREATE DATABASE` for a missing target.
    pub fn maintenance_url(&self) -> String {
        let (base, _, query) = self.split();
        format!("{base}/postgres{query}")
    }

    /// The URL with any password replaced, for logs and error messages.
    pub fn redacted_url(&self) -> String {
        let url = &self.database_url;
        let Some(scheme_end) = url.find("://").map(|p| p + 3) else {
            return url.clone();
        };
        let authority_end = url[scheme_end..]
            .find(['/', '?'])
            .map_or(url.len(), |p| scheme_end + p);
        let authority = &url[scheme_end..authority_end];
        let Some(at) = authority.rfind('@') else {
            return url.clone();
        };
        match authority[..at].find(':') {
            Some(colon) => format!(
                "{}{}:***{}",
                &url[..scheme_end],
                &authority[..colon],
                &url[scheme_end + at..]
            ),
            None => url.clone(),
        }
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_url() {
        let cfg = DbConfig::new(DbConfig::DEFAULT_URL);
        assert_eq!(cfg.database_name(), Some("gridplan"));
        assert_eq!(cfg.max_connections, DbConfig::DEFAULT_MAX_CONNECTIONS);
    }

    #[test]
    fn query_parameters_survive_maintenance_url() {
        let cfg = DbConfig::new("postgresql://db.internal:5433/planner?sslmode=require");
        assert_eq!(cfg.database_name(), Some("planner"));
        assert_eq!(
            cfg.maintenance_url(),
            "postgresql://db.internal:5433/postgres?sslmode=require"
        );
    }

    #[test]
    fn database_name_missing() {
        assert_eq!(DbConfig::new("postgresql://localhost:5432/").database_name(), None);
        assert_eq!(DbConfig::new("postgresql://localhost:5432").database_name(), None);
    }

    #[test]
    fn password_is_redacted() {
        let cfg = DbConfig::new("postgresql://planner:s3cr:et@db:5432/gridplan?sslmode=require");
        assert_eq!(
            cfg.redacted_url(),
            "postgresql://planner:***@db:5432/gridplan?sslmode=require"
        );
        let no_password = DbConfig::new("postgresql://planner@db/gridplan");
        assert_eq!(no_password.redacted_url(), no_password.database_url);
    }

    #[test]
    fn pool_size_has_a_floor() {
        let cfg = DbConfig::new(DbConfig::DEFAULT_URL).with_max_connections(0);
        assert_eq!(cfg.max_connections, 1);
    }
}
