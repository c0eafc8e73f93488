use reqwest::Url;

use super::error::{CouchDaoError, CouchResult};

const URL_VAR: &str = "COUCH_BASE_URL";
const DATABASE_VAR: &str = "COUCH_DB";
const USERNAME_VAR: &str = "COUCH_USERNAME";
const PASSWORD_VAR: &str = "COUCH_PASSWORD";
const DEFAULT_DATABASE: &str = "rinkside";

/// Where the CouchDB database lives and how to authenticate against it.
#[derive(Debug, Clone)]
pub struct CouchConfig {
    server: Url,
    database: String,
    credentials: Option<(String, String)>,
}

impl CouchConfig {
    /// Validate a server URL and database name.
    pub fn new(server: &str, database: impl Into<String>) -> CouchResult<Self> {
        let server = Url::parse(server).map_err(|_| CouchDaoError::Config {
            var: URL_VAR,
            problem: "is not a valid URL",
        })?;
        if server.cannot_be_a_base() || !matches!(server.scheme(), "http" | "https") {
            return Err(CouchDaoError::Config {
                var: URL_VAR,
                problem: "must be an http(s) URL",
            });
        }

        let database = database.into();
        if !is_valid_database_name(&database) {
            return Err(CouchDaoError::Config {
                var: DATABASE_VAR,
                problem: "is not a valid CouchDB database name",
            });
        }

        Ok(Self {
            server,
            database,
            credentials: None,
        })
    }

    /// Attach basic-auth credentials.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    /// Read `COUCH_BASE_URL`, `COUCH_DB` and the optional credential pair from the environment.
    pub fn from_env() -> CouchResult<Self> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> CouchResult<Self> {
        let server = lookup(URL_VAR).ok_or(CouchDaoError::Config {
            var: URL_VAR,
            problem: "is not set",
        })?;
        let database = lookup(DATABASE_VAR).unwrap_or_else(|| DEFAULT_DATABASE.to_owned());
        let config = Self::new(&server, database)?;

        Ok(match (lookup(USERNAME_VAR), lookup(PASSWORD_VAR)) {
            (Some(username), Some(password)) => config.with_credentials(username, password),
            _ => config,
        })
    }

    /// Database name.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Absolute URL of the database.
    pub fn database_url(&self) -> String {
        format!(
            "{}/{}",
            self.server.as_str().trim_end_matches('/'),
            self.database
        )
    }

    pub(super) fn credentials(&self) -> Option<(&str, &str)> {
        self.credentials
            .as_ref()
            .map(|(username, password)| (username.as_str(), password.as_str()))
    }
}

/// CouchDB names start with a lowercase letter and use a restricted alphabet.
fn is_valid_database_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|first| first.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "_$()+-/".contains(c))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |var| vars.get(var).cloned()
    }

    #[test]
    fn the_database_url_joins_server_and_name() {
        let config = CouchConfig::from_lookup(lookup(&[(URL_VAR, "http://couch:5984/")])).unwrap();
        assert_eq!(config.database_url(), "http://couch:5984/rinkside");
        assert!(config.credentials().is_none());
    }

    #[test]
    fn credentials_need_both_halves() {
        let half = CouchConfig::from_lookup(lookup(&[
            (URL_VAR, "http://couch:5984"),
            (USERNAME_VAR, "admin"),
        ]))
        .unwrap();
        assert!(half.credentials().is_none());

        let full = CouchConfig::from_lookup(lookup(&[
            (URL_VAR, "http://couch:5984"),
            (USERNAME_VAR, "admin"),
            (PASSWORD_VAR, "secret"),
        ]))
        .unwrap();
        assert_eq!(full.credentials(), Some(("admin", "secret")));
    }

    #[test]
    fn bad_settings_are_refused() {
        assert!(matches!(
            CouchConfig::from_lookup(lookup(&[])),
            Err(CouchDaoError::Config { var: URL_VAR, .. })
        ));
        assert!(matches!(
            CouchConfig::new("ftp://couch", "rinkside"),
            Err(CouchDaoError::Config { var: URL_VAR, .. })
        ));
        assert!(matches!(
            CouchConfig::new("http://couch:5984", "Games"),
            Err(CouchDaoError::Config {
                var: DATABASE_VAR,
                ..
            })
        ));
    }
}
