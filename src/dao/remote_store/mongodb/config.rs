use mongodb::options::ClientOptions;

use super::error::{MongoDaoError, MongoResult};

const URI_VAR: &str = "MONGO_URI";
const DATABASE_VAR: &str = "MONGO_DB";
const DEFAULT_DATABASE: &str = "rinkside";
const APP_NAME: &str = "rinkside";

/// Parsed client options plus the database holding the game collections.
#[derive(Clone)]
pub struct MongoConfig {
    options: ClientOptions,
    database: String,
}

impl MongoConfig {
    /// Parse `uri` and pick `database`, falling back to `rinkside`.
    pub async fn from_uri(uri: &str, database: Option<&str>) -> MongoResult<Self> {
        let database = database.unwrap_or(DEFAULT_DATABASE).to_owned();
        if !is_valid_database_name(&database) {
            return Err(MongoDaoError::InvalidDatabaseName { name: database });
        }

        let mut options = ClientOptions::parse(uri)
            .await
            .map_err(|source| MongoDaoError::InvalidUri {
                uri: redact(uri),
                source,
            })?;
        options.app_name.get_or_insert_with(|| APP_NAME.to_owned());

        Ok(Self { options, database })
    }

    /// Read `MONGO_URI` (required) and `MONGO_DB` (optional).
    pub async fn from_env() -> MongoResult<Self> {
        let uri = std::env::var(URI_VAR).map_err(|_| MongoDaoError::MissingEnvVar { var: URI_VAR })?;
        let database = std::env::var(DATABASE_VAR).ok();
        Self::from_uri(&uri, database.as_deref()).await
    }

    /// Client options used for every (re)connection.
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Database name.
    pub fn database(&self) -> &str {
        &self.database
    }
}

fn is_valid_database_name(name: &str) -> bool {
    !name.is_empty() && name.len() < 64 && !name.contains(['/', '\\', '.', ' ', '"', '$', '\0'])
}

/// Keep credentials out of error messages.
fn redact(uri: &str) -> String {
    match (uri.find("://"), uri.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &uri[..scheme_end], &uri[at..])
        }
        _ => uri.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn the_default_database_and_app_name_are_filled_in() {
        let config = MongoConfig::from_uri("mongodb://localhost:27017", None)
            .await
            .unwrap();
        assert_eq!(config.database(), "rinkside");
        assert_eq!(config.options().app_name.as_deref(), Some("rinkside"));
    }

    #[tokio::test]
    async fn bad_database_names_are_refused() {
        let err = MongoConfig::from_uri("mongodb://localhost:27017", Some("games.live"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, MongoDaoError::InvalidDatabaseName { .. }));
    }

    #[test]
    fn credentials_are_redacted() {
        assert_eq!(
            redact("mongodb://coach:secret@db:27017/?tls=true"),
            "mongodb://***@db:27017/?tls=true"
        );
        assert_eq!(redact("mongodb://db:27017"), "mongodb://db:27017");
    }
}
