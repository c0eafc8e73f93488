use std::time::Duration;

use mongodb::{Client, Database, bson::doc};
use tokio::time::sleep;
use tracing::{debug, info};

use super::{
    config::MongoConfig,
    error::{MongoDaoError, MongoResult},
};

/// Doubling delays between initial pings, capped.
#[derive(Debug, Clone)]
struct Backoff {
    next: Duration,
    cap: Duration,
    remaining: u32,
}

impl Backoff {
    fn initial_connect() -> Self {
        Self {
            next: Duration::from_millis(250),
            cap: Duration::from_secs(5),
            remaining: 9,
        }
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        self.remaining = self.remaining.checked_sub(1)?;
        let delay = self.next;
        self.next = (self.next * 2).min(self.cap);
        Some(delay)
    }
}

/// Build a client for `config` and wait until the server answers a ping.
pub async fn establish_connection(config: &MongoConfig) -> MongoResult<(Client, Database)> {
    let client = Client::with_options(config.options().clone())
        .map_err(|source| MongoDaoError::ClientConstruction { source })?;
    let database = client.database(config.database());

    let mut delays = Backoff::initial_connect();
    let mut attempts = 0;
    loop {
        attempts += 1;
        let Err(source) = database.run_command(doc! { "ping": 1 }).await else {
            break;
        };
        let Some(delay) = delays.next() else {
            return Err(MongoDaoError::InitialPing { attempts, source });
        };
        debug!(attempts, ?delay, error = %source, "MongoDB ping failed; retrying");
        sleep(delay).await;
    }

    info!(database = %config.database(), attempts, "connected to MongoDB");
    Ok((client, database))
}
