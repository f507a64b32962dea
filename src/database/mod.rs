use chrono::{DateTime, TimeZone, Utc};
use sqlx::any::AnyPoolOptions;
use sqlx::Row;

use crate::config::Config;

mod identity;
mod ledger;
mod request_error;
pub mod requests;
mod schema;
mod score;
mod stats;

pub use identity::{Credentials, IdentityStore, Registration, User};
pub use ledger::ScoreLedger;
pub use request_error::*;
pub use score::{
    GameScore, GameType, NewScore, ScoreOrder, ScoreRecord, ScoreSubmission, StatsSnapshot,
};
pub use stats::{StatsAggregator, MAX_RECENT_GAMES_LIMIT, RECENT_GAMES_LIMIT};

pub type DatabasePool = sqlx::any::AnyPool;
pub type UserId = String;

/// Opens the connection pool and makes sure the schema exists.
pub async fn connect(config: &Config) -> Result<DatabasePool, sqlx::Error> {
    let database = AnyPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await?;

    schema::init_schema(&database).await?;
    Ok(database)
}

/// Current time, truncated to the millisecond precision it is stored with.
fn now() -> Result<DateTime<Utc>, StorageError> {
    timestamp_from_millis(Utc::now().timestamp_millis())
}

fn timestamp_from_millis(millis: i64) -> Result<DateTime<Utc>, StorageError> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or(StorageError::InvalidTimestamp { millis })
}
