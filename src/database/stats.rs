use sqlx::any::AnyConnection;

use super::ledger::record_from_row;
use super::*;

/// Maximum number of games listed in [`StatsSnapshot::recent_games`].
pub const RECENT_GAMES_LIMIT: i64 = 10;

/// Upper bound for an explicitly requested history length.
pub const MAX_RECENT_GAMES_LIMIT: i64 = 100;

async fn count_games(connection: &mut AnyConnection, user_id: &str) -> Result<i64, StorageError> {
    let row = sqlx::query("SELECT COUNT(*) FROM game_scores WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(connection)
        .await?;

    Ok(row.try_get_unchecked::<i64, usize>(0)?)
}

async fn best_score(
    connection: &mut AnyConnection,
    user_id: &str,
    game_type: &GameType,
) -> Result<Option<GameScore>, StorageError> {
    let aggregate = match game_type.score_order() {
        Some(ScoreOrder::HigherIsBetter) => "MAX",
        Some(ScoreOrder::LowerIsBetter) => "MIN",
        None => return Ok(None),
    };

    let row = sqlx::query(&format!(
        "SELECT {}(score) FROM game_scores WHERE user_id = $1 AND game_type = $2",
        aggregate
    ))
    .bind(user_id)
    .bind(game_type.as_str())
    .fetch_one(connection)
    .await?;

    Ok(row.try_get_unchecked::<Option<GameScore>, usize>(0)?)
}

async fn recent_games(
    connection: &mut AnyConnection,
    user_id: &str,
    limit: i64,
) -> Result<Vec<ScoreRecord>, StorageError> {
    // Games played in the same millisecond come out newest-inserted first
    let rows = sqlx::query(
        "SELECT user_id, game_type, score, played_at FROM game_scores \
         WHERE user_id = $1 ORDER BY played_at DESC, score_id DESC LIMIT $2",
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(connection)
    .await?;

    rows.iter().map(record_from_row).collect()
}

/// Read-only statistics over the score ledger.
/// Nothing is cached, every call reads the ledger afresh.
pub struct StatsAggregator {
    database: DatabasePool,
}

impl StatsAggregator {
    pub fn new(database: DatabasePool) -> Self {
        Self { database }
    }

    /// Computes the statistics of a user.
    /// A user without any games, known or not, gets an all-zero snapshot.
    pub async fn get_stats(&self, user_id: &str) -> Result<StatsSnapshot, StorageError> {
        let mut connection = self.database.acquire().await?;

        let total_games = count_games(&mut connection, user_id).await?;
        let best_clicker_score = best_score(&mut connection, user_id, &GameType::clicker()).await?;
        let best_memory_moves = best_score(&mut connection, user_id, &GameType::memory()).await?;
        let recent_games = recent_games(&mut connection, user_id, RECENT_GAMES_LIMIT).await?;

        Ok(StatsSnapshot {
            total_games,
            best_clicker_score: best_clicker_score.unwrap_or(0),
            best_memory_moves: best_memory_moves.unwrap_or(0),
            recent_games,
        })
    }

    /// Best score of a user in a game, `None` if there is nothing to compare
    /// or the game type has no known order.
    pub async fn best_score(
        &self,
        user_id: &str,
        game_type: &GameType,
    ) -> Result<Option<GameScore>, StorageError> {
        let mut connection = self.database.acquire().await?;
        best_score(&mut connection, user_id, game_type).await
    }

    /// The `limit` most recent games of a user, newest first.
    pub async fn recent_games(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<ScoreRecord>, StorageError> {
        let mut connection = self.database.acquire().await?;
        recent_games(&mut connection, user_id, limit).await
    }
}
