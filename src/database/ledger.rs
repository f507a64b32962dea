use sqlx::any::AnyRow;

use super::*;

pub(super) fn record_from_row(row: &AnyRow) -> Result<ScoreRecord, StorageError> {
    let played_at = row.try_get_unchecked::<i64, usize>(3)?;

    Ok(ScoreRecord {
        user_id: row.try_get_unchecked::<String, usize>(0)?,
        game_type: GameType::new(row.try_get_unchecked::<String, usize>(1)?),
        score: row.try_get_unchecked::<GameScore, usize>(2)?,
        played_at: timestamp_from_millis(played_at)?,
    })
}

/// Append-only store of played games.
/// Records are never updated or deleted, and identical submissions are kept apart.
pub struct ScoreLedger {
    database: DatabasePool,
}

impl ScoreLedger {
    pub fn new(database: DatabasePool) -> Self {
        Self { database }
    }

    /// Validates a submission and appends it to the ledger.
    pub async fn record_score(&self, submission: ScoreSubmission) -> RequestResult<()> {
        let score = submission.validate()?;
        let record = self.append(score).await?;

        log::debug!(
            "recorded {} score {} for user {}",
            record.game_type,
            record.score,
            record.user_id
        );
        Ok(())
    }

    /// Appends a validated score, stamped with the current time.
    /// Fails without writing anything if the user does not exist.
    pub async fn append(&self, score: NewScore) -> Result<ScoreRecord, StorageError> {
        let mut connection = self.database.acquire().await?;

        // The user check and the insert are one statement, so concurrent appends
        // never hold a read snapshot while waiting for the write lock
        let played_at = now()?;
        let response = sqlx::query(
            "INSERT INTO game_scores (user_id, game_type, score, played_at) \
             SELECT user_id, $2, $3, $4 FROM users WHERE user_id = $1",
        )
        .bind(&score.user_id)
        .bind(score.game_type.as_str())
        .bind(score.score)
        .bind(played_at.timestamp_millis())
        .execute(&mut *connection)
        .await?;

        if response.rows_affected() == 0 {
            return Err(StorageError::UnknownUser {
                user_id: score.user_id,
            });
        }

        Ok(ScoreRecord {
            user_id: score.user_id,
            game_type: score.game_type,
            score: score.score,
            played_at,
        })
    }
}
