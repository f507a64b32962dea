use chrono::{DateTime, Utc};
use rocket::serde::{Deserialize, Serialize};

use super::{UserId, ValidationError};

// Scores are stored in a BIGINT column.
pub type GameScore = i64;

pub const CLICKER: &str = "clicker";
pub const MEMORY: &str = "memory";

/// How two scores of the same game type compare.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScoreOrder {
    HigherIsBetter,
    LowerIsBetter,
}

/// Tag of the game that produced a score.
/// Any tag may be stored; only the known ones carry a [`ScoreOrder`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(crate = "rocket::serde", transparent)]
pub struct GameType(String);

impl GameType {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn clicker() -> Self {
        Self::new(CLICKER)
    }

    /// Scores of the memory game are move counts.
    pub fn memory() -> Self {
        Self::new(MEMORY)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn score_order(&self) -> Option<ScoreOrder> {
        match self.0.as_str() {
            CLICKER => Some(ScoreOrder::HigherIsBetter),
            MEMORY => Some(ScoreOrder::LowerIsBetter),
            _ => None,
        }
    }
}

impl std::fmt::Display for GameType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A score as submitted by a client. Every field may be missing on the wire,
/// so that an absent score can be told apart from a score of zero.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(crate = "rocket::serde", rename_all = "camelCase")]
pub struct ScoreSubmission {
    pub user_id: Option<String>,
    pub game_type: Option<String>,
    pub score: Option<GameScore>,
}

impl ScoreSubmission {
    pub fn new(user_id: &str, game_type: &str, score: GameScore) -> Self {
        Self {
            user_id: Some(user_id.to_owned()),
            game_type: Some(game_type.to_owned()),
            score: Some(score),
        }
    }

    pub fn validate(self) -> Result<NewScore, ValidationError> {
        let user_id = required(self.user_id).ok_or(ValidationError::MissingUserId)?;
        let game_type = required(self.game_type).ok_or(ValidationError::MissingGameType)?;
        let score = self.score.ok_or(ValidationError::MissingScore)?;

        Ok(NewScore {
            user_id,
            game_type: GameType::new(game_type),
            score,
        })
    }
}

/// The value as given, or `None` if it is missing or blank.
/// Surrounding whitespace is kept, so a padded id does not match the unpadded one.
pub(super) fn required(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

/// A validated score, ready to be appended to the ledger.
#[derive(Clone, Debug, PartialEq)]
pub struct NewScore {
    pub user_id: UserId,
    pub game_type: GameType,
    pub score: GameScore,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(crate = "rocket::serde", rename_all = "camelCase")]
pub struct ScoreRecord {
    pub user_id: UserId,
    pub game_type: GameType,
    pub score: GameScore,
    pub played_at: DateTime<Utc>,
}

/// Aggregates computed for one user on request.
///
/// `best_clicker_score` and `best_memory_moves` are `0` both when the user
/// has no game of that type and when the best score actually is `0`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(crate = "rocket::serde", rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub total_games: i64,
    pub best_clicker_score: GameScore,
    pub best_memory_moves: GameScore,
    pub recent_games: Vec<ScoreRecord>,
}
