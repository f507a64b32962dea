use rocket::serde::json::{self, Json};
use rocket::serde::Serialize;
use rocket::{get, post, State};

use super::*;

/// A body that does not parse as `T`, such as a score that is not an integer,
/// is a validation error rather than rocket's default catcher page.
fn json_body<T>(body: Result<Json<T>, json::Error<'_>>) -> Result<T, ValidationError> {
    body.map(Json::into_inner)
        .map_err(|error| ValidationError::MalformedBody {
            reason: error.to_string(),
        })
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct Acknowledgement {
    pub success: bool,
}

/// Registers a new user and returns it.
/// Returns an error if the username or email is already taken.
#[post("/register", format = "json", data = "<registration>")]
pub async fn register(
    registration: Result<Json<Registration>, json::Error<'_>>,
    identities: &State<IdentityStore>,
) -> RequestResult<Json<User>> {
    let user = identities.register(json_body(registration)?).await?;
    Ok(Json(user))
}

#[post("/login", format = "json", data = "<credentials>")]
pub async fn login(
    credentials: Result<Json<Credentials>, json::Error<'_>>,
    identities: &State<IdentityStore>,
) -> RequestResult<Json<User>> {
    let user = identities.login(json_body(credentials)?).await?;
    Ok(Json(user))
}

/// Fetches the public record of a user.
#[get("/users/<user_id>")]
pub async fn get_user(
    user_id: &str,
    identities: &State<IdentityStore>,
) -> RequestResult<Json<User>> {
    match identities.find_by_id(user_id).await? {
        Some(account) => Ok(Json(account.user)),
        None => Err(AccountError::NoSuchUser {
            user_id: user_id.to_owned(),
        }
        .into()),
    }
}

/// Adds a played game to the ledger of its user.
#[post("/scores", format = "json", data = "<submission>")]
pub async fn add_score(
    submission: Result<Json<ScoreSubmission>, json::Error<'_>>,
    ledger: &State<ScoreLedger>,
) -> RequestResult<Json<Acknowledgement>> {
    ledger.record_score(json_body(submission)?).await?;
    Ok(Json(Acknowledgement { success: true }))
}

/// Fetches the statistics of a user.
/// Users without games, including unknown ones, get an empty snapshot.
#[get("/stats/<user_id>")]
pub async fn get_stats(
    user_id: &str,
    stats: &State<StatsAggregator>,
) -> RequestResult<Json<StatsSnapshot>> {
    let snapshot = stats.get_stats(user_id).await?;
    Ok(Json(snapshot))
}

/// Fetches the best score of a user in one game, `null` if there is none.
#[get("/stats/<user_id>/best/<game_type>")]
pub async fn get_best_score(
    user_id: &str,
    game_type: &str,
    stats: &State<StatsAggregator>,
) -> RequestResult<Json<Option<GameScore>>> {
    let best = stats.best_score(user_id, &GameType::new(game_type)).await?;
    Ok(Json(best))
}

/// Fetches up to `limit` most recent games of a user, newest first.
#[get("/stats/<user_id>/recent?<limit>")]
pub async fn get_recent_games(
    user_id: &str,
    limit: Option<i64>,
    stats: &State<StatsAggregator>,
) -> RequestResult<Json<Vec<ScoreRecord>>> {
    let limit = limit
        .unwrap_or(RECENT_GAMES_LIMIT)
        .max(1)
        .min(MAX_RECENT_GAMES_LIMIT);
    let games = stats.recent_games(user_id, limit).await?;
    Ok(Json(games))
}
