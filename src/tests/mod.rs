use rocket::{
    futures::future::join_all,
    http::{ContentType, Status},
    local::asynchronous::{Client, LocalResponse},
    serde::{json::Value, DeserializeOwned},
};

use crate::{
    config::Config,
    database::{
        self, DatabasePool, IdentityStore, Registration, ScoreSubmission, StatsSnapshot, User,
        UserId, RECENT_GAMES_LIMIT,
    },
};
use tempfile::TempDir;

/// A fresh in-memory database with the schema in place.
pub(crate) async fn memory_pool() -> DatabasePool {
    database::connect(&Config::in_memory())
        .await
        .expect("in-memory database")
}

/// Configuration for a database file in `dir`, with several connections
/// so that requests really run side by side.
fn file_config(dir: &TempDir) -> Config {
    Config {
        database_url: format!("sqlite://{}?mode=rwc", dir.path().join("stats.db").display()),
        max_connections: 4,
    }
}

/// A fresh file-backed database; it lives as long as the returned directory.
pub(crate) async fn file_pool() -> (DatabasePool, TempDir) {
    let dir = TempDir::new().expect("temporary directory");
    let database = database::connect(&file_config(&dir))
        .await
        .expect("file database");
    (database, dir)
}

/// Registers a user called `username` and returns its id.
pub(crate) async fn register_user(database: &DatabasePool, username: &str) -> UserId {
    IdentityStore::new(database.clone())
        .register(Registration::new(
            username,
            &format!("{}@example.com", username),
            "password",
        ))
        .await
        .expect("registered user")
        .user_id
}

async fn spawn_client() -> Client {
    spawn_client_with(&Config::in_memory()).await
}

async fn spawn_client_with(config: &Config) -> Client {
    let rocket = crate::build_rocket(config)
        .await
        .expect("connected to the database");
    Client::tracked(rocket).await.expect("valid rocket instance")
}

async fn deserialize_response<T>(response: LocalResponse<'_>) -> T
where
    T: DeserializeOwned + Send + 'static,
{
    response.into_json::<T>().await.expect("json body")
}

/// Registers a user through the api and returns it.
async fn register<'a>(
    client: &'a Client,
    registration: &Registration,
) -> Result<User, LocalResponse<'a>> {
    let response = client.post("/api/register").json(registration).dispatch().await;
    if response.status() != Status::Ok {
        return Err(response);
    }

    Ok(deserialize_response(response).await)
}

async fn add_score<'a>(
    client: &'a Client,
    submission: &ScoreSubmission,
) -> Result<(), LocalResponse<'a>> {
    let response = client.post("/api/scores").json(submission).dispatch().await;
    if response.status() != Status::Ok {
        return Err(response);
    }

    Ok(())
}

/// Posts a raw json body, for payloads the typed helpers cannot express.
async fn post_raw<'a>(client: &'a Client, uri: &'static str, body: &str) -> LocalResponse<'a> {
    client
        .post(uri)
        .header(ContentType::JSON)
        .body(body)
        .dispatch()
        .await
}

async fn get_stats(client: &Client, user_id: &str) -> StatsSnapshot {
    let response = client
        .get(format!("/api/stats/{}", user_id))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    deserialize_response(response).await
}

async fn new_user(client: &Client, username: &str) -> UserId {
    let email = format!("{}@example.com", username);
    let registration = Registration::new(username, &email, "hunter2");
    register(client, &registration).await.unwrap().user_id
}

#[rocket::async_test]
async fn index() {
    let client = spawn_client().await;
    let response = client.get("/").dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(
        response.into_string().await.unwrap(),
        "This is a game stats server!"
    );
}

/// Registers a user, logs in, and fails to register the same name again
#[rocket::async_test]
async fn register_and_login() {
    let client = spawn_client().await;

    let registration = Registration::new("ann", "ann@example.com", "hunter2");
    let user = register(&client, &registration).await.unwrap();
    assert_eq!(user.username, "ann");

    // The password never leaves the server
    let response = client.post("/api/login").json(&registration).dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    let body: Value = deserialize_response(response).await;
    assert!(body.get("password").is_none());
    assert_eq!(body["userId"], user.user_id.as_str());
    assert!(body["lastLogin"].is_string());

    let response = register(&client, &registration).await.unwrap_err();
    assert_eq!(response.status(), Status::Conflict);

    let wrong = Registration::new("ann", "ann@example.com", "wrong");
    let response = client.post("/api/login").json(&wrong).dispatch().await;
    assert_eq!(response.status(), Status::Unauthorized);
}

#[rocket::async_test]
async fn incomplete_registration() {
    let client = spawn_client().await;

    let response = client
        .post("/api/register")
        .json(&rocket::serde::json::json!({ "username": "ann" }))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::BadRequest);
    let body: Value = deserialize_response(response).await;
    assert_eq!(body["error"], "validation error: email is required");
}

/// Records scores and reads the aggregates back
#[rocket::async_test]
async fn add_scores_get_stats() {
    let client = spawn_client().await;
    let user_id = new_user(&client, "ann").await;

    let empty = get_stats(&client, &user_id).await;
    assert_eq!(empty, StatsSnapshot::default());

    let scores = vec![
        ScoreSubmission::new(&user_id, "clicker", 50),
        ScoreSubmission::new(&user_id, "clicker", 30),
        ScoreSubmission::new(&user_id, "memory", 12),
        ScoreSubmission::new(&user_id, "memory", 20),
        ScoreSubmission::new(&user_id, "snake", 4),
    ];
    for submission in &scores {
        add_score(&client, submission).await.unwrap();
    }

    let stats = get_stats(&client, &user_id).await;
    assert_eq!(stats.total_games, scores.len() as i64);
    assert_eq!(stats.best_clicker_score, 50);
    assert_eq!(stats.best_memory_moves, 12);
    assert_eq!(stats.recent_games[0].game_type.as_str(), "snake");
    assert_eq!(stats.recent_games[4].score, 50);
}

#[rocket::async_test]
async fn stats_wire_format() {
    let client = spawn_client().await;
    let user_id = new_user(&client, "ann").await;
    add_score(&client, &ScoreSubmission::new(&user_id, "memory", 9))
        .await
        .unwrap();

    let response = client
        .get(format!("/api/stats/{}", user_id))
        .dispatch()
        .await;
    let body: Value = deserialize_response(response).await;
    assert_eq!(body["totalGames"], 1);
    assert_eq!(body["bestClickerScore"], 0);
    assert_eq!(body["bestMemoryMoves"], 9);
    assert_eq!(body["recentGames"][0]["gameType"], "memory");
    assert_eq!(body["recentGames"][0]["score"], 9);
    assert!(body["recentGames"][0]["playedAt"].is_string());
}

/// A score of zero is stored, an absent score is rejected
#[rocket::async_test]
async fn zero_and_absent_scores() {
    let client = spawn_client().await;
    let user_id = new_user(&client, "ann").await;

    add_score(&client, &ScoreSubmission::new(&user_id, "clicker", 0))
        .await
        .unwrap();

    let absent = ScoreSubmission {
        score: None,
        ..ScoreSubmission::new(&user_id, "clicker", 0)
    };
    let response = add_score(&client, &absent).await.unwrap_err();
    assert_eq!(response.status(), Status::BadRequest);

    let stats = get_stats(&client, &user_id).await;
    assert_eq!(stats.total_games, 1);
    assert_eq!(stats.recent_games[0].score, 0);
}

/// Scores that are not integers get a json error, not the default catcher
#[rocket::async_test]
async fn malformed_scores_are_bad_requests() {
    let client = spawn_client().await;
    let user_id = new_user(&client, "ann").await;

    for score in &[r#""abc""#, "1.5", "[]"] {
        let body = format!(
            r#"{{"userId":"{}","gameType":"clicker","score":{}}}"#,
            user_id, score
        );
        let response = post_raw(&client, "/api/scores", &body).await;
        assert_eq!(response.status(), Status::BadRequest);
        let body: Value = deserialize_response(response).await;
        let error = body["error"].as_str().unwrap();
        assert!(
            error.starts_with("validation error: malformed request body"),
            "{}",
            error
        );
    }

    let response = post_raw(&client, "/api/register", "{\"username\":").await;
    assert_eq!(response.status(), Status::BadRequest);

    let stats = get_stats(&client, &user_id).await;
    assert_eq!(stats.total_games, 0);
}

#[rocket::async_test]
async fn scores_beyond_32_bits() {
    let client = spawn_client().await;
    let user_id = new_user(&client, "ann").await;

    let body = format!(
        r#"{{"userId":"{}","gameType":"clicker","score":3000000000}}"#,
        user_id
    );
    let response = post_raw(&client, "/api/scores", &body).await;
    assert_eq!(response.status(), Status::Ok);

    let stats = get_stats(&client, &user_id).await;
    assert_eq!(stats.best_clicker_score, 3_000_000_000);

    let response = client
        .get(format!("/api/stats/{}", user_id))
        .dispatch()
        .await;
    let body: Value = deserialize_response(response).await;
    assert_eq!(body["recentGames"][0]["score"], 3_000_000_000_i64);
}

#[rocket::async_test]
async fn score_for_unknown_user() {
    let client = spawn_client().await;

    let response = add_score(&client, &ScoreSubmission::new("nobody", "clicker", 5))
        .await
        .unwrap_err();
    assert_eq!(response.status(), Status::NotFound);

    let stats = get_stats(&client, "nobody").await;
    assert_eq!(stats, StatsSnapshot::default());
}

#[rocket::async_test]
async fn recent_games_are_bounded() {
    let client = spawn_client().await;
    let user_id = new_user(&client, "ann").await;

    let played = RECENT_GAMES_LIMIT + 3;
    for score in 0..played {
        add_score(&client, &ScoreSubmission::new(&user_id, "clicker", score))
            .await
            .unwrap();
    }

    let stats = get_stats(&client, &user_id).await;
    assert_eq!(stats.total_games, played);
    assert_eq!(stats.recent_games.len() as i64, RECENT_GAMES_LIMIT);
    assert_eq!(stats.recent_games[0].score, played - 1);
    assert_eq!(
        stats.recent_games.last().unwrap().score,
        played - RECENT_GAMES_LIMIT
    );
}

/// Concurrent writes for the same user are all kept.
/// Runs on a database file with a pool of several connections, so the
/// writes contend for the database instead of queueing on one connection.
#[rocket::async_test]
async fn concurrent_scores_are_not_lost() {
    let dir = TempDir::new().expect("temporary directory");
    let client = spawn_client_with(&file_config(&dir)).await;
    let user_id = new_user(&client, "ann").await;

    let submissions: Vec<ScoreSubmission> = (1..=8)
        .map(|round| {
            if round % 2 == 0 {
                ScoreSubmission::new(&user_id, "clicker", round * 10)
            } else {
                ScoreSubmission::new(&user_id, "memory", round + 10)
            }
        })
        .collect();
    let results = join_all(
        submissions
            .iter()
            .map(|submission| add_score(&client, submission)),
    )
    .await;
    assert!(results.iter().all(Result::is_ok));

    let stats = get_stats(&client, &user_id).await;
    assert_eq!(stats.total_games, 8);
    assert_eq!(stats.best_clicker_score, 80);
    assert_eq!(stats.best_memory_moves, 11);
}

#[rocket::async_test]
async fn get_user_by_id() {
    let client = spawn_client().await;
    let user_id = new_user(&client, "ann").await;

    let response = client.get(format!("/api/users/{}", user_id)).dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    let user: User = deserialize_response(response).await;
    assert_eq!(user.username, "ann");
    assert_eq!(user.email, "ann@example.com");

    let response = client.get("/api/users/nobody").dispatch().await;
    assert_eq!(response.status(), Status::NotFound);
}

#[rocket::async_test]
async fn best_score_and_recent_games() {
    let client = spawn_client().await;
    let user_id = new_user(&client, "ann").await;

    let best_uri = format!("/api/stats/{}/best/memory", user_id);
    let response = client.get(best_uri.clone()).dispatch().await;
    let best: Option<i64> = deserialize_response(response).await;
    assert_eq!(best, None);

    for moves in vec![18, 11, 25] {
        add_score(&client, &ScoreSubmission::new(&user_id, "memory", moves))
            .await
            .unwrap();
    }

    let response = client.get(best_uri).dispatch().await;
    let best: Option<i64> = deserialize_response(response).await;
    assert_eq!(best, Some(11));

    let response = client
        .get(format!("/api/stats/{}/recent?limit=2", user_id))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let recent: Vec<crate::database::ScoreRecord> = deserialize_response(response).await;
    let moves: Vec<i64> = recent.iter().map(|game| game.score).collect();
    assert_eq!(moves, vec![25, 11]);
}
