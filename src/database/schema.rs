use sqlx::any::AnyKind;

use super::DatabasePool;

/// Creates the tables and indexes if they do not exist yet.
pub async fn init_schema(database: &DatabasePool) -> Result<(), sqlx::Error> {
    let mut connection = database.acquire().await?;

    // The insertion-order key breaks ties between scores played in the same millisecond
    let score_id_column = match connection.kind() {
        AnyKind::Postgres => "score_id BIGSERIAL PRIMARY KEY",
        AnyKind::Sqlite => "score_id INTEGER PRIMARY KEY AUTOINCREMENT",
    };

    let statements = vec![
        "CREATE TABLE IF NOT EXISTS users (
            user_id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL UNIQUE,
            password TEXT NOT NULL,
            created_at BIGINT NOT NULL,
            last_login BIGINT
        )"
        .to_owned(),
        format!(
            "CREATE TABLE IF NOT EXISTS game_scores (
                {},
                user_id TEXT NOT NULL REFERENCES users (user_id),
                game_type TEXT NOT NULL,
                score BIGINT NOT NULL,
                played_at BIGINT NOT NULL
            )",
            score_id_column
        ),
        "CREATE INDEX IF NOT EXISTS game_scores_user_played \
         ON game_scores (user_id, played_at)"
            .to_owned(),
        "CREATE INDEX IF NOT EXISTS game_scores_user_game \
         ON game_scores (user_id, game_type)"
            .to_owned(),
    ];

    for statement in &statements {
        sqlx::query(statement).execute(&mut *connection).await?;
    }

    log::debug!("database schema is ready");
    Ok(())
}
