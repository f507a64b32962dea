use rocket::{get, launch, routes, Build, Rocket};

use crate::config::Config;
use crate::database::{requests, IdentityStore, ScoreLedger, StatsAggregator};

mod config;
mod database;
mod database_keys;
#[cfg(test)]
mod tests;

#[launch]
async fn rocket() -> _ {
    let config = Config::from_env().expect("invalid configuration");

    build_rocket(&config)
        .await
        .expect("failed to connect to a database")
}

/// Connects to the database and builds the rocket around it.
pub async fn build_rocket(config: &Config) -> Result<Rocket<Build>, sqlx::Error> {
    let database_pool = database::connect(config).await?;
    log::info!(
        "connected to the database (up to {} connections)",
        config.max_connections
    );

    Ok(rocket::build()
        .mount("/", routes![index])
        .mount(
            "/api",
            routes![
                requests::register,
                requests::login,
                requests::get_user,
                requests::add_score,
                requests::get_stats,
                requests::get_best_score,
                requests::get_recent_games
            ],
        )
        .manage(IdentityStore::new(database_pool.clone()))
        .manage(ScoreLedger::new(database_pool.clone()))
        .manage(StatsAggregator::new(database_pool)))
}

#[get("/")]
fn index() -> &'static str {
    "This is a game stats server!"
}
