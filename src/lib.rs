pub mod api;
pub mod coalescer;
pub mod config;
pub mod db;
pub mod error;
pub mod parser;
pub mod scorer;
pub mod upstream;
pub mod variant_key;

use std::time::Duration;

use diesel::Connection;
use diesel::pg::PgConnection;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use log::info;
use rocket::fairing::AdHoc;
use rocket::{Build, Rocket};

use coalescer::Coalescer;
use config::Config;
use scorer::HeuristicScorer;
use upstream::UpstreamClient;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

async fn run_migrations(rocket: Rocket<Build>) -> Rocket<Build> {
    let config = rocket
        .state::<Config>()
        .expect("Config is managed before migrations run")
        .clone();

    tokio::task::spawn_blocking(move || {
        let mut conn = PgConnection::establish(&config.postgres_url())
            .expect("Failed to connect to annotation_cache database during migrations");

        info!("Running any pending migrations");
        conn.run_pending_migrations(MIGRATIONS)
            .expect("Failed to apply migrations");
    })
    .await
    .expect("Error joining migrations task");

    rocket
}

/// Assembles the Rocket instance from a fully-populated `Config`: the
/// database pool, the coalescer, the mounted routes, migrations-on-ignite,
/// and a shutdown fairing that drains the coalescer. Shared between
/// the production binary and integration tests so both exercise the exact
/// same wiring.
pub fn build_rocket(config: Config) -> Rocket<Build> {
    let pool = db::pool::build_pool(&config.postgres_url(), (config.workers + 1) as u32)
        .expect("Failed to build database connection pool");

    let upstream = UpstreamClient::new(
        config.upstream_url.clone(),
        Duration::from_secs(config.upstream_timeout_seconds),
    );
    let coalescer = Coalescer::new(config.clone(), pool.clone(), upstream, Box::new(HeuristicScorer));
    let shutdown_coalescer = coalescer.clone();

    rocket::build()
        .manage(config)
        .manage(pool)
        .manage(coalescer)
        .mount("/", api::routes())
        .attach(AdHoc::on_ignite("Migrations", run_migrations))
        .attach(AdHoc::on_shutdown("Coalescer drain", move |_| {
            let coalescer = shutdown_coalescer.clone();
            Box::pin(async move {
                coalescer.shutdown().await;
            })
        }))
}
