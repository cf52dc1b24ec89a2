use diesel::Connection;
use diesel::pg::PgConnection;
use diesel::sql_query;
use diesel::RunQueryDsl;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use rocket::local::asynchronous::Client;
use variant_annotation_cache::build_rocket;
use variant_annotation_cache::config::Config;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Scenario-test configuration: a scratch database plus a small
/// `B_max`/`T_wait`/`R_max` so size- and timer-trigger scenarios run in
/// well under a second instead of the production defaults (200/5s/3).
pub fn test_config(upstream_url: String) -> Config {
    Config {
        upstream_url,
        workers: 2,
        batch_max_size: 3,
        batch_wait_seconds: 0.2,
        retry_max: 2,
        upstream_timeout_seconds: 5,
        shutdown_grace_seconds: 1,
        db_host: std::env::var("TEST_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
        db_port: std::env::var("TEST_DB_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(5432),
        db_user: std::env::var("TEST_DB_USER").unwrap_or_else(|_| "annotation_user".to_string()),
        db_password: std::env::var("TEST_DB_PASSWORD").unwrap_or_default(),
        db_name: std::env::var("TEST_DB_NAME").unwrap_or_else(|_| "annotation_cache_test".to_string()),
    }
}

/// Runs migrations and truncates both tables so each scenario starts empty,
/// mirroring the teacher's own `get_db` scratch-database test fixture.
pub fn reset_database(config: &Config) {
    let mut conn = PgConnection::establish(&config.postgres_url())
        .expect("Failed to connect to the scenario test database");
    conn.run_pending_migrations(MIGRATIONS)
        .expect("Failed to apply migrations to the scenario test database");
    sql_query("TRUNCATE TABLE transcripts, annotations")
        .execute(&mut conn)
        .expect("Failed to truncate scenario test tables");
}

pub async fn client_for(config: Config) -> Client {
    reset_database(&config);
    let rocket = build_rocket(config);
    Client::tracked(rocket)
        .await
        .expect("Rocket failed to ignite for scenario test")
}
