use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Deserialize;

/// All configuration options, assembled from environment variables with an `APP_`
/// prefix plus the documented defaults. One `Config` is built at startup and
/// shared between the Rocket figment (for the DB pool) and the `Coalescer`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub upstream_url: String,
    pub workers: usize,
    pub batch_max_size: usize,
    pub batch_wait_seconds: f64,
    pub retry_max: u32,
    pub upstream_timeout_seconds: u64,
    pub shutdown_grace_seconds: u64,

    pub db_host: String,
    pub db_port: u16,
    pub db_user: String,
    pub db_password: String,
    pub db_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            upstream_url: "https://rest.ensembl.org/vep/human/region".to_string(),
            workers: 3,
            batch_max_size: 200,
            batch_wait_seconds: 5.0,
            retry_max: 3,
            upstream_timeout_seconds: 300,
            shutdown_grace_seconds: 30,

            db_host: "localhost".to_string(),
            db_port: 5432,
            db_user: "annotation_user".to_string(),
            db_password: String::new(),
            db_name: "annotation_cache".to_string(),
        }
    }
}

impl Config {
    pub fn from_environment() -> Self {
        figment::Figment::from(figment::providers::Serialized::defaults(Config::default()))
            .merge(figment::providers::Env::prefixed("APP_"))
            .extract()
            .expect("configuration environment variables invalid")
    }

    /// Postgres connection string built from the `db_*` fields, with the
    /// password percent-encoded so special characters survive the URL.
    pub fn postgres_url(&self) -> String {
        let password = utf8_percent_encode(&self.db_password, NON_ALPHANUMERIC);
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.db_user, password, self.db_host, self.db_port, self.db_name
        )
    }
}
