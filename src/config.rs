use std::net::IpAddr;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub store: Option<StoreConfig>,
    pub queue_dir: PathBuf,
    pub max_body_size: usize,
    pub request_timeout_secs: u64,
    pub sync_on_start: bool,
    pub dev_admin_email: String,
    pub log_level: String,
}

/// Connection details for the hosted data store. Absent when the environment
/// carries no credentials; every remote operation then fails with a
/// configuration error instead of a transient one.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub url: String,
    pub key: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let host: IpAddr = env_or("FORMGATE_HOST", "0.0.0.0")
            .parse()
            .map_err(|e| format!("Invalid FORMGATE_HOST: {e}"))?;

        let port: u16 = env_or("FORMGATE_PORT", "3000")
            .parse()
            .map_err(|e| format!("Invalid FORMGATE_PORT: {e}"))?;

        let store = match (
            std::env::var("FORMGATE_STORE_URL").ok(),
            std::env::var("FORMGATE_STORE_KEY").ok(),
        ) {
            (Some(url), Some(key)) => Some(StoreConfig {
                url: url.trim_end_matches('/').to_string(),
                key,
            }),
            _ => None,
        };

        let queue_dir = PathBuf::from(env_or("FORMGATE_QUEUE_DIR", "data"));

        let max_body_size: usize = env_or("FORMGATE_MAX_BODY_SIZE", "10485760")
            .parse()
            .map_err(|e| format!("Invalid FORMGATE_MAX_BODY_SIZE: {e}"))?;

        let request_timeout_secs: u64 = env_or("FORMGATE_REQUEST_TIMEOUT_SECS", "30")
            .parse()
            .map_err(|e| format!("Invalid FORMGATE_REQUEST_TIMEOUT_SECS: {e}"))?;

        let sync_on_start = env_or("FORMGATE_SYNC_ON_START", "true") != "false";

        let dev_admin_email = env_or("FORMGATE_DEV_ADMIN_EMAIL", "dev@localhost");

        let log_level = env_or("FORMGATE_LOG_LEVEL", "info");

        Ok(Config {
            host,
            port,
            store,
            queue_dir,
            max_body_size,
            request_timeout_secs,
            sync_on_start,
            dev_admin_email,
            log_level,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
