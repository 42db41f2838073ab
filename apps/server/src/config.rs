use std::{net::SocketAddr, str::FromStr, time::Duration};

use anyhow::Context;
use stockdash_core::AcquisitionConfig;
use stockdash_market_data::EdgeFunctionConfig;

pub struct Config {
    pub listen_addr: SocketAddr,
    pub db_path: String,
    pub cors_allow: Vec<String>,
    pub request_timeout: Duration,
    pub functions_url: String,
    pub functions_key: Option<String>,
    pub quotes_function: String,
    pub provider_timeout: Duration,
    pub min_rows_all: usize,
    pub write_through: bool,
    /// `text` or `json`
    pub log_format: String,
}

impl Default for Config {
    fn default() -> Self {
        let acquisition = AcquisitionConfig::default();
        let edge = EdgeFunctionConfig::default();
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            db_path: "./db/stocks.db".into(),
            cors_allow: vec!["*".into()],
            request_timeout: Duration::from_millis(30_000),
            functions_url: edge.base_url,
            functions_key: None,
            quotes_function: edge.function_name,
            provider_timeout: acquisition.provider_timeout,
            min_rows_all: acquisition.min_rows_all,
            write_through: acquisition.write_through,
            log_format: "text".into(),
        }
    }
}

impl Config {
    /// Reads `SD_*` variables, loading `.env` first. Unset values keep their defaults.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let listen_addr = parse_var("SD_LISTEN_ADDR")?.unwrap_or(defaults.listen_addr);
        let db_path = std::env::var("SD_DB_PATH").unwrap_or(defaults.db_path);
        let cors_allow = std::env::var("SD_CORS_ALLOW_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or(defaults.cors_allow);
        let request_timeout = parse_var::<u64>("SD_REQUEST_TIMEOUT_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.request_timeout);
        let functions_url = std::env::var("SD_FUNCTIONS_URL").unwrap_or(defaults.functions_url);
        let functions_key = std::env::var("SD_FUNCTIONS_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());
        let quotes_function =
            std::env::var("SD_QUOTES_FUNCTION").unwrap_or(defaults.quotes_function);
        let provider_timeout = parse_var::<u64>("SD_PROVIDER_TIMEOUT_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.provider_timeout);
        let min_rows_all = parse_var("SD_MIN_ROWS_ALL")?.unwrap_or(defaults.min_rows_all);
        let write_through = parse_var("SD_WRITE_THROUGH")?.unwrap_or(defaults.write_through);
        let log_format = std::env::var("SD_LOG_FORMAT")
            .ok()
            .map(|format| format.trim().to_ascii_lowercase())
            .filter(|format| !format.is_empty())
            .unwrap_or(defaults.log_format);

        Ok(Self {
            listen_addr,
            db_path,
            cors_allow,
            request_timeout,
            functions_url,
            functions_key,
            quotes_function,
            provider_timeout,
            min_rows_all,
            write_through,
            log_format,
        })
    }

    pub fn acquisition(&self) -> AcquisitionConfig {
        AcquisitionConfig {
            provider_timeout: self.provider_timeout,
            min_rows_all: self.min_rows_all,
            write_through: self.write_through,
            ..AcquisitionConfig::default()
        }
    }

    pub fn edge_function(&self) -> EdgeFunctionConfig {
        EdgeFunctionConfig {
            base_url: self.functions_url.clone(),
            function_name: self.quotes_function.clone(),
            api_key: self.functions_key.clone(),
            ..EdgeFunctionConfig::default()
        }
    }
}

fn parse_var<T>(name: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("Invalid {}: {:?}", name, raw)),
        _ => Ok(None),
    }
}
