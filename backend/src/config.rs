//! Environment-driven configuration.

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::ai::ClassifierConfig;
use crate::fiscal::FiscalConfig;

/// Process configuration, loaded once at startup. Every value has a
/// development default so a bare `cargo run` comes up working.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the JSON data files.
    pub data_dir: PathBuf,
    pub listen_addr: SocketAddr,
    /// Frontend origin allowed by CORS (credentialed requests need an
    /// explicit origin, not a wildcard).
    pub cors_origin: String,
    pub pin_egor: String,
    pub pin_syoma: String,
    pub fiscal: FiscalConfig,
    pub classifier: ClassifierConfig,
}

impl Config {
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        Self {
            data_dir: std::env::var("BUDGET_DATA_DIR")
                .ok()
                .filter(|d| !d.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data")),
            listen_addr: SocketAddr::from(([127, 0, 0, 1], port)),
            cors_origin: std::env::var("CORS_ORIGIN")
                .ok()
                .filter(|o| !o.is_empty())
                .unwrap_or_else(|| "http://localhost:5173".to_string()),
            pin_egor: std::env::var("PIN_EGOR").unwrap_or_else(|_| "1329".to_string()),
            pin_syoma: std::env::var("PIN_SYOMA").unwrap_or_else(|_| "3415".to_string()),
            fiscal: FiscalConfig::from_env(),
            classifier: ClassifierConfig::from_env(),
        }
    }
}
