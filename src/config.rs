use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::path::PathBuf;

pub const ENV_PREFIX: &str = "HOA";

///
/// Runtime settings shared by the CLI and the API server.
///
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AppConfig {
    pub db_path: String,          // SQLite file holding the ledger.
    pub server_address: String,   // The address and port the API server binds to.
    pub actor: String,            // Name written to the audit trail for changes made by this process.
}

impl AppConfig {
    ///
    /// Load settings from HOA_* environment variables (and a .env file if present).
    ///
    pub fn from_env() -> Result<AppConfig> {
        dotenv::dotenv().ok();

        let mut cfg = ::config::Config::default();

        // Merge any environment variables named HOA_<FIELD>.
        cfg.merge(::config::Environment::with_prefix(ENV_PREFIX))?;

        // Set defaults for settings that were not specified.
        cfg.set_default("db_path", "hoa-ledger.db")?;
        cfg.set_default("server_address", "0.0.0.0:3000")?;
        cfg.set_default("actor", "cli")?;

        let config = cfg
            .try_into::<AppConfig>()
            .context("Invalid HOA_* configuration")?;

        Ok(config)
    }

    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.db_path)
    }

    ///
    /// Aligned key/value listing for start-up banners.
    ///
    pub fn fmt_console(&self) -> Result<String> {
        let values = serde_json::to_value(self)?;

        let mut sorted: Vec<_> = values
            .as_object()
            .map(|map| map.iter().collect())
            .unwrap_or_default();
        sorted.sort_by_key(|a| a.0);

        let mut output = String::new();
        for (k, v) in sorted {
            writeln!(&mut output, "{:>16}: {}", k, v)?;
        }

        Ok(output)
    }
}
