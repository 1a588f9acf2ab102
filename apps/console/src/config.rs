use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::{Path, PathBuf},
};

use tracing::{debug, warn};

pub const DEFAULT_CONFIG_FILE: &str = "console.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct ConsoleSettings {
    pub server_url: String,
    pub session_file: PathBuf,
    pub base_coin: String,
    /// Latest prices quoted in BTC.
    pub prices: BTreeMap<String, f64>,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8443".into(),
            session_file: PathBuf::from("./data/session.json"),
            base_coin: "BTC".into(),
            prices: [
                ("BTC", 1.0),
                ("USD", 0.000016),
                ("ETH", 0.052),
                ("EOS", 0.000011),
                ("BNB", 0.0085),
                ("CNY", 0.0000022),
            ]
            .into_iter()
            .map(|(sym, price)| (sym.to_string(), price))
            .collect(),
        }
    }
}

/// Defaults, then the config file, then `LEDGER_*` env vars. CLI flags are
/// applied by the caller.
pub fn load_settings(config_path: Option<&Path>) -> ConsoleSettings {
    let mut settings = ConsoleSettings::default();

    let path = config_path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
    match fs::read_to_string(path) {
        Ok(raw) => apply_file_settings(&mut settings, &raw),
        Err(err) if config_path.is_some() => {
            warn!(path = %path.display(), error = %err, "could not read config file")
        }
        Err(_) => debug!(path = %path.display(), "no config file"),
    }

    apply_env_settings(&mut settings, |key| std::env::var(key).ok());
    settings
}

pub(crate) fn apply_env_settings(
    settings: &mut ConsoleSettings,
    lookup: impl Fn(&str) -> Option<String>,
) {
    if let Some(v) = lookup("LEDGER_SERVER_URL").filter(|v| !v.trim().is_empty()) {
        settings.server_url = v;
    }
    if let Some(v) = lookup("LEDGER_SESSION_FILE").filter(|v| !v.trim().is_empty()) {
        settings.session_file = PathBuf::from(v);
    }
    if let Some(v) = lookup("LEDGER_BASE_COIN").filter(|v| !v.trim().is_empty()) {
        settings.base_coin = v.trim().to_uppercase();
    }
}

pub(crate) fn apply_file_settings(settings: &mut ConsoleSettings, raw: &str) {
    let file_cfg = match toml::from_str::<HashMap<String, toml::Value>>(raw) {
        Ok(cfg) => cfg,
        Err(error) => {
            warn!(%error, "ignoring malformed console config");
            return;
        }
    };

    if let Some(v) = file_cfg.get("server_url").and_then(toml::Value::as_str) {
        settings.server_url = v.to_string();
    }
    if let Some(v) = file_cfg.get("session_file").and_then(toml::Value::as_str) {
        settings.session_file = PathBuf::from(v);
    }
    if let Some(v) = file_cfg.get("base_coin").and_then(toml::Value::as_str) {
        settings.base_coin = v.trim().to_uppercase();
    }
    if let Some(prices) = file_cfg.get("prices").and_then(toml::Value::as_table) {
        for (sym, value) in prices {
            let price = value
                .as_float()
                .or_else(|| value.as_integer().map(|v| v as f64));
            match price {
                Some(price) => {
                    settings.prices.insert(sym.to_uppercase(), price);
                }
                None => warn!(%sym, "ignoring non-numeric price"),
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
