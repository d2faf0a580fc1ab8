use std::path::PathBuf;
use std::str::FromStr;

use crate::limits::MAX_PAYMENT_METHOD_LEN;
use crate::payment::DEFAULT_PAYMENT_METHOD;

/// Server settings, read from `RENTD_*` environment variables.
/// Unset or unparseable values fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub bind: String,
    pub data_dir: PathBuf,
    pub password: String,
    pub max_connections: usize,
    pub compact_threshold: u64,
    pub metrics_port: Option<u16>,
    pub payment_method: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5480,
            bind: "0.0.0.0".into(),
            data_dir: PathBuf::from("./data"),
            password: "rentd".into(),
            max_connections: 256,
            compact_threshold: 1000,
            metrics_port: None,
            payment_method: DEFAULT_PAYMENT_METHOD.into(),
        }
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|s| s.parse().ok())
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let payment_method = match lookup("RENTD_PAYMENT_METHOD") {
            Some(m) if !m.is_empty() && m.len() <= MAX_PAYMENT_METHOD_LEN => m,
            Some(m) => {
                tracing::warn!("ignoring RENTD_PAYMENT_METHOD={m:?}");
                defaults.payment_method
            }
            None => defaults.payment_method,
        };

        Self {
            port: parsed(&lookup, "RENTD_PORT").unwrap_or(defaults.port),
            bind: lookup("RENTD_BIND").unwrap_or(defaults.bind),
            data_dir: lookup("RENTD_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            password: lookup("RENTD_PASSWORD").unwrap_or(defaults.password),
            max_connections: parsed(&lookup, "RENTD_MAX_CONNECTIONS")
                .filter(|&n: &usize| n > 0)
                .unwrap_or(defaults.max_connections),
            compact_threshold: parsed(&lookup, "RENTD_COMPACT_THRESHOLD").unwrap_or(defaults.compact_threshold),
            metrics_port: parsed(&lookup, "RENTD_METRICS_PORT"),
            payment_method,
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("rentd.wal")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| env.get(k).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = from_pairs(&[]);
        assert_eq!(config, Config::default());
        assert_eq!(config.listen_addr(), "0.0.0.0:5480");
        assert_eq!(config.wal_path(), PathBuf::from("./data/rentd.wal"));
        assert_eq!(config.payment_method, "credit_card");
    }

    #[test]
    fn reads_overrides() {
        let config = from_pairs(&[
            ("RENTD_PORT", "6000"),
            ("RENTD_BIND", "127.0.0.1"),
            ("RENTD_DATA_DIR", "/var/lib/rentd"),
            ("RENTD_PASSWORD", "hunter2"),
            ("RENTD_MAX_CONNECTIONS", "8"),
            ("RENTD_COMPACT_THRESHOLD", "50"),
            ("RENTD_METRICS_PORT", "9100"),
            ("RENTD_PAYMENT_METHOD", "debit_card"),
        ]);
        assert_eq!(config.listen_addr(), "127.0.0.1:6000");
        assert_eq!(config.wal_path(), PathBuf::from("/var/lib/rentd/rentd.wal"));
        assert_eq!(config.password, "hunter2");
        assert_eq!(config.max_connections, 8);
        assert_eq!(config.compact_threshold, 50);
        assert_eq!(config.metrics_port, Some(9100));
        assert_eq!(config.payment_method, "debit_card");
    }

    #[test]
    fn bad_values_fall_back() {
        let long_method = "x".repeat(MAX_PAYMENT_METHOD_LEN + 1);
        let config = from_pairs(&[
            ("RENTD_PORT", "not-a-port"),
            ("RENTD_MAX_CONNECTIONS", "0"),
            ("RENTD_METRICS_PORT", "99999"),
            ("RENTD_PAYMENT_METHOD", &long_method),
        ]);
        assert_eq!(config.port, 5480);
        assert_eq!(config.max_connections, 256);
        assert_eq!(config.metrics_port, None);
        assert_eq!(config.payment_method, "credit_card");
    }
}
