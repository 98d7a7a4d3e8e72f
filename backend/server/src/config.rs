use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_PORT: &str = "3000";
pub const DEFAULT_DATA_PATH: &str = "./data/gastos.csv";
pub const DEFAULT_LOAD_MODE: &str = "per_request";

#[derive(Error, Debug)]
#[error("Invalid {key} value: {reason}")]
pub struct ConfigError {
    pub key: String,
    pub reason: String,
}

/// How the dataset is materialized for lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Re-read and re-parse the whole file on every request.
    PerRequest,
    /// Load once into a (cidade, ano) index, refreshed on explicit reload.
    Indexed,
}

impl FromStr for LoadMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "per_request" => Ok(Self::PerRequest),
            "indexed" => Ok(Self::Indexed),
            other => Err(format!(
                "unknown load mode `{other}`, expected `per_request` or `indexed`"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub data_path: PathBuf,
    pub load_mode: LoadMode,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Ok(Self {
            port: try_load("PORT", DEFAULT_PORT)?,
            data_path: try_load("GASTOS_DATA_PATH", DEFAULT_DATA_PATH)?,
            load_mode: try_load("GASTOS_LOAD_MODE", DEFAULT_LOAD_MODE)?,
        })
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.is_empty())
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    parse_or_default(key, var(key), default)
}

fn parse_or_default<T: FromStr>(
    key: &str,
    value: Option<String>,
    default: &str,
) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    value
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e: T::Err| {
            warn!("Invalid {key} value: {e}");
            ConfigError {
                key: key.to_string(),
                reason: e.to_string(),
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_unset() {
        let port: u16 = parse_or_default("PORT", None, DEFAULT_PORT).unwrap();
        let path: PathBuf = parse_or_default("GASTOS_DATA_PATH", None, DEFAULT_DATA_PATH).unwrap();
        let mode: LoadMode = parse_or_default("GASTOS_LOAD_MODE", None, DEFAULT_LOAD_MODE).unwrap();

        assert_eq!(port, 3000);
        assert_eq!(path, PathBuf::from("./data/gastos.csv"));
        assert_eq!(mode, LoadMode::PerRequest);
    }

    #[test]
    fn test_explicit_values() {
        let port: u16 = parse_or_default("PORT", Some("8080".into()), DEFAULT_PORT).unwrap();
        let mode: LoadMode =
            parse_or_default("GASTOS_LOAD_MODE", Some("indexed".into()), DEFAULT_LOAD_MODE)
                .unwrap();

        assert_eq!(port, 8080);
        assert_eq!(mode, LoadMode::Indexed);
    }

    #[test]
    fn test_invalid_values() {
        let port = parse_or_default::<u16>("PORT", Some("not-a-port".into()), DEFAULT_PORT);
        let err = port.unwrap_err();
        assert_eq!(err.key, "PORT");

        let mode =
            parse_or_default::<LoadMode>("GASTOS_LOAD_MODE", Some("lazy".into()), DEFAULT_LOAD_MODE);
        assert!(mode.unwrap_err().reason.contains("lazy"));
    }
}
