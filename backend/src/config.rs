//! Server settings read from the process environment.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
    /// Directory holding `scaler.json` and `model.onnx` / `model.json`.
    pub model_dir: PathBuf,
    /// Keys accepted in `X-API-Key` for admin routes. Empty disables the check.
    pub api_keys: Vec<String>,
    pub cors_origins: Vec<String>,
    /// Single predictions allowed per client IP per minute.
    pub rate_limit: u32,
    /// Batch predictions allowed per client IP per minute.
    pub batch_rate_limit: u32,
    pub json_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8000,
            workers: num_cpus::get(),
            model_dir: PathBuf::from("./ml"),
            api_keys: Vec::new(),
            cors_origins: vec![
                "http://localhost:8501".to_string(),
                "http://127.0.0.1:8501".to_string(),
            ],
            rate_limit: 100,
            batch_rate_limit: 20,
            json_limit: 10 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = ServerConfig::default();

        if let Some(host) = lookup("HOST") {
            cfg.host = host;
        }
        if let Some(port) = parse(&lookup, "PORT")? {
            cfg.port = port;
        }
        if let Some(workers) = parse(&lookup, "WORKERS")? {
            cfg.workers = workers;
        }
        if let Some(dir) = lookup("WINE_MODEL_DIR") {
            cfg.model_dir = PathBuf::from(dir);
        }
        if let Some(keys) = lookup("WINE_API_KEYS") {
            cfg.api_keys = split_list(&keys);
        }
        if let Some(origins) = lookup("WINE_CORS_ORIGINS") {
            cfg.cors_origins = split_list(&origins);
        }
        if let Some(limit) = parse(&lookup, "WINE_RATE_LIMIT")? {
            cfg.rate_limit = limit;
        }
        if let Some(limit) = parse(&lookup, "WINE_BATCH_RATE_LIMIT")? {
            cfg.batch_rate_limit = limit;
        }
        if let Some(limit) = parse(&lookup, "WINE_JSON_LIMIT")? {
            cfg.json_limit = limit;
        }

        Ok(cfg)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse<F, T>(lookup: &F, key: &str) -> anyhow::Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("invalid value for {}: {:?}", key, raw))
        })
        .transpose()
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
