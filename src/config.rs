use std::{net::SocketAddr, path::PathBuf};

use anyhow::Context;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_AI_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub ai: AiConfig,
    pub public_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct AiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_owned(),
            base_url: DEFAULT_AI_BASE_URL.to_owned(),
        }
    }
}

impl Config {
    /// Reads the process environment. Call `dotenv::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> anyhow::Result<Config> {
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Config> {
        // empty values count as unset, like the rest of the deployment tooling
        let var = |key: &str| var(key).filter(|value| !value.trim().is_empty());

        let port = match var("PORT") {
            Some(port) => port.parse().with_context(|| format!("invalid PORT {port:?}"))?,
            None => DEFAULT_PORT,
        };

        Ok(Config {
            host: var("HOST").unwrap_or("0.0.0.0".to_owned()),
            port,
            database_url: var("DATABASE_URL"),
            ai: AiConfig {
                api_key: var("OPENAI_API_KEY"),
                model: var("OPENAI_MODEL").unwrap_or(DEFAULT_MODEL.to_owned()),
                base_url: var("OPENAI_BASE_URL")
                    .map(|url| url.trim_end_matches('/').to_owned())
                    .unwrap_or(DEFAULT_AI_BASE_URL.to_owned()),
            },
            public_dir: var("PUBLIC_DIR").unwrap_or("public".to_owned()).into(),
        })
    }

    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}
