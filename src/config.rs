//! Layered server configuration.
//!
//! Merge order, later layers winning:
//! 1. compiled defaults
//! 2. `./chatterbox.toml`
//! 3. `CHATTERBOX_*` environment variables (`__` separates sections)
//! 4. `DB_URI`, which only sets the database URL

use std::net::SocketAddr;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use percent_encoding::percent_decode_str;
use url::Url;

pub const CONFIG_FILE: &str = "chatterbox.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_address")]
    pub address: SocketAddr,

    #[serde(default)]
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// `sqlite:///relative.db`, `sqlite:////absolute.db`, `sqlite://` or a bare path.
    #[serde(default = "default_database_url")]
    pub url: String,

    #[serde(default = "default_pool_size")]
    pub pool_size: u32,

    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 5000))
}

fn default_database_url() -> String {
    "sqlite:///app.db".to_string()
}

fn default_pool_size() -> u32 {
    4
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

impl Default for Config {
    fn default() -> Self {
        Config {
            address: default_address(),
            database: DatabaseConfig::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            url: default_database_url(),
            pool_size: default_pool_size(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Config, figment::Error> {
        Self::figment().extract()
    }

    pub fn figment() -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed("CHATTERBOX_").split("__"))
            .merge(Env::raw().only(&["db_uri"]).map(|_| "database.url".into()))
    }
}

impl DatabaseConfig {
    /// Resolves the configured URL into what SQLite expects to open.
    ///
    /// Three slashes after the scheme mean a relative path, four an absolute one.
    pub fn database_path(&self) -> Result<String, url::ParseError> {
        let url = match Url::parse(&self.url) {
            Ok(url) => url,
            // Plain paths such as `app.db` have no scheme at all.
            Err(url::ParseError::RelativeUrlWithoutBase) => return Ok(self.url.clone()),
            Err(error) => return Err(error),
        };

        match url.scheme() {
            "sqlite" => {
                let decoded = percent_decode_str(url.path()).decode_utf8_lossy();
                let path = decoded.strip_prefix('/').unwrap_or(&decoded);
                if path.is_empty() {
                    Ok(":memory:".to_string())
                } else {
                    Ok(path.to_string())
                }
            }
            // `file:` URIs and Windows drive letters go to SQLite untouched.
            _ => Ok(self.url.clone()),
        }
    }
}
