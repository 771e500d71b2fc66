use gapakerem_catalog::PricingConfig;
use gapakerem_core::payment::DEFAULT_MAX_PROOF_BYTES;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub object_store: ObjectStoreConfig,
    #[serde(default)]
    pub booking: BookingRules,
}

/// Tunables of the booking engine
#[derive(Debug, Deserialize, Clone)]
pub struct BookingRules {
    #[serde(default = "default_free_porters")]
    pub free_porters: u32,
    #[serde(default = "default_porter_surcharge")]
    pub porter_surcharge: i64,
    #[serde(default = "default_max_proof_bytes")]
    pub max_proof_bytes: usize,
}

fn default_free_porters() -> u32 { 3 }
fn default_porter_surcharge() -> i64 { 350_000 }
fn default_max_proof_bytes() -> usize { DEFAULT_MAX_PROOF_BYTES }

impl Default for BookingRules {
    fn default() -> Self {
        Self {
            free_porters: default_free_porters(),
            porter_surcharge: default_porter_surcharge(),
            max_proof_bytes: default_max_proof_bytes(),
        }
    }
}

impl BookingRules {
    pub fn pricing(&self) -> PricingConfig {
        PricingConfig {
            free_porters: self.free_porters,
            porter_surcharge: self.porter_surcharge,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 { 5 }

#[derive(Debug, Deserialize, Clone)]
pub struct ObjectStoreConfig {
    pub upload_url: String,
    pub api_key: String,
    pub api_secret: String,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Optional per-environment overrides
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Untracked local overrides
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `GAPAKEREM_DATABASE__URL=...` sets `database.url`
            .add_source(config::Environment::with_prefix("GAPAKEREM").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
