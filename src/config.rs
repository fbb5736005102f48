//! Server configuration loaded from an optional `facestream` config file
//! overridden by `FACESTREAM_*` environment variables (for example
//! `FACESTREAM_PORT` or `FACESTREAM_MODEL_PATH`).

use std::net::SocketAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classifier::DEFAULT_DISTANCE_THRESHOLD;

/// Invalid configuration detected before startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("distance_threshold must be a finite value >= 0, got {0}")]
    InvalidThreshold(f32),

    #[error("n_neighbors must be >= 1 when set")]
    InvalidNeighborCount,

    #[error("retrain is disabled but no model_path is configured")]
    MissingModelPath,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Server bind address
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Root directory of labeled training images (one subdirectory per
    /// identity)
    #[serde(default = "default_train_dir")]
    pub train_dir: PathBuf,

    /// Where to persist the trained classifier; `None` disables persistence
    #[serde(default = "default_model_path")]
    pub model_path: Option<PathBuf>,

    /// Train at startup (`true`) or load the artifact at `model_path`
    /// (`false`)
    #[serde(default = "default_true")]
    pub retrain: bool,

    /// Neighbor count for the k-NN vote; defaults to round(sqrt(examples))
    #[serde(default)]
    pub n_neighbors: Option<usize>,

    /// Maximum nearest-neighbor distance before a face is reported unknown
    #[serde(default = "default_distance_threshold")]
    pub distance_threshold: f32,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            port: default_port(),
            train_dir: default_train_dir(),
            model_path: default_model_path(),
            retrain: true,
            n_neighbors: None,
            distance_threshold: default_distance_threshold(),
            log_level: default_log_level(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from config files and environment variables
    pub fn load() -> anyhow::Result<Self> {
        let builder = config::Config::builder()
            // Load from file if exists
            .add_source(config::File::with_name("facestream").required(false))
            // Override with environment variables
            .add_source(config::Environment::with_prefix("FACESTREAM").separator("__"));

        let config: ServerConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field invariants not expressible through serde.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.distance_threshold.is_finite() || self.distance_threshold < 0.0 {
            return Err(ConfigError::InvalidThreshold(self.distance_threshold));
        }
        if self.n_neighbors == Some(0) {
            return Err(ConfigError::InvalidNeighborCount);
        }
        if !self.retrain && self.model_path.is_none() {
            return Err(ConfigError::MissingModelPath);
        }
        Ok(())
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr_str = format!("{}:{}", self.bind_addr, self.port);
        Ok(addr_str.parse()?)
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8765
}

fn default_train_dir() -> PathBuf {
    PathBuf::from("./known")
}

fn default_model_path() -> Option<PathBuf> {
    Some(PathBuf::from("trained_knn_model.json"))
}

fn default_distance_threshold() -> f32 {
    DEFAULT_DISTANCE_THRESHOLD
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}
