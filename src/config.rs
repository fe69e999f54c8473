//! Configuration module for mqtt-mockd
//!
//! Parses environment variables into a strongly-typed configuration struct
//! and loads the responses file it points at.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ResponsesError;
use crate::publisher::QoS;
use crate::response::{MockResponse, ResponseDefinition};
use crate::simulator::SimulatedDevice;

/// Default location of the responses file
const DEFAULT_RESPONSES_FILE: &str = "/config/responses.json";

/// Main configuration struct containing all settings
#[derive(Debug, Clone)]
pub struct Config {
    /// MQTT broker configuration
    pub mqtt: MqttConfig,
    /// Topic filters to listen on for triggers
    pub subscribe_topics: Vec<String>,
    /// JSON file with response definitions, mocks and devices
    pub responses_file: PathBuf,
    /// QoS for generated responses
    pub response_qos: QoS,
    /// Retain flag for generated responses
    pub response_retain: bool,
    /// Enable verbose logging
    pub debug: bool,
}

/// MQTT-specific configuration
#[derive(Debug, Clone)]
pub struct MqttConfig {
    /// Broker hostname/IP
    pub host: String,
    /// Broker TCP port
    pub port: u16,
    /// Username (empty = anonymous)
    pub user: Option<String>,
    /// Password
    pub password: Option<String>,
    /// Prefix for MQTT client IDs
    pub client_id_prefix: String,
    /// Upper bound for a single publish
    pub timeout: Duration,
    /// TLS configuration
    pub tls: Option<TlsConfig>,
}

/// TLS configuration for MQTT
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// CA certificate file path
    pub ca_file: Option<PathBuf>,
    /// CA certificate directory path
    pub ca_path: Option<PathBuf>,
    /// Client certificate path
    pub cert_file: Option<PathBuf>,
    /// Private key path
    pub key_file: Option<PathBuf>,
    /// Skip certificate validation
    pub insecure: bool,
}

/// Configuration error type
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingRequired(&'static str),
    #[error("invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}

/// Contents of the responses file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponsesFile {
    #[serde(default)]
    pub responses: Vec<ResponseDefinition>,
    #[serde(default)]
    pub mock_responses: Vec<MockResponse>,
    #[serde(default)]
    pub devices: Vec<SimulatedDevice>,
}

impl ResponsesFile {
    /// Load from `path`; a missing file is an empty configuration
    pub fn load(path: &Path) -> Result<Self, ResponsesError> {
        let display = path.display().to_string();
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ResponsesError::Read {
                    path: display,
                    source,
                })
            }
        };
        Self::parse(&contents).map_err(|source| ResponsesError::Parse {
            path: display,
            source,
        })
    }

    pub fn parse(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(contents)
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mqtt_host =
            env::var("MQTT_HOST").map_err(|_| ConfigError::MissingRequired("MQTT_HOST"))?;

        let tls_enabled = parse_bool("MQTT_TLS", false);
        let tls = if tls_enabled {
            Some(TlsConfig {
                ca_file: env::var("MQTT_CAFILE").ok().map(PathBuf::from),
                ca_path: env::var("MQTT_CAPATH").ok().map(PathBuf::from),
                cert_file: env::var("MQTT_CERTFILE").ok().map(PathBuf::from),
                key_file: env::var("MQTT_KEYFILE").ok().map(PathBuf::from),
                insecure: parse_bool("MQTT_TLS_INSECURE", false),
            })
        } else {
            None
        };

        let subscribe_topics = parse_list(&env::var("SUBSCRIBE_TOPICS").unwrap_or_default());
        let subscribe_topics = if subscribe_topics.is_empty() {
            vec!["#".to_string()]
        } else {
            subscribe_topics
        };

        let qos_level = parse_u64("RESPONSE_QOS", 1)?;
        let response_qos = u8::try_from(qos_level)
            .ok()
            .and_then(QoS::from_level)
            .ok_or_else(|| ConfigError::InvalidValue("RESPONSE_QOS", qos_level.to_string()))?;

        Ok(Config {
            mqtt: MqttConfig {
                host: mqtt_host,
                port: parse_u16("MQTT_PORT", 1883)?,
                user: env::var("MQTT_USER").ok().filter(|s| !s.is_empty()),
                password: env::var("MQTT_PASSWORD").ok().filter(|s| !s.is_empty()),
                client_id_prefix: env::var("MQTT_CLIENT_ID_PREFIX")
                    .unwrap_or_else(|_| "mqtt-mockd".to_string()),
                timeout: Duration::from_secs(parse_u64("MQTT_TIMEOUT", 10)?),
                tls,
            },
            subscribe_topics,
            responses_file: PathBuf::from(
                env::var("RESPONSES_FILE").unwrap_or_else(|_| DEFAULT_RESPONSES_FILE.to_string()),
            ),
            response_qos,
            response_retain: parse_bool("RESPONSE_RETAIN", false),
            debug: parse_bool("DEBUG", false),
        })
    }

    /// Generate a unique client ID for this instance
    pub fn client_id(&self) -> String {
        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        let pid = std::process::id();
        format!("{}-{}-{}", self.mqtt.client_id_prefix, hostname, pid)
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(default)
}

fn parse_u16(name: &'static str, default: u16) -> Result<u16, ConfigError> {
    match env::var(name) {
        Ok(v) if !v.is_empty() => v.parse().map_err(|_| ConfigError::InvalidValue(name, v)),
        _ => Ok(default),
    }
}

fn parse_u64(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(name) {
        Ok(v) if !v.is_empty() => v.parse().map_err(|_| ConfigError::InvalidValue(name, v)),
        _ => Ok(default),
    }
}
