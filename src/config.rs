//! Configuration loading.
//!
//! Reads the relay configuration file and applies environment variable
//! overrides on top. The GCM API key can come from either place but is
//! never written back out.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::{fs, path::Path, path::PathBuf};

use crate::constants::{APNS_CONNECT_TIMEOUT, HTTP_REQUEST_TIMEOUT};
use crate::socket::framing::FrameCodec;

/// Persistent APNs gateway settings.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct ApnsConfig {
    /// Gateway host name (also used for TLS SNI and verification).
    pub host: String,
    /// Gateway port.
    pub port: u16,
    /// PEM file with the client certificate (and the key if `key_path` is unset).
    pub cert_path: PathBuf,
    /// Separate PEM private key, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_path: Option<PathBuf>,
    /// TCP connect timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for ApnsConfig {
    fn default() -> Self {
        Self {
            host: "gateway.sandbox.push.apple.com".to_string(),
            port: 2195,
            cert_path: PathBuf::from("/path/to/certificate.pem"),
            key_path: None,
            connect_timeout_secs: APNS_CONNECT_TIMEOUT.as_secs(),
        }
    }
}

/// GCM HTTP gateway settings.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct GcmConfig {
    /// Send endpoint.
    pub url: String,
    /// Server API key - NOT serialized back to disk.
    #[serde(skip_serializing)]
    pub api_key: String,
    /// Skip TLS certificate validation towards the endpoint.
    pub accept_invalid_certs: bool,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for GcmConfig {
    fn default() -> Self {
        Self {
            url: "https://android.googleapis.com/gcm/send".to_string(),
            api_key: String::new(),
            accept_invalid_certs: true,
            request_timeout_secs: HTTP_REQUEST_TIMEOUT.as_secs(),
        }
    }
}

/// Configuration for the relay.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Local address the relay binds to.
    pub bind_host: String,
    /// Local port the relay binds to.
    pub bind_port: u16,
    /// APNs gateway.
    pub apns: ApnsConfig,
    /// GCM gateway.
    pub gcm: GcmConfig,
    /// Caller wire protocol tokens.
    pub protocol: FrameCodec,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_host: "127.0.0.1".to_string(),
            bind_port: 9001,
            apns: ApnsConfig::default(),
            gcm: GcmConfig::default(),
            protocol: FrameCodec::default(),
        }
    }
}

impl Config {
    /// Returns the configuration directory path.
    ///
    /// `NTF_RELAY_CONFIG_DIR` wins; otherwise the platform config dir
    /// (e.g. `~/.config/ntf-relay` on Linux).
    pub fn config_dir() -> Result<PathBuf> {
        if let Ok(dir) = std::env::var("NTF_RELAY_CONFIG_DIR") {
            return Ok(PathBuf::from(dir));
        }
        Ok(dirs::config_dir()
            .context("Could not determine config directory")?
            .join("ntf-relay"))
    }

    /// Loads configuration, with environment variable overrides.
    ///
    /// An explicit `path` must exist and parse. Without one, the default
    /// `config.json` is used if present and built-in defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => {
                let default_path = Self::config_dir()?.join("config.json");
                if default_path.exists() {
                    Self::load_from_file(&default_path)?
                } else {
                    log::debug!("No config file at {}, using defaults", default_path.display());
                    Self::default()
                }
            }
        };
        config.apply_env_overrides();
        config.protocol.validate()?;
        Ok(config)
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("NTF_RELAY_BIND_HOST") {
            self.bind_host = host;
        }

        if let Ok(port) = std::env::var("NTF_RELAY_BIND_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.bind_port = port;
            }
        }

        if let Ok(host) = std::env::var("NTF_RELAY_APNS_HOST") {
            self.apns.host = host;
        }

        if let Ok(port) = std::env::var("NTF_RELAY_APNS_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.apns.port = port;
            }
        }

        if let Ok(cert) = std::env::var("NTF_RELAY_APNS_CERT") {
            self.apns.cert_path = PathBuf::from(cert);
        }

        if let Ok(key) = std::env::var("NTF_RELAY_APNS_KEY") {
            self.apns.key_path = Some(PathBuf::from(key));
        }

        if let Ok(url) = std::env::var("NTF_RELAY_GCM_URL") {
            self.gcm.url = url;
        }

        // API key from env var (keeps it out of config files)
        if let Ok(api_key) = std::env::var("NTF_RELAY_GCM_API_KEY") {
            self.gcm.api_key = api_key;
        }
    }

    /// Address the relay listens on.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        let addr = format!("{}:{}", self.bind_host, self.bind_port);
        addr.parse()
            .with_context(|| format!("Invalid bind address: {addr}"))
    }
}
