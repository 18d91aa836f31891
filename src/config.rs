//! Configuration management for the Gabin bridge
//!
//! Handles loading and validating the YAML configuration file that names the
//! remote control endpoint and the local feedback endpoint.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

/// Root configuration structure
///
/// Immutable for the lifetime of one connection: a new connect tears the
/// transport down and rebuilds it from these values.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BridgeConfig {
    /// IP Gabin listens on for control messages
    #[serde(default = "default_host")]
    pub host: String,

    /// Port Gabin listens on for control messages
    #[serde(default = "default_port")]
    pub port: u16,

    /// Local IP Gabin should push feedback to (bind address)
    #[serde(default = "default_host")]
    pub feedback_host: String,

    /// Local port Gabin should push feedback to
    #[serde(default = "default_feedback_port")]
    pub feedback_port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    32123
}

fn default_feedback_port() -> u16 {
    32124
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            feedback_host: default_host(),
            feedback_port: default_feedback_port(),
        }
    }
}

impl BridgeConfig {
    /// Load and validate configuration from a YAML file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self =
            serde_yaml::from_str(&content).context("Failed to parse config YAML")?;
        config.validate()?;
        Ok(config)
    }

    /// Check that both endpoints are fully specified before a connect is
    /// attempted.
    ///
    /// The feedback port may be 0 (ephemeral bind); the remote port may not.
    pub fn validate(&self) -> Result<()> {
        parse_ipv4(&self.host).context("invalid target IP")?;
        parse_ipv4(&self.feedback_host).context("invalid feedback IP")?;
        if self.port == 0 {
            bail!("target port must be non-zero");
        }
        Ok(())
    }

    /// Remote endpoint control messages are sent to
    pub fn remote_addr(&self) -> Result<SocketAddr> {
        let ip = parse_ipv4(&self.host).context("invalid target IP")?;
        Ok(SocketAddr::new(IpAddr::V4(ip), self.port))
    }

    /// Local endpoint the feedback socket binds to
    pub fn feedback_addr(&self) -> Result<SocketAddr> {
        let ip = parse_ipv4(&self.feedback_host).context("invalid feedback IP")?;
        Ok(SocketAddr::new(IpAddr::V4(ip), self.feedback_port))
    }
}

fn parse_ipv4(value: &str) -> Result<Ipv4Addr> {
    value
        .parse::<Ipv4Addr>()
        .with_context(|| format!("'{value}' is not an IPv4 address"))
}
