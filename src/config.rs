// Configuration file parser

//! Configuration loading and validation
//!
//! All tunable tables live here: the public DNS allow-list, the VPN port
//! table, the USB tether driver list, and the command/API timeouts. Every
//! value has a compiled-in default; an optional TOML file can override any
//! of them. The tables are injected read-only into the classifiers so test
//! fixtures can substitute their own without touching decision logic.

use crate::types::TunnelProtocol;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::net::IpAddr;
use std::path::Path;

/// Engine configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    /// Well-known public resolver addresses (Cloudflare, Google, Quad9)
    pub public_dns: Vec<String>,
    /// VPN endpoint ports, keyed by port number
    pub vpn_ports: Vec<VpnPort>,
    /// Drivers that identify a USB tethering/gadget device
    pub tether_drivers: Vec<String>,
    /// Timeout for each external command invocation (seconds)
    pub command_timeout: u64,
    /// Egress API settings
    pub egress: EgressConfig,
}

/// A known VPN endpoint port and its protocol
#[derive(Debug, Deserialize, Clone)]
pub struct VpnPort {
    /// Remote port number
    pub port: u16,
    /// Protocol the port implies
    pub protocol: TunnelProtocolName,
}

/// Protocol names accepted in the config file
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TunnelProtocolName {
    /// WireGuard (UDP)
    Wireguard,
    /// OpenVPN (UDP or TCP)
    Openvpn,
}

impl From<TunnelProtocolName> for TunnelProtocol {
    fn from(name: TunnelProtocolName) -> Self {
        match name {
            TunnelProtocolName::Wireguard => TunnelProtocol::Wireguard,
            TunnelProtocolName::Openvpn => TunnelProtocol::Openvpn,
        }
    }
}

/// External IP lookup settings
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EgressConfig {
    /// IPv4 lookup endpoint
    pub ipv4_url: String,
    /// IPv6 lookup endpoint
    pub ipv6_url: String,
    /// Request timeout (seconds)
    pub timeout: u64,
    /// IPv4 retry attempts (IPv6 is single-attempt, optional data)
    pub retry_attempts: u32,
}

impl Default for EgressConfig {
    fn default() -> Self {
        Self {
            ipv4_url: "https://ipinfo.io/json".to_string(),
            ipv6_url: "https://v6.ipinfo.io/json".to_string(),
            timeout: 10,
            retry_attempts: 3,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            public_dns: [
                // Cloudflare
                "1.1.1.1",
                "1.0.0.1",
                "2606:4700:4700::1111",
                "2606:4700:4700::1001",
                // Google
                "8.8.8.8",
                "8.8.4.4",
                "2001:4860:4860::8888",
                "2001:4860:4860::8844",
                // Quad9
                "9.9.9.9",
                "149.112.112.112",
                "2620:fe::fe",
                "2620:fe::9",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            vpn_ports: vec![
                VpnPort {
                    port: 51820,
                    protocol: TunnelProtocolName::Wireguard,
                },
                VpnPort {
                    port: 1194,
                    protocol: TunnelProtocolName::Openvpn,
                },
                VpnPort {
                    port: 443,
                    protocol: TunnelProtocolName::Openvpn,
                },
            ],
            tether_drivers: ["cdc_ether", "cdc_mbim", "cdc_ncm", "ipheth", "rndis_host"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            command_timeout: 5,
            egress: EgressConfig::default(),
        }
    }
}

impl Config {
    /// Parse the public DNS list into addresses, skipping entries with a warning
    pub fn public_dns_addrs(&self) -> Vec<IpAddr> {
        self.public_dns
            .iter()
            .filter_map(|s| match s.parse::<IpAddr>() {
                Ok(addr) => Some(addr),
                Err(_) => {
                    log::warn!("Ignoring unparseable public DNS entry: {}", s);
                    None
                }
            })
            .collect()
    }

    /// Look up the tunnel protocol implied by a remote port
    pub fn protocol_for_port(&self, port: u16) -> TunnelProtocol {
        self.vpn_ports
            .iter()
            .find(|p| p.port == port)
            .map(|p| p.protocol.into())
            .unwrap_or(TunnelProtocol::Unknown)
    }

    /// True if the port belongs to the known VPN port table
    pub fn is_vpn_port(&self, port: u16) -> bool {
        self.vpn_ports.iter().any(|p| p.port == port)
    }
}

/// Load configuration from TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let contents = fs::read_to_string(path.as_ref()).context("Failed to read config file")?;

    let config: Config = toml::from_str(&contents).context("Failed to parse config file")?;

    validate_config(&config)?;
    Ok(config)
}

/// Validate configuration values
pub fn validate_config(config: &Config) -> Result<()> {
    if config.vpn_ports.is_empty() {
        anyhow::bail!("vpn_ports cannot be empty");
    }

    if config.command_timeout == 0 {
        anyhow::bail!("command_timeout must be > 0");
    }

    if config.egress.timeout == 0 {
        anyhow::bail!("egress.timeout must be > 0");
    }

    if config.egress.retry_attempts == 0 {
        anyhow::bail!("egress.retry_attempts must be > 0");
    }

    // Public DNS entries must be addresses, not hostnames
    for entry in &config.public_dns {
        entry
            .parse::<IpAddr>()
            .with_context(|| format!("Invalid public DNS address: {}", entry))?;
    }

    Ok(())
}
