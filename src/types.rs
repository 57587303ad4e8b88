// Shared classification types and per-interface report records

//! Shared data structures
//!
//! This module defines the closed classification enums and the immutable
//! per-interface records produced by the engine: the interface record, the
//! VPN underlay binding, the DNS verdict, and the assembled report row.

use serde::Serialize;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Interface classification types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InterfaceType {
    /// The canonical loopback device (`lo`)
    Loopback,
    /// Wired PCI/USB Ethernet controller
    Ethernet,
    /// 802.11 wireless device
    Wireless,
    /// VPN tunnel device (WireGuard/OpenVPN/tun/tap/ppp)
    Vpn,
    /// USB phone tethering (cdc_ether, ipheth, rndis_host, ...)
    UsbTether,
    /// Bridge master (docker0, br0, virbr0, ...)
    Bridge,
    /// Software device with no backing hardware (veth, vlan, ...)
    Virtual,
    /// Could not be classified
    Unknown,
}

impl fmt::Display for InterfaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InterfaceType::Loopback => "loopback",
            InterfaceType::Ethernet => "ethernet",
            InterfaceType::Wireless => "wireless",
            InterfaceType::Vpn => "vpn",
            InterfaceType::UsbTether => "tether",
            InterfaceType::Bridge => "bridge",
            InterfaceType::Virtual => "virtual",
            InterfaceType::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Tunnel protocol detected from the VPN endpoint socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TunnelProtocol {
    /// UDP port 51820
    Wireguard,
    /// UDP 1194 or TCP 443/1194
    Openvpn,
    /// Port did not match a known tunnel protocol
    Unknown,
}

impl fmt::Display for TunnelProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TunnelProtocol::Wireguard => "WireGuard",
            TunnelProtocol::Openvpn => "OpenVPN",
            TunnelProtocol::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// DNS trust verdict for a single interface
///
/// Verdict meanings:
/// - `Ok`: using VPN-assigned DNS (queries stay inside the tunnel)
/// - `Public`: using a well-known public resolver (not leaking to the ISP,
///   but outside the tunnel's trust boundary)
/// - `Leak`: using ISP-assigned DNS while a VPN is active
/// - `Warn`: using DNS that matches none of the known sets
/// - `NotApplicable`: no VPN active, or no DNS configured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DnsVerdict {
    /// Using VPN-assigned DNS
    Ok,
    /// Using a well-known public resolver
    Public,
    /// Using ISP-assigned DNS while a VPN is active
    Leak,
    /// Using DNS outside every known set
    Warn,
    /// No VPN active, not a tunnel, or no DNS configured
    NotApplicable,
}

impl fmt::Display for DnsVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DnsVerdict::Ok => "OK",
            DnsVerdict::Public => "PUBLIC",
            DnsVerdict::Leak => "LEAK",
            DnsVerdict::Warn => "WARN",
            DnsVerdict::NotApplicable => "--",
        };
        f.write_str(s)
    }
}

/// One classified network interface
///
/// Constructed once from the snapshot, immutable afterwards. Absent fields
/// mean the underlying data source could not supply the value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterfaceRecord {
    /// Interface name (unique key)
    pub name: String,
    /// Classification result
    pub interface_type: InterfaceType,
    /// Human-readable hardware descriptor, if resolvable
    pub hardware: Option<String>,
    /// First global IPv4 address
    pub ipv4: Option<Ipv4Addr>,
    /// First global IPv6 address
    pub ipv6: Option<Ipv6Addr>,
    /// Operational state
    pub is_up: bool,
    /// Default gateway for this interface
    pub gateway: Option<IpAddr>,
    /// Explicit route metric of the default route, if any
    pub metric: Option<u32>,
}

impl InterfaceRecord {
    /// True if the interface is up and has at least one address assigned
    pub fn is_active(&self) -> bool {
        self.is_up && (self.ipv4.is_some() || self.ipv6.is_some())
    }
}

/// Binding of a VPN interface to the physical interface carrying its traffic
///
/// `underlay`, if present, names a non-VPN interface whose route covers the
/// server endpoint. An absent underlay with a present endpoint means the
/// binding is undetermined, which is distinct from "no VPN active".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnderlayBinding {
    /// Name of the VPN interface
    pub vpn_name: String,
    /// Name of the carrying interface, if determinable
    pub underlay: Option<String>,
    /// VPN server endpoint address, if determinable
    pub endpoint: Option<IpAddr>,
    /// Detected tunnel protocol
    pub protocol: TunnelProtocol,
    /// Remote port of the endpoint socket
    pub port: Option<u16>,
}

impl UnderlayBinding {
    /// An undetermined binding for the given VPN interface
    pub fn undetermined(vpn_name: &str) -> Self {
        Self {
            vpn_name: vpn_name.to_string(),
            underlay: None,
            endpoint: None,
            protocol: TunnelProtocol::Unknown,
            port: None,
        }
    }
}

/// Per-interface DNS trust classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DnsReport {
    /// Interface name
    pub name: String,
    /// Effective DNS servers in configuration order
    pub servers: Vec<IpAddr>,
    /// Currently selected DNS server, if the resolver reports one
    pub current: Option<IpAddr>,
    /// Trust verdict
    pub verdict: DnsVerdict,
}

/// External IP and ISP information from the egress lookup API
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EgressInfo {
    /// External IPv4 address
    pub external_ip: String,
    /// External IPv6 address, or "N/A" when the host has no IPv6 egress
    pub external_ipv6: String,
    /// ISP name with AS number, as reported by the API
    pub isp: String,
    /// Two-letter country code
    pub country: String,
}

impl EgressInfo {
    /// Marker value when the API query was attempted but failed
    pub fn query_failed() -> Self {
        Self {
            external_ip: "QUERY FAILED".to_string(),
            external_ipv6: "QUERY FAILED".to_string(),
            isp: "QUERY FAILED".to_string(),
            country: "QUERY FAILED".to_string(),
        }
    }
}

/// One assembled report row: the union of the per-interface records
///
/// Keyed by interface name. Constructed once by the report assembler and
/// immutable afterwards; the display and export layers only read it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    /// Interface name
    pub name: String,
    /// Classification result
    pub interface_type: InterfaceType,
    /// Hardware descriptor, if resolvable
    pub hardware: Option<String>,
    /// Internal IPv4 address
    pub ipv4: Option<Ipv4Addr>,
    /// Internal IPv6 address
    pub ipv6: Option<Ipv6Addr>,
    /// Operational state
    pub is_up: bool,
    /// Default gateway
    pub gateway: Option<IpAddr>,
    /// Default route metric
    pub metric: Option<u32>,
    /// Configured DNS servers
    pub dns_servers: Vec<IpAddr>,
    /// Currently selected DNS server
    pub current_dns: Option<IpAddr>,
    /// DNS trust verdict
    pub dns_verdict: DnsVerdict,
    /// VPN server endpoint (VPN interfaces only)
    pub vpn_endpoint: Option<IpAddr>,
    /// Detected tunnel protocol (VPN interfaces only)
    pub tunnel_protocol: Option<TunnelProtocol>,
    /// Interface carrying this tunnel's traffic (VPN interfaces only)
    pub underlay: Option<String>,
    /// True if this interface is the underlay of some VPN tunnel
    pub carries_vpn: bool,
    /// External IP/ISP data (active interface only)
    pub egress: Option<EgressInfo>,
}
