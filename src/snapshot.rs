// Immutable raw system snapshot types

//! Raw snapshot records
//!
//! Structured records produced by the snapshot providers and consumed by the
//! classifiers. The engine only ever sees these types; command output formats
//! are an implementation detail of `providers` and never leak past this
//! boundary. A `Snapshot` is captured once per run and is read-only input to
//! every classification step.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

/// Kernel link flags relevant to classification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkFlags {
    /// IFF_UP
    pub up: bool,
    /// IFF_BROADCAST
    pub broadcast: bool,
    /// IFF_POINTOPOINT
    pub pointopoint: bool,
    /// IFF_LOOPBACK
    pub loopback: bool,
}

/// Hardware bus the device sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusKind {
    /// PCI/PCIe device
    Pci,
    /// USB device
    Usb,
}

/// Hardware identity resolved from sysfs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareInfo {
    /// Bus the device is attached to
    pub bus: BusKind,
    /// Kernel driver name, if the driver symlink is readable
    pub driver: Option<String>,
    /// vendor:device ID pair in hex, without 0x prefix
    pub ids: Option<(String, String)>,
    /// True if sysfs exposes the phy80211 marker (802.11 device)
    pub wireless: bool,
    /// Human-readable vendor+model, if the ID lookup resolved
    pub descriptor: Option<String>,
}

/// One raw network interface as captured at snapshot time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawInterface {
    /// Interface name
    pub name: String,
    /// Kernel link flags
    pub flags: LinkFlags,
    /// Kernel link kind (wireguard, tun, bridge, veth, ...), if reported
    pub kind: Option<String>,
    /// MTU, if reported
    pub mtu: Option<u32>,
    /// Operational state (state UP, or state UNKNOWN with IFF_UP set)
    pub oper_up: bool,
    /// First global IPv4 address
    pub ipv4: Option<Ipv4Addr>,
    /// First global IPv6 address
    pub ipv6: Option<Ipv6Addr>,
    /// Hardware identity, absent for software devices
    pub hardware: Option<HardwareInfo>,
}

/// One routing table entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    /// Destination network address (0.0.0.0 or :: for the default route)
    pub dest: IpAddr,
    /// Destination prefix length (0 for the default route)
    pub prefix_len: u8,
    /// Next-hop gateway, absent for on-link routes
    pub gateway: Option<IpAddr>,
    /// Outgoing interface name
    pub dev: String,
    /// Explicit metric, absent when the kernel default applies
    pub metric: Option<u32>,
}

impl RouteEntry {
    /// True if this route's destination prefix covers the given address
    pub fn covers(&self, addr: IpAddr) -> bool {
        match (self.dest, addr) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                if self.prefix_len > 32 {
                    return false;
                }
                let mask = if self.prefix_len == 0 {
                    0
                } else {
                    u32::MAX << (32 - u32::from(self.prefix_len))
                };
                (u32::from(net) & mask) == (u32::from(ip) & mask)
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                if self.prefix_len > 128 {
                    return false;
                }
                let mask = if self.prefix_len == 0 {
                    0
                } else {
                    u128::MAX << (128 - u32::from(self.prefix_len))
                };
                (u128::from(net) & mask) == (u128::from(ip) & mask)
            }
            _ => false,
        }
    }

    /// True if this is a default route
    pub fn is_default(&self) -> bool {
        self.prefix_len == 0
    }
}

/// Transport protocol of a socket table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketProto {
    /// TCP socket
    Tcp,
    /// UDP socket
    Udp,
}

/// One active socket with a known remote peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketEntry {
    /// Transport protocol
    pub proto: SocketProto,
    /// Local address:port
    pub local: SocketAddr,
    /// Remote address:port
    pub remote: SocketAddr,
}

/// Per-interface DNS resolver configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DnsEntry {
    /// Configured DNS servers, in configuration order
    pub servers: Vec<IpAddr>,
    /// The resolver's currently selected server, if reported
    pub current: Option<IpAddr>,
}

/// A single point-in-time capture of all raw network state
///
/// Acquired once, then treated as frozen: every classification step is a
/// pure function over this value, so repeated runs on the same snapshot
/// yield identical reports.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// All interfaces present at capture time, in kernel order
    pub interfaces: Vec<RawInterface>,
    /// IPv4 and IPv6 routing table entries
    pub routes: Vec<RouteEntry>,
    /// Active sockets with a remote peer
    pub sockets: Vec<SocketEntry>,
    /// DNS configuration keyed by interface name
    pub dns: std::collections::HashMap<String, DnsEntry>,
}
