// VPN underlay resolution

//! VPN underlay resolver
//!
//! For each VPN-typed interface, determines which physical interface is
//! actually carrying the tunnel's encrypted traffic. The VPN server endpoint
//! is taken from the active socket table (filtered to known VPN ports), then
//! correlated against the routing table with a longest-prefix match that
//! excludes VPN-typed egress devices. Ambiguity is always reported as
//! undetermined, never resolved by guessing: more than one distinct endpoint
//! candidate, or equal-prefix equal-metric routes, yield an absent underlay.

use crate::config::Config;
use crate::snapshot::{RouteEntry, SocketEntry};
use crate::types::{InterfaceRecord, InterfaceType, TunnelProtocol, UnderlayBinding};
use std::collections::{BTreeSet, HashMap};
use std::net::IpAddr;

/// Sort key for route metrics
///
/// Explicit metrics sort ascending; an absent metric means "kernel default"
/// and sorts after every explicit value. Never assume a numeric value for an
/// absent metric.
pub fn metric_sort_key(metric: Option<u32>) -> (u8, u32) {
    match metric {
        Some(m) => (0, m),
        None => (1, 0),
    }
}

/// Interface that owns the preferred default route, if any exists
pub fn default_route_interface(routes: &[RouteEntry]) -> Option<String> {
    routes
        .iter()
        .filter(|r| r.is_default())
        .min_by_key(|r| metric_sort_key(r.metric))
        .map(|r| r.dev.clone())
}

/// Resolve the underlay binding for one VPN interface
///
/// Degrades gracefully: missing sockets or routes produce an undetermined
/// binding, and the interface still appears in the report as VPN-typed.
pub fn resolve_underlay(
    vpn: &InterfaceRecord,
    all: &[InterfaceRecord],
    routes: &[RouteEntry],
    sockets: &[SocketEntry],
    config: &Config,
) -> UnderlayBinding {
    let (endpoint, port) = match find_endpoint(vpn, sockets, config) {
        Some(found) => found,
        None => {
            log::debug!("[{}] VPN server endpoint undetermined", vpn.name);
            return UnderlayBinding::undetermined(&vpn.name);
        }
    };

    let protocol = config.protocol_for_port(port);
    log::debug!(
        "[{}] VPN server endpoint {}:{} ({})",
        vpn.name,
        endpoint,
        port,
        protocol
    );

    let types: HashMap<&str, InterfaceType> = all
        .iter()
        .map(|r| (r.name.as_str(), r.interface_type))
        .collect();

    let underlay = select_route(endpoint, routes, &types).map(|r| r.dev.clone());

    match &underlay {
        Some(dev) => log::info!("[{}] Carried by {}", vpn.name, dev),
        None => log::debug!("[{}] No usable route to {}", vpn.name, endpoint),
    }

    UnderlayBinding {
        vpn_name: vpn.name.clone(),
        underlay,
        endpoint: Some(endpoint),
        protocol,
        port: Some(port),
    }
}

/// Find the VPN server endpoint from the active socket table
///
/// Sockets whose local address is the VPN interface's own address take
/// priority; only if none exist does the search widen to every socket on a
/// known VPN port with a public remote. Exactly one distinct remote address
/// must remain, otherwise the endpoint is undetermined.
fn find_endpoint(
    vpn: &InterfaceRecord,
    sockets: &[SocketEntry],
    config: &Config,
) -> Option<(IpAddr, u16)> {
    let on_vpn_port = |s: &&SocketEntry| {
        config.is_vpn_port(s.remote.port()) && !is_private_or_cgnat(s.remote.ip())
    };

    let from_local = |s: &&SocketEntry| {
        let local = s.local.ip();
        Some(local) == vpn.ipv4.map(IpAddr::V4) || Some(local) == vpn.ipv6.map(IpAddr::V6)
    };

    let candidates: Vec<&SocketEntry> = {
        let local_matches: Vec<&SocketEntry> = sockets
            .iter()
            .filter(on_vpn_port)
            .filter(from_local)
            .collect();
        if local_matches.is_empty() {
            sockets.iter().filter(on_vpn_port).collect()
        } else {
            local_matches
        }
    };

    // BTreeSet keeps the distinct-count check deterministic
    let remotes: BTreeSet<IpAddr> = candidates.iter().map(|s| s.remote.ip()).collect();

    match remotes.len() {
        1 => {
            let remote = *remotes.iter().next()?;
            let port = candidates
                .iter()
                .find(|s| s.remote.ip() == remote)
                .map(|s| s.remote.port())?;
            Some((remote, port))
        }
        0 => None,
        n => {
            log::warn!(
                "[{}] {} distinct VPN endpoint candidates, refusing to guess",
                vpn.name,
                n
            );
            None
        }
    }
}

/// Longest-prefix route selection for the endpoint address
///
/// Routes whose egress device is VPN-typed are skipped (a VPN-over-VPN
/// lookup must not resolve back onto a tunnel), and routes referencing an
/// interface absent from the snapshot are skipped with a warning. Equal
/// prefix lengths are broken by metric; a remaining tie is undetermined.
fn select_route<'a>(
    endpoint: IpAddr,
    routes: &'a [RouteEntry],
    types: &HashMap<&str, InterfaceType>,
) -> Option<&'a RouteEntry> {
    let mut matching: Vec<&RouteEntry> = Vec::new();

    for route in routes.iter().filter(|r| r.covers(endpoint)) {
        match types.get(route.dev.as_str()) {
            None => {
                log::warn!(
                    "Route {}/{} references unknown interface {}, skipping",
                    route.dest,
                    route.prefix_len,
                    route.dev
                );
            }
            Some(InterfaceType::Vpn) => {
                log::debug!(
                    "Skipping route via VPN interface {} for endpoint lookup",
                    route.dev
                );
            }
            Some(_) => matching.push(route),
        }
    }

    let best_prefix = matching.iter().map(|r| r.prefix_len).max()?;
    let mut best: Vec<&RouteEntry> = matching
        .into_iter()
        .filter(|r| r.prefix_len == best_prefix)
        .collect();

    best.sort_by_key(|r| metric_sort_key(r.metric));

    if best.len() > 1 && metric_sort_key(best[0].metric) == metric_sort_key(best[1].metric) {
        log::warn!(
            "Equal-metric routes to {} via {} and {}, underlay undetermined",
            endpoint,
            best[0].dev,
            best[1].dev
        );
        return None;
    }

    best.first().copied()
}

/// True if the address is private, loopback, link-local, or CGNAT
fn is_private_or_cgnat(addr: IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => {
            let octets = v4.octets();
            v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                // CGNAT: 100.64.0.0/10
                || (octets[0] == 100 && (octets[1] & 0xc0) == 64)
        }
        IpAddr::V6(v6) => {
            let segments = v6.segments();
            v6.is_loopback()
                // Unique local fc00::/7
                || (segments[0] & 0xfe00) == 0xfc00
                // Link local fe80::/10
                || (segments[0] & 0xffc0) == 0xfe80
        }
    }
}
