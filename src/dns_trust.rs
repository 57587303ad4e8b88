// DNS trust classification

//! DNS trust classifier
//!
//! Compares each interface's effective DNS servers against the VPN-assigned,
//! ISP-assigned, and well-known public resolver sets and emits a leak
//! verdict. Classification is purely configuration-based (never timing-based)
//! so it is deterministic and reproducible from a frozen snapshot. Multiple
//! servers are evaluated as a set and the worst verdict wins: any leak
//! potential triggers the alarm state even when VPN DNS is also present.

use crate::config::Config;
use crate::snapshot::DnsEntry;
use crate::types::{DnsReport, DnsVerdict, InterfaceRecord, InterfaceType};
use std::collections::{BTreeSet, HashMap};
use std::net::IpAddr;

/// Host-wide DNS categorization, built once per snapshot
///
/// `vpn_dns` is the union of servers advertised on VPN interfaces (the
/// tunnel's own configuration). `isp_dns` is the union of servers on
/// physical interfaces minus `vpn_dns`: a server the tunnel itself pushes is
/// trusted even when it also appears on the underlay.
#[derive(Debug, Clone)]
pub struct DnsContext {
    /// Servers assigned by VPN tunnel configuration
    pub vpn_dns: BTreeSet<IpAddr>,
    /// Servers assigned by the ISP/network (pre-VPN resolution path)
    pub isp_dns: BTreeSet<IpAddr>,
    /// Static public resolver allow-list
    pub public_dns: BTreeSet<IpAddr>,
    /// True if any VPN interface is up with an address
    pub vpn_active: bool,
}

impl DnsContext {
    /// Categorize every configured DNS server by the type of the interface
    /// it is configured on
    pub fn build(
        records: &[InterfaceRecord],
        dns: &HashMap<String, DnsEntry>,
        config: &Config,
    ) -> Self {
        let mut vpn_dns = BTreeSet::new();
        let mut physical_dns = BTreeSet::new();

        for record in records {
            let servers = dns
                .get(&record.name)
                .map(|e| e.servers.as_slice())
                .unwrap_or(&[]);
            match record.interface_type {
                InterfaceType::Vpn => vpn_dns.extend(servers.iter().copied()),
                InterfaceType::Ethernet | InterfaceType::Wireless | InterfaceType::UsbTether => {
                    physical_dns.extend(servers.iter().copied())
                }
                _ => {}
            }
        }

        let isp_dns = &physical_dns - &vpn_dns;

        let vpn_active = records
            .iter()
            .any(|r| r.interface_type == InterfaceType::Vpn && r.is_active());

        Self {
            vpn_dns,
            isp_dns,
            public_dns: config.public_dns_addrs().into_iter().collect(),
            vpn_active,
        }
    }
}

/// Classify the DNS trust of a single interface
///
/// Decision order:
/// 1. no VPN active anywhere on the host, or this interface is not itself a
///    VPN tunnel, or it has no configured DNS → `NotApplicable`
/// 2. any server in the ISP set → `Leak` (takes precedence over everything)
/// 3. every server VPN-assigned → `Ok`
/// 4. any remaining server in the public allow-list → `Public`
/// 5. otherwise → `Warn`
pub fn classify_dns(
    record: &InterfaceRecord,
    servers: &[IpAddr],
    ctx: &DnsContext,
) -> DnsVerdict {
    if !ctx.vpn_active {
        return DnsVerdict::NotApplicable;
    }

    // An interface that is not itself tunnel-protected has no verdict: the
    // underlay's own DNS is definitionally the pre-VPN resolution path.
    if record.interface_type != InterfaceType::Vpn {
        return DnsVerdict::NotApplicable;
    }

    if servers.is_empty() {
        return DnsVerdict::NotApplicable;
    }

    if servers.iter().any(|s| ctx.isp_dns.contains(s)) {
        log::warn!(
            "DNS leak on {}: ISP DNS in configured set {:?}",
            record.name,
            servers
        );
        return DnsVerdict::Leak;
    }

    if servers.iter().all(|s| ctx.vpn_dns.contains(s)) {
        return DnsVerdict::Ok;
    }

    if servers
        .iter()
        .any(|s| !ctx.vpn_dns.contains(s) && ctx.public_dns.contains(s))
    {
        log::info!(
            "{} using public DNS (outside the tunnel trust boundary)",
            record.name
        );
        return DnsVerdict::Public;
    }

    log::warn!("{} using unknown DNS {:?}", record.name, servers);
    DnsVerdict::Warn
}

/// Build a DNS report for every interface in the snapshot
pub fn classify_all(
    records: &[InterfaceRecord],
    dns: &HashMap<String, DnsEntry>,
    ctx: &DnsContext,
) -> Vec<DnsReport> {
    records
        .iter()
        .map(|record| {
            let entry = dns.get(&record.name).cloned().unwrap_or_default();
            let verdict = classify_dns(record, &entry.servers, ctx);
            DnsReport {
                name: record.name.clone(),
                servers: entry.servers,
                current: entry.current,
                verdict,
            }
        })
        .collect()
}
