// Report assembly

//! Report assembler
//!
//! Drives the classification pipeline over a frozen snapshot and merges the
//! three per-interface outputs (interface record, underlay binding, DNS
//! report) into one immutable row per interface, keyed by name. Pure over
//! its inputs: the same snapshot always assembles to the same report.

use crate::classify;
use crate::config::Config;
use crate::dns_trust::{self, DnsContext};
use crate::snapshot::Snapshot;
use crate::types::{EgressInfo, InterfaceRecord, InterfaceType, ReportRow, UnderlayBinding};
use crate::underlay;

/// Build classified interface records from the raw snapshot
///
/// Gateway and metric come from the interface's own preferred default route;
/// absence of a default route leaves both fields empty.
pub fn build_records(snapshot: &Snapshot, config: &Config) -> Vec<InterfaceRecord> {
    snapshot
        .interfaces
        .iter()
        .map(|raw| {
            let interface_type = classify::classify(raw, config);
            let default_route = snapshot
                .routes
                .iter()
                .filter(|r| r.is_default() && r.dev == raw.name)
                .min_by_key(|r| underlay::metric_sort_key(r.metric));

            InterfaceRecord {
                name: raw.name.clone(),
                interface_type,
                hardware: raw.hardware.as_ref().and_then(|hw| hw.descriptor.clone()),
                ipv4: raw.ipv4,
                ipv6: raw.ipv6,
                is_up: raw.oper_up,
                gateway: default_route.and_then(|r| r.gateway),
                metric: default_route.and_then(|r| r.metric),
            }
        })
        .collect()
}

/// Resolve underlay bindings for every VPN-typed record
pub fn resolve_bindings(
    records: &[InterfaceRecord],
    snapshot: &Snapshot,
    config: &Config,
) -> Vec<UnderlayBinding> {
    records
        .iter()
        .filter(|r| r.interface_type == InterfaceType::Vpn)
        .map(|vpn| {
            underlay::resolve_underlay(vpn, records, &snapshot.routes, &snapshot.sockets, config)
        })
        .collect()
}

/// Run the whole engine over one snapshot and assemble the report
///
/// `egress` carries the external lookup result for the active interface, if
/// one was attempted; it has no data dependency on classification and may be
/// absent without affecting any verdict.
pub fn analyze(
    snapshot: &Snapshot,
    config: &Config,
    active_interface: Option<&str>,
    egress: Option<EgressInfo>,
) -> Vec<ReportRow> {
    let records = build_records(snapshot, config);
    let bindings = resolve_bindings(&records, snapshot, config);
    let ctx = DnsContext::build(&records, &snapshot.dns, config);
    let dns_reports = dns_trust::classify_all(&records, &snapshot.dns, &ctx);

    records
        .into_iter()
        .zip(dns_reports)
        .map(|(record, dns)| {
            let binding = bindings.iter().find(|b| b.vpn_name == record.name);
            let carries_vpn = bindings
                .iter()
                .any(|b| b.underlay.as_deref() == Some(record.name.as_str()));
            let row_egress = match active_interface {
                Some(active) if active == record.name => egress.clone(),
                _ => None,
            };

            ReportRow {
                name: record.name,
                interface_type: record.interface_type,
                hardware: record.hardware,
                ipv4: record.ipv4,
                ipv6: record.ipv6,
                is_up: record.is_up,
                gateway: record.gateway,
                metric: record.metric,
                dns_servers: dns.servers,
                current_dns: dns.current,
                dns_verdict: dns.verdict,
                vpn_endpoint: binding.and_then(|b| b.endpoint),
                tunnel_protocol: binding.map(|b| b.protocol),
                underlay: binding.and_then(|b| b.underlay.clone()),
                carries_vpn,
                egress: row_egress,
            }
        })
        .collect()
}
