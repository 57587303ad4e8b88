// Table rendering and JSON export

//! Report output
//!
//! Two presentation layers over the assembled report rows: a color-coded
//! terminal table and a JSON export with run metadata. Both only read the
//! rows; all analysis happens upstream.

use crate::types::{DnsVerdict, InterfaceType, ReportRow};
use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use std::io::Write;
use std::net::IpAddr;

const GREEN: &str = "\x1b[92m";
const CYAN: &str = "\x1b[96m";
const RED: &str = "\x1b[91m";
const YELLOW: &str = "\x1b[93m";
const RESET: &str = "\x1b[0m";

/// Column headers and widths for the table
const COLUMNS: &[(&str, usize)] = &[
    ("INTERFACE", 15),
    ("TYPE", 10),
    ("DEVICE", 20),
    ("INTERNAL_IPv4", 15),
    ("INTERNAL_IPv6", 25),
    ("DNS_SERVER", 20),
    ("DNS", 8),
    ("VPN_ENDPOINT", 18),
    ("UNDERLAY", 10),
    ("EXTERNAL_IPv4", 15),
    ("ISP", 15),
    ("COUNTRY", 8),
    ("GATEWAY", 15),
    ("METRIC", 8),
];

const SEPARATOR: &str = "   ";

/// Render the color-coded table to the given writer
pub fn write_table<W: Write>(out: &mut W, rows: &[ReportRow], color: bool) -> Result<()> {
    let total: usize =
        COLUMNS.iter().map(|(_, w)| w).sum::<usize>() + SEPARATOR.len() * (COLUMNS.len() - 1);
    let rule = "=".repeat(total);

    writeln!(out, "{}", rule)?;
    writeln!(out, "Network Interface Analysis")?;
    writeln!(out, "{}", rule)?;

    let header: Vec<String> = COLUMNS
        .iter()
        .map(|(name, width)| format!("{:<width$}", name, width = width))
        .collect();
    writeln!(out, "{}", header.join(SEPARATOR))?;
    writeln!(out, "{}", rule)?;

    for row in rows {
        let cells = row_cells(row);
        let parts: Vec<String> = COLUMNS
            .iter()
            .zip(cells)
            .map(|((_, width), cell)| format!("{:<width$}", shorten(&cell, *width), width = width))
            .collect();
        let line = parts.join(SEPARATOR);

        match row_color(row).filter(|_| color) {
            Some(c) => writeln!(out, "{}{}{}", c, line, RESET)?,
            None => writeln!(out, "{}", line)?,
        }
    }

    writeln!(out, "{}", rule)?;
    write_legend(out, color)?;
    Ok(())
}

fn row_cells(row: &ReportRow) -> Vec<String> {
    let opt_ip = |ip: Option<IpAddr>| ip.map(|a| a.to_string()).unwrap_or_else(|| "--".into());
    let egress = |f: fn(&crate::types::EgressInfo) -> &String| {
        row.egress.as_ref().map(f).cloned().unwrap_or_else(|| "--".into())
    };

    vec![
        row.name.clone(),
        row.interface_type.to_string(),
        row.hardware.clone().unwrap_or_else(|| "N/A".into()),
        row.ipv4.map(|a| a.to_string()).unwrap_or_else(|| "N/A".into()),
        row.ipv6.map(|a| a.to_string()).unwrap_or_else(|| "N/A".into()),
        opt_ip(row.current_dns),
        row.dns_verdict.to_string(),
        row.vpn_endpoint
            .map(|e| match row.tunnel_protocol {
                Some(p) => format!("{} ({})", e, p),
                None => e.to_string(),
            })
            .unwrap_or_else(|| "--".into()),
        row.underlay.clone().unwrap_or_else(|| "--".into()),
        egress(|e| &e.external_ip),
        egress(|e| &e.isp),
        egress(|e| &e.country),
        opt_ip(row.gateway),
        row.metric.map(|m| m.to_string()).unwrap_or_else(|| "--".into()),
    ]
}

/// Row color, first matching rule wins
fn row_color(row: &ReportRow) -> Option<&'static str> {
    // DNS problems outrank everything
    if matches!(
        row.dns_verdict,
        DnsVerdict::Leak | DnsVerdict::Warn | DnsVerdict::Public
    ) {
        return Some(YELLOW);
    }

    let has_egress = row
        .egress
        .as_ref()
        .is_some_and(|e| !matches!(e.external_ip.as_str(), "--" | "N/A" | "QUERY FAILED" | "NONE"));

    if row.interface_type == InterfaceType::Vpn
        && (row.dns_verdict == DnsVerdict::Ok || has_egress)
    {
        return Some(GREEN);
    }

    if row.carries_vpn {
        return Some(CYAN);
    }

    if has_egress {
        return Some(RED);
    }

    None
}

/// Truncate to column width, preferring a word boundary, with an ellipsis
fn shorten(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text.to_string();
    }
    let keep = max_len.saturating_sub(3);
    let truncated: String = text.chars().take(keep).collect();
    match truncated.rfind(' ') {
        Some(pos) if pos * 10 > max_len * 7 => format!("{}...", &truncated[..pos]),
        _ => format!("{}...", truncated),
    }
}

fn write_legend<W: Write>(out: &mut W, color: bool) -> Result<()> {
    let tag = |c: &str, label: &str| {
        if color {
            format!("{}{}{}", c, label, RESET)
        } else {
            label.to_string()
        }
    };

    writeln!(out, "\nColor Legend:")?;
    writeln!(out, "{}  - VPN tunnel (encrypted, DNS OK)", tag(GREEN, "GREEN"))?;
    writeln!(out, "{}   - Physical interface carrying VPN", tag(CYAN, "CYAN"))?;
    writeln!(out, "{}    - Direct internet (unencrypted)", tag(RED, "RED"))?;
    writeln!(out, "{} - DNS leak, public DNS, or warning", tag(YELLOW, "YELLOW"))?;
    writeln!(out, "\nDNS Status Meanings:")?;
    writeln!(out, "  OK     - Using VPN DNS (queries stay inside the tunnel)")?;
    writeln!(out, "  PUBLIC - Using public DNS (not leaking to ISP, but outside the tunnel)")?;
    writeln!(out, "  LEAK   - Using ISP DNS while a VPN is active (defeats VPN privacy)")?;
    writeln!(out, "  WARN   - Using unknown DNS (investigate further)")?;
    writeln!(out, "  --     - Not applicable (no VPN active or no DNS configured)")?;
    writeln!(out)?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct ExportMetadata {
    timestamp: String,
    tool: &'static str,
    version: &'static str,
    interface_count: usize,
    summary: ExportSummary,
}

#[derive(Debug, Serialize)]
struct ExportSummary {
    vpn_active: bool,
    vpn_interfaces: usize,
    dns_leak_detected: bool,
}

#[derive(Debug, Serialize)]
struct ExportDocument<'a> {
    metadata: ExportMetadata,
    interfaces: &'a [ReportRow],
}

/// Serialize the report to pretty-printed JSON with run metadata
pub fn export_json(rows: &[ReportRow]) -> Result<String> {
    let document = ExportDocument {
        metadata: ExportMetadata {
            timestamp: Utc::now().to_rfc3339(),
            tool: "netlens",
            version: env!("CARGO_PKG_VERSION"),
            interface_count: rows.len(),
            summary: ExportSummary {
                vpn_active: rows
                    .iter()
                    .any(|r| r.interface_type == InterfaceType::Vpn && r.ipv4.is_some()),
                vpn_interfaces: rows
                    .iter()
                    .filter(|r| r.interface_type == InterfaceType::Vpn)
                    .count(),
                dns_leak_detected: rows.iter().any(|r| r.dns_verdict == DnsVerdict::Leak),
            },
        },
        interfaces: rows,
    };

    serde_json::to_string_pretty(&document).context("failed to serialize report")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EgressInfo;

    fn base_row(name: &str, interface_type: InterfaceType) -> ReportRow {
        ReportRow {
            name: name.to_string(),
            interface_type,
            hardware: None,
            ipv4: None,
            ipv6: None,
            is_up: true,
            gateway: None,
            metric: None,
            dns_servers: Vec::new(),
            current_dns: None,
            dns_verdict: DnsVerdict::NotApplicable,
            vpn_endpoint: None,
            tunnel_protocol: None,
            underlay: None,
            carries_vpn: false,
            egress: None,
        }
    }

    fn egress(ip: &str) -> EgressInfo {
        EgressInfo {
            external_ip: ip.to_string(),
            external_ipv6: "N/A".to_string(),
            isp: "AS64496 Example ISP".to_string(),
            country: "DE".to_string(),
        }
    }

    #[test]
    fn test_row_color_priority() {
        let mut row = base_row("tun0", InterfaceType::Vpn);
        row.dns_verdict = DnsVerdict::Leak;
        row.egress = Some(egress("203.0.113.7"));
        // Leak wins over VPN-green
        assert_eq!(row_color(&row), Some(YELLOW));

        row.dns_verdict = DnsVerdict::Ok;
        assert_eq!(row_color(&row), Some(GREEN));

        let mut eth = base_row("eth0", InterfaceType::Ethernet);
        eth.carries_vpn = true;
        eth.egress = Some(egress("203.0.113.7"));
        assert_eq!(row_color(&eth), Some(CYAN));

        eth.carries_vpn = false;
        assert_eq!(row_color(&eth), Some(RED));

        let plain = base_row("lo", InterfaceType::Loopback);
        assert_eq!(row_color(&plain), None);
    }

    #[test]
    fn test_failed_egress_is_not_direct_internet() {
        let mut row = base_row("eth0", InterfaceType::Ethernet);
        row.egress = Some(EgressInfo::query_failed());
        assert_eq!(row_color(&row), None);
    }

    #[test]
    fn test_vpn_with_external_ip_is_green_without_dns_verdict() {
        let mut row = base_row("wg0", InterfaceType::Vpn);
        row.egress = Some(egress("203.0.113.7"));
        assert_eq!(row_color(&row), Some(GREEN));
    }

    #[test]
    fn test_shorten() {
        assert_eq!(shorten("short", 20), "short");
        assert_eq!(shorten("exactly-ten.", 12), "exactly-ten.");
        let long = "Intel Corporation Ethernet Connection I219-V";
        let shortened = shorten(long, 20);
        assert!(shortened.len() <= 20);
        assert!(shortened.ends_with("..."));
    }

    #[test]
    fn test_write_table_plain() {
        let mut row = base_row("tun0", InterfaceType::Vpn);
        row.ipv4 = Some("10.2.0.2".parse().unwrap());
        row.dns_verdict = DnsVerdict::Ok;
        row.vpn_endpoint = Some("203.0.113.99".parse().unwrap());
        row.tunnel_protocol = Some(crate::types::TunnelProtocol::Wireguard);
        row.underlay = Some("eth0".to_string());

        let mut buf = Vec::new();
        write_table(&mut buf, &[row], false).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(text.contains("Network Interface Analysis"));
        assert!(text.contains("INTERFACE"));
        assert!(text.contains("tun0"));
        assert!(text.contains("203.0.113.99 (WireGuard)"));
        assert!(text.contains("Color Legend"));
        assert!(!text.contains(GREEN));
    }

    #[test]
    fn test_write_table_colored_row() {
        let mut row = base_row("tun0", InterfaceType::Vpn);
        row.dns_verdict = DnsVerdict::Ok;

        let mut buf = Vec::new();
        write_table(&mut buf, &[row], true).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains(GREEN));
        assert!(text.contains(RESET));
    }

    #[test]
    fn test_export_json_metadata() {
        let mut vpn = base_row("tun0", InterfaceType::Vpn);
        vpn.ipv4 = Some("10.2.0.2".parse().unwrap());
        vpn.dns_verdict = DnsVerdict::Ok;
        let mut eth = base_row("eth0", InterfaceType::Ethernet);
        eth.dns_verdict = DnsVerdict::Leak;

        let json = export_json(&[vpn, eth]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        let meta = &value["metadata"];
        assert_eq!(meta["tool"], "netlens");
        assert_eq!(meta["interface_count"], 2);
        assert_eq!(meta["summary"]["vpn_active"], true);
        assert_eq!(meta["summary"]["vpn_interfaces"], 1);
        assert_eq!(meta["summary"]["dns_leak_detected"], true);

        let interfaces = value["interfaces"].as_array().unwrap();
        assert_eq!(interfaces.len(), 2);
        assert_eq!(interfaces[0]["name"], "tun0");
        assert_eq!(interfaces[0]["dns_verdict"], "OK");
        assert_eq!(interfaces[1]["dns_verdict"], "LEAK");
    }

    #[test]
    fn test_export_json_no_vpn() {
        let eth = base_row("eth0", InterfaceType::Ethernet);
        let json = export_json(&[eth]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["metadata"]["summary"]["vpn_active"], false);
        assert_eq!(value["metadata"]["summary"]["dns_leak_detected"], false);
    }
}
