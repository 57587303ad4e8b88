// System data providers

//! Snapshot acquisition
//!
//! The system-backed providers: everything that touches the host lives here.
//! Raw data comes from `ip`, `ss`, `resolvectl`, `lspci`/`lsusb` (spawned via
//! `tokio::process::Command` with a fixed timeout each), from `if-addrs` for
//! interface addresses, and from sysfs for flags, drivers, and bus IDs. The
//! parsers are pure functions over captured text so output-format drift stays
//! contained in this module. Failures degrade: a missing or timed-out source
//! yields empty records and a warning, never an error to the engine.

use crate::config::Config;
use crate::snapshot::{
    BusKind, DnsEntry, HardwareInfo, LinkFlags, RawInterface, RouteEntry, SocketEntry, SocketProto,
    Snapshot,
};
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

/// Commands the snapshot providers invoke
pub const REQUIRED_COMMANDS: &[&str] = &["ip", "ss", "resolvectl", "lspci", "lsusb"];

/// Kernel link kinds recognized in `ip -d link` output
const LINK_KINDS: &[&str] = &[
    "wireguard", "tun", "tap", "ppp", "bridge", "veth", "bond", "vlan", "macvlan", "ipvlan",
    "dummy",
];

/// Check that every required command is reachable on PATH
///
/// Logs an install hint for each missing command. Runs before the engine is
/// invoked; a missing command here is the only fatal condition.
pub fn check_dependencies() -> bool {
    let mut ok = true;
    for cmd in REQUIRED_COMMANDS {
        if !command_exists(cmd) {
            ok = false;
            log::error!("Missing required command: {}", cmd);
            let hint = match *cmd {
                "ip" | "ss" => "iproute2",
                "resolvectl" => "systemd-resolved",
                "lspci" => "pciutils",
                "lsusb" => "usbutils",
                _ => continue,
            };
            log::error!("  Install: sudo apt install {}", hint);
        }
    }
    ok
}

/// True if the command resolves to an executable file on PATH
fn command_exists(cmd: &str) -> bool {
    let Some(path_var) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&path_var).any(|dir| {
        let candidate = dir.join(cmd);
        candidate.is_file()
    })
}

/// Run a command with a bounded timeout, returning stdout on success
///
/// Any failure mode (spawn error, non-zero exit, timeout) logs a warning and
/// returns `None`; the caller degrades the affected field instead of
/// propagating an error.
pub async fn run_command(program: &str, args: &[&str], timeout_secs: u64) -> Option<String> {
    let result = tokio::time::timeout(
        Duration::from_secs(timeout_secs),
        Command::new(program).args(args).output(),
    )
    .await;

    match result {
        Ok(Ok(output)) if output.status.success() => {
            Some(String::from_utf8_lossy(&output.stdout).into_owned())
        }
        Ok(Ok(output)) => {
            log::warn!(
                "{} {} exited with {}",
                program,
                args.join(" "),
                output.status
            );
            None
        }
        Ok(Err(e)) => {
            log::warn!("Failed to execute {}: {}", program, e);
            None
        }
        Err(_) => {
            log::warn!("{} {} timed out after {}s", program, args.join(" "), timeout_secs);
            None
        }
    }
}

/// System-backed snapshot provider
pub struct SystemProbe {
    timeout: u64,
    sysfs_root: PathBuf,
}

impl SystemProbe {
    /// Create a probe using the configured command timeout
    pub fn new(config: &Config) -> Self {
        Self {
            timeout: config.command_timeout,
            sysfs_root: PathBuf::from("/sys/class/net"),
        }
    }

    /// Capture one point-in-time snapshot of all raw network state
    ///
    /// Acquisition is sequential so the routes, sockets, and DNS data are
    /// internally consistent with the interface list.
    pub async fn collect(&self) -> Snapshot {
        let mut interfaces = match run_command("ip", &["-d", "-o", "link", "show"], self.timeout)
            .await
        {
            Some(output) => parse_link_lines(&output),
            None => Vec::new(),
        };

        let addresses = collect_addresses();
        for iface in &mut interfaces {
            if let Some((ipv4, ipv6)) = addresses.get(&iface.name) {
                iface.ipv4 = *ipv4;
                iface.ipv6 = *ipv6;
            }
            iface.hardware = self.probe_hardware(&iface.name).await;
        }

        let mut routes = Vec::new();
        if let Some(output) = run_command("ip", &["-4", "route", "show"], self.timeout).await {
            routes.extend(parse_route_lines(&output, false));
        }
        if let Some(output) = run_command("ip", &["-6", "route", "show"], self.timeout).await {
            routes.extend(parse_route_lines(&output, true));
        }

        let sockets = match run_command("ss", &["-Htuna"], self.timeout).await {
            Some(output) => parse_ss_lines(&output),
            None => Vec::new(),
        };

        let mut dns = HashMap::new();
        for iface in &interfaces {
            let entry = match run_command("resolvectl", &["status", &iface.name], self.timeout)
                .await
            {
                Some(output) => parse_resolvectl(&output),
                None => DnsEntry::default(),
            };
            dns.insert(iface.name.clone(), entry);
        }

        log::info!(
            "Snapshot: {} interfaces, {} routes, {} sockets",
            interfaces.len(),
            routes.len(),
            sockets.len()
        );

        Snapshot {
            interfaces,
            routes,
            sockets,
            dns,
        }
    }

    /// Resolve hardware identity for one interface from sysfs
    ///
    /// Returns `None` for software devices (no `device` symlink). Vendor and
    /// model lookup shells out to `lspci`/`lsusb`; an unresolved ID leaves
    /// the descriptor empty, never fails.
    async fn probe_hardware(&self, name: &str) -> Option<HardwareInfo> {
        let mut hw = read_sysfs_hardware(&self.sysfs_root, name)?;

        if let Some((vendor, device)) = &hw.ids {
            let selector = format!("{}:{}", vendor, device);
            hw.descriptor = match hw.bus {
                BusKind::Pci => run_command("lspci", &["-d", &selector], self.timeout)
                    .await
                    .as_deref()
                    .and_then(parse_lspci_name),
                BusKind::Usb => run_command("lsusb", &["-d", &selector], self.timeout)
                    .await
                    .as_deref()
                    .and_then(parse_lsusb_name),
            };
        }

        Some(hw)
    }
}

/// First global IPv4/IPv6 address per interface, via getifaddrs
fn collect_addresses() -> HashMap<String, (Option<std::net::Ipv4Addr>, Option<std::net::Ipv6Addr>)>
{
    let mut result: HashMap<String, (Option<std::net::Ipv4Addr>, Option<std::net::Ipv6Addr>)> =
        HashMap::new();

    let ifaddrs = match if_addrs::get_if_addrs() {
        Ok(list) => list,
        Err(e) => {
            log::warn!("Failed to enumerate interface addresses: {}", e);
            return result;
        }
    };

    for iface in ifaddrs {
        let slot = result.entry(iface.name.clone()).or_default();
        match iface.addr {
            if_addrs::IfAddr::V4(v4) => {
                if slot.0.is_none() {
                    slot.0 = Some(v4.ip);
                }
            }
            if_addrs::IfAddr::V6(v6) => {
                // Skip link-local, keep the first global address
                let is_link_local = (v6.ip.segments()[0] & 0xffc0) == 0xfe80;
                if slot.1.is_none() && !is_link_local {
                    slot.1 = Some(v6.ip);
                }
            }
        }
    }

    result
}

/// Read bus, driver, IDs, and the wireless marker from sysfs
///
/// Readable-but-partial entries degrade field by field; only a missing
/// `device` symlink means "no hardware".
fn read_sysfs_hardware(root: &Path, name: &str) -> Option<HardwareInfo> {
    let base = root.join(name);
    let device = base.join("device").canonicalize().ok()?;

    let bus = if device.to_string_lossy().contains("/usb") {
        BusKind::Usb
    } else {
        BusKind::Pci
    };

    let driver = device
        .join("driver")
        .canonicalize()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()));

    let read_id = |file: &str| -> Option<String> {
        std::fs::read_to_string(device.join(file))
            .ok()
            .map(|s| s.trim().trim_start_matches("0x").to_string())
            .filter(|s| !s.is_empty())
    };

    let ids = match bus {
        BusKind::Pci => read_id("vendor").zip(read_id("device")),
        BusKind::Usb => read_id("idVendor").zip(read_id("idProduct")),
    };

    let wireless = base.join("phy80211").exists() || base.join("wireless").exists();

    Some(HardwareInfo {
        bus,
        driver,
        ids,
        wireless,
        descriptor: None,
    })
}

/// Parse `ip -d -o link show` output into raw interface records
pub fn parse_link_lines(output: &str) -> Vec<RawInterface> {
    output.lines().filter_map(parse_link_line).collect()
}

fn parse_link_line(line: &str) -> Option<RawInterface> {
    // Format: "2: eth0: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500 ... state UP ..."
    let mut parts = line.splitn(3, ':');
    parts.next()?.trim().parse::<u32>().ok()?;
    let name_field = parts.next()?.trim();
    let rest = parts.next()?;

    // veth0@if5 carries the peer after '@'
    let name = name_field.split('@').next()?.trim().to_string();
    if name.is_empty() {
        return None;
    }

    let flag_list = rest
        .split_once('<')
        .and_then(|(_, tail)| tail.split_once('>'))
        .map(|(flags, _)| flags)
        .unwrap_or("");
    let has = |flag: &str| flag_list.split(',').any(|f| f == flag);
    let flags = LinkFlags {
        up: has("UP"),
        broadcast: has("BROADCAST"),
        pointopoint: has("POINTOPOINT"),
        loopback: has("LOOPBACK"),
    };

    let tokens: Vec<&str> = rest.split_whitespace().collect();
    let token_after = |key: &str| {
        tokens
            .iter()
            .position(|t| *t == key)
            .and_then(|i| tokens.get(i + 1))
            .copied()
    };

    let mtu = token_after("mtu").and_then(|t| t.parse().ok());
    let state = token_after("state").unwrap_or("UNKNOWN");
    // Devices like lo and wireguard report state UNKNOWN while administratively up
    let oper_up = state == "UP" || (state == "UNKNOWN" && flags.up);

    let kind = tokens
        .iter()
        .find(|t| LINK_KINDS.contains(*t))
        .map(|t| t.to_string());

    Some(RawInterface {
        name,
        flags,
        kind,
        mtu,
        oper_up,
        ipv4: None,
        ipv6: None,
        hardware: None,
    })
}

/// Parse `ip route show` output (one address family per call)
pub fn parse_route_lines(output: &str, ipv6: bool) -> Vec<RouteEntry> {
    output
        .lines()
        .filter_map(|line| parse_route_line(line, ipv6))
        .collect()
}

fn parse_route_line(line: &str, ipv6: bool) -> Option<RouteEntry> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let first = *tokens.first()?;

    // Non-forwarding route types carry no egress interface
    if matches!(
        first,
        "unreachable" | "blackhole" | "prohibit" | "throw" | "local" | "broadcast" | "multicast" | "anycast"
    ) {
        return None;
    }

    let (dest, prefix_len) = if first == "default" {
        if ipv6 {
            ("::".parse().ok()?, 0)
        } else {
            ("0.0.0.0".parse().ok()?, 0)
        }
    } else if let Some((addr, len)) = first.split_once('/') {
        (addr.parse().ok()?, len.parse().ok()?)
    } else {
        // Bare address is a host route
        let addr: IpAddr = first.parse().ok()?;
        let len = if addr.is_ipv4() { 32 } else { 128 };
        (addr, len)
    };

    let token_after = |key: &str| {
        tokens
            .iter()
            .position(|t| *t == key)
            .and_then(|i| tokens.get(i + 1))
            .copied()
    };

    let dev = token_after("dev")?.to_string();
    let gateway = token_after("via").and_then(|t| t.parse().ok());
    let metric = token_after("metric").and_then(|t| t.parse().ok());

    Some(RouteEntry {
        dest,
        prefix_len,
        gateway,
        dev,
        metric,
    })
}

/// Parse `ss -Htuna` output, keeping established sockets with a remote peer
pub fn parse_ss_lines(output: &str) -> Vec<SocketEntry> {
    output.lines().filter_map(parse_ss_line).collect()
}

fn parse_ss_line(line: &str) -> Option<SocketEntry> {
    // Columns: Netid State Recv-Q Send-Q Local:Port Peer:Port [Process]
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 6 || tokens[1] != "ESTAB" {
        return None;
    }

    let proto = match tokens[0] {
        "tcp" => SocketProto::Tcp,
        "udp" => SocketProto::Udp,
        _ => return None,
    };

    Some(SocketEntry {
        proto,
        local: parse_host_port(tokens[4])?,
        remote: parse_host_port(tokens[5])?,
    })
}

/// Parse an `addr:port` field, handling `[v6]:port` and `%iface` suffixes
fn parse_host_port(field: &str) -> Option<SocketAddr> {
    let (host, port) = field.rsplit_once(':')?;
    let port: u16 = port.parse().ok()?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    let host = host.split('%').next()?;
    let ip: IpAddr = host.parse().ok()?;
    Some(SocketAddr::new(ip, port))
}

/// Parse `resolvectl status <iface>` output into a DNS entry
pub fn parse_resolvectl(output: &str) -> DnsEntry {
    let mut servers = Vec::new();
    let mut current = None;
    let mut in_dns_section = false;

    for line in output.lines() {
        if let Some(rest) = line.split_once("Current DNS Server:").map(|(_, r)| r) {
            current = extract_addrs(rest).into_iter().next();
            in_dns_section = false;
        } else if let Some(rest) = line.split_once("DNS Servers:").map(|(_, r)| r) {
            servers.extend(extract_addrs(rest));
            in_dns_section = true;
        } else if in_dns_section {
            // Indented continuation lines belong to the servers list
            if line.starts_with(' ') && line.trim().chars().next().is_some_and(|c| c.is_ascii_hexdigit() || c == ':') {
                servers.extend(extract_addrs(line));
            } else {
                in_dns_section = false;
            }
        }
    }

    DnsEntry { servers, current }
}

/// Extract every parseable IP address from a line of text
fn extract_addrs(text: &str) -> Vec<IpAddr> {
    text.split_whitespace()
        .filter_map(|token| token.split('%').next())
        .filter_map(|token| token.parse().ok())
        .collect()
}

/// Extract the device name from `lspci -d vendor:device` output
///
/// Format: "00:1f.6 Ethernet controller: Intel Corporation Ethernet ..."
pub fn parse_lspci_name(output: &str) -> Option<String> {
    let line = output.lines().next()?;
    let (_, name) = line.split_once(": ")?;
    let name = name.trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// Extract the device name from `lsusb -d vendor:product` output
///
/// Format: "Bus 001 Device 003: ID 18d1:4eeb Google Inc. Pixel 5"
pub fn parse_lsusb_name(output: &str) -> Option<String> {
    let line = output.lines().next()?;
    let after_id = line.split_once(" ID ")?.1;
    let (_, name) = after_id.split_once(' ')?;
    let name = name.trim();
    (!name.is_empty()).then(|| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINK_OUTPUT: &str = "\
1: lo: <LOOPBACK,UP,LOWER_UP> mtu 65536 qdisc noqueue state UNKNOWN mode DEFAULT group default qlen 1000\\    link/loopback 00:00:00:00:00:00 brd 00:00:00:00:00:00 promiscuity 0 minmtu 0 maxmtu 0
2: enp0s31f6: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500 qdisc fq_codel state UP mode DEFAULT group default qlen 1000\\    link/ether 54:e1:ad:11:22:33 brd ff:ff:ff:ff:ff:ff promiscuity 0
3: wlp3s0: <BROADCAST,MULTICAST> mtu 1500 qdisc noqueue state DOWN mode DORMANT group default qlen 1000\\    link/ether a4:34:d9:44:55:66 brd ff:ff:ff:ff:ff:ff
4: docker0: <NO-CARRIER,BROADCAST,MULTICAST,UP> mtu 1500 qdisc noqueue state DOWN mode DEFAULT group default \\    link/ether 02:42:aa:bb:cc:dd brd ff:ff:ff:ff:ff:ff promiscuity 0 bridge forward_delay 1500
8: wg0: <POINTOPOINT,NOARP,UP,LOWER_UP> mtu 1420 qdisc noqueue state UNKNOWN mode DEFAULT group default qlen 1000\\    link/none  promiscuity 0 minmtu 0 maxmtu 2147483552 \\    wireguard addrgenmode none numtxqueues 1
9: veth01ab@if2: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500 qdisc noqueue master docker0 state UP mode DEFAULT group default \\    link/ether ?? brd ff:ff:ff:ff:ff:ff promiscuity 1 veth";

    #[test]
    fn test_parse_link_lines() {
        let links = parse_link_lines(LINK_OUTPUT);
        assert_eq!(links.len(), 6);

        let lo = &links[0];
        assert_eq!(lo.name, "lo");
        assert!(lo.flags.loopback);
        assert!(lo.flags.up);
        assert!(lo.oper_up); // state UNKNOWN but IFF_UP
        assert_eq!(lo.mtu, Some(65536));

        let eth = &links[1];
        assert_eq!(eth.name, "enp0s31f6");
        assert!(eth.flags.broadcast);
        assert!(eth.oper_up);
        assert!(eth.kind.is_none());

        let wlan = &links[2];
        assert!(!wlan.flags.up);
        assert!(!wlan.oper_up);

        let docker = &links[3];
        assert_eq!(docker.kind.as_deref(), Some("bridge"));
        assert!(!docker.oper_up); // state DOWN despite IFF_UP

        let wg = &links[4];
        assert_eq!(wg.name, "wg0");
        assert!(wg.flags.pointopoint);
        assert!(!wg.flags.broadcast);
        assert_eq!(wg.kind.as_deref(), Some("wireguard"));
        assert!(wg.oper_up);
        assert_eq!(wg.mtu, Some(1420));

        let veth = &links[5];
        assert_eq!(veth.name, "veth01ab");
        assert_eq!(veth.kind.as_deref(), Some("veth"));
    }

    #[test]
    fn test_parse_link_garbage_is_skipped() {
        assert!(parse_link_lines("not a link line\n\n").is_empty());
    }

    const ROUTE_OUTPUT: &str = "\
default via 192.168.1.1 dev enp0s31f6 proto dhcp src 192.168.1.10 metric 100
10.2.0.0/24 dev wg0 proto kernel scope link src 10.2.0.2
192.168.1.0/24 dev enp0s31f6 proto kernel scope link src 192.168.1.10 metric 100
203.0.113.99 via 192.168.1.1 dev enp0s31f6 metric 100
unreachable 198.51.100.0/24 metric 1024";

    #[test]
    fn test_parse_route_lines() {
        let routes = parse_route_lines(ROUTE_OUTPUT, false);
        assert_eq!(routes.len(), 4);

        let default = &routes[0];
        assert!(default.is_default());
        assert_eq!(default.gateway, Some("192.168.1.1".parse().unwrap()));
        assert_eq!(default.dev, "enp0s31f6");
        assert_eq!(default.metric, Some(100));

        let wg = &routes[1];
        assert_eq!(wg.prefix_len, 24);
        assert!(wg.gateway.is_none());
        assert!(wg.metric.is_none());

        let host = &routes[3];
        assert_eq!(host.prefix_len, 32);
        assert_eq!(host.dest, "203.0.113.99".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_parse_route_lines_v6() {
        let output = "\
default via fe80::1 dev enp0s31f6 proto ra metric 100 pref medium
2001:db8:1::/64 dev enp0s31f6 proto kernel metric 100 pref medium";
        let routes = parse_route_lines(output, true);
        assert_eq!(routes.len(), 2);
        assert!(routes[0].is_default());
        assert_eq!(routes[0].dest, "::".parse::<IpAddr>().unwrap());
        assert_eq!(routes[1].prefix_len, 64);
    }

    const SS_OUTPUT: &str = "\
udp   ESTAB      0      0      10.2.0.2:46210        203.0.113.99:51820
tcp   ESTAB      0      0      192.168.1.10:53108    198.51.100.80:443
tcp   LISTEN     0      128    0.0.0.0:22            0.0.0.0:*
udp   UNCONN     0      0      0.0.0.0:68            0.0.0.0:*
tcp   ESTAB      0      0      [2001:db8::10]:39000  [2001:db8::1]:443
tcp   ESTAB      0      0      [fe80::1%enp0s31f6]:546  [fe80::2]:547";

    #[test]
    fn test_parse_ss_lines() {
        let sockets = parse_ss_lines(SS_OUTPUT);
        assert_eq!(sockets.len(), 4);

        assert_eq!(sockets[0].proto, SocketProto::Udp);
        assert_eq!(sockets[0].local, "10.2.0.2:46210".parse().unwrap());
        assert_eq!(sockets[0].remote, "203.0.113.99:51820".parse().unwrap());

        assert_eq!(sockets[1].proto, SocketProto::Tcp);

        // Bracketed IPv6 with and without zone suffix
        assert_eq!(sockets[2].remote, "[2001:db8::1]:443".parse().unwrap());
        assert_eq!(sockets[3].local.port(), 546);
    }

    const RESOLVECTL_OUTPUT: &str = "\
Link 2 (enp0s31f6)
    Current Scopes: DNS
         Protocols: +DefaultRoute -LLMNR -mDNS -DNSOverTLS DNSSEC=no/unsupported
Current DNS Server: 192.168.1.1
       DNS Servers: 192.168.1.1
                    8.8.8.8
                    2001:4860:4860::8888
        DNS Domain: lan";

    #[test]
    fn test_parse_resolvectl() {
        let entry = parse_resolvectl(RESOLVECTL_OUTPUT);
        assert_eq!(entry.current, Some("192.168.1.1".parse().unwrap()));
        assert_eq!(
            entry.servers,
            vec![
                "192.168.1.1".parse::<IpAddr>().unwrap(),
                "8.8.8.8".parse().unwrap(),
                "2001:4860:4860::8888".parse().unwrap(),
            ]
        );
    }

    #[test]
    fn test_parse_resolvectl_empty() {
        let entry = parse_resolvectl("Link 5 (docker0)\n    Current Scopes: none\n");
        assert!(entry.servers.is_empty());
        assert!(entry.current.is_none());
    }

    #[test]
    fn test_parse_resolvectl_zone_suffix() {
        let output = "       DNS Servers: fe80::1%enp0s31f6\n";
        let entry = parse_resolvectl(output);
        assert_eq!(entry.servers, vec!["fe80::1".parse::<IpAddr>().unwrap()]);
    }

    #[test]
    fn test_parse_lspci_name() {
        let output = "00:1f.6 Ethernet controller: Intel Corporation Ethernet Connection (2) I219-V (rev 10)";
        assert_eq!(
            parse_lspci_name(output).as_deref(),
            Some("Intel Corporation Ethernet Connection (2) I219-V (rev 10)")
        );
        assert!(parse_lspci_name("").is_none());
    }

    #[test]
    fn test_parse_lsusb_name() {
        let output = "Bus 001 Device 003: ID 18d1:4eeb Google Inc. Pixel 5";
        assert_eq!(parse_lsusb_name(output).as_deref(), Some("Google Inc. Pixel 5"));
        assert!(parse_lsusb_name("Bus 001 Device 003:").is_none());
    }

    #[test]
    fn test_parse_host_port_variants() {
        assert_eq!(
            parse_host_port("192.168.1.1:443"),
            Some("192.168.1.1:443".parse().unwrap())
        );
        assert_eq!(
            parse_host_port("[2001:db8::1]:53"),
            Some("[2001:db8::1]:53".parse().unwrap())
        );
        assert!(parse_host_port("*:443").is_none());
        assert!(parse_host_port("garbage").is_none());
    }
}
