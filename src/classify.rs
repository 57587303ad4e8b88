// Interface type classification

//! Interface classifier
//!
//! Assigns exactly one [`InterfaceType`] to each raw interface record using
//! deterministic rules over naming, kernel flags, link kind, and hardware
//! metadata. The rules form an explicit ordered list evaluated first match
//! wins; the ordering is a behavioral contract (name patterns overlap, so
//! reordering two rules changes results) and is pinned by tests. No rule
//! consults traffic content or external services: classification is a pure
//! function of the frozen snapshot record.

use crate::config::Config;
use crate::snapshot::{BusKind, RawInterface};
use crate::types::InterfaceType;

/// Reserved name of the loopback device
pub const LOOPBACK_NAME: &str = "lo";

/// Name prefixes that follow the VPN tunnel naming convention
const VPN_NAME_PREFIXES: &[&str] = &["tun", "tap", "wg", "ppp"];

/// Kernel link kinds that identify a tunnel device
const VPN_LINK_KINDS: &[&str] = &["wireguard", "tun", "ppp"];

/// Name prefixes that follow the bridge naming convention
const BRIDGE_NAME_PREFIXES: &[&str] = &["br", "docker", "virbr"];

type RuleFn = fn(&RawInterface, &Config) -> Option<InterfaceType>;

/// The classification rules, in priority order (first match wins)
///
/// 1. loopback reserved name
/// 2. tunnel flags plus VPN naming convention or tunnel link kind
/// 3. USB network gadget with a tethering-class driver
/// 4. bridge naming convention or bridge link kind
/// 5. wireless-class hardware
/// 6. PCI/USB network controller
/// 7. no hardware and not loopback/VPN/bridge by name
/// 8. (fallthrough in [`classify`]) unknown
pub const RULES: &[(&str, RuleFn)] = &[
    ("loopback-name", rule_loopback),
    ("tunnel-device", rule_vpn),
    ("usb-tether-driver", rule_usb_tether),
    ("bridge-device", rule_bridge),
    ("wireless-hardware", rule_wireless),
    ("wired-hardware", rule_ethernet),
    ("no-hardware-virtual", rule_virtual),
];

/// Classify a raw interface record
///
/// Pure and total: identical input always yields identical output, and an
/// interface that matches no rule degrades to [`InterfaceType::Unknown`]
/// rather than failing.
pub fn classify(raw: &RawInterface, config: &Config) -> InterfaceType {
    RULES
        .iter()
        .find_map(|(_, rule)| rule(raw, config))
        .unwrap_or(InterfaceType::Unknown)
}

/// True if the name follows the VPN tunnel naming convention
fn has_vpn_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.contains("vpn") || VPN_NAME_PREFIXES.iter().any(|p| lower.starts_with(p))
}

/// True if the kernel reports a tunnel link kind
fn has_vpn_kind(raw: &RawInterface) -> bool {
    raw.kind
        .as_deref()
        .is_some_and(|k| VPN_LINK_KINDS.contains(&k))
}

/// True if the name follows the bridge naming convention
fn has_bridge_name(name: &str) -> bool {
    BRIDGE_NAME_PREFIXES.iter().any(|p| name.starts_with(p))
}

fn rule_loopback(raw: &RawInterface, _config: &Config) -> Option<InterfaceType> {
    (raw.name == LOOPBACK_NAME).then_some(InterfaceType::Loopback)
}

fn rule_vpn(raw: &RawInterface, _config: &Config) -> Option<InterfaceType> {
    let tunnel_flags = raw.flags.pointopoint && !raw.flags.broadcast;
    let tunnel_identity = has_vpn_name(&raw.name) || has_vpn_kind(raw);
    (tunnel_flags && tunnel_identity).then_some(InterfaceType::Vpn)
}

fn rule_usb_tether(raw: &RawInterface, config: &Config) -> Option<InterfaceType> {
    let hw = raw.hardware.as_ref()?;
    if hw.bus != BusKind::Usb {
        return None;
    }
    let driver = hw.driver.as_deref()?;
    config
        .tether_drivers
        .iter()
        .any(|d| d == driver)
        .then_some(InterfaceType::UsbTether)
}

fn rule_bridge(raw: &RawInterface, _config: &Config) -> Option<InterfaceType> {
    let is_bridge = has_bridge_name(&raw.name) || raw.kind.as_deref() == Some("bridge");
    is_bridge.then_some(InterfaceType::Bridge)
}

fn rule_wireless(raw: &RawInterface, _config: &Config) -> Option<InterfaceType> {
    raw.hardware
        .as_ref()
        .is_some_and(|hw| hw.wireless)
        .then_some(InterfaceType::Wireless)
}

fn rule_ethernet(raw: &RawInterface, _config: &Config) -> Option<InterfaceType> {
    // A PCI or USB network device that made it past the tether and wireless
    // rules is a wired controller. Descriptor text is not required: an
    // unresolved vendor:device lookup must not change the classification.
    raw.hardware.is_some().then_some(InterfaceType::Ethernet)
}

fn rule_virtual(raw: &RawInterface, _config: &Config) -> Option<InterfaceType> {
    let named_special =
        raw.name == LOOPBACK_NAME || has_vpn_name(&raw.name) || has_bridge_name(&raw.name);
    (raw.hardware.is_none() && !named_special).then_some(InterfaceType::Virtual)
}
