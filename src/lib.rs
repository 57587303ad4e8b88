// Network Interface Analysis Library
// Shared modules for the CLI and tests

#![warn(missing_docs)]

//! Network Interface Analysis Library
//!
//! This library classifies every network interface on a Linux host, resolves
//! which physical interface carries each VPN tunnel's traffic, and checks the
//! per-interface DNS configuration for leaks past an active VPN.
//!
//! # Main Components
//!
//! - [`config`]: Configuration file parsing and validation
//! - [`providers`]: System data acquisition (`ip`, `ss`, `resolvectl`, sysfs)
//! - [`snapshot`]: Raw point-in-time network state
//! - [`classify`]: Interface type classification rules
//! - [`underlay`]: VPN endpoint and underlay resolution
//! - [`dns_trust`]: DNS leak verdicts
//! - [`report`]: Report assembly over one snapshot
//! - [`egress`]: External IP lookup
//! - [`output`]: Table rendering and JSON export
//! - [`types`]: Shared data structures

pub mod classify;
pub mod config;
pub mod dns_trust;
pub mod egress;
pub mod output;
pub mod providers;
pub mod report;
pub mod snapshot;
pub mod types;
pub mod underlay;
