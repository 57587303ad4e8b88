// External egress lookup

//! External IP discovery
//!
//! Queries an ipinfo-compatible endpoint for the public IPv4 and IPv6
//! egress identity. The IPv4 lookup retries with exponential backoff; the
//! IPv6 lookup is a single best-effort attempt since many hosts have no v6
//! path at all. A total failure produces a placeholder result, never an
//! error.

use crate::config::EgressConfig;
use crate::types::EgressInfo;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

/// Response shape shared by ipinfo.io and compatible services
#[derive(Debug, Deserialize)]
struct IpInfoResponse {
    ip: String,
    org: Option<String>,
    country: Option<String>,
}

/// Look up external egress identity, degrading to a placeholder on failure
pub async fn lookup_egress(config: &EgressConfig) -> EgressInfo {
    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            log::warn!("Failed to build HTTP client: {}", e);
            return EgressInfo::query_failed();
        }
    };

    let mut info = EgressInfo::query_failed();

    let mut v4_ok = false;
    match query_with_retry(&client, &config.ipv4_url, config.retry_attempts).await {
        Ok(resp) => {
            log::info!("External IPv4: {}", resp.ip);
            info.external_ip = resp.ip;
            info.isp = resp.org.unwrap_or_else(|| "N/A".to_string());
            info.country = resp.country.unwrap_or_else(|| "N/A".to_string());
            v4_ok = true;
        }
        Err(e) => log::warn!("External IPv4 lookup failed: {:#}", e),
    }

    // Single attempt; absence of IPv6 connectivity is the common case
    match query_once(&client, &config.ipv6_url).await {
        Ok(resp) => {
            log::info!("External IPv6: {}", resp.ip);
            info.external_ipv6 = resp.ip;
        }
        Err(e) => {
            log::debug!("External IPv6 lookup failed: {:#}", e);
            if v4_ok {
                info.external_ipv6 = "N/A".to_string();
            }
        }
    }

    info
}

/// Query with exponential backoff between attempts (1s, 2s, 4s, ...)
async fn query_with_retry(
    client: &reqwest::Client,
    url: &str,
    attempts: u32,
) -> Result<IpInfoResponse> {
    let attempts = attempts.max(1);
    let mut last_err = None;

    for attempt in 0..attempts {
        if attempt > 0 {
            let delay = Duration::from_secs(1u64 << (attempt - 1));
            log::debug!("Retrying {} in {:?} (attempt {})", url, delay, attempt + 1);
            tokio::time::sleep(delay).await;
        }
        match query_once(client, url).await {
            Ok(resp) => return Ok(resp),
            Err(e) => last_err = Some(e),
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("no attempts made")))
}

async fn query_once(client: &reqwest::Client, url: &str) -> Result<IpInfoResponse> {
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("request to {} failed", url))?
        .error_for_status()
        .with_context(|| format!("{} returned an error status", url))?;

    let resp: IpInfoResponse = response
        .json()
        .await
        .with_context(|| format!("invalid JSON from {}", url))?;

    validate_response(&resp)?;
    Ok(resp)
}

/// Reject responses without a parseable IP address
fn validate_response(resp: &IpInfoResponse) -> Result<()> {
    resp.ip
        .parse::<std::net::IpAddr>()
        .with_context(|| format!("service returned malformed IP {:?}", resp.ip))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_parsing() {
        let json = r#"{"ip":"203.0.113.7","hostname":"example.net","org":"AS64496 Example ISP","country":"DE","city":"Berlin"}"#;
        let resp: IpInfoResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.ip, "203.0.113.7");
        assert_eq!(resp.org.as_deref(), Some("AS64496 Example ISP"));
        assert_eq!(resp.country.as_deref(), Some("DE"));
        assert!(validate_response(&resp).is_ok());
    }

    #[test]
    fn test_response_optional_fields() {
        let resp: IpInfoResponse = serde_json::from_str(r#"{"ip":"2001:db8::1"}"#).unwrap();
        assert!(resp.org.is_none());
        assert!(resp.country.is_none());
        assert!(validate_response(&resp).is_ok());
    }

    #[test]
    fn test_validate_rejects_malformed_ip() {
        let resp: IpInfoResponse =
            serde_json::from_str(r#"{"ip":"not-an-address"}"#).unwrap();
        assert!(validate_response(&resp).is_err());
    }

    #[test]
    fn test_missing_ip_fails_to_parse() {
        assert!(serde_json::from_str::<IpInfoResponse>(r#"{"org":"x"}"#).is_err());
    }
}
