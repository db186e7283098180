use anyhow::{bail, Context, Result};
use std::env;
use std::net::IpAddr;
use std::time::Duration;

#[cfg(test)]
use std::collections::HashMap;

use crate::holidays::DEFAULT_HOLIDAYS_URL;

#[derive(Debug, Clone)]
pub struct Config {
    // HTTP listener
    pub bind_addr: String,
    pub port: u16,

    // Holiday source (JSON array of YYYY-MM-DD strings)
    pub holidays_url: String,

    // How long a fetched holiday list is trusted before refetching
    pub cache_ttl_secs: u64,

    // Upper bound for one holiday fetch
    pub fetch_timeout_secs: u64,

    // Background refresher period, keeps the cache warm without traffic
    pub refresh_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env if present, ignore if missing
        Self::from_getter(|key| env::var(key).ok())
    }

    /// Parse config from a custom getter function (for testing)
    pub fn from_getter<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Config {
            bind_addr: get("BIND_ADDR")
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "0.0.0.0".to_string()),
            port: get("PORT")
                .unwrap_or_else(|| "3000".to_string())
                .parse()
                .context("PORT must be a valid port number")?,

            holidays_url: get("HOLIDAYS_URL")
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_HOLIDAYS_URL.to_string()),

            cache_ttl_secs: get("HOLIDAY_CACHE_TTL_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(24 * 60 * 60),
            fetch_timeout_secs: get("HOLIDAY_FETCH_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            refresh_interval_secs: get("HOLIDAY_REFRESH_INTERVAL_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(60 * 60),
        })
    }

    /// Create config from a HashMap (convenience for testing)
    #[cfg(test)]
    pub fn from_map(map: &HashMap<&str, &str>) -> Result<Self> {
        Self::from_getter(|key| map.get(key).map(|v| v.to_string()))
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Validate configuration values at startup.
    /// Returns Ok(()) if all validations pass, or Err with details of what failed.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        if self.bind_addr.parse::<IpAddr>().is_err() {
            errors.push(format!(
                "BIND_ADDR '{}' is not a valid IP address.",
                self.bind_addr
            ));
        }

        if !Self::is_http_url(&self.holidays_url) {
            errors.push(format!(
                "HOLIDAYS_URL '{}' must be an http:// or https:// URL.",
                self.holidays_url
            ));
        }

        if self.cache_ttl_secs == 0 {
            errors.push("HOLIDAY_CACHE_TTL_SECS must be greater than 0.".to_string());
        }

        if self.fetch_timeout_secs == 0 {
            errors.push("HOLIDAY_FETCH_TIMEOUT_SECS must be greater than 0.".to_string());
        } else if self.fetch_timeout_secs > 120 {
            errors.push(format!(
                "HOLIDAY_FETCH_TIMEOUT_SECS={} seems too long (max recommended: 120).",
                self.fetch_timeout_secs
            ));
        }

        if self.refresh_interval_secs == 0 {
            errors.push("HOLIDAY_REFRESH_INTERVAL_SECS must be greater than 0.".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )
        }
    }

    /// Scheme check plus a non-empty host part
    fn is_http_url(url: &str) -> bool {
        let rest = url
            .strip_prefix("https://")
            .or_else(|| url.strip_prefix("http://"));
        match rest {
            Some(rest) => !rest.is_empty() && !rest.starts_with('/'),
            None => false,
        }
    }
}



/// Kani formal verification proofs
#[cfg(kani)]
mod kani_proofs {
    #[kani::proof]
    fn port_parsing_never_panics() {
        let port_str: [u8; 8] = kani::any();
        if let Ok(s) = std::str::from_utf8(&port_str) {
            let _ = s.parse::<u16>();
        }
    }
}
