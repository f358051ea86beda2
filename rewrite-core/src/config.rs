//! Engine-wide tuning knobs.
//!
//! Grounded in the plain-struct + `serde` config pattern `router-core`'s
//! `config.rs` uses for `ProxyNode`/`GatewayPath`: no mandatory external
//! config service, just a struct the host loads however it likes and hands
//! to [`crate::load_config`].

use serde::{Deserialize, Serialize};

/// Where `IP(INBOUND)`/`INBOUND(...)` conditions read the peer address from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum InboundAddrSource {
    /// The host supplies `InboundInfo` directly per transaction (default).
    #[default]
    HostProvided,
    /// Trust a `Forwarded`/`X-Forwarded-For`-style header instead.
    ForwardedHeader,
}

/// Tuning values consumed by [`crate::load_config`]/[`crate::Engine`]; the
/// debug tags mirror ATS's two-tag convention (`header_rewrite` for
/// coarse-grained tracing, `header_rewrite_dbg` for verbose per-rule
/// tracing) named in spec.md §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EngineConfig {
    /// IANA timezone name used by `NOW(...)` conditions; `None` means UTC.
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub inbound_addr_source: InboundAddrSource,
    /// Path to a GeoIP database, if `GEO(...)` conditions should resolve to
    /// real data instead of the `(unknown)` placeholder.
    #[serde(default)]
    pub geoip_database_path: Option<String>,
    #[serde(default = "default_debug_tag")]
    pub debug_tag: String,
    #[serde(default = "default_verbose_debug_tag")]
    pub verbose_debug_tag: String,
}

fn default_debug_tag() -> String {
    "header_rewrite".to_string()
}

fn default_verbose_debug_tag() -> String {
    "header_rewrite_dbg".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timezone: None,
            inbound_addr_source: InboundAddrSource::default(),
            geoip_database_path: None,
            debug_tag: default_debug_tag(),
            verbose_debug_tag: default_verbose_debug_tag(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_debug_tags_match_ats_convention() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.debug_tag, "header_rewrite");
        assert_eq!(cfg.verbose_debug_tag, "header_rewrite_dbg");
    }

    #[test]
    fn round_trips_through_json() {
        let cfg = EngineConfig {
            timezone: Some("UTC".to_string()),
            ..EngineConfig::default()
        };
        let json = serde_json::to_string(&cfg).unwrap();
        let back: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.timezone.as_deref(), Some("UTC"));
    }
}
