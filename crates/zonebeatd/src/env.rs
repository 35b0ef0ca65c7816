// Environment configuration for zonebeatd
//
// Every setting is a `ZONEBEAT_*` variable. Parsing works on a plain key/value
// map so it can be tested without touching the process environment; the
// unknown-key check is a separate explicit pass over the same map.

use anyhow::Result;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::Level;

use zonebeat_core::config::{
    AddressSourceConfig, NamesConfig, ProviderConfig, SweepConfig, ZonebeatConfig, default_ttl,
};
use zonebeat_core::traits::IpFamily;
use zonebeat_core::HeartbeatKeying;

/// Prefix shared by every recognized key
pub const PREFIX: &str = "ZONEBEAT_";

/// Keys zonebeatd reads
pub const KNOWN_KEYS: &[&str] = &[
    "ZONEBEAT_MODE",
    "ZONEBEAT_CF_API_TOKEN",
    "ZONEBEAT_CF_ZONE_ID",
    "ZONEBEAT_CF_PROXIED",
    "ZONEBEAT_CF_TTL",
    "ZONEBEAT_DRY_RUN",
    "ZONEBEAT_INTERNAL_DOMAIN",
    "ZONEBEAT_INTERNAL_ADDRESSES",
    "ZONEBEAT_EXTERNAL_DOMAIN",
    "ZONEBEAT_EXTERNAL_IPV4",
    "ZONEBEAT_IPV6_DOMAIN",
    "ZONEBEAT_EXTERNAL_IPV6",
    "ZONEBEAT_IPV4_SERVICES",
    "ZONEBEAT_IPV6_SERVICES",
    "ZONEBEAT_COMBINED_DOMAIN",
    "ZONEBEAT_TOP_LEVEL_DOMAIN",
    "ZONEBEAT_HEARTBEAT_KEYING",
    "ZONEBEAT_INSTANCE_ID",
    "ZONEBEAT_STALE_THRESHOLD_SECONDS",
    "ZONEBEAT_CLEANUP_INTERVAL_SECONDS",
    "ZONEBEAT_LOG_LEVEL",
    "ZONEBEAT_LOG_FORMAT",
];

/// What a zonebeatd invocation does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Reconcile every configured name once, then exit
    Update,
    /// Sweep stale records until signalled
    Cleanup,
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "update" => Ok(Mode::Update),
            "cleanup" => Ok(Mode::Cleanup),
            _ => anyhow::bail!(
                "ZONEBEAT_MODE '{}' is not valid. Valid modes: update, cleanup",
                s
            ),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => anyhow::bail!(
                "ZONEBEAT_LOG_FORMAT '{}' is not valid. Valid formats: text, json",
                s
            ),
        }
    }
}

/// Daemon configuration
pub struct Config {
    pub mode: Mode,
    pub zonebeat: ZonebeatConfig,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl fmt::Debug for Config {
    // The provider config carries the API token
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("mode", &self.mode)
            .field("provider", &self.zonebeat.provider.type_name())
            .field("names", &self.zonebeat.names)
            .field("sweep", &self.zonebeat.sweep)
            .field("log_level", &self.log_level)
            .field("log_format", &self.log_format)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Build configuration from a key/value map
    ///
    /// Only syntax is checked here; [`Config::validate`] checks meaning.
    pub fn from_vars(vars: &BTreeMap<String, String>) -> Result<Self> {
        let mode = match get(vars, "ZONEBEAT_MODE") {
            Some(raw) => raw.parse()?,
            None => Mode::Update,
        };

        let provider = ProviderConfig::Cloudflare {
            api_token: get(vars, "ZONEBEAT_CF_API_TOKEN")
                .unwrap_or_default()
                .to_string(),
            zone_id: get(vars, "ZONEBEAT_CF_ZONE_ID")
                .unwrap_or_default()
                .to_string(),
            ttl: parse_or(vars, "ZONEBEAT_CF_TTL", default_ttl())?,
            dry_run: parse_bool(vars, "ZONEBEAT_DRY_RUN")?.unwrap_or(false),
        };

        let names = NamesConfig {
            internal: get_owned(vars, "ZONEBEAT_INTERNAL_DOMAIN"),
            external: get_owned(vars, "ZONEBEAT_EXTERNAL_DOMAIN"),
            ipv6: get_owned(vars, "ZONEBEAT_IPV6_DOMAIN"),
            combined: get_owned(vars, "ZONEBEAT_COMBINED_DOMAIN"),
            top_level: get_owned(vars, "ZONEBEAT_TOP_LEVEL_DOMAIN"),
        };

        let mut zonebeat = ZonebeatConfig::new(provider, names);
        zonebeat.proxied = parse_bool(vars, "ZONEBEAT_CF_PROXIED")?.unwrap_or(false);

        zonebeat.sources.internal = get(vars, "ZONEBEAT_INTERNAL_ADDRESSES")
            .map(|raw| AddressSourceConfig::Static { addresses: split_list(raw) });

        let wants_v4 = zonebeat.names.external.is_some() || zonebeat.names.combined.is_some();
        zonebeat.sources.external_v4 = external_source(
            vars,
            "ZONEBEAT_EXTERNAL_IPV4",
            "ZONEBEAT_IPV4_SERVICES",
            IpFamily::V4,
            wants_v4,
        );

        let wants_v6 = zonebeat.names.ipv6.is_some() || zonebeat.names.combined.is_some();
        zonebeat.sources.external_v6 = external_source(
            vars,
            "ZONEBEAT_EXTERNAL_IPV6",
            "ZONEBEAT_IPV6_SERVICES",
            IpFamily::V6,
            wants_v6,
        );

        if let Some(raw) = get(vars, "ZONEBEAT_HEARTBEAT_KEYING") {
            zonebeat.heartbeat.keying = parse_keying(raw)?;
        }
        zonebeat.heartbeat.owner_id = get_owned(vars, "ZONEBEAT_INSTANCE_ID");

        let defaults = SweepConfig::default();
        zonebeat.sweep = SweepConfig {
            stale_threshold_secs: parse_or(
                vars,
                "ZONEBEAT_STALE_THRESHOLD_SECONDS",
                defaults.stale_threshold_secs,
            )?,
            interval_secs: parse_or(
                vars,
                "ZONEBEAT_CLEANUP_INTERVAL_SECONDS",
                defaults.interval_secs,
            )?,
            record_types: defaults.record_types,
        };

        let log_format = match get(vars, "ZONEBEAT_LOG_FORMAT") {
            Some(raw) => raw.parse()?,
            None => LogFormat::Text,
        };

        Ok(Self {
            mode,
            zonebeat,
            log_level: get(vars, "ZONEBEAT_LOG_LEVEL")
                .unwrap_or("info")
                .to_string(),
            log_format,
        })
    }

    /// Validate the configuration for the selected mode
    ///
    /// Runs before any provider call; every failure here is fatal.
    pub fn validate(&self) -> Result<()> {
        if let ProviderConfig::Cloudflare {
            api_token, zone_id, ..
        } = &self.zonebeat.provider
        {
            if api_token.is_empty() {
                anyhow::bail!(
                    "ZONEBEAT_CF_API_TOKEN is required. \
                    Set it via: export ZONEBEAT_CF_API_TOKEN=your_token"
                );
            }
            if zone_id.is_empty() {
                anyhow::bail!(
                    "ZONEBEAT_CF_ZONE_ID is required. \
                    Set it via: export ZONEBEAT_CF_ZONE_ID=your_zone_id"
                );
            }
        }

        self.level()?;

        match self.mode {
            Mode::Update => self.zonebeat.validate()?,
            Mode::Cleanup => self.zonebeat.validate_for_sweep()?,
        }

        Ok(())
    }

    /// Parsed log level
    pub fn level(&self) -> Result<Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            _ => anyhow::bail!(
                "ZONEBEAT_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }
    }
}

/// Supplied `ZONEBEAT_*` keys that zonebeatd does not read
pub fn unknown_keys(vars: &BTreeMap<String, String>) -> Vec<&str> {
    vars.keys()
        .map(String::as_str)
        .filter(|key| key.starts_with(PREFIX) && !KNOWN_KEYS.contains(key))
        .collect()
}

/// Trimmed value, treating blank as unset
fn get<'a>(vars: &'a BTreeMap<String, String>, key: &str) -> Option<&'a str> {
    vars.get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

fn get_owned(vars: &BTreeMap<String, String>, key: &str) -> Option<String> {
    get(vars, key).map(str::to_string)
}

fn parse_or<T: FromStr>(vars: &BTreeMap<String, String>, key: &str, default: T) -> Result<T> {
    match get(vars, key) {
        Some(raw) => raw
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a non-negative integer. Got: {}", key, raw)),
        None => Ok(default),
    }
}

fn parse_bool(vars: &BTreeMap<String, String>, key: &str) -> Result<Option<bool>> {
    let Some(raw) = get(vars, key) else {
        return Ok(None);
    };

    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(Some(true)),
        "false" | "0" | "no" | "off" => Ok(Some(false)),
        _ => anyhow::bail!("{} must be true or false. Got: {}", key, raw),
    }
}

fn parse_keying(raw: &str) -> Result<HeartbeatKeying> {
    match raw.to_ascii_lowercase().replace('-', "_").as_str() {
        "per_name" => Ok(HeartbeatKeying::PerName),
        "per_instance" => Ok(HeartbeatKeying::PerInstance),
        _ => anyhow::bail!(
            "ZONEBEAT_HEARTBEAT_KEYING '{}' is not valid. Valid values: per_name, per_instance",
            raw
        ),
    }
}

/// Comma or whitespace separated list
fn split_list(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// A pinned address wins over HTTP discovery; HTTP is used only when a name needs it
fn external_source(
    vars: &BTreeMap<String, String>,
    pinned_key: &str,
    services_key: &str,
    family: IpFamily,
    wanted: bool,
) -> Option<AddressSourceConfig> {
    if let Some(pinned) = get(vars, pinned_key) {
        return Some(AddressSourceConfig::Static {
            addresses: vec![pinned.to_string()],
        });
    }

    wanted.then(|| AddressSourceConfig::Http {
        family,
        services: get(vars, services_key).map(split_list).unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn base() -> Vec<(&'static str, &'static str)> {
        vec![
            ("ZONEBEAT_CF_API_TOKEN", "0123456789abcdef0123456789abcdef01234567"),
            ("ZONEBEAT_CF_ZONE_ID", "zone-1"),
        ]
    }

    fn with(extra: &[(&'static str, &'static str)]) -> BTreeMap<String, String> {
        let mut pairs = base();
        pairs.extend_from_slice(extra);
        vars(&pairs)
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_vars(&with(&[(
            "ZONEBEAT_INTERNAL_DOMAIN",
            "i.example.com",
        )]))
        .unwrap();

        assert_eq!(config.mode, Mode::Update);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Text);
        assert!(!config.zonebeat.proxied);
        assert_eq!(config.zonebeat.heartbeat.keying, HeartbeatKeying::PerName);
        assert_eq!(config.zonebeat.sweep.stale_threshold_secs, 3600);
        assert_eq!(config.zonebeat.sweep.interval_secs, 300);

        match &config.zonebeat.provider {
            ProviderConfig::Cloudflare { ttl, dry_run, .. } => {
                assert_eq!(*ttl, 120);
                assert!(!dry_run);
            }
            ProviderConfig::Custom { .. } => panic!("expected cloudflare"),
        }
    }

    #[test]
    fn test_internal_addresses_become_static_source() {
        let config = Config::from_vars(&with(&[
            ("ZONEBEAT_INTERNAL_DOMAIN", "i.example.com"),
            ("ZONEBEAT_INTERNAL_ADDRESSES", "10.0.0.1, 10.0.0.2 10.0.0.3"),
        ]))
        .unwrap();

        assert_eq!(
            config.zonebeat.sources.internal,
            Some(AddressSourceConfig::Static {
                addresses: vec![
                    "10.0.0.1".to_string(),
                    "10.0.0.2".to_string(),
                    "10.0.0.3".to_string()
                ],
            })
        );
        assert!(config.zonebeat.sources.external_v4.is_none());
        assert!(config.zonebeat.sources.external_v6.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_external_names_use_http_unless_pinned() {
        let config = Config::from_vars(&with(&[
            ("ZONEBEAT_COMBINED_DOMAIN", "all.example.com"),
            ("ZONEBEAT_EXTERNAL_IPV6", "2001:db8::1"),
            ("ZONEBEAT_IPV4_SERVICES", "https://a.test/ip,https://b.test/ip"),
        ]))
        .unwrap();

        assert_eq!(
            config.zonebeat.sources.external_v4,
            Some(AddressSourceConfig::Http {
                family: IpFamily::V4,
                services: vec!["https://a.test/ip".to_string(), "https://b.test/ip".to_string()],
            })
        );
        assert_eq!(
            config.zonebeat.sources.external_v6,
            Some(AddressSourceConfig::Static {
                addresses: vec!["2001:db8::1".to_string()],
            })
        );
    }

    #[test]
    fn test_flags_and_numbers() {
        let config = Config::from_vars(&with(&[
            ("ZONEBEAT_MODE", "cleanup"),
            ("ZONEBEAT_EXTERNAL_DOMAIN", "e.example.com"),
            ("ZONEBEAT_CF_PROXIED", "true"),
            ("ZONEBEAT_DRY_RUN", "1"),
            ("ZONEBEAT_CF_TTL", "300"),
            ("ZONEBEAT_HEARTBEAT_KEYING", "per_instance"),
            ("ZONEBEAT_INSTANCE_ID", "web-3"),
            ("ZONEBEAT_STALE_THRESHOLD_SECONDS", "900"),
            ("ZONEBEAT_CLEANUP_INTERVAL_SECONDS", "60"),
            ("ZONEBEAT_LOG_FORMAT", "JSON"),
        ]))
        .unwrap();

        assert_eq!(config.mode, Mode::Cleanup);
        assert!(config.zonebeat.proxied);
        assert_eq!(config.zonebeat.heartbeat.keying, HeartbeatKeying::PerInstance);
        assert_eq!(config.zonebeat.heartbeat.owner_id.as_deref(), Some("web-3"));
        assert_eq!(config.zonebeat.sweep.stale_threshold_secs, 900);
        assert_eq!(config.zonebeat.sweep.interval_secs, 60);
        assert_eq!(config.log_format, LogFormat::Json);
        match &config.zonebeat.provider {
            ProviderConfig::Cloudflare { ttl, dry_run, .. } => {
                assert_eq!(*ttl, 300);
                assert!(dry_run);
            }
            ProviderConfig::Custom { .. } => panic!("expected cloudflare"),
        }
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_malformed_values_are_rejected() {
        for (key, value) in [
            ("ZONEBEAT_MODE", "sometimes"),
            ("ZONEBEAT_CF_PROXIED", "maybe"),
            ("ZONEBEAT_CF_TTL", "-5"),
            ("ZONEBEAT_STALE_THRESHOLD_SECONDS", "an hour"),
            ("ZONEBEAT_HEARTBEAT_KEYING", "per_zone"),
            ("ZONEBEAT_LOG_FORMAT", "xml"),
        ] {
            assert!(
                Config::from_vars(&with(&[(key, value)])).is_err(),
                "{}={} should be rejected",
                key,
                value
            );
        }
    }

    #[test]
    fn test_missing_token_is_fatal() {
        let config = Config::from_vars(&vars(&[
            ("ZONEBEAT_CF_ZONE_ID", "zone-1"),
            ("ZONEBEAT_INTERNAL_DOMAIN", "i.example.com"),
            ("ZONEBEAT_INTERNAL_ADDRESSES", "10.0.0.1"),
        ]))
        .unwrap();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ZONEBEAT_CF_API_TOKEN"));
    }

    #[test]
    fn test_no_names_is_fatal_in_both_modes() {
        let update = Config::from_vars(&with(&[])).unwrap();
        assert!(update.validate().is_err());

        let cleanup = Config::from_vars(&with(&[("ZONEBEAT_MODE", "cleanup")])).unwrap();
        assert!(cleanup.validate().is_err());
    }

    #[test]
    fn test_zero_interval_is_fatal_for_cleanup() {
        let config = Config::from_vars(&with(&[
            ("ZONEBEAT_MODE", "cleanup"),
            ("ZONEBEAT_INTERNAL_DOMAIN", "i.example.com"),
            ("ZONEBEAT_CLEANUP_INTERVAL_SECONDS", "0"),
        ]))
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_log_level() {
        let config = Config::from_vars(&with(&[
            ("ZONEBEAT_INTERNAL_DOMAIN", "i.example.com"),
            ("ZONEBEAT_INTERNAL_ADDRESSES", "10.0.0.1"),
            ("ZONEBEAT_LOG_LEVEL", "loud"),
        ]))
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_keys_are_reported() {
        let supplied = with(&[
            ("ZONEBEAT_INTERNAL_DOMAIN", "i.example.com"),
            ("ZONEBEAT_INTERNAL_DOMIAN", "typo.example.com"),
            ("ZONEBEAT_RETRIES", "3"),
            ("PATH", "/usr/bin"),
        ]);

        assert_eq!(
            unknown_keys(&supplied),
            vec!["ZONEBEAT_INTERNAL_DOMIAN", "ZONEBEAT_RETRIES"]
        );
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = Config::from_vars(&with(&[])).unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("0123456789abcdef"));
        assert!(rendered.contains("cloudflare"));
    }
}
