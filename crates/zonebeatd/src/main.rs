// # zonebeatd - zonebeat daemon
//
// Thin integration layer: reads `ZONEBEAT_*` environment variables, builds
// the provider and address sources through the registry, then runs one of
// two modes. All DNS logic lives in zonebeat-core.
//
// ## Modes
//
// - `update` (default): discover addresses, reconcile every configured name
//   once, print a summary and exit. Exit code 3 when any operation failed or
//   nothing ran.
// - `cleanup`: sweep stale records immediately and then every
//   `ZONEBEAT_CLEANUP_INTERVAL_SECONDS` until SIGTERM/SIGINT.
//
// ## Configuration
//
// ### Provider
// - `ZONEBEAT_CF_API_TOKEN`, `ZONEBEAT_CF_ZONE_ID`: required
// - `ZONEBEAT_CF_PROXIED`, `ZONEBEAT_CF_TTL` (default 120), `ZONEBEAT_DRY_RUN`
//
// ### Names and addresses
// - `ZONEBEAT_INTERNAL_DOMAIN` + `ZONEBEAT_INTERNAL_ADDRESSES`
// - `ZONEBEAT_EXTERNAL_DOMAIN`, `ZONEBEAT_IPV6_DOMAIN`, `ZONEBEAT_COMBINED_DOMAIN`
// - `ZONEBEAT_TOP_LEVEL_DOMAIN`: CNAME to the combined name
// - `ZONEBEAT_EXTERNAL_IPV4` / `ZONEBEAT_EXTERNAL_IPV6`: pin the external
//   address instead of asking `ZONEBEAT_IPV4_SERVICES` / `ZONEBEAT_IPV6_SERVICES`
//
// ### Heartbeats and sweep
// - `ZONEBEAT_HEARTBEAT_KEYING` (`per_name` | `per_instance`), `ZONEBEAT_INSTANCE_ID`
// - `ZONEBEAT_STALE_THRESHOLD_SECONDS` (default 3600)
// - `ZONEBEAT_CLEANUP_INTERVAL_SECONDS` (default 300)
//
// ### Logging
// - `ZONEBEAT_LOG_LEVEL` (default info), `ZONEBEAT_LOG_FORMAT` (`text` | `json`)
//
// ## Example
//
// ```bash
// export ZONEBEAT_CF_API_TOKEN=your_token
// export ZONEBEAT_CF_ZONE_ID=your_zone
// export ZONEBEAT_INTERNAL_DOMAIN=lan.example.com
// export ZONEBEAT_INTERNAL_ADDRESSES=10.0.0.5,10.0.0.6
// export ZONEBEAT_COMBINED_DOMAIN=all.example.com
//
// zonebeatd
// ZONEBEAT_MODE=cleanup zonebeatd
// ```

mod env;

use anyhow::Result;
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use zonebeat_core::config::AddressSourceConfig;
use zonebeat_core::{
    AddressSource, Discovered, ProviderRegistry, Reconciler, RecordProvider, Sweeper, SyncPlan,
    SystemClock,
};

use env::{Config, LogFormat, Mode};

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// - 0: Clean shutdown, or an update run where every operation succeeded
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
/// - 3: Update run finished with failed operations, or with none at all
#[derive(Debug, Clone, Copy)]
enum ZonebeatExitCode {
    CleanShutdown = 0,
    ConfigError = 1,
    RuntimeError = 2,
    IncompleteRun = 3,
}

impl From<ZonebeatExitCode> for ExitCode {
    fn from(code: ZonebeatExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Provider and address sources built from configuration
struct Components {
    provider: Arc<dyn RecordProvider>,
    internal: Option<Box<dyn AddressSource>>,
    external_v4: Option<Box<dyn AddressSource>>,
    external_v6: Option<Box<dyn AddressSource>>,
}

fn main() -> ExitCode {
    let vars: BTreeMap<String, String> = std::env::vars().collect();

    let config = match Config::from_vars(&vars) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ZonebeatExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return ZonebeatExitCode::ConfigError.into();
    }

    let level = config.level().unwrap_or(Level::INFO);
    if let Err(e) = init_tracing(level, config.log_format) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return ZonebeatExitCode::ConfigError.into();
    }

    for key in env::unknown_keys(&vars) {
        warn!(key, "Unrecognized configuration key, ignoring it");
    }

    info!(mode = ?config.mode, "Starting zonebeatd");
    info!(
        "Configuration loaded: {} managed name(s)",
        config.zonebeat.names.managed_names().len()
    );

    let components = match build_components(&config) {
        Ok(components) => components,
        Err(e) => {
            error!("Startup error: {}", e);
            return ZonebeatExitCode::ConfigError.into();
        }
    };

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return ZonebeatExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        let outcome = match config.mode {
            Mode::Update => run_update(&config, components).await,
            Mode::Cleanup => run_cleanup(&config, components).await,
        };

        outcome.unwrap_or_else(|e| {
            error!("Daemon error: {}", e);
            ZonebeatExitCode::RuntimeError
        })
    });

    result.into()
}

fn init_tracing(level: Level, format: LogFormat) -> Result<()> {
    let builder = FmtSubscriber::builder().with_max_level(level);
    match format {
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish())?,
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
    }
    Ok(())
}

/// Create the provider and sources through the registry
fn build_components(config: &Config) -> Result<Components> {
    let registry = ProviderRegistry::with_builtin();

    #[cfg(feature = "cloudflare")]
    zonebeat_provider_cloudflare::register(&registry);

    #[cfg(feature = "http")]
    zonebeat_ip_http::register(&registry);

    info!(
        provider = config.zonebeat.provider.type_name(),
        "Creating record provider"
    );
    let provider: Arc<dyn RecordProvider> =
        Arc::from(registry.create_provider(&config.zonebeat.provider)?);

    // The sweep only talks to the provider
    if config.mode == Mode::Cleanup {
        return Ok(Components {
            provider,
            internal: None,
            external_v4: None,
            external_v6: None,
        });
    }

    let sources = &config.zonebeat.sources;
    Ok(Components {
        provider,
        internal: create_source(&registry, sources.internal.as_ref(), "internal")?,
        external_v4: create_source(&registry, sources.external_v4.as_ref(), "external IPv4")?,
        external_v6: create_source(&registry, sources.external_v6.as_ref(), "external IPv6")?,
    })
}

fn create_source(
    registry: &ProviderRegistry,
    config: Option<&AddressSourceConfig>,
    role: &str,
) -> Result<Option<Box<dyn AddressSource>>> {
    let Some(config) = config else {
        return Ok(None);
    };

    info!(role, source = config.type_name(), "Creating address source");
    Ok(Some(registry.create_address_source(config)?))
}

/// Reconcile every configured name once
async fn run_update(config: &Config, components: Components) -> Result<ZonebeatExitCode> {
    let discovered = discover(&components).await;
    info!(
        internal = discovered.internal.len(),
        external_v4 = ?discovered.external_v4,
        external_v6 = ?discovered.external_v6,
        "Addresses discovered"
    );

    let plan = SyncPlan::build(
        &config.zonebeat.names,
        &discovered,
        config.zonebeat.proxied,
    );

    let reconciler = Reconciler::new(components.provider, Arc::new(SystemClock))
        .with_keying(config.zonebeat.heartbeat.keying)
        .with_owner_id(config.zonebeat.heartbeat.owner_id.clone());

    let report = reconciler.run_plan(&plan).await;
    report.log_summary();

    if report.is_success() {
        Ok(ZonebeatExitCode::CleanShutdown)
    } else {
        Ok(ZonebeatExitCode::IncompleteRun)
    }
}

/// Ask every source once; a failing source counts as "no address"
async fn discover(components: &Components) -> Discovered {
    let internal = fetch(components.internal.as_deref(), "internal").await;
    let external_v4 = fetch(components.external_v4.as_deref(), "external IPv4")
        .await
        .into_iter()
        .find(IpAddr::is_ipv4);
    let external_v6 = fetch(components.external_v6.as_deref(), "external IPv6")
        .await
        .into_iter()
        .find(IpAddr::is_ipv6);

    Discovered {
        internal,
        external_v4,
        external_v6,
    }
}

async fn fetch(source: Option<&dyn AddressSource>, role: &str) -> Vec<IpAddr> {
    let Some(source) = source else {
        return Vec::new();
    };

    match source.addresses().await {
        Ok(addresses) => addresses,
        Err(e) => {
            warn!(role, source = source.source_name(), "Address discovery failed: {}", e);
            Vec::new()
        }
    }
}

/// Sweep until SIGTERM/SIGINT
async fn run_cleanup(config: &Config, components: Components) -> Result<ZonebeatExitCode> {
    let sweep = &config.zonebeat.sweep;
    let sweeper = Sweeper::new(
        components.provider,
        Arc::new(SystemClock),
        config.zonebeat.names.managed_names(),
        sweep.stale_threshold_secs,
    )?
    .with_record_types(sweep.record_types.iter().copied())
    .with_keying(config.zonebeat.heartbeat.keying);

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        match wait_for_shutdown().await {
            Ok(signal) => info!("Received shutdown signal: {}", signal),
            Err(e) => error!("Shutdown error: {}", e),
        }
        let _ = shutdown_tx.send(());
    });

    sweeper
        .run_with_shutdown(Duration::from_secs(sweep.interval_secs), shutdown_rx)
        .await?;

    info!("Shutting down daemon");
    Ok(ZonebeatExitCode::CleanShutdown)
}

/// Wait for SIGTERM or SIGINT
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let received = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(received)
}

/// Wait for Ctrl-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
