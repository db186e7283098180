use anyhow::{bail, Context, Result};
use chrono::SecondsFormat;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use workdays::calculator::Calculator;
use workdays::cli::{parse_args, print_help, Args};
use workdays::config::Config;
use workdays::holidays::{HolidayCache, HttpHolidaySource};
use workdays::refresher::{format_duration, run_refresher};
use workdays::server::{run_server, AppState, ServiceMetrics};

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args();

    if args.help {
        print_help();
        return Ok(());
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("workdays=info".parse().context("invalid log directive")?),
        )
        .init();

    info!("workdays v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Config::from_env()?;
    info!("Configuration loaded");
    info!("  Listen: {}:{}", config.bind_addr, config.port);
    info!("  Cache TTL: {}", format_duration(config.cache_ttl()));

    // Handle --validate mode
    if args.validate {
        info!("Validating configuration...");
        match config.validate() {
            Ok(()) => {
                info!("Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                error!("{}", e);
                std::process::exit(1);
            }
        }
    }
    config.validate()?;

    let source = HttpHolidaySource::new(config.holidays_url.clone(), config.fetch_timeout())
        .context("failed to build holiday client")?;
    info!("Holiday source: {}", source.url());
    let cache = Arc::new(HolidayCache::new(Arc::new(source), config.cache_ttl()));
    let calculator = Arc::new(Calculator::new(cache.clone()));

    if args.is_one_shot() {
        return run_once(&args, &calculator).await;
    }

    // Warm the cache; requests retry on their own if this fails
    match cache.ensure_fresh().await {
        Ok(snapshot) => info!("Loaded {} holidays", snapshot.holidays.len()),
        Err(e) => warn!("Initial holiday fetch failed, will retry on demand: {}", e),
    }

    let addr: SocketAddr = format!("{}:{}", config.bind_addr, config.port)
        .parse()
        .context("invalid listen address")?;

    let cancel_token = CancellationToken::new();

    let refresher = tokio::spawn(run_refresher(
        cache.clone(),
        config.refresh_interval(),
        cancel_token.clone(),
    ));

    let state = AppState {
        calculator,
        metrics: Arc::new(ServiceMetrics::new()),
    };
    let mut server = tokio::spawn(run_server(addr, state, cancel_token.clone()));

    let early_exit = tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown requested");
            None
        }
        joined = &mut server => Some(joined),
    };

    cancel_token.cancel();
    let _ = refresher.await;

    let stopped_early = early_exit.is_some();
    let joined = match early_exit {
        Some(joined) => joined,
        None => server.await,
    };
    joined
        .context("HTTP server task failed")?
        .context("failed to bind HTTP listener")?;
    if stopped_early {
        bail!("HTTP server stopped unexpectedly");
    }

    info!("Stopped");
    Ok(())
}

/// Single calculation from command-line flags, printed to stdout
async fn run_once(args: &Args, calculator: &Calculator) -> Result<()> {
    let request = match args.request() {
        Ok(r) => r,
        Err(e) => {
            error!("{}", e);
            std::process::exit(2);
        }
    };

    let result = calculator.calculate(request).await?;
    println!("{}", result.to_rfc3339_opts(SecondsFormat::Millis, true));
    Ok(())
}
