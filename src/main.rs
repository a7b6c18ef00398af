//! Cash-and-carry basis arbitrage paper-trading bot entry point.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusBuilder;
use rust_decimal::Decimal;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use basis_arb::api::{create_router, AppState};
use basis_arb::config::Config;
use basis_arb::engine::{status_handle, Engine};
use basis_arb::feed::{
    run_funding_refresher, run_ticker_poller, BookTickerStream, FeedHealth, ReconnectConfig,
    Venue, VenueRestClient,
};
use basis_arb::metrics;
use basis_arb::utils::shutdown_signal;

/// Cash-and-carry basis arbitrage paper trader.
#[derive(Parser, Debug)]
#[command(name = "basis-arb")]
#[command(about = "Paper-trades the spot/perp basis with live market data")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,

    /// Use WebSocket market data instead of REST polling.
    #[arg(long)]
    websocket: bool,

    /// HTTP server port for health/metrics.
    #[arg(short, long, default_value = "8080")]
    port: u16,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the paper trading loop (default).
    Run {
        /// Use WebSocket market data instead of REST polling.
        #[arg(long)]
        websocket: bool,

        /// HTTP server port for health/metrics.
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },

    /// Check configuration validity.
    CheckConfig,

    /// Fetch a one-shot market snapshot from both venues.
    ShowMarkets,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    let filter = if args.verbose {
        EnvFilter::new("basis_arb=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match args.command {
        Some(Command::CheckConfig) => cmd_check_config().await,
        Some(Command::ShowMarkets) => cmd_show_markets().await,
        Some(Command::Run { websocket, port }) => cmd_run(websocket, port).await,
        None => cmd_run(args.websocket, args.port).await,
    }
}

/// Check configuration validity.
async fn cmd_check_config() -> anyhow::Result<()> {
    println!("======================================================================");
    println!("BASIS ARB - CONFIGURATION CHECK");
    println!("======================================================================");

    print!("Loading configuration... ");
    let config = match Config::load() {
        Ok(c) => {
            println!("OK");
            c
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration load failed"));
        }
    };

    print!("Validating configuration... ");
    match config.validate() {
        Ok(()) => println!("OK"),
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration validation failed"));
        }
    }

    println!("----------------------------------------------------------------------");
    println!("Configuration Summary:");
    println!("  Spot symbol:        {}", config.spot_symbol);
    println!("  Futures symbol:     {}", config.futures_symbol);
    println!("  Pair assets:        {} / {}", config.base_asset, config.quote_asset);
    println!("  Spot taker fee:     {}", config.spot_taker_fee);
    println!("  Futures taker fee:  {}", config.futures_taker_fee);
    println!("  Open basis:         {}%", config.open_basis_pct);
    println!("  Close basis:        {}%", config.close_basis_pct);
    println!("  Funding floor:      {}%", config.min_funding_rate_pct);
    println!("  Fee-aware entry:    {}", config.fee_aware_entry);
    println!("  Trade notional:     {} {}", config.trade_notional, config.quote_asset);

    let balances = config
        .parsed_initial_balances()
        .map_err(|e| anyhow::anyhow!(e))?;
    for (asset, amount) in &balances {
        println!("  Initial balance:    {} {}", amount, asset);
    }

    println!("  Feed: {}", if config.use_wss { "WebSocket" } else { "REST polling" });
    println!("  Poll interval:      {}ms", config.poll_interval_ms);
    println!("  Funding refresh:    {}s", config.funding_refresh_secs);
    println!("======================================================================");
    println!("CONFIGURATION CHECK PASSED");
    println!("======================================================================");

    Ok(())
}

/// Fetch and print a one-shot snapshot from both venues.
async fn cmd_show_markets() -> anyhow::Result<()> {
    println!("======================================================================");
    println!("BASIS ARB - MARKET SNAPSHOT");
    println!("======================================================================");

    let config = Config::load()?;
    config.validate().map_err(|e| anyhow::anyhow!(e))?;

    let client = VenueRestClient::new(&config)?;

    println!("\n1. Fetching spot book ticker ({})...", config.spot_symbol);
    let spot = client.book_ticker(Venue::Spot).await?;
    println!("   Bid: {}  Ask: {}", spot.bid_price, spot.ask_price);

    println!("\n2. Fetching futures book ticker ({})...", config.futures_symbol);
    let futures = client.book_ticker(Venue::Futures).await?;
    println!("   Bid: {}  Ask: {}", futures.bid_price, futures.ask_price);

    println!("\n3. Fetching funding rate...");
    let funding_pct = client.funding_rate_pct().await?;
    println!("   Funding rate: {}%", funding_pct);

    let basis = futures.bid_price - spot.ask_price;
    let basis_pct = if spot.ask_price > Decimal::ZERO {
        basis / spot.ask_price * Decimal::ONE_HUNDRED
    } else {
        Decimal::ZERO
    };

    println!("----------------------------------------------------------------------");
    println!("Basis (futures bid - spot ask): {} ({}%)", basis, basis_pct);
    println!("Open threshold: {}%  Funding floor: {}%", config.open_basis_pct, config.min_funding_rate_pct);
    println!("======================================================================");

    Ok(())
}

/// Run the paper trading loop.
async fn cmd_run(websocket_flag: bool, port: u16) -> anyhow::Result<()> {
    // Load configuration
    info!("Loading configuration...");
    let mut config = Config::load().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    // CLI flag forces WebSocket mode
    if websocket_flag {
        config.use_wss = true;
    }

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return Err(anyhow::anyhow!("Configuration validation failed: {}", e));
    }

    let feed_mode: &'static str = if config.use_wss { "websocket" } else { "polling" };

    info!("Configuration loaded successfully");
    info!("Mode: PAPER TRADING ({} feed)", feed_mode);
    info!(
        "Pair: {} spot / {} perp",
        config.spot_symbol, config.futures_symbol
    );
    info!(
        "Thresholds: open > {}%, close < {}%, funding > {}%",
        config.open_basis_pct, config.close_basis_pct, config.min_funding_rate_pct
    );
    info!("Trade notional: {} {}", config.trade_notional, config.quote_asset);

    // Shared state for the HTTP API
    let status = status_handle();
    let health = Arc::new(FeedHealth::new());
    let app_state = AppState::new(status.clone(), health.clone());
    *app_state.pair.write().await = Some(format!(
        "{} spot / {} perp",
        config.spot_symbol, config.futures_symbol
    ));
    *app_state.feed_mode.write().await = feed_mode;

    // Initialize metrics and the Prometheus exporter
    let prom_handle = PrometheusBuilder::new().install_recorder()?;
    metrics::init_metrics();

    // Start HTTP server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);

    let router = create_router(app_state.clone()).route(
        "/metrics",
        get(move || {
            let handle = prom_handle.clone();
            async move { handle.render() }
        }),
    );

    let _server_handle = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
    });

    // Event channel: all feeds in, one engine out
    let (event_tx, event_rx) = mpsc::channel(1024);
    let (shutdown_tx, _) = broadcast::channel(1);

    let engine = Engine::new(config.clone())?;
    let rest_client = Arc::new(VenueRestClient::new(&config)?);

    // Funding rate always refreshes over REST, on its own period
    tokio::spawn(run_funding_refresher(
        rest_client.clone(),
        Duration::from_secs(config.funding_refresh_secs),
        event_tx.clone(),
        health.clone(),
        shutdown_tx.subscribe(),
    ));

    if config.use_wss {
        let reconnect = ReconnectConfig::from_config(config.ws_reconnect_max_delay_s);

        let spot_stream = BookTickerStream::with_reconnect_config(
            Venue::Spot,
            config.spot_ws_url.clone(),
            config.spot_symbol.clone(),
            reconnect.clone(),
        );
        let futures_stream = BookTickerStream::with_reconnect_config(
            Venue::Futures,
            config.futures_ws_url.clone(),
            config.futures_symbol.clone(),
            reconnect,
        );

        let spot_tx = event_tx.clone();
        let spot_health = health.clone();
        let spot_shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move {
            if let Err(e) = spot_stream.run(spot_tx, spot_health, spot_shutdown).await {
                error!(error = %e, "Spot stream failed");
            }
        });

        let futures_tx = event_tx.clone();
        let futures_health = health.clone();
        let futures_shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move {
            if let Err(e) = futures_stream
                .run(futures_tx, futures_health, futures_shutdown)
                .await
            {
                error!(error = %e, "Futures stream failed");
            }
        });
    } else {
        let poll_interval = Duration::from_millis(config.poll_interval_ms);

        tokio::spawn(run_ticker_poller(
            rest_client.clone(),
            Venue::Spot,
            poll_interval,
            event_tx.clone(),
            health.clone(),
            shutdown_tx.subscribe(),
        ));
        tokio::spawn(run_ticker_poller(
            rest_client.clone(),
            Venue::Futures,
            poll_interval,
            event_tx.clone(),
            health.clone(),
            shutdown_tx.subscribe(),
        ));
    }

    // The feed tasks hold their own senders
    drop(event_tx);

    app_state.set_ready(true);
    info!("Paper trading started");

    let mut engine_task = tokio::spawn(engine.run(event_rx, status, shutdown_tx.subscribe()));

    tokio::select! {
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
            let _ = shutdown_tx.send(());
            (&mut engine_task).await??;
        }
        result = &mut engine_task => {
            // Engine stopped on its own: feed channel closed or an
            // invariant broke. Stop the feeds either way.
            let _ = shutdown_tx.send(());
            result??;
        }
    }

    Ok(())
}
