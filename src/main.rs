//! NORTHSTAR binary: periodic portfolio snapshot loop.

use anyhow::{Context, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use northstar::chains::evm::EvmRpc;
use northstar::chains::solana::SolanaRpc;
use northstar::config::AppConfig;
use northstar::notify::{format_daily_summary, format_policy_warning, TelegramNotifier};
use northstar::policy::{day_key, AuthorizationGate, HttpAuthority};
use northstar::portfolio::context::update_context;
use northstar::portfolio::{ChainAccount, ValuationAggregator};
use northstar::prices::coingecko::CoinGeckoSource;
use northstar::prices::dexscreener::DexScreenerSource;
use northstar::prices::PriceResolver;
use northstar::storage::journal::EventJournal;
use northstar::storage::{JsonlLog, StatePaths};
use northstar::types::Chain;

fn print_banner() {
    println!("╔══════════════════════════════════════════╗");
    println!("║  NORTHSTAR — financial core              ║");
    println!("║  valuation · policy gate · swap pipeline ║");
    println!("╚══════════════════════════════════════════╝");
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("northstar=info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if std::env::var("NORTHSTAR_LOG_JSON").is_ok() {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn build_accounts(config: &AppConfig) -> Result<Vec<ChainAccount>> {
    let solana_native = config
        .native_asset(Chain::Solana)
        .context("No native asset configured for solana")?;
    let base_native = config
        .native_asset(Chain::Base)
        .context("No native asset configured for base")?;

    Ok(vec![
        ChainAccount {
            client: Arc::new(SolanaRpc::new(&config.chains.solana.rpc)),
            address: config.chains.solana.address.clone(),
            native: solana_native.to_ref(),
        },
        ChainAccount {
            client: Arc::new(EvmRpc::new(Chain::Base, &config.chains.base.rpc)),
            address: config.chains.base.address.clone(),
            native: base_native.to_ref(),
        },
    ])
}

struct CycleState {
    warned_day: Option<String>,
    summary_day: String,
}

async fn run_cycle(
    aggregator: &ValuationAggregator,
    journal: &EventJournal,
    notifier: &TelegramNotifier,
    paths: &StatePaths,
    state: &mut CycleState,
) {
    let snapshot = match aggregator.compute_snapshot().await {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "Snapshot failed");
            return;
        }
    };
    let change = aggregator.change_24h();
    info!(%snapshot, %change, "Cycle complete");

    // Budget warning, at most once per UTC day
    let today = day_key(Utc::now());
    if let Some(utilisation) = snapshot.authorization.spend_utilisation_pct() {
        if utilisation >= Decimal::from(80) && state.warned_day.as_deref() != Some(&today) {
            let message = format_policy_warning(&snapshot.authorization, utilisation.round_dp(0));
            if let Err(e) = journal.record_alert("warning", &message).await {
                error!(error = %e, "Failed to record budget alert");
            }
            state.warned_day = Some(today.clone());
        }
    }

    // Daily summary on UTC day rollover
    if today != state.summary_day {
        let summary = format_daily_summary(&snapshot, &change);
        if !notifier.send(&summary).await {
            warn!("Daily summary not delivered");
        }
        state.summary_day = today;
    }

    if let Err(e) = update_context(
        paths,
        Some(&snapshot),
        &change,
        &journal.recent_decisions(20),
        &journal.recent_alerts(20),
    ) {
        warn!(error = %e, "Context refresh failed");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_logging();
    print_banner();

    let mut config = AppConfig::load("config.toml")?;
    if let Ok(home) = std::env::var("NORTHSTAR_HOME") {
        if !home.is_empty() {
            info!(%home, "Data root overridden by NORTHSTAR_HOME");
            config.data.root = home;
        }
    }

    let paths = StatePaths::new(&config.data.root);
    paths
        .ensure_dirs()
        .context("Failed to create state directories")?;

    let notifier = Arc::new(TelegramNotifier::new(
        AppConfig::resolve_secret(config.alerts.telegram_bot_token_env.as_deref()),
        config
            .alerts
            .telegram_chat_id_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok()),
        JsonlLog::new(&paths.outbox_log),
    ));
    if !notifier.is_configured() {
        info!("Telegram notifier not configured, alerts are journal-only");
    }
    let journal = Arc::new(EventJournal::new(&paths, notifier.clone()));

    let resolver = Arc::new(PriceResolver::new(vec![
        Arc::new(CoinGeckoSource::new()),
        Arc::new(DexScreenerSource::new()),
    ]));
    let gate: Arc<dyn AuthorizationGate> =
        Arc::new(HttpAuthority::new(config.authority.endpoint.clone(), &paths));
    if config.authority.endpoint.is_none() {
        warn!("Authority endpoint not configured, every authorization will be denied");
    }

    let accounts = build_accounts(&config)?;
    let aggregator = ValuationAggregator::new(
        accounts,
        resolver,
        gate,
        config.asset_refs(),
        &paths,
    );

    info!(
        agent = %config.agent.name,
        interval_secs = config.agent.snapshot_interval_secs,
        data_root = %config.data.root,
        "Starting snapshot loop"
    );

    let mut interval =
        tokio::time::interval(Duration::from_secs(config.agent.snapshot_interval_secs.max(1)));
    let mut state = CycleState {
        warned_day: None,
        summary_day: day_key(Utc::now()),
    };

    loop {
        tokio::select! {
            _ = interval.tick() => {
                run_cycle(&aggregator, &journal, &notifier, &paths, &mut state).await;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    Ok(())
}
