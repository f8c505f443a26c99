use std::sync::Arc;

use leavechain::chain::SimulatedChain;
use leavechain::coordinator::date_to_unix_seconds;
use leavechain::{Config, LifecycleCoordinator, Result};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logging()?;

    info!("Starting LeaveChain coordinator v{}", leavechain::VERSION);

    // Load configuration
    let config = match Config::load() {
        Ok(config) => {
            info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };

    if !config.app.enabled {
        info!("Coordinator is disabled in configuration. Exiting.");
        return Ok(());
    }

    info!("Coordinator configuration:");
    info!("  Environment: {}", config.app.environment);
    info!("  Contract: {}", config.contract.address);
    info!("  RPC endpoint: {}", config.network.rpc_url);
    info!(
        "  Account: {}",
        config.wallet.account.as_deref().unwrap_or("<disconnected>")
    );

    // Only the simulated backend ships in this build; a real transport
    // plugs in behind the ContractClient and WalletSession seams.
    let chain = Arc::new(SimulatedChain::new(
        config.simulation_owner()?,
        config.wallet_account()?,
        config.confirm_delay(),
    ));

    let coordinator = LifecycleCoordinator::new(chain.clone(), chain).await;

    let start_date =
        std::env::var("LEAVECHAIN_LEAVE_START").unwrap_or_else(|_| "2026-08-10".to_string());
    let end_date =
        std::env::var("LEAVECHAIN_LEAVE_END").unwrap_or_else(|_| "2026-08-14".to_string());

    let start = date_to_unix_seconds(&start_date)?;
    let end = date_to_unix_seconds(&end_date)?;

    let handle = coordinator.apply_leave(start, end).await?;
    info!("Leave request {} to {} submitted as {}", start_date, end_date, handle);

    let final_state = coordinator.settled().await;
    info!("Transaction settled: {}", final_state);

    let snapshot = coordinator.snapshot().await;
    info!("Final snapshot: {}", serde_json::to_string_pretty(&snapshot)?);

    Ok(())
}

fn init_logging() -> Result<()> {
    // Get log level from environment or default to info
    let log_level = std::env::var("LEAVECHAIN_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    Ok(())
}
