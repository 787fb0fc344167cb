//! stakepoold: connects to the chain node and the wallet, then keeps the
//! pool's live and ignored-low-fee ticket sets reconciled until shutdown.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::Notify;

use stakepool_core::{
    connect_node_rpc, connect_wallet_rpc, init_logging, maintain_session, run_reconcile_loop,
    serve_metrics, Backoff, LiveSession, LogFormat, NodeNotifications, PoolFeeCommitmentPolicy,
    PoolState, ReconcileMetrics, ShutdownController, StakepoolError, StakepooldConfig,
    TicketReconciler, WalletNotifications, REQUIRED_NODE_API, REQUIRED_WALLET_API,
};
use stakepool_types::NetworkId;

#[derive(Parser)]
#[command(name = "stakepoold", about = "Stake pool ticket reconciliation daemon")]
struct Cli {
    /// Path to a TOML configuration file. File settings are the base;
    /// CLI flags and env vars override them.
    #[arg(long, env = "STAKEPOOLD_CONFIG")]
    config: Option<PathBuf>,

    /// Network: "mainnet", "testnet3" or "simnet".
    #[arg(long, env = "STAKEPOOLD_NETWORK")]
    network: Option<String>,

    /// Node RPC `host:port` (defaults to localhost on the network's port).
    #[arg(long, env = "STAKEPOOLD_NODE_HOST")]
    node_host: Option<String>,

    #[arg(long, env = "STAKEPOOLD_NODE_USER")]
    node_user: Option<String>,

    #[arg(long, env = "STAKEPOOLD_NODE_PASS", hide_env_values = true)]
    node_pass: Option<String>,

    /// Node RPC certificate.
    #[arg(long, env = "STAKEPOOLD_NODE_CERT")]
    node_cert: Option<PathBuf>,

    /// Wallet RPC `host:port` (defaults to localhost on the network's port).
    #[arg(long, env = "STAKEPOOLD_WALLET_HOST")]
    wallet_host: Option<String>,

    #[arg(long, env = "STAKEPOOLD_WALLET_USER")]
    wallet_user: Option<String>,

    #[arg(long, env = "STAKEPOOLD_WALLET_PASS", hide_env_values = true)]
    wallet_pass: Option<String>,

    /// Wallet RPC certificate.
    #[arg(long, env = "STAKEPOOLD_WALLET_CERT")]
    wallet_cert: Option<PathBuf>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "STAKEPOOLD_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "STAKEPOOLD_LOG_FORMAT")]
    log_format: Option<String>,

    /// Seconds between reconciliation passes.
    #[arg(long, env = "STAKEPOOLD_INTERVAL")]
    interval: Option<u64>,

    /// Serve Prometheus metrics on this port.
    #[arg(long, env = "STAKEPOOLD_METRICS_PORT")]
    metrics_port: Option<u16>,
}

impl Cli {
    /// Overlay the flags that were given onto `config`.
    fn apply(self, mut config: StakepooldConfig) -> anyhow::Result<StakepooldConfig> {
        if let Some(network) = self.network {
            config.network = NetworkId::parse(&network)
                .with_context(|| format!("unknown network {network:?}"))?;
        }
        if let Some(host) = self.node_host {
            config.node.host = host;
        }
        if let Some(user) = self.node_user {
            config.node.user = user;
        }
        if let Some(pass) = self.node_pass {
            config.node.password = pass;
        }
        if let Some(cert) = self.node_cert {
            config.node.cert = cert;
        }
        if let Some(host) = self.wallet_host {
            config.wallet.host = host;
        }
        if let Some(user) = self.wallet_user {
            config.wallet.user = user;
        }
        if let Some(pass) = self.wallet_pass {
            config.wallet.password = pass;
        }
        if let Some(cert) = self.wallet_cert {
            config.wallet.cert = cert;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
        if let Some(interval) = self.interval {
            config.reconcile_interval_secs = interval;
        }
        if self.metrics_port.is_some() {
            config.metrics_port = self.metrics_port;
        }
        Ok(config.with_network_defaults())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let file_config = match &cli.config {
        Some(path) => StakepooldConfig::from_toml_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => StakepooldConfig::default(),
    };
    let config = cli.apply(file_config)?;

    let log_format = LogFormat::parse(&config.log_format)
        .with_context(|| format!("unknown log format {:?}", config.log_format))?;
    init_logging(log_format, &config.log_level)?;
    config.validate()?;

    tracing::info!(
        network = config.network.as_str(),
        node = %config.node.host,
        wallet = %config.wallet.host,
        "starting stakepoold"
    );

    let shutdown = Arc::new(ShutdownController::new());
    let block_connected = Arc::new(Notify::new());
    let node_handler = Arc::new(NodeNotifications::new(Arc::clone(&block_connected)));

    let node = connect_node_rpc(&config.node, REQUIRED_NODE_API, node_handler.clone()).await?;
    node.client().notify_blocks().await.context("notifyblocks")?;
    let wallet =
        connect_wallet_rpc(&config.wallet, REQUIRED_WALLET_API, Arc::new(WalletNotifications))
            .await?;

    let node = Arc::new(LiveSession::new(node));
    let wallet = Arc::new(LiveSession::new(wallet));

    let node_task = {
        let endpoint = config.node.clone();
        let handler = node_handler.clone();
        tokio::spawn(maintain_session(
            Arc::clone(&node),
            "node",
            Backoff::default(),
            move || {
                let endpoint = endpoint.clone();
                let handler = handler.clone();
                async move {
                    let session = connect_node_rpc(&endpoint, REQUIRED_NODE_API, handler).await?;
                    if let Err(e) = session.client().notify_blocks().await {
                        tracing::warn!("notifyblocks failed after reconnect: {e}");
                    }
                    Ok::<_, StakepoolError>(session)
                }
            },
            shutdown.subscribe(),
        ))
    };

    let wallet_task = {
        let endpoint = config.wallet.clone();
        tokio::spawn(maintain_session(
            Arc::clone(&wallet),
            "wallet",
            Backoff::default(),
            move || {
                let endpoint = endpoint.clone();
                async move {
                    connect_wallet_rpc(&endpoint, REQUIRED_WALLET_API, Arc::new(WalletNotifications))
                        .await
                }
            },
            shutdown.subscribe(),
        ))
    };

    let metrics = Arc::new(ReconcileMetrics::new());
    let metrics_task = config.metrics_port.map(|port| {
        let metrics = Arc::clone(&metrics);
        let rx = shutdown.subscribe();
        tokio::spawn(async move {
            if let Err(e) = serve_metrics(port, metrics, rx).await {
                tracing::error!("metrics endpoint failed: {e}");
            }
        })
    });

    let state = Arc::new(PoolState::new(config.voting_table()));
    let fee_policy = Arc::new(PoolFeeCommitmentPolicy::from_config(&config.fees)?);
    let reconciler = Arc::new(
        TicketReconciler::new(node, wallet, fee_policy, state)
            .with_max_in_flight(config.max_in_flight)
            .with_metrics(metrics),
    );

    let reconcile_task = tokio::spawn(run_reconcile_loop(
        reconciler,
        config.reconcile_interval(),
        block_connected,
        shutdown.subscribe(),
    ));

    shutdown.wait_for_signal().await;

    reconcile_task.await?;
    node_task.await?;
    wallet_task.await?;
    if let Some(task) = metrics_task {
        task.await?;
    }

    tracing::info!("stakepoold exited cleanly");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_file_settings() {
        let file = StakepooldConfig::from_toml_str(
            r#"
            network = "testnet3"
            reconcile_interval_secs = 120

            [wallet]
            host = "10.0.0.2:19110"
            user = "fileuser"
        "#,
        )
        .unwrap();

        let cli = Cli::parse_from([
            "stakepoold",
            "--wallet-user",
            "cliuser",
            "--interval",
            "30",
        ]);
        let config = cli.apply(file).unwrap();

        assert_eq!(config.network, NetworkId::TestNet3);
        assert_eq!(config.wallet.user, "cliuser");
        assert_eq!(config.wallet.host, "10.0.0.2:19110");
        assert_eq!(config.reconcile_interval_secs, 30);
        assert_eq!(config.node.host, "127.0.0.1:19109");
    }

    #[test]
    fn unknown_network_is_rejected() {
        let cli = Cli::parse_from(["stakepoold", "--network", "moonnet"]);
        assert!(cli.apply(StakepooldConfig::default()).is_err());
    }
}
