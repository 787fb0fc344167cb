//! Daemon configuration with TOML file support.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use stakepool_rpc::ConnConfig;
use stakepool_types::{NetworkId, UserVotingConfig};

use crate::StakepoolError;

/// Configuration for the stake pool daemon.
///
/// Can be loaded from a TOML file via [`StakepooldConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StakepooldConfig {
    /// Which network the node and wallet run on.
    #[serde(default)]
    pub network: NetworkId,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Seconds between reconciliation passes when no block arrives.
    #[serde(default = "default_reconcile_interval_secs")]
    pub reconcile_interval_secs: u64,

    /// Upper bound on concurrent `gettransaction` requests per pass.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    /// Port for the Prometheus `/metrics` endpoint. Disabled when unset.
    #[serde(default)]
    pub metrics_port: Option<u16>,

    /// Chain node RPC endpoint.
    #[serde(default)]
    pub node: EndpointConfig,

    /// Wallet RPC endpoint.
    #[serde(default)]
    pub wallet: EndpointConfig,

    /// Pool fee policy parameters.
    #[serde(default)]
    pub fees: FeeConfig,

    /// Users whose tickets the pool votes, keyed by ticket address.
    #[serde(default)]
    pub voting_users: Vec<VotingUserEntry>,
}

/// Address and credentials of one RPC server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// `host:port`. Empty means localhost on the network's default port.
    #[serde(default)]
    pub host: String,

    #[serde(default)]
    pub user: String,

    #[serde(default)]
    pub password: String,

    /// PEM certificate of the server.
    #[serde(default)]
    pub cert: PathBuf,

    /// Connect over plain `ws://` (local test setups only).
    #[serde(default)]
    pub disable_tls: bool,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// How long a single request may wait for its response. 0 waits for as
    /// long as the session stays open.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            user: String::new(),
            password: String::new(),
            cert: PathBuf::new(),
            disable_tls: false,
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Pool fee policy parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FeeConfig {
    /// Pool fee as a percentage of the ticket price.
    #[serde(default = "default_pool_fees")]
    pub pool_fees: f64,

    /// Hex-encoded hash160s of the pool's fee addresses.
    #[serde(default)]
    pub fee_key_hashes: Vec<String>,
}

/// One row of the voting configuration seed table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VotingUserEntry {
    pub ticket_address: String,
    pub userid: i64,
    pub multisig_address: String,
    #[serde(default = "default_vote_bits")]
    pub vote_bits: u16,
    #[serde(default)]
    pub vote_bits_version: u32,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_reconcile_interval_secs() -> u64 {
    300
}

fn default_max_in_flight() -> usize {
    crate::reconcile::DEFAULT_MAX_IN_FLIGHT
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_pool_fees() -> f64 {
    7.5
}

fn default_vote_bits() -> u16 {
    1
}

// ── Impl ───────────────────────────────────────────────────────────────

impl StakepooldConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, StakepoolError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| StakepoolError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, StakepoolError> {
        toml::from_str(s).map_err(|e| StakepoolError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, StakepoolError> {
        toml::to_string_pretty(self).map_err(|e| StakepoolError::Config(e.to_string()))
    }

    /// Fill empty endpoint hosts with localhost on the network's default ports.
    pub fn with_network_defaults(mut self) -> Self {
        if self.node.host.is_empty() {
            self.node.host = format!("127.0.0.1:{}", self.network.node_rpc_port());
        }
        if self.wallet.host.is_empty() {
            self.wallet.host = format!("127.0.0.1:{}", self.network.wallet_rpc_port());
        }
        self
    }

    /// Reject settings the daemon cannot run with.
    pub fn validate(&self) -> Result<(), StakepoolError> {
        if self.reconcile_interval_secs == 0 {
            return Err(StakepoolError::Config(
                "reconcile_interval_secs must be positive".into(),
            ));
        }
        if self.max_in_flight == 0 {
            return Err(StakepoolError::Config("max_in_flight must be positive".into()));
        }
        if !(self.fees.pool_fees > 0.0 && self.fees.pool_fees <= 100.0) {
            return Err(StakepoolError::Config(format!(
                "pool_fees {} must be in (0, 100]",
                self.fees.pool_fees
            )));
        }
        for (name, endpoint) in [("node", &self.node), ("wallet", &self.wallet)] {
            if !endpoint.disable_tls && endpoint.cert.as_os_str().is_empty() {
                return Err(StakepoolError::Config(format!(
                    "{name}.cert must be set unless {name}.disable_tls is enabled"
                )));
            }
        }
        Ok(())
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs)
    }

    /// The seed voting table, keyed by ticket address.
    pub fn voting_table(&self) -> HashMap<String, UserVotingConfig> {
        self.voting_users
            .iter()
            .map(|u| {
                (
                    u.ticket_address.clone(),
                    UserVotingConfig {
                        userid: u.userid,
                        multisig_address: u.multisig_address.clone(),
                        vote_bits: u.vote_bits,
                        vote_bits_version: u.vote_bits_version,
                    },
                )
            })
            .collect()
    }
}

impl EndpointConfig {
    /// Build transport parameters, reading the certificate from disk.
    ///
    /// On failure the error carries `hint` so operators get service-specific
    /// advice.
    pub async fn conn_config(
        &self,
        service: &'static str,
        hint: Option<String>,
    ) -> Result<ConnConfig, StakepoolError> {
        let mut conn = ConnConfig::new(&self.host, &self.user, &self.password);
        conn.connect_timeout = Duration::from_secs(self.connect_timeout_secs);
        conn.request_timeout =
            (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs));

        if self.disable_tls {
            return Ok(conn.without_tls());
        }

        let pem = tokio::fs::read(&self.cert)
            .await
            .map_err(|source| StakepoolError::CertificateRead {
                service,
                path: self.cert.clone(),
                source,
                hint,
            })?;
        Ok(conn.with_certificates(pem))
    }
}

impl Default for StakepooldConfig {
    fn default() -> Self {
        Self {
            network: NetworkId::default(),
            log_format: default_log_format(),
            log_level: default_log_level(),
            reconcile_interval_secs: default_reconcile_interval_secs(),
            max_in_flight: default_max_in_flight(),
            metrics_port: None,
            node: EndpointConfig::default(),
            wallet: EndpointConfig::default(),
            fees: FeeConfig::default(),
            voting_users: Vec::new(),
        }
    }
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            pool_fees: default_pool_fees(),
            fee_key_hashes: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = StakepooldConfig::default();
        let toml_str = config.to_toml_string().expect("should serialize");
        let parsed = StakepooldConfig::from_toml_str(&toml_str).expect("should parse");
        assert_eq!(parsed.reconcile_interval_secs, config.reconcile_interval_secs);
        assert_eq!(parsed.max_in_flight, config.max_in_flight);
        assert_eq!(parsed.fees.pool_fees, config.fees.pool_fees);
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = StakepooldConfig::from_toml_str("").expect("empty toml should use defaults");
        assert_eq!(config.network, NetworkId::MainNet);
        assert_eq!(config.reconcile_interval_secs, 300);
        assert_eq!(config.log_format, "human");
        assert!(config.metrics_port.is_none());
    }

    #[test]
    fn endpoint_tables_and_users_parse() {
        let toml = r#"
            network = "testnet3"
            max_in_flight = 8

            [wallet]
            host = "10.0.0.2:19110"
            user = "walletuser"
            password = "secret"
            cert = "/etc/pool/wallet.cert"

            [fees]
            pool_fees = 5.0
            fee_key_hashes = ["0102030405060708090a0b0c0d0e0f1011121314"]

            [[voting_users]]
            ticket_address = "TcAddrA"
            userid = 1
            multisig_address = "TcMultisigA"
        "#;
        let config = StakepooldConfig::from_toml_str(toml).expect("should parse");
        assert_eq!(config.network, NetworkId::TestNet3);
        assert_eq!(config.max_in_flight, 8);
        assert_eq!(config.wallet.user, "walletuser");
        assert_eq!(config.wallet.connect_timeout_secs, 10);
        assert_eq!(config.wallet.request_timeout_secs, 60);
        assert_eq!(config.fees.pool_fees, 5.0);

        let table = config.voting_table();
        assert_eq!(table["TcAddrA"].multisig_address, "TcMultisigA");
        assert_eq!(table["TcAddrA"].vote_bits, 1);
    }

    #[test]
    fn empty_hosts_get_network_ports() {
        let config = StakepooldConfig {
            network: NetworkId::SimNet,
            ..Default::default()
        }
        .with_network_defaults();
        assert_eq!(config.node.host, "127.0.0.1:19556");
        assert_eq!(config.wallet.host, "127.0.0.1:19557");
    }

    #[test]
    fn validate_requires_certs_unless_tls_disabled() {
        let mut config = StakepooldConfig::default();
        assert!(matches!(config.validate(), Err(StakepoolError::Config(_))));

        config.node.disable_tls = true;
        config.wallet.cert = PathBuf::from("/tmp/wallet.cert");
        assert!(config.validate().is_ok());

        config.fees.pool_fees = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_file_returns_config_error() {
        let result = StakepooldConfig::from_toml_file("/nonexistent/stakepoold.toml");
        assert!(matches!(result, Err(StakepoolError::Config(_))));
    }

    #[tokio::test]
    async fn request_timeout_reaches_the_connection() {
        let mut endpoint = EndpointConfig {
            host: "127.0.0.1:9110".into(),
            disable_tls: true,
            ..Default::default()
        };
        let conn = endpoint.conn_config("wallet", None).await.unwrap();
        assert_eq!(conn.request_timeout, Some(Duration::from_secs(60)));

        endpoint.request_timeout_secs = 0;
        let conn = endpoint.conn_config("wallet", None).await.unwrap();
        assert_eq!(conn.request_timeout, None);
    }

    #[tokio::test]
    async fn unreadable_certificate_is_reported_with_path() {
        let endpoint = EndpointConfig {
            host: "127.0.0.1:9110".into(),
            cert: PathBuf::from("/nonexistent/rpc.cert"),
            ..Default::default()
        };
        let err = endpoint
            .conn_config("wallet", Some("wrong wallet?".into()))
            .await
            .unwrap_err();
        match err {
            StakepoolError::CertificateRead { service, path, hint, .. } => {
                assert_eq!(service, "wallet");
                assert_eq!(path, PathBuf::from("/nonexistent/rpc.cert"));
                assert_eq!(hint.as_deref(), Some("wrong wallet?"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
