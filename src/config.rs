//! Configuration for the Zcash x402 facilitator.
//!
//! Values are resolved in this order: CLI flags, then environment
//! variables (`env` attribute below), then the hardcoded defaults in
//! [`config_defaults`]. A JSON config file may additionally be loaded via
//! `--config`; fields absent from the file fall back to the same defaults.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;
use url::Url;

/// CLI arguments for the facilitator server.
#[derive(Parser, Debug)]
#[command(name = "facilitator")]
#[command(about = "Zcash x402 payment facilitator")]
pub struct CliArgs {
    /// Path to an optional JSON configuration file overlay.
    #[arg(long, short, env = "CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(long, env = "HOST")]
    pub host: Option<IpAddr>,

    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    #[arg(long, env = "NETWORK")]
    pub network: Option<ZcashNetwork>,

    #[arg(long, env = "NODE_RPC_URL")]
    pub node_rpc_url: Option<Url>,

    #[arg(long, env = "NODE_RPC_USER")]
    pub node_rpc_user: Option<String>,

    #[arg(long, env = "NODE_RPC_PASSWORD")]
    pub node_rpc_password: Option<String>,

    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    #[arg(long, env = "FACILITATOR_SIGNING_SECRET")]
    pub facilitator_signing_secret: Option<String>,
}

/// `network` ∈ {mainnet, testnet} (spec §6 "Configuration").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum, sqlx::Type)]
#[sqlx(type_name = "zcash_network", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ZcashNetwork {
    Mainnet,
    Testnet,
}

impl std::str::FromStr for ZcashNetwork {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mainnet" => Ok(ZcashNetwork::Mainnet),
            "testnet" => Ok(ZcashNetwork::Testnet),
            other => Err(format!("unknown network: {other}")),
        }
    }
}

/// File-overlay shape; every field optional so a partial file is legal.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    port: Option<u16>,
    host: Option<IpAddr>,
    network: Option<ZcashNetwork>,
    node_rpc_url: Option<Url>,
    node_rpc_user: Option<String>,
    node_rpc_password: Option<String>,
    database_url: Option<String>,
    required_confirmations: Option<u32>,
    challenge_ttl_seconds: Option<u64>,
    scan_interval_seconds: Option<u64>,
    mempool_interval_seconds: Option<u64>,
    max_blocks_per_scan: Option<u32>,
    reorg_safety_depth: Option<u32>,
    webhook_max_attempts: Option<u32>,
    webhook_backoff_schedule_seconds: Option<Vec<u64>>,
    facilitator_signing_secret: Option<String>,
}

mod config_defaults {
    pub fn port() -> u16 {
        8402
    }
    pub fn host() -> std::net::IpAddr {
        std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED)
    }
    pub fn required_confirmations() -> u32 {
        6
    }
    pub fn challenge_ttl_seconds() -> u64 {
        3600
    }
    pub fn scan_interval_seconds() -> u64 {
        30
    }
    pub fn mempool_interval_seconds() -> u64 {
        10
    }
    pub fn max_blocks_per_scan() -> u32 {
        100
    }
    pub fn reorg_safety_depth() -> u32 {
        10
    }
    pub fn webhook_max_attempts() -> u32 {
        5
    }
    pub fn webhook_backoff_schedule_seconds() -> Vec<u64> {
        vec![1, 5, 15, 60, 300]
    }
}

/// Fully resolved server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    port: u16,
    host: IpAddr,
    network: ZcashNetwork,
    node_rpc_url: Url,
    node_rpc_user: String,
    node_rpc_password: String,
    database_url: String,
    required_confirmations: u32,
    challenge_ttl_seconds: u64,
    scan_interval_seconds: u64,
    mempool_interval_seconds: u64,
    max_blocks_per_scan: u32,
    reorg_safety_depth: u32,
    webhook_max_attempts: u32,
    webhook_backoff_schedule_seconds: Vec<u64>,
    facilitator_signing_secret: String,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    ParseFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("missing required configuration value: {0}")]
    Missing(&'static str),
}

impl Config {
    /// Loads configuration from CLI args / env vars, optionally overlaid
    /// with a JSON file, falling back to the documented defaults.
    ///
    /// A missing `facilitatorSigningSecret` or malformed `nodeRpcUrl` is a
    /// Fatal error (spec §7): the process must fail to start rather than
    /// run with an unusable signing key or node connection.
    pub fn load() -> Result<Self, ConfigError> {
        let args = CliArgs::parse();
        Self::from_args(args)
    }

    fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        let file = match &args.config {
            Some(path) => {
                let contents =
                    std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
                        path: path.clone(),
                        source,
                    })?;
                serde_json::from_str::<ConfigFile>(&contents).map_err(|source| {
                    ConfigError::ParseFile {
                        path: path.clone(),
                        source,
                    }
                })?
            }
            None => ConfigFile::default(),
        };

        let node_rpc_url = args
            .node_rpc_url
            .or(file.node_rpc_url)
            .ok_or(ConfigError::Missing("nodeRpcUrl"))?;
        let node_rpc_user = args
            .node_rpc_user
            .or(file.node_rpc_user)
            .ok_or(ConfigError::Missing("nodeRpcUser"))?;
        let node_rpc_password = args
            .node_rpc_password
            .or(file.node_rpc_password)
            .ok_or(ConfigError::Missing("nodeRpcPassword"))?;
        let database_url = args
            .database_url
            .or(file.database_url)
            .ok_or(ConfigError::Missing("databaseUrl"))?;
        let facilitator_signing_secret = args
            .facilitator_signing_secret
            .or(file.facilitator_signing_secret)
            .ok_or(ConfigError::Missing("facilitatorSigningSecret"))?;

        Ok(Config {
            port: args.port.or(file.port).unwrap_or_else(config_defaults::port),
            host: args.host.or(file.host).unwrap_or_else(config_defaults::host),
            network: args
                .network
                .or(file.network)
                .unwrap_or(ZcashNetwork::Testnet),
            node_rpc_url,
            node_rpc_user,
            node_rpc_password,
            database_url,
            required_confirmations: file
                .required_confirmations
                .unwrap_or_else(config_defaults::required_confirmations),
            challenge_ttl_seconds: file
                .challenge_ttl_seconds
                .unwrap_or_else(config_defaults::challenge_ttl_seconds),
            scan_interval_seconds: file
                .scan_interval_seconds
                .unwrap_or_else(config_defaults::scan_interval_seconds),
            mempool_interval_seconds: file
                .mempool_interval_seconds
                .unwrap_or_else(config_defaults::mempool_interval_seconds),
            max_blocks_per_scan: file
                .max_blocks_per_scan
                .unwrap_or_else(config_defaults::max_blocks_per_scan),
            reorg_safety_depth: file
                .reorg_safety_depth
                .unwrap_or_else(config_defaults::reorg_safety_depth),
            webhook_max_attempts: file
                .webhook_max_attempts
                .unwrap_or_else(config_defaults::webhook_max_attempts),
            webhook_backoff_schedule_seconds: file
                .webhook_backoff_schedule_seconds
                .unwrap_or_else(config_defaults::webhook_backoff_schedule_seconds),
            facilitator_signing_secret,
        })
    }

    pub fn host(&self) -> IpAddr {
        self.host
    }
    pub fn port(&self) -> u16 {
        self.port
    }
    pub fn network(&self) -> ZcashNetwork {
        self.network
    }
    pub fn node_rpc_url(&self) -> &Url {
        &self.node_rpc_url
    }
    pub fn node_rpc_user(&self) -> &str {
        &self.node_rpc_user
    }
    pub fn node_rpc_password(&self) -> &str {
        &self.node_rpc_password
    }
    pub fn database_url(&self) -> &str {
        &self.database_url
    }
    pub fn required_confirmations(&self) -> u32 {
        self.required_confirmations
    }
    pub fn challenge_ttl_seconds(&self) -> u64 {
        self.challenge_ttl_seconds
    }
    pub fn scan_interval_seconds(&self) -> u64 {
        self.scan_interval_seconds
    }
    pub fn mempool_interval_seconds(&self) -> u64 {
        self.mempool_interval_seconds
    }
    pub fn max_blocks_per_scan(&self) -> u32 {
        self.max_blocks_per_scan
    }
    pub fn reorg_safety_depth(&self) -> u32 {
        self.reorg_safety_depth
    }
    pub fn webhook_max_attempts(&self) -> u32 {
        self.webhook_max_attempts
    }
    pub fn webhook_backoff_schedule_seconds(&self) -> &[u64] {
        &self.webhook_backoff_schedule_seconds
    }
    pub fn facilitator_signing_secret(&self) -> &str {
        &self.facilitator_signing_secret
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> CliArgs {
        CliArgs {
            config: None,
            host: None,
            port: None,
            network: None,
            node_rpc_url: Some(Url::parse("http://localhost:8232").unwrap()),
            node_rpc_user: Some("rpcuser".to_string()),
            node_rpc_password: Some("rpcpass".to_string()),
            database_url: Some("postgres://localhost/facilitator".to_string()),
            facilitator_signing_secret: Some("topsecret".to_string()),
        }
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = Config::from_args(base_args()).unwrap();
        assert_eq!(config.port(), 8402);
        assert_eq!(config.required_confirmations(), 6);
        assert_eq!(config.challenge_ttl_seconds(), 3600);
        assert_eq!(
            config.webhook_backoff_schedule_seconds(),
            &[1, 5, 15, 60, 300]
        );
        assert_eq!(config.network(), ZcashNetwork::Testnet);
    }

    #[test]
    fn missing_signing_secret_is_fatal() {
        let mut args = base_args();
        args.facilitator_signing_secret = None;
        let err = Config::from_args(args).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("facilitatorSigningSecret")));
    }
}
