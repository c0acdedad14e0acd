//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (API keys, bot tokens) are referenced by env-var name in the
//! config and resolved at runtime via `std::env::var`. One `AppConfig`
//! is constructed at process start and passed by reference to every
//! component; there is no ambient global state.

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;

use crate::types::{AssetRef, Chain};

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub agent: AgentConfig,
    pub data: DataConfig,
    pub chains: ChainsConfig,
    pub assets: Vec<AssetConfig>,
    pub swap: SwapConfig,
    pub authority: AuthorityConfig,
    pub alerts: AlertsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    pub name: String,
    pub snapshot_interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataConfig {
    /// Root of the on-disk state tree (snapshots, history, journals,
    /// authority ledger). May be overridden at startup via NORTHSTAR_HOME.
    pub root: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChainsConfig {
    pub solana: ChainEndpoint,
    pub base: ChainEndpoint,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChainEndpoint {
    pub rpc: String,
    /// Wallet address to observe. Key custody is out of scope; only the
    /// public address is ever configured here.
    #[serde(default)]
    pub address: String,
}

/// A tracked asset, used for pricing and for valuing swap inputs.
#[derive(Debug, Deserialize, Clone)]
pub struct AssetConfig {
    pub chain: Chain,
    pub symbol: String,
    #[serde(default)]
    pub coingecko_id: Option<String>,
    pub contract: String,
    pub decimals: u32,
    /// Whether this is the chain's native asset.
    #[serde(default)]
    pub native: bool,
}

impl AssetConfig {
    pub fn to_ref(&self) -> AssetRef {
        AssetRef {
            chain: self.chain,
            symbol: self.symbol.clone(),
            coingecko_id: self.coingecko_id.clone(),
            contract: self.contract.clone(),
            decimals: self.decimals,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SwapConfig {
    #[serde(default)]
    pub api_key_env: Option<String>,
    pub default_slippage_bps: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthorityConfig {
    /// HTTP endpoint of the external policy authority. Absence means
    /// every authorization check is denied (fail-closed).
    #[serde(default)]
    pub endpoint: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AlertsConfig {
    #[serde(default)]
    pub telegram_bot_token_env: Option<String>,
    #[serde(default)]
    pub telegram_chat_id_env: Option<String>,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    /// Resolve an optional env-var reference into a secret, returning
    /// None when the reference or the variable itself is missing.
    pub fn resolve_secret(env_name: Option<&str>) -> Option<SecretString> {
        env_name
            .and_then(|name| std::env::var(name).ok())
            .filter(|v| !v.is_empty())
            .map(SecretString::new)
    }

    /// The configured asset registry as resolver-ready references.
    pub fn asset_refs(&self) -> Vec<AssetRef> {
        self.assets.iter().map(AssetConfig::to_ref).collect()
    }

    /// The configured native asset for a chain, if any.
    pub fn native_asset(&self, chain: Chain) -> Option<&AssetConfig> {
        self.assets.iter().find(|a| a.chain == chain && a.native)
    }

    /// Look up a configured asset by its on-chain contract/mint address.
    pub fn asset_by_contract(&self, chain: Chain, contract: &str) -> Option<&AssetConfig> {
        self.assets
            .iter()
            .find(|a| a.chain == chain && a.contract == contract)
    }
}
