//! Connections to the chain, the bundler and the paymaster
use crate::{
    bundler::{BundlerApi, HttpBundler},
    config::{AccountConfig, Environment},
    error::AccountError,
    paymaster::{HttpPaymaster, PaymasterApi},
    provider::{ChainApi, EthChain},
};
use smartkey_primitives::provider::create_http_provider;
use std::{fmt, sync::Arc, time::Duration};
use tracing::debug;

/// How long to wait for a user operation receipt
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReceiptPolling {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for ReceiptPolling {
    fn default() -> Self {
        use smartkey_primitives::constants::submission::{
            RECEIPT_POLL_INTERVAL_MS, RECEIPT_TIMEOUT_SECS,
        };
        Self {
            interval: Duration::from_millis(RECEIPT_POLL_INTERVAL_MS),
            timeout: Duration::from_secs(RECEIPT_TIMEOUT_SECS),
        }
    }
}

/// Everything a smart account client talks to
#[derive(Clone, Debug)]
pub struct Network {
    pub chain_id: u64,
    pub chain: Arc<dyn ChainApi>,
    pub bundler: Arc<dyn BundlerApi>,
    pub paymaster: Arc<dyn PaymasterApi>,
    pub config: AccountConfig,
    pub polling: ReceiptPolling,
}

/// Builds a fresh [Network](Network)
#[async_trait::async_trait]
pub trait Connect: fmt::Debug + Send + Sync + 'static {
    async fn connect(&self) -> Result<Network, AccountError>;
}

/// Connects over HTTP to the configured endpoints
#[derive(Clone, Debug)]
pub struct HttpConnector {
    pub eth_rpc: String,
    pub environment: Environment,
    pub config: AccountConfig,
    pub polling: ReceiptPolling,
}

impl HttpConnector {
    pub fn new(eth_rpc: impl Into<String>, environment: Environment) -> Self {
        Self {
            eth_rpc: eth_rpc.into(),
            environment,
            config: AccountConfig::default(),
            polling: ReceiptPolling::default(),
        }
    }

    pub fn config(mut self, config: AccountConfig) -> Self {
        self.config = config;
        self
    }

    pub fn polling(mut self, polling: ReceiptPolling) -> Self {
        self.polling = polling;
        self
    }
}

#[async_trait::async_trait]
impl Connect for HttpConnector {
    async fn connect(&self) -> Result<Network, AccountError> {
        let eth_client = Arc::new(
            create_http_provider(&self.eth_rpc).await.map_err(AccountError::provider)?,
        );
        let chain = Arc::new(EthChain::new(eth_client));
        let chain_id = chain.chain_id().await.map_err(AccountError::provider)?;

        let bundler =
            HttpBundler::new(&self.environment.bundler_rpc).map_err(AccountError::bundler)?;
        let paymaster =
            HttpPaymaster::new(&self.environment.paymaster_rpc).map_err(AccountError::paymaster)?;

        debug!("Connected to chain {chain_id} over {}", self.eth_rpc);

        Ok(Network {
            chain_id,
            chain,
            bundler: Arc::new(bundler),
            paymaster: Arc::new(paymaster),
            config: self.config,
            polling: self.polling,
        })
    }
}
