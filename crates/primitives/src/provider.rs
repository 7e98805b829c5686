//! Utils for creating ethers providers

use alloy_chains::{Chain, NamedChain};
use ethers::providers::{Http, Middleware, Provider};
use std::time::Duration;

/// Creates ethers provider with HTTP connection
pub async fn create_http_provider(addr: &str) -> eyre::Result<Provider<Http>> {
    let provider = Provider::<Http>::try_from(addr)?;

    let chain_id = provider.get_chainid().await?;

    Ok(provider.interval(if Chain::from(chain_id.as_u64()) == Chain::from(NamedChain::Dev) {
        Duration::from_millis(5u64)
    } else {
        Duration::from_millis(500u64)
    }))
}
