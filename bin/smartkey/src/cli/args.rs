use crate::utils::{parse_address, parse_chain, session_file_or_default, validate_private_key};
use alloy_chains::NamedChain;
use async_trait::async_trait;
use clap::Parser;
use ethers::types::Address;
use expanded_pathbuf::ExpandedPathBuf;
use smartkey_account::{AccountError, Connect, Environment, HttpConnector, Network, ReceiptPolling};
use smartkey_primitives::{
    constants::{
        chain::{DEFAULT_CHAIN, DEFAULT_RPC},
        env::{APP_ID, BUNDLER_RPC, ETH_RPC, NFT_CONTRACT_ADDRESS, OWNER_PRIVATE_KEY, PAYMASTER_RPC},
        submission::RECEIPT_TIMEOUT_SECS,
    },
    ConnectedWallet, WalletError,
};
use smartkey_session::{FileSessionStore, Settlement};
use std::time::Duration;
use tracing::debug;

/// Chain, bundler and paymaster endpoints
#[derive(Debug, Clone, Parser, PartialEq)]
pub struct NetworkArgs {
    /// Ethereum execution client RPC endpoint.
    ///
    /// By default, this option is set to the public Sepolia RPC.
    #[clap(long, env = ETH_RPC, default_value = DEFAULT_RPC)]
    pub eth_rpc: String,

    /// Bundler RPC endpoint (ERC-4337).
    #[clap(long, env = BUNDLER_RPC)]
    pub bundler_rpc: Option<String>,

    /// Paymaster RPC endpoint (ERC-7677).
    #[clap(long, env = PAYMASTER_RPC)]
    pub paymaster_rpc: Option<String>,

    /// Application id of the embedded wallet provider.
    #[clap(long, env = APP_ID)]
    pub app_id: Option<String>,

    /// Chain the smart account lives on.
    ///
    /// By default, this option is set to `sepolia`.
    #[clap(long, default_value_t = DEFAULT_CHAIN, value_parser = parse_chain)]
    pub chain: NamedChain,

    /// How long to wait for a user operation receipt (in seconds).
    #[clap(long, default_value_t = RECEIPT_TIMEOUT_SECS)]
    pub receipt_timeout: u64,
}

impl NetworkArgs {
    /// Bundler and paymaster endpoints, failing with every missing one
    pub fn environment(&self) -> Result<Environment, AccountError> {
        Environment::from_lookup(|key| match key {
            BUNDLER_RPC => self.bundler_rpc.clone(),
            PAYMASTER_RPC => self.paymaster_rpc.clone(),
            _ => None,
        })
    }

    pub fn connector(&self) -> Result<HttpConnector, AccountError> {
        let polling = ReceiptPolling {
            timeout: Duration::from_secs(self.receipt_timeout),
            ..Default::default()
        };
        Ok(HttpConnector::new(&self.eth_rpc, self.environment()?).polling(polling))
    }
}

/// Endpoints are only checked when a command actually goes to the network, so local commands
/// work without them
#[async_trait]
impl Connect for NetworkArgs {
    async fn connect(&self) -> Result<Network, AccountError> {
        let network = self.connector()?.connect().await?;

        let expected = self.chain as u64;
        if network.chain_id != expected {
            return Err(AccountError::InvalidConfig {
                inner: format!(
                    "{} is on chain {}, expected {} ({expected})",
                    self.eth_rpc, network.chain_id, self.chain
                ),
            });
        }

        if let Some(app_id) = &self.app_id {
            debug!("Connected for app {app_id}");
        }

        Ok(network)
    }
}

/// Keys of the embedded wallet owning the smart account
#[derive(Debug, Clone, Parser)]
pub struct WalletArgs {
    /// Private key of the embedded wallet (hex).
    #[clap(long, env = OWNER_PRIVATE_KEY, hide_env_values = true, value_parser = validate_private_key)]
    pub owner_private_key: Option<String>,

    /// Path to the file holding the mnemonic phrase of the embedded wallet.
    ///
    /// Takes precedence over the private key when both are given.
    #[clap(long)]
    pub mnemonic_file: Option<ExpandedPathBuf>,

    /// Index of the key derived from the mnemonic phrase.
    ///
    /// By default, this option is set to 0.
    #[clap(long, default_value_t = 0)]
    pub account_index: u32,
}

impl WalletArgs {
    /// Wallets connected through the configured keys, in order of precedence
    pub fn connected_wallets(&self) -> Result<Vec<ConnectedWallet>, WalletError> {
        let mut wallets = vec![];
        if let Some(path) = &self.mnemonic_file {
            wallets.push(ConnectedWallet::embedded_from_file(path.clone(), self.account_index)?);
        }
        if let Some(key) = &self.owner_private_key {
            wallets.push(ConnectedWallet::embedded_from_private_key(key)?);
        }
        Ok(wallets)
    }
}

/// NFT contract the demo mints from
#[derive(Debug, Clone, Parser, PartialEq)]
pub struct NftArgs {
    /// Address of the NFT contract.
    #[clap(long = "nft", env = NFT_CONTRACT_ADDRESS, value_parser = parse_address)]
    pub nft_contract_address: Option<Address>,
}

impl NftArgs {
    pub fn address(&self) -> Result<Address, AccountError> {
        self.nft_contract_address
            .ok_or_else(|| AccountError::Config { keys: vec![NFT_CONTRACT_ADDRESS.into()] })
    }
}

/// Session key storage and settlement
#[derive(Debug, Clone, Parser)]
pub struct SessionArgs {
    /// Path to the session file.
    ///
    /// By default, this option is set to `~/.smartkey/session.json`.
    #[clap(long)]
    pub session_file: Option<ExpandedPathBuf>,

    /// Count a session key use only once its user operation is included and succeeded.
    ///
    /// By default, a use counts as soon as the bundler accepts the user operation.
    #[clap(long)]
    pub wait_for_receipt: bool,
}

impl SessionArgs {
    pub fn settlement(&self) -> Settlement {
        if self.wait_for_receipt {
            Settlement::WaitForReceipt
        } else {
            Settlement::Optimistic
        }
    }

    pub fn store(&self) -> eyre::Result<FileSessionStore> {
        Ok(FileSessionStore::new(session_file_or_default(self.session_file.clone())?.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn network_args() {
        let args = vec![
            "networkargs",
            "--eth-rpc",
            "http://127.0.0.1:8545",
            "--bundler-rpc",
            "https://bundler.example/rpc",
            "--paymaster-rpc",
            "https://paymaster.example/rpc",
            "--chain",
            "sepolia",
            "--receipt-timeout",
            "30",
        ];
        let args = NetworkArgs::try_parse_from(args).unwrap();
        assert_eq!(args.eth_rpc, "http://127.0.0.1:8545");
        assert_eq!(args.chain, NamedChain::Sepolia);
        assert_eq!(args.receipt_timeout, 30);

        let connector = args.connector().unwrap();
        assert_eq!(connector.environment.bundler_rpc, "https://bundler.example/rpc");
        assert_eq!(connector.environment.paymaster_rpc, "https://paymaster.example/rpc");
        assert_eq!(connector.polling.timeout, Duration::from_secs(30));

        let args = NetworkArgs::try_parse_from(vec!["networkargs"]).unwrap();
        assert_eq!(args.chain, DEFAULT_CHAIN);
        assert_eq!(args.chain, NamedChain::Sepolia);
    }

    #[test]
    fn missing_endpoints_are_named() {
        let args = NetworkArgs {
            eth_rpc: DEFAULT_RPC.into(),
            bundler_rpc: None,
            paymaster_rpc: Some(" ".into()),
            app_id: None,
            chain: NamedChain::Sepolia,
            receipt_timeout: RECEIPT_TIMEOUT_SECS,
        };
        assert_eq!(
            args.environment(),
            Err(AccountError::Config { keys: vec![BUNDLER_RPC.into(), PAYMASTER_RPC.into()] })
        );
    }

    #[test]
    fn wallet_args() {
        let args = vec!["walletargs", "--owner-private-key", KEY];
        let args = WalletArgs::try_parse_from(args).unwrap();
        assert_eq!(args.owner_private_key.as_deref(), Some(KEY));
        assert_eq!(args.account_index, 0);

        let wallets = args.connected_wallets().unwrap();
        assert_eq!(wallets.len(), 1);
        assert_eq!(
            wallets[0].address,
            Address::from_str("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266").unwrap()
        );

        let args = vec!["walletargs", "--owner-private-key", "0x1234"];
        assert!(WalletArgs::try_parse_from(args).is_err());
    }

    #[test]
    fn nft_args() {
        let args = vec!["nftargs", "--nft", "0x0000000000000000000000000000000000000042"];
        let args = NftArgs::try_parse_from(args).unwrap();
        assert_eq!(args.address().unwrap(), Address::from_low_u64_be(0x42));

        let args = vec!["nftargs", "--nft", "0x42"];
        assert!(NftArgs::try_parse_from(args).is_err());

        let args = NftArgs { nft_contract_address: None };
        assert_eq!(
            args.address(),
            Err(AccountError::Config { keys: vec![NFT_CONTRACT_ADDRESS.into()] })
        );
    }

    #[test]
    fn session_args() {
        let args = vec![
            "sessionargs",
            "--session-file",
            "/tmp/smartkey/session.json",
            "--wait-for-receipt",
        ];
        let args = SessionArgs::try_parse_from(args).unwrap();
        assert_eq!(args.settlement(), Settlement::WaitForReceipt);
        assert_eq!(
            args.store().unwrap().path(),
            &std::path::PathBuf::from("/tmp/smartkey/session.json")
        );

        let args = SessionArgs::try_parse_from(vec!["sessionargs"]).unwrap();
        assert_eq!(args.settlement(), Settlement::Optimistic);
    }
}
