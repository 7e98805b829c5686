//! Connected wallets and the signing handle smart accounts are bound to
use ethers::{
    signers::{coins_bip39::English, LocalWallet, MnemonicBuilder, Signer},
    types::{
        transaction::eip712::{EIP712Domain, Eip712},
        Address, Signature,
    },
    utils::keccak256,
};
use expanded_pathbuf::ExpandedPathBuf;
use std::{convert::Infallible, fmt, sync::Arc};

/// Errors raised while loading or locating wallets
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalletError {
    /// None of the connected wallets is the embedded (managed) one
    #[error("no embedded wallet found among the connected wallets")]
    EmbeddedNotFound,
    /// Private key could not be parsed
    #[error("invalid private key: {inner}")]
    InvalidKey { inner: String },
    /// Mnemonic phrase could not be loaded or derived
    #[error("invalid mnemonic: {inner}")]
    Mnemonic { inner: String },
}

/// Something that can sign on behalf of an address
///
/// Smart accounts never see the concrete key type, only this handle.
#[async_trait::async_trait]
pub trait MessageSigner: fmt::Debug + Send + Sync {
    /// Address of the signing key
    fn signer_address(&self) -> Address;

    /// Signs `message` with the EIP-191 personal message prefix
    async fn sign_personal(&self, message: &[u8]) -> eyre::Result<Signature>;

    /// Signs the EIP-712 digest built from a domain separator and a struct hash
    async fn sign_typed_digest(
        &self,
        domain_separator: [u8; 32],
        struct_hash: [u8; 32],
    ) -> eyre::Result<Signature>;
}

/// Typed data whose domain separator and struct hash are already computed
#[derive(Debug, Clone, Copy)]
struct TypedDigest {
    domain_separator: [u8; 32],
    struct_hash: [u8; 32],
}

impl Eip712 for TypedDigest {
    type Error = Infallible;

    fn domain(&self) -> Result<EIP712Domain, Self::Error> {
        Ok(EIP712Domain::default())
    }

    fn type_hash() -> Result<[u8; 32], Self::Error> {
        Ok([0u8; 32])
    }

    fn struct_hash(&self) -> Result<[u8; 32], Self::Error> {
        Ok(self.struct_hash)
    }

    fn domain_separator(&self) -> Result<[u8; 32], Self::Error> {
        Ok(self.domain_separator)
    }

    fn encode_eip712(&self) -> Result<[u8; 32], Self::Error> {
        let digest_input =
            [&[0x19, 0x01], &self.domain_separator[..], &self.struct_hash[..]].concat();
        Ok(keccak256(digest_input))
    }
}

#[async_trait::async_trait]
impl<S> MessageSigner for S
where
    S: Signer + 'static,
{
    fn signer_address(&self) -> Address {
        self.address()
    }

    async fn sign_personal(&self, message: &[u8]) -> eyre::Result<Signature> {
        self.sign_message(message).await.map_err(|err| eyre::eyre!(err.to_string()))
    }

    async fn sign_typed_digest(
        &self,
        domain_separator: [u8; 32],
        struct_hash: [u8; 32],
    ) -> eyre::Result<Signature> {
        self.sign_typed_data(&TypedDigest { domain_separator, struct_hash })
            .await
            .map_err(|err| eyre::eyre!(err.to_string()))
    }
}

/// Kind of client behind a connected wallet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletClientType {
    /// Wallet managed by the application (embedded wallet)
    Embedded,
    /// Any external wallet, named after its client (e.g. "metamask")
    External(String),
}

/// Wallet connected to the application
#[derive(Clone)]
pub struct ConnectedWallet {
    pub address: Address,
    pub client_type: WalletClientType,
    pub signer: Arc<dyn MessageSigner>,
}

impl fmt::Debug for ConnectedWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectedWallet")
            .field("address", &self.address)
            .field("client_type", &self.client_type)
            .finish_non_exhaustive()
    }
}

impl ConnectedWallet {
    /// Wraps a signer as a connected wallet of the given kind
    pub fn new(client_type: WalletClientType, signer: Arc<dyn MessageSigner>) -> Self {
        Self { address: signer.signer_address(), client_type, signer }
    }

    /// Embedded wallet derived from a mnemonic phrase at `m/44'/60'/0'/0/{index}`
    pub fn embedded_from_phrase(phrase: &str, index: u32) -> Result<Self, WalletError> {
        let wallet = MnemonicBuilder::<English>::default()
            .phrase(phrase)
            .index(index)
            .map_err(|err| WalletError::Mnemonic { inner: err.to_string() })?
            .build()
            .map_err(|err| WalletError::Mnemonic { inner: err.to_string() })?;

        Ok(Self::new(WalletClientType::Embedded, Arc::new(wallet)))
    }

    /// Embedded wallet derived from the mnemonic phrase stored in the file at `path`
    pub fn embedded_from_file(path: ExpandedPathBuf, index: u32) -> Result<Self, WalletError> {
        let wallet = MnemonicBuilder::<English>::default()
            .phrase(path.to_path_buf())
            .index(index)
            .map_err(|err| WalletError::Mnemonic { inner: err.to_string() })?
            .build()
            .map_err(|err| WalletError::Mnemonic { inner: err.to_string() })?;

        Ok(Self::new(WalletClientType::Embedded, Arc::new(wallet)))
    }

    /// Embedded wallet from a hex encoded private key
    pub fn embedded_from_private_key(key: &str) -> Result<Self, WalletError> {
        let wallet: LocalWallet = key
            .trim()
            .trim_start_matches("0x")
            .parse()
            .map_err(|err: ethers::signers::WalletError| WalletError::InvalidKey {
                inner: err.to_string(),
            })?;

        Ok(Self::new(WalletClientType::Embedded, Arc::new(wallet)))
    }
}

/// Picks the embedded wallet among the connected ones (the first one if several qualify)
pub fn find_embedded_wallet(wallets: &[ConnectedWallet]) -> Result<&ConnectedWallet, WalletError> {
    wallets
        .iter()
        .find(|wallet| wallet.client_type == WalletClientType::Embedded)
        .ok_or(WalletError::EmbeddedNotFound)
}
