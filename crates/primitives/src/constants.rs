//! Account abstraction (ERC-4337)-related constants

/// Entry point smart contract
pub mod entry_point {
    /// Address of the entry point smart contract
    pub const ADDRESS: &str = "0x0000000071727De22E5E9d8BAf0edAc6f37da032";
}

/// Kernel v3 smart account
pub mod kernel {
    /// Kernel version, also the version of its EIP-712 domain
    pub const VERSION: &str = "0.3.3";
    /// Name of the EIP-712 domain of the account
    pub const DOMAIN_NAME: &str = "Kernel";
    /// Kernel factory
    pub const FACTORY: &str = "0x2577507b78c2008Ff367261CB6285d44ba5eF2E9";
    /// Factory staker wrapping the kernel factory (used in the init code)
    pub const META_FACTORY: &str = "0xd703aaE79538628d27099B8c4f621bE4CCd142d5";
    /// ECDSA validator used as the root validator
    pub const ECDSA_VALIDATOR: &str = "0x845ADb2C711129d4f3966735eD98a9F09fC4cE57";
}

/// Permission plugins (signer and policies of a permission validator)
pub mod permission {
    /// ECDSA signer module
    pub const ECDSA_SIGNER: &str = "0x6A6F069E2a08c2468e7724Ab3250CdBFBA14D4FF";
    /// Timestamp policy
    pub const TIMESTAMP_POLICY: &str = "0xB9f8f524bE6EcD8C945b1b87f9ae5C192FdCE20F";
    /// Call policy (v0.0.4)
    pub const CALL_POLICY: &str = "0x9a52283276A0ec8740DF50bF01B28A80D880eaf2";
    /// Rate limit policy
    pub const RATE_LIMIT_POLICY: &str = "0xf63d4139B25c836334edD76641356c6b74C86873";
}

/// Session keys
pub mod session {
    /// How long a granted session key stays valid (in seconds)
    pub const VALIDITY_SECS: u64 = 3600;
    /// Number of operations a session key may perform
    pub const USAGE_LIMIT: u32 = 3;
    /// Rate limit window (in seconds)
    pub const RATE_LIMIT_INTERVAL_SECS: u64 = 3600;
    /// Version of the stored session document
    pub const STORE_VERSION: u32 = 1;
    /// Default file name of the session store
    pub const STORE_FILE_NAME: &str = "session.json";
}

/// User operation submission
pub mod submission {
    /// Interval between two receipt polls (in milliseconds)
    pub const RECEIPT_POLL_INTERVAL_MS: u64 = 1000;
    /// Time after which waiting for a receipt gives up (in seconds)
    pub const RECEIPT_TIMEOUT_SECS: u64 = 120;
    /// Upper bound of calls in a composed batch mint
    pub const MAX_BATCH_MINT: usize = 10;
}

/// Environment variables
pub mod env {
    pub const APP_ID: &str = "APP_ID";
    pub const BUNDLER_RPC: &str = "BUNDLER_RPC";
    pub const PAYMASTER_RPC: &str = "PAYMASTER_RPC";
    pub const ETH_RPC: &str = "ETH_RPC";
    pub const NFT_CONTRACT_ADDRESS: &str = "NFT_CONTRACT_ADDRESS";
    pub const OWNER_PRIVATE_KEY: &str = "OWNER_PRIVATE_KEY";
}

/// Chain defaults
pub mod chain {
    use alloy_chains::NamedChain;

    /// Chain the demo runs on unless configured otherwise
    pub const DEFAULT_CHAIN: NamedChain = NamedChain::Sepolia;
    /// Public RPC of the default chain
    pub const DEFAULT_RPC: &str = "https://rpc.sepolia.org";
}
