use ethers::{
    abi::{parse_abi, Abi},
    contract::abigen,
};

abigen!(
    EntryPointAPI,
    r#"[
        function getNonce(address sender, uint192 key) public view returns (uint256 nonce)
        event UserOperationEvent(bytes32 indexed userOpHash,address indexed sender,address indexed paymaster,uint256 nonce,bool success,uint256 actualGasCost,uint256 actualGasUsed)
        event UserOperationRevertReason(bytes32 indexed userOpHash,address indexed sender,uint256 nonce,bytes revertReason)
    ]"#
);

abigen!(
    KernelAPI,
    r#"[
        function execute(bytes32 execMode, bytes executionCalldata) external payable
        function initialize(bytes21 rootValidator, address hook, bytes validatorData, bytes hookData, bytes[] initConfig) external
        function uninstallValidation(bytes21 vId, bytes deinitData, bytes hookDeinitData) external payable
        function validationConfig(bytes21 vId) external view returns (uint32 nonce, address hook)
        function currentNonce() external view returns (uint32)
        function rootValidator() external view returns (bytes21)
        function accountId() external pure returns (string)
    ]"#
);

abigen!(
    KernelFactoryAPI,
    r#"[
        function getAddress(bytes data, bytes32 salt) external view returns (address)
        function createAccount(bytes data, bytes32 salt) external payable returns (address)
    ]"#
);

abigen!(
    MetaFactoryAPI,
    r#"[
        function deployWithFactory(address factory, bytes createData, bytes32 salt) external payable returns (address)
    ]"#
);

/// Human-readable interface of the demo NFT (MagicBadge)
pub const MAGIC_BADGE_ABI: &[&str] = &[
    "function mint() external",
    "function safeMint(address to) external",
    "function batchMint(address to, uint256 quantity) external",
    "function name() external view returns (string)",
    "function symbol() external view returns (string)",
    "function balanceOf(address owner) external view returns (uint256)",
    "function totalSupply() external view returns (uint256)",
];

abigen!(
    MagicBadgeAPI,
    r#"[
        function mint() external
        function safeMint(address to) external
        function batchMint(address to, uint256 quantity) external
        function name() external view returns (string)
        function symbol() external view returns (string)
        function balanceOf(address owner) external view returns (uint256)
        function totalSupply() external view returns (uint256)
    ]"#
);

/// Parsed interface of the demo NFT, used when composing calls by function name
pub fn magic_badge_abi() -> eyre::Result<Abi> {
    Ok(parse_abi(MAGIC_BADGE_ABI)?)
}
