//! Basic transaction type for account abstraction (ERC-4337), EntryPoint v0.7 layout

mod hash;

use crate::utils::{
    as_checksum_addr, as_checksum_addr_opt, pack_factory_data, pack_paymaster_data, pack_uint128,
};
use ethers::{
    abi::{self, Token},
    types::{Address, Bytes, Log, TransactionReceipt, H256, U256},
    utils::keccak256,
};
pub use hash::UserOperationHash;
use serde::{Deserialize, Serialize};

/// User operation as exchanged with bundlers and paymasters (unpacked v0.7 form)
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperation {
    /// Sender of the user operation
    #[serde(serialize_with = "as_checksum_addr")]
    pub sender: Address,

    /// Nonce (anti replay protection), the upper 192 bits are the nonce key
    pub nonce: U256,

    /// Factory deploying the account (only if the account is not deployed yet)
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "as_checksum_addr_opt"
    )]
    pub factory: Option<Address>,

    /// Data passed to the factory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factory_data: Option<Bytes>,

    /// The data that is passed to the sender during the main execution call
    pub call_data: Bytes,

    /// The amount of gas to allocate for the main execution call
    pub call_gas_limit: U256,

    /// The amount of gas to allocate for the verification step
    pub verification_gas_limit: U256,

    /// The amount of gas to pay bundler to compensate for the pre-verification execution and
    /// calldata
    pub pre_verification_gas: U256,

    /// Maximum fee per gas (similar to EIP-1559)
    pub max_fee_per_gas: U256,

    /// Maximum priority fee per gas (similar to EIP-1559)
    pub max_priority_fee_per_gas: U256,

    /// Paymaster sponsoring the user operation
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "as_checksum_addr_opt"
    )]
    pub paymaster: Option<Address>,

    /// Gas for the paymaster verification step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster_verification_gas_limit: Option<U256>,

    /// Gas for the paymaster post-operation step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster_post_op_gas_limit: Option<U256>,

    /// Extra data passed to the paymaster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster_data: Option<Bytes>,

    /// Data passed to the account along with the nonce during the verification step
    pub signature: Bytes,
}

/// User operation in the layout the entry point contract consumes
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PackedUserOperation {
    pub sender: Address,
    pub nonce: U256,
    pub init_code: Bytes,
    pub call_data: Bytes,
    /// `verificationGasLimit` (high 128 bits) and `callGasLimit` (low 128 bits)
    pub account_gas_limits: [u8; 32],
    pub pre_verification_gas: U256,
    /// `maxPriorityFeePerGas` (high 128 bits) and `maxFeePerGas` (low 128 bits)
    pub gas_fees: [u8; 32],
    pub paymaster_and_data: Bytes,
    pub signature: Bytes,
}

impl UserOperation {
    /// Packs the user operation into the entry point layout
    pub fn pack(&self) -> PackedUserOperation {
        let init_code = match self.factory {
            Some(factory) => {
                pack_factory_data(factory, &self.factory_data.clone().unwrap_or_default())
            }
            None => vec![],
        };
        let paymaster_and_data = match self.paymaster {
            Some(paymaster) => pack_paymaster_data(
                paymaster,
                self.paymaster_verification_gas_limit.unwrap_or_default(),
                self.paymaster_post_op_gas_limit.unwrap_or_default(),
                &self.paymaster_data.clone().unwrap_or_default(),
            ),
            None => vec![],
        };

        PackedUserOperation {
            sender: self.sender,
            nonce: self.nonce,
            init_code: init_code.into(),
            call_data: self.call_data.clone(),
            account_gas_limits: pack_uint128(self.verification_gas_limit, self.call_gas_limit),
            pre_verification_gas: self.pre_verification_gas,
            gas_fees: pack_uint128(self.max_priority_fee_per_gas, self.max_fee_per_gas),
            paymaster_and_data: paymaster_and_data.into(),
            signature: self.signature.clone(),
        }
    }

    /// Calculates the hash of the user operation (the signature is not part of it)
    pub fn hash(&self, entry_point: &Address, chain_id: u64) -> UserOperationHash {
        let packed = self.pack();
        let inner = abi::encode(&[
            Token::Address(packed.sender),
            Token::Uint(packed.nonce),
            Token::FixedBytes(keccak256(&packed.init_code).to_vec()),
            Token::FixedBytes(keccak256(&packed.call_data).to_vec()),
            Token::FixedBytes(packed.account_gas_limits.to_vec()),
            Token::Uint(packed.pre_verification_gas),
            Token::FixedBytes(packed.gas_fees.to_vec()),
            Token::FixedBytes(keccak256(&packed.paymaster_and_data).to_vec()),
        ]);

        H256::from(keccak256(abi::encode(&[
            Token::FixedBytes(keccak256(inner).to_vec()),
            Token::Address(*entry_point),
            Token::Uint(U256::from(chain_id)),
        ])))
        .into()
    }

    // Builder pattern helpers

    /// Sets the sender of the user operation
    pub fn sender(mut self, sender: Address) -> Self {
        self.sender = sender;
        self
    }

    /// Sets the nonce of the user operation
    pub fn nonce(mut self, nonce: U256) -> Self {
        self.nonce = nonce;
        self
    }

    /// Sets the factory and factory data of the user operation
    pub fn factory(mut self, factory: Address, factory_data: Bytes) -> Self {
        self.factory = Some(factory);
        self.factory_data = Some(factory_data);
        self
    }

    /// Sets the call data of the user operation
    pub fn call_data(mut self, call_data: Bytes) -> Self {
        self.call_data = call_data;
        self
    }

    /// Sets the call gas limit of the user operation
    pub fn call_gas_limit(mut self, call_gas_limit: U256) -> Self {
        self.call_gas_limit = call_gas_limit;
        self
    }

    /// Sets the verification gas limit of the user operation
    pub fn verification_gas_limit(mut self, verification_gas_limit: U256) -> Self {
        self.verification_gas_limit = verification_gas_limit;
        self
    }

    /// Sets the pre-verification gas of the user operation
    pub fn pre_verification_gas(mut self, pre_verification_gas: U256) -> Self {
        self.pre_verification_gas = pre_verification_gas;
        self
    }

    /// Sets the max fee per gas of the user operation
    pub fn max_fee_per_gas(mut self, max_fee_per_gas: U256) -> Self {
        self.max_fee_per_gas = max_fee_per_gas;
        self
    }

    /// Sets the max priority fee per gas of the user operation
    pub fn max_priority_fee_per_gas(mut self, max_priority_fee_per_gas: U256) -> Self {
        self.max_priority_fee_per_gas = max_priority_fee_per_gas;
        self
    }

    /// Sets the signature of the user operation
    pub fn signature(mut self, signature: Bytes) -> Self {
        self.signature = signature;
        self
    }
}

/// Gas estimations for user operation (returned from the RPC endpoint eth_estimateUserOperationGas)
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperationGasEstimation {
    pub pre_verification_gas: U256,
    pub verification_gas_limit: U256,
    pub call_gas_limit: U256,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster_verification_gas_limit: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster_post_op_gas_limit: Option<U256>,
}

/// Receipt of the user operation (returned from the RPC endpoint eth_getUserOperationReceipt)
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperationReceipt {
    #[serde(rename = "userOpHash")]
    pub user_operation_hash: UserOperationHash,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_point: Option<Address>,
    #[serde(serialize_with = "as_checksum_addr")]
    pub sender: Address,
    pub nonce: U256,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster: Option<Address>,
    pub actual_gas_cost: U256,
    pub actual_gas_used: U256,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default)]
    pub logs: Vec<Log>,
    #[serde(rename = "receipt")]
    pub tx_receipt: TransactionReceipt,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::entry_point::ADDRESS;

    fn user_operation() -> UserOperation {
        UserOperation::default()
            .sender("0x9c5754De1443984659E1b3a8d1931D83475ba29C".parse().unwrap())
            .nonce(1.into())
            .call_data("0x1249c58b".parse().unwrap())
            .call_gas_limit(33_100.into())
            .verification_gas_limit(60_624.into())
            .pre_verification_gas(44_056.into())
            .max_fee_per_gas(1_695_000_030_u64.into())
            .max_priority_fee_per_gas(1_695_000_000.into())
    }

    #[test]
    fn user_operation_pack() {
        let mut uo = user_operation().factory(
            "0xd703aaE79538628d27099B8c4f621bE4CCd142d5".parse().unwrap(),
            "0xabcd".parse().unwrap(),
        );
        uo.paymaster = Some("0x000000000000000000000000000000000000dEaD".parse().unwrap());
        uo.paymaster_verification_gas_limit = Some(100_000.into());
        uo.paymaster_post_op_gas_limit = Some(1.into());
        uo.paymaster_data = Some("0x01".parse().unwrap());

        let packed = uo.pack();
        assert_eq!(packed.init_code.len(), 22);
        assert_eq!(packed.paymaster_and_data.len(), 20 + 32 + 1);
        assert_eq!(packed.account_gas_limits, pack_uint128(60_624.into(), 33_100.into()));
        assert_eq!(packed.gas_fees, pack_uint128(1_695_000_000.into(), 1_695_000_030_u64.into()));
    }

    #[test]
    fn user_operation_pack_without_factory_and_paymaster() {
        let packed = user_operation().pack();
        assert!(packed.init_code.is_empty());
        assert!(packed.paymaster_and_data.is_empty());
    }

    #[test]
    fn user_operation_hash_ignores_signature() {
        let ep: Address = ADDRESS.parse().unwrap();
        let uo = user_operation();
        let signed = uo.clone().signature("0xff".parse().unwrap());

        assert_eq!(uo.hash(&ep, 11_155_111), signed.hash(&ep, 11_155_111));
        assert_ne!(uo.hash(&ep, 11_155_111), uo.hash(&ep, 1));
        assert_ne!(uo.hash(&ep, 11_155_111), uo.clone().nonce(2.into()).hash(&ep, 11_155_111));
    }

    #[test]
    fn user_operation_serde() {
        let uo = user_operation();
        let value = serde_json::to_value(&uo).unwrap();

        assert_eq!(value["sender"], "0x9c5754De1443984659E1b3a8d1931D83475ba29C");
        assert_eq!(value["callData"], "0x1249c58b");
        assert!(value.get("factory").is_none());
        assert!(value.get("paymaster").is_none());

        let back: UserOperation = serde_json::from_value(value).unwrap();
        assert_eq!(back, uo);
    }
}
