//! Kernel v3 smart account: address derivation, call encoding, nonce keys and signatures
use crate::{
    config::AccountConfig,
    error::AccountError,
    network::Network,
    validator::{
        EcdsaValidator, EnablePayload, KernelValidator, PermissionApproval, PermissionValidator,
        ValidationId, VALIDATION_TYPE_PERMISSION, VALIDATION_TYPE_ROOT,
    },
};
use ethers::{
    abi::{self, AbiEncode, Token},
    contract::EthCall,
    types::{Address, Bytes, U256},
};
use smartkey_contracts::{
    kernel_api::{ExecuteCall, InitializeCall, UninstallValidationCall},
    meta_factory_api::DeployWithFactoryCall,
};
use smartkey_primitives::{Call, UserOperationHash};
use std::sync::Arc;
use tracing::debug;

/// Execution mode of a single call
const EXEC_MODE_SINGLE: [u8; 32] = [0u8; 32];

/// Nonce key mode of an operation that also enables its validator
const NONCE_MODE_ENABLE: u8 = 0x01;
const NONCE_MODE_DEFAULT: u8 = 0x00;

/// Hook address marking an installed validation without a hook
fn no_hook() -> Address {
    Address::from_low_u64_be(1)
}

/// Regular (non-root) validator the account operates with
#[derive(Clone, Debug)]
pub struct RegularValidator {
    pub validator: Arc<PermissionValidator>,
    pub approval: PermissionApproval,
}

/// Kernel v3 account bound to its validators
#[derive(Clone, Debug)]
pub struct KernelAccount {
    address: Address,
    chain_id: u64,
    config: AccountConfig,
    sudo: Arc<EcdsaValidator>,
    regular: Option<RegularValidator>,
}

impl KernelAccount {
    /// Account whose root ("sudo") validator is `sudo`; its address is resolved through the
    /// factory
    pub async fn create(
        network: &Network,
        sudo: Arc<EcdsaValidator>,
    ) -> Result<Self, AccountError> {
        let config = network.config;
        let address = network
            .chain
            .get_account_address(config.factory, Self::init_data(&sudo), salt(config.index))
            .await
            .map_err(AccountError::provider)?;

        debug!("Kernel account of owner {:?}: {address:?}", sudo.owner());

        Ok(Self { address, chain_id: network.chain_id, config, sudo, regular: None })
    }

    /// Account operated by the permission validator of `approval`, the owner staying root
    ///
    /// The account address is resolved again and must be the one the approval was given for.
    pub async fn from_approval(
        network: &Network,
        approval: PermissionApproval,
        validator: Arc<PermissionValidator>,
    ) -> Result<Self, AccountError> {
        let sudo =
            Arc::new(EcdsaValidator::watch_only(network.config.ecdsa_validator, approval.owner));
        let account = Self::create(network, sudo).await?;

        if account.address != approval.account_address {
            return Err(AccountError::AccountMismatch {
                expected: approval.account_address,
                actual: account.address,
            });
        }

        Ok(Self { regular: Some(RegularValidator { validator, approval }), ..account })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn config(&self) -> &AccountConfig {
        &self.config
    }

    /// Root validator, the owner authority
    pub fn sudo_validator(&self) -> &Arc<EcdsaValidator> {
        &self.sudo
    }

    /// Validator signing the operations of this account
    pub fn active_validator(&self) -> Arc<dyn KernelValidator> {
        match self.regular {
            Some(ref regular) => regular.validator.clone(),
            None => self.sudo.clone(),
        }
    }

    /// Encoded `initialize` call installing `sudo` as the root validator
    pub fn init_data(sudo: &EcdsaValidator) -> Bytes {
        InitializeCall {
            root_validator: sudo.validation_id(),
            // zero is replaced by the no-hook marker on initialization
            hook: Address::zero(),
            validator_data: sudo.validator_data(),
            hook_data: Bytes::default(),
            init_config: vec![],
        }
        .encode()
        .into()
    }

    /// Factory and factory data deploying the account
    pub fn factory_data(&self) -> (Address, Bytes) {
        let data = DeployWithFactoryCall {
            factory: self.config.factory,
            create_data: Self::init_data(&self.sudo),
            salt: salt(self.config.index),
        }
        .encode();
        (self.config.meta_factory, data.into())
    }

    /// Call data of `execute` running `calls` (batched when there is more than one)
    pub fn encode_calls(calls: &[Call]) -> Result<Bytes, AccountError> {
        let (exec_mode, execution_calldata) = match calls {
            [] => return Err(AccountError::EmptyOperations),
            [call] => {
                let mut value = [0u8; 32];
                call.value.to_big_endian(&mut value);
                (
                    EXEC_MODE_SINGLE,
                    [call.target.as_bytes(), &value, call.data.as_ref()].concat(),
                )
            }
            calls => {
                let mut exec_mode = [0u8; 32];
                // batch call type
                exec_mode[0] = 0x01;
                let executions = calls
                    .iter()
                    .map(|call| {
                        Token::Tuple(vec![
                            Token::Address(call.target),
                            Token::Uint(call.value),
                            Token::Bytes(call.data.to_vec()),
                        ])
                    })
                    .collect();
                (exec_mode, abi::encode(&[Token::Array(executions)]))
            }
        };

        Ok(ExecuteCall { exec_mode, execution_calldata: execution_calldata.into() }.encode().into())
    }

    /// 192-bit nonce key selecting the active validator
    ///
    /// Layout: mode (1 byte), validation type (1), identifier (20), key (2).
    pub fn nonce_key(&self, enable: bool) -> U256 {
        let mut key = [0u8; 24];
        if let Some(ref regular) = self.regular {
            let id = regular.validator.validation_id();
            key[0] = if enable { NONCE_MODE_ENABLE } else { NONCE_MODE_DEFAULT };
            key[1] = VALIDATION_TYPE_PERMISSION;
            key[2..22].copy_from_slice(&id[1..]);
        } else {
            key[0] = NONCE_MODE_DEFAULT;
            key[1] = VALIDATION_TYPE_ROOT;
        }
        U256::from_big_endian(&key)
    }

    /// Whether the next operation has to enable the regular validator
    pub async fn needs_enable(&self, network: &Network) -> Result<bool, AccountError> {
        let Some(ref regular) = self.regular else {
            return Ok(false);
        };

        if !network.chain.is_deployed(self.address).await.map_err(AccountError::provider)? {
            return Ok(true);
        }

        let config = network
            .chain
            .validation_config(self.address, regular.validator.validation_id())
            .await
            .map_err(AccountError::provider)?;
        Ok(!config.is_installed())
    }

    /// Placeholder signature for gas estimation
    pub fn dummy_signature(&self, enable: bool) -> Result<Bytes, AccountError> {
        let sig = self.active_validator().dummy_signature();
        match self.regular {
            Some(ref regular) if enable => Self::enable_signature(regular, sig),
            _ => Ok(sig),
        }
    }

    /// Signs the user operation hash with the active validator
    pub async fn sign(
        &self,
        hash: &UserOperationHash,
        enable: bool,
    ) -> Result<Bytes, AccountError> {
        let sig = self.active_validator().sign_user_operation_hash(hash).await?;
        match self.regular {
            Some(ref regular) if enable => Self::enable_signature(regular, sig),
            _ => Ok(sig),
        }
    }

    /// Signature of an operation enabling the regular validator: the hook followed by the enable
    /// data, the owner's approval and the validator's signature
    fn enable_signature(regular: &RegularValidator, sig: Bytes) -> Result<Bytes, AccountError> {
        let payload = enable_payload(&regular.validator, regular.approval.enable_nonce);
        let data = abi::encode(&[
            Token::Bytes(payload.validator_data.to_vec()),
            Token::Bytes(payload.hook_data.to_vec()),
            Token::Bytes(payload.selector_data.to_vec()),
            Token::Bytes(regular.approval.enable_signature.to_vec()),
            Token::Bytes(sig.to_vec()),
        ]);
        Ok([payload.hook.as_bytes(), &data].concat().into())
    }

    /// Owner approval enabling `validator` on this account
    pub async fn approve(
        &self,
        network: &Network,
        validator: &PermissionValidator,
    ) -> Result<PermissionApproval, AccountError> {
        let enable_nonce =
            if network.chain.is_deployed(self.address).await.map_err(AccountError::provider)? {
                network
                    .chain
                    .kernel_current_nonce(self.address)
                    .await
                    .map_err(AccountError::provider)?
            } else {
                // nonce of a freshly initialized account
                1
            };

        let payload = enable_payload(validator, enable_nonce);
        let enable_signature = self
            .sudo
            .sign_typed_digest(
                EnablePayload::domain_separator(self.chain_id, self.address),
                payload.struct_hash(),
            )
            .await?;

        Ok(PermissionApproval {
            account_address: self.address,
            owner: self.sudo.owner(),
            session_key_address: validator.session_key(),
            contracts: *validator.contracts(),
            policies: validator.policies().to_vec(),
            enable_nonce,
            enable_signature,
        })
    }

    /// Call removing the validation `validation_id` from the account
    pub fn uninstall_validation_call(&self, validation_id: ValidationId) -> Call {
        let data = UninstallValidationCall {
            v_id: validation_id,
            deinit_data: Bytes::default(),
            hook_deinit_data: Bytes::default(),
        }
        .encode();
        Call::new(self.address, data.into()).description(format!(
            "Uninstall validation 0x{}",
            ethers::utils::hex::encode(validation_id)
        ))
    }
}

/// Salt of the account with the given index
fn salt(index: u64) -> [u8; 32] {
    let mut salt = [0u8; 32];
    U256::from(index).to_big_endian(&mut salt);
    salt
}

/// Enable data of a permission validator allowed to call `execute`
fn enable_payload(validator: &PermissionValidator, nonce: u32) -> EnablePayload {
    let selector_data = [
        ExecuteCall::selector().as_slice(),
        Address::zero().as_bytes(),
        no_hook().as_bytes(),
        &abi::encode(&[Token::Bytes(vec![0xff]), Token::Bytes(vec![])]),
    ]
    .concat();

    EnablePayload {
        validation_id: validator.validation_id(),
        nonce,
        hook: no_hook(),
        validator_data: validator.validator_data(),
        hook_data: Bytes::default(),
        selector_data: selector_data.into(),
    }
}
