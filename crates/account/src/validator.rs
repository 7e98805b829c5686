//! Kernel v3 validators: the owner's ECDSA validator and permission (session key) validators
use crate::{config::PermissionContracts, error::AccountError};
use ethers::{
    abi::{self, Token},
    types::{transaction::eip712::EIP712Domain, Address, Bytes, H32, U256},
    utils::{hex, keccak256},
};
use serde::{Deserialize, Serialize};
use smartkey_primitives::{
    constants::kernel::{DOMAIN_NAME, VERSION},
    MessageSigner, UserOperationHash,
};
use std::{fmt, sync::Arc};

/// Validation id: validation type followed by the validator address or the permission id
pub type ValidationId = [u8; 21];

pub const VALIDATION_TYPE_ROOT: u8 = 0x00;
pub const VALIDATION_TYPE_VALIDATOR: u8 = 0x01;
pub const VALIDATION_TYPE_PERMISSION: u8 = 0x02;

/// Applies a policy (or the signer) to every validation of the permission
const FLAG_FOR_ALL_VALIDATION: [u8; 2] = [0x00, 0x00];

/// Prefix of a permission signature without policy signature data
const PERMISSION_SIGNATURE_PREFIX: u8 = 0xff;

/// Well-formed ECDSA signature that doesn't verify, for gas estimation
const DUMMY_ECDSA_SIGNATURE: &str = "fffffffffffffffffffffffffffffff0000000000000000000000000000000007aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa1c";

const ENABLE_TYPE: &str = "Enable(bytes21 validationId,uint32 nonce,address hook,bytes validatorData,bytes hookData,bytes selectorData)";

fn dummy_ecdsa_signature() -> Vec<u8> {
    hex::decode(DUMMY_ECDSA_SIGNATURE).unwrap_or_default()
}

/// Validator of a Kernel account
#[async_trait::async_trait]
pub trait KernelValidator: fmt::Debug + Send + Sync + 'static {
    fn validation_id(&self) -> ValidationId;

    /// Data the validator is installed (or enabled) with
    fn validator_data(&self) -> Bytes;

    /// Signature of the right shape, used while estimating gas
    fn dummy_signature(&self) -> Bytes;

    async fn sign_user_operation_hash(&self, hash: &UserOperationHash)
        -> Result<Bytes, AccountError>;
}

/// ECDSA validator, the owner authority of an account
#[derive(Clone)]
pub struct EcdsaValidator {
    validator: Address,
    owner: Address,
    signer: Option<Arc<dyn MessageSigner>>,
}

impl fmt::Debug for EcdsaValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EcdsaValidator")
            .field("validator", &self.validator)
            .field("owner", &self.owner)
            .field("can_sign", &self.can_sign())
            .finish()
    }
}

impl EcdsaValidator {
    pub fn new(validator: Address, signer: Arc<dyn MessageSigner>) -> Self {
        Self { validator, owner: signer.signer_address(), signer: Some(signer) }
    }

    /// Validator of `owner` without access to its key (can build accounts but not sign)
    pub fn watch_only(validator: Address, owner: Address) -> Self {
        Self { validator, owner, signer: None }
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn can_sign(&self) -> bool {
        self.signer.is_some()
    }

    fn signer(&self) -> Result<&Arc<dyn MessageSigner>, AccountError> {
        self.signer.as_ref().ok_or_else(|| AccountError::MissingSigner(format!("{:?}", self.owner)))
    }

    /// Signs an EIP-712 digest (used for enable approvals)
    pub async fn sign_typed_digest(
        &self,
        domain_separator: [u8; 32],
        struct_hash: [u8; 32],
    ) -> Result<Bytes, AccountError> {
        let sig = self
            .signer()?
            .sign_typed_digest(domain_separator, struct_hash)
            .await
            .map_err(|err| AccountError::Signature { inner: err.to_string() })?;
        Ok(sig.to_vec().into())
    }
}

#[async_trait::async_trait]
impl KernelValidator for EcdsaValidator {
    fn validation_id(&self) -> ValidationId {
        let mut id = [0u8; 21];
        id[0] = VALIDATION_TYPE_VALIDATOR;
        id[1..].copy_from_slice(self.validator.as_bytes());
        id
    }

    fn validator_data(&self) -> Bytes {
        self.owner.as_bytes().to_vec().into()
    }

    fn dummy_signature(&self) -> Bytes {
        dummy_ecdsa_signature().into()
    }

    async fn sign_user_operation_hash(
        &self,
        hash: &UserOperationHash,
    ) -> Result<Bytes, AccountError> {
        let sig = self
            .signer()?
            .sign_personal(hash.as_fixed_bytes())
            .await
            .map_err(|err| AccountError::Signature { inner: err.to_string() })?;
        Ok(sig.to_vec().into())
    }
}

/// Function a call policy allows
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallPermission {
    pub target: Address,
    pub selector: H32,
    /// Maximum native value per call
    pub value_limit: U256,
}

/// Policy restricting what a permission may do
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Policy {
    /// Valid only within `[valid_after, valid_until]` (unix seconds)
    #[serde(rename_all = "camelCase")]
    Timestamp { valid_after: u64, valid_until: u64 },
    /// Only the listed functions may be called
    #[serde(rename_all = "camelCase")]
    Call { permissions: Vec<CallPermission> },
    /// At most `count` operations per `interval` seconds, starting at `start_at`
    #[serde(rename_all = "camelCase")]
    RateLimit { interval: u64, count: u64, start_at: u64 },
}

fn uint48(value: u64) -> [u8; 6] {
    let bytes = value.to_be_bytes();
    let mut res = [0u8; 6];
    res.copy_from_slice(&bytes[2..]);
    res
}

impl Policy {
    pub fn address(&self, contracts: &PermissionContracts) -> Address {
        match self {
            Policy::Timestamp { .. } => contracts.timestamp_policy,
            Policy::Call { .. } => contracts.call_policy,
            Policy::RateLimit { .. } => contracts.rate_limit_policy,
        }
    }

    /// Data the policy contract is installed with
    pub fn policy_data(&self) -> Vec<u8> {
        match self {
            Policy::Timestamp { valid_after, valid_until } => {
                [uint48(*valid_after), uint48(*valid_until)].concat()
            }
            Policy::RateLimit { interval, count, start_at } => {
                [uint48(*interval), uint48(*count), uint48(*start_at)].concat()
            }
            Policy::Call { permissions } => {
                let permissions = permissions
                    .iter()
                    .map(|p| {
                        Token::Tuple(vec![
                            // single call
                            Token::FixedBytes(vec![0x00]),
                            Token::Address(p.target),
                            Token::FixedBytes(p.selector.as_bytes().to_vec()),
                            Token::Uint(p.value_limit),
                            // no argument rules
                            Token::Array(vec![]),
                        ])
                    })
                    .collect();
                abi::encode(&[Token::Array(permissions)])
            }
        }
    }
}

/// Permission validator: a session key signer restricted by policies
#[derive(Clone)]
pub struct PermissionValidator {
    contracts: PermissionContracts,
    session_key: Address,
    policies: Vec<Policy>,
    signer: Option<Arc<dyn MessageSigner>>,
}

impl fmt::Debug for PermissionValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermissionValidator")
            .field("session_key", &self.session_key)
            .field("policies", &self.policies)
            .field("can_sign", &self.signer.is_some())
            .finish()
    }
}

impl PermissionValidator {
    pub fn new(
        contracts: PermissionContracts,
        signer: Arc<dyn MessageSigner>,
        policies: Vec<Policy>,
    ) -> Self {
        Self { contracts, session_key: signer.signer_address(), policies, signer: Some(signer) }
    }

    /// Permission validator of `session_key` without access to the key
    pub fn watch_only(
        contracts: PermissionContracts,
        session_key: Address,
        policies: Vec<Policy>,
    ) -> Self {
        Self { contracts, session_key, policies, signer: None }
    }

    pub fn session_key(&self) -> Address {
        self.session_key
    }

    pub fn policies(&self) -> &[Policy] {
        &self.policies
    }

    pub fn contracts(&self) -> &PermissionContracts {
        &self.contracts
    }

    /// First 4 bytes of the hash of the validator data
    pub fn permission_id(&self) -> [u8; 4] {
        let hash = keccak256(self.validator_data());
        [hash[0], hash[1], hash[2], hash[3]]
    }
}

#[async_trait::async_trait]
impl KernelValidator for PermissionValidator {
    fn validation_id(&self) -> ValidationId {
        let mut id = [0u8; 21];
        id[0] = VALIDATION_TYPE_PERMISSION;
        id[1..5].copy_from_slice(&self.permission_id());
        id
    }

    fn validator_data(&self) -> Bytes {
        let mut entries: Vec<Token> = self
            .policies
            .iter()
            .map(|policy| {
                Token::Bytes(
                    [
                        FLAG_FOR_ALL_VALIDATION.as_slice(),
                        policy.address(&self.contracts).as_bytes(),
                        &policy.policy_data(),
                    ]
                    .concat(),
                )
            })
            .collect();
        entries.push(Token::Bytes(
            [
                FLAG_FOR_ALL_VALIDATION.as_slice(),
                self.contracts.ecdsa_signer.as_bytes(),
                self.session_key.as_bytes(),
            ]
            .concat(),
        ));

        abi::encode(&[Token::Array(entries)]).into()
    }

    fn dummy_signature(&self) -> Bytes {
        [vec![PERMISSION_SIGNATURE_PREFIX], dummy_ecdsa_signature()].concat().into()
    }

    async fn sign_user_operation_hash(
        &self,
        hash: &UserOperationHash,
    ) -> Result<Bytes, AccountError> {
        let signer = self
            .signer
            .as_ref()
            .ok_or_else(|| AccountError::MissingSigner(format!("{:?}", self.session_key)))?;
        let sig = signer
            .sign_personal(hash.as_fixed_bytes())
            .await
            .map_err(|err| AccountError::Signature { inner: err.to_string() })?;
        Ok([vec![PERMISSION_SIGNATURE_PREFIX], sig.to_vec()].concat().into())
    }
}

/// `Enable` typed data, signed by the root validator to enable a regular validator
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnablePayload {
    pub validation_id: ValidationId,
    pub nonce: u32,
    pub hook: Address,
    pub validator_data: Bytes,
    pub hook_data: Bytes,
    pub selector_data: Bytes,
}

impl EnablePayload {
    pub fn type_hash() -> [u8; 32] {
        keccak256(ENABLE_TYPE)
    }

    pub fn struct_hash(&self) -> [u8; 32] {
        keccak256(abi::encode(&[
            Token::FixedBytes(Self::type_hash().to_vec()),
            Token::FixedBytes(self.validation_id.to_vec()),
            Token::Uint(self.nonce.into()),
            Token::Address(self.hook),
            Token::FixedBytes(keccak256(&self.validator_data).to_vec()),
            Token::FixedBytes(keccak256(&self.hook_data).to_vec()),
            Token::FixedBytes(keccak256(&self.selector_data).to_vec()),
        ]))
    }

    /// Domain of the account the validator is enabled on
    pub fn domain_separator(chain_id: u64, account: Address) -> [u8; 32] {
        EIP712Domain {
            name: Some(DOMAIN_NAME.into()),
            version: Some(VERSION.into()),
            chain_id: Some(chain_id.into()),
            verifying_contract: Some(account),
            salt: None,
        }
        .separator()
    }
}

/// Owner approval of a permission validator, everything needed to use or revoke it later
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionApproval {
    pub account_address: Address,
    pub owner: Address,
    pub session_key_address: Address,
    pub contracts: PermissionContracts,
    pub policies: Vec<Policy>,
    pub enable_nonce: u32,
    pub enable_signature: Bytes,
}

impl PermissionApproval {
    /// Opaque (hex encoded) form of the approval
    pub fn serialize(&self) -> Result<String, AccountError> {
        let json = serde_json::to_vec(self)
            .map_err(|err| AccountError::InvalidApproval { inner: err.to_string() })?;
        Ok(hex::encode(json))
    }

    pub fn deserialize(blob: &str) -> Result<Self, AccountError> {
        let json = hex::decode(blob.trim())
            .map_err(|err| AccountError::InvalidApproval { inner: err.to_string() })?;
        serde_json::from_slice(&json)
            .map_err(|err| AccountError::InvalidApproval { inner: err.to_string() })
    }

    /// Permission validator the approval was given for, bound to `signer`
    pub fn permission_validator(
        &self,
        signer: Arc<dyn MessageSigner>,
    ) -> Result<PermissionValidator, AccountError> {
        if signer.signer_address() != self.session_key_address {
            return Err(AccountError::InvalidApproval {
                inner: format!(
                    "approval is for session key {:?}, not {:?}",
                    self.session_key_address,
                    signer.signer_address()
                ),
            });
        }
        Ok(PermissionValidator::new(self.contracts, signer, self.policies.clone()))
    }

    /// Permission validator the approval was given for, without the session key
    pub fn watch_only_validator(&self) -> PermissionValidator {
        PermissionValidator::watch_only(
            self.contracts,
            self.session_key_address,
            self.policies.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::{prelude::rand, signers::LocalWallet, types::Signature};

    fn session_signer() -> Arc<dyn MessageSigner> {
        Arc::new(LocalWallet::new(&mut rand::thread_rng()))
    }

    fn policies() -> Vec<Policy> {
        vec![
            Policy::Timestamp { valid_after: 1_000, valid_until: 4_600 },
            Policy::Call {
                permissions: vec![CallPermission {
                    target: Address::from_low_u64_be(0xbeef),
                    selector: H32([0x12, 0x49, 0xc5, 0x8b]),
                    value_limit: U256::zero(),
                }],
            },
            Policy::RateLimit { interval: 3600, count: 3, start_at: 0 },
        ]
    }

    #[test]
    fn policy_data_layout() {
        assert_eq!(
            Policy::Timestamp { valid_after: 1, valid_until: 2 }.policy_data(),
            vec![0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 2]
        );
        assert_eq!(
            Policy::RateLimit { interval: 3600, count: 3, start_at: 0 }.policy_data().len(),
            18
        );

        let call = policies()[1].policy_data();
        // offset, length, tuple offset, 5 head words, empty rules array
        assert_eq!(call.len(), 32 * 9);
    }

    #[test]
    fn dummy_signatures_are_well_formed() {
        let dummy = dummy_ecdsa_signature();
        assert_eq!(dummy.len(), 65);
        assert_eq!(dummy[64], 0x1c);
        assert!(Signature::try_from(dummy.as_slice()).is_ok());

        let root = EcdsaValidator::new(Address::zero(), session_signer());
        assert_eq!(root.dummy_signature().len(), 65);

        let permission =
            PermissionValidator::new(PermissionContracts::default(), session_signer(), policies());
        let dummy = permission.dummy_signature();
        assert_eq!(dummy.len(), 66);
        assert_eq!(dummy[0], PERMISSION_SIGNATURE_PREFIX);
    }

    #[test]
    fn permission_ids() {
        let signer = session_signer();
        let validator =
            PermissionValidator::new(PermissionContracts::default(), signer.clone(), policies());

        let id = validator.validation_id();
        assert_eq!(id[0], VALIDATION_TYPE_PERMISSION);
        assert_eq!(&id[1..5], &validator.permission_id());
        assert!(id[5..].iter().all(|b| *b == 0));

        // same configuration, same permission
        let watch_only = PermissionValidator::watch_only(
            PermissionContracts::default(),
            signer.signer_address(),
            policies(),
        );
        assert_eq!(watch_only.validation_id(), id);

        let other = PermissionValidator::new(
            PermissionContracts::default(),
            signer,
            policies().into_iter().take(2).collect(),
        );
        assert_ne!(other.permission_id(), validator.permission_id());
    }

    #[tokio::test]
    async fn permission_signature_recovers_to_session_key() {
        let signer = session_signer();
        let validator =
            PermissionValidator::new(PermissionContracts::default(), signer.clone(), policies());
        let hash = UserOperationHash::from([7u8; 32]);

        let sig = validator.sign_user_operation_hash(&hash).await.unwrap();
        assert_eq!(sig.len(), 66);
        assert_eq!(sig[0], 0xff);
        assert_eq!(validator.dummy_signature().len(), 66);

        let sig = Signature::try_from(&sig[1..]).unwrap();
        assert_eq!(sig.recover(hash.as_fixed_bytes().to_vec()).unwrap(), signer.signer_address());
    }

    #[tokio::test]
    async fn watch_only_validators_cannot_sign() {
        let hash = UserOperationHash::from([7u8; 32]);

        let ecdsa = EcdsaValidator::watch_only(Address::zero(), Address::from_low_u64_be(1));
        assert!(!ecdsa.can_sign());
        assert!(matches!(
            ecdsa.sign_user_operation_hash(&hash).await,
            Err(AccountError::MissingSigner(_))
        ));

        let permission = PermissionValidator::watch_only(
            PermissionContracts::default(),
            Address::from_low_u64_be(2),
            policies(),
        );
        assert!(matches!(
            permission.sign_user_operation_hash(&hash).await,
            Err(AccountError::MissingSigner(_))
        ));
    }

    #[test]
    fn ecdsa_validator_ids() {
        let signer = session_signer();
        let validator = EcdsaValidator::new(Address::from_low_u64_be(0xec), signer.clone());

        let id = validator.validation_id();
        assert_eq!(id[0], VALIDATION_TYPE_VALIDATOR);
        assert_eq!(&id[1..], Address::from_low_u64_be(0xec).as_bytes());
        assert_eq!(validator.validator_data().as_ref(), signer.signer_address().as_bytes());
    }

    #[test]
    fn enable_struct_hash() {
        let payload = EnablePayload {
            validation_id: [2u8; 21],
            nonce: 1,
            hook: Address::from_low_u64_be(1),
            validator_data: Bytes::from(vec![1, 2, 3]),
            hook_data: Bytes::default(),
            selector_data: Bytes::default(),
        };

        let next = EnablePayload { nonce: 2, ..payload.clone() };
        assert_ne!(payload.struct_hash(), next.struct_hash());
        assert_ne!(
            EnablePayload::domain_separator(1, Address::from_low_u64_be(1)),
            EnablePayload::domain_separator(11_155_111, Address::from_low_u64_be(1))
        );
    }

    #[test]
    fn approval_blob() {
        let approval = PermissionApproval {
            account_address: Address::from_low_u64_be(10),
            owner: Address::from_low_u64_be(11),
            session_key_address: Address::from_low_u64_be(12),
            contracts: PermissionContracts::default(),
            policies: policies(),
            enable_nonce: 1,
            enable_signature: Bytes::from(vec![0xaa; 65]),
        };

        let blob = approval.serialize().unwrap();
        assert_eq!(PermissionApproval::deserialize(&blob).unwrap(), approval);
        assert!(matches!(
            PermissionApproval::deserialize("not hex"),
            Err(AccountError::InvalidApproval { .. })
        ));
        assert!(matches!(
            PermissionApproval::deserialize("7b7d"),
            Err(AccountError::InvalidApproval { .. })
        ));
    }

    #[test]
    fn approval_rejects_other_session_key() {
        let approval = PermissionApproval {
            account_address: Address::from_low_u64_be(10),
            owner: Address::from_low_u64_be(11),
            session_key_address: Address::from_low_u64_be(12),
            contracts: PermissionContracts::default(),
            policies: policies(),
            enable_nonce: 1,
            enable_signature: Bytes::default(),
        };

        assert!(matches!(
            approval.permission_validator(session_signer()),
            Err(AccountError::InvalidApproval { .. })
        ));
        assert_eq!(approval.watch_only_validator().session_key(), Address::from_low_u64_be(12));
    }
}
