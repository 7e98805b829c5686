//! Composing contract calls into operations
use crate::error::AccountError;
use ethers::{
    abi::{Abi, Token},
    types::{Address, U256},
};
use smartkey_primitives::{constants::submission::MAX_BATCH_MINT, Call};

/// Abstract description of one contract call
#[derive(Clone, Debug, PartialEq)]
pub struct CallSpec {
    pub function_name: String,
    pub args: Vec<Token>,
    pub description: String,
    pub value: Option<U256>,
}

impl CallSpec {
    pub fn new(function_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            function_name: function_name.into(),
            args: vec![],
            description: description.into(),
            value: None,
        }
    }

    pub fn args(mut self, args: Vec<Token>) -> Self {
        self.args = args;
        self
    }

    pub fn value(mut self, value: U256) -> Self {
        self.value = Some(value);
        self
    }
}

/// Encodes every spec as a call of `target` (value defaults to zero)
pub fn create_batch_operations(
    target: Address,
    abi: &Abi,
    specs: &[CallSpec],
) -> Result<Vec<Call>, AccountError> {
    specs
        .iter()
        .map(|spec| -> Result<Call, AccountError> {
            let data = abi.function(&spec.function_name)?.encode_input(&spec.args)?;
            Ok(Call::new(target, data.into())
                .value(spec.value.unwrap_or_default())
                .description(spec.description.clone()))
        })
        .collect()
}

/// `quantity` argument-less `mint` calls, clamped to `1..=MAX_BATCH_MINT`
pub fn mint_batch_specs(quantity: usize) -> Vec<CallSpec> {
    (1..=quantity.clamp(1, MAX_BATCH_MINT))
        .map(|i| CallSpec::new("mint", format!("Mint NFT #{i}")))
        .collect()
}

/// Human-readable preview: the description of a single call, numbered lines otherwise
pub fn format_operation_preview(calls: &[Call]) -> String {
    match calls {
        [call] => call.description.clone(),
        calls => calls
            .iter()
            .enumerate()
            .map(|(i, call)| format!("{}. {}", i + 1, call.description))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smartkey_contracts::magic_badge_abi;

    fn nft() -> Address {
        Address::from_low_u64_be(0xbeef)
    }

    #[test]
    fn compose_mints() {
        let abi = magic_badge_abi().unwrap();
        for n in 1..=MAX_BATCH_MINT {
            let calls = create_batch_operations(nft(), &abi, &mint_batch_specs(n)).unwrap();
            assert_eq!(calls.len(), n);
            assert!(calls.iter().all(|c| c.target == nft() && !c.data.is_empty()));
            assert!(calls.iter().all(|c| c.value.is_zero()));
            assert_eq!(calls[n - 1].description, format!("Mint NFT #{n}"));
        }
    }

    #[test]
    fn compose_with_args_and_value() {
        let abi = magic_badge_abi().unwrap();
        let owner = Address::from_low_u64_be(0xacc);
        let specs = vec![
            CallSpec::new("safeMint", "Mint to owner").args(vec![Token::Address(owner)]),
            CallSpec::new("batchMint", "Mint 2")
                .args(vec![Token::Address(owner), Token::Uint(2.into())])
                .value(7.into()),
        ];

        let calls = create_batch_operations(nft(), &abi, &specs).unwrap();
        assert_eq!(calls[0].data.len(), 4 + 32);
        assert_eq!(calls[1].data.len(), 4 + 64);
        assert_eq!(calls[1].value, 7.into());
    }

    #[test]
    fn compose_errors() {
        let abi = magic_badge_abi().unwrap();
        assert!(matches!(
            create_batch_operations(nft(), &abi, &[CallSpec::new("burn", "Burn")]),
            Err(AccountError::ABI { .. })
        ));
        assert!(matches!(
            create_batch_operations(
                nft(),
                &abi,
                &[CallSpec::new("safeMint", "Mint").args(vec![Token::Bool(true)])]
            ),
            Err(AccountError::ABI { .. })
        ));
        assert!(create_batch_operations(nft(), &abi, &[]).unwrap().is_empty());
    }

    #[test]
    fn batch_specs_are_clamped() {
        assert_eq!(mint_batch_specs(0).len(), 1);
        assert_eq!(mint_batch_specs(MAX_BATCH_MINT + 5).len(), MAX_BATCH_MINT);
    }

    #[test]
    fn operation_preview() {
        let abi = magic_badge_abi().unwrap();
        let one = create_batch_operations(nft(), &abi, &mint_batch_specs(1)).unwrap();
        assert_eq!(format_operation_preview(&one), "Mint NFT #1");

        let three = create_batch_operations(nft(), &abi, &mint_batch_specs(3)).unwrap();
        assert_eq!(
            format_operation_preview(&three),
            "1. Mint NFT #1\n2. Mint NFT #2\n3. Mint NFT #3"
        );
    }
}
