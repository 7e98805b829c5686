use super::args::{NetworkArgs, NftArgs, SessionArgs, WalletArgs};
use clap::{value_parser, Parser, Subcommand};
use eyre::eyre;
use smartkey_account::{
    create_batch_operations, execute_batch_operation, format_operation_preview, mint_batch_specs,
    CallSpec, OperationEvent, OperationResult, SmartAccount, SmartAccountProvisioner,
};
use smartkey_contracts::magic_badge_abi;
use smartkey_primitives::{constants::submission::MAX_BATCH_MINT, find_embedded_wallet};
use smartkey_session::{
    format_time_remaining, load_or_ignore, Clock, SessionConfig, SessionManager, SessionState,
    SessionStatus, SessionStore, SystemClock,
};
use std::{sync::Arc, time::Duration};

/// Prints an operation lifecycle event
fn print_event(event: OperationEvent) {
    let status = event.status();
    match event {
        OperationEvent::Submitted => println!("{status}"),
        OperationEvent::Processing { hash } => println!("{status} ({hash})"),
        OperationEvent::Included { transaction_hash: Some(tx), .. } => {
            println!("{status} Transaction: {tx:?}")
        }
        OperationEvent::Included { hash, transaction_hash: None } => {
            println!("{status} User operation: {hash}")
        }
        OperationEvent::Failed { error } => println!("{status}: {error}"),
    }
}

fn print_status(status: Option<SessionStatus>, state: SessionState) {
    match status {
        None => println!("No active session"),
        Some(status) => println!(
            "Session {state}: {} remaining, {}/{} uses left",
            format_time_remaining(status.time_remaining),
            status.usage_remaining,
            status.usage_limit
        ),
    }
}

/// Provisions the smart account of the embedded wallet
async fn provision(network: &NetworkArgs, wallet: &WalletArgs) -> eyre::Result<SmartAccount> {
    let wallets = wallet.connected_wallets()?;
    let embedded = find_embedded_wallet(&wallets)?;
    let provisioner = SmartAccountProvisioner::new(Arc::new(network.clone()));
    Ok(provisioner.provision(embedded).await?)
}

async fn execute_mint(
    account: &SmartAccount,
    specs: &[CallSpec],
    nft: &NftArgs,
) -> eyre::Result<()> {
    let calls = create_batch_operations(nft.address()?, &magic_badge_abi()?, specs)?;
    println!("{}", format_operation_preview(&calls));

    let OperationResult { hash, transaction_hash } =
        execute_batch_operation(&account.client, &calls, print_event).await?;
    tracing::debug!("Operation {hash} included in {transaction_hash:?}");
    Ok(())
}

/// Show the embedded wallet and its smart account
#[derive(Debug, Parser)]
pub struct AccountCommand {
    #[clap(flatten)]
    network: NetworkArgs,

    #[clap(flatten)]
    wallet: WalletArgs,
}

impl AccountCommand {
    /// Execute the command
    pub async fn execute(self) -> eyre::Result<()> {
        let account = provision(&self.network, &self.wallet).await?;
        let deployed = account.client.network().chain.is_deployed(account.account_address).await?;

        println!("Owner: {:?}", account.owner_address);
        println!("Smart account: {:?}", account.account_address);
        println!("Deployed: {deployed}");
        Ok(())
    }
}

/// Mint one NFT with a sponsored operation
#[derive(Debug, Parser)]
pub struct MintCommand {
    #[clap(flatten)]
    network: NetworkArgs,

    #[clap(flatten)]
    wallet: WalletArgs,

    #[clap(flatten)]
    nft: NftArgs,
}

impl MintCommand {
    /// Execute the command
    pub async fn execute(self) -> eyre::Result<()> {
        let account = provision(&self.network, &self.wallet).await?;
        execute_mint(&account, &[CallSpec::new("mint", "Mint NFT")], &self.nft).await
    }
}

/// Mint several NFTs in one batched operation
#[derive(Debug, Parser)]
pub struct BatchCommand {
    #[clap(flatten)]
    network: NetworkArgs,

    #[clap(flatten)]
    wallet: WalletArgs,

    #[clap(flatten)]
    nft: NftArgs,

    /// Number of NFTs to mint.
    #[clap(long, short, default_value_t = 3, value_parser = value_parser!(u8).range(1..=MAX_BATCH_MINT as i64))]
    quantity: u8,
}

impl BatchCommand {
    /// Execute the command
    pub async fn execute(self) -> eyre::Result<()> {
        let account = provision(&self.network, &self.wallet).await?;
        execute_mint(&account, &mint_batch_specs(self.quantity.into()), &self.nft).await
    }
}

/// Show the NFT balance of the smart account
#[derive(Debug, Parser)]
pub struct BalanceCommand {
    #[clap(flatten)]
    network: NetworkArgs,

    #[clap(flatten)]
    wallet: WalletArgs,

    #[clap(flatten)]
    nft: NftArgs,
}

impl BalanceCommand {
    /// Execute the command
    pub async fn execute(self) -> eyre::Result<()> {
        let nft = self.nft.address()?;
        let account = provision(&self.network, &self.wallet).await?;
        let chain = &account.client.network().chain;

        let balance = chain.nft_balance_of(nft, account.account_address).await?;
        let total_supply = chain.nft_total_supply(nft).await?;

        println!("Balance of {:?}: {balance}", account.account_address);
        println!("Total supply: {total_supply}");
        Ok(())
    }
}

/// Session keys
#[derive(Debug, Subcommand)]
pub enum SessionCommand {
    /// Grant a session key allowed to mint
    #[command(name = "grant")]
    Grant(SessionGrantCommand),

    /// Mint with the session key
    #[command(name = "mint")]
    Mint(SessionMintCommand),

    /// Revoke the session key on-chain and forget it
    #[command(name = "revoke")]
    Revoke(SessionRevokeCommand),

    /// Show the session key status
    #[command(name = "status")]
    Status(SessionStatusCommand),

    /// Forget the session key without revoking it
    #[command(name = "clear")]
    Clear(SessionClearCommand),

    /// Show the session key status every second
    #[command(name = "watch")]
    Watch(SessionWatchCommand),
}

impl SessionCommand {
    /// Execute the command
    pub async fn execute(self) -> eyre::Result<()> {
        match self {
            SessionCommand::Grant(command) => command.execute().await,
            SessionCommand::Mint(command) => command.execute().await,
            SessionCommand::Revoke(command) => command.execute().await,
            SessionCommand::Status(command) => command.execute(),
            SessionCommand::Clear(command) => command.execute(),
            SessionCommand::Watch(command) => command.execute().await,
        }
    }
}

fn session_manager(
    network: &NetworkArgs,
    nft: &NftArgs,
    session: &SessionArgs,
) -> eyre::Result<SessionManager<NetworkArgs>> {
    let config = SessionConfig::mint(nft.address()?).settlement(session.settlement());
    Ok(SessionManager::new(Arc::new(network.clone()), Arc::new(session.store()?), config))
}

#[derive(Debug, Parser)]
pub struct SessionGrantCommand {
    #[clap(flatten)]
    network: NetworkArgs,

    #[clap(flatten)]
    wallet: WalletArgs,

    #[clap(flatten)]
    nft: NftArgs,

    #[clap(flatten)]
    session: SessionArgs,

    /// Replace the current session key even if it is still usable.
    #[clap(long)]
    force: bool,
}

impl SessionGrantCommand {
    pub async fn execute(self) -> eyre::Result<()> {
        let manager = session_manager(&self.network, &self.nft, &self.session)?;
        manager.restore().await?;

        let state = manager.state()?;
        if !state.can_grant() && !self.force {
            return Err(eyre!("a session key is still {state}, use --force to replace it"));
        }

        let account = provision(&self.network, &self.wallet).await?;
        let descriptor = manager.grant(&account).await?;

        println!("Session key: {:?}", descriptor.session_key_address);
        print_status(manager.status()?, manager.state()?);
        Ok(())
    }
}

#[derive(Debug, Parser)]
pub struct SessionMintCommand {
    #[clap(flatten)]
    network: NetworkArgs,

    #[clap(flatten)]
    nft: NftArgs,

    #[clap(flatten)]
    session: SessionArgs,
}

impl SessionMintCommand {
    pub async fn execute(self) -> eyre::Result<()> {
        let manager = session_manager(&self.network, &self.nft, &self.session)?;
        manager.restore().await?;

        let state = manager.state()?;
        if !state.can_consume() {
            return Err(eyre!("session key is {state}, grant a new one"));
        }

        manager.consume(print_event).await?;
        print_status(manager.status()?, manager.state()?);
        Ok(())
    }
}

#[derive(Debug, Parser)]
pub struct SessionRevokeCommand {
    #[clap(flatten)]
    network: NetworkArgs,

    #[clap(flatten)]
    wallet: WalletArgs,

    #[clap(flatten)]
    nft: NftArgs,

    #[clap(flatten)]
    session: SessionArgs,
}

impl SessionRevokeCommand {
    pub async fn execute(self) -> eyre::Result<()> {
        let manager = session_manager(&self.network, &self.nft, &self.session)?;
        manager.restore().await?;
        if !manager.state()?.can_revoke() {
            return Err(eyre!("no session key to revoke"));
        }

        let account = provision(&self.network, &self.wallet).await?;
        let tx_hash = manager.revoke(&account).await?;

        println!("Session key revoked. Transaction: {tx_hash:?}");
        Ok(())
    }
}

/// Reads the stored session as of now
fn read_status(session: &SessionArgs) -> eyre::Result<(Option<SessionStatus>, SessionState)> {
    let store = session.store()?;
    let now = SystemClock.now();
    let descriptor = load_or_ignore(&store)?;
    Ok((
        descriptor.as_ref().map(|d| SessionStatus::derive(d, now)),
        SessionState::of(descriptor.as_ref(), now),
    ))
}

#[derive(Debug, Parser)]
pub struct SessionStatusCommand {
    #[clap(flatten)]
    session: SessionArgs,

    /// Print the status as JSON.
    #[clap(long)]
    json: bool,
}

impl SessionStatusCommand {
    pub fn execute(self) -> eyre::Result<()> {
        let (status, state) = read_status(&self.session)?;
        if self.json {
            serde_json::to_writer(std::io::stdout(), &status)?;
            println!();
        } else {
            print_status(status, state);
        }
        Ok(())
    }
}

#[derive(Debug, Parser)]
pub struct SessionClearCommand {
    #[clap(flatten)]
    session: SessionArgs,
}

impl SessionClearCommand {
    pub fn execute(self) -> eyre::Result<()> {
        self.session.store()?.clear()?;
        println!("Session cleared");
        Ok(())
    }
}

#[derive(Debug, Parser)]
pub struct SessionWatchCommand {
    #[clap(flatten)]
    session: SessionArgs,
}

impl SessionWatchCommand {
    /// Runs until interrupted
    pub async fn execute(self) -> eyre::Result<()> {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        loop {
            interval.tick().await;
            let (status, state) = read_status(&self.session)?;
            print_status(status, state);
        }
    }
}
