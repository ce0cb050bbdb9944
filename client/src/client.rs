use crate::booking::{latest_first, unix_now, Booking};
use rental_escrow_program::state::{Config, EscrowRecord, ReleasePolicy};
use rental_escrow_program::{instruction, pda, ErrorKind, EscrowError};
use solana_account_decoder_client_types::UiAccountEncoding;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_rpc_client_api::client_error::Error as RpcError;
use solana_rpc_client_api::config::{
    RpcAccountInfoConfig, RpcProgramAccountsConfig, RpcSendTransactionConfig,
};
use solana_rpc_client_api::filter::{Memcmp, RpcFilterType};
use solana_sdk::account::Account;
use solana_sdk::instruction::{Instruction, InstructionError};
use solana_sdk::program_error::ProgramError;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::transaction::{Transaction, TransactionError};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("{0}")]
    RpcError(#[from] RpcError),
    #[error("{0}")]
    ProgramError(#[from] ProgramError),
    #[error("{0}")]
    EscrowError(#[from] EscrowError),
    #[error("{0}")]
    IoError(#[from] std::io::Error),
    #[error("program configuration not found at {0}")]
    ConfigNotFound(Pubkey),
}

impl ClientError {
    /// Turn an RPC failure caused by an escrow instruction into the escrow error.
    fn from_rpc(err: RpcError) -> Self {
        if let Some(TransactionError::InstructionError(_, InstructionError::Custom(code))) =
            err.get_transaction_error()
        {
            if let Some(escrow_error) = EscrowError::from_code(code) {
                return ClientError::EscrowError(escrow_error);
            }
        }
        ClientError::RpcError(err)
    }

    /// Classification of an escrow failure, if this is one.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            ClientError::EscrowError(err) => Some(err.kind()),
            _ => None,
        }
    }

    /// Whether the failure should be resolved by re-reading escrow state.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ClientError::EscrowError(err) if err.is_recoverable())
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// Outcome of a terminal transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// This call closed the escrow.
    Submitted(Signature),
    /// The escrow was already closed by an earlier release or cancellation.
    AlreadyClosed,
}

/// Client for interacting with the rental escrow program.
pub struct Client {
    /// RPC client.
    client: Arc<RpcClient>,

    /// Keypair of the payer, acting as guest or release authority.
    payer: Keypair,

    /// Escrow program ID.
    escrow_program_id: Pubkey,

    /// Token program ID, always SPL Token: the escrow program rejects any other.
    token_program_id: Pubkey,

    /// Options for sending transactions.
    send_config: RpcSendTransactionConfig,
}

impl Client {
    pub fn builder(client: Arc<RpcClient>, payer: Keypair) -> ClientBuilder {
        ClientBuilder::new(client, payer)
    }

    pub fn payer(&self) -> Pubkey {
        self.payer.pubkey()
    }

    /// Escrow record address of a guest's booking.
    pub fn escrow_address(&self, guest: &Pubkey, booking_id: u64) -> Result<Pubkey> {
        let (address, _) = pda::find_escrow_address(&self.escrow_program_id, guest, booking_id)?;
        Ok(address)
    }

    /// Custody token account of an escrow record.
    pub fn custody_address(&self, escrow: &Pubkey, mint: &Pubkey) -> Pubkey {
        pda::custody_address(escrow, mint, &self.token_program_id)
    }

    /// Token account that receives released payments.
    pub fn owner_destination(&self, config: &Config) -> Pubkey {
        pda::custody_address(&config.owner, &config.mint, &self.token_program_id)
    }

    pub fn config_address(&self) -> Result<Pubkey> {
        let (address, _) = pda::find_config_address(&self.escrow_program_id)?;
        Ok(address)
    }

    /// Create the program configuration.
    ///
    /// The payer must be the escrow program's upgrade authority.
    pub async fn initialize_config(
        &self,
        owner: Pubkey,
        mint: Pubkey,
        release_policy: ReleasePolicy,
    ) -> Result<Signature> {
        let ix = instruction::initialize_config(
            self.escrow_program_id,
            self.payer.pubkey(),
            owner,
            mint,
            release_policy,
        )?;
        let signature = self.send(&[ix]).await?;

        log::info!("Config initialized: owner {owner} mint {mint} policy {release_policy:?}");
        Ok(signature)
    }

    /// Get the program configuration.
    pub async fn config(&self) -> Result<Config> {
        let address = self.config_address()?;
        let account = self
            .fetch(&address)
            .await?
            .ok_or(ClientError::ConfigNotFound(address))?;

        Config::unpack(&account.data).map_err(|_| ClientError::ConfigNotFound(address))
    }

    /// Create the custody account of the payer's booking if it does not exist yet.
    pub async fn create_custody_account(&self, booking_id: u64) -> Result<Signature> {
        let config = self.config().await?;
        let ix = self.create_custody_ix(booking_id, &config.mint)?;
        let signature = self.send(&[ix]).await?;

        log::debug!("Custody ensured for booking {booking_id}: {signature}");
        Ok(signature)
    }

    /// Lock `amount` for a booking of the payer.
    ///
    /// The custody account is created in the same transaction, so either the
    /// booking is fully set up or nothing happened.
    pub async fn initialize(
        &self,
        booking_id: u64,
        owner: Pubkey,
        amount: u64,
        check_in_timestamp: u64,
    ) -> Result<(Signature, Pubkey)> {
        let config = self.config().await?;
        let escrow = self.escrow_address(&self.payer.pubkey(), booking_id)?;
        let ixs = [
            self.create_custody_ix(booking_id, &config.mint)?,
            instruction::initialize(
                self.escrow_program_id,
                self.token_program_id,
                self.payer.pubkey(),
                owner,
                config.mint,
                booking_id,
                amount,
                check_in_timestamp,
            )?,
        ];
        let signature = self.send(&ixs).await?;

        log::info!("Booking {booking_id} locked {amount} in escrow {escrow}");
        Ok((signature, escrow))
    }

    /// Release a guest's payment to the configured owner.
    pub async fn release_payment(&self, guest: Pubkey, booking_id: u64) -> Result<Settlement> {
        let config = self.config().await?;
        let owner_signs = config.release_policy == ReleasePolicy::OwnerSigned;
        let ix = instruction::release_payment(
            self.escrow_program_id,
            self.token_program_id,
            guest,
            booking_id,
            config.owner,
            config.mint,
            self.payer.pubkey(),
            owner_signs,
        )?;

        self.settle(guest, booking_id, ix).await
    }

    /// Cancel a booking of the payer and refund the locked amount.
    pub async fn cancel_booking(&self, booking_id: u64) -> Result<Settlement> {
        let config = self.config().await?;
        let ix = instruction::cancel_booking(
            self.escrow_program_id,
            self.token_program_id,
            self.payer.pubkey(),
            booking_id,
            config.mint,
        )?;

        self.settle(self.payer.pubkey(), booking_id, ix).await
    }

    /// Get the escrow record of a guest's booking, if it is open.
    pub async fn escrow(&self, guest: &Pubkey, booking_id: u64) -> Result<Option<EscrowRecord>> {
        let address = self.escrow_address(guest, booking_id)?;
        self.record(&address).await
    }

    /// Get the escrow record at an address.
    pub async fn account(&self, escrow: Pubkey) -> Result<EscrowRecord> {
        self.record(&escrow)
            .await?
            .ok_or(ClientError::EscrowError(EscrowError::AccountNotFound))
    }

    /// All open escrows of the program, latest check-in first.
    pub async fn escrows(&self) -> Result<Vec<Booking>> {
        self.scan(vec![]).await
    }

    /// Open escrows paid by `guest`, latest check-in first.
    pub async fn guest_bookings(&self, guest: &Pubkey) -> Result<Vec<Booking>> {
        self.scan(vec![RpcFilterType::Memcmp(Memcmp::new_base58_encoded(
            EscrowRecord::GUEST_OFFSET,
            guest.as_ref(),
        ))])
        .await
    }

    fn create_custody_ix(&self, booking_id: u64, mint: &Pubkey) -> Result<Instruction> {
        let escrow = self.escrow_address(&self.payer.pubkey(), booking_id)?;
        Ok(
            spl_associated_token_account::instruction::create_associated_token_account_idempotent(
                &self.payer.pubkey(),
                &escrow,
                mint,
                &self.token_program_id,
            ),
        )
    }

    /// Submit a release or cancellation.
    ///
    /// A closed escrow is reported as already settled instead of an error:
    /// whoever closed it first won, and retrying cannot change that.
    async fn settle(&self, guest: Pubkey, booking_id: u64, ix: Instruction) -> Result<Settlement> {
        if self.escrow(&guest, booking_id).await?.is_none() {
            log::info!("Booking {booking_id} of {guest} is already closed");
            return Ok(Settlement::AlreadyClosed);
        }

        match self.send(&[ix]).await {
            Ok(signature) => Ok(Settlement::Submitted(signature)),
            Err(err) if err.kind() == Some(ErrorKind::ResourceConflict) => {
                if self.escrow(&guest, booking_id).await?.is_none() {
                    log::info!("Booking {booking_id} of {guest} was closed concurrently");
                    Ok(Settlement::AlreadyClosed)
                } else {
                    Err(err)
                }
            }
            Err(err) => Err(err),
        }
    }

    async fn scan(&self, mut filters: Vec<RpcFilterType>) -> Result<Vec<Booking>> {
        filters.push(RpcFilterType::DataSize(EscrowRecord::LEN as u64));
        filters.push(RpcFilterType::Memcmp(Memcmp::new_base58_encoded(
            0,
            &EscrowRecord::DISCRIMINATOR,
        )));
        let config = RpcProgramAccountsConfig {
            filters: Some(filters),
            account_config: RpcAccountInfoConfig {
                encoding: Some(UiAccountEncoding::Base64),
                ..RpcAccountInfoConfig::default()
            },
            ..RpcProgramAccountsConfig::default()
        };
        let accounts = self
            .client
            .get_program_accounts_with_config(&self.escrow_program_id, config)
            .await?;

        let now = unix_now();
        let mut bookings = accounts
            .into_iter()
            .filter_map(|(address, account)| {
                EscrowRecord::unpack(&account.data)
                    .ok()
                    .map(|record| Booking::new(address, record, now))
            })
            .collect::<Vec<_>>();
        latest_first(&mut bookings);

        Ok(bookings)
    }

    async fn record(&self, address: &Pubkey) -> Result<Option<EscrowRecord>> {
        Ok(self
            .fetch(address)
            .await?
            .filter(|account| account.owner == self.escrow_program_id)
            .and_then(|account| EscrowRecord::unpack(&account.data).ok()))
    }

    async fn fetch(&self, address: &Pubkey) -> Result<Option<Account>> {
        let response = self
            .client
            .get_account_with_commitment(address, self.client.commitment())
            .await?;
        Ok(response.value)
    }

    async fn send(&self, instructions: &[Instruction]) -> Result<Signature> {
        let blockhash = self.client.get_latest_blockhash().await?;
        let tx = Transaction::new_signed_with_payer(
            instructions,
            Some(&self.payer.pubkey()),
            &[&self.payer],
            blockhash,
        );

        let signature = self
            .client
            .send_and_confirm_transaction_with_spinner_and_config(
                &tx,
                self.client.commitment(),
                self.send_config,
            )
            .await
            .map_err(ClientError::from_rpc)?;
        log::debug!("Transaction confirmed: {signature}");

        Ok(signature)
    }
}

/// Builder for the client for interacting with the rental escrow program.
pub struct ClientBuilder {
    /// RPC client.
    client: Arc<RpcClient>,

    /// Keypair of the payer.
    payer: Keypair,

    /// Escrow program ID.
    /// Default is the escrow program ID.
    escrow_program_id: Option<Pubkey>,

    /// Options for sending transactions.
    /// Default is the RPC default.
    send_config: Option<RpcSendTransactionConfig>,
}

impl ClientBuilder {
    fn new(client: Arc<RpcClient>, payer: Keypair) -> Self {
        Self {
            client,
            payer,
            escrow_program_id: None,
            send_config: None,
        }
    }

    pub fn with_escrow_program_id(mut self, escrow_program_id: Pubkey) -> Self {
        self.escrow_program_id = Some(escrow_program_id);
        self
    }

    pub fn with_rpc_send_transaction_config(mut self, config: RpcSendTransactionConfig) -> Self {
        self.send_config = Some(config);
        self
    }

    /// Build the client for interacting with the rental escrow program.
    pub fn build(self) -> Client {
        Client {
            client: self.client,
            payer: self.payer,
            escrow_program_id: self
                .escrow_program_id
                .unwrap_or_else(rental_escrow_program::id),
            token_program_id: spl_token::id(),
            send_config: self.send_config.unwrap_or_default(),
        }
    }
}
