use crate::error::EscrowError;
use crate::pda;
use crate::state::ReleasePolicy;
use borsh::{BorshDeserialize, BorshSchema, BorshSerialize};
use solana_program::instruction::{AccountMeta, Instruction};
use solana_program::pubkey::Pubkey;
use solana_program::system_program;

/// Instruction definition.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, BorshSchema)]
pub enum EscrowInstruction {
    /// Create the program configuration. Can only succeed once, and only when
    /// signed by the program's upgrade authority.
    ///
    ///
    /// Accounts expected:
    ///
    ///   0. `[writable, signer]` The admin, the program's upgrade authority
    ///   1. `[writable]` The configuration account, derived from `[b"config"]`
    ///   2. `[]` The program's ProgramData account
    ///   3. `[]` The system program
    InitializeConfig {
        owner: Pubkey,
        mint: Pubkey,
        release_policy: ReleasePolicy,
    },
    /// Lock the booking amount and create the escrow record.
    ///
    ///
    /// Accounts expected:
    ///
    ///   0. `[writable]` The escrow record, derived from `[b"escrow", guest, booking_id]`
    ///   1. `[writable]` The custody token account, created idempotently beforehand
    ///   2. `[writable]` The guest's token account funding the booking
    ///   3. `[writable, signer]` The guest
    ///   4. `[]` The payment mint
    ///   5. `[]` The property owner, recorded for reference only
    ///   6. `[]` The configuration account
    ///   7. `[]` The token program
    ///   8. `[]` The system program
    Initialize {
        booking_id: u64,
        amount: u64,
        check_in_timestamp: u64,
    },
    /// Pay the locked amount to the configured owner and close the escrow.
    ///
    ///
    /// Accounts expected:
    ///
    ///   0. `[writable]` The escrow record
    ///   1. `[writable]` The custody token account
    ///   2. `[writable]` The owner's token account receiving the payment
    ///   3. `[writable]` The guest, receiving the reclaimed rent
    ///   4. `[]` The payment mint
    ///   5. `[]` The configuration account
    ///   6. `[]` The token program
    ///   7. `[]` The release authority, must sign under `ReleasePolicy::OwnerSigned`
    ReleasePayment,
    /// Refund the locked amount to the guest and close the escrow.
    ///
    ///
    /// Accounts expected:
    ///
    ///   0. `[writable]` The escrow record
    ///   1. `[writable]` The custody token account
    ///   2. `[writable]` The guest's token account receiving the refund
    ///   3. `[writable, signer]` The guest
    ///   4. `[]` The payment mint
    ///   5. `[]` The configuration account
    ///   6. `[]` The token program
    CancelBooking,
}

impl EscrowInstruction {
    pub fn unpack(input: &[u8]) -> Result<Self, EscrowError> {
        borsh::from_slice(input).map_err(|_| EscrowError::InvalidInstruction)
    }
}

/// Create the configuration instruction.
pub fn initialize_config(
    escrow_program_id: Pubkey,
    admin_pubkey: Pubkey,
    owner_pubkey: Pubkey,
    mint_pubkey: Pubkey,
    release_policy: ReleasePolicy,
) -> Result<Instruction, EscrowError> {
    let (config_pubkey, _) = pda::find_config_address(&escrow_program_id)?;
    let program_data_pubkey = pda::program_data_address(&escrow_program_id)?;

    Ok(Instruction::new_with_borsh(
        escrow_program_id,
        &EscrowInstruction::InitializeConfig {
            owner: owner_pubkey,
            mint: mint_pubkey,
            release_policy,
        },
        vec![
            AccountMeta::new(admin_pubkey, true),
            AccountMeta::new(config_pubkey, false),
            AccountMeta::new_readonly(program_data_pubkey, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
    ))
}

/// Create the booking instruction.
///
/// Escrow, custody and funding addresses are derived from the guest, the
/// booking id and the mint.
#[allow(clippy::too_many_arguments)]
pub fn initialize(
    escrow_program_id: Pubkey,
    token_program_id: Pubkey,
    guest_pubkey: Pubkey,
    owner_pubkey: Pubkey,
    mint_pubkey: Pubkey,
    booking_id: u64,
    amount: u64,
    check_in_timestamp: u64,
) -> Result<Instruction, EscrowError> {
    let (escrow_pubkey, _) = pda::find_escrow_address(&escrow_program_id, &guest_pubkey, booking_id)?;
    let (config_pubkey, _) = pda::find_config_address(&escrow_program_id)?;
    let custody_pubkey = pda::custody_address(&escrow_pubkey, &mint_pubkey, &token_program_id);
    let guest_funding_pubkey = pda::custody_address(&guest_pubkey, &mint_pubkey, &token_program_id);

    Ok(Instruction::new_with_borsh(
        escrow_program_id,
        &EscrowInstruction::Initialize {
            booking_id,
            amount,
            check_in_timestamp,
        },
        vec![
            AccountMeta::new(escrow_pubkey, false),
            AccountMeta::new(custody_pubkey, false),
            AccountMeta::new(guest_funding_pubkey, false),
            AccountMeta::new(guest_pubkey, true),
            AccountMeta::new_readonly(mint_pubkey, false),
            AccountMeta::new_readonly(owner_pubkey, false),
            AccountMeta::new_readonly(config_pubkey, false),
            AccountMeta::new_readonly(token_program_id, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
    ))
}

/// Create the release instruction.
///
/// `release_authority` only has to sign when the configuration requires an
/// owner signature.
#[allow(clippy::too_many_arguments)]
pub fn release_payment(
    escrow_program_id: Pubkey,
    token_program_id: Pubkey,
    guest_pubkey: Pubkey,
    booking_id: u64,
    owner_pubkey: Pubkey,
    mint_pubkey: Pubkey,
    release_authority_pubkey: Pubkey,
    release_authority_signs: bool,
) -> Result<Instruction, EscrowError> {
    let (escrow_pubkey, _) = pda::find_escrow_address(&escrow_program_id, &guest_pubkey, booking_id)?;
    let (config_pubkey, _) = pda::find_config_address(&escrow_program_id)?;
    let custody_pubkey = pda::custody_address(&escrow_pubkey, &mint_pubkey, &token_program_id);
    let owner_destination_pubkey = pda::custody_address(&owner_pubkey, &mint_pubkey, &token_program_id);

    Ok(Instruction::new_with_borsh(
        escrow_program_id,
        &EscrowInstruction::ReleasePayment,
        vec![
            AccountMeta::new(escrow_pubkey, false),
            AccountMeta::new(custody_pubkey, false),
            AccountMeta::new(owner_destination_pubkey, false),
            AccountMeta::new(guest_pubkey, false),
            AccountMeta::new_readonly(mint_pubkey, false),
            AccountMeta::new_readonly(config_pubkey, false),
            AccountMeta::new_readonly(token_program_id, false),
            AccountMeta::new_readonly(release_authority_pubkey, release_authority_signs),
        ],
    ))
}

/// Create the cancellation instruction.
pub fn cancel_booking(
    escrow_program_id: Pubkey,
    token_program_id: Pubkey,
    guest_pubkey: Pubkey,
    booking_id: u64,
    mint_pubkey: Pubkey,
) -> Result<Instruction, EscrowError> {
    let (escrow_pubkey, _) = pda::find_escrow_address(&escrow_program_id, &guest_pubkey, booking_id)?;
    let (config_pubkey, _) = pda::find_config_address(&escrow_program_id)?;
    let custody_pubkey = pda::custody_address(&escrow_pubkey, &mint_pubkey, &token_program_id);
    let guest_funding_pubkey = pda::custody_address(&guest_pubkey, &mint_pubkey, &token_program_id);

    Ok(Instruction::new_with_borsh(
        escrow_program_id,
        &EscrowInstruction::CancelBooking,
        vec![
            AccountMeta::new(escrow_pubkey, false),
            AccountMeta::new(custody_pubkey, false),
            AccountMeta::new(guest_funding_pubkey, false),
            AccountMeta::new(guest_pubkey, true),
            AccountMeta::new_readonly(mint_pubkey, false),
            AccountMeta::new_readonly(config_pubkey, false),
            AccountMeta::new_readonly(token_program_id, false),
        ],
    ))
}
