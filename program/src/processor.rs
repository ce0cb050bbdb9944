#![allow(deprecated)]

use crate::error::EscrowError;
use crate::instruction::EscrowInstruction;
use crate::pda;
use crate::state::{Config, EscrowRecord, ProgramDataHeader, ReleasePolicy};
use solana_program::account_info::{next_account_info, AccountInfo};
use solana_program::bpf_loader_upgradeable;
use solana_program::clock::Clock;
use solana_program::entrypoint::ProgramResult;
use solana_program::msg;
use solana_program::program::{invoke, invoke_signed};
use solana_program::program_error::ProgramError;
use solana_program::program_pack::Pack;
use solana_program::pubkey::Pubkey;
use solana_program::rent::Rent;
use solana_program::system_instruction;
use solana_program::system_program;
use solana_program::sysvar::Sysvar;
use spl_token::state::Account as TokenAccount;

/// Processor is processing the instructions.
pub struct Processor;

impl Processor {
    fn process_initialize_config(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        owner: Pubkey,
        mint: Pubkey,
        release_policy: ReleasePolicy,
    ) -> ProgramResult {
        // Retrieving an accounts
        let account_iter = &mut accounts.iter();
        let admin_account = next_account_info(account_iter)?;
        let config_account = next_account_info(account_iter)?;
        let program_data_account = next_account_info(account_iter)?;
        let system_program_account = next_account_info(account_iter)?;

        // Validating the accounts
        if !admin_account.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }
        check_upgrade_authority(program_id, program_data_account, admin_account.key)?;
        let (config_pubkey, bump) = pda::find_config_address(program_id)?;
        if config_pubkey != *config_account.key {
            return Err(EscrowError::InvalidPda.into());
        }
        if !is_vacant(config_account) {
            return Err(EscrowError::ConfigAlreadyInitialized.into());
        }

        // Creating the configuration account
        create_pda_account(
            admin_account,
            config_account,
            system_program_account,
            program_id,
            Config::LEN,
            &[pda::CONFIG_SEED, &[bump]],
        )?;
        let config = Config::new(*admin_account.key, owner, mint, release_policy, bump);
        config.pack_into(&mut config_account.try_borrow_mut_data()?)?;

        msg!(
            "Config: owner {} mint {} policy {:?}",
            owner,
            mint,
            release_policy
        );
        Ok(())
    }

    fn process_initialize(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        booking_id: u64,
        amount: u64,
        check_in_timestamp: u64,
    ) -> ProgramResult {
        // Retrieving an accounts
        let account_iter = &mut accounts.iter();
        let escrow_account = next_account_info(account_iter)?;
        let custody_account = next_account_info(account_iter)?;
        let guest_funding_account = next_account_info(account_iter)?;
        let guest_account = next_account_info(account_iter)?;
        let mint_account = next_account_info(account_iter)?;
        let owner_account = next_account_info(account_iter)?;
        let config_account = next_account_info(account_iter)?;
        let token_program = next_account_info(account_iter)?;
        let system_program_account = next_account_info(account_iter)?;

        // Validating the terms
        if !guest_account.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }
        check_token_program(token_program)?;
        if amount == 0 {
            return Err(EscrowError::InvalidAmount.into());
        }
        let now = Clock::get()?.unix_timestamp;
        if i64::try_from(check_in_timestamp).map_or(false, |check_in| check_in <= now) {
            return Err(EscrowError::InvalidCheckInTimestamp.into());
        }

        // Validating the accounts
        let config = load_config(program_id, config_account)?;
        if *mint_account.key != config.mint {
            return Err(EscrowError::InvalidMint.into());
        }
        let (escrow_pubkey, bump) =
            pda::find_escrow_address(program_id, guest_account.key, booking_id)?;
        if escrow_pubkey != *escrow_account.key {
            return Err(EscrowError::InvalidPda.into());
        }
        if !is_vacant(escrow_account) {
            return Err(EscrowError::DuplicateBooking.into());
        }
        load_custody(custody_account, escrow_account.key, &config.mint, token_program.key)?;
        let funding = unpack_token_account(
            guest_funding_account,
            token_program.key,
            EscrowError::InvalidFundingAccount,
        )?;
        if funding.mint != config.mint || funding.owner != *guest_account.key {
            return Err(EscrowError::InvalidFundingAccount.into());
        }
        if funding.amount < amount {
            return Err(EscrowError::InsufficientFunds.into());
        }

        // Creating the escrow record
        let booking_id_bytes = booking_id.to_le_bytes();
        create_pda_account(
            guest_account,
            escrow_account,
            system_program_account,
            program_id,
            EscrowRecord::LEN,
            &[
                pda::ESCROW_SEED,
                guest_account.key.as_ref(),
                &booking_id_bytes,
                &[bump],
            ],
        )?;
        let record = EscrowRecord::new(
            booking_id,
            amount,
            *owner_account.key,
            *guest_account.key,
            check_in_timestamp,
        );
        record.pack_into(&mut escrow_account.try_borrow_mut_data()?)?;

        // Locking the payment in custody
        let ix = spl_token::instruction::transfer(
            token_program.key,
            guest_funding_account.key,
            custody_account.key,
            guest_account.key,
            &[],
            amount,
        )?;
        invoke(
            &ix,
            &[
                guest_funding_account.clone(),
                custody_account.clone(),
                guest_account.clone(),
                token_program.clone(),
            ],
        )?;

        msg!(
            "Escrow account for booking {}: locked {} until {}",
            booking_id,
            amount,
            check_in_timestamp
        );
        Ok(())
    }

    fn process_release_payment(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
        // Retrieving an accounts
        let account_iter = &mut accounts.iter();
        let escrow_account = next_account_info(account_iter)?;
        let custody_account = next_account_info(account_iter)?;
        let owner_destination_account = next_account_info(account_iter)?;
        let guest_account = next_account_info(account_iter)?;
        let mint_account = next_account_info(account_iter)?;
        let config_account = next_account_info(account_iter)?;
        let token_program = next_account_info(account_iter)?;
        let release_authority = next_account_info(account_iter)?;

        // Validating the accounts
        check_token_program(token_program)?;
        let config = load_config(program_id, config_account)?;
        let mut record = load_record(program_id, escrow_account)?;
        let bump = verify_escrow_address(program_id, escrow_account, &record)?;
        if record.rent_ended {
            return Err(EscrowError::PaymentAlreadyReleased.into());
        }
        if *guest_account.key != record.guest_address {
            return Err(EscrowError::InvalidGuest.into());
        }
        if *mint_account.key != config.mint {
            return Err(EscrowError::InvalidMint.into());
        }
        if config.release_policy == ReleasePolicy::OwnerSigned
            && (!release_authority.is_signer || *release_authority.key != config.owner)
        {
            return Err(EscrowError::UnauthorizedRelease.into());
        }
        let destination = pda::custody_address(&config.owner, &config.mint, token_program.key);
        if destination != *owner_destination_account.key {
            return Err(EscrowError::InvalidDestination.into());
        }

        // Validating the schedule
        let now = Clock::get()?.unix_timestamp;
        if !record.is_releasable(now) {
            return Err(EscrowError::CheckInDateNotReached.into());
        }

        let custody =
            load_custody(custody_account, escrow_account.key, &config.mint, token_program.key)?;
        if custody.amount < record.amount {
            return Err(EscrowError::InvalidCustody.into());
        }
        if record.owner_address != config.owner {
            msg!(
                "Recorded owner {} differs from configured payee {}",
                record.owner_address,
                config.owner
            );
        }

        record.complete();
        record.pack_into(&mut escrow_account.try_borrow_mut_data()?)?;

        // Paying the owner and closing the escrow
        let booking_id_bytes = record.booking_id.to_le_bytes();
        let bump_seed = [bump];
        let signer_seeds: &[&[u8]] = &[
            pda::ESCROW_SEED,
            record.guest_address.as_ref(),
            &booking_id_bytes,
            &bump_seed,
        ];
        drain_custody(
            token_program,
            custody_account,
            owner_destination_account,
            guest_account,
            escrow_account,
            signer_seeds,
            custody.amount,
        )?;
        close_account(escrow_account, guest_account)?;

        msg!(
            "Released {} for booking {} to {}",
            custody.amount,
            record.booking_id,
            config.owner
        );
        Ok(())
    }

    fn process_cancel_booking(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
        // Retrieving an accounts
        let account_iter = &mut accounts.iter();
        let escrow_account = next_account_info(account_iter)?;
        let custody_account = next_account_info(account_iter)?;
        let guest_funding_account = next_account_info(account_iter)?;
        let guest_account = next_account_info(account_iter)?;
        let mint_account = next_account_info(account_iter)?;
        let config_account = next_account_info(account_iter)?;
        let token_program = next_account_info(account_iter)?;

        // Validating the accounts
        check_token_program(token_program)?;
        let config = load_config(program_id, config_account)?;
        let record = load_record(program_id, escrow_account)?;
        let bump = verify_escrow_address(program_id, escrow_account, &record)?;
        if record.rent_ended {
            return Err(EscrowError::PaymentAlreadyReleased.into());
        }
        if *guest_account.key != record.guest_address {
            return Err(EscrowError::InvalidGuest.into());
        }
        if !guest_account.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }
        if *mint_account.key != config.mint {
            return Err(EscrowError::InvalidMint.into());
        }

        // Validating the schedule
        let now = Clock::get()?.unix_timestamp;
        if !record.is_cancellable(now) {
            return Err(EscrowError::CannotCancelAfterCheckIn.into());
        }

        let custody =
            load_custody(custody_account, escrow_account.key, &config.mint, token_program.key)?;
        if custody.amount < record.amount {
            return Err(EscrowError::InvalidCustody.into());
        }
        let funding = unpack_token_account(
            guest_funding_account,
            token_program.key,
            EscrowError::InvalidFundingAccount,
        )?;
        if funding.mint != config.mint || funding.owner != record.guest_address {
            return Err(EscrowError::InvalidFundingAccount.into());
        }

        // Refunding the guest and closing the escrow
        let booking_id_bytes = record.booking_id.to_le_bytes();
        let bump_seed = [bump];
        let signer_seeds: &[&[u8]] = &[
            pda::ESCROW_SEED,
            record.guest_address.as_ref(),
            &booking_id_bytes,
            &bump_seed,
        ];
        drain_custody(
            token_program,
            custody_account,
            guest_funding_account,
            guest_account,
            escrow_account,
            signer_seeds,
            custody.amount,
        )?;
        close_account(escrow_account, guest_account)?;

        msg!(
            "Cancelled booking {}: refunded {} to {}",
            record.booking_id,
            custody.amount,
            record.guest_address
        );
        Ok(())
    }

    /// Handle the instruction.
    pub fn process(program_id: &Pubkey, accounts: &[AccountInfo], input: &[u8]) -> ProgramResult {
        let instruction = EscrowInstruction::unpack(input)?;
        let result = match instruction {
            EscrowInstruction::InitializeConfig {
                owner,
                mint,
                release_policy,
            } => {
                msg!("Instruction: InitializeConfig");
                Self::process_initialize_config(program_id, accounts, owner, mint, release_policy)
            }
            EscrowInstruction::Initialize {
                booking_id,
                amount,
                check_in_timestamp,
            } => {
                msg!("Instruction: Initialize");
                Self::process_initialize(
                    program_id,
                    accounts,
                    booking_id,
                    amount,
                    check_in_timestamp,
                )
            }
            EscrowInstruction::ReleasePayment => {
                msg!("Instruction: ReleasePayment");
                Self::process_release_payment(program_id, accounts)
            }
            EscrowInstruction::CancelBooking => {
                msg!("Instruction: CancelBooking");
                Self::process_cancel_booking(program_id, accounts)
            }
        };

        if let Err(ProgramError::Custom(code)) = &result {
            if let Some(err) = EscrowError::from_code(*code) {
                msg!("Error: {}", err);
            }
        }
        result
    }
}

/// A derived address is vacant while nothing but lamports has been put there.
fn is_vacant(account: &AccountInfo) -> bool {
    *account.owner == system_program::id() && account.data_is_empty()
}

/// Only the program's upgrade authority may act as admin.
fn check_upgrade_authority(
    program_id: &Pubkey,
    program_data_account: &AccountInfo,
    admin: &Pubkey,
) -> ProgramResult {
    if *program_data_account.key != pda::program_data_address(program_id)?
        || *program_data_account.owner != bpf_loader_upgradeable::id()
    {
        return Err(EscrowError::UnauthorizedAdmin.into());
    }
    let header = ProgramDataHeader::unpack(&program_data_account.try_borrow_data()?)?;
    if header.upgrade_authority != Some(*admin) {
        return Err(EscrowError::UnauthorizedAdmin.into());
    }
    Ok(())
}

fn check_token_program(token_program: &AccountInfo) -> ProgramResult {
    if *token_program.key != spl_token::id() {
        return Err(ProgramError::IncorrectProgramId);
    }
    Ok(())
}

fn load_config(program_id: &Pubkey, config_account: &AccountInfo) -> Result<Config, ProgramError> {
    let (config_pubkey, _) = pda::find_config_address(program_id)?;
    if config_pubkey != *config_account.key {
        return Err(EscrowError::InvalidPda.into());
    }
    if config_account.owner != program_id {
        return Err(EscrowError::ConfigNotFound.into());
    }
    Ok(Config::unpack(&config_account.try_borrow_data()?)?)
}

fn load_record(
    program_id: &Pubkey,
    escrow_account: &AccountInfo,
) -> Result<EscrowRecord, ProgramError> {
    if escrow_account.owner != program_id {
        return Err(EscrowError::AccountNotFound.into());
    }
    Ok(EscrowRecord::unpack(&escrow_account.try_borrow_data()?)?)
}

/// The record must sit at the address its own guest and booking id derive to.
fn verify_escrow_address(
    program_id: &Pubkey,
    escrow_account: &AccountInfo,
    record: &EscrowRecord,
) -> Result<u8, ProgramError> {
    let (escrow_pubkey, bump) =
        pda::find_escrow_address(program_id, &record.guest_address, record.booking_id)?;
    if escrow_pubkey != *escrow_account.key {
        return Err(EscrowError::InvalidPda.into());
    }
    Ok(bump)
}

fn unpack_token_account(
    account: &AccountInfo,
    token_program_id: &Pubkey,
    err: EscrowError,
) -> Result<TokenAccount, ProgramError> {
    if account.owner != token_program_id {
        return Err(err.into());
    }
    TokenAccount::unpack(&account.try_borrow_data()?).map_err(|_| err.into())
}

fn load_custody(
    custody_account: &AccountInfo,
    escrow_pubkey: &Pubkey,
    mint: &Pubkey,
    token_program_id: &Pubkey,
) -> Result<TokenAccount, ProgramError> {
    if pda::custody_address(escrow_pubkey, mint, token_program_id) != *custody_account.key {
        return Err(EscrowError::InvalidCustody.into());
    }
    let custody =
        unpack_token_account(custody_account, token_program_id, EscrowError::InvalidCustody)?;
    if custody.owner != *escrow_pubkey || custody.mint != *mint {
        return Err(EscrowError::InvalidCustody.into());
    }
    Ok(custody)
}

/// Create an account at a derived address, tolerating lamports sent there in advance.
fn create_pda_account<'a>(
    payer: &AccountInfo<'a>,
    new_account: &AccountInfo<'a>,
    system_program_account: &AccountInfo<'a>,
    owner: &Pubkey,
    space: usize,
    signer_seeds: &[&[u8]],
) -> ProgramResult {
    if *system_program_account.key != system_program::id() {
        return Err(ProgramError::IncorrectProgramId);
    }
    let required_lamports = Rent::get()?.minimum_balance(space).max(1);

    if new_account.lamports() > 0 {
        let top_up = required_lamports.saturating_sub(new_account.lamports());
        if top_up > 0 {
            invoke(
                &system_instruction::transfer(payer.key, new_account.key, top_up),
                &[
                    payer.clone(),
                    new_account.clone(),
                    system_program_account.clone(),
                ],
            )?;
        }
        invoke_signed(
            &system_instruction::allocate(new_account.key, space as u64),
            &[new_account.clone(), system_program_account.clone()],
            &[signer_seeds],
        )?;
        invoke_signed(
            &system_instruction::assign(new_account.key, owner),
            &[new_account.clone(), system_program_account.clone()],
            &[signer_seeds],
        )
    } else {
        invoke_signed(
            &system_instruction::create_account(
                payer.key,
                new_account.key,
                required_lamports,
                space as u64,
                owner,
            ),
            &[
                payer.clone(),
                new_account.clone(),
                system_program_account.clone(),
            ],
            &[signer_seeds],
        )
    }
}

/// Move the whole custody balance to `destination`, then close custody into `rent_destination`.
fn drain_custody<'a>(
    token_program: &AccountInfo<'a>,
    custody_account: &AccountInfo<'a>,
    destination: &AccountInfo<'a>,
    rent_destination: &AccountInfo<'a>,
    escrow_account: &AccountInfo<'a>,
    signer_seeds: &[&[u8]],
    amount: u64,
) -> ProgramResult {
    let ix = spl_token::instruction::transfer(
        token_program.key,
        custody_account.key,
        destination.key,
        escrow_account.key,
        &[],
        amount,
    )?;
    invoke_signed(
        &ix,
        &[
            custody_account.clone(),
            destination.clone(),
            escrow_account.clone(),
            token_program.clone(),
        ],
        &[signer_seeds],
    )?;

    let ix = spl_token::instruction::close_account(
        token_program.key,
        custody_account.key,
        rent_destination.key,
        escrow_account.key,
        &[],
    )?;
    invoke_signed(
        &ix,
        &[
            custody_account.clone(),
            rent_destination.clone(),
            escrow_account.clone(),
            token_program.clone(),
        ],
        &[signer_seeds],
    )
}

/// Close a program-owned account, sending its lamports to `destination`.
fn close_account(account: &AccountInfo, destination: &AccountInfo) -> ProgramResult {
    let refund = account.lamports();
    let balance = destination
        .lamports()
        .checked_add(refund)
        .ok_or(EscrowError::AmountOverflow)?;
    **destination.try_borrow_mut_lamports()? = balance;
    **account.try_borrow_mut_lamports()? = 0;

    account.try_borrow_mut_data()?.fill(0);
    account.assign(&system_program::id());
    account.realloc(0, false)
}
