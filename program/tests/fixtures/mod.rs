use rental_escrow_program::pda;
use rental_escrow_program::state::{Config, EscrowRecord, ProgramDataHeader, ReleasePolicy};
use solana_sdk::account::Account;
use solana_sdk::program_option::COption;
use solana_sdk::program_pack::Pack;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::rent::Rent;
use solana_sdk::{bpf_loader_upgradeable, system_program};
use spl_token::state::AccountState;

pub fn system_account(lamports: u64) -> Account {
    Account::new(lamports, 0, &system_program::id())
}

pub fn mint_account(decimals: u8) -> Account {
    let mut account = Account::new(
        Rent::default().minimum_balance(spl_token::state::Mint::LEN),
        spl_token::state::Mint::LEN,
        &spl_token::id(),
    );
    let mint = spl_token::state::Mint {
        mint_authority: COption::None,
        supply: 1_000_000_000_000000,
        decimals,
        is_initialized: true,
        freeze_authority: COption::None,
    };
    mint.pack_into_slice(&mut account.data);

    account
}

pub fn token_account(mint: Pubkey, owner: Pubkey, amount: u64) -> Account {
    let mut account = Account::new(
        Rent::default().minimum_balance(spl_token::state::Account::LEN),
        spl_token::state::Account::LEN,
        &spl_token::id(),
    );
    let token_account = spl_token::state::Account {
        mint,
        owner,
        amount,
        delegate: COption::None,
        state: AccountState::Initialized,
        is_native: COption::None,
        delegated_amount: 0,
        close_authority: COption::None,
    };
    token_account.pack_into_slice(&mut account.data);

    account
}

pub fn config_account(
    admin: Pubkey,
    owner: Pubkey,
    mint: Pubkey,
    release_policy: ReleasePolicy,
) -> (Pubkey, Account) {
    let (address, bump) = pda::find_config_address(&rental_escrow_program::id())
        .expect("config address");
    let config = Config::new(admin, owner, mint, release_policy, bump);
    let mut account = Account::new(
        Rent::default().minimum_balance(Config::LEN),
        Config::LEN,
        &rental_escrow_program::id(),
    );
    config.pack_into(&mut account.data).expect("pack config");

    (address, account)
}

pub fn escrow_record_account(record: &EscrowRecord) -> Account {
    let mut account = Account::new(
        Rent::default().minimum_balance(EscrowRecord::LEN),
        EscrowRecord::LEN,
        &rental_escrow_program::id(),
    );
    record.pack_into(&mut account.data).expect("pack record");

    account
}

/// ProgramData account of the escrow program with the given upgrade authority.
pub fn program_data_account(upgrade_authority: Option<Pubkey>) -> (Pubkey, Account) {
    let address = pda::program_data_address(&rental_escrow_program::id()).expect("program data address");
    let header = ProgramDataHeader {
        slot: 0,
        upgrade_authority,
    };
    let mut account = Account::new(
        Rent::default().minimum_balance(ProgramDataHeader::LEN),
        ProgramDataHeader::LEN,
        &bpf_loader_upgradeable::id(),
    );
    header.pack_into(&mut account.data).expect("pack program data");

    (address, account)
}
