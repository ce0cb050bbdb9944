use solana_sdk::account::AccountSharedData;
use solana_sdk::program_option::COption;
use solana_sdk::program_pack::Pack;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::rent::Rent;
use solana_sdk::system_program;
use spl_token::state::AccountState;

pub fn system_account(lamports: u64) -> AccountSharedData {
    AccountSharedData::new(lamports, 0, &system_program::id())
}

/// A USDC-like mint nobody can mint more of.
pub fn mint_account(supply: u64, decimals: u8) -> AccountSharedData {
    let mut account = AccountSharedData::new(
        Rent::default().minimum_balance(spl_token::state::Mint::LEN),
        spl_token::state::Mint::LEN,
        &spl_token::id(),
    );
    let mint = spl_token::state::Mint {
        mint_authority: COption::None,
        supply,
        decimals,
        is_initialized: true,
        freeze_authority: COption::None,
    };
    let data = &mut [0; spl_token::state::Mint::LEN];
    mint.pack_into_slice(data);
    account.set_data_from_slice(data);

    account
}

/// The associated token account of `owner` for `mint`, holding `amount`.
pub fn associated_token_account(mint: Pubkey, owner: Pubkey, amount: u64) -> (Pubkey, AccountSharedData) {
    let address = spl_associated_token_account::get_associated_token_address(&owner, &mint);
    let mut account = AccountSharedData::new(
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
    let data = &mut [0; spl_token::state::Account::LEN];
    token_account.pack_into_slice(data);
    account.set_data_from_slice(data);

    (address, account)
}
