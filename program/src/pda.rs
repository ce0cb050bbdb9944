//! Deterministic addresses used by the escrow program.
//!
//! Every booking lives at the address derived from
//! `[b"escrow", guest, booking_id.to_le_bytes()]`. Its custody is the associated
//! token account of that address for the payment mint. The guest side and the
//! release side both go through these functions, so both land on the same bytes.

use crate::error::EscrowError;
use solana_program::bpf_loader_upgradeable;
use solana_program::pubkey::Pubkey;

/// Domain tag of escrow record addresses.
pub const ESCROW_SEED: &[u8] = b"escrow";

/// Domain tag of the program configuration address.
pub const CONFIG_SEED: &[u8] = b"config";

/// Find the escrow record address and its bump for `(guest, booking_id)`.
pub fn find_escrow_address(
    program_id: &Pubkey,
    guest: &Pubkey,
    booking_id: u64,
) -> Result<(Pubkey, u8), EscrowError> {
    Pubkey::try_find_program_address(
        &[ESCROW_SEED, guest.as_ref(), &booking_id.to_le_bytes()],
        program_id,
    )
    .ok_or(EscrowError::AddressDerivationFailed)
}

/// Escrow record address under the deployed program id.
pub fn escrow_address(guest: &Pubkey, booking_id: u64) -> Result<Pubkey, EscrowError> {
    find_escrow_address(&crate::id(), guest, booking_id).map(|(address, _)| address)
}

/// Custody token account of an escrow record.
pub fn custody_address(escrow: &Pubkey, mint: &Pubkey, token_program_id: &Pubkey) -> Pubkey {
    spl_associated_token_account::get_associated_token_address_with_program_id(
        escrow,
        mint,
        token_program_id,
    )
}

/// Find the configuration account address and its bump.
pub fn find_config_address(program_id: &Pubkey) -> Result<(Pubkey, u8), EscrowError> {
    Pubkey::try_find_program_address(&[CONFIG_SEED], program_id)
        .ok_or(EscrowError::AddressDerivationFailed)
}

/// ProgramData account of an upgradeable program, holding its upgrade authority.
pub fn program_data_address(program_id: &Pubkey) -> Result<Pubkey, EscrowError> {
    Pubkey::try_find_program_address(&[program_id.as_ref()], &bpf_loader_upgradeable::id())
        .map(|(address, _)| address)
        .ok_or(EscrowError::AddressDerivationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escrow_address_is_deterministic() {
        let guest = Pubkey::new_unique();
        let a = escrow_address(&guest, 42).unwrap();
        let b = escrow_address(&guest, 42).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn escrow_address_depends_on_guest_and_booking() {
        let guest = Pubkey::new_unique();
        let other = Pubkey::new_unique();
        let base = escrow_address(&guest, 1).unwrap();

        assert_ne!(base, escrow_address(&guest, 2).unwrap());
        assert_ne!(base, escrow_address(&other, 1).unwrap());
        // little-endian: 1 and 1 << 56 must not collide
        assert_ne!(base, escrow_address(&guest, 1 << 56).unwrap());
    }

    #[test]
    fn escrow_address_uses_little_endian_booking_id() {
        let guest = Pubkey::new_unique();
        let booking_id = 0x0102_0304_0506_0708u64;
        let (expected, expected_bump) = Pubkey::find_program_address(
            &[
                b"escrow",
                guest.as_ref(),
                &[0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01],
            ],
            &crate::id(),
        );

        let (address, bump) = find_escrow_address(&crate::id(), &guest, booking_id).unwrap();
        assert_eq!(address, expected);
        assert_eq!(bump, expected_bump);
    }

    #[test]
    fn config_and_escrow_addresses_do_not_overlap() {
        let guest = Pubkey::new_unique();
        let (config, _) = find_config_address(&crate::id()).unwrap();

        assert_ne!(config, escrow_address(&guest, 0).unwrap());
    }

    #[test]
    fn custody_is_distinct_per_escrow_and_mint() {
        let guest = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let escrow = escrow_address(&guest, 7).unwrap();
        let custody = custody_address(&escrow, &mint, &spl_token::id());

        assert_ne!(custody, escrow);
        assert_eq!(custody, custody_address(&escrow, &mint, &spl_token::id()));
        assert_ne!(
            custody,
            custody_address(&escrow, &Pubkey::new_unique(), &spl_token::id())
        );
        let other_escrow = escrow_address(&guest, 8).unwrap();
        assert_ne!(custody, custody_address(&other_escrow, &mint, &spl_token::id()));
    }

    #[test]
    fn program_data_is_derived_by_the_upgradeable_loader() {
        let (expected, _) = Pubkey::find_program_address(
            &[crate::id().as_ref()],
            &bpf_loader_upgradeable::id(),
        );

        assert_eq!(program_data_address(&crate::id()).unwrap(), expected);
        assert_ne!(
            program_data_address(&crate::id()).unwrap(),
            find_config_address(&crate::id()).unwrap().0
        );
    }
}
