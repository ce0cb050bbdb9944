use crate::error::EscrowError;
use borsh::{BorshDeserialize, BorshSchema, BorshSerialize};
use solana_program::program_error::ProgramError;
use solana_program::program_pack::IsInitialized;
use solana_program::pubkey::Pubkey;

/// EscrowRecord holds the terms and lifecycle flags of one booking.
///
/// The record lives at the address derived from `(guest_address, booking_id)`,
/// so at most one exists per pair. It is created by `Initialize` and closed by
/// either `ReleasePayment` or `CancelBooking`.
///
/// # Example
///
/// ```rust
/// # use rental_escrow_program::state::EscrowRecord;
/// # use solana_program::pubkey::Pubkey;
/// #
/// let record = EscrowRecord::new(1, 500_000000, Pubkey::new_unique(), Pubkey::new_unique(), 1_700_000_000);
/// let serialized = borsh::to_vec(&record).unwrap();
/// let deserialized = EscrowRecord::unpack(&serialized).unwrap();
///
/// assert_eq!(serialized.len(), EscrowRecord::LEN);
/// assert_eq!(record, deserialized);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, BorshSchema)]
pub struct EscrowRecord {
    /// Account type tag, always [`EscrowRecord::DISCRIMINATOR`]
    pub discriminator: [u8; 8],

    /// External key of the rented unit and period
    pub booking_id: u64,

    /// Locked amount in base units of the payment mint
    pub amount: u64,

    /// Owner wallet recorded at booking time, informational only
    pub owner_address: Pubkey,

    /// Guest wallet that paid and may cancel
    pub guest_address: Pubkey,

    /// Unix seconds from which release is allowed and cancellation is not
    pub check_in_timestamp: u64,

    /// Set once, on release
    pub rent_started: bool,

    /// Set once, on release
    pub rent_ended: bool,

    /// Padding for future fields
    pub reserved: [u8; 64],
}

impl EscrowRecord {
    /// Discriminator shared with records written by earlier deployments.
    pub const DISCRIMINATOR: [u8; 8] = [36, 69, 48, 18, 128, 225, 125, 135];

    /// Serialized size: discriminator plus the 154-byte body.
    pub const LEN: usize = 8 + 8 + 8 + 32 + 32 + 8 + 1 + 1 + 64;

    /// Offset of `guest_address` within the account data.
    pub const GUEST_OFFSET: usize = 8 + 8 + 8 + 32;

    pub fn new(
        booking_id: u64,
        amount: u64,
        owner_address: Pubkey,
        guest_address: Pubkey,
        check_in_timestamp: u64,
    ) -> Self {
        Self {
            discriminator: Self::DISCRIMINATOR,
            booking_id,
            amount,
            owner_address,
            guest_address,
            check_in_timestamp,
            rent_started: false,
            rent_ended: false,
            reserved: [0; 64],
        }
    }

    /// Decode a record from account data.
    ///
    /// Empty or foreign data is reported as `AccountNotFound`: a closed record
    /// and a record that never existed look the same.
    pub fn unpack(data: &[u8]) -> Result<Self, EscrowError> {
        if data.len() < Self::LEN || data[..8] != Self::DISCRIMINATOR {
            return Err(EscrowError::AccountNotFound);
        }
        Self::deserialize(&mut &data[..Self::LEN]).map_err(|_| EscrowError::AccountNotFound)
    }

    /// Encode the record into the front of `dst`.
    pub fn pack_into(&self, dst: &mut [u8]) -> Result<(), ProgramError> {
        if dst.len() < Self::LEN {
            return Err(ProgramError::AccountDataTooSmall);
        }
        self.serialize(&mut &mut dst[..Self::LEN])?;
        Ok(())
    }

    /// Release is allowed at or after check-in.
    pub fn is_releasable(&self, now: i64) -> bool {
        !self.rent_ended && unix_seconds(now) >= self.check_in_timestamp
    }

    /// Cancellation is allowed strictly before check-in.
    pub fn is_cancellable(&self, now: i64) -> bool {
        !self.rent_ended && unix_seconds(now) < self.check_in_timestamp
    }

    /// Mark the rent as started and ended in one step.
    pub fn complete(&mut self) {
        self.rent_started = true;
        self.rent_ended = true;
    }
}

impl IsInitialized for EscrowRecord {
    fn is_initialized(&self) -> bool {
        self.discriminator == Self::DISCRIMINATOR
    }
}

/// Who may submit `ReleasePayment`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, BorshSchema)]
pub enum ReleasePolicy {
    /// Anyone can assemble the release; funds can only go to the configured owner.
    Permissionless,
    /// The configured owner must also sign the release.
    OwnerSigned,
}

/// Config is the program-wide payout configuration.
///
/// It is written once by `InitializeConfig` and never changes afterwards.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, BorshSchema)]
pub struct Config {
    /// Account type tag, always [`Config::DISCRIMINATOR`]
    pub discriminator: [u8; 8],

    /// Wallet that created the configuration
    pub admin: Pubkey,

    /// Owner wallet that receives released payments
    pub owner: Pubkey,

    /// Payment mint accepted for bookings
    pub mint: Pubkey,

    /// Release authorization mode
    pub release_policy: ReleasePolicy,

    /// Bump of the configuration address
    pub bump: u8,
}

impl Config {
    pub const DISCRIMINATOR: [u8; 8] = *b"ESCRCONF";

    pub const LEN: usize = 8 + 32 + 32 + 32 + 1 + 1;

    pub fn new(
        admin: Pubkey,
        owner: Pubkey,
        mint: Pubkey,
        release_policy: ReleasePolicy,
        bump: u8,
    ) -> Self {
        Self {
            discriminator: Self::DISCRIMINATOR,
            admin,
            owner,
            mint,
            release_policy,
            bump,
        }
    }

    pub fn unpack(data: &[u8]) -> Result<Self, EscrowError> {
        if data.len() < Self::LEN || data[..8] != Self::DISCRIMINATOR {
            return Err(EscrowError::ConfigNotFound);
        }
        Self::deserialize(&mut &data[..Self::LEN]).map_err(|_| EscrowError::ConfigNotFound)
    }

    pub fn pack_into(&self, dst: &mut [u8]) -> Result<(), ProgramError> {
        if dst.len() < Self::LEN {
            return Err(ProgramError::AccountDataTooSmall);
        }
        self.serialize(&mut &mut dst[..Self::LEN])?;
        Ok(())
    }
}

impl IsInitialized for Config {
    fn is_initialized(&self) -> bool {
        self.discriminator == Self::DISCRIMINATOR
    }
}

/// Header of the upgradeable loader's ProgramData account.
///
/// Layout: `u32` state tag (3), `u64` deployment slot, then the upgrade
/// authority as a one-byte option flag followed by 32 key bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgramDataHeader {
    pub slot: u64,
    pub upgrade_authority: Option<Pubkey>,
}

impl ProgramDataHeader {
    const TAG: [u8; 4] = 3u32.to_le_bytes();

    pub const LEN: usize = 4 + 8 + 1 + 32;

    pub fn unpack(data: &[u8]) -> Result<Self, EscrowError> {
        if data.len() < Self::LEN || data[..4] != Self::TAG {
            return Err(EscrowError::UnauthorizedAdmin);
        }
        let mut slot = [0u8; 8];
        slot.copy_from_slice(&data[4..12]);
        let upgrade_authority = match data[12] {
            0 => None,
            1 => Some(Pubkey::new_from_array(
                data[13..Self::LEN]
                    .try_into()
                    .map_err(|_| EscrowError::UnauthorizedAdmin)?,
            )),
            _ => return Err(EscrowError::UnauthorizedAdmin),
        };

        Ok(Self {
            slot: u64::from_le_bytes(slot),
            upgrade_authority,
        })
    }

    pub fn pack_into(&self, dst: &mut [u8]) -> Result<(), ProgramError> {
        if dst.len() < Self::LEN {
            return Err(ProgramError::AccountDataTooSmall);
        }
        dst[..4].copy_from_slice(&Self::TAG);
        dst[4..12].copy_from_slice(&self.slot.to_le_bytes());
        match self.upgrade_authority {
            Some(authority) => {
                dst[12] = 1;
                dst[13..Self::LEN].copy_from_slice(authority.as_ref());
            }
            None => dst[12..Self::LEN].fill(0),
        }
        Ok(())
    }
}

/// Clock timestamps before the epoch count as zero.
fn unix_seconds(now: i64) -> u64 {
    u64::try_from(now).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(check_in: u64) -> EscrowRecord {
        EscrowRecord::new(
            7,
            500_000000,
            Pubkey::new_unique(),
            Pubkey::new_unique(),
            check_in,
        )
    }

    #[test]
    fn record_layout() {
        let record = record(1_700_000_000);
        let data = borsh::to_vec(&record).unwrap();

        assert_eq!(data.len(), 162);
        assert_eq!(
            borsh::max_serialized_size::<EscrowRecord>().unwrap(),
            EscrowRecord::LEN
        );
        assert_eq!(data[..8], EscrowRecord::DISCRIMINATOR);
        assert_eq!(data[8..16], 7u64.to_le_bytes());
        assert_eq!(data[16..24], 500_000000u64.to_le_bytes());
        assert_eq!(data[24..56], record.owner_address.to_bytes());
        assert_eq!(
            data[EscrowRecord::GUEST_OFFSET..EscrowRecord::GUEST_OFFSET + 32],
            record.guest_address.to_bytes()
        );
        assert_eq!(data[88..96], 1_700_000_000u64.to_le_bytes());
        assert_eq!(data[96], 0);
        assert_eq!(data[97], 0);
        assert!(data[98..].iter().all(|b| *b == 0));
    }

    #[test]
    fn unpack_rejects_empty_and_foreign_data() {
        assert_eq!(EscrowRecord::unpack(&[]), Err(EscrowError::AccountNotFound));

        let mut data = borsh::to_vec(&record(1)).unwrap();
        data[0] ^= 0xff;
        assert_eq!(EscrowRecord::unpack(&data), Err(EscrowError::AccountNotFound));
    }

    #[test]
    fn pack_then_unpack_with_trailing_space() {
        let record = record(1);
        let mut data = vec![0u8; EscrowRecord::LEN + 16];
        record.pack_into(&mut data).unwrap();

        assert!(EscrowRecord::unpack(&data).unwrap().is_initialized());
        assert_eq!(EscrowRecord::unpack(&data).unwrap(), record);
        assert_eq!(
            record.pack_into(&mut [0u8; 10]),
            Err(ProgramError::AccountDataTooSmall)
        );
    }

    #[test]
    fn release_and_cancel_windows_do_not_overlap() {
        let record = record(1_000);

        assert!(record.is_cancellable(999));
        assert!(!record.is_releasable(999));

        assert!(!record.is_cancellable(1_000));
        assert!(record.is_releasable(1_000));

        assert!(!record.is_cancellable(1_001));
        assert!(record.is_releasable(1_001));
    }

    #[test]
    fn negative_clock_counts_as_epoch() {
        assert!(record(1).is_cancellable(-5));
        assert!(record(0).is_releasable(-5));
    }

    #[test]
    fn completed_record_is_neither_releasable_nor_cancellable() {
        let mut record = record(1_000);
        record.complete();

        assert!(record.rent_started && record.rent_ended);
        assert!(!record.is_releasable(2_000));
        assert!(!record.is_cancellable(0));
    }

    #[test]
    fn config_layout() {
        let config = Config::new(
            Pubkey::new_unique(),
            Pubkey::new_unique(),
            Pubkey::new_unique(),
            ReleasePolicy::OwnerSigned,
            254,
        );
        let data = borsh::to_vec(&config).unwrap();

        assert_eq!(data.len(), Config::LEN);
        assert_eq!(data[104], 1);
        assert_eq!(Config::unpack(&data).unwrap(), config);
        assert_eq!(Config::unpack(&data[..50]), Err(EscrowError::ConfigNotFound));
    }

    #[test]
    fn program_data_header() {
        let authority = Pubkey::new_unique();
        let header = ProgramDataHeader {
            slot: 42,
            upgrade_authority: Some(authority),
        };
        let mut data = vec![0u8; ProgramDataHeader::LEN + 16];
        header.pack_into(&mut data).unwrap();

        assert_eq!(data[..4], [3, 0, 0, 0]);
        assert_eq!(data[12], 1);
        assert_eq!(data[13..45], authority.to_bytes());
        assert_eq!(ProgramDataHeader::unpack(&data), Ok(header));
    }

    #[test]
    fn program_data_without_authority() {
        let header = ProgramDataHeader {
            slot: 1,
            upgrade_authority: None,
        };
        let mut data = vec![0u8; ProgramDataHeader::LEN];
        header.pack_into(&mut data).unwrap();
        assert_eq!(ProgramDataHeader::unpack(&data).unwrap().upgrade_authority, None);

        // a program account (tag 2) is not a ProgramData account
        data[0] = 2;
        assert_eq!(
            ProgramDataHeader::unpack(&data),
            Err(EscrowError::UnauthorizedAdmin)
        );
        assert_eq!(
            ProgramDataHeader::unpack(&[3, 0, 0, 0]),
            Err(EscrowError::UnauthorizedAdmin)
        );
    }
}
