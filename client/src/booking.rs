use rental_escrow_program::state::EscrowRecord;
use solana_sdk::pubkey::Pubkey;
use std::time::{SystemTime, UNIX_EPOCH};

/// Decimals of the USDC mint.
pub const USDC_DECIMALS: u8 = 6;

/// Convert a UI amount (e.g. `500.0` USDC) to base units of a mint.
pub fn to_base_units(ui_amount: f64, decimals: u8) -> u64 {
    spl_token::ui_amount_to_amount(ui_amount, decimals)
}

/// Convert base units of a mint to a UI amount.
pub fn to_ui_amount(amount: u64, decimals: u8) -> f64 {
    spl_token::amount_to_ui_amount(amount, decimals)
}

/// Current wall-clock time in Unix seconds.
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Where a booking stands relative to its check-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingStatus {
    /// Check-in is ahead; the guest may still cancel.
    Upcoming,
    /// Check-in has been reached; the payment can be released.
    Releasable,
    /// Rent has ended.
    Completed,
}

impl BookingStatus {
    pub fn of(record: &EscrowRecord, now: i64) -> Self {
        if record.rent_ended {
            BookingStatus::Completed
        } else if record.is_releasable(now) {
            BookingStatus::Releasable
        } else {
            BookingStatus::Upcoming
        }
    }
}

/// An escrow record together with its address and status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Booking {
    pub address: Pubkey,
    pub record: EscrowRecord,
    pub status: BookingStatus,
}

impl Booking {
    pub fn new(address: Pubkey, record: EscrowRecord, now: i64) -> Self {
        let status = BookingStatus::of(&record, now);
        Self {
            address,
            record,
            status,
        }
    }

    pub fn can_release(&self) -> bool {
        self.status == BookingStatus::Releasable
    }

    pub fn can_cancel(&self) -> bool {
        self.status == BookingStatus::Upcoming
    }
}

/// Sort bookings with the latest check-in first.
pub fn latest_first(bookings: &mut [Booking]) {
    bookings.sort_by(|a, b| {
        b.record
            .check_in_timestamp
            .cmp(&a.record.check_in_timestamp)
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(check_in: u64) -> EscrowRecord {
        EscrowRecord::new(1, 10, Pubkey::new_unique(), Pubkey::new_unique(), check_in)
    }

    #[test]
    fn status_follows_check_in() {
        let record = record(1_000);

        assert_eq!(BookingStatus::of(&record, 999), BookingStatus::Upcoming);
        assert_eq!(BookingStatus::of(&record, 1_000), BookingStatus::Releasable);
        assert_eq!(BookingStatus::of(&record, 5_000), BookingStatus::Releasable);
    }

    #[test]
    fn ended_rent_is_completed() {
        let mut record = record(1_000);
        record.complete();

        let booking = Booking::new(Pubkey::new_unique(), record, 0);
        assert_eq!(booking.status, BookingStatus::Completed);
        assert!(!booking.can_cancel());
        assert!(!booking.can_release());
    }

    #[test]
    fn usdc_conversion() {
        assert_eq!(to_base_units(500.0, USDC_DECIMALS), 500_000000);
        assert_eq!(to_base_units(0.5, USDC_DECIMALS), 500000);
        assert_eq!(to_ui_amount(1_250000, USDC_DECIMALS), 1.25);
    }

    #[test]
    fn latest_check_in_first() {
        let mut bookings = vec![
            Booking::new(Pubkey::new_unique(), record(10), 0),
            Booking::new(Pubkey::new_unique(), record(30), 0),
            Booking::new(Pubkey::new_unique(), record(20), 0),
        ];
        latest_first(&mut bookings);

        let order: Vec<u64> = bookings
            .iter()
            .map(|b| b.record.check_in_timestamp)
            .collect();
        assert_eq!(order, vec![30, 20, 10]);
    }
}
