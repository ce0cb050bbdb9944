//! Reconciliation of the off-chain booking table against escrow state.
//!
//! The booking table is advisory. Whenever it disagrees with the escrow
//! record on chain, the record wins.

use rental_escrow_program::state::EscrowRecord;
use std::fmt;
use std::str::FromStr;

/// Status column of the off-chain booking table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvisoryStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl AdvisoryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AdvisoryStatus::Pending => "pending",
            AdvisoryStatus::Confirmed => "confirmed",
            AdvisoryStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for AdvisoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown booking status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for AdvisoryStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AdvisoryStatus::Pending),
            "confirmed" => Ok(AdvisoryStatus::Confirmed),
            "cancelled" => Ok(AdvisoryStatus::Cancelled),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Corrected advisory status of one booking row.
///
/// `record` is the escrow record currently on chain for the row's
/// (guest, booking id), `check_in` the row's check-in in Unix seconds.
///
/// Released and cancelled escrows both end as closed accounts, so once
/// check-in has passed a confirmed row without an escrow is assumed released.
/// A booking cancelled before check-in that the table never marked cancelled
/// stays `Confirmed` from then on. Callers that need to tell the two apart
/// must record the outcome of the closing transaction themselves.
pub fn reconcile(
    advisory: AdvisoryStatus,
    record: Option<&EscrowRecord>,
    check_in: u64,
    now: i64,
) -> AdvisoryStatus {
    let check_in_reached = u64::try_from(now).map_or(false, |now| now >= check_in);

    match (advisory, record) {
        // funds are locked
        (_, Some(_)) => AdvisoryStatus::Confirmed,
        // the payment may still be on its way; give up once check-in has passed
        (AdvisoryStatus::Pending, None) if check_in_reached => AdvisoryStatus::Cancelled,
        (AdvisoryStatus::Pending, None) => AdvisoryStatus::Pending,
        // release is impossible before check-in, so a closed escrow was refunded
        (AdvisoryStatus::Confirmed, None) if !check_in_reached => AdvisoryStatus::Cancelled,
        // released, or refunded earlier without the table noticing
        (AdvisoryStatus::Confirmed, None) => AdvisoryStatus::Confirmed,
        (AdvisoryStatus::Cancelled, None) => AdvisoryStatus::Cancelled,
    }
}
