use solana_program::program_error::ProgramError;
use thiserror::Error;

/// Coarse classification of escrow failures.
///
/// Guard violations and resource conflicts are expected outcomes that a caller
/// should resolve by re-reading state. The other two are surfaced to the user as-is.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A time or authorization precondition was not met.
    GuardViolation,
    /// The record already exists, or no longer exists.
    ResourceConflict,
    /// The guest cannot cover the booking amount.
    InsufficientFunds,
    /// Accounts or derivation inputs do not match the program's configuration.
    ConfigurationError,
}

/// Errors returned by the escrow program.
///
/// Codes start at 6000 so that they line up with the error codes of escrow
/// records created by earlier deployments.
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u32)]
pub enum EscrowError {
    #[error("Payment has already been released")]
    PaymentAlreadyReleased = 6000,
    #[error("Check-in date has not been reached yet")]
    CheckInDateNotReached = 6001,
    #[error("Cannot cancel booking after check-in date")]
    CannotCancelAfterCheckIn = 6002,
    #[error("Invalid guest address")]
    InvalidGuest = 6003,
    #[error("An escrow for this booking already exists")]
    DuplicateBooking = 6004,
    #[error("Escrow account not found")]
    AccountNotFound = 6005,
    #[error("Insufficient funds to lock the booking amount")]
    InsufficientFunds = 6006,
    #[error("Booking amount must be greater than zero")]
    InvalidAmount = 6007,
    #[error("Check-in timestamp must be in the future")]
    InvalidCheckInTimestamp = 6008,
    #[error("Account does not match its derived address")]
    InvalidPda = 6009,
    #[error("No valid bump seed for the derived address")]
    AddressDerivationFailed = 6010,
    #[error("Custody account is invalid")]
    InvalidCustody = 6011,
    #[error("Payout destination is not the configured owner account")]
    InvalidDestination = 6012,
    #[error("Token mint is not the configured payment mint")]
    InvalidMint = 6013,
    #[error("Funding account does not belong to the guest")]
    InvalidFundingAccount = 6014,
    #[error("Release must be signed by the configured owner")]
    UnauthorizedRelease = 6015,
    #[error("Program configuration already exists")]
    ConfigAlreadyInitialized = 6016,
    #[error("Program configuration not found")]
    ConfigNotFound = 6017,
    #[error("Invalid instruction")]
    InvalidInstruction = 6018,
    #[error("Amount overflow")]
    AmountOverflow = 6019,
    #[error("Configuration must be created by the program's upgrade authority")]
    UnauthorizedAdmin = 6020,
}

impl EscrowError {
    const ALL: [EscrowError; 21] = [
        EscrowError::PaymentAlreadyReleased,
        EscrowError::CheckInDateNotReached,
        EscrowError::CannotCancelAfterCheckIn,
        EscrowError::InvalidGuest,
        EscrowError::DuplicateBooking,
        EscrowError::AccountNotFound,
        EscrowError::InsufficientFunds,
        EscrowError::InvalidAmount,
        EscrowError::InvalidCheckInTimestamp,
        EscrowError::InvalidPda,
        EscrowError::AddressDerivationFailed,
        EscrowError::InvalidCustody,
        EscrowError::InvalidDestination,
        EscrowError::InvalidMint,
        EscrowError::InvalidFundingAccount,
        EscrowError::UnauthorizedRelease,
        EscrowError::ConfigAlreadyInitialized,
        EscrowError::ConfigNotFound,
        EscrowError::InvalidInstruction,
        EscrowError::AmountOverflow,
        EscrowError::UnauthorizedAdmin,
    ];

    /// Custom program error code.
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Decode a custom program error code.
    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|e| e.code() == code)
    }

    pub fn kind(self) -> ErrorKind {
        use EscrowError::*;
        match self {
            CheckInDateNotReached
            | CannotCancelAfterCheckIn
            | InvalidGuest
            | InvalidAmount
            | InvalidCheckInTimestamp
            | UnauthorizedRelease
            | UnauthorizedAdmin => ErrorKind::GuardViolation,
            PaymentAlreadyReleased
            | DuplicateBooking
            | AccountNotFound
            | ConfigAlreadyInitialized => ErrorKind::ResourceConflict,
            InsufficientFunds => ErrorKind::InsufficientFunds,
            InvalidPda
            | AddressDerivationFailed
            | InvalidCustody
            | InvalidDestination
            | InvalidMint
            | InvalidFundingAccount
            | ConfigNotFound
            | InvalidInstruction
            | AmountOverflow => ErrorKind::ConfigurationError,
        }
    }

    /// Whether the caller should re-read escrow state instead of reporting the failure.
    pub fn is_recoverable(self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::GuardViolation | ErrorKind::ResourceConflict
        )
    }
}

impl From<EscrowError> for ProgramError {
    fn from(e: EscrowError) -> Self {
        ProgramError::Custom(e as u32)
    }
}
