use solana_program::declare_id;

pub use crate::error::{ErrorKind, EscrowError};
pub use crate::instruction::EscrowInstruction;

pub mod error;
pub mod instruction;
pub mod pda;
pub mod processor;
pub mod state;

#[cfg(not(feature = "no-entrypoint"))]
mod entrypoint;

declare_id!("2mGptfx2M9rTGsGExE9T3yLZ6MHSXLcgiQjD1NoVsfVa");
