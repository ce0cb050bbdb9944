mod config;

use crate::config::Config;
use anyhow::Context;
use clap::{Parser, Subcommand};
use rental_escrow_client::booking::{
    to_base_units, to_ui_amount, unix_now, Booking, BookingStatus, USDC_DECIMALS,
};
use rental_escrow_client::reconcile::{reconcile, AdvisoryStatus};
use rental_escrow_client::{Client, Settlement};
use rental_escrow_program::state::{EscrowRecord, ReleasePolicy};
use serde::Serialize;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::pubkey::Pubkey;
use std::path::PathBuf;
use std::sync::Arc;

/// Cli is a struct that represents the command line arguments.
#[derive(Parser)]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Escrow program ID.
    #[arg(long)]
    escrow_program_id: Option<Pubkey>,

    /// Decimals of the payment mint.
    #[arg(long, default_value_t = USDC_DECIMALS)]
    decimals: u8,

    /// Subcommands for the CLI.
    #[command(subcommand)]
    command: Commands,
}

/// Commands is an enum that represents the subcommands for the CLI.
#[derive(Subcommand, PartialEq, Debug)]
enum Commands {
    #[clap(about = "Create the program configuration (upgrade authority only)")]
    #[clap(arg_required_else_help = true)]
    InitConfig {
        #[clap(help = "Wallet of the property owner")]
        owner: Pubkey,
        #[clap(help = "Address of the payment mint")]
        mint: Pubkey,
        #[clap(long, help = "Only the owner may release payments")]
        owner_signed: bool,
    },
    #[clap(about = "Show the escrow and custody addresses of a booking")]
    #[clap(arg_required_else_help = true)]
    Address {
        #[clap(help = "Wallet of the guest")]
        guest: Pubkey,
        #[clap(help = "Booking ID")]
        booking_id: u64,
    },
    #[clap(about = "Create the custody account of a booking")]
    #[clap(arg_required_else_help = true)]
    CreateCustody {
        #[clap(help = "Booking ID")]
        booking_id: u64,
    },
    #[clap(about = "Lock the payment of a booking")]
    #[clap(arg_required_else_help = true)]
    Book {
        #[clap(help = "Booking ID")]
        booking_id: u64,
        #[clap(help = "Amount to lock, e.g. 500.25")]
        amount: f64,
        #[clap(help = "Check-in time in Unix seconds")]
        check_in_timestamp: u64,
    },
    #[clap(about = "Release the payment of a booking to the owner")]
    #[clap(arg_required_else_help = true)]
    Release {
        #[clap(help = "Wallet of the guest")]
        guest: Pubkey,
        #[clap(help = "Booking ID")]
        booking_id: u64,
    },
    #[clap(about = "Cancel a booking and refund the payment")]
    #[clap(arg_required_else_help = true)]
    Cancel {
        #[clap(help = "Booking ID")]
        booking_id: u64,
    },
    #[clap(about = "Get account details of an escrow account")]
    #[clap(arg_required_else_help = true)]
    Account {
        #[clap(help = "Address of escrow account")]
        escrow_address: Pubkey,
        #[clap(long, help = "Print as JSON")]
        json: bool,
    },
    #[clap(about = "List open escrows")]
    List {
        #[clap(long, help = "Only escrows paid by this guest")]
        guest: Option<Pubkey>,
        #[clap(long, help = "Print as JSON")]
        json: bool,
    },
    #[clap(about = "Correct the status of an off-chain booking row")]
    #[clap(arg_required_else_help = true)]
    Reconcile {
        #[clap(help = "Wallet of the guest")]
        guest: Pubkey,
        #[clap(help = "Booking ID")]
        booking_id: u64,
        #[clap(help = "Recorded status: pending, confirmed or cancelled")]
        status: AdvisoryStatus,
        #[clap(help = "Check-in time in Unix seconds")]
        check_in_timestamp: u64,
    },
}

/// Printable view of an escrow.
#[derive(Serialize)]
struct EscrowView {
    address: String,
    booking_id: u64,
    amount: f64,
    owner: String,
    guest: String,
    check_in_timestamp: u64,
    rent_started: bool,
    rent_ended: bool,
    status: Option<&'static str>,
}

impl EscrowView {
    fn new(address: Pubkey, record: &EscrowRecord, decimals: u8) -> Self {
        Self {
            address: address.to_string(),
            booking_id: record.booking_id,
            amount: to_ui_amount(record.amount, decimals),
            owner: record.owner_address.to_string(),
            guest: record.guest_address.to_string(),
            check_in_timestamp: record.check_in_timestamp,
            rent_started: record.rent_started,
            rent_ended: record.rent_ended,
            status: None,
        }
    }

    fn from_booking(booking: &Booking, decimals: u8) -> Self {
        let status = match booking.status {
            BookingStatus::Upcoming => "upcoming",
            BookingStatus::Releasable => "releasable",
            BookingStatus::Completed => "completed",
        };
        Self {
            status: Some(status),
            ..Self::new(booking.address, &booking.record, decimals)
        }
    }

    fn print(&self) {
        println!("Escrow: {}", self.address);
        println!("Booking ID: {}", self.booking_id);
        println!("Amount: {}", self.amount);
        println!("Owner: {}", self.owner);
        println!("Guest: {}", self.guest);
        println!("Check-in: {}", self.check_in_timestamp);
        if let Some(status) = self.status {
            println!("Status: {status}");
        }
    }
}

fn print_settlement(settlement: Settlement) {
    match settlement {
        Settlement::Submitted(signature) => println!("Signature: {signature}"),
        Settlement::AlreadyClosed => println!("Escrow is already closed"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    solana_logger::setup_with_default("info");
    let args = Cli::parse();

    let path = args
        .config
        .or_else(Config::default_path)
        .context("no config path given and HOME is not set")?;
    let config = Config::load(path)?;

    let keypair = config.load_keypair()?;
    let rpc_client = Arc::new(RpcClient::new_with_commitment(
        config.json_rpc_url().to_string(),
        config.commitment()?,
    ));
    let mut builder = Client::builder(rpc_client, keypair);
    if let Some(escrow_program_id) = args.escrow_program_id {
        builder = builder.with_escrow_program_id(escrow_program_id);
    }
    let escrow = builder.build();
    let decimals = args.decimals;

    match args.command {
        Commands::InitConfig {
            owner,
            mint,
            owner_signed,
        } => {
            let release_policy = if owner_signed {
                ReleasePolicy::OwnerSigned
            } else {
                ReleasePolicy::Permissionless
            };
            let signature = escrow
                .initialize_config(owner, mint, release_policy)
                .await?;
            println!("Config: {}", escrow.config_address()?);
            println!("Signature: {signature}");
        }
        Commands::Address { guest, booking_id } => {
            let config = escrow.config().await?;
            let address = escrow.escrow_address(&guest, booking_id)?;
            println!("Escrow: {address}");
            println!("Custody: {}", escrow.custody_address(&address, &config.mint));
        }
        Commands::CreateCustody { booking_id } => {
            let signature = escrow.create_custody_account(booking_id).await?;
            println!("Signature: {signature}");
        }
        Commands::Book {
            booking_id,
            amount,
            check_in_timestamp,
        } => {
            let config = escrow.config().await?;
            let (signature, address) = escrow
                .initialize(
                    booking_id,
                    config.owner,
                    to_base_units(amount, decimals),
                    check_in_timestamp,
                )
                .await?;
            println!("Escrow: {address}");
            println!("Signature: {signature}");
        }
        Commands::Release { guest, booking_id } => {
            print_settlement(escrow.release_payment(guest, booking_id).await?);
        }
        Commands::Cancel { booking_id } => {
            print_settlement(escrow.cancel_booking(booking_id).await?);
        }
        Commands::Account {
            escrow_address,
            json,
        } => {
            let record = escrow.account(escrow_address).await?;
            let view = EscrowView::new(escrow_address, &record, decimals);
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                view.print();
            }
        }
        Commands::List { guest, json } => {
            let bookings = match guest {
                Some(guest) => escrow.guest_bookings(&guest).await?,
                None => escrow.escrows().await?,
            };
            let views = bookings
                .iter()
                .map(|booking| EscrowView::from_booking(booking, decimals))
                .collect::<Vec<_>>();
            if json {
                println!("{}", serde_json::to_string_pretty(&views)?);
            } else {
                for view in &views {
                    view.print();
                    println!();
                }
            }
        }
        Commands::Reconcile {
            guest,
            booking_id,
            status,
            check_in_timestamp,
        } => {
            let record = escrow.escrow(&guest, booking_id).await?;
            let corrected = reconcile(status, record.as_ref(), check_in_timestamp, unix_now());
            if corrected != status {
                log::info!("Booking {booking_id} of {guest}: {status} -> {corrected}");
            }
            println!("{corrected}");
        }
    }

    Ok(())
}
