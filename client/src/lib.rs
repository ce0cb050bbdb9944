pub mod booking;
mod client;
pub mod reconcile;

pub use client::{Client, ClientBuilder, ClientError, Result, Settlement};
