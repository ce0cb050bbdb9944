use anyhow::Context;
use serde::{Deserialize, Serialize};
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::signature::{read_keypair_file, Keypair};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Configuration shared with the solana CLI.
#[derive(Debug, Serialize, Deserialize)]
pub struct Config {
    /// URL of the solana JSON RPC.
    json_rpc_url: String,

    /// Path to the keypair file.
    keypair_path: PathBuf,

    /// Commitment level.
    /// Options: "processed", "confirmed", "finalized"
    #[serde(default = "default_commitment")]
    commitment: String,
}

fn default_commitment() -> String {
    "confirmed".to_string()
}

impl Config {
    /// Location of the solana CLI configuration.
    pub fn default_path() -> Option<PathBuf> {
        env::var("HOME").ok().map(|home| {
            Path::new(&home)
                .join(".config")
                .join("solana")
                .join("cli")
                .join("config.yml")
        })
    }

    /// Load the configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let yaml = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = serde_yaml::from_str::<Config>(&yaml)
            .with_context(|| format!("invalid config {}", path.display()))?;

        Ok(config)
    }

    pub fn json_rpc_url(&self) -> &str {
        &self.json_rpc_url
    }

    pub fn commitment(&self) -> anyhow::Result<CommitmentConfig> {
        CommitmentConfig::from_str(&self.commitment)
            .with_context(|| format!("invalid commitment {}", self.commitment))
    }

    /// Load the keypair from the keypair path.
    pub fn load_keypair(&self) -> anyhow::Result<Keypair> {
        read_keypair_file(&self.keypair_path).map_err(|err| {
            anyhow::anyhow!(
                "failed to read keypair {}: {err}",
                self.keypair_path.display()
            )
        })
    }
}
