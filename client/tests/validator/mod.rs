use solana_faucet::faucet;
use solana_sdk::account::AccountSharedData;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use solana_sdk::{bpf_loader_upgradeable, system_program};
use solana_test_validator::{TestValidator, TestValidatorGenesis, UpgradeableProgramInfo};
use std::path::PathBuf;
use std::{env, fs};
use uuid::Uuid;

/// File name of the built escrow program.
const PROGRAM_FILE: &str = "rental_escrow_program.so";

/// A local validator with the escrow program deployed at its declared ID.
#[derive(Default)]
pub struct Validator {
    ledger_path: Option<PathBuf>,
    program_dir: Option<PathBuf>,
    upgrade_authority: Option<Pubkey>,
    accounts: Vec<(Pubkey, AccountSharedData)>,
}

impl Validator {
    /// Set the ledger path for the validator.
    #[allow(dead_code)]
    pub fn with_ledger_path(mut self, ledger_path: PathBuf) -> Self {
        self.ledger_path = Some(ledger_path);
        self
    }

    /// Set the directory holding the built program.
    #[allow(dead_code)]
    pub fn with_program_dir(mut self, program_dir: PathBuf) -> Self {
        self.program_dir = Some(program_dir);
        self
    }

    /// Set the upgrade authority of the deployed program.
    pub fn with_upgrade_authority(mut self, upgrade_authority: Pubkey) -> Self {
        self.upgrade_authority = Some(upgrade_authority);
        self
    }

    /// Preload accounts into the genesis.
    pub fn with_accounts(mut self, accounts: Vec<(Pubkey, AccountSharedData)>) -> Self {
        self.accounts.extend(accounts);
        self
    }

    fn ledger_path(&self) -> Option<PathBuf> {
        self.ledger_path.clone().or_else(|| {
            let temp_dir = env::temp_dir().join(Uuid::new_v4().to_string());
            fs::create_dir(&temp_dir).map(move |_| temp_dir).ok()
        })
    }

    /// Directories searched for the built program, in order.
    fn program_dirs(&self) -> Vec<PathBuf> {
        let target_deploy = env::current_exe().ok().and_then(|path| {
            path.ancestors()
                .find(|ancestor| ancestor.ends_with("target"))
                .map(|ancestor| ancestor.join("deploy"))
        });

        [
            self.program_dir.clone(),
            env::var("SBF_OUT_DIR").ok().map(PathBuf::from),
            env::var("BPF_OUT_DIR").ok().map(PathBuf::from),
            target_deploy,
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    fn find_program(&self) -> anyhow::Result<UpgradeableProgramInfo> {
        let program_path = self
            .program_dirs()
            .into_iter()
            .map(|dir| dir.join(PROGRAM_FILE))
            .find(|path| path.is_file())
            .ok_or_else(|| anyhow::anyhow!("{PROGRAM_FILE} not found, run cargo build-sbf"))?;

        Ok(UpgradeableProgramInfo {
            program_id: rental_escrow_program::id(),
            loader: bpf_loader_upgradeable::id(),
            upgrade_authority: self.upgrade_authority.unwrap_or_default(),
            program_path,
        })
    }

    /// Start the validator and return it with its funded mint keypair.
    pub async fn start(self) -> anyhow::Result<(TestValidator, Keypair)> {
        let program = self.find_program()?;
        let faucet_keypair = Keypair::new();
        let faucet_account = AccountSharedData::new(1_000_000_000 * 100, 0, &system_program::id());
        let socket = faucet::run_local_faucet(faucet_keypair.insecure_clone(), None);

        let mut genesis = TestValidatorGenesis::default();
        if let Some(path) = self.ledger_path() {
            genesis.ledger_path(path);
        }
        Ok(genesis
            .faucet_addr(Some(socket))
            .add_upgradeable_programs_with_path(&[program])
            .add_account(faucet_keypair.pubkey(), faucet_account)
            .add_accounts(self.accounts)
            .start_async()
            .await)
    }
}
