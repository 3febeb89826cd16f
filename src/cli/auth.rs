//! `nexus auth` / `nexus deauth`: keep the provider key in the system keyring.

use std::error::Error;
use std::io::{self, BufRead, Write};

use crate::core::config::Config;
use crate::core::credentials::keyring_account;
use crate::core::keyring::{SecretStore, SystemKeyring};

/// Read one line from `input` and store it under the provider's account.
/// Returns the account name.
pub fn store_key<R: BufRead>(
    config: &Config,
    mut input: R,
    keyring: &dyn SecretStore,
) -> Result<String, Box<dyn Error>> {
    let mut line = String::new();
    input.read_line(&mut line)?;
    let secret = line.trim();
    if secret.is_empty() {
        return Err("No API key provided".into());
    }

    let account = keyring_account(config);
    keyring.set(&account, secret)?;
    Ok(account)
}

pub fn run_auth(config: &Config) -> Result<(), Box<dyn Error>> {
    let account = keyring_account(config);
    eprint!("🔑 API key for {account}: ");
    io::stderr().flush()?;

    let stdin = io::stdin();
    let account = store_key(config, stdin.lock(), &SystemKeyring)?;
    println!("✅ Stored API key for {account} in the system keyring");
    Ok(())
}

pub fn run_deauth(config: &Config) -> Result<(), Box<dyn Error>> {
    let account = keyring_account(config);
    if SystemKeyring.delete(&account)? {
        println!("✅ Removed API key for {account}");
    } else {
        println!("No stored API key for {account}");
    }
    Ok(())
}
