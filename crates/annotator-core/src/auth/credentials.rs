use anyhow::{bail, Context, Result};
use keyring::Entry;
use tracing::debug;

const SERVICE_NAME: &str = "annotator";

/// Remembered login passwords, kept in the OS keychain.
pub struct CredentialStore;

impl CredentialStore {
    /// Store username and password in the OS keychain.
    ///
    /// The password is read back before returning, so a keychain that drops
    /// writes is reported instead of silently forgetting the login.
    pub fn store(username: &str, password: &str) -> Result<()> {
        store_in(&entry(username)?, password)?;
        debug!(username, "Stored password in keychain");
        Ok(())
    }

    /// Retrieve the password for a username, if one was remembered
    pub fn get_password(username: &str) -> Result<Option<String>> {
        read(&entry(username)?)
    }

    /// Delete stored credentials for a username. Missing entries are not an error.
    pub fn delete(username: &str) -> Result<()> {
        remove(&entry(username)?)
    }
}

fn entry(username: &str) -> Result<Entry> {
    Entry::new(SERVICE_NAME, username).context("Failed to create keyring entry")
}

fn store_in(entry: &Entry, password: &str) -> Result<()> {
    entry
        .set_password(password)
        .context("Failed to store password in keychain")?;
    match read(entry)? {
        Some(stored) if stored == password => Ok(()),
        _ => bail!("Keychain did not retain the password"),
    }
}

fn read(entry: &Entry) -> Result<Option<String>> {
    match entry.get_password() {
        Ok(password) => Ok(Some(password)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(e).context("Failed to retrieve password from keychain"),
    }
}

fn remove(entry: &Entry) -> Result<()> {
    match entry.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(e).context("Failed to delete credential from keychain"),
    }
}
