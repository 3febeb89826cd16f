use keyring::Entry;
use std::error::Error;
use std::fmt;

pub const KEYRING_SERVICE: &str = "nexus";

/// Describes failures when attempting to access the system keyring.
///
/// Recoverable errors mean the credential backend was temporarily
/// unavailable (a locked or unreachable keychain service). Permanent errors
/// surface the underlying cause directly so callers can report them.
#[derive(Debug)]
pub enum KeyringAccessError {
    Recoverable(keyring::Error),
    Permanent(keyring::Error),
}

impl KeyringAccessError {
    fn inner(&self) -> &keyring::Error {
        match self {
            KeyringAccessError::Recoverable(err) | KeyringAccessError::Permanent(err) => err,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(self, KeyringAccessError::Recoverable(_))
    }
}

impl From<keyring::Error> for KeyringAccessError {
    fn from(err: keyring::Error) -> Self {
        match err {
            keyring::Error::PlatformFailure(_) | keyring::Error::NoStorageAccess(_) => {
                KeyringAccessError::Recoverable(err)
            }
            other => KeyringAccessError::Permanent(other),
        }
    }
}

impl fmt::Display for KeyringAccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner())
    }
}

impl Error for KeyringAccessError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.inner())
    }
}

/// Secret storage keyed by account name.
pub trait SecretStore {
    fn get(&self, account: &str) -> Result<Option<String>, KeyringAccessError>;
    fn set(&self, account: &str, secret: &str) -> Result<(), KeyringAccessError>;
    /// Returns whether a secret was present.
    fn delete(&self, account: &str) -> Result<bool, KeyringAccessError>;
}

/// The platform keyring under the `nexus` service.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemKeyring;

impl SecretStore for SystemKeyring {
    fn get(&self, account: &str) -> Result<Option<String>, KeyringAccessError> {
        let entry = Entry::new(KEYRING_SERVICE, account)?;
        match entry.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&self, account: &str, secret: &str) -> Result<(), KeyringAccessError> {
        let entry = Entry::new(KEYRING_SERVICE, account)?;
        entry.set_password(secret)?;
        Ok(())
    }

    fn delete(&self, account: &str) -> Result<bool, KeyringAccessError> {
        let entry = Entry::new(KEYRING_SERVICE, account)?;
        match entry.delete_credential() {
            Ok(()) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}
