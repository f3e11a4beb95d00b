//! Loading the SSH private key for the Docker VM.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::domain::config::DEFAULT_SSH_KEY_FILE;
use crate::domain::{Credentials, TunnelError};

/// `~/.ssh/id_boot2docker`.
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn default_key_path() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    Ok(home.join(".ssh").join(DEFAULT_SSH_KEY_FILE))
}

/// Read the key at `path` as opaque bytes.
///
/// # Errors
///
/// Returns [`TunnelError::Credentials`] if the file cannot be read and
/// [`TunnelError::EmptyCredentials`] if it is empty.
pub fn load_credentials(path: &Path) -> Result<Credentials, TunnelError> {
    let key = std::fs::read(path).map_err(|source| TunnelError::Credentials {
        path: path.to_path_buf(),
        source,
    })?;
    if key.iter().all(u8::is_ascii_whitespace) {
        return Err(TunnelError::EmptyCredentials {
            path: path.to_path_buf(),
        });
    }
    Ok(Credentials::new(path.to_path_buf(), key))
}
