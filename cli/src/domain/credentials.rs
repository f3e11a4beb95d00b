//! Transport credentials, held as opaque key material.

use std::fmt;
use std::path::{Path, PathBuf};

/// Private key for the secure transport.
///
/// The bytes are never parsed here; the transport decides what they mean.
#[derive(Clone)]
pub struct Credentials {
    path: PathBuf,
    key: Vec<u8>,
}

impl Credentials {
    #[must_use]
    pub fn new(path: PathBuf, key: Vec<u8>) -> Self {
        Self { path, key }
    }

    /// File the key was read from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn key(&self) -> &[u8] {
        &self.key
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("path", &self.path)
            .field("key", &format_args!("<{} bytes>", self.key.len()))
            .finish()
    }
}
