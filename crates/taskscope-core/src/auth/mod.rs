//! Access token shared between the server and local clients.
//!
//! The server writes a random 256-bit token, base64 encoded, to a file only
//! the owner can read. Clients on the same machine read it back and present
//! it with each request.

use std::fs::{self, Permissions};
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use tracing::debug;

use crate::error::{Error, Result};

const TOKEN_LEN: usize = 32;

#[derive(Clone)]
pub struct AccessToken {
    bytes: [u8; TOKEN_LEN],
    /// Identifies the token in logs without revealing it
    pub token_id: uuid::Uuid,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token_id", &self.token_id)
            .finish_non_exhaustive()
    }
}

impl AccessToken {
    pub fn generate() -> Self {
        let mut bytes = [0u8; TOKEN_LEN];
        rand::Rng::fill(&mut rand::thread_rng(), &mut bytes);
        Self {
            bytes,
            token_id: uuid::Uuid::new_v4(),
        }
    }

    /// Base64 form, as sent by clients
    pub fn encoded(&self) -> String {
        STANDARD.encode(self.bytes)
    }

    pub fn decode(encoded: &str) -> Result<Self> {
        let decoded = STANDARD
            .decode(encoded.trim())
            .map_err(|_| Error::InvalidToken)?;
        let bytes: [u8; TOKEN_LEN] = decoded.try_into().map_err(|_| Error::InvalidToken)?;
        Ok(Self {
            bytes,
            token_id: uuid::Uuid::new_v4(),
        })
    }

    /// Write the encoded token, readable by the owner only (0600)
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.encoded())?;
        #[cfg(unix)]
        fs::set_permissions(path, Permissions::from_mode(0o600))?;
        Ok(())
    }

    pub fn read_from_file(path: &Path) -> Result<Self> {
        Self::decode(&fs::read_to_string(path)?)
    }

    /// Reuse the token at `path` if it's valid, otherwise write a fresh one
    pub fn load_or_generate(path: &Path) -> Result<Self> {
        match Self::read_from_file(path) {
            Ok(token) => {
                debug!(path = %path.display(), "Loaded access token");
                Ok(token)
            }
            Err(_) => {
                let token = Self::generate();
                token.write_to_file(path)?;
                debug!(path = %path.display(), token_id = %token.token_id, "Generated access token");
                Ok(token)
            }
        }
    }

    /// Compare against raw bytes in constant time
    pub fn verify(&self, candidate: &[u8]) -> bool {
        if candidate.len() != TOKEN_LEN {
            return false;
        }
        self.bytes
            .iter()
            .zip(candidate)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }

    /// Compare against the base64 form a client presented
    pub fn verify_encoded(&self, candidate: &str) -> bool {
        STANDARD
            .decode(candidate.trim())
            .is_ok_and(|bytes| self.verify(&bytes))
    }
}
