use std::path::PathBuf;

use argon2::Argon2;
use parking_lot::Mutex;

use super::Provider;
use crate::{
    context::Context,
    crypto::{envelope, keys::Dek},
};

/// Local provider backed by a configured secret. Reads a 32-byte key
/// from a file, or derives one from a passphrase via Argon2id, and
/// wraps data keys with AES-256-GCM.
pub struct SecretKeyProvider {
    /// Wrapping key, resolved once and then reused.
    cached: Mutex<Option<Dek>>,
    source: KeySource,
}

enum KeySource {
    File(PathBuf),
    Passphrase(String),
    Raw,
}

/// Fixed salt for passphrase derivation, so the same passphrase
/// always yields the same wrapping key across restarts.
const DEFAULT_SALT: &[u8; 16] = b"datakeys-sk-salt";

impl SecretKeyProvider {
    pub fn from_keyfile(path: PathBuf) -> Self {
        Self {
            cached: Mutex::new(None),
            source: KeySource::File(path),
        }
    }

    pub fn from_passphrase(passphrase: &str) -> Self {
        Self {
            cached: Mutex::new(None),
            source: KeySource::Passphrase(passphrase.to_owned()),
        }
    }

    pub fn from_key(key: [u8; 32]) -> Self {
        Self {
            cached: Mutex::new(Some(Dek::from_bytes(key))),
            source: KeySource::Raw,
        }
    }

    fn load_key(&self) -> anyhow::Result<Dek> {
        match &self.source {
            KeySource::File(path) => {
                let bytes = std::fs::read(path)?;
                anyhow::ensure!(
                    bytes.len() == 32,
                    "keyfile must be exactly 32 bytes, got {}",
                    bytes.len()
                );
                Dek::from_slice(&bytes)
            }
            KeySource::Passphrase(pw) => {
                let mut key = [0u8; 32];
                Argon2::default()
                    .hash_password_into(pw.as_bytes(), DEFAULT_SALT, &mut key)
                    .map_err(|e| anyhow::anyhow!("argon2 failed: {e}"))?;
                Ok(Dek::from_bytes(key))
            }
            KeySource::Raw => anyhow::bail!("raw secret key was not retained"),
        }
    }

    fn wrapping_key(&self) -> anyhow::Result<Dek> {
        let mut guard = self.cached.lock();
        if let Some(ref cached) = *guard {
            return Ok(cached.clone());
        }
        let key = self.load_key()?;
        *guard = Some(key.clone());
        Ok(key)
    }
}

impl Provider for SecretKeyProvider {
    fn encrypt(&self, ctx: &Context, plaintext: &[u8]) -> anyhow::Result<Vec<u8>> {
        ctx.check()?;
        let key = self.wrapping_key()?;
        envelope::seal(key.as_bytes(), plaintext)
    }

    fn decrypt(&self, ctx: &Context, ciphertext: &[u8]) -> anyhow::Result<Vec<u8>> {
        ctx.check()?;
        let key = self.wrapping_key()?;
        envelope::open(key.as_bytes(), ciphertext)
    }
}
