use aes_gcm::{Aes256Gcm, KeyInit, Nonce, aead::Aead};

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Encrypt `plaintext` under a 32-byte key.
///
/// Output layout:
/// ```text
/// [ nonce (12) | ciphertext | tag (16) ]
/// ```
pub fn seal(key: &[u8], plaintext: &[u8]) -> anyhow::Result<Vec<u8>> {
    anyhow::ensure!(key.len() == 32, "wrapping key must be 32 bytes");
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| anyhow::anyhow!("invalid wrapping key: {e}"))?;
    let nonce_bytes = rand_nonce()?;
    let nonce = Nonce::from_slice(&nonce_bytes);
    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| anyhow::anyhow!("wrap encrypt failed: {e}"))?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Reverse of [`seal`]. Fails on a wrong key or tampered input.
pub fn open(key: &[u8], sealed: &[u8]) -> anyhow::Result<Vec<u8>> {
    anyhow::ensure!(key.len() == 32, "wrapping key must be 32 bytes");
    anyhow::ensure!(
        sealed.len() >= NONCE_LEN + TAG_LEN,
        "sealed payload too short: {} bytes",
        sealed.len()
    );
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| anyhow::anyhow!("invalid wrapping key: {e}"))?;
    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
    let nonce = Nonce::from_slice(nonce_bytes);
    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|e| anyhow::anyhow!("unwrap decrypt failed: {e}"))
}

fn rand_nonce() -> anyhow::Result<[u8; NONCE_LEN]> {
    let mut n = [0u8; NONCE_LEN];
    getrandom::getrandom(&mut n).map_err(|e| anyhow::anyhow!("getrandom failed: {e}"))?;
    Ok(n)
}
