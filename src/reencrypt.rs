//! Re-wrapping every stored data key under the current provider.
//!
//! One transaction covers the whole scan. A key that cannot be
//! rotated is logged, recorded in the report and left untouched; the
//! rest of the batch still commits. Cancellation, even after the last
//! key, rolls the whole batch back.

use std::fmt;

use chrono::Utc;
use zeroize::Zeroizing;

use crate::{
    context::Context,
    error::{Error, Result},
    kms::ProviderRegistry,
    model::{DataKey, ProviderId},
    store::{self, DataKeyStore},
};

/// Why a single key was not rotated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The key's recorded provider is not in the registry.
    ProviderUnavailable,
    Decrypt(String),
    Encrypt(String),
    Persist(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::ProviderUnavailable => f.write_str("provider not registered"),
            SkipReason::Decrypt(e) => write!(f, "decrypt failed: {e}"),
            SkipReason::Encrypt(e) => write!(f, "re-encrypt failed: {e}"),
            SkipReason::Persist(e) => write!(f, "update failed: {e}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyOutcome {
    pub name: String,
    /// Provider recorded on the key when it was skipped.
    pub provider: ProviderId,
    pub reason: SkipReason,
}

/// Summary of one re-encryption run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RotationReport {
    pub scanned: u32,
    pub rotated: u32,
    pub not_rotated: Vec<KeyOutcome>,
}

impl RotationReport {
    /// Keys left alone because their provider is not registered.
    pub fn skipped(&self) -> u32 {
        self.not_rotated
            .iter()
            .filter(|o| o.reason == SkipReason::ProviderUnavailable)
            .count() as u32
    }

    /// Keys whose provider call or update failed.
    pub fn failed(&self) -> u32 {
        self.not_rotated.len() as u32 - self.skipped()
    }

    pub fn is_complete(&self) -> bool {
        self.not_rotated.is_empty()
    }

    fn skip(&mut self, key: &DataKey, reason: SkipReason) {
        self.not_rotated.push(KeyOutcome {
            name: key.name.clone(),
            provider: key.provider.clone(),
            reason,
        });
    }
}

impl DataKeyStore {
    /// Decrypt every stored key under its recorded provider and
    /// re-encrypt it under `registry.current_id()`.
    ///
    /// Per-key failures do not fail the call; inspect the returned
    /// report. Errors are returned only for a missing current provider,
    /// the initial bulk read, cancellation, and commit failures, and in
    /// each of those cases nothing is written.
    pub fn re_encrypt_data_keys(
        &self,
        ctx: &Context,
        registry: &ProviderRegistry,
    ) -> Result<RotationReport> {
        let current_id = registry.current_id().clone();
        let current = registry
            .current()
            .ok_or_else(|| Error::ProviderUnavailable(current_id.clone()))?;

        let report = self.sql().with_transaction(|tx| {
            let keys = store::load_all(tx)?;
            let mut report = RotationReport::default();

            for mut key in keys {
                ctx.check()?;
                report.scanned += 1;

                let Some(provider) = registry.provider(&key.provider) else {
                    log::warn!(
                        "could not find provider to re-encrypt data key {:?} (provider {})",
                        key.name,
                        key.provider
                    );
                    report.skip(&key, SkipReason::ProviderUnavailable);
                    continue;
                };

                let decrypted = match provider.decrypt(ctx, &key.encrypted_data) {
                    Ok(plain) => Zeroizing::new(plain),
                    Err(e) => {
                        ctx.check()?;
                        log::warn!(
                            "error decrypting data key {:?} (provider {}) to re-encrypt it: {e:#}",
                            key.name,
                            key.provider
                        );
                        report.skip(&key, SkipReason::Decrypt(format!("{e:#}")));
                        continue;
                    }
                };

                let encrypted = match current.encrypt(ctx, &decrypted) {
                    Ok(ct) => ct,
                    Err(e) => {
                        ctx.check()?;
                        log::warn!(
                            "error re-encrypting data key {:?} (provider {current_id}): {e:#}",
                            key.name
                        );
                        report.skip(&key, SkipReason::Encrypt(format!("{e:#}")));
                        continue;
                    }
                };

                let previous_provider = key.provider.clone();
                key.provider = current_id.clone();
                key.encrypted_data = encrypted;
                key.updated = Utc::now().max(key.created);

                if let Err(e) = store::update_wrapping(tx, &key) {
                    log::warn!(
                        "error storing re-encrypted data key {:?} (provider {current_id}): {e}",
                        key.name
                    );
                    report.not_rotated.push(KeyOutcome {
                        name: key.name,
                        provider: previous_provider,
                        reason: SkipReason::Persist(e.to_string()),
                    });
                    continue;
                }
                report.rotated += 1;
            }

            // A cancel raised during the last key's provider calls.
            ctx.check()?;
            Ok(report)
        })?;

        if report.is_complete() {
            log::info!(
                "re-encrypted {} data keys under provider {current_id}",
                report.rotated
            );
        } else {
            log::warn!(
                "re-encrypted {} of {} data keys under provider {current_id} ({} skipped, {} failed)",
                report.rotated,
                report.scanned,
                report.skipped(),
                report.failed()
            );
        }
        Ok(report)
    }
}
