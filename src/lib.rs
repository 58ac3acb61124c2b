pub mod config;
pub mod context;
pub mod crypto;
pub mod error;
pub mod init;
pub mod kms;
pub mod model;
pub mod reencrypt;
pub mod sqlstore;
pub mod store;

pub use config::{ProviderSource, SecretsConfig};
pub use context::Context;
pub use crypto::keys::Dek;
pub use error::{Error, Result};
pub use kms::{Provider, ProviderRegistry};
pub use model::{DEFAULT_PROVIDER, DataKey, ProviderId};
pub use reencrypt::{KeyOutcome, RotationReport, SkipReason};
pub use sqlstore::SqlStore;
pub use store::DataKeyStore;

/// A data key store wired to the providers it rotates between.
pub struct DataKeys {
    store: DataKeyStore,
    registry: ProviderRegistry,
}

impl DataKeys {
    pub fn new(store: DataKeyStore, registry: ProviderRegistry) -> Self {
        Self { store, registry }
    }

    /// Configure from `DATAKEYS_*` environment variables; see
    /// [`config`] for the full list.
    pub fn from_env() -> Result<Self> {
        let _ = env_logger::try_init();
        Self::from_config(&SecretsConfig::from_env()?)
    }

    pub fn from_config(config: &SecretsConfig) -> Result<Self> {
        let sql = match &config.db_path {
            Some(path) => SqlStore::open(path)?,
            None => SqlStore::open_in_memory()?,
        };
        let registry = config.build_registry()?;
        log::info!(
            "data key store ready (current provider {}, {} providers)",
            registry.current_id(),
            registry.len()
        );
        Ok(Self::new(DataKeyStore::new(sql), registry))
    }

    pub fn store(&self) -> &DataKeyStore {
        &self.store
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Return the stored key named `name`, creating one under the
    /// current provider on first use. The record is returned still
    /// wrapped.
    pub fn get_or_create(&self, ctx: &Context, name: &str) -> Result<DataKey> {
        match self.store.get_data_key(name) {
            Ok(key) => Ok(key),
            Err(Error::NotFound) => {
                match self.store.create_new_data_key(ctx, name, &self.registry) {
                    Ok((key, _dek)) => Ok(key),
                    // Lost a race with another creator; theirs is authoritative.
                    Err(Error::Conflict(_)) => self.store.get_data_key(name),
                    Err(e) => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Unwrap a stored key with the provider recorded on it.
    pub fn unwrap_data_key(&self, ctx: &Context, key: &DataKey) -> Result<Dek> {
        let provider = self
            .registry
            .provider(&key.provider)
            .ok_or_else(|| Error::ProviderUnavailable(key.provider.clone()))?;
        provider
            .decrypt(ctx, &key.encrypted_data)
            .and_then(|plain| Dek::from_slice(&zeroize::Zeroizing::new(plain)))
            .map_err(|e| Error::Crypto {
                provider: key.provider.clone(),
                message: format!("{e:#}"),
            })
    }

    /// Re-wrap every stored key under the current provider.
    pub fn re_encrypt(&self, ctx: &Context) -> Result<RotationReport> {
        self.store.re_encrypt_data_keys(ctx, &self.registry)
    }
}
