//! Environment-driven configuration.
//!
//! | variable                       | meaning                                  |
//! |--------------------------------|------------------------------------------|
//! | `DATAKEYS_DB_PATH`             | SQLite file (in-memory when unset)       |
//! | `DATAKEYS_ENCRYPTION_PROVIDER` | current provider id (`secretKey.v1`)     |
//! | `DATAKEYS_KEYFILE`             | 32-byte key file for `secretKey.v1`      |
//! | `DATAKEYS_SECRET_KEY`          | passphrase for `secretKey.v1`            |
//! | `DATAKEYS_KMS_KEY_ID`          | enables the cloud KMS provider           |
//! | `DATAKEYS_KMS_ENDPOINT`        | KMS endpoint override                    |
//! | `DATAKEYS_KMS_PROVIDER_ID`     | id for the cloud provider (`awskms.v1`)  |

use std::{path::PathBuf, sync::Arc};

use crate::{
    error::{Error, Result},
    kms::{Provider, ProviderRegistry, cloud::CloudKmsProvider, local::SecretKeyProvider},
    model::{DEFAULT_PROVIDER, ProviderId},
};

const DEFAULT_CLOUD_PROVIDER: &str = "awskms.v1";

/// Where a provider's key material comes from.
#[derive(Clone, Debug)]
pub enum ProviderSource {
    /// Local secret: keyfile wins over passphrase.
    SecretKey {
        keyfile: Option<PathBuf>,
        passphrase: Option<String>,
    },
    /// Remote KMS key (ARN, alias, key URI, …).
    CloudKms {
        key_id: String,
        endpoint: Option<String>,
    },
}

#[derive(Clone, Debug)]
pub struct SecretsConfig {
    pub db_path: Option<PathBuf>,
    pub current_provider: ProviderId,
    pub providers: Vec<(ProviderId, ProviderSource)>,
}

impl SecretsConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup. Empty values count as unset.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(name).filter(|v| !v.is_empty());

        let current_provider = ProviderId::from(
            var("DATAKEYS_ENCRYPTION_PROVIDER").unwrap_or_else(|| DEFAULT_PROVIDER.into()),
        )
        .normalize();

        let mut providers = Vec::new();

        let keyfile = var("DATAKEYS_KEYFILE").map(PathBuf::from);
        let passphrase = var("DATAKEYS_SECRET_KEY");
        if keyfile.is_some() || passphrase.is_some() {
            providers.push((
                ProviderId::from(DEFAULT_PROVIDER),
                ProviderSource::SecretKey {
                    keyfile,
                    passphrase,
                },
            ));
        }

        if let Some(key_id) = var("DATAKEYS_KMS_KEY_ID") {
            let id = ProviderId::from(
                var("DATAKEYS_KMS_PROVIDER_ID").unwrap_or_else(|| DEFAULT_CLOUD_PROVIDER.into()),
            )
            .normalize();
            if id.kind() == ProviderId::from(DEFAULT_PROVIDER).kind() {
                return Err(Error::Config(format!(
                    "cloud provider id {id} collides with the secret key provider"
                )));
            }
            providers.push((
                id,
                ProviderSource::CloudKms {
                    key_id,
                    endpoint: var("DATAKEYS_KMS_ENDPOINT"),
                },
            ));
        }

        let config = Self {
            db_path: var("DATAKEYS_DB_PATH").map(PathBuf::from),
            current_provider,
            providers,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !self
            .providers
            .iter()
            .any(|(id, _)| id == &self.current_provider)
        {
            return Err(Error::Config(format!(
                "current provider {} has no key material configured",
                self.current_provider
            )));
        }
        Ok(())
    }

    pub fn build_registry(&self) -> Result<ProviderRegistry> {
        let mut registry = ProviderRegistry::new(self.current_provider.clone());
        for (id, source) in &self.providers {
            let provider: Arc<dyn Provider> = match source {
                ProviderSource::SecretKey {
                    keyfile,
                    passphrase,
                } => {
                    if let Some(path) = keyfile {
                        Arc::new(SecretKeyProvider::from_keyfile(path.clone()))
                    } else if let Some(pw) = passphrase {
                        Arc::new(SecretKeyProvider::from_passphrase(pw))
                    } else {
                        return Err(Error::Config(format!(
                            "provider {id} requires a keyfile or passphrase"
                        )));
                    }
                }
                ProviderSource::CloudKms { key_id, endpoint } => {
                    Arc::new(CloudKmsProvider::new(key_id.clone(), endpoint.clone()))
                }
            };
            registry.register(id.clone(), provider);
        }
        Ok(registry)
    }
}
