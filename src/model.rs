use std::fmt;

use chrono::{DateTime, Utc};

/// Id of the built-in secret-key provider.
pub const DEFAULT_PROVIDER: &str = "secretKey.v1";

/// Pre-versioned spelling of [`DEFAULT_PROVIDER`], still found on old rows.
const LEGACY_DEFAULT_PROVIDER: &str = "secretKey";

/// Opaque provider identifier, usually `<kind>.<name>` (e.g. `awskms.v1`).
#[derive(Clone, Debug, Hash, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ProviderId(pub String);

impl ProviderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Map legacy aliases onto their current id.
    pub fn normalize(&self) -> ProviderId {
        if self.0 == LEGACY_DEFAULT_PROVIDER {
            return ProviderId(DEFAULT_PROVIDER.into());
        }
        self.clone()
    }

    /// Backend kind: everything before the first `.`.
    pub fn kind(&self) -> &str {
        self.0.split('.').next().unwrap_or_default()
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProviderId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for ProviderId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A wrapped data key as stored in the `data_keys` table.
#[derive(Clone, PartialEq, Eq)]
pub struct DataKey {
    pub name: String,
    pub active: bool,
    /// Provider whose key wrapped `encrypted_data`.
    pub provider: ProviderId,
    pub encrypted_data: Vec<u8>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl DataKey {
    /// A new active key. Timestamps are replaced on insert.
    pub fn new(
        name: impl Into<String>,
        provider: impl Into<ProviderId>,
        encrypted_data: Vec<u8>,
    ) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            active: true,
            provider: provider.into(),
            encrypted_data,
            created: now,
            updated: now,
        }
    }
}

impl fmt::Debug for DataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataKey")
            .field("name", &self.name)
            .field("active", &self.active)
            .field("provider", &self.provider)
            .field("encrypted_data", &format_args!("<{} bytes>", self.encrypted_data.len()))
            .field("created", &self.created)
            .field("updated", &self.updated)
            .finish()
    }
}
