use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::{
    context::Context,
    crypto::keys::Dek,
    error::{Error, Result, is_unique_violation},
    kms::ProviderRegistry,
    model::{DataKey, ProviderId},
    sqlstore::SqlStore,
};

const SELECT_COLUMNS: &str =
    "SELECT name, active, provider, encrypted_data, created, updated FROM data_keys";

/// Persistence for wrapped data keys.
pub struct DataKeyStore {
    sql: SqlStore,
}

impl DataKeyStore {
    pub fn new(sql: SqlStore) -> Self {
        Self { sql }
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(SqlStore::open_in_memory()?))
    }

    pub fn sql(&self) -> &SqlStore {
        &self.sql
    }

    /// Fetch a key by exact name. Returns [`Error::NotFound`] when no
    /// row matches; no decryption happens here.
    pub fn get_data_key(&self, name: &str) -> Result<DataKey> {
        let found = self.sql.with_session(|conn| {
            Ok(conn
                .query_row(&format!("{SELECT_COLUMNS} WHERE name = ?1"), [name], from_row)
                .optional()?)
        });

        match found {
            Ok(Some(key)) => Ok(key),
            Ok(None) => Err(Error::NotFound),
            Err(e) => {
                log::error!("failed to get data key {name:?}: {e}");
                Err(e)
            }
        }
    }

    pub fn get_all_data_keys(&self) -> Result<Vec<DataKey>> {
        self.sql
            .with_session(load_all)
            .inspect_err(|e| log::error!("failed to list data keys: {e}"))
    }

    /// Insert an active key. `created` and `updated` are reset to now.
    pub fn create_data_key(&self, key: DataKey) -> Result<()> {
        self.sql.with_session(|conn| self.create_data_key_in(conn, key))
    }

    /// Same as [`create_data_key`](Self::create_data_key) against a
    /// caller-held connection or open transaction.
    pub fn create_data_key_in(&self, conn: &Connection, mut key: DataKey) -> Result<()> {
        if !key.active {
            return Err(Error::InvalidArgument("cannot insert deactivated data keys"));
        }

        key.created = Utc::now();
        key.updated = key.created;

        conn.execute(
            "INSERT INTO data_keys (name, active, provider, encrypted_data, created, updated) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                key.name,
                key.active,
                key.provider.as_str(),
                key.encrypted_data,
                key.created,
                key.updated
            ],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::Conflict(key.name.clone())
            } else {
                log::error!("failed to insert data key {:?}: {e}", key.name);
                Error::Store(e)
            }
        })?;
        Ok(())
    }

    /// Delete by name. Deleting a missing key succeeds.
    pub fn delete_data_key(&self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::InvalidArgument("data key name is missing"));
        }

        self.sql
            .with_session(|conn| {
                conn.execute("DELETE FROM data_keys WHERE name = ?1", [name])?;
                Ok(())
            })
            .inspect_err(|e| log::error!("failed to delete data key {name:?}: {e}"))
    }

    /// Generate a fresh data key, wrap it under the registry's current
    /// provider and store it. Returns the stored record together with
    /// the plaintext key.
    pub fn create_new_data_key(
        &self,
        ctx: &Context,
        name: &str,
        registry: &ProviderRegistry,
    ) -> Result<(DataKey, Dek)> {
        if name.is_empty() {
            return Err(Error::InvalidArgument("data key name is missing"));
        }
        let current = registry.current_id().clone();
        let provider = registry
            .current()
            .ok_or_else(|| Error::ProviderUnavailable(current.clone()))?;

        let dek = Dek::generate().map_err(|e| crypto_error(&current, e))?;
        let wrapped = provider
            .encrypt(ctx, dek.as_bytes())
            .map_err(|e| crypto_error(&current, e))?;

        self.create_data_key(DataKey::new(name, current, wrapped))?;
        // Re-read so the caller sees the stored timestamps.
        Ok((self.get_data_key(name)?, dek))
    }
}

fn crypto_error(provider: &ProviderId, err: anyhow::Error) -> Error {
    Error::Crypto {
        provider: provider.clone(),
        message: format!("{err:#}"),
    }
}

pub(crate) fn load_all(conn: &Connection) -> Result<Vec<DataKey>> {
    let mut stmt = conn.prepare(SELECT_COLUMNS)?;
    let keys = stmt
        .query_map([], from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(keys)
}

/// Write provider, ciphertext and `updated` of `key` in one statement.
pub(crate) fn update_wrapping(conn: &Connection, key: &DataKey) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE data_keys SET provider = ?1, encrypted_data = ?2, updated = ?3 WHERE name = ?4",
        params![key.provider.as_str(), key.encrypted_data, key.updated, key.name],
    )
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<DataKey> {
    Ok(DataKey {
        name: row.get(0)?,
        active: row.get(1)?,
        provider: ProviderId(row.get(2)?),
        encrypted_data: row.get(3)?,
        created: row.get(4)?,
        updated: row.get(5)?,
    })
}
