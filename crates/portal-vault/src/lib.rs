// SPDX-License-Identifier: MIT
//! Credential vault — per-user encrypted token storage, key-versioned.

mod crypto;
mod error;

pub use crypto::PLAINTEXT_KEY_ID;
pub use error::{Result, VaultError};

use chrono::{DateTime, Utc};
use portal_config::EncryptionConfig;
use portal_db::DbPool;
use serde_json::Value;
use sqlx::Row;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct Credential {
    pub user_id: Uuid,
    pub service: String,
    pub token_data: Value,
    pub scopes: Option<Vec<String>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub metadata: Value,
}

pub struct CredentialVault {
    pool: DbPool,
    encryption: EncryptionConfig,
}

impl CredentialVault {
    pub fn new(pool: DbPool, encryption: EncryptionConfig) -> Self {
        Self { pool, encryption }
    }

    fn current_key_id(&self) -> &str {
        self.encryption
            .current_key_id
            .as_deref()
            .unwrap_or(PLAINTEXT_KEY_ID)
    }

    /// Looks up a stored credential for `user_id`/`service`, or `None` if
    /// absent.
    ///
    /// On a stale key id, decrypts under the prior key, re-encrypts under
    /// the current key, and writes the row back before returning — lazy
    /// rotation. A failed re-encryption does not fail the read; a failed
    /// decryption returns `None`.
    pub async fn get(&self, user_id: Uuid, service: &str) -> Result<Option<Credential>> {
        let row = sqlx::query(
            r#"SELECT ciphertext, encryption_key_id, scopes, expires_at, metadata
               FROM user_credentials WHERE user_id = $1 AND service = $2"#,
        )
        .bind(user_id)
        .bind(service)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else { return Ok(None) };

        let ciphertext: Vec<u8> = row.try_get("ciphertext")?;
        let key_id: String = row.try_get("encryption_key_id")?;
        let scopes: Option<Vec<String>> = row.try_get("scopes")?;
        let expires_at: Option<DateTime<Utc>> = row.try_get("expires_at")?;
        let metadata: Value = row.try_get("metadata")?;

        let plaintext = match crypto::decrypt(&ciphertext, &key_id, &self.encryption.keys) {
            Ok(p) => p,
            Err(_) => {
                tracing::warn!(user_id = %user_id, service, "credential decryption failed — treating as absent");
                return Ok(None);
            }
        };

        let token_data: Value = serde_json::from_slice(&plaintext).unwrap_or(Value::Null);

        let current = self.current_key_id();
        if key_id != current {
            match crypto::encrypt(&plaintext, current, &self.encryption.keys) {
                Ok(rewritten) => {
                    let updated = sqlx::query(
                        r#"UPDATE user_credentials SET ciphertext = $1, encryption_key_id = $2, updated_at = now()
                           WHERE user_id = $3 AND service = $4"#,
                    )
                    .bind(rewritten)
                    .bind(current)
                    .bind(user_id)
                    .bind(service)
                    .execute(&self.pool)
                    .await;
                    if let Err(e) = updated {
                        tracing::warn!(user_id = %user_id, service, error = %e, "failed to persist rotated credential");
                    }
                }
                Err(e) => {
                    tracing::warn!(user_id = %user_id, service, error = %e, "failed to re-encrypt credential under current key");
                }
            }
        }

        Ok(Some(Credential {
            user_id,
            service: service.to_string(),
            token_data,
            scopes,
            expires_at,
            metadata,
        }))
    }

    /// Stores or updates a credential, encrypting under the current key.
    pub async fn put(
        &self,
        user_id: Uuid,
        service: &str,
        token_data: &Value,
        scopes: Option<Vec<String>>,
        expires_at: Option<DateTime<Utc>>,
        metadata: Option<Value>,
    ) -> Result<()> {
        let plaintext = serde_json::to_vec(token_data).expect("Value always serializes");
        let key_id = self.current_key_id().to_string();
        let ciphertext = crypto::encrypt(&plaintext, &key_id, &self.encryption.keys)?;
        let metadata = metadata.unwrap_or(Value::Object(Default::default()));

        sqlx::query(
            r#"INSERT INTO user_credentials (id, user_id, service, ciphertext, encryption_key_id, scopes, expires_at, metadata)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
               ON CONFLICT (user_id, service) DO UPDATE
               SET ciphertext = EXCLUDED.ciphertext,
                   encryption_key_id = EXCLUDED.encryption_key_id,
                   scopes = EXCLUDED.scopes,
                   expires_at = EXCLUDED.expires_at,
                   metadata = EXCLUDED.metadata,
                   updated_at = now()"#,
        )
        .bind(Uuid::now_v7())
        .bind(user_id)
        .bind(service)
        .bind(ciphertext)
        .bind(key_id)
        .bind(scopes)
        .bind(expires_at)
        .bind(metadata)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Deletes a stored credential; returns whether a row was removed.
    pub async fn delete(&self, user_id: Uuid, service: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM user_credentials WHERE user_id = $1 AND service = $2")
            .bind(user_id)
            .bind(service)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Lists the services a user has stored credentials for.
    pub async fn list_services(&self, user_id: Uuid) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT service FROM user_credentials WHERE user_id = $1 ORDER BY service")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|r| r.try_get::<String, _>("service").map_err(VaultError::from))
            .collect()
    }
}
