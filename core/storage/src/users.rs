//! Credential records.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use tracing::debug;

use crate::database::{db_err, map_sqlite_error, Database};
use lockbox_common::{AuthError, Error, Identity, Result, StorageError};

/// A stored credential record. Only the PHC hash of the password is kept.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: Identity,
    pub login: String,
    pub password_hash: String,
}

pub(crate) fn parse_id(column: &str, raw: &str) -> Result<uuid::Uuid> {
    uuid::Uuid::parse_str(raw).map_err(|e| {
        Error::Storage(StorageError::Other(format!(
            "corrupt {} column {:?}: {}",
            column, raw, e
        )))
    })
}

impl Database {
    /// Insert a credential record under a fresh identity.
    ///
    /// # Errors
    /// - `AuthError::AlreadyExists` if the login is taken
    pub async fn insert_user(&self, login: &str, password_hash: &str) -> Result<Identity> {
        let id = Identity::generate();
        let conn = self.conn().await;
        let inserted = conn.execute(
            "INSERT INTO users (id, login, password_hash, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![id.to_string(), login, password_hash, Utc::now().timestamp()],
        );

        match inserted {
            Ok(_) => {
                debug!(user = %id, "User inserted");
                Ok(id)
            }
            Err(e) => match map_sqlite_error(e) {
                StorageError::UniqueViolation(_) => Err(AuthError::AlreadyExists.into()),
                other => Err(other.into()),
            },
        }
    }

    /// Look up a credential record by login.
    pub async fn find_user_by_login(&self, login: &str) -> Result<Option<UserRecord>> {
        let conn = self.conn().await;
        let row = conn
            .query_row(
                "SELECT id, login, password_hash FROM users WHERE login = ?1",
                [login],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()
            .map_err(db_err)?;

        row.map(|(id, login, password_hash)| -> Result<UserRecord> {
            Ok(UserRecord {
                id: Identity::from_uuid(parse_id("users.id", &id)?),
                login,
                password_hash,
            })
        })
        .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_and_find() {
        let db = Database::in_memory().unwrap();
        let id = db.insert_user("alice", "$argon2id$fake").await.unwrap();

        let user = db.find_user_by_login("alice").await.unwrap().unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.password_hash, "$argon2id$fake");
        assert!(db.find_user_by_login("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_login() {
        let db = Database::in_memory().unwrap();
        db.insert_user("alice", "h1").await.unwrap();
        let err = db.insert_user("alice", "h2").await.unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::AlreadyExists)));
    }
}
