//! Credential store over PostgreSQL or process memory.
//!
//! Email uniqueness is enforced at the store itself (a UNIQUE index on the
//! Postgres side, a check under the write lock in memory) so two concurrent
//! registrations racing on one address cannot both win.

use std::collections::HashMap;

use rand::RngCore;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::RwLock;

use crate::error::{Result, ServerError};
use crate::user::{DEFAULT_PROFILE_PIC, NewUser, User, UserUpdate};

pub const DEFAULT_CREDENTIALS: &str = "postgres";
pub const DEFAULT_DATABASE_NAME: &str = "campus";
pub const DEFAULT_POOL_SIZE: u32 = 10;

/// Persistence layer for [`User`] records.
pub enum UserStore {
    Postgres(PgUserStore),
    Memory(MemUserStore),
}

/// Assign a stable, opaque identity to a new record.
fn assign_identity() -> String {
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

impl UserStore {
    /// Store backed by a PostgreSQL pool. Runs pending migrations.
    pub async fn postgres(
        hostname: &str,
        username: &str,
        password: &str,
        db: &str,
        pool: u32,
    ) -> std::result::Result<Self, sqlx::Error> {
        let addr = format!("postgres://{username}:{password}@{hostname}/{db}");
        let pool = PgPoolOptions::new()
            .max_connections(pool)
            .connect(&addr)
            .await?;

        sqlx::migrate!().run(&pool).await?;
        tracing::info!(%hostname, %db, "postgres connected");

        Ok(Self::Postgres(PgUserStore { pool }))
    }

    /// Store kept in process memory. Records do not survive a restart.
    pub fn memory() -> Self {
        Self::Memory(MemUserStore::default())
    }

    /// Persist a new record.
    ///
    /// Fields are normalized and re-validated here; duplicate normalized
    /// emails fail with [`ServerError::EmailTaken`].
    pub async fn create(&self, candidate: NewUser) -> Result<User> {
        let candidate = candidate.normalized()?;
        let user = User {
            id: assign_identity(),
            first_name: candidate.first_name,
            last_name: candidate.last_name,
            email: candidate.email,
            password: candidate.password,
            phone: candidate.phone,
            profile_pic: DEFAULT_PROFILE_PIC.to_owned(),
            created_at: chrono::Utc::now(),
        };

        match self {
            Self::Postgres(store) => store.insert(&user).await?,
            Self::Memory(store) => store.insert(&user).await?,
        }
        Ok(user)
    }

    /// Find a record by normalized email. Absence is a value, not an error.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = email.trim().to_lowercase();
        match self {
            Self::Postgres(store) => store.find_by_email(&email).await,
            Self::Memory(store) => Ok(store.find_by_email(&email).await),
        }
    }

    /// Find a record by identity.
    pub async fn find_by_id(&self, user_id: &str) -> Result<Option<User>> {
        match self {
            Self::Postgres(store) => store.find_by_id(user_id).await,
            Self::Memory(store) => Ok(store.find_by_id(user_id).await),
        }
    }

    /// Apply a partial update; only supplied fields change, after the same
    /// normalization and rules as creation.
    pub async fn update(
        &self,
        user_id: &str,
        fields: UserUpdate,
    ) -> Result<User> {
        let fields = fields.normalized()?;
        match self {
            Self::Postgres(store) => store.update(user_id, fields).await,
            Self::Memory(store) => store.update(user_id, fields).await,
        }
    }

    /// Remove a record permanently.
    pub async fn delete(&self, user_id: &str) -> Result<()> {
        match self {
            Self::Postgres(store) => store.delete(user_id).await,
            Self::Memory(store) => store.delete(user_id).await,
        }
    }
}

const COLUMNS: &str =
    "id, first_name, last_name, email, password, phone, profile_pic, created_at";

/// [`UserStore`] backend over PostgreSQL.
pub struct PgUserStore {
    pool: PgPool,
}

/// Map unique-index violations to the duplicate-identity error.
fn into_store_error(err: sqlx::Error) -> ServerError {
    if err
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation())
    {
        ServerError::EmailTaken
    } else {
        ServerError::Sql(err)
    }
}

impl PgUserStore {
    async fn insert(&self, user: &User) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO users (id, first_name, last_name, email, password, phone, profile_pic, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"#,
        )
        .bind(&user.id)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.password)
        .bind(&user.phone)
        .bind(&user.profile_pic)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(into_store_error)?;

        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE email = $1");
        let user = sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn find_by_id(&self, user_id: &str) -> Result<Option<User>> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn update(&self, user_id: &str, fields: UserUpdate) -> Result<User> {
        let query = format!(
            r#"UPDATE users SET
                first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                email = COALESCE($4, email),
                password = COALESCE($5, password),
                phone = COALESCE($6, phone),
                profile_pic = COALESCE($7, profile_pic)
                WHERE id = $1
                RETURNING {COLUMNS}"#
        );

        sqlx::query_as::<_, User>(&query)
            .bind(user_id)
            .bind(fields.first_name)
            .bind(fields.last_name)
            .bind(fields.email)
            .bind(fields.password)
            .bind(fields.phone)
            .bind(fields.profile_pic)
            .fetch_optional(&self.pool)
            .await
            .map_err(into_store_error)?
            .ok_or(ServerError::NotFound)
    }

    async fn delete(&self, user_id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ServerError::NotFound);
        }
        Ok(())
    }
}

/// [`UserStore`] backend kept in process memory.
///
/// Used when no `postgres` entry exists on `config.yaml`, and by the test
/// suite.
#[derive(Default)]
pub struct MemUserStore {
    records: RwLock<HashMap<String, User>>,
}

impl MemUserStore {
    async fn insert(&self, user: &User) -> Result<()> {
        let mut records = self.records.write().await;
        if records.values().any(|u| u.email == user.email) {
            return Err(ServerError::EmailTaken);
        }

        records.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Option<User> {
        self.records
            .read()
            .await
            .values()
            .find(|u| u.email == email)
            .cloned()
    }

    async fn find_by_id(&self, user_id: &str) -> Option<User> {
        self.records.read().await.get(user_id).cloned()
    }

    async fn update(&self, user_id: &str, fields: UserUpdate) -> Result<User> {
        let mut records = self.records.write().await;

        if let Some(email) = &fields.email
            && records
                .values()
                .any(|u| u.email == *email && u.id != user_id)
        {
            return Err(ServerError::EmailTaken);
        }

        let user = records.get_mut(user_id).ok_or(ServerError::NotFound)?;
        fields.apply_to(user);
        Ok(user.clone())
    }

    async fn delete(&self, user_id: &str) -> Result<()> {
        self.records
            .write()
            .await
            .remove(user_id)
            .map(|_| ())
            .ok_or(ServerError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(email: &str) -> NewUser {
        NewUser {
            first_name: "Ada".to_owned(),
            last_name: "Lovelace".to_owned(),
            email: email.to_owned(),
            password: "$argon2id$fake".to_owned(),
            phone: "9876543210".to_owned(),
        }
    }

    #[tokio::test]
    async fn test_create_assigns_identity_and_defaults() {
        let store = UserStore::memory();
        let user = store.create(candidate("ada@example.org")).await.unwrap();

        assert!(!user.id.is_empty());
        assert_eq!(user.profile_pic, DEFAULT_PROFILE_PIC);
        assert_eq!(
            store.find_by_id(&user.id).await.unwrap().unwrap().email,
            "ada@example.org"
        );
    }

    #[tokio::test]
    async fn test_duplicate_email_is_case_insensitive() {
        let store = UserStore::memory();
        store.create(candidate("ada@example.org")).await.unwrap();

        let result = store.create(candidate("ADA@Example.ORG")).await;
        assert!(matches!(result, Err(ServerError::EmailTaken)));

        // A distinct address is fine.
        assert!(store.create(candidate("grace@example.org")).await.is_ok());
    }

    #[tokio::test]
    async fn test_find_by_email_is_case_insensitive() {
        let store = UserStore::memory();
        store.create(candidate("ada@example.org")).await.unwrap();

        assert!(
            store
                .find_by_email(" Ada@EXAMPLE.org ")
                .await
                .unwrap()
                .is_some()
        );
        assert!(
            store
                .find_by_email("nobody@example.org")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_partial_update_touches_supplied_fields_only() {
        let store = UserStore::memory();
        let user = store.create(candidate("ada@example.org")).await.unwrap();

        let updated = store
            .update(
                &user.id,
                UserUpdate {
                    first_name: Some("Augusta".to_owned()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.first_name, "Augusta");
        assert_eq!(updated.last_name, "Lovelace");
        assert_eq!(updated.email, "ada@example.org");
        // Untouched password is not re-hashed or replaced.
        assert_eq!(updated.password, user.password);
        assert_eq!(updated.created_at, user.created_at);
    }

    #[tokio::test]
    async fn test_update_revalidates_supplied_fields() {
        let store = UserStore::memory();
        let user = store.create(candidate("ada@example.org")).await.unwrap();

        let result = store
            .update(
                &user.id,
                UserUpdate {
                    phone: Some("12345".to_owned()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(ServerError::Validation(_))));

        let updated = store
            .update(
                &user.id,
                UserUpdate {
                    phone: Some("0123456789".to_owned()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.phone, "0123456789");
    }

    #[tokio::test]
    async fn test_update_cannot_steal_existing_email() {
        let store = UserStore::memory();
        store.create(candidate("ada@example.org")).await.unwrap();
        let grace = store.create(candidate("grace@example.org")).await.unwrap();

        let result = store
            .update(
                &grace.id,
                UserUpdate {
                    email: Some("Ada@example.org".to_owned()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(ServerError::EmailTaken)));

        // Re-writing your own address is not a conflict.
        assert!(
            store
                .update(
                    &grace.id,
                    UserUpdate {
                        email: Some("grace@example.org".to_owned()),
                        ..Default::default()
                    },
                )
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_update_and_delete_missing_user() {
        let store = UserStore::memory();

        let result = store.update("ghost", UserUpdate::default()).await;
        assert!(matches!(result, Err(ServerError::NotFound)));

        let result = store.delete("ghost").await;
        assert!(matches!(result, Err(ServerError::NotFound)));
    }

    #[tokio::test]
    async fn test_delete_is_permanent() {
        let store = UserStore::memory();
        let user = store.create(candidate("ada@example.org")).await.unwrap();

        store.delete(&user.id).await.unwrap();
        assert!(store.find_by_id(&user.id).await.unwrap().is_none());
        assert!(matches!(
            store.delete(&user.id).await,
            Err(ServerError::NotFound)
        ));
    }
}
