use anyhow::Context;
use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::auth::repo_types::User;

const USER_COLUMNS: &str =
    "id, email, username, occupation, password_hash, is_verified, created_at";

impl User {
    /// Find a user by email.
    pub async fn find_by_email(db: &SqlitePool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = ?"
        ))
        .bind(email)
        .fetch_optional(db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    pub async fn find_by_username(
        db: &SqlitePool,
        username: &str,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = ?"
        ))
        .bind(username)
        .fetch_optional(db)
        .await
        .context("find user by username")?;
        Ok(user)
    }

    /// Insert a new, unverified user inside `tx`. Unique violations surface as
    /// `sqlx::Error::Database`.
    pub async fn create_tx(
        tx: &mut Transaction<'_, Sqlite>,
        email: &str,
        username: Option<&str>,
        occupation: Option<&str>,
        password_hash: &str,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, username, occupation, password_hash)
            VALUES (?, ?, ?, ?)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(email)
        .bind(username)
        .bind(occupation)
        .bind(password_hash)
        .fetch_one(&mut **tx)
        .await
        .context("insert user")?;
        Ok(user)
    }

    /// Flip `is_verified`. Returns false when the user was already verified.
    pub async fn mark_verified(db: &SqlitePool, id: i64) -> anyhow::Result<bool> {
        let res = sqlx::query("UPDATE users SET is_verified = 1 WHERE id = ? AND is_verified = 0")
            .bind(id)
            .execute(db)
            .await
            .context("mark user verified")?;
        Ok(res.rows_affected() == 1)
    }

    pub async fn set_password_hash(db: &SqlitePool, id: i64, hash: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(hash)
            .bind(id)
            .execute(db)
            .await
            .context("update password hash")?;
        Ok(())
    }

    pub async fn set_username(db: &SqlitePool, id: i64, username: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET username = ? WHERE id = ?")
            .bind(username)
            .bind(id)
            .execute(db)
            .await
            .context("update username")?;
        Ok(())
    }

    pub async fn set_occupation(db: &SqlitePool, id: i64, occupation: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET occupation = ? WHERE id = ?")
            .bind(occupation)
            .bind(id)
            .execute(db)
            .await
            .context("update occupation")?;
        Ok(())
    }

    pub async fn delete(db: &SqlitePool, id: i64) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(db)
            .await
            .context("delete user")?;
        Ok(())
    }
}
