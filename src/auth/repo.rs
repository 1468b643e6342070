use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::repo_types::StaffAccount;

const ACCOUNT_COLUMNS: &str = "id, email, display_name, password_hash, created_at";

impl StaffAccount {
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<StaffAccount>> {
        let account = sqlx::query_as::<_, StaffAccount>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM staff_accounts WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(account)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<StaffAccount>> {
        let account = sqlx::query_as::<_, StaffAccount>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM staff_accounts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(account)
    }

    /// Inserts a new account. Returns `None` when the email is already taken.
    pub async fn create(
        db: &PgPool,
        email: &str,
        display_name: Option<&str>,
        password_hash: &str,
    ) -> anyhow::Result<Option<StaffAccount>> {
        let account = sqlx::query_as::<_, StaffAccount>(&format!(
            r#"
            INSERT INTO staff_accounts (email, display_name, password_hash)
            VALUES ($1, $2, $3)
            ON CONFLICT (email) DO NOTHING
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(email)
        .bind(display_name)
        .bind(password_hash)
        .fetch_optional(db)
        .await?;
        Ok(account)
    }
}
